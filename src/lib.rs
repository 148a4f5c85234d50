//! Motion Fusion - avatar motion from webcam and iFacialMocap tracking
//!
//! A sensor-fusion and retargeting pipeline that:
//! - Ingests the iFacialMocap UDP face stream
//! - Paces a holistic inference worker to one frame in flight
//! - Smooths every tracked channel into a single owned store
//! - Retargets the store into blendshape, bone rotation and Euler records

pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod retarget;
pub mod tracking;

pub use config::Config;
pub use engine::{EngineHandle, FusionEngine};
pub use error::{FusionError, Result};
pub use fusion::FusionCore;
pub use retarget::MovementRecord;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
