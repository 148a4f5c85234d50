//! Tracking module
//!
//! Producers feeding the fusion engine:
//! - iFacialMocap UDP face stream
//! - Inference pacing against a webcam frame source and a holistic worker

pub mod ifacialmocap;
pub mod pacing;

pub use ifacialmocap::{ConnectSignal, MocapClient, MocapFrame};
pub use pacing::{
    FramePacer, FrameSource, HolisticLandmarks, InferenceRequest, InferenceResult,
    InferenceWorker, PacingLoop, RequestToken,
};
