//! Fusion engine task
//!
//! The engine is the single writer of the channel store. Producers push
//! holistic landmarks and mocap frames into its queues; it applies them in
//! arrival order, composites a movement record and publishes it to
//! subscribers. Renderers can also pull the latest record at any time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::fusion::FusionCore;
use crate::retarget::MovementRecord;
use crate::tracking::ifacialmocap::MocapFrame;
use crate::tracking::pacing::HolisticLandmarks;

const QUEUE_DEPTH: usize = 64;

/// State visible to handles
#[derive(Debug)]
struct Shared {
    /// Latest composited movement
    movement: RwLock<MovementRecord>,
    /// Movement publication
    movement_tx: broadcast::Sender<MovementRecord>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Set once the first inference result arrives
    ready: AtomicBool,
    /// Inference results carrying landmarks
    results: AtomicU64,
}

/// Owns the fusion core and its input queues
pub struct FusionEngine {
    core: FusionCore,
    landmarks_rx: mpsc::Receiver<HolisticLandmarks>,
    mocap_rx: mpsc::Receiver<MocapFrame>,
    /// Subscribed at construction so a shutdown sent before `run` is seen
    shutdown_rx: broadcast::Receiver<()>,
    shared: Arc<Shared>,
}

/// Cloneable access to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
    landmarks_tx: mpsc::Sender<HolisticLandmarks>,
    mocap_tx: mpsc::Sender<MocapFrame>,
}

impl FusionEngine {
    /// Create an engine and a handle to it; call [`FusionEngine::run`] to start
    pub fn new(config: Config) -> (Self, EngineHandle) {
        let (landmarks_tx, landmarks_rx) = mpsc::channel(QUEUE_DEPTH);
        let (mocap_tx, mocap_rx) = mpsc::channel(QUEUE_DEPTH);
        let (movement_tx, _) = broadcast::channel(QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let core = FusionCore::new(config);
        let shared = Arc::new(Shared {
            movement: RwLock::new(core.movement()),
            movement_tx,
            shutdown_tx,
            ready: AtomicBool::new(false),
            results: AtomicU64::new(0),
        });

        let engine = Self {
            core,
            landmarks_rx,
            mocap_rx,
            shutdown_rx,
            shared: Arc::clone(&shared),
        };
        let handle = EngineHandle {
            shared,
            landmarks_tx,
            mocap_tx,
        };
        (engine, handle)
    }

    /// Process events until shutdown or until every producer is gone
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            "Fusion engine started (mode: {:?}, mocap face: {})",
            self.core.config().tracking.mode,
            self.core.mocap_face()
        );

        let mut landmarks_open = true;
        let mut mocap_open = true;

        while landmarks_open || mocap_open {
            tokio::select! {
                landmarks = self.landmarks_rx.recv(), if landmarks_open => match landmarks {
                    Some(landmarks) => self.on_landmarks(landmarks).await,
                    None => landmarks_open = false,
                },
                frame = self.mocap_rx.recv(), if mocap_open => match frame {
                    Some(frame) => self.on_mocap(frame).await,
                    None => mocap_open = false,
                },
                _ = self.shutdown_rx.recv() => {
                    tracing::info!("Fusion engine shutting down");
                    return Ok(());
                }
            }
        }

        tracing::debug!("All producers closed, stopping engine");

        Ok(())
    }

    async fn on_landmarks(&mut self, landmarks: HolisticLandmarks) {
        let count = self.shared.results.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.shared.ready.swap(true, Ordering::Relaxed) {
            tracing::info!("First inference result received");
        }
        tracing::trace!("Inference result {}", count);

        if self.core.apply_holistic(&landmarks, Instant::now()) {
            self.publish().await;
        }
    }

    async fn on_mocap(&mut self, frame: MocapFrame) {
        self.core.apply_mocap_frame(&frame);
        self.publish().await;
    }

    async fn publish(&self) {
        let movement = self.core.movement();
        {
            let mut current = self.shared.movement.write().await;
            *current = movement.clone();
        }
        // No subscribers is fine
        let _ = self.shared.movement_tx.send(movement);
    }
}

impl EngineHandle {
    /// Queue for holistic results, e.g. for a [`crate::tracking::PacingLoop`]
    pub fn landmark_sender(&self) -> mpsc::Sender<HolisticLandmarks> {
        self.landmarks_tx.clone()
    }

    /// Queue for mocap frames, e.g. for a [`crate::tracking::MocapClient`]
    pub fn mocap_sender(&self) -> mpsc::Sender<MocapFrame> {
        self.mocap_tx.clone()
    }

    pub async fn submit_landmarks(&self, landmarks: HolisticLandmarks) -> Result<()> {
        self.landmarks_tx
            .send(landmarks)
            .await
            .map_err(|_| EngineError::Stopped.into())
    }

    pub async fn submit_mocap(&self, frame: MocapFrame) -> Result<()> {
        self.mocap_tx
            .send(frame)
            .await
            .map_err(|_| EngineError::Stopped.into())
    }

    /// Latest published movement record
    pub async fn movement(&self) -> MovementRecord {
        self.shared.movement.read().await.clone()
    }

    /// Subscribe to movement records as they are published
    pub fn subscribe(&self) -> broadcast::Receiver<MovementRecord> {
        self.shared.movement_tx.subscribe()
    }

    /// Whether any inference result has arrived yet
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Relaxed)
    }

    /// Number of inference results processed
    pub fn inference_results(&self) -> u64 {
        self.shared.results.load(Ordering::Relaxed)
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shared.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shared.shutdown_tx.send(());
    }
}
