//! Inference frame pacing
//!
//! Keeps exactly one frame in flight at the inference worker. A frame is
//! requested, the matching result (by request token) is awaited, and only
//! then is the next frame scheduled after the configured delay. This stops
//! the camera from queueing frames faster than inference completes.
//!
//! Results whose token does not match the outstanding request do not advance
//! pacing, but their landmarks are still forwarded: a late result is still
//! useful tracking data.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::config::{TrackingConfig, TrackingMode};
use crate::error::{FusionError, PacingError};
use crate::fusion::channels::Observation;

/// Correlates an inference request with its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the worker is asked to do with a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub token: RequestToken,
    pub mode: TrackingMode,
    pub multi_thread: bool,
}

/// Per-source channel summaries the worker derived from its landmarks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolisticLandmarks {
    #[serde(default)]
    pub face: Option<Observation>,
    #[serde(default)]
    pub pose: Option<Observation>,
    #[serde(default)]
    pub left_hand: Option<Observation>,
    #[serde(default)]
    pub right_hand: Option<Observation>,
}

/// One message back from the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub token: RequestToken,
    #[serde(default)]
    pub landmarks: Option<HolisticLandmarks>,
}

/// Fire-and-forget inference dispatch
pub trait InferenceWorker: Send {
    type Image: Send;

    fn dispatch_frame(&mut self, image: Self::Image, request: InferenceRequest);
}

/// Camera frames
pub trait FrameSource: Send {
    type Image: Send;

    /// Latest frame, or `None` if the camera has nothing yet
    fn capture(&mut self) -> Option<Self::Image>;
}

/// Pacer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// No request outstanding
    Idle,
    /// One request outstanding
    Waiting(RequestToken),
}

/// How a result affected pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Token matched; the pacer is idle again
    Accepted,
    /// Token did not match; still waiting
    Stale,
}

/// Single in-flight request state machine
#[derive(Debug)]
pub struct FramePacer {
    state: PacerState,
    next_token: u64,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePacer {
    pub fn new() -> Self {
        Self {
            state: PacerState::Idle,
            next_token: 1,
        }
    }

    pub fn state(&self) -> PacerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PacerState::Idle
    }

    /// Number of outstanding requests, never more than one
    pub fn in_flight(&self) -> usize {
        match self.state {
            PacerState::Idle => 0,
            PacerState::Waiting(_) => 1,
        }
    }

    /// Mint a token and move to `Waiting`
    pub fn begin(&mut self) -> Result<RequestToken, PacingError> {
        if let PacerState::Waiting(token) = self.state {
            return Err(PacingError::Busy(token.0));
        }
        let token = RequestToken(self.next_token);
        self.next_token += 1;
        self.state = PacerState::Waiting(token);
        Ok(token)
    }

    /// Feed a result token back
    pub fn on_result(&mut self, token: RequestToken) -> Disposition {
        match self.state {
            PacerState::Waiting(current) if current == token => {
                self.state = PacerState::Idle;
                Disposition::Accepted
            }
            _ => Disposition::Stale,
        }
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingStats {
    pub requested: u64,
    pub accepted: u64,
    pub stale: u64,
    pub forwarded: u64,
}

/// Drives a [`FramePacer`] against a frame source and an inference worker
pub struct PacingLoop<S, W> {
    source: S,
    worker: W,
    results: mpsc::Receiver<InferenceResult>,
    landmarks: mpsc::Sender<HolisticLandmarks>,
    config: TrackingConfig,
    pacer: FramePacer,
    stats: PacingStats,
}

impl<S, W> PacingLoop<S, W>
where
    S: FrameSource,
    W: InferenceWorker<Image = S::Image>,
{
    pub fn new(
        source: S,
        worker: W,
        results: mpsc::Receiver<InferenceResult>,
        landmarks: mpsc::Sender<HolisticLandmarks>,
        config: &TrackingConfig,
    ) -> Self {
        Self {
            source,
            worker,
            results,
            landmarks,
            config: config.clone(),
            pacer: FramePacer::new(),
            stats: PacingStats::default(),
        }
    }

    /// Run until shutdown, or until the worker or the landmark consumer goes away
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<PacingStats, FusionError> {
        let delay = Duration::from_millis(self.config.frame_delay_ms);
        tracing::info!(
            "Inference pacing started (mode: {:?}, delay: {:?})",
            self.config.mode,
            delay
        );

        loop {
            if self.pacer.is_idle() {
                match self.source.capture() {
                    Some(image) => {
                        let token = self.pacer.begin()?;
                        self.stats.requested += 1;
                        tracing::trace!("Dispatching frame {}", token);
                        self.worker.dispatch_frame(
                            image,
                            InferenceRequest {
                                token,
                                mode: self.config.mode,
                                multi_thread: self.config.multi_thread,
                            },
                        );
                    }
                    None => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => continue,
                            _ = shutdown.recv() => break,
                        }
                    }
                }
            }

            let result = tokio::select! {
                result = self.results.recv() => result,
                _ = shutdown.recv() => break,
            };
            let Some(result) = result else {
                tracing::warn!("Inference worker result channel closed");
                return Err(PacingError::ResultsClosed.into());
            };

            if let Some(landmarks) = result.landmarks {
                if self.landmarks.send(landmarks).await.is_err() {
                    tracing::debug!("Landmark consumer dropped, stopping pacing");
                    break;
                }
                self.stats.forwarded += 1;
            }

            match self.pacer.on_result(result.token) {
                Disposition::Accepted => {
                    self.stats.accepted += 1;
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => break,
                    }
                }
                Disposition::Stale => {
                    self.stats.stale += 1;
                    tracing::trace!("Stale inference result {}", result.token);
                }
            }
        }

        tracing::info!("Inference pacing stopped ({:?})", self.stats);
        Ok(self.stats)
    }
}
