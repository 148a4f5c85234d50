//! iFacialMocap UDP client
//!
//! iFacialMocap streams ARKit face data from an iPhone as pipe-delimited ASCII
//! text. Streaming starts once the phone receives a fixed handshake string on
//! the same port we listen on:
//!
//! ```text
//! mouthSmile_L-35|eyeBlink_R-2|...|=head#-4.1,12.0,1.5,0.01,-0.02,0.3|rightEye#2.1,3.0,0.0|leftEye#...
//! ```
//!
//! Blendshapes are `name-value` with values in 0–100, head rotation is in
//! degrees and translation in meters.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::config::MocapConfig;
use crate::error::TransportError;
use crate::fusion::channels::Observation;

/// Handshake that asks the phone to start streaming
pub const HANDSHAKE: &str = "iFacialMocap_sahuasouryya9218sauhuiayeta91555dy3719";

/// Receive buffer size
const MAX_DATAGRAM: usize = 65536;

/// Raw payloads logged at debug level after connecting
const RAW_LOG_LIMIT: usize = 5;

const HEAD_PREFIX: &str = "=head#";
const RIGHT_EYE_PREFIX: &str = "rightEye#";
const LEFT_EYE_PREFIX: &str = "leftEye#";

const HEAD_KEYS: [&str; 6] = [
    blendshapes::HEAD_PITCH,
    blendshapes::HEAD_YAW,
    blendshapes::HEAD_ROLL,
    blendshapes::HEAD_X,
    blendshapes::HEAD_Y,
    blendshapes::HEAD_Z,
];
const RIGHT_EYE_KEYS: [&str; 3] = ["rightEyeRotX", "rightEyeRotY", "rightEyeRotZ"];
const LEFT_EYE_KEYS: [&str; 3] = ["leftEyeRotX", "leftEyeRotY", "leftEyeRotZ"];

/// Parse one iFacialMocap payload into a channel map.
///
/// Never fails: unknown or malformed segments are dropped and the rest of
/// the payload still comes through.
pub fn parse_payload(payload: &str) -> Observation {
    let mut out = Observation::new();

    for segment in payload.split('|') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        if let Some(rest) = segment.strip_prefix(HEAD_PREFIX) {
            assign_vector(&mut out, rest, &HEAD_KEYS);
        } else if let Some(rest) = segment.strip_prefix(RIGHT_EYE_PREFIX) {
            assign_vector(&mut out, rest, &RIGHT_EYE_KEYS);
        } else if let Some(rest) = segment.strip_prefix(LEFT_EYE_PREFIX) {
            assign_vector(&mut out, rest, &LEFT_EYE_KEYS);
        } else if let Some((name, value)) = segment.rsplit_once('-') {
            // Split on the last dash so the numeric suffix is always the value
            match value.trim().parse::<f32>() {
                Ok(v) if !name.is_empty() && v.is_finite() => {
                    out.insert(name.to_string(), v);
                }
                _ => tracing::trace!("Dropping malformed iFacialMocap segment: {}", segment),
            }
        } else {
            tracing::trace!("Dropping iFacialMocap segment without value: {}", segment);
        }
    }

    out
}

/// Assign comma-separated floats to `keys`, only if enough components exist
fn assign_vector(out: &mut Observation, values: &str, keys: &[&str]) {
    let parts: Vec<&str> = values.split(',').collect();
    if parts.len() < keys.len() {
        tracing::trace!("Dropping short iFacialMocap vector: {}", values);
        return;
    }
    for (key, part) in keys.iter().zip(parts) {
        if let Some(v) = part.trim().parse::<f32>().ok().filter(|v| v.is_finite()) {
            out.insert((*key).to_string(), v);
        }
    }
}

/// One received datagram, after merging into the client's face data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MocapFrame {
    /// Channels carried by this datagram
    pub changed: Observation,
    /// Full face data after merging `changed`
    pub face: Observation,
}

/// Resolves once per connection attempt: `Ok` on the first datagram,
/// `Err` on a transport failure.
#[derive(Debug)]
pub struct ConnectSignal {
    rx: oneshot::Receiver<Result<(), TransportError>>,
}

impl ConnectSignal {
    /// Wait for the outcome of the connection attempt
    pub async fn wait(self) -> Result<(), TransportError> {
        self.rx.await.unwrap_or(Err(TransportError::Closed))
    }
}

/// Fire the connect signal if it has not fired yet
fn notify(signal: &mut Option<oneshot::Sender<Result<(), TransportError>>>, outcome: Result<(), TransportError>) {
    if let Some(tx) = signal.take() {
        let _ = tx.send(outcome);
    }
}

/// iFacialMocap client: owns the socket task and the merged face data
pub struct MocapClient {
    config: MocapConfig,
    frames: mpsc::Sender<MocapFrame>,
    face_data: Arc<RwLock<Observation>>,
    connected: Arc<AtomicBool>,
    session: Option<JoinHandle<()>>,
    /// Aborted session that may still hold the port
    stopping: Option<JoinHandle<()>>,
}

impl MocapClient {
    /// Create a client that forwards every parsed datagram to `frames`
    pub fn new(config: &MocapConfig, frames: mpsc::Sender<MocapFrame>) -> Self {
        Self {
            config: config.clone(),
            frames,
            face_data: Arc::new(RwLock::new(Observation::new())),
            connected: Arc::new(AtomicBool::new(false)),
            session: None,
            stopping: None,
        }
    }

    /// Connect to the configured address and port
    pub fn connect_configured(&mut self) -> Option<ConnectSignal> {
        let address = self.config.address?;
        Some(self.connect(address, self.config.port))
    }

    /// Listen on `port` and ask the phone at `address` to start streaming.
    ///
    /// Must be called from within a tokio runtime. Any previous session is
    /// disconnected first, and the new one binds only after it has released
    /// its socket.
    pub fn connect(&mut self, address: IpAddr, port: u16) -> ConnectSignal {
        self.disconnect();
        let previous = self.stopping.take();

        let (tx, rx) = oneshot::channel();
        let session = Session {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            target: SocketAddr::new(address, port),
            frames: self.frames.clone(),
            face_data: Arc::clone(&self.face_data),
            connected: Arc::clone(&self.connected),
        };
        self.session = Some(tokio::spawn(session.run(tx, previous)));

        ConnectSignal { rx }
    }

    /// Stop listening. Safe to call when not connected.
    ///
    /// Face data already merged is kept so the avatar holds its last pose.
    pub fn disconnect(&mut self) {
        if let Some(task) = self.session.take() {
            task.abort();
            self.stopping = Some(task);
            self.connected.store(false, Ordering::Relaxed);
            tracing::info!("iFacialMocap client disconnected");
        }
    }

    /// Whether the socket is bound and listening
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Merged face data received so far
    pub async fn face_data(&self) -> Observation {
        self.face_data.read().await.clone()
    }
}

impl Drop for MocapClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// State moved into the socket task
struct Session {
    bind_addr: SocketAddr,
    target: SocketAddr,
    frames: mpsc::Sender<MocapFrame>,
    face_data: Arc<RwLock<Observation>>,
    connected: Arc<AtomicBool>,
}

impl Session {
    async fn run(
        self,
        signal: oneshot::Sender<Result<(), TransportError>>,
        previous: Option<JoinHandle<()>>,
    ) {
        let mut signal = Some(signal);

        // The aborted session drops its socket when its task is torn down
        if let Some(previous) = previous {
            let _ = previous.await;
        }

        let socket = match UdpSocket::bind(self.bind_addr).await {
            Ok(s) => s,
            Err(e) => {
                let err = TransportError::Bind {
                    addr: self.bind_addr.to_string(),
                    message: e.to_string(),
                };
                tracing::error!("iFacialMocap socket error: {}", err);
                notify(&mut signal, Err(err));
                return;
            }
        };

        tracing::info!("iFacialMocap client listening on {}", self.bind_addr);
        self.connected.store(true, Ordering::Relaxed);

        if let Err(e) = socket.send_to(HANDSHAKE.as_bytes(), self.target).await {
            let err = TransportError::Send {
                addr: self.target.to_string(),
                message: e.to_string(),
            };
            tracing::error!("iFacialMocap socket error: {}", err);
            self.connected.store(false, Ordering::Relaxed);
            notify(&mut signal, Err(err));
            return;
        }
        tracing::debug!("Sent iFacialMocap handshake to {}", self.target);

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut logged = 0;

        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    let payload = String::from_utf8_lossy(&buf[..len]);
                    if logged < RAW_LOG_LIMIT {
                        tracing::debug!("iFacialMocap raw payload from {}: {}", from, payload);
                        logged += 1;
                    }

                    let changed = parse_payload(&payload);
                    let face = {
                        let mut data = self.face_data.write().await;
                        data.extend(changed.iter().map(|(k, v)| (k.clone(), *v)));
                        data.clone()
                    };

                    notify(&mut signal, Ok(()));

                    if self.frames.send(MocapFrame { changed, face }).await.is_err() {
                        tracing::debug!("iFacialMocap frame receiver dropped, stopping");
                        break;
                    }
                }
                Err(e) => {
                    let err = TransportError::Receive(e.to_string());
                    tracing::error!("iFacialMocap socket error: {}", err);
                    notify(&mut signal, Err(err));
                    break;
                }
            }
        }

        self.connected.store(false, Ordering::Relaxed);
    }
}

/// iFacialMocap channel names
pub mod blendshapes {
    pub const HEAD_PITCH: &str = "headPitch";
    pub const HEAD_YAW: &str = "headYaw";
    pub const HEAD_ROLL: &str = "headRoll";
    pub const HEAD_X: &str = "headX";
    pub const HEAD_Y: &str = "headY";
    pub const HEAD_Z: &str = "headZ";

    pub const EYE_BLINK_L: &str = "eyeBlink_L";
    pub const EYE_BLINK_R: &str = "eyeBlink_R";
    pub const EYE_LOOK_IN_L: &str = "eyeLookIn_L";
    pub const EYE_LOOK_IN_R: &str = "eyeLookIn_R";
    pub const EYE_LOOK_OUT_L: &str = "eyeLookOut_L";
    pub const EYE_LOOK_OUT_R: &str = "eyeLookOut_R";
    pub const EYE_LOOK_UP_L: &str = "eyeLookUp_L";
    pub const EYE_LOOK_UP_R: &str = "eyeLookUp_R";
    pub const EYE_LOOK_DOWN_L: &str = "eyeLookDown_L";
    pub const EYE_LOOK_DOWN_R: &str = "eyeLookDown_R";

    pub const JAW_OPEN: &str = "jawOpen";
    pub const MOUTH_FUNNEL: &str = "mouthFunnel";
    pub const MOUTH_PUCKER: &str = "mouthPucker";
    pub const MOUTH_STRETCH_L: &str = "mouthStretch_L";
    pub const MOUTH_STRETCH_R: &str = "mouthStretch_R";
    pub const MOUTH_SMILE_L: &str = "mouthSmile_L";
    pub const MOUTH_SMILE_R: &str = "mouthSmile_R";
    pub const MOUTH_FROWN_L: &str = "mouthFrown_L";
    pub const MOUTH_FROWN_R: &str = "mouthFrown_R";
    pub const MOUTH_DIMPLE_L: &str = "mouthDimple_L";
    pub const MOUTH_DIMPLE_R: &str = "mouthDimple_R";
    pub const MOUTH_PRESS_L: &str = "mouthPress_L";
    pub const MOUTH_PRESS_R: &str = "mouthPress_R";
    pub const MOUTH_SHRUG_LOWER: &str = "mouthShrugLower";
    pub const MOUTH_SHRUG_UPPER: &str = "mouthShrugUpper";
    pub const MOUTH_ROLL_LOWER: &str = "mouthRollLower";
    pub const MOUTH_ROLL_UPPER: &str = "mouthRollUpper";
    pub const TONGUE_OUT: &str = "tongueOut";

    pub const BROW_INNER_UP: &str = "browInnerUp";
    pub const BROW_OUTER_UP_L: &str = "browOuterUp_L";
    pub const BROW_OUTER_UP_R: &str = "browOuterUp_R";
    pub const BROW_DOWN_L: &str = "browDown_L";
    pub const BROW_DOWN_R: &str = "browDown_R";

    pub const CHEEK_PUFF: &str = "cheekPuff";
    pub const CHEEK_SQUINT_L: &str = "cheekSquint_L";
    pub const CHEEK_SQUINT_R: &str = "cheekSquint_R";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_handshake_is_51_bytes() {
        assert_eq!(HANDSHAKE.len(), 51);
        assert!(HANDSHAKE.is_ascii());
    }

    #[test]
    fn test_parse_head_blendshape_and_eye() {
        let data =
            parse_payload("=head#1.0,2.0,3.0,0.1,0.2,0.3|browInnerUp-50|rightEye#0.1,0.2,0.3");

        let expect = [
            ("headPitch", 1.0),
            ("headYaw", 2.0),
            ("headRoll", 3.0),
            ("headX", 0.1),
            ("headY", 0.2),
            ("headZ", 0.3),
            ("browInnerUp", 50.0),
            ("rightEyeRotX", 0.1),
            ("rightEyeRotY", 0.2),
            ("rightEyeRotZ", 0.3),
        ];
        assert_eq!(data.len(), expect.len());
        for (key, value) in expect {
            assert!((data[key] - value).abs() < 1e-6, "{} = {}", key, data[key]);
        }
    }

    #[test]
    fn test_segment_without_dash_is_dropped() {
        let data = parse_payload("jawOpen-12|badsegmentnodash|leftEye#4,5,6");
        assert_eq!(data.len(), 4);
        assert_eq!(data["jawOpen"], 12.0);
        assert_eq!(data["leftEyeRotZ"], 6.0);
    }

    #[test]
    fn test_splits_on_last_dash() {
        let data = parse_payload("some-odd-name-40");
        assert_eq!(data.get("some-odd-name"), Some(&40.0));
    }

    #[test]
    fn test_malformed_segments_degrade_to_partial_data() {
        let data = parse_payload("|mouthPucker-abc||=head#1,2,3|rightEye#1,x,3|cheekPuff-7|-5");
        assert_eq!(data.len(), 3);
        assert_eq!(data["cheekPuff"], 7.0);
        assert_eq!(data["rightEyeRotX"], 1.0);
        assert!(!data.contains_key("rightEyeRotY"));
        assert_eq!(data["rightEyeRotZ"], 3.0);
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let data = parse_payload("jawOpen-inf|mouthPucker-NaN|cheekPuff--infinity|=head#inf,1,2,3,4,5|tongueOut-3");
        assert_eq!(data.len(), 6);
        assert!(!data.contains_key("jawOpen"));
        assert!(!data.contains_key("mouthPucker"));
        assert!(!data.contains_key("cheekPuff"));
        assert!(!data.contains_key("headPitch"));
        assert_eq!(data["headYaw"], 1.0);
        assert!(data.values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_parse_handshake_echo_yields_nothing() {
        assert!(parse_payload(HANDSHAKE).is_empty());
    }

    fn free_port() -> u16 {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_receives_and_merges_datagrams() {
        let port = free_port();
        let (tx, mut rx) = mpsc::channel(16);
        let mut client = MocapClient::new(&MocapConfig::default(), tx);
        let signal = client.connect("127.0.0.1".parse().unwrap(), port);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = SocketAddr::from(([127, 0, 0, 1], port));

        // The client may still be binding; resend until a frame with data arrives
        let frame = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                sender.send_to(b"jawOpen-40|eyeBlink_L-10", target).await.unwrap();
                match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
                    Ok(Some(frame)) if !frame.changed.is_empty() => break frame,
                    _ => continue,
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(frame.changed["jawOpen"], 40.0);
        assert_eq!(signal.wait().await, Ok(()));
        assert!(client.is_connected());

        sender.send_to(b"jawOpen-5", target).await.unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(frame) = rx.recv().await {
                    if frame.changed.get("jawOpen") == Some(&5.0) {
                        break frame;
                    }
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(frame.changed.len(), 1);
        assert_eq!(frame.face["eyeBlink_L"], 10.0);

        client.disconnect();
        assert!(!client.is_connected());
        client.disconnect();
        assert_eq!(client.face_data().await["jawOpen"], 5.0);
    }

    #[tokio::test]
    async fn test_bind_failure_reports_once() {
        let blocker = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let (tx, _rx) = mpsc::channel(4);
        let mut client = MocapClient::new(&MocapConfig::default(), tx);
        let signal = client.connect("127.0.0.1".parse().unwrap(), port);

        let outcome = tokio::time::timeout(Duration::from_secs(5), signal.wait())
            .await
            .unwrap();
        assert!(matches!(outcome, Err(TransportError::Bind { .. })));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_before_data_closes_signal() {
        let (tx, _rx) = mpsc::channel(4);
        let mut client = MocapClient::new(&MocapConfig::default(), tx);
        let signal = client.connect("127.0.0.1".parse().unwrap(), free_port());
        client.disconnect();
        let outcome = tokio::time::timeout(Duration::from_secs(5), signal.wait())
            .await
            .unwrap();
        // Either the abort won (Closed) or the handshake echo already arrived
        assert!(matches!(outcome, Err(TransportError::Closed) | Ok(())));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reconnect_on_same_port_rebinds() {
        let port = free_port();
        let address: IpAddr = "127.0.0.1".parse().unwrap();
        let (tx, mut rx) = mpsc::channel(1024);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let mut client = MocapClient::new(&MocapConfig::default(), tx);

        for _ in 0..100 {
            let _first = client.connect(address, port);
            tokio::time::sleep(Duration::from_millis(5)).await;
            let second = client.connect(address, port);
            // The handshake loops back to our own socket once it is bound
            let outcome = tokio::time::timeout(Duration::from_secs(5), second.wait())
                .await
                .unwrap();
            assert_eq!(outcome, Ok(()));
        }

        client.disconnect();
        drop(client);
        drain.await.unwrap();
    }

    #[test]
    fn test_connect_configured_needs_address() {
        let (tx, _rx) = mpsc::channel(1);
        let mut client = MocapClient::new(&MocapConfig::default(), tx);
        assert!(client.connect_configured().is_none());
    }
}
