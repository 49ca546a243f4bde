//! Simulated camera, surface, and decode engine for local runs and tests
//!
//! The sim devices implement the same capability traits the real hardware
//! would and honor the same contracts: the camera can deny acquisition, the
//! surface can refuse playback, the engine emits scripted detections only
//! while its frame feed is live and rolls back cleanly on init failure.

use crate::domain::types::{DetectionEvent, NormalizedRect};
use crate::io::camera::{
    CameraError, FrameFeed, MediaSource, MediaTrack, StreamConstraints, StreamHandle, VideoSurface,
};
use crate::io::decoder::{BarcodeEngine, EngineConfig, EngineError, FrameDiagnostic};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Simulated camera. Issues one video track per acquire and remembers every
/// track it ever issued so tests can check they all get stopped.
#[derive(Default)]
pub struct SimCamera {
    denied: Mutex<Option<String>>,
    acquired: AtomicU64,
    issued: Mutex<Vec<MediaTrack>>,
}

impl SimCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent acquires fail as if permission were denied.
    pub fn set_denied(&self, reason: Option<&str>) {
        *self.denied.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn acquire_count(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Tracks issued over the camera's lifetime that are still live.
    pub fn live_track_count(&self) -> usize {
        self.issued.lock().unwrap().iter().filter(|t| t.is_live()).count()
    }
}

#[async_trait]
impl MediaSource for SimCamera {
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<StreamHandle, CameraError> {
        if let Some(reason) = self.denied.lock().unwrap().clone() {
            return Err(CameraError::Unavailable(reason));
        }

        let track = MediaTrack::new("video0");
        self.issued.lock().unwrap().push(track.clone());
        self.acquired.fetch_add(1, Ordering::Relaxed);
        debug!(
            width = constraints.width_ideal,
            height = constraints.height_ideal,
            facing = constraints.facing.as_str(),
            "sim_camera_acquired"
        );
        Ok(StreamHandle::new(vec![track]))
    }
}

/// Simulated video surface.
#[derive(Default)]
pub struct SimSurface {
    refused: Mutex<Option<String>>,
    bound: AtomicBool,
    clears: AtomicU64,
}

impl SimSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent playback attempts fail (autoplay-style refusal).
    pub fn set_refused(&self, reason: Option<&str>) {
        *self.refused.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Relaxed)
    }

    pub fn clear_count(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VideoSurface for SimSurface {
    async fn begin_playback(&self, handle: &StreamHandle) -> Result<(), CameraError> {
        if let Some(reason) = self.refused.lock().unwrap().clone() {
            return Err(CameraError::Playback(reason));
        }
        self.bound.store(true, Ordering::Relaxed);
        debug!(stream_id = %handle.stream_id(), "sim_surface_playing");
        Ok(())
    }

    fn clear(&self) {
        self.bound.store(false, Ordering::Relaxed);
        self.clears.fetch_add(1, Ordering::Relaxed);
    }
}

/// One entry of the sim engine's script.
#[derive(Debug, Clone)]
pub struct ScriptedDetection {
    pub raw_value: String,
    pub region: Option<NormalizedRect>,
    /// How many consecutive frames report this value, exercising the
    /// controller's dedup.
    pub repeats: u32,
}

/// Simulated decode engine replaying a script.
///
/// The script cursor is claimed entry by entry and survives across sessions,
/// so successive scans progress through the script the way a customer works
/// through their basket.
pub struct SimEngine {
    script: Vec<ScriptedDetection>,
    interval: Duration,
    rejected: Mutex<Option<String>>,
    cursor: Arc<AtomicUsize>,
    running: Mutex<Arc<AtomicBool>>,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl SimEngine {
    pub fn new(script: Vec<ScriptedDetection>, interval: Duration) -> Self {
        Self {
            script,
            interval,
            rejected: Mutex::new(None),
            cursor: Arc::new(AtomicUsize::new(0)),
            running: Mutex::new(Arc::new(AtomicBool::new(false))),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    /// Script where every code is reported `repeats` times from the frame
    /// center.
    pub fn from_codes(codes: &[String], repeats: u32, interval: Duration) -> Self {
        let script = codes
            .iter()
            .map(|code| ScriptedDetection {
                raw_value: code.clone(),
                region: Some(NormalizedRect { x: 0.4, y: 0.45, width: 0.2, height: 0.1 }),
                repeats,
            })
            .collect();
        Self::new(script, interval)
    }

    /// Make subsequent starts fail as if the engine rejected its
    /// configuration.
    pub fn set_rejected(&self, reason: Option<&str>) {
        *self.rejected.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BarcodeEngine for SimEngine {
    async fn start(
        &self,
        feed: FrameFeed,
        config: &EngineConfig,
        detections: mpsc::Sender<DetectionEvent>,
        diagnostics: Option<mpsc::Sender<FrameDiagnostic>>,
    ) -> Result<(), EngineError> {
        if let Some(reason) = self.rejected.lock().unwrap().clone() {
            // Nothing registered yet: the senders drop with this error.
            return Err(EngineError::Init(reason));
        }

        let running = Arc::new(AtomicBool::new(true));
        *self.running.lock().unwrap() = running.clone();
        self.starts.fetch_add(1, Ordering::Relaxed);
        debug!(readers = ?config.readers, stream_id = %feed.stream_id(), "sim_engine_started");

        let script = self.script.clone();
        let interval = self.interval;
        let cursor = self.cursor.clone();
        tokio::spawn(async move {
            let mut current: Option<ScriptedDetection> = None;
            let mut remaining = 0u32;
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::Relaxed) || !feed.is_live() {
                    break;
                }
                // Claim the next entry only after the liveness check, so a
                // session that already ended never consumes one.
                if remaining == 0 {
                    let idx = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(next) = script.get(idx) else {
                        break;
                    };
                    remaining = next.repeats.max(1);
                    current = Some(next.clone());
                }
                let Some(ref entry) = current else {
                    break;
                };
                if let Some(ref diag) = diagnostics {
                    let _ = diag.try_send(FrameDiagnostic {
                        stream_id: feed.stream_id().to_string(),
                        candidates: 1,
                    });
                }
                let event = DetectionEvent {
                    raw_value: entry.raw_value.clone(),
                    region: entry.region,
                };
                if detections.send(event).await.is_err() {
                    break;
                }
                remaining -= 1;
            }
        });

        Ok(())
    }

    async fn stop(&self) {
        let was_running = self.running.lock().unwrap().swap(false, Ordering::Relaxed);
        if was_running {
            self.stops.fetch_add(1, Ordering::Relaxed);
            debug!("sim_engine_stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::camera::StreamConstraints;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_engine_emits_while_feed_live() {
        let camera = SimCamera::new();
        let handle = camera.acquire(&StreamConstraints::default()).await.unwrap();
        let engine = SimEngine::from_codes(
            &["4912345678904".to_string()],
            2,
            Duration::from_millis(5),
        );

        let (tx, mut rx) = mpsc::channel(8);
        engine.start(handle.feed(), &EngineConfig::default(), tx, None).await.unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.raw_value, "4912345678904");
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(second.raw_value, "4912345678904");
    }

    #[tokio::test]
    async fn test_engine_goes_silent_after_tracks_stop() {
        let camera = SimCamera::new();
        let handle = camera.acquire(&StreamConstraints::default()).await.unwrap();
        let engine = SimEngine::from_codes(
            &["4912345678904".to_string(), "4901234567894".to_string()],
            10,
            Duration::from_millis(5),
        );

        let (tx, mut rx) = mpsc::channel(8);
        engine.start(handle.feed(), &EngineConfig::default(), tx, None).await.unwrap();
        assert!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().is_some());

        for track in handle.tracks() {
            track.stop();
        }
        // Dead feed: the emitter exits and the channel closes.
        assert!(timeout(Duration::from_secs(1), async {
            loop {
                if rx.recv().await.is_none() {
                    break;
                }
            }
        })
        .await
        .is_ok());
    }

    #[tokio::test]
    async fn test_engine_init_failure_registers_nothing() {
        let camera = SimCamera::new();
        let handle = camera.acquire(&StreamConstraints::default()).await.unwrap();
        let engine = SimEngine::new(Vec::new(), Duration::from_millis(5));
        engine.set_rejected(Some("unsupported reader set"));

        let (tx, mut rx) = mpsc::channel::<DetectionEvent>(8);
        let result = engine.start(handle.feed(), &EngineConfig::default(), tx, None).await;

        assert!(matches!(result, Err(EngineError::Init(_))));
        assert!(!engine.is_running());
        assert_eq!(engine.start_count(), 0);
        // Sender dropped with the error: the channel reads closed.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_camera_denial() {
        let camera = SimCamera::new();
        camera.set_denied(Some("permission denied by user"));

        let result = camera.acquire(&StreamConstraints::default()).await;
        assert!(matches!(result, Err(CameraError::Unavailable(_))));
        assert_eq!(camera.acquire_count(), 0);
    }
}
