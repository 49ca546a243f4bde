//! Camera stream lifecycle
//!
//! A `StreamHandle` owns the tracks of one live capture session. Release
//! stops every track and clears the surface binding; the decoder's
//! `FrameFeed` shares the tracks' liveness flags, so after release no
//! further frames reach any decoder. Release is idempotent: the handle
//! lives in an `Option` slot and releasing an empty slot is a no-op.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CameraError {
    /// Permission denied or no device matched the constraints. Fatal to the
    /// session; requires an explicit restart.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    /// The surface refused to start playback (autoplay-style restriction).
    /// Surfaced, never retried automatically.
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Which camera to prefer when acquiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera, the default for scanning items held in front of the
    /// device.
    Environment,
    User,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

impl FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environment" => Ok(FacingMode::Environment),
            "user" => Ok(FacingMode::User),
            other => Err(format!("unknown facing mode '{other}'")),
        }
    }
}

/// Resolution hints and facing mode passed to `MediaSource::acquire`.
#[derive(Debug, Clone)]
pub struct StreamConstraints {
    pub width_ideal: u32,
    pub height_ideal: u32,
    pub facing: FacingMode,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self { width_ideal: 640, height_ideal: 480, facing: FacingMode::Environment }
    }
}

/// One track of an acquired stream. Stopping is terminal: a stopped track
/// never produces frames again.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(label: &str) -> Self {
        Self { label: label.to_string(), live: Arc::new(AtomicBool::new(true)) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Owned reference to an active capture session. Must be released exactly
/// once; after release it must never be read again.
#[derive(Debug)]
pub struct StreamHandle {
    stream_id: String,
    tracks: Vec<MediaTrack>,
}

impl StreamHandle {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { stream_id: Uuid::now_v7().to_string(), tracks }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }

    /// Frame source for the decode engine. Shares the tracks' liveness flags,
    /// so the feed goes dead the moment the stream is released.
    pub fn feed(&self) -> FrameFeed {
        FrameFeed { stream_id: self.stream_id.clone(), tracks: self.tracks.clone() }
    }
}

/// Frame source handed to the decode engine; live only while the stream
/// behind it is.
#[derive(Debug, Clone)]
pub struct FrameFeed {
    stream_id: String,
    tracks: Vec<MediaTrack>,
}

impl FrameFeed {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }
}

/// Camera capability. Acquiring opens a hardware resource; the caller must
/// eventually release the returned handle, including on every error path.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<StreamHandle, CameraError>;
}

/// Renderable video surface. `begin_playback` binds the stream and resolves
/// once frames are actually rendering.
#[async_trait]
pub trait VideoSurface: Send + Sync {
    async fn begin_playback(&self, handle: &StreamHandle) -> Result<(), CameraError>;

    /// Detach whatever stream is bound. Idempotent.
    fn clear(&self);
}

/// Owns acquire/bind/release around an injected media source and surface.
pub struct StreamLifecycle {
    media: Arc<dyn MediaSource>,
    surface: Arc<dyn VideoSurface>,
}

impl StreamLifecycle {
    pub fn new(media: Arc<dyn MediaSource>, surface: Arc<dyn VideoSurface>) -> Self {
        Self { media, surface }
    }

    pub async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<StreamHandle, CameraError> {
        let handle = self.media.acquire(constraints).await?;
        info!(
            stream_id = %handle.stream_id(),
            tracks = handle.tracks().len(),
            facing = constraints.facing.as_str(),
            "stream_acquired"
        );
        Ok(handle)
    }

    pub async fn bind(&self, handle: &StreamHandle) -> Result<(), CameraError> {
        self.surface.begin_playback(handle).await?;
        info!(stream_id = %handle.stream_id(), "stream_bound");
        Ok(())
    }

    /// Stop all tracks and clear the surface binding. Returns whether a live
    /// handle was actually released; releasing an empty slot is a no-op.
    pub fn release(&self, slot: &mut Option<StreamHandle>) -> bool {
        let Some(handle) = slot.take() else {
            return false;
        };
        for track in handle.tracks() {
            track.stop();
        }
        self.surface.clear();
        info!(stream_id = %handle.stream_id(), "stream_released");
        true
    }
}
