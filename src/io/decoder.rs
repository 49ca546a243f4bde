//! Barcode decode engine adapter
//!
//! The engine itself is an injected capability: it consumes a frame feed and
//! reports raw detections. Deduplication is explicitly NOT its job; the
//! scanner controller filters repeats. The adapter owns channel setup so a
//! failed engine start never leaves half-registered listeners behind.

use crate::domain::types::DetectionEvent;
use crate::io::camera::FrameFeed;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffered detections between the engine and the controller loop.
const DETECTION_BUFFER: usize = 32;

/// Buffered diagnostic samples; drained by a best-effort logger.
const DIAGNOSTIC_BUFFER: usize = 8;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine rejected its configuration (unsupported reader set, worker
    /// allocation failure). Fatal; nothing is left registered.
    #[error("decode engine init failed: {0}")]
    Init(String),
}

/// Reader configuration handed to the engine at start.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Symbologies the engine should decode, e.g. `ean_13` for JAN codes.
    pub readers: Vec<String>,
    /// Emit per-frame diagnostic samples (overlay-style visualization data,
    /// no business logic).
    pub diagnostics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { readers: vec!["ean_13".to_string(), "ean_8".to_string()], diagnostics: false }
    }
}

/// Diagnostic sample emitted per processed frame when enabled.
#[derive(Debug, Clone)]
pub struct FrameDiagnostic {
    pub stream_id: String,
    /// Candidate boxes the engine considered in this frame.
    pub candidates: usize,
}

/// External decoding capability.
///
/// Contract: `start` either fully starts continuous decoding against the
/// feed (holding the given senders for the duration) or fails without
/// retaining them. `stop` halts decoding and drops the senders; it is
/// idempotent.
#[async_trait]
pub trait BarcodeEngine: Send + Sync {
    async fn start(
        &self,
        feed: FrameFeed,
        config: &EngineConfig,
        detections: mpsc::Sender<DetectionEvent>,
        diagnostics: Option<mpsc::Sender<FrameDiagnostic>>,
    ) -> Result<(), EngineError>;

    async fn stop(&self);
}

/// Wraps the engine with channel plumbing. On a failed start the receivers
/// created here are dropped with the error, so no listener registration
/// outlives the failure.
pub struct DecodeAdapter {
    engine: Arc<dyn BarcodeEngine>,
    config: EngineConfig,
}

impl DecodeAdapter {
    pub fn new(engine: Arc<dyn BarcodeEngine>, config: EngineConfig) -> Self {
        Self { engine, config }
    }

    /// Start continuous decoding. Returns the detection receiver and, when
    /// diagnostics are enabled, the diagnostic receiver.
    pub async fn start(
        &self,
        feed: FrameFeed,
    ) -> Result<(mpsc::Receiver<DetectionEvent>, Option<mpsc::Receiver<FrameDiagnostic>>), EngineError>
    {
        let (det_tx, det_rx) = mpsc::channel(DETECTION_BUFFER);
        let (diag_tx, diag_rx) = if self.config.diagnostics {
            let (tx, rx) = mpsc::channel(DIAGNOSTIC_BUFFER);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        self.engine.start(feed, &self.config, det_tx, diag_tx).await?;
        Ok((det_rx, diag_rx))
    }

    /// Idempotent; safe to call without a preceding successful start.
    pub async fn stop(&self) {
        self.engine.stop().await;
    }
}
