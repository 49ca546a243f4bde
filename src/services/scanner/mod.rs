//! Barcode acquisition controller
//!
//! The ScannerController is the single owner of the scan session state
//! machine. It coordinates:
//! - Stream lifecycle (camera acquire, surface bind, release)
//! - Decode engine start/stop and detection intake
//! - Detection filtering (empty codes, acceptance region, dedup)
//! - Product lookups (at most one in flight, stale results discarded)
//!
//! Everything flows through one `run()` loop; commands, detections and
//! lookup results are delivered over channels and handled by methods that
//! mutate the controller exclusively. A detection or lookup completion that
//! arrives after `stop()` is a no-op, decided by the session status.

mod handlers;

use crate::domain::types::{
    AcceptanceRegion, DedupPolicy, DetectionEvent, LookupOutcome, ScanStatus, ScannerEvent,
};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::camera::{MediaSource, StreamConstraints, StreamHandle, StreamLifecycle, VideoSurface};
use crate::io::catalog::ProductLookup;
use crate::io::decoder::{BarcodeEngine, DecodeAdapter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const COMMAND_BUFFER: usize = 8;
const EVENT_BUFFER: usize = 16;
const LOOKUP_BUFFER: usize = 8;

/// Commands accepted from the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerCommand {
    Start,
    Stop,
}

/// The shell's side of the controller contract: send commands, watch the
/// status, consume events.
pub struct ScannerHandle {
    pub(crate) cmd_tx: mpsc::Sender<ScannerCommand>,
    pub(crate) status_rx: watch::Receiver<ScanStatus>,
    pub(crate) event_rx: mpsc::Receiver<ScannerEvent>,
}

impl ScannerHandle {
    pub async fn start(&self) {
        if self.cmd_tx.send(ScannerCommand::Start).await.is_err() {
            warn!("scanner_controller_gone");
        }
    }

    pub async fn stop(&self) {
        if self.cmd_tx.send(ScannerCommand::Stop).await.is_err() {
            warn!("scanner_controller_gone");
        }
    }

    pub fn status(&self) -> ScanStatus {
        *self.status_rx.borrow()
    }

    /// Current status, consuming any pending change notification so the
    /// next `status_changed` waits for a fresh transition.
    pub fn status_now(&mut self) -> ScanStatus {
        *self.status_rx.borrow_and_update()
    }

    /// Wait for the next status transition. Returns false once the
    /// controller is gone.
    pub async fn status_changed(&mut self) -> bool {
        self.status_rx.changed().await.is_ok()
    }

    pub async fn next_event(&mut self) -> Option<ScannerEvent> {
        self.event_rx.recv().await
    }
}

/// Single-owner state machine for one scan session at a time.
pub struct ScannerController {
    pub(crate) status: ScanStatus,
    pub(crate) stream: Option<StreamHandle>,
    pub(crate) last_accepted_code: Option<String>,
    pub(crate) last_accepted_at: Option<Instant>,
    pub(crate) last_error: Option<String>,
    /// Identifies the in-flight lookup; results with another sequence are
    /// stale and discarded.
    pub(crate) lookup_seq: u64,
    pub(crate) constraints: StreamConstraints,
    pub(crate) dedup: DedupPolicy,
    pub(crate) acceptance: AcceptanceRegion,
    pub(crate) lifecycle: StreamLifecycle,
    pub(crate) decoder: DecodeAdapter,
    pub(crate) lookup: Arc<dyn ProductLookup>,
    pub(crate) metrics: Arc<Metrics>,
    status_tx: watch::Sender<ScanStatus>,
    event_tx: mpsc::Sender<ScannerEvent>,
    pub(crate) lookup_tx: mpsc::Sender<(u64, LookupOutcome)>,
    cmd_rx: Option<mpsc::Receiver<ScannerCommand>>,
    pub(crate) lookup_rx: Option<mpsc::Receiver<(u64, LookupOutcome)>>,
}

impl ScannerController {
    pub fn new(
        config: &Config,
        media: Arc<dyn MediaSource>,
        surface: Arc<dyn VideoSurface>,
        engine: Arc<dyn BarcodeEngine>,
        lookup: Arc<dyn ProductLookup>,
        metrics: Arc<Metrics>,
    ) -> (Self, ScannerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (status_tx, status_rx) = watch::channel(ScanStatus::Idle);
        let (lookup_tx, lookup_rx) = mpsc::channel(LOOKUP_BUFFER);

        let controller = Self {
            status: ScanStatus::Idle,
            stream: None,
            last_accepted_code: None,
            last_accepted_at: None,
            last_error: None,
            lookup_seq: 0,
            constraints: config.stream_constraints(),
            dedup: config.dedup_policy(),
            acceptance: config.acceptance_region(),
            lifecycle: StreamLifecycle::new(media, surface),
            decoder: DecodeAdapter::new(engine, config.engine_config()),
            lookup,
            metrics,
            status_tx,
            event_tx,
            lookup_tx,
            cmd_rx: Some(cmd_rx),
            lookup_rx: Some(lookup_rx),
        };

        (controller, ScannerHandle { cmd_tx, status_rx, event_rx })
    }

    /// Consume commands, detections, and lookup results until the command
    /// channel closes or shutdown fires. Resources are torn down on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        // run() consumes self; the receivers are taken exactly once.
        let mut cmd_rx = self.cmd_rx.take().expect("scanner run() called twice");
        let mut lookup_rx = self.lookup_rx.take().expect("scanner run() called twice");
        let mut detections: Option<mpsc::Receiver<DetectionEvent>> = None;

        info!("scanner_controller_started");
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(ScannerCommand::Start) => detections = self.handle_start().await,
                    Some(ScannerCommand::Stop) => {
                        self.handle_stop().await;
                        detections = None;
                    }
                    None => break,
                },
                maybe_detection = async {
                    match detections.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => None,
                    }
                }, if detections.is_some() => {
                    match maybe_detection {
                        Some(detection) => self.handle_detection(detection),
                        // Engine dropped its sender; the session decides what
                        // that means, we just stop polling.
                        None => detections = None,
                    }
                },
                result = lookup_rx.recv() => match result {
                    Some((seq, outcome)) => self.handle_lookup_result(seq, outcome).await,
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("scanner_shutdown");
                    break;
                }
            }
        }

        self.handle_stop().await;
        info!("scanner_controller_stopped");
    }

    pub(crate) fn set_status(&mut self, next: ScanStatus) {
        if self.status == next {
            return;
        }
        info!(from = %self.status, to = %next, "scan_status_changed");
        self.status = next;
        self.status_tx.send_replace(next);
    }

    pub(crate) fn emit(&self, event: ScannerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("scanner_event_dropped");
        }
    }
}
