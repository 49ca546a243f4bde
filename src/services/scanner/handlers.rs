//! Session handlers for the ScannerController
//!
//! Each handler drives one kind of input through the state machine: start
//! and stop commands, detections from the decode engine, and lookup
//! completions. Every failing path releases the stream before surfacing the
//! error.

use super::ScannerController;
use crate::domain::types::{DedupPolicy, DetectionEvent, LookupOutcome, ScanStatus, ScannerEvent};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

impl ScannerController {
    /// Start a scan session: acquire the camera, bind it to the surface,
    /// start the decode engine. Returns the detection receiver for the new
    /// session, or None when the session failed (status is then `Failed`
    /// and no stream is held).
    pub(crate) async fn handle_start(
        &mut self,
    ) -> Option<mpsc::Receiver<DetectionEvent>> {
        if self.status.is_active() {
            // One live stream at a time: tear the previous session down
            // before acquiring again.
            self.handle_stop().await;
        }

        self.metrics.record_session_started();
        self.last_error = None;
        self.last_accepted_code = None;
        self.last_accepted_at = None;
        self.set_status(ScanStatus::Acquiring);

        let handle = match self.lifecycle.acquire(&self.constraints).await {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(e.to_string());
                return None;
            }
        };
        self.metrics.record_stream_acquired();
        self.stream = Some(handle);
        self.set_status(ScanStatus::Streaming);

        let bound = match self.stream.as_ref() {
            Some(handle) => self.lifecycle.bind(handle).await,
            None => return None,
        };
        if let Err(e) = bound {
            self.release_stream();
            self.fail(e.to_string());
            return None;
        }

        let feed = self.stream.as_ref()?.feed();
        match self.decoder.start(feed).await {
            Ok((det_rx, diag_rx)) => {
                if let Some(mut diag) = diag_rx {
                    // Visualization hook only; drained so the engine never
                    // blocks on it.
                    tokio::spawn(async move {
                        while let Some(sample) = diag.recv().await {
                            debug!(
                                stream_id = %sample.stream_id,
                                candidates = sample.candidates,
                                "frame_processed"
                            );
                        }
                    });
                }
                self.set_status(ScanStatus::Decoding);
                Some(det_rx)
            }
            Err(e) => {
                // The adapter guarantees nothing stayed registered.
                self.release_stream();
                self.fail(e.to_string());
                None
            }
        }
    }

    /// Halt decoding, release the stream, clear the dedup state. Idempotent
    /// and safe from any state.
    pub(crate) async fn handle_stop(&mut self) {
        self.decoder.stop().await;
        self.release_stream();
        self.last_accepted_code = None;
        self.last_accepted_at = None;
        if self.status != ScanStatus::Stopped {
            self.metrics.record_session_stopped();
            self.set_status(ScanStatus::Stopped);
        }
    }

    /// One detection from the engine. Only acted on while `Decoding`; a
    /// late event after stop, or one racing an in-flight lookup, is a no-op.
    pub(crate) fn handle_detection(&mut self, detection: DetectionEvent) {
        self.metrics.record_detection();

        if self.status != ScanStatus::Decoding {
            self.metrics.record_detection_stale();
            debug!(status = %self.status, "detection_ignored_inactive");
            return;
        }

        let code = detection.raw_value.trim();
        if code.is_empty() {
            self.metrics.record_detection_empty();
            debug!("detection_ignored_empty");
            return;
        }

        if !self.acceptance.accepts(detection.region.as_ref()) {
            self.metrics.record_detection_off_center();
            debug!(code = %code, "detection_ignored_off_center");
            return;
        }

        if self.is_duplicate(code) {
            self.metrics.record_detection_deduped();
            debug!(code = %code, "detection_deduped");
            return;
        }

        self.last_accepted_code = Some(code.to_string());
        self.last_accepted_at = Some(Instant::now());
        self.set_status(ScanStatus::Resolving);
        self.begin_lookup(code.to_string());
    }

    /// A lookup completion. Stale results (stopped session, superseded
    /// sequence) are discarded.
    pub(crate) async fn handle_lookup_result(&mut self, seq: u64, outcome: LookupOutcome) {
        if self.status != ScanStatus::Resolving || seq != self.lookup_seq {
            debug!(seq, status = %self.status, "lookup_result_discarded");
            return;
        }

        match outcome {
            LookupOutcome::Success(product) => {
                self.metrics.record_product_resolved();
                info!(
                    code = %product.code,
                    name = %product.name,
                    price = product.price,
                    "product_resolved"
                );
                self.emit(ScannerEvent::Resolved(product));
                // No auto-resume after a successful read; the caller decides
                // whether to start a new session.
                self.handle_stop().await;
            }
            LookupOutcome::NotFound => {
                self.metrics.record_lookup_not_found();
                let code = self.last_accepted_code.take().unwrap_or_default();
                self.last_accepted_at = None;
                warn!(code = %code, "product_not_found");
                self.emit(ScannerEvent::Error {
                    message: format!("no product found for code {code}"),
                    fatal: false,
                });
                self.set_status(ScanStatus::Decoding);
            }
            LookupOutcome::TransportError(message) => {
                self.metrics.record_lookup_failed();
                self.last_accepted_code = None;
                self.last_accepted_at = None;
                warn!(error = %message, "lookup_failed");
                self.emit(ScannerEvent::Error { message, fatal: false });
                self.set_status(ScanStatus::Decoding);
            }
        }
    }

    fn is_duplicate(&self, code: &str) -> bool {
        let Some(last) = self.last_accepted_code.as_deref() else {
            return false;
        };
        if last != code {
            return false;
        }
        match self.dedup {
            DedupPolicy::LastCode => true,
            DedupPolicy::Window(window) => {
                self.last_accepted_at.map(|at| at.elapsed() < window).unwrap_or(false)
            }
        }
    }

    fn begin_lookup(&mut self, code: String) {
        self.lookup_seq += 1;
        let seq = self.lookup_seq;
        self.metrics.record_lookup_started();
        info!(code = %code, seq, "lookup_started");

        let lookup = self.lookup.clone();
        let result_tx = self.lookup_tx.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = lookup.resolve(&code).await;
            metrics.record_lookup_latency(started.elapsed().as_micros() as u64);
            if result_tx.send((seq, outcome)).await.is_err() {
                debug!(seq, "lookup_result_dropped_controller_gone");
            }
        });
    }

    fn fail(&mut self, message: String) {
        self.metrics.record_session_failed();
        error!(error = %message, "scan_session_failed");
        self.last_error = Some(message.clone());
        self.set_status(ScanStatus::Failed);
        self.emit(ScannerEvent::Error { message, fatal: true });
    }

    fn release_stream(&mut self) {
        if self.lifecycle.release(&mut self.stream) {
            self.metrics.record_stream_released();
        }
    }
}
