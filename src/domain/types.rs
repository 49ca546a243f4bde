//! Shared types for the kiosk PoC

use serde::{Deserialize, Serialize};

/// Scan session status, owned and mutated exclusively by the scanner
/// controller.
///
/// Legal transitions: `Idle → Acquiring → Streaming → Decoding → Resolving →
/// Decoding` (lookup retry loop), with `Stopped` reachable from any state and
/// `Failed` from `Acquiring`, `Streaming`, or `Resolving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Idle,
    Acquiring,
    Streaming,
    Decoding,
    Resolving,
    Stopped,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Acquiring => "acquiring",
            ScanStatus::Streaming => "streaming",
            ScanStatus::Decoding => "decoding",
            ScanStatus::Resolving => "resolving",
            ScanStatus::Stopped => "stopped",
            ScanStatus::Failed => "failed",
        }
    }

    /// True while the session holds (or is about to hold) live resources.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ScanStatus::Acquiring
                | ScanStatus::Streaming
                | ScanStatus::Decoding
                | ScanStatus::Resolving
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned rectangle in normalized frame coordinates (0.0..1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One detection reported by the decode engine. Ephemeral; consecutive frames
/// routinely repeat the same value while a code is held steady.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub raw_value: String,
    pub region: Option<NormalizedRect>,
}

/// Product data returned by the catalog. Price is a non-negative integer in
/// the currency's smallest practical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub code: String,
    pub name: String,
    pub price: u32,
}

/// Outcome of a single catalog lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Success(ProductRecord),
    NotFound,
    TransportError(String),
}

/// Events surfaced by the scanner controller to its consumer.
///
/// `Resolved` fires at most once per session; the controller stops itself
/// afterwards and the caller decides whether to start a new session.
#[derive(Debug, Clone)]
pub enum ScannerEvent {
    Resolved(ProductRecord),
    Error { message: String, fatal: bool },
}

/// Suppression policy for repeated detections of the same code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DedupPolicy {
    /// Suppress a code while it equals the last accepted one. Re-triggering
    /// the same code requires a different code in between or a full
    /// stop/start.
    LastCode,
    /// Suppress the last accepted code only within the given window; after
    /// the window the same code is accepted again.
    Window(std::time::Duration),
}

/// Which detections are eligible by position in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptanceRegion {
    /// Accept detections anywhere in the frame.
    Full,
    /// Accept only detections whose region center falls inside a centered
    /// band covering the given fraction (0.0..=1.0) of each axis. Reduces
    /// false positives from items adjacent to the one being scanned.
    CenterBand(f64),
}

impl AcceptanceRegion {
    /// Detections without a bounding region always pass; the engine reported
    /// no position to filter on.
    pub fn accepts(&self, region: Option<&NormalizedRect>) -> bool {
        match (self, region) {
            (AcceptanceRegion::Full, _) => true,
            (AcceptanceRegion::CenterBand(_), None) => true,
            (AcceptanceRegion::CenterBand(fraction), Some(rect)) => {
                let lo = (1.0 - fraction) / 2.0;
                let hi = 1.0 - lo;
                let (cx, cy) = rect.center();
                cx >= lo && cx <= hi && cy >= lo && cy <= hi
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, width: f64, height: f64) -> NormalizedRect {
        NormalizedRect { x, y, width, height }
    }

    #[test]
    fn test_status_is_active() {
        assert!(ScanStatus::Acquiring.is_active());
        assert!(ScanStatus::Decoding.is_active());
        assert!(ScanStatus::Resolving.is_active());
        assert!(!ScanStatus::Idle.is_active());
        assert!(!ScanStatus::Stopped.is_active());
        assert!(!ScanStatus::Failed.is_active());
    }

    #[test]
    fn test_full_region_accepts_everything() {
        let policy = AcceptanceRegion::Full;
        assert!(policy.accepts(None));
        assert!(policy.accepts(Some(&rect(0.0, 0.0, 0.05, 0.05))));
    }

    #[test]
    fn test_center_band_accepts_centered_detection() {
        let policy = AcceptanceRegion::CenterBand(0.5);
        assert!(policy.accepts(Some(&rect(0.4, 0.4, 0.2, 0.2))));
    }

    #[test]
    fn test_center_band_rejects_edge_detection() {
        let policy = AcceptanceRegion::CenterBand(0.5);
        assert!(!policy.accepts(Some(&rect(0.0, 0.4, 0.1, 0.2))));
        assert!(!policy.accepts(Some(&rect(0.4, 0.9, 0.2, 0.1))));
    }

    #[test]
    fn test_center_band_without_region_passes() {
        let policy = AcceptanceRegion::CenterBand(0.3);
        assert!(policy.accepts(None));
    }
}
