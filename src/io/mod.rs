//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `camera` - camera stream acquisition, surface binding, release
//! - `decoder` - barcode decode engine adapter
//! - `catalog` - product lookup HTTP client
//! - `checkout` - transaction submission HTTP client
//! - `sim` - simulated camera/surface/engine for local runs and tests

pub mod camera;
pub mod catalog;
pub mod checkout;
pub mod decoder;
pub mod sim;

// Re-export commonly used types
pub use camera::{CameraError, MediaSource, StreamConstraints, StreamHandle, StreamLifecycle, VideoSurface};
pub use catalog::{CatalogClient, ProductLookup};
pub use checkout::{CheckoutClient, CheckoutGateway, CheckoutOutcome, Receipt};
pub use decoder::{BarcodeEngine, DecodeAdapter, EngineConfig, EngineError};
