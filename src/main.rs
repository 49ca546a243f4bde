//! Kiosk PoC - self-checkout scanner front end
//!
//! Headless kiosk loop: runs the barcode acquisition controller against
//! simulated camera/decoder devices, accumulates a cart, and checks out
//! against the catalog API (see the `mock_catalog` binary for a local
//! backend).
//!
//! Module structure:
//! - `domain/` - Core business types (scan states, products, cart)
//! - `io/` - External interfaces (camera, decoder, catalog, checkout)
//! - `services/` - Business logic (scanner controller, register shell)
//! - `infra/` - Infrastructure (config, metrics)

use clap::Parser;
use kiosk_poc::infra::{Config, Metrics};
use kiosk_poc::io::checkout::CheckoutClient;
use kiosk_poc::io::catalog::CatalogClient;
use kiosk_poc::io::sim::{SimCamera, SimEngine, SimSurface};
use kiosk_poc::io::CheckoutOutcome;
use kiosk_poc::services::{Register, ScannerController};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Kiosk PoC - self-checkout scanning register
#[derive(Parser, Debug)]
#[command(name = "kiosk-poc", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("kiosk-poc starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        api_base_url = %config.api_base_url(),
        api_timeout_ms = config.api_timeout_ms(),
        dedup = ?config.dedup_policy(),
        acceptance = ?config.acceptance_region(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());

    // Simulated devices scripted from config
    let sim = config.sim().clone();
    let camera = Arc::new(SimCamera::new());
    let surface = Arc::new(SimSurface::new());
    let engine = Arc::new(SimEngine::from_codes(
        &sim.codes,
        sim.repeats_per_code,
        Duration::from_millis(sim.detect_interval_ms),
    ));
    if sim.camera_denied {
        camera.set_denied(Some("permission denied by user"));
    }
    if sim.playback_blocked {
        surface.set_refused(Some("playback blocked by surface policy"));
    }
    if sim.engine_rejected {
        engine.set_rejected(Some("unsupported reader set"));
    }

    let catalog = Arc::new(CatalogClient::new(&config));
    let checkout = Arc::new(CheckoutClient::new(&config));

    // Start the scanner controller
    let (controller, handle) = ScannerController::new(
        &config,
        camera,
        surface,
        engine,
        catalog,
        metrics.clone(),
    );
    let controller_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        controller.run(controller_shutdown).await;
    });

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.summary().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Drive the register through the scripted basket
    let mut register = Register::new(handle, checkout);
    let scan_timeout = Duration::from_millis(sim.scan_timeout_ms);
    let expected_items = sim.codes.len();
    info!(expected_items, "register_open");

    for _ in 0..expected_items {
        match tokio::time::timeout(scan_timeout, register.scan_item()).await {
            Ok(Some(product)) => {
                info!(code = %product.code, "scan_cycle_complete");
            }
            Ok(None) => {
                warn!("scan_cycle_failed");
                break;
            }
            Err(_) => {
                warn!(timeout_ms = sim.scan_timeout_ms, "scan_cycle_timed_out");
                register.cancel_scan().await;
                break;
            }
        }
    }

    info!(
        items = register.cart().items().len(),
        total_quantity = register.cart().total_quantity(),
        total_price = register.cart().total_price(),
        "basket_complete"
    );

    match register.checkout().await {
        CheckoutOutcome::Completed(receipt) => {
            info!(
                transaction_id = receipt.transaction_id,
                total_with_tax = receipt.total_with_tax,
                total_without_tax = receipt.total_without_tax,
                "transaction_complete"
            );
        }
        CheckoutOutcome::Failed(message) => {
            warn!(error = %message, "transaction_failed");
        }
    }

    metrics.summary().log();
    info!("kiosk-poc shutdown complete");
    Ok(())
}
