//! Register shell - consumes the scanner contract and owns the cart
//!
//! This is the presentation layer's seat at the table, minus any rendering:
//! it opens scan sessions, folds resolved products into the cart, and
//! submits the cart as a transaction. Checkout exclusivity comes from the
//! `&mut self` receiver; there is no way to run two checkouts at once.

use crate::domain::cart::Cart;
use crate::domain::types::{ProductRecord, ScanStatus, ScannerEvent};
use crate::io::checkout::{CheckoutGateway, CheckoutOutcome};
use crate::services::scanner::ScannerHandle;
use std::sync::Arc;
use tracing::{debug, info, warn};

enum ScanFlow {
    Event(Option<ScannerEvent>),
    StatusChanged(bool),
}

pub struct Register {
    scanner: ScannerHandle,
    cart: Cart,
    checkout: Arc<dyn CheckoutGateway>,
}

impl Register {
    pub fn new(scanner: ScannerHandle, checkout: Arc<dyn CheckoutGateway>) -> Self {
        Self { scanner, cart: Cart::new(), checkout }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Open a scan session and wait for one resolved product. Returns None
    /// when the session fails or ends without a read; transient errors keep
    /// the session alive and are logged only.
    pub async fn scan_item(&mut self) -> Option<ProductRecord> {
        // Discard status notifications left over from a previous session;
        // the loop below must only react to this session's transitions.
        self.scanner.status_now();
        self.scanner.start().await;

        loop {
            let flow = {
                let ScannerHandle { event_rx, status_rx, .. } = &mut self.scanner;
                tokio::select! {
                    // Events first: a resolved product may be queued right
                    // before the status flips to Stopped.
                    biased;
                    event = event_rx.recv() => ScanFlow::Event(event),
                    changed = status_rx.changed() => ScanFlow::StatusChanged(changed.is_ok()),
                }
            };

            match flow {
                ScanFlow::Event(Some(ScannerEvent::Resolved(product))) => {
                    self.cart.add(&product);
                    info!(
                        code = %product.code,
                        name = %product.name,
                        price = product.price,
                        cart_total = self.cart.total_price(),
                        "item_added"
                    );
                    return Some(product);
                }
                ScanFlow::Event(Some(ScannerEvent::Error { message, fatal })) => {
                    if fatal {
                        warn!(error = %message, "scan_failed");
                        return None;
                    }
                    debug!(error = %message, "scan_retrying");
                }
                ScanFlow::Event(None) => return None,
                ScanFlow::StatusChanged(alive) => {
                    if !alive {
                        return None;
                    }
                    if matches!(
                        self.scanner.status(),
                        ScanStatus::Stopped | ScanStatus::Failed
                    ) {
                        // A success event can still be in the queue ahead of
                        // the final status; drain once before giving up.
                        if let Ok(ScannerEvent::Resolved(product)) =
                            self.scanner.event_rx.try_recv()
                        {
                            self.cart.add(&product);
                            info!(code = %product.code, "item_added");
                            return Some(product);
                        }
                        return None;
                    }
                }
            }
        }
    }

    /// Abort the current scan session, if any.
    pub async fn cancel_scan(&self) {
        self.scanner.stop().await;
    }

    /// Submit the cart as one transaction. The cart is cleared only on a
    /// completed transaction.
    pub async fn checkout(&mut self) -> CheckoutOutcome {
        if self.cart.is_empty() {
            return CheckoutOutcome::Failed("cart is empty".to_string());
        }

        let outcome = self.checkout.submit(&self.cart).await;
        if let CheckoutOutcome::Completed(ref receipt) = outcome {
            info!(
                transaction_id = receipt.transaction_id,
                total_with_tax = receipt.total_with_tax,
                total_without_tax = receipt.total_without_tax,
                items = self.cart.items().len(),
                "register_checkout_done"
            );
            self.cart.clear();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::checkout::Receipt;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::{mpsc, watch};

    struct MockCheckout {
        calls: AtomicU64,
        succeed: bool,
    }

    #[async_trait]
    impl CheckoutGateway for MockCheckout {
        async fn submit(&self, cart: &Cart) -> CheckoutOutcome {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.succeed {
                CheckoutOutcome::Completed(Receipt {
                    transaction_id: 7,
                    total_with_tax: cart.total_price() + cart.total_price() / 10,
                    total_without_tax: cart.total_price(),
                })
            } else {
                CheckoutOutcome::Failed("register closed".to_string())
            }
        }
    }

    fn test_register(succeed: bool) -> (Register, mpsc::Sender<ScannerEvent>) {
        let (cmd_tx, _cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(ScanStatus::Idle);
        let handle = ScannerHandle { cmd_tx, status_rx, event_rx };
        let checkout = Arc::new(MockCheckout { calls: AtomicU64::new(0), succeed });
        (Register::new(handle, checkout), event_tx)
    }

    fn tea() -> ProductRecord {
        ProductRecord {
            code: "4912345678904".to_string(),
            name: "おいしーいお茶".to_string(),
            price: 150,
        }
    }

    #[tokio::test]
    async fn test_scan_item_adds_resolved_product() {
        let (mut register, event_tx) = test_register(true);
        event_tx.send(ScannerEvent::Resolved(tea())).await.unwrap();

        let product = register.scan_item().await;

        assert_eq!(product, Some(tea()));
        assert_eq!(register.cart().total_quantity(), 1);
        assert_eq!(register.cart().total_price(), 150);
    }

    #[tokio::test]
    async fn test_scan_item_survives_transient_errors() {
        let (mut register, event_tx) = test_register(true);
        event_tx
            .send(ScannerEvent::Error { message: "no product found".to_string(), fatal: false })
            .await
            .unwrap();
        event_tx.send(ScannerEvent::Resolved(tea())).await.unwrap();

        let product = register.scan_item().await;

        assert_eq!(product, Some(tea()));
    }

    #[tokio::test]
    async fn test_scan_item_gives_up_on_fatal_error() {
        let (mut register, event_tx) = test_register(true);
        event_tx
            .send(ScannerEvent::Error {
                message: "camera unavailable: permission denied".to_string(),
                fatal: true,
            })
            .await
            .unwrap();

        let product = register.scan_item().await;

        assert_eq!(product, None);
        assert!(register.cart().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_fails() {
        let (mut register, _event_tx) = test_register(true);

        let outcome = register.checkout().await;

        assert!(matches!(outcome, CheckoutOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_checkout_clears_cart_on_success() {
        let (mut register, event_tx) = test_register(true);
        event_tx.send(ScannerEvent::Resolved(tea())).await.unwrap();
        register.scan_item().await;

        let outcome = register.checkout().await;

        assert!(matches!(outcome, CheckoutOutcome::Completed(_)));
        assert!(register.cart().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_keeps_cart_on_failure() {
        let (mut register, event_tx) = test_register(false);
        event_tx.send(ScannerEvent::Resolved(tea())).await.unwrap();
        register.scan_item().await;

        let outcome = register.checkout().await;

        assert_eq!(outcome, CheckoutOutcome::Failed("register closed".to_string()));
        assert_eq!(register.cart().total_quantity(), 1);
    }
}
