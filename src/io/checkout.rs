//! Checkout transaction client
//!
//! Posts the cart as a transaction: `POST /transactions` with the item
//! lines, returning totals with and without tax plus a transaction id. The
//! payment processing behind the endpoint is opaque to the kiosk.

use crate::domain::cart::Cart;
use crate::infra::config::Config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Receipt for a completed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_id: i64,
    pub total_with_tax: u64,
    pub total_without_tax: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Completed(Receipt),
    Failed(String),
}

/// Single opaque remote call: the kiosk only distinguishes completed from
/// failed-with-message.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn submit(&self, cart: &Cart) -> CheckoutOutcome;
}

#[derive(Debug, Serialize)]
struct TransactionItem {
    prd_code: String,
    prd_name: String,
    prd_price: u32,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    items: Vec<TransactionItem>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    success: bool,
    #[serde(default)]
    trd_id: i64,
    #[serde(default)]
    total_amt: u64,
    #[serde(default)]
    ttl_amt_ex_tax: u64,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    detail: Option<String>,
}

fn build_request(cart: &Cart) -> TransactionRequest {
    TransactionRequest {
        items: cart
            .items()
            .iter()
            .map(|item| TransactionItem {
                prd_code: item.code.clone(),
                prd_name: item.name.clone(),
                prd_price: item.price,
                quantity: item.quantity,
            })
            .collect(),
    }
}

fn map_response(response: TransactionResponse) -> CheckoutOutcome {
    if response.success {
        CheckoutOutcome::Completed(Receipt {
            transaction_id: response.trd_id,
            total_with_tax: response.total_amt,
            total_without_tax: response.ttl_amt_ex_tax,
        })
    } else {
        CheckoutOutcome::Failed(
            response.message.unwrap_or_else(|| "transaction rejected by backend".to_string()),
        )
    }
}

pub struct CheckoutClient {
    base_url: String,
    client: reqwest::Client,
}

impl CheckoutClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms()))
            .build()
            .unwrap_or_default();
        Self { base_url: config.api_base_url().to_string(), client }
    }
}

#[async_trait]
impl CheckoutGateway for CheckoutClient {
    async fn submit(&self, cart: &Cart) -> CheckoutOutcome {
        let url = format!("{}/transactions", self.base_url);
        let request = build_request(cart);

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "checkout_unreachable");
                return CheckoutOutcome::Failed(format!("checkout unreachable: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorPayload>()
                .await
                .ok()
                .and_then(|p| p.detail)
                .unwrap_or_else(|| {
                    format!("checkout request failed with status {}", status.as_u16())
                });
            warn!(status = status.as_u16(), error = %message, "checkout_error");
            return CheckoutOutcome::Failed(message);
        }

        match response.json::<TransactionResponse>().await {
            Ok(payload) => {
                let outcome = map_response(payload);
                if let CheckoutOutcome::Completed(ref receipt) = outcome {
                    info!(
                        transaction_id = receipt.transaction_id,
                        total_with_tax = receipt.total_with_tax,
                        total_without_tax = receipt.total_without_tax,
                        "checkout_completed"
                    );
                }
                outcome
            }
            Err(e) => {
                warn!(error = %e, "checkout_malformed_payload");
                CheckoutOutcome::Failed(format!("malformed transaction payload: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ProductRecord;

    fn cart_with_tea() -> Cart {
        let mut cart = Cart::new();
        let tea = ProductRecord {
            code: "4912345678904".to_string(),
            name: "おいしーいお茶".to_string(),
            price: 150,
        };
        cart.add(&tea);
        cart.add(&tea);
        cart
    }

    #[test]
    fn test_build_request_shape() {
        let request = build_request(&cart_with_tea());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["items"][0]["prd_code"], "4912345678904");
        assert_eq!(value["items"][0]["prd_name"], "おいしーいお茶");
        assert_eq!(value["items"][0]["prd_price"], 150);
        assert_eq!(value["items"][0]["quantity"], 2);
    }

    #[test]
    fn test_map_success_response() {
        let response: TransactionResponse = serde_json::from_str(
            r#"{"success":true,"trd_id":42,"total_amt":330,"ttl_amt_ex_tax":300}"#,
        )
        .unwrap();

        match map_response(response) {
            CheckoutOutcome::Completed(receipt) => {
                assert_eq!(receipt.transaction_id, 42);
                assert_eq!(receipt.total_with_tax, 330);
                assert_eq!(receipt.total_without_tax, 300);
            }
            CheckoutOutcome::Failed(msg) => panic!("unexpected failure: {msg}"),
        }
    }

    #[test]
    fn test_map_rejected_response() {
        let response: TransactionResponse =
            serde_json::from_str(r#"{"success":false,"message":"register closed"}"#).unwrap();

        assert_eq!(map_response(response), CheckoutOutcome::Failed("register closed".to_string()));
    }

    #[test]
    fn test_map_rejected_response_without_message() {
        let response: TransactionResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();

        match map_response(response) {
            CheckoutOutcome::Failed(msg) => assert!(!msg.is_empty()),
            CheckoutOutcome::Completed(_) => panic!("expected failure"),
        }
    }
}
