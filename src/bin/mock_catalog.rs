//! Mock catalog backend
//!
//! Simulates the store backend for local testing.
//!
//! Endpoints:
//! - `GET /products/{code}` - product lookup; 404 with a `detail` payload
//!   for unknown codes
//! - `POST /transactions` - records a transaction, returns totals with and
//!   without tax plus a transaction id
//! - `GET /test-db` - reachability probe reporting the seeded product count
//!
//! Usage:
//!   cargo run --bin mock_catalog -- --port 8800

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock_catalog")]
#[command(about = "Mock store backend for local simulation")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "8800")]
    port: u16,

    /// Tax rate in basis points applied to transaction totals
    #[arg(long, default_value = "1000")]
    tax_bps: u64,
}

struct Catalog {
    products: HashMap<String, (String, u32)>,
    next_trd_id: AtomicI64,
    tax_bps: u64,
}

impl Catalog {
    fn seeded(tax_bps: u64) -> Self {
        let mut products = HashMap::new();
        products.insert("4912345678904".to_string(), ("おいしーいお茶".to_string(), 150));
        products.insert("4901234567894".to_string(), ("チョコレート".to_string(), 120));
        products.insert("4909876543210".to_string(), ("ミネラルウォーター".to_string(), 100));
        products.insert("4900000000001".to_string(), ("おにぎり(鮭)".to_string(), 180));
        Self { products, next_trd_id: AtomicI64::new(1), tax_bps }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionItem {
    prd_code: String,
    #[allow(dead_code)]
    prd_name: String,
    prd_price: u64,
    quantity: u64,
}

#[derive(Debug, Deserialize)]
struct TransactionRequest {
    items: Vec<TransactionItem>,
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert("Content-Type", hyper::header::HeaderValue::from_static("application/json"));
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    catalog: Arc<Catalog>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/test-db") => json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "message": "mock catalog reachable",
                "products_found": catalog.products.len(),
                "products": [],
            }),
        ),
        (&Method::GET, p) if p.starts_with("/products/") => {
            let code = p.trim_start_matches("/products/");
            match catalog.products.get(code) {
                Some((name, price)) => {
                    info!(code = %code, "product_served");
                    json_response(
                        StatusCode::OK,
                        json!({ "code": code, "name": name, "price": price }),
                    )
                }
                None => {
                    warn!(code = %code, "product_unknown");
                    json_response(
                        StatusCode::NOT_FOUND,
                        json!({ "detail": format!("product {code} not found") }),
                    )
                }
            }
        }
        (&Method::POST, "/transactions") => {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(error = %e, "transaction_body_read_failed");
                    return Ok(json_response(
                        StatusCode::BAD_REQUEST,
                        json!({ "detail": "unreadable request body" }),
                    ));
                }
            };
            match serde_json::from_slice::<TransactionRequest>(&body) {
                Ok(request) if !request.items.is_empty() => {
                    let total_amt: u64 =
                        request.items.iter().map(|i| i.prd_price * i.quantity).sum();
                    // Item prices are tax-inclusive; back the tax out.
                    let ttl_amt_ex_tax = total_amt * 10_000 / (10_000 + catalog.tax_bps);
                    let trd_id = catalog.next_trd_id.fetch_add(1, Ordering::Relaxed);
                    info!(
                        trd_id,
                        lines = request.items.len(),
                        total_amt,
                        ttl_amt_ex_tax,
                        first_code = %request.items[0].prd_code,
                        "transaction_recorded"
                    );
                    json_response(
                        StatusCode::OK,
                        json!({
                            "success": true,
                            "trd_id": trd_id,
                            "total_amt": total_amt,
                            "ttl_amt_ex_tax": ttl_amt_ex_tax,
                        }),
                    )
                }
                Ok(_) => json_response(
                    StatusCode::OK,
                    json!({ "success": false, "message": "transaction has no items" }),
                ),
                Err(e) => {
                    warn!(error = %e, "transaction_malformed");
                    json_response(
                        StatusCode::BAD_REQUEST,
                        json!({ "detail": format!("malformed transaction: {e}") }),
                    )
                }
            }
        }
        _ => json_response(StatusCode::NOT_FOUND, json!({ "detail": "no such endpoint" })),
    };

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let catalog = Arc::new(Catalog::seeded(args.tax_bps));

    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let listener = TcpListener::bind(addr).await?;
    info!(port = args.port, products = catalog.products.len(), "mock_catalog_listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let catalog = catalog.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, catalog.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(peer = %peer, error = %e, "mock_catalog_connection_error");
            }
        });
    }
}
