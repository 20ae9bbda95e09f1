//! Delivery transport.
//!
//! The sender talks to the ingestion endpoint through `IngestTransport`, so
//! the queue logic is independent of the HTTP stack (and testable without a
//! network). `HttpTransport` is the production implementation.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;

use tapedeck_core::error::Result;

pub use http::HttpTransport;

/// Ingestion path appended to the configured base url.
pub const INGEST_PATH: &str = "/v1/web/i";

/// Payloads below this size go out on the keep-alive path.
pub const KEEPALIVE_SIZE_LIMIT: usize = 64 << 10;

/// One POST of one batch.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub body: Bytes,
    /// Bearer credential.
    pub token: String,
    /// Low-latency keep-alive mode (only for small payloads).
    pub keepalive: bool,
}

impl Delivery {
    pub fn new(body: Bytes, token: impl Into<String>) -> Self {
        let keepalive = body.len() < KEEPALIVE_SIZE_LIMIT;
        Self {
            body,
            token: token.into(),
            keepalive,
        }
    }
}

/// Posts batches to the ingestion endpoint.
#[async_trait]
pub trait IngestTransport: Send + Sync + 'static {
    /// HTTP status of the response; `Err` for transport-level failures.
    async fn post(&self, delivery: Delivery) -> Result<u16>;
}
