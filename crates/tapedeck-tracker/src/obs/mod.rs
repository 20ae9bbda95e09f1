//! Delivery observability.
//!
//! In-process counters for the uploader, rendered in Prometheus text format
//! on demand (the CLI logs them on exit; embedders may expose them).

pub mod metrics;

pub use metrics::SenderMetrics;
