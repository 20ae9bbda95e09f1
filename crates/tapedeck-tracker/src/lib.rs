//! tapedeck tracker library entry.
//!
//! Delivers pre-encoded session batches to the ingestion endpoint: a
//! serialized queue with bounded linear-backoff retry (`sender`), the HTTP
//! seam it posts through (`transport`), strict YAML configuration (`config`)
//! and delivery metrics (`obs`). Consumed by the `tapedeck-upload` binary and
//! by integration tests.

pub mod config;
pub mod obs;
pub mod sender;
pub mod transport;
