//! tapedeck core: session-replay wire format, stream decoder, and error types.
//!
//! This crate defines the record framing used for captured sessions, the
//! pull-based decoder that turns a stored byte stream into ordered replay
//! messages, and the error surface shared by the tracker and player crates.
//! It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input surfaces as `TapedeckError`/`Result` or as the decoder's
//! error flag, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, Result, TapedeckError};
