//! tapedeck player: the virtual viewport replays are projected onto.
//!
//! The replayed document lives in an embedding frame at its recorded
//! (logical) size; a CSS scale transform fits it into the host container.
//! `ViewportProjector` owns that surface and the coordinate math between the
//! host page and the replayed document, including hit-testing through nested
//! same-origin frames. DOM access goes through the `Dom` trait so the
//! projector runs against a browser binding or an in-memory document alike.
//!
//! Layout failures never escape: they are logged and reported as empty
//! results.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod dom;
pub mod geometry;
pub mod viewport;

pub use dom::{Dom, HitTest};
pub use geometry::{Dimensions, Point, Rect};
pub use viewport::{ScaleMode, ViewportProjector};
