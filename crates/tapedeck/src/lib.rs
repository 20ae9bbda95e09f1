//! Top-level facade crate for tapedeck.
//!
//! Re-exports the stream codec, the batch uploader and the replay viewport so
//! users can depend on a single crate.

pub mod core {
    pub use tapedeck_core::*;
}

pub mod tracker {
    pub use tapedeck_tracker::*;
}

pub mod player {
    pub use tapedeck_player::*;
}
