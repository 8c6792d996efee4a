//! Core trait definitions.
//!
//! These traits define the contracts that concrete implementations
//! in other crates must fulfill.

pub mod events;

pub use events::EventSink;
