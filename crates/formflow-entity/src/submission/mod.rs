//! Form submission entities.

pub mod model;

pub use model::{SignatureDocument, Submission};
