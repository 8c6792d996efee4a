//! E-signature value objects.

pub mod status;

pub use status::{DocumentStatus, SignatureStatus, SignerStatus};
