//! # formflow-core
//!
//! Core crate for Formflow. Contains configuration schemas, domain events,
//! the event sink trait, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Formflow crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
