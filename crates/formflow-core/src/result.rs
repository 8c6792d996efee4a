//! Convenience result type alias for Formflow.

use crate::error::AppError;

/// A specialized `Result` type for Formflow operations.
pub type AppResult<T> = Result<T, AppError>;
