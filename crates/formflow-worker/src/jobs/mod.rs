//! Built-in job handlers.

pub mod signature;

pub use signature::{
    SIGNATURE_STATUS_JOB, SignatureProvider, SignatureStatusCheck, SignatureStatusHandler,
    SubmissionStore,
};
