//! Repository implementations for Formflow entities.

pub mod job;
pub mod submission;

pub use job::JobRepository;
pub use submission::SubmissionRepository;
