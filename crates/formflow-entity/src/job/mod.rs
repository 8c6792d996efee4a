//! Background job domain entities.

pub mod model;
pub mod stats;
pub mod status;

pub use model::{CreateJob, Job};
pub use stats::JobStats;
pub use status::{JobPriority, JobStatus};
