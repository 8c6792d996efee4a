//! # formflow-database
//!
//! PostgreSQL connection management, migrations, and repository
//! implementations for the job table and the submission tables.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
