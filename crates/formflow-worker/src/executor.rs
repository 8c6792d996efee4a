//! Job handler contract and the registry that dispatches by job type.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use formflow_core::error::AppError;
use formflow_core::result::AppResult;

/// A typed job payload bound to the job type it is enqueued under.
pub trait JobPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Dispatch key stored in `job_type`. Must be unique across the application.
    const JOB_TYPE: &'static str;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, dead-lettered without retrying
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, retried with backoff while attempts remain
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error, retried like a transient failure
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Whether retrying can never help.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// Message stored in `last_error`, without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Permanent(msg) | Self::Transient(msg) => msg.clone(),
            Self::Internal(err) => err.to_string(),
        }
    }
}

/// Object-safe handler working on the raw JSON payload.
///
/// Handlers must be safe to run more than once with the same payload and
/// must never change queue bookkeeping themselves.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Execute the job with the given payload
    async fn execute(&self, payload: &Value) -> Result<(), JobExecutionError>;
}

/// Handler with a typed payload, decoded at the edge before `handle` runs.
#[async_trait]
pub trait TypedJobHandler: Send + Sync + std::fmt::Debug + 'static {
    /// Payload shape; its `JOB_TYPE` is the handler's job type.
    type Payload: JobPayload;

    /// Process one decoded payload.
    async fn handle(&self, payload: Self::Payload) -> Result<(), JobExecutionError>;
}

/// Adapter exposing a [`TypedJobHandler`] as a [`JobHandler`].
#[derive(Debug)]
struct Typed<H>(H);

#[async_trait]
impl<H: TypedJobHandler> JobHandler for Typed<H> {
    fn job_type(&self) -> &str {
        H::Payload::JOB_TYPE
    }

    async fn execute(&self, payload: &Value) -> Result<(), JobExecutionError> {
        let decoded: H::Payload = serde_json::from_value(payload.clone()).map_err(|e| {
            JobExecutionError::Permanent(format!(
                "Malformed '{}' payload: {}",
                H::Payload::JOB_TYPE,
                e
            ))
        })?;
        self.0.handle(decoded).await
    }
}

/// Handler backed by an async closure, for collaborators that need no state.
pub struct FnHandler<F> {
    job_type: String,
    f: F,
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler")
            .field("job_type", &self.job_type)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobExecutionError>> + Send,
{
    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn execute(&self, payload: &Value) -> Result<(), JobExecutionError> {
        (self.f)(payload.clone()).await
    }
}

/// Dispatches jobs to the appropriate handler based on job_type
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Fails on an empty or already registered job type.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) -> AppResult<()> {
        let job_type = handler.job_type().trim().to_string();
        if job_type.is_empty() {
            return Err(AppError::validation("Handler job type must not be empty"));
        }
        if self.handlers.contains_key(&job_type) {
            return Err(AppError::conflict(format!(
                "A handler for job type '{}' is already registered",
                job_type
            )));
        }

        tracing::info!("Registered job handler for type '{}'", job_type);
        self.handlers.insert(job_type, handler);
        Ok(())
    }

    /// Register a typed handler under its payload's job type
    pub fn register_typed<H: TypedJobHandler>(&mut self, handler: H) -> AppResult<()> {
        self.register(Arc::new(Typed(handler)))
    }

    /// Register an async closure under `job_type`
    pub fn register_fn<F, Fut>(&mut self, job_type: &str, f: F) -> AppResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobExecutionError>> + Send + 'static,
    {
        self.register(Arc::new(FnHandler {
            job_type: job_type.to_string(),
            f,
        }))
    }

    /// Handler registered for `job_type`, if any
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
