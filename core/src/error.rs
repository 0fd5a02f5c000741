use thiserror::Error;

/// Raised by [`crate::outcome::Outcome::get`] when the outcome holds no value.
#[derive(Error, Debug)]
pub enum StateError<E> {
    #[error("outcome completed without a value")]
    NoValue,

    #[error("outcome failed: {0}")]
    Failed(E),
}

impl<E> StateError<E> {
    /// Returns captured cause if the outcome was a failure.
    pub fn into_cause(self) -> Option<E> {
        match self {
            StateError::NoValue => None,
            StateError::Failed(e) => Some(e),
        }
    }
}

/// Reported when resolving a single [`crate::handle::FutureHandle`].
///
/// Errors of one task never leak into another task's handle or into the
/// orchestrator call that scheduled it.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled")]
    Cancelled,

    #[error("task was discarded by the worker pool before it ran")]
    Abandoned,
}

impl TaskError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

/// Raised directly by batch execution and pool scheduling, never captured
/// into an outcome by the orchestrator itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("interrupted while waiting for batch: {0}")]
    Interrupted(String),

    #[error("worker pool rejected task: {0}")]
    Rejected(String),

    #[error("invalid usage: {0}")]
    Usage(String),
}

/// Invalid worker pool configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid pool configuration: {0}")]
    Invalid(String),

    #[error("could not decode pool configuration: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<ConfigError> for OrchestrationError {
    fn from(e: ConfigError) -> Self {
        OrchestrationError::Usage(e.to_string())
    }
}
