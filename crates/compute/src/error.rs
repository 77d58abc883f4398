use thiserror::Error;

/// Result of a task computation or of any cooperative call made on its context.
pub type TaskResult<T> = Result<T, TaskError>;

/// How a task execution ended when it did not produce a value.
///
/// `Aborted` is cooperative cancellation and is not a failure: front ends
/// should treat it as a clean, user-initiated stop. Everything else the
/// computation reports travels unchanged inside `Failed`.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl TaskError {
    pub fn aborted(reason: impl Into<String>) -> Self {
        TaskError::Aborted(reason.into())
    }

    /// Wrap any error as a computation failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Failed(err.into())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, TaskError::Aborted(_))
    }

    /// The reason given to the abort request, if this is an abort.
    pub fn abort_reason(&self) -> Option<&str> {
        match self {
            TaskError::Aborted(reason) => Some(reason),
            TaskError::Failed(_) => None,
        }
    }
}
