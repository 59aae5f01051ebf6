use thiserror::Error;

/// Errors reported by an [`Executor`](crate::Executor).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecError {
    /// `run` was called while another call to `run` on the same executor was
    /// still draining, either on another thread or from inside a task.
    #[error("executor is already draining its queue")]
    AlreadyRunning,
}
