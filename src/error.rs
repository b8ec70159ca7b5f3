use thiserror::Error;

/// Errors that can occur within the task pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Pool is closing or already closed, cannot accept new tasks")]
  PoolClosed,

  #[error("Pool capacity must be at least one worker")]
  ZeroCapacity,
}
