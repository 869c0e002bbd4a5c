use thiserror::Error;

/// Errors returned by a running `WorkerPool`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  /// The pool has begun (or finished) shutting down and accepts no more tasks.
  #[error("workerpool: pool is stopped")]
  PoolStopped,
}

/// Errors produced while building a `PoolConfig` from the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("invalid value for {key}: {value:?} (expected a non-negative integer)")]
  InvalidValue { key: String, value: String },
}
