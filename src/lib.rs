//! A Tokio-based bounded worker pool: a fixed number of workers drain a
//! bounded FIFO queue of tasks, share one cooperative cancellation token, and
//! shut down by waiting for every worker to exit.

mod config;
mod error;
mod pool;
mod task;

pub use config::{PoolConfig, ENV_POOL_NAME, ENV_POOL_SIZE, ENV_QUEUE_CAPACITY};
pub use error::{ConfigError, PoolError};
pub use pool::{PoolState, WorkerPool};
pub use task::Task;
pub use tokio_util::sync::CancellationToken;
