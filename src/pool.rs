use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::task::{QueuedTask, Task};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Lifecycle of a `WorkerPool`. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  /// Accepting submissions, workers running.
  Open,
  /// Cancellation signaled, workers draining or exiting.
  Closing,
  /// Every worker has exited.
  Closed,
}

/// A fixed-size group of workers sharing one bounded FIFO queue and one
/// cancellation token.
///
/// Workers are spawned on the runtime behind the supplied `TokioHandle` and
/// tracked by the pool; none of them outlives a call to [`WorkerPool::stop`].
pub struct WorkerPool {
  pool_name: Arc<String>,
  worker_count: usize,
  queue_capacity: usize,
  task_queue_tx: kanal::AsyncSender<QueuedTask>,
  // One permit per free queue slot; a permit is returned only when a worker dequeues.
  queue_slots: Arc<Semaphore>,
  shutdown_token: CancellationToken,
  workers: TaskTracker,
  active_tasks: Arc<AtomicUsize>,
  next_task_id: AtomicU64,
}

impl WorkerPool {
  /// Creates and starts a pool of `size` workers (zero is coerced to one) with
  /// a queue capacity of twice the worker count.
  pub fn new(size: usize, tokio_handle: TokioHandle) -> Self {
    Self::with_config(PoolConfig::new(size), tokio_handle)
  }

  pub fn with_config(config: PoolConfig, tokio_handle: TokioHandle) -> Self {
    let worker_count = config.effective_workers();
    let queue_capacity = config.effective_queue_capacity();
    let (tx, rx) = kanal::bounded_async(queue_capacity);

    let pool = Self {
      pool_name: Arc::new(config.name),
      worker_count,
      queue_capacity,
      task_queue_tx: tx,
      queue_slots: Arc::new(Semaphore::new(queue_capacity)),
      shutdown_token: CancellationToken::new(),
      workers: TaskTracker::new(),
      active_tasks: Arc::new(AtomicUsize::new(0)),
      next_task_id: AtomicU64::new(0),
    };

    for worker_id in 0..worker_count {
      let worker_loop = Self::run_worker_loop(
        pool.pool_name.clone(),
        worker_id,
        rx.clone(),
        pool.queue_slots.clone(),
        pool.shutdown_token.clone(),
        pool.active_tasks.clone(),
      )
      .instrument(info_span!("workerpool_worker", pool_name = %*pool.pool_name, worker_id));
      pool.workers.spawn_on(worker_loop, &tokio_handle);
    }

    info!(
      pool_name = %*pool.pool_name,
      workers = worker_count,
      queue_capacity,
      "Worker pool started."
    );
    pool
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  pub fn queue_capacity(&self) -> usize {
    self.queue_capacity
  }

  /// Returns the number of tasks waiting in the queue.
  pub fn queued_task_count(&self) -> usize {
    self.task_queue_tx.len()
  }

  /// Returns the number of tasks currently executing on a worker.
  pub fn active_task_count(&self) -> usize {
    self.active_tasks.load(AtomicOrdering::SeqCst)
  }

  pub fn state(&self) -> PoolState {
    if !self.shutdown_token.is_cancelled() {
      PoolState::Open
    } else if self.workers.is_closed() && self.workers.is_empty() {
      PoolState::Closed
    } else {
      PoolState::Closing
    }
  }

  /// Enqueues a task for execution.
  ///
  /// `None` is accepted and ignored. Waits for a free queue slot when the queue
  /// is full, unless shutdown begins first.
  ///
  /// # Errors
  /// Returns `PoolError::PoolStopped` if the pool is stopping or stopped,
  /// including when shutdown begins while this call is waiting for space.
  ///
  /// A task that submits to its own pool must not rely on this call to make
  /// progress while the pool is full: it only unblocks through a free slot or
  /// shutdown.
  pub async fn submit(&self, task: impl Into<Option<Task>>) -> Result<(), PoolError> {
    let Some(task) = task.into() else {
      trace!(pool_name = %self.pool_name, "Submit: empty task ignored.");
      return Ok(());
    };

    if self.shutdown_token.is_cancelled() {
      warn!(pool_name = %self.pool_name, "Submit: Attempted to submit task to a stopped pool.");
      return Err(PoolError::PoolStopped);
    }

    let task_id = self.next_task_id.fetch_add(1, AtomicOrdering::Relaxed);
    debug!(pool_name = %self.pool_name, %task_id, "Submitting task to queue.");

    // Cancellation may only win while no slot is held, so a task is handed to
    // the queue only once the outcome is committed to `Ok`.
    let slot = tokio::select! {
      biased;

      _ = self.shutdown_token.cancelled() => {
        warn!(pool_name = %self.pool_name, %task_id, "Submit: Pool stopped while waiting for queue space.");
        return Err(PoolError::PoolStopped);
      }

      acquire_result = self.queue_slots.acquire() => {
        match acquire_result {
          Ok(permit) => permit,
          Err(_) => {
            warn!(pool_name = %self.pool_name, %task_id, "Submit: Queue slots closed.");
            return Err(PoolError::PoolStopped);
          }
        }
      }
    };

    if self.shutdown_token.is_cancelled() {
      warn!(pool_name = %self.pool_name, %task_id, "Submit: Pool stopped while acquiring queue space.");
      return Err(PoolError::PoolStopped);
    }

    // Holding a slot guarantees space, so this completes on its first poll.
    match self.task_queue_tx.send(QueuedTask { task_id, task }).await {
      Ok(()) => {
        slot.forget();
        Ok(())
      }
      Err(send_error) => {
        // The channel only closes after every worker has exited: the task is dropped unrun.
        warn!(pool_name = %self.pool_name, %task_id, "Submit: Failed to send task to queue: {:?}", send_error);
        Err(PoolError::PoolStopped)
      }
    }
  }

  /// Blocking form of [`WorkerPool::submit`] for synchronous callers.
  ///
  /// Must not be called from within an async context: it parks the current
  /// thread until the task is enqueued or the pool stops.
  pub fn submit_blocking(&self, task: impl Into<Option<Task>>) -> Result<(), PoolError> {
    futures::executor::block_on(self.submit(task))
  }

  /// Stops the pool and waits until every worker has exited.
  ///
  /// Tasks accepted before the call still run. Safe to call more than once and
  /// from several callers at the same time; each returns once the pool is
  /// `Closed`.
  pub async fn stop(&self) {
    let already_stopping = self.shutdown_token.is_cancelled();
    if already_stopping {
      debug!(pool_name = %self.pool_name, "Stop: Shutdown already initiated, waiting for workers.");
    } else {
      info!(
        pool_name = %self.pool_name,
        queued = self.queued_task_count(),
        active = self.active_task_count(),
        "Stopping worker pool."
      );
    }

    self.shutdown_token.cancel();
    self.workers.close();
    self.workers.wait().await;
    self.queue_slots.close();

    // Workers only exit on an empty queue, so anything left raced with shutdown.
    let discarded = self.task_queue_tx.len();
    let _ = self.task_queue_tx.close();
    if discarded > 0 {
      warn!(pool_name = %self.pool_name, discarded, "Discarded tasks submitted concurrently with shutdown.");
    }

    if !already_stopping {
      info!(pool_name = %self.pool_name, "Worker pool stopped. All workers exited.");
    }
  }

  /// Blocking form of [`WorkerPool::stop`]. Same restriction as
  /// [`WorkerPool::submit_blocking`].
  pub fn stop_blocking(&self) {
    futures::executor::block_on(self.stop())
  }

  async fn run_worker_loop(
    pool_name: Arc<String>,
    worker_id: usize,
    task_queue_rx: kanal::AsyncReceiver<QueuedTask>,
    queue_slots: Arc<Semaphore>,
    shutdown_token: CancellationToken,
    active_tasks: Arc<AtomicUsize>,
  ) {
    debug!(pool_name = %*pool_name, worker_id, "Worker started.");

    loop {
      // Queue first: buffered tasks drain even after cancellation fires.
      let queued = tokio::select! {
        biased;

        recv_result = task_queue_rx.recv() => {
          match recv_result {
            Ok(queued) => {
              queue_slots.add_permits(1);
              queued
            }
            Err(_) => {
              debug!(pool_name = %*pool_name, worker_id, "Task queue closed and empty. Worker exiting.");
              break;
            }
          }
        }

        _ = shutdown_token.cancelled() => {
          debug!(pool_name = %*pool_name, worker_id, "Shutdown signal received and queue empty. Worker exiting.");
          break;
        }
      };

      Self::execute(&pool_name, worker_id, queued, &shutdown_token, &active_tasks).await;
    }
  }

  async fn execute(
    pool_name: &str,
    worker_id: usize,
    queued: QueuedTask,
    shutdown_token: &CancellationToken,
    active_tasks: &AtomicUsize,
  ) {
    let QueuedTask { task_id, task } = queued;

    active_tasks.fetch_add(1, AtomicOrdering::SeqCst);
    trace!(pool_name = %pool_name, worker_id, %task_id, "Dequeued task. Executing.");

    let outcome = AssertUnwindSafe(task.run(shutdown_token.clone()))
      .catch_unwind()
      .instrument(info_span!("workerpool_task", %task_id))
      .await;

    active_tasks.fetch_sub(1, AtomicOrdering::SeqCst);

    match outcome {
      Ok(()) => trace!(pool_name = %pool_name, worker_id, %task_id, "Task finished."),
      Err(_panic_payload) => {
        error!(pool_name = %pool_name, worker_id, %task_id, "Task panicked during execution. Worker continues.");
      }
    }
  }
}

impl fmt::Debug for WorkerPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerPool")
      .field("pool_name", &self.pool_name)
      .field("worker_count", &self.worker_count)
      .field("queue_capacity", &self.queue_capacity)
      .field("queued", &self.queued_task_count())
      .field("active", &self.active_task_count())
      .field("state", &self.state())
      .finish()
  }
}

impl Drop for WorkerPool {
  fn drop(&mut self) {
    if !self.shutdown_token.is_cancelled() {
      // Dropping cannot wait; workers finish their current task and exit on their own.
      info!(
        pool_name = %*self.pool_name,
        "WorkerPool dropped without stop. Signaling workers to exit and closing the queue."
      );
      self.shutdown_token.cancel();
      self.workers.close();
      let _ = self.task_queue_tx.close();
    } else {
      trace!(pool_name = %*self.pool_name, "Drop: Pool already stopped or stopping.");
    }
  }
}
