use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

type TaskFn = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, ()> + Send + 'static>;

/// An opaque unit of deferred work accepted by a `WorkerPool`.
///
/// The closure receives the pool's cancellation token. Cancellation is
/// cooperative: a running task is never interrupted, it only observes the
/// token if it chooses to poll it.
pub struct Task {
  run: TaskFn,
}

impl Task {
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    Self {
      run: Box::new(move |token| f(token).boxed()),
    }
  }

  /// Consumes the task, so it can only ever be invoked once.
  pub(crate) async fn run(self, token: CancellationToken) {
    (self.run)(token).await
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task").finish_non_exhaustive()
  }
}

/// A task as it sits in the queue, tagged with its pool-local id.
pub(crate) struct QueuedTask {
  pub(crate) task_id: u64,
  pub(crate) task: Task,
}
