use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::info;
use workpool::{Task, WorkerPool};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  // A single worker: if the panic killed it, the second task would never run.
  let pool = WorkerPool::new(1, Handle::current());

  let panicking_task = Task::new(|_token| async {
    info!("Panicking Task: Starting...");
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("Panicking Task: About to panic!");
    panic!("This task is designed to panic!");
  });
  pool
    .submit(panicking_task)
    .await
    .expect("Failed to submit panicking task");

  let (done_tx, done_rx) = oneshot::channel::<()>();
  pool
    .submit(Task::new(move |_token| async move {
      info!("Follow-up Task: Running on the same worker.");
      let _ = done_tx.send(());
    }))
    .await
    .expect("Failed to submit follow-up task");

  match done_rx.await {
    Ok(()) => info!("Follow-up task completed; the worker survived the panic."),
    Err(e) => info!("Follow-up task never reported back: {:?}", e),
  }

  info!("Stopping pool.");
  pool.stop().await;
  info!("Pool stopped.");
  info!("--- Task Panic Example End ---");
}
