use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use workpool::{PoolConfig, Task, WorkerPool};

// Post-processing that an order service would push off the request path,
// e.g. sending a confirmation or updating stock counters.
async fn post_process_order(order_id: u64, token: workpool::CancellationToken) {
  info!(order_id, "Post-processing order.");
  tokio::select! {
    _ = tokio::time::sleep(Duration::from_millis(300)) => info!(order_id, "Order post-processed."),
    _ = token.cancelled() => {
      // Shutdown is cooperative: finish the short critical part, skip the rest.
      info!(order_id, "Shutdown observed mid-task, finishing early.");
    }
  }
}

// Stands in for the HTTP handler: every "request" places an order and hands
// the follow-up work to the pool.
async fn handle_order_requests(pool: Arc<WorkerPool>, mut requests: mpsc::Receiver<u64>) {
  while let Some(order_id) = requests.recv().await {
    let task = Task::new(move |token| post_process_order(order_id, token));
    if let Err(e) = pool.submit(task).await {
      warn!(order_id, "Skipping post-processing: {}", e);
    }
  }
  info!("Request listener closed.");
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Graceful Shutdown Example ---");

  let config = match PoolConfig::from_env() {
    Ok(config) => config.with_name("orders_post_processing"),
    Err(e) => {
      error!("Invalid worker pool configuration: {}", e);
      return;
    }
  };
  let pool = Arc::new(WorkerPool::with_config(config, Handle::current()));

  let (request_tx, request_rx) = mpsc::channel::<u64>(16);
  let listener = tokio::spawn(handle_order_requests(pool.clone(), request_rx));

  for order_id in 1..=8 {
    if request_tx.send(order_id).await.is_err() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  tokio::select! {
    _ = tokio::signal::ctrl_c() => info!("Ctrl-C received."),
    _ = tokio::time::sleep(Duration::from_millis(200)) => info!("Demo timer elapsed."),
  }

  // Close the listener first so no new requests race the pool shutdown.
  drop(request_tx);
  if let Err(e) = listener.await {
    error!("Request listener task failed: {:?}", e);
  }

  info!(
    queued = pool.queued_task_count(),
    active = pool.active_task_count(),
    "Stopping worker pool..."
  );
  pool.stop().await;
  info!(state = ?pool.state(), "Worker pool stopped.");

  let late = Task::new(|_token| async { info!("Late task ran (unexpected)."); });
  match pool.submit(late).await {
    Ok(()) => error!("LATE SUBMISSION SUCCEEDED (UNEXPECTED!)"),
    Err(e) => info!("Late submission correctly failed: {}", e),
  }

  info!("--- Graceful Shutdown Example End ---");
}
