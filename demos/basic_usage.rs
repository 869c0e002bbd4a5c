use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{info, warn};
use workpool::{PoolConfig, Task, WorkerPool};

#[derive(Debug)]
struct Receipt {
  order_id: u64,
  line_items: usize,
  total_cents: u64,
}

// Work an order service defers after the order row is committed: price the
// line items and produce a receipt for the confirmation mail.
async fn build_receipt(order_id: u64, line_items: Vec<u64>) -> Receipt {
  info!(order_id, items = line_items.len(), "Building receipt.");
  tokio::time::sleep(Duration::from_millis(40 * line_items.len() as u64)).await;
  Receipt {
    order_id,
    line_items: line_items.len(),
    total_cents: line_items.iter().sum(),
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Basic Usage Example ---");

  let config = PoolConfig::new(2).with_name("receipts");
  let pool = WorkerPool::with_config(config, Handle::current());

  let orders: Vec<(u64, Vec<u64>)> = vec![
    (1001, vec![1999, 499]),
    (1002, vec![12900]),
    (1003, vec![250, 250, 250, 1200]),
    (1004, vec![8999, 100]),
  ];

  let mut pending = Vec::new();
  for (order_id, line_items) in orders {
    // Results travel back through a channel owned by the task, not the pool.
    let (receipt_tx, receipt_rx) = oneshot::channel::<Receipt>();
    let task = Task::new(move |_token| async move {
      let _ = receipt_tx.send(build_receipt(order_id, line_items).await);
    });
    match pool.submit(task).await {
      Ok(()) => pending.push((order_id, receipt_rx)),
      Err(e) => warn!(order_id, "Receipt skipped: {}", e),
    }
  }

  info!(queued = pool.queued_task_count(), active = pool.active_task_count(), "Orders handed to the pool.");

  for (order_id, receipt_rx) in pending {
    match receipt_rx.await {
      Ok(receipt) => info!(
        order_id = receipt.order_id,
        line_items = receipt.line_items,
        total_cents = receipt.total_cents,
        "Receipt ready."
      ),
      Err(_) => warn!(order_id, "Receipt task ended without a result."),
    }
  }

  pool.stop().await;
  info!(state = ?pool.state(), "Pool stopped.");
  info!("--- Basic Usage Example End ---");
}
