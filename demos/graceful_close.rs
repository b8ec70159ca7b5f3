use bounded_taskpool::{PoolError, TaskPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn work_task_fn(id: usize, duration_ms: u64) {
  info!("Task {} starting (will run for {}ms)", id, duration_ms);
  tokio::time::sleep(Duration::from_millis(duration_ms)).await;
  info!("Task {} finished", id);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Graceful Close Example ---");

  let pool = TaskPool::new(2, Handle::current(), "graceful_close_pool").expect("Failed to create pool");

  // A producer that keeps submitting until the pool refuses.
  let producer = {
    let pool = pool.clone();
    tokio::spawn(async move {
      let mut accepted = 0usize;
      loop {
        match pool.submit(work_task_fn(accepted, 300)).await {
          Ok(()) => accepted += 1,
          Err(PoolError::PoolClosed) => {
            info!("Producer: pool refused task {}, stopping.", accepted);
            return accepted;
          }
          Err(e) => {
            tracing::error!("Producer: unexpected error: {:?}", e);
            return accepted;
          }
        }
      }
    })
  };

  tokio::time::sleep(Duration::from_millis(700)).await;
  info!(
    "Calling close (state: {:?}, pending: {}, running: {})...",
    pool.state(),
    pool.pending_task_count(),
    pool.running()
  );
  pool.close().await;

  let accepted = producer.await.expect("Producer task failed");
  info!(
    "Close returned. Accepted: {}, completed: {}, state: {:?}",
    accepted,
    pool.completed_task_count(),
    pool.state()
  );
  info!("--- Graceful Close Example End ---");
}
