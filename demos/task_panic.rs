use bounded_taskpool::TaskPool;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let pool = TaskPool::new(
    1, // A single worker, so the same worker runs both tasks
    Handle::current(),
    "panic_pool",
  )
  .expect("Failed to create pool");

  pool
    .submit(async {
      info!("Panicking Task: Starting...");
      tokio::time::sleep(Duration::from_millis(100)).await;
      info!("Panicking Task: About to panic!");
      panic!("This task is designed to panic!");
    })
    .await
    .expect("Failed to submit panicking task");

  pool
    .submit(async {
      info!("Follow-up Task: The worker survived the panic and is running me.");
    })
    .await
    .expect("Failed to submit follow-up task");

  pool.close().await;
  info!(
    "Pool closed. Completed: {}, panicked: {}",
    pool.completed_task_count(),
    pool.panicked_task_count()
  );
  info!("--- Task Panic Example End ---");
}
