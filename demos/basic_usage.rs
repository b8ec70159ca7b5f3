use bounded_taskpool::TaskPool;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn my_task_fn(id: usize, delay_ms: u64) {
  info!("Task {} starting, will sleep for {}ms", id, delay_ms);
  tokio::time::sleep(Duration::from_millis(delay_ms)).await;
  info!("Task {} finished after {}ms", id, delay_ms);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let pool = TaskPool::new(
    3, // Capacity: at most three live workers
    Handle::current(),
    "basic_pool",
  )
  .expect("Failed to create pool");

  for i in 0..10 {
    // Alternate sleep times for variety
    let sleep_duration: u64 = 200 + (i as u64 % 3 * 100);
    match pool.submit(my_task_fn(i, sleep_duration)).await {
      Ok(()) => info!("Task {} handed to a worker. Running workers: {}", i, pool.running()),
      Err(e) => tracing::error!("Failed to submit task {}: {:?}", i, e),
    }
  }

  info!("All tasks submitted. Closing pool and waiting for the drain...");
  pool.close().await;
  info!(
    "Pool closed. Completed tasks: {}, running workers: {}",
    pool.completed_task_count(),
    pool.running()
  );
  info!("--- Basic Usage Example End ---");
}
