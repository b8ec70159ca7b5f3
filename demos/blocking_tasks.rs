use bounded_taskpool::TaskPool;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();
  info!("--- Blocking Tasks Example ---");

  let pool = TaskPool::new(100, Handle::current(), "blocking_pool").expect("Failed to create pool");
  let started = Instant::now();

  // 1000 one-second blocking jobs on 100 workers take roughly ten seconds.
  for i in 0..1000 {
    pool
      .submit_blocking(move || {
        std::thread::sleep(Duration::from_secs(1));
        tracing::debug!("Blocking job {} done", i);
      })
      .await
      .expect("Pool closed unexpectedly");
  }

  pool.close().await;
  info!(
    "Ran {} blocking jobs with {} workers in {:?}",
    pool.completed_task_count(),
    pool.capacity(),
    started.elapsed()
  );
  info!("--- Blocking Tasks Example End ---");
}
