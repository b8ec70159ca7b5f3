use crate::intake::IntakeReceiver;
use crate::task::ManagedTaskInternal;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info_span, trace, Instrument};

/// Completion statistics shared between the pool and its workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
  pub(crate) completed: AtomicU64,
  pub(crate) panicked: AtomicU64,
}

/// Counts a worker as live for as long as it exists.
///
/// Created by the submitter that decided to spawn the worker, then moved into
/// the worker future, so the count drops even if the runtime discards the
/// worker before it is ever polled.
#[derive(Debug)]
pub(crate) struct LiveWorkerGuard {
  live_workers: Arc<AtomicUsize>,
}

impl LiveWorkerGuard {
  pub(crate) fn register(live_workers: Arc<AtomicUsize>) -> Self {
    live_workers.fetch_add(1, AtomicOrdering::SeqCst);
    Self { live_workers }
  }
}

impl Drop for LiveWorkerGuard {
  fn drop(&mut self) {
    self.live_workers.fetch_sub(1, AtomicOrdering::SeqCst);
  }
}

pub(crate) struct Worker {
  pub(crate) worker_id: u64,
  pub(crate) pool_name: Arc<String>,
  pub(crate) intake: IntakeReceiver,
  pub(crate) counters: Arc<PoolCounters>,
  pub(crate) live_guard: LiveWorkerGuard,
}

impl Worker {
  /// Runs tasks from the intake until it is closed.
  ///
  /// A panicking task is caught, logged and counted; the worker keeps going.
  pub(crate) async fn run(self) {
    let Worker {
      worker_id,
      pool_name,
      intake,
      counters,
      live_guard,
    } = self;

    debug!(pool_name = %*pool_name, %worker_id, "Worker started.");

    while let Some(managed_task) = intake.recv().await {
      let ManagedTaskInternal {
        task_id,
        future,
        pending_token,
      } = managed_task;

      let outcome = AssertUnwindSafe(future)
        .catch_unwind()
        .instrument(info_span!("pool_task", %task_id))
        .await;

      match outcome {
        Ok(()) => {
          trace!(pool_name = %*pool_name, %worker_id, %task_id, "Task executed successfully.");
        }
        Err(panic_payload) => {
          counters.panicked.fetch_add(1, AtomicOrdering::SeqCst);
          error!(
            pool_name = %*pool_name,
            %worker_id,
            %task_id,
            panic_message = %panic_message(&*panic_payload),
            "Task panicked during execution. Worker continues."
          );
        }
      }

      counters.completed.fetch_add(1, AtomicOrdering::SeqCst);
      // Releasing the token is what lets a draining pool finish.
      drop(pending_token);
    }

    drop(live_guard);
    debug!(pool_name = %*pool_name, %worker_id, "Intake closed. Worker exiting.");
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&'static str>() {
    *message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.as_str()
  } else {
    "<non-string panic payload>"
  }
}
