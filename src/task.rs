use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio_util::task::task_tracker::TaskTrackerToken;

/// The type of future that the pool executes.
/// It must be `Send` and `'static`; the pool never looks at its output.
pub(crate) type TaskToExecute = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Internal representation of an accepted task on its way to a worker.
///
/// `pending_token` keeps the pool's drain barrier from completing until the
/// worker drops it after the task body has finished.
pub(crate) struct ManagedTaskInternal {
  pub(crate) task_id: u64,
  pub(crate) future: TaskToExecute,
  pub(crate) pending_token: TaskTrackerToken,
}

impl fmt::Debug for ManagedTaskInternal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManagedTaskInternal")
      .field("task_id", &self.task_id)
      .finish_non_exhaustive()
  }
}
