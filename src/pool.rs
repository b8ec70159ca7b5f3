use crate::error::PoolError;
use crate::intake::{self, IntakeReceiver, IntakeSender};
use crate::task::{ManagedTaskInternal, TaskToExecute};
use crate::worker::{LiveWorkerGuard, PoolCounters, Worker};

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Lifecycle phase of a [`TaskPool`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  /// Accepting submissions; workers are spawned on demand.
  Open,
  /// `close` was called. No new submissions; accepted tasks are still running.
  Draining,
  /// Every accepted task finished and the intake is closed. Workers are
  /// exiting or already gone.
  Closed,
}

/// A bounded pool of lazily spawned workers fed through a rendezvous intake.
///
/// Each successful [`submit`](TaskPool::submit) spawns at most one new worker,
/// and only while fewer than `capacity` workers are alive. Submission waits
/// until an idle worker takes the task, so a saturated pool throttles its
/// producers instead of buffering work.
///
/// [`close`](TaskPool::close) stops admission, waits for every accepted task
/// to finish, then closes the intake and waits for the workers to exit.
pub struct TaskPool {
  pool_name: Arc<String>,
  capacity: usize,
  tokio_handle: TokioHandle,
  state: Mutex<PoolState>,
  live_workers: Arc<AtomicUsize>,
  next_worker_id: AtomicU64,
  /// Accepted but unfinished tasks. Closed when draining starts.
  pending: TaskTracker,
  workers: TaskTracker,
  counters: Arc<PoolCounters>,
  intake_tx: IntakeSender,
  intake_rx: IntakeReceiver,
}

impl std::fmt::Debug for TaskPool {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TaskPool")
      .field("pool_name", &self.pool_name)
      .field("capacity", &self.capacity)
      .field("state", &*self.state.lock())
      .field("running", &self.running())
      .field("workers_spawned", &self.next_worker_id.load(AtomicOrdering::Relaxed))
      .field("pending", &self.pending.len())
      .field("intake", &self.intake_tx)
      .finish_non_exhaustive()
  }
}

impl TaskPool {
  /// Creates a pool allowing at most `capacity` concurrently live workers.
  ///
  /// Workers are spawned on `tokio_handle`. No worker exists until the first
  /// submission.
  ///
  /// # Errors
  /// Returns `PoolError::ZeroCapacity` if `capacity` is zero, since such a pool
  /// could never execute anything.
  pub fn new(capacity: usize, tokio_handle: TokioHandle, pool_name: &str) -> Result<Arc<Self>, PoolError> {
    if capacity == 0 {
      error!(pool_name = %pool_name, "Refusing to create a task pool with zero capacity.");
      return Err(PoolError::ZeroCapacity);
    }

    let (intake_tx, intake_rx) = intake::rendezvous();

    info!(pool_name = %pool_name, %capacity, "Task pool created.");

    Ok(Arc::new(Self {
      pool_name: Arc::new(pool_name.to_string()),
      capacity,
      tokio_handle,
      state: Mutex::new(PoolState::Open),
      live_workers: Arc::new(AtomicUsize::new(0)),
      next_worker_id: AtomicU64::new(0),
      pending: TaskTracker::new(),
      workers: TaskTracker::new(),
      counters: Arc::new(PoolCounters::default()),
      intake_tx,
      intake_rx,
    }))
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// The fixed maximum number of live workers.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of live workers. Advisory; may be stale as soon as it is read.
  pub fn running(&self) -> usize {
    self.live_workers.load(AtomicOrdering::SeqCst)
  }

  pub fn state(&self) -> PoolState {
    *self.state.lock()
  }

  /// Returns `true` once `close` has begun.
  pub fn is_closed(&self) -> bool {
    self.state() != PoolState::Open
  }

  /// Tasks accepted by `submit` that have not finished executing yet.
  pub fn pending_task_count(&self) -> usize {
    self.pending.len()
  }

  /// Tasks that finished executing, including those that panicked.
  pub fn completed_task_count(&self) -> u64 {
    self.counters.completed.load(AtomicOrdering::SeqCst)
  }

  pub fn panicked_task_count(&self) -> u64 {
    self.counters.panicked.load(AtomicOrdering::SeqCst)
  }

  /// Submits a task and waits until a worker has taken it.
  ///
  /// The task is counted as pending before any waiting happens, so a
  /// concurrent [`close`](TaskPool::close) always waits for it.
  ///
  /// # Errors
  /// Returns `PoolError::PoolClosed` if `close` has begun. The task is dropped
  /// without running.
  pub async fn submit<F>(&self, task: F) -> Result<(), PoolError>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let future: TaskToExecute = Box::pin(task);

    let managed_task = {
      let state = self.state.lock();
      if *state != PoolState::Open {
        warn!(pool_name = %self.pool_name, state = ?*state, "Submit: Attempted to submit task to a pool that is closing or closed.");
        return Err(PoolError::PoolClosed);
      }

      let pending_token = self.pending.token();
      if self.live_workers.load(AtomicOrdering::SeqCst) < self.capacity {
        self.spawn_worker();
      }

      ManagedTaskInternal {
        task_id: NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
        future,
        pending_token,
      }
    };

    let task_id = managed_task.task_id;
    debug!(pool_name = %self.pool_name, %task_id, "Task accepted. Handing off to a worker.");

    if self.intake_tx.hand_off(managed_task).await {
      trace!(pool_name = %self.pool_name, %task_id, "Task handed off.");
      Ok(())
    } else {
      // The pending barrier keeps the intake open until this task runs.
      error!(pool_name = %self.pool_name, %task_id, "Submit: Intake closed while handing off an accepted task.");
      Err(PoolError::PoolClosed)
    }
  }

  /// Submits a blocking closure.
  ///
  /// The closure runs on the runtime's blocking thread pool while the worker
  /// that received it waits, so it occupies a worker slot for its whole
  /// duration. A panic in the closure is isolated like any other task panic.
  ///
  /// # Errors
  /// Returns `PoolError::PoolClosed` if `close` has begun.
  pub async fn submit_blocking<F>(&self, task: F) -> Result<(), PoolError>
  where
    F: FnOnce() + Send + 'static,
  {
    let blocking_handle = self.tokio_handle.clone();
    self
      .submit(async move {
        if let Err(join_error) = blocking_handle.spawn_blocking(task).await {
          if join_error.is_panic() {
            std::panic::resume_unwind(join_error.into_panic());
          }
        }
      })
      .await
  }

  /// Stops admission and waits until the pool is fully shut down.
  ///
  /// Returns once every accepted task has finished, the intake is closed and
  /// every worker has exited. Calling it again, or concurrently, joins the
  /// shutdown already in progress. If a `close` future is dropped mid-drain, a
  /// later call completes the shutdown.
  pub async fn close(&self) {
    if self.begin_draining() {
      info!(
        pool_name = %self.pool_name,
        pending = self.pending.len(),
        running = self.running(),
        "Close initiated. Draining accepted tasks."
      );
    } else {
      debug!(pool_name = %self.pool_name, "Close: Shutdown already in progress or completed.");
    }

    self.pending.wait().await;

    if self.finish_draining() {
      self.intake_tx.close();
      self.workers.close();
      info!(pool_name = %self.pool_name, completed = self.completed_task_count(), "All accepted tasks finished. Intake closed.");
    }

    self.workers.wait().await;
    trace!(pool_name = %self.pool_name, "All workers exited.");
  }

  /// `Open -> Draining`. Returns `true` for the call that made the transition.
  fn begin_draining(&self) -> bool {
    let mut state = self.state.lock();
    if *state != PoolState::Open {
      return false;
    }
    *state = PoolState::Draining;
    // Tokens are only taken while `Open`, so nothing is added after this.
    self.pending.close();
    true
  }

  /// `Draining -> Closed`. Returns `true` for the call that made the transition,
  /// which is the one allowed to close the intake.
  fn finish_draining(&self) -> bool {
    let mut state = self.state.lock();
    if *state != PoolState::Draining {
      return false;
    }
    *state = PoolState::Closed;
    true
  }

  /// Must be called with the state lock held and the pool open.
  fn spawn_worker(&self) {
    let worker_id = self.next_worker_id.fetch_add(1, AtomicOrdering::Relaxed);
    let worker = Worker {
      worker_id,
      pool_name: self.pool_name.clone(),
      intake: self.intake_rx.clone(),
      counters: self.counters.clone(),
      live_guard: LiveWorkerGuard::register(self.live_workers.clone()),
    };

    debug!(
      pool_name = %self.pool_name,
      %worker_id,
      running = self.running(),
      capacity = self.capacity,
      "Spawning worker."
    );

    self.workers.spawn_on(
      worker
        .run()
        .instrument(info_span!("pool_worker", pool_name = %*self.pool_name, %worker_id)),
      &self.tokio_handle,
    );
  }
}

impl Drop for TaskPool {
  fn drop(&mut self) {
    let mut state = self.state.lock();
    if *state != PoolState::Closed {
      info!(
        pool_name = %*self.pool_name,
        state = ?*state,
        "TaskPool dropped without completed close. Closing intake; workers finish their current task and exit."
      );
      *state = PoolState::Closed;
      self.pending.close();
      self.workers.close();
      self.intake_tx.close();
    } else {
      trace!(pool_name = %*self.pool_name, "Drop: Pool already closed. Nothing to do.");
    }
  }
}
