use crate::task::ManagedTaskInternal;

use std::fmt;

use kanal::{AsyncReceiver, AsyncSender};

/// Creates the pool's intake: a zero-capacity (rendezvous) channel.
///
/// There is no buffer between submitters and workers. A handoff only completes
/// once a worker is actually receiving, which makes worker availability the
/// pool's sole admission control.
pub(crate) fn rendezvous() -> (IntakeSender, IntakeReceiver) {
  let (tx, rx) = kanal::bounded_async(0);
  (IntakeSender { tx }, IntakeReceiver { rx })
}

/// The submitting half of the intake. Owned by the pool; never cloned.
pub(crate) struct IntakeSender {
  tx: AsyncSender<ManagedTaskInternal>,
}

/// The receiving half of the intake. Every worker owns a clone.
#[derive(Clone)]
pub(crate) struct IntakeReceiver {
  rx: AsyncReceiver<ManagedTaskInternal>,
}

impl fmt::Debug for IntakeSender {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IntakeSender")
      .field("is_closed", &self.is_closed())
      .finish_non_exhaustive()
  }
}

impl fmt::Debug for IntakeReceiver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IntakeReceiver")
      .field("is_closed", &self.rx.is_closed())
      .finish_non_exhaustive()
  }
}

impl IntakeSender {
  /// Hands a task to whichever worker receives next, waiting until one does.
  ///
  /// Returns `false` if the intake was closed. The task is dropped in that
  /// case, which also releases its pending token.
  pub(crate) async fn hand_off(&self, task: ManagedTaskInternal) -> bool {
    self.tx.send(task).await.is_ok()
  }

  /// Closes the intake for both halves. Idle workers wake up and exit.
  pub(crate) fn close(&self) {
    let _ = self.tx.close();
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

impl IntakeReceiver {
  /// Waits for the next task. `None` once the intake is closed.
  pub(crate) async fn recv(&self) -> Option<ManagedTaskInternal> {
    self.rx.recv().await.ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::TaskToExecute;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;
  use tokio_util::task::TaskTracker;

  fn dummy_task(id: u64, tracker: &TaskTracker) -> ManagedTaskInternal {
    let future: TaskToExecute = Box::pin(async {});
    ManagedTaskInternal {
      task_id: id,
      future,
      pending_token: tracker.token(),
    }
  }

  #[tokio::test]
  async fn test_hand_off_waits_for_receiver() {
    let (tx, rx) = rendezvous();
    let tracker = TaskTracker::new();

    let send_future = tx.hand_off(dummy_task(1, &tracker));
    tokio::pin!(send_future);

    // Nobody is receiving, so the handoff must not complete on its own.
    tokio::select! {
        _ = &mut send_future => {
            panic!("Hand-off should have waited for a receiver.");
        },
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    let (sent, received) = tokio::join!(send_future, rx.recv());
    assert!(sent);
    assert_eq!(received.map(|task| task.task_id), Some(1));
  }

  #[tokio::test]
  async fn test_pending_token_travels_with_task() {
    let (tx, rx) = rendezvous();
    let tracker = TaskTracker::new();

    let (sent, received) = tokio::join!(tx.hand_off(dummy_task(7, &tracker)), rx.recv());
    assert!(sent);
    assert_eq!(tracker.len(), 1);

    drop(received);
    assert_eq!(tracker.len(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_hand_offs_reach_multiple_receivers() {
    let (tx, rx) = rendezvous();
    let tx = Arc::new(tx);
    let tracker = TaskTracker::new();
    let num_tasks: u64 = 40;
    let received_count = Arc::new(AtomicUsize::new(0));

    let mut consumers = Vec::new();
    for _ in 0..3 {
      let rx = rx.clone();
      let received_count = received_count.clone();
      consumers.push(tokio::spawn(async move {
        while rx.recv().await.is_some() {
          received_count.fetch_add(1, Ordering::SeqCst);
        }
      }));
    }

    let mut producers = Vec::new();
    for i in 0..num_tasks {
      let tx = tx.clone();
      let task = dummy_task(i, &tracker);
      producers.push(tokio::spawn(async move { tx.hand_off(task).await }));
    }
    for producer in producers {
      assert!(producer.await.unwrap());
    }

    tx.close();
    for consumer in consumers {
      consumer.await.unwrap();
    }

    assert_eq!(received_count.load(Ordering::SeqCst), num_tasks as usize);
    assert_eq!(tracker.len(), 0);
  }

  #[tokio::test]
  async fn test_close_stops_receivers_and_rejects_hand_off() {
    let (tx, rx) = rendezvous();
    let tracker = TaskTracker::new();

    tx.close();
    assert!(tx.is_closed());
    assert!(rx.recv().await.is_none());

    assert!(!tx.hand_off(dummy_task(1, &tracker)).await);
    // The rejected task was dropped along with its token.
    assert_eq!(tracker.len(), 0);
  }
}
