//! In-process FIFO execution queue.
//!
//! [`ExecutionQueue::submit`] runs a task once one of `max_concurrency`
//! slots is free. Waiters are served strictly in arrival order (the tokio
//! semaphore is fair), and a finished task hands its slot to the next
//! waiter immediately, whether it succeeded or failed.
//!
//! The queue never rejects for capacity and the pending list is unbounded:
//! admission control happens before submission.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;

/// Default number of tasks allowed to run at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;

/// Returned when the queue has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Execution queue is closed")]
pub struct QueueClosed;

/// FIFO queue bounding how many tasks run concurrently.
#[derive(Debug)]
pub struct ExecutionQueue {
    slots: Semaphore,
    max_concurrency: usize,
    active: AtomicUsize,
    pending: AtomicUsize,
}

impl Default for ExecutionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl ExecutionQueue {
    /// Create a queue. A `max_concurrency` of zero is raised to one.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            slots: Semaphore::new(max_concurrency),
            max_concurrency,
            active: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Tasks currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Tasks admitted but still waiting for a slot.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait for a slot in arrival order, then run `task` to completion.
    ///
    /// The task's own output (including any error it carries) is returned
    /// unchanged; the slot is released as soon as it settles.
    pub async fn submit<F, T>(&self, task: F) -> Result<T, QueueClosed>
    where
        F: Future<Output = T>,
    {
        let waiting = CounterGuard::enter(&self.pending);
        let permit = self.slots.acquire().await.map_err(|_| QueueClosed)?;
        drop(waiting);

        let running = CounterGuard::enter(&self.active);
        let output = task.await;
        drop(running);
        drop(permit);

        Ok(output)
    }

    /// Stop dispatching. Pending and future submissions fail with [`QueueClosed`].
    pub fn close(&self) {
        self.slots.close();
    }
}

/// Increments a counter on creation and decrements it on drop, so callers
/// that stop waiting (or panic mid-task) never leave the count inflated.
struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn runs_tasks_in_fifo_order_one_at_a_time() {
        let queue = ExecutionQueue::new(1);
        let log = Arc::new(Mutex::new(Vec::new()));

        let task = |name: &'static str| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:start"));
                tokio::time::sleep(Duration::from_millis(10)).await;
                log.lock().unwrap().push(format!("{name}:end"));
                name
            }
        };

        let (a, b, c) = tokio::join!(
            queue.submit(task("a")),
            queue.submit(task("b")),
            queue.submit(task("c")),
        );

        assert_eq!((a, b, c), (Ok("a"), Ok("b"), Ok("c")));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:start", "a:end", "b:start", "b:end", "c:start", "c:end"]
        );
        assert_eq!(queue.active(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn failing_task_frees_its_slot() {
        let queue = ExecutionQueue::new(1);

        let (first, second) = tokio::join!(
            queue.submit(async { Err::<u32, &str>("boom") }),
            queue.submit(async { Ok::<u32, &str>(7) }),
        );

        assert_eq!(first, Ok(Err("boom")));
        assert_eq!(second, Ok(Ok(7)));
        assert_eq!(queue.active(), 0);
    }

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let queue = Arc::new(ExecutionQueue::new(2));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let queue = Arc::clone(&queue);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let q = Arc::clone(&queue);
                queue
                    .submit(async move {
                        peak.fetch_max(q.active(), Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(queue.active(), 0);
    }

    #[tokio::test]
    async fn pending_count_tracks_waiters() {
        let queue = Arc::new(ExecutionQueue::new(1));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue
                    .submit(async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.submit(async { 1 }).await })
        };
        while queue.pending() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(queue.active(), 1);
        assert_eq!(queue.pending(), 1);

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
        assert_eq!(waiter.await.unwrap(), Ok(1));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn abandoned_waiter_leaves_pending_list() {
        let queue = ExecutionQueue::new(1);
        let (_release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = queue.submit(async move {
            let _ = release_rx.await;
        });
        tokio::pin!(holder);
        // Poll once so the holder takes the only slot.
        assert!(futures_poll_once(holder.as_mut()).await.is_none());

        {
            let waiter = queue.submit(async {});
            tokio::pin!(waiter);
            assert!(futures_poll_once(waiter.as_mut()).await.is_none());
            assert_eq!(queue.pending(), 1);
        }
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn closed_queue_rejects_submissions() {
        let queue = ExecutionQueue::new(1);
        queue.close();
        assert_matches!(queue.submit(async {}).await, Err(QueueClosed));
    }

    #[test]
    fn zero_concurrency_is_raised_to_one() {
        assert_eq!(ExecutionQueue::new(0).max_concurrency(), 1);
    }

    /// Poll a future exactly once, returning its output if it completed.
    async fn futures_poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        std::future::poll_fn(|cx| match std::pin::Pin::new(&mut fut).poll(cx) {
            std::task::Poll::Ready(out) => std::task::Poll::Ready(Some(out)),
            std::task::Poll::Pending => std::task::Poll::Ready(None),
        })
        .await
    }
}
