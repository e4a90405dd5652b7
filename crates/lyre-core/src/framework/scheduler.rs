//! Cooperative per-instance scheduler.
//!
//! Each instance owns one [`Scheduler`]. Host events, bridge callbacks and
//! broadcasts from other instances are queued as jobs and executed by a single
//! task, one at a time and each to completion. Script code therefore never
//! runs concurrently with other script code of the same instance.
//!
//! ```text
//!  host event ─┐
//!  callback ───┼──▶ [ job queue ] ──▶ run loop ──▶ job 1, job 2, ...
//!  broadcast ──┘
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use super::handler::panic_message;

type Job = BoxFuture<'static, ()>;

/// Cloneable handle for queueing jobs on a scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    instance: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
    queued: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Queues `job` to run after everything queued before it.
    ///
    /// Returns `false` when the scheduler has already stopped; the job is
    /// dropped in that case.
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.tx.send(Box::pin(job)) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                debug!(instance = %self.instance, "Scheduler stopped, dropping job");
                false
            }
        }
    }

    /// Returns `true` once the run loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the total number of jobs accepted so far.
    pub fn jobs_queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Returns the id of the owning instance.
    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("instance", &self.instance)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The job queue and its run loop.
pub struct Scheduler {
    handle: SchedulerHandle,
    rx: mpsc::UnboundedReceiver<Job>,
    token: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler for `instance`.
    pub fn new(instance: impl Into<Arc<str>>) -> Self {
        Self::with_token(instance, CancellationToken::new())
    }

    /// Creates a scheduler that stops when `token` is cancelled.
    pub fn with_token(instance: impl Into<Arc<str>>, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle: SchedulerHandle {
                instance: instance.into(),
                tx,
                queued: Arc::new(AtomicU64::new(0)),
            },
            rx,
            token,
        }
    }

    /// Returns a handle for queueing jobs.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Returns the token that stops the run loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs queued jobs until the token is cancelled or every handle is gone.
    ///
    /// Cancellation is observed between jobs; a running job always finishes.
    /// Jobs still queued at that point are dropped.
    pub async fn run(self) {
        let Self { handle, mut rx, token } = self;
        let instance = handle.instance.clone();
        drop(handle);

        debug!(instance = %instance, "Scheduler started");
        let mut executed = 0_u64;

        loop {
            let job = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            executed += 1;
            trace!(instance = %instance, job = executed, "Running job");
            if let Err(payload) = AssertUnwindSafe(job).catch_unwind().await {
                error!(
                    instance = %instance,
                    panic = %panic_message(payload.as_ref()),
                    "Scheduled job panicked"
                );
            }
        }

        rx.close();
        debug!(instance = %instance, executed, "Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_jobs_run_in_fifo_order() {
        let scheduler = Scheduler::new("i1");
        let handle = scheduler.handle();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..5 {
            let log = Arc::clone(&log);
            assert!(handle.spawn(async move {
                tokio::task::yield_now().await;
                log.lock().push(n);
            }));
        }
        drop(handle);
        scheduler.run().await;

        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_jobs_do_not_interleave() {
        let scheduler = Scheduler::new("i1");
        let handle = scheduler.handle();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = Arc::clone(&log);
            handle.spawn(async move {
                log.lock().push(format!("{tag}-start"));
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                log.lock().push(format!("{tag}-end"));
            });
        }
        drop(handle);
        scheduler.run().await;

        assert_eq!(*log.lock(), vec!["a-start", "a-end", "b-start", "b-end"]);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_loop() {
        let scheduler = Scheduler::new("i1");
        let handle = scheduler.handle();
        let (tx, rx) = oneshot::channel();

        handle.spawn(async {
            if true {
                panic!("job failed");
            }
        });
        handle.spawn(async move {
            let _ = tx.send("survived");
        });
        drop(handle);
        scheduler.run().await;

        assert_eq!(rx.await.unwrap(), "survived");
    }

    #[tokio::test]
    async fn test_cancel_stops_and_rejects_jobs() {
        let scheduler = Scheduler::new("i1");
        let handle = scheduler.handle();
        let token = scheduler.cancellation_token();

        let task = tokio::spawn(scheduler.run());
        token.cancel();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert!(!handle.spawn(async {}));
    }
}
