//! Bounded concurrency scheduler
//!
//! Tasks are queued through a [`SchedulerHandle`] (cloneable, so running
//! tasks can queue follow-up work) and executed by [`Scheduler::join_until`]
//! on a task group, at most `parallel` at a time. A failing task only logs;
//! its siblings keep running. When the deadline passes, outstanding tasks are
//! aborted and the queue is closed.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, warn};

use crate::error::{ProbeError, Result};

type Task = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

struct Job {
    label: String,
    task: Task,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicUsize,
    failed: AtomicUsize,
}

/// Outcome of a [`Scheduler::join_until`] barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSummary {
    /// Tasks queued over the scheduler's lifetime
    pub scheduled: usize,
    /// Tasks that returned an error or panicked
    pub failed: usize,
    /// False when the deadline cut the barrier short
    pub completed: bool,
}

/// Cloneable handle for queueing work
#[derive(Clone)]
pub struct SchedulerHandle {
    queue: mpsc::UnboundedSender<Job>,
    counters: Arc<Counters>,
}

impl SchedulerHandle {
    /// Queue a task. Returns false once the scheduler stopped accepting work.
    pub fn schedule<F>(&self, label: impl Into<String>, task: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let job = Job {
            label: label.into(),
            task: Box::pin(task),
        };
        if self.queue.send(job).is_err() {
            return false;
        }
        self.counters.scheduled.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Task group with a fixed concurrency limit
pub struct Scheduler {
    handle: SchedulerHandle,
    queue: mpsc::UnboundedReceiver<Job>,
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    /// Create a scheduler running at most `parallel` tasks at once
    pub fn new(parallel: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle: SchedulerHandle {
                queue: tx,
                counters: Arc::new(Counters::default()),
            },
            queue: rx,
            semaphore: Arc::new(Semaphore::new(parallel.max(1))),
        }
    }

    /// Handle for queueing work, also from inside running tasks
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Queue a task
    pub fn schedule<F>(&self, label: impl Into<String>, task: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.handle.schedule(label, task)
    }

    /// Run queued tasks until every task, including ones queued by running
    /// tasks, has finished or `deadline` passes.
    pub async fn join_until(&mut self, deadline: Instant) -> JoinSummary {
        let mut running = JoinSet::new();
        let completed = timeout_at(deadline, self.drive(&mut running))
            .await
            .is_ok();

        if !completed {
            self.queue.close();
            running.abort_all();
        }

        let counters = &self.handle.counters;
        JoinSummary {
            scheduled: counters.scheduled.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            completed,
        }
    }

    async fn drive(&mut self, running: &mut JoinSet<()>) {
        loop {
            while let Ok(job) = self.queue.try_recv() {
                self.spawn(running, job);
            }
            if running.is_empty() {
                return;
            }

            tokio::select! {
                Some(job) = self.queue.recv() => self.spawn(running, job),
                Some(joined) = running.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "probe task panicked");
                            self.handle.counters.failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
                else => return,
            }
        }
    }

    fn spawn(&self, running: &mut JoinSet<()>, job: Job) {
        let semaphore = Arc::clone(&self.semaphore);
        let counters = Arc::clone(&self.handle.counters);

        running.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            if let Err(e) = job.task.await {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                match e {
                    ProbeError::DeadlineExceeded => {
                        warn!(query = %job.label, error = %e, "query failed")
                    }
                    _ => error!(query = %job.label, error = %e, "query failed"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[tokio::test]
    async fn test_runs_all_tasks() {
        let mut scheduler = Scheduler::new(3);
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let done = Arc::clone(&done);
            scheduler.schedule(format!("task{i}"), async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let summary = scheduler.join_until(far_deadline()).await;
        assert!(summary.completed);
        assert_eq!(summary.scheduled, 10);
        assert_eq!(summary.failed, 0);
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut scheduler = Scheduler::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..8 {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            scheduler.schedule(format!("task{i}"), async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let summary = scheduler.join_until(far_deadline()).await;
        assert!(summary.completed);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_join_waits_for_nested_tasks() {
        let mut scheduler = Scheduler::new(1);
        let handle = scheduler.handle();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_done = Arc::clone(&done);
        scheduler.schedule("parent", async move {
            for i in 0..3 {
                let done = Arc::clone(&inner_done);
                handle.schedule(format!("child{i}"), async move {
                    sleep(Duration::from_millis(5)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
            Ok(())
        });

        let summary = scheduler.join_until(far_deadline()).await;
        assert!(summary.completed);
        assert_eq!(summary.scheduled, 4);
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let mut scheduler = Scheduler::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        scheduler.schedule("broken", async { Err(ProbeError::Authentication) });
        for i in 0..4 {
            let done = Arc::clone(&done);
            scheduler.schedule(format!("task{i}"), async move {
                sleep(Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let summary = scheduler.join_until(far_deadline()).await;
        assert!(summary.completed);
        assert_eq!(summary.failed, 1);
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_deadline_aborts_and_closes_queue() {
        let mut scheduler = Scheduler::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..2 {
            let done = Arc::clone(&done);
            scheduler.schedule(format!("slow{i}"), async move {
                sleep(Duration::from_secs(60)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let deadline = Instant::now() + Duration::from_millis(50);
        let summary = scheduler.join_until(deadline).await;

        assert!(!summary.completed);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert!(!scheduler.schedule("late", async { Ok(()) }));
    }
}
