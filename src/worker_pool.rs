//! # Worker Pool Module
//!
//! A small pool of `may` coroutines used by the pipeline to run the two
//! transport retrieval tasks concurrently, so one slow or blocked source
//! cannot stall the other or the main drain loop.
//!
//! ## Features
//!
//! - **Shared queue**: workers drain one unbounded MPSC job channel and
//!   load-balance automatically
//! - **Observable completion**: every [`submit`](WorkerPool::submit)
//!   returns a [`Completion`] handle that fires even when the job panics,
//!   so a worker fault can never silently lose a submitted task
//! - **Metrics**: queue depth, submitted, completed, and fault counts
//!
//! ## Configuration
//!
//! - `DUOLANE_RETRIEVAL_WORKERS`: number of worker coroutines (default: 2,
//!   one per transport source)
//! - `DUOLANE_STACK_SIZE`: worker coroutine stack size, decimal or `0x` hex
//!   (default: 64KB)

use crate::runtime_config::parse_size;
use may::sync::mpsc;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Configuration for a worker pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines
    pub num_workers: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let num_workers = std::env::var("DUOLANE_RETRIEVAL_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        let stack_size = std::env::var("DUOLANE_STACK_SIZE")
            .ok()
            .and_then(|s| parse_size(&s))
            .unwrap_or(0x10000);

        Self {
            num_workers,
            stack_size,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 2,
            stack_size: 0x10000, // 64KB
        }
    }
}

/// Metrics for a worker pool.
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    /// Current queue depth (approximate)
    queue_depth: AtomicUsize,
    /// Total jobs submitted
    submitted_count: AtomicU64,
    /// Total jobs completed (including faulted ones)
    completed_count: AtomicU64,
    /// Jobs that panicked while running
    fault_count: AtomicU64,
}

impl WorkerPoolMetrics {
    fn record_submit(&self) {
        self.submitted_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_fault(&self) {
        self.fault_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current queue depth.
    #[must_use]
    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Total jobs submitted.
    #[must_use]
    pub fn get_submitted_count(&self) -> u64 {
        self.submitted_count.load(Ordering::Relaxed)
    }

    /// Total jobs completed.
    #[must_use]
    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    /// Jobs that panicked while running.
    #[must_use]
    pub fn get_fault_count(&self) -> u64 {
        self.fault_count.load(Ordering::Relaxed)
    }
}

/// How a submitted job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The job ran to completion
    Completed,
    /// The job panicked; the fault was logged and counted
    Panicked,
    /// The pool shut down before the job ran
    Lost,
}

/// Handle to one submitted job's completion signal.
///
/// The signal fires exactly once per job, including jobs that panic, so
/// callers that choose to wait can always distinguish "finished" from
/// "still running". The pipeline's main loop holds these without awaiting
/// them.
pub struct Completion {
    rx: mpsc::Receiver<CompletionStatus>,
}

impl Completion {
    /// Block until the job finishes and report how it went.
    #[must_use]
    pub fn wait(&self) -> CompletionStatus {
        self.rx.recv().unwrap_or(CompletionStatus::Lost)
    }
}

/// Error returned when submitting to a pool whose workers have exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolClosed;

impl fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker pool channel disconnected")
    }
}

impl std::error::Error for PoolClosed {}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool of coroutine workers draining a shared job queue.
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    metrics: Arc<WorkerPoolMetrics>,
    config: WorkerPoolConfig,
    name: String,
}

impl WorkerPool {
    /// Create a pool and spawn its worker coroutines.
    ///
    /// # Safety
    ///
    /// This function is marked unsafe because it spawns coroutines using
    /// `may::coroutine::Builder::spawn()`, which is unsafe in the `may`
    /// runtime. The caller must ensure the May coroutine runtime is
    /// properly initialized.
    #[allow(unsafe_code)]
    pub unsafe fn new(name: String, config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let metrics = Arc::new(WorkerPoolMetrics::default());

        // All workers share one receiver and load-balance off it.
        let rx = Arc::new(rx);

        info!(
            pool = %name,
            num_workers = config.num_workers,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        for worker_id in 0..config.num_workers {
            let rx = Arc::clone(&rx);
            let pool_name = name.clone();

            // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by
            // the may runtime. The closure is Send + 'static and owns its
            // captures; job panics are contained by the submit wrapper's
            // catch_unwind, so a fault cannot unwind into the scheduler.
            let spawn_result = unsafe {
                may::coroutine::Builder::new()
                    .stack_size(config.stack_size)
                    .spawn(move || {
                        debug!(pool = %pool_name, worker_id, "Worker coroutine started");
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                        debug!(pool = %pool_name, worker_id, "Worker coroutine exiting");
                    })
            };

            if let Err(e) = spawn_result {
                error!(
                    pool = %name,
                    worker_id,
                    error = %e,
                    "Failed to spawn worker coroutine"
                );
            }
        }

        Self {
            sender: tx,
            metrics,
            config,
            name,
        }
    }

    /// Submit a job and get back its completion handle.
    ///
    /// The job runs under `catch_unwind`; the returned [`Completion`] fires
    /// whether it completes or panics.
    pub fn submit<F>(&self, job: F) -> Result<Completion, PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel::<CompletionStatus>();
        let metrics = Arc::clone(&self.metrics);
        let pool_name = self.name.clone();

        let wrapped: Job = Box::new(move || {
            let status = match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(()) => CompletionStatus::Completed,
                Err(payload) => {
                    metrics.record_fault();
                    error!(
                        pool = %pool_name,
                        panic_message = ?payload.downcast_ref::<&str>(),
                        "Worker job panicked"
                    );
                    CompletionStatus::Panicked
                }
            };
            metrics.record_completion();
            let _ = done_tx.send(status);
        });

        self.metrics.record_submit();
        self.sender.send(wrapped).map_err(|_| PoolClosed)?;
        Ok(Completion { rx: done_rx })
    }

    /// Metrics for this pool.
    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    /// Configuration this pool was built with.
    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.stack_size, 0x10000);
    }

    #[test]
    fn test_worker_pool_metrics() {
        let metrics = WorkerPoolMetrics::default();

        metrics.record_submit();
        assert_eq!(metrics.get_submitted_count(), 1);
        assert_eq!(metrics.get_queue_depth(), 1);

        metrics.record_completion();
        assert_eq!(metrics.get_completed_count(), 1);
        assert_eq!(metrics.get_queue_depth(), 0);

        metrics.record_fault();
        assert_eq!(metrics.get_fault_count(), 1);
    }

    #[test]
    fn test_submit_runs_job_and_completes() {
        let pool = unsafe { WorkerPool::new("test".to_string(), WorkerPoolConfig::default()) };
        let (tx, rx) = may::sync::mpsc::channel::<u32>();

        let completion = pool.submit(move || {
            let _ = tx.send(7);
        });
        let completion = completion.expect("pool open");

        assert_eq!(completion.wait(), CompletionStatus::Completed);
        assert_eq!(rx.recv().ok(), Some(7));
        assert_eq!(pool.metrics().get_completed_count(), 1);
    }

    #[test]
    fn test_completion_fires_on_panic() {
        let pool = unsafe { WorkerPool::new("test".to_string(), WorkerPoolConfig::default()) };

        let completion = pool
            .submit(|| panic!("retrieval exploded"))
            .expect("pool open");

        assert_eq!(completion.wait(), CompletionStatus::Panicked);
        assert_eq!(pool.metrics().get_fault_count(), 1);
        // The fault is counted as completed too; the worker survives.
        assert_eq!(pool.metrics().get_completed_count(), 1);
    }
}
