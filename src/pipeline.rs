//! # Pipeline Module
//!
//! The dual-lane pipeline drives the whole request lifecycle on a device:
//! two transport sources (local and cloud) are polled concurrently by a
//! retrieval worker pool, inbound requests funnel through one
//! [`RequestQueue`] into the dispatcher, and responses fan back out through
//! the dual-lane [`ResponseQueue`] to the transport they came from.
//!
//! ## One processing cycle
//!
//! 1. Submit one retrieval job per transport to the worker pool. Each job
//!    pulls a message, stamps it with its origin, and enqueues it. The main
//!    loop does not await the jobs; their [`Completion`] handles exist so a
//!    worker fault is observable rather than a silent loss.
//! 2. Drain the request queue completely, dispatching each entry and
//!    pushing any resulting response into its origin's lane.
//! 3. Drain both response lanes completely, delivering each response
//!    through its own transport. Entries with an empty id or empty body are
//!    dropped and counted, never retried.
//! 4. Sleep for the configured poll interval and repeat.
//!
//! The main loop never blocks inside a cycle: queue pops return `None`
//! immediately, and the possibly-blocking `receive_message` calls happen
//! only on pool workers. A hung source costs its worker until the call
//! returns; the other lane and the drain loop keep moving.
//!
//! ## Ordering
//!
//! Within a lane, responses leave in the order their requests were
//! dispatched. Nothing is guaranteed across the two lanes.

use crate::dispatcher::{Origin, RequestDispatcher, Response};
use crate::queue::{RequestQueue, ResponseQueue};
use crate::transport::Transport;
use crate::worker_pool::{Completion, WorkerPool, WorkerPoolConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pipeline tunables.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Sleep between processing cycles. A tunable, not a correctness
    /// property.
    pub poll_interval: Duration,
    /// Retrieval worker pool settings
    pub workers: WorkerPoolConfig,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `DUOLANE_POLL_INTERVAL_MS`: cycle sleep in milliseconds
    ///   (default: 50)
    /// - worker settings per [`WorkerPoolConfig::from_env`]
    #[must_use]
    pub fn from_env() -> Self {
        let poll_ms = std::env::var("DUOLANE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);
        Self {
            poll_interval: Duration::from_millis(poll_ms),
            workers: WorkerPoolConfig::from_env(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            workers: WorkerPoolConfig::default(),
        }
    }
}

/// Counters for everything that moves through the pipeline.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    retrieved_local: AtomicU64,
    retrieved_cloud: AtomicU64,
    dispatched: AtomicU64,
    dropped_unrouted: AtomicU64,
    delivered_local: AtomicU64,
    delivered_cloud: AtomicU64,
    dropped_malformed: AtomicU64,
    send_failures: AtomicU64,
}

impl PipelineMetrics {
    fn record_retrieved(&self, origin: Origin) {
        match origin {
            Origin::Local => self.retrieved_local.fetch_add(1, Ordering::Relaxed),
            Origin::Cloud => self.retrieved_cloud.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped_unrouted(&self) {
        self.dropped_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivered(&self, lane: Origin) {
        match lane {
            Origin::Local => self.delivered_local.fetch_add(1, Ordering::Relaxed),
            Origin::Cloud => self.delivered_cloud.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_dropped_malformed(&self) {
        self.dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests retrieved per `(local, cloud)` source.
    #[must_use]
    pub fn get_retrieved(&self) -> (u64, u64) {
        (
            self.retrieved_local.load(Ordering::Relaxed),
            self.retrieved_cloud.load(Ordering::Relaxed),
        )
    }

    /// Requests popped from the queue and dispatched.
    #[must_use]
    pub fn get_dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Dispatches that produced no response (matched pattern, unmapped
    /// method).
    #[must_use]
    pub fn get_dropped_unrouted(&self) -> u64 {
        self.dropped_unrouted.load(Ordering::Relaxed)
    }

    /// Responses delivered per `(local, cloud)` sink.
    #[must_use]
    pub fn get_delivered(&self) -> (u64, u64) {
        (
            self.delivered_local.load(Ordering::Relaxed),
            self.delivered_cloud.load(Ordering::Relaxed),
        )
    }

    /// Responses dropped at delivery for a missing id or empty body.
    #[must_use]
    pub fn get_dropped_malformed(&self) -> u64 {
        self.dropped_malformed.load(Ordering::Relaxed)
    }

    /// Deliveries the transport refused.
    #[must_use]
    pub fn get_send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

/// Drives retrieval, dispatch, and origin-preserving delivery.
///
/// Owns the queues and the retrieval worker pool; shares the dispatcher
/// and the two transports. Everything here takes `&self`, so the manager
/// is typically wrapped in an `Arc` with [`run`](PipelineManager::run)
/// spawned on its own coroutine.
pub struct PipelineManager {
    local: Arc<dyn Transport>,
    cloud: Arc<dyn Transport>,
    dispatcher: Arc<RequestDispatcher>,
    requests: Arc<RequestQueue>,
    responses: Arc<ResponseQueue>,
    pool: WorkerPool,
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
    running: AtomicBool,
}

impl PipelineManager {
    /// Create a pipeline over the two transports and a populated
    /// dispatcher.
    ///
    /// # Safety
    ///
    /// This function is marked unsafe because it spawns the retrieval
    /// worker coroutines via [`WorkerPool::new`]. The caller must ensure
    /// the May coroutine runtime is properly initialized.
    #[allow(unsafe_code)]
    pub unsafe fn new(
        local: Arc<dyn Transport>,
        cloud: Arc<dyn Transport>,
        dispatcher: Arc<RequestDispatcher>,
        config: PipelineConfig,
    ) -> Self {
        // SAFETY: forwarded to WorkerPool::new; same runtime requirement.
        let pool = unsafe { WorkerPool::new("retrieval".to_string(), config.workers) };
        Self {
            local,
            cloud,
            dispatcher,
            requests: Arc::new(RequestQueue::new()),
            responses: Arc::new(ResponseQueue::new()),
            pool,
            config,
            metrics: Arc::new(PipelineMetrics::default()),
            running: AtomicBool::new(false),
        }
    }

    /// Start both transports. Returns `false` if either refused.
    pub fn start(&self, local_port: u16, cloud_port: u16) -> bool {
        let local_ok = self.local.start(local_port);
        let cloud_ok = self.cloud.start(cloud_port);
        if local_ok && cloud_ok {
            info!(local_port, cloud_port, "Pipeline transports started");
        } else {
            warn!(local_ok, cloud_ok, "Transport failed to start");
        }
        local_ok && cloud_ok
    }

    /// Stop the loop and both transports.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.local.stop();
        self.cloud.stop();
        info!("Pipeline stopped");
    }

    /// Whether [`run`](PipelineManager::run) is looping.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Loop cycles until [`stop`](PipelineManager::stop) is called.
    /// Blocks the calling coroutine.
    pub fn run(&self) {
        self.running.store(true, Ordering::Relaxed);
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Pipeline loop started"
        );
        while self.running.load(Ordering::Relaxed) {
            self.run_cycle();
            may::coroutine::sleep(self.config.poll_interval);
        }
        info!("Pipeline loop exited");
    }

    /// One full processing cycle: poll, drain requests, drain responses.
    pub fn run_cycle(&self) {
        // Fire-and-forget from the loop's perspective; the completions are
        // observable but deliberately not awaited, so a blocked source
        // cannot stall the drains.
        let _ = self.poll_transports();
        self.drain_requests();
        self.drain_responses();
    }

    /// Submit one retrieval job per transport. Returns the completion
    /// handles for callers that want to synchronize (tests do; the main
    /// loop does not).
    pub fn poll_transports(&self) -> (Option<Completion>, Option<Completion>) {
        (
            self.submit_retrieval(Origin::Local),
            self.submit_retrieval(Origin::Cloud),
        )
    }

    fn submit_retrieval(&self, origin: Origin) -> Option<Completion> {
        let transport = match origin {
            Origin::Local => Arc::clone(&self.local),
            Origin::Cloud => Arc::clone(&self.cloud),
        };
        let queue = Arc::clone(&self.requests);
        let metrics = Arc::clone(&self.metrics);

        let submitted = self.pool.submit(move || {
            // May block this worker; that is exactly why it runs here and
            // not on the main loop.
            if let Some(mut request) = transport.receive_message() {
                request.origin = origin;
                metrics.record_retrieved(origin);
                queue.enqueue(request);
            }
        });

        match submitted {
            Ok(completion) => Some(completion),
            Err(e) => {
                error!(origin = %origin, error = %e, "Failed to submit retrieval task");
                None
            }
        }
    }

    /// Pop and dispatch every queued request, pushing responses into their
    /// origin lanes.
    pub fn drain_requests(&self) {
        while self.requests.has_requests() {
            let Some(request) = self.requests.dequeue() else {
                break;
            };
            debug!(
                id = %request.id,
                method = %request.method,
                path = %request.path,
                origin = %request.origin,
                "Dispatching request"
            );
            self.metrics.record_dispatched();
            match self.dispatcher.dispatch_request(&request) {
                Some(response) => self.responses.enqueue(response),
                None => self.metrics.record_dropped_unrouted(),
            }
        }
    }

    /// Deliver every queued response on its own lane.
    pub fn drain_responses(&self) {
        while let Some(response) = self.responses.dequeue_local() {
            self.deliver(response, Origin::Local);
        }
        while let Some(response) = self.responses.dequeue_cloud() {
            self.deliver(response, Origin::Cloud);
        }
    }

    fn deliver(&self, response: Response, lane: Origin) {
        if response.id.is_empty() || response.body.is_empty() {
            warn!(
                lane = %lane,
                status = response.status,
                has_id = !response.id.is_empty(),
                "Dropping malformed outbound response"
            );
            self.metrics.record_dropped_malformed();
            return;
        }

        let transport = match lane {
            Origin::Local => &self.local,
            Origin::Cloud => &self.cloud,
        };
        let serialized = response.to_http_string();
        if transport.send_message(&response.id, &serialized) {
            self.metrics.record_delivered(lane);
            debug!(id = %response.id, lane = %lane, status = response.status, "Response delivered");
        } else {
            warn!(id = %response.id, lane = %lane, "Transport rejected response; dropping");
            self.metrics.record_send_failure();
        }
    }

    /// Pipeline counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Live queue depths: `(requests, (local responses, cloud responses))`.
    #[must_use]
    pub fn queue_depths(&self) -> (usize, (usize, usize)) {
        (self.requests.len(), self.responses.lane_depths())
    }

    /// Retrieval pool metrics.
    #[must_use]
    pub fn pool_metrics(&self) -> &Arc<crate::worker_pool::WorkerPoolMetrics> {
        self.pool.metrics()
    }
}
