//! Inbound and outbound buffering between the transports, the dispatcher,
//! and the delivery loop.
//!
//! [`RequestQueue`] is a single mutex-guarded FIFO fed by the retrieval
//! workers and drained by the pipeline's main loop. [`ResponseQueue`] keeps
//! two independently locked FIFOs ("lanes"), one per [`Origin`]; a response
//! enqueued under one origin is only ever retrievable from that lane.
//!
//! Pops never block: an empty queue returns `None` immediately. Queues are
//! unbounded by design for the target workloads; depths are observable via
//! [`RequestQueue::len`] and [`ResponseQueue::lane_depths`] so operators
//! can watch for producers outpacing the drain cycle.

use crate::dispatcher::{Origin, Request, Response};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// Thread-safe FIFO of inbound requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    inner: Mutex<VecDeque<Request>>,
}

impl RequestQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request to the back of the queue.
    pub fn enqueue(&self, request: Request) {
        debug!(id = %request.id, origin = %request.origin, "Request enqueued");
        self.inner.lock().push_back(request);
    }

    /// Pop the oldest request, or `None` when the queue is empty.
    #[must_use]
    pub fn dequeue(&self) -> Option<Request> {
        self.inner.lock().pop_front()
    }

    /// Snapshot: is the queue empty right now?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot: are there requests waiting?
    #[must_use]
    pub fn has_requests(&self) -> bool {
        !self.is_empty()
    }

    /// Current depth, for metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Thread-safe dual-lane FIFO of outbound responses, partitioned by origin.
///
/// The lanes are locked independently so local and cloud delivery never
/// contend with each other. The combined [`is_empty`] check acquires the
/// locks in a fixed order (local, then cloud).
///
/// [`is_empty`]: ResponseQueue::is_empty
#[derive(Debug, Default)]
pub struct ResponseQueue {
    local: Mutex<VecDeque<Response>>,
    cloud: Mutex<VecDeque<Response>>,
}

impl ResponseQueue {
    /// Create an empty queue pair.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response to the lane matching its origin tag.
    pub fn enqueue(&self, response: Response) {
        debug!(
            id = %response.id,
            origin = %response.origin,
            status = response.status,
            "Response enqueued"
        );
        match response.origin {
            Origin::Local => self.local.lock().push_back(response),
            Origin::Cloud => self.cloud.lock().push_back(response),
        }
    }

    /// Pop the oldest local-lane response.
    #[must_use]
    pub fn dequeue_local(&self) -> Option<Response> {
        self.local.lock().pop_front()
    }

    /// Pop the oldest cloud-lane response.
    #[must_use]
    pub fn dequeue_cloud(&self) -> Option<Response> {
        self.cloud.lock().pop_front()
    }

    /// True only when both lanes are empty. Locks local, then cloud.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let local_empty = self.local.lock().is_empty();
        let cloud_empty = self.cloud.lock().is_empty();
        local_empty && cloud_empty
    }

    /// Current `(local, cloud)` depths, for metrics.
    #[must_use]
    pub fn lane_depths(&self) -> (usize, usize) {
        let local = self.local.lock().len();
        let cloud = self.cloud.lock().len();
        (local, cloud)
    }
}
