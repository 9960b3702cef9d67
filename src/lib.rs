//! # duolane
//!
//! **duolane** is an embedded-friendly, HTTP-style request router for
//! memory-constrained devices that talk over two transports at once: a
//! local (on-device / short-range) channel and a cloud uplink.
//!
//! ## Overview
//!
//! Pre-parsed requests (method, path, body, id) enter through either
//! transport, are matched against a compiled set of endpoint patterns with
//! `{name}` path variables, dispatched to per-(method, pattern) handlers,
//! and their responses are delivered back on exactly the lane the request
//! arrived on.
//!
//! ## Architecture
//!
//! - **[`router`]** - segment trie compiling the registered patterns,
//!   matched with backtracking and trailing-slash disambiguation
//! - **[`binding`]** - typed conversion of captured path variables
//!   (percent-decoding, primitives, JSON delegate for structured types)
//! - **[`dispatcher`]** - `(Method, pattern)`-keyed handler table with
//!   fault containment; 404/500 production at a single boundary
//! - **[`queue`]** - the single inbound request FIFO and the dual-lane
//!   (local/cloud) outbound response FIFOs
//! - **[`pipeline`]** - the processing cycle: concurrent retrieval through
//!   a worker pool, queue drains, origin-preserving delivery
//! - **[`worker_pool`]** - `may` coroutine pool with observable job
//!   completions
//! - **[`transport`]** - the per-channel collaborator trait plus an
//!   in-process mailbox implementation
//! - **[`ids`]**, **[`runtime_config`]**, **[`logging`]** - ULID request
//!   ids, env-based runtime knobs, `tracing` subscriber setup
//!
//! ## Data Flow
//!
//! ```text
//! local transport  ─┐                                        ┌─ local sink
//!                   ├─ retrieval pool ─ RequestQueue ─ dispatcher
//! cloud transport  ─┘          (origin-tagged)         │
//!                                        ResponseQueue (two lanes)
//!                                        local lane ───┴─── cloud lane
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use duolane::dispatcher::{RequestDispatcher, Response};
//! use duolane::pipeline::{PipelineConfig, PipelineManager};
//! use duolane::transport::ChannelTransport;
//! use http::Method;
//! use std::sync::Arc;
//!
//! let mut dispatcher = RequestDispatcher::new();
//! dispatcher.add_route(Method::GET, "/api/user/{userId}", |_body, bindings| {
//!     Ok(Response::json(200, serde_json::json!({ "user": bindings["userId"] })))
//! });
//!
//! let local = Arc::new(ChannelTransport::new());
//! let cloud = Arc::new(ChannelTransport::new());
//!
//! let pipeline = unsafe {
//!     PipelineManager::new(local, cloud, Arc::new(dispatcher), PipelineConfig::from_env())
//! };
//! pipeline.start(8080, 9090);
//! pipeline.run(); // loops until pipeline.stop()
//! ```
//!
//! ## Runtime Considerations
//!
//! duolane runs on the `may` coroutine runtime, not tokio. Retrieval
//! workers are coroutines whose stacks are sized by `DUOLANE_STACK_SIZE`;
//! a blocking `receive_message` occupies its worker but never the main
//! loop. The dispatch/delivery path itself never blocks: queue pops return
//! immediately and handler faults are contained at the dispatch boundary.
//!
//! Queues are unbounded by design for the expected device workloads; watch
//! [`pipeline::PipelineManager::queue_depths`] if your producers can burst.

pub mod binding;
pub mod dispatcher;
mod echo;
pub mod ids;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod router;
pub mod runtime_config;
pub mod transport;
pub mod worker_pool;

pub use dispatcher::{
    HandlerError, Origin, Request, RequestDispatcher, Response,
};
pub use echo::echo_handler;
pub use pipeline::{PipelineConfig, PipelineManager, PipelineMetrics};
pub use router::{EndpointTrie, RouteMatch};
pub use transport::{ChannelTransport, Transport};
