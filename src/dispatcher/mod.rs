//! # Dispatcher Module
//!
//! Method-keyed request dispatch with fault containment.
//!
//! ## Overview
//!
//! The dispatcher owns the compiled [`EndpointTrie`](crate::router::EndpointTrie)
//! and one handler table keyed by the `(Method, pattern)` composite. For
//! each inbound [`Request`] it:
//!
//! 1. Matches the path against the trie; a miss produces a structured 404.
//! 2. Resolves `(method, matched pattern)` to a handler; a matched pattern
//!    with no handler for the verb yields no response at all.
//! 3. Invokes the handler with the serialized body and the captured
//!    bindings. Conversion faults, handler errors, and panics are all
//!    contained here and converted into structured 500 responses.
//!
//! Every response leaving the dispatcher carries the originating request's
//! id and origin tag, so the pipeline can deliver it on the correct lane.
//!
//! ## Handler Registration
//!
//! Handlers are registered at startup, before the dispatcher is shared:
//!
//! ```rust
//! use duolane::dispatcher::{RequestDispatcher, Response};
//! use http::Method;
//!
//! let mut dispatcher = RequestDispatcher::new();
//! dispatcher.add_route(Method::GET, "/api/user/{userId}", |_body, bindings| {
//!     Ok(Response::json(200, serde_json::json!({
//!         "user": bindings["userId"],
//!     })))
//! });
//! ```

mod core;

pub use core::{
    status_reason, Bindings, HandlerError, HandlerFn, HeaderVec, Origin, Request,
    RequestDispatcher, Response, MAX_INLINE_HEADERS,
};
