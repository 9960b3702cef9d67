//! Dispatcher core - hot path for request dispatch.
//!
//! Holds the request/response model, the `(method, pattern)` handler table,
//! and the single fault boundary that turns handler errors and panics into
//! structured 500 responses.

// Hot path: avoid incidental allocations.
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::unnecessary_to_owned)]

use crate::binding::BindError;
use crate::router::EndpointTrie;
use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Maximum inline headers before heap allocation.
/// Device responses rarely carry more than a handful.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` because the same names (Content-Type and
/// friends) repeat across every response, and `Arc::clone()` is an O(1)
/// refcount bump rather than a string copy. Values stay `String` as they
/// are per-response data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Captured path-variable values for one matched request.
pub type Bindings = HashMap<String, String>;

/// Which transport channel a request arrived through. Preserved through to
/// its response and used to pick the delivery lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The on-device / short-range transport
    Local,
    /// The uplink transport
    Cloud,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Cloud => write!(f, "cloud"),
        }
    }
}

/// A pre-parsed inbound request handed over by a transport.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method (GET, POST, ...)
    pub method: Method,
    /// Request path (e.g. `/api/user/123`)
    pub path: String,
    /// Serialized request body; empty when the request carried none
    pub body: String,
    /// Non-empty unique id correlating the eventual response to its sender
    pub id: String,
    /// Which transport the request came in on
    pub origin: Origin,
}

/// Response produced by a handler or by the dispatch boundary itself.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code (200, 404, 500, ...)
    pub status: u16,
    /// Response headers (stack-allocated for the common case)
    pub headers: HeaderVec,
    /// Serialized response body
    pub body: String,
    /// Correlation id; back-filled from the request when a handler leaves
    /// it empty
    pub id: String,
    /// Delivery lane; always stamped from the originating request
    pub origin: Origin,
}

impl Response {
    /// Create a response with the given status, headers, and body.
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: String) -> Self {
        Self {
            status,
            headers,
            body,
            id: String::new(),
            origin: Origin::Local,
        }
    }

    /// Create a JSON response with a Content-Type header.
    #[must_use]
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("Content-Type"), "application/json".to_string()));
        Self::new(status, headers, body.to_string())
    }

    /// Create an error response whose body is
    /// `{"error":"<reason phrase>","message":"<message>"}`.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({
                "error": status_reason(status),
                "message": message,
            }),
        )
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Render the response as an HTTP-style wire string: status line with
    /// reason phrase, headers, blank line, body.
    #[must_use]
    pub fn to_http_string(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        let _ = write!(
            out,
            "HTTP/1.1 {} {}\r\n",
            self.status,
            status_reason(self.status)
        );
        for (name, value) in &self.headers {
            let _ = write!(out, "{}: {}\r\n", name, value);
        }
        let _ = write!(out, "Content-Length: {}\r\n\r\n", self.body.len());
        out.push_str(&self.body);
        out
    }
}

/// Reason phrase for a status code.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Fault raised by parameter conversion or a handler body. Contained at the
/// dispatch boundary and converted into a 500 response there.
#[derive(Debug)]
pub enum HandlerError {
    /// A path variable or body field failed typed conversion
    InvalidParameter(BindError),
    /// The handler body itself failed
    Handler(String),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::InvalidParameter(err) => fmt::Display::fmt(err, f),
            HandlerError::Handler(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<BindError> for HandlerError {
    fn from(err: BindError) -> Self {
        HandlerError::InvalidParameter(err)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Handler(err.to_string())
    }
}

/// Message used when a fault carries no text of its own.
const GENERIC_FAULT: &str = "Unknown error occurred";

/// A registered endpoint handler: `(serialized body, bindings) -> Response`.
pub type HandlerFn =
    Box<dyn Fn(&str, &Bindings) -> Result<Response, HandlerError> + Send + Sync>;

/// Routes requests to per-(method, pattern) handlers.
///
/// Owns the [`EndpointTrie`] and one handler table keyed by the
/// `(Method, pattern)` composite. Both are populated at startup and shared
/// immutably (typically behind an `Arc`) while serving; `dispatch_request`
/// takes `&self` and never mutates.
pub struct RequestDispatcher {
    trie: EndpointTrie,
    handlers: HashMap<(Method, String), HandlerFn>,
}

impl Default for RequestDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDispatcher {
    /// Create an empty dispatcher. Routes are added with [`add_route`]
    /// before serving begins.
    ///
    /// [`add_route`]: RequestDispatcher::add_route
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: EndpointTrie::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `(method, pattern)` and compile the pattern
    /// into the trie. Re-registering the same route replaces the previous
    /// handler.
    pub fn add_route<F>(&mut self, method: Method, pattern: &str, handler: F)
    where
        F: Fn(&str, &Bindings) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        let key = (method.clone(), pattern.to_string());
        if self.handlers.remove(&key).is_some() {
            warn!(
                method = %method,
                pattern = %pattern,
                "Replaced existing handler for route"
            );
        }
        self.trie.insert(pattern);
        info!(
            method = %method,
            pattern = %pattern,
            total_routes = self.handlers.len() + 1,
            "Route registered"
        );
        self.handlers.insert(key, Box::new(handler));
    }

    /// Drop every registered route, destroying the compiled trie, ahead of
    /// a wholesale route-set replacement. Startup only, like
    /// [`add_route`](RequestDispatcher::add_route).
    pub fn clear_routes(&mut self) {
        self.handlers.clear();
        self.trie.clear();
        info!("Route set cleared");
    }

    /// Number of registered (method, pattern) routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.handlers.len()
    }

    /// All registered pattern texts, for diagnostics.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.trie.patterns()
    }

    /// Dispatch one request.
    ///
    /// - No pattern matches the path: returns a 404 response whose body
    ///   names the requested path.
    /// - A pattern matches but no handler is registered for the request's
    ///   method on it: returns `None`; the entry is dropped without a
    ///   response.
    /// - The handler fails or panics: returns a 500 response carrying the
    ///   fault's message.
    ///
    /// Every response produced here carries the request's id and origin; a
    /// handler-assigned non-empty id is left untouched.
    #[must_use]
    pub fn dispatch_request(&self, request: &Request) -> Option<Response> {
        let Some(matched) = self.trie.search(&request.path) else {
            warn!(
                method = %request.method,
                path = %request.path,
                "No pattern matched"
            );
            let mut response = Response::error(
                404,
                &format!("No pattern matched for URL: {}", request.path),
            );
            response.id = request.id.clone();
            response.origin = request.origin;
            return Some(response);
        };

        debug!(
            method = %request.method,
            path = %request.path,
            pattern = %matched.pattern,
            bindings = ?matched.bindings,
            "Route matched"
        );

        let key = (request.method.clone(), matched.pattern.clone());
        let Some(handler) = self.handlers.get(&key) else {
            // Pattern exists but not for this verb; the contract is to
            // produce no response at all.
            warn!(
                method = %request.method,
                pattern = %matched.pattern,
                "No handler registered for matched pattern; dropping request"
            );
            return None;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler(&request.body, &matched.bindings)
        }));

        let response = match outcome {
            Ok(Ok(mut response)) => {
                if response.id.is_empty() {
                    response.id = request.id.clone();
                }
                response.origin = request.origin;
                response
            }
            Ok(Err(fault)) => {
                error!(
                    method = %request.method,
                    path = %request.path,
                    pattern = %matched.pattern,
                    fault = %fault,
                    "Handler fault"
                );
                self.internal_error(request, &fault_text(&fault))
            }
            Err(payload) => {
                let message = panic_text(payload.as_ref());
                error!(
                    method = %request.method,
                    path = %request.path,
                    pattern = %matched.pattern,
                    panic_message = %message,
                    "Handler panicked"
                );
                self.internal_error(request, &message)
            }
        };

        Some(response)
    }

    fn internal_error(&self, request: &Request, message: &str) -> Response {
        let mut response = Response::error(500, message);
        response.id = request.id.clone();
        response.origin = request.origin;
        response
    }
}

fn fault_text(fault: &HandlerError) -> String {
    let text = fault.to_string();
    if text.is_empty() {
        GENERIC_FAULT.to_string()
    } else {
        text
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        GENERIC_FAULT.to_string()
    }
}
