//! # Router Module
//!
//! Path matching and route resolution. Registered endpoint patterns are
//! compiled into an [`EndpointTrie`]; incoming request paths are matched
//! with backtracking descent, yielding the pattern text and the values
//! captured for each `{name}` variable segment.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling the registered pattern set into a segment trie at startup
//! - Matching concrete request paths against that set
//! - Extracting variable bindings from matched paths
//!
//! Method selection does not happen here: the trie answers "which pattern",
//! and the [`dispatcher`](crate::dispatcher) resolves (method, pattern) to
//! a handler.
//!
//! ## Example
//!
//! ```rust
//! use duolane::router::EndpointTrie;
//!
//! let mut trie = EndpointTrie::new();
//! trie.insert("/api/user/{userId}/get");
//!
//! let m = trie.search("/api/user/123/get").unwrap();
//! assert_eq!(m.pattern, "/api/user/{userId}/get");
//! assert_eq!(m.bindings["userId"], "123");
//! ```

mod trie;

pub use trie::{EndpointTrie, RouteMatch};
