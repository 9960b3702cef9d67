//! Arena-backed trie for endpoint pattern matching
//!
//! Patterns are `/`-separated templates whose segments are either literal
//! tokens (`user`) or named variables (`{userId}`). The trie is compiled
//! once at startup from the full pattern set and is never mutated while
//! serving; `search` walks it with backtracking and extracts variable
//! bindings from the concrete path.
//!
//! ## Storage
//!
//! Nodes live in a single `Vec` and refer to their children by index. A
//! partially built tree is just a `Vec` that gets dropped; there is no
//! manual teardown and no parent/child ownership to get wrong.
//!
//! ## Matching rules
//!
//! - Literal children are preferred over variable children at each level,
//!   but the preference is local: a literal branch that fails deeper down
//!   is abandoned and the variable children at that level are tried next.
//! - A trailing slash is represented as one synthetic empty segment. It
//!   matches only when the node reached so far is itself terminal and no
//!   variable has been bound, so `/res/` matches `/res` while `/res/123/`
//!   does not match `/res/{id}`.
//! - Interior empty segments (`/a//b`) are dropped during splitting.
//!
//! Worst-case complexity is exponential in the pattern set, which is
//! acceptable for the tens of endpoints these devices register.

use smallvec::SmallVec;
use std::collections::HashMap;

/// Maximum path segments before the scratch vector spills to the heap.
/// Device endpoints sit well under this depth.
const MAX_INLINE_SEGMENTS: usize = 8;

type SegmentVec<'a> = SmallVec<[&'a str; MAX_INLINE_SEGMENTS]>;

/// Result of successfully matching a path against the registered patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The matched pattern exactly as it was inserted (e.g. `/api/user/{userId}/get`)
    pub pattern: String,
    /// Captured values for each variable segment (e.g. `{"userId": "123"}`)
    pub bindings: HashMap<String, String>,
}

#[derive(Debug, Default, Clone)]
struct TrieNode {
    /// Literal segment text to child index
    literal: HashMap<String, usize>,
    /// Variable name to child index; multiple entries are alternative
    /// bindings tried in unspecified order
    variable: HashMap<String, usize>,
    /// Pattern text if this node completes an endpoint
    terminal: Option<String>,
}

const ROOT: usize = 0;

/// Trie indexing the registered endpoint patterns by path segment.
///
/// Built once before traffic is served; `search` takes `&self` and never
/// mutates the structure. Replacing the route set goes through [`clear`]
/// followed by fresh inserts.
///
/// [`clear`]: EndpointTrie::clear
#[derive(Debug, Clone)]
pub struct EndpointTrie {
    nodes: Vec<TrieNode>,
}

impl Default for EndpointTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointTrie {
    /// Create an empty trie containing only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    /// Insert an endpoint pattern. Re-inserting the same pattern is a no-op.
    pub fn insert(&mut self, pattern: &str) {
        let segments = split_segments(pattern);
        let mut current = ROOT;
        for segment in segments {
            current = match variable_name(segment) {
                Some(name) => self.variable_child(current, name),
                None => self.literal_child(current, segment),
            };
        }
        self.nodes[current].terminal = Some(pattern.to_string());
    }

    /// Match a concrete path, returning the pattern and variable bindings.
    #[must_use]
    pub fn search(&self, path: &str) -> Option<RouteMatch> {
        let segments = split_segments(path);
        let mut bindings = HashMap::new();
        let pattern = self.search_at(ROOT, &segments, &mut bindings)?;
        Some(RouteMatch {
            pattern: pattern.to_string(),
            bindings,
        })
    }

    /// True when no pattern has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[ROOT];
        root.terminal.is_none() && root.literal.is_empty() && root.variable.is_empty()
    }

    /// Drop every registered pattern, leaving a fresh root. Used when the
    /// route set is replaced wholesale before serving resumes.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(TrieNode::default());
    }

    /// All registered pattern texts, for diagnostics and metric
    /// pre-registration.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|node| node.terminal.clone())
            .collect()
    }

    fn literal_child(&mut self, node: usize, segment: &str) -> usize {
        if let Some(&child) = self.nodes[node].literal.get(segment) {
            return child;
        }
        let child = self.push_node();
        self.nodes[node].literal.insert(segment.to_string(), child);
        child
    }

    fn variable_child(&mut self, node: usize, name: &str) -> usize {
        if let Some(&child) = self.nodes[node].variable.get(name) {
            return child;
        }
        let child = self.push_node();
        self.nodes[node].variable.insert(name.to_string(), child);
        child
    }

    fn push_node(&mut self) -> usize {
        self.nodes.push(TrieNode::default());
        self.nodes.len() - 1
    }

    fn search_at(
        &self,
        node: usize,
        segments: &[&str],
        bindings: &mut HashMap<String, String>,
    ) -> Option<&str> {
        let Some((&segment, rest)) = segments.split_first() else {
            return self.nodes[node].terminal.as_deref();
        };

        if segment.is_empty() {
            if rest.is_empty() {
                // Trailing-slash marker: only an exact literal endpoint
                // qualifies, and only if no variable was consumed on the
                // way here.
                if bindings.is_empty() {
                    return self.nodes[node].terminal.as_deref();
                }
                return None;
            }
            // Empty segment with more path behind it is abnormal input;
            // fall through to the variable children below.
        } else if let Some(&child) = self.nodes[node].literal.get(segment) {
            if let Some(found) = self.search_at(child, rest, bindings) {
                return Some(found);
            }
            // Literal branch failed deeper down; backtrack into variables.
        }

        for (name, &child) in &self.nodes[node].variable {
            bindings.insert(name.clone(), segment.to_string());
            if let Some(found) = self.search_at(child, rest, bindings) {
                return Some(found);
            }
            bindings.remove(name);
        }

        None
    }
}

/// Split a path or pattern into matchable segments.
///
/// `"/api/user/create"` -> `["api", "user", "create"]`
/// `"/api/user/123/"`   -> `["api", "user", "123", ""]`
/// `"/api//user"`       -> `["api", "user"]`
/// `"/"` and `""`       -> `[]`
fn split_segments(path: &str) -> SegmentVec<'_> {
    let mut segments = SegmentVec::new();
    if path.is_empty() || path == "/" {
        return segments;
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (body, trailing_slash) = match trimmed.strip_suffix('/') {
        Some(body) => (body, true),
        None => (trimmed, false),
    };

    for segment in body.split('/') {
        if !segment.is_empty() {
            segments.push(segment);
        }
    }
    if trailing_slash {
        segments.push("");
    }
    segments
}

/// `"{userId}"` -> `Some("userId")`, anything else -> `None`.
fn variable_name(segment: &str) -> Option<&str> {
    if segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}') {
        Some(&segment[1..segment.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(patterns: &[&str]) -> EndpointTrie {
        let mut t = EndpointTrie::new();
        for p in patterns {
            t.insert(p);
        }
        t
    }

    #[test]
    fn test_literal_match() {
        let t = trie(&["/api/user/create"]);
        let m = t.search("/api/user/create").unwrap();
        assert_eq!(m.pattern, "/api/user/create");
        assert!(m.bindings.is_empty());
    }

    #[test]
    fn test_single_variable() {
        let t = trie(&["/api/user/{userId}/get"]);
        let m = t.search("/api/user/123/get").unwrap();
        assert_eq!(m.pattern, "/api/user/{userId}/get");
        assert_eq!(m.bindings.get("userId"), Some(&"123".to_string()));
    }

    #[test]
    fn test_multiple_variables() {
        let t = trie(&["/hello/{a}/{b}/{c}"]);
        let m = t.search("/hello/1/2/3").unwrap();
        assert_eq!(m.bindings.get("a"), Some(&"1".to_string()));
        assert_eq!(m.bindings.get("b"), Some(&"2".to_string()));
        assert_eq!(m.bindings.get("c"), Some(&"3".to_string()));
    }

    #[test]
    fn test_no_match() {
        let t = trie(&["/api/user/{userId}"]);
        assert!(t.search("/api/post/123").is_none());
        assert!(t.search("/api/user/123/extra").is_none());
        assert!(t.search("/api").is_none());
    }

    #[test]
    fn test_literal_preferred_over_variable() {
        let t = trie(&["/api/user/admin", "/api/user/{id}"]);
        let m = t.search("/api/user/admin").unwrap();
        assert_eq!(m.pattern, "/api/user/admin");
        assert!(m.bindings.is_empty());

        let m = t.search("/api/user/99").unwrap();
        assert_eq!(m.pattern, "/api/user/{id}");
        assert_eq!(m.bindings.get("id"), Some(&"99".to_string()));
    }

    #[test]
    fn test_literal_failure_backtracks_into_variable() {
        // A literal branch that dead-ends deeper down must not shadow a
        // variable branch at a shallower level.
        let t = trie(&["/files/static/info", "/files/{name}/download"]);
        let m = t.search("/files/static/download").unwrap();
        assert_eq!(m.pattern, "/files/{name}/download");
        assert_eq!(m.bindings.get("name"), Some(&"static".to_string()));
    }

    #[test]
    fn test_divergent_variable_names_at_same_position() {
        let t = trie(&["/users/{userId}/posts", "/users/{id}/comments"]);

        let m = t.search("/users/123/posts").unwrap();
        assert_eq!(m.pattern, "/users/{userId}/posts");
        assert_eq!(m.bindings.get("userId"), Some(&"123".to_string()));
        assert!(m.bindings.get("id").is_none());

        let m = t.search("/users/456/comments").unwrap();
        assert_eq!(m.pattern, "/users/{id}/comments");
        assert_eq!(m.bindings.get("id"), Some(&"456".to_string()));
        assert!(m.bindings.get("userId").is_none());
    }

    #[test]
    fn test_trailing_slash_matches_literal_endpoint() {
        let t = trie(&["/xyz"]);
        let m = t.search("/xyz/").unwrap();
        assert_eq!(m.pattern, "/xyz");
        assert!(m.bindings.is_empty());
    }

    #[test]
    fn test_trailing_slash_rejected_after_variable() {
        let t = trie(&["/api/user/{userId}"]);
        assert!(t.search("/api/user/123").is_some());
        assert!(t.search("/api/user/123/").is_none());
    }

    #[test]
    fn test_interior_double_slash_collapses() {
        let t = trie(&["/a/b"]);
        let with_doubled = t.search("/a//b").unwrap();
        let plain = t.search("/a/b").unwrap();
        assert_eq!(with_doubled, plain);
    }

    #[test]
    fn test_root_path_matches_nothing_by_default() {
        let t = trie(&["/api"]);
        assert!(t.search("/").is_none());
        assert!(t.search("").is_none());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut t = trie(&["/api/user/{userId}"]);
        t.insert("/api/user/{userId}");
        assert_eq!(t.patterns(), vec!["/api/user/{userId}".to_string()]);
        let m = t.search("/api/user/7").unwrap();
        assert_eq!(m.bindings.get("userId"), Some(&"7".to_string()));
    }

    #[test]
    fn test_patterns_reports_registered_set() {
        let t = trie(&["/a", "/a/{x}", "/b/c"]);
        let mut patterns = t.patterns();
        patterns.sort();
        assert_eq!(patterns, vec!["/a", "/a/{x}", "/b/c"]);
    }

    #[test]
    fn test_is_empty_and_clear() {
        let mut t = EndpointTrie::new();
        assert!(t.is_empty());
        t.insert("/api");
        assert!(!t.is_empty());
        t.clear();
        assert!(t.is_empty());
        assert!(t.search("/api").is_none());
    }
}
