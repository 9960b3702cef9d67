//! Route matching against the public trie API
//!
//! Exercises the documented matching contract: variable extraction,
//! literal/variable precedence with backtracking, trailing-slash
//! disambiguation, and interior slash collapsing.

use duolane::EndpointTrie;

mod tracing_util;
use tracing_util::TestTracing;

#[test]
fn test_search_extracts_variable_binding() {
    let _tracing = TestTracing::init();
    let mut trie = EndpointTrie::new();
    trie.insert("/api/user/{userId}/get");

    let m = trie.search("/api/user/123/get").expect("match");
    assert_eq!(m.pattern, "/api/user/{userId}/get");
    assert_eq!(m.bindings.len(), 1);
    assert_eq!(m.bindings["userId"], "123");
}

#[test]
fn test_search_extracts_all_bindings_in_order_free_map() {
    let _tracing = TestTracing::init();
    let mut trie = EndpointTrie::new();
    trie.insert("/hello/{a}/{b}/{c}");

    let m = trie.search("/hello/1/2/3").expect("match");
    assert_eq!(m.bindings["a"], "1");
    assert_eq!(m.bindings["b"], "2");
    assert_eq!(m.bindings["c"], "3");
}

#[test]
fn test_trailing_slash_matches_only_variable_free_paths() {
    let _tracing = TestTracing::init();
    let mut trie = EndpointTrie::new();
    trie.insert("/xyz");
    trie.insert("/api/user/{userId}");

    // No variables consumed: the trailing slash is forgiven.
    let m = trie.search("/xyz/").expect("match");
    assert_eq!(m.pattern, "/xyz");

    // A variable was consumed before the trailing slash: no match.
    assert!(trie.search("/api/user/123").is_some());
    assert!(trie.search("/api/user/123/").is_none());
}

#[test]
fn test_interior_double_slash_is_collapsed() {
    let _tracing = TestTracing::init();
    let mut trie = EndpointTrie::new();
    trie.insert("/a/b");

    assert_eq!(trie.search("/a//b"), trie.search("/a/b"));
}

#[test]
fn test_deep_literal_failure_backtracks_to_variable() {
    let _tracing = TestTracing::init();
    let mut trie = EndpointTrie::new();
    trie.insert("/v1/config/get");
    trie.insert("/v1/{section}/set");

    // "config" walks into the literal branch first; only "/set" below the
    // variable branch can finish the path.
    let m = trie.search("/v1/config/set").expect("match");
    assert_eq!(m.pattern, "/v1/{section}/set");
    assert_eq!(m.bindings["section"], "config");
}

#[test]
fn test_registered_patterns_round_trip() {
    let _tracing = TestTracing::init();
    let mut trie = EndpointTrie::new();
    let inserted = ["/api/user/create", "/api/user/{userId}/get", "/status"];
    for pattern in inserted {
        trie.insert(pattern);
    }

    let mut patterns = trie.patterns();
    patterns.sort();
    assert_eq!(patterns, {
        let mut expected: Vec<String> = inserted.iter().map(|s| s.to_string()).collect();
        expected.sort();
        expected
    });
}
