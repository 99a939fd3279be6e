//! Property-based tests for the route trie
//!
//! Uses proptest to verify:
//! - Literal routes resolve to their own handler with no captures
//! - Parameter routes capture the matched segment
//! - Literal siblings win over parameter siblings
//! - Key construction round-trips the method token

use proptest::prelude::*;
use std::collections::BTreeMap;
use turbonet_core::{ErrorKind, Router, concat};

// =============================================================================
// STRATEGIES
// =============================================================================

fn method_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD"])
        .prop_map(str::to_string)
}

fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}"
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(segment_strategy(), 1..5).prop_map(|segs| format!("/{}", segs.join("/")))
}

// =============================================================================
// RESOLUTION PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every registered literal (method, path) resolves to its latest handler
    #[test]
    fn prop_literal_routes_resolve_to_own_handler(
        routes in prop::collection::vec((method_strategy(), path_strategy()), 1..20)
    ) {
        let mut router = Router::new();
        let mut expected = BTreeMap::new();
        for (idx, (method, path)) in routes.iter().enumerate() {
            router.route(method, path, idx).unwrap();
            expected.insert(concat(method, path), idx);
        }

        prop_assert_eq!(router.len(), expected.len());
        for (key, idx) in &expected {
            let found = router.resolve(key).unwrap();
            prop_assert_eq!(*found.handler, *idx);
            prop_assert!(found.params.is_empty());
        }
    }

    /// Property: a parameter segment captures any literal value
    #[test]
    fn prop_param_captures_segment(
        method in method_strategy(),
        value in "[A-Za-z0-9._~-]{1,12}",
    ) {
        let mut router = Router::new();
        router.route(&method, "/items/{id}", "item").unwrap();

        let found = router.resolve(&concat(&method, &format!("/items/{}", value))).unwrap();
        prop_assert_eq!(*found.handler, "item");
        prop_assert_eq!(found.params.len(), 1);
        prop_assert_eq!(found.params.get("id"), Some(value.as_str()));
    }

    /// Property: a literal sibling always beats the parameter sibling
    #[test]
    fn prop_literal_beats_param(literal in segment_strategy(), other in segment_strategy()) {
        prop_assume!(literal != other);

        let mut router = Router::new();
        router.route("GET", "/items/{id}", "param").unwrap();
        router.route("GET", &format!("/items/{}", literal), "literal").unwrap();

        let found = router.resolve(&concat("GET", &format!("/items/{}", literal))).unwrap();
        prop_assert_eq!(*found.handler, "literal");

        let found = router.resolve(&concat("GET", &format!("/items/{}", other))).unwrap();
        prop_assert_eq!(*found.handler, "param");
    }

    /// Property: unregistered methods never resolve
    #[test]
    fn prop_unknown_method_not_found(path in path_strategy()) {
        let mut router = Router::new();
        router.route("GET", &path, ()).unwrap();

        let err = router.resolve(&concat("TRACE", &path)).unwrap_err();
        prop_assert_eq!(err.kind, ErrorKind::RouteNotFound);
    }

    /// Property: re-registering the same pattern keeps exactly one handler
    #[test]
    fn prop_reregistration_keeps_latest(path in path_strategy(), count in 1usize..10) {
        let mut router = Router::new();
        for idx in 0..count {
            router.route("GET", &path, idx).unwrap();
        }
        prop_assert_eq!(router.len(), 1);
        prop_assert_eq!(*router.resolve(&concat("GET", &path)).unwrap().handler, count - 1);
    }
}

// =============================================================================
// KEY CONSTRUCTION PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the method is recovered as the final segment of the key
    #[test]
    fn prop_concat_recovers_method(
        method in "[A-Za-z][A-Za-z0-9-]{0,10}",
        path in "(/[a-z0-9]{1,6}){0,4}/?",
    ) {
        let key = concat(&method, &path);
        let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        prop_assert_eq!(segments.last().copied(), Some(method.as_str()));
        prop_assert_eq!(&segments[..segments.len() - 1], path_segments.as_slice());
    }
}
