//! Method+path route trie.
//!
//! The [`Router`] maps dispatch keys such as `/items/42/GET` (HTTP) or
//! `hello-world/POST` (WebSocket) onto handlers. Patterns are split on `/`;
//! a segment written as `{name}` is a parameter that matches any single
//! segment and is captured into [`Params`].
//!
//! Resolution walks the trie depth first. At every depth literal children are
//! tried before the parameter child, and a branch that fails deeper down is
//! abandoned in favour of the next sibling, so `/items/new` beats
//! `/items/{id}` while `/items/{id}/edit` still resolves when `/items/new/...`
//! has no matching continuation.
//!
//! ```rust
//! use turbonet_core::{Router, concat};
//!
//! let mut router = Router::new();
//! router.route("GET", "/items/{id}", "by-id")?;
//! router.route("GET", "/items/new", "new")?;
//!
//! let found = router.resolve(&concat("GET", "/items/17"))?;
//! assert_eq!(*found.handler, "by-id");
//! assert_eq!(found.params.get("id"), Some("17"));
//!
//! let found = router.resolve(&concat("GET", "/items/new"))?;
//! assert_eq!(*found.handler, "new");
//! # Ok::<(), turbonet_core::NetError>(())
//! ```

mod key;
mod node;
mod params;

pub use key::concat;
pub use node::NodeKind;
pub use params::Params;

use crate::error::{NetError, NetResult};
use key::{Segment, split};
use node::Node;
use std::fmt;
use tracing::{debug, trace};

/// Result of a successful [`Router::resolve`]
#[derive(Debug)]
pub struct RouteMatch<'r, H> {
    /// The registered handler
    pub handler: &'r H,
    /// Parameters captured along the matched branch
    pub params: Params,
}

/// Trie of route patterns.
///
/// Built during a registration phase through `&mut self` and read-only
/// afterwards; wrap it in an `Arc` to share it between tasks.
pub struct Router<H> {
    root: Node<H>,
    routes: usize,
}

impl<H> Router<H> {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::new(NodeKind::Root),
            routes: 0,
        }
    }

    /// Register a raw pattern.
    ///
    /// Registering the same pattern again replaces the previous handler.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Configuration`](crate::ErrorKind::Configuration) if
    /// the pattern has an empty or malformed parameter name, repeats a
    /// parameter name, or names a parameter differently from one already
    /// registered at the same position.
    pub fn on(&mut self, pattern: &str, handler: H) -> NetResult<()> {
        let path = compile(pattern)?;
        self.insert(pattern, path, handler)
    }

    /// Register `pattern` under `method`; the method becomes the final segment.
    ///
    /// # Errors
    ///
    /// Same as [`Router::on`], plus a configuration error if `method` is empty
    /// or contains `/`.
    pub fn route(&mut self, method: &str, pattern: &str, handler: H) -> NetResult<()> {
        let mut path = compile(pattern)?;
        path.push(method_node(method)?);
        self.insert(&concat(method, pattern), path, handler)
    }

    /// Resolve a dispatch key to its handler and captured parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RouteNotFound`](crate::ErrorKind::RouteNotFound)
    /// when no registered pattern matches.
    pub fn resolve(&self, key: &str) -> NetResult<RouteMatch<'_, H>> {
        let segments = split(key);
        let mut captures = Vec::new();
        match self.root.find(&segments, &mut captures) {
            Some(handler) => {
                trace!(key, params = captures.len(), "route resolved");
                Ok(RouteMatch {
                    handler,
                    params: captures.into_iter().collect(),
                })
            }
            None => Err(NetError::route_not_found(key)),
        }
    }

    /// Remove the handler registered for `(method, pattern)`.
    ///
    /// Returns whether a handler was removed.
    pub fn unregister(&mut self, method: &str, pattern: &str) -> bool {
        let Ok(mut path) = compile(pattern) else {
            return false;
        };
        let Ok(method) = method_node(method) else {
            return false;
        };
        path.push(method);
        self.remove_path(&path)
    }

    /// Remove the handler registered for a raw pattern.
    pub fn off(&mut self, pattern: &str) -> bool {
        match compile(pattern) {
            Ok(path) => self.remove_path(&path),
            Err(_) => false,
        }
    }

    /// Number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes
    }

    /// Whether no handler is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes == 0
    }

    /// Registered patterns in registration-tree order
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.routes);
        self.root.collect_patterns("", &mut out);
        out
    }

    fn insert(&mut self, shown: &str, path: Vec<NodeKind>, handler: H) -> NetResult<()> {
        self.check_param_conflicts(&path)?;

        let mut node = &mut self.root;
        for kind in path {
            node = node.child_or_insert(kind);
        }

        if node.callback.replace(handler).is_some() {
            debug!(pattern = shown, "replaced existing route handler");
        } else {
            self.routes += 1;
            debug!(pattern = shown, "registered route");
        }
        Ok(())
    }

    fn check_param_conflicts(&self, path: &[NodeKind]) -> NetResult<()> {
        let mut node = Some(&self.root);
        for kind in path {
            let Some(current) = node else { break };
            if let NodeKind::Param(name) = kind {
                if let Some(existing) = current.param_child() {
                    if &existing.kind != kind {
                        return Err(NetError::configuration(format!(
                            "Parameter '{{{}}}' conflicts with '{}' at the same position",
                            name,
                            existing.kind.pattern_text()
                        ))
                        .with_component("router"));
                    }
                }
            }
            node = current.child(kind);
        }
        Ok(())
    }

    fn remove_path(&mut self, path: &[NodeKind]) -> bool {
        let removed = self.root.remove(path).is_some();
        if removed {
            self.routes -= 1;
        }
        removed
    }
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("patterns", &self.patterns())
            .finish()
    }
}

fn compile(pattern: &str) -> NetResult<Vec<NodeKind>> {
    let mut path = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for raw in split(pattern) {
        let segment = Segment::parse(raw)?;
        if let Segment::Param(name) = segment {
            if seen.contains(&name) {
                return Err(NetError::configuration(format!(
                    "Parameter '{}' appears more than once in '{}'",
                    name, pattern
                )));
            }
            seen.push(name);
        }
        path.push(segment.into());
    }
    Ok(path)
}

fn method_node(method: &str) -> NetResult<NodeKind> {
    if method.is_empty() || method.contains('/') {
        return Err(NetError::configuration(format!(
            "Invalid method token '{}'",
            method
        )));
    }
    Ok(NodeKind::Method(method.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literal_route() {
        let mut router = Router::new();
        router.route("GET", "/hello-world", 1).unwrap();

        let found = router.resolve("/hello-world/GET").unwrap();
        assert_eq!(*found.handler, 1);
        assert!(found.params.is_empty());
    }

    #[test]
    fn test_trailing_slash_is_equivalent() {
        let mut router = Router::new();
        router.route("GET", "/a/", 1).unwrap();
        assert_eq!(*router.resolve(&concat("GET", "/a")).unwrap().handler, 1);
        assert_eq!(*router.resolve(&concat("GET", "/a/")).unwrap().handler, 1);
    }

    #[test]
    fn test_method_distinguishes_routes() {
        let mut router = Router::new();
        router.route("GET", "/items", "list").unwrap();
        router.route("POST", "/items", "create").unwrap();

        assert_eq!(*router.resolve("/items/GET").unwrap().handler, "list");
        assert_eq!(*router.resolve("/items/POST").unwrap().handler, "create");
        let err = router.resolve("/items/DELETE").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouteNotFound);
    }

    #[test]
    fn test_literal_beats_param() {
        let mut router = Router::new();
        router.route("GET", "/items/{id}", "param").unwrap();
        router.route("GET", "/items/new", "literal").unwrap();

        let found = router.resolve("/items/new/GET").unwrap();
        assert_eq!(*found.handler, "literal");
        assert!(found.params.is_empty());

        let found = router.resolve("/items/9/GET").unwrap();
        assert_eq!(*found.handler, "param");
        assert_eq!(found.params.get("id"), Some("9"));
    }

    #[test]
    fn test_backtracks_from_literal_to_param() {
        let mut router = Router::new();
        router.route("GET", "/items/new", "new").unwrap();
        router.route("GET", "/items/{id}/edit", "edit").unwrap();

        let found = router.resolve("/items/new/edit/GET").unwrap();
        assert_eq!(*found.handler, "edit");
        assert_eq!(found.params.get("id"), Some("new"));
    }

    #[test]
    fn test_failed_branch_captures_are_discarded() {
        let mut router = Router::new();
        router.route("GET", "/{a}/x", "ax").unwrap();
        router.route("GET", "/b/{c}/y", "bcy").unwrap();

        let found = router.resolve("/b/x/GET").unwrap();
        assert_eq!(*found.handler, "ax");
        assert_eq!(found.params.len(), 1);
        assert_eq!(found.params.get("a"), Some("b"));
        assert_eq!(found.params.get("c"), None);
    }

    #[test]
    fn test_multiple_params() {
        let mut router = Router::new();
        router
            .route("PUT", "/users/{user}/posts/{post}", ())
            .unwrap();
        let found = router.resolve("/users/ann/posts/7/PUT").unwrap();
        let names: Vec<_> = found.params.iter().collect();
        assert_eq!(names, vec![("user", "ann"), ("post", "7")]);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut router = Router::new();
        router.route("GET", "/a", 1).unwrap();
        router.route("GET", "/a", 2).unwrap();
        assert_eq!(router.len(), 1);
        assert_eq!(*router.resolve("/a/GET").unwrap().handler, 2);
    }

    #[test]
    fn test_conflicting_param_names_rejected() {
        let mut router = Router::new();
        router.route("GET", "/items/{id}", ()).unwrap();
        let err = router.route("POST", "/items/{name}", ()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        // Same name at the same depth is fine
        router.route("POST", "/items/{id}", ()).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let mut router: Router<()> = Router::new();
        assert!(router.route("GET", "/a/{}", ()).is_err());
        assert!(router.route("GET", "/{x}/{x}", ()).is_err());
        assert!(router.route("", "/a", ()).is_err());
        assert!(router.route("GET/HEAD", "/a", ()).is_err());
        assert!(router.is_empty());
    }

    #[test]
    fn test_raw_pattern_and_root() {
        let mut router = Router::new();
        router.on("/", "root").unwrap();
        router.on("hello-world/POST", "ws").unwrap();

        assert_eq!(*router.resolve("").unwrap().handler, "root");
        assert_eq!(*router.resolve("/").unwrap().handler, "root");
        // A raw pattern and a method-routed one resolve the same key
        assert_eq!(*router.resolve(&concat("POST", "hello-world")).unwrap().handler, "ws");
    }

    #[test]
    fn test_unregister() {
        let mut router = Router::new();
        router.route("GET", "/a/{id}", 1).unwrap();
        router.route("GET", "/a/{id}/b", 2).unwrap();

        assert!(router.unregister("GET", "/a/{id}"));
        assert!(!router.unregister("GET", "/a/{id}"));
        assert_eq!(router.len(), 1);
        assert!(router.resolve("/a/1/GET").is_err());
        assert_eq!(*router.resolve("/a/1/b/GET").unwrap().handler, 2);

        assert!(router.unregister("GET", "/a/{id}/b"));
        assert!(router.is_empty());
        assert!(router.patterns().is_empty());
    }

    #[test]
    fn test_patterns_listing() {
        let mut router = Router::new();
        router.route("GET", "/a", ()).unwrap();
        router.route("GET", "/a/{id}", ()).unwrap();
        router.on("/x/y", ()).unwrap();
        assert_eq!(router.patterns(), vec!["/a/GET", "/a/{id}/GET", "/x/y"]);
    }
}
