//! Route trie nodes.

use super::key::Segment;

/// What a trie node matches
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The trie root; matches the empty prefix
    Root,
    /// A literal path segment (or WebSocket id segment)
    Path(String),
    /// A named parameter; matches any single segment
    Param(String),
    /// A method token; always the last segment of a routed key
    Method(String),
}

impl NodeKind {
    fn matches_literal(&self, segment: &str) -> bool {
        match self {
            Self::Path(v) | Self::Method(v) => v == segment,
            Self::Root | Self::Param(_) => false,
        }
    }

    /// Pattern text this node was registered from
    pub(crate) fn pattern_text(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Path(v) | Self::Method(v) => v.clone(),
            Self::Param(name) => format!("{{{}}}", name),
        }
    }
}

pub(crate) struct Node<H> {
    pub(crate) kind: NodeKind,
    pub(crate) callback: Option<H>,
    children: Vec<Node<H>>,
}

impl<H> Node<H> {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            callback: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn param_child(&self) -> Option<&Self> {
        self.children
            .iter()
            .find(|c| matches!(c.kind, NodeKind::Param(_)))
    }

    pub(crate) fn child(&self, kind: &NodeKind) -> Option<&Self> {
        self.children.iter().find(|c| &c.kind == kind)
    }

    /// Return the child with this kind, appending it if absent.
    pub(crate) fn child_or_insert(&mut self, kind: NodeKind) -> &mut Self {
        let idx = match self.children.iter().position(|c| c.kind == kind) {
            Some(idx) => idx,
            None => {
                self.children.push(Node::new(kind));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Depth-first match with backtracking.
    ///
    /// Literal children are tried before the parameter child. Captures pushed
    /// on a failed branch are popped before the next sibling is tried.
    pub(crate) fn find<'n, 'k>(
        &'n self,
        segments: &[&'k str],
        captures: &mut Vec<(&'n str, &'k str)>,
    ) -> Option<&'n H> {
        let Some((head, rest)) = segments.split_first() else {
            return self.callback.as_ref();
        };

        for child in self.children.iter().filter(|c| c.kind.matches_literal(head)) {
            if let Some(handler) = child.find(rest, captures) {
                return Some(handler);
            }
        }

        for child in &self.children {
            if let NodeKind::Param(name) = &child.kind {
                captures.push((name.as_str(), head));
                if let Some(handler) = child.find(rest, captures) {
                    return Some(handler);
                }
                captures.pop();
            }
        }

        None
    }

    /// Take the handler stored at exactly this pattern, pruning emptied branches.
    pub(crate) fn remove(&mut self, path: &[NodeKind]) -> Option<H> {
        let Some((head, rest)) = path.split_first() else {
            return self.callback.take();
        };
        let idx = self.children.iter().position(|c| &c.kind == head)?;
        let removed = self.children[idx].remove(rest);
        let child = &self.children[idx];
        if child.callback.is_none() && child.children.is_empty() {
            self.children.remove(idx);
        }
        removed
    }

    /// Collect registered patterns below this node.
    pub(crate) fn collect_patterns(&self, prefix: &str, out: &mut Vec<String>) {
        let here = match self.kind {
            NodeKind::Root => String::new(),
            _ => format!("{}/{}", prefix, self.kind.pattern_text()),
        };
        if self.callback.is_some() {
            out.push(if here.is_empty() { "/".to_string() } else { here.clone() });
        }
        for child in &self.children {
            child.collect_patterns(&here, out);
        }
    }
}

impl<'a> From<Segment<'a>> for NodeKind {
    fn from(segment: Segment<'a>) -> Self {
        match segment {
            Segment::Literal(v) => NodeKind::Path(v.to_string()),
            Segment::Param(name) => NodeKind::Param(name.to_string()),
        }
    }
}
