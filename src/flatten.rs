//! Flattening: JSON value + expansion state + policy → ordered node
//! sequence.
//!
//! Pre-order depth-first. A collapsed container's subtree is never visited,
//! so a pass costs O(visible nodes), not O(document) — flatten re-runs on
//! every expand/collapse/search change and has to stay inside a frame
//! budget. All truncation thresholds come from one [`FlattenPolicy`] so
//! every view truncates consistently.

use serde_json::Value;
use tracing::debug;

use crate::analyze::scalar_size;
use crate::expand::ExpansionState;
use crate::pointer;
use crate::types::{FlattenPolicy, Node, NodeKind};

/// Display truncation for long scalar previews.
pub const PREVIEW_TRUNCATE: usize = 120;

/// Synthetic pointer tokens. A raw `~` never survives pointer escaping
/// (`~` → `~0`), so these cannot collide with a real key.
const MORE_TOKEN: &str = "~more";
const DEPTH_TOKEN: &str = "~depth";
const CAP_TOKEN: &str = "~cap";

/// Output of one flatten pass. `visited` counts values actually touched by
/// the traversal, which is how the laziness guarantee is observable.
#[derive(Debug)]
pub struct FlattenResult {
    pub nodes: Vec<Node>,
    pub visited: usize,
    /// The global node budget was reached and a terminal truncation node
    /// was emitted.
    pub hit_node_cap: bool,
}

/// Shorten `s` to at most `max` bytes on a char boundary, with an ellipsis
/// when cut.
pub fn truncate_preview(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// Build the renderable node for a concrete value at `pointer`.
pub fn node_for_value(pointer: String, key: Option<String>, value: &Value, depth: usize) -> Node {
    let kind = NodeKind::of(value);
    let (child_count, preview, scalar) = match value {
        Value::Object(m) => {
            let preview = if m.is_empty() {
                format!("{{}} {} keys", m.len())
            } else {
                format!("{{…}} {} keys", m.len())
            };
            (m.len(), preview, None)
        }
        Value::Array(a) => {
            let preview = if a.is_empty() {
                format!("[] {} items", a.len())
            } else {
                format!("[…] {} items", a.len())
            };
            (a.len(), preview, None)
        }
        Value::String(s) => (0, truncate_preview(s, PREVIEW_TRUNCATE), Some(value.clone())),
        Value::Number(n) => (0, n.to_string(), Some(value.clone())),
        Value::Bool(b) => (0, b.to_string(), Some(value.clone())),
        Value::Null => (0, "null".to_string(), Some(value.clone())),
    };
    Node {
        pointer,
        key,
        kind,
        depth,
        child_count,
        size_estimate: scalar_size(value),
        expandable: kind.is_container() && child_count > 0,
        preview,
        value: scalar,
        remaining: None,
    }
}

fn synthetic_node(parent: &str, token: &str, kind: NodeKind, depth: usize, remaining: Option<usize>) -> Node {
    let preview = match (kind, remaining) {
        (NodeKind::LoadMore, Some(n)) => format!("… {n} more"),
        (_, Some(n)) => format!("… {n} hidden"),
        _ => "…".to_string(),
    };
    Node {
        pointer: format!("{parent}/{token}"),
        key: None,
        kind,
        depth,
        child_count: 0,
        size_estimate: 0,
        expandable: false,
        preview,
        value: None,
        remaining,
    }
}

struct Walk<'a> {
    expanded: &'a ExpansionState,
    policy: &'a FlattenPolicy,
    nodes: Vec<Node>,
    visited: usize,
    real_count: usize,
    halted: bool,
}

/// Flatten `value` into an ordered node sequence. Infallible for any
/// well-formed `serde_json::Value`; caps are reported as data, never as
/// errors.
pub fn flatten(value: &Value, expanded: &ExpansionState, policy: &FlattenPolicy) -> FlattenResult {
    let mut walk = Walk {
        expanded,
        policy,
        nodes: Vec::new(),
        visited: 0,
        real_count: 0,
        halted: false,
    };
    walk.visit(value, String::new(), None, 0);
    if walk.halted {
        debug!(nodes = walk.nodes.len(), "flatten stopped at global node cap");
    }
    FlattenResult {
        hit_node_cap: walk.halted,
        nodes: walk.nodes,
        visited: walk.visited,
    }
}

impl Walk<'_> {
    /// Emit one real node, or the terminal truncation sentinel if the
    /// global budget is spent.
    fn emit(&mut self, node: Node) -> bool {
        if self.real_count >= self.policy.max_total_nodes {
            if !self.halted {
                let depth = node.depth;
                let parent = pointer::parent(&node.pointer).unwrap_or("").to_string();
                self.nodes
                    .push(synthetic_node(&parent, CAP_TOKEN, NodeKind::Truncated, depth, None));
                self.halted = true;
            }
            return false;
        }
        self.real_count += 1;
        self.nodes.push(node);
        true
    }

    fn visit(&mut self, value: &Value, ptr: String, key: Option<String>, depth: usize) {
        if self.halted {
            return;
        }
        self.visited += 1;
        let node = node_for_value(ptr.clone(), key, value, depth);
        let descend = node.expandable && self.expanded.is_expanded(&ptr);
        if !self.emit(node) {
            return;
        }
        if !descend {
            return;
        }

        let child_count = match value {
            Value::Object(m) => m.len(),
            Value::Array(a) => a.len(),
            _ => unreachable!("expandable implies container"),
        };

        // Depth cap: the subtree collapses to a single truncated child.
        if depth >= self.policy.max_depth {
            let n = synthetic_node(&ptr, DEPTH_TOKEN, NodeKind::Truncated, depth + 1, Some(child_count));
            self.emit(n);
            return;
        }

        let cap = self.policy.children_cap_for(&ptr);
        match value {
            Value::Object(m) => {
                for (k, child) in m.iter().take(cap) {
                    self.visit(child, pointer::join(&ptr, k), Some(k.clone()), depth + 1);
                    if self.halted {
                        return;
                    }
                }
            }
            Value::Array(a) => {
                for (i, child) in a.iter().enumerate().take(cap) {
                    self.visit(child, pointer::join_index(&ptr, i), Some(i.to_string()), depth + 1);
                    if self.halted {
                        return;
                    }
                }
            }
            _ => unreachable!(),
        }
        if child_count > cap {
            let n = synthetic_node(&ptr, MORE_TOKEN, NodeKind::LoadMore, depth + 1, Some(child_count - cap));
            self.emit(n);
        }
    }
}
