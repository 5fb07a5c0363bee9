//! Expansion state: the set of container pointers currently "open".
//!
//! Collapsing a node does not prune its descendants' entries. They become
//! unreachable until the parent is re-expanded, at which point the previous
//! sub-expansion reappears. Hosts that prefer reclaiming those entries can
//! call [`ExpansionState::prune_under`]; the engine never does so on its own.

use std::collections::HashSet;

use serde_json::Value;
use tracing::trace;

use crate::pointer;

/// Set of expanded pointers, owned by one document session. The flattener
/// reads it, nothing else writes to it.
#[derive(Debug, Clone)]
pub struct ExpansionState {
    expanded: HashSet<String>,
}

impl Default for ExpansionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpansionState {
    /// Fresh state with only the root expanded (the top level of a document
    /// is always shown open).
    pub fn new() -> Self {
        let mut expanded = HashSet::new();
        expanded.insert(String::new());
        Self { expanded }
    }

    pub fn is_expanded(&self, pointer: &str) -> bool {
        self.expanded.contains(pointer)
    }

    /// Flip one pointer; returns the new membership. Toggling twice restores
    /// the prior state.
    pub fn toggle(&mut self, pointer: &str) -> bool {
        if self.expanded.remove(pointer) {
            false
        } else {
            self.expanded.insert(pointer.to_string());
            true
        }
    }

    pub fn expand(&mut self, pointer: &str) {
        self.expanded.insert(pointer.to_string());
    }

    pub fn collapse(&mut self, pointer: &str) {
        self.expanded.remove(pointer);
    }

    /// Expand `pointer` and every ancestor, so the value at `pointer` is
    /// actually visible after the next flatten.
    pub fn expand_with_ancestors(&mut self, pointer: &str) {
        for a in pointer::ancestors(pointer) {
            self.expanded.insert(a);
        }
        self.expanded.insert(pointer.to_string());
    }

    /// Breadth-first pre-walk of `value`, expanding containers until the
    /// number of nodes that would materialize exceeds `budget`. "Expand all"
    /// on a huge document degrades to "expand as much as is safely
    /// renderable" instead of hanging.
    pub fn expand_all(&mut self, value: &Value, up_to_depth: Option<usize>, budget: usize) {
        let depth_cap = up_to_depth.unwrap_or(usize::MAX);
        // The root node itself is always materialized.
        let mut materialized = 1usize;
        let mut queue: Vec<(&Value, String, usize)> = vec![(value, String::new(), 0)];
        let mut next = Vec::new();

        while !queue.is_empty() {
            for (v, ptr, depth) in queue.drain(..) {
                let child_count = match v {
                    Value::Object(m) => m.len(),
                    Value::Array(a) => a.len(),
                    _ => continue,
                };
                if child_count == 0 || depth >= depth_cap {
                    continue;
                }
                if materialized.saturating_add(child_count) > budget {
                    trace!(pointer = %ptr, budget, "expand_all stopped at node budget");
                    return;
                }
                materialized += child_count;
                self.expanded.insert(ptr.clone());
                match v {
                    Value::Object(m) => {
                        for (k, child) in m.iter() {
                            next.push((child, pointer::join(&ptr, k), depth + 1));
                        }
                    }
                    Value::Array(a) => {
                        for (i, child) in a.iter().enumerate() {
                            next.push((child, pointer::join_index(&ptr, i), depth + 1));
                        }
                    }
                    _ => unreachable!(),
                }
            }
            std::mem::swap(&mut queue, &mut next);
        }
    }

    /// Reset to the root-only default.
    pub fn collapse_all(&mut self) {
        self.expanded.clear();
        self.expanded.insert(String::new());
    }

    /// Drop every entry strictly under `pointer`. Opt-in alternative to the
    /// default keep-stale-entries behavior.
    pub fn prune_under(&mut self, pointer: &str) {
        let prefix = format!("{}/", pointer);
        self.expanded.retain(|p| !p.starts_with(&prefix));
    }

    /// Number of expanded pointers, the root included.
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn root_expanded_by_default() {
        let s = ExpansionState::new();
        assert!(s.is_expanded(""));
    }

    #[test]
    fn toggle_is_idempotent_in_pairs() {
        let mut s = ExpansionState::new();
        assert!(!s.is_expanded("/a"));
        assert!(s.toggle("/a"));
        assert!(s.is_expanded("/a"));
        assert!(!s.toggle("/a"));
        assert!(!s.is_expanded("/a"));
    }

    #[test]
    fn collapse_keeps_descendant_entries() {
        let mut s = ExpansionState::new();
        s.expand("/a");
        s.expand("/a/b");
        s.collapse("/a");
        // Stale entry survives, so re-expanding the parent restores it.
        assert!(s.is_expanded("/a/b"));
        s.expand("/a");
        assert!(s.is_expanded("/a/b"));
    }

    #[test]
    fn prune_under_drops_descendants_only() {
        let mut s = ExpansionState::new();
        s.expand("/a");
        s.expand("/a/b");
        s.expand("/ab");
        s.prune_under("/a");
        assert!(s.is_expanded("/a"));
        assert!(!s.is_expanded("/a/b"));
        // `/ab` is a sibling, not a descendant.
        assert!(s.is_expanded("/ab"));
    }

    #[test]
    fn expand_all_within_budget() {
        let v = json!({"a": {"b": 1}, "c": [1, 2, 3]});
        let mut s = ExpansionState::new();
        s.expand_all(&v, None, 1_000);
        assert!(s.is_expanded(""));
        assert!(s.is_expanded("/a"));
        assert!(s.is_expanded("/c"));
    }

    #[test]
    fn expand_all_respects_budget() {
        let items: Vec<_> = (0..100).map(|i| json!({"x": i})).collect();
        let v = serde_json::Value::Array(items);
        let mut s = ExpansionState::new();
        // Budget of 50 does not fit the 100 array elements, so nothing
        // beyond the default root entry is added.
        s.expand_all(&v, None, 50);
        assert_eq!(s.len(), 1);
        assert!(!s.is_expanded("/0"));
    }

    #[test]
    fn expand_all_depth_limit() {
        let v = json!({"a": {"b": {"c": 1}}});
        let mut s = ExpansionState::new();
        s.collapse_all();
        s.expand_all(&v, Some(1), 1_000);
        assert!(s.is_expanded(""));
        assert!(!s.is_expanded("/a/b"));
    }

    #[test]
    fn collapse_all_resets_to_root() {
        let mut s = ExpansionState::new();
        s.expand("/a");
        s.expand("/a/b");
        s.collapse_all();
        assert!(s.is_expanded(""));
        assert_eq!(s.len(), 1);
        assert!(!s.is_expanded("/a"));
    }
}
