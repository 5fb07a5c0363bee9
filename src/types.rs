use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// What a [`Node`] renders as. `Truncated` and `LoadMore` are synthetic:
/// they stand in for values that exist but were intentionally not
/// materialized (depth cap, children cap, global node cap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
    Truncated,
    LoadMore,
}

impl NodeKind {
    /// Kind of a concrete JSON value (never a synthetic kind).
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => NodeKind::Object,
            Value::Array(_) => NodeKind::Array,
            Value::String(_) => NodeKind::String,
            Value::Number(_) => NodeKind::Number,
            Value::Bool(_) => NodeKind::Bool,
            Value::Null => NodeKind::Null,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Object | NodeKind::Array)
    }

    pub fn is_synthetic(self) -> bool {
        matches!(self, NodeKind::Truncated | NodeKind::LoadMore)
    }
}

/// A renderable unit. Nodes are values derived on each flatten pass from the
/// document plus the expansion state; they are never long-lived or mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    /// JSON Pointer to this node; doubles as its identity.
    pub pointer: String,
    /// Key if under an object, stringified index if under an array, `None`
    /// at the root.
    pub key: Option<String>,
    pub kind: NodeKind,
    pub depth: usize,
    /// Direct children of the underlying value; 0 for scalars.
    pub child_count: usize,
    /// Heuristic byte size. Exact serialized length for scalars, a shallow
    /// guess for containers (flatten must not walk collapsed subtrees).
    pub size_estimate: usize,
    /// Container with at least one child.
    pub expandable: bool,
    /// Short display string: truncated scalar text, or `{…} N keys` /
    /// `[…] N items` for containers.
    pub preview: String,
    /// The actual value, scalars only. Containers never carry their subtree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// For `Truncated`/`LoadMore`: how many children were not materialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<usize>,
}

/// Document complexity bucket, derived from node count and depth. Drives
/// how strict the flatten caps are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct LargeContainer {
    pub pointer: String,
    pub child_count: usize,
}

/// Single-pass structural statistics for a document, cached per value and
/// recomputed only when the document is replaced.
#[derive(Debug, Clone, Serialize)]
pub struct StructureAnalysis {
    pub node_count: usize,
    pub max_depth: usize,
    pub total_size_estimate: usize,
    pub complexity: Complexity,
    /// Root is a uniform array of same-shaped elements.
    pub is_homogeneous: bool,
    pub primary_type: Option<NodeKind>,
    pub large_containers: Vec<LargeContainer>,
    /// Traversal stopped at the analysis cap; counts are lower bounds.
    pub truncated: bool,
}

/// Caps applied by a single flatten pass. All truncation thresholds live
/// here so every view mode truncates consistently.
#[derive(Debug, Clone)]
pub struct FlattenPolicy {
    /// Containers at this depth are not descended into; their children
    /// collapse to one `Truncated` node.
    pub max_depth: usize,
    /// Per-container child budget; the overflow becomes one `LoadMore` node.
    pub max_children_per_container: usize,
    /// Global node budget for the whole pass.
    pub max_total_nodes: usize,
    /// Per-pointer raised child caps, backing "load more" without touching
    /// the global budget.
    children_overrides: HashMap<String, usize>,
}

impl Default for FlattenPolicy {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_children_per_container: 200,
            max_total_nodes: 5_000,
            children_overrides: HashMap::new(),
        }
    }
}

impl FlattenPolicy {
    /// Caps scaled inversely with document complexity: bigger and deeper
    /// documents get stricter budgets so render cost stays bounded.
    pub fn for_analysis(analysis: &StructureAnalysis) -> Self {
        match analysis.complexity {
            Complexity::Low => Self {
                max_depth: 64,
                max_children_per_container: 500,
                max_total_nodes: 10_000,
                children_overrides: HashMap::new(),
            },
            Complexity::Medium => Self::default(),
            Complexity::High => Self {
                max_depth: 24,
                max_children_per_container: 100,
                max_total_nodes: 2_000,
                children_overrides: HashMap::new(),
            },
        }
    }

    /// Effective child cap for one container.
    pub fn children_cap_for(&self, pointer: &str) -> usize {
        self.children_overrides
            .get(pointer)
            .copied()
            .unwrap_or(self.max_children_per_container)
    }

    /// Raise the child cap for a single container by `extra`, keeping any
    /// previous raise. Backs the "load more" affordance.
    pub fn raise_children_cap(&mut self, pointer: &str, extra: usize) {
        let current = self.children_cap_for(pointer);
        self.children_overrides
            .insert(pointer.to_string(), current.saturating_add(extra));
    }

    pub fn with_max_total_nodes(mut self, cap: usize) -> Self {
        self.max_total_nodes = cap;
        self
    }

    pub fn with_max_depth(mut self, cap: usize) -> Self {
        self.max_depth = cap;
        self
    }

    pub fn with_max_children(mut self, cap: usize) -> Self {
        self.max_children_per_container = cap;
        self
    }
}
