//! Single-pass structural statistics over a JSON value.
//!
//! The analyzer is a pure function of the value. It is capped: traversal
//! stops after [`ANALYZE_NODE_CAP`] visited values so a pathological
//! document (millions of nodes, or one object with a million keys) costs a
//! bounded amount of work. When the cap is hit, counts are lower bounds and
//! `truncated` is set.

use serde_json::Value;
use tracing::debug;

use crate::types::{Complexity, LargeContainer, NodeKind, StructureAnalysis};

/// Hard cap on values visited in one analysis pass.
pub const ANALYZE_NODE_CAP: usize = 50_000;

/// How many elements to sample when checking array homogeneity.
pub const HOMOGENEITY_SAMPLE: usize = 20;

/// Containers with at least this many direct children are reported in
/// `large_containers`.
pub const LARGE_CONTAINER_THRESHOLD: usize = 500;

const LARGE_CONTAINER_REPORT_CAP: usize = 32;

/// Heuristic serialized byte size of a scalar value.
pub(crate) fn scalar_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len() + 2,
        Value::Number(n) => n.to_string().len(),
        Value::Bool(true) => 4,
        Value::Bool(false) => 5,
        Value::Null => 4,
        // Containers are accounted for by their children plus punctuation.
        Value::Object(m) => 2 + m.len(),
        Value::Array(a) => 2 + a.len(),
    }
}

/// Analyze `value` in one traversal. O(n) up to the node cap, no side
/// effects.
pub fn analyze(value: &Value) -> StructureAnalysis {
    let mut node_count = 0usize;
    let mut max_depth = 0usize;
    let mut total_size = 0usize;
    let mut large_containers = Vec::new();
    let mut truncated = false;

    let mut stack: Vec<(&Value, String, usize)> = vec![(value, String::new(), 0)];
    while let Some((v, pointer, depth)) = stack.pop() {
        if node_count >= ANALYZE_NODE_CAP {
            truncated = true;
            break;
        }
        node_count += 1;
        max_depth = max_depth.max(depth);
        total_size += scalar_size(v);

        match v {
            Value::Object(map) => {
                if map.len() >= LARGE_CONTAINER_THRESHOLD
                    && large_containers.len() < LARGE_CONTAINER_REPORT_CAP
                {
                    large_containers.push(LargeContainer {
                        pointer: pointer.clone(),
                        child_count: map.len(),
                    });
                }
                for (k, child) in map.iter() {
                    stack.push((child, crate::pointer::join(&pointer, k), depth + 1));
                }
            }
            Value::Array(arr) => {
                if arr.len() >= LARGE_CONTAINER_THRESHOLD
                    && large_containers.len() < LARGE_CONTAINER_REPORT_CAP
                {
                    large_containers.push(LargeContainer {
                        pointer: pointer.clone(),
                        child_count: arr.len(),
                    });
                }
                for (i, child) in arr.iter().enumerate() {
                    stack.push((child, crate::pointer::join_index(&pointer, i), depth + 1));
                }
            }
            _ => {}
        }
    }

    if truncated {
        debug!(node_count, "analysis stopped at node cap");
    }

    let (is_homogeneous, primary_type) = match value {
        Value::Array(arr) if !arr.is_empty() => homogeneity(arr),
        _ => (false, None),
    };

    let complexity = complexity_of(node_count, max_depth, truncated);

    StructureAnalysis {
        node_count,
        max_depth,
        total_size_estimate: total_size,
        complexity,
        is_homogeneous,
        primary_type,
        large_containers,
        truncated,
    }
}

fn complexity_of(node_count: usize, max_depth: usize, truncated: bool) -> Complexity {
    if truncated || node_count >= 10_000 || max_depth > 20 {
        Complexity::High
    } else if node_count < 1_000 && max_depth <= 8 {
        Complexity::Low
    } else {
        Complexity::Medium
    }
}

/// Sample up to [`HOMOGENEITY_SAMPLE`] elements spread across the array.
/// Homogeneous iff every sample shares the same kind and, for objects, the
/// exact same top-level key set. A heuristic that must not yield false
/// positives, so key sets are compared in full on the sample.
fn homogeneity(arr: &[Value]) -> (bool, Option<NodeKind>) {
    let step = (arr.len() / HOMOGENEITY_SAMPLE).max(1);
    let mut samples = arr.iter().step_by(step).take(HOMOGENEITY_SAMPLE);

    let first = match samples.next() {
        Some(v) => v,
        None => return (false, None),
    };
    let kind = NodeKind::of(first);
    let first_keys: Option<Vec<&String>> = match first {
        Value::Object(m) => Some(m.keys().collect()),
        _ => None,
    };

    for v in samples {
        if NodeKind::of(v) != kind {
            return (false, None);
        }
        if let Some(ref keys) = first_keys {
            match v {
                Value::Object(m) => {
                    if m.len() != keys.len() || !m.keys().zip(keys.iter()).all(|(a, b)| a == *b) {
                        // Key order differences still count as the same
                        // shape only when the sets match.
                        let mut a: Vec<&String> = m.keys().collect();
                        let mut b = keys.clone();
                        a.sort();
                        b.sort();
                        if a != b {
                            return (false, None);
                        }
                    }
                }
                _ => return (false, None),
            }
        }
    }
    (true, Some(kind))
}
