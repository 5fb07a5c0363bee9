//! Viewport windowing over the flattened node sequence.
//!
//! Rows are variable height (long scalar previews wrap), so offsets come
//! from a cumulative-height index. The index is updated incrementally from
//! the first changed row; lookups are binary searches. Recomputing every
//! offset on each scroll tick is exactly what this module exists to avoid.

use crate::types::Node;

/// Extra rows realized beyond each viewport edge so fast scrolling does not
/// flash blank rows.
pub const OVERSCAN_ROWS: usize = 3;

/// Cumulative-height index for a node sequence. `prefix[i]` is the top
/// offset of row `i`; `prefix[len]` is the total height.
#[derive(Debug, Clone)]
pub struct HeightIndex {
    heights: Vec<f32>,
    prefix: Vec<f32>,
}

impl HeightIndex {
    /// Measure every row once and build the prefix sums.
    pub fn build<F>(nodes: &[Node], mut measure: F) -> Self
    where
        F: FnMut(&Node) -> f32,
    {
        let heights: Vec<f32> = nodes.iter().map(|n| measure(n).max(0.0)).collect();
        let mut index = Self {
            prefix: Vec::with_capacity(heights.len() + 1),
            heights,
        };
        index.rebuild_prefix_from(0);
        index
    }

    fn rebuild_prefix_from(&mut self, from: usize) {
        let mut offset = if from == 0 {
            self.prefix.clear();
            self.prefix.push(0.0);
            0.0
        } else {
            self.prefix.truncate(from + 1);
            self.prefix[from]
        };
        for h in &self.heights[from..] {
            offset += h;
            self.prefix.push(offset);
        }
    }

    /// Re-measure rows from `from` onward after the sequence changed (a
    /// re-flatten, a load-more append). Rows before `from` keep their
    /// measurements.
    pub fn update<F>(&mut self, from: usize, nodes: &[Node], mut measure: F)
    where
        F: FnMut(&Node) -> f32,
    {
        let from = from.min(self.heights.len()).min(nodes.len());
        self.heights.truncate(from);
        self.heights
            .extend(nodes[from..].iter().map(|n| measure(n).max(0.0)));
        self.rebuild_prefix_from(from);
    }

    /// Replace a single row's height (a wrap change) and fix the suffix.
    pub fn set_height(&mut self, index: usize, height: f32) {
        if index >= self.heights.len() {
            return;
        }
        self.heights[index] = height.max(0.0);
        self.rebuild_prefix_from(index);
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn total_height(&self) -> f32 {
        *self.prefix.last().unwrap_or(&0.0)
    }

    pub fn offset_of(&self, index: usize) -> f32 {
        self.prefix[index.min(self.len())]
    }

    pub fn height_of(&self, index: usize) -> f32 {
        self.heights[index]
    }

    /// Last row whose top offset is at or above `y`. O(log n).
    pub fn index_at_offset(&self, y: f32) -> usize {
        if self.is_empty() {
            return 0;
        }
        let i = self.prefix.partition_point(|&o| o <= y);
        i.saturating_sub(1).min(self.len() - 1)
    }
}

/// What the host can currently show.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub scroll_offset: f32,
    pub height: f32,
}

/// Rows the host must realize: `[start_index, end_index]` inclusive, with
/// the top offset of each. Everything outside the range can stay virtual.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    pub start_index: usize,
    /// Inclusive. Equal to `start_index` when a single row is visible; the
    /// plan for an empty sequence has empty `offsets`.
    pub end_index: usize,
    pub offsets: Vec<f32>,
    pub total_height: f32,
}

/// Compute the visible range for `viewport`, with [`OVERSCAN_ROWS`] extra
/// rows on each side. Out-of-range scroll offsets are clamped, never a
/// panic.
pub fn plan(index: &HeightIndex, viewport: Viewport) -> WindowPlan {
    let total = index.total_height();
    if index.is_empty() {
        return WindowPlan {
            start_index: 0,
            end_index: 0,
            offsets: Vec::new(),
            total_height: 0.0,
        };
    }
    let top = viewport.scroll_offset.clamp(0.0, total);
    let bottom = (top + viewport.height.max(0.0)).min(total);

    let first = index.index_at_offset(top);
    // Last row whose top edge is above the viewport bottom. A row starting
    // exactly at `bottom` is not visible.
    let last = index
        .prefix
        .partition_point(|&o| o < bottom)
        .saturating_sub(1)
        .min(index.len() - 1);

    let start = first.saturating_sub(OVERSCAN_ROWS);
    let end = (last + OVERSCAN_ROWS).min(index.len() - 1);
    let offsets = (start..=end).map(|i| index.offset_of(i)).collect();
    WindowPlan {
        start_index: start,
        end_index: end,
        offsets,
        total_height: total,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::expand::ExpansionState;
    use crate::flatten::flatten;
    use crate::types::FlattenPolicy;

    fn rows(n: usize) -> Vec<Node> {
        let v = serde_json::Value::Array((0..n as i64).map(|i| json!(i)).collect());
        flatten(&v, &ExpansionState::new(), &FlattenPolicy::default().with_max_total_nodes(usize::MAX)).nodes
    }

    #[test]
    fn fixed_height_range() {
        let nodes = rows(100); // 101 rows with the root
        let index = HeightIndex::build(&nodes, |_| 20.0);
        assert_eq!(index.total_height(), 101.0 * 20.0);

        let p = plan(
            &index,
            Viewport {
                scroll_offset: 200.0,
                height: 100.0,
            },
        );
        // Rows 10..=14 intersect; overscan widens by 3 each side.
        assert_eq!(p.start_index, 10 - OVERSCAN_ROWS);
        assert_eq!(p.end_index, 14 + OVERSCAN_ROWS);
        assert_eq!(p.offsets[0], (10 - OVERSCAN_ROWS) as f32 * 20.0);
    }

    #[test]
    fn every_intersecting_row_is_in_range() {
        let nodes = rows(50);
        // Deterministic variable heights.
        let index = HeightIndex::build(&nodes, |n| 10.0 + (n.depth as f32) * 4.0 + (n.pointer.len() % 5) as f32);
        let viewport = Viewport {
            scroll_offset: 123.0,
            height: 77.0,
        };
        let p = plan(&index, viewport);
        for i in 0..index.len() {
            let top = index.offset_of(i);
            let bottom = top + index.height_of(i);
            let intersects = bottom > viewport.scroll_offset && top < viewport.scroll_offset + viewport.height;
            if intersects {
                assert!(
                    i >= p.start_index && i <= p.end_index,
                    "row {i} intersects but is outside [{}, {}]",
                    p.start_index,
                    p.end_index
                );
            }
        }
    }

    #[test]
    fn scroll_past_end_is_clamped() {
        let nodes = rows(10);
        let index = HeightIndex::build(&nodes, |_| 16.0);
        let p = plan(
            &index,
            Viewport {
                scroll_offset: 1.0e9,
                height: 50.0,
            },
        );
        assert_eq!(p.end_index, index.len() - 1);
        assert!(p.start_index <= p.end_index);
    }

    #[test]
    fn empty_sequence_plans_nothing() {
        let index = HeightIndex::build(&[], |_| 16.0);
        let p = plan(
            &index,
            Viewport {
                scroll_offset: 0.0,
                height: 100.0,
            },
        );
        assert!(p.offsets.is_empty());
        assert_eq!(p.total_height, 0.0);
    }

    #[test]
    fn incremental_update_only_touches_suffix() {
        let nodes = rows(20);
        let mut measured = 0usize;
        let mut index = HeightIndex::build(&nodes, |_| {
            measured += 1;
            10.0
        });
        assert_eq!(measured, nodes.len());

        // Appending via update(from) re-measures only the suffix.
        let mut remeasured = 0usize;
        index.update(15, &nodes, |_| {
            remeasured += 1;
            12.0
        });
        assert_eq!(remeasured, nodes.len() - 15);
        assert_eq!(index.offset_of(15), 15.0 * 10.0);
        assert_eq!(index.total_height(), 15.0 * 10.0 + (nodes.len() - 15) as f32 * 12.0);
    }

    #[test]
    fn set_height_shifts_following_offsets() {
        let nodes = rows(5);
        let mut index = HeightIndex::build(&nodes, |_| 10.0);
        index.set_height(2, 30.0);
        assert_eq!(index.offset_of(2), 20.0);
        assert_eq!(index.offset_of(3), 50.0);
        assert_eq!(index.total_height(), 10.0 * (nodes.len() as f32 - 1.0) + 30.0);
    }

    #[test]
    fn offset_lookup_is_consistent_with_offsets() {
        let nodes = rows(30);
        let index = HeightIndex::build(&nodes, |n| 8.0 + (n.pointer.len() as f32));
        for i in 0..index.len() {
            let top = index.offset_of(i);
            assert_eq!(index.index_at_offset(top), i);
            // Any offset inside the row maps back to the row.
            assert_eq!(index.index_at_offset(top + index.height_of(i) * 0.5), i);
        }
    }
}
