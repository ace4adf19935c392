use std::collections::HashSet;

use super::NodeId;

/// Leaves elided from drawing at the current zoom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    nodes: HashSet<NodeId>,
}

impl SkipSet {
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}

/// Keep one leaf in every `stride` once rows shrink below `threshold` pixels.
/// Returns `None` while rows are still legible.
pub fn skip_stride(row_size: f32, threshold: f32) -> Option<usize> {
    if row_size.is_nan() || row_size >= threshold {
        return None;
    }
    let mut stride = 2;
    if row_size < threshold * 0.5 {
        stride = 3;
    }
    if row_size < threshold * 0.25 {
        stride = 4;
    }
    if row_size < threshold * 0.1 {
        stride = 10;
    }
    Some(stride)
}

/// Thin `leaves` by their index in drawing order, so the same leaves vanish
/// for the same zoom level regardless of where they are on screen.
pub fn compute_skip_set(leaves: &[NodeId], row_size: f32, threshold: f32) -> SkipSet {
    let Some(stride) = skip_stride(row_size, threshold) else {
        return SkipSet::default();
    };
    let nodes = leaves
        .iter()
        .enumerate()
        .filter(|(index, _)| index % stride != 0)
        .map(|(_, &leaf)| leaf)
        .collect();
    SkipSet { nodes }
}
