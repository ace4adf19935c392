use egui::{pos2, Pos2};

use super::{NodeId, NodeLayout, TreeModel};

/// Unweighted mean of the children's heights.
pub(super) fn branch_y(children: &[NodeId], nodes: &[NodeLayout]) -> f32 {
    if children.is_empty() {
        return 0.0;
    }
    let sum: f32 = children
        .iter()
        .filter_map(|&child| nodes.get(child))
        .map(|child| child.unscaled.y)
        .sum();
    sum / children.len() as f32
}

/// Columns count back from the leaves: a node as tall as the whole tree lands at 0.
pub(super) fn x_position<T: TreeModel + ?Sized>(tree: &T, node: NodeId, max_depth: usize) -> f32 {
    if max_depth == 0 {
        return 1.0;
    }
    1.0 - tree.max_depth(node) as f32 / max_depth as f32
}

/// Elbow from the child's dot to the parent's vertical bar, stopping short of
/// the parent dot.
pub(super) fn branch_segments(child: Pos2, parent: Pos2, radius: f32) -> Vec<[Pos2; 2]> {
    let retreat = if child.y < parent.y { -radius } else { radius };
    vec![
        [pos2(child.x - radius, child.y), pos2(parent.x, child.y)],
        [pos2(parent.x, child.y), pos2(parent.x, parent.y + retreat)],
    ]
}
