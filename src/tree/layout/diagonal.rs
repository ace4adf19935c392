use std::f32::consts::SQRT_2;

use egui::{pos2, Pos2};

use super::{NodeId, NodeLayout, TreeModel};

/// Midpoint of the outermost children, each projected as if it enclosed as
/// many leaves as the larger of the two. Keeps sloped branches from crossing
/// when sibling clades differ in size.
pub(super) fn branch_y<T: TreeModel + ?Sized>(
    tree: &T,
    children: &[NodeId],
    nodes: &[NodeLayout],
    total_leaves: usize,
) -> f32 {
    let lo = children
        .iter()
        .copied()
        .min_by(|&a, &b| tree.compare_nodes(a, b));
    let hi = children
        .iter()
        .copied()
        .max_by(|&a, &b| tree.compare_nodes(a, b));
    let (Some(lo), Some(hi)) = (lo, hi) else {
        return 0.0;
    };

    let y_of = |id: NodeId| nodes.get(id).map(|n| n.unscaled.y).unwrap_or(0.0);
    let (lo_y, hi_y) = projected_child_ys(
        y_of(lo),
        tree.enclosed_leaf_count(lo),
        y_of(hi),
        tree.enclosed_leaf_count(hi),
        total_leaves,
    );
    (lo_y + hi_y) / 2.0
}

/// Adjusted heights of the low and high child. The low child moves down and
/// the high child moves up by half a row per leaf it lacks relative to the
/// larger sibling.
pub fn projected_child_ys(
    lo_y: f32,
    lo_leaves: usize,
    hi_y: f32,
    hi_leaves: usize,
    total_leaves: usize,
) -> (f32, f32) {
    if total_leaves == 0 {
        return (lo_y, hi_y);
    }
    let step = 1.0 / total_leaves as f32;
    let lo_leaves = lo_leaves as f32;
    let hi_leaves = hi_leaves as f32;
    let widest = lo_leaves.max(hi_leaves);
    (
        lo_y + (widest - lo_leaves) * step / 2.0,
        hi_y - (widest - hi_leaves) * step / 2.0,
    )
}

pub(super) fn x_position<T: TreeModel + ?Sized>(tree: &T, node: NodeId, total_leaves: usize) -> f32 {
    if total_leaves == 0 {
        return 1.0;
    }
    let enclosed = tree.enclosed_leaf_count(node).max(1);
    1.0 - (enclosed - 1) as f32 / total_leaves as f32
}

/// Straight line from the child to the rim of the parent's dot.
pub(super) fn branch_segments(child: Pos2, parent: Pos2, radius: f32) -> Vec<[Pos2; 2]> {
    let retreat = radius * SQRT_2 / 2.0;
    let retreat_y = if parent.y > child.y { -retreat } else { retreat };
    vec![[child, pos2(parent.x + retreat, parent.y + retreat_y)]]
}
