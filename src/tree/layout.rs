use egui::{pos2, Pos2};
use log::{debug, warn};

use super::metrics::TextMetrics;
use super::{NodeId, TreeModel};

mod diagonal;
mod orthogonal;

pub use diagonal::projected_child_ys;

/// Stand-in measured when no leaf carries a label, so the gutter never collapses.
pub const PLACEHOLDER_LABEL: &str = "P";

/// How branch points are placed between leaves and root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPolicy {
    /// Right-angle branches; internal nodes sit at the mean height of their children.
    Orthogonal,
    /// Sloped branches; internal nodes are placed by enclosed leaf count.
    Diagonal,
}

impl LayoutPolicy {
    pub fn default_dot_mult(self) -> f32 {
        match self {
            LayoutPolicy::Orthogonal => 0.5,
            LayoutPolicy::Diagonal => 0.25,
        }
    }

    /// Unscaled Y of an internal node whose children are already placed.
    pub fn branch_position<T: TreeModel + ?Sized>(
        self,
        tree: &T,
        node: NodeId,
        nodes: &[NodeLayout],
        total_leaves: usize,
    ) -> f32 {
        let children = tree.children(node);
        match self {
            LayoutPolicy::Orthogonal => orthogonal::branch_y(children, nodes),
            LayoutPolicy::Diagonal => diagonal::branch_y(tree, children, nodes, total_leaves),
        }
    }

    /// Unscaled X of an internal node.
    pub fn x_position<T: TreeModel + ?Sized>(
        self,
        tree: &T,
        node: NodeId,
        max_depth: usize,
        total_leaves: usize,
    ) -> f32 {
        match self {
            LayoutPolicy::Orthogonal => orthogonal::x_position(tree, node, max_depth),
            LayoutPolicy::Diagonal => diagonal::x_position(tree, node, total_leaves),
        }
    }

    /// Screen-space segments joining a child to its parent, for dots of `radius`.
    pub fn branch_segments(self, child: Pos2, parent: Pos2, radius: f32) -> Vec<[Pos2; 2]> {
        match self {
            LayoutPolicy::Orthogonal => orthogonal::branch_segments(child, parent, radius),
            LayoutPolicy::Diagonal => diagonal::branch_segments(child, parent, radius),
        }
    }

    fn num_cols(self, max_depth: usize, num_rows: usize) -> f32 {
        match self {
            LayoutPolicy::Orthogonal => max_depth as f32,
            LayoutPolicy::Diagonal => num_rows as f32 / 2.0,
        }
    }
}

/// Per-node output of the layout pass, indexed by [`NodeId`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeLayout {
    /// Position in `[0, 1] x [0, 1]`; leaves sit at `x = 1`.
    pub unscaled: Pos2,
    /// Label width at unit font size.
    pub unit_text_width: f32,
}

/// Size of the laid-out tree in rows, columns and text units.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutExtent {
    pub max_depth: usize,
    pub num_rows: usize,
    pub num_cols: f32,
    /// Widest leaf label at unit font size.
    pub gutter_width: f32,
    pub biggest_label: String,
}

impl LayoutExtent {
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }
}

#[derive(Debug, Clone)]
pub struct UnscaledLayout {
    pub policy: LayoutPolicy,
    pub nodes: Vec<NodeLayout>,
    /// Leaves in drawing order, restricted to ids that exist in the tree.
    pub leaves: Vec<NodeId>,
    pub extent: LayoutExtent,
}

impl UnscaledLayout {
    pub fn node(&self, id: NodeId) -> Option<&NodeLayout> {
        self.nodes.get(id)
    }
}

/// Place every node of `tree` in normalized coordinates.
///
/// `leaf_order` must list the tree's leaves top to bottom. A list that does not
/// match the tree produces odd positions but never panics.
pub fn compute_unscaled_layout<T: TreeModel + ?Sized>(
    tree: &T,
    leaf_order: &[NodeId],
    policy: LayoutPolicy,
    metrics: &dyn TextMetrics,
) -> UnscaledLayout {
    let count = tree.node_count();
    let mut nodes = vec![NodeLayout::default(); count];

    let leaves: Vec<NodeId> = leaf_order.iter().copied().filter(|&id| id < count).collect();
    if leaves.len() != leaf_order.len() {
        warn!(
            "Leaf order names {} id(s) outside the tree; ignoring them.",
            leaf_order.len() - leaves.len()
        );
    }

    let total_leaves = leaves.len();
    let mut gutter_width = 0.0f32;
    let mut biggest_label = String::new();
    for (index, &leaf) in leaves.iter().enumerate() {
        let width = metrics.unit_width(tree.name(leaf));
        nodes[leaf] = NodeLayout {
            unscaled: pos2(1.0, (index as f32 + 0.5) / total_leaves as f32),
            unit_text_width: width,
        };
        if width > gutter_width {
            gutter_width = width;
            biggest_label = tree.name(leaf).to_string();
        }
    }
    if biggest_label.is_empty() {
        biggest_label = PLACEHOLDER_LABEL.to_string();
        gutter_width = metrics.unit_width(PLACEHOLDER_LABEL);
    }
    let gutter_width = gutter_width.max(f32::EPSILON);

    let max_depth = tree.root().map(|root| tree.max_depth(root)).unwrap_or(0);
    if let (Some(root), true) = (tree.root(), total_leaves > 0) {
        let reached = place_branches(tree, root, policy, &mut nodes, max_depth, total_leaves, metrics);
        if reached != total_leaves {
            warn!(
                "Leaf order lists {} leaves but the tree has {}; layout may overlap.",
                total_leaves, reached
            );
        }
    }

    let extent = LayoutExtent {
        max_depth,
        num_rows: total_leaves,
        num_cols: policy.num_cols(max_depth, total_leaves),
        gutter_width,
        biggest_label,
    };
    debug!(
        "{:?} layout: {} rows, {} cols, gutter {:.3} ({:?})",
        policy, extent.num_rows, extent.num_cols, extent.gutter_width, extent.biggest_label
    );

    UnscaledLayout {
        policy,
        nodes,
        leaves,
        extent,
    }
}

/// Post-order walk placing internal nodes from their already placed children.
/// Internal labels are measured too but stay out of the gutter.
/// Returns the number of leaves reached.
fn place_branches<T: TreeModel + ?Sized>(
    tree: &T,
    root: NodeId,
    policy: LayoutPolicy,
    nodes: &mut [NodeLayout],
    max_depth: usize,
    total_leaves: usize,
    metrics: &dyn TextMetrics,
) -> usize {
    let count = nodes.len();
    let mut leaves_reached = 0usize;
    let mut entered = vec![false; count];
    let mut stack = vec![(root, false)];

    while let Some((node, children_done)) = stack.pop() {
        if node >= count {
            continue;
        }
        if tree.is_leaf(node) {
            leaves_reached += 1;
            continue;
        }
        if !children_done {
            if std::mem::replace(&mut entered[node], true) {
                continue;
            }
            stack.push((node, true));
            stack.extend(tree.children(node).iter().map(|&child| (child, false)));
            continue;
        }

        let y = policy.branch_position(tree, node, nodes, total_leaves);
        let x = policy.x_position(tree, node, max_depth, total_leaves);
        nodes[node] = NodeLayout {
            unscaled: pos2(x, y),
            unit_text_width: metrics.unit_width(tree.name(node)),
        };
    }

    leaves_reached
}
