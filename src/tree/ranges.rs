use std::collections::HashMap;

use egui::{pos2, Pos2, Rect};
use log::debug;

use super::detail::SkipSet;
use super::layout::UnscaledLayout;
use super::metrics::TextMetrics;
use super::scale::ScaleState;
use super::{NodeId, TreeModel};

/// Z-key given to nodes under direct pointer interaction.
pub const RAISED_Z_KEY: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphKind {
    /// The node dot, widened to cover the bend toward its parent.
    Node,
    Label,
}

/// Screen-space bounds of one glyph of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRange {
    pub node: NodeId,
    pub kind: GlyphKind,
    pub rect: Rect,
    pub z_key: i32,
    /// Screen position of the node itself, independent of the glyph bounds.
    pub position: Pos2,
    seq: usize,
}

/// What the renderer receives, in back-to-front order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub kind: GlyphKind,
    pub rect: Rect,
    pub skipped: bool,
}

/// Glyph bounds for every node, kept sorted by z-key.
///
/// Ranges with equal z-keys keep the order they were generated in (pre-order,
/// node glyph before label), so later entries draw on top and win hit tests.
#[derive(Debug, Clone, Default)]
pub struct NodeRangeIndex {
    pub(super) ranges: Vec<NodeRange>,
    positions: Vec<Option<Pos2>>,
    z_keys: HashMap<NodeId, i32>,
}

impl NodeRangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[NodeRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn screen_position(&self, node: NodeId) -> Option<Pos2> {
        self.positions.get(node).copied().flatten()
    }

    /// Recompute every range from scratch for the current scale.
    pub fn rebuild<T: TreeModel + ?Sized>(
        &mut self,
        tree: &T,
        layout: &UnscaledLayout,
        scale: &ScaleState,
        metrics: &dyn TextMetrics,
    ) {
        self.ranges.clear();
        self.positions.clear();
        self.positions.resize(layout.nodes.len(), None);

        let Some(root) = tree.root() else {
            self.z_keys.clear();
            return;
        };
        if layout.extent.is_empty() {
            self.z_keys.clear();
            return;
        }

        let order = preorder(tree, root, layout.nodes.len());
        for &node in &order {
            self.positions[node] = Some(scale.to_screen(layout.nodes[node].unscaled));
        }

        let rad = scale.node_radius();
        let text_height = (metrics.ascent() + metrics.descent()) * scale.text_size;
        self.ranges.reserve(order.len() * 2);
        for &node in &order {
            let Some(pos) = self.positions[node] else {
                continue;
            };
            let parent = tree
                .parent(node)
                .and_then(|p| self.screen_position(p))
                .unwrap_or(pos);

            let dot = Rect::from_min_max(
                pos2(pos.x.min(parent.x) - rad, pos.y.min(parent.y) - rad),
                pos2(pos.x.max(parent.x) + rad, pos.y.max(parent.y) + rad),
            );
            let label_x = pos.x + scale.dot_width;
            let label = Rect::from_min_max(
                pos2(label_x, pos.y - text_height / 2.0),
                pos2(
                    label_x + layout.nodes[node].unit_text_width * scale.text_size,
                    pos.y + text_height / 2.0,
                ),
            );

            let z_key = self.z_keys.get(&node).copied().unwrap_or(0);
            for (kind, rect) in [(GlyphKind::Node, dot), (GlyphKind::Label, label)] {
                let seq = self.ranges.len();
                self.ranges.push(NodeRange {
                    node,
                    kind,
                    rect,
                    z_key,
                    position: pos,
                    seq,
                });
            }
        }

        // Drop z-keys of nodes that left the tree.
        let positions = &self.positions;
        self.z_keys
            .retain(|&node, _| positions.get(node).is_some_and(Option::is_some));

        self.resort();
        debug!("Rebuilt {} node ranges for {} nodes", self.ranges.len(), order.len());
    }

    pub fn z_key(&self, node: NodeId) -> i32 {
        self.z_keys.get(&node).copied().unwrap_or(0)
    }

    pub fn set_z_key(&mut self, node: NodeId, z_key: i32) {
        if self.z_key(node) == z_key {
            return;
        }
        if z_key == 0 {
            self.z_keys.remove(&node);
        } else {
            self.z_keys.insert(node, z_key);
        }
        for range in self.ranges.iter_mut().filter(|r| r.node == node) {
            range.z_key = z_key;
        }
        self.resort();
    }

    /// Draw `node` and its ancestors above everything else. Any previously
    /// assigned z-keys are cleared first, so only one lineage is raised at a time.
    pub fn raise_lineage<T: TreeModel + ?Sized>(&mut self, tree: &T, node: NodeId) {
        self.z_keys.clear();
        let mut current = Some(node);
        let mut steps = 0usize;
        while let Some(id) = current {
            self.z_keys.insert(id, RAISED_Z_KEY);
            current = tree.parent(id);
            steps += 1;
            if steps > tree.node_count() {
                break;
            }
        }
        self.apply_z_keys();
    }

    pub fn reset_z_keys(&mut self) {
        if self.z_keys.is_empty() {
            return;
        }
        self.z_keys.clear();
        self.apply_z_keys();
    }

    /// Ranges in drawing order, flagged when their node is elided.
    pub fn draw_items<'a>(&'a self, skip: &'a SkipSet) -> impl Iterator<Item = DrawItem> + 'a {
        self.ranges.iter().map(move |range| DrawItem {
            node: range.node,
            kind: range.kind,
            rect: range.rect,
            skipped: skip.contains(range.node),
        })
    }

    fn apply_z_keys(&mut self) {
        for range in &mut self.ranges {
            range.z_key = self.z_keys.get(&range.node).copied().unwrap_or(0);
        }
        self.resort();
    }

    fn resort(&mut self) {
        self.ranges.sort_by_key(|range| (range.z_key, range.seq));
    }
}

fn preorder<T: TreeModel + ?Sized>(tree: &T, root: NodeId, bound: usize) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(bound);
    let mut seen = vec![false; bound];
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node >= bound || std::mem::replace(&mut seen[node], true) {
            continue;
        }
        order.push(node);
        stack.extend(tree.children(node).iter().rev().copied());
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::layout::{compute_unscaled_layout, LayoutPolicy};
    use crate::tree::metrics::FixedAdvanceMetrics;
    use crate::tree::scale::{solve_scale, ScaleOptions};
    use crate::tree::{tree_from_parents, Tree};
    use egui::vec2;

    fn build(tree: &Tree, viewport: Rect) -> (UnscaledLayout, ScaleState, NodeRangeIndex) {
        let metrics = FixedAdvanceMetrics::default();
        let layout = compute_unscaled_layout(tree, &tree.leaves_in_order(), LayoutPolicy::Orthogonal, &metrics);
        let options = ScaleOptions {
            keep_aspect_ratio: true,
            text_rotation: 0.0,
            dot_mult: 0.5,
        };
        let scale = solve_scale(&layout.extent, viewport, options);
        let mut index = NodeRangeIndex::new();
        index.rebuild(tree, &layout, &scale, &metrics);
        (layout, scale, index)
    }

    fn viewport() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0))
    }

    #[test]
    fn every_node_gets_a_dot_and_a_label() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (_, _, index) = build(&tree, viewport());
        assert_eq!(index.len(), 2 * tree.nodes.len());
        for node in &tree.nodes {
            let kinds: Vec<GlyphKind> = index
                .ranges()
                .iter()
                .filter(|r| r.node == node.id)
                .map(|r| r.kind)
                .collect();
            assert_eq!(kinds, [GlyphKind::Node, GlyphKind::Label]);
        }
    }

    #[test]
    fn dot_range_covers_parent_bend() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (_, scale, index) = build(&tree, viewport());
        let rad = scale.node_radius();
        for range in index.ranges().iter().filter(|r| r.kind == GlyphKind::Node) {
            let pos = index.screen_position(range.node).unwrap();
            assert!(range.rect.contains(pos));
            if let Some(parent) = tree.nodes[range.node].parent {
                let parent_pos = index.screen_position(parent).unwrap();
                assert!(range.rect.contains(parent_pos));
                assert!((range.rect.min.x - (pos.x.min(parent_pos.x) - rad)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn label_starts_one_dot_right_of_node() {
        let tree = Tree::from_newick("((Alpha,B),C);").unwrap();
        let (layout, scale, index) = build(&tree, viewport());
        let metrics = FixedAdvanceMetrics::default();
        let text_height = (metrics.ascent + metrics.descent) * scale.text_size;
        for range in index.ranges().iter().filter(|r| r.kind == GlyphKind::Label) {
            assert!((range.rect.min.x - (range.position.x + scale.dot_width)).abs() < 1e-4);
            assert!((range.rect.height() - text_height).abs() < 1e-4);
            let width = layout.nodes[range.node].unit_text_width * scale.text_size;
            assert!((range.rect.width() - width).abs() < 1e-3);
        }
    }

    #[test]
    fn raising_a_lineage_moves_it_to_the_end() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (_, _, mut index) = build(&tree, viewport());
        let leaf = tree.leaves_in_order()[0];
        index.raise_lineage(&tree, leaf);

        let raised: Vec<NodeId> = index
            .ranges()
            .iter()
            .filter(|r| r.z_key == RAISED_Z_KEY)
            .map(|r| r.node)
            .collect();
        assert_eq!(raised.len(), 2 * 3);
        assert!(index.ranges()[index.len() - 6..]
            .iter()
            .all(|r| r.z_key == RAISED_Z_KEY));
        assert!(raised.contains(&leaf));
        assert!(raised.contains(&tree.root.unwrap()));

        index.reset_z_keys();
        assert!(index.ranges().iter().all(|r| r.z_key == 0));
        let seqs: Vec<usize> = index.ranges().iter().map(|r| r.seq).collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn raising_another_lineage_lowers_the_first() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (_, _, mut index) = build(&tree, viewport());
        let leaves = tree.leaves_in_order();
        index.raise_lineage(&tree, leaves[0]);
        index.raise_lineage(&tree, leaves[3]);

        assert_eq!(index.z_key(leaves[0]), 0);
        assert_eq!(index.z_key(tree.nodes[leaves[0]].parent.unwrap()), 0);
        assert_eq!(index.z_key(leaves[3]), RAISED_Z_KEY);
        assert_eq!(index.z_key(tree.root.unwrap()), RAISED_Z_KEY);
        let raised = index.ranges().iter().filter(|r| r.z_key == RAISED_Z_KEY).count();
        assert_eq!(raised, 2 * 3);
    }

    #[test]
    fn z_keys_survive_rebuild_but_not_node_removal() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (layout, scale, mut index) = build(&tree, viewport());
        let leaf = tree.leaves_in_order()[1];
        index.set_z_key(leaf, 3);
        index.rebuild(&tree, &layout, &scale, &FixedAdvanceMetrics::default());
        assert_eq!(index.ranges().last().map(|r| r.node), Some(leaf));
        assert_eq!(index.z_key(leaf), 3);

        let small = tree_from_parents(&[("only", None)]);
        let (small_layout, small_scale, _) = build(&small, viewport());
        index.rebuild(&small, &small_layout, &small_scale, &FixedAdvanceMetrics::default());
        assert_eq!(index.len(), 2);
        if leaf != 0 {
            assert_eq!(index.z_key(leaf), 0);
        }
    }

    #[test]
    fn empty_tree_clears_ranges() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (_, _, mut index) = build(&tree, viewport());
        let empty = Tree::from_nodes(0, None, Vec::new());
        let metrics = FixedAdvanceMetrics::default();
        let layout = compute_unscaled_layout(&empty, &[], LayoutPolicy::Orthogonal, &metrics);
        index.rebuild(&empty, &layout, &ScaleState::empty(viewport()), &metrics);
        assert!(index.is_empty());
    }

    #[test]
    fn draw_items_flag_skipped_nodes() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let (layout, _, index) = build(&tree, viewport());
        let skip = crate::tree::detail::compute_skip_set(&layout.leaves, 1.0, 3.0);
        let items: Vec<DrawItem> = index.draw_items(&skip).collect();
        assert_eq!(items.len(), index.len());
        for item in items {
            assert_eq!(item.skipped, skip.contains(item.node));
        }
    }
}
