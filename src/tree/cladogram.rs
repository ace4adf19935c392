use egui::{Pos2, Rect};
use log::{debug, trace};

use super::detail::{compute_skip_set, SkipSet};
use super::layout::{compute_unscaled_layout, LayoutExtent, LayoutPolicy, UnscaledLayout};
use super::metrics::{default_metrics, TextMetrics};
use super::query::NEAREST_RADIUS;
use super::ranges::{DrawItem, NodeRange, NodeRangeIndex};
use super::scale::{solve_scale, ScaleOptions, ScaleState};
use super::scene::{build_tree_scene, TreeScene};
use super::{NodeId, TreeModel};
use crate::config::CladogramConfig;
use crate::error::QueryError;

/// Which stages ran during one [`Cladogram::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub relayout: bool,
    pub rescale: bool,
}

/// Layout, scale, range index and skip set for one tree in one viewport.
///
/// Each stage is cached and only recomputed when its inputs change: the
/// layout on a new tree revision or leaf order, the scale and everything
/// downstream on a new layout, viewport or configuration.
pub struct Cladogram {
    policy: LayoutPolicy,
    config: CladogramConfig,
    metrics: Box<dyn TextMetrics>,
    layout: Option<UnscaledLayout>,
    layout_key: Option<(u64, usize)>,
    leaf_order: Vec<NodeId>,
    viewport: Rect,
    scale: ScaleState,
    index: NodeRangeIndex,
    skip: SkipSet,
    scale_dirty: bool,
}

impl Cladogram {
    pub fn new(policy: LayoutPolicy, config: CladogramConfig) -> Self {
        Self::with_metrics(policy, config, default_metrics())
    }

    pub fn with_metrics(policy: LayoutPolicy, config: CladogramConfig, metrics: Box<dyn TextMetrics>) -> Self {
        Self {
            policy,
            config,
            metrics,
            layout: None,
            layout_key: None,
            leaf_order: Vec::new(),
            viewport: Rect::NOTHING,
            scale: ScaleState::default(),
            index: NodeRangeIndex::new(),
            skip: SkipSet::default(),
            scale_dirty: true,
        }
    }

    pub fn policy(&self) -> LayoutPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: LayoutPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.invalidate();
        }
    }

    pub fn config(&self) -> &CladogramConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CladogramConfig) {
        if self.config != config {
            self.config = config;
            self.scale_dirty = true;
        }
    }

    /// Force a full relayout on the next update, e.g. after renaming nodes.
    pub fn invalidate(&mut self) {
        self.layout = None;
        self.layout_key = None;
        self.scale_dirty = true;
    }

    /// Bring every stage up to date for `tree` drawn into `viewport`.
    pub fn update<T: TreeModel + ?Sized>(&mut self, tree: &T, leaf_order: &[NodeId], viewport: Rect) -> PassReport {
        let mut report = PassReport::default();

        let key = (tree.revision(), tree.node_count());
        if self.layout.is_none() || self.layout_key != Some(key) || self.leaf_order != leaf_order {
            self.layout = Some(compute_unscaled_layout(
                tree,
                leaf_order,
                self.policy,
                self.metrics.as_ref(),
            ));
            self.layout_key = Some(key);
            self.leaf_order = leaf_order.to_vec();
            report.relayout = true;
        }

        if report.relayout || self.scale_dirty || self.viewport != viewport {
            let Some(layout) = &self.layout else {
                return report;
            };
            let options = ScaleOptions::from_config(&self.config, self.policy);
            self.viewport = viewport;
            self.scale = solve_scale(&layout.extent, viewport, options);
            self.index.rebuild(tree, layout, &self.scale, self.metrics.as_ref());
            self.skip = compute_skip_set(&layout.leaves, self.scale.row_size, self.config.skip_threshold);
            self.scale_dirty = false;
            report.rescale = true;
            debug!(
                "Rescaled to {:.1}x{:.1}: row {:.2}px, text {:.2}px, {} skipped",
                viewport.width(),
                viewport.height(),
                self.scale.row_size,
                self.scale.text_size,
                self.skip.len()
            );
        } else {
            trace!("Cladogram up to date");
        }

        report
    }

    pub fn layout(&self) -> Option<&UnscaledLayout> {
        self.layout.as_ref()
    }

    pub fn extent(&self) -> Option<&LayoutExtent> {
        self.layout.as_ref().map(|layout| &layout.extent)
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn scale(&self) -> &ScaleState {
        &self.scale
    }

    pub fn index(&self) -> &NodeRangeIndex {
        &self.index
    }

    pub fn skip_set(&self) -> &SkipSet {
        &self.skip
    }

    pub fn metrics(&self) -> &dyn TextMetrics {
        self.metrics.as_ref()
    }

    pub fn draw_items(&self) -> impl Iterator<Item = DrawItem> + '_ {
        self.index.draw_items(&self.skip)
    }

    pub fn scene<T: TreeModel + ?Sized>(&self, tree: &T) -> TreeScene {
        build_tree_scene(
            tree,
            self.policy,
            &self.index,
            &self.scale,
            &self.skip,
            self.metrics.as_ref(),
            self.config.text_rotation,
            self.viewport.size(),
        )
    }

    pub fn range_query(&self, rect: Rect) -> Result<Vec<&NodeRange>, QueryError> {
        self.index.range_query(rect)
    }

    pub fn point_query(&self, pt: Pos2) -> Result<Vec<&NodeRange>, QueryError> {
        self.index.point_query(pt)
    }

    pub fn nearest(&self, pt: Pos2, radius: f32) -> Result<Option<&NodeRange>, QueryError> {
        self.index.nearest(pt, radius)
    }

    pub fn nodes_in_rect(&self, rect: Rect) -> Result<Vec<NodeId>, QueryError> {
        self.index.nodes_in_rect(rect)
    }

    /// Raise the lineage of the node nearest to the pointer, lowering any
    /// previously raised one. Returns the hovered node.
    pub fn hover<T: TreeModel + ?Sized>(&mut self, tree: &T, pt: Pos2) -> Result<Option<NodeId>, QueryError> {
        let hit = self.index.nearest(pt, NEAREST_RADIUS)?.map(|range| range.node);
        self.index.reset_z_keys();
        if let Some(node) = hit {
            self.index.raise_lineage(tree, node);
        }
        Ok(hit)
    }

    pub fn clear_hover(&mut self) {
        self.index.reset_z_keys();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::metrics::FixedAdvanceMetrics;
    use crate::tree::ranges::{GlyphKind, RAISED_Z_KEY};
    use crate::tree::{tree_from_parents, Tree};
    use egui::{pos2, vec2};

    fn cladogram(policy: LayoutPolicy) -> Cladogram {
        Cladogram::with_metrics(
            policy,
            CladogramConfig::default(),
            Box::new(FixedAdvanceMetrics::default()),
        )
    }

    fn viewport(w: f32, h: f32) -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(w, h))
    }

    #[test]
    fn single_node_tree_draws_one_dot() {
        let tree = tree_from_parents(&[("only", None)]);
        let mut clado = cladogram(LayoutPolicy::Orthogonal);
        clado.update(&tree, &tree.leaves_in_order(), viewport(400.0, 300.0));

        assert_eq!(clado.extent().map(|e| e.num_rows), Some(1));
        assert_eq!(clado.scale().scale_x, 0.0);
        let nodes: Vec<&NodeRange> = clado
            .index()
            .ranges()
            .iter()
            .filter(|r| r.kind == GlyphKind::Node)
            .collect();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].position.is_finite());
    }

    #[test]
    fn stages_rerun_only_when_inputs_change() {
        let mut tree = Tree::from_newick("((A,(B,C)),(D,E));").unwrap();
        let mut clado = cladogram(LayoutPolicy::Orthogonal);

        let first = clado.update(&tree, &tree.leaves_in_order(), viewport(400.0, 300.0));
        assert_eq!(first, PassReport { relayout: true, rescale: true });

        let again = clado.update(&tree, &tree.leaves_in_order(), viewport(400.0, 300.0));
        assert_eq!(again, PassReport::default());

        let resized = clado.update(&tree, &tree.leaves_in_order(), viewport(800.0, 300.0));
        assert_eq!(resized, PassReport { relayout: false, rescale: true });

        tree.ladderize(true);
        let mutated = clado.update(&tree, &tree.leaves_in_order(), viewport(800.0, 300.0));
        assert_eq!(mutated, PassReport { relayout: true, rescale: true });

        clado.set_config(CladogramConfig {
            keep_aspect_ratio: false,
            ..CladogramConfig::default()
        });
        let reconfigured = clado.update(&tree, &tree.leaves_in_order(), viewport(800.0, 300.0));
        assert_eq!(reconfigured, PassReport { relayout: false, rescale: true });
    }

    #[test]
    fn crowded_rows_fill_the_skip_set() {
        let leaves: Vec<String> = (0..200).map(|i| format!("t{i}")).collect();
        let newick = format!("({});", leaves.join(","));
        let tree = Tree::from_newick(&newick).unwrap();
        let mut clado = cladogram(LayoutPolicy::Orthogonal);

        clado.update(&tree, &tree.leaves_in_order(), viewport(2000.0, 2000.0));
        assert!(clado.skip_set().is_empty());

        clado.update(&tree, &tree.leaves_in_order(), viewport(2000.0, 200.0));
        assert!(clado.scale().row_size < 3.0);
        assert!(!clado.skip_set().is_empty());
        let skipped = clado.draw_items().filter(|item| item.skipped).count();
        assert_eq!(skipped, 2 * clado.skip_set().len());
    }

    #[test]
    fn hover_raises_lineage_and_clears() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let mut clado = cladogram(LayoutPolicy::Diagonal);
        clado.update(&tree, &tree.leaves_in_order(), viewport(400.0, 400.0));

        let leaf = tree.leaves_in_order()[2];
        let pos = clado.index().screen_position(leaf).unwrap();
        assert_eq!(clado.hover(&tree, pos).unwrap(), Some(leaf));
        assert_eq!(clado.index().z_key(leaf), RAISED_Z_KEY);
        assert_eq!(clado.index().z_key(tree.root.unwrap()), RAISED_Z_KEY);
        assert_eq!(clado.draw_items().last().map(|item| item.node), Some(leaf));

        clado.clear_hover();
        assert_eq!(clado.index().z_key(leaf), 0);
        assert!(clado.hover(&tree, pos2(f32::NAN, 0.0)).is_err());
    }

    #[test]
    fn switching_policy_forces_relayout() {
        let tree = Tree::from_newick("((A,B),(C,(D,E)));").unwrap();
        let mut clado = cladogram(LayoutPolicy::Orthogonal);
        clado.update(&tree, &tree.leaves_in_order(), viewport(400.0, 400.0));
        let ortho_cols = clado.extent().map(|e| e.num_cols);

        clado.set_policy(LayoutPolicy::Diagonal);
        let report = clado.update(&tree, &tree.leaves_in_order(), viewport(400.0, 400.0));
        assert!(report.relayout);
        assert_ne!(clado.extent().map(|e| e.num_cols), ortho_cols);
        assert_eq!(clado.scale().dot_width, clado.scale().text_size * 0.25);
    }

    #[test]
    fn empty_tree_yields_empty_index() {
        let tree = Tree::from_nodes(0, None, Vec::new());
        let mut clado = cladogram(LayoutPolicy::Orthogonal);
        clado.update(&tree, &[], viewport(400.0, 400.0));
        assert!(clado.index().is_empty());
        assert!(clado.scene(&tree).is_empty());
        assert!(clado.nearest(pos2(10.0, 10.0), NEAREST_RADIUS).unwrap().is_none());
    }

    #[test]
    fn queries_cover_the_whole_viewport() {
        let tree = Tree::from_newick("((A,B),(C,D),E);").unwrap();
        let mut clado = cladogram(LayoutPolicy::Orthogonal);
        let view = viewport(500.0, 300.0);
        clado.update(&tree, &tree.leaves_in_order(), view);
        assert_eq!(clado.range_query(view).unwrap().len(), 2 * tree.nodes.len());
        assert_eq!(clado.nodes_in_rect(view).unwrap().len(), tree.nodes.len());
        let root = clado.index().screen_position(tree.root.unwrap()).unwrap();
        assert!(!clado.point_query(root).unwrap().is_empty());
    }
}
