use egui::{pos2, Pos2, Vec2};

use super::detail::SkipSet;
use super::layout::LayoutPolicy;
use super::metrics::TextMetrics;
use super::ranges::{GlyphKind, NodeRangeIndex};
use super::scale::ScaleState;
use super::{NodeId, TreeModel};

/// Backend-neutral drawing command for one piece of one node.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenePrimitive {
    FillCircle {
        node: NodeId,
        center: Pos2,
        radius: f32,
    },
    StrokeLine {
        node: NodeId,
        from: Pos2,
        to: Pos2,
    },
    Text {
        node: NodeId,
        text: String,
        /// Left end of the baseline.
        anchor: Pos2,
        angle: f32,
        size: f32,
    },
}

impl ScenePrimitive {
    pub fn node(&self) -> NodeId {
        match self {
            ScenePrimitive::FillCircle { node, .. }
            | ScenePrimitive::StrokeLine { node, .. }
            | ScenePrimitive::Text { node, .. } => *node,
        }
    }
}

pub struct TreeScene {
    pub size: Vec2,
    pub primitives: Vec<ScenePrimitive>,
}

impl TreeScene {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

/// Offset from a node's Y to the baseline that centers its label on the row.
pub fn label_baseline_offset(metrics: &dyn TextMetrics, text_size: f32) -> f32 {
    (metrics.ascent() - metrics.descent()) * text_size / 2.0
}

/// Turn the index into drawing commands, back to front.
///
/// Each node contributes its branch toward the parent when its node glyph is
/// reached and its label when the label glyph is reached, so raised lineages
/// paint over everything else. Elided nodes keep their branches but lose the
/// dot and the label.
#[allow(clippy::too_many_arguments)]
pub fn build_tree_scene<T: TreeModel + ?Sized>(
    tree: &T,
    policy: LayoutPolicy,
    index: &NodeRangeIndex,
    scale: &ScaleState,
    skip: &SkipSet,
    metrics: &dyn TextMetrics,
    text_rotation: f32,
    size: Vec2,
) -> TreeScene {
    let rad = scale.node_radius();
    let baseline = label_baseline_offset(metrics, scale.text_size);
    let mut primitives = Vec::with_capacity(index.len() * 2);

    for range in index.ranges() {
        let node = range.node;
        let pos = range.position;
        let skipped = skip.contains(node);
        match range.kind {
            GlyphKind::Node => {
                if let Some(parent) = tree.parent(node).and_then(|p| index.screen_position(p)) {
                    for [from, to] in policy.branch_segments(pos, parent, rad) {
                        primitives.push(ScenePrimitive::StrokeLine { node, from, to });
                    }
                }
                if !skipped && rad > 0.0 {
                    primitives.push(ScenePrimitive::FillCircle {
                        node,
                        center: pos,
                        radius: rad,
                    });
                }
            }
            GlyphKind::Label => {
                let text = tree.name(node);
                if skipped || text.is_empty() || scale.text_size <= 0.0 {
                    continue;
                }
                primitives.push(ScenePrimitive::Text {
                    node,
                    text: text.to_string(),
                    anchor: pos2(pos.x + scale.dot_width, pos.y + baseline),
                    angle: text_rotation,
                    size: scale.text_size,
                });
            }
        }
    }

    TreeScene { size, primitives }
}
