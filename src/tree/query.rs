//! Hit testing against the [`NodeRangeIndex`].
//!
//! Queries scan the z-sorted range list, so results come back in drawing
//! order and the last match is the one drawn on top.

use egui::{vec2, Pos2, Rect};

use super::ranges::{GlyphKind, NodeRange, NodeRangeIndex};
use super::NodeId;
use crate::error::QueryError;

/// Default half-width of the box searched by [`NodeRangeIndex::nearest`].
pub const NEAREST_RADIUS: f32 = 100.0;

impl NodeRangeIndex {
    /// All ranges whose bounds touch `rect`, in drawing order.
    pub fn range_query(&self, rect: Rect) -> Result<Vec<&NodeRange>, QueryError> {
        if !(rect.min.is_finite() && rect.max.is_finite()) {
            return Err(QueryError::NonFiniteRect(rect));
        }
        Ok(self
            .ranges
            .iter()
            .filter(|range| range.rect.intersects(rect))
            .collect())
    }

    pub fn point_query(&self, pt: Pos2) -> Result<Vec<&NodeRange>, QueryError> {
        check_point(pt)?;
        self.range_query(Rect::from_min_max(pt, pt))
    }

    /// The node glyph closest to `pt` among those whose bounds touch the
    /// square of half-width `radius` around it. Distance is measured to the
    /// node position, not to its bounds; the first of equally near nodes wins.
    pub fn nearest(&self, pt: Pos2, radius: f32) -> Result<Option<&NodeRange>, QueryError> {
        check_point(pt)?;
        if !radius.is_finite() || radius < 0.0 {
            return Err(QueryError::InvalidRadius(radius));
        }

        let area = Rect::from_center_size(pt, vec2(radius * 2.0, radius * 2.0));
        let mut nearest = None;
        let mut nearest_dist = f32::MAX;
        for range in self.range_query(area)? {
            if range.kind != GlyphKind::Node {
                continue;
            }
            let dist = pt.distance_sq(range.position);
            if dist < nearest_dist {
                nearest = Some(range);
                nearest_dist = dist;
            }
        }
        Ok(nearest)
    }

    /// Distinct nodes whose dot bounds touch `rect`, in drawing order.
    pub fn nodes_in_rect(&self, rect: Rect) -> Result<Vec<NodeId>, QueryError> {
        let mut nodes = Vec::new();
        for range in self.range_query(rect)? {
            if range.kind == GlyphKind::Node && !nodes.contains(&range.node) {
                nodes.push(range.node);
            }
        }
        Ok(nodes)
    }
}

fn check_point(pt: Pos2) -> Result<(), QueryError> {
    if pt.is_finite() {
        Ok(())
    } else {
        Err(QueryError::NonFinitePoint(pt))
    }
}
