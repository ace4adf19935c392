use egui::{pos2, Pos2, Rect};

use super::layout::{LayoutExtent, LayoutPolicy};
use crate::config::CladogramConfig;

/// Inputs to [`solve_scale`] that come from configuration rather than the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleOptions {
    pub keep_aspect_ratio: bool,
    pub text_rotation: f32,
    pub dot_mult: f32,
}

impl ScaleOptions {
    pub fn from_config(config: &CladogramConfig, policy: LayoutPolicy) -> Self {
        Self {
            keep_aspect_ratio: config.keep_aspect_ratio,
            text_rotation: config.text_rotation,
            dot_mult: config.dot_mult_for(policy),
        }
    }
}

/// Screen-space sizing of a laid-out tree inside one viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScaleState {
    pub row_size: f32,
    pub col_size: f32,
    pub text_size: f32,
    pub dot_width: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl ScaleState {
    /// All sizes zero, anchored at the viewport origin.
    pub fn empty(viewport: Rect) -> Self {
        Self {
            offset_x: viewport.min.x,
            offset_y: viewport.min.y,
            ..Self::default()
        }
    }

    pub fn node_radius(&self) -> f32 {
        self.dot_width / 2.0
    }

    pub fn to_screen(&self, unscaled: Pos2) -> Pos2 {
        pos2(
            unscaled.x * self.scale_x + self.offset_x,
            unscaled.y * self.scale_y + self.offset_y,
        )
    }
}

/// Fit rows, columns and text into `viewport`.
///
/// The steps run in a fixed order, each clamping the next: row height from
/// the viewport height, text size capped at half the viewport width across
/// the gutter, column width from what remains, then the optional square-cell
/// lock and a final text clamp.
pub fn solve_scale(extent: &LayoutExtent, viewport: Rect, options: ScaleOptions) -> ScaleState {
    if extent.is_empty() {
        return ScaleState::empty(viewport);
    }

    let width = viewport.width().max(0.0);
    let height = viewport.height().max(0.0);
    let num_rows = extent.num_rows as f32;
    let num_cols = extent.num_cols;
    let gutter = extent.gutter_width;

    let overhang = gutter * options.text_rotation.sin();
    let mut row_size = height / (num_rows + overhang.abs());
    let mut text_size = (width / gutter * 0.5).min(row_size);
    let mut col_size = width / (num_cols + 1.0 + gutter);

    if options.keep_aspect_ratio {
        let cell = row_size.min(col_size);
        row_size = cell;
        col_size = cell;
    }
    text_size = row_size.min(text_size);
    let dot_width = text_size * options.dot_mult;

    let scale_x = if extent.num_rows == 1 {
        0.0
    } else {
        col_size * num_cols
    };
    let scale_y = row_size * num_rows;

    let offset_x = (width - scale_x - gutter * text_size - text_size) / 2.0 + viewport.min.x;
    let offset_y = (height - scale_y - overhang * text_size) / 2.0 + viewport.min.y;

    ScaleState {
        row_size,
        col_size,
        text_size,
        dot_width,
        scale_x,
        scale_y,
        offset_x,
        offset_y,
    }
}
