use crate::tree::layout::LayoutPolicy;

/// Rows smaller than this many pixels start eliding leaves.
pub const DEFAULT_SKIP_THRESHOLD: f32 = 3.0;

/// Tunables for one cladogram pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CladogramConfig {
    /// Force square row/column cells instead of stretching to fill the viewport.
    pub keep_aspect_ratio: bool,
    /// Label rotation in radians.
    pub text_rotation: f32,
    /// Node dot diameter relative to the text size. `None` uses the policy default.
    pub dot_mult: Option<f32>,
    pub skip_threshold: f32,
}

impl Default for CladogramConfig {
    fn default() -> Self {
        Self {
            keep_aspect_ratio: true,
            text_rotation: 0.0,
            dot_mult: None,
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
        }
    }
}

impl CladogramConfig {
    pub fn dot_mult_for(&self, policy: LayoutPolicy) -> f32 {
        self.dot_mult.unwrap_or_else(|| policy.default_dot_mult())
    }
}
