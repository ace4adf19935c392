use egui::{Pos2, Rect};

/// Rejected arguments to the spatial queries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("query point is not finite: ({}, {})", .0.x, .0.y)]
    NonFinitePoint(Pos2),
    #[error("query rectangle is not finite: {0:?}")]
    NonFiniteRect(Rect),
    #[error("search radius must be a non-negative finite number, got {0}")]
    InvalidRadius(f32),
}
