//! Cladogram layout, viewport scaling and hit testing for phylogenetic trees.

pub mod app;
pub mod config;
pub mod error;
pub mod io;
pub mod tree;

pub use config::CladogramConfig;
pub use error::QueryError;
pub use tree::cladogram::Cladogram;
pub use tree::layout::LayoutPolicy;
pub use tree::{NodeId, Tree, TreeModel};
