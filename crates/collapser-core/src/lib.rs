pub mod collapse;
pub mod config;
pub mod record;

pub use collapse::{
    collapse, collapse_by, try_collapse, try_collapse_by, CollapseReport, Collapser, Collapsible,
    TryCollapsible,
};

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
