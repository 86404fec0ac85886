//! UI layer: the two demonstration plots.

pub mod heatmap;
pub mod plot;
