mod area;
mod output;

pub mod compare;
pub mod export;
pub mod grid;
pub mod heatmap;
pub mod rank;
pub mod scan;
pub mod status;
