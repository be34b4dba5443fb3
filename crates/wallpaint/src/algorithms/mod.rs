pub mod preprocessing;
pub mod edges;
pub mod extraction;
pub mod selection;
pub mod rasterize;

pub use preprocessing::*;
pub use edges::*;
pub use extraction::*;
pub use selection::*;
pub use rasterize::{fill_outlines, point_segment_distance};
