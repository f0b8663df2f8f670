//! Raster buffers, geometry and pixel transforms.

pub mod filters;
pub mod geom;
pub mod ops;
pub mod raster;

pub use filters::{fused_filter, FilterSettings};
pub use geom::{CropRect, Margins, Segment};
pub use ops::{ResampleFilter, Rotation};
pub use raster::{GrayRaster, RasterFrame, Rgba};
