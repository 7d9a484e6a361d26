//! Raster data structures

mod classified;
mod element;
mod geotransform;
mod grid;

pub use classified::{ClassId, ClassifiedMap, CLASS_NODATA};
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
