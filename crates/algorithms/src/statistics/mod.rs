//! Statistics derived from classified rasters
//!
//! - **area**: per-class area in km² (AreaQuantifier)
//! - **zonal**: index statistics per class

pub mod area;
pub mod zonal;

pub use area::{
    quantify, quantify_with_transform, AreaQuantifier, AreaStats, ClassArea, CoordinateRegime,
};
pub use zonal::{class_statistics, ClassIndexStats};
