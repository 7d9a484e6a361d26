//! # vegcover Algorithms
//!
//! Vegetation cover analysis on co-registered red / near-infrared bands.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: Bounded normalized-difference vegetation index
//! - **classification**: Seeded 1-D k-means with ordered classes
//! - **statistics**: Area per class, index statistics per class
//! - **pipeline**: All of the above in one call

pub mod classification;
pub mod imagery;
pub mod pipeline;
pub mod statistics;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{classify, Classification, KmeansParams, SpectralClassifier};
    pub use crate::imagery::{compute_index, ndvi, normalized_difference, IndexCalculator};
    pub use crate::pipeline::{analyze, Analysis, AnalysisConfig};
    pub use crate::statistics::{
        class_statistics, quantify, quantify_with_transform, AreaQuantifier, AreaStats, ClassArea,
        ClassIndexStats, CoordinateRegime,
    };
    pub use vegcover_core::prelude::*;
}
