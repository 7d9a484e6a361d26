//! Imagery analysis algorithms
//!
//! - Normalized difference: generic bounded two-band index
//! - NDVI: vegetation index from red and near-infrared bands

mod indices;

pub use indices::{compute_index, ndvi, normalized_difference, IndexCalculator};
