//! Unsupervised classification of index rasters
//!
//! - **K-means**: seeded 1-D centroid clustering with ordered class labels

mod kmeans;

pub use kmeans::{classify, Classification, KmeansParams, SpectralClassifier};
