//! End-to-end vegetation cover analysis
//!
//! red + nir → index image → ordered classes → area per class.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classification::{classify, Classification, KmeansParams};
use crate::imagery::compute_index;
use crate::statistics::{class_statistics, quantify_with_transform, AreaStats, ClassIndexStats};
use vegcover_core::raster::{ClassId, Raster};
use vegcover_core::Result;

/// Parameters for [`analyze`], loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub kmeans: KmeansParams,
}

/// Everything produced by one analysis run
#[derive(Debug, Clone)]
pub struct Analysis {
    pub index: Raster<f64>,
    /// (min, max) of the valid index values; `None` if every pixel is NaN
    pub index_range: Option<(f64, f64)>,
    pub classification: Classification,
    pub areas: AreaStats,
    pub class_stats: BTreeMap<ClassId, ClassIndexStats>,
}

/// Run the full pipeline on a co-registered red/nir band pair.
///
/// Areas use the pixel size of the red band's geotransform.
///
/// # Errors
/// - `Error::SizeMismatch` if the bands differ in shape
/// - `Error::InvalidParameter` for bad k-means parameters
/// - `Error::InvalidDimensions` for zero-sized bands
pub fn analyze(red: &Raster<f64>, nir: &Raster<f64>, config: &AnalysisConfig) -> Result<Analysis> {
    let (rows, cols) = red.shape();
    debug!(rows, cols, ?config, "starting analysis");

    let index = compute_index(red, nir)?;
    let index_range = valid_range(&index);
    debug!(?index_range, "index computed");

    let classification = classify(&index, &config.kmeans)?;
    if classification.was_reduced() {
        info!(
            requested = classification.requested_k,
            actual = classification.actual_k,
            "class count reduced to the number of distinct index values"
        );
    }

    let areas = quantify_with_transform(&classification.map, classification.map.transform());
    let class_stats = class_statistics(&index, &classification.map)?;

    info!(
        classes = classification.actual_k,
        total_km2 = areas.total_area_km2(),
        unclassified = areas.unclassified_pixels,
        "analysis complete"
    );

    Ok(Analysis {
        index,
        index_range,
        classification,
        areas,
        class_stats,
    })
}

fn valid_range(index: &Raster<f64>) -> Option<(f64, f64)> {
    index
        .data()
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
