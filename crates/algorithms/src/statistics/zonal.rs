//! Index statistics per land-cover class
//!
//! Treats each class of a [`ClassifiedMap`] as a zone and summarizes the
//! index values that fall inside it.

use std::collections::BTreeMap;

use serde::Serialize;
use vegcover_core::raster::{ClassId, ClassifiedMap, Raster};
use vegcover_core::{Error, Result};

/// Summary of the index values of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassIndexStats {
    pub class_id: ClassId,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Compute index statistics for every class present in `map`.
///
/// Unclassified pixels and NaN index values are skipped.
///
/// # Errors
/// `Error::SizeMismatch` when the index image and the map differ in shape.
pub fn class_statistics(
    index: &Raster<f64>,
    map: &ClassifiedMap,
) -> Result<BTreeMap<ClassId, ClassIndexStats>> {
    let (rows_v, cols_v) = index.shape();
    let (rows_z, cols_z) = map.shape();

    if rows_v != rows_z || cols_v != cols_z {
        return Err(Error::SizeMismatch {
            er: rows_v,
            ec: cols_v,
            ar: rows_z,
            ac: cols_z,
        });
    }

    let mut class_values: BTreeMap<ClassId, Vec<f64>> = BTreeMap::new();

    for (class, &val) in map.iter().zip(index.data().iter()) {
        let Some(class) = class else { continue };
        if val.is_nan() {
            continue;
        }
        class_values.entry(class).or_default().push(val);
    }

    let results = class_values
        .into_iter()
        .map(|(class_id, vals)| {
            let count = vals.len();
            let mean = vals.iter().sum::<f64>() / count as f64;
            let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
            let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let stats = ClassIndexStats {
                class_id,
                count,
                mean,
                std_dev: var.sqrt(),
                min,
                max,
            };
            (class_id, stats)
        })
        .collect();

    Ok(results)
}
