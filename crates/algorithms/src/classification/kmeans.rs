//! K-means classification of an index image
//!
//! Partitions the valid pixels of a single-band index image into ordered
//! classes by 1-D centroid clustering. Class 0 always holds the cluster with
//! the lowest center, class `k - 1` the highest.
//!
//! Pixels are clustered through a histogram of their distinct values
//! weighted by pixel count. That has the same objective as clustering every
//! pixel but costs O(distinct values) per iteration instead of O(pixels).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maybe_rayon::*;
use vegcover_core::raster::{ClassId, ClassifiedMap, Raster};
use vegcover_core::{Algorithm, Error, Result};

/// Parameters for K-means classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansParams {
    /// Requested number of classes (must be >= 2; may be reduced, see [`classify`])
    pub k: usize,
    /// Seed for centroid initialization. Same image + same params ⇒ same result.
    pub seed: u64,
    /// Number of independent initializations; the lowest-inertia run wins
    pub n_init: usize,
    /// Maximum Lloyd iterations per initialization
    pub max_iterations: usize,
    /// Convergence threshold, relative to the variance of the data
    pub tolerance: f64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 4,
            seed: 42,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

impl KmeansParams {
    fn validate(&self) -> Result<()> {
        if self.k < 2 {
            return Err(Error::InvalidParameter {
                name: "k",
                value: self.k.to_string(),
                reason: "at least 2 classes must be requested".into(),
            });
        }
        if self.n_init == 0 {
            return Err(Error::InvalidParameter {
                name: "n_init",
                value: "0".into(),
                reason: "at least one initialization is required".into(),
            });
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "tolerance",
                value: self.tolerance.to_string(),
                reason: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }
}

/// Result of classifying an index image
#[derive(Debug, Clone)]
pub struct Classification {
    /// Class per pixel; `None` where the index is NaN
    pub map: ClassifiedMap,
    /// Cluster centers in ascending order; class `i` ↔ `centers[i]`
    pub centers: Vec<f64>,
    /// Number of classes asked for
    pub requested_k: usize,
    /// Number of classes produced (`min(requested_k, distinct values)`, 0 if no valid pixel)
    pub actual_k: usize,
    /// Sum of squared distances of valid pixels to their center
    pub inertia: f64,
}

impl Classification {
    /// True when the image had no valid pixel at all
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// True when valid pixels exist but hold fewer distinct values than requested classes
    pub fn was_reduced(&self) -> bool {
        !self.is_empty() && self.actual_k < self.requested_k
    }
}

/// Classify an index image into ordered classes.
///
/// - NaN pixels and pixels equal to the declared nodata value are unclassified. If no pixel is valid the result is an
///   all-unclassified map with no centers (not an error).
/// - The class count is reduced to the number of distinct valid values when
///   fewer than `params.k` exist; the reduction is reported in
///   [`Classification::actual_k`].
/// - Initialization is k-means++ driven only by `params.seed`, repeated
///   `params.n_init` times. Restarts may run in parallel; the outcome does not
///   depend on it.
///
/// # Errors
/// - `Error::InvalidParameter` for `k < 2`, `n_init == 0` or a negative tolerance
/// - `Error::InvalidDimensions` if the image has zero rows or columns
pub fn classify(index: &Raster<f64>, params: &KmeansParams) -> Result<Classification> {
    params.validate()?;

    let (rows, cols) = index.shape();
    if index.is_empty() {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let valid: Vec<(usize, f64)> = index
        .data()
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v.is_finite() && !index.is_nodata(v))
        .map(|(i, &v)| (i, v))
        .collect();

    if valid.is_empty() {
        debug!(rows, cols, "no valid pixels, returning unclassified map");
        return Ok(Classification {
            map: ClassifiedMap::unclassified(rows, cols).with_meta_of(index),
            centers: Vec::new(),
            requested_k: params.k,
            actual_k: 0,
            inertia: 0.0,
        });
    }

    let valid_count = valid.len();
    let hist = ValueHistogram::from_pixels(valid);
    let distinct = hist.values.len();
    let actual_k = params.k.min(distinct).max(1);

    if actual_k < params.k {
        debug!(
            requested = params.k,
            actual = actual_k,
            distinct,
            "fewer distinct index values than requested classes"
        );
    }

    let best = best_of_restarts(&hist, actual_k, params);

    // Rank clusters by center value; ties keep the raw id order
    let mut order: Vec<usize> = (0..actual_k).collect();
    order.sort_by(|&a, &b| best.centers[a].total_cmp(&best.centers[b]).then(a.cmp(&b)));
    let mut rank = vec![0 as ClassId; actual_k];
    for (r, &raw) in order.iter().enumerate() {
        rank[raw] = r as ClassId;
    }
    let centers: Vec<f64> = order.iter().map(|&raw| best.centers[raw]).collect();

    let mut classes: Vec<Option<ClassId>> = vec![None; rows * cols];
    for &(pixel, bin) in &hist.pixel_bins {
        classes[pixel] = Some(rank[best.labels[bin]]);
    }
    let map = ClassifiedMap::from_vec(classes, rows, cols)?.with_meta_of(index);

    debug!(
        valid = valid_count,
        actual_k,
        inertia = best.inertia,
        ?centers,
        "classification finished"
    );

    Ok(Classification {
        map,
        centers,
        requested_k: params.k,
        actual_k,
        inertia: best.inertia,
    })
}

/// Pipeline stage wrapper around [`classify`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralClassifier;

impl Algorithm for SpectralClassifier {
    type Input = Raster<f64>;
    type Output = Classification;
    type Params = KmeansParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "classify"
    }

    fn description(&self) -> &'static str {
        "Ordered land-cover classes from an index image by seeded k-means"
    }

    fn execute(&self, input: Raster<f64>, params: KmeansParams) -> Result<Classification> {
        classify(&input, &params)
    }
}

// ---------------------------------------------------------------------------
// Weighted 1-D k-means
// ---------------------------------------------------------------------------

/// Distinct valid values (ascending) with their pixel counts
struct ValueHistogram {
    values: Vec<f64>,
    weights: Vec<f64>,
    /// (flat pixel index, histogram bin) for every valid pixel
    pixel_bins: Vec<(usize, usize)>,
}

impl ValueHistogram {
    fn from_pixels(mut pixels: Vec<(usize, f64)>) -> Self {
        pixels.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut values: Vec<f64> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();
        let mut pixel_bins = Vec::with_capacity(pixels.len());

        for (pixel, v) in pixels {
            // `==` merges -0.0 and 0.0, which sort next to each other
            match (values.last(), weights.last_mut()) {
                (Some(&last), Some(w)) if last == v => *w += 1.0,
                _ => {
                    values.push(v);
                    weights.push(1.0);
                }
            }
            pixel_bins.push((pixel, values.len() - 1));
        }

        Self {
            values,
            weights,
            pixel_bins,
        }
    }

    fn weighted_variance(&self) -> f64 {
        let total: f64 = self.weights.iter().sum();
        let mean = self
            .values
            .iter()
            .zip(&self.weights)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / total;
        self.values
            .iter()
            .zip(&self.weights)
            .map(|(v, w)| w * (v - mean) * (v - mean))
            .sum::<f64>()
            / total
    }
}

struct KmeansRun {
    centers: Vec<f64>,
    /// Cluster per histogram bin
    labels: Vec<usize>,
    inertia: f64,
}

fn best_of_restarts(hist: &ValueHistogram, k: usize, params: &KmeansParams) -> KmeansRun {
    // Sub-seeds are drawn up front so each restart is independent of scheduling.
    // `n_init >= 1` is validated, so the first restart always exists.
    let mut rng = StdRng::seed_from_u64(params.seed);
    let first_seed: u64 = rng.gen();
    let other_seeds: Vec<u64> = (1..params.n_init).map(|_| rng.gen()).collect();
    let tol = params.tolerance * hist.weighted_variance();

    let first = lloyd(hist, k, first_seed, params.max_iterations, tol);
    let others: Vec<KmeansRun> = other_seeds
        .into_par_iter()
        .map(|seed| lloyd(hist, k, seed, params.max_iterations, tol))
        .collect();

    // Strict comparison: the earliest restart wins ties
    others
        .into_iter()
        .fold(first, |best, run| if run.inertia < best.inertia { run } else { best })
}

fn lloyd(hist: &ValueHistogram, k: usize, seed: u64, max_iterations: usize, tol: f64) -> KmeansRun {
    let values = &hist.values;
    let weights = &hist.weights;

    let mut centers = kmeans_plus_plus(values, weights, k, seed);
    let mut labels = vec![0usize; values.len()];

    for _iter in 0..max_iterations {
        assign(values, &centers, &mut labels);

        let mut sums = vec![0.0; k];
        let mut totals = vec![0.0; k];
        for ((&v, &w), &label) in values.iter().zip(weights).zip(&labels) {
            sums[label] += v * w;
            totals[label] += w;
        }

        let mut shift = 0.0_f64;
        for c in 0..k {
            // Empty clusters keep their previous center
            if totals[c] > 0.0 {
                let updated = sums[c] / totals[c];
                shift += (updated - centers[c]) * (updated - centers[c]);
                centers[c] = updated;
            }
        }

        if shift <= tol {
            break;
        }
    }

    assign(values, &centers, &mut labels);
    let inertia = values
        .iter()
        .zip(weights)
        .zip(&labels)
        .map(|((&v, &w), &label)| w * (v - centers[label]) * (v - centers[label]))
        .sum();

    KmeansRun {
        centers,
        labels,
        inertia,
    }
}

/// Assign every value to its nearest center (lowest center id on ties)
fn assign(values: &[f64], centers: &[f64], labels: &mut [usize]) {
    labels.par_iter_mut().enumerate().for_each(|(i, label)| {
        let v = values[i];
        let mut best_dist = f64::INFINITY;
        let mut best_k = 0;
        for (c, &center) in centers.iter().enumerate() {
            let dist = (v - center).abs();
            if dist < best_dist {
                best_dist = dist;
                best_k = c;
            }
        }
        *label = best_k;
    });
}

/// Weighted k-means++ seeding.
///
/// The first center is drawn proportionally to weight, each following one
/// proportionally to `weight * squared distance to the nearest chosen center`.
/// With at least `k` distinct values this always yields `k` distinct centers.
fn kmeans_plus_plus(values: &[f64], weights: &[f64], k: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = Vec::with_capacity(k);

    let first = sample_index(weights.iter().copied(), &mut rng).unwrap_or(0);
    centers.push(values[first]);

    let mut nearest: Vec<f64> = values
        .iter()
        .map(|&v| (v - values[first]) * (v - values[first]))
        .collect();

    while centers.len() < k {
        let scores = nearest.iter().zip(weights).map(|(d, w)| d * w);
        let next = match sample_index(scores, &mut rng) {
            Some(i) => i,
            // Every remaining value coincides with a center
            None => nearest.iter().position(|&d| d > 0.0).unwrap_or(0),
        };
        let center = values[next];
        centers.push(center);

        for (d, &v) in nearest.iter_mut().zip(values) {
            *d = d.min((v - center) * (v - center));
        }
    }

    centers
}

/// Draw an index with probability proportional to its score.
/// Returns `None` when all scores are zero.
fn sample_index<I>(scores: I, rng: &mut StdRng) -> Option<usize>
where
    I: Iterator<Item = f64> + Clone,
{
    let total: f64 = scores.clone().sum();
    if !(total > 0.0) {
        return None;
    }

    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, s) in scores.enumerate() {
        if s <= 0.0 {
            continue;
        }
        cumulative += s;
        last_positive = Some(i);
        if cumulative > target {
            return Some(i);
        }
    }
    // Rounding can leave `target` just above the final cumulative sum
    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vegcover_core::GeoTransform;

    fn raster_from(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut r = Raster::new(rows, cols).with_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        r
    }

    fn params(k: usize) -> KmeansParams {
        KmeansParams {
            k,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_groups_ordered() {
        // High values on top, low values at the bottom
        let r = raster_from(10, 10, |row, _| if row < 5 { 0.8 } else { -0.2 });

        let result = classify(&r, &params(2)).unwrap();

        assert_eq!(result.actual_k, 2);
        assert_eq!(result.map.get(0, 0).unwrap(), Some(1));
        assert_eq!(result.map.get(9, 0).unwrap(), Some(0));
        assert_relative_eq!(result.centers[0], -0.2, epsilon = 1e-12);
        assert_relative_eq!(result.centers[1], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_three_clusters_centers() {
        let r = raster_from(9, 10, |row, col| {
            let base = match row / 3 {
                0 => 0.7,
                1 => -0.4,
                _ => 0.1,
            };
            base + (col as f64 - 4.5) * 0.001
        });

        let result = classify(&r, &params(3)).unwrap();

        assert_eq!(result.actual_k, 3);
        assert_relative_eq!(result.centers[0], -0.4, epsilon = 1e-9);
        assert_relative_eq!(result.centers[1], 0.1, epsilon = 1e-9);
        assert_relative_eq!(result.centers[2], 0.7, epsilon = 1e-9);
        assert_eq!(result.map.get(0, 0).unwrap(), Some(2));
        assert_eq!(result.map.get(3, 9).unwrap(), Some(0));
        assert_eq!(result.map.get(8, 5).unwrap(), Some(1));
    }

    #[test]
    fn test_centers_monotonic() {
        let r = raster_from(20, 20, |row, col| ((row * 31 + col * 17) % 97) as f64 / 97.0 - 0.3);

        let result = classify(&r, &params(6)).unwrap();

        assert_eq!(result.centers.len(), 6);
        for pair in result.centers.windows(2) {
            assert!(pair[0] <= pair[1], "centers not sorted: {:?}", result.centers);
        }
    }

    #[test]
    fn test_labels_follow_center_order() {
        // Every pixel's class center must be its nearest center
        let r = raster_from(15, 15, |row, col| ((row * 7 + col * 3) % 41) as f64 / 50.0);
        let result = classify(&r, &params(4)).unwrap();

        for row in 0..15 {
            for col in 0..15 {
                let v = r.get(row, col).unwrap();
                let class = result.map.get(row, col).unwrap().unwrap() as usize;
                let own = (v - result.centers[class]).abs();
                for &c in &result.centers {
                    assert!(own <= (v - c).abs() + 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let r = raster_from(30, 30, |row, col| ((row * 13 + col * 29) % 101) as f64 / 101.0);
        let p = params(5);

        let a = classify(&r, &p).unwrap();
        let b = classify(&r, &p).unwrap();

        assert_eq!(a.map, b.map);
        assert_eq!(
            a.centers.iter().map(|c| c.to_bits()).collect::<Vec<_>>(),
            b.centers.iter().map(|c| c.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_nan_pixels_unclassified() {
        let r = raster_from(6, 6, |row, col| {
            if (row + col) % 4 == 0 {
                f64::NAN
            } else {
                (row as f64) / 10.0
            }
        });

        let result = classify(&r, &params(3)).unwrap();

        for row in 0..6 {
            for col in 0..6 {
                let is_nan = r.get(row, col).unwrap().is_nan();
                let class = result.map.get(row, col).unwrap();
                assert_eq!(is_nan, class.is_none(), "at ({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_all_nan_is_empty_result() {
        let r = Raster::filled(4, 5, f64::NAN);

        let result = classify(&r, &params(4)).unwrap();

        assert!(result.is_empty());
        assert_eq!(result.actual_k, 0);
        assert_eq!(result.map.shape(), (4, 5));
        assert!(result.map.is_all_unclassified());
        assert!(!result.was_reduced());
    }

    #[test]
    fn test_declared_nodata_unclassified() {
        let mut r = Raster::from_vec(vec![0.2, 0.5, 0.5, -9999.0], 2, 2).unwrap();
        r.set_nodata(Some(-9999.0));

        let result = classify(&r, &params(2)).unwrap();

        assert_eq!(result.map.get(1, 1).unwrap(), None);
        assert_eq!(result.map.classified_count(), 3);
        assert_eq!(result.centers.len(), 2);
        assert_relative_eq!(result.centers[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(result.centers[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_more_restarts_never_worse() {
        let r = raster_from(12, 12, |row, col| ((row * 37 + col * 11) % 29) as f64 / 29.0);

        let single = classify(&r, &KmeansParams { k: 5, n_init: 1, ..Default::default() }).unwrap();
        let many = classify(&r, &KmeansParams { k: 5, n_init: 10, ..Default::default() }).unwrap();

        assert_eq!(single.actual_k, 5);
        assert!(many.inertia <= single.inertia);
    }

    #[test]
    fn test_single_value_reduces_k() {
        let r = Raster::filled(10, 10, 0.0);

        let result = classify(&r, &params(4)).unwrap();

        assert_eq!(result.actual_k, 1);
        assert!(result.was_reduced());
        assert_eq!(result.centers, vec![0.0]);
        assert!(result.map.iter().all(|c| c == Some(0)));
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        let r = raster_from(2, 2, |row, _| if row == 0 { -0.0 } else { 0.0 });
        let result = classify(&r, &params(2)).unwrap();
        assert_eq!(result.actual_k, 1);
    }

    #[test]
    fn test_k_below_two_rejected() {
        let r = Raster::filled(5, 5, 0.3);
        let result = classify(&r, &params(1));
        assert!(matches!(result, Err(Error::InvalidParameter { name: "k", .. })));
    }

    #[test]
    fn test_zero_restarts_rejected() {
        let r = Raster::filled(5, 5, 0.3);
        let p = KmeansParams {
            n_init: 0,
            ..Default::default()
        };
        assert!(matches!(
            classify(&r, &p),
            Err(Error::InvalidParameter { name: "n_init", .. })
        ));
    }

    #[test]
    fn test_empty_shape_rejected() {
        let r: Raster<f64> = Raster::new(0, 7);
        let result = classify(&r, &params(3));
        assert!(matches!(
            result,
            Err(Error::InvalidDimensions { width: 7, height: 0 })
        ));
    }

    #[test]
    fn test_map_keeps_georeferencing() {
        let gt = GeoTransform::new(500000.0, 4000000.0, 30.0, -30.0);
        let r = raster_from(4, 4, |row, _| row as f64 * 0.1).with_transform(gt);
        let result = classify(&r, &params(2)).unwrap();
        assert_eq!(*result.map.transform(), gt);
    }

    #[test]
    fn test_histogram_merges_duplicates() {
        let hist = ValueHistogram::from_pixels(vec![(0, 0.5), (1, 0.1), (2, 0.5), (3, 0.1), (4, 0.9)]);
        assert_eq!(hist.values, vec![0.1, 0.5, 0.9]);
        assert_eq!(hist.weights, vec![2.0, 2.0, 1.0]);
        assert_eq!(hist.pixel_bins.len(), 5);
        assert!(hist.pixel_bins.contains(&(2, 1)));
    }

    #[test]
    fn test_plus_plus_distinct_centers() {
        let values = [0.0, 0.1, 0.2, 0.9];
        let weights = [100.0, 1.0, 1.0, 1.0];
        for seed in 0..20 {
            let mut centers = kmeans_plus_plus(&values, &weights, 4, seed);
            centers.sort_by(f64::total_cmp);
            assert_eq!(centers, vec![0.0, 0.1, 0.2, 0.9], "seed {}", seed);
        }
    }

    #[test]
    fn test_sample_index_skips_zero_scores() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let i = sample_index([0.0, 3.0, 0.0].into_iter(), &mut rng);
            assert_eq!(i, Some(1));
        }
        assert_eq!(sample_index([0.0, 0.0].into_iter(), &mut rng), None);
    }

    #[test]
    fn test_params_from_json_defaults() {
        let p: KmeansParams = serde_json::from_str(r#"{"k": 6, "seed": 7}"#).unwrap();
        assert_eq!(p.k, 6);
        assert_eq!(p.seed, 7);
        assert_eq!(p.n_init, 10);
        assert_eq!(p.max_iterations, 300);
    }

    #[test]
    fn test_algorithm_trait() {
        let r = raster_from(4, 4, |row, _| row as f64);
        let classifier = SpectralClassifier;
        let result = classifier.execute_default(r).unwrap();
        assert_eq!(result.requested_k, 4);
        assert_eq!(result.actual_k, 4);
    }
}
