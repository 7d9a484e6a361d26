//! Bounded normalized-difference indices
//!
//! The vegetation index is the normalized ratio of near-infrared to red
//! reflectance. Every pixel of the output is either NaN (invalid) or lies in
//! the closed interval [-1, 1].

use ndarray::Array2;
use crate::maybe_rayon::*;
use vegcover_core::raster::Raster;
use vegcover_core::{Algorithm, Error, Result};

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the bounded normalized difference between two bands:
///
/// `(positive - negative) / (positive + negative)`
///
/// Numeric policy, applied per pixel:
/// - either band NaN, or equal to its declared nodata value: NaN
/// - `0 / 0` (both bands zero): NaN, the canonical invalid-pixel marker
/// - `x / 0` with `x != 0`: signed infinity, mapped to +1.0 or -1.0
/// - any other result is clamped to [-1, 1] (only reachable with negative reflectances)
///
/// The output keeps the georeferencing of `positive` and declares NaN as nodata.
///
/// # Errors
/// `Error::SizeMismatch` when the two bands differ in shape.
pub fn normalized_difference(positive: &Raster<f64>, negative: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(positive, negative)?;

    let (rows, cols) = positive.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let p = unsafe { positive.get_unchecked(row, col) };
                let n = unsafe { negative.get_unchecked(row, col) };

                if positive.is_nodata(p) || negative.is_nodata(n) {
                    continue;
                }

                *out = bounded_ratio(p - n, p + n);
            }
            row_data
        })
        .collect();

    build_output(positive, rows, cols, data)
}

/// `numerator / denominator` with infinities mapped to ±1 and finite values clamped.
fn bounded_ratio(numerator: f64, denominator: f64) -> f64 {
    let ratio = numerator / denominator;
    if ratio.is_infinite() {
        ratio.signum()
    } else {
        // NaN passes through clamp unchanged
        ratio.clamp(-1.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// NDVI
// ---------------------------------------------------------------------------

/// Vegetation index from a red band (A) and a near-infrared band (B).
///
/// `index = (B - A) / (B + A)`, with the numeric policy of
/// [`normalized_difference`]. Typical values:
/// - Dense vegetation: 0.6 to 0.9
/// - Sparse vegetation: 0.2 to 0.5
/// - Bare soil: 0.1 to 0.2
/// - Water/clouds: -1.0 to 0.0
///
/// # Errors
/// `Error::SizeMismatch` when the bands differ in shape. The error is
/// raised before any pixel is computed.
pub fn compute_index(red: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(red, nir)?;
    let mut index = normalized_difference(nir, red)?;
    index.set_transform(*red.transform());
    index.set_crs(red.crs().cloned());
    Ok(index)
}

/// Normalized Difference Vegetation Index, NIR-first argument order.
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    compute_index(red, nir)
}

/// Pipeline stage wrapper around [`compute_index`].
///
/// Input is `(red, nir)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexCalculator;

impl Algorithm for IndexCalculator {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "index"
    }

    fn description(&self) -> &'static str {
        "Bounded normalized-difference vegetation index from red and near-infrared bands"
    }

    fn execute(&self, input: Self::Input, _params: ()) -> Result<Raster<f64>> {
        let (red, nir) = input;
        compute_index(&red, &nir)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
