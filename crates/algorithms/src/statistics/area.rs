//! Land-cover area quantification
//!
//! Converts per-class pixel counts into km² with a flat-earth approximation.
//! In the geographic regime one degree is taken as 111 km on both axes,
//! which overestimates east-west extents away from the equator and is
//! inexact for large rasters. No geodesic correction is applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vegcover_core::raster::{ClassId, ClassifiedMap, GeoTransform};
use vegcover_core::{Algorithm, CrsKind, Error};

/// Kilometers per degree used by the equirectangular approximation
pub const KM_PER_DEGREE: f64 = 111.0;

/// Pixel widths below this magnitude are taken to be decimal degrees
pub const GEOGRAPHIC_THRESHOLD: f64 = 0.1;

/// How pixel sizes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateRegime {
    /// Pixel size in decimal degrees
    Geographic,
    /// Pixel size in meters
    Projected,
}

impl CoordinateRegime {
    /// Heuristic on the horizontal pixel size: `|x| < 0.1` means degrees.
    ///
    /// Ambiguous for very fine projected grids (sub-decimeter pixels) and
    /// very coarse geographic ones; CRS metadata is not consulted.
    pub fn detect(pixel_size_x: f64) -> Self {
        if pixel_size_x.abs() < GEOGRAPHIC_THRESHOLD {
            CoordinateRegime::Geographic
        } else {
            CoordinateRegime::Projected
        }
    }

    /// Area of one pixel in km²
    pub fn pixel_area_km2(self, pixel_size_x: f64, pixel_size_y: f64) -> f64 {
        match self {
            CoordinateRegime::Geographic => {
                (pixel_size_x * KM_PER_DEGREE).abs() * (pixel_size_y * KM_PER_DEGREE).abs()
            }
            CoordinateRegime::Projected => (pixel_size_x * pixel_size_y).abs() / 1_000_000.0,
        }
    }

    fn matches(self, kind: CrsKind) -> bool {
        matches!(
            (self, kind),
            (CoordinateRegime::Geographic, CrsKind::Geographic)
                | (CoordinateRegime::Projected, CrsKind::Projected)
        )
    }
}

/// Pixel count and area of one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassArea {
    pub pixel_count: usize,
    /// Area in km², rounded to 4 decimal places
    pub area_km2: f64,
}

/// Area per class, keyed by class id in ascending index order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStats {
    pub classes: BTreeMap<ClassId, ClassArea>,
    pub regime: CoordinateRegime,
    /// Unrounded area of a single pixel in km²
    pub pixel_area_km2: f64,
    /// Pixels without a class; never part of `classes`
    pub unclassified_pixels: usize,
}

impl AreaStats {
    /// Area of one class in km², if present
    pub fn area_km2(&self, class: ClassId) -> Option<f64> {
        self.classes.get(&class).map(|c| c.area_km2)
    }

    /// Plain class → km² mapping
    pub fn areas(&self) -> BTreeMap<ClassId, f64> {
        self.classes
            .iter()
            .map(|(&id, c)| (id, c.area_km2))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ClassArea)> + '_ {
        self.classes.iter().map(|(&id, c)| (id, c))
    }

    /// Sum of rounded class areas
    pub fn total_area_km2(&self) -> f64 {
        self.classes.values().map(|c| c.area_km2).sum()
    }

    /// Sum of class pixel counts
    pub fn classified_pixels(&self) -> usize {
        self.classes.values().map(|c| c.pixel_count).sum()
    }

    /// True when no pixel carries a class
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Convert per-class pixel counts into area.
///
/// The coordinate regime is chosen by [`CoordinateRegime::detect`] on
/// `pixel_size_x`. Unclassified pixels are tallied but excluded from the
/// result. Never fails: a pixel size of 0 yields zero areas.
pub fn quantify(map: &ClassifiedMap, pixel_size_x: f64, pixel_size_y: f64) -> AreaStats {
    let (counts, unclassified_pixels) = map.class_counts();

    let regime = CoordinateRegime::detect(pixel_size_x);
    let pixel_area_km2 = regime.pixel_area_km2(pixel_size_x, pixel_size_y);

    if let Some(kind) = map.crs().and_then(|crs| crs.kind()) {
        if !regime.matches(kind) {
            warn!(
                ?regime,
                crs = ?kind,
                pixel_size_x,
                "pixel-size heuristic disagrees with the declared CRS; using the heuristic"
            );
        }
    }

    let classes: BTreeMap<ClassId, ClassArea> = counts
        .into_iter()
        .map(|(id, pixel_count)| {
            let area_km2 = round_to(pixel_count as f64 * pixel_area_km2, 4);
            (id, ClassArea { pixel_count, area_km2 })
        })
        .collect();

    debug!(
        ?regime,
        pixel_area_km2,
        classes = classes.len(),
        unclassified_pixels,
        "area quantified"
    );

    AreaStats {
        classes,
        regime,
        pixel_area_km2,
        unclassified_pixels,
    }
}

/// [`quantify`] with pixel sizes taken from a geotransform.
///
/// Rotation/shear terms are ignored; a rotated transform is only reported.
pub fn quantify_with_transform(map: &ClassifiedMap, transform: &GeoTransform) -> AreaStats {
    if transform.is_rotated() {
        warn!(
            row_rotation = transform.row_rotation,
            col_rotation = transform.col_rotation,
            "rotated geotransform: rotation ignored in area computation"
        );
    }
    let (x, y) = transform.pixel_size();
    quantify(map, x, y)
}

/// Round to `decimals` places using the exact binary value of `value`.
///
/// `value * factor` alone can land on a spurious half (2.00005 → 20000.5)
/// and round the wrong way; the residual of the multiplication decides it.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() || scaled.abs() >= 4_503_599_627_370_496.0 {
        // No fractional part left to round (|scaled| >= 2^52)
        return value;
    }

    // value * factor == scaled + residual, exactly
    let residual = value.mul_add(factor, -scaled);
    let floor = scaled.floor();
    let above_half = (scaled - floor - 0.5) + residual;

    let rounded = if above_half > 0.0 {
        floor + 1.0
    } else if above_half < 0.0 {
        floor
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    };
    rounded / factor
}

/// Pipeline stage wrapper around [`quantify_with_transform`], using the map's own transform
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaQuantifier;

impl Algorithm for AreaQuantifier {
    type Input = ClassifiedMap;
    type Output = AreaStats;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "area"
    }

    fn description(&self) -> &'static str {
        "Per-class area in km² from pixel counts and pixel size"
    }

    fn execute(&self, input: ClassifiedMap, _params: ()) -> Result<AreaStats, Error> {
        Ok(quantify_with_transform(&input, input.transform()))
    }
}
