//! Band loading seam between file formats and the analysis pipeline

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::read_geotiff;
use crate::raster::Raster;

/// Something that can load a single spectral band, with its geotransform
/// and CRS attached, from a path.
pub trait BandSource {
    fn load_band(&self, path: &Path) -> Result<Raster<f64>>;
}

/// Loads the first band of a GeoTIFF file.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffSource;

impl BandSource for GeoTiffSource {
    fn load_band(&self, path: &Path) -> Result<Raster<f64>> {
        let band: Raster<f64> = read_geotiff(path)?;
        debug!(
            path = %path.display(),
            rows = band.rows(),
            cols = band.cols(),
            "loaded band"
        );
        Ok(band)
    }
}

/// Load the red and near-infrared bands and check they can be combined.
///
/// Returns `Error::SizeMismatch` when the two bands differ in shape.
/// Differing CRS or transforms are only logged: the bands are assumed to be
/// co-registered by whoever produced them.
pub fn load_band_pair<S>(source: &S, red: &Path, nir: &Path) -> Result<(Raster<f64>, Raster<f64>)>
where
    S: BandSource + ?Sized,
{
    let red_band = source.load_band(red)?;
    let nir_band = source.load_band(nir)?;

    if red_band.shape() != nir_band.shape() {
        return Err(Error::SizeMismatch {
            er: red_band.rows(),
            ec: red_band.cols(),
            ar: nir_band.rows(),
            ac: nir_band.cols(),
        });
    }

    if let (Some(a), Some(b)) = (red_band.crs(), nir_band.crs()) {
        if !a.is_equivalent(b) {
            warn!(red = %a, nir = %b, "bands declare different coordinate systems");
        }
    }
    if red_band.transform() != nir_band.transform() {
        warn!("bands have different geotransforms; using the red band's");
    }

    Ok((red_band, nir_band))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct MemorySource(HashMap<PathBuf, Raster<f64>>);

    impl BandSource for MemorySource {
        fn load_band(&self, path: &Path) -> Result<Raster<f64>> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| Error::Other(format!("no band at {}", path.display())))
        }
    }

    fn source(red: Raster<f64>, nir: Raster<f64>) -> MemorySource {
        let mut bands = HashMap::new();
        bands.insert(PathBuf::from("red.tif"), red);
        bands.insert(PathBuf::from("nir.tif"), nir);
        MemorySource(bands)
    }

    #[test]
    fn test_pair_loads() {
        let src = source(Raster::filled(4, 4, 0.1), Raster::filled(4, 4, 0.5));
        let (red, nir) =
            load_band_pair(&src, Path::new("red.tif"), Path::new("nir.tif")).unwrap();
        assert_eq!(red.get(0, 0).unwrap(), 0.1);
        assert_eq!(nir.get(3, 3).unwrap(), 0.5);
    }

    #[test]
    fn test_pair_shape_mismatch() {
        let src = source(Raster::filled(4, 4, 0.1), Raster::filled(4, 5, 0.5));
        let result = load_band_pair(&src, Path::new("red.tif"), Path::new("nir.tif"));
        assert!(matches!(
            result,
            Err(Error::SizeMismatch { er: 4, ec: 4, ar: 4, ac: 5 })
        ));
    }

    #[test]
    fn test_missing_band_propagates() {
        let src = source(Raster::filled(1, 1, 0.1), Raster::filled(1, 1, 0.5));
        let result = load_band_pair(&src, Path::new("red.tif"), Path::new("swir.tif"));
        assert!(matches!(result, Err(Error::Other(_))));
    }
}
