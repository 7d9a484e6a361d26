//! The pipeline fed from GeoTIFF files on disk.

use approx::assert_relative_eq;
use tempfile::TempDir;
use vegcover_algorithms::classification::{classify, KmeansParams};
use vegcover_algorithms::pipeline::{analyze, AnalysisConfig};
use vegcover_algorithms::statistics::{quantify_with_transform, CoordinateRegime};
use vegcover_core::io::{load_band_pair, read_geotiff, write_geotiff, BandSource, GeoTiffSource};
use vegcover_core::raster::{GeoTransform, Raster};
use vegcover_core::{Error, CLASS_NODATA, CRS};

fn utm_band(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let mut band = Raster::new(rows, cols)
        .with_transform(GeoTransform::new(350_000.0, 6_300_000.0, 10.0, -10.0))
        .with_crs(CRS::from_epsg(32719));
    for row in 0..rows {
        for col in 0..cols {
            band.set(row, col, f(row, col)).unwrap();
        }
    }
    band
}

#[test]
fn band_pair_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let red_path = dir.path().join("red.tif");
    let nir_path = dir.path().join("nir.tif");

    let red = utm_band(12, 9, |r, c| 500.0 + (r * 9 + c) as f64);
    let nir = utm_band(12, 9, |r, c| if c < 4 { 700.0 } else { 3000.0 + r as f64 });
    write_geotiff(&red, &red_path, None).unwrap();
    write_geotiff(&nir, &nir_path, None).unwrap();

    let (red_in, nir_in) = load_band_pair(&GeoTiffSource, &red_path, &nir_path).unwrap();
    assert_eq!(red_in.shape(), (12, 9));
    assert_eq!(red_in.transform(), red.transform());
    assert_eq!(red_in.crs().and_then(|c| c.epsg()), Some(32719));
    assert_relative_eq!(nir_in.get(5, 6).unwrap(), 3005.0);

    let result = analyze(&red_in, &nir_in, &AnalysisConfig::default()).unwrap();
    assert_eq!(result.areas.regime, CoordinateRegime::Projected);
    assert_eq!(result.areas.classified_pixels(), 12 * 9);
    // 108 pixels of 100 m²
    assert_relative_eq!(result.areas.total_area_km2(), 0.0108, epsilon = 1e-9);
}

#[test]
fn class_raster_is_written_with_nodata() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("classes.tif");

    let red = utm_band(4, 4, |_, c| if c == 0 { 0.0 } else { 400.0 });
    let nir = utm_band(4, 4, |_, c| if c == 0 { 0.0 } else { 1600.0 });
    let result = analyze(&red, &nir, &AnalysisConfig::default()).unwrap();

    let classes = result.classification.map.to_raster(CLASS_NODATA);
    write_geotiff(&classes, &out, None).unwrap();

    let back: Raster<i32> = read_geotiff(&out).unwrap();
    assert_eq!(back.nodata(), Some(CLASS_NODATA));
    assert_eq!(back.get(0, 0).unwrap(), CLASS_NODATA);
    assert_eq!(back.get(0, 1).unwrap(), 0);
}

#[test]
fn index_file_nodata_is_left_unclassified() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.tif");

    let mut index = utm_band(2, 2, |r, c| if r == 1 && c == 1 { -9999.0 } else { 0.2 + 0.3 * c as f64 });
    index.set_nodata(Some(-9999.0));
    write_geotiff(&index, &path, None).unwrap();

    let back = GeoTiffSource.load_band(&path).unwrap();
    assert_eq!(back.nodata(), Some(-9999.0));

    let classes = classify(&back, &KmeansParams { k: 2, ..Default::default() }).unwrap();
    assert_eq!(classes.map.get(1, 1).unwrap(), None);
    assert!(classes.centers.iter().all(|&c| c > 0.0));

    let areas = quantify_with_transform(&classes.map, classes.map.transform());
    assert_eq!(areas.unclassified_pixels, 1);
    assert_eq!(areas.classified_pixels(), 3);
}

#[test]
fn mismatched_bands_are_rejected() {
    let dir = TempDir::new().unwrap();
    let red_path = dir.path().join("red.tif");
    let nir_path = dir.path().join("nir.tif");

    write_geotiff(&utm_band(5, 5, |_, _| 100.0), &red_path, None).unwrap();
    write_geotiff(&utm_band(5, 6, |_, _| 300.0), &nir_path, None).unwrap();

    let err = load_band_pair(&GeoTiffSource, &red_path, &nir_path).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { er: 5, ec: 5, ar: 5, ac: 6 }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = GeoTiffSource.load_band(&dir.path().join("absent.tif")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
