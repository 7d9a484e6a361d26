//! GeoTIFF reading/writing with the pure-Rust `tiff` crate
//!
//! Supports single-band rasters georeferenced with either
//! `ModelPixelScaleTag` + `ModelTiepointTag` or `ModelTransformationTag`,
//! the EPSG codes stored in the GeoKey directory, and the `GDAL_NODATA` tag.

use crate::crs::{CrsKind, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
// GeoKey value meaning "user-defined", i.e. no EPSG code
const USER_DEFINED: u16 = 32767;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Write the `GDAL_NODATA` tag when the raster declares a nodata value
    pub write_nodata: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self { write_nodata: true }
    }
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-sample images decode interleaved; only the single-band case is supported
    if data.len() != rows * cols {
        return Err(Error::UnsupportedDataType(format!(
            "expected a single-band image, got {} samples for {}x{} pixels",
            data.len(),
            cols,
            rows
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix; only the 2D affine part is used
    let m = decoder
        .get_tag_f64_vec(Tag::ModelTransformationTag)
        .ok()?;
    if m.len() < 16 {
        return None;
    }
    Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }

    let mut kind = None;
    let mut epsg = None;
    let declared = keys[3] as usize;

    for entry in keys[4..].chunks_exact(4).take(declared) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // Values stored in other tags (location != 0) are not needed here
        if location != 0 {
            continue;
        }
        match key {
            GT_MODEL_TYPE_KEY => {
                kind = match value {
                    MODEL_TYPE_PROJECTED => Some(CrsKind::Projected),
                    MODEL_TYPE_GEOGRAPHIC => Some(CrsKind::Geographic),
                    _ => None,
                }
            }
            GEOGRAPHIC_TYPE_KEY | PROJECTED_CS_TYPE_KEY if value != USER_DEFINED => {
                epsg = Some(u32::from(value));
            }
            _ => {}
        }
    }

    match (epsg, kind) {
        (Some(code), Some(kind)) => Some(CRS::from_epsg(code).with_kind(kind)),
        (Some(code), None) => Some(CRS::from_epsg(code)),
        (None, Some(kind)) => Some(CRS::from_kind(kind)),
        (None, None) => None,
    }
}

fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: Read + Seek,
{
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value: f64 = text.trim().trim_end_matches('\0').parse().ok()?;
    num_traits::cast(value)
}

/// Write a Raster to a GeoTIFF file (as 32-bit float)
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file, &options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn geo_keys(crs: Option<&CRS>) -> Vec<u16> {
    let kind = crs.and_then(CRS::kind).unwrap_or(CrsKind::Projected);
    let model_type = match kind {
        CrsKind::Projected => MODEL_TYPE_PROJECTED,
        CrsKind::Geographic => MODEL_TYPE_GEOGRAPHIC,
    };

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, model_type],
        [GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA],
    ];

    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        let key = match kind {
            CrsKind::Projected => PROJECTED_CS_TYPE_KEY,
            CrsKind::Geographic => GEOGRAPHIC_TYPE_KEY,
        };
        entries.push([key, 0, 1, code]);
    }

    // Header: version 1.1.0, then the number of keys
    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;
    let gt = raster.transform();

    if gt.is_rotated() {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    } else {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    }

    let keys = geo_keys(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;

    if options.write_nodata {
        if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
            let text = if nodata.is_nan() {
                "nan".to_string()
            } else {
                nodata.to_string()
            };
            image
                .encoder()
                .write_tag(Tag::GdalNodata, text.as_str())?;
        }
    }

    image.write_data(&data)?;
    Ok(())
}
