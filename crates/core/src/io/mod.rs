//! Reading and writing of spectral bands and analysis products

mod geotiff;
mod source;

pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    GeoTiffOptions,
};
pub use source::{load_band_pair, BandSource, GeoTiffSource};
