//! # vegcover Core
//!
//! Core types, traits and I/O for the vegcover land-cover analysis library.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `ClassifiedMap`: Per-pixel optional class identifiers
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System descriptor
//! - `BandSource`: Loading of spectral bands from GeoTIFF files
//! - The `Algorithm` trait implemented by every pipeline stage

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::{CrsKind, CRS};
pub use error::{Error, Result};
pub use raster::{ClassId, ClassifiedMap, GeoTransform, Raster, RasterElement, CLASS_NODATA};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CrsKind, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::io::{BandSource, GeoTiffSource};
    pub use crate::raster::{ClassId, ClassifiedMap, GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for the stages of the analysis pipeline.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
