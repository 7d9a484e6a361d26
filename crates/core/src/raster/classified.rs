//! Categorical raster of optional class identifiers

use std::collections::BTreeMap;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::Array2;

/// Identifier of a land-cover class. Class 0 has the lowest index value.
pub type ClassId = u32;

/// Conventional sentinel for unclassified pixels when a map is exported
/// as a plain integer raster.
pub const CLASS_NODATA: i32 = -1;

/// A georeferenced grid where each pixel either carries a class or is
/// unclassified (`None`, no valid index value at that pixel).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedMap {
    classes: Array2<Option<ClassId>>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl ClassifiedMap {
    /// A map of the given shape where every pixel is unclassified
    pub fn unclassified(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), None))
    }

    /// Create a map from an ndarray of optional class ids
    pub fn from_array(classes: Array2<Option<ClassId>>) -> Self {
        Self {
            classes,
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Create from row-major data
    pub fn from_vec(classes: Vec<Option<ClassId>>, rows: usize, cols: usize) -> Result<Self> {
        if classes.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), classes)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Copy transform and CRS from a raster
    pub fn with_meta_of<T: crate::RasterElement>(mut self, raster: &Raster<T>) -> Self {
        self.transform = *raster.transform();
        self.crs = raster.crs().cloned();
        self
    }

    /// Builder-style transform setter
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.classes.dim()
    }

    /// Total number of pixels
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the map has no pixels at all
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class at (row, col); `Ok(None)` for unclassified pixels
    pub fn get(&self, row: usize, col: usize) -> Result<Option<ClassId>> {
        self.classes
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.classes.nrows(),
                cols: self.classes.ncols(),
            })
    }

    /// Iterate over pixels in row-major order
    pub fn iter(&self) -> impl Iterator<Item = Option<ClassId>> + '_ {
        self.classes.iter().copied()
    }

    /// Underlying array
    pub fn data(&self) -> &Array2<Option<ClassId>> {
        &self.classes
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Number of pixels that carry a class
    pub fn classified_count(&self) -> usize {
        self.classes.iter().filter(|c| c.is_some()).count()
    }

    /// Whether no pixel carries a class
    pub fn is_all_unclassified(&self) -> bool {
        self.classes.iter().all(Option::is_none)
    }

    /// Pixel count per class, plus the number of unclassified pixels
    pub fn class_counts(&self) -> (BTreeMap<ClassId, usize>, usize) {
        let mut counts = BTreeMap::new();
        let mut unclassified = 0;
        for class in self.classes.iter() {
            match class {
                Some(id) => *counts.entry(*id).or_insert(0) += 1,
                None => unclassified += 1,
            }
        }
        (counts, unclassified)
    }

    /// Export as an integer raster, writing `nodata` at unclassified pixels.
    ///
    /// The returned raster declares `nodata` so renderers can mask it.
    pub fn to_raster(&self, nodata: i32) -> Raster<i32> {
        let data = self
            .classes
            .mapv(|c| c.map_or(nodata, |id| i32::try_from(id).unwrap_or(i32::MAX)));
        let mut raster = Raster::from_array(data).with_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster.set_nodata(Some(nodata));
        raster
    }

    /// Build a map from an integer raster, treating `nodata` and negative values as unclassified
    pub fn from_raster(raster: &Raster<i32>, nodata: i32) -> Self {
        let classes = raster
            .data()
            .mapv(|v| if v == nodata || v < 0 { None } else { Some(v as ClassId) });
        Self::from_array(classes).with_meta_of(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassifiedMap {
        ClassifiedMap::from_vec(
            vec![Some(0), Some(1), None, Some(1), Some(2), None],
            2,
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_counts() {
        let map = sample();
        let (counts, unclassified) = map.class_counts();
        assert_eq!(counts.get(&0), Some(&1));
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), Some(&1));
        assert_eq!(unclassified, 2);
        assert_eq!(map.classified_count(), 4);
        assert!(!map.is_all_unclassified());
    }

    #[test]
    fn test_unclassified() {
        let map = ClassifiedMap::unclassified(3, 3);
        assert!(map.is_all_unclassified());
        assert_eq!(map.classified_count(), 0);
        assert_eq!(map.get(1, 1).unwrap(), None);
        assert!(map.get(3, 0).is_err());
    }

    #[test]
    fn test_export_uses_sentinel() {
        let gt = GeoTransform::new(500000.0, 4000000.0, 30.0, -30.0);
        let map = sample().with_transform(gt);
        let raster = map.to_raster(CLASS_NODATA);

        assert_eq!(raster.shape(), (2, 3));
        assert_eq!(raster.get(0, 2).unwrap(), -1);
        assert_eq!(raster.get(1, 1).unwrap(), 2);
        assert_eq!(raster.nodata(), Some(-1));
        assert_eq!(*raster.transform(), gt);

        let back = ClassifiedMap::from_raster(&raster, CLASS_NODATA);
        assert_eq!(back.data(), map.data());
    }
}
