//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad family of a coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsKind {
    /// Angular coordinates (decimal degrees)
    Geographic,
    /// Linear coordinates (usually meters)
    Projected,
}

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// Model type declared by the source file, if any
    kind: Option<CrsKind>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            kind: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            kind: None,
        }
    }

    /// Create a CRS known only by its model type (GeoTIFF `GTModelTypeGeoKey`)
    pub fn from_kind(kind: CrsKind) -> Self {
        Self {
            wkt: None,
            epsg: None,
            kind: Some(kind),
        }
    }

    /// Attach an explicit model type
    pub fn with_kind(mut self, kind: CrsKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Best-effort guess of whether coordinates are angular or linear.
    ///
    /// An explicit model type wins, then the EPSG range, then the WKT root
    /// keyword. Returns `None` when nothing conclusive is known.
    pub fn kind(&self) -> Option<CrsKind> {
        if let Some(kind) = self.kind {
            return Some(kind);
        }

        if let Some(code) = self.epsg {
            return match code {
                4000..=4999 => Some(CrsKind::Geographic),
                // Web Mercator, UTM north/south (WGS84)
                3857 | 32601..=32660 | 32701..=32760 => Some(CrsKind::Projected),
                _ => None,
            };
        }

        if let Some(wkt) = &self.wkt {
            let head = wkt.trim_start().to_ascii_uppercase();
            if head.starts_with("GEOGCS") || head.starts_with("GEOGCRS") {
                return Some(CrsKind::Geographic);
            }
            if head.starts_with("PROJCS") || head.starts_with("PROJCRS") {
                return Some(CrsKind::Projected);
            }
        }

        None
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // String comparison of WKT is imperfect but good enough for co-registration checks
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        match self.kind {
            Some(CrsKind::Geographic) => "Unknown geographic".to_string(),
            Some(CrsKind::Projected) => "Unknown projected".to_string(),
            None => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
