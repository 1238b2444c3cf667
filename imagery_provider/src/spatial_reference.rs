//! Well-known IDs (WKID) of spatial references reported by map servers, and their mapping onto
//! the supported [`Projection`]s.

use serde::Deserialize;

use crate::{Error, projection::Projection};

/// WGS84 geographic coordinates.
pub const WGS84: u32 = 4326;
/// GDA94, which is geographic as well and close enough to WGS84 for feature positions.
pub const GDA94: u32 = 4283;
/// Esri's ID of the Web Mercator.
pub const ESRI_WEB_MERCATOR: u32 = 102100;
/// Deprecated Esri's ID of the Web Mercator, still reported by older servers.
pub const ESRI_WEB_MERCATOR_LEGACY: u32 = 102113;
/// EPSG's ID of the Web Mercator.
pub const WEB_MERCATOR: u32 = 3857;
/// Unofficial "google" ID of the Web Mercator.
pub const GOOGLE_WEB_MERCATOR: u32 = 900913;

/// `spatialReference` object found in the ArcGIS JSON documents.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SpatialReferenceInfo {
    pub wkid: Option<u32>,
    pub latest_wkid: Option<u32>,
}

impl SpatialReferenceInfo {
    /// `wkid`, falling back to `latestWkid` when only that one is present.
    pub fn wkid(&self) -> Option<u32> {
        self.wkid.or(self.latest_wkid)
    }
}

/// Projection matching the WKID reported in the server's metadata, if it is supported.
pub fn projection_for_wkid(wkid: u32) -> Option<Projection> {
    match wkid {
        ESRI_WEB_MERCATOR | ESRI_WEB_MERCATOR_LEGACY => Some(Projection::WebMercator),
        WGS84 => Some(Projection::Geographic),
        _ => None,
    }
}

/// Like [`projection_for_wkid`], but fails with [`Error::UnsupportedSpatialReference`] naming
/// the metadata `section` in which the WKID was found.
pub fn resolve(section: &'static str, wkid: u32) -> Result<Projection, Error> {
    projection_for_wkid(wkid).ok_or(Error::UnsupportedSpatialReference { section, wkid })
}

/// Projection of a feature geometry returned by an identify query. Features are reported in a
/// wider set of references than tiles, and a missing WKID means WGS84.
pub fn feature_projection(wkid: Option<u32>) -> Option<Projection> {
    match wkid.unwrap_or(WGS84) {
        WGS84 | GDA94 => Some(Projection::Geographic),
        ESRI_WEB_MERCATOR | ESRI_WEB_MERCATOR_LEGACY | WEB_MERCATOR | GOOGLE_WEB_MERCATOR => {
            Some(Projection::WebMercator)
        }
        _ => None,
    }
}
