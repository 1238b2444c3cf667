//! Supported map services. Make sure you follow terms of usage of the particular service.

mod arcgis;
mod bing;

pub use arcgis::ArcGisMapServer;
pub use bing::{BingMaps, BingMapsStyle};

pub(crate) use arcgis::{
    metadata_url as arcgis_metadata_url, parse_metadata as parse_arcgis_metadata,
};
pub(crate) use bing::parse_metadata as parse_bing_metadata;

/// Service to create the [`crate::ImageryProvider`] for.
pub enum Source {
    ArcGisMapServer(ArcGisMapServer),
    BingMaps(BingMaps),
}

impl From<ArcGisMapServer> for Source {
    fn from(source: ArcGisMapServer) -> Self {
        Self::ArcGisMapServer(source)
    }
}

impl From<BingMaps> for Source {
    fn from(source: BingMaps) -> Self {
        Self::BingMaps(source)
    }
}
