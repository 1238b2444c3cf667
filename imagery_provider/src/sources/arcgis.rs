use reqwest::Url;
use serde::{Deserialize, de::IgnoredAny};
use serde_json::Value;

use crate::{
    Error,
    address::{append_token, base_url},
    attribution::Credit,
    builder::{Addressing, ProviderBuilder},
    discard::TileDiscardPolicy,
    position::Native,
    projection::Projection,
    spatial_reference::{self, SpatialReferenceInfo},
    tiling_scheme::{Rectangle, TilingScheme},
};

/// ArcGIS MapServer REST service. Uses pre-rendered tiles if the server has them, and falls back
/// to images exported on demand otherwise.
/// <https://developers.arcgis.com/rest/services-reference/enterprise/map-service/>
#[derive(Debug, Clone)]
pub struct ArcGisMapServer {
    /// URL of the service, such as
    /// `https://services.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer`.
    pub url: String,
    /// Appended to every request, for secured services.
    pub token: Option<String>,
    /// Ask the server for its metadata and use its tile cache, if it has one. When `false`,
    /// the metadata is not requested at all and images are always exported.
    pub use_precached_tiles_if_available: bool,
    /// Comma separated list of layers to show, for exported images and picking.
    pub layers: Option<String>,
    pub enable_pick_features: bool,
    /// Used for exported images. Tile cache brings its own.
    pub tiling_scheme: TilingScheme,
    pub rectangle: Option<Rectangle>,
    pub tile_width: u32,
    pub tile_height: u32,
    pub maximum_level: Option<u32>,
    pub tile_discard_policy: Option<TileDiscardPolicy>,
    /// Replaced by the copyright text of the service, if it has one.
    pub credit: Option<Credit>,
}

impl Default for ArcGisMapServer {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: None,
            use_precached_tiles_if_available: true,
            layers: None,
            enable_pick_features: true,
            tiling_scheme: TilingScheme::geographic(),
            rectangle: None,
            tile_width: 256,
            tile_height: 256,
            maximum_level: None,
            tile_discard_policy: None,
            credit: None,
        }
    }
}

impl ArcGisMapServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub(crate) fn builder(&self) -> Result<ProviderBuilder, Error> {
        let mut builder = ProviderBuilder::new(base_url(&self.url)?);
        builder.token = self.token.clone();
        builder.addressing = Addressing::Dynamic;
        builder.tiling_scheme = self.tiling_scheme;
        builder.rectangle = self.rectangle;
        builder.tile_width = self.tile_width;
        builder.tile_height = self.tile_height;
        builder.maximum_level = self.maximum_level;
        builder.discard_policy = self.tile_discard_policy.clone();
        builder.credit = self.credit.clone();
        builder.layers = self.layers.clone();
        builder.has_alpha_channel = true;
        builder.enable_pick_features = self.enable_pick_features;
        Ok(builder)
    }
}

/// The service's description, requested with `f=json` from the service URL itself.
pub(crate) fn metadata_url(base: &Url, token: Option<&str>) -> Url {
    let mut url = base.clone();
    let path = base.path().trim_end_matches('/').to_owned();
    url.set_path(&path);
    url.query_pairs_mut().append_pair("f", "json");
    append_token(&mut url, token);
    url
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    tile_info: Option<TileInfo>,
    full_extent: Option<Extent>,
    copyright_text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileInfo {
    rows: u32,
    cols: u32,
    spatial_reference: SpatialReferenceInfo,
    lods: Vec<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extent {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    spatial_reference: Option<SpatialReferenceInfo>,
}

impl Extent {
    fn rectangle(&self, projection: Projection) -> Rectangle {
        match projection {
            Projection::WebMercator => {
                // Unprojecting clamps to the valid Web Mercator range.
                let south_west = projection.unproject(Native::new(self.xmin, self.ymin));
                let north_east = projection.unproject(Native::new(self.xmax, self.ymax));
                Rectangle::new(south_west.x(), south_west.y(), north_east.x(), north_east.y())
            }
            Projection::Geographic => {
                Rectangle::new(self.xmin, self.ymin, self.xmax, self.ymax).clamp_to(&Rectangle::MAX)
            }
        }
    }
}

/// Apply the MapServer's description onto the `builder`.
pub(crate) fn parse_metadata(
    document: &Value,
    mut builder: ProviderBuilder,
) -> Result<ProviderBuilder, Error> {
    let metadata = Metadata::deserialize(document)
        .map_err(|err| Error::MalformedMetadata(err.to_string()))?;

    match metadata.tile_info {
        Some(tile_info) => {
            let wkid = tile_info.spatial_reference.wkid().ok_or_else(|| {
                Error::MalformedMetadata("tileInfo has no spatial reference WKID".to_owned())
            })?;
            builder.tiling_scheme =
                TilingScheme::for_projection(spatial_reference::resolve("tileInfo", wkid)?);

            let maximum_level = tile_info.lods.len().checked_sub(1).ok_or_else(|| {
                Error::MalformedMetadata("tileInfo has no levels of detail".to_owned())
            })?;
            builder.maximum_level = Some(maximum_level as u32);
            builder.tile_width = tile_info.cols;
            builder.tile_height = tile_info.rows;
            builder.rectangle = Some(builder.tiling_scheme.rectangle());
            builder.addressing = Addressing::Precached;
        }
        None => {
            log::debug!("{} has no tile cache, images will be exported.", builder.url);
            builder.addressing = Addressing::Dynamic;
        }
    }

    if let Some(extent) = metadata.full_extent {
        if let Some(wkid) = extent.spatial_reference.and_then(|sr| sr.wkid()) {
            let projection = spatial_reference::resolve("fullExtent", wkid)?;
            builder.rectangle = Some(extent.rectangle(projection));
        }
    }

    if let Some(copyright) = metadata.copyright_text.filter(|text| !text.is_empty()) {
        builder.credit = Some(Credit::new(copyright));
    }

    Ok(builder)
}
