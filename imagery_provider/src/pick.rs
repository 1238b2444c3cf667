//! Feature picking, using the `identify` operation of the map server.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    Error,
    address::{append_token, resource},
    builder::{Addressing, ProviderConfig},
    position::{Native, Position},
    spatial_reference::{SpatialReferenceInfo, feature_projection},
    tiling_scheme::TileId,
    transport::Transport,
};

/// Feature found at the picked position.
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    /// Value of the layer's display field.
    pub name: Option<String>,
    pub properties: Map<String, Value>,
    /// Location of the feature, if it is a point in a supported spatial reference.
    pub position: Option<Position>,
    /// The raw result, as returned by the server.
    pub data: Value,
}

#[derive(Deserialize)]
struct IdentifyResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IdentifyResult {
    value: Option<Value>,
    attributes: Map<String, Value>,
    geometry_type: Option<String>,
    geometry: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointGeometry {
    x: f64,
    y: f64,
    #[serde(default)]
    spatial_reference: SpatialReferenceInfo,
}

/// Whether features can be picked from a service with the given configuration.
pub(crate) fn is_enabled(config: &ProviderConfig) -> bool {
    config.enable_pick_features() && !matches!(config.addressing(), Addressing::QuadKey { .. })
}

/// Ask the server for features at `position`, within the displayed `tile`. `None` when picking
/// is not possible, in which case the server is not contacted at all.
pub async fn pick<T: Transport>(
    config: &ProviderConfig,
    transport: &T,
    tile: TileId,
    position: Position,
) -> Result<Option<Vec<PickResult>>, Error> {
    if !is_enabled(config) {
        return Ok(None);
    }

    let url = identify_request(config, tile, position)?;
    log::debug!("Picking features at {url}.");

    let document = transport
        .get_json(&url)
        .await
        .map_err(|err| Error::transport(&url, err))?;

    parse_identify_response(&document).map(Some)
}

/// Query for features at `position`, within the tile which is displayed there.
pub(crate) fn identify_request(
    config: &ProviderConfig,
    tile: TileId,
    position: Position,
) -> Result<Url, Error> {
    let scheme = config.tiling_scheme();
    if !scheme.contains(tile) {
        return Err(Error::TileOutOfRange(tile));
    }

    let projection = scheme.projection();
    let point = projection.project(position);
    let extent = scheme.tile_native_rectangle(tile);
    let layers = match config.layers() {
        Some(layers) => format!("visible:{layers}"),
        None => "visible".to_owned(),
    };

    let mut url = resource(config.url(), "identify")?;
    url.query_pairs_mut()
        .append_pair("f", "json")
        .append_pair("tolerance", "2")
        .append_pair("geometryType", "esriGeometryPoint")
        .append_pair("geometry", &format!("{},{}", point.x(), point.y()))
        .append_pair(
            "mapExtent",
            &format!(
                "{},{},{},{}",
                extent.west, extent.south, extent.east, extent.north
            ),
        )
        .append_pair(
            "imageDisplay",
            &format!("{},{},96", config.tile_width(), config.tile_height()),
        )
        .append_pair("sr", &projection.epsg().to_string())
        .append_pair("layers", &layers);

    append_token(&mut url, config.token());
    Ok(url)
}

pub(crate) fn parse_identify_response(document: &Value) -> Result<Vec<PickResult>, Error> {
    let response = IdentifyResponse::deserialize(document)
        .map_err(|err| Error::MalformedMetadata(format!("identify response: {err}")))?;

    Ok(response.results.into_iter().map(pick_result).collect())
}

fn pick_result(data: Value) -> PickResult {
    let result = IdentifyResult::deserialize(&data).unwrap_or_else(|err| {
        log::debug!("Unexpected identify result, keeping only the raw data: {err}");
        IdentifyResult::default()
    });

    let name = result.value.and_then(|value| match value {
        Value::Null => None,
        Value::String(name) => Some(name),
        other => Some(other.to_string()),
    });

    let position = match (result.geometry_type.as_deref(), result.geometry) {
        (Some("esriGeometryPoint"), Some(geometry)) => point_position(geometry),
        _ => None,
    };

    PickResult {
        name,
        properties: result.attributes,
        position,
        data,
    }
}

fn point_position(geometry: Value) -> Option<Position> {
    let point = PointGeometry::deserialize(geometry).ok()?;
    let projection = feature_projection(point.spatial_reference.wkid())?;
    Some(projection.unproject(Native::new(point.x, point.y)))
}
