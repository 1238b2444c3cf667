use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    Error,
    address::{base_url, resource},
    attribution::{AttributionEntry, CoverageArea, Credit},
    builder::{Addressing, ProviderBuilder},
    discard::TileDiscardPolicy,
    tiling_scheme::{Rectangle, TilingScheme},
};

/// Predefined Bing Maps imagery sets.
/// <https://learn.microsoft.com/en-us/bingmaps/rest-services/imagery/get-imagery-metadata>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BingMapsStyle {
    #[default]
    Aerial,
    AerialWithLabels,
    AerialWithLabelsOnDemand,
    Road,
    RoadOnDemand,
    CanvasDark,
    CanvasLight,
    CanvasGray,
    OrdnanceSurvey,
    CollinsBart,
}

impl BingMapsStyle {
    fn api_slug(&self) -> &'static str {
        match self {
            Self::Aerial => "Aerial",
            Self::AerialWithLabels => "AerialWithLabels",
            Self::AerialWithLabelsOnDemand => "AerialWithLabelsOnDemand",
            Self::Road => "Road",
            Self::RoadOnDemand => "RoadOnDemand",
            Self::CanvasDark => "CanvasDark",
            Self::CanvasLight => "CanvasLight",
            Self::CanvasGray => "CanvasGray",
            Self::OrdnanceSurvey => "OrdnanceSurvey",
            Self::CollinsBart => "CollinsBart",
        }
    }
}

/// Bing Maps imagery, addressed by quadkeys. Tile URLs and attribution are discovered from the
/// imagery metadata service.
#[derive(Debug, Clone)]
pub struct BingMaps {
    /// Address of the REST services.
    pub url: String,
    /// Bing Maps key, required.
    pub key: String,
    pub style: BingMapsStyle,
    /// Culture code of the labels, such as `pl-PL`. Empty means server's default.
    pub culture: String,
    /// Defaults to discarding empty tiles, which Bing sends where it has no imagery.
    pub tile_discard_policy: Option<TileDiscardPolicy>,
}

impl Default for BingMaps {
    fn default() -> Self {
        Self {
            url: "https://dev.virtualearth.net".to_owned(),
            key: String::new(),
            style: BingMapsStyle::default(),
            culture: String::new(),
            tile_discard_policy: None,
        }
    }
}

impl BingMaps {
    pub(crate) fn builder(&self) -> Result<ProviderBuilder, Error> {
        let mut builder = ProviderBuilder::new(base_url(&self.url)?);
        // Quadkeys have a digit for level zero, so the world starts split into four.
        builder.tiling_scheme = TilingScheme::web_mercator_with(2, 2);
        builder.discard_policy = Some(
            self.tile_discard_policy
                .clone()
                .unwrap_or(TileDiscardPolicy::DiscardEmpty),
        );
        builder.has_alpha_channel = false;
        builder.enable_pick_features = false;
        Ok(builder)
    }

    pub(crate) fn metadata_url(&self, base: &Url) -> Result<Url, Error> {
        let mut url = resource(
            base,
            &format!("REST/v1/Imagery/Metadata/{}", self.style.api_slug()),
        )?;
        url.query_pairs_mut()
            .append_pair("incl", "ImageryProviders")
            .append_pair("key", &self.key)
            .append_pair("uriScheme", "https");
        Ok(url)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    #[serde(default)]
    resource_sets: Vec<ResourceSet>,
}

#[derive(Deserialize)]
struct ResourceSet {
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resource {
    image_url: String,
    image_url_subdomains: Vec<String>,
    image_width: u32,
    image_height: u32,
    zoom_max: u32,
    #[serde(default)]
    imagery_providers: Vec<ImageryProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageryProvider {
    attribution: String,
    #[serde(default)]
    coverage_areas: Vec<Coverage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Coverage {
    zoom_min: u32,
    zoom_max: u32,
    /// South, west, north, east.
    bbox: [f64; 4],
}

impl TryFrom<&Coverage> for CoverageArea {
    type Error = Error;

    fn try_from(coverage: &Coverage) -> Result<Self, Error> {
        if coverage.zoom_min > coverage.zoom_max {
            return Err(Error::MalformedMetadata(format!(
                "coverage area zoom range {}..{} is empty",
                coverage.zoom_min, coverage.zoom_max
            )));
        }

        let [south, west, north, east] = coverage.bbox;
        Ok(CoverageArea {
            zoom_min: coverage.zoom_min,
            zoom_max: coverage.zoom_max,
            bbox: Rectangle::new(west, south, east, north),
        })
    }
}

/// Apply the imagery metadata onto the `builder`.
pub(crate) fn parse_metadata(
    document: &Value,
    mut builder: ProviderBuilder,
    culture: &str,
) -> Result<ProviderBuilder, Error> {
    let metadata = Metadata::deserialize(document)
        .map_err(|err| Error::MalformedMetadata(err.to_string()))?;

    let [resource_set] = metadata.resource_sets.as_slice() else {
        return Err(Error::MalformedMetadata(
            "expected exactly one resource set".to_owned(),
        ));
    };
    let [resource] = resource_set.resources.as_slice() else {
        return Err(Error::MalformedMetadata(
            "expected exactly one resource".to_owned(),
        ));
    };
    let Some(first_subdomain) = resource.image_url_subdomains.first() else {
        return Err(Error::MalformedMetadata(
            "imageUrlSubdomains is empty".to_owned(),
        ));
    };

    let template = resource.image_url.replace("{culture}", culture);
    let sample = template
        .replace("{quadkey}", "0")
        .replace("{subdomain}", first_subdomain);
    Url::parse(&sample)
        .map_err(|err| Error::MalformedMetadata(format!("imageUrl '{template}': {err}")))?;

    builder.attribution = resource
        .imagery_providers
        .iter()
        .map(|provider| -> Result<AttributionEntry, Error> {
            Ok(AttributionEntry {
                credit: Credit::new(&provider.attribution),
                coverage_areas: provider
                    .coverage_areas
                    .iter()
                    .map(CoverageArea::try_from)
                    .collect::<Result<_, _>>()?,
            })
        })
        .collect::<Result<_, _>>()?;

    builder.tile_width = resource.image_width;
    builder.tile_height = resource.image_height;
    builder.maximum_level = Some(resource.zoom_max.saturating_sub(1));
    builder.addressing = Addressing::QuadKey {
        template,
        subdomains: resource.image_url_subdomains.clone(),
    };

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::{build_request, quadkey_to_tile_xy},
        builder::ProviderConfig,
        projection::WEB_MERCATOR_MAX_LATITUDE,
        tiling_scheme::TileId,
    };
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn document(resources: Value) -> Value {
        json!({
            "authenticationResultCode": "ValidCredentials",
            "brandLogoUri": "https://dev.virtualearth.net/Branding/logo_powered_by.png",
            "resourceSets": [{"estimatedTotal": 1, "resources": resources}],
            "statusCode": 200
        })
    }

    fn aerial() -> Value {
        json!({
            "__type": "ImageryMetadata:http://schemas.microsoft.com/search/local/ws/rest/v1",
            "imageHeight": 256,
            "imageUrl": "https://{subdomain}.ssl.ak.tiles.virtualearth.net/tiles/a{quadkey}.jpeg?g=14245&mkt={culture}",
            "imageUrlSubdomains": ["t0", "t1", "t2", "t3"],
            "imageWidth": 256,
            "imageryProviders": [
                {
                    "attribution": "© 2024 Microsoft Corporation",
                    "coverageAreas": [{"bbox": [-90, -180, 90, 180], "zoomMax": 21, "zoomMin": 1}]
                },
                {
                    "attribution": "© 2024 Maxar",
                    "coverageAreas": [
                        {"bbox": [49.0, 14.1, 54.9, 24.2], "zoomMax": 19, "zoomMin": 10},
                        {"bbox": [-67.0, -179.99, 27.0, 0.0], "zoomMax": 13, "zoomMin": 14}
                    ]
                }
            ],
            "vintageEnd": null,
            "vintageStart": null,
            "zoomMax": 21,
            "zoomMin": 1
        })
    }

    fn builder() -> ProviderBuilder {
        BingMaps::default().builder().unwrap()
    }

    #[test]
    fn metadata_url() {
        let options = BingMaps {
            key: "my key".to_owned(),
            style: BingMapsStyle::AerialWithLabelsOnDemand,
            ..Default::default()
        };
        let builder = options.builder().unwrap();
        assert_eq!(
            options.metadata_url(&builder.url).unwrap().as_str(),
            "https://dev.virtualearth.net/REST/v1/Imagery/Metadata/AerialWithLabelsOnDemand\
             ?incl=ImageryProviders&key=my+key&uriScheme=https"
        );
    }

    #[test]
    fn defaults() {
        let builder = builder();
        assert_eq!(builder.tiling_scheme, TilingScheme::web_mercator_with(2, 2));
        assert!(matches!(
            builder.discard_policy,
            Some(TileDiscardPolicy::DiscardEmpty)
        ));
        assert!(!builder.has_alpha_channel);
        assert!(!builder.enable_pick_features);
    }

    #[test]
    fn imagery_metadata() {
        let mut aerial = aerial();
        aerial["imageryProviders"][1]["coverageAreas"][1]["zoomMin"] = json!(12);

        let builder = parse_metadata(&document(json!([aerial])), builder(), "pl-PL").unwrap();

        assert_eq!(builder.tile_width, 256);
        assert_eq!(builder.tile_height, 256);
        assert_eq!(builder.maximum_level, Some(20));
        assert_eq!(
            builder.addressing,
            Addressing::QuadKey {
                template: "https://{subdomain}.ssl.ak.tiles.virtualearth.net/tiles/a{quadkey}.jpeg\
                           ?g=14245&mkt=pl-PL"
                    .to_owned(),
                subdomains: vec![
                    "t0".to_owned(),
                    "t1".to_owned(),
                    "t2".to_owned(),
                    "t3".to_owned()
                ],
            }
        );

        assert_eq!(builder.attribution.len(), 2);
        assert_eq!(builder.attribution[1].credit, Credit::new("© 2024 Maxar"));
        assert_eq!(
            builder.attribution[1].coverage_areas[0],
            CoverageArea {
                zoom_min: 10,
                zoom_max: 19,
                bbox: Rectangle::new(14.1, 49.0, 24.2, 54.9)
            }
        );
    }

    #[test]
    fn empty_zoom_range_is_malformed() {
        assert!(matches!(
            parse_metadata(&document(json!([aerial()])), builder(), ""),
            Err(Error::MalformedMetadata(_))
        ));
    }

    #[test]
    fn exactly_one_resource_is_expected() {
        let mut valid = aerial();
        valid["imageryProviders"] = json!([]);

        for resources in [json!([]), json!([valid.clone(), valid.clone()])] {
            assert!(matches!(
                parse_metadata(&document(resources), builder(), ""),
                Err(Error::MalformedMetadata(_))
            ));
        }

        let two_sets = json!({
            "resourceSets": [{"resources": [valid.clone()]}, {"resources": [valid.clone()]}]
        });
        assert!(matches!(
            parse_metadata(&two_sets, builder(), ""),
            Err(Error::MalformedMetadata(_))
        ));

        assert!(matches!(
            parse_metadata(&json!({"resourceSets": []}), builder(), ""),
            Err(Error::MalformedMetadata(_))
        ));

        assert!(parse_metadata(&document(json!([valid])), builder(), "").is_ok());
    }

    #[test]
    fn subdomains_are_required() {
        let mut resource = aerial();
        resource["imageryProviders"] = json!([]);
        resource["imageUrlSubdomains"] = json!([]);
        assert!(matches!(
            parse_metadata(&document(json!([resource])), builder(), ""),
            Err(Error::MalformedMetadata(_))
        ));
    }

    #[test]
    fn broken_template_is_malformed() {
        let mut resource = aerial();
        resource["imageryProviders"] = json!([]);
        resource["imageUrl"] = json!("{subdomain}/tiles/{quadkey}");
        assert!(matches!(
            parse_metadata(&document(json!([resource])), builder(), ""),
            Err(Error::MalformedMetadata(_))
        ));
    }

    fn config() -> ProviderConfig {
        let mut resource = aerial();
        resource["imageryProviders"] = json!([]);
        parse_metadata(&document(json!([resource])), builder(), "pl-PL")
            .unwrap()
            .commit()
    }

    fn quadkey(config: &ProviderConfig, tile: TileId) -> String {
        let url = build_request(config, tile).unwrap();
        url.path()
            .trim_start_matches("/tiles/a")
            .trim_end_matches(".jpeg")
            .to_owned()
    }

    /// Rectangle of the quadkey's tile, computed the way Bing Maps documents it.
    fn quadkey_rectangle(quadkey: &str) -> Rectangle {
        let tile = quadkey_to_tile_xy(quadkey).unwrap();
        let map_size = 2f64.powi(quadkey.len() as i32);
        let lon = |x: f64| x / map_size * 360. - 180.;
        let lat = |y: f64| {
            (std::f64::consts::PI * (1. - 2. * y / map_size))
                .sinh()
                .atan()
                .to_degrees()
        };

        Rectangle::new(
            lon(f64::from(tile.x)),
            lat(f64::from(tile.y) + 1.),
            lon(f64::from(tile.x) + 1.),
            lat(f64::from(tile.y)),
        )
    }

    #[test]
    fn level_zero_covers_four_quadrants() {
        let config = config();
        assert_eq!(quadkey(&config, TileId::new(0, 0, 0)), "0");
        assert_eq!(quadkey(&config, TileId::new(1, 0, 0)), "1");
        assert_eq!(quadkey(&config, TileId::new(0, 1, 0)), "2");
        assert_eq!(quadkey(&config, TileId::new(1, 1, 0)), "3");
    }

    #[test]
    fn quadkeys_name_the_tiles_they_are_drawn_on() {
        let config = config();
        let scheme = config.tiling_scheme();

        for level in 0..=4 {
            let mut first_digits = BTreeSet::new();

            for x in 0..scheme.tiles_x(level) {
                for y in 0..scheme.tiles_y(level) {
                    let tile = TileId::new(x, y, level);
                    let key = quadkey(&config, tile);
                    assert_eq!(key.len() as u32, level + 1);
                    first_digits.insert(key.as_bytes()[0]);

                    let expected = quadkey_rectangle(&key);
                    let actual = scheme.tile_rectangle(tile);
                    assert_relative_eq!(actual.west, expected.west, epsilon = 1e-9);
                    assert_relative_eq!(actual.east, expected.east, epsilon = 1e-9);
                    assert_relative_eq!(actual.north, expected.north, epsilon = 1e-9);
                    assert_relative_eq!(actual.south, expected.south, epsilon = 1e-9);
                }
            }

            assert_eq!(first_digits, BTreeSet::from(*b"0123"), "level {level}");
        }

        assert_relative_eq!(
            quadkey_rectangle("0").north,
            WEB_MERCATOR_MAX_LATITUDE,
            epsilon = 1e-9
        );
    }

    #[test]
    fn deepest_level_is_the_last_one_served() {
        let config = config();
        assert_eq!(config.maximum_level(), Some(20));
        assert_eq!(quadkey(&config, TileId::new(0, 0, 20)).len(), 21);
    }
}
