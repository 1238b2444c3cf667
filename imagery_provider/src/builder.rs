//! Two-phase construction of providers: options and metadata are written into the
//! [`ProviderBuilder`], which is then committed into an immutable [`ProviderConfig`].

use reqwest::Url;

use crate::{
    address,
    attribution::{AttributionEntry, AttributionIndex, Credit},
    discard::{DiscardMissingTileImagePolicy, MISSING_TILE_PIXELS, TileDiscardPolicy},
    tiling_scheme::{Rectangle, TileId, TilingScheme},
};

/// How tile requests are addressed.
#[derive(Debug, Clone, PartialEq)]
pub enum Addressing {
    /// Pre-rendered tiles, fetched from `tile/{level}/{y}/{x}`.
    Precached,
    /// Images rendered on demand by the `export` operation.
    Dynamic,
    /// Quadkey-addressed tiles, from a template containing `{quadkey}` and `{subdomain}`.
    QuadKey {
        template: String,
        subdomains: Vec<String>,
    },
}

/// Mutable provider configuration, filled from caller's options first and then from the
/// server's metadata.
#[derive(Debug, Clone)]
pub struct ProviderBuilder {
    /// Base URL of the service. Always ends with a slash.
    pub url: Url,
    pub token: Option<String>,
    pub addressing: Addressing,
    pub tile_width: u32,
    pub tile_height: u32,
    pub maximum_level: Option<u32>,
    pub tiling_scheme: TilingScheme,
    /// Defaults to the rectangle of the tiling scheme.
    pub rectangle: Option<Rectangle>,
    pub credit: Option<Credit>,
    pub discard_policy: Option<TileDiscardPolicy>,
    pub layers: Option<String>,
    pub attribution: Vec<AttributionEntry>,
    pub has_alpha_channel: bool,
    pub enable_pick_features: bool,
}

impl ProviderBuilder {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            addressing: Addressing::Dynamic,
            tile_width: 256,
            tile_height: 256,
            maximum_level: None,
            tiling_scheme: TilingScheme::default(),
            rectangle: None,
            credit: None,
            discard_policy: None,
            layers: None,
            attribution: Vec::new(),
            has_alpha_channel: true,
            enable_pick_features: true,
        }
    }

    /// Freeze the configuration.
    ///
    /// Pre-cached services without explicit discard policy get one comparing tiles with the
    /// image which the server returns for a tile it does not have.
    pub fn commit(self) -> ProviderConfig {
        let install_missing_image_policy =
            self.addressing == Addressing::Precached && self.discard_policy.is_none();

        let mut config = ProviderConfig {
            rectangle: self.rectangle.unwrap_or(self.tiling_scheme.rectangle()),
            url: self.url,
            token: self.token,
            addressing: self.addressing,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            maximum_level: self.maximum_level,
            tiling_scheme: self.tiling_scheme,
            credit: self.credit,
            discard_policy: self.discard_policy,
            layers: self.layers,
            attribution: AttributionIndex::new(self.attribution),
            has_alpha_channel: self.has_alpha_channel,
            enable_pick_features: self.enable_pick_features,
        };

        if install_missing_image_policy {
            let reference = TileId::new(0, 0, config.maximum_level.unwrap_or(0));
            match address::build_request(&config, reference) {
                Ok(missing_image_url) => {
                    log::debug!("Missing tiles will be compared against {missing_image_url}.");
                    config.discard_policy = Some(TileDiscardPolicy::MissingImage(
                        DiscardMissingTileImagePolicy::new(
                            missing_image_url,
                            MISSING_TILE_PIXELS.to_vec(),
                            true,
                        )
                        .into(),
                    ));
                }
                Err(err) => log::warn!("Missing tiles will not be discarded: {err}"),
            }
        }

        config
    }
}

/// Immutable provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    url: Url,
    token: Option<String>,
    addressing: Addressing,
    tile_width: u32,
    tile_height: u32,
    maximum_level: Option<u32>,
    tiling_scheme: TilingScheme,
    rectangle: Rectangle,
    credit: Option<Credit>,
    discard_policy: Option<TileDiscardPolicy>,
    layers: Option<String>,
    attribution: AttributionIndex,
    has_alpha_channel: bool,
    enable_pick_features: bool,
}

impl ProviderConfig {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// `None` means that the server did not tell.
    pub fn maximum_level(&self) -> Option<u32> {
        self.maximum_level
    }

    pub fn tiling_scheme(&self) -> &TilingScheme {
        &self.tiling_scheme
    }

    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    pub fn credit(&self) -> Option<&Credit> {
        self.credit.as_ref()
    }

    pub fn discard_policy(&self) -> Option<&TileDiscardPolicy> {
        self.discard_policy.as_ref()
    }

    pub fn layers(&self) -> Option<&str> {
        self.layers.as_deref()
    }

    pub fn attribution(&self) -> &AttributionIndex {
        &self.attribution
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.has_alpha_channel
    }

    pub fn enable_pick_features(&self) -> bool {
        self.enable_pick_features
    }
}
