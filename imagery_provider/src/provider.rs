//! The imagery provider: discovers what the server offers, then serves tiles, credits and
//! picked features.

use std::future::Future;

use futures::future::{Either, ready};
use image::RgbaImage;

use crate::{
    Error, ErrorEvent, Position, address,
    attribution::Credit,
    builder::ProviderConfig,
    discard::TileDiscardPolicy,
    metadata,
    pick::{self, PickResult},
    sources::{self, Source, arcgis_metadata_url},
    tiling_scheme::{Rectangle, TileId, TilingScheme},
    transport::Transport,
};

/// Decoded tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileImage {
    /// Server answered with zero bytes, which some use to tell that they have no tile there.
    Empty,
    Image(RgbaImage),
}

impl TileImage {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Ok(Self::Empty);
        }

        let image =
            image::load_from_memory(bytes).map_err(|err| Error::InvalidImage(err.to_string()))?;
        Ok(Self::Image(image.to_rgba8()))
    }
}

/// Imagery of a single map service.
pub struct ImageryProvider<T> {
    config: ProviderConfig,
    transport: T,
    errors: ErrorEvent,
}

impl<T> ImageryProvider<T>
where
    T: Transport + Clone + 'static,
{
    /// Create the provider, asking the server for its metadata if the source needs it. Fails if
    /// the metadata cannot be fetched or describes something which is not supported. Failures
    /// are raised on `errors` as well.
    pub async fn new(
        source: impl Into<Source>,
        transport: T,
        errors: ErrorEvent,
    ) -> Result<Self, Error> {
        let builder = match source.into() {
            Source::ArcGisMapServer(options) => {
                let builder = options
                    .builder()
                    .map_err(|err| errors.report(&options.url, None, err))?;

                if options.use_precached_tiles_if_available {
                    let endpoint = arcgis_metadata_url(&builder.url, builder.token.as_deref());
                    metadata::resolve(
                        &transport,
                        &endpoint,
                        &errors,
                        builder,
                        sources::parse_arcgis_metadata,
                    )
                    .await?
                } else {
                    log::debug!("Not asking {} for metadata.", options.url);
                    builder
                }
            }
            Source::BingMaps(options) => {
                let (builder, endpoint) = options
                    .builder()
                    .and_then(|builder| {
                        let endpoint = options.metadata_url(&builder.url)?;
                        Ok((builder, endpoint))
                    })
                    .map_err(|err| errors.report(&options.url, None, err))?;

                metadata::resolve(&transport, &endpoint, &errors, builder, |document, builder| {
                    sources::parse_bing_metadata(document, builder, &options.culture)
                })
                .await?
            }
        };

        let config = builder.commit();

        if let Some(TileDiscardPolicy::MissingImage(policy)) = config.discard_policy() {
            policy.load(&transport).await;
        }

        Ok(Self {
            config,
            transport,
            errors,
        })
    }

    /// Fetch and decode the tile. `None` means that the transport deferred the request and it
    /// should be made again later.
    ///
    /// Failures are raised on the [`ErrorEvent`] along with the tile, and returned to the caller.
    /// Empty responses are not failures.
    pub fn request_image(
        &self,
        tile: TileId,
    ) -> Option<impl Future<Output = Result<TileImage, Error>> + '_> {
        let url = match address::build_request(&self.config, tile) {
            Ok(url) => url,
            Err(err) => {
                let err = self
                    .errors
                    .report(self.config.url().as_str(), Some(tile), err);
                return Some(Either::Left(ready(Err(err))));
            }
        };

        log::trace!("Requesting {tile:?} from {url}.");

        let Some(request) = self.transport.request_image(url.clone()) else {
            log::trace!("Request for {tile:?} was deferred.");
            return None;
        };

        Some(Either::Right(async move {
            let bytes = request.await.map_err(|err| {
                self.errors
                    .report(url.as_str(), Some(tile), Error::transport(&url, err))
            })?;

            TileImage::decode(&bytes)
                .map_err(|err| self.errors.report(url.as_str(), Some(tile), err))
        }))
    }

    /// Features at the `position`, within the displayed `tile`. `None` if the service does not
    /// support picking, or it was disabled.
    pub async fn pick_features(
        &self,
        tile: TileId,
        position: Position,
    ) -> Result<Option<Vec<PickResult>>, Error> {
        pick::pick(&self.config, &self.transport, tile, position)
            .await
            .map_err(|err| {
                self.errors
                    .report(self.config.url().as_str(), Some(tile), err)
            })
    }

    /// Credits of the data suppliers which need to be displayed along with the tile. Tiles
    /// outside of the tiling scheme have none.
    pub fn tile_credits(&self, tile: TileId) -> Vec<Credit> {
        if !self.config.tiling_scheme().contains(tile) {
            return Vec::new();
        }

        let rectangle = self.config.tiling_scheme().tile_rectangle(tile);
        self.config.attribution().credits_for(&rectangle, tile.level)
    }

    pub fn tile_width(&self) -> u32 {
        self.config.tile_width()
    }

    pub fn tile_height(&self) -> u32 {
        self.config.tile_height()
    }

    pub fn minimum_level(&self) -> u32 {
        0
    }

    pub fn maximum_level(&self) -> Option<u32> {
        self.config.maximum_level()
    }

    pub fn tiling_scheme(&self) -> &TilingScheme {
        self.config.tiling_scheme()
    }

    pub fn rectangle(&self) -> Rectangle {
        self.config.rectangle()
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.config.has_alpha_channel()
    }

    /// Credit of the whole service, displayed regardless of the tiles.
    pub fn credit(&self) -> Option<&Credit> {
        self.config.credit()
    }

    pub fn tile_discard_policy(&self) -> Option<&TileDiscardPolicy> {
        self.config.discard_policy()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
