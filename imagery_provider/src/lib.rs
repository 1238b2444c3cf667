#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod address;
mod attribution;
mod builder;
mod discard;
mod error;
mod metadata;
mod pick;
mod position;
mod projection;
mod provider;
pub mod sources;
pub mod spatial_reference;
mod tiling_scheme;
mod transport;

pub use address::{build_request, quadkey_to_tile_xy, tile_xy_to_quadkey};
pub use attribution::{AttributionEntry, AttributionIndex, CoverageArea, Credit};
pub use builder::{Addressing, ProviderBuilder, ProviderConfig};
pub use discard::{DiscardMissingTileImagePolicy, MISSING_TILE_PIXELS, TileDiscardPolicy};
pub use error::{Error, ErrorEvent, ErrorKind, TileProviderError};
pub use pick::{PickResult, pick};
pub use position::{Native, Position, lat_lon, lon_lat};
pub use projection::{
    Projection, WEB_MERCATOR_MAX_EXTENT, WEB_MERCATOR_MAX_LATITUDE, WGS84_RADIUS,
};
pub use provider::{ImageryProvider, TileImage};
pub use tiling_scheme::{MAX_TILE_LEVEL, Rectangle, TileId, TilingScheme};
pub use transport::{HeaderValue, HttpError, HttpOptions, HttpTransport, Transport};
