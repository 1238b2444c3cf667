//! Turning tile coordinates into request URLs.

use reqwest::Url;

use crate::{
    Error,
    builder::{Addressing, ProviderConfig},
    tiling_scheme::TileId,
};

/// Parse service's URL, making sure it ends with a slash so that resources can be joined to it.
pub(crate) fn base_url(url: &str) -> Result<Url, Error> {
    let mut base = Url::parse(url).map_err(|err| Error::invalid_url(url, err))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Resource under the `base` URL. Query parameters of the base are carried over.
pub(crate) fn resource(base: &Url, path: &str) -> Result<Url, Error> {
    let mut url = base
        .join(path)
        .map_err(|err| Error::invalid_url(base.as_str(), err))?;
    url.set_query(base.query());
    Ok(url)
}

pub(crate) fn append_token(url: &mut Url, token: Option<&str>) {
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
}

/// URL of the given tile's image. Tiles outside of the tiling scheme are rejected.
pub fn build_request(config: &ProviderConfig, tile: TileId) -> Result<Url, Error> {
    if !config.tiling_scheme().contains(tile) {
        return Err(Error::TileOutOfRange(tile));
    }

    let mut url = match config.addressing() {
        Addressing::Precached => resource(
            config.url(),
            &format!("tile/{}/{}/{}", tile.level, tile.y, tile.x),
        )?,
        Addressing::Dynamic => export_request(config, tile)?,
        Addressing::QuadKey {
            template,
            subdomains,
        } => return quadkey_request(template, subdomains, tile),
    };

    append_token(&mut url, config.token());
    Ok(url)
}

fn export_request(config: &ProviderConfig, tile: TileId) -> Result<Url, Error> {
    let scheme = config.tiling_scheme();
    let bbox = scheme.tile_native_rectangle(tile);
    let spatial_reference = scheme.projection().epsg().to_string();

    let mut url = resource(config.url(), "export")?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(
                "bbox",
                &format!("{},{},{},{}", bbox.west, bbox.south, bbox.east, bbox.north),
            )
            .append_pair(
                "size",
                &format!("{},{}", config.tile_width(), config.tile_height()),
            )
            .append_pair("format", "png32")
            .append_pair("transparent", "true")
            .append_pair("f", "image")
            .append_pair("bboxSR", &spatial_reference)
            .append_pair("imageSR", &spatial_reference);

        if let Some(layers) = config.layers() {
            query.append_pair("layers", &format!("show:{layers}"));
        }
    }
    Ok(url)
}

fn quadkey_request(template: &str, subdomains: &[String], tile: TileId) -> Result<Url, Error> {
    let subdomain = if subdomains.is_empty() {
        ""
    } else {
        let index = (tile.x as usize + tile.y as usize + tile.level as usize) % subdomains.len();
        subdomains[index].as_str()
    };

    let url = template
        .replace("{quadkey}", &tile_xy_to_quadkey(tile.x, tile.y, tile.level))
        .replace("{subdomain}", subdomain);

    Url::parse(&url).map_err(|err| Error::invalid_url(&url, err))
}

/// Quadkey of the tile: one base-4 digit per level, most significant first, each combining
/// the x bit (1) and the y bit (2) of that level.
///
/// Note that the quadkey has `level + 1` digits, so tile levels start at 0 here, unlike in the
/// Bing Maps' documentation. Such quadkeys address a grid of 2 × 2 tiles at level zero, see
/// [`TilingScheme::web_mercator_with`](crate::TilingScheme::web_mercator_with).
pub fn tile_xy_to_quadkey(x: u32, y: u32, level: u32) -> String {
    (0..=level)
        .rev()
        .map(|i| {
            let mask = 1u32.checked_shl(i).unwrap_or(0);
            let mut digit = b'0';
            if x & mask != 0 {
                digit += 1;
            }
            if y & mask != 0 {
                digit += 2;
            }
            char::from(digit)
        })
        .collect()
}

/// Inverse of [`tile_xy_to_quadkey`].
pub fn quadkey_to_tile_xy(quadkey: &str) -> Result<TileId, Error> {
    if quadkey.is_empty() || quadkey.len() > 32 {
        return Err(Error::InvalidQuadKey(quadkey.to_owned()));
    }

    let level = quadkey.len() as u32 - 1;
    let mut tile = TileId::new(0, 0, level);

    for (i, c) in quadkey.chars().enumerate() {
        let digit = c
            .to_digit(4)
            .ok_or_else(|| Error::InvalidQuadKey(quadkey.to_owned()))?;
        let bit = level - i as u32;
        tile.x |= (digit & 1) << bit;
        tile.y |= ((digit >> 1) & 1) << bit;
    }

    Ok(tile)
}
