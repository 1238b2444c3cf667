//! Tile grids: how the rectangle of a projection is subdivided into a quad-tree of tiles.

use crate::{
    position::{Native, Position, lon_lat},
    projection::{Projection, WEB_MERCATOR_MAX_LATITUDE},
};

// level   geographic tiles    web mercator tiles    bing tiles
// 0       2 × 1               1 × 1                 2 × 2
// 1       4 × 2               2 × 2                 4 × 4
// 2       8 × 4               4 × 4                 8 × 8

/// Deepest level whose tiles can still be numbered with `u32`.
pub const MAX_TILE_LEVEL: u32 = 30;

/// Identifies the tile in the tile grid. Tile `(0, 0)` is the north-west corner of the grid.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct TileId {
    /// X number of the tile, growing eastwards.
    pub x: u32,

    /// Y number of the tile, growing southwards.
    pub y: u32,

    /// Level of detail, where 0 means the least detailed one.
    pub level: u32,
}

impl TileId {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }
}

/// Rectangle given by its edges. For geographical rectangles these are degrees; native
/// rectangles use units of their projection. A geographical rectangle whose `east` is smaller
/// than `west` crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// The whole globe.
    pub const MAX: Rectangle = Rectangle::new(-180., -90., 180., 90.);

    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn south_west(&self) -> Position {
        lon_lat(self.west, self.south)
    }

    pub fn north_east(&self) -> Position {
        lon_lat(self.east, self.north)
    }

    pub fn contains(&self, position: Position) -> bool {
        let mut lon = position.x();
        let mut east = self.east;
        if east < self.west {
            east += 360.;
            if lon < 0. {
                lon += 360.;
            }
        }
        (self.west..=east).contains(&lon) && (self.south..=self.north).contains(&position.y())
    }

    /// Common part of two geographical rectangles, `None` when they do not overlap. Rectangles
    /// which only touch each other do not overlap.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let mut self_east = self.east;
        let mut self_west = self.west;
        let mut other_east = other.east;
        let mut other_west = other.west;

        // Unwrap whichever crosses the antimeridian, so that both can be compared directly.
        if self_east < self_west && other_east > 0. {
            self_east += 360.;
        } else if other_east < other_west && self_east > 0. {
            other_east += 360.;
        }

        if self_east < self_west && other_west < 0. {
            other_west += 360.;
        } else if other_east < other_west && self_west < 0. {
            self_west += 360.;
        }

        let west = wrap_longitude(self_west.max(other_west));
        let east = wrap_longitude(self_east.min(other_east));

        if (self.west < self.east || other.west < other.east) && east <= west {
            return None;
        }

        let south = self.south.max(other.south);
        let north = self.north.min(other.north);

        if south >= north {
            return None;
        }

        Some(Rectangle::new(west, south, east, north))
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.intersection(other).is_some()
    }

    /// Shrink the rectangle, so it does not go beyond `bounds`.
    pub fn clamp_to(&self, bounds: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.west.max(bounds.west),
            self.south.max(bounds.south),
            self.east.min(bounds.east),
            self.north.min(bounds.north),
        )
    }
}

fn tiles_at(level_zero_tiles: u32, level: u32) -> u32 {
    if level >= u32::BITS {
        return u32::MAX;
    }
    u32::try_from(u64::from(level_zero_tiles) << level).unwrap_or(u32::MAX)
}

/// Bring longitude into the -180..=180 range.
fn wrap_longitude(lon: f64) -> f64 {
    if (-180. ..=180.).contains(&lon) {
        lon
    } else {
        (lon + 180.).rem_euclid(360.) - 180.
    }
}

/// Projection and the rule of subdividing its rectangle into tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilingScheme {
    projection: Projection,
    rectangle: Rectangle,
    level_zero_tiles_x: u32,
    level_zero_tiles_y: u32,
}

impl Default for TilingScheme {
    fn default() -> Self {
        Self::geographic()
    }
}

impl TilingScheme {
    /// Whole globe, two square tiles at level zero.
    pub fn geographic() -> Self {
        Self {
            projection: Projection::Geographic,
            rectangle: Rectangle::MAX,
            level_zero_tiles_x: 2,
            level_zero_tiles_y: 1,
        }
    }

    /// Square Web Mercator world, single tile at level zero.
    pub fn web_mercator() -> Self {
        Self::web_mercator_with(1, 1)
    }

    /// Web Mercator world split into the given number of tiles at level zero. Bing Maps, for
    /// one, starts with 2 × 2.
    pub fn web_mercator_with(level_zero_tiles_x: u32, level_zero_tiles_y: u32) -> Self {
        Self {
            projection: Projection::WebMercator,
            rectangle: Rectangle::new(
                -180.,
                -WEB_MERCATOR_MAX_LATITUDE,
                180.,
                WEB_MERCATOR_MAX_LATITUDE,
            ),
            level_zero_tiles_x,
            level_zero_tiles_y,
        }
    }

    pub fn for_projection(projection: Projection) -> Self {
        match projection {
            Projection::Geographic => Self::geographic(),
            Projection::WebMercator => Self::web_mercator(),
        }
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Geographical rectangle covered by the grid.
    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    /// Rectangle covered by the grid, in native coordinates.
    pub fn native_rectangle(&self) -> Rectangle {
        let south_west = self.projection.project(self.rectangle.south_west());
        let north_east = self.projection.project(self.rectangle.north_east());
        Rectangle::new(south_west.x(), south_west.y(), north_east.x(), north_east.y())
    }

    /// Number of tile columns at the given level, saturating at `u32::MAX`.
    pub fn tiles_x(&self, level: u32) -> u32 {
        tiles_at(self.level_zero_tiles_x, level)
    }

    /// Number of tile rows at the given level, saturating at `u32::MAX`.
    pub fn tiles_y(&self, level: u32) -> u32 {
        tiles_at(self.level_zero_tiles_y, level)
    }

    /// Whether the tile belongs to the grid. Tiles deeper than [`MAX_TILE_LEVEL`] never do.
    pub fn contains(&self, tile: TileId) -> bool {
        tile.level <= MAX_TILE_LEVEL
            && tile.x < self.tiles_x(tile.level)
            && tile.y < self.tiles_y(tile.level)
    }

    /// Rectangle of the tile, in native coordinates.
    pub fn tile_native_rectangle(&self, tile: TileId) -> Rectangle {
        let native = self.native_rectangle();
        let width = (native.east - native.west) / self.tiles_x(tile.level) as f64;
        let height = (native.north - native.south) / self.tiles_y(tile.level) as f64;

        Rectangle::new(
            native.west + tile.x as f64 * width,
            native.north - (tile.y as f64 + 1.) * height,
            native.west + (tile.x as f64 + 1.) * width,
            native.north - tile.y as f64 * height,
        )
    }

    /// Geographical rectangle of the tile.
    pub fn tile_rectangle(&self, tile: TileId) -> Rectangle {
        let native = self.tile_native_rectangle(tile);
        let south_west = self
            .projection
            .unproject(Native::new(native.west, native.south));
        let north_east = self
            .projection
            .unproject(Native::new(native.east, native.north));
        Rectangle::new(south_west.x(), south_west.y(), north_east.x(), north_east.y())
    }

    /// Tile containing the position at the given level, `None` if the position lies outside of
    /// the grid.
    pub fn position_to_tile(&self, position: Position, level: u32) -> Option<TileId> {
        if level > MAX_TILE_LEVEL || !self.rectangle.contains(position) {
            return None;
        }

        let tiles_x = self.tiles_x(level);
        let tiles_y = self.tiles_y(level);
        let native = self.native_rectangle();
        let width = (native.east - native.west) / tiles_x as f64;
        let height = (native.north - native.south) / tiles_y as f64;

        let projected = self.projection.project(position);
        let x = ((projected.x() - native.west) / width).floor() as u32;
        let y = ((native.north - projected.y()) / height).floor() as u32;

        // Positions lying exactly on the east or south edge belong to the last tile.
        Some(TileId {
            x: x.min(tiles_x - 1),
            y: y.min(tiles_y - 1),
            level,
        })
    }
}
