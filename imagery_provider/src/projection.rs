//! Project the lon/lat coordinates into the native coordinates of the server's spatial reference
//! and back. Only two projections exist here: geographic (identity, degrees) and the spherical
//! Web Mercator (meters).
//! <https://en.wikipedia.org/wiki/Web_Mercator_projection>
//! <https://epsg.io/3857>

use crate::position::{Native, Position, lon_lat};
use std::f64::consts::PI;

/// Semi-major axis of the WGS84 ellipsoid, in meters. Web Mercator treats the Earth as a sphere
/// of this radius.
pub const WGS84_RADIUS: f64 = 6_378_137.0;

/// Maximum absolute value of both native coordinates in the Web Mercator. The projected world is
/// a square spanning from `-WEB_MERCATOR_MAX_EXTENT` to `WEB_MERCATOR_MAX_EXTENT`.
pub const WEB_MERCATOR_MAX_EXTENT: f64 = PI * WGS84_RADIUS;

/// Latitude which makes the projected world a square, `atan(sinh(π))`.
pub const WEB_MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// Projection of a tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Equirectangular, native coordinates are just longitude and latitude in degrees.
    Geographic,
    /// Spherical Mercator as used by most of the web maps.
    WebMercator,
}

impl Projection {
    /// Convert geographical position into the native coordinates.
    ///
    /// Web Mercator cannot represent the poles, so latitude is clamped to
    /// [`WEB_MERCATOR_MAX_LATITUDE`] first.
    pub fn project(&self, position: Position) -> Native {
        match self {
            Self::Geographic => position,
            Self::WebMercator => {
                let lon = position.x().clamp(-180., 180.);
                let lat = position
                    .y()
                    .clamp(-WEB_MERCATOR_MAX_LATITUDE, WEB_MERCATOR_MAX_LATITUDE);

                let x = lon.to_radians() * WGS84_RADIUS;
                let y = lat.to_radians().tan().asinh() * WGS84_RADIUS;

                Native::new(x, y)
            }
        }
    }

    /// Convert native coordinates into the geographical position.
    pub fn unproject(&self, native: Native) -> Position {
        match self {
            Self::Geographic => native,
            Self::WebMercator => {
                let x = native
                    .x()
                    .clamp(-WEB_MERCATOR_MAX_EXTENT, WEB_MERCATOR_MAX_EXTENT);
                let y = native
                    .y()
                    .clamp(-WEB_MERCATOR_MAX_EXTENT, WEB_MERCATOR_MAX_EXTENT);

                let lon = (x / WGS84_RADIUS).to_degrees();
                let lat = (y / WGS84_RADIUS).sinh().atan().to_degrees();

                lon_lat(lon, lat)
            }
        }
    }

    /// EPSG code of this projection, used for `bboxSR`, `imageSR` and `sr` parameters.
    pub fn epsg(&self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::WebMercator => 3857,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn geographic_is_identity() {
        let citadel = lon_lat(21.00027, 52.26470);
        assert_eq!(Projection::Geographic.project(citadel), citadel);
        assert_eq!(Projection::Geographic.unproject(citadel), citadel);
    }

    #[test]
    fn projecting_into_web_mercator() {
        let citadel = lon_lat(21.00027, 52.26470);
        let projected = Projection::WebMercator.project(citadel);

        assert_relative_eq!(projected.x(), 2337739.362921259, max_relative = 1e-9);
        assert_relative_eq!(projected.y(), 6848128.847033285, max_relative = 1e-9);
    }

    #[test]
    fn project_there_and_back() {
        let citadel = lon_lat(21.00027, 52.26470);
        let calculated = Projection::WebMercator.unproject(Projection::WebMercator.project(citadel));

        assert_relative_eq!(calculated.x(), citadel.x(), max_relative = 1e-9);
        assert_relative_eq!(calculated.y(), citadel.y(), max_relative = 1e-9);
    }

    #[test]
    fn poles_are_clamped_to_the_square_world() {
        let north_pole = Projection::WebMercator.project(lon_lat(180., 90.));
        assert_relative_eq!(north_pole.x(), WEB_MERCATOR_MAX_EXTENT, max_relative = 1e-9);
        assert_relative_eq!(north_pole.y(), WEB_MERCATOR_MAX_EXTENT, max_relative = 1e-9);
        assert!(north_pole.y().is_finite());

        let south_pole = Projection::WebMercator.project(lon_lat(-180., -90.));
        assert_relative_eq!(south_pole.x(), -WEB_MERCATOR_MAX_EXTENT, max_relative = 1e-9);
        assert_relative_eq!(south_pole.y(), -WEB_MERCATOR_MAX_EXTENT, max_relative = 1e-9);
    }

    #[test]
    fn native_coordinates_beyond_the_world_are_clamped() {
        let position =
            Projection::WebMercator.unproject(Native::new(3. * WEB_MERCATOR_MAX_EXTENT, -1e12));
        assert_relative_eq!(position.x(), 180., max_relative = 1e-9);
        assert_relative_eq!(position.y(), -WEB_MERCATOR_MAX_LATITUDE, max_relative = 1e-9);
    }
}
