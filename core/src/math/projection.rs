use serde::{Deserialize, Serialize};

use crate::math::vector::Vec2;

/// Axis-aligned longitude/latitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Approximate extent of San Francisco, used to filter and project calls.
pub const SF_BOUNDS: GeoBounds = GeoBounds {
    min_lon: -122.52,
    max_lon: -122.36,
    min_lat: 37.70,
    max_lat: 37.83,
};

impl GeoBounds {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }
}

pub struct GeoProjector;

impl GeoProjector {
    /// Linear map of a coordinate onto a `width` x `height` surface.
    ///
    /// Latitude is inverted: `max_lat` lands on y = 0. Points outside
    /// `bounds` project outside the surface.
    pub fn project(lon: f64, lat: f64, bounds: &GeoBounds, width: f32, height: f32) -> Vec2 {
        let lon_span = bounds.max_lon - bounds.min_lon;
        let lat_span = bounds.max_lat - bounds.min_lat;
        let tx = if lon_span != 0.0 {
            (lon - bounds.min_lon) / lon_span
        } else {
            0.0
        };
        let ty = if lat_span != 0.0 {
            (bounds.max_lat - lat) / lat_span
        } else {
            0.0
        };
        Vec2::new(
            (tx * f64::from(width)) as f32,
            (ty * f64::from(height)) as f32,
        )
    }
}
