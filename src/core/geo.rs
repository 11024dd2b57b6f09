use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::constants::MAX_LATITUDE;
use crate::MapError;

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude within ±90 and longitude within ±180
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    /// Scales both components by `scalar`
    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    /// Divides both components by `scalar`
    pub fn divide(&self, scalar: f64) -> Point {
        Point::new(self.x / scalar, self.y / scalar)
    }

    /// Component-wise multiplication
    pub fn scale_by(&self, other: &Point) -> Point {
        Point::new(self.x * other.x, self.y * other.y)
    }

    /// Component-wise division
    pub fn unscale_by(&self, other: &Point) -> Point {
        Point::new(self.x / other.x, self.y / other.y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn floor(&self) -> Point {
        Point::new(self.x.floor(), self.y.floor())
    }

    pub fn ceil(&self) -> Point {
        Point::new(self.x.ceil(), self.y.ceil())
    }

    pub fn round(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Identifies one tile of the grid: column, row and integer zoom.
///
/// Equality and hashing are by value, so the coordinate itself is the
/// lookup key everywhere. Its textual form (`"x:y:z"`) is produced by
/// [`TileCoord::key`] and parsed back with [`str::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub z: i32,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Canonical `"x:y:z"` key
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Column/row as a point, ignoring zoom
    pub fn as_point(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }

    /// Euclidean distance between the tile index and `point`, used to order
    /// tiles from the middle of the viewport outwards
    pub fn distance_to(&self, point: &Point) -> f64 {
        self.as_point().distance_to(point)
    }

    /// North-west corner of the tile in world pixels at its own zoom
    pub fn scale_by(&self, tile_size: &Point) -> Point {
        self.as_point().scale_by(tile_size)
    }

    /// Tile one zoom coarser that contains this one
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z <= 0 {
            None
        } else {
            Some(TileCoord::new(self.x.div_euclid(2), self.y.div_euclid(2), self.z - 1))
        }
    }

    /// Gets the four child tiles at the next zoom level
    pub fn children(&self) -> [TileCoord; 4] {
        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        [
            TileCoord::new(x, y, z),
            TileCoord::new(x + 1, y, z),
            TileCoord::new(x, y + 1, z),
            TileCoord::new(x + 1, y + 1, z),
        ]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

impl FromStr for TileCoord {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let mut next = |name: &str| {
            parts
                .next()
                .ok_or_else(|| {
                    MapError::ParseError(format!("tile key '{}' is missing {}", s, name))
                })
        };
        let x = next("x")?;
        let y = next("y")?;
        let z = next("z")?;
        if parts.next().is_some() {
            return Err(MapError::ParseError(format!("tile key '{}' has extra fields", s)));
        }

        let bad = |_| MapError::ParseError(format!("tile key '{}' is not numeric", s));
        Ok(Self::new(
            x.parse().map_err(bad)?,
            y.parse().map_err(bad)?,
            z.parse().map_err(bad)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(40.7128, -74.0060);
        assert_eq!(coord.lat, 40.7128);
        assert_eq!(coord.lng, -74.0060);
        assert!(coord.is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
    }

    #[test]
    fn test_point_rounding() {
        let p = Point::new(1.5, -1.5);
        assert_eq!(p.floor(), Point::new(1.0, -2.0));
        assert_eq!(p.ceil(), Point::new(2.0, -1.0));
        assert_eq!(p.round(), Point::new(2.0, -2.0));
    }

    #[test]
    fn test_point_scaling() {
        let p = Point::new(512.0, 768.0);
        let size = Point::new(256.0, 256.0);
        assert_eq!(p.unscale_by(&size), Point::new(2.0, 3.0));
        assert_eq!(p.unscale_by(&size).scale_by(&size), p);
        assert_eq!(p.multiply(0.5), Point::new(256.0, 384.0));
        assert_eq!(p.subtract(&size), Point::new(256.0, 512.0));
    }

    #[test]
    fn test_tile_key_format() {
        let coord = TileCoord::new(50, 50, 9);
        assert_eq!(coord.key(), "50:50:9");
        assert_eq!("50:50:9".parse::<TileCoord>().unwrap(), coord);
        assert_eq!("-3:4:2".parse::<TileCoord>().unwrap(), TileCoord::new(-3, 4, 2));
    }

    #[test]
    fn test_tile_key_rejects_garbage() {
        assert!("1:2".parse::<TileCoord>().is_err());
        assert!("1:2:3:4".parse::<TileCoord>().is_err());
        assert!("a:2:3".parse::<TileCoord>().is_err());
    }

    #[test]
    fn test_tile_parent_and_children() {
        let coord = TileCoord::new(101, 100, 10);
        assert_eq!(coord.parent(), Some(TileCoord::new(50, 50, 9)));
        assert!(coord.children().iter().all(|c| c.parent() == Some(coord)));
        assert_eq!(TileCoord::new(0, 0, 0).parent(), None);
    }
}
