use crate::core::{
    bounds::Bounds,
    constants::{EARTH_RADIUS, TILE_SIZE},
    geo::{LatLng, Point},
};
use crate::traits::MapProjection;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Coordinate reference system descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    pub code: String,
    /// Infinite systems have no world bounds, so every tile index is valid
    pub infinite: bool,
    /// Longitude interval the projection wraps around, if any
    pub wrap_lng: Option<(f64, f64)>,
    /// Latitude interval the projection wraps around, if any
    pub wrap_lat: Option<(f64, f64)>,
}

impl Crs {
    /// Spherical Web Mercator, wrapping on longitude
    pub fn epsg3857() -> Self {
        Self {
            code: "EPSG:3857".to_string(),
            infinite: false,
            wrap_lng: Some((-180.0, 180.0)),
            wrap_lat: None,
        }
    }

    /// Flat plane for non-geographic maps
    pub fn simple() -> Self {
        Self {
            code: "Simple".to_string(),
            infinite: true,
            wrap_lng: None,
            wrap_lat: None,
        }
    }

    /// Pixel scale of the whole world at `zoom`
    pub fn scale(&self, zoom: f64) -> f64 {
        TILE_SIZE as f64 * 2_f64.powf(zoom)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::epsg3857()
    }
}

/// A map view: where it looks, how far in, and how big it is on screen.
///
/// This is the stock [`MapProjection`] the tile layer is driven with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: LatLng,
    /// Continuous zoom; tiles are fetched at its rounded value
    pub zoom: f64,
    /// Screen size in pixels
    pub size: Point,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub crs: Crs,
}

impl Viewport {
    /// Creates a new Web Mercator viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 18.0),
            size,
            min_zoom: 0.0,
            max_zoom: 18.0,
            crs: Crs::epsg3857(),
        }
    }

    /// Replaces the coordinate reference system
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.center = center;
    }

    /// Clamped to `min_zoom..=max_zoom`
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
    }

    /// Moves the center by a pixel offset at the current zoom
    pub fn pan(&mut self, delta: Point) {
        let center_px = self.project(&self.center, self.zoom).add(&delta);
        self.center = self.unproject(&center_px, self.zoom);
    }

    fn half_size(&self) -> Point {
        self.size.divide(2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::default(), 0.0, Point::new(800.0, 600.0))
    }
}

impl MapProjection for Viewport {
    /// Spherical Web Mercator (EPSG:3857) for geographic CRSs; identity
    /// scaled by zoom for the simple CRS
    fn project(&self, lat_lng: &LatLng, zoom: f64) -> Point {
        let scale = self.crs.scale(zoom);
        if self.crs.infinite {
            return Point::new(lat_lng.lng, -lat_lng.lat).multiply(scale / TILE_SIZE as f64);
        }

        let lat = LatLng::clamp_lat(lat_lng.lat);
        let x = lat_lng.lng.to_radians() * EARTH_RADIUS;
        let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;

        // Standard transformation: scale = 0.5 / (π * R), offset = 0.5
        let half_world = PI * EARTH_RADIUS;
        Point::new(
            (x + half_world) / (2.0 * half_world) * scale,
            (half_world - y) / (2.0 * half_world) * scale,
        )
    }

    fn unproject(&self, point: &Point, zoom: f64) -> LatLng {
        let scale = self.crs.scale(zoom);
        if self.crs.infinite {
            let p = point.multiply(TILE_SIZE as f64 / scale);
            return LatLng::new(-p.y, p.x);
        }

        let half_world = PI * EARTH_RADIUS;
        let x = point.x / scale * (2.0 * half_world) - half_world;
        let y = half_world - point.y / scale * (2.0 * half_world);

        let lng = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        LatLng::new(lat, lng)
    }

    fn pixel_origin(&self) -> Point {
        self.new_pixel_origin(&self.center, self.zoom)
    }

    fn new_pixel_origin(&self, center: &LatLng, zoom: f64) -> Point {
        self.project(center, zoom).subtract(&self.half_size()).round()
    }

    fn zoom_scale(&self, to_zoom: f64, from_zoom: f64) -> f64 {
        self.crs.scale(to_zoom) / self.crs.scale(from_zoom)
    }

    fn pixel_world_bounds(&self, zoom: f64) -> Option<Bounds> {
        if self.crs.infinite {
            return None;
        }
        let size = self.crs.scale(zoom);
        Some(Bounds::from_coords(0.0, 0.0, size, size))
    }

    fn center(&self) -> LatLng {
        self.center
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn size(&self) -> Point {
        self.size
    }

    fn crs(&self) -> &Crs {
        &self.crs
    }
}
