//! Viewport grid calculator: pixel bounds, tile ranges and wrap ranges

use crate::core::{
    bounds::{Bounds, TileRange},
    config::TileLayerOptions,
    geo::{LatLng, Point, TileCoord},
    viewport::Crs,
    wrap::wrap_index,
};
use crate::traits::MapProjection;

/// Grid state for the current tile zoom
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileGrid {
    pub tile_zoom: Option<i32>,
    /// Every tile index that exists at `tile_zoom`; `None` for infinite CRSs
    pub global_tile_range: Option<TileRange>,
    pub wrap_x: Option<(i64, i64)>,
    pub wrap_y: Option<(i64, i64)>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integer tile zoom for a continuous view zoom, clamped to the
    /// configured range. Non-finite zooms have no tile zoom.
    pub fn tile_zoom_for(zoom: f64, options: &TileLayerOptions) -> Option<i32> {
        if !zoom.is_finite() {
            return None;
        }
        let clamped = zoom.clamp(options.min_zoom as f64, options.max_zoom as f64);
        Some(clamped.round() as i32)
    }

    /// Recomputes the global tile range and wrap ranges for `tile_zoom`
    pub fn reset_grid(&mut self, map: &dyn MapProjection, tile_zoom: i32, tile_size: &Point) {
        let zoom = tile_zoom as f64;
        let crs = map.crs();

        self.tile_zoom = Some(tile_zoom);
        self.global_tile_range = map
            .pixel_world_bounds(zoom)
            .map(|bounds| Self::pixel_bounds_to_tile_range(&bounds, tile_size));

        self.wrap_x = crs.wrap_lng.map(|(west, east)| {
            let low = map.project(&LatLng::new(0.0, west), zoom).x / tile_size.x;
            let high = map.project(&LatLng::new(0.0, east), zoom).x / tile_size.x;
            ordered(low.floor() as i64, high.ceil() as i64)
        });
        self.wrap_y = crs.wrap_lat.map(|(south, north)| {
            let low = map.project(&LatLng::new(south, 0.0), zoom).y / tile_size.y;
            let high = map.project(&LatLng::new(north, 0.0), zoom).y / tile_size.y;
            ordered(low.min(high).floor() as i64, low.max(high).ceil() as i64)
        });

        log::debug!(
            "grid reset at zoom {}: global {:?}, wrap x {:?}, wrap y {:?}",
            tile_zoom,
            self.global_tile_range,
            self.wrap_x,
            self.wrap_y
        );
    }

    /// Pixel bounds of the view around `center` at `zoom`, expressed in
    /// world pixels of the current tile zoom
    pub fn tiled_pixel_bounds(
        &self,
        map: &dyn MapProjection,
        center: &LatLng,
        zoom: f64,
    ) -> Option<Bounds> {
        let tile_zoom = self.tile_zoom? as f64;
        let scale = map.zoom_scale(zoom, tile_zoom);
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        let pixel_center = map.project(center, tile_zoom).floor();
        let half_size = map.size().divide(scale * 2.0);
        Some(Bounds::new(
            pixel_center.subtract(&half_size),
            pixel_center.add(&half_size),
        ))
    }

    /// Inclusive range of tiles touching `bounds`
    pub fn pixel_bounds_to_tile_range(bounds: &Bounds, tile_size: &Point) -> TileRange {
        let min = bounds.min.unscale_by(tile_size).floor();
        let max = bounds.max.unscale_by(tile_size).ceil();
        let max_x = (max.x as i64 - 1).max(min.x as i64);
        let max_y = (max.y as i64 - 1).max(min.y as i64);
        TileRange::new(min.x as i64, min.y as i64, max_x, max_y)
    }

    /// Finite CRSs only have tiles inside the world, except along axes
    /// that wrap
    pub fn is_valid_tile(&self, coords: &TileCoord, crs: &Crs) -> bool {
        if crs.infinite {
            return true;
        }
        let Some(range) = self.global_tile_range else {
            return true;
        };
        let outside_x = coords.x < range.min_x || coords.x > range.max_x;
        let outside_y = coords.y < range.min_y || coords.y > range.max_y;
        !(crs.wrap_lng.is_none() && outside_x) && !(crs.wrap_lat.is_none() && outside_y)
    }

    /// Folds `coords` back into the wrap ranges
    pub fn wrap_coords(&self, coords: &TileCoord) -> TileCoord {
        TileCoord::new(
            self.wrap_x.map_or(coords.x, |range| wrap_index(coords.x, range)),
            self.wrap_y.map_or(coords.y, |range| wrap_index(coords.y, range)),
            coords.z,
        )
    }
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    (a.min(b), a.max(b))
}
