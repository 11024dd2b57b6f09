//! Core data types for tile layer functionality

use crate::{
    core::{
        bounds::Bounds,
        config::Rgba,
        geo::{LatLng, Point, TileCoord},
    },
    layers::tile::source::ImageHandle,
    traits::MapProjection,
};

/// Per-zoom transform state.
///
/// One level exists for every integer zoom that has been active (or has
/// hosted a backup tile). Its transform is refreshed on every view change,
/// not only while it is active, so that a level still on screen during a
/// zoom transition stays correctly positioned.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLevel {
    pub zoom: i32,
    /// World pixel origin captured when the level was created
    pub origin: Option<Point>,
    pub scale: f64,
    pub translate_point: Point,
    /// Draw priority; levels nearer the active zoom get larger values
    pub z_index: i32,
    /// Tiles of this level placed in the most recent frame
    pub children: usize,
    /// Active levels are the current zoom or still have tiles on screen
    pub active: bool,
}

impl TileLevel {
    pub fn new(zoom: i32) -> Self {
        Self {
            zoom,
            origin: None,
            scale: 1.0,
            translate_point: Point::new(0.0, 0.0),
            z_index: 0,
            children: 0,
            active: false,
        }
    }

    /// Recomputes `scale` and `translate_point` for a view centered on
    /// `center` at `zoom`. Levels without an origin are left untouched.
    pub fn set_zoom_transform(&mut self, map: &dyn MapProjection, center: &LatLng, zoom: f64) {
        let Some(origin) = self.origin else {
            return;
        };
        let scale = map.zoom_scale(zoom, self.zoom as f64);
        let pixel_origin = map.new_pixel_origin(center, zoom).round();

        self.translate_point = origin.multiply(scale).subtract(&pixel_origin);
        self.scale = scale;
    }

    /// Screen rectangle of `coords` under this level's transform
    pub fn tile_rect(&self, coords: &TileCoord, tile_size: &Point) -> Option<Bounds> {
        let origin = self.origin?;
        let tile_pos = coords.scale_by(tile_size).subtract(&origin);
        let min = tile_pos.multiply(self.scale).add(&self.translate_point);
        Some(Bounds::new(min, min.add(&tile_size.multiply(self.scale))))
    }
}

/// A tile chosen for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    /// Grid position, used for placement on screen
    pub coords: TileCoord,
    /// Wrapped position, used to fetch and track the image
    pub image_coords: TileCoord,
    /// `true` for tiles of the live range, `false` for stand-ins
    pub is_current: bool,
}

impl Tile {
    pub fn new(coords: TileCoord, image_coords: TileCoord, is_current: bool) -> Self {
        Self {
            coords,
            image_coords,
            is_current,
        }
    }
}

/// A tile ready to be drawn
#[derive(Debug, Clone)]
pub struct PositionedTile {
    pub coords: TileCoord,
    pub image_coords: TileCoord,
    /// Top-left corner in screen pixels
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub image: ImageHandle,
    /// The image has not arrived yet; draw a placeholder instead
    pub placeholder: bool,
    pub is_current: bool,
}

/// Ordered draw list for one frame
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub tile_zoom: Option<i32>,
    /// Back to front
    pub tiles: Vec<PositionedTile>,
    pub opacity: f32,
    pub background_color: Option<Rgba>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Tiles belonging to the live range
    pub fn current(&self) -> impl Iterator<Item = &PositionedTile> {
        self.tiles.iter().filter(|tile| tile.is_current)
    }

    /// Stand-in tiles drawn while the live ones load
    pub fn backups(&self) -> impl Iterator<Item = &PositionedTile> {
        self.tiles.iter().filter(|tile| !tile.is_current)
    }

    pub fn find(&self, coords: &TileCoord) -> Option<&PositionedTile> {
        self.tiles.iter().find(|tile| tile.coords == *coords)
    }
}
