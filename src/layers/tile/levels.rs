//! Per-zoom level registry

use std::collections::BTreeMap;

use super::types::{Tile, TileLevel};
use crate::core::geo::LatLng;
use crate::traits::MapProjection;

/// Every level the layer has used so far, keyed by integer zoom.
///
/// Levels are created lazily and kept for the lifetime of the layer.
#[derive(Debug, Clone, Default)]
pub struct LevelRegistry {
    levels: BTreeMap<i32, TileLevel>,
    active_zoom: Option<i32>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, zoom: i32) -> Option<&TileLevel> {
        self.levels.get(&zoom)
    }

    /// Level of the current tile zoom
    pub fn active(&self) -> Option<&TileLevel> {
        self.active_zoom.and_then(|zoom| self.levels.get(&zoom))
    }

    pub fn active_zoom(&self) -> Option<i32> {
        self.active_zoom
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileLevel> {
        self.levels.values()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Makes `tile_zoom` the active level, creating it if needed, and
    /// re-ranks every other level by its distance from it.
    pub fn update_levels(
        &mut self,
        map: &dyn MapProjection,
        tile_zoom: i32,
        max_zoom: i32,
    ) -> &TileLevel {
        for (zoom, level) in self.levels.iter_mut() {
            level.z_index = max_zoom - (tile_zoom - zoom).abs();
            level.active = *zoom == tile_zoom || level.children > 0;
        }
        self.active_zoom = Some(tile_zoom);

        let level = self.create_if_missing(map, tile_zoom, max_zoom);
        level.active = true;
        level
    }

    /// Returns the level for `zoom`, creating it with the view's current
    /// transform when it does not exist yet.
    pub fn ensure_level(
        &mut self,
        map: &dyn MapProjection,
        zoom: i32,
        max_zoom: i32,
    ) -> &TileLevel {
        let active = self.active_zoom;
        let level = self.create_if_missing(map, zoom, max_zoom);
        if let Some(active) = active {
            level.z_index = max_zoom - (active - zoom).abs();
        }
        level
    }

    /// Reapplies the zoom transform to every tracked level
    pub fn set_zoom_transforms(&mut self, map: &dyn MapProjection, center: &LatLng, zoom: f64) {
        for level in self.levels.values_mut() {
            level.set_zoom_transform(map, center, zoom);
        }
    }

    /// Recounts how many of `tiles` each level hosts
    pub fn update_children(&mut self, tiles: &[Tile]) {
        for level in self.levels.values_mut() {
            level.children = 0;
        }
        for tile in tiles {
            if let Some(level) = self.levels.get_mut(&tile.coords.z) {
                level.children += 1;
            }
        }
        let active = self.active_zoom;
        for level in self.levels.values_mut() {
            level.active = Some(level.zoom) == active || level.children > 0;
        }
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.active_zoom = None;
    }

    fn create_if_missing(
        &mut self,
        map: &dyn MapProjection,
        zoom: i32,
        max_zoom: i32,
    ) -> &mut TileLevel {
        self.levels.entry(zoom).or_insert_with(|| {
            let mut level = TileLevel::new(zoom);
            let anchor = map.unproject(&map.pixel_origin(), map.zoom());
            let origin = map.project(&anchor, zoom as f64).round();
            level.origin = (origin.x.is_finite() && origin.y.is_finite()).then_some(origin);
            level.z_index = max_zoom;
            level.set_zoom_transform(map, &map.center(), map.zoom());
            log::debug!("created tile level {} with origin {:?}", zoom, level.origin);
            level
        })
    }
}
