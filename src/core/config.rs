//! Configuration surface of the tile layer
//!
//! Options are plain serde data so that hosts can keep them in JSON next to
//! the rest of their map setup. Decoding goes through
//! [`TileLayerOptions::from_json`] / [`TileLayerOptions::from_value`], which
//! also validate; anything that is not a well-formed options object is an
//! [`MapError::InvalidOptions`] and is never retried.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    DEFAULT_BACKUP_TILE_EXPANSION_STRATEGY, DEFAULT_EVICTION_THRESHOLD,
    DEFAULT_GREEDY_TILE_COUNT, DEFAULT_HOUSEKEEPING_INTERVAL, DEFAULT_MAX_ZOOM, TILE_SIZE,
};
use crate::{MapError, Result};

/// RGBA colour painted behind the tiles
pub type Rgba = [u8; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TileLayerOptions {
    /// Tile URL pattern with `{x}`, `{y}`, `{z}` and `{s}` placeholders
    pub url_template: String,
    /// Flip row numbering (TMS services count rows from the south)
    pub tms: bool,
    pub tile_size: u32,
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// Request `max_zoom - z` instead of `z`
    pub zoom_reverse: bool,
    /// Added to the zoom used in tile URLs
    pub zoom_offset: i32,
    /// Round-robin values for the `{s}` placeholder
    pub subdomains: Vec<String>,
    pub background_color: Option<Rgba>,
    pub opacity: f32,
    /// Static substitutions into the URL template
    pub additional_options: BTreeMap<String, String>,
    /// Tiles requested ahead of the pan direction
    pub greedy_tile_count: i64,
    /// Ordered zoom offsets searched for a stand-in tile while one loads
    pub backup_tile_expansion_strategy: Vec<i32>,
    pub housekeeping_interval_minutes: u64,
    pub eviction_threshold_minutes: u64,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            tms: false,
            tile_size: TILE_SIZE,
            min_zoom: 0,
            max_zoom: DEFAULT_MAX_ZOOM,
            zoom_reverse: false,
            zoom_offset: 0,
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            background_color: None,
            opacity: 1.0,
            additional_options: BTreeMap::new(),
            greedy_tile_count: DEFAULT_GREEDY_TILE_COUNT,
            backup_tile_expansion_strategy: DEFAULT_BACKUP_TILE_EXPANSION_STRATEGY.to_vec(),
            housekeeping_interval_minutes: DEFAULT_HOUSEKEEPING_INTERVAL.as_secs() / 60,
            eviction_threshold_minutes: DEFAULT_EVICTION_THRESHOLD.as_secs() / 60,
        }
    }
}

impl TileLayerOptions {
    /// Standard OpenStreetMap raster tiles
    pub fn openstreetmap() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            max_zoom: 19,
            ..Self::default()
        }
    }

    /// Decodes and validates options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Decodes and validates options from an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(MapError::InvalidOptions(format!(
                "expected tile layer options object, got {}",
                value
            )));
        }
        let options: Self = serde_json::from_value(value)
            .map_err(|e| MapError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects option combinations the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(MapError::InvalidOptions("tile_size must be positive".into()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(MapError::InvalidOptions(format!(
                "min_zoom {} is above max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(MapError::InvalidOptions(format!(
                "opacity {} is outside 0..=1",
                self.opacity
            )));
        }
        if self.greedy_tile_count < 0 {
            return Err(MapError::InvalidOptions(
                "greedy_tile_count cannot be negative".into(),
            ));
        }
        if self.eviction_threshold_minutes == 0 || self.housekeeping_interval_minutes == 0 {
            return Err(MapError::InvalidOptions(
                "housekeeping interval and eviction threshold must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn with_url_template(mut self, url_template: impl Into<String>) -> Self {
        self.url_template = url_template.into();
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: i32, max_zoom: i32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_tms(mut self, tms: bool) -> Self {
        self.tms = tms;
        self
    }

    pub fn with_subdomains<S: Into<String>>(
        mut self,
        subdomains: impl IntoIterator<Item = S>,
    ) -> Self {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_additional_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.additional_options.insert(key.into(), value.into());
        self
    }

    pub fn with_greedy_tile_count(mut self, count: i64) -> Self {
        self.greedy_tile_count = count;
        self
    }

    pub fn with_backup_strategy(mut self, strategy: impl Into<Vec<i32>>) -> Self {
        self.backup_tile_expansion_strategy = strategy.into();
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_background_color(mut self, color: Rgba) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_minutes.saturating_mul(60))
    }

    pub fn eviction_threshold(&self) -> Duration {
        Duration::from_secs(self.eviction_threshold_minutes.saturating_mul(60))
    }

    /// Tile edge length as a point
    pub fn tile_size_point(&self) -> crate::core::geo::Point {
        crate::core::geo::Point::new(self.tile_size as f64, self.tile_size as f64)
    }
}
