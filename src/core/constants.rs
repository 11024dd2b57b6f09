//! Core constants derived from Leaflet defaults and common slippy-map conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

use std::time::Duration;

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom most public tile servers render.
pub const DEFAULT_MAX_ZOOM: i32 = 18;

/// How many tiles ahead of the pan direction are requested.
pub const DEFAULT_GREEDY_TILE_COUNT: i64 = 1;

/// Zoom offsets searched, in order, for a stand-in while a tile loads.
/// Positive values are coarser levels, negative values finer ones.
pub const DEFAULT_BACKUP_TILE_EXPANSION_STRATEGY: [i32; 5] = [1, 2, 3, -1, -2];

/// Tiles further than this many levels from the active level are never drawn.
pub const MAX_RENDER_ZOOM_DISTANCE: i32 = 1;

/// How often the load tracker is swept.
pub const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Age after which an outstanding or completed entry is forgotten (1440 minutes).
pub const DEFAULT_EVICTION_THRESHOLD: Duration = Duration::from_secs(1440 * 60);

/// Web Mercator latitude limit.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Sphere radius used by spherical Web Mercator (EPSG:3857).
pub const EARTH_RADIUS: f64 = 6_378_137.0;
