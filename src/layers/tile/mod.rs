//! Tile layer implementation
//!
//! This module provides the tile-grid engine behind a slippy map layer:
//! - Grid geometry and per-zoom level transforms
//! - Visibility planning with greedy prefetch and backup tiles
//! - Tile load tracking with periodic housekeeping
//! - Pluggable tile sources (network, file, memory, LRU cached)

pub mod cache;
pub mod grid;
pub mod layer;
pub mod levels;
#[cfg(feature = "tokio-runtime")]
pub mod loader;
pub mod source;
pub mod tracker;
pub mod types;
pub mod visibility;

pub use cache::CachedTileSource;
pub use grid::TileGrid;
pub use layer::TileLayer;
pub use levels::LevelRegistry;
#[cfg(feature = "tokio-runtime")]
pub use loader::NetworkTileSource;
pub use source::{
    tile_url, FileTileSource, ImageCompleter, ImageHandle, ImageState, LoadEvent, MemoryTileSource,
    TileSource,
};
pub use tracker::{LoadState, SharedTracker, SweepStats, TileLoadTracker};
pub use types::{Frame, PositionedTile, Tile, TileLevel};
