//! # tilegrid
//!
//! The tile-grid engine behind a slippy map layer, in the manner of Leaflet's
//! `GridLayer`.
//!
//! Given a view (center, zoom, size) the engine works out which tiles cover
//! it, where each one goes on screen, and which already loaded tiles from
//! neighbouring zooms can stand in while the exact ones are still loading.
//! Pixels are out of scope: images come from a [`TileSource`] and the
//! returned [`Frame`] is handed to whatever draws them.

pub mod core;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::{Bounds, TileRange},
    clock::{Clock, ManualClock, SystemClock},
    config::TileLayerOptions,
    geo::{LatLng, Point, TileCoord},
    viewport::{Crs, Viewport},
    wrap::{wrap_index, wrap_num},
};

pub use crate::layers::tile::{Frame, PositionedTile, TileLayer, TileSource};

pub use crate::traits::MapProjection;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Tile {key} failed to load: {reason}")]
    TileLoad { key: String, reason: String },

    #[error("URL template error: {0}")]
    UrlTemplate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Error type alias for convenience
pub type Error = MapError;
