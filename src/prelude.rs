//! Prelude module for common tilegrid types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tilegrid::prelude::*;`

pub use crate::core::{
    bounds::{Bounds, TileRange},
    clock::{Clock, ManualClock, SystemClock},
    config::{Rgba, TileLayerOptions},
    geo::{LatLng, Point, TileCoord},
    viewport::{Crs, Viewport},
};

pub use crate::layers::tile::{
    CachedTileSource, FileTileSource, Frame, ImageHandle, LoadEvent, MemoryTileSource,
    PositionedTile, TileLayer, TileSource,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::layers::tile::NetworkTileSource;

pub use crate::traits::MapProjection;

pub use crate::{Error as MapError, Result};

pub use std::{sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
