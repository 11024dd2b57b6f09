use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use super::source::{ImageHandle, ImageState, TileSource};
use crate::core::{config::TileLayerOptions, geo::TileCoord};

const DEFAULT_CAPACITY: usize = 1024;

type SharedLru = Arc<Mutex<LruCache<TileCoord, Arc<Vec<u8>>>>>;

/// In-memory tile cache using LRU eviction, placed in front of another source.
///
/// Hits settle the returned handle immediately; misses are forwarded and the
/// bytes are kept once the inner source delivers them.
pub struct CachedTileSource<S> {
    inner: S,
    cache: SharedLru,
}

impl<S: TileSource> CachedTileSource<S> {
    /// Wrap `inner` with a cache of the given capacity
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Wrap `inner` with the default capacity (1024 tiles)
    pub fn with_default_capacity(inner: S) -> Self {
        Self::new(inner, DEFAULT_CAPACITY)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Check if a tile is in the cache
    pub fn contains(&self, coords: &TileCoord) -> bool {
        self.lock().contains(coords)
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Clear all tiles from the cache
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<TileCoord, Arc<Vec<u8>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: TileSource> TileSource for CachedTileSource<S> {
    fn fetch(&self, coords: TileCoord, options: &TileLayerOptions) -> ImageHandle {
        if let Some(data) = self.lock().get(&coords).cloned() {
            log::debug!("tile {} served from cache", coords);
            return ImageHandle::ready(coords, data);
        }

        let handle = self.inner.fetch(coords, options);
        let cache = self.cache.clone();
        handle.on_settled(move |coords, state| {
            if let ImageState::Ready(data) = state {
                cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .put(*coords, data.clone());
            }
        });
        handle
    }

    fn dispose(&self) {
        log::debug!("disposing cache of {} tiles", self.len());
        self.clear();
        self.inner.dispose();
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
