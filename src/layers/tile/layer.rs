//! Core TileLayer implementation
//!
//! The layer is passive: the host calls [`TileLayer::on_viewport_changed`]
//! whenever the view moves and draws the returned [`Frame`]. Image loads run
//! elsewhere and report back through a crossbeam channel that is drained at
//! the start of every frame (or on demand via
//! [`TileLayer::process_load_events`]).

use std::sync::{Arc, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use instant::Instant;

use super::{
    grid::TileGrid,
    levels::LevelRegistry,
    source::{ImageHandle, LoadEvent, TileSource},
    tracker::{LoadState, SharedTracker, SweepStats, TileLoadTracker},
    types::{Frame, PositionedTile, Tile},
    visibility::{plan_tiles, PlanRequest},
};
use crate::{
    core::{
        bounds::Bounds,
        clock::{Clock, SystemClock},
        config::TileLayerOptions,
        geo::{LatLng, Point, TileCoord},
    },
    prelude::{HashMap, HashSet},
    runtime::{spawn_repeating, AsyncHandle},
    traits::MapProjection,
    Result,
};

/// The view a plan was built for
#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewKey {
    center: LatLng,
    zoom: f64,
    size: Point,
}

pub struct TileLayer {
    options: TileLayerOptions,
    source: Box<dyn TileSource>,
    tracker: SharedTracker,
    clock: Arc<dyn Clock>,
    levels: LevelRegistry,
    grid: TileGrid,
    previous_center: Option<LatLng>,

    last_view: Option<ViewKey>,
    planned_revision: Option<u64>,
    last_plan: Vec<Tile>,

    /// Image handles keyed by wrapped tile coordinates
    images: HashMap<TileCoord, ImageHandle>,
    events_tx: Sender<LoadEvent>,
    events_rx: Receiver<LoadEvent>,

    last_sweep: Instant,
    housekeeper: Option<Box<dyn AsyncHandle>>,
    disposed: bool,
}

impl TileLayer {
    /// Create a new tile layer on the wall clock
    pub fn new(options: TileLayerOptions, source: Box<dyn TileSource>) -> Result<Self> {
        Self::with_clock(options, source, Arc::new(SystemClock))
    }

    /// Create a tile layer from loosely typed options, e.g. parsed JSON
    pub fn from_value(options: serde_json::Value, source: Box<dyn TileSource>) -> Result<Self> {
        Self::new(TileLayerOptions::from_value(options)?, source)
    }

    /// Create a tile layer with an injected clock
    pub fn with_clock(
        options: TileLayerOptions,
        source: Box<dyn TileSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        options.validate()?;

        let tracker = TileLoadTracker::with_threshold(clock.clone(), options.eviction_threshold())
            .into_shared();
        let weak = Arc::downgrade(&tracker);
        let housekeeper = spawn_repeating(options.housekeeping_interval(), move || {
            if let Some(tracker) = weak.upgrade() {
                lock(&tracker).housekeep();
            }
        });
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        log::debug!(
            "tile layer created with {} source, housekeeping {}",
            source.name(),
            if housekeeper.is_some() { "on a timer" } else { "on view changes" }
        );

        Ok(Self {
            last_sweep: clock.now(),
            options,
            source,
            tracker,
            clock,
            levels: LevelRegistry::new(),
            grid: TileGrid::new(),
            previous_center: None,
            last_view: None,
            planned_revision: None,
            last_plan: Vec::new(),
            images: HashMap::default(),
            events_tx,
            events_rx,
            housekeeper,
            disposed: false,
        })
    }

    pub fn options(&self) -> &TileLayerOptions {
        &self.options
    }

    pub fn tracker(&self) -> SharedTracker {
        self.tracker.clone()
    }

    pub fn levels(&self) -> &LevelRegistry {
        &self.levels
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn tile_zoom(&self) -> Option<i32> {
        self.grid.tile_zoom
    }

    /// Whether housekeeping runs on a background timer
    pub fn has_housekeeping_task(&self) -> bool {
        self.housekeeper.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Image handle currently held for wrapped tile coordinates
    pub fn image(&self, image_coords: &TileCoord) -> Option<&ImageHandle> {
        self.images.get(image_coords)
    }

    /// Main update method: recomputes grid state for the new view, requests
    /// the images it needs and returns what to draw, back to front.
    pub fn on_viewport_changed(
        &mut self,
        map: &dyn MapProjection,
        center: LatLng,
        zoom: f64,
    ) -> Frame {
        if self.disposed {
            return self.frame(None, Vec::new());
        }

        self.process_load_events();
        self.housekeep_if_due();

        let Some(tile_zoom) = self.set_view(map, &center, zoom) else {
            return self.frame(None, Vec::new());
        };

        let view = ViewKey {
            center,
            zoom,
            size: map.size(),
        };
        let revision = lock(&self.tracker).revision();
        if self.last_view != Some(view) || self.planned_revision != Some(revision) {
            let plan = self.plan(map, &center, zoom, tile_zoom);
            self.request_images(&plan);
            self.levels.update_children(&plan);

            self.previous_center = Some(center);
            self.last_view = Some(view);
            self.planned_revision = Some(lock(&self.tracker).revision());
            self.last_plan = plan;
        }

        let tiles = self.position_tiles();
        self.frame(Some(tile_zoom), tiles)
    }

    /// Applies every queued load result to the tracker; returns how many
    /// were applied
    pub fn process_load_events(&mut self) -> usize {
        let events: Vec<LoadEvent> = self.events_rx.try_iter().collect();
        if events.is_empty() {
            return 0;
        }

        let mut tracker = lock(&self.tracker);
        for event in &events {
            match event {
                LoadEvent::Loaded(coords) => tracker.complete_load(*coords),
                LoadEvent::Failed(coords, reason) => tracker.fail_load(*coords, reason),
            }
        }
        events.len()
    }

    /// Forces a housekeeping sweep
    pub fn housekeep(&mut self) -> SweepStats {
        self.last_sweep = self.clock.now();
        lock(&self.tracker).housekeep()
    }

    /// Screen rectangle of any tile whose zoom has a level, on screen or not
    pub fn tile_screen_rect(&self, coords: &TileCoord) -> Option<Bounds> {
        self.levels
            .get(coords.z)?
            .tile_rect(coords, &self.options.tile_size_point())
    }

    /// Stops housekeeping and releases the source's resources
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(housekeeper) = self.housekeeper.take() {
            housekeeper.cancel();
        }
        self.source.dispose();
        self.images.clear();
        self.last_plan.clear();
        lock(&self.tracker).clear();
        log::debug!("tile layer disposed");
    }

    fn set_view(&mut self, map: &dyn MapProjection, center: &LatLng, zoom: f64) -> Option<i32> {
        let tile_zoom = TileGrid::tile_zoom_for(zoom, &self.options)?;

        if self.grid.tile_zoom != Some(tile_zoom) {
            log::debug!("tile zoom {:?} -> {}", self.grid.tile_zoom, tile_zoom);
            self.levels.update_levels(map, tile_zoom, self.options.max_zoom);
            self.grid.reset_grid(map, tile_zoom, &self.options.tile_size_point());
        }
        self.levels.set_zoom_transforms(map, center, zoom);
        Some(tile_zoom)
    }

    fn plan(
        &mut self,
        map: &dyn MapProjection,
        center: &LatLng,
        zoom: f64,
        tile_zoom: i32,
    ) -> Vec<Tile> {
        let Some(bounds) = self.grid.tiled_pixel_bounds(map, center, zoom) else {
            return Vec::new();
        };
        let range = TileGrid::pixel_bounds_to_tile_range(&bounds, &self.options.tile_size_point());
        let request = PlanRequest {
            range,
            tile_zoom,
            previous_center: self.previous_center,
            center: *center,
            greedy_tile_count: self.options.greedy_tile_count,
            strategy: &self.options.backup_tile_expansion_strategy,
            max_zoom: self.options.max_zoom,
            grid: &self.grid,
            crs: map.crs(),
        };
        let plan = plan_tiles(&request, &*lock(&self.tracker));

        // backups may come from zooms that never were active
        let known = self.levels.len();
        for tile in plan.iter().filter(|tile| tile.coords.z != tile_zoom) {
            self.levels.ensure_level(map, tile.coords.z, self.options.max_zoom);
        }
        if self.levels.len() != known {
            self.levels.set_zoom_transforms(map, center, zoom);
        }
        plan
    }

    /// Starts loads for planned tiles the tracker knows nothing about.
    ///
    /// Handles live as long as the tracker holds an entry for their tile, so
    /// a completed tile that scrolls back into view is drawn from its handle
    /// and a failed one waits for housekeeping to forget it.
    fn request_images(&mut self, plan: &[Tile]) {
        let wanted: Vec<TileCoord> = {
            let mut tracker = lock(&self.tracker);
            let mut wanted = Vec::new();
            for coords in plan.iter().map(|tile| tile.image_coords) {
                if wanted.contains(&coords) || !needs_fetch(&tracker, &self.images, &coords) {
                    continue;
                }
                tracker.begin_load(coords);
                wanted.push(coords);
            }
            wanted
        };

        for coords in wanted {
            let handle = self.source.fetch(coords, &self.options);
            handle.watch(self.events_tx.clone());
            self.images.insert(coords, handle);
        }

        let planned: HashSet<TileCoord> = plan.iter().map(|tile| tile.image_coords).collect();
        let tracker = lock(&self.tracker);
        self.images.retain(|coords, handle| {
            planned.contains(coords)
                || handle.is_pending()
                || tracker.is_outstanding(coords)
                || tracker.is_completed(coords)
        });
    }

    fn position_tiles(&self) -> Vec<PositionedTile> {
        let tile_size = self.options.tile_size_point();
        self.last_plan
            .iter()
            .filter_map(|tile| {
                let rect = self
                    .levels
                    .get(tile.coords.z)?
                    .tile_rect(&tile.coords, &tile_size)?;
                let image = self.images.get(&tile.image_coords)?.clone();
                Some(PositionedTile {
                    coords: tile.coords,
                    image_coords: tile.image_coords,
                    position: rect.min,
                    width: rect.width(),
                    height: rect.height(),
                    placeholder: !image.is_ready(),
                    image,
                    is_current: tile.is_current,
                })
            })
            .collect()
    }

    fn housekeep_if_due(&mut self) {
        if self.housekeeper.is_some() {
            return;
        }
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_sweep) >= self.options.housekeeping_interval() {
            self.housekeep();
        }
    }

    fn frame(&self, tile_zoom: Option<i32>, tiles: Vec<PositionedTile>) -> Frame {
        Frame {
            tile_zoom,
            tiles,
            opacity: self.options.opacity,
            background_color: self.options.background_color,
        }
    }
}

impl Drop for TileLayer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TileLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLayer")
            .field("source", &self.source.name())
            .field("tile_zoom", &self.grid.tile_zoom)
            .field("levels", &self.levels.len())
            .field("images", &self.images.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Outstanding tiles never get a second request before eviction; completed
/// ones only when their handle is gone.
fn needs_fetch(
    tracker: &TileLoadTracker,
    images: &HashMap<TileCoord, ImageHandle>,
    coords: &TileCoord,
) -> bool {
    if tracker.is_outstanding(coords) {
        return false;
    }
    !tracker.is_completed(coords) || !images.contains_key(coords)
}

fn lock(tracker: &SharedTracker) -> MutexGuard<'_, TileLoadTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}
