//! Image collaborator: where tile pixels come from
//!
//! A [`TileSource`] turns tile coordinates into an [`ImageHandle`]
//! immediately and settles it later, from whatever thread does the work.
//! The layer watches each handle through a crossbeam channel and moves the
//! tile through its load lifecycle when the handle settles. Results that
//! arrive after the layer stopped caring are simply ignored.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::Sender;

use crate::core::{config::TileLayerOptions, geo::TileCoord};
use crate::prelude::HashMap;
use crate::{MapError, Result};

/// Settlement notification delivered to watchers of an [`ImageHandle`]
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Loaded(TileCoord),
    Failed(TileCoord, String),
}

impl LoadEvent {
    pub fn coords(&self) -> TileCoord {
        match self {
            LoadEvent::Loaded(coords) | LoadEvent::Failed(coords, _) => *coords,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageState {
    Pending,
    Ready(Arc<Vec<u8>>),
    Failed(String),
}

type SettleCallback = Box<dyn FnOnce(&TileCoord, &ImageState) + Send>;

struct HandleInner {
    state: ImageState,
    callbacks: Vec<SettleCallback>,
}

/// Shared slot for one requested tile image
#[derive(Clone)]
pub struct ImageHandle {
    coords: TileCoord,
    inner: Arc<Mutex<HandleInner>>,
}

impl ImageHandle {
    /// Creates an unsettled handle together with the completer that settles it
    pub fn pending(coords: TileCoord) -> (ImageHandle, ImageCompleter) {
        let handle = ImageHandle {
            coords,
            inner: Arc::new(Mutex::new(HandleInner {
                state: ImageState::Pending,
                callbacks: Vec::new(),
            })),
        };
        let completer = ImageCompleter {
            coords,
            inner: Some(handle.inner.clone()),
        };
        (handle, completer)
    }

    pub fn ready(coords: TileCoord, data: Arc<Vec<u8>>) -> ImageHandle {
        let (handle, completer) = Self::pending(coords);
        completer.resolve_shared(data);
        handle
    }

    pub fn failed(coords: TileCoord, reason: impl Into<String>) -> ImageHandle {
        let (handle, completer) = Self::pending(coords);
        completer.reject(reason);
        handle
    }

    pub fn coords(&self) -> TileCoord {
        self.coords
    }

    pub fn state(&self) -> ImageState {
        self.lock().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.lock().state, ImageState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.lock().state, ImageState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.lock().state, ImageState::Failed(_))
    }

    /// Image bytes, once they have arrived
    pub fn data(&self) -> Option<Arc<Vec<u8>>> {
        match &self.lock().state {
            ImageState::Ready(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Runs `callback` once the handle settles, or right away if it already has
    pub fn on_settled<F>(&self, callback: F)
    where
        F: FnOnce(&TileCoord, &ImageState) + Send + 'static,
    {
        let mut inner = self.lock();
        if matches!(inner.state, ImageState::Pending) {
            inner.callbacks.push(Box::new(callback));
            return;
        }
        let state = inner.state.clone();
        drop(inner);
        callback(&self.coords, &state);
    }

    /// Sends a [`LoadEvent`] on `tx` when the handle settles
    pub fn watch(&self, tx: Sender<LoadEvent>) {
        self.on_settled(move |coords, state| {
            let event = match state {
                ImageState::Ready(_) => LoadEvent::Loaded(*coords),
                ImageState::Failed(reason) => LoadEvent::Failed(*coords, reason.clone()),
                ImageState::Pending => return,
            };
            // A disconnected receiver means the layer is gone
            let _ = tx.send(event);
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandleInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.lock().state {
            ImageState::Pending => "pending".to_string(),
            ImageState::Ready(data) => format!("ready ({} bytes)", data.len()),
            ImageState::Failed(reason) => format!("failed ({})", reason),
        };
        f.debug_struct("ImageHandle")
            .field("coords", &self.coords)
            .field("state", &state)
            .finish()
    }
}

/// Write side of an [`ImageHandle`]. Settles exactly once; dropping it
/// unsettled fails the handle.
pub struct ImageCompleter {
    coords: TileCoord,
    inner: Option<Arc<Mutex<HandleInner>>>,
}

impl ImageCompleter {
    pub fn coords(&self) -> TileCoord {
        self.coords
    }

    pub fn resolve(self, data: Vec<u8>) {
        self.resolve_shared(Arc::new(data));
    }

    pub fn resolve_shared(mut self, data: Arc<Vec<u8>>) {
        self.settle(ImageState::Ready(data));
    }

    pub fn reject(mut self, reason: impl Into<String>) {
        self.settle(ImageState::Failed(reason.into()));
    }

    fn settle(&mut self, state: ImageState) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let callbacks = {
            let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard.state = state.clone();
            std::mem::take(&mut guard.callbacks)
        };
        for callback in callbacks {
            callback(&self.coords, &state);
        }
    }
}

impl Drop for ImageCompleter {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.settle(ImageState::Failed("tile request abandoned".to_string()));
        }
    }
}

/// Anything that can produce tile images for a coordinate
pub trait TileSource: Send + Sync {
    /// Starts producing the image for `coords`. Must not block.
    fn fetch(&self, coords: TileCoord, options: &TileLayerOptions) -> ImageHandle;

    /// Releases caches and other resources held by the source
    fn dispose(&self) {}

    fn name(&self) -> &str {
        "tile source"
    }
}

impl<S: TileSource + ?Sized> TileSource for Arc<S> {
    fn fetch(&self, coords: TileCoord, options: &TileLayerOptions) -> ImageHandle {
        (**self).fetch(coords, options)
    }

    fn dispose(&self) {
        (**self).dispose()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Builds the URL for `coords` from the options' URL template
pub fn tile_url(coords: &TileCoord, options: &TileLayerOptions) -> Result<String> {
    expand_template(&options.url_template, coords, options)
}

/// Substitutes `{x}`, `{y}`, `{z}`, `{s}` and every additional option into `template`
pub fn expand_template(
    template: &str,
    coords: &TileCoord,
    options: &TileLayerOptions,
) -> Result<String> {
    let mut values: HashMap<&str, String> = HashMap::default();
    for (key, value) in &options.additional_options {
        values.insert(key.as_str(), value.clone());
    }
    values.insert("x", coords.x.to_string());
    values.insert("y", url_row(coords, options).to_string());
    values.insert("z", url_zoom(coords, options).to_string());
    if let Some(subdomain) = subdomain(coords, options) {
        values.insert("s", subdomain.to_string());
    }

    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| {
                MapError::UrlTemplate(format!("unclosed placeholder in '{}'", template))
            })?;
        let name = &after[..close];
        let value = values
            .get(name)
            .ok_or_else(|| {
                MapError::UrlTemplate(format!("no value provided for variable {{{}}}", name))
            })?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn url_zoom(coords: &TileCoord, options: &TileLayerOptions) -> i32 {
    let zoom = if options.zoom_reverse {
        options.max_zoom - coords.z
    } else {
        coords.z
    };
    zoom + options.zoom_offset
}

fn url_row(coords: &TileCoord, options: &TileLayerOptions) -> i64 {
    if options.tms {
        let rows = 1_i64 << coords.z.clamp(0, 62);
        rows - 1 - coords.y
    } else {
        coords.y
    }
}

fn subdomain<'a>(coords: &TileCoord, options: &'a TileLayerOptions) -> Option<&'a str> {
    if options.subdomains.is_empty() {
        return None;
    }
    let index = (coords.x + coords.y).rem_euclid(options.subdomains.len() as i64) as usize;
    Some(options.subdomains[index].as_str())
}

/// In-memory tile store.
///
/// Immediate mode settles handles inside `fetch`, the way a warm image cache
/// answers. Deferred mode parks requests until [`MemoryTileSource::flush`].
#[derive(Default)]
pub struct MemoryTileSource {
    tiles: Mutex<HashMap<TileCoord, Arc<Vec<u8>>>>,
    deferred: bool,
    parked: Mutex<Vec<ImageCompleter>>,
    requests: AtomicUsize,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, coords: TileCoord, data: Vec<u8>) {
        self.tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(coords, Arc::new(data));
    }

    pub fn remove(&self, coords: &TileCoord) {
        self.tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(coords);
    }

    /// Settles every parked request; returns how many were settled
    pub fn flush(&self) -> usize {
        let parked =
            std::mem::take(&mut *self.parked.lock().unwrap_or_else(PoisonError::into_inner));
        let count = parked.len();
        for completer in parked {
            self.settle(completer);
        }
        count
    }

    /// Number of parked requests
    pub fn parked(&self) -> usize {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total number of `fetch` calls
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    fn settle(&self, completer: ImageCompleter) {
        let data = self
            .tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&completer.coords())
            .cloned();
        match data {
            Some(data) => completer.resolve_shared(data),
            None => {
                let reason = format!("tile {} not in memory store", completer.coords());
                completer.reject(reason)
            }
        }
    }
}

impl TileSource for MemoryTileSource {
    fn fetch(&self, coords: TileCoord, _options: &TileLayerOptions) -> ImageHandle {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let (handle, completer) = ImageHandle::pending(coords);
        if self.deferred {
            self.parked
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(completer);
        } else {
            self.settle(completer);
        }
        handle
    }

    fn dispose(&self) {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Reads tiles from disk, e.g. `"/var/tiles/{z}/{x}/{y}.png"`.
///
/// Each read happens on its own thread so `fetch` never blocks.
pub struct FileTileSource {
    path_template: String,
}

impl FileTileSource {
    pub fn new(path_template: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
        }
    }

    /// Filesystem path for `coords`
    pub fn path_for(&self, coords: &TileCoord, options: &TileLayerOptions) -> Result<PathBuf> {
        expand_template(&self.path_template, coords, options).map(PathBuf::from)
    }
}

impl TileSource for FileTileSource {
    fn fetch(&self, coords: TileCoord, options: &TileLayerOptions) -> ImageHandle {
        let path = match self.path_for(&coords, options) {
            Ok(path) => path,
            Err(e) => return ImageHandle::failed(coords, e.to_string()),
        };
        let (handle, completer) = ImageHandle::pending(coords);

        thread::spawn(move || match std::fs::read(&path).map_err(MapError::from) {
            Ok(data) => {
                log::debug!("read tile {} from {} ({} bytes)", coords, path.display(), data.len());
                completer.resolve(data);
            }
            Err(e) => completer.reject(format!("{}: {}", path.display(), e)),
        });

        handle
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn test_url_template_substitution() {
        let options = TileLayerOptions::default()
            .with_url_template("https://{s}.tiles.example/{z}/{x}/{y}.png?key={apiKey}")
            .with_additional_option("apiKey", "secret");
        let url = tile_url(&TileCoord::new(3, 4, 5), &options).unwrap();
        // (3 + 4) % 3 == 1 -> "b"
        assert_eq!(url, "https://b.tiles.example/5/3/4.png?key=secret");
    }

    #[test]
    fn test_url_tms_and_zoom_adjustments() {
        let mut options = TileLayerOptions::default()
            .with_url_template("{z}/{x}/{y}")
            .with_tms(true);
        assert_eq!(tile_url(&TileCoord::new(1, 0, 2), &options).unwrap(), "2/1/3");

        options.tms = false;
        options.zoom_reverse = true;
        options.zoom_offset = 1;
        assert_eq!(tile_url(&TileCoord::new(1, 0, 2), &options).unwrap(), "17/1/0");
    }

    #[test]
    fn test_missing_placeholder_value_is_an_error() {
        let options = TileLayerOptions::default().with_url_template("{z}/{x}/{y}?k={token}");
        let err = tile_url(&TileCoord::new(0, 0, 0), &options).unwrap_err();
        assert!(matches!(err, MapError::UrlTemplate(_)));

        let options = TileLayerOptions::default()
            .with_url_template("{s}/{z}")
            .with_subdomains(Vec::<String>::new());
        assert!(tile_url(&TileCoord::new(0, 0, 0), &options).is_err());
    }

    #[test]
    fn test_handle_notifies_watchers_once() {
        let (tx, rx) = unbounded();
        let coords = TileCoord::new(1, 2, 3);
        let (handle, completer) = ImageHandle::pending(coords);
        handle.watch(tx.clone());
        assert!(handle.is_pending());

        completer.resolve(vec![1, 2, 3]);
        assert_eq!(rx.try_recv().unwrap(), LoadEvent::Loaded(coords));
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.data().unwrap().as_slice(), &[1, 2, 3]);

        // watching a settled handle reports right away
        handle.watch(tx);
        assert_eq!(rx.try_recv().unwrap(), LoadEvent::Loaded(coords));
    }

    #[test]
    fn test_dropped_completer_fails_handle() {
        let (handle, completer) = ImageHandle::pending(TileCoord::new(0, 0, 0));
        drop(completer);
        assert!(handle.is_failed());
    }

    #[test]
    fn test_memory_source_immediate_and_deferred() {
        let coords = TileCoord::new(0, 0, 1);
        let options = TileLayerOptions::default();

        let source = MemoryTileSource::new();
        source.insert(coords, vec![9]);
        assert!(source.fetch(coords, &options).is_ready());
        assert!(source.fetch(TileCoord::new(1, 0, 1), &options).is_failed());

        let deferred = MemoryTileSource::deferred();
        deferred.insert(coords, vec![9]);
        let handle = deferred.fetch(coords, &options);
        assert!(handle.is_pending());
        assert_eq!(deferred.flush(), 1);
        assert!(handle.is_ready());
        assert_eq!(deferred.request_count(), 1);
    }

    #[test]
    fn test_file_source_reads_from_disk() {
        let dir = std::env::temp_dir().join(format!("tilegrid-file-source-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("2/1")).unwrap();
        std::fs::write(dir.join("2/1/3.png"), b"png").unwrap();

        let source = FileTileSource::new(format!("{}/{{z}}/{{x}}/{{y}}.png", dir.display()));
        let options = TileLayerOptions::default();
        let (tx, rx) = unbounded();

        source.fetch(TileCoord::new(1, 3, 2), &options).watch(tx.clone());
        source.fetch(TileCoord::new(1, 4, 2), &options).watch(tx);

        let mut events: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        events.sort_by_key(|event| event.coords().y);
        assert_eq!(events[0], LoadEvent::Loaded(TileCoord::new(1, 3, 2)));
        assert!(matches!(events[1], LoadEvent::Failed(..)));

        let _ = std::fs::remove_dir_all(dir);
    }
}
