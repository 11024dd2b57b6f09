use std::sync::Arc;
use std::time::Duration;

use tilegrid::layers::tile::{LoadState, MemoryTileSource};
use tilegrid::prelude::*;

/// Integration tests driving the tile layer the way a map widget does:
/// move the view, draw the frame, let images arrive, repeat.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn store_with_zooms(zooms: std::ops::RangeInclusive<i32>) -> Arc<MemoryTileSource> {
    let source = Arc::new(MemoryTileSource::deferred());
    for z in zooms {
        let n = 1_i64 << z;
        for x in 0..n {
            for y in 0..n {
                source.insert(TileCoord::new(x, y, z), vec![z as u8]);
            }
        }
    }
    source
}

fn layer(source: &Arc<MemoryTileSource>, options: TileLayerOptions) -> (TileLayer, ManualClock) {
    let clock = ManualClock::new();
    let layer =
        TileLayer::with_clock(options, Box::new(source.clone()), Arc::new(clock.clone())).unwrap();
    (layer, clock)
}

fn settle(layer: &mut TileLayer, source: &MemoryTileSource) -> usize {
    source.flush();
    layer.process_load_events()
}

#[test]
fn test_zooming_in_shows_parents_until_children_load() {
    init_logging();
    let source = store_with_zooms(2..=3);
    let (mut layer, _) = layer(&source, TileLayerOptions::default());
    let mut map = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(512.0, 512.0));

    layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(settle(&mut layer, &source), 4);

    map.set_zoom(3.0);
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.tile_zoom, Some(3));
    assert_eq!(frame.current().count(), 4);
    assert_eq!(frame.backups().count(), 4);
    // stand-ins are drawn underneath
    assert!(frame.tiles[..4].iter().all(|tile| !tile.is_current && !tile.placeholder));
    assert!(frame.tiles[4..].iter().all(|tile| tile.is_current && tile.placeholder));

    // the zoom 2 parent now covers a 512px square around the view center
    let parent = frame.find(&TileCoord::new(1, 1, 2)).unwrap();
    assert_eq!(parent.position, Point::new(-256.0, -256.0));
    assert_eq!(parent.width, 512.0);
    assert!(layer.levels().get(2).unwrap().active);

    assert_eq!(settle(&mut layer, &source), 4);
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.len(), 4);
    assert!(frame.tiles.iter().all(|tile| tile.is_current && !tile.placeholder));
    assert!(!layer.levels().get(2).unwrap().active);
}

#[test]
fn test_zooming_out_uses_loaded_children() {
    init_logging();
    let source = store_with_zooms(2..=3);
    let options = TileLayerOptions::default().with_backup_strategy(vec![-1]);
    let (mut layer, _) = layer(&source, options);
    let mut map = Viewport::new(LatLng::new(0.0, 0.0), 3.0, Point::new(512.0, 512.0));

    layer.on_viewport_changed(&map, map.center, map.zoom);
    settle(&mut layer, &source);

    map.set_zoom(2.0);
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    let backups: Vec<_> = frame.backups().map(|tile| tile.coords).collect();
    // only the child (3,3,3) of (1,1,2) was on screen at zoom 3
    assert!(backups.contains(&TileCoord::new(3, 3, 3)));
    assert!(backups.iter().all(|coords| coords.z == 3));
    assert!(frame.tiles.iter().take_while(|tile| !tile.is_current).count() == backups.len());
}

#[test]
fn test_panning_east_prefetches_one_column() {
    init_logging();
    let source = store_with_zooms(2..=2);
    let (mut layer, _) = layer(&source, TileLayerOptions::default());
    let mut map = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(512.0, 512.0));

    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.current().count(), 4);

    map.set_center(LatLng::new(0.0, 10.0));
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    let columns: std::collections::BTreeSet<i64> =
        frame.current().map(|tile| tile.coords.x).collect();
    assert_eq!(columns.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    // column 4 wraps around the antimeridian onto column 0
    let wrapped = frame.current().find(|tile| tile.coords.x == 4).unwrap();
    assert_eq!(wrapped.image_coords.x, 0);
    assert!(layer.image(&TileCoord::new(0, 1, 2)).is_some());
}

#[test]
fn test_returning_to_a_zoom_draws_loaded_parents_without_refetching() {
    init_logging();
    let source = store_with_zooms(2..=4);
    let (mut layer, _) = layer(&source, TileLayerOptions::default());
    let mut map = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(512.0, 512.0));

    layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(settle(&mut layer, &source), 4);

    // zoom 2 is too far from zoom 4 to stand in, so it leaves the frame
    map.set_zoom(4.0);
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.backups().count(), 0);
    assert_eq!(source.request_count(), 8);

    map.set_zoom(3.0);
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(source.request_count(), 12);
    assert_eq!(frame.backups().count(), 4);
    assert!(frame.backups().all(|tile| tile.coords.z == 2 && !tile.placeholder));
}

#[test]
fn test_panning_back_reuses_loaded_tiles() {
    init_logging();
    let source = store_with_zooms(3..=3);
    let options = TileLayerOptions::default().with_greedy_tile_count(0);
    let (mut layer, _) = layer(&source, options);
    let mut map = Viewport::new(LatLng::new(0.0, 0.0), 3.0, Point::new(512.0, 512.0));

    layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(settle(&mut layer, &source), 4);

    map.set_center(LatLng::new(0.0, 90.0));
    layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(source.request_count(), 8);

    map.set_center(LatLng::new(0.0, 0.0));
    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(source.request_count(), 8);
    assert_eq!(frame.current().count(), 4);
    assert!(frame.tiles.iter().all(|tile| !tile.placeholder));
}

#[test]
fn test_stuck_tiles_are_requested_again_after_a_day() {
    init_logging();
    let source = Arc::new(MemoryTileSource::deferred());
    let (mut layer, clock) = layer(&source, TileLayerOptions::default());
    let map = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(512.0, 512.0));

    layer.on_viewport_changed(&map, map.center, map.zoom);
    clock.advance(Duration::from_secs(1439 * 60));
    layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(source.request_count(), 4);

    // nothing ever arrives; the parked requests are abandoned
    source.dispose();
    layer.process_load_events();
    clock.advance(Duration::from_secs(2 * 60));
    layer.on_viewport_changed(&map, map.center, map.zoom);

    assert_eq!(source.request_count(), 8);
    let tracker = layer.tracker();
    let tracker = tracker.lock().unwrap();
    assert_eq!(tracker.outstanding_count(), 4);
}

#[test]
fn test_housekeeping_evicts_old_entries() {
    init_logging();
    let source = Arc::new(MemoryTileSource::deferred());
    let (mut layer, clock) = layer(&source, TileLayerOptions::default());
    let key: TileCoord = "1:1:5".parse().unwrap();

    layer.tracker().lock().unwrap().begin_load(key);
    clock.advance(Duration::from_secs(1441 * 60));
    let stats = layer.housekeep();

    assert_eq!(stats.outstanding_evicted, 1);
    assert!(!layer.tracker().lock().unwrap().is_outstanding(&key));
}

#[test]
fn test_frame_carries_layer_styling() {
    let source = Arc::new(MemoryTileSource::new());
    let options = TileLayerOptions::default()
        .with_opacity(0.5)
        .with_background_color([10, 20, 30, 255]);
    let (mut layer, _) = layer(&source, options);
    let map = Viewport::new(LatLng::new(0.0, 0.0), 0.0, Point::new(256.0, 256.0));

    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.opacity, 0.5);
    assert_eq!(frame.background_color, Some([10, 20, 30, 255]));
    // zoom 0 holds a single world tile
    assert_eq!(frame.current().count(), 1);
}

#[test]
fn test_simple_crs_has_no_world_edge() {
    let source = Arc::new(MemoryTileSource::new());
    let (mut layer, _) = layer(&source, TileLayerOptions::default());
    let map = Viewport::new(LatLng::new(0.0, 0.0), 0.0, Point::new(512.0, 512.0))
        .with_crs(Crs::simple());

    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.current().count(), 4);
    assert!(frame.find(&TileCoord::new(-1, -1, 0)).is_some());
}

#[test]
fn test_options_from_json() {
    let source: Box<dyn TileSource> = Box::new(MemoryTileSource::new());
    let layer = TileLayer::from_value(
        serde_json::json!({
            "url_template": "https://tiles.example/{z}/{x}/{y}.png",
            "max_zoom": 12,
            "greedy_tile_count": 2,
            "backup_tile_expansion_strategy": [1, -1]
        }),
        source,
    )
    .unwrap();
    assert_eq!(layer.options().max_zoom, 12);
    assert_eq!(layer.options().backup_tile_expansion_strategy, vec![1, -1]);

    let source: Box<dyn TileSource> = Box::new(MemoryTileSource::new());
    assert!(matches!(
        TileLayer::from_value(serde_json::json!({ "tile_size": 0 }), source),
        Err(MapError::InvalidOptions(_))
    ));
}

#[cfg(feature = "tokio-runtime")]
#[tokio::test(start_paused = true)]
async fn test_background_housekeeping_sweeps_tracker() {
    init_logging();
    let clock = ManualClock::new();
    let source = Arc::new(MemoryTileSource::deferred());
    let mut layer = TileLayer::with_clock(
        TileLayerOptions::default(),
        Box::new(source.clone()),
        Arc::new(clock.clone()),
    )
    .unwrap();
    assert!(layer.has_housekeeping_task());

    let key = TileCoord::new(1, 1, 5);
    let tracker = layer.tracker();
    tracker.lock().unwrap().begin_load(key);

    clock.advance(Duration::from_secs(1441 * 60));
    tokio::time::sleep(Duration::from_secs(24 * 60 * 60 + 1)).await;
    assert!(!tracker.lock().unwrap().is_outstanding(&key));

    layer.dispose();
    assert!(!layer.has_housekeeping_task());
}

#[cfg(feature = "tokio-runtime")]
#[tokio::test]
async fn test_network_source_without_server_fails_softly() {
    init_logging();
    let options =
        TileLayerOptions::default().with_url_template("http://127.0.0.1:9/{z}/{x}/{y}.png");
    let source = NetworkTileSource::new().with_request_timeout(Duration::from_secs(1));
    let mut layer = TileLayer::new(options, Box::new(source)).unwrap();
    let map = Viewport::new(LatLng::new(0.0, 0.0), 0.0, Point::new(256.0, 256.0));

    let frame = layer.on_viewport_changed(&map, map.center, map.zoom);
    assert_eq!(frame.len(), 1);
    assert!(frame.tiles[0].placeholder);
    assert!(layer.has_housekeeping_task());
}
