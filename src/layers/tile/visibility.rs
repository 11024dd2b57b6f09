//! Tile visibility and ordering.
//!
//! Turns the tile range of the current view into the ordered list of tiles to
//! draw: the live tiles plus, for every live tile that is not loaded yet, a
//! stand-in taken from a nearby zoom that already is.

use std::cmp::Ordering;

use super::grid::TileGrid;
use super::tracker::LoadState;
use super::types::Tile;
use crate::core::{
    bounds::TileRange,
    constants::MAX_RENDER_ZOOM_DISTANCE,
    geo::{LatLng, Point, TileCoord},
    viewport::Crs,
};
use crate::prelude::HashMap;

/// Inputs of one planning pass
pub struct PlanRequest<'a> {
    /// Range covering the view, before greedy expansion
    pub range: TileRange,
    pub tile_zoom: i32,
    pub previous_center: Option<LatLng>,
    pub center: LatLng,
    pub greedy_tile_count: i64,
    pub strategy: &'a [i32],
    pub max_zoom: i32,
    pub grid: &'a TileGrid,
    pub crs: &'a Crs,
}

/// Grows `range` by `count` tiles on the side the view is moving towards.
///
/// Moving south (latitude decreasing) extends the bottom edge, moving east
/// extends the right edge, and so on. Without a previous center nothing
/// changes.
pub fn greedy_expand(
    range: TileRange,
    previous: Option<LatLng>,
    center: &LatLng,
    count: i64,
) -> TileRange {
    let Some(previous) = previous else {
        return range;
    };
    let mut expanded = range;
    if center.lat < previous.lat {
        expanded.max_y += count;
    } else if center.lat > previous.lat {
        expanded.min_y -= count;
    }
    if center.lng > previous.lng {
        expanded.max_x += count;
    } else if center.lng < previous.lng {
        expanded.min_x -= count;
    }
    expanded
}

/// Looks for loaded tiles at nearby zooms that can stand in for `tile`.
///
/// Offsets are tried in order; a positive offset looks `d` zooms coarser, a
/// negative one `|d|` zooms finer, where `2^|d|` squared children cover the
/// tile. The first offset that yields anything wins. A candidate qualifies
/// when it has completed and is not being loaded again.
pub fn find_backups(
    tile: &Tile,
    strategy: &[i32],
    max_zoom: i32,
    state: &impl LoadState,
) -> Vec<Tile> {
    let grid = tile.coords;
    let image = tile.image_coords;

    for &offset in strategy {
        let z = grid.z - offset;
        if z < 0 || z > max_zoom || offset.unsigned_abs() >= 62 {
            continue;
        }

        let found: Vec<Tile> = if offset >= 0 {
            let ratio = 1_i64 << offset;
            let candidate = Tile::new(
                TileCoord::new(grid.x.div_euclid(ratio), grid.y.div_euclid(ratio), z),
                TileCoord::new(image.x.div_euclid(ratio), image.y.div_euclid(ratio), z),
                false,
            );
            usable(&candidate, state).then_some(candidate).into_iter().collect()
        } else {
            let factor = 1_i64 << -offset;
            (0..factor)
                .flat_map(|b| (0..factor).map(move |a| (a, b)))
                .map(|(a, b)| {
                    Tile::new(
                        TileCoord::new(grid.x * factor + a, grid.y * factor + b, z),
                        TileCoord::new(image.x * factor + a, image.y * factor + b, z),
                        false,
                    )
                })
                .filter(|candidate| usable(candidate, state))
                .collect()
        };

        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

fn usable(candidate: &Tile, state: &impl LoadState) -> bool {
    state.is_completed(&candidate.image_coords) && !state.is_outstanding(&candidate.image_coords)
}

/// Builds the draw list for one frame, back to front
pub fn plan_tiles(request: &PlanRequest<'_>, state: &impl LoadState) -> Vec<Tile> {
    let zoom = request.tile_zoom;
    let center = request.range.center();
    let range = greedy_expand(
        request.range,
        request.previous_center,
        &request.center,
        request.greedy_tile_count,
    );

    let queue: Vec<Tile> = range
        .iter()
        .map(|(x, y)| TileCoord::new(x, y, zoom))
        .filter(|coords| request.grid.is_valid_tile(coords, request.crs))
        .map(|coords| Tile::new(coords, request.grid.wrap_coords(&coords), true))
        .collect();

    let mut tiles: HashMap<TileCoord, Tile> = HashMap::default();
    for tile in &queue {
        let image = &tile.image_coords;
        if state.is_outstanding(image) || !state.is_completed(image) {
            for backup in find_backups(tile, request.strategy, request.max_zoom, state) {
                tiles.insert(backup.coords, backup);
            }
        }
    }
    for tile in queue {
        tiles.insert(tile.coords, tile);
    }

    let mut ordered: Vec<Tile> = tiles
        .into_values()
        .filter(|tile| (tile.coords.z - zoom).abs() <= MAX_RENDER_ZOOM_DISTANCE)
        .collect();
    ordered.sort_by(|a, b| draw_order(a, b, &center, zoom));
    ordered
}

/// Stand-ins first, then coarser zooms, then nearest to the view center
fn draw_order(a: &Tile, b: &Tile, center: &Point, zoom: i32) -> Ordering {
    a.is_current
        .cmp(&b.is_current)
        .then_with(|| b.coords.z.cmp(&a.coords.z))
        .then_with(|| distance(a, center, zoom).total_cmp(&distance(b, center, zoom)))
        .then_with(|| a.coords.y.cmp(&b.coords.y))
        .then_with(|| a.coords.x.cmp(&b.coords.x))
}

/// Distance from `center` in tile units of `zoom`
fn distance(tile: &Tile, center: &Point, zoom: i32) -> f64 {
    let scale = 2_f64.powi(zoom - tile.coords.z);
    tile.coords.as_point().multiply(scale).distance_to(center)
}
