//! Shared trait abstractions for the collaborators the tile layer consumes
//!
//! The layer never owns projection math: everything it needs to know about
//! the map is asked through [`MapProjection`].

use crate::core::{
    bounds::Bounds,
    geo::{LatLng, Point},
    viewport::Crs,
};

/// Projection and view state of the map the tile layer is attached to
pub trait MapProjection {
    /// Transform geographic coordinates to world pixel coordinates at `zoom`
    fn project(&self, lat_lng: &LatLng, zoom: f64) -> Point;

    /// Transform world pixel coordinates at `zoom` back to geographic coordinates
    fn unproject(&self, point: &Point, zoom: f64) -> LatLng;

    /// World pixel position of the top-left corner of the view
    fn pixel_origin(&self) -> Point;

    /// Pixel origin the view would have if it were centered on `center` at `zoom`
    fn new_pixel_origin(&self, center: &LatLng, zoom: f64) -> Point;

    /// Scale factor between two zoom levels
    fn zoom_scale(&self, to_zoom: f64, from_zoom: f64) -> f64;

    /// Extent of the whole world in pixels at `zoom`, `None` for infinite CRSs
    fn pixel_world_bounds(&self, zoom: f64) -> Option<Bounds>;

    fn center(&self) -> LatLng;

    fn zoom(&self) -> f64;

    /// Size of the view in pixels
    fn size(&self) -> Point;

    fn crs(&self) -> &Crs;
}
