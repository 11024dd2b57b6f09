//! Wrapping of coordinates into a half-open numeric interval.
//!
//! Used to fold tile columns (and rows, for projections that wrap on
//! latitude) back into the canonical range so that panning across the
//! antimeridian reuses the same backing tiles.

/// Wraps `x` into `[min, max)`.
///
/// With `include_max` set, a value exactly equal to `max` is returned
/// unchanged, making the interval closed on the right.
pub fn wrap_num(x: f64, range: (f64, f64), include_max: bool) -> f64 {
    let (min, max) = range;
    let d = max - min;
    if include_max && x == max {
        return x;
    }
    if d == 0.0 {
        return min;
    }
    ((x - min) % d + d) % d + min
}

/// Integer counterpart of [`wrap_num`] for tile indices.
pub fn wrap_index(x: i64, range: (i64, i64)) -> i64 {
    let (min, max) = range;
    let d = max - min;
    if d <= 0 {
        return min;
    }
    (x - min).rem_euclid(d) + min
}
