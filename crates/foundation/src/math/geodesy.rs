/// `[lon, lat]` in degrees.
pub type LonLat = [f64; 2];

/// Mean Earth radius used by the haversine formula (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Sample count used when a caller asks for `0` samples.
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Great-circle distance between two `[lon, lat]` points in meters (haversine).
pub fn distance(a: LonLat, b: LonLat) -> f64 {
    let d_lat = (b[1] - a[1]).to_radians();
    let d_lon = (b[0] - a[0]).to_radians();
    let lat1 = a[1].to_radians();
    let lat2 = b[1].to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `h` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn polyline_length(coords: &[LonLat]) -> f64 {
    coords.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Point halfway along the polyline by accumulated distance.
///
/// Interpolation between the two bracketing vertices is linear in coordinate
/// space, not geodesic. Returns `None` only for an empty polyline.
pub fn midpoint_by_distance(coords: &[LonLat]) -> Option<LonLat> {
    let first = *coords.first()?;
    if coords.len() == 1 {
        return Some(first);
    }

    let half = polyline_length(coords) / 2.0;
    let mut acc = 0.0;
    for w in coords.windows(2) {
        let (a, b) = (w[0], w[1]);
        let seg = distance(a, b);
        if acc + seg >= half {
            if seg <= 0.0 {
                return Some(a);
            }
            let ratio = (half - acc) / seg;
            return Some([a[0] + ratio * (b[0] - a[0]), a[1] + ratio * (b[1] - a[1])]);
        }
        acc += seg;
    }

    Some(coords[coords.len() / 2])
}

/// Reduces a polyline to `sample_count` points (`0` means [`DEFAULT_SAMPLE_COUNT`]).
///
/// The input is split into `sample_count` chunks of `len / sample_count` vertices;
/// each output point is the distance-midpoint between the first and last vertex of
/// its chunk. Inputs that are already small enough are returned unchanged.
pub fn sample_along_polyline(coords: &[LonLat], sample_count: usize) -> Vec<LonLat> {
    let n = if sample_count == 0 {
        DEFAULT_SAMPLE_COUNT
    } else {
        sample_count
    };
    if n >= coords.len() {
        return coords.to_vec();
    }

    let stride = coords.len() / n;
    (0..n)
        .map(|i| {
            let start = coords[i * stride];
            let end = coords[(i + 1) * stride - 1];
            midpoint_by_distance(&[start, end]).unwrap_or(start)
        })
        .collect()
}
