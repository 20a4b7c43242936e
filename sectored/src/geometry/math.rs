// Scalar geometry predicates. Everything here operates on plain f64
// coordinates and never allocates.

use super::tolerance::{near_zero, EPS_ORIENT};

/// Orientation of the triple (p, q, r): +1 counter-clockwise, -1 clockwise,
/// 0 collinear within [`EPS_ORIENT`].
pub fn orientation(px: f64, py: f64, qx: f64, qy: f64, rx: f64, ry: f64) -> i32 {
    let cross = (qx - px) * (ry - py) - (qy - py) * (rx - px);
    if near_zero(cross, EPS_ORIENT) {
        0
    } else if cross > 0.0 {
        1
    } else {
        -1
    }
}

/// Assuming (p, q, r) collinear, true iff q lies within the axis-aligned
/// bounding box of p and r.
pub fn on_segment(px: f64, py: f64, qx: f64, qy: f64, rx: f64, ry: f64) -> bool {
    qx <= px.max(rx) + EPS_ORIENT
        && qx >= px.min(rx) - EPS_ORIENT
        && qy <= py.max(ry) + EPS_ORIENT
        && qy >= py.min(ry) - EPS_ORIENT
}

/// Strict interior crossing of segments (a,b) and (c,d). Touching at a shared
/// endpoint or a T-junction is not a proper intersection.
pub fn segments_properly_intersect(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> bool {
    let o1 = orientation(ax, ay, bx, by, cx, cy);
    let o2 = orientation(ax, ay, bx, by, dx, dy);
    let o3 = orientation(cx, cy, dx, dy, ax, ay);
    let o4 = orientation(cx, cy, dx, dy, bx, by);
    o1 * o2 < 0 && o3 * o4 < 0
}

/// True iff both segments are collinear and their 1-D overlap along the
/// dominant axis is longer than `eps`.
pub fn collinear_overlap_more_than_endpoint(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
    eps: f64,
) -> bool {
    if orientation(ax, ay, bx, by, cx, cy) != 0 || orientation(ax, ay, bx, by, dx, dy) != 0 {
        return false;
    }
    // Project onto the dominant axis of (a, b).
    let (pa, pb, pc, pd) = if (bx - ax).abs() >= (by - ay).abs() {
        (ax, bx, cx, dx)
    } else {
        (ay, by, cy, dy)
    };
    let (lo1, hi1) = if pa <= pb { (pa, pb) } else { (pb, pa) };
    let (lo2, hi2) = if pc <= pd { (pc, pd) } else { (pd, pc) };
    hi1.min(hi2) - lo1.max(lo2) > eps
}

/// Shoelace area of a flattened polygon (x0, y0, x1, y1, ...). Positive means
/// counter-clockwise winding.
pub fn signed_area_2d(flat_xy: &[f64]) -> f64 {
    let n = flat_xy.len() / 2;
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += flat_xy[2 * i] * flat_xy[2 * j + 1] - flat_xy[2 * j] * flat_xy[2 * i + 1];
    }
    0.5 * acc
}

/// Strictly-interior point-in-polygon via ray casting. Points on the boundary
/// are outside.
pub fn polygon_contains_point(flat_xy: &[f64], px: f64, py: f64) -> bool {
    let n = flat_xy.len() / 2;
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (flat_xy[2 * i], flat_xy[2 * i + 1]);
        let (xj, yj) = (flat_xy[2 * j], flat_xy[2 * j + 1]);
        // Boundary hit: on an edge means not strictly interior.
        if orientation(xi, yi, xj, yj, px, py) == 0 && on_segment(xi, yi, px, py, xj, yj) {
            return false;
        }
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) / (yj - yi) * (xj - xi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True iff every vertex of `inner` lies strictly inside `outer`.
pub fn polygon_contains_all_vertices(inner: &[f64], outer: &[f64]) -> bool {
    let n = inner.len() / 2;
    if n == 0 {
        return false;
    }
    (0..n).all(|i| polygon_contains_point(outer, inner[2 * i], inner[2 * i + 1]))
}

/// Absolute polar angle of the direction a -> b, in (-pi, pi].
pub fn angle_to(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    (by - ay).atan2(bx - ax)
}

/// Non-negative counter-clockwise delta from angle `a` to angle `b`,
/// in [0, 2*pi).
pub fn angle_ccw(a: f64, b: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let mut d = (b - a) % tau;
    if d < 0.0 {
        d += tau;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_signs() {
        assert_eq!(orientation(0.0, 0.0, 1.0, 0.0, 1.0, 1.0), 1);
        assert_eq!(orientation(0.0, 0.0, 1.0, 0.0, 1.0, -1.0), -1);
        assert_eq!(orientation(0.0, 0.0, 1.0, 0.0, 2.0, 0.0), 0);
    }

    #[test]
    fn proper_cross_excludes_touch() {
        assert!(segments_properly_intersect(
            0.0, 0.0, 2.0, 2.0, 0.0, 2.0, 2.0, 0.0
        ));
        // Shared endpoint only.
        assert!(!segments_properly_intersect(
            0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0
        ));
        // T-junction: endpoint of one in the interior of the other.
        assert!(!segments_properly_intersect(
            0.0, 0.0, 2.0, 0.0, 1.0, 0.0, 1.0, 1.0
        ));
    }

    #[test]
    fn collinear_overlap_classification() {
        assert!(collinear_overlap_more_than_endpoint(
            0.0, 0.0, 3.0, 0.0, 1.0, 0.0, 2.0, 0.0, 1e-9
        ));
        // Sharing exactly one endpoint is not an overlap.
        assert!(!collinear_overlap_more_than_endpoint(
            0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 2.0, 0.0, 1e-9
        ));
        // Parallel but offset.
        assert!(!collinear_overlap_more_than_endpoint(
            0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1e-9
        ));
    }

    #[test]
    fn shoelace_orientation() {
        let ccw = [0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0];
        assert!(signed_area_2d(&ccw) > 0.0);
        let cw: Vec<f64> = ccw
            .chunks(2)
            .rev()
            .flat_map(|p| p.iter().copied())
            .collect();
        assert!(signed_area_2d(&cw) < 0.0);
        assert_eq!(signed_area_2d(&ccw).abs(), 16.0);
    }

    #[test]
    fn point_in_polygon_is_strict() {
        let sq = [0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0];
        assert!(polygon_contains_point(&sq, 2.0, 2.0));
        assert!(!polygon_contains_point(&sq, 4.0, 2.0)); // boundary
        assert!(!polygon_contains_point(&sq, 0.0, 0.0)); // corner
        assert!(!polygon_contains_point(&sq, 5.0, 2.0));
    }

    #[test]
    fn ccw_delta_wraps() {
        let tau = std::f64::consts::TAU;
        assert!((angle_ccw(0.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((angle_ccw(1.0, 0.0) - (tau - 1.0)).abs() < 1e-12);
        assert_eq!(angle_ccw(0.5, 0.5), 0.0);
    }
}
