// Segment-segment classification in f64. Distinguishes proper interior
// crossings, collinear overlaps, endpoint/T touches, and disjoint pairs.

use super::math::{on_segment, orientation};
use super::tolerance::{near_zero, EPS_ORIENT, EPS_PARAM};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegRelation {
    Disjoint,
    /// Strict interior crossing. `t` parameterizes (a, b), `u` parameterizes
    /// (c, d); the crossing point is at (x, y).
    ProperCross { x: f64, y: f64, t: f64, u: f64 },
    /// Both segments collinear with 1-D overlap; `t0..t1` is the overlapped
    /// span in (a, b) parameter space, clamped to [0, 1].
    CollinearOverlap { t0: f64, t1: f64 },
    /// Contact at an endpoint or a T-junction only.
    Touch,
}

/// Parameter of `q` along the segment (a, b), projected onto its dominant
/// axis. Only meaningful when `q` is collinear with (a, b).
pub fn param_on_segment(ax: f64, ay: f64, bx: f64, by: f64, qx: f64, qy: f64) -> f64 {
    if (bx - ax).abs() >= (by - ay).abs() {
        let len = bx - ax;
        if near_zero(len, EPS_ORIENT) {
            0.0
        } else {
            (qx - ax) / len
        }
    } else {
        let len = by - ay;
        if near_zero(len, EPS_ORIENT) {
            0.0
        } else {
            (qy - ay) / len
        }
    }
}

pub fn classify_segments(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> SegRelation {
    let o1 = orientation(ax, ay, bx, by, cx, cy);
    let o2 = orientation(ax, ay, bx, by, dx, dy);
    let o3 = orientation(cx, cy, dx, dy, ax, ay);
    let o4 = orientation(cx, cy, dx, dy, bx, by);

    if o1 == 0 && o2 == 0 && o3 == 0 && o4 == 0 {
        let tc = param_on_segment(ax, ay, bx, by, cx, cy);
        let td = param_on_segment(ax, ay, bx, by, dx, dy);
        let (lo, hi) = if tc <= td { (tc, td) } else { (td, tc) };
        let t0 = lo.max(0.0);
        let t1 = hi.min(1.0);
        if t1 - t0 > EPS_PARAM {
            return SegRelation::CollinearOverlap { t0, t1 };
        }
        if t1 - t0 >= -EPS_PARAM && hi >= -EPS_PARAM && lo <= 1.0 + EPS_PARAM {
            return SegRelation::Touch;
        }
        return SegRelation::Disjoint;
    }

    if o1 * o2 < 0 && o3 * o4 < 0 {
        // Line-line intersection, guaranteed non-parallel here.
        let rx = bx - ax;
        let ry = by - ay;
        let sx = dx - cx;
        let sy = dy - cy;
        let denom = rx * sy - ry * sx;
        let t = ((cx - ax) * sy - (cy - ay) * sx) / denom;
        let u = ((cx - ax) * ry - (cy - ay) * rx) / denom;
        return SegRelation::ProperCross {
            x: ax + t * rx,
            y: ay + t * ry,
            t,
            u,
        };
    }

    // Some orientation is zero: possible endpoint or T contact.
    if (o1 == 0 && on_segment(ax, ay, cx, cy, bx, by))
        || (o2 == 0 && on_segment(ax, ay, dx, dy, bx, by))
        || (o3 == 0 && on_segment(cx, cy, ax, ay, dx, dy))
        || (o4 == 0 && on_segment(cx, cy, bx, by, dx, dy))
    {
        return SegRelation::Touch;
    }
    SegRelation::Disjoint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proper_cross() {
        match classify_segments(0.0, 0.0, 2.0, 2.0, 0.0, 2.0, 2.0, 0.0) {
            SegRelation::ProperCross { x, y, t, u } => {
                assert!((x - 1.0).abs() < 1e-12 && (y - 1.0).abs() < 1e-12);
                assert!((t - 0.5).abs() < 1e-12 && (u - 0.5).abs() < 1e-12);
            }
            other => panic!("expected proper cross, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_touch() {
        assert_eq!(
            classify_segments(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0),
            SegRelation::Touch
        );
    }

    #[test]
    fn collinear_overlap_span() {
        match classify_segments(0.0, 0.0, 4.0, 0.0, 1.0, 0.0, 3.0, 0.0) {
            SegRelation::CollinearOverlap { t0, t1 } => {
                assert!((t0 - 0.25).abs() < 1e-12);
                assert!((t1 - 0.75).abs() < 1e-12);
            }
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[test]
    fn collinear_endpoint_contact_is_touch() {
        assert_eq!(
            classify_segments(0.0, 0.0, 2.0, 0.0, 2.0, 0.0, 4.0, 0.0),
            SegRelation::Touch
        );
    }

    #[test]
    fn disjoint_parallel() {
        assert_eq!(
            classify_segments(0.0, 0.0, 2.0, 0.0, 0.0, 1.0, 2.0, 1.0),
            SegRelation::Disjoint
        );
    }
}
