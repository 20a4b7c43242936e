//! Segment insertion into an existing subdivision: vertex splitting, proper
//! intersection handling, t-space interval coverage, and the outward
//! collinear merge pass.

use std::collections::HashSet;

use tracing::trace;

use crate::geometry::intersect::{classify_segments, param_on_segment, SegRelation};
use crate::geometry::math::{on_segment, orientation};
use crate::geometry::tolerance::EPS_PARAM;
use crate::history::{Action, EditOp, LineRecord};
use crate::model::{EntityRef, LineId, LineKey, Point, Rect, Side};
use crate::{Map, MapError};

impl Map {
    /// Split every line that is collinear with `p` and contains it in its
    /// interior. Both halves keep the original side attributes and flags.
    pub(crate) fn split_lines_through(&mut self, p: Point) -> Result<(), MapError> {
        let mut hits: Vec<LineId> = Vec::new();
        self.data.grid.query_candidates(Rect::point(p), |e| {
            if let EntityRef::Line(id) = e {
                hits.push(id);
            }
            true
        });
        hits.sort_unstable();
        for lid in hits {
            let Some((q0, q1)) = self.data.line_endpoints(lid) else {
                continue;
            };
            if p == q0 || p == q1 {
                continue;
            }
            if orientation(q0.xf(), q0.yf(), q1.xf(), q1.yf(), p.xf(), p.yf()) != 0 {
                continue;
            }
            if !on_segment(q0.xf(), q0.yf(), p.xf(), p.yf(), q1.xf(), q1.yf()) {
                continue;
            }
            self.split_line_at(lid, p)?;
        }
        Ok(())
    }

    /// Replace `lid` with two halves meeting at the existing vertex at `p`.
    fn split_line_at(&mut self, lid: LineId, p: Point) -> Result<(), MapError> {
        let vid = *self
            .data
            .vertex_map
            .get(&p)
            .ok_or(MapError::Corrupt("split point has no vertex"))?;
        let (v0, v1, front, back, flags) = {
            let line = self
                .data
                .line(lid)
                .ok_or(MapError::Corrupt("splitting non-existent line"))?;
            (
                line.v0,
                line.v1,
                line.front.clone(),
                line.back.clone(),
                line.flags,
            )
        };
        trace!(line = lid, at = ?p, "splitting line");
        self.commit_remove_line(lid)?;
        for (a, b) in [(v0, vid), (vid, v1)] {
            let (pa, pb) = (
                self.data.vertex(a).map(|v| v.pos()),
                self.data.vertex(b).map(|v| v.pos()),
            );
            let (Some(pa), Some(pb)) = (pa, pb) else {
                continue;
            };
            if self.data.line_map.contains_key(&LineKey::new(pa, pb)) {
                continue;
            }
            let id = self.data.alloc_line_id();
            self.history.commit(
                &mut self.data,
                Action::structural(EditOp::InsertLine {
                    id,
                    rec: LineRecord {
                        v0: a,
                        v1: b,
                        front: front.clone(),
                        back: back.clone(),
                        flags,
                    },
                    selected: false,
                }),
            )?;
        }
        Ok(())
    }

    /// Insert the segment from `(x0, y0)` to `(x1, y1)` into the
    /// subdivision.
    ///
    /// Crossed lines are split at the rounded intersection points, spans
    /// already covered by collinear lines are skipped, and the freshly
    /// created lines are merged outward with collinear neighbors where that
    /// does not cross other geometry. Returns the lines the call created
    /// (possibly empty).
    pub fn add_line(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        skip_rebuild: bool,
    ) -> Result<Vec<LineId>, MapError> {
        let p0 = Point::round(x0, y0);
        let p1 = Point::round(x1, y1);
        if p0 == p1 {
            return Ok(Vec::new());
        }
        self.add_vertex(p0.xf(), p0.yf(), true)?;
        self.add_vertex(p1.xf(), p1.yf(), true)?;
        if self.data.line_map.contains_key(&LineKey::new(p0, p1)) {
            if !skip_rebuild {
                self.rebuild_sectors()?;
            }
            return Ok(Vec::new());
        }
        let seg_rect = Rect::of_segment(p0, p1);

        // Proper crossings become vertices, which in turn split the crossed
        // lines.
        let mut cross_pts: Vec<Point> = Vec::new();
        {
            let mut candidates: Vec<LineId> = Vec::new();
            self.data.grid.query_candidates(seg_rect, |e| {
                if let EntityRef::Line(id) = e {
                    candidates.push(id);
                }
                true
            });
            candidates.sort_unstable();
            for lid in candidates {
                let Some((q0, q1)) = self.data.line_endpoints(lid) else {
                    continue;
                };
                if let SegRelation::ProperCross { x, y, .. } = classify_segments(
                    p0.xf(),
                    p0.yf(),
                    p1.xf(),
                    p1.yf(),
                    q0.xf(),
                    q0.yf(),
                    q1.xf(),
                    q1.yf(),
                ) {
                    cross_pts.push(Point::round(x, y));
                }
            }
        }
        cross_pts.sort_unstable();
        cross_pts.dedup();
        cross_pts.retain(|&p| p != p0 && p != p1);
        for &p in &cross_pts {
            self.add_vertex(p.xf(), p.yf(), true)?;
        }

        // Coverage by existing collinear lines, in t-space of the new
        // segment.
        let mut covered: Vec<(f64, f64)> = Vec::new();
        {
            let mut candidates: Vec<LineId> = Vec::new();
            self.data.grid.query_candidates(seg_rect, |e| {
                if let EntityRef::Line(id) = e {
                    candidates.push(id);
                }
                true
            });
            candidates.sort_unstable();
            for lid in candidates {
                let Some((q0, q1)) = self.data.line_endpoints(lid) else {
                    continue;
                };
                if orientation(p0.xf(), p0.yf(), p1.xf(), p1.yf(), q0.xf(), q0.yf()) != 0
                    || orientation(p0.xf(), p0.yf(), p1.xf(), p1.yf(), q1.xf(), q1.yf()) != 0
                {
                    continue;
                }
                let ta = param_on_segment(p0.xf(), p0.yf(), p1.xf(), p1.yf(), q0.xf(), q0.yf());
                let tb = param_on_segment(p0.xf(), p0.yf(), p1.xf(), p1.yf(), q1.xf(), q1.yf());
                let (lo, hi) = if ta <= tb { (ta, tb) } else { (tb, ta) };
                if hi <= EPS_PARAM || lo >= 1.0 - EPS_PARAM {
                    continue;
                }
                covered.push((lo.max(0.0), hi.min(1.0)));
            }
        }
        covered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let mut merged: Vec<(f64, f64)> = Vec::new();
        for (s, e) in covered {
            match merged.last_mut() {
                Some(last) if s <= last.1 + EPS_PARAM => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }

        // The gaps between covered spans are where new lines go; gaps are
        // additionally cut at the crossing vertices inserted above.
        let mut gaps: Vec<(f64, f64)> = Vec::new();
        let mut cursor = 0.0;
        for &(s, e) in &merged {
            if s - cursor > EPS_PARAM {
                gaps.push((cursor, s));
            }
            cursor = cursor.max(e);
        }
        if 1.0 - cursor > EPS_PARAM {
            gaps.push((cursor, 1.0));
        }
        let mut cross_ts: Vec<f64> = cross_pts
            .iter()
            .map(|p| param_on_segment(p0.xf(), p0.yf(), p1.xf(), p1.yf(), p.xf(), p.yf()))
            .collect();
        cross_ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut spans: Vec<(f64, f64)> = Vec::new();
        for (s, e) in gaps {
            let mut start = s;
            for &t in &cross_ts {
                if t > start + EPS_PARAM && t < e - EPS_PARAM {
                    spans.push((start, t));
                    start = t;
                }
            }
            spans.push((start, e));
        }

        let lerp = |t: f64| -> Point {
            Point::round(
                p0.xf() + t * (p1.xf() - p0.xf()),
                p0.yf() + t * (p1.yf() - p0.yf()),
            )
        };
        let mut created: Vec<LineId> = Vec::new();
        for (s, e) in spans {
            if e - s <= EPS_PARAM {
                continue;
            }
            let a = lerp(s);
            let b = lerp(e);
            if a == b {
                continue;
            }
            let va = self.add_vertex(a.xf(), a.yf(), true)?;
            let vb = self.add_vertex(b.xf(), b.yf(), true)?;
            if self.data.line_map.contains_key(&LineKey::new(a, b)) {
                continue;
            }
            let id = self.data.alloc_line_id();
            self.history.commit(
                &mut self.data,
                Action::structural(EditOp::InsertLine {
                    id,
                    rec: LineRecord {
                        v0: va,
                        v1: vb,
                        front: Side::default(),
                        back: Side::default(),
                        flags: Default::default(),
                    },
                    selected: false,
                }),
            )?;
            created.push(id);
        }

        let mut result: Vec<LineId> = Vec::new();
        for lid in created {
            if let Some(surviving) = self.merge_outward(lid)? {
                result.push(surviving);
            }
        }

        if !skip_rebuild {
            self.rebuild_sectors()?;
        }
        Ok(result)
    }

    /// Merge `lid` outward at each endpoint while a collinear continuation
    /// exists there and the long replacement does not cross anything else.
    /// Returns the surviving line, or `None` when both shorter lines were
    /// dropped in favor of an already-existing long line.
    fn merge_outward(&mut self, mut lid: LineId) -> Result<Option<LineId>, MapError> {
        'merging: loop {
            let Some(line) = self.data.line(lid) else {
                return Ok(None);
            };
            let ends = [(line.v0, line.v1), (line.v1, line.v0)];
            for (pivot, far) in ends {
                let pivot_lines = match self.data.vertex(pivot) {
                    Some(v) => v.lines.clone(),
                    None => continue,
                };
                // Merging erases the shared vertex, so it must carry exactly
                // the two lines being fused.
                if pivot_lines.len() != 2 {
                    continue;
                }
                let nid = if pivot_lines[0] == lid {
                    pivot_lines[1]
                } else {
                    pivot_lines[0]
                };
                let Some(neighbor) = self.data.line(nid) else {
                    continue;
                };
                let n_far = neighbor.other_vertex(pivot);
                if n_far == far {
                    continue;
                }
                let (far_pos, pivot_pos, n_far_pos) = {
                    let f = self.data.vertex(far).map(|v| v.pos());
                    let p = self.data.vertex(pivot).map(|v| v.pos());
                    let n = self.data.vertex(n_far).map(|v| v.pos());
                    match (f, p, n) {
                        (Some(f), Some(p), Some(n)) => (f, p, n),
                        _ => continue,
                    }
                };
                if orientation(
                    far_pos.xf(),
                    far_pos.yf(),
                    n_far_pos.xf(),
                    n_far_pos.yf(),
                    pivot_pos.xf(),
                    pivot_pos.yf(),
                ) != 0
                    || !on_segment(
                        far_pos.xf(),
                        far_pos.yf(),
                        pivot_pos.xf(),
                        pivot_pos.yf(),
                        n_far_pos.xf(),
                        n_far_pos.yf(),
                    )
                {
                    continue;
                }
                let merged_key = LineKey::new(far_pos, n_far_pos);
                if let Some(&existing) = self.data.line_map.get(&merged_key) {
                    if existing == lid || existing == nid {
                        continue;
                    }
                    // The long line is already there: both shorter lines go.
                    trace!(short_a = lid, short_b = nid, long = existing, "merge into existing line");
                    self.commit_remove_line(lid)?;
                    self.commit_remove_line(nid)?;
                    self.remove_vertex_if_orphaned(pivot)?;
                    return Ok(None);
                }
                let ignore: HashSet<LineId> = [lid, nid].into_iter().collect();
                if self
                    .would_segment_cross_any(far_pos, n_far_pos, &ignore)
                    .is_some()
                {
                    continue;
                }
                // The merged line takes its attributes from the older of the
                // two segments; side orientation follows the donor's
                // direction.
                let donor = lid.min(nid);
                let rec = {
                    let d = self.data.line(donor).unwrap();
                    let d_v0_pos = self.data.vertex(d.v0).unwrap().pos();
                    let d_v1_pos = self.data.vertex(d.v1).unwrap().pos();
                    let donor_dir = (
                        d_v1_pos.xf() - d_v0_pos.xf(),
                        d_v1_pos.yf() - d_v0_pos.yf(),
                    );
                    let merged_dir = (
                        n_far_pos.xf() - far_pos.xf(),
                        n_far_pos.yf() - far_pos.yf(),
                    );
                    let same_dir =
                        donor_dir.0 * merged_dir.0 + donor_dir.1 * merged_dir.1 > 0.0;
                    let (front, back) = if same_dir {
                        (d.front.clone(), d.back.clone())
                    } else {
                        (d.back.clone(), d.front.clone())
                    };
                    LineRecord {
                        v0: far,
                        v1: n_far,
                        front,
                        back,
                        flags: d.flags,
                    }
                };
                trace!(short_a = lid, short_b = nid, "collinear merge");
                self.commit_remove_line(lid)?;
                self.commit_remove_line(nid)?;
                self.remove_vertex_if_orphaned(pivot)?;
                let new_id = self.data.alloc_line_id();
                self.history.commit(
                    &mut self.data,
                    Action::structural(EditOp::InsertLine {
                        id: new_id,
                        rec,
                        selected: false,
                    }),
                )?;
                lid = new_id;
                continue 'merging;
            }
            return Ok(Some(lid));
        }
    }

    /// First existing line that properly intersects the candidate segment or
    /// overlaps it collinearly beyond a shared endpoint, ignoring the given
    /// set. Reusable by tool layers for placement validation.
    pub fn would_segment_cross_any(
        &self,
        a: Point,
        b: Point,
        ignore: &HashSet<LineId>,
    ) -> Option<LineId> {
        let mut hits: Vec<LineId> = Vec::new();
        self.data
            .grid
            .query_candidates(Rect::of_segment(a, b), |e| {
                if let EntityRef::Line(id) = e {
                    if !ignore.contains(&id) {
                        hits.push(id);
                    }
                }
                true
            });
        hits.sort_unstable();
        for lid in hits {
            let Some((q0, q1)) = self.data.line_endpoints(lid) else {
                continue;
            };
            match classify_segments(
                a.xf(),
                a.yf(),
                b.xf(),
                b.yf(),
                q0.xf(),
                q0.yf(),
                q1.xf(),
                q1.yf(),
            ) {
                SegRelation::ProperCross { .. } | SegRelation::CollinearOverlap { .. } => {
                    return Some(lid)
                }
                _ => {}
            }
        }
        None
    }
}
