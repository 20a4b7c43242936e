//! Sector containment: parent/child tree maintenance, open-side patching,
//! and the child-boundary loop extraction used by renderers.

use std::collections::{HashMap, HashSet};

use crate::geometry::math::{polygon_contains_all_vertices, polygon_contains_point, signed_area_2d};
use crate::model::{EntityRef, LineId, Rect, SectorId, VertexId};
use crate::{Map, MapData, MapError, MapEvent};

/// True iff `ancestor` appears on the parent chain of `sid`.
pub(crate) fn child_of(data: &MapData, sid: SectorId, ancestor: SectorId) -> bool {
    let mut cur = data.sector(sid).and_then(|s| s.parent);
    let mut hops = 0usize;
    while let Some(p) = cur {
        if p == ancestor {
            return true;
        }
        hops += 1;
        if hops > data.sectors.len() {
            break; // cyclic parent chain; treat as unrelated
        }
        cur = data.sector(p).and_then(|s| s.parent);
    }
    false
}

/// Register a freshly built sector: find the most-nested enclosing parent,
/// adopt any sibling the new sector swallowed, and patch open sides so the
/// outside of the new boundary names its parent.
pub(crate) fn add_sector_to_map(data: &mut MapData, sid: SectorId) {
    let (bounds, flat) = {
        let Some(s) = data.sector(sid) else { return };
        (s.bounds, s.flat_xy.clone())
    };

    // Most-nested containing sector wins; a candidate that is a descendant
    // of the current best is strictly deeper.
    let mut candidates: Vec<SectorId> = Vec::new();
    data.grid.query_candidates(bounds, |e| {
        if let EntityRef::Sector(id) = e {
            if id != sid {
                candidates.push(id);
            }
        }
        true
    });
    candidates.sort_unstable();
    let mut best: Option<SectorId> = None;
    for cand in candidates {
        let Some(c) = data.sector(cand) else { continue };
        if !c.bounds.contains(bounds) {
            continue;
        }
        if !polygon_contains_all_vertices(&flat, &c.flat_xy) {
            continue;
        }
        best = match best {
            None => Some(cand),
            Some(b) if child_of(data, cand, b) => Some(cand),
            Some(b) => Some(b),
        };
    }

    if let Some(s) = data.sector_mut(sid) {
        s.parent = best;
    }
    if let Some(p) = best {
        if let Some(ps) = data.sector_mut(p) {
            ps.children.push(sid);
        }
    }

    // Adopt siblings that the new sector fully contains.
    let siblings: Vec<SectorId> = match best {
        Some(p) => data
            .sector(p)
            .map(|s| s.children.iter().copied().filter(|&c| c != sid).collect())
            .unwrap_or_default(),
        None => data
            .sectors
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                Some(s) if s.parent.is_none() && i as SectorId != sid => Some(i as SectorId),
                _ => None,
            })
            .collect(),
    };
    for q in siblings {
        let Some(qs) = data.sector(q) else { continue };
        if !bounds.contains(qs.bounds) {
            continue;
        }
        if !polygon_contains_all_vertices(&qs.flat_xy, &flat) {
            continue;
        }
        // Reparent q under the new sector.
        if let Some(p) = best {
            if let Some(ps) = data.sector_mut(p) {
                ps.children.retain(|&c| c != q);
            }
        }
        if let Some(qs) = data.sector_mut(q) {
            qs.parent = Some(sid);
        }
        if let Some(s) = data.sector_mut(sid) {
            s.children.push(q);
        }
        // The adopted sector's outside is now the new sector's interior.
        patch_child_outer_sides(data, q, best, Some(sid));
    }

    patch_open_sides(data, sid);

    data.grid.insert(EntityRef::Sector(sid), bounds);
    data.emit(MapEvent::SectorAdded { sector: sid });
}

/// For every boundary line of `sid` where one side points to the sector and
/// the other is null, point the null side at the parent. The outside of a
/// new boundary is semantically its enclosing face.
fn patch_open_sides(data: &mut MapData, sid: SectorId) {
    let Some(s) = data.sector(sid) else { return };
    let Some(parent) = s.parent else { return };
    let boundary = s.lines.clone();
    for (lid, front) in boundary {
        let Some(line) = data.line_mut(lid) else { continue };
        if line.side(front).sector == Some(sid) && line.side(!front).sector.is_none() {
            line.side_mut(!front).sector = Some(parent);
        }
    }
}

/// Rewrite the outer sides of `child` (those opposite its own reference)
/// from `from` to `to`; null sides are claimed as well.
fn patch_child_outer_sides(
    data: &mut MapData,
    child: SectorId,
    from: Option<SectorId>,
    to: Option<SectorId>,
) {
    let Some(cs) = data.sector(child) else { return };
    let boundary = cs.lines.clone();
    for (lid, front) in boundary {
        let Some(line) = data.line_mut(lid) else { continue };
        if line.side(front).sector != Some(child) {
            continue;
        }
        let outer = line.side_mut(!front);
        if outer.sector.is_none() || outer.sector == from {
            outer.sector = to;
        }
    }
}

/// Remove a sector from the map: child-outer sides fall back to the sector's
/// parent, children are reparented, and the tree link is cut.
///
/// The sector's own boundary sides are not rewritten here: the caller (the
/// rebuild's invalidation pass) has already nulled every side pointing at
/// `sid` and queued the boundary for retracing.
pub(crate) fn remove_sector_from_map(data: &mut MapData, sid: SectorId) {
    let Some(s) = data.sector(sid) else { return };
    let parent = s.parent;
    let children = s.children.clone();

    for &q in &children {
        patch_child_outer_sides(data, q, Some(sid), parent);
    }
    for q in children {
        if let Some(qs) = data.sector_mut(q) {
            qs.parent = parent;
        }
        if let Some(p) = parent {
            if let Some(ps) = data.sector_mut(p) {
                ps.children.push(q);
            }
        }
    }
    if let Some(p) = parent {
        if let Some(ps) = data.sector_mut(p) {
            ps.children.retain(|&c| c != sid);
        }
    }
    let retired = data.sector(sid).map(|s| s.props.clone());
    if let Some(props) = retired {
        data.retired_sectors.insert(sid, props);
    }
    data.grid.remove(EntityRef::Sector(sid));
    data.selection.remove(&EntityRef::Sector(sid));
    data.sectors[sid as usize] = None;
    data.emit(MapEvent::SectorRemoved { sector: sid });
}

impl Map {
    /// True iff `ancestor` encloses `sid` somewhere up the parent chain.
    pub fn sector_is_child_of(&self, sid: SectorId, ancestor: SectorId) -> bool {
        child_of(&self.data, sid, ancestor)
    }

    /// Most-nested sector strictly containing the point, if any.
    pub fn sector_at(&self, x: f64, y: f64) -> Option<SectorId> {
        let px = x.round() as i32;
        let py = y.round() as i32;
        let mut hits: Vec<SectorId> = Vec::new();
        self.data
            .grid
            .query_candidates(Rect::point(crate::model::Point::new(px, py)), |e| {
                if let EntityRef::Sector(id) = e {
                    hits.push(id);
                }
                true
            });
        hits.sort_unstable();
        let mut best: Option<(SectorId, f64)> = None;
        for sid in hits {
            let Some(s) = self.data.sector(sid) else { continue };
            if !s.bounds.contains_point(px, py) {
                continue;
            }
            if !polygon_contains_point(&s.flat_xy, x, y) {
                continue;
            }
            let area = signed_area_2d(&s.flat_xy).abs();
            best = match best {
                Some((b, ba)) if ba <= area => Some((b, ba)),
                _ => Some((sid, area)),
            };
        }
        best.map(|(sid, _)| sid)
    }

    /// One CCW flat polygon per connected boundary component between this
    /// sector and each of its direct children. Every boundary line is
    /// visited at most once per call.
    pub fn merge_child_vectors(&self, sid: SectorId) -> Result<Vec<Vec<f64>>, MapError> {
        let data = &self.data;
        let sector = data.sector(sid).ok_or(MapError::MissingEntity {
            kind: "sector",
            id: sid,
        })?;
        let mut result: Vec<Vec<f64>> = Vec::new();
        let mut visited: HashSet<LineId> = HashSet::new();
        for &child in &sector.children {
            let Some(cs) = data.sector(child) else { continue };
            // Border lines: the child on one side, this sector on the other.
            let mut border: Vec<LineId> = Vec::new();
            for &(lid, _) in &cs.lines {
                let Some(line) = data.line(lid) else { continue };
                let pair = (line.front.sector, line.back.sector);
                if pair == (Some(sid), Some(child)) || pair == (Some(child), Some(sid)) {
                    if !visited.contains(&lid) {
                        border.push(lid);
                    }
                }
            }
            border.sort_unstable();
            border.dedup();
            // Walk each connected component by chaining shared endpoints.
            let mut incidence: HashMap<VertexId, Vec<LineId>> = HashMap::new();
            for &lid in &border {
                let line = data.line(lid).unwrap();
                incidence.entry(line.v0).or_default().push(lid);
                incidence.entry(line.v1).or_default().push(lid);
            }
            for &start in &border {
                if visited.contains(&start) {
                    continue;
                }
                let first = data.line(start).unwrap();
                let mut flat: Vec<f64> = Vec::new();
                let start_v = first.v0;
                let mut cur_v = first.v0;
                let mut cur_line = start;
                loop {
                    visited.insert(cur_line);
                    let Some(v) = data.vertex(cur_v) else { break };
                    flat.push(v.x as f64);
                    flat.push(v.y as f64);
                    let line = data.line(cur_line).unwrap();
                    let next_v = line.other_vertex(cur_v);
                    if next_v == start_v {
                        break; // loop closed
                    }
                    let next_line = incidence
                        .get(&next_v)
                        .and_then(|ls| ls.iter().find(|&&l| !visited.contains(&l)))
                        .copied();
                    match next_line {
                        Some(nl) => {
                            cur_v = next_v;
                            cur_line = nl;
                        }
                        None => break, // open chain; emit what we have
                    }
                }
                if flat.len() >= 6 {
                    if signed_area_2d(&flat) < 0.0 {
                        // Normalize to CCW.
                        let mut rev: Vec<f64> = Vec::with_capacity(flat.len());
                        for p in flat.chunks(2).rev() {
                            rev.push(p[0]);
                            rev.push(p[1]);
                        }
                        flat = rev;
                    }
                    result.push(flat);
                }
            }
        }
        Ok(result)
    }
}
