//! Face recovery: rebuild the sector set from the modified-edge working set
//! by tracing CCW loops over directed edges with a next-left turn rule.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::algorithms::nesting;
use crate::geometry::math::{angle_to, signed_area_2d};
use crate::geometry::tolerance::{EPS_ANG, EPS_AREA};
use crate::model::{LineId, Sector, SectorId, SectorProps, VertexId};
use crate::{MapData, MapError, MapEvent};

/// A line traversed in a specific direction. Forward means v0 -> v1; the
/// left of a forward edge is the line's front side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct DirEdge {
    line: LineId,
    forward: bool,
}

impl DirEdge {
    fn origin(self, data: &MapData) -> Option<VertexId> {
        let l = data.line(self.line)?;
        Some(if self.forward { l.v0 } else { l.v1 })
    }

    fn target(self, data: &MapData) -> Option<VertexId> {
        let l = data.line(self.line)?;
        Some(if self.forward { l.v1 } else { l.v0 })
    }

    /// Sector reference carried on the left of this directed edge.
    fn left_sector(self, data: &MapData) -> Option<SectorId> {
        data.line(self.line).and_then(|l| l.side(self.forward).sector)
    }
}

pub(crate) fn rebuild(data: &mut MapData) -> Result<Vec<SectorId>, MapError> {
    if data.modified_lines.is_empty() {
        return Ok(Vec::new());
    }

    // Working set: the modified lines plus every line sharing a vertex with
    // one. Any face whose boundary changed has at least one line here.
    let mut working: HashSet<LineId> = HashSet::new();
    let mut seeds: Vec<LineId> = data
        .modified_lines
        .iter()
        .copied()
        .filter(|&l| data.line(l).is_some())
        .collect();
    seeds.sort_unstable();
    for lid in seeds {
        working.insert(lid);
        let Some(line) = data.line(lid) else { continue };
        for vid in [line.v0, line.v1] {
            if let Some(v) = data.vertex(vid) {
                for &nl in &v.lines {
                    working.insert(nl);
                }
            }
        }
    }

    // Sectors touching the working set are invalid. Their properties become
    // side templates (`sector_old`), their sides detach, and their full
    // boundary joins the retrace universe so surviving faces re-close.
    let mut invalidated: Vec<SectorId> = Vec::new();
    {
        let mut seen: HashSet<SectorId> = HashSet::new();
        let mut wl: Vec<LineId> = working.iter().copied().collect();
        wl.sort_unstable();
        for lid in wl {
            let Some(line) = data.line(lid) else { continue };
            for front in [true, false] {
                if let Some(sid) = line.side(front).sector {
                    if seen.insert(sid) {
                        invalidated.push(sid);
                    }
                }
            }
        }
    }
    debug!(
        working = working.len(),
        invalidated = invalidated.len(),
        "rebuilding sectors"
    );
    for &sid in &invalidated {
        let Some(sector) = data.sector(sid) else {
            // A restored line can carry a reference to a sector a past
            // rebuild already replaced; detach it, seeding the template from
            // the retired-sector record so the face keeps its properties.
            let retired = data.retired_sectors.get(&sid).cloned();
            let wl: Vec<LineId> = working.iter().copied().collect();
            for lid in wl {
                if let Some(line) = data.line_mut(lid) {
                    for front in [true, false] {
                        let side = line.side_mut(front);
                        if side.sector == Some(sid) {
                            side.sector_old = retired.clone();
                            side.sector = None;
                        }
                    }
                }
            }
            continue;
        };
        let (props, boundary): (SectorProps, Vec<LineId>) = (
            sector.props.clone(),
            sector.lines.iter().map(|&(l, _)| l).collect(),
        );
        let mut affected: Vec<LineId> = boundary.clone();
        affected.extend(working.iter().copied());
        for lid in affected {
            let Some(line) = data.line_mut(lid) else {
                continue;
            };
            for front in [true, false] {
                let side = line.side_mut(front);
                if side.sector == Some(sid) {
                    side.sector_old = Some(props.clone());
                    side.sector = None;
                }
            }
        }
        for lid in boundary {
            if data.line(lid).is_some() {
                working.insert(lid);
            }
        }
        nesting::remove_sector_from_map(data, sid);
    }

    // Trace CCW loops. Directed edges of the universe whose left side lost
    // its sector are the starts; walks may pass through untouched geometry,
    // so the per-vertex angle buckets are built over full incidence.
    let mut universe: Vec<LineId> = working.iter().copied().collect();
    universe.sort_unstable();
    let mut buckets: HashMap<VertexId, Vec<(f64, DirEdge)>> = HashMap::new();
    let mut visited: HashSet<DirEdge> = HashSet::new();
    let mut new_sectors: Vec<SectorId> = Vec::new();
    let limit = data.trace_step_limit;

    for lid in universe {
        for forward in [true, false] {
            let start = DirEdge { line: lid, forward };
            if visited.contains(&start) {
                continue;
            }
            if start.left_sector(data).is_some() {
                continue;
            }
            let Some(loop_edges) = trace_loop(data, start, limit, &mut buckets, &mut visited)
            else {
                continue;
            };
            let mut flat: Vec<f64> = Vec::with_capacity(loop_edges.len() * 2);
            for &e in &loop_edges {
                let Some(o) = e.origin(data).and_then(|v| data.vertex(v)) else {
                    continue;
                };
                flat.push(o.x as f64);
                flat.push(o.y as f64);
            }
            let area = signed_area_2d(&flat);
            if area <= EPS_AREA {
                continue; // only interior CCW faces become sectors
            }
            let props = loop_template(data, &loop_edges).unwrap_or_default();
            let sid = data.alloc_sector_id();
            let lines: Vec<(LineId, bool)> =
                loop_edges.iter().map(|e| (e.line, e.forward)).collect();
            let slot = sid as usize;
            if data.sectors.len() <= slot {
                data.sectors.resize_with(slot + 1, || None);
            }
            data.sectors[slot] = Some(Sector::new(lines.clone(), flat, props));
            for (line, front) in lines {
                if let Some(l) = data.line_mut(line) {
                    l.side_mut(front).sector = Some(sid);
                }
            }
            nesting::add_sector_to_map(data, sid);
            new_sectors.push(sid);
        }
    }

    // Transients live only for the duration of a rebuild.
    for l in data.lines.iter_mut().flatten() {
        l.front.sector_old = None;
        l.front.sector_override = None;
        l.back.sector_old = None;
        l.back.sector_override = None;
    }
    data.modified_lines.clear();
    debug!(sectors = new_sectors.len(), "rebuild complete");
    data.emit(MapEvent::SectorsRebuilt {
        sectors: new_sectors.clone(),
    });
    Ok(new_sectors)
}

/// Walk from `start` taking the next-left outgoing edge at every vertex.
/// Returns the closed loop, or `None` when the walk dead-ends, hits a
/// consumed edge, runs into a side that still has a live sector, or exceeds
/// the step guard. Failed loops abort individually; tracing continues with
/// the other start edges.
fn trace_loop(
    data: &MapData,
    start: DirEdge,
    limit: usize,
    buckets: &mut HashMap<VertexId, Vec<(f64, DirEdge)>>,
    visited: &mut HashSet<DirEdge>,
) -> Option<Vec<DirEdge>> {
    let mut out: Vec<DirEdge> = Vec::new();
    let mut edge = start;
    let mut steps = 0usize;
    loop {
        steps += 1;
        if steps > limit {
            debug!(start = ?start, steps, "loop trace exceeded step guard");
            return None;
        }
        visited.insert(edge);
        out.push(edge);

        let origin = edge.origin(data)?;
        let arrive = edge.target(data)?;
        let (ox, oy) = {
            let v = data.vertex(origin)?;
            (v.x as f64, v.y as f64)
        };
        let (ax, ay) = {
            let v = data.vertex(arrive)?;
            (v.x as f64, v.y as f64)
        };
        let back_angle = angle_to(ax, ay, ox, oy);

        let bucket = buckets
            .entry(arrive)
            .or_insert_with(|| outgoing_bucket(data, arrive));
        if bucket.is_empty() {
            return None;
        }
        // Next-left: the clockwise-nearest outgoing edge from the reversed
        // incoming direction, i.e. the largest angle strictly below it,
        // wrapping to the largest angle overall. The wrap is also what turns
        // the walk around at a dead end, where only the reverse edge exists.
        let next = bucket
            .iter()
            .rev()
            .find(|(a, _)| *a < back_angle - EPS_ANG)
            .or_else(|| bucket.last())
            .map(|&(_, de)| de)?;
        if next == start {
            return Some(out);
        }
        if visited.contains(&next) {
            return None;
        }
        if next.left_sector(data).is_some() {
            return None;
        }
        edge = next;
    }
}

/// Outgoing directed edges at `v`, sorted by absolute polar angle with line
/// id as the deterministic tie-breaker.
fn outgoing_bucket(data: &MapData, v: VertexId) -> Vec<(f64, DirEdge)> {
    let Some(vertex) = data.vertex(v) else {
        return Vec::new();
    };
    let (vx, vy) = (vertex.x as f64, vertex.y as f64);
    let mut out: Vec<(f64, DirEdge)> = Vec::new();
    for &lid in &vertex.lines {
        let Some(line) = data.line(lid) else { continue };
        let forward = line.v0 == v;
        let other = line.other_vertex(v);
        let Some(o) = data.vertex(other) else { continue };
        let angle = angle_to(vx, vy, o.x as f64, o.y as f64);
        out.push((angle, DirEdge { line: lid, forward }));
    }
    out.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap()
            .then(a.1.line.cmp(&b.1.line))
            .then(a.1.forward.cmp(&b.1.forward))
    });
    out
}

/// Template for a recovered face: walking the loop in order, the first
/// non-null of `sector_override` then `sector_old` on the left side wins.
fn loop_template(data: &MapData, loop_edges: &[DirEdge]) -> Option<SectorProps> {
    for e in loop_edges {
        let line = data.line(e.line)?;
        let side = line.side(e.forward);
        if let Some(p) = &side.sector_override {
            return Some(p.clone());
        }
        if let Some(p) = &side.sector_old {
            return Some(p.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::model::PropValue;
    use crate::Map;

    #[test]
    fn lattice_recovers_every_cell() {
        let mut map = Map::new();
        for i in 0..3 {
            let c = (i * 32) as f64;
            map.add_line(c, 0.0, c, 64.0, false).unwrap();
            map.add_line(0.0, c, 64.0, c, false).unwrap();
        }
        assert_eq!(map.sector_count(), 4);
        for (_, s) in map.sectors() {
            assert!((s.signed_area() - 1024.0).abs() < 1e-9);
        }
    }

    #[test]
    fn open_chain_yields_no_face() {
        let mut map = Map::new();
        map.add_line(0.0, 0.0, 64.0, 0.0, false).unwrap();
        map.add_line(64.0, 0.0, 64.0, 64.0, false).unwrap();
        map.add_line(64.0, 64.0, 0.0, 64.0, false).unwrap();
        assert_eq!(map.sector_count(), 0);
    }

    #[test]
    fn removing_one_wall_dissolves_the_face() {
        let mut map = Map::new();
        map.add_line(0.0, 0.0, 64.0, 0.0, false).unwrap();
        map.add_line(64.0, 0.0, 64.0, 64.0, false).unwrap();
        map.add_line(64.0, 64.0, 0.0, 64.0, false).unwrap();
        map.add_line(0.0, 64.0, 0.0, 0.0, false).unwrap();
        assert_eq!(map.sector_count(), 1);
        assert!(map.remove_line((0.0, 0.0), (64.0, 0.0), false).unwrap());
        assert_eq!(map.sector_count(), 0);
    }

    #[test]
    fn recovered_face_keeps_its_template_properties() {
        let mut map = Map::new();
        map.add_line(0.0, 0.0, 64.0, 0.0, false).unwrap();
        map.add_line(64.0, 0.0, 64.0, 64.0, false).unwrap();
        map.add_line(64.0, 64.0, 0.0, 64.0, false).unwrap();
        map.add_line(0.0, 64.0, 0.0, 0.0, false).unwrap();
        let (sid, _) = map.sectors().next().unwrap();
        map.set_sector_property(sid, "light", PropValue::Int(200))
            .unwrap();

        // Splitting a wall invalidates and retraces the face.
        map.add_vertex(32.0, 0.0, false).unwrap();
        assert_eq!(map.sector_count(), 1);
        let (new_sid, s) = map.sectors().next().unwrap();
        assert_ne!(new_sid, sid, "sectors are recreated, not patched");
        assert_eq!(s.props.light, 200);
    }
}
