//! Shared helpers for the integration tests: a full structural invariant
//! check and state snapshots for history inversion.
#![allow(dead_code)] // each test binary uses its own subset

use std::collections::{HashMap, HashSet};

use sectored::model::{EntityRef, Rect, Thing};
use sectored::Map;

pub const GRID_CELL: i32 = 128;

fn expected_cells(r: Rect) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    for cy in r.min_y.div_euclid(GRID_CELL)..=r.max_y.div_euclid(GRID_CELL) {
        for cx in r.min_x.div_euclid(GRID_CELL)..=r.max_x.div_euclid(GRID_CELL) {
            out.push((cx, cy));
        }
    }
    out.sort_unstable();
    out
}

fn assert_grid_entry(map: &Map, e: EntityRef, bounds: Rect) {
    assert_eq!(
        map.grid().bounds_of(e),
        Some(bounds),
        "grid bounds mismatch for {e:?}"
    );
    assert_eq!(
        map.grid().cells_of(e),
        expected_cells(bounds),
        "grid cell coverage mismatch for {e:?}"
    );
}

/// Check the global invariants reachable through the public API: key-map
/// bijections, incidence symmetry, unique endpoint pairs, cleared rebuild
/// transients, CCW sectors with consistent side back-references, and exact
/// spatial-grid coverage.
pub fn assert_invariants(map: &Map) {
    // Vertex registry and incidence.
    let mut live_vertices = 0usize;
    for (id, v) in map.vertices() {
        live_vertices += 1;
        assert_eq!(
            map.find_vertex(v.x, v.y),
            Some(id),
            "vertex map lookup broken at ({}, {})",
            v.x,
            v.y
        );
        let mut seen = HashSet::new();
        for &lid in &v.lines {
            assert!(seen.insert(lid), "line {lid} twice in vertex {id} incidence");
            let line = map.line(lid).expect("incident line is live");
            assert!(
                line.v0 == id || line.v1 == id,
                "incidence back-reference broken for vertex {id}"
            );
        }
        assert_grid_entry(map, EntityRef::Vertex(id), Rect::point(v.pos()));
    }
    assert_eq!(live_vertices, map.vertex_count(), "vertex map not bijective");

    // Line registry.
    let mut live_lines = 0usize;
    let mut keys: HashSet<String> = HashSet::new();
    for (id, l) in map.lines() {
        live_lines += 1;
        assert_ne!(l.v0, l.v1, "zero-length line {id}");
        let (p, q) = map.line_endpoints(id).expect("line endpoints live");
        assert_eq!(map.find_line(p, q), Some(id), "line map lookup broken");
        assert!(
            keys.insert(map.line_key(id).unwrap()),
            "duplicate unordered endpoint pair for line {id}"
        );
        for vid in [l.v0, l.v1] {
            let v = map.vertex(vid).expect("endpoint vertex live");
            assert_eq!(
                v.lines.iter().filter(|&&x| x == id).count(),
                1,
                "line {id} not exactly once in vertex {vid} incidence"
            );
        }
        assert!(l.front.sector_old.is_none(), "front sector_old leaked");
        assert!(l.front.sector_override.is_none(), "front override leaked");
        assert!(l.back.sector_old.is_none(), "back sector_old leaked");
        assert!(l.back.sector_override.is_none(), "back override leaked");
        assert_grid_entry(map, EntityRef::Line(id), Rect::of_segment(p, q));
    }
    assert_eq!(live_lines, map.line_count(), "line map not bijective");

    // Sector winding, side back-references, and the parent forest.
    let mut children_of: HashMap<u32, Vec<u32>> = HashMap::new();
    for (sid, s) in map.sectors() {
        assert!(
            s.signed_area() > 0.0,
            "sector {sid} polygon is not CCW (area {})",
            s.signed_area()
        );
        for &(lid, front) in &s.lines {
            let line = map.line(lid).expect("sector boundary line live");
            assert_eq!(
                line.side(front).sector,
                Some(sid),
                "boundary side of sector {sid} does not point back"
            );
        }
        if let Some(p) = s.parent {
            assert!(map.sector(p).is_some(), "dangling parent of sector {sid}");
            children_of.entry(p).or_default().push(sid);
        }
        for &c in &s.children {
            assert_eq!(
                map.sector(c).and_then(|cs| cs.parent),
                Some(sid),
                "child list of sector {sid} out of sync"
            );
        }
        assert_grid_entry(map, EntityRef::Sector(sid), s.bounds);
    }
    for (p, kids) in children_of {
        let listed = &map.sector(p).unwrap().children;
        for k in kids {
            assert!(listed.contains(&k), "sector {k} missing from parent {p}");
        }
    }

    // Every side reference names a live sector that knows the line.
    for (id, l) in map.lines() {
        let mut any = false;
        let mut backed = false;
        for front in [true, false] {
            if let Some(sid) = l.side(front).sector {
                any = true;
                let s = map.sector(sid).expect("side references live sector");
                if s.lines.iter().any(|&(bl, _)| bl == id) {
                    backed = true;
                }
            }
        }
        if any {
            assert!(backed, "line {id} carries sectors but none lists it");
        }
    }

    for (tid, t) in map.things() {
        assert_grid_entry(
            map,
            EntityRef::Thing(tid),
            Rect {
                min_x: t.x,
                min_y: t.y,
                max_x: t.x,
                max_y: t.y,
            },
        );
    }
}

/// Geometry-level snapshot for comparing map states across undo/redo.
/// Sector identity is excluded (sectors are derived and renumbered by
/// rebuilds); their polygons and properties are compared as a multiset.
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    pub vertices: Vec<(i32, i32)>,
    pub lines: Vec<(String, String, String, String, u8)>,
    pub sectors: Vec<(Vec<(i32, i32)>, i32, i32, i32)>,
    pub things: Vec<Thing>,
    pub selection: Vec<EntityRef>,
    pub meta: (String, String),
}

pub fn snapshot(map: &Map) -> Snapshot {
    let mut vertices: Vec<(i32, i32)> = map.vertices().map(|(_, v)| (v.x, v.y)).collect();
    vertices.sort_unstable();
    let mut lines: Vec<(String, String, String, String, u8)> = map
        .lines()
        .map(|(id, l)| {
            (
                map.line_key(id).unwrap(),
                l.front.middle_tex.clone(),
                l.back.middle_tex.clone(),
                format!("{}:{} {}:{}", l.front.offset_x, l.front.offset_y, l.back.offset_x, l.back.offset_y),
                l.flags.bits(),
            )
        })
        .collect();
    lines.sort();
    let mut sectors: Vec<(Vec<(i32, i32)>, i32, i32, i32)> = map
        .sectors()
        .map(|(_, s)| {
            let mut poly: Vec<(i32, i32)> = s
                .flat_xy
                .chunks(2)
                .map(|p| (p[0].round() as i32, p[1].round() as i32))
                .collect();
            poly.sort_unstable();
            (poly, s.props.floor_h, s.props.ceil_h, s.props.light)
        })
        .collect();
    sectors.sort();
    let mut things: Vec<Thing> = map.things().map(|(_, t)| *t).collect();
    things.sort_by_key(|t| (t.x, t.y, t.z, t.type_id, t.angle));
    Snapshot {
        vertices,
        lines,
        sectors,
        things,
        selection: map.selection(),
        meta: (map.metadata().name.clone(), map.metadata().comment.clone()),
    }
}

/// True iff `b` is a rotation of `a` (same cyclic order).
pub fn is_rotation(a: &[(i32, i32)], b: &[(i32, i32)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.is_empty() {
        return true;
    }
    (0..a.len()).any(|shift| (0..a.len()).all(|i| a[i] == b[(i + shift) % b.len()]))
}

/// Sector polygon as integer pairs in stored (CCW) order.
pub fn polygon_of(map: &Map, sid: u32) -> Vec<(i32, i32)> {
    map.sector(sid)
        .expect("sector exists")
        .flat_xy
        .chunks(2)
        .map(|p| (p[0].round() as i32, p[1].round() as i32))
        .collect()
}
