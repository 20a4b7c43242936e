//! Neutral, round-trippable serialization. Vertices are stored as coordinate
//! pairs; lines and sector boundaries reference vertices by array index so
//! the document is independent of arena slot layout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history::LineRecord;
use crate::model::{
    LineFlags, LineId, LineKey, MapMeta, Sector, SectorProps, Side, Thing, VertexId,
};
use crate::{algorithms::nesting, Map, MapError};

const DOC_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct VertexSer {
    x: i32,
    y: i32,
}

#[derive(Serialize, Deserialize)]
struct SideSer {
    upper_tex: String,
    middle_tex: String,
    lower_tex: String,
    offset_x: i32,
    offset_y: i32,
}

impl SideSer {
    fn of(side: &Side) -> Self {
        SideSer {
            upper_tex: side.upper_tex.clone(),
            middle_tex: side.middle_tex.clone(),
            lower_tex: side.lower_tex.clone(),
            offset_x: side.offset_x,
            offset_y: side.offset_y,
        }
    }

    fn into_side(self) -> Side {
        Side {
            sector: None,
            sector_old: None,
            sector_override: None,
            upper_tex: self.upper_tex,
            middle_tex: self.middle_tex,
            lower_tex: self.lower_tex,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LineSer {
    v0: u32,
    v1: u32,
    front: SideSer,
    back: SideSer,
    flags: LineFlags,
}

#[derive(Serialize, Deserialize)]
struct SectorSer {
    props: SectorProps,
    /// Boundary in traversal order: vertex indices plus whether the sector
    /// lies on the front side of that step's line.
    lines: Vec<(u32, u32, bool)>,
}

#[derive(Serialize, Deserialize)]
struct Doc {
    version: u32,
    meta: MapMeta,
    vertices: Vec<VertexSer>,
    lines: Vec<LineSer>,
    sectors: Vec<SectorSer>,
    things: Vec<Thing>,
}

pub(crate) fn to_json_impl(map: &Map) -> Value {
    let mut index_of: HashMap<VertexId, u32> = HashMap::new();
    let mut vertices: Vec<VertexSer> = Vec::new();
    for (id, v) in map.vertices() {
        index_of.insert(id, vertices.len() as u32);
        vertices.push(VertexSer { x: v.x, y: v.y });
    }
    let mut lines: Vec<LineSer> = Vec::new();
    for (_, l) in map.lines() {
        lines.push(LineSer {
            v0: index_of[&l.v0],
            v1: index_of[&l.v1],
            front: SideSer::of(&l.front),
            back: SideSer::of(&l.back),
            flags: l.flags,
        });
    }
    let mut sectors: Vec<SectorSer> = Vec::new();
    for (_, s) in map.sectors() {
        let mut boundary: Vec<(u32, u32, bool)> = Vec::new();
        let mut complete = true;
        for &(lid, front) in &s.lines {
            match map.line(lid) {
                Some(l) => boundary.push((index_of[&l.v0], index_of[&l.v1], front)),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            sectors.push(SectorSer {
                props: s.props.clone(),
                lines: boundary,
            });
        }
    }
    let things: Vec<Thing> = map.things().map(|(_, t)| *t).collect();
    serde_json::to_value(Doc {
        version: DOC_VERSION,
        meta: map.metadata().clone(),
        vertices,
        lines,
        sectors,
        things,
    })
    .expect("document serialization cannot fail")
}

pub(crate) fn from_json_impl(map: &mut Map, v: Value) -> Result<(), MapError> {
    let doc: Doc = serde_json::from_value(v).map_err(|e| MapError::Malformed(e.to_string()))?;
    if doc.version != DOC_VERSION {
        return Err(MapError::Malformed(format!(
            "unsupported document version {}",
            doc.version
        )));
    }
    let vertex_count = doc.vertices.len() as u32;
    for l in &doc.lines {
        if l.v0 >= vertex_count || l.v1 >= vertex_count {
            return Err(MapError::Malformed("line references missing vertex".into()));
        }
        if l.v0 == l.v1 {
            return Err(MapError::Malformed("zero-length line in document".into()));
        }
    }
    for s in &doc.sectors {
        for &(v0, v1, _) in &s.lines {
            if v0 >= vertex_count || v1 >= vertex_count {
                return Err(MapError::Malformed(
                    "sector references missing vertex".into(),
                ));
            }
        }
    }

    map.clear();
    let data = &mut map.data;
    for (i, vs) in doc.vertices.iter().enumerate() {
        data.apply_insert_vertex(i as u32, vs.x, vs.y, false)
            .map_err(|_| MapError::Malformed("duplicate vertex coordinates".into()))?;
    }
    for (i, ls) in doc.lines.into_iter().enumerate() {
        data.apply_insert_line(
            i as LineId,
            &LineRecord {
                v0: ls.v0,
                v1: ls.v1,
                front: ls.front.into_side(),
                back: ls.back.into_side(),
                flags: ls.flags,
            },
            false,
        )
        .map_err(|_| MapError::Malformed("duplicate or invalid line".into()))?;
    }
    for ss in doc.sectors {
        let mut boundary: Vec<(LineId, bool)> = Vec::with_capacity(ss.lines.len());
        let mut flat: Vec<f64> = Vec::with_capacity(ss.lines.len() * 2);
        let mut resolved = true;
        for &(v0, v1, front) in &ss.lines {
            let p0 = data.vertex(v0).map(|v| v.pos());
            let p1 = data.vertex(v1).map(|v| v.pos());
            let (Some(p0), Some(p1)) = (p0, p1) else {
                resolved = false;
                break;
            };
            let Some(&lid) = data.line_map.get(&LineKey::new(p0, p1)) else {
                resolved = false;
                break;
            };
            // The stored step direction is v0 -> v1; align the front flag
            // with the registered line's endpoint order.
            let line = data.line(lid).expect("line map entry is live");
            let step_front = if line.v0 == v0 { front } else { !front };
            boundary.push((lid, step_front));
            // Traversal origin: the sector sits on the left of the directed
            // step, so a front step runs v0 -> v1.
            let origin = if front { p0 } else { p1 };
            flat.push(origin.xf());
            flat.push(origin.yf());
        }
        if !resolved || boundary.len() < 3 {
            continue;
        }
        let sid = data.alloc_sector_id();
        let slot = sid as usize;
        if data.sectors.len() <= slot {
            data.sectors.resize_with(slot + 1, || None);
        }
        data.sectors[slot] = Some(Sector::new(boundary.clone(), flat, ss.props));
        for (lid, front) in boundary {
            if let Some(l) = data.line_mut(lid) {
                l.side_mut(front).sector = Some(sid);
            }
        }
        nesting::add_sector_to_map(data, sid);
    }
    for t in doc.things {
        let id = data.alloc_thing_id();
        data.apply_insert_thing(id, t, false)
            .map_err(|_| MapError::Malformed("invalid thing".into()))?;
    }
    data.meta = doc.meta;

    // Full rebuild re-establishes derived state (parent/child links and
    // open-side patching) from the loaded sectors as templates.
    let all_lines: Vec<LineId> = (0..data.lines.len() as u32)
        .filter(|&i| data.line(i).is_some())
        .collect();
    data.modified_lines.extend(all_lines);
    map.rebuild_sectors()?;
    map.history.clear();
    map.data.events.clear();
    Ok(())
}
