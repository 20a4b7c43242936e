//! In-memory geometric core for editing Doom-style 2D sector maps.
//!
//! The map is a planar subdivision of integer-coordinate vertices and
//! undirected lines. Closed CCW faces (sectors) are derived state, recovered
//! incrementally after every batch of edge edits; every primitive mutation is
//! routed through a coalescing undo/redo log.

pub mod model;
pub mod grid;
pub mod history;
pub mod geometry {
    pub mod intersect;
    pub mod math;
    pub mod tolerance;
}
pub mod algorithms {
    pub mod faces;
    pub mod nesting;
    pub mod split;
}
mod json;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::geometry::tolerance::DEFAULT_TRACE_STEP_LIMIT;
use crate::grid::SpatialGrid;
use crate::history::{Action, CoalesceKey, EditOp, History, LineRecord};
use crate::model::{
    EntityRef, Line, LineFlags, LineId, LineKey, MapMeta, Point, PropValue, Rect, Sector, SectorId,
    Side, Thing, ThingId, Vertex, VertexId,
};

#[derive(Debug, Error)]
pub enum MapError {
    /// The core is in an inconsistent state; the caller should undo or
    /// reload rather than continue editing.
    #[error("map state corrupt: {0}")]
    Corrupt(&'static str),
    #[error("unknown property `{name}` on {target}")]
    InvalidProperty { target: &'static str, name: String },
    #[error("type mismatch for property `{name}` on {target}: expected {expected}")]
    TypeMismatch {
        target: &'static str,
        name: String,
        expected: &'static str,
    },
    #[error("unknown {kind} id {id}")]
    MissingEntity { kind: &'static str, id: u32 },
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Typed change notification. Events accumulate on the map and are drained
/// with [`Map::take_events`]; mutating the map from "inside" a notification
/// is therefore impossible by construction.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    VertexAdded { vertex: VertexId },
    VertexRemoved { vertex: VertexId },
    LineAdded { line: LineId },
    LineRemoved { line: LineId },
    SectorAdded { sector: SectorId },
    SectorRemoved { sector: SectorId },
    ThingAdded { thing: ThingId },
    ThingRemoved { thing: ThingId },
    SideChanged {
        line: LineId,
        property: String,
        front: bool,
        value: PropValue,
    },
    FlagsChanged {
        line: LineId,
        property: String,
        value: bool,
    },
    SectorChanged {
        sector: SectorId,
        property: String,
        value: PropValue,
    },
    ThingChanged {
        thing: ThingId,
        property: String,
        value: PropValue,
    },
    MetadataChanged { property: String, value: PropValue },
    SectorsRebuilt { sectors: Vec<SectorId> },
    Select { selection: Vec<EntityRef> },
    Deselect,
}

/// Geometry registry. Everything the history's edit ops mutate lives here;
/// the split from [`Map`] is what lets an op borrow the registry while the
/// history that owns the op is held alongside it.
pub(crate) struct MapData {
    pub(crate) vertices: Vec<Option<Vertex>>,
    pub(crate) lines: Vec<Option<Line>>,
    pub(crate) sectors: Vec<Option<Sector>>,
    pub(crate) things: Vec<Option<Thing>>,
    pub(crate) vertex_map: HashMap<Point, VertexId>,
    pub(crate) line_map: HashMap<LineKey, LineId>,
    pub(crate) modified_lines: HashSet<LineId>,
    pub(crate) selection: HashSet<EntityRef>,
    pub(crate) grid: SpatialGrid,
    pub(crate) meta: MapMeta,
    pub(crate) events: Vec<MapEvent>,
    pub(crate) trace_step_limit: usize,
    /// Properties of sectors removed by past rebuilds, kept so a side
    /// restored by undo/redo can still seed its face's template.
    pub(crate) retired_sectors: HashMap<SectorId, crate::model::SectorProps>,
}

impl MapData {
    fn new() -> Self {
        MapData {
            vertices: Vec::new(),
            lines: Vec::new(),
            sectors: Vec::new(),
            things: Vec::new(),
            vertex_map: HashMap::new(),
            line_map: HashMap::new(),
            modified_lines: HashSet::new(),
            selection: HashSet::new(),
            grid: SpatialGrid::default(),
            meta: MapMeta::default(),
            events: Vec::new(),
            trace_step_limit: DEFAULT_TRACE_STEP_LIMIT,
            retired_sectors: HashMap::new(),
        }
    }

    pub(crate) fn emit(&mut self, event: MapEvent) {
        self.events.push(event);
    }

    pub(crate) fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id as usize).and_then(|v| v.as_ref())
    }

    pub(crate) fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id as usize).and_then(|l| l.as_ref())
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> Option<&mut Line> {
        self.lines.get_mut(id as usize).and_then(|l| l.as_mut())
    }

    pub(crate) fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id as usize).and_then(|s| s.as_ref())
    }

    pub(crate) fn sector_mut(&mut self, id: SectorId) -> Option<&mut Sector> {
        self.sectors.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    pub(crate) fn thing(&self, id: ThingId) -> Option<&Thing> {
        self.things.get(id as usize).and_then(|t| t.as_ref())
    }

    pub(crate) fn line_endpoints(&self, id: LineId) -> Option<(Point, Point)> {
        let line = self.line(id)?;
        Some((self.vertex(line.v0)?.pos(), self.vertex(line.v1)?.pos()))
    }

    pub(crate) fn line_key_of(&self, id: LineId) -> Option<LineKey> {
        let (p, q) = self.line_endpoints(id)?;
        Some(LineKey::new(p, q))
    }

    pub(crate) fn alloc_vertex_id(&self) -> VertexId {
        self.vertices.len() as VertexId
    }

    pub(crate) fn alloc_line_id(&self) -> LineId {
        self.lines.len() as LineId
    }

    pub(crate) fn alloc_sector_id(&self) -> SectorId {
        self.sectors.len() as SectorId
    }

    pub(crate) fn alloc_thing_id(&self) -> ThingId {
        self.things.len() as ThingId
    }

    fn ensure_slot<T>(arena: &mut Vec<Option<T>>, id: u32) -> Result<(), MapError> {
        let idx = id as usize;
        if arena.len() <= idx {
            arena.resize_with(idx + 1, || None);
        }
        if arena[idx].is_some() {
            return Err(MapError::Corrupt("arena slot already occupied"));
        }
        Ok(())
    }

    // --- Primitive mutations driven by the history's edit ops ---

    pub(crate) fn apply_insert_vertex(
        &mut self,
        id: VertexId,
        x: i32,
        y: i32,
        selected: bool,
    ) -> Result<(), MapError> {
        let p = Point::new(x, y);
        if self.vertex_map.contains_key(&p) {
            return Err(MapError::Corrupt("vertex key already present"));
        }
        Self::ensure_slot(&mut self.vertices, id)?;
        self.vertices[id as usize] = Some(Vertex {
            x,
            y,
            lines: Vec::new(),
        });
        self.vertex_map.insert(p, id);
        self.grid.insert(EntityRef::Vertex(id), Rect::point(p));
        if selected {
            self.selection.insert(EntityRef::Vertex(id));
        }
        self.emit(MapEvent::VertexAdded { vertex: id });
        Ok(())
    }

    pub(crate) fn apply_remove_vertex(&mut self, id: VertexId) -> Result<(), MapError> {
        let Some(v) = self.vertex(id) else {
            return Err(MapError::Corrupt("removing non-existent vertex"));
        };
        if !v.lines.is_empty() {
            return Err(MapError::Corrupt("removing vertex with incident lines"));
        }
        let p = v.pos();
        if self.vertex_map.remove(&p) != Some(id) {
            return Err(MapError::Corrupt("vertex map out of sync"));
        }
        self.grid.remove(EntityRef::Vertex(id));
        self.selection.remove(&EntityRef::Vertex(id));
        self.vertices[id as usize] = None;
        self.emit(MapEvent::VertexRemoved { vertex: id });
        Ok(())
    }

    pub(crate) fn apply_insert_line(
        &mut self,
        id: LineId,
        rec: &LineRecord,
        selected: bool,
    ) -> Result<(), MapError> {
        if rec.v0 == rec.v1 {
            return Err(MapError::Corrupt("zero-length line"));
        }
        let (p, q) = match (self.vertex(rec.v0), self.vertex(rec.v1)) {
            (Some(a), Some(b)) => (a.pos(), b.pos()),
            _ => return Err(MapError::Corrupt("line endpoint not registered")),
        };
        let key = LineKey::new(p, q);
        if self.line_map.contains_key(&key) {
            return Err(MapError::Corrupt("line key already present"));
        }
        Self::ensure_slot(&mut self.lines, id)?;
        self.lines[id as usize] = Some(Line {
            v0: rec.v0,
            v1: rec.v1,
            front: rec.front.clone(),
            back: rec.back.clone(),
            flags: rec.flags,
        });
        for vid in [rec.v0, rec.v1] {
            if let Some(v) = self.vertices.get_mut(vid as usize).and_then(|v| v.as_mut()) {
                v.lines.push(id);
            }
        }
        self.line_map.insert(key, id);
        self.grid
            .insert(EntityRef::Line(id), Rect::of_segment(p, q));
        self.modified_lines.insert(id);
        if selected {
            self.selection.insert(EntityRef::Line(id));
        }
        self.emit(MapEvent::LineAdded { line: id });
        Ok(())
    }

    pub(crate) fn apply_remove_line(&mut self, id: LineId) -> Result<(), MapError> {
        let Some(line) = self.line(id) else {
            return Err(MapError::Corrupt("removing non-existent line"));
        };
        let (v0, v1) = (line.v0, line.v1);
        let key = self
            .line_key_of(id)
            .ok_or(MapError::Corrupt("line endpoint not registered"))?;
        for vid in [v0, v1] {
            let v = self
                .vertices
                .get_mut(vid as usize)
                .and_then(|v| v.as_mut())
                .ok_or(MapError::Corrupt("line endpoint not registered"))?;
            let pos = v
                .lines
                .iter()
                .position(|&l| l == id)
                .ok_or(MapError::Corrupt("line missing from vertex incidence"))?;
            v.lines.remove(pos);
        }
        if self.line_map.remove(&key) != Some(id) {
            return Err(MapError::Corrupt("line map out of sync"));
        }
        self.grid.remove(EntityRef::Line(id));
        self.selection.remove(&EntityRef::Line(id));
        self.modified_lines.remove(&id);
        // Surviving neighbors cover the hole this removal leaves; face
        // recovery needs them in the working set.
        for vid in [v0, v1] {
            if let Some(v) = self.vertex(vid) {
                let nls: Vec<LineId> = v.lines.clone();
                for nl in nls {
                    self.modified_lines.insert(nl);
                }
            }
        }
        self.lines[id as usize] = None;
        self.emit(MapEvent::LineRemoved { line: id });
        Ok(())
    }

    pub(crate) fn apply_insert_thing(
        &mut self,
        id: ThingId,
        thing: Thing,
        selected: bool,
    ) -> Result<(), MapError> {
        Self::ensure_slot(&mut self.things, id)?;
        self.things[id as usize] = Some(thing);
        self.grid
            .insert(EntityRef::Thing(id), Rect::point(Point::new(thing.x, thing.y)));
        if selected {
            self.selection.insert(EntityRef::Thing(id));
        }
        self.emit(MapEvent::ThingAdded { thing: id });
        Ok(())
    }

    pub(crate) fn apply_remove_thing(&mut self, id: ThingId) -> Result<(), MapError> {
        if self.thing(id).is_none() {
            return Err(MapError::Corrupt("removing non-existent thing"));
        }
        self.grid.remove(EntityRef::Thing(id));
        self.selection.remove(&EntityRef::Thing(id));
        self.things[id as usize] = None;
        self.emit(MapEvent::ThingRemoved { thing: id });
        Ok(())
    }

    pub(crate) fn apply_set_thing_pos(
        &mut self,
        id: ThingId,
        x: i32,
        y: i32,
    ) -> Result<(), MapError> {
        let Some(t) = self.things.get_mut(id as usize).and_then(|t| t.as_mut()) else {
            return Err(MapError::MissingEntity {
                kind: "thing",
                id,
            });
        };
        let (ox, oy) = (t.x, t.y);
        t.x = x;
        t.y = y;
        self.grid
            .update(EntityRef::Thing(id), Rect::point(Point::new(x, y)));
        if ox != x {
            self.emit(MapEvent::ThingChanged {
                thing: id,
                property: "x".to_string(),
                value: PropValue::Int(x),
            });
        }
        if oy != y {
            self.emit(MapEvent::ThingChanged {
                thing: id,
                property: "y".to_string(),
                value: PropValue::Int(y),
            });
        }
        Ok(())
    }

    pub(crate) fn apply_set_thing_prop(
        &mut self,
        id: ThingId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), MapError> {
        let Some(t) = self.things.get_mut(id as usize).and_then(|t| t.as_mut()) else {
            return Err(MapError::MissingEntity { kind: "thing", id });
        };
        match (name, value) {
            ("z", PropValue::Int(v)) => t.z = *v,
            ("type_id", PropValue::Int(v)) => t.type_id = *v,
            ("angle", PropValue::Int(v)) => t.angle = *v,
            ("z" | "type_id" | "angle", _) => {
                return Err(MapError::TypeMismatch {
                    target: "thing",
                    name: name.to_string(),
                    expected: "int",
                })
            }
            _ => {
                return Err(MapError::InvalidProperty {
                    target: "thing",
                    name: name.to_string(),
                })
            }
        }
        self.emit(MapEvent::ThingChanged {
            thing: id,
            property: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    pub(crate) fn apply_set_side(
        &mut self,
        id: LineId,
        front: bool,
        name: &str,
        value: &PropValue,
    ) -> Result<(), MapError> {
        let Some(line) = self.line_mut(id) else {
            return Err(MapError::MissingEntity { kind: "line", id });
        };
        let side = line.side_mut(front);
        match (name, value) {
            ("upper_tex", PropValue::Str(s)) => side.upper_tex = s.clone(),
            ("middle_tex", PropValue::Str(s)) => side.middle_tex = s.clone(),
            ("lower_tex", PropValue::Str(s)) => side.lower_tex = s.clone(),
            ("offset_x", PropValue::Int(v)) => side.offset_x = *v,
            ("offset_y", PropValue::Int(v)) => side.offset_y = *v,
            ("upper_tex" | "middle_tex" | "lower_tex", _) => {
                return Err(MapError::TypeMismatch {
                    target: "side",
                    name: name.to_string(),
                    expected: "string",
                })
            }
            ("offset_x" | "offset_y", _) => {
                return Err(MapError::TypeMismatch {
                    target: "side",
                    name: name.to_string(),
                    expected: "int",
                })
            }
            _ => {
                return Err(MapError::InvalidProperty {
                    target: "side",
                    name: name.to_string(),
                })
            }
        }
        self.emit(MapEvent::SideChanged {
            line: id,
            property: name.to_string(),
            front,
            value: value.clone(),
        });
        Ok(())
    }

    pub(crate) fn apply_set_flag(
        &mut self,
        id: LineId,
        name: &str,
        value: bool,
    ) -> Result<(), MapError> {
        let flag = LineFlags::named(name).ok_or_else(|| MapError::InvalidProperty {
            target: "line flags",
            name: name.to_string(),
        })?;
        let Some(line) = self.line_mut(id) else {
            return Err(MapError::MissingEntity { kind: "line", id });
        };
        line.flags.set(flag, value);
        self.emit(MapEvent::FlagsChanged {
            line: id,
            property: name.to_string(),
            value,
        });
        Ok(())
    }

    pub(crate) fn apply_set_sector_prop(
        &mut self,
        id: SectorId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), MapError> {
        let Some(sector) = self.sector_mut(id) else {
            // Sectors are rebuilt wholesale; a recorded property action can
            // outlive its target. Undoing across that boundary is a no-op.
            debug!(sector = id, "property op on rebuilt-away sector ignored");
            return Ok(());
        };
        match (name, value) {
            ("floor_h", PropValue::Int(v)) => sector.props.floor_h = *v,
            ("ceil_h", PropValue::Int(v)) => sector.props.ceil_h = *v,
            ("light", PropValue::Int(v)) => sector.props.light = *v,
            ("special", PropValue::Int(v)) => sector.props.special = *v,
            ("tag", PropValue::Int(v)) => sector.props.tag = *v,
            ("floor_tex", PropValue::Str(s)) => sector.props.floor_tex = s.clone(),
            ("ceil_tex", PropValue::Str(s)) => sector.props.ceil_tex = s.clone(),
            ("floor_h" | "ceil_h" | "light" | "special" | "tag", _) => {
                return Err(MapError::TypeMismatch {
                    target: "sector",
                    name: name.to_string(),
                    expected: "int",
                })
            }
            ("floor_tex" | "ceil_tex", _) => {
                return Err(MapError::TypeMismatch {
                    target: "sector",
                    name: name.to_string(),
                    expected: "string",
                })
            }
            _ => {
                return Err(MapError::InvalidProperty {
                    target: "sector",
                    name: name.to_string(),
                })
            }
        }
        self.emit(MapEvent::SectorChanged {
            sector: id,
            property: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    pub(crate) fn apply_set_meta(&mut self, name: &str, value: &PropValue) -> Result<(), MapError> {
        match (name, value) {
            ("name", PropValue::Str(s)) => self.meta.name = s.clone(),
            ("comment", PropValue::Str(s)) => self.meta.comment = s.clone(),
            ("name" | "comment", _) => {
                return Err(MapError::TypeMismatch {
                    target: "map",
                    name: name.to_string(),
                    expected: "string",
                })
            }
            _ => {
                return Err(MapError::InvalidProperty {
                    target: "map",
                    name: name.to_string(),
                })
            }
        }
        self.emit(MapEvent::MetadataChanged {
            property: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.vertices.clear();
        self.lines.clear();
        self.sectors.clear();
        self.things.clear();
        self.vertex_map.clear();
        self.line_map.clear();
        self.modified_lines.clear();
        self.selection.clear();
        self.grid.clear();
        self.meta = MapMeta::default();
        self.events.clear();
        self.retired_sectors.clear();
    }
}

/// The map core: registry plus history. All edits go through here.
pub struct Map {
    pub(crate) data: MapData,
    pub(crate) history: History,
}

impl Default for Map {
    fn default() -> Self {
        Map::new()
    }
}

impl Map {
    pub fn new() -> Self {
        Map {
            data: MapData::new(),
            history: History::default(),
        }
    }

    // --- Read access ---

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.data.vertex(id)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.data.line(id)
    }

    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.data.sector(id)
    }

    pub fn thing(&self, id: ThingId) -> Option<&Thing> {
        self.data.thing(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.data
            .vertices
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i as VertexId, v)))
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineId, &Line)> {
        self.data
            .lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|l| (i as LineId, l)))
    }

    pub fn sectors(&self) -> impl Iterator<Item = (SectorId, &Sector)> {
        self.data
            .sectors
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i as SectorId, s)))
    }

    pub fn things(&self) -> impl Iterator<Item = (ThingId, &Thing)> {
        self.data
            .things
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (i as ThingId, t)))
    }

    pub fn vertex_count(&self) -> usize {
        self.data.vertex_map.len()
    }

    pub fn line_count(&self) -> usize {
        self.data.line_map.len()
    }

    pub fn sector_count(&self) -> usize {
        self.sectors().count()
    }

    pub fn thing_count(&self) -> usize {
        self.things().count()
    }

    /// Vertex at exactly (x, y), if registered.
    pub fn find_vertex(&self, x: i32, y: i32) -> Option<VertexId> {
        self.data.vertex_map.get(&Point::new(x, y)).copied()
    }

    /// Line with the unordered endpoint pair (p, q), if registered.
    pub fn find_line(&self, p: Point, q: Point) -> Option<LineId> {
        self.data.line_map.get(&LineKey::new(p, q)).copied()
    }

    /// Stable persistence key of a vertex, `"x,y"`.
    pub fn vertex_key(&self, id: VertexId) -> Option<String> {
        self.data.vertex(id).map(|v| v.pos().key_string())
    }

    /// Stable persistence key of a line, `"x0,y0:x1,y1"` with endpoints
    /// lexicographically ordered.
    pub fn line_key(&self, id: LineId) -> Option<String> {
        self.data.line_key_of(id).map(|k| k.key_string())
    }

    pub fn line_endpoints(&self, id: LineId) -> Option<(Point, Point)> {
        self.data.line_endpoints(id)
    }

    pub fn metadata(&self) -> &MapMeta {
        &self.data.meta
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.data.grid
    }

    pub fn modified_line_count(&self) -> usize {
        self.data.modified_lines.len()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Drain accumulated change notifications.
    pub fn take_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.data.events)
    }

    /// Configure the loop-trace step guard (floor 1000).
    pub fn set_trace_step_limit(&mut self, limit: usize) {
        self.data.trace_step_limit = limit.max(1000);
    }

    pub fn trace_step_limit(&self) -> usize {
        self.data.trace_step_limit
    }

    // --- Vertex edits ---

    /// Insert (or find) the vertex at the rounded position. Any line that is
    /// collinear with the new vertex and contains it is split in two, with
    /// side attributes preserved on both halves.
    pub fn add_vertex(&mut self, x: f64, y: f64, skip_rebuild: bool) -> Result<VertexId, MapError> {
        let p = Point::round(x, y);
        if let Some(&id) = self.data.vertex_map.get(&p) {
            return Ok(id);
        }
        let id = self.data.alloc_vertex_id();
        self.history.commit(
            &mut self.data,
            Action::structural(EditOp::InsertVertex {
                id,
                x: p.x,
                y: p.y,
                selected: false,
            }),
        )?;
        self.split_lines_through(p)?;
        if !skip_rebuild {
            self.rebuild_sectors()?;
        }
        Ok(id)
    }

    /// Remove the vertex at the rounded position along with its incident
    /// lines. Returns false when no vertex lives there.
    pub fn remove_vertex(&mut self, x: f64, y: f64, skip_rebuild: bool) -> Result<bool, MapError> {
        let p = Point::round(x, y);
        let Some(&id) = self.data.vertex_map.get(&p) else {
            return Ok(false);
        };
        let incident: Vec<LineId> = self.data.vertex(id).map(|v| v.lines.clone()).unwrap_or_default();
        for lid in incident {
            self.remove_line_by_id(lid, id)?;
        }
        self.commit_remove_vertex(id)?;
        if !skip_rebuild {
            self.rebuild_sectors()?;
        }
        Ok(true)
    }

    /// Move the vertex at `from` to `to`, merging with any vertex already at
    /// the destination. Moves are expressed as reinsertions so history
    /// composes; no vertex is mutated in place.
    pub fn move_vertex(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        skip_rebuild: bool,
    ) -> Result<bool, MapError> {
        let src = Point::round(from.0, from.1);
        let dst = Point::round(to.0, to.1);
        if src == dst {
            return Ok(false);
        }
        let Some(&old_id) = self.data.vertex_map.get(&src) else {
            return Ok(false);
        };
        let new_id = self.add_vertex(dst.xf(), dst.yf(), true)?;
        let incident: Vec<LineId> = self
            .data
            .vertex(old_id)
            .map(|v| v.lines.clone())
            .unwrap_or_default();
        for lid in incident {
            let Some(line) = self.data.line(lid) else {
                continue;
            };
            let other = line.other_vertex(old_id);
            if other == new_id {
                // Collapsed to zero length.
                self.commit_remove_line(lid)?;
                continue;
            }
            let other_pos = self
                .data
                .vertex(other)
                .map(|v| v.pos())
                .ok_or(MapError::Corrupt("line endpoint not registered"))?;
            if self.data.line_map.contains_key(&LineKey::new(dst, other_pos)) {
                // The moved copy already exists; the old line just dies.
                self.commit_remove_line(lid)?;
                continue;
            }
            // Clone the line onto the moved endpoint.
            let rec = {
                let line = self.data.line(lid).unwrap();
                let (nv0, nv1) = if line.v0 == old_id {
                    (new_id, line.v1)
                } else {
                    (line.v0, new_id)
                };
                LineRecord {
                    v0: nv0,
                    v1: nv1,
                    front: line.front.clone(),
                    back: line.back.clone(),
                    flags: line.flags,
                }
            };
            self.commit_remove_line(lid)?;
            let nid = self.data.alloc_line_id();
            self.history.commit(
                &mut self.data,
                Action::structural(EditOp::InsertLine {
                    id: nid,
                    rec,
                    selected: false,
                }),
            )?;
        }
        self.commit_remove_vertex(old_id)?;
        if !skip_rebuild {
            self.rebuild_sectors()?;
        }
        Ok(true)
    }

    // --- Line edits (add_line lives in algorithms::split) ---

    /// Remove the line between the two rounded positions, if present.
    pub fn remove_line(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        skip_rebuild: bool,
    ) -> Result<bool, MapError> {
        let p = Point::round(from.0, from.1);
        let q = Point::round(to.0, to.1);
        let Some(&id) = self.data.line_map.get(&LineKey::new(p, q)) else {
            return Ok(false);
        };
        let (v0, v1) = {
            let line = self.data.line(id).ok_or(MapError::Corrupt("line map out of sync"))?;
            (line.v0, line.v1)
        };
        self.commit_remove_line(id)?;
        for vid in [v0, v1] {
            self.remove_vertex_if_orphaned(vid)?;
        }
        if !skip_rebuild {
            self.rebuild_sectors()?;
        }
        Ok(true)
    }

    /// Remove a line by id and clean up endpoints that end up with no
    /// incident lines, except `keep`, whose removal the caller drives.
    pub(crate) fn remove_line_by_id(
        &mut self,
        id: LineId,
        keep: VertexId,
    ) -> Result<(), MapError> {
        let (v0, v1) = {
            let line = self
                .data
                .line(id)
                .ok_or(MapError::Corrupt("removing non-existent line"))?;
            (line.v0, line.v1)
        };
        self.commit_remove_line(id)?;
        for vid in [v0, v1] {
            if vid != keep {
                self.remove_vertex_if_orphaned(vid)?;
            }
        }
        Ok(())
    }

    pub(crate) fn commit_remove_line(&mut self, id: LineId) -> Result<(), MapError> {
        let line = self
            .data
            .line(id)
            .ok_or(MapError::Corrupt("removing non-existent line"))?;
        let rec = LineRecord {
            v0: line.v0,
            v1: line.v1,
            front: line.front.clone(),
            back: line.back.clone(),
            flags: line.flags,
        };
        let selected = self.data.selection.contains(&EntityRef::Line(id));
        self.history.commit(
            &mut self.data,
            Action::structural(EditOp::RemoveLine { id, rec, selected }),
        )
    }

    pub(crate) fn commit_remove_vertex(&mut self, id: VertexId) -> Result<(), MapError> {
        let v = self
            .data
            .vertex(id)
            .ok_or(MapError::Corrupt("removing non-existent vertex"))?;
        let (x, y) = (v.x, v.y);
        let selected = self.data.selection.contains(&EntityRef::Vertex(id));
        self.history.commit(
            &mut self.data,
            Action::structural(EditOp::RemoveVertex { id, x, y, selected }),
        )
    }

    /// A vertex lives only as long as its last incident line, unless it was
    /// never attached to one.
    pub(crate) fn remove_vertex_if_orphaned(&mut self, id: VertexId) -> Result<(), MapError> {
        if let Some(v) = self.data.vertex(id) {
            if v.lines.is_empty() {
                self.commit_remove_vertex(id)?;
            }
        }
        Ok(())
    }

    // --- Thing edits ---

    pub fn add_thing(
        &mut self,
        x: f64,
        y: f64,
        z: i32,
        type_id: i32,
        angle: i32,
    ) -> Result<ThingId, MapError> {
        let p = Point::round(x, y);
        let id = self.data.alloc_thing_id();
        self.history.commit(
            &mut self.data,
            Action::structural(EditOp::InsertThing {
                id,
                thing: Thing {
                    x: p.x,
                    y: p.y,
                    z,
                    type_id,
                    angle,
                },
                selected: false,
            }),
        )?;
        Ok(id)
    }

    pub fn remove_thing(&mut self, id: ThingId) -> Result<bool, MapError> {
        let Some(thing) = self.data.thing(id).copied() else {
            return Ok(false);
        };
        let selected = self.data.selection.contains(&EntityRef::Thing(id));
        self.history.commit(
            &mut self.data,
            Action::structural(EditOp::RemoveThing {
                id,
                thing,
                selected,
            }),
        )?;
        Ok(true)
    }

    /// Move a thing; successive moves of the same thing coalesce into one
    /// undoable step (drag behavior).
    pub fn move_thing(&mut self, id: ThingId, x: f64, y: f64) -> Result<bool, MapError> {
        let p = Point::round(x, y);
        let Some(thing) = self.data.thing(id).copied() else {
            return Ok(false);
        };
        if (thing.x, thing.y) == (p.x, p.y) {
            return Ok(false);
        }
        self.history.commit(
            &mut self.data,
            Action::keyed(
                EditOp::SetThingPos {
                    id,
                    from: (thing.x, thing.y),
                    to: (p.x, p.y),
                },
                CoalesceKey {
                    target: Some(EntityRef::Thing(id)),
                    param: "pos".to_string(),
                },
            ),
        )?;
        Ok(true)
    }

    // --- Property setters ---

    /// Set a named side attribute. Unknown names and type mismatches are
    /// rejected before any state changes; setting the current value is a
    /// silent no-op that records no history.
    pub fn set_side_property(
        &mut self,
        line: LineId,
        front: bool,
        name: &str,
        value: PropValue,
    ) -> Result<bool, MapError> {
        let current = {
            let l = self.data.line(line).ok_or(MapError::MissingEntity {
                kind: "line",
                id: line,
            })?;
            let side = l.side(front);
            match name {
                "upper_tex" => PropValue::Str(side.upper_tex.clone()),
                "middle_tex" => PropValue::Str(side.middle_tex.clone()),
                "lower_tex" => PropValue::Str(side.lower_tex.clone()),
                "offset_x" => PropValue::Int(side.offset_x),
                "offset_y" => PropValue::Int(side.offset_y),
                _ => {
                    return Err(MapError::InvalidProperty {
                        target: "side",
                        name: name.to_string(),
                    })
                }
            }
        };
        if current.type_name() != value.type_name() {
            return Err(MapError::TypeMismatch {
                target: "side",
                name: name.to_string(),
                expected: current.type_name(),
            });
        }
        if current == value {
            return Ok(false);
        }
        let which = if front { "front" } else { "back" };
        self.history.commit(
            &mut self.data,
            Action::keyed(
                EditOp::SetSideProp {
                    line,
                    front,
                    name: name.to_string(),
                    from: current,
                    to: value,
                },
                CoalesceKey {
                    target: Some(EntityRef::Line(line)),
                    param: format!("{which}:{name}"),
                },
            ),
        )?;
        Ok(true)
    }

    pub fn set_line_flag(
        &mut self,
        line: LineId,
        name: &str,
        value: bool,
    ) -> Result<bool, MapError> {
        let flag = LineFlags::named(name).ok_or_else(|| MapError::InvalidProperty {
            target: "line flags",
            name: name.to_string(),
        })?;
        let current = self
            .data
            .line(line)
            .ok_or(MapError::MissingEntity {
                kind: "line",
                id: line,
            })?
            .flags
            .contains(flag);
        if current == value {
            return Ok(false);
        }
        self.history.commit(
            &mut self.data,
            Action::keyed(
                EditOp::SetFlag {
                    line,
                    name: name.to_string(),
                    from: current,
                    to: value,
                },
                CoalesceKey {
                    target: Some(EntityRef::Line(line)),
                    param: format!("flag:{name}"),
                },
            ),
        )?;
        Ok(true)
    }

    pub fn set_sector_property(
        &mut self,
        sector: SectorId,
        name: &str,
        value: PropValue,
    ) -> Result<bool, MapError> {
        let current = {
            let s = self.data.sector(sector).ok_or(MapError::MissingEntity {
                kind: "sector",
                id: sector,
            })?;
            match name {
                "floor_h" => PropValue::Int(s.props.floor_h),
                "ceil_h" => PropValue::Int(s.props.ceil_h),
                "light" => PropValue::Int(s.props.light),
                "special" => PropValue::Int(s.props.special),
                "tag" => PropValue::Int(s.props.tag),
                "floor_tex" => PropValue::Str(s.props.floor_tex.clone()),
                "ceil_tex" => PropValue::Str(s.props.ceil_tex.clone()),
                _ => {
                    return Err(MapError::InvalidProperty {
                        target: "sector",
                        name: name.to_string(),
                    })
                }
            }
        };
        if current.type_name() != value.type_name() {
            return Err(MapError::TypeMismatch {
                target: "sector",
                name: name.to_string(),
                expected: current.type_name(),
            });
        }
        if current == value {
            return Ok(false);
        }
        self.history.commit(
            &mut self.data,
            Action::keyed(
                EditOp::SetSectorProp {
                    sector,
                    name: name.to_string(),
                    from: current,
                    to: value,
                },
                CoalesceKey {
                    target: Some(EntityRef::Sector(sector)),
                    param: name.to_string(),
                },
            ),
        )?;
        Ok(true)
    }

    pub fn set_thing_property(
        &mut self,
        thing: ThingId,
        name: &str,
        value: PropValue,
    ) -> Result<bool, MapError> {
        let t = self.data.thing(thing).copied().ok_or(MapError::MissingEntity {
            kind: "thing",
            id: thing,
        })?;
        let current = match name {
            "z" => PropValue::Int(t.z),
            "type_id" => PropValue::Int(t.type_id),
            "angle" => PropValue::Int(t.angle),
            _ => {
                return Err(MapError::InvalidProperty {
                    target: "thing",
                    name: name.to_string(),
                })
            }
        };
        if !matches!(value, PropValue::Int(_)) {
            return Err(MapError::TypeMismatch {
                target: "thing",
                name: name.to_string(),
                expected: "int",
            });
        }
        if current == value {
            return Ok(false);
        }
        self.history.commit(
            &mut self.data,
            Action::keyed(
                EditOp::SetThingProp {
                    id: thing,
                    name: name.to_string(),
                    from: current,
                    to: value,
                },
                CoalesceKey {
                    target: Some(EntityRef::Thing(thing)),
                    param: name.to_string(),
                },
            ),
        )?;
        Ok(true)
    }

    pub fn set_map_property(&mut self, name: &str, value: PropValue) -> Result<bool, MapError> {
        let current = match name {
            "name" => PropValue::Str(self.data.meta.name.clone()),
            "comment" => PropValue::Str(self.data.meta.comment.clone()),
            _ => {
                return Err(MapError::InvalidProperty {
                    target: "map",
                    name: name.to_string(),
                })
            }
        };
        if current.type_name() != value.type_name() {
            return Err(MapError::TypeMismatch {
                target: "map",
                name: name.to_string(),
                expected: current.type_name(),
            });
        }
        if current == value {
            return Ok(false);
        }
        self.history.commit(
            &mut self.data,
            Action::keyed(
                EditOp::SetMeta {
                    name: name.to_string(),
                    from: current,
                    to: value,
                },
                CoalesceKey {
                    target: None,
                    param: format!("meta:{name}"),
                },
            ),
        )?;
        Ok(true)
    }

    // --- Selection ---

    pub fn set_selection(&mut self, refs: &[EntityRef]) {
        self.data.selection = refs.iter().copied().collect();
        let mut current: Vec<EntityRef> = self.data.selection.iter().copied().collect();
        current.sort_unstable();
        self.data.emit(MapEvent::Select { selection: current });
    }

    pub fn clear_selection(&mut self) {
        if !self.data.selection.is_empty() {
            self.data.selection.clear();
            self.data.emit(MapEvent::Deselect);
        }
    }

    pub fn selection(&self) -> Vec<EntityRef> {
        let mut out: Vec<EntityRef> = self.data.selection.iter().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn is_selected(&self, e: EntityRef) -> bool {
        self.data.selection.contains(&e)
    }

    // --- Undo / redo ---

    pub fn undo(&mut self) -> Result<bool, MapError> {
        let applied = self.history.undo(&mut self.data)?;
        if applied && !self.data.modified_lines.is_empty() {
            self.rebuild_sectors()?;
        }
        Ok(applied)
    }

    pub fn redo(&mut self) -> Result<bool, MapError> {
        let applied = self.history.redo(&mut self.data)?;
        if applied && !self.data.modified_lines.is_empty() {
            self.rebuild_sectors()?;
        }
        Ok(applied)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // --- Face recovery ---

    /// Re-derive sectors from the modified-edge working set. No-op when
    /// nothing changed since the last rebuild.
    pub fn rebuild_sectors(&mut self) -> Result<Vec<SectorId>, MapError> {
        algorithms::faces::rebuild(&mut self.data)
    }

    // --- Spatial iteration ---

    pub fn iterate_vertices<F: FnMut(VertexId, &Vertex) -> bool>(
        &self,
        bounds: Option<Rect>,
        selection_only: bool,
        mut f: F,
    ) {
        match bounds {
            Some(r) => {
                self.data.grid.query_contained(r, |e| {
                    if let EntityRef::Vertex(id) = e {
                        if selection_only && !self.data.selection.contains(&e) {
                            return true;
                        }
                        if let Some(v) = self.data.vertex(id) {
                            return f(id, v);
                        }
                    }
                    true
                });
            }
            None => {
                for (id, v) in self.vertices() {
                    if selection_only && !self.data.selection.contains(&EntityRef::Vertex(id)) {
                        continue;
                    }
                    if !f(id, v) {
                        break;
                    }
                }
            }
        }
    }

    pub fn iterate_lines<F: FnMut(LineId, &Line) -> bool>(
        &self,
        bounds: Option<Rect>,
        selection_only: bool,
        mut f: F,
    ) {
        match bounds {
            Some(r) => {
                self.data.grid.query_contained(r, |e| {
                    if let EntityRef::Line(id) = e {
                        if selection_only && !self.data.selection.contains(&e) {
                            return true;
                        }
                        if let Some(l) = self.data.line(id) {
                            return f(id, l);
                        }
                    }
                    true
                });
            }
            None => {
                for (id, l) in self.lines() {
                    if selection_only && !self.data.selection.contains(&EntityRef::Line(id)) {
                        continue;
                    }
                    if !f(id, l) {
                        break;
                    }
                }
            }
        }
    }

    pub fn iterate_sectors<F: FnMut(SectorId, &Sector) -> bool>(
        &self,
        bounds: Option<Rect>,
        selection_only: bool,
        mut f: F,
    ) {
        match bounds {
            Some(r) => {
                self.data.grid.query_contained(r, |e| {
                    if let EntityRef::Sector(id) = e {
                        if selection_only && !self.data.selection.contains(&e) {
                            return true;
                        }
                        if let Some(s) = self.data.sector(id) {
                            return f(id, s);
                        }
                    }
                    true
                });
            }
            None => {
                for (id, s) in self.sectors() {
                    if selection_only && !self.data.selection.contains(&EntityRef::Sector(id)) {
                        continue;
                    }
                    if !f(id, s) {
                        break;
                    }
                }
            }
        }
    }

    pub fn iterate_things<F: FnMut(ThingId, &Thing) -> bool>(
        &self,
        bounds: Option<Rect>,
        selection_only: bool,
        mut f: F,
    ) {
        match bounds {
            Some(r) => {
                self.data.grid.query_contained(r, |e| {
                    if let EntityRef::Thing(id) = e {
                        if selection_only && !self.data.selection.contains(&e) {
                            return true;
                        }
                        if let Some(t) = self.data.thing(id) {
                            return f(id, t);
                        }
                    }
                    true
                });
            }
            None => {
                for (id, t) in self.things() {
                    if selection_only && !self.data.selection.contains(&EntityRef::Thing(id)) {
                        continue;
                    }
                    if !f(id, t) {
                        break;
                    }
                }
            }
        }
    }

    // --- Copy / paste / serialize ---

    /// Build a new map holding copies of the selected entities. Line
    /// endpoints are carried along even when not explicitly selected;
    /// sectors come across only when their whole boundary does.
    pub fn copy_selection(&self) -> Map {
        let mut out = Map::new();
        let mut selected_vertices: Vec<VertexId> = Vec::new();
        let mut selected_lines: Vec<LineId> = Vec::new();
        let mut selected_sectors: Vec<SectorId> = Vec::new();
        let mut selected_things: Vec<ThingId> = Vec::new();
        for e in self.selection() {
            match e {
                EntityRef::Vertex(id) => selected_vertices.push(id),
                EntityRef::Line(id) => selected_lines.push(id),
                EntityRef::Sector(id) => selected_sectors.push(id),
                EntityRef::Thing(id) => selected_things.push(id),
            }
        }
        // Sector selections imply their boundary lines.
        for &sid in &selected_sectors {
            if let Some(s) = self.data.sector(sid) {
                for &(lid, _) in &s.lines {
                    if self.data.line(lid).is_some() && !selected_lines.contains(&lid) {
                        selected_lines.push(lid);
                    }
                }
            }
        }
        selected_lines.sort_unstable();
        selected_lines.dedup();

        let copy_vertex = |out: &mut Map, pos: Point| -> VertexId {
            if let Some(&id) = out.data.vertex_map.get(&pos) {
                return id;
            }
            let id = out.data.alloc_vertex_id();
            out.data
                .apply_insert_vertex(id, pos.x, pos.y, false)
                .expect("fresh map vertex insert");
            id
        };
        for &vid in &selected_vertices {
            if let Some(v) = self.data.vertex(vid) {
                copy_vertex(&mut out, v.pos());
            }
        }
        for &lid in &selected_lines {
            let Some((p, q)) = self.data.line_endpoints(lid) else {
                continue;
            };
            let line = self.data.line(lid).unwrap();
            let v0 = copy_vertex(&mut out, p);
            let v1 = copy_vertex(&mut out, q);
            if out.data.line_map.contains_key(&LineKey::new(p, q)) {
                continue;
            }
            let id = out.data.alloc_line_id();
            out.data
                .apply_insert_line(
                    id,
                    &LineRecord {
                        v0,
                        v1,
                        front: detached_side(&line.front),
                        back: detached_side(&line.back),
                        flags: line.flags,
                    },
                    false,
                )
                .expect("fresh map line insert");
        }
        for &sid in &selected_sectors {
            let Some(sector) = self.data.sector(sid) else {
                continue;
            };
            let mut lines: Vec<(LineId, bool)> = Vec::with_capacity(sector.lines.len());
            let mut complete = true;
            for &(lid, front) in &sector.lines {
                let Some((p, q)) = self.data.line_endpoints(lid) else {
                    complete = false;
                    break;
                };
                let Some(&nid) = out.data.line_map.get(&LineKey::new(p, q)) else {
                    complete = false;
                    break;
                };
                // Front-ness survives iff the clone kept the endpoint order.
                let src = self.data.line(lid).unwrap();
                let src_v0_pos = self.data.vertex(src.v0).unwrap().pos();
                let dst = out.data.line(nid).unwrap();
                let dst_v0_pos = out.data.vertex(dst.v0).unwrap().pos();
                let same_dir = src_v0_pos == dst_v0_pos;
                lines.push((nid, if same_dir { front } else { !front }));
            }
            if !complete {
                continue;
            }
            let new_sid = out.data.alloc_sector_id();
            let sector_copy = Sector::new(lines.clone(), sector.flat_xy.clone(), sector.props.clone());
            MapData::ensure_slot(&mut out.data.sectors, new_sid).expect("fresh sector slot");
            out.data.sectors[new_sid as usize] = Some(sector_copy);
            for (lid, front) in lines {
                if let Some(l) = out.data.line_mut(lid) {
                    l.side_mut(front).sector = Some(new_sid);
                }
            }
            algorithms::nesting::add_sector_to_map(&mut out.data, new_sid);
        }
        for &tid in &selected_things {
            if let Some(t) = self.data.thing(tid).copied() {
                let id = out.data.alloc_thing_id();
                out.data
                    .apply_insert_thing(id, t, false)
                    .expect("fresh map thing insert");
            }
        }
        out.data.modified_lines.clear();
        out.data.events.clear();
        out
    }

    /// Paste another map into this one. Submap positions are rotated and
    /// scaled around `pivot`, translated, and rounded onto the grid. Sector
    /// properties are forwarded through `sector_override` templates so the
    /// rebuild reconstructs semantically equivalent sectors.
    pub fn paste_map(
        &mut self,
        submap: &Map,
        translate: (f64, f64),
        scale: f64,
        pivot: (f64, f64),
        rotation: f64,
    ) -> Result<(), MapError> {
        let (sin, cos) = rotation.sin_cos();
        let transform = |p: Point| -> Point {
            let x = (p.xf() - pivot.0) * scale;
            let y = (p.yf() - pivot.1) * scale;
            Point::round(
                x * cos - y * sin + pivot.0 + translate.0,
                x * sin + y * cos + pivot.1 + translate.1,
            )
        };
        debug!(
            vertices = submap.vertex_count(),
            lines = submap.line_count(),
            "pasting submap"
        );
        let mut vmap: HashMap<VertexId, VertexId> = HashMap::new();
        let mut sub_vertices: Vec<(VertexId, Point)> = submap
            .vertices()
            .map(|(id, v)| (id, v.pos()))
            .collect();
        sub_vertices.sort_unstable_by_key(|&(id, _)| id);
        for (vid, pos) in sub_vertices {
            let p = transform(pos);
            let nid = self.add_vertex(p.xf(), p.yf(), true)?;
            vmap.insert(vid, nid);
        }
        let mut sub_lines: Vec<LineId> = submap.lines().map(|(id, _)| id).collect();
        sub_lines.sort_unstable();
        for lid in sub_lines {
            let line = submap.data.line(lid).unwrap();
            let (Some(&v0), Some(&v1)) = (vmap.get(&line.v0), vmap.get(&line.v1)) else {
                continue;
            };
            if v0 == v1 {
                continue; // collapsed by rounding
            }
            let (p, q) = (
                self.data.vertex(v0).unwrap().pos(),
                self.data.vertex(v1).unwrap().pos(),
            );
            if self.data.line_map.contains_key(&LineKey::new(p, q)) {
                continue;
            }
            let id = self.data.alloc_line_id();
            self.history.commit(
                &mut self.data,
                Action::structural(EditOp::InsertLine {
                    id,
                    rec: LineRecord {
                        v0,
                        v1,
                        front: detached_side(&line.front),
                        back: detached_side(&line.back),
                        flags: line.flags,
                    },
                    selected: false,
                }),
            )?;
        }
        // Forward sector properties to the recipient's sides.
        let mut sub_sectors: Vec<SectorId> = submap.sectors().map(|(id, _)| id).collect();
        sub_sectors.sort_unstable();
        for sid in sub_sectors {
            let sector = submap.data.sector(sid).unwrap();
            for &(lid, front) in &sector.lines {
                let Some(line) = submap.data.line(lid) else {
                    continue;
                };
                let (Some(&v0), Some(&v1)) = (vmap.get(&line.v0), vmap.get(&line.v1)) else {
                    continue;
                };
                if v0 == v1 {
                    continue;
                }
                let p = self.data.vertex(v0).unwrap().pos();
                let q = self.data.vertex(v1).unwrap().pos();
                let Some(&nid) = self.data.line_map.get(&LineKey::new(p, q)) else {
                    continue;
                };
                let target = self.data.line(nid).unwrap();
                let same_dir = target.v0 == v0;
                let props = sector.props.clone();
                let side_front = if same_dir { front } else { !front };
                if let Some(l) = self.data.line_mut(nid) {
                    l.side_mut(side_front).sector_override = Some(props);
                }
                self.data.modified_lines.insert(nid);
            }
        }
        self.rebuild_sectors()?;
        Ok(())
    }

    /// Neutral serialization of the whole map.
    pub fn to_json_value(&self) -> serde_json::Value {
        json::to_json_impl(self)
    }

    /// Replace this map's contents with a previously serialized document,
    /// then run a full rebuild to re-establish derived sector state.
    pub fn from_json_value(&mut self, v: serde_json::Value) -> Result<(), MapError> {
        json::from_json_impl(self, v)
    }

    /// Drop all geometry, selection, metadata, and history.
    pub fn clear(&mut self) {
        self.data.clear();
        self.history.clear();
    }
}

/// Side clone with the derived sector linkage stripped; used when lines cross
/// map boundaries (copy/paste).
pub(crate) fn detached_side(side: &Side) -> Side {
    Side {
        sector: None,
        sector_old: None,
        sector_override: None,
        upper_tex: side.upper_tex.clone(),
        middle_tex: side.middle_tex.clone(),
        lower_tex: side.lower_tex.clone(),
        offset_x: side.offset_x,
        offset_y: side.offset_y,
    }
}
