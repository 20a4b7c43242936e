use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::geometry::math::signed_area_2d;

pub type VertexId = u32;
pub type LineId = u32;
pub type SectorId = u32;
pub type ThingId = u32;

/// Integer map-unit coordinate pair. Vertex identity within a map is its
/// coordinate pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    /// Round a floating position onto the integer grid.
    pub fn round(x: f64, y: f64) -> Self {
        Point {
            x: x.round() as i32,
            y: y.round() as i32,
        }
    }

    #[inline]
    pub fn xf(self) -> f64 {
        self.x as f64
    }

    #[inline]
    pub fn yf(self) -> f64 {
        self.y as f64
    }

    /// Stable persistence key form, `"x,y"`.
    pub fn key_string(self) -> String {
        format!("{},{}", self.x, self.y)
    }
}

/// Canonical unordered endpoint pair identifying a line: endpoints are sorted
/// lexicographically (smaller x first, ties by smaller y).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub a: Point,
    pub b: Point,
}

impl LineKey {
    pub fn new(p: Point, q: Point) -> Self {
        if p <= q {
            LineKey { a: p, b: q }
        } else {
            LineKey { a: q, b: p }
        }
    }

    /// Stable persistence key form, `"x0,y0:x1,y1"`.
    pub fn key_string(self) -> String {
        format!("{}:{}", self.a.key_string(), self.b.key_string())
    }
}

/// Axis-aligned integer bounds, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Rect {
    pub fn point(p: Point) -> Self {
        Rect {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    pub fn of_segment(p: Point, q: Point) -> Self {
        Rect {
            min_x: p.x.min(q.x),
            min_y: p.y.min(q.y),
            max_x: p.x.max(q.x),
            max_y: p.y.max(q.y),
        }
    }

    pub fn of_flat(flat_xy: &[f64]) -> Self {
        let mut r = Rect {
            min_x: i32::MAX,
            min_y: i32::MAX,
            max_x: i32::MIN,
            max_y: i32::MIN,
        };
        for p in flat_xy.chunks(2) {
            r.min_x = r.min_x.min(p[0].floor() as i32);
            r.max_x = r.max_x.max(p[0].ceil() as i32);
            r.min_y = r.min_y.min(p[1].floor() as i32);
            r.max_y = r.max_y.max(p[1].ceil() as i32);
        }
        r
    }

    pub fn intersects(self, other: Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(self, other: Rect) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn contains_point(self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// A point of the subdivision. Holds the back-reference list of incident
/// lines in insertion order.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
    pub lines: Vec<LineId>,
}

impl Vertex {
    pub fn pos(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

bitflags! {
    /// Line behavior flags, packed the way engine formats pack them.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LineFlags: u8 {
        const IMPASSABLE     = 1 << 0;
        const TWO_SIDED      = 1 << 1;
        const UPPER_UNPEGGED = 1 << 2;
        const LOWER_UNPEGGED = 1 << 3;
        const SECRET         = 1 << 4;
        const BLOCK_SOUND    = 1 << 5;
        const DONT_DRAW      = 1 << 6;
    }
}

impl LineFlags {
    pub const NAMES: [&'static str; 7] = [
        "impassable",
        "two_sided",
        "upper_unpegged",
        "lower_unpegged",
        "secret",
        "block_sound",
        "dont_draw",
    ];

    pub fn named(name: &str) -> Option<LineFlags> {
        Some(match name {
            "impassable" => LineFlags::IMPASSABLE,
            "two_sided" => LineFlags::TWO_SIDED,
            "upper_unpegged" => LineFlags::UPPER_UNPEGGED,
            "lower_unpegged" => LineFlags::LOWER_UNPEGGED,
            "secret" => LineFlags::SECRET,
            "block_sound" => LineFlags::BLOCK_SOUND,
            "dont_draw" => LineFlags::DONT_DRAW,
            _ => return None,
        })
    }
}

/// Sector properties carried by every closed face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorProps {
    pub floor_h: i32,
    pub ceil_h: i32,
    pub floor_tex: String,
    pub ceil_tex: String,
    pub light: i32,
    pub special: i32,
    pub tag: i32,
}

impl Default for SectorProps {
    fn default() -> Self {
        SectorProps {
            floor_h: 0,
            ceil_h: 128,
            floor_tex: "-".to_string(),
            ceil_tex: "-".to_string(),
            light: 160,
            special: 0,
            tag: 0,
        }
    }
}

/// One side of a line. `front` is the left of v0 -> v1, `back` the right.
///
/// `sector_old` and `sector_override` are rebuild-scratch template snapshots;
/// outside of a running face recovery both are `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Side {
    pub sector: Option<SectorId>,
    #[serde(skip)]
    pub sector_old: Option<SectorProps>,
    #[serde(skip)]
    pub sector_override: Option<SectorProps>,
    pub upper_tex: String,
    pub middle_tex: String,
    pub lower_tex: String,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for Side {
    fn default() -> Self {
        Side {
            sector: None,
            sector_old: None,
            sector_override: None,
            upper_tex: "-".to_string(),
            middle_tex: "-".to_string(),
            lower_tex: "-".to_string(),
            offset_x: 0,
            offset_y: 0,
        }
    }
}

/// Undirected segment between two distinct vertices, with two sides.
#[derive(Clone, Debug)]
pub struct Line {
    pub v0: VertexId,
    pub v1: VertexId,
    pub front: Side,
    pub back: Side,
    pub flags: LineFlags,
}

impl Line {
    pub fn side(&self, front: bool) -> &Side {
        if front {
            &self.front
        } else {
            &self.back
        }
    }

    pub fn side_mut(&mut self, front: bool) -> &mut Side {
        if front {
            &mut self.front
        } else {
            &mut self.back
        }
    }

    pub fn other_vertex(&self, v: VertexId) -> VertexId {
        if self.v0 == v {
            self.v1
        } else {
            self.v0
        }
    }
}

/// A closed CCW face of the subdivision. Recreated wholesale by every face
/// recovery; identity is the arena slot.
#[derive(Clone, Debug)]
pub struct Sector {
    /// Boundary lines in traversal order; the flag is true when this sector
    /// lies on the line's front side for that traversal step.
    pub lines: Vec<(LineId, bool)>,
    /// Flattened CCW polygon (x0, y0, x1, y1, ...).
    pub flat_xy: Vec<f64>,
    pub props: SectorProps,
    pub parent: Option<SectorId>,
    pub children: Vec<SectorId>,
    pub bounds: Rect,
}

impl Sector {
    pub fn new(lines: Vec<(LineId, bool)>, flat_xy: Vec<f64>, props: SectorProps) -> Self {
        let bounds = Rect::of_flat(&flat_xy);
        Sector {
            lines,
            flat_xy,
            props,
            parent: None,
            children: Vec::new(),
            bounds,
        }
    }

    pub fn signed_area(&self) -> f64 {
        signed_area_2d(&self.flat_xy)
    }
}

/// Point entity (player start, monster, pickup). Independent of the
/// subdivision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub type_id: i32,
    pub angle: i32,
}

/// Map-level metadata editable through `set_map_property`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapMeta {
    pub name: String,
    pub comment: String,
}

/// Typed handle to any registered entity; used by the spatial grid, the
/// selection set, and history coalescing keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRef {
    Vertex(VertexId),
    Line(LineId),
    Sector(SectorId),
    Thing(ThingId),
}

/// Scalar property value accepted by the named setters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i32),
    Str(String),
}

impl PropValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropValue::Bool(_) => "bool",
            PropValue::Int(_) => "int",
            PropValue::Str(_) => "string",
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}
