//! Coalescing do/undo/redo log. Every reversible mutation of the map is
//! expressed as an [`EditOp`] applied through [`History::commit`]; sectors are
//! derived state and never appear here.

use tracing::{debug, trace};

use crate::model::{EntityRef, LineFlags, LineId, PropValue, Side, ThingId, VertexId};
use crate::{MapData, MapError};

/// Full payload of a line, captured when it is created or removed so the
/// inverse operation can restore it attribute-for-attribute.
#[derive(Clone, Debug)]
pub struct LineRecord {
    pub v0: VertexId,
    pub v1: VertexId,
    pub front: Side,
    pub back: Side,
    pub flags: LineFlags,
}

/// A reversible primitive mutation. Each variant carries enough state to be
/// applied in either direction; [`EditOp::inverted`] flips it.
#[derive(Clone, Debug)]
pub enum EditOp {
    InsertVertex {
        id: VertexId,
        x: i32,
        y: i32,
        selected: bool,
    },
    RemoveVertex {
        id: VertexId,
        x: i32,
        y: i32,
        selected: bool,
    },
    InsertLine {
        id: LineId,
        rec: LineRecord,
        selected: bool,
    },
    RemoveLine {
        id: LineId,
        rec: LineRecord,
        selected: bool,
    },
    InsertThing {
        id: ThingId,
        thing: crate::model::Thing,
        selected: bool,
    },
    RemoveThing {
        id: ThingId,
        thing: crate::model::Thing,
        selected: bool,
    },
    SetThingPos {
        id: ThingId,
        from: (i32, i32),
        to: (i32, i32),
    },
    SetSideProp {
        line: LineId,
        front: bool,
        name: String,
        from: PropValue,
        to: PropValue,
    },
    SetFlag {
        line: LineId,
        name: String,
        from: bool,
        to: bool,
    },
    SetSectorProp {
        sector: crate::model::SectorId,
        name: String,
        from: PropValue,
        to: PropValue,
    },
    SetThingProp {
        id: ThingId,
        name: String,
        from: PropValue,
        to: PropValue,
    },
    SetMeta {
        name: String,
        from: PropValue,
        to: PropValue,
    },
}

impl EditOp {
    pub fn inverted(&self) -> EditOp {
        match self.clone() {
            EditOp::InsertVertex {
                id,
                x,
                y,
                selected,
            } => EditOp::RemoveVertex {
                id,
                x,
                y,
                selected,
            },
            EditOp::RemoveVertex {
                id,
                x,
                y,
                selected,
            } => EditOp::InsertVertex {
                id,
                x,
                y,
                selected,
            },
            EditOp::InsertLine { id, rec, selected } => EditOp::RemoveLine { id, rec, selected },
            EditOp::RemoveLine { id, rec, selected } => EditOp::InsertLine { id, rec, selected },
            EditOp::InsertThing {
                id,
                thing,
                selected,
            } => EditOp::RemoveThing {
                id,
                thing,
                selected,
            },
            EditOp::RemoveThing {
                id,
                thing,
                selected,
            } => EditOp::InsertThing {
                id,
                thing,
                selected,
            },
            EditOp::SetThingPos { id, from, to } => EditOp::SetThingPos {
                id,
                from: to,
                to: from,
            },
            EditOp::SetSideProp {
                line,
                front,
                name,
                from,
                to,
            } => EditOp::SetSideProp {
                line,
                front,
                name,
                from: to,
                to: from,
            },
            EditOp::SetFlag {
                line,
                name,
                from,
                to,
            } => EditOp::SetFlag {
                line,
                name,
                from: to,
                to: from,
            },
            EditOp::SetSectorProp {
                sector,
                name,
                from,
                to,
            } => EditOp::SetSectorProp {
                sector,
                name,
                from: to,
                to: from,
            },
            EditOp::SetThingProp { id, name, from, to } => EditOp::SetThingProp {
                id,
                name,
                from: to,
                to: from,
            },
            EditOp::SetMeta { name, from, to } => EditOp::SetMeta {
                name,
                from: to,
                to: from,
            },
        }
    }

    pub(crate) fn apply(&self, data: &mut MapData) -> Result<(), MapError> {
        match self {
            EditOp::InsertVertex {
                id,
                x,
                y,
                selected,
            } => data.apply_insert_vertex(*id, *x, *y, *selected),
            EditOp::RemoveVertex { id, .. } => data.apply_remove_vertex(*id),
            EditOp::InsertLine { id, rec, selected } => data.apply_insert_line(*id, rec, *selected),
            EditOp::RemoveLine { id, .. } => data.apply_remove_line(*id),
            EditOp::InsertThing {
                id,
                thing,
                selected,
            } => data.apply_insert_thing(*id, *thing, *selected),
            EditOp::RemoveThing { id, .. } => data.apply_remove_thing(*id),
            EditOp::SetThingPos { id, to, .. } => data.apply_set_thing_pos(*id, to.0, to.1),
            EditOp::SetSideProp {
                line,
                front,
                name,
                to,
                ..
            } => data.apply_set_side(*line, *front, name, to),
            EditOp::SetFlag { line, name, to, .. } => data.apply_set_flag(*line, name, *to),
            EditOp::SetSectorProp {
                sector, name, to, ..
            } => data.apply_set_sector_prop(*sector, name, to),
            EditOp::SetThingProp { id, name, to, .. } => data.apply_set_thing_prop(*id, name, to),
            EditOp::SetMeta { name, to, .. } => data.apply_set_meta(name, to),
        }
    }
}

/// Coalescing key: repeated edits of the same parameter on the same target
/// collapse into a single undoable step. `target` is `None` for map-level
/// properties.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CoalesceKey {
    pub target: Option<EntityRef>,
    pub param: String,
}

/// One undoable step: a forward op, its inverse, and the coalescing key.
#[derive(Clone, Debug)]
pub struct Action {
    redo: EditOp,
    undo: EditOp,
    key: Option<CoalesceKey>,
    coalescing: bool,
}

impl Action {
    /// Structural action (insert/remove): never coalesces with anything.
    pub fn structural(redo: EditOp) -> Self {
        let undo = redo.inverted();
        Action {
            redo,
            undo,
            key: None,
            coalescing: true,
        }
    }

    /// Keyed property action; coalesces with a same-keyed top of stack.
    pub fn keyed(redo: EditOp, key: CoalesceKey) -> Self {
        let undo = redo.inverted();
        Action {
            redo,
            undo,
            key: Some(key),
            coalescing: true,
        }
    }

    /// Opt a keyed action out of coalescing.
    pub fn without_coalescing(mut self) -> Self {
        self.coalescing = false;
        self
    }
}

#[derive(Default)]
pub struct History {
    undo_stack: Vec<Action>,
    redo_stack: Vec<Action>,
}

impl History {
    /// Record and execute an action. If the top of the undo stack is a
    /// coalescing action with the same key, its forward op is replaced while
    /// its inverse is kept, so undoing the run restores the value before the
    /// first edit; the redo stack is left alone. Otherwise the action is
    /// pushed and the redo stack cleared.
    pub(crate) fn commit(&mut self, data: &mut MapData, action: Action) -> Result<(), MapError> {
        if action.coalescing {
            if let (Some(key), Some(top)) = (action.key.as_ref(), self.undo_stack.last_mut()) {
                if top.coalescing && top.key.as_ref() == Some(key) {
                    trace!(?key, "coalescing with top of undo stack");
                    top.redo = action.redo;
                    let op = top.redo.clone();
                    return op.apply(data);
                }
            }
        }
        let op = action.redo.clone();
        self.redo_stack.clear();
        self.undo_stack.push(action);
        op.apply(data)
    }

    pub(crate) fn undo(&mut self, data: &mut MapData) -> Result<bool, MapError> {
        let Some(action) = self.undo_stack.pop() else {
            return Ok(false);
        };
        debug!(depth = self.undo_stack.len(), "undo");
        action.undo.apply(data)?;
        self.redo_stack.push(action);
        Ok(true)
    }

    pub(crate) fn redo(&mut self, data: &mut MapData) -> Result<bool, MapError> {
        let Some(action) = self.redo_stack.pop() else {
            return Ok(false);
        };
        debug!(depth = self.redo_stack.len(), "redo");
        action.redo.apply(data)?;
        self.undo_stack.push(action);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}
