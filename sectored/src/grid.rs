//! Uniform spatial grid over the axis-aligned bounds of every registered
//! entity. Cells are erased as soon as they empty so memory tracks live
//! geometry.

use std::collections::{HashMap, HashSet};

use crate::geometry::tolerance::GRID_CELL;
use crate::model::{EntityRef, Rect};

#[derive(Debug)]
pub struct SpatialGrid {
    cell: i32,
    cells: HashMap<(i32, i32), Vec<EntityRef>>,
    bounds: HashMap<EntityRef, Rect>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        SpatialGrid::new(GRID_CELL)
    }
}

impl SpatialGrid {
    pub fn new(cell: i32) -> Self {
        assert!(cell > 0, "cell size must be positive");
        SpatialGrid {
            cell,
            cells: HashMap::new(),
            bounds: HashMap::new(),
        }
    }

    /// Cell index range covered by `r`, inclusive. Euclidean division keeps
    /// negative coordinates snapping toward negative infinity.
    fn cell_range(&self, r: Rect) -> (i32, i32, i32, i32) {
        (
            r.min_x.div_euclid(self.cell),
            r.min_y.div_euclid(self.cell),
            r.max_x.div_euclid(self.cell),
            r.max_y.div_euclid(self.cell),
        )
    }

    pub fn insert(&mut self, entity: EntityRef, r: Rect) {
        if self.bounds.contains_key(&entity) {
            self.remove(entity);
        }
        let (x0, y0, x1, y1) = self.cell_range(r);
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                self.cells.entry((cx, cy)).or_default().push(entity);
            }
        }
        self.bounds.insert(entity, r);
    }

    pub fn remove(&mut self, entity: EntityRef) {
        let Some(r) = self.bounds.remove(&entity) else {
            return;
        };
        let (x0, y0, x1, y1) = self.cell_range(r);
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                if let Some(slots) = self.cells.get_mut(&(cx, cy)) {
                    if let Some(pos) = slots.iter().position(|&s| s == entity) {
                        slots.swap_remove(pos);
                    }
                    if slots.is_empty() {
                        self.cells.remove(&(cx, cy));
                    }
                }
            }
        }
    }

    pub fn update(&mut self, entity: EntityRef, r: Rect) {
        self.remove(entity);
        self.insert(entity, r);
    }

    pub fn bounds_of(&self, entity: EntityRef) -> Option<Rect> {
        self.bounds.get(&entity).copied()
    }

    /// Visit every registered entity whose cells overlap `r` and whose own
    /// bounds intersect `r`. Candidates are deduplicated per query. The
    /// callback returns false to stop; the function returns false iff the
    /// visit was aborted.
    pub fn query_candidates<F: FnMut(EntityRef) -> bool>(&self, r: Rect, mut f: F) -> bool {
        let mut visited: HashSet<EntityRef> = HashSet::new();
        let (x0, y0, x1, y1) = self.cell_range(r);
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let Some(slots) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &entity in slots {
                    if !visited.insert(entity) {
                        continue;
                    }
                    let eb = self.bounds[&entity];
                    if !eb.intersects(r) {
                        continue;
                    }
                    if !f(entity) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Like [`query_candidates`](Self::query_candidates) but yields only
    /// entities whose bounds lie entirely inside `r`; this is the rubber-band
    /// semantics of the bounded iteration API.
    pub fn query_contained<F: FnMut(EntityRef) -> bool>(&self, r: Rect, mut f: F) -> bool {
        self.query_candidates(r, |entity| {
            if r.contains(self.bounds[&entity]) {
                f(entity)
            } else {
                true
            }
        })
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.bounds.clear();
    }

    /// All cells currently holding `entity`. Diagnostic accessor, also used
    /// by the invariant tests.
    pub fn cells_of(&self, entity: EntityRef) -> Vec<(i32, i32)> {
        let mut out: Vec<(i32, i32)> = self
            .cells
            .iter()
            .filter(|(_, slots)| slots.contains(&entity))
            .map(|(&k, _)| k)
            .collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Rect {
        Rect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[test]
    fn covered_cells_match_bounds() {
        let mut g = SpatialGrid::new(128);
        g.insert(EntityRef::Line(0), rect(-10, 0, 200, 100));
        // x cells: -1, 0, 1; y cells: 0
        assert_eq!(
            g.cells_of(EntityRef::Line(0)),
            vec![(-1, 0), (0, 0), (1, 0)]
        );
        g.remove(EntityRef::Line(0));
        assert_eq!(g.cell_count(), 0);
        assert!(g.is_empty());
    }

    #[test]
    fn update_moves_between_cells() {
        let mut g = SpatialGrid::new(128);
        g.insert(EntityRef::Vertex(3), rect(0, 0, 0, 0));
        g.update(EntityRef::Vertex(3), rect(500, 500, 500, 500));
        assert_eq!(g.cells_of(EntityRef::Vertex(3)), vec![(3, 3)]);
        assert_eq!(g.cell_count(), 1);
    }

    #[test]
    fn query_dedups_and_aborts() {
        let mut g = SpatialGrid::new(128);
        // Spans four cells; must be yielded exactly once.
        g.insert(EntityRef::Line(1), rect(100, 100, 300, 300));
        g.insert(EntityRef::Line(2), rect(1000, 1000, 1001, 1001));
        let mut seen = Vec::new();
        g.query_candidates(rect(0, 0, 400, 400), |e| {
            seen.push(e);
            true
        });
        assert_eq!(seen, vec![EntityRef::Line(1)]);

        let mut count = 0;
        g.insert(EntityRef::Line(3), rect(110, 110, 120, 120));
        let finished = g.query_candidates(rect(0, 0, 400, 400), |_| {
            count += 1;
            false
        });
        assert!(!finished);
        assert_eq!(count, 1);
    }

    #[test]
    fn contained_filter_excludes_straddlers() {
        let mut g = SpatialGrid::new(128);
        g.insert(EntityRef::Thing(1), rect(10, 10, 10, 10));
        g.insert(EntityRef::Line(1), rect(-50, 0, 50, 0));
        let mut seen = Vec::new();
        g.query_contained(rect(0, 0, 100, 100), |e| {
            seen.push(e);
            true
        });
        assert_eq!(seen, vec![EntityRef::Thing(1)]);
    }
}
