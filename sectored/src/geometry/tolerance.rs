// Centralized tolerances for robust geometry over integer map units.

/// Zero threshold for cross-product orientation tests.
pub const EPS_ORIENT: f64 = 1e-12;

/// Parameter-space slack when sorting/merging intervals along a segment.
pub const EPS_PARAM: f64 = 1e-9;

/// Signed-area threshold below which a traced loop is discarded.
pub const EPS_AREA: f64 = 1e-9;

/// Angle compare slack (radians) for the next-left edge selection.
pub const EPS_ANG: f64 = 1e-12;

/// Default cap on steps per traced loop. Runtime-configurable on the map.
pub const DEFAULT_TRACE_STEP_LIMIT: usize = 100_000;

/// Spatial grid cell size in map units. Correctness does not depend on the
/// value, only query performance.
pub const GRID_CELL: i32 = 128;

#[inline]
pub fn near_zero(x: f64, eps: f64) -> bool {
    x.abs() <= eps
}
