//! Degenerate inputs and a deterministic fuzz loop.

mod common;

use common::assert_invariants;
use sectored::model::PropValue;
use sectored::Map;

#[test]
fn zero_length_segment_is_ignored() {
    let mut map = Map::new();
    let created = map.add_line(10.0, 10.0, 10.0, 10.0, false).unwrap();
    assert!(created.is_empty());
    assert_eq!(map.vertex_count(), 0);
    assert_eq!(map.undo_depth(), 0);
    // Rounding can collapse a segment too.
    let created = map.add_line(10.2, 10.2, 9.8, 9.9, false).unwrap();
    assert!(created.is_empty());
}

#[test]
fn identical_vertex_move_is_a_noop() {
    let mut map = Map::new();
    map.add_vertex(5.0, 5.0, false).unwrap();
    let depth = map.undo_depth();
    assert!(!map.move_vertex((5.0, 5.0), (5.4, 4.6), false).unwrap());
    assert_eq!(map.undo_depth(), depth);
}

#[test]
fn removing_missing_entities_reports_no_effect() {
    let mut map = Map::new();
    assert!(!map.remove_vertex(1.0, 1.0, false).unwrap());
    assert!(!map.remove_line((0.0, 0.0), (5.0, 5.0), false).unwrap());
    assert!(!map.remove_thing(7).unwrap());
}

#[test]
fn duplicate_vertex_add_returns_existing() {
    let mut map = Map::new();
    let a = map.add_vertex(12.0, 34.0, false).unwrap();
    let b = map.add_vertex(11.7, 34.4, false).unwrap();
    assert_eq!(a, b);
    assert_eq!(map.vertex_count(), 1);
}

#[test]
fn trace_guard_is_configurable_with_a_floor() {
    let mut map = Map::new();
    assert_eq!(map.trace_step_limit(), 100_000);
    map.set_trace_step_limit(10);
    assert_eq!(map.trace_step_limit(), 1000);
    map.set_trace_step_limit(250_000);
    assert_eq!(map.trace_step_limit(), 250_000);

    // Editing still works under the floor value.
    map.set_trace_step_limit(0);
    map.add_line(0.0, 0.0, 64.0, 0.0, false).unwrap();
    map.add_line(64.0, 0.0, 64.0, 64.0, false).unwrap();
    map.add_line(64.0, 64.0, 0.0, 64.0, false).unwrap();
    map.add_line(0.0, 64.0, 0.0, 0.0, false).unwrap();
    assert_eq!(map.sector_count(), 1);
}

#[test]
fn dangling_stub_inside_a_sector_keeps_the_face() {
    let mut map = Map::new();
    map.add_line(0.0, 0.0, 100.0, 0.0, false).unwrap();
    map.add_line(100.0, 0.0, 100.0, 100.0, false).unwrap();
    map.add_line(100.0, 100.0, 0.0, 100.0, false).unwrap();
    map.add_line(0.0, 100.0, 0.0, 0.0, false).unwrap();
    // Antenna from the boundary into the interior.
    map.add_line(50.0, 0.0, 50.0, 40.0, false).unwrap();

    assert_eq!(map.sector_count(), 1, "stub does not close a new face");
    let (_, sector) = map.sectors().next().unwrap();
    assert!(sector.signed_area() > 0.0);
    // The stub is walked in both directions by the same loop.
    let stub = map
        .find_line(
            sectored::model::Point::new(50, 0),
            sectored::model::Point::new(50, 40),
        )
        .unwrap();
    let both = sector
        .lines
        .iter()
        .filter(|&&(lid, _)| lid == stub)
        .count();
    assert_eq!(both, 2);
    assert_invariants(&map);
}

#[test]
fn isolated_segment_produces_no_sector() {
    let mut map = Map::new();
    map.add_line(0.0, 0.0, 64.0, 0.0, false).unwrap();
    assert_eq!(map.sector_count(), 0);
    map.add_line(0.0, 64.0, 64.0, 64.0, false).unwrap();
    assert_eq!(map.sector_count(), 0);
    assert_invariants(&map);
}

#[test]
fn fuzz_random_edits_never_panic() {
    let mut seed: u64 = 0x00D0_0DAD_D00D_F00D;
    let mut rnd = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (seed >> 33) as u32
    };
    let mut map = Map::new();
    let coord = |r: u32| -> f64 { ((r % 10) * 32) as f64 };

    for step in 0..3000u32 {
        if step % 500 == 0 && step != 0 {
            map.clear();
        }
        match rnd() % 12 {
            0 | 1 => {
                let _ = map.add_vertex(coord(rnd()), coord(rnd()), false).unwrap();
            }
            2..=5 => {
                let _ = map
                    .add_line(coord(rnd()), coord(rnd()), coord(rnd()), coord(rnd()), false)
                    .unwrap();
            }
            6 => {
                let _ = map.remove_vertex(coord(rnd()), coord(rnd()), false).unwrap();
            }
            7 => {
                let lines: Vec<_> = map.lines().map(|(id, _)| id).collect();
                if !lines.is_empty() {
                    let lid = lines[(rnd() as usize) % lines.len()];
                    let (p, q) = map.line_endpoints(lid).unwrap();
                    let _ = map
                        .remove_line((p.x as f64, p.y as f64), (q.x as f64, q.y as f64), false)
                        .unwrap();
                }
            }
            8 => {
                let verts: Vec<_> = map.vertices().map(|(_, v)| (v.x, v.y)).collect();
                if !verts.is_empty() {
                    let (x, y) = verts[(rnd() as usize) % verts.len()];
                    let _ = map
                        .move_vertex((x as f64, y as f64), (coord(rnd()), coord(rnd())), false)
                        .unwrap();
                }
            }
            9 => {
                let sectors: Vec<_> = map.sectors().map(|(id, _)| id).collect();
                if !sectors.is_empty() {
                    let sid = sectors[(rnd() as usize) % sectors.len()];
                    let _ = map
                        .set_sector_property(sid, "light", PropValue::Int((rnd() % 256) as i32))
                        .unwrap();
                }
            }
            10 => {
                let _ = map.undo().unwrap();
            }
            _ => {
                let _ = map.redo().unwrap();
            }
        }
        if step % 250 == 249 {
            assert_invariants(&map);
        }
    }
    assert_invariants(&map);
}
