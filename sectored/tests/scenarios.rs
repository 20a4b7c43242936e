//! End-to-end editing scenarios over the public map API.

mod common;

use common::{assert_invariants, is_rotation, polygon_of};
use sectored::model::PropValue;
use sectored::Map;

fn add_box(map: &mut Map, x0: f64, y0: f64, x1: f64, y1: f64) {
    map.add_line(x0, y0, x1, y0, false).unwrap();
    map.add_line(x1, y0, x1, y1, false).unwrap();
    map.add_line(x1, y1, x0, y1, false).unwrap();
    map.add_line(x0, y1, x0, y0, false).unwrap();
}

#[test]
fn s1_box_becomes_one_ccw_sector() {
    let mut map = Map::new();
    add_box(&mut map, 0.0, 0.0, 100.0, 100.0);

    assert_eq!(map.vertex_count(), 4);
    assert_eq!(map.line_count(), 4);
    assert_eq!(map.sector_count(), 1);

    let (sid, sector) = map.sectors().next().unwrap();
    assert!(sector.parent.is_none());
    assert!(sector.signed_area() > 0.0);
    let expected = [(0, 0), (100, 0), (100, 100), (0, 100)];
    assert!(
        is_rotation(&polygon_of(&map, sid), &expected),
        "polygon {:?} is not a rotation of {:?}",
        polygon_of(&map, sid),
        expected
    );
    assert_invariants(&map);
}

#[test]
fn s2_vertex_insert_splits_line_and_preserves_attributes() {
    let mut map = Map::new();
    add_box(&mut map, 0.0, 0.0, 100.0, 100.0);

    let bottom = map
        .find_line((0, 0).into_point(), (100, 0).into_point())
        .expect("bottom line");
    map.set_side_property(bottom, true, "middle_tex", PropValue::from("BRICK7"))
        .unwrap();
    map.set_line_flag(bottom, "impassable", true).unwrap();

    map.add_vertex(50.0, 0.0, false).unwrap();

    assert!(map
        .find_line((0, 0).into_point(), (100, 0).into_point())
        .is_none());
    let left = map
        .find_line((0, 0).into_point(), (50, 0).into_point())
        .expect("left half");
    let right = map
        .find_line((50, 0).into_point(), (100, 0).into_point())
        .expect("right half");
    for half in [left, right] {
        let l = map.line(half).unwrap();
        assert_eq!(l.front.middle_tex, "BRICK7");
        assert!(l.flags.contains(sectored::model::LineFlags::IMPASSABLE));
    }

    assert_eq!(map.sector_count(), 1);
    let (sid, _) = map.sectors().next().unwrap();
    assert_eq!(polygon_of(&map, sid).len(), 5);
    assert_invariants(&map);
}

#[test]
fn s3_proper_intersection_splits_both_segments() {
    let mut map = Map::new();
    map.add_line(0.0, 0.0, 100.0, 100.0, false).unwrap();
    map.add_line(0.0, 100.0, 100.0, 0.0, false).unwrap();

    assert!(map.find_vertex(50, 50).is_some());
    assert_eq!(map.vertex_count(), 5);
    assert_eq!(map.line_count(), 4);
    assert_eq!(map.sector_count(), 0, "no closed CCW face without a hull");
    assert_invariants(&map);
}

#[test]
fn s3_diagonals_inside_box_partition_it() {
    let mut map = Map::new();
    add_box(&mut map, 0.0, 0.0, 100.0, 100.0);
    map.add_line(0.0, 0.0, 100.0, 100.0, false).unwrap();
    assert_eq!(map.sector_count(), 2, "one diagonal halves the box");
    map.add_line(0.0, 100.0, 100.0, 0.0, false).unwrap();
    assert_eq!(map.sector_count(), 4, "the X cuts four triangles");
    assert!(map.find_vertex(50, 50).is_some());
    assert_invariants(&map);
}

#[test]
fn s4_removal_then_readd_heals_the_split() {
    let mut map = Map::new();
    map.add_line(0.0, 0.0, 100.0, 0.0, false).unwrap();
    map.add_vertex(50.0, 0.0, false).unwrap();
    assert_eq!(map.line_count(), 2, "vertex insert split the segment");

    // Removal deletes both incident lines; no merge happens on this path.
    assert!(map.remove_vertex(50.0, 0.0, false).unwrap());
    assert_eq!(map.line_count(), 0);
    assert_eq!(map.vertex_count(), 0, "orphaned endpoints die with the lines");

    // The merge pass belongs to add_line; re-adding yields one segment.
    let created = map.add_line(0.0, 0.0, 100.0, 0.0, false).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(map.line_count(), 1);
    assert!(map
        .find_line((0, 0).into_point(), (100, 0).into_point())
        .is_some());
    assert_invariants(&map);
}

#[test]
fn s4_drawing_a_collinear_continuation_merges() {
    let mut map = Map::new();
    map.add_line(0.0, 0.0, 50.0, 0.0, false).unwrap();
    map.add_line(50.0, 0.0, 100.0, 0.0, false).unwrap();
    // The second call's created line merged outward over the shared vertex.
    assert_eq!(map.line_count(), 1);
    assert!(map.find_vertex(50, 0).is_none());
    assert_invariants(&map);
}

#[test]
fn s5_nested_boxes_form_parent_child() {
    let mut map = Map::new();
    add_box(&mut map, 0.0, 0.0, 1000.0, 1000.0);
    add_box(&mut map, 100.0, 100.0, 200.0, 200.0);

    assert_eq!(map.sector_count(), 2);
    let inner = map.sector_at(150.0, 150.0).expect("inner sector");
    let outer = map.sector_at(500.0, 500.0).expect("outer sector");
    assert_ne!(inner, outer);
    assert_eq!(map.sector(inner).unwrap().parent, Some(outer));
    assert!(map.sector(outer).unwrap().children.contains(&inner));
    assert!(map.sector_is_child_of(inner, outer));

    // Open sides of the inner boundary were patched to the parent.
    let inner_line = map
        .find_line((100, 100).into_point(), (200, 100).into_point())
        .expect("inner bottom line");
    let l = map.line(inner_line).unwrap();
    let sides = [l.front.sector, l.back.sector];
    assert!(sides.contains(&Some(inner)) && sides.contains(&Some(outer)));

    // Boundary loops between parent and child, for renderers.
    let holes = map.merge_child_vectors(outer).unwrap();
    assert_eq!(holes.len(), 1);
    assert_eq!(holes[0].len(), 8);

    // Drag the inner box outside; it reparents to the void.
    for (x, y) in [(100.0, 100.0), (200.0, 100.0), (200.0, 200.0), (100.0, 200.0)] {
        assert!(map
            .move_vertex((x, y), (x + 1200.0, y), true)
            .unwrap());
    }
    map.rebuild_sectors().unwrap();

    assert_eq!(map.sector_count(), 2);
    let outer2 = map.sector_at(500.0, 500.0).expect("outer survives");
    let moved = map.sector_at(1350.0, 150.0).expect("moved inner sector");
    assert_eq!(map.sector(moved).unwrap().parent, None);
    assert!(map.sector(outer2).unwrap().children.is_empty());
    assert_invariants(&map);
}

#[test]
fn s6_property_edits_coalesce_into_one_undo_step() {
    let mut map = Map::new();
    add_box(&mut map, 0.0, 0.0, 100.0, 100.0);
    let (sid, sector) = map.sectors().next().unwrap();
    let original = sector.props.light;
    assert_ne!(original, 120, "test values must differ from the default");

    let before = map.undo_depth();
    map.set_sector_property(sid, "light", PropValue::Int(100))
        .unwrap();
    map.set_sector_property(sid, "light", PropValue::Int(110))
        .unwrap();
    map.set_sector_property(sid, "light", PropValue::Int(120))
        .unwrap();
    assert_eq!(map.undo_depth(), before + 1, "run of edits coalesced");
    assert_eq!(map.sector(sid).unwrap().props.light, 120);

    assert!(map.undo().unwrap());
    assert_eq!(
        map.sector(sid).unwrap().props.light,
        original,
        "undo restores the value before the first edit of the run"
    );
    assert!(map.redo().unwrap());
    assert_eq!(map.sector(sid).unwrap().props.light, 120);
    assert_invariants(&map);
}

/// Small convenience for literal coordinates in tests.
trait IntoPoint {
    fn into_point(self) -> sectored::model::Point;
}

impl IntoPoint for (i32, i32) {
    fn into_point(self) -> sectored::model::Point {
        sectored::model::Point::new(self.0, self.1)
    }
}
