use super::*;
use crate::config::LayoutConfig;
use crate::layout::layout_process;
use crate::model::{Connection, Endpoint};
use crate::router::{CubicBezier, RouteCandidate, assign_arc_offsets, bezier_path, route_connections};

fn candidate(id: &str, from: Point, to: Point, cols: (i32, i32)) -> RouteCandidate {
    RouteCandidate {
        id: id.to_string(),
        from,
        to,
        source_column: cols.0,
        target_column: cols.1,
    }
}

/// Point halfway along the curve by arc length, from a fine polyline.
fn arc_length_midpoint(path: &CubicBezier) -> Point {
    let samples = path.flatten(20_000);
    let total: f64 = samples.windows(2).map(|w| (w[1] - w[0]).length()).sum();
    let mut walked = 0.0;
    for w in samples.windows(2) {
        let step = (w[1] - w[0]).length();
        if walked + step >= total / 2.0 {
            let t = (total / 2.0 - walked) / step;
            return w[0].lerp(w[1], t);
        }
        walked += step;
    }
    path.to
}

#[test]
fn near_coincident_connections_fan_out_in_input_order() {
    let cfg = LayoutConfig::default();
    let cands = [
        candidate("first", point(260.0, 90.0), point(340.0, 90.0), (0, 1)),
        candidate("second", point(260.0, 93.0), point(340.0, 93.0), (0, 1)),
        candidate("third", point(260.0, 96.0), point(340.0, 96.0), (0, 1)),
    ];
    assert_eq!(
        assign_arc_offsets(&cands, &cfg),
        vec![0.0, cfg.arc_spacing, 2.0 * cfg.arc_spacing]
    );

    let anchors: Vec<f64> = route_connections(&cands, &cfg)
        .iter()
        .flatten()
        .map(|r| r.label_anchor.y)
        .collect();
    assert!(anchors[0] > anchors[1] && anchors[1] > anchors[2]);
}

#[test]
fn groups_are_anchored_independently() {
    let cfg = LayoutConfig::default();
    let cands = [
        candidate("a1", point(260.0, 90.0), point(340.0, 90.0), (0, 1)),
        candidate("far", point(260.0, 410.0), point(340.0, 410.0), (0, 1)),
        candidate("a2", point(260.0, 92.0), point(340.0, 92.0), (0, 1)),
        candidate("far2", point(260.0, 412.0), point(340.0, 412.0), (0, 1)),
    ];
    assert_eq!(
        assign_arc_offsets(&cands, &cfg),
        vec![0.0, 0.0, cfg.arc_spacing, cfg.arc_spacing]
    );
}

#[test]
fn label_sits_at_arc_length_midpoint_for_symmetric_curves() {
    let cfg = LayoutConfig::default();

    // No lift: the curve is point-symmetric about its chord midpoint.
    let skewed = bezier_path(point(260.0, 90.0), point(740.0, 250.0), 0.0, &cfg);
    assert!((arc_length_midpoint(&skewed) - skewed.midpoint()).length() < 0.05);

    // Level ports: the lifted curve is mirror-symmetric.
    let lifted = bezier_path(point(260.0, 90.0), point(940.0, 90.0), 56.0, &cfg);
    assert!((arc_length_midpoint(&lifted) - lifted.midpoint()).length() < 0.05);
}

#[test]
fn backward_step_connection_arcs_over_the_row() {
    let cfg = LayoutConfig::default();
    let mut d = process(&[("a", 0, 0), ("b", 0, 2)]);
    d.add_connection(Connection::new(Endpoint::entity("b"), "a").with_id("back"))
        .unwrap();
    d.add_connection(Connection::new(Endpoint::entity("a"), "b").with_id("fwd"))
        .unwrap();

    let layout = layout_process(&d, &cfg);
    let back = layout.connection("back").unwrap();
    assert!(back.route.backward);
    assert_eq!(back.route.arc_offset, cfg.backward_arc);
    assert_eq!(back.route.path.from, point(860.0, 90.0));
    assert_eq!(back.route.path.to, point(40.0, 90.0));
    assert!((back.route.label_anchor.y - (90.0 - 0.75 * cfg.backward_arc)).abs() < 1e-9);

    let fwd = layout.connection("fwd").unwrap();
    assert!(!fwd.route.backward);
    assert_eq!(fwd.route.arc_offset, 0.0);
}

#[test]
fn layout_reports_unresolved_connections_as_orphans() {
    let cfg = LayoutConfig::default();
    let mut d = process(&[("a", 0, 0), ("b", 1, 1)]);
    d.add_connection(Connection::new(Endpoint::entity("a"), "b").with_id("ok"))
        .unwrap();
    d.connections
        .push(Connection::new(Endpoint::entity("a"), "gone").with_id("dangling"));

    let layout = layout_process(&d, &cfg);
    assert_eq!(layout.connections.len(), 1);
    assert_eq!(layout.connections[0].id(), "ok");
    assert_eq!(layout.orphans, vec!["dangling".to_string()]);
}

#[test]
fn a_dangling_record_sharing_an_id_does_not_shift_other_routes() {
    let cfg = LayoutConfig::default();
    let mut d = process(&[("a", 0, 0), ("b", 0, 1), ("c", 0, 2)]);
    d.connections
        .push(Connection::new(Endpoint::entity("a"), "ghost").with_id("dup"));
    d.connections
        .push(Connection::new(Endpoint::entity("a"), "b").with_id("dup"));
    d.connections.push(
        Connection::new(Endpoint::entity("a"), "c")
            .with_id("z")
            .with_label("zz"),
    );

    let layout = layout_process(&d, &cfg);
    assert_eq!(layout.orphans, vec!["dup".to_string()]);
    let ids: Vec<&str> = layout.connections.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["dup", "z"]);

    let dup = &layout.connections[0];
    assert_eq!(dup.target, "b");
    assert_eq!(dup.label, None);
    assert_eq!(dup.route.path.to, point(340.0, 90.0));

    let z = &layout.connections[1];
    assert_eq!(z.target, "c");
    assert_eq!(z.label.as_deref(), Some("zz"));
    assert_eq!(z.route.path.to, point(640.0, 90.0));
}

#[test]
fn steps_with_invalid_cells_are_skipped() {
    let cfg = LayoutConfig::default();
    let mut d = process(&[("a", 0, 0)]);
    d.entities.push(ProcessStep::new("bad", "Bad", GridCell::new(-1, 3)));
    let layout = layout_process(&d, &cfg);
    assert_eq!(layout.entities.len(), 1);
    let b = layout.bounds.unwrap();
    assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (40.0, 40.0, 260.0, 140.0));
}
