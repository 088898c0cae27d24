use super::*;
use crate::config::LayoutConfig;
use crate::geom::{size, vector};
use crate::interaction::{Key, Modifiers, Mode, ProcessCanvas, ViewportEvents, WheelEvent};
use crate::layout::{Port, PortSide};
use crate::model::{Connection, DiagramChange, Endpoint};

fn canvas() -> ProcessCanvas {
    ProcessCanvas::new(LayoutConfig::default())
}

fn key(c: &mut ProcessCanvas, d: &mut ProcessDiagram, k: Key) -> Vec<DiagramChange<ProcessStep>> {
    c.on_key_down(d, k, Modifiers::default())
}

fn click(c: &mut ProcessCanvas, d: &mut ProcessDiagram, p: Point) -> Vec<DiagramChange<ProcessStep>> {
    let mut changes = c.on_pointer_down(d, press(p));
    changes.extend(c.on_pointer_up(d, press(p)));
    changes
}

fn output_port(row: i32, column: i32) -> Point {
    let c = cell_center(row, column);
    point(c.x + 110.0, c.y)
}

fn input_port(row: i32, column: i32) -> Point {
    let c = cell_center(row, column);
    point(c.x - 110.0, c.y)
}

#[test]
fn placing_on_an_occupied_cell_relocates_to_nearest_free_cell() {
    let mut d = ProcessDiagram::new();
    let mut c = canvas();

    c.begin_placing();
    let changes = click(&mut c, &mut d, cell_center(0, 0));
    assert_eq!(changes.len(), 1);
    let DiagramChange::EntityAdded(first) = &changes[0] else {
        panic!("expected an added entity, got {changes:?}");
    };
    assert_eq!(first.cell, GridCell::new(0, 0));
    assert_eq!(c.state().selected_entity(), Some(first.id.as_str()));
    assert!(c.state().detail_panel_open);

    c.begin_placing();
    let changes = click(&mut c, &mut d, cell_center(0, 0));
    let DiagramChange::EntityAdded(second) = &changes[0] else {
        panic!("expected an added entity, got {changes:?}");
    };
    assert_eq!(second.cell, GridCell::new(0, 1));
    assert_eq!(d.entities.len(), 2);
    assert!(matches!(c.mode(), Mode::EntitySelected { .. }));
}

#[test]
fn escape_leaves_placement_without_creating() {
    let mut d = ProcessDiagram::new();
    let mut c = canvas();
    c.begin_placing();
    assert!(key(&mut c, &mut d, Key::Escape).is_empty());
    assert_eq!(c.mode(), &Mode::Idle);
    assert!(click(&mut c, &mut d, cell_center(0, 0)).is_empty());
    assert!(d.entities.is_empty());
}

#[test]
fn connecting_twice_keeps_a_single_connection() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    let mut c = canvas();

    for _ in 0..2 {
        click(&mut c, &mut d, output_port(0, 0));
        assert_eq!(
            c.mode(),
            &Mode::ConnectingFromPort {
                source: Port::Entity {
                    entity: "a".to_string(),
                    side: PortSide::Output
                }
            }
        );
        click(&mut c, &mut d, input_port(0, 1));
        assert_eq!(c.mode(), &Mode::Idle);
    }
    assert_eq!(d.connections.len(), 1);
    assert_eq!(d.connections[0].source, Endpoint::entity("a"));
    assert_eq!(d.connections[0].target, "b");
}

#[test]
fn clicking_the_originating_port_or_own_entity_cancels() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    let mut c = canvas();

    click(&mut c, &mut d, output_port(0, 0));
    assert!(click(&mut c, &mut d, output_port(0, 0)).is_empty());
    assert_eq!(c.mode(), &Mode::Idle);

    click(&mut c, &mut d, output_port(0, 0));
    assert!(click(&mut c, &mut d, input_port(0, 0)).is_empty());
    assert_eq!(c.mode(), &Mode::Idle);
    assert!(d.connections.is_empty());
}

#[test]
fn starting_a_connection_or_placement_clears_selection() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    let mut c = canvas();

    click(&mut c, &mut d, cell_center(0, 0));
    assert_eq!(c.state().selected_entity(), Some("a"));
    assert!(c.state().detail_panel_open);

    click(&mut c, &mut d, output_port(0, 1));
    assert_eq!(c.state().selected_entity(), None);
    assert!(!c.state().detail_panel_open);

    key(&mut c, &mut d, Key::Escape);
    click(&mut c, &mut d, cell_center(0, 1));
    assert_eq!(c.state().selected_entity(), Some("b"));
    c.begin_placing();
    assert_eq!(c.state().selected_entity(), None);
    assert!(!c.state().detail_panel_open);
    assert_eq!(c.mode(), &Mode::PlacingNewEntity);
}

#[test]
fn drag_requires_selection_and_threshold_then_snaps_to_free_cell() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    let mut c = canvas();

    // First press only selects.
    c.on_pointer_down(&mut d, press(cell_center(0, 0)));
    c.on_pointer_move(&mut d, press(cell_center(0, 1)));
    assert!(c.on_pointer_up(&mut d, press(cell_center(0, 1))).is_empty());
    assert_eq!(d.entity("a").unwrap().cell, GridCell::new(0, 0));

    // Second press on the selected entity, below the threshold.
    let start = cell_center(0, 0);
    c.on_pointer_down(&mut d, press(start));
    c.on_pointer_move(&mut d, press(start + vector(3.0, 0.0)));
    assert!(matches!(c.mode(), Mode::EntitySelected { press: Some(_), .. }));

    // Past the threshold, released over the occupied neighbor.
    c.on_pointer_move(&mut d, press(cell_center(0, 1)));
    let (id, preview) = c.state().drag_preview().unwrap();
    assert_eq!(id, "a");
    assert_eq!(preview, point(340.0, 40.0));
    let changes = c.on_pointer_up(&mut d, press(cell_center(0, 1)));
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], DiagramChange::EntityUpdated(s) if s.cell == GridCell::new(0, 2)));
    assert_eq!(
        c.mode(),
        &Mode::EntitySelected {
            id: "a".to_string(),
            press: None
        }
    );
}

#[test]
fn dropping_on_a_free_cell_moves_there() {
    let mut d = process(&[("a", 0, 0)]);
    let mut c = canvas();
    click(&mut c, &mut d, cell_center(0, 0));
    c.on_pointer_down(&mut d, press(cell_center(0, 0)));
    c.on_pointer_move(&mut d, press(cell_center(1, 0)));
    let changes = c.on_pointer_up(&mut d, press(cell_center(1, 0) + vector(20.0, 10.0)));
    assert_eq!(changes.len(), 1);
    assert_eq!(d.entity("a").unwrap().cell, GridCell::new(1, 0));

    // Releasing back on its own cell is not a change.
    c.on_pointer_down(&mut d, press(cell_center(1, 0)));
    c.on_pointer_move(&mut d, press(cell_center(1, 0) + vector(30.0, 0.0)));
    assert!(c.on_pointer_up(&mut d, press(cell_center(1, 0))).is_empty());
}

#[test]
fn deleting_the_dragged_entity_cancels_the_drag() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    d.add_connection(Connection::new(Endpoint::entity("a"), "b"))
        .unwrap();
    let mut c = canvas();
    click(&mut c, &mut d, cell_center(0, 0));
    c.on_pointer_down(&mut d, press(cell_center(0, 0)));
    c.on_pointer_move(&mut d, press(cell_center(1, 0)));
    assert!(matches!(c.mode(), Mode::DraggingEntity { .. }));

    let changes = c.remove_entity(&mut d, "a");
    assert_eq!(changes.len(), 2);
    assert_eq!(c.mode(), &Mode::Idle);
    assert!(c.on_pointer_up(&mut d, press(cell_center(1, 0))).is_empty());
    assert!(d.connections.is_empty());
}

#[test]
fn empty_canvas_drag_pans() {
    let mut d = process(&[("a", 0, 0)]);
    let mut c = canvas();
    c.on_pointer_down(&mut d, press(point(1000.0, 1000.0)));
    assert!(matches!(c.mode(), Mode::PanningCanvas { .. }));
    c.on_pointer_move(&mut d, press(point(1010.0, 1020.0)));
    c.on_pointer_move(&mut d, press(point(1015.0, 1020.0)));
    c.on_pointer_up(&mut d, press(point(1015.0, 1020.0)));
    assert_eq!(c.mode(), &Mode::Idle);
    assert_eq!(c.transform().pan_x, 15.0);
    assert_eq!(c.transform().pan_y, 20.0);

    // Hit testing follows the transform.
    click(&mut c, &mut d, cell_center(0, 0) + vector(15.0, 20.0));
    assert_eq!(c.state().selected_entity(), Some("a"));
}

#[test]
fn selected_connection_is_removed_with_delete() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    d.add_connection(Connection::new(Endpoint::entity("a"), "b").with_id("ab"))
        .unwrap();
    let mut c = canvas();

    click(&mut c, &mut d, point(300.0, 90.0));
    assert_eq!(c.state().selected_connection.as_deref(), Some("ab"));
    let changes = key(&mut c, &mut d, Key::Delete);
    assert!(matches!(&changes[0], DiagramChange::ConnectionRemoved(conn) if conn.id == "ab"));
    assert!(d.connections.is_empty());
    assert_eq!(c.state().selected_connection, None);
}

#[test]
fn delete_removes_selected_entity_with_cascade() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    d.add_connection(Connection::new(Endpoint::entity("a"), "b"))
        .unwrap();
    let mut c = canvas();
    click(&mut c, &mut d, cell_center(0, 1));
    let changes = key(&mut c, &mut d, Key::Backspace);
    assert_eq!(changes.len(), 2);
    assert!(d.entity("b").is_none());
    assert!(d.connections.is_empty());
    assert_eq!(c.mode(), &Mode::Idle);
}

#[test]
fn label_edit_commits_on_enter_and_discards_on_escape() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    d.add_connection(
        Connection::new(Endpoint::entity("a"), "b")
            .with_id("ab")
            .with_label("approve"),
    )
    .unwrap();
    let mut c = canvas();

    click(&mut c, &mut d, point(300.0, 90.0));
    assert_eq!(c.state().label_edit.as_ref().unwrap().text, "approve");
    key(&mut c, &mut d, Key::Char('d'));
    let changes = key(&mut c, &mut d, Key::Enter);
    assert!(matches!(&changes[0], DiagramChange::ConnectionUpdated(conn) if conn.label.as_deref() == Some("approved")));
    assert!(c.state().label_edit.is_none());

    click(&mut c, &mut d, point(300.0, 90.0));
    key(&mut c, &mut d, Key::Backspace);
    key(&mut c, &mut d, Key::Char('!'));
    assert!(key(&mut c, &mut d, Key::Escape).is_empty());
    assert_eq!(d.connection("ab").unwrap().label.as_deref(), Some("approved"));
    assert!(c.state().label_edit.is_none());
}

#[test]
fn clicking_away_commits_a_pending_label() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    d.add_connection(
        Connection::new(Endpoint::entity("a"), "b")
            .with_id("ab")
            .with_label("send"),
    )
    .unwrap();
    let mut c = canvas();
    click(&mut c, &mut d, point(300.0, 90.0));
    c.set_label_text("send invoice");
    let changes = click(&mut c, &mut d, point(900.0, 900.0));
    assert!(matches!(&changes[0], DiagramChange::ConnectionUpdated(conn) if conn.label.as_deref() == Some("send invoice")));
}

#[test]
fn wheel_zoom_is_clamped() {
    let mut c = canvas();
    for _ in 0..100 {
        c.on_wheel(WheelEvent {
            position: point(200.0, 200.0),
            delta_y: -1.0,
            modifiers: Modifiers::default(),
        });
    }
    assert_eq!(c.transform().scale, 3.0);
    for _ in 0..200 {
        c.on_wheel(WheelEvent {
            position: point(200.0, 200.0),
            delta_y: 1.0,
            modifiers: Modifiers::default(),
        });
    }
    assert_eq!(c.transform().scale, 0.1);
}

#[test]
fn load_prunes_orphans_and_fits_to_frame() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 4)]);
    d.connections
        .push(Connection::new(Endpoint::entity("a"), "ghost").with_id("dangling"));
    let mut c = canvas();
    let changes = c.load(&mut d, size(800.0, 600.0));
    assert!(matches!(&changes[0], DiagramChange::ConnectionRemoved(conn) if conn.id == "dangling"));
    assert!(d.connections.is_empty());

    let t = *c.transform();
    assert!(t.scale < 1.0);
    let layout = c.layout(&d);
    let center = t.to_screen(layout.bounds.unwrap().center());
    assert!((center.x - 400.0).abs() < 1e-6);
    assert!((center.y - 300.0).abs() < 1e-6);

    c.on_resize(&d, size(1600.0, 600.0));
    assert!(c.transform().scale > t.scale);
}

#[test]
fn load_separates_steps_stacked_on_one_cell() {
    let mut d = process(&[("a", 0, 0)]);
    d.entities.push(step("b", 0, 0));
    let changes = canvas().load(&mut d, size(800.0, 600.0));
    assert!(matches!(
        &changes[..],
        [DiagramChange::EntityUpdated(s)] if s.id == "b" && s.cell == GridCell::new(0, 1)
    ));
    assert_eq!(d.entity("a").unwrap().cell, GridCell::new(0, 0));
    assert_eq!(d.occupied_cells(None).len(), 2);
}

#[test]
fn unlabelled_connection_can_be_given_a_label() {
    let mut d = process(&[("a", 0, 0), ("b", 0, 1)]);
    d.add_connection(Connection::new(Endpoint::entity("a"), "b").with_id("ab"))
        .unwrap();
    let mut c = canvas();

    click(&mut c, &mut d, point(300.0, 90.0));
    assert_eq!(c.state().selected_connection.as_deref(), Some("ab"));
    assert!(c.state().label_edit.is_none());

    key(&mut c, &mut d, Key::Enter);
    assert_eq!(c.state().label_edit.as_ref().unwrap().text, "");
    key(&mut c, &mut d, Key::Char('o'));
    key(&mut c, &mut d, Key::Char('k'));
    let changes = key(&mut c, &mut d, Key::Enter);
    assert!(matches!(&changes[0], DiagramChange::ConnectionUpdated(conn) if conn.label.as_deref() == Some("ok")));

    // A second press on a selected connection opens the editor too.
    d.set_connection_label("ab", None).unwrap();
    c.select_connection("ab");
    click(&mut c, &mut d, point(300.0, 90.0));
    assert_eq!(
        c.state().label_edit.as_ref().map(|e| e.connection.as_str()),
        Some("ab")
    );
}
