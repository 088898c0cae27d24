use crate::config::LayoutConfig;
use crate::geom::{Point, Size, ViewportTransform, point, size};
use crate::grid;
use crate::layout::{self, DiagramLayout, Hit, Port};
use crate::model::{
    Connection, Diagram, DiagramChange, DiagramEntity, ElementKind, ProcessStep, Screen,
    SubElement, new_id,
};

use super::events::{Key, Modifiers, PointerButton, PointerEvent, ViewportEvents, WheelEvent};
use super::state::{InteractionState, LabelEdit, Mode};

/// Per-variant behavior plugged into [`Canvas`].
pub trait CanvasEntity: DiagramEntity + Sized {
    /// Whether entities can be dragged to a new position.
    const MOVABLE: bool;

    fn layout(diagram: &Diagram<Self>, config: &LayoutConfig) -> DiagramLayout;

    /// Builds the entity created by a placement click at canvas point `at`.
    fn place(diagram: &Diagram<Self>, at: Point, config: &LayoutConfig) -> Self;

    /// Commits a drag release with the entity's top-left at `top_left`.
    fn drop_at(
        diagram: &mut Diagram<Self>,
        id: &str,
        top_left: Point,
        config: &LayoutConfig,
    ) -> Option<DiagramChange<Self>>;
}

impl CanvasEntity for ProcessStep {
    const MOVABLE: bool = true;

    fn layout(diagram: &Diagram<Self>, config: &LayoutConfig) -> DiagramLayout {
        layout::layout_process(diagram, config)
    }

    fn place(diagram: &Diagram<Self>, at: Point, config: &LayoutConfig) -> Self {
        let cell = grid::find_nearest_free_cell(
            grid::cell_at(at, config),
            &diagram.occupied_cells(None),
        );
        ProcessStep::new(new_id("step"), "New step", cell)
    }

    fn drop_at(
        diagram: &mut Diagram<Self>,
        id: &str,
        top_left: Point,
        config: &LayoutConfig,
    ) -> Option<DiagramChange<Self>> {
        let occupied = diagram.occupied_cells(Some(id));
        let cell = grid::find_nearest_free_cell(grid::pixel_to_grid(top_left, config), &occupied);
        let step = diagram.entity_mut(id)?;
        if step.cell == cell {
            return None;
        }
        tracing::debug!(entity = id, from = %step.cell, to = %cell, "step moved");
        step.cell = cell;
        Some(DiagramChange::EntityUpdated(step.clone()))
    }
}

impl CanvasEntity for Screen {
    const MOVABLE: bool = false;

    fn layout(diagram: &Diagram<Self>, config: &LayoutConfig) -> DiagramLayout {
        layout::layout_breadboard(diagram, config)
    }

    fn place(_diagram: &Diagram<Self>, _at: Point, _config: &LayoutConfig) -> Self {
        Screen::new(new_id("screen"), "New screen")
    }

    fn drop_at(
        _diagram: &mut Diagram<Self>,
        _id: &str,
        _top_left: Point,
        _config: &LayoutConfig,
    ) -> Option<DiagramChange<Self>> {
        None
    }
}

/// Interactive editor for one diagram variant.
///
/// The host keeps the [`Diagram`] and passes it to every handler; the canvas only holds the
/// viewport transform and the [`InteractionState`] record.
#[derive(Debug, Clone)]
pub struct Canvas<E> {
    config: LayoutConfig,
    transform: ViewportTransform,
    viewport: Size,
    state: InteractionState,
    _entity: std::marker::PhantomData<fn() -> E>,
}

pub type ProcessCanvas = Canvas<ProcessStep>;
pub type BreadboardCanvas = Canvas<Screen>;

impl<E: CanvasEntity> Canvas<E> {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            transform: ViewportTransform::default(),
            viewport: size(0.0, 0.0),
            state: InteractionState::default(),
            _entity: std::marker::PhantomData,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn transform(&self) -> &ViewportTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: ViewportTransform) {
        self.transform = transform;
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn mode(&self) -> &Mode {
        &self.state.mode
    }

    pub fn layout(&self, diagram: &Diagram<E>) -> DiagramLayout {
        E::layout(diagram, &self.config)
    }

    /// Prepares a freshly loaded diagram: drops dangling connections, separates overlapping
    /// entities and fits the result to the frame.
    pub fn load(&mut self, diagram: &mut Diagram<E>, viewport: Size) -> Vec<DiagramChange<E>> {
        self.state = InteractionState::default();
        self.viewport = viewport;
        let mut changes = diagram.prune_orphans();
        changes.extend(diagram.resolve_collisions());
        self.fit_to_frame(diagram);
        changes
    }

    pub fn fit_to_frame(&mut self, diagram: &Diagram<E>) {
        let layout = self.layout(diagram);
        self.transform = ViewportTransform::fit_to_frame(
            layout.bounds,
            self.viewport,
            self.config.fit_padding,
            self.config.min_zoom,
            self.config.max_zoom,
        );
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.state.mode != mode {
            tracing::debug!(from = self.state.mode.name(), to = mode.name(), "mode change");
        }
        self.state.mode = mode;
    }

    /// Enters placement mode; the next primary click creates an entity.
    pub fn begin_placing(&mut self) {
        self.state.clear_selection();
        self.state.label_edit = None;
        self.set_mode(Mode::PlacingNewEntity);
    }

    /// Starts a connection from `port`, as if its dot had been clicked.
    pub fn begin_connecting(&mut self, port: Port) {
        self.state.clear_selection();
        self.state.label_edit = None;
        self.set_mode(Mode::ConnectingFromPort { source: port });
    }

    /// Leaves placement/connection/drag modes without changing the diagram.
    pub fn cancel(&mut self) {
        match self.state.mode {
            Mode::PlacingNewEntity | Mode::ConnectingFromPort { .. } | Mode::PanningCanvas { .. } => {
                self.set_mode(Mode::Idle)
            }
            Mode::DraggingEntity { ref id, .. } => {
                let id = id.clone();
                self.set_mode(Mode::EntitySelected { id, press: None });
            }
            Mode::Idle | Mode::EntitySelected { .. } => {}
        }
    }

    pub fn select_entity(&mut self, id: &str) {
        self.state.selected_connection = None;
        self.state.detail_panel_open = true;
        self.set_mode(Mode::EntitySelected {
            id: id.to_string(),
            press: None,
        });
    }

    pub fn select_connection(&mut self, id: &str) {
        self.state.clear_selection();
        self.state.selected_connection = Some(id.to_string());
        self.set_mode(Mode::Idle);
    }

    pub fn clear_selection(&mut self) {
        self.state.clear_selection();
    }

    /// Places a new entity at canvas point `at`, selects it and leaves placement mode.
    pub fn place_at(&mut self, diagram: &mut Diagram<E>, at: Point) -> Vec<DiagramChange<E>> {
        let entity = E::place(diagram, at, &self.config);
        let id = entity.id().to_string();
        match diagram.add_entity(entity) {
            Ok(change) => {
                self.select_entity(&id);
                vec![change]
            }
            Err(err) => {
                tracing::warn!(%err, "placement rejected");
                self.set_mode(Mode::Idle);
                Vec::new()
            }
        }
    }

    /// Removes an entity with its connections. A drag of that entity is cancelled.
    pub fn remove_entity(&mut self, diagram: &mut Diagram<E>, id: &str) -> Vec<DiagramChange<E>> {
        if self.state.selected_entity() == Some(id) {
            self.state.detail_panel_open = false;
            self.set_mode(Mode::Idle);
        }
        if matches!(&self.state.mode, Mode::ConnectingFromPort { source } if source.owner() == id) {
            self.set_mode(Mode::Idle);
        }
        let changes = match diagram.remove_entity(id) {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!(%err, "remove failed");
                return Vec::new();
            }
        };
        self.forget_removed_connections(&changes);
        changes
    }

    pub fn remove_connection(
        &mut self,
        diagram: &mut Diagram<E>,
        id: &str,
    ) -> Vec<DiagramChange<E>> {
        match diagram.remove_connection(id) {
            Ok(change) => {
                let changes = vec![change];
                self.forget_removed_connections(&changes);
                changes
            }
            Err(err) => {
                tracing::warn!(%err, "remove failed");
                Vec::new()
            }
        }
    }

    fn forget_removed_connections(&mut self, changes: &[DiagramChange<E>]) {
        for change in changes {
            let DiagramChange::ConnectionRemoved(c) = change else {
                continue;
            };
            if self.state.selected_connection.as_deref() == Some(c.id.as_str()) {
                self.state.selected_connection = None;
            }
            if self
                .state
                .label_edit
                .as_ref()
                .is_some_and(|e| e.connection == c.id)
            {
                self.state.label_edit = None;
            }
        }
    }

    /// Opens the label editor for a connection, seeded with its current label.
    pub fn begin_label_edit(&mut self, diagram: &Diagram<E>, connection: &str) {
        let Some(c) = diagram.connection(connection) else {
            return;
        };
        self.state.clear_selection();
        self.state.selected_connection = Some(connection.to_string());
        self.state.label_edit = Some(LabelEdit {
            connection: connection.to_string(),
            text: c.label.clone().unwrap_or_default(),
        });
    }

    /// Replaces the pending label text (for hosts with native text inputs).
    pub fn set_label_text(&mut self, text: &str) {
        if let Some(edit) = self.state.label_edit.as_mut() {
            edit.text = text.to_string();
        }
    }

    pub fn commit_label_edit(&mut self, diagram: &mut Diagram<E>) -> Vec<DiagramChange<E>> {
        let Some(edit) = self.state.label_edit.take() else {
            return Vec::new();
        };
        match diagram.set_connection_label(&edit.connection, Some(&edit.text)) {
            Ok(change) => change.into_iter().collect(),
            Err(err) => {
                tracing::warn!(%err, "label commit failed");
                Vec::new()
            }
        }
    }

    pub fn cancel_label_edit(&mut self) {
        self.state.label_edit = None;
    }

    /// Finishes a connection at `target`. Returns the change when a new connection was added.
    fn connect(
        &mut self,
        diagram: &mut Diagram<E>,
        source: &Port,
        target: &Port,
    ) -> Vec<DiagramChange<E>> {
        self.set_mode(Mode::Idle);
        if source == target {
            tracing::debug!("connection cancelled on originating port");
            return Vec::new();
        }
        let connection = Connection::new(source.as_source(), target.owner());
        match diagram.add_connection(connection) {
            Ok(change) => change.into_iter().collect(),
            Err(err) => {
                tracing::debug!(%err, "connection rejected");
                Vec::new()
            }
        }
    }

    fn hit(&self, layout: &DiagramLayout, at: Point) -> Hit {
        layout.hit_test(
            at,
            self.config.port_radius,
            self.config.hit_tolerance / self.transform.scale,
        )
    }
}

impl<E: CanvasEntity> ViewportEvents<E> for Canvas<E> {
    fn on_resize(&mut self, diagram: &Diagram<E>, viewport: Size) {
        self.viewport = viewport;
        self.fit_to_frame(diagram);
    }

    fn on_pointer_down(
        &mut self,
        diagram: &mut Diagram<E>,
        event: PointerEvent,
    ) -> Vec<DiagramChange<E>> {
        match event.button {
            PointerButton::Primary => {}
            PointerButton::Middle => {
                self.set_mode(Mode::PanningCanvas {
                    last: event.position,
                });
                return Vec::new();
            }
            PointerButton::Secondary => return Vec::new(),
        }

        let at = self.transform.to_canvas(event.position);
        self.state.pointer = Some(at);
        let layout = self.layout(diagram);
        let hit = self.hit(&layout, at);

        let mut changes = Vec::new();
        let editing_other_label = self
            .state
            .label_edit
            .as_ref()
            .is_some_and(|e| hit != Hit::ConnectionLabel(e.connection.clone()));
        if editing_other_label {
            changes.extend(self.commit_label_edit(diagram));
        }

        match self.state.mode.clone() {
            Mode::PlacingNewEntity => {
                changes.extend(self.place_at(diagram, at));
            }
            Mode::ConnectingFromPort { source } => match hit {
                Hit::Port(target) => changes.extend(self.connect(diagram, &source, &target)),
                _ => {
                    tracing::debug!("connection cancelled");
                    self.set_mode(Mode::Idle);
                }
            },
            current => match hit {
                Hit::Port(port) => self.begin_connecting(port),
                Hit::ConnectionLabel(id) => {
                    if self.state.label_edit.is_none() {
                        self.begin_label_edit(diagram, &id);
                    }
                }
                Hit::Entity(id) => {
                    let already_selected =
                        matches!(&current, Mode::EntitySelected { id: sel, .. } if *sel == id);
                    if already_selected && E::MOVABLE {
                        self.set_mode(Mode::EntitySelected {
                            id,
                            press: Some(event.position),
                        });
                    } else {
                        self.select_entity(&id);
                    }
                }
                Hit::Connection(id) => {
                    // A second press on the selected connection opens its label editor.
                    if self.state.selected_connection.as_deref() == Some(id.as_str()) {
                        self.begin_label_edit(diagram, &id);
                    } else {
                        self.select_connection(&id);
                    }
                }
                Hit::Canvas => {
                    self.state.clear_selection();
                    self.set_mode(Mode::PanningCanvas {
                        last: event.position,
                    });
                }
            },
        }
        changes
    }

    fn on_pointer_move(
        &mut self,
        diagram: &mut Diagram<E>,
        event: PointerEvent,
    ) -> Vec<DiagramChange<E>> {
        let at = self.transform.to_canvas(event.position);
        self.state.pointer = Some(at);

        match self.state.mode.clone() {
            Mode::PanningCanvas { last } => {
                self.transform.pan_by(event.position - last);
                self.state.mode = Mode::PanningCanvas {
                    last: event.position,
                };
            }
            Mode::EntitySelected {
                id,
                press: Some(start),
            } => {
                if (event.position - start).length() <= self.config.drag_threshold {
                    return Vec::new();
                }
                let layout = self.layout(diagram);
                let Some(entity) = layout.entity(&id) else {
                    self.set_mode(Mode::Idle);
                    return Vec::new();
                };
                let grab_offset = self.transform.to_canvas(start) - entity.rect.origin;
                self.set_mode(Mode::DraggingEntity {
                    id,
                    grab_offset,
                    pointer: at,
                });
            }
            Mode::DraggingEntity {
                id, grab_offset, ..
            } => {
                if diagram.entity(&id).is_none() {
                    tracing::debug!(entity = %id, "dragged entity vanished; drag cancelled");
                    self.set_mode(Mode::Idle);
                    return Vec::new();
                }
                self.state.mode = Mode::DraggingEntity {
                    id,
                    grab_offset,
                    pointer: at,
                };
            }
            _ => {
                let layout = self.layout(diagram);
                let hit = self.hit(&layout, at);
                self.state.hover = (hit != Hit::Canvas).then_some(hit);
            }
        }
        Vec::new()
    }

    fn on_pointer_up(
        &mut self,
        diagram: &mut Diagram<E>,
        event: PointerEvent,
    ) -> Vec<DiagramChange<E>> {
        let at = self.transform.to_canvas(event.position);
        self.state.pointer = Some(at);

        match self.state.mode.clone() {
            Mode::PanningCanvas { .. } => {
                self.set_mode(Mode::Idle);
                Vec::new()
            }
            Mode::EntitySelected { id, press: Some(_) } => {
                self.state.mode = Mode::EntitySelected { id, press: None };
                Vec::new()
            }
            Mode::DraggingEntity {
                id, grab_offset, ..
            } => {
                if diagram.entity(&id).is_none() {
                    self.set_mode(Mode::Idle);
                    return Vec::new();
                }
                let change = E::drop_at(diagram, &id, at - grab_offset, &self.config);
                self.set_mode(Mode::EntitySelected { id, press: None });
                change.into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn on_wheel(&mut self, event: WheelEvent) {
        if event.delta_y == 0.0 || !event.delta_y.is_finite() {
            return;
        }
        let step = self.config.wheel_zoom_step;
        let factor = if event.delta_y < 0.0 { step } else { 1.0 / step };
        self.transform.zoom_at(
            event.position,
            factor,
            self.config.min_zoom,
            self.config.max_zoom,
        );
    }

    fn on_key_down(
        &mut self,
        diagram: &mut Diagram<E>,
        key: Key,
        _modifiers: Modifiers,
    ) -> Vec<DiagramChange<E>> {
        if let Some(edit) = self.state.label_edit.as_mut() {
            match key {
                Key::Enter => return self.commit_label_edit(diagram),
                Key::Escape => self.cancel_label_edit(),
                Key::Backspace => {
                    edit.text.pop();
                }
                Key::Char(c) => edit.text.push(c),
                Key::Delete | Key::Other => {}
            }
            return Vec::new();
        }

        match key {
            Key::Escape => {
                match self.state.mode {
                    Mode::PlacingNewEntity
                    | Mode::ConnectingFromPort { .. }
                    | Mode::EntitySelected { .. }
                    | Mode::DraggingEntity { .. } => self.set_mode(Mode::Idle),
                    Mode::Idle | Mode::PanningCanvas { .. } => {}
                }
                self.state.selected_connection = None;
                self.state.detail_panel_open = false;
                Vec::new()
            }
            Key::Delete | Key::Backspace => {
                if let Some(id) = self.state.selected_connection.clone() {
                    return self.remove_connection(diagram, &id);
                }
                if let Mode::EntitySelected { id, .. } = self.state.mode.clone() {
                    return self.remove_entity(diagram, &id);
                }
                Vec::new()
            }
            Key::Enter => {
                if let Some(id) = self.state.selected_connection.clone() {
                    self.begin_label_edit(diagram, &id);
                }
                Vec::new()
            }
            Key::Char(_) | Key::Other => Vec::new(),
        }
    }
}

impl Canvas<Screen> {
    /// Appends a screen; its position follows from its index.
    pub fn add_screen(
        &mut self,
        diagram: &mut Diagram<Screen>,
        title: &str,
    ) -> Vec<DiagramChange<Screen>> {
        let mut screen = Screen::place(diagram, point(0.0, 0.0), &self.config);
        screen.title = title.to_string();
        let id = screen.id.clone();
        match diagram.add_entity(screen) {
            Ok(change) => {
                self.select_entity(&id);
                vec![change]
            }
            Err(err) => {
                tracing::warn!(%err, "screen rejected");
                Vec::new()
            }
        }
    }

    pub fn add_element(
        &mut self,
        diagram: &mut Diagram<Screen>,
        screen: &str,
        kind: ElementKind,
        label: &str,
    ) -> Vec<DiagramChange<Screen>> {
        let element = SubElement::new(new_id("el"), kind, label);
        match diagram.add_element(screen, element) {
            Ok(change) => vec![change],
            Err(err) => {
                tracing::warn!(%err, "element rejected");
                Vec::new()
            }
        }
    }

    /// Removes a sub-element together with the connections it sources.
    pub fn remove_element(
        &mut self,
        diagram: &mut Diagram<Screen>,
        screen: &str,
        element: &str,
    ) -> Vec<DiagramChange<Screen>> {
        let changes = match diagram.remove_element(screen, element) {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!(%err, "remove failed");
                return Vec::new();
            }
        };
        let source_removed = matches!(
            &self.state.mode,
            Mode::ConnectingFromPort { source: Port::Element { entity, element: e } }
                if entity == screen && e == element
        );
        if source_removed {
            self.set_mode(Mode::Idle);
        }
        self.forget_removed_connections(&changes);
        changes
    }
}
