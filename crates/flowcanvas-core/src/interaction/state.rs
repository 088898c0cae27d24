use crate::geom::{Point, Vector};
use crate::layout::{Hit, Port};

/// Exclusive interaction mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mode {
    #[default]
    Idle,
    /// Dragging the empty canvas; `last` is the previous pointer position in screen pixels.
    PanningCanvas { last: Point },
    /// `press` holds the screen position of a pointer press on the already selected entity,
    /// until it either turns into a drag or is released.
    EntitySelected { id: String, press: Option<Point> },
    /// `pointer` is in canvas space; the entity's top-left follows `pointer - grab_offset`.
    DraggingEntity {
        id: String,
        grab_offset: Vector,
        pointer: Point,
    },
    PlacingNewEntity,
    ConnectingFromPort { source: Port },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::PanningCanvas { .. } => "panning",
            Mode::EntitySelected { .. } => "entity-selected",
            Mode::DraggingEntity { .. } => "dragging",
            Mode::PlacingNewEntity => "placing",
            Mode::ConnectingFromPort { .. } => "connecting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEdit {
    pub connection: String,
    pub text: String,
}

/// Everything the editor tracks between events, as one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InteractionState {
    pub mode: Mode,
    pub selected_connection: Option<String>,
    pub label_edit: Option<LabelEdit>,
    pub detail_panel_open: bool,
    pub hover: Option<Hit>,
    /// Last known pointer position in canvas space.
    pub pointer: Option<Point>,
}

impl InteractionState {
    pub fn selected_entity(&self) -> Option<&str> {
        match &self.mode {
            Mode::EntitySelected { id, .. } | Mode::DraggingEntity { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Dragged entity id and the canvas-space top-left it would currently be drawn at.
    pub fn drag_preview(&self) -> Option<(&str, Point)> {
        match &self.mode {
            Mode::DraggingEntity {
                id,
                grab_offset,
                pointer,
            } => Some((id, *pointer - *grab_offset)),
            _ => None,
        }
    }

    /// Source port and pointer of an in-progress connection.
    pub fn connection_preview(&self) -> Option<(&Port, Point)> {
        match (&self.mode, self.pointer) {
            (Mode::ConnectingFromPort { source }, Some(p)) => Some((source, p)),
            _ => None,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_connection = None;
        self.detail_panel_open = false;
        if matches!(
            self.mode,
            Mode::EntitySelected { .. } | Mode::DraggingEntity { .. }
        ) {
            self.mode = Mode::Idle;
        }
    }
}
