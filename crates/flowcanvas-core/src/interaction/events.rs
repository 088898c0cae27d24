use crate::geom::{Point, Size};
use crate::model::{Diagram, DiagramChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pointer input in screen pixels relative to the canvas viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn primary(position: Point) -> Self {
        Self {
            position,
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    pub position: Point,
    /// Positive values scroll down (zoom out).
    pub delta_y: f64,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Delete,
    Backspace,
    Char(char),
    Other,
}

/// The event surface a windowing layer drives.
///
/// Hosts forward their native resize/pointer/wheel/key events here; the editor never talks to a
/// windowing system directly. Handlers that can mutate the diagram return the resulting changes.
pub trait ViewportEvents<E> {
    fn on_resize(&mut self, diagram: &Diagram<E>, viewport: Size);

    fn on_pointer_down(
        &mut self,
        diagram: &mut Diagram<E>,
        event: PointerEvent,
    ) -> Vec<DiagramChange<E>>;

    fn on_pointer_move(
        &mut self,
        diagram: &mut Diagram<E>,
        event: PointerEvent,
    ) -> Vec<DiagramChange<E>>;

    fn on_pointer_up(
        &mut self,
        diagram: &mut Diagram<E>,
        event: PointerEvent,
    ) -> Vec<DiagramChange<E>>;

    fn on_wheel(&mut self, event: WheelEvent);

    fn on_key_down(
        &mut self,
        diagram: &mut Diagram<E>,
        key: Key,
        modifiers: Modifiers,
    ) -> Vec<DiagramChange<E>>;
}
