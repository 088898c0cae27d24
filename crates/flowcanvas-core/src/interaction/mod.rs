//! Pointer/keyboard interaction state machine.
//!
//! One [`Canvas`] drives either diagram variant: [`ProcessCanvas`] places, drags and connects
//! process steps on explicit grid cells; [`BreadboardCanvas`] is the reduced analogue for
//! screens whose positions follow their order, connected from sub-element ports.

mod canvas;
mod events;
mod state;

pub use canvas::{BreadboardCanvas, Canvas, CanvasEntity, ProcessCanvas};
pub use events::{Key, Modifiers, PointerButton, PointerEvent, ViewportEvents, WheelEvent};
pub use state::{InteractionState, LabelEdit, Mode};
