#![forbid(unsafe_code)]

//! Headless node-link diagram editing engine.
//!
//! Design goals:
//! - layout is a pure function of the diagram (no incremental patching, no hidden caches)
//! - the host owns the diagram; editors return change lists instead of calling back
//! - windowing-agnostic input through [`interaction::ViewportEvents`]

pub mod config;
pub mod error;
pub mod geom;
pub mod grid;
pub mod interaction;
pub mod layout;
pub mod model;
pub mod router;

#[cfg(test)]
mod tests;

pub use config::LayoutConfig;
pub use error::{Error, Result};
pub use geom::{Bounds, ViewportTransform};
pub use interaction::{BreadboardCanvas, Canvas, ProcessCanvas, ViewportEvents};
pub use layout::{DiagramLayout, Hit, Port, PortSide, layout_breadboard, layout_process};
pub use model::{
    Breadboard, Connection, Diagram, DiagramChange, DiagramEntity, ElementKind, Endpoint,
    GridCell, ProcessDiagram, ProcessStep, Screen, SubElement,
};
