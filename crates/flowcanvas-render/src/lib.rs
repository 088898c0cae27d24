#![forbid(unsafe_code)]

//! SVG rendering for flowcanvas diagrams.
//!
//! Rendering re-runs the layout pass on every call; nothing is cached between frames.

pub mod svg;
pub mod text;

use flowcanvas_core::geom::Bounds;
use flowcanvas_core::layout::DiagramLayout;

pub use svg::{RenderMode, SvgRenderOptions, render_breadboard_svg, render_process_svg};
pub use text::{DeterministicTextMeasurer, TextMeasurer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot export an empty diagram: add at least one entity first")]
    EmptyDiagram,
    #[error("invalid export region: {message}")]
    InvalidRegion { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Region covering every entity plus `margin` on each side, in canvas units.
///
/// This is independent of the live viewport, so exports always contain the whole diagram.
pub fn export_region(layout: &DiagramLayout, margin: f64) -> Result<Bounds> {
    if layout.entities.is_empty() {
        return Err(Error::EmptyDiagram);
    }
    let Some(bounds) = layout.bounds else {
        return Err(Error::EmptyDiagram);
    };
    if !margin.is_finite() || margin < 0.0 {
        return Err(Error::InvalidRegion {
            message: format!("margin must be a non-negative number, got {margin}"),
        });
    }
    let region = bounds.padded(margin);
    if !(region.width().is_finite() && region.height().is_finite()) {
        return Err(Error::InvalidRegion {
            message: "entity bounds are not finite".to_string(),
        });
    }
    tracing::debug!(
        width = region.width(),
        height = region.height(),
        "export region computed"
    );
    Ok(region)
}
