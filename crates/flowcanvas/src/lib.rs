#![forbid(unsafe_code)]

//! `flowcanvas` is a headless node-link diagram editor.
//!
//! Two diagram variants share one engine: the process canvas (steps on explicit grid cells,
//! free placement, drag with collision avoidance) and the breadboard (screens laid out by list
//! order, connected from their sub-elements).
//!
//! # Features
//!
//! - `render`: SVG output for the live editor and for export (`flowcanvas::render`)
//! - `raster`: JPEG/PNG export of the whole diagram via pure-Rust SVG rasterization

pub use flowcanvas_core::*;

#[cfg(feature = "render")]
pub mod render {
    use flowcanvas_core::config::LayoutConfig;
    use flowcanvas_core::geom::size;
    use flowcanvas_core::interaction::{BreadboardCanvas, ProcessCanvas};
    use flowcanvas_core::model::{Breadboard, ProcessDiagram};

    pub use flowcanvas_render::svg::{RenderMode, SvgRenderOptions, sanitize_svg_id};
    pub use flowcanvas_render::text::{
        DeterministicTextMeasurer, TextMeasurer, TextStyle, wrap_text,
    };
    pub use flowcanvas_render::{
        Error, Result, export_region, render_breadboard_svg, render_process_svg,
    };

    #[cfg(feature = "raster")]
    pub mod raster;

    /// Live editor frame for a process canvas, using its current transform and state.
    pub fn render_process_canvas(
        canvas: &ProcessCanvas,
        diagram: &ProcessDiagram,
        viewport_width: f64,
        viewport_height: f64,
    ) -> String {
        let options =
            SvgRenderOptions::interactive(*canvas.transform(), size(viewport_width, viewport_height));
        render_process_svg(
            diagram,
            canvas.state(),
            canvas.config(),
            &DeterministicTextMeasurer::default(),
            &options,
        )
    }

    /// Live editor frame for a breadboard canvas.
    pub fn render_breadboard_canvas(
        canvas: &BreadboardCanvas,
        diagram: &Breadboard,
        viewport_width: f64,
        viewport_height: f64,
    ) -> String {
        let options =
            SvgRenderOptions::interactive(*canvas.transform(), size(viewport_width, viewport_height));
        render_breadboard_svg(
            diagram,
            canvas.state(),
            canvas.config(),
            &DeterministicTextMeasurer::default(),
            &options,
        )
    }

    /// Static SVG of the whole process diagram with `config.export_margin` around it.
    pub fn process_export_svg(diagram: &ProcessDiagram, config: &LayoutConfig) -> Result<String> {
        let layout = flowcanvas_core::layout::layout_process(diagram, config);
        let region = export_region(&layout, config.export_margin)?;
        Ok(render_process_svg(
            diagram,
            &Default::default(),
            config,
            &DeterministicTextMeasurer::default(),
            &SvgRenderOptions::export(region),
        ))
    }

    /// Static SVG of the whole breadboard with `config.export_margin` around it.
    pub fn breadboard_export_svg(diagram: &Breadboard, config: &LayoutConfig) -> Result<String> {
        let layout = flowcanvas_core::layout::layout_breadboard(diagram, config);
        let region = export_region(&layout, config.export_margin)?;
        Ok(render_breadboard_svg(
            diagram,
            &Default::default(),
            config,
            &DeterministicTextMeasurer::default(),
            &SvgRenderOptions::export(region),
        ))
    }
}
