use flowcanvas_core::config::LayoutConfig;
use flowcanvas_core::geom::Rect;
use flowcanvas_core::grid;
use flowcanvas_core::interaction::InteractionState;
use flowcanvas_core::layout::layout_process;
use flowcanvas_core::model::ProcessDiagram;
use flowcanvas_core::router::fmt;
use std::fmt::Write as _;

use super::{
    ATTR_FONT_SIZE, SvgCtx, SvgRenderOptions, TITLE_FONT_SIZE, close_root, escape_xml, open_root,
    render_connection_preview, render_connections, render_drag_ghost, render_labels, render_ports,
};
use crate::text::TextMeasurer;

const INSET: f64 = 12.0;
const TITLE_LINE_HEIGHT: f64 = 18.0;
const ATTR_LINE_HEIGHT: f64 = 15.0;

/// Renders a process diagram: step boxes with wrapped titles and attribute lines, then the
/// connection overlay.
pub fn render_process_svg(
    diagram: &ProcessDiagram,
    state: &InteractionState,
    config: &LayoutConfig,
    measurer: &dyn TextMeasurer,
    options: &SvgRenderOptions,
) -> String {
    let layout = layout_process(diagram, config);
    let mut ctx = SvgCtx::new(config, measurer, state, options);
    open_root(&mut ctx, "process-canvas", options);

    ctx.out.push_str(r#"<g class="entities">"#);
    for entity in &layout.entities {
        let Some(step) = diagram.entities.get(entity.index) else {
            continue;
        };
        let rect = entity.rect;
        let class = ctx.entity_classes("step", &step.id);
        let _ = write!(
            &mut ctx.out,
            r#"<g class="{class}" data-id="{}" transform="translate({} {})"><rect class="entity-box" width="{}" height="{}" rx="8"/>"#,
            escape_xml(&step.id),
            fmt(rect.min_x()),
            fmt(rect.min_y()),
            fmt(rect.width()),
            fmt(rect.height())
        );

        let inner = rect.width() - 2.0 * INSET;
        let title = ctx.wrap(&step.title, TITLE_FONT_SIZE, inner, 2);
        let title_top = INSET + TITLE_FONT_SIZE;
        ctx.text_lines(
            "entity-title",
            rect.width() / 2.0,
            title_top,
            TITLE_LINE_HEIGHT,
            &title,
        );

        let attr_top = title_top + title.len() as f64 * TITLE_LINE_HEIGHT + 2.0;
        let room = ((rect.height() - attr_top) / ATTR_LINE_HEIGHT).floor().max(0.0) as usize;
        let attrs: Vec<String> = step
            .attribute_lines()
            .iter()
            .take(room)
            .filter_map(|line| ctx.wrap(line, ATTR_FONT_SIZE, inner, 1).into_iter().next())
            .collect();
        ctx.text_lines("entity-attr", INSET, attr_top, ATTR_LINE_HEIGHT, &attrs);
        ctx.out.push_str("</g>");
    }
    ctx.out.push_str("</g>\n");

    render_connections(&mut ctx, &layout);
    render_labels(&mut ctx, &layout);
    render_ports(&mut ctx, &layout);
    let target = drop_target(diagram, state, config);
    render_drag_ghost(&mut ctx, &layout, target);
    render_connection_preview(&mut ctx, &layout);

    close_root(&mut ctx);
    ctx.out
}

/// The cell a drag would land on if released now.
fn drop_target(
    diagram: &ProcessDiagram,
    state: &InteractionState,
    config: &LayoutConfig,
) -> Option<Rect> {
    let (id, top_left) = state.drag_preview()?;
    let occupied = diagram.occupied_cells(Some(id));
    let cell = grid::find_nearest_free_cell(grid::pixel_to_grid(top_left, config), &occupied);
    Some(grid::entity_rect(cell, config))
}
