use flowcanvas_core::config::LayoutConfig;
use flowcanvas_core::interaction::InteractionState;
use flowcanvas_core::layout::layout_breadboard;
use flowcanvas_core::model::Breadboard;
use flowcanvas_core::router::fmt;
use std::fmt::Write as _;

use super::{
    ATTR_FONT_SIZE, SvgCtx, SvgRenderOptions, TITLE_FONT_SIZE, close_root, escape_xml, open_root,
    render_connection_preview, render_connections, render_labels, render_ports,
};
use crate::text::TextMeasurer;

const KIND_COLUMN: f64 = 52.0;

pub fn render_breadboard_svg(
    diagram: &Breadboard,
    state: &InteractionState,
    config: &LayoutConfig,
    measurer: &dyn TextMeasurer,
    options: &SvgRenderOptions,
) -> String {
    let layout = layout_breadboard(diagram, config);
    let mut ctx = SvgCtx::new(config, measurer, state, options);
    open_root(&mut ctx, "breadboard", options);

    let pad = config.screen_padding;
    let header = config.screen_header_height;
    let row = config.element_row_height;

    ctx.out.push_str(r#"<g class="entities">"#);
    for entity in &layout.entities {
        let Some(screen) = diagram.entities.get(entity.index) else {
            continue;
        };
        let rect = entity.rect;
        let w = rect.width();
        let class = ctx.entity_classes("screen", &screen.id);
        let _ = write!(
            &mut ctx.out,
            r#"<g class="{class}" data-id="{}" transform="translate({} {})"><rect class="entity-box" width="{}" height="{}" rx="8"/><rect class="screen-header" x="1" y="1" width="{}" height="{}" rx="7"/>"#,
            escape_xml(&screen.id),
            fmt(rect.min_x()),
            fmt(rect.min_y()),
            fmt(w),
            fmt(rect.height()),
            fmt(w - 2.0),
            fmt(pad + header - 1.0)
        );
        let title = ctx.wrap(&screen.title, TITLE_FONT_SIZE, w - 2.0 * pad, 1);
        ctx.text_lines(
            "entity-title",
            w / 2.0,
            pad + header / 2.0 + TITLE_FONT_SIZE / 3.0,
            0.0,
            &title,
        );

        if screen.elements.is_empty() {
            ctx.text_lines(
                "element-empty",
                pad,
                pad + header + row / 2.0 + ATTR_FONT_SIZE / 3.0,
                0.0,
                &["No elements".to_string()],
            );
        }
        for (i, element) in screen.elements.iter().enumerate() {
            let top = pad + header + i as f64 * row;
            let baseline = top + row / 2.0 + ATTR_FONT_SIZE / 3.0;
            let _ = write!(
                &mut ctx.out,
                r#"<rect class="element element-{}" data-element="{}" x="{}" y="{}" width="{}" height="{}" rx="4"/>"#,
                element.kind.as_str(),
                escape_xml(&element.id),
                fmt(pad),
                fmt(top + 3.0),
                fmt(w - 2.0 * pad),
                fmt(row - 6.0)
            );
            ctx.text_lines(
                "element-kind",
                pad + 6.0,
                baseline,
                0.0,
                &[element.kind.as_str().to_string()],
            );
            let label = ctx.wrap(
                &element.label,
                ATTR_FONT_SIZE + 1.0,
                w - 2.0 * pad - KIND_COLUMN - 6.0,
                1,
            );
            ctx.text_lines("element-label", pad + KIND_COLUMN, baseline, 0.0, &label);
        }
        ctx.out.push_str("</g>");
    }
    ctx.out.push_str("</g>\n");

    render_connections(&mut ctx, &layout);
    render_labels(&mut ctx, &layout);
    render_ports(&mut ctx, &layout);
    render_connection_preview(&mut ctx, &layout);

    close_root(&mut ctx);
    ctx.out
}
