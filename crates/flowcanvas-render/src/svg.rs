//! SVG output for both diagram variants.
//!
//! The interactive mode wraps the diagram in the live viewport transform and draws editor
//! affordances (port dots, hover/selection highlights, the drag ghost and the rubber-band
//! connection preview). The export mode draws only the diagram itself, sized to a fixed region.

mod breadboard;
mod process;

pub use breadboard::render_breadboard_svg;
pub use process::render_process_svg;

use flowcanvas_core::config::LayoutConfig;
use flowcanvas_core::geom::{Bounds, Point, Rect, Size, ViewportTransform, size};
use flowcanvas_core::interaction::InteractionState;
use flowcanvas_core::layout::{DiagramLayout, Hit, Port, PortSide};
use flowcanvas_core::router::{bezier_path, fmt};
use std::fmt::Write as _;

use crate::text::{TextMeasurer, TextStyle, wrap_text};

#[derive(Debug, Clone, PartialEq)]
pub enum RenderMode {
    /// Live editor view. A zero `viewport` makes the root fill its container.
    Interactive {
        transform: ViewportTransform,
        viewport: Size,
    },
    /// Static view of `region` in canvas units, without editor affordances.
    Export { region: Bounds },
}

#[derive(Debug, Clone)]
pub struct SvgRenderOptions {
    /// Root element id, also used to prefix marker ids.
    pub diagram_id: Option<String>,
    pub mode: RenderMode,
}

impl Default for SvgRenderOptions {
    fn default() -> Self {
        Self {
            diagram_id: None,
            mode: RenderMode::Interactive {
                transform: ViewportTransform::default(),
                viewport: size(0.0, 0.0),
            },
        }
    }
}

impl SvgRenderOptions {
    pub fn interactive(transform: ViewportTransform, viewport: Size) -> Self {
        Self {
            mode: RenderMode::Interactive {
                transform,
                viewport,
            },
            ..Self::default()
        }
    }

    pub fn export(region: Bounds) -> Self {
        Self {
            mode: RenderMode::Export { region },
            ..Self::default()
        }
    }

    pub fn with_diagram_id(mut self, id: &str) -> Self {
        self.diagram_id = Some(sanitize_svg_id(id));
        self
    }

    pub fn is_export(&self) -> bool {
        matches!(self.mode, RenderMode::Export { .. })
    }
}

/// Converts an arbitrary string into a conservative SVG `id` token.
///
/// Marker ids are derived from the root id, so two canvases inlined into one document need
/// distinct ids to avoid sharing arrowheads.
pub fn sanitize_svg_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "fc-untitled".to_string();
    }

    let mut out = String::with_capacity(raw.len() + 4);
    for ch in raw.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_';
        out.push(if ok { ch } else { '-' });
    }
    let starts_ok = out.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_ok {
        out.insert_str(0, "fc-");
    }
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    let out = out.trim_matches('-');
    if out.is_empty() || out == "fc" {
        return "fc-untitled".to_string();
    }
    out.to_string()
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = r#"<style>
.entity-box { fill: #ffffff; stroke: #94a3b8; stroke-width: 1.5; }
.entity.selected .entity-box { stroke: #2563eb; stroke-width: 2.5; }
.entity.hover .entity-box { stroke: #64748b; }
.entity.dragging { opacity: 0.35; }
.entity-title { fill: #0f172a; font-family: ui-sans-serif, system-ui, sans-serif; font-size: 14px; font-weight: 600; text-anchor: middle; }
.entity-attr { fill: #475569; font-family: ui-sans-serif, system-ui, sans-serif; font-size: 11px; }
.screen-header { fill: #f1f5f9; stroke: none; }
.element { fill: #f8fafc; stroke: #cbd5e1; stroke-width: 1; }
.element-kind { fill: #64748b; font-family: ui-monospace, monospace; font-size: 10px; }
.element-label { fill: #1e293b; font-family: ui-sans-serif, system-ui, sans-serif; font-size: 12px; }
.element-empty { fill: #94a3b8; font-family: ui-sans-serif, system-ui, sans-serif; font-size: 11px; font-style: italic; }
.connection { fill: none; stroke: #64748b; stroke-width: 2; }
.connection.backward { stroke-dasharray: 6 4; }
.connection.selected { stroke: #2563eb; stroke-width: 3; }
.connection.hover { stroke: #334155; }
.connection-hit { fill: none; stroke: transparent; stroke-width: 12; }
.arrowhead { fill: #64748b; }
.arrowhead-selected { fill: #2563eb; }
.connection-label-box { fill: #ffffff; stroke: #cbd5e1; stroke-width: 1; }
.connection-label-box.editing { stroke: #2563eb; }
.connection-label { fill: #334155; font-family: ui-sans-serif, system-ui, sans-serif; font-size: 12px; text-anchor: middle; dominant-baseline: central; }
.port { fill: #ffffff; stroke: #2563eb; stroke-width: 1.5; }
.port.hover, .port.active { fill: #2563eb; }
.connection-preview { fill: none; stroke: #2563eb; stroke-width: 2; stroke-dasharray: 5 4; }
.drag-ghost { fill: none; stroke: #2563eb; stroke-width: 1.5; stroke-dasharray: 6 4; }
.drop-target { fill: #dbeafe; opacity: 0.6; stroke: none; }
</style>
"#;

/// Font sizes kept in sync with [`STYLE`].
pub(crate) const TITLE_FONT_SIZE: f64 = 14.0;
pub(crate) const ATTR_FONT_SIZE: f64 = 11.0;
pub(crate) const LABEL_FONT_SIZE: f64 = 12.0;

pub(crate) struct SvgCtx<'a> {
    pub out: String,
    pub id: String,
    pub export: bool,
    pub config: &'a LayoutConfig,
    pub measurer: &'a dyn TextMeasurer,
    pub state: &'a InteractionState,
}

impl<'a> SvgCtx<'a> {
    pub fn new(
        config: &'a LayoutConfig,
        measurer: &'a dyn TextMeasurer,
        state: &'a InteractionState,
        options: &SvgRenderOptions,
    ) -> Self {
        Self {
            out: String::new(),
            id: options
                .diagram_id
                .clone()
                .unwrap_or_else(|| "flowcanvas".to_string()),
            export: options.is_export(),
            config,
            measurer,
            state,
        }
    }

    pub fn is_hovered(&self, hit: &Hit) -> bool {
        !self.export && self.state.hover.as_ref() == Some(hit)
    }

    pub fn is_selected_entity(&self, id: &str) -> bool {
        !self.export && self.state.selected_entity() == Some(id)
    }

    pub fn is_dragged(&self, id: &str) -> bool {
        !self.export && self.state.drag_preview().is_some_and(|(d, _)| d == id)
    }

    pub fn entity_classes(&self, kind: &str, id: &str) -> String {
        let mut class = format!("entity {kind}");
        if self.is_selected_entity(id) {
            class.push_str(" selected");
        }
        if self.is_hovered(&Hit::Entity(id.to_string())) {
            class.push_str(" hover");
        }
        if self.is_dragged(id) {
            class.push_str(" dragging");
        }
        class
    }

    /// Writes `lines` as a centered (or left-aligned) multi-line `<text>` starting at baseline `y`.
    pub fn text_lines(&mut self, class: &str, x: f64, y: f64, line_height: f64, lines: &[String]) {
        for (i, line) in lines.iter().enumerate() {
            let _ = write!(
                &mut self.out,
                r#"<text class="{}" x="{}" y="{}">{}</text>"#,
                class,
                fmt(x),
                fmt(y + i as f64 * line_height),
                escape_xml(line)
            );
        }
    }

    pub fn wrap(&self, text: &str, font_size: f64, max_width: f64, max_lines: usize) -> Vec<String> {
        wrap_text(
            self.measurer,
            text,
            &TextStyle::sized(font_size),
            max_width,
            max_lines,
        )
    }
}

/// Opens the root element; returns after the viewport group is open.
pub(crate) fn open_root(ctx: &mut SvgCtx<'_>, role_description: &str, options: &SvgRenderOptions) {
    let id = escape_xml(&ctx.id);
    match &options.mode {
        RenderMode::Interactive {
            transform,
            viewport,
        } => {
            let (w, h) = if viewport.width > 0.0 && viewport.height > 0.0 {
                (fmt(viewport.width), fmt(viewport.height))
            } else {
                ("100%".to_string(), "100%".to_string())
            };
            let _ = writeln!(
                &mut ctx.out,
                r#"<svg xmlns="http://www.w3.org/2000/svg" id="{id}" class="flowcanvas" width="{w}" height="{h}" role="application" aria-roledescription="{role_description}">"#
            );
            push_defs(ctx);
            let _ = writeln!(
                &mut ctx.out,
                r#"<g class="viewport" transform="{}">"#,
                transform.svg_transform()
            );
        }
        RenderMode::Export { region } => {
            let _ = writeln!(
                &mut ctx.out,
                r#"<svg xmlns="http://www.w3.org/2000/svg" id="{id}" class="flowcanvas export" width="{w}" height="{h}" viewBox="{x} {y} {w} {h}" role="img" aria-roledescription="{role_description}">"#,
                x = fmt(region.min_x),
                y = fmt(region.min_y),
                w = fmt(region.width().max(1.0)),
                h = fmt(region.height().max(1.0)),
            );
            push_defs(ctx);
            ctx.out.push_str("<g class=\"viewport\">\n");
        }
    }
}

fn push_defs(ctx: &mut SvgCtx<'_>) {
    ctx.out.push_str(STYLE);
    ctx.out.push_str("<defs>");
    for (suffix, class) in [("arrow", "arrowhead"), ("arrow-selected", "arrowhead-selected")] {
        let _ = write!(
            &mut ctx.out,
            r#"<marker id="{}-{suffix}" viewBox="0 0 10 10" refX="9" refY="5" markerWidth="8" markerHeight="8" markerUnits="userSpaceOnUse" orient="auto"><path class="{class}" d="M0,0 L10,5 L0,10 z"/></marker>"#,
            escape_xml(&ctx.id)
        );
    }
    ctx.out.push_str("</defs>\n");
}

pub(crate) fn close_root(ctx: &mut SvgCtx<'_>) {
    ctx.out.push_str("</g>\n</svg>\n");
}

pub(crate) fn render_connections(ctx: &mut SvgCtx<'_>, layout: &DiagramLayout) {
    ctx.out.push_str(r#"<g class="connections">"#);
    for c in &layout.connections {
        let id = c.id();
        let selected = !ctx.export && ctx.state.selected_connection.as_deref() == Some(id);
        let mut class = String::from("connection");
        if c.route.backward {
            class.push_str(" backward");
        }
        if selected {
            class.push_str(" selected");
        }
        if ctx.is_hovered(&Hit::Connection(id.to_string())) {
            class.push_str(" hover");
        }
        let marker = if selected { "arrow-selected" } else { "arrow" };
        let d = c.route.path.svg_path_d();
        let _ = write!(
            &mut ctx.out,
            r#"<path class="{class}" data-id="{}" d="{d}" marker-end="url(#{}-{marker})"/>"#,
            escape_xml(id),
            escape_xml(&ctx.id),
        );
        if !ctx.export {
            let _ = write!(
                &mut ctx.out,
                r#"<path class="connection-hit" data-id="{}" d="{d}"/>"#,
                escape_xml(id)
            );
        }
    }
    ctx.out.push_str("</g>\n");
}

/// Label boxes centered on each curve's `t = 0.5` point. In interactive mode a label being
/// edited shows the pending text instead of the committed one.
pub(crate) fn render_labels(ctx: &mut SvgCtx<'_>, layout: &DiagramLayout) {
    let state = ctx.state;
    let export = ctx.export;
    ctx.out.push_str(r#"<g class="connection-labels">"#);
    for c in &layout.connections {
        let editing = state
            .label_edit
            .as_ref()
            .filter(|e| !export && e.connection == c.id());
        let (text, class) = match (editing, c.label.as_deref()) {
            (Some(edit), _) => (edit.text.as_str(), "connection-label-box editing"),
            (None, Some(label)) => (label, "connection-label-box"),
            (None, None) => continue,
        };
        let metrics = ctx.measurer.measure(text, &TextStyle::sized(LABEL_FONT_SIZE));
        let w = metrics.width.max(8.0) + 16.0;
        let h = LABEL_FONT_SIZE + 10.0;
        let a = c.route.label_anchor;
        let _ = write!(
            &mut ctx.out,
            r#"<g class="connection-label-group" data-id="{}"><rect class="{class}" x="{}" y="{}" width="{}" height="{}" rx="4"/><text class="connection-label" x="{}" y="{}">{}</text></g>"#,
            escape_xml(c.id()),
            fmt(a.x - w / 2.0),
            fmt(a.y - h / 2.0),
            fmt(w),
            fmt(h),
            fmt(a.x),
            fmt(a.y),
            escape_xml(text)
        );
    }
    ctx.out.push_str("</g>\n");
}

fn port_kind(port: &Port) -> &'static str {
    match port {
        Port::Entity {
            side: PortSide::Input,
            ..
        } => "input",
        Port::Entity {
            side: PortSide::Output,
            ..
        } => "output",
        Port::Element { .. } => "element",
    }
}

pub(crate) fn render_ports(ctx: &mut SvgCtx<'_>, layout: &DiagramLayout) {
    if ctx.export {
        return;
    }
    let active = ctx.state.connection_preview().map(|(p, _)| p.clone());
    ctx.out.push_str(r#"<g class="ports">"#);
    for pp in &layout.ports {
        let mut class = format!("port port-{}", port_kind(&pp.port));
        if ctx.is_hovered(&Hit::Port(pp.port.clone())) {
            class.push_str(" hover");
        }
        if active.as_ref() == Some(&pp.port) {
            class.push_str(" active");
        }
        let element = match &pp.port {
            Port::Element { element, .. } => {
                format!(r#" data-element="{}""#, escape_xml(element))
            }
            Port::Entity { .. } => String::new(),
        };
        let _ = write!(
            &mut ctx.out,
            r#"<circle class="{class}" data-entity="{}"{element} cx="{}" cy="{}" r="{}"/>"#,
            escape_xml(pp.port.owner()),
            fmt(pp.at.x),
            fmt(pp.at.y),
            fmt(ctx.config.port_radius)
        );
    }
    ctx.out.push_str("</g>\n");
}

/// Rubber band from the originating port to the pointer while a connection is being drawn.
pub(crate) fn render_connection_preview(ctx: &mut SvgCtx<'_>, layout: &DiagramLayout) {
    if ctx.export {
        return;
    }
    let Some((source, pointer)) = ctx.state.connection_preview() else {
        return;
    };
    let Some(from) = layout.port_point(source) else {
        return;
    };
    let path = bezier_path(from, pointer, 0.0, ctx.config);
    let _ = write!(
        &mut ctx.out,
        r#"<path class="connection-preview" d="{}" marker-end="url(#{}-arrow-selected)"/>"#,
        path.svg_path_d(),
        escape_xml(&ctx.id)
    );
    ctx.out.push('\n');
}

/// Dashed outline following the pointer while an entity is dragged, plus an optional snap target.
pub(crate) fn render_drag_ghost(ctx: &mut SvgCtx<'_>, layout: &DiagramLayout, target: Option<Rect>) {
    if ctx.export {
        return;
    }
    let Some((id, top_left)) = ctx.state.drag_preview() else {
        return;
    };
    let Some(entity) = layout.entity(id) else {
        return;
    };
    if let Some(t) = target {
        push_rect(&mut ctx.out, "drop-target", t.origin, t.size);
    }
    push_rect(&mut ctx.out, "drag-ghost", top_left, entity.rect.size);
}

fn push_rect(out: &mut String, class: &str, origin: Point, size: Size) {
    let _ = writeln!(
        out,
        r#"<rect class="{class}" x="{}" y="{}" width="{}" height="{}" rx="8"/>"#,
        fmt(origin.x),
        fmt(origin.y),
        fmt(size.width),
        fmt(size.height)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_svg_id_replaces_unsupported_chars() {
        assert_eq!(sanitize_svg_id("  My Canvas #1 "), "My-Canvas-1");
        assert_eq!(sanitize_svg_id("42"), "fc-42");
        assert_eq!(sanitize_svg_id("  "), "fc-untitled");
        assert_eq!(sanitize_svg_id("--"), "fc-untitled");
    }

    #[test]
    fn escape_xml_covers_markup_characters() {
        assert_eq!(
            escape_xml(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }
}
