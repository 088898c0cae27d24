use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Resolved geometry and behavior constants shared by layout, routing, interaction and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub entity_width: f64,
    pub entity_height: f64,
    pub column_gap: f64,
    pub row_gap: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub port_radius: f64,

    /// Lower bound of a control point's horizontal offset.
    pub min_control_offset: f64,
    /// Share of the horizontal distance used as control point offset.
    pub control_factor: f64,
    /// Extra control offset per pixel of vertical distance.
    pub vertical_correction: f64,
    pub arc_spacing: f64,
    pub backward_arc: f64,
    pub overlap_distance: f64,
    /// Radians.
    pub overlap_angle: f64,
    pub coincident_distance: f64,

    pub min_zoom: f64,
    pub max_zoom: f64,
    pub wheel_zoom_step: f64,
    pub fit_padding: f64,
    pub drag_threshold: f64,
    pub hit_tolerance: f64,

    pub breadboard_columns: usize,
    pub screen_header_height: f64,
    pub element_row_height: f64,
    pub screen_padding: f64,

    pub export_margin: f64,
    pub export_scale: f64,
    pub export_max_dimension: u32,
    pub export_jpeg_quality: u8,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            entity_width: 220.0,
            entity_height: 100.0,
            column_gap: 80.0,
            row_gap: 60.0,
            padding_x: 40.0,
            padding_y: 40.0,
            port_radius: 6.0,

            min_control_offset: 60.0,
            control_factor: 0.4,
            vertical_correction: 0.15,
            arc_spacing: 28.0,
            backward_arc: 90.0,
            overlap_distance: 30.0,
            overlap_angle: 0.26,
            coincident_distance: 8.0,

            min_zoom: 0.1,
            max_zoom: 3.0,
            wheel_zoom_step: 1.1,
            fit_padding: 48.0,
            drag_threshold: 5.0,
            hit_tolerance: 6.0,

            breadboard_columns: 3,
            screen_header_height: 44.0,
            element_row_height: 30.0,
            screen_padding: 12.0,

            export_margin: 40.0,
            export_scale: 2.0,
            export_max_dimension: 8000,
            export_jpeg_quality: 90,
        }
    }
}

impl LayoutConfig {
    /// Resolves host overrides on top of the built-in defaults and validates the result.
    ///
    /// `overrides` is a JSON object such as `{"entity": {"width": 260}}`; `null` means no
    /// overrides. Keys are grouped the way hosts usually think about them:
    /// `entity.{width,height,portRadius}`, `grid.{columnGap,rowGap,paddingX,paddingY}`,
    /// `routing.*`, `viewport.*`, `breadboard.*` and `export.*`. Non-numeric values are ignored.
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        if !(overrides.is_object() || overrides.is_null()) {
            return Err(invalid("", "overrides must be a JSON object"));
        }
        let mut out = Self::default();

        let f = |path: &str, slot: &mut f64| {
            if let Some(v) = number_at(overrides, path) {
                *slot = v;
            }
        };
        f("entity.width", &mut out.entity_width);
        f("entity.height", &mut out.entity_height);
        f("entity.portRadius", &mut out.port_radius);
        f("grid.columnGap", &mut out.column_gap);
        f("grid.rowGap", &mut out.row_gap);
        f("grid.paddingX", &mut out.padding_x);
        f("grid.paddingY", &mut out.padding_y);
        f("routing.minControlOffset", &mut out.min_control_offset);
        f("routing.controlFactor", &mut out.control_factor);
        f("routing.verticalCorrection", &mut out.vertical_correction);
        f("routing.arcSpacing", &mut out.arc_spacing);
        f("routing.backwardArc", &mut out.backward_arc);
        f("routing.overlapDistance", &mut out.overlap_distance);
        f("routing.overlapAngle", &mut out.overlap_angle);
        f("routing.coincidentDistance", &mut out.coincident_distance);
        f("viewport.minZoom", &mut out.min_zoom);
        f("viewport.maxZoom", &mut out.max_zoom);
        f("viewport.wheelZoomStep", &mut out.wheel_zoom_step);
        f("viewport.fitPadding", &mut out.fit_padding);
        f("viewport.dragThreshold", &mut out.drag_threshold);
        f("viewport.hitTolerance", &mut out.hit_tolerance);
        f("breadboard.headerHeight", &mut out.screen_header_height);
        f("breadboard.elementRowHeight", &mut out.element_row_height);
        f("breadboard.padding", &mut out.screen_padding);
        f("export.margin", &mut out.export_margin);
        f("export.scale", &mut out.export_scale);

        if let Some(v) = number_at(overrides, "breadboard.columns") {
            out.breadboard_columns = v.max(0.0) as usize;
        }
        if let Some(v) = number_at(overrides, "export.maxDimension") {
            out.export_max_dimension = v.max(0.0) as u32;
        }
        if let Some(v) = number_at(overrides, "export.jpegQuality") {
            out.export_jpeg_quality = v.clamp(1.0, 100.0) as u8;
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("entity.width", self.entity_width),
            ("entity.height", self.entity_height),
            ("viewport.minZoom", self.min_zoom),
            ("viewport.maxZoom", self.max_zoom),
            ("viewport.wheelZoomStep", self.wheel_zoom_step),
            ("breadboard.elementRowHeight", self.element_row_height),
            ("export.scale", self.export_scale),
        ];
        for (path, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(invalid(path, format!("expected a positive number, got {v}")));
            }
        }

        let non_negative = [
            ("entity.portRadius", self.port_radius),
            ("grid.columnGap", self.column_gap),
            ("grid.rowGap", self.row_gap),
            ("grid.paddingX", self.padding_x),
            ("grid.paddingY", self.padding_y),
            ("routing.minControlOffset", self.min_control_offset),
            ("routing.controlFactor", self.control_factor),
            ("routing.verticalCorrection", self.vertical_correction),
            ("routing.arcSpacing", self.arc_spacing),
            ("routing.backwardArc", self.backward_arc),
            ("routing.overlapDistance", self.overlap_distance),
            ("routing.overlapAngle", self.overlap_angle),
            ("routing.coincidentDistance", self.coincident_distance),
            ("viewport.fitPadding", self.fit_padding),
            ("viewport.dragThreshold", self.drag_threshold),
            ("viewport.hitTolerance", self.hit_tolerance),
            ("breadboard.headerHeight", self.screen_header_height),
            ("breadboard.padding", self.screen_padding),
            ("export.margin", self.export_margin),
        ];
        for (path, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(path, format!("expected a non-negative number, got {v}")));
            }
        }

        if self.min_zoom > self.max_zoom {
            return Err(invalid(
                "viewport.minZoom",
                format!(
                    "min zoom {} is larger than max zoom {}",
                    self.min_zoom, self.max_zoom
                ),
            ));
        }
        if self.breadboard_columns == 0 {
            return Err(invalid("breadboard.columns", "expected at least one column"));
        }
        if self.export_max_dimension == 0 {
            return Err(invalid("export.maxDimension", "expected a positive pixel size"));
        }
        Ok(())
    }

    /// Horizontal distance between the left edges of two adjacent columns.
    pub fn column_pitch(&self) -> f64 {
        self.entity_width + self.column_gap
    }

    /// Vertical distance between the top edges of two adjacent rows (process canvas).
    pub fn row_pitch(&self) -> f64 {
        self.entity_height + self.row_gap
    }
}

/// Number under a dotted key path, e.g. `routing.arcSpacing`.
fn number_at(overrides: &Value, dotted_path: &str) -> Option<f64> {
    dotted_path
        .split('.')
        .try_fold(overrides, |cur, key| cur.get(key))?
        .as_f64()
}

fn invalid(path: &str, message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        path: path.to_string(),
        message: message.into(),
    }
}
