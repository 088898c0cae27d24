#![forbid(unsafe_code)]

//! Whole-diagram raster export.
//!
//! The export region covers every entity plus a margin and ignores the live viewport. It is
//! rendered at `scale`; when that would exceed `max_dimension` on either axis the scale is
//! lowered uniformly before rasterizing, so the aspect ratio is kept and no second resample pass
//! is needed.

use base64::Engine as _;
use flowcanvas_core::config::LayoutConfig;
use flowcanvas_core::geom::Bounds;
use flowcanvas_core::layout::{layout_breadboard, layout_process};
use flowcanvas_core::model::{Breadboard, ProcessDiagram};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    DeterministicTextMeasurer, SvgRenderOptions, export_region, render_breadboard_svg,
    render_process_svg,
};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error(transparent)]
    Render(#[from] flowcanvas_render::Error),
    #[error(transparent)]
    Model(#[from] flowcanvas_core::Error),
    #[error("cannot export an empty diagram: add at least one entity first")]
    EmptyDiagram,
    #[error("an export is already in progress")]
    ExportInProgress,
    #[error("invalid export options: {message}")]
    InvalidOptions { message: String },
    #[error("failed to parse SVG")]
    SvgParse,
    #[error("failed to allocate pixmap for raster rendering")]
    PixmapAlloc,
    #[error("failed to encode PNG")]
    PngEncode,
    #[error("invalid background color for JPG rendering")]
    JpegBackground,
    #[error("JPG rendering requires an opaque background color (e.g. white)")]
    JpegOpaqueBackgroundRequired,
    #[error("failed to encode JPG")]
    JpegEncode,
}

pub type Result<T> = std::result::Result<T, RasterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Pixels per canvas unit before the size ceiling is applied.
    pub scale: f64,
    /// Largest allowed width or height of the output, in pixels.
    pub max_dimension: u32,
    /// Space around the entity bounds, in canvas units.
    pub margin: f64,
    pub jpeg_quality: u8,
    pub background: String,
    pub format: ImageFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl ExportOptions {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            scale: config.export_scale,
            max_dimension: config.export_max_dimension,
            margin: config.export_margin,
            jpeg_quality: config.export_jpeg_quality,
            background: "white".to_string(),
            format: ImageFormat::Jpeg,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(RasterError::InvalidOptions {
                message: format!("scale must be a positive number, got {}", self.scale),
            });
        }
        if self.max_dimension == 0 {
            return Err(RasterError::InvalidOptions {
                message: "max dimension must be at least 1 pixel".to_string(),
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(RasterError::InvalidOptions {
                message: format!("JPEG quality must be within 1..=100, got {}", self.jpeg_quality),
            });
        }
        Ok(())
    }
}

/// Output geometry decided before rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportPlan {
    pub region: Bounds,
    pub width_px: u32,
    pub height_px: u32,
    /// Scale actually used; lower than the requested one when the ceiling applies.
    pub effective_scale: f64,
}

impl ExportPlan {
    pub fn downscaled(&self, options: &ExportOptions) -> bool {
        self.effective_scale < options.scale
    }
}

pub fn plan_export(region: Bounds, options: &ExportOptions) -> Result<ExportPlan> {
    options.validate()?;
    let w = region.width();
    let h = region.height();
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(RasterError::InvalidOptions {
            message: format!("export region must have a positive size, got {w}x{h}"),
        });
    }

    let max = f64::from(options.max_dimension);
    let effective_scale = options.scale.min(max / w).min(max / h);
    // Rounding up can overshoot the ceiling by one pixel when the scale was capped.
    let px = |v: f64| ((v * effective_scale).ceil().max(1.0) as u32).min(options.max_dimension);
    let plan = ExportPlan {
        region,
        width_px: px(w),
        height_px: px(h),
        effective_scale,
    };
    if plan.downscaled(options) {
        tracing::debug!(
            requested = options.scale,
            effective = effective_scale,
            width_px = plan.width_px,
            height_px = plan.height_px,
            "export downscaled to fit the size ceiling"
        );
    }
    Ok(plan)
}

/// Export SVG and plan for a process diagram.
pub fn prepare_process_export(
    diagram: &ProcessDiagram,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<(String, ExportPlan)> {
    if diagram.is_empty() {
        return Err(RasterError::EmptyDiagram);
    }
    let layout = layout_process(diagram, config);
    let plan = plan_export(export_region(&layout, options.margin)?, options)?;
    let svg = render_process_svg(
        diagram,
        &Default::default(),
        config,
        &DeterministicTextMeasurer::default(),
        &SvgRenderOptions::export(plan.region),
    );
    Ok((svg, plan))
}

/// Export SVG and plan for a breadboard.
pub fn prepare_breadboard_export(
    diagram: &Breadboard,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<(String, ExportPlan)> {
    if diagram.is_empty() {
        return Err(RasterError::EmptyDiagram);
    }
    let layout = layout_breadboard(diagram, config);
    let plan = plan_export(export_region(&layout, options.margin)?, options)?;
    let svg = render_breadboard_svg(
        diagram,
        &Default::default(),
        config,
        &DeterministicTextMeasurer::default(),
        &SvgRenderOptions::export(plan.region),
    );
    Ok((svg, plan))
}

pub fn export_process_jpeg_sync(
    diagram: &ProcessDiagram,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let (svg, plan) = prepare_process_export(diagram, config, options)?;
    svg_to_jpeg(&svg, &plan, options)
}

pub async fn export_process_jpeg(
    diagram: &ProcessDiagram,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    export_process_jpeg_sync(diagram, config, options)
}

pub fn export_breadboard_jpeg_sync(
    diagram: &Breadboard,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let (svg, plan) = prepare_breadboard_export(diagram, config, options)?;
    svg_to_jpeg(&svg, &plan, options)
}

pub async fn export_breadboard_jpeg(
    diagram: &Breadboard,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    export_breadboard_jpeg_sync(diagram, config, options)
}

pub fn export_process_png_sync(
    diagram: &ProcessDiagram,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let (svg, plan) = prepare_process_export(diagram, config, options)?;
    svg_to_png(&svg, &plan, options)
}

pub fn export_breadboard_png_sync(
    diagram: &Breadboard,
    config: &LayoutConfig,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let (svg, plan) = prepare_breadboard_export(diagram, config, options)?;
    svg_to_png(&svg, &plan, options)
}

/// `data:` URI for an encoded image.
pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Encoded image plus the plain entity/connection serialization that accompanies it.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub image: Vec<u8>,
    pub format: ImageFormat,
    pub width_px: u32,
    pub height_px: u32,
    pub json: String,
}

impl ExportArtifact {
    pub fn data_uri(&self) -> String {
        to_data_uri(&self.image, self.format.mime())
    }
}

/// Runs exports one at a time.
///
/// A request made while another is running fails with [`RasterError::ExportInProgress`]; it is
/// neither queued nor does it cancel the running export.
#[derive(Debug, Default)]
pub struct Exporter {
    busy: AtomicBool,
    options: ExportOptions,
}

/// Marks an [`Exporter`] busy until dropped.
#[derive(Debug)]
pub struct ExportGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self {
            busy: AtomicBool::new(false),
            options,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claims the exporter, or fails if an export is already running.
    pub fn try_begin(&self) -> Result<ExportGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("export requested while another export is running");
            return Err(RasterError::ExportInProgress);
        }
        Ok(ExportGuard { busy: &self.busy })
    }

    pub async fn export_process(
        &self,
        diagram: &ProcessDiagram,
        config: &LayoutConfig,
    ) -> Result<ExportArtifact> {
        let _guard = self.try_begin()?;
        let (svg, plan) = prepare_process_export(diagram, config, &self.options)?;
        self.finish(&svg, &plan, diagram.to_json()?)
    }

    pub async fn export_breadboard(
        &self,
        diagram: &Breadboard,
        config: &LayoutConfig,
    ) -> Result<ExportArtifact> {
        let _guard = self.try_begin()?;
        let (svg, plan) = prepare_breadboard_export(diagram, config, &self.options)?;
        self.finish(&svg, &plan, diagram.to_json()?)
    }

    fn finish(&self, svg: &str, plan: &ExportPlan, json: String) -> Result<ExportArtifact> {
        let image = match self.options.format {
            ImageFormat::Jpeg => svg_to_jpeg(svg, plan, &self.options)?,
            ImageFormat::Png => svg_to_png(svg, plan, &self.options)?,
        };
        tracing::debug!(
            bytes = image.len(),
            width_px = plan.width_px,
            height_px = plan.height_px,
            "export finished"
        );
        Ok(ExportArtifact {
            image,
            format: self.options.format,
            width_px: plan.width_px,
            height_px: plan.height_px,
            json,
        })
    }
}

pub fn svg_to_png(svg: &str, plan: &ExportPlan, options: &ExportOptions) -> Result<Vec<u8>> {
    let pixmap = svg_to_pixmap(svg, plan, Some(&options.background))?;
    pixmap.encode_png().map_err(|_| RasterError::PngEncode)
}

pub fn svg_to_jpeg(svg: &str, plan: &ExportPlan, options: &ExportOptions) -> Result<Vec<u8>> {
    let Some(color) = background_color(&options.background) else {
        return Err(RasterError::JpegBackground);
    };
    if color.alpha() != 1.0 {
        return Err(RasterError::JpegOpaqueBackgroundRequired);
    }

    let pixmap = svg_to_pixmap(svg, plan, Some(&options.background))?;
    let (w, h) = (pixmap.width(), pixmap.height());

    // The background is opaque, so every pixel has alpha 255 and the channel can be dropped.
    let rgba = pixmap.data();
    let mut rgb = vec![0u8; (w as usize) * (h as usize) * 3];
    for (src, dst) in rgba.chunks_exact(4).zip(rgb.chunks_exact_mut(3)) {
        dst.copy_from_slice(&src[..3]);
    }

    let mut out = Vec::new();
    let mut enc =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, options.jpeg_quality);
    enc.encode(&rgb, w, h, image::ExtendedColorType::Rgb8)
        .map_err(|_| RasterError::JpegEncode)?;
    Ok(out)
}

fn svg_to_pixmap(
    svg: &str,
    plan: &ExportPlan,
    background: Option<&str>,
) -> Result<tiny_skia::Pixmap> {
    let mut opt = usvg::Options::default();
    // Labels fall back to whatever sans-serif the host has installed.
    opt.fontdb_mut().load_system_fonts();
    opt.font_family = "Arial".to_string();

    let tree = usvg::Tree::from_str(svg, &opt).map_err(|_| RasterError::SvgParse)?;

    let mut pixmap =
        tiny_skia::Pixmap::new(plan.width_px, plan.height_px).ok_or(RasterError::PixmapAlloc)?;
    if let Some(color) = background.and_then(background_color) {
        pixmap.fill(color);
    }

    // The root viewBox already maps the region onto `width x height` canvas units.
    let scale = plan.effective_scale as f32;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    Ok(pixmap)
}

/// Background colors accepted by export: `white`, `black`, `transparent`, or `#rgb`,
/// `#rrggbb` and `#rrggbbaa` hex.
fn background_color(text: &str) -> Option<tiny_skia::Color> {
    let text = text.trim();
    let [r, g, b, a] = match text.to_ascii_lowercase().as_str() {
        "white" => [255, 255, 255, 255],
        "black" => [0, 0, 0, 255],
        "transparent" => [0; 4],
        _ => hex_rgba(text.strip_prefix('#')?)?,
    };
    Some(tiny_skia::Color::from_rgba8(r, g, b, a))
}

fn hex_rgba(hex: &str) -> Option<[u8; 4]> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).ok();
    match hex.len() {
        3 => {
            let mut rgba = [255; 4];
            for (slot, i) in rgba.iter_mut().zip(0..3) {
                *slot = channel(&hex[i..i + 1])? * 17;
            }
            Some(rgba)
        }
        6 | 8 => {
            let mut rgba = [255; 4];
            for (slot, i) in rgba.iter_mut().zip((0..hex.len()).step_by(2)) {
                *slot = channel(&hex[i..i + 2])?;
            }
            Some(rgba)
        }
        _ => None,
    }
}
