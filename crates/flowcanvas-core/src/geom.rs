#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Rect = euclid::Rect<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

pub fn size(width: f64, height: f64) -> Size {
    euclid::size2(width, height)
}

pub fn is_finite_point(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Axis-aligned bounds in logical canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            min_x: rect.min_x(),
            min_y: rect.min_y(),
            max_x: rect.max_x(),
            max_y: rect.max_y(),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut it = points.into_iter();
        let (x0, y0) = it.next()?;
        let mut b = Self {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        };
        for (x, y) in it {
            b.min_x = b.min_x.min(x);
            b.min_y = b.min_y.min(y);
            b.max_x = b.max_x.max(x);
            b.max_y = b.max_y.max(y);
        }
        Some(b)
    }

    pub fn from_rects<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Self> {
        Self::from_points(rects.into_iter().flat_map(|r| {
            [(r.min_x(), r.min_y()), (r.max_x(), r.max_y())]
        }))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        point(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(point(self.min_x, self.min_y), size(self.width(), self.height()))
    }
}

/// Pan/zoom state mapping logical canvas space onto the screen.
///
/// `screen = canvas * scale + pan`. Ephemeral: hosts recompute it with
/// [`ViewportTransform::fit_to_frame`] when a diagram is loaded or the viewport is resized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            scale: 1.0,
        }
    }
}

impl ViewportTransform {
    pub fn new(pan_x: f64, pan_y: f64, scale: f64) -> Self {
        Self {
            pan_x,
            pan_y,
            scale,
        }
    }

    pub fn to_canvas(&self, screen: Point) -> Point {
        point(
            (screen.x - self.pan_x) / self.scale,
            (screen.y - self.pan_y) / self.scale,
        )
    }

    pub fn to_screen(&self, canvas: Point) -> Point {
        point(
            canvas.x * self.scale + self.pan_x,
            canvas.y * self.scale + self.pan_y,
        )
    }

    /// Pans by a delta expressed in screen pixels.
    pub fn pan_by(&mut self, delta: Vector) {
        self.pan_x += delta.x;
        self.pan_y += delta.y;
    }

    /// Zooms by `factor`, keeping the canvas point under `screen` fixed.
    pub fn zoom_at(&mut self, screen: Point, factor: f64, min_scale: f64, max_scale: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.to_canvas(screen);
        let next = (self.scale * factor).clamp(min_scale, max_scale);
        if next == self.scale {
            return;
        }
        self.scale = next;
        self.pan_x = screen.x - anchor.x * next;
        self.pan_y = screen.y - anchor.y * next;
    }

    /// Centers `bounds` inside a viewport of `viewport` size, never zooming in past 1:1.
    pub fn fit_to_frame(
        bounds: Option<Bounds>,
        viewport: Size,
        padding: f64,
        min_scale: f64,
        max_scale: f64,
    ) -> Self {
        let Some(bounds) = bounds else {
            return Self::default();
        };
        let bw = bounds.width().max(1.0);
        let bh = bounds.height().max(1.0);
        let avail_w = (viewport.width - 2.0 * padding).max(1.0);
        let avail_h = (viewport.height - 2.0 * padding).max(1.0);
        let scale = (avail_w / bw)
            .min(avail_h / bh)
            .min(1.0)
            .clamp(min_scale, max_scale);
        Self {
            pan_x: (viewport.width - bw * scale) / 2.0 - bounds.min_x * scale,
            pan_y: (viewport.height - bh * scale) / 2.0 - bounds.min_y * scale,
            scale,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// SVG `transform` attribute value for this viewport.
    pub fn svg_transform(&self) -> String {
        format!(
            "translate({} {}) scale({})",
            self.pan_x, self.pan_y, self.scale
        )
    }
}
