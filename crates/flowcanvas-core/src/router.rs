//! Connection routing: cubic bezier synthesis and overlap separation.
//!
//! Every connection is a single cubic curve from a source port to a target port. Connections
//! that would draw on top of each other are stacked into arcs by lifting their control points;
//! backward (right-to-left) connections always take a larger fixed arc.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Write as _;

use crate::config::LayoutConfig;
use crate::geom::{Point, is_finite_point, point};

/// Segments used when flattening curves for hit testing and length estimates.
pub const FLATTEN_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub from: Point,
    pub c1: Point,
    pub c2: Point,
    pub to: Point,
}

impl CubicBezier {
    /// Bernstein-form evaluation at `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        point(
            a * self.from.x + b * self.c1.x + c * self.c2.x + d * self.to.x,
            a * self.from.y + b * self.c1.y + c * self.c2.y + d * self.to.y,
        )
    }

    /// Point on the curve at `t = 0.5`, where connection labels are anchored.
    pub fn midpoint(&self) -> Point {
        self.point_at(0.5)
    }

    pub fn flatten(&self, segments: usize) -> Vec<Point> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f64 / segments as f64))
            .collect()
    }

    pub fn length(&self) -> f64 {
        self.flatten(FLATTEN_SEGMENTS)
            .windows(2)
            .map(|w| (w[1] - w[0]).length())
            .sum()
    }

    /// Shortest distance from `p` to the flattened curve.
    pub fn distance_to(&self, p: Point) -> f64 {
        self.flatten(FLATTEN_SEGMENTS)
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn svg_path_d(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            &mut out,
            "M{},{} C{},{} {},{} {},{}",
            fmt(self.from.x),
            fmt(self.from.y),
            fmt(self.c1.x),
            fmt(self.c1.y),
            fmt(self.c2.x),
            fmt(self.c2.y),
            fmt(self.to.x),
            fmt(self.to.y)
        );
        out
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.square_length();
    if len2 <= f64::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

/// Path attribute number formatting: three decimals, trailing zeros trimmed, no `-0`.
pub fn fmt(v: f64) -> String {
    if !v.is_finite() || v.abs() < 0.0005 {
        return "0".to_string();
    }
    let mut s = format!("{v:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" { "0".to_string() } else { s }
}

/// Curve between two ports, lifted by `arc_offset` pixels.
pub fn bezier_path(from: Point, to: Point, arc_offset: f64, config: &LayoutConfig) -> CubicBezier {
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let offset =
        (dx * config.control_factor).max(config.min_control_offset) + dy * config.vertical_correction;
    CubicBezier {
        from,
        c1: point(from.x + offset, from.y - arc_offset),
        c2: point(to.x - offset, to.y - arc_offset),
        to,
    }
}

/// A connection with resolved port positions, ready for routing.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCandidate {
    pub id: String,
    pub from: Point,
    pub to: Point,
    pub source_column: i32,
    pub target_column: i32,
}

impl RouteCandidate {
    pub fn is_backward(&self) -> bool {
        self.target_column < self.source_column
    }

    fn chord_midpoint(&self) -> Point {
        self.from.lerp(self.to, 0.5)
    }

    fn direction(&self) -> f64 {
        (self.to.y - self.from.y).atan2(self.to.x - self.from.x)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedConnection {
    pub id: String,
    pub path: CubicBezier,
    pub label_anchor: Point,
    pub arc_offset: f64,
    pub backward: bool,
}

fn angle_between(a: f64, b: f64) -> f64 {
    let mut d = (a - b).abs() % (2.0 * PI);
    if d > PI {
        d = 2.0 * PI - d;
    }
    d
}

fn overlaps(a: &RouteCandidate, b: &RouteCandidate, config: &LayoutConfig) -> bool {
    let distance = (a.chord_midpoint() - b.chord_midpoint()).length();
    if distance < config.coincident_distance {
        return true;
    }
    distance < config.overlap_distance
        && angle_between(a.direction(), b.direction()) < config.overlap_angle
}

/// Arc offset for each candidate, in input order.
///
/// Backward connections get `backward_arc` and never join a group. Forward connections are
/// grouped in one pass: the first unassigned connection anchors a group, every later unassigned
/// connection overlapping the anchor joins it, and the n-th member gets `n * arc_spacing`.
pub fn assign_arc_offsets(candidates: &[RouteCandidate], config: &LayoutConfig) -> Vec<f64> {
    let mut offsets = vec![0.0; candidates.len()];
    let mut processed = vec![false; candidates.len()];

    for (i, c) in candidates.iter().enumerate() {
        if c.is_backward() {
            offsets[i] = config.backward_arc;
            processed[i] = true;
        }
    }

    for i in 0..candidates.len() {
        if processed[i] {
            continue;
        }
        processed[i] = true;
        let mut rank = 1usize;
        for j in (i + 1)..candidates.len() {
            if processed[j] || !overlaps(&candidates[i], &candidates[j], config) {
                continue;
            }
            processed[j] = true;
            offsets[j] = rank as f64 * config.arc_spacing;
            tracing::trace!(
                anchor = %candidates[i].id,
                member = %candidates[j].id,
                offset = offsets[j],
                "overlapping connection stacked"
            );
            rank += 1;
        }
    }
    offsets
}

/// Routes every candidate with finite geometry.
///
/// The result is aligned with `candidates`: a skipped candidate leaves `None` in its slot, so
/// callers can pair routes with their own records by position even when ids repeat.
pub fn route_connections(
    candidates: &[RouteCandidate],
    config: &LayoutConfig,
) -> Vec<Option<RoutedConnection>> {
    let (valid_idx, valid): (Vec<usize>, Vec<RouteCandidate>) = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            let finite = is_finite_point(c.from) && is_finite_point(c.to);
            if !finite {
                tracing::warn!(connection = %c.id, "skipping connection with non-finite geometry");
            }
            finite
        })
        .map(|(i, c)| (i, c.clone()))
        .unzip();

    let offsets = assign_arc_offsets(&valid, config);
    let mut routed = vec![None; candidates.len()];
    for ((i, c), arc_offset) in valid_idx.into_iter().zip(&valid).zip(offsets) {
        let path = bezier_path(c.from, c.to, arc_offset, config);
        routed[i] = Some(RoutedConnection {
            id: c.id.clone(),
            label_anchor: path.midpoint(),
            path,
            arc_offset,
            backward: c.is_backward(),
        });
    }
    routed
}
