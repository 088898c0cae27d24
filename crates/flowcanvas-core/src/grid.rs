//! Logical grid ↔ pixel mapping.
//!
//! The process canvas places steps on explicit cells with a fixed pitch. The breadboard derives
//! each screen's cell from its index and lets rows grow with their tallest screen.

use rustc_hash::FxHashSet;

use crate::config::LayoutConfig;
use crate::geom::{Point, Rect, point, size};
use crate::model::GridCell;

/// Top-left pixel corner of `cell`.
pub fn grid_to_pixel(cell: GridCell, config: &LayoutConfig) -> Point {
    point(
        config.padding_x + f64::from(cell.column) * config.column_pitch(),
        config.padding_y + f64::from(cell.row) * config.row_pitch(),
    )
}

/// Inverse of [`grid_to_pixel`], rounded to the nearest cell and floored at zero.
pub fn pixel_to_grid(p: Point, config: &LayoutConfig) -> GridCell {
    fn axis(v: f64, padding: f64, pitch: f64) -> i32 {
        let raw = ((v - padding) / pitch).round();
        if !raw.is_finite() || raw <= 0.0 {
            return 0;
        }
        raw.min(f64::from(i32::MAX)) as i32
    }
    GridCell::new(
        axis(p.y, config.padding_y, config.row_pitch()),
        axis(p.x, config.padding_x, config.column_pitch()),
    )
}

/// Cell whose box lies closest to a pointer position.
pub fn cell_at(p: Point, config: &LayoutConfig) -> GridCell {
    pixel_to_grid(
        point(
            p.x - config.entity_width / 2.0,
            p.y - config.entity_height / 2.0,
        ),
        config,
    )
}

pub fn entity_rect(cell: GridCell, config: &LayoutConfig) -> Rect {
    Rect::new(
        grid_to_pixel(cell, config),
        size(config.entity_width, config.entity_height),
    )
}

/// Rank of an offset's direction in the fixed scan order:
/// right, down, left, up, then down-right, down-left, up-left, up-right.
fn scan_rank(d_row: i32, d_column: i32) -> u8 {
    match (d_row.signum(), d_column.signum()) {
        (0, 1) => 0,
        (1, 0) => 1,
        (0, -1) => 2,
        (-1, 0) => 3,
        (1, 1) => 4,
        (1, -1) => 5,
        (-1, -1) => 6,
        (-1, 1) => 7,
        _ => 8,
    }
}

/// Offsets at Chebyshev distance `radius`, orthogonal neighbors first.
fn ring_offsets(radius: i32) -> Vec<(i32, i32)> {
    let mut ring = Vec::with_capacity((radius as usize) * 8);
    for d_row in -radius..=radius {
        for d_column in -radius..=radius {
            if d_row.abs().max(d_column.abs()) == radius {
                ring.push((d_row, d_column));
            }
        }
    }
    ring.sort_by_key(|&(r, c)| (r.abs() + c.abs(), scan_rank(r, c), r.abs(), c.abs()));
    ring
}

/// Returns `target` if free, otherwise the first free cell found on expanding rings around it.
///
/// Never returns an occupied or negative cell, and is deterministic for a given input.
pub fn find_nearest_free_cell(target: GridCell, occupied: &FxHashSet<GridCell>) -> GridCell {
    let target = GridCell::new(target.row.max(0), target.column.max(0));
    if !occupied.contains(&target) {
        return target;
    }

    // Some cell on the row to the right is free within `occupied.len() + 1` steps.
    let max_radius = i32::try_from(occupied.len()).unwrap_or(i32::MAX - 1) + 1;
    for radius in 1..=max_radius {
        for (d_row, d_column) in ring_offsets(radius) {
            let Some(candidate) = target.checked_offset(d_row, d_column) else {
                continue;
            };
            if candidate.is_valid() && !occupied.contains(&candidate) {
                tracing::trace!(%target, %candidate, radius, "relocated to nearest free cell");
                return candidate;
            }
        }
    }
    GridCell::new(target.row, target.column.saturating_add(max_radius))
}

/// Fixed-column placement used by the breadboard.
pub fn sequence_cell(index: usize, columns: usize) -> GridCell {
    let columns = columns.max(1);
    GridCell::new(
        i32::try_from(index / columns).unwrap_or(i32::MAX),
        i32::try_from(index % columns).unwrap_or(i32::MAX),
    )
}

/// Content height of a screen holding `elements` sub-elements.
pub fn screen_height(elements: usize, config: &LayoutConfig) -> f64 {
    config.screen_header_height
        + elements.max(1) as f64 * config.element_row_height
        + 2.0 * config.screen_padding
}

/// Pixel boxes for screens laid out in index order.
///
/// Each row is as tall as its tallest screen, so a tall screen pushes every later row down.
pub fn sequence_rects(heights: &[f64], config: &LayoutConfig) -> Vec<Rect> {
    let columns = config.breadboard_columns.max(1);
    let mut out = Vec::with_capacity(heights.len());
    let mut row_top = config.padding_y;
    for row in heights.chunks(columns) {
        let pitch = row.iter().copied().fold(0.0_f64, f64::max);
        for (column, &h) in row.iter().enumerate() {
            out.push(Rect::new(
                point(config.padding_x + column as f64 * config.column_pitch(), row_top),
                size(config.entity_width, h),
            ));
        }
        row_top += pitch + config.row_gap;
    }
    out
}

/// Connection source port of the `index`-th sub-element of a screen at `rect`.
pub fn element_port(rect: &Rect, index: usize, config: &LayoutConfig) -> Point {
    point(
        rect.max_x(),
        rect.min_y()
            + config.screen_padding
            + config.screen_header_height
            + (index as f64 + 0.5) * config.element_row_height,
    )
}

/// Connection target port of a screen (left edge, header middle).
pub fn screen_input_port(rect: &Rect, config: &LayoutConfig) -> Point {
    point(
        rect.min_x(),
        rect.min_y() + config.screen_padding + config.screen_header_height / 2.0,
    )
}

/// Incoming port of a process step (left edge midpoint).
pub fn input_port(rect: &Rect) -> Point {
    point(rect.min_x(), rect.min_y() + rect.height() / 2.0)
}

/// Outgoing port of a process step (right edge midpoint).
pub fn output_port(rect: &Rect) -> Point {
    point(rect.max_x(), rect.min_y() + rect.height() / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied(cells: &[(i32, i32)]) -> FxHashSet<GridCell> {
        cells.iter().map(|&(r, c)| GridCell::new(r, c)).collect()
    }

    #[test]
    fn grid_pixel_round_trip() {
        let cfg = LayoutConfig::default();
        for row in 0..12 {
            for column in 0..12 {
                let cell = GridCell::new(row, column);
                assert_eq!(pixel_to_grid(grid_to_pixel(cell, &cfg), &cfg), cell);
            }
        }
    }

    #[test]
    fn pixel_to_grid_floors_at_zero_and_ignores_nan() {
        let cfg = LayoutConfig::default();
        assert_eq!(pixel_to_grid(point(-500.0, -500.0), &cfg), GridCell::new(0, 0));
        assert_eq!(pixel_to_grid(point(f64::NAN, 10.0), &cfg), GridCell::new(0, 0));
    }

    #[test]
    fn cell_at_maps_box_interior_to_its_cell() {
        let cfg = LayoutConfig::default();
        let rect = entity_rect(GridCell::new(2, 3), &cfg);
        for p in [
            rect.origin,
            point(rect.max_x() - 1.0, rect.max_y() - 1.0),
            point(rect.center().x, rect.center().y),
        ] {
            assert_eq!(cell_at(p, &cfg), GridCell::new(2, 3));
        }
    }

    #[test]
    fn free_target_is_returned_as_is() {
        let occ = occupied(&[(0, 1)]);
        assert_eq!(
            find_nearest_free_cell(GridCell::new(0, 0), &occ),
            GridCell::new(0, 0)
        );
    }

    #[test]
    fn orthogonal_neighbors_come_before_diagonals() {
        // Right is taken, down is free.
        let occ = occupied(&[(3, 3), (3, 4)]);
        assert_eq!(
            find_nearest_free_cell(GridCell::new(3, 3), &occ),
            GridCell::new(4, 3)
        );

        // Every orthogonal neighbor taken: first diagonal in scan order is down-right.
        let occ = occupied(&[(3, 3), (3, 4), (4, 3), (3, 2), (2, 3)]);
        assert_eq!(
            find_nearest_free_cell(GridCell::new(3, 3), &occ),
            GridCell::new(4, 4)
        );
    }

    #[test]
    fn full_neighborhood_pushes_to_second_ring() {
        let mut cells = Vec::new();
        for r in 4..=6 {
            for c in 4..=6 {
                cells.push((r, c));
            }
        }
        let occ = occupied(&cells);
        let target = GridCell::new(5, 5);
        let found = find_nearest_free_cell(target, &occ);
        assert!(!occ.contains(&found));
        assert!(found.chebyshev(&target) >= 2);
        assert_eq!(found, GridCell::new(5, 7));
    }

    #[test]
    fn never_returns_negative_cells() {
        let occ = occupied(&[(0, 0), (0, 1), (1, 0), (1, 1)]);
        let found = find_nearest_free_cell(GridCell::new(0, 0), &occ);
        assert!(found.is_valid());
        assert!(!occ.contains(&found));
        assert_eq!(found, GridCell::new(0, 2));
    }

    #[test]
    fn targets_at_the_coordinate_limit_do_not_overflow() {
        let edge = GridCell::new(0, i32::MAX);
        let occ = occupied(&[(0, i32::MAX)]);
        assert_eq!(find_nearest_free_cell(edge, &occ), GridCell::new(1, i32::MAX));

        let corner = GridCell::new(i32::MAX, i32::MAX);
        let occ = occupied(&[(i32::MAX, i32::MAX)]);
        assert_eq!(
            find_nearest_free_cell(corner, &occ),
            GridCell::new(i32::MAX, i32::MAX - 1)
        );
    }

    #[test]
    fn sequence_rows_grow_with_tallest_screen() {
        let cfg = LayoutConfig::default();
        let heights = [100.0, 250.0, 120.0, 80.0];
        let rects = sequence_rects(&heights, &cfg);
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[1].origin.x, cfg.padding_x + cfg.column_pitch());
        assert_eq!(rects[3].origin.x, cfg.padding_x);
        assert_eq!(rects[3].origin.y, cfg.padding_y + 250.0 + cfg.row_gap);
        assert_eq!(sequence_cell(4, 3), GridCell::new(1, 1));
    }
}
