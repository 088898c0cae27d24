mod process;
mod routing;

use crate::geom::{Point, point};
use crate::interaction::PointerEvent;
use crate::model::{GridCell, ProcessDiagram, ProcessStep};

fn step(id: &str, row: i32, column: i32) -> ProcessStep {
    ProcessStep::new(id, id.to_uppercase(), GridCell::new(row, column))
}

fn process(steps: &[(&str, i32, i32)]) -> ProcessDiagram {
    let mut d = ProcessDiagram::new();
    for &(id, row, column) in steps {
        d.add_entity(step(id, row, column)).unwrap();
    }
    d
}

/// Center of a cell's box under the default config and an identity transform.
fn cell_center(row: i32, column: i32) -> Point {
    point(150.0 + 300.0 * f64::from(column), 90.0 + 160.0 * f64::from(row))
}

fn press(p: Point) -> PointerEvent {
    PointerEvent::primary(p)
}
