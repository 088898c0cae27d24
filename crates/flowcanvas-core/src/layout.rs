//! Whole-diagram layout pass.
//!
//! Positions, ports and connection paths are re-derived from the current diagram on every call.
//! Nothing is cached between calls, so a layout can never disagree with the committed state.

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::geom::{Bounds, Point, Rect, point};
use crate::grid;
use crate::model::{Breadboard, Endpoint, GridCell, ProcessDiagram};
use crate::router::{self, RouteCandidate, RoutedConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSide {
    Input,
    Output,
}

/// A connection attachment point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Port {
    Entity { entity: String, side: PortSide },
    Element { entity: String, element: String },
}

impl Port {
    pub fn owner(&self) -> &str {
        match self {
            Port::Entity { entity, .. } | Port::Element { entity, .. } => entity,
        }
    }

    /// The connection source a drag from this port starts.
    pub fn as_source(&self) -> Endpoint {
        match self {
            Port::Entity { entity, .. } => Endpoint::entity(entity.clone()),
            Port::Element { entity, element } => {
                Endpoint::sub_element(entity.clone(), element.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBox {
    pub id: String,
    pub index: usize,
    pub cell: GridCell,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortPoint {
    pub port: Port,
    pub at: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionLayout {
    pub route: RoutedConnection,
    pub source: Endpoint,
    pub target: String,
    pub label: Option<String>,
}

impl ConnectionLayout {
    pub fn id(&self) -> &str {
        &self.route.id
    }
}

/// What lies under a canvas point, in hit priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Port(Port),
    ConnectionLabel(String),
    Entity(String),
    Connection(String),
    Canvas,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramLayout {
    pub entities: Vec<EntityBox>,
    pub ports: Vec<PortPoint>,
    pub connections: Vec<ConnectionLayout>,
    /// Connections that could not be routed (unresolved endpoints or corrupt geometry).
    pub orphans: Vec<String>,
    /// Union of all entity boxes.
    pub bounds: Option<Bounds>,
}

/// Approximate half-size of a label box; renderers may draw tighter boxes.
pub fn label_half_extent(label: &str) -> (f64, f64) {
    let chars = label.chars().count() as f64;
    ((chars * 7.0 + 16.0) / 2.0, 12.0)
}

impl DiagramLayout {
    pub fn entity(&self, id: &str) -> Option<&EntityBox> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&ConnectionLayout> {
        self.connections.iter().find(|c| c.id() == id)
    }

    pub fn port_point(&self, port: &Port) -> Option<Point> {
        self.ports.iter().find(|p| &p.port == port).map(|p| p.at)
    }

    /// Finds the topmost element at canvas point `p`. `tolerance` is in canvas units.
    pub fn hit_test(&self, p: Point, port_radius: f64, tolerance: f64) -> Hit {
        let port_reach = port_radius + tolerance;
        let nearest_port = self
            .ports
            .iter()
            .map(|pp| (pp, (pp.at - p).length()))
            .filter(|(_, d)| *d <= port_reach)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((pp, _)) = nearest_port {
            return Hit::Port(pp.port.clone());
        }

        for c in self.connections.iter().rev() {
            let Some(label) = c.label.as_deref() else {
                continue;
            };
            let (hw, hh) = label_half_extent(label);
            let a = c.route.label_anchor;
            if (p.x - a.x).abs() <= hw && (p.y - a.y).abs() <= hh {
                return Hit::ConnectionLabel(c.id().to_string());
            }
        }

        if let Some(e) = self.entities.iter().rev().find(|e| e.rect.contains(p)) {
            return Hit::Entity(e.id.clone());
        }

        let nearest_path = self
            .connections
            .iter()
            .map(|c| (c, c.route.path.distance_to(p)))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((c, _)) = nearest_path {
            return Hit::Connection(c.id().to_string());
        }

        Hit::Canvas
    }
}

struct Pending<'a> {
    id: &'a str,
    source: &'a Endpoint,
    target: &'a str,
    label: Option<&'a str>,
}

fn finish(
    entities: Vec<EntityBox>,
    ports: Vec<PortPoint>,
    candidates: Vec<(RouteCandidate, Pending<'_>)>,
    mut orphans: Vec<String>,
    config: &LayoutConfig,
) -> DiagramLayout {
    let route_input: Vec<RouteCandidate> = candidates.iter().map(|(c, _)| c.clone()).collect();
    let routed = router::route_connections(&route_input, config);

    let mut connections = Vec::with_capacity(candidates.len());
    for ((_, pending), route) in candidates.iter().zip(routed) {
        let Some(route) = route else {
            orphans.push(pending.id.to_string());
            continue;
        };
        connections.push(ConnectionLayout {
            route,
            source: pending.source.clone(),
            target: pending.target.to_string(),
            label: pending.label.map(str::to_string),
        });
    }

    let bounds = Bounds::from_rects(entities.iter().map(|e| &e.rect));
    DiagramLayout {
        entities,
        ports,
        connections,
        orphans,
        bounds,
    }
}

/// Lays out a process diagram: one box per valid cell, whole-entity ports on both sides.
pub fn layout_process(diagram: &ProcessDiagram, config: &LayoutConfig) -> DiagramLayout {
    let mut entities = Vec::with_capacity(diagram.entities.len());
    let mut ports = Vec::with_capacity(diagram.entities.len() * 2);
    for (index, step) in diagram.entities.iter().enumerate() {
        if !step.cell.is_valid() {
            tracing::warn!(entity = %step.id, cell = %step.cell, "skipping step with invalid cell");
            continue;
        }
        let rect = grid::entity_rect(step.cell, config);
        ports.push(PortPoint {
            port: Port::Entity {
                entity: step.id.clone(),
                side: PortSide::Input,
            },
            at: grid::input_port(&rect),
        });
        ports.push(PortPoint {
            port: Port::Entity {
                entity: step.id.clone(),
                side: PortSide::Output,
            },
            at: grid::output_port(&rect),
        });
        entities.push(EntityBox {
            id: step.id.clone(),
            index,
            cell: step.cell,
            rect,
        });
    }

    let mut orphans = Vec::new();
    let mut candidates = Vec::with_capacity(diagram.connections.len());
    for c in &diagram.connections {
        let source = match &c.source {
            Endpoint::Entity { id } => entities.iter().find(|e| &e.id == id),
            Endpoint::SubElement { .. } => None,
        };
        let target = entities.iter().find(|e| e.id == c.target);
        let (Some(source), Some(target)) = (source, target) else {
            tracing::warn!(connection = %c.id, "connection endpoint does not resolve");
            orphans.push(c.id.clone());
            continue;
        };
        candidates.push((
            RouteCandidate {
                id: c.id.clone(),
                from: grid::output_port(&source.rect),
                to: grid::input_port(&target.rect),
                source_column: source.cell.column,
                target_column: target.cell.column,
            },
            Pending {
                id: &c.id,
                source: &c.source,
                target: &c.target,
                label: c.label.as_deref(),
            },
        ));
    }

    finish(entities, ports, candidates, orphans, config)
}

/// Lays out a breadboard: screens flow through a fixed number of columns in list order, each
/// sub-element exposes a source port on the screen's right edge.
pub fn layout_breadboard(diagram: &Breadboard, config: &LayoutConfig) -> DiagramLayout {
    let heights: Vec<f64> = diagram
        .entities
        .iter()
        .map(|s| grid::screen_height(s.elements.len(), config))
        .collect();
    let rects = grid::sequence_rects(&heights, config);

    let mut entities = Vec::with_capacity(diagram.entities.len());
    let mut ports = Vec::new();
    for (index, (screen, rect)) in diagram.entities.iter().zip(rects).enumerate() {
        let header_y = grid::screen_input_port(&rect, config).y;
        ports.push(PortPoint {
            port: Port::Entity {
                entity: screen.id.clone(),
                side: PortSide::Input,
            },
            at: grid::screen_input_port(&rect, config),
        });
        ports.push(PortPoint {
            port: Port::Entity {
                entity: screen.id.clone(),
                side: PortSide::Output,
            },
            at: point(rect.max_x(), header_y),
        });
        for (i, element) in screen.elements.iter().enumerate() {
            ports.push(PortPoint {
                port: Port::Element {
                    entity: screen.id.clone(),
                    element: element.id.clone(),
                },
                at: grid::element_port(&rect, i, config),
            });
        }
        entities.push(EntityBox {
            id: screen.id.clone(),
            index,
            cell: grid::sequence_cell(index, config.breadboard_columns),
            rect,
        });
    }

    let mut orphans = Vec::new();
    let mut candidates = Vec::with_capacity(diagram.connections.len());
    for c in &diagram.connections {
        let source_port = match &c.source {
            Endpoint::Entity { id } => Port::Entity {
                entity: id.clone(),
                side: PortSide::Output,
            },
            Endpoint::SubElement { entity, element } => Port::Element {
                entity: entity.clone(),
                element: element.clone(),
            },
        };
        let from = ports.iter().find(|p| p.port == source_port).map(|p| p.at);
        let source_box = entities.iter().find(|e| e.id == c.source.owner());
        let target_box = entities.iter().find(|e| e.id == c.target);
        let (Some(from), Some(source_box), Some(target_box)) = (from, source_box, target_box)
        else {
            tracing::warn!(connection = %c.id, "connection endpoint does not resolve");
            orphans.push(c.id.clone());
            continue;
        };
        candidates.push((
            RouteCandidate {
                id: c.id.clone(),
                from,
                to: grid::screen_input_port(&target_box.rect, config),
                source_column: source_box.cell.column,
                target_column: target_box.cell.column,
            },
            Pending {
                id: &c.id,
                source: &c.source,
                target: &c.target,
                label: c.label.as_deref(),
            },
        ));
    }

    finish(entities, ports, candidates, orphans, config)
}
