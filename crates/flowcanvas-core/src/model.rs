//! In-memory entity graph shared by both diagram variants.
//!
//! The host owns a [`Diagram`] and hands it to the editors by reference. Every mutation returns
//! the [`DiagramChange`]s it produced so the host can persist or forward them.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::grid;

pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// Integer `(row, column)` cell on the logical grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i32,
    pub column: i32,
}

impl GridCell {
    pub const fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }

    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.column >= 0
    }

    /// `None` when either coordinate would leave the `i32` range.
    pub fn checked_offset(&self, d_row: i32, d_column: i32) -> Option<Self> {
        Some(Self::new(
            self.row.checked_add(d_row)?,
            self.column.checked_add(d_column)?,
        ))
    }

    pub fn chebyshev(&self, other: &GridCell) -> u32 {
        self.row
            .abs_diff(other.row)
            .max(self.column.abs_diff(other.column))
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

pub trait DiagramEntity: Clone + fmt::Debug {
    fn id(&self) -> &str;
    fn title(&self) -> &str;

    /// Whether `element` names one of this entity's sub-elements.
    fn has_element(&self, _element: &str) -> bool {
        false
    }

    /// Moves the entity off a position already held by one of `others`. Returns whether it
    /// moved. Entities positioned by list order never collide.
    fn resolve_collision(&mut self, _others: &[Self]) -> bool {
        false
    }
}

/// A process step placed on an explicit grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStep {
    pub id: String,
    pub title: String,
    pub cell: GridCell,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl ProcessStep {
    pub fn new(id: impl Into<String>, title: impl Into<String>, cell: GridCell) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            cell,
            role: None,
            tools: Vec::new(),
            tags: Vec::new(),
            duration: None,
            attachments: Vec::new(),
        }
    }

    /// One-line attribute summaries shown under the title.
    pub fn attribute_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(role) = self.role.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push(format!("Role: {role}"));
        }
        if !self.tools.is_empty() {
            out.push(format!("Tools: {}", self.tools.join(", ")));
        }
        if let Some(duration) = self.duration.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push(format!("Duration: {duration}"));
        }
        if !self.tags.is_empty() {
            out.push(
                self.tags
                    .iter()
                    .map(|t| format!("#{t}"))
                    .collect::<Vec<_>>()
                    .join(" "),
            );
        }
        if !self.attachments.is_empty() {
            out.push(format!("{} attachment(s)", self.attachments.len()));
        }
        out
    }
}

impl DiagramEntity for ProcessStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn resolve_collision(&mut self, others: &[Self]) -> bool {
        if !self.cell.is_valid() {
            return false;
        }
        let occupied: FxHashSet<GridCell> = others
            .iter()
            .filter(|s| s.id != self.id)
            .map(|s| s.cell)
            .collect();
        if !occupied.contains(&self.cell) {
            return false;
        }
        let cell = grid::find_nearest_free_cell(self.cell, &occupied);
        tracing::debug!(entity = %self.id, from = %self.cell, to = %cell, "step moved off an occupied cell");
        self.cell = cell;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Button,
    Input,
    Text,
    Image,
    List,
    Link,
    Other,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Button => "button",
            ElementKind::Input => "input",
            ElementKind::Text => "text",
            ElementKind::Image => "image",
            ElementKind::List => "list",
            ElementKind::Link => "link",
            ElementKind::Other => "other",
        }
    }
}

/// Typed UI placeholder on a prototype screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubElement {
    pub id: String,
    pub kind: ElementKind,
    pub label: String,
}

impl SubElement {
    pub fn new(id: impl Into<String>, kind: ElementKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }
}

/// Prototype screen. Its grid position is implied by its index in [`Diagram::entities`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub elements: Vec<SubElement>,
}

impl Screen {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: SubElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn element(&self, id: &str) -> Option<&SubElement> {
        self.elements.iter().find(|e| e.id == id)
    }
}

impl DiagramEntity for Screen {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn has_element(&self, element: &str) -> bool {
        self.elements.iter().any(|e| e.id == element)
    }
}

/// Where a connection starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Endpoint {
    Entity { id: String },
    SubElement { entity: String, element: String },
}

impl Endpoint {
    pub fn entity(id: impl Into<String>) -> Self {
        Endpoint::Entity { id: id.into() }
    }

    pub fn sub_element(entity: impl Into<String>, element: impl Into<String>) -> Self {
        Endpoint::SubElement {
            entity: entity.into(),
            element: element.into(),
        }
    }

    /// The entity that owns this endpoint.
    pub fn owner(&self) -> &str {
        match self {
            Endpoint::Entity { id } => id,
            Endpoint::SubElement { entity, .. } => entity,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Entity { id } => f.write_str(id),
            Endpoint::SubElement { entity, element } => write!(f, "{entity}/{element}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub source: Endpoint,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl Connection {
    pub fn new(source: Endpoint, target: impl Into<String>) -> Self {
        Self {
            id: new_id("conn"),
            source,
            target: target.into(),
            label: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn touches(&self, entity: &str) -> bool {
        self.source.owner() == entity || self.target == entity
    }
}

/// Change notifications handed back to the host after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramChange<E> {
    EntityAdded(E),
    EntityUpdated(E),
    EntityRemoved(E),
    ConnectionAdded(Connection),
    ConnectionRemoved(Connection),
    ConnectionUpdated(Connection),
}

/// Ordered entities plus the connections between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram<E> {
    pub entities: Vec<E>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

pub type ProcessDiagram = Diagram<ProcessStep>;
pub type Breadboard = Diagram<Screen>;

impl<E> Default for Diagram<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl<E: DiagramEntity> Diagram<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: &str) -> Option<&E> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut E> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.entities.iter().position(|e| e.id() == id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Appends an entity. A process step landing on an occupied cell is moved to the nearest
    /// free one; the returned change carries the final position.
    pub fn add_entity(&mut self, mut entity: E) -> Result<DiagramChange<E>> {
        if self.entity(entity.id()).is_some() {
            return Err(Error::DuplicateEntity {
                id: entity.id().to_string(),
            });
        }
        entity.resolve_collision(&self.entities);
        self.entities.push(entity.clone());
        tracing::debug!(entity = entity.id(), "entity added");
        Ok(DiagramChange::EntityAdded(entity))
    }

    /// Replaces the entity with the same id, moving it off an occupied cell like
    /// [`Diagram::add_entity`].
    pub fn update_entity(&mut self, mut entity: E) -> Result<DiagramChange<E>> {
        let Some(index) = self.position_of(entity.id()) else {
            return Err(Error::UnknownEntity {
                id: entity.id().to_string(),
            });
        };
        entity.resolve_collision(&self.entities);
        self.entities[index] = entity.clone();
        Ok(DiagramChange::EntityUpdated(entity))
    }

    /// Separates entities that share a position. Earlier entities keep theirs; each later one
    /// moves to the nearest free position.
    pub fn resolve_collisions(&mut self) -> Vec<DiagramChange<E>> {
        let mut changes = Vec::new();
        for i in 1..self.entities.len() {
            let (placed, rest) = self.entities.split_at_mut(i);
            if rest[0].resolve_collision(placed) {
                changes.push(DiagramChange::EntityUpdated(rest[0].clone()));
            }
        }
        if !changes.is_empty() {
            tracing::warn!(moved = changes.len(), "repaired overlapping entities");
        }
        changes
    }

    /// Removes an entity together with every connection that starts or ends on it.
    pub fn remove_entity(&mut self, id: &str) -> Result<Vec<DiagramChange<E>>> {
        let Some(index) = self.position_of(id) else {
            return Err(Error::UnknownEntity { id: id.to_string() });
        };
        let mut changes = self.drain_connections(|c| c.touches(id));
        let removed = self.entities.remove(index);
        tracing::debug!(entity = id, cascaded = changes.len(), "entity removed");
        changes.push(DiagramChange::EntityRemoved(removed));
        Ok(changes)
    }

    pub fn endpoint_resolves(&self, endpoint: &Endpoint) -> bool {
        match endpoint {
            Endpoint::Entity { id } => self.entity(id).is_some(),
            Endpoint::SubElement { entity, element } => self
                .entity(entity)
                .is_some_and(|e| e.has_element(element)),
        }
    }

    pub fn resolves(&self, connection: &Connection) -> bool {
        self.endpoint_resolves(&connection.source) && self.entity(&connection.target).is_some()
    }

    pub fn has_connection(&self, source: &Endpoint, target: &str) -> bool {
        self.connections
            .iter()
            .any(|c| &c.source == source && c.target == target)
    }

    /// Adds a connection unless one already links the same source and target.
    ///
    /// Returns `Ok(None)` when the pair already exists.
    pub fn add_connection(&mut self, connection: Connection) -> Result<Option<DiagramChange<E>>> {
        let invalid = |reason: &'static str| Error::InvalidConnection {
            source_id: connection.source.to_string(),
            target: connection.target.clone(),
            reason,
        };
        if !self.endpoint_resolves(&connection.source) {
            return Err(invalid("source does not exist"));
        }
        if self.entity(&connection.target).is_none() {
            return Err(invalid("target does not exist"));
        }
        if matches!(connection.source, Endpoint::Entity { .. })
            && connection.source.owner() == connection.target
        {
            return Err(invalid("an entity cannot connect to itself"));
        }
        if self.has_connection(&connection.source, &connection.target) {
            tracing::debug!(
                source = %connection.source,
                target = %connection.target,
                "duplicate connection suppressed"
            );
            return Ok(None);
        }
        self.connections.push(connection.clone());
        tracing::debug!(connection = %connection.id, "connection added");
        Ok(Some(DiagramChange::ConnectionAdded(connection)))
    }

    pub fn remove_connection(&mut self, id: &str) -> Result<DiagramChange<E>> {
        let Some(index) = self.connections.iter().position(|c| c.id == id) else {
            return Err(Error::UnknownConnection { id: id.to_string() });
        };
        let removed = self.connections.remove(index);
        tracing::debug!(connection = id, "connection removed");
        Ok(DiagramChange::ConnectionRemoved(removed))
    }

    /// Sets or clears a connection label. Blank text clears it; an unchanged label yields `None`.
    pub fn set_connection_label(
        &mut self,
        id: &str,
        label: Option<&str>,
    ) -> Result<Option<DiagramChange<E>>> {
        let Some(connection) = self.connections.iter_mut().find(|c| c.id == id) else {
            return Err(Error::UnknownConnection { id: id.to_string() });
        };
        let next = label
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if connection.label == next {
            return Ok(None);
        }
        connection.label = next;
        Ok(Some(DiagramChange::ConnectionUpdated(connection.clone())))
    }

    /// Drops every connection whose endpoints no longer resolve.
    pub fn prune_orphans(&mut self) -> Vec<DiagramChange<E>> {
        let dangling: FxHashSet<String> = self
            .connections
            .iter()
            .filter(|c| !self.resolves(c))
            .map(|c| c.id.clone())
            .collect();
        if dangling.is_empty() {
            return Vec::new();
        }
        for id in &dangling {
            tracing::warn!(connection = %id, "pruning connection with unresolved endpoint");
        }
        self.drain_connections(|c| dangling.contains(&c.id))
    }

    /// Removes the listed connections, ignoring ids that are already gone.
    pub fn remove_connections<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<DiagramChange<E>> {
        let ids: FxHashSet<&str> = ids.into_iter().collect();
        self.drain_connections(|c| ids.contains(c.id.as_str()))
    }

    fn drain_connections(&mut self, mut pred: impl FnMut(&Connection) -> bool) -> Vec<DiagramChange<E>> {
        let mut removed = Vec::new();
        self.connections.retain(|c| {
            if pred(c) {
                removed.push(DiagramChange::ConnectionRemoved(c.clone()));
                false
            } else {
                true
            }
        });
        removed
    }
}

impl<E: DiagramEntity + Serialize> Diagram<E> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<E: DiagramEntity + for<'de> Deserialize<'de>> Diagram<E> {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Diagram<ProcessStep> {
    pub fn entity_at(&self, cell: GridCell) -> Option<&ProcessStep> {
        self.entities.iter().find(|s| s.cell == cell)
    }

    /// Cells taken by steps other than `except`.
    pub fn occupied_cells(&self, except: Option<&str>) -> FxHashSet<GridCell> {
        self.entities
            .iter()
            .filter(|s| Some(s.id.as_str()) != except)
            .map(|s| s.cell)
            .collect()
    }
}

impl Diagram<Screen> {
    pub fn add_element(&mut self, screen: &str, element: SubElement) -> Result<DiagramChange<Screen>> {
        let Some(s) = self.entity_mut(screen) else {
            return Err(Error::UnknownEntity {
                id: screen.to_string(),
            });
        };
        if s.has_element(&element.id) {
            return Err(Error::DuplicateEntity { id: element.id });
        }
        s.elements.push(element);
        Ok(DiagramChange::EntityUpdated(s.clone()))
    }

    pub fn update_element(
        &mut self,
        screen: &str,
        element: SubElement,
    ) -> Result<DiagramChange<Screen>> {
        let Some(s) = self.entity_mut(screen) else {
            return Err(Error::UnknownEntity {
                id: screen.to_string(),
            });
        };
        let Some(slot) = s.elements.iter_mut().find(|e| e.id == element.id) else {
            return Err(Error::UnknownElement {
                entity: screen.to_string(),
                element: element.id,
            });
        };
        *slot = element;
        Ok(DiagramChange::EntityUpdated(s.clone()))
    }

    /// Removes a sub-element and every connection sourced from it.
    pub fn remove_element(
        &mut self,
        screen: &str,
        element: &str,
    ) -> Result<Vec<DiagramChange<Screen>>> {
        let Some(s) = self.entity_mut(screen) else {
            return Err(Error::UnknownEntity {
                id: screen.to_string(),
            });
        };
        let Some(index) = s.elements.iter().position(|e| e.id == element) else {
            return Err(Error::UnknownElement {
                entity: screen.to_string(),
                element: element.to_string(),
            });
        };
        s.elements.remove(index);
        let updated = s.clone();

        let mut changes = self.drain_connections(|c| match &c.source {
            Endpoint::SubElement { entity, element: e } => entity == screen && e == element,
            Endpoint::Entity { .. } => false,
        });
        changes.push(DiagramChange::EntityUpdated(updated));
        Ok(changes)
    }
}
