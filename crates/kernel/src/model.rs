//! The world model: bodies, connections, DoF registry and state as one value.
//!
//! A `WorldModel` is a plain value. While it is owned (a draft being built,
//! or the working copy inside a transaction) it can be mutated freely; once
//! published by a [`World`](crate::World) it is only reachable behind an
//! `Arc` and never changes again.

use crate::body::Body;
use crate::config::BoundsPolicy;
use crate::connection::Connection;
use crate::dof::{DegreeOfFreedom, DofLimits};
use crate::error::{EntityKind, WorldError, WorldResult};
use crate::event::WorldEvent;
use crate::expression::TransformExpression;
use crate::state::{DofState, WorldState};
use crate::view::{View, ViewKind};
use glam::DMat4;
use kinetree_common::{Pose, PrefixedName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", self.0.to_string())
    }
}

/// Bodies, connections, degrees of freedom, their state and the views
/// annotating them.
///
/// Uses BTreeMap throughout so iteration order (and therefore query domains
/// and serialized output) is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldModel {
    id: WorldId,
    bodies: BTreeMap<PrefixedName, Body>,
    connections: BTreeMap<PrefixedName, Connection>,
    dofs: BTreeMap<PrefixedName, DegreeOfFreedom>,
    state: WorldState,
    #[serde(default)]
    views: BTreeMap<PrefixedName, View>,
    /// Mutations since the last drain.
    #[serde(skip)]
    events: Vec<WorldEvent>,
}

impl WorldModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    // --- Read access ---

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    pub fn body(&self, name: &PrefixedName) -> WorldResult<&Body> {
        self.bodies
            .get(name)
            .ok_or_else(|| WorldError::UnknownBody(name.clone()))
    }

    pub fn contains_body(&self, name: &PrefixedName) -> bool {
        self.bodies.contains_key(name)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection(&self, name: &PrefixedName) -> WorldResult<&Connection> {
        self.connections
            .get(name)
            .ok_or_else(|| WorldError::UnknownConnection(name.clone()))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn degrees_of_freedom(&self) -> impl Iterator<Item = &DegreeOfFreedom> {
        self.dofs.values()
    }

    pub fn degree_of_freedom(&self, name: &PrefixedName) -> WorldResult<&DegreeOfFreedom> {
        self.dofs
            .get(name)
            .ok_or_else(|| WorldError::UnknownDegreeOfFreedom(name.clone()))
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    pub fn view(&self, name: &PrefixedName) -> WorldResult<&View> {
        self.views
            .get(name)
            .ok_or_else(|| WorldError::ViewNotFound(name.clone()))
    }

    /// Views of one kind, in name order.
    pub fn views_by_kind<'a>(&'a self, kind: &'a ViewKind) -> impl Iterator<Item = &'a View> + 'a {
        self.views.values().filter(move |v| &v.kind == kind)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Pending mutation records.
    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    /// Drain and return the pending mutation records.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// The unique body without a parent connection.
    pub fn root(&self) -> WorldResult<&Body> {
        let roots: Vec<&Body> = self.bodies.values().filter(|b| b.is_root_candidate()).collect();
        match roots.as_slice() {
            [root] => Ok(*root),
            [] => match self.bodies.keys().next() {
                Some(any) => Err(WorldError::Unreachable(any.clone())),
                None => Err(WorldError::EmptyWorld),
            },
            many => Err(WorldError::MultipleRoots(
                many.iter().map(|b| b.name.clone()).collect(),
            )),
        }
    }

    pub fn parent_connection(&self, body: &PrefixedName) -> WorldResult<Option<&Connection>> {
        match self.body(body)?.parent_connection() {
            Some(name) => self.connection(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn parent_body(&self, body: &PrefixedName) -> WorldResult<Option<&Body>> {
        match self.parent_connection(body)? {
            Some(connection) => self.body(&connection.parent).map(Some),
            None => Ok(None),
        }
    }

    /// Connections whose parent is `body`.
    pub fn child_connections(&self, body: &PrefixedName) -> WorldResult<Vec<&Connection>> {
        self.body(body)?;
        Ok(self
            .connections
            .values()
            .filter(|c| &c.parent == body)
            .collect())
    }

    pub fn children(&self, body: &PrefixedName) -> WorldResult<Vec<&Body>> {
        self.child_connections(body)?
            .into_iter()
            .map(|c| self.body(&c.child))
            .collect()
    }

    /// Bodies on the path from `root` down to `tip`, both included.
    pub fn chain(&self, root: &PrefixedName, tip: &PrefixedName) -> WorldResult<Vec<PrefixedName>> {
        self.body(root)?;
        let mut current = self.body(tip)?;
        let mut path = vec![current.name.clone()];
        while &current.name != root {
            if path.len() > self.bodies.len() {
                return Err(WorldError::Unreachable(tip.clone()));
            }
            let Some(connection) = current.parent_connection() else {
                return Err(WorldError::Unreachable(tip.clone()));
            };
            let parent = &self
                .connections
                .get(connection)
                .ok_or_else(|| WorldError::Unreachable(tip.clone()))?
                .parent;
            current = self
                .bodies
                .get(parent)
                .ok_or_else(|| WorldError::Unreachable(tip.clone()))?;
            path.push(current.name.clone());
        }
        path.reverse();
        Ok(path)
    }

    /// Pose of `body` relative to the root, composed along parent connections.
    pub fn global_transform(&self, body: &PrefixedName) -> WorldResult<DMat4> {
        let mut current = self.body(body)?;
        let root = self
            .root()
            .map_err(|_| WorldError::Unreachable(body.clone()))?;
        let mut locals = Vec::new();
        while let Some(connection) = current.parent_connection() {
            if locals.len() > self.connections.len() {
                return Err(WorldError::Unreachable(body.clone()));
            }
            let connection = self
                .connections
                .get(connection)
                .ok_or_else(|| WorldError::Unreachable(body.clone()))?;
            locals.push(connection.compute_local_transform(&self.state)?);
            current = self
                .bodies
                .get(&connection.parent)
                .ok_or_else(|| WorldError::Unreachable(body.clone()))?;
        }
        if current.name != root.name {
            return Err(WorldError::Unreachable(body.clone()));
        }
        Ok(locals
            .iter()
            .rev()
            .fold(DMat4::IDENTITY, |acc, local| acc * *local))
    }

    /// Pose of `target` expressed in the frame of `reference`.
    pub fn relative_transform(
        &self,
        reference: &PrefixedName,
        target: &PrefixedName,
    ) -> WorldResult<DMat4> {
        Ok(self.global_transform(reference)?.inverse() * self.global_transform(target)?)
    }

    /// Check every cross-reference and the single-tree shape.
    pub fn validate(&self) -> WorldResult<()> {
        for connection in self.connections.values() {
            self.body(&connection.parent)?;
            let child = self.body(&connection.child)?;
            if child.parent_connection() != Some(&connection.name) {
                return Err(WorldError::Unreachable(child.name.clone()));
            }
            for dof in connection.referenced_dofs() {
                self.degree_of_freedom(&dof)?;
            }
        }
        for body in self.bodies.values() {
            if let Some(name) = body.parent_connection() {
                let connection = self.connection(name)?;
                if connection.child != body.name {
                    return Err(WorldError::UnknownConnection(name.clone()));
                }
            }
        }
        for name in self.dofs.keys() {
            if !self.state.contains(name) {
                return Err(WorldError::UnknownDegreeOfFreedom(name.clone()));
            }
        }
        if let Some(orphan) = self.state.keys().find(|k| !self.dofs.contains_key(*k)) {
            return Err(WorldError::UnknownDegreeOfFreedom(orphan.clone()));
        }
        for view in self.views.values() {
            for body in &view.bodies {
                self.body(body)?;
            }
            for part in &view.parts {
                self.view(part)?;
            }
        }
        if self.bodies.is_empty() {
            return Ok(());
        }
        let root = self.root()?.name.clone();
        for name in self.bodies.keys() {
            self.chain(&root, name)?;
        }
        Ok(())
    }

    // --- Mutation ---

    /// Insert a parentless body.
    pub fn add_body(&mut self, mut body: Body) -> WorldResult<()> {
        if self.bodies.contains_key(&body.name) {
            return Err(WorldError::DuplicateIdentity {
                kind: EntityKind::Body,
                name: body.name,
            });
        }
        body.set_parent_connection(None);
        tracing::debug!(body = %body.name, "body added");
        self.events.push(WorldEvent::BodyAdded { body: body.clone() });
        self.bodies.insert(body.name.clone(), body);
        Ok(())
    }

    /// Link two existing bodies and register the connection's DoFs.
    ///
    /// DoFs whose names are already registered are shared, keeping their
    /// current definition and state.
    pub fn add_connection(&mut self, connection: Connection) -> WorldResult<()> {
        if self.connections.contains_key(&connection.name) {
            return Err(WorldError::DuplicateIdentity {
                kind: EntityKind::Connection,
                name: connection.name,
            });
        }
        self.body(&connection.parent)?;
        let child = self.body(&connection.child)?;
        if let Some(existing) = child.parent_connection() {
            return Err(WorldError::AlreadyConnected {
                child: connection.child.clone(),
                existing: existing.clone(),
            });
        }
        if self.is_ancestor(&connection.child, &connection.parent) {
            return Err(WorldError::CycleDetected {
                parent: connection.parent.clone(),
                child: connection.child.clone(),
            });
        }
        let expected = connection.kind().dof_count();
        if connection.declared_dofs().len() != expected {
            return Err(WorldError::DofCountMismatch {
                connection: connection.name.clone(),
                expected,
                actual: connection.declared_dofs().len(),
            });
        }
        for dof in connection.expression().dofs() {
            let declared = connection.dof_names().any(|d| *d == dof);
            if !declared && !self.dofs.contains_key(&dof) {
                return Err(WorldError::UnknownDegreeOfFreedom(dof));
            }
        }

        for dof in connection.declared_dofs() {
            if !self.dofs.contains_key(&dof.name) {
                self.register_dof(dof.clone());
            }
        }
        if let Some(child) = self.bodies.get_mut(&connection.child) {
            child.set_parent_connection(Some(connection.name.clone()));
        }
        tracing::debug!(
            connection = %connection.name,
            parent = %connection.parent,
            child = %connection.child,
            "connection added"
        );
        self.events.push(WorldEvent::ConnectionAdded {
            connection: connection.clone(),
        });
        self.connections.insert(connection.name.clone(), connection);
        Ok(())
    }

    /// Detach the child subtree. DoFs owned by no remaining connection are
    /// removed with their state.
    pub fn remove_connection(&mut self, name: &PrefixedName) -> WorldResult<Connection> {
        let connection = self
            .connections
            .remove(name)
            .ok_or_else(|| WorldError::UnknownConnection(name.clone()))?;
        if let Some(child) = self.bodies.get_mut(&connection.child) {
            child.set_parent_connection(None);
        }
        tracing::debug!(connection = %name, "connection removed");
        self.events.push(WorldEvent::ConnectionRemoved {
            connection: connection.clone(),
        });
        for dof in connection.dof_names() {
            let still_used = self.connections.values().any(|c| c.references_dof(dof));
            if still_used {
                tracing::debug!(dof = %dof, "dof kept, shared with another connection");
            } else {
                self.unregister_dof(dof);
            }
        }
        Ok(connection)
    }

    /// Remove a leaf body together with its parent connection.
    pub fn remove_body(&mut self, name: &PrefixedName) -> WorldResult<Body> {
        let body = self.body(name)?;
        if self.connections.values().any(|c| &c.parent == name) {
            return Err(WorldError::HasChildren(name.clone()));
        }
        if let Some(connection) = body.parent_connection().cloned() {
            self.remove_connection(&connection)?;
        }
        let body = self
            .bodies
            .remove(name)
            .ok_or_else(|| WorldError::UnknownBody(name.clone()))?;
        tracing::debug!(body = %name, "body removed");
        self.events.push(WorldEvent::BodyRemoved { body: body.clone() });
        Ok(body)
    }

    /// Validated write of a full DoF state. Returns the value actually stored.
    pub fn set_state(
        &mut self,
        dof: &PrefixedName,
        value: DofState,
        policy: BoundsPolicy,
    ) -> WorldResult<DofState> {
        let admitted = self.degree_of_freedom(dof)?.admit(value, policy)?;
        self.write_state(dof, admitted)?;
        Ok(admitted)
    }

    /// Validated write of the position only.
    pub fn set_position(
        &mut self,
        dof: &PrefixedName,
        position: f64,
        policy: BoundsPolicy,
    ) -> WorldResult<DofState> {
        let current = self.state.get(dof)?;
        self.set_state(dof, DofState { position, ..current }, policy)
    }

    /// Validated write of the velocity only.
    pub fn set_velocity(
        &mut self,
        dof: &PrefixedName,
        velocity: f64,
        policy: BoundsPolicy,
    ) -> WorldResult<DofState> {
        let current = self.state.get(dof)?;
        self.set_state(dof, DofState { velocity, ..current }, policy)
    }

    /// Replace a connection's expression wholesale. Returns the previous one.
    ///
    /// DoFs the previous expression read that no connection uses any more
    /// are removed with their state.
    pub fn set_origin_expression(
        &mut self,
        connection: &PrefixedName,
        expression: TransformExpression,
    ) -> WorldResult<TransformExpression> {
        self.connection(connection)?;
        for dof in expression.dofs() {
            self.degree_of_freedom(&dof)?;
        }
        let target = self
            .connections
            .get_mut(connection)
            .ok_or_else(|| WorldError::UnknownConnection(connection.clone()))?;
        let previous = target.replace_expression(expression.clone());
        self.events.push(WorldEvent::ExpressionReplaced {
            connection: connection.clone(),
            expression,
        });
        for dof in previous.dofs() {
            let still_used = self.connections.values().any(|c| c.references_dof(&dof));
            if !still_used && self.dofs.contains_key(&dof) {
                self.unregister_dof(&dof);
            }
        }
        Ok(previous)
    }

    /// Change a DoF's limits. The current state must satisfy them, or is
    /// clamped under `BoundsPolicy::Clamp`.
    pub fn set_dof_limits(
        &mut self,
        dof: &PrefixedName,
        limits: DofLimits,
        policy: BoundsPolicy,
    ) -> WorldResult<()> {
        let mut definition = self.degree_of_freedom(dof)?.clone();
        let old = definition.limits;
        definition.limits = limits;
        let current = self.state.get(dof)?;
        let admitted = definition.admit(current, policy)?;
        if admitted != current {
            self.write_state(dof, admitted)?;
        }
        self.dofs.insert(dof.clone(), definition);
        self.events.push(WorldEvent::LimitsSet {
            dof: dof.clone(),
            old,
            new: limits,
        });
        Ok(())
    }

    /// Register a view over existing bodies and views.
    ///
    /// With `exists_ok`, adding a view equal to the registered one of the same
    /// name is a no-op; a different view under that name is still rejected.
    pub fn add_view(&mut self, view: View, exists_ok: bool) -> WorldResult<()> {
        if let Some(existing) = self.views.get(&view.name) {
            return match (exists_ok, existing == &view) {
                (true, true) => Ok(()),
                (true, false) => Err(WorldError::DuplicateView(view.name)),
                (false, _) => Err(WorldError::AddingAnExistingView(view.name)),
            };
        }
        for body in &view.bodies {
            self.body(body)?;
        }
        for part in &view.parts {
            self.view(part)?;
        }
        self.insert_view(view);
        Ok(())
    }

    /// Unregister a view. Views listing it as a part fail the next validation.
    pub fn remove_view(&mut self, name: &PrefixedName) -> WorldResult<View> {
        let view = self
            .views
            .remove(name)
            .ok_or_else(|| WorldError::ViewNotFound(name.clone()))?;
        tracing::debug!(view = %name, "view removed");
        self.events.push(WorldEvent::ViewRemoved { view: view.clone() });
        Ok(view)
    }

    /// Import every body, connection, DoF and view of `other`. All or nothing.
    ///
    /// `connection` links the other root below one of this model's bodies.
    /// Without one, the other root hangs below this model's root through a
    /// free connection, so the root stays where it was.
    pub fn merge_world(&mut self, other: &WorldModel, connection: Option<Connection>) -> WorldResult<()> {
        let mut merged = self.clone();
        for dof in other.dofs.values() {
            if merged.dofs.contains_key(&dof.name) {
                return Err(WorldError::DuplicateIdentity {
                    kind: EntityKind::DegreeOfFreedom,
                    name: dof.name.clone(),
                });
            }
            merged.register_dof(dof.clone());
            merged.write_state(&dof.name, other.state.get(&dof.name)?)?;
        }
        for body in other.bodies.values() {
            merged.add_body(body.clone())?;
        }
        for connection in other.connections.values() {
            merged.add_connection(connection.clone())?;
        }
        let link = match connection {
            Some(connection) => Some(connection),
            None if self.bodies.is_empty() || other.bodies.is_empty() => None,
            None => Some(Connection::free(
                self.root()?.name.clone(),
                other.root()?.name.clone(),
                Pose::default(),
            )),
        };
        if let Some(link) = link {
            merged.add_connection(link)?;
        }
        for view in other.views.values() {
            if merged.views.contains_key(&view.name) {
                return Err(WorldError::DuplicateIdentity {
                    kind: EntityKind::View,
                    name: view.name.clone(),
                });
            }
            merged.insert_view(view.clone());
        }
        tracing::debug!(
            from = %other.id,
            bodies = other.bodies.len(),
            "world merged"
        );
        *self = merged;
        Ok(())
    }

    /// Re-apply a recorded mutation. State writes bypass limit checks since
    /// the recorded value was already admitted.
    pub fn apply_event(&mut self, event: &WorldEvent) -> WorldResult<()> {
        match event {
            WorldEvent::BodyAdded { body } => self.add_body(body.clone()),
            WorldEvent::BodyRemoved { body } => self.remove_body(&body.name).map(|_| ()),
            WorldEvent::ConnectionAdded { connection } => self.add_connection(connection.clone()),
            WorldEvent::ConnectionRemoved { connection } => {
                self.remove_connection(&connection.name).map(|_| ())
            }
            WorldEvent::DofRegistered { dof } => {
                if !self.dofs.contains_key(&dof.name) {
                    self.register_dof(dof.clone());
                }
                Ok(())
            }
            WorldEvent::DofRemoved { dof, .. } => {
                if self.dofs.contains_key(&dof.name) {
                    self.unregister_dof(&dof.name);
                }
                Ok(())
            }
            WorldEvent::StateSet { dof, new, .. } => self.write_state(dof, *new),
            WorldEvent::ExpressionReplaced {
                connection,
                expression,
            } => self
                .set_origin_expression(connection, expression.clone())
                .map(|_| ()),
            WorldEvent::LimitsSet { dof, new, .. } => {
                let definition = self
                    .dofs
                    .get_mut(dof)
                    .ok_or_else(|| WorldError::UnknownDegreeOfFreedom(dof.clone()))?;
                let old = definition.limits;
                definition.limits = *new;
                self.events.push(WorldEvent::LimitsSet {
                    dof: dof.clone(),
                    old,
                    new: *new,
                });
                Ok(())
            }
            WorldEvent::ViewAdded { view } => self.add_view(view.clone(), false),
            WorldEvent::ViewRemoved { view } => self.remove_view(&view.name).map(|_| ()),
        }
    }

    /// Rebuild a model by replaying a recorded event sequence.
    pub fn replay(events: &[WorldEvent]) -> WorldResult<Self> {
        let mut model = Self::new();
        for event in events {
            model.apply_event(event)?;
        }
        model.events.clear();
        Ok(model)
    }

    fn is_ancestor(&self, candidate: &PrefixedName, body: &PrefixedName) -> bool {
        let mut current = body;
        for _ in 0..=self.bodies.len() {
            if current == candidate {
                return true;
            }
            let parent = self
                .bodies
                .get(current)
                .and_then(|b| b.parent_connection())
                .and_then(|c| self.connections.get(c))
                .map(|c| &c.parent);
            match parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        // Only reachable if the parent links already loop.
        true
    }

    fn insert_view(&mut self, view: View) {
        tracing::debug!(view = %view.name, kind = %view.kind, "view added");
        self.events.push(WorldEvent::ViewAdded { view: view.clone() });
        self.views.insert(view.name.clone(), view);
    }

    fn register_dof(&mut self, dof: DegreeOfFreedom) {
        tracing::trace!(dof = %dof.name, "dof registered");
        self.state.insert(dof.name.clone(), DofState::ZERO);
        self.events.push(WorldEvent::DofRegistered { dof: dof.clone() });
        self.dofs.insert(dof.name.clone(), dof);
    }

    fn unregister_dof(&mut self, name: &PrefixedName) {
        let last_state = self.state.remove(name).unwrap_or_default();
        if let Some(dof) = self.dofs.remove(name) {
            tracing::trace!(dof = %name, "dof removed");
            self.events.push(WorldEvent::DofRemoved { dof, last_state });
        }
    }

    fn write_state(&mut self, dof: &PrefixedName, value: DofState) -> WorldResult<()> {
        let old = self.state.get(dof)?;
        self.state.insert(dof.clone(), value);
        self.events.push(WorldEvent::StateSet {
            dof: dof.clone(),
            old,
            new: value,
        });
        Ok(())
    }
}
