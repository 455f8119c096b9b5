use glam::EulerRot;
use kinetree_geometry::BoundingBox;
use kinetree_kernel::{ConnectionKind, DofState, PrefixedName, ViewKind, WorldModel, WorldResult};
use std::fmt::{self, Write};

/// World inspector for developer tooling.
///
/// Provides read-only queries against a world model for debugging and
/// command-line output.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the model.
    pub fn summary(model: &WorldModel) -> WorldSummary {
        WorldSummary {
            root: model.root().ok().map(|b| b.name.clone()),
            body_count: model.body_count(),
            connection_count: model.connection_count(),
            dof_count: model.state().len(),
            view_count: model.view_count(),
            pending_events: model.events().len(),
        }
    }

    /// Placement, parent link and DoF values of one body.
    pub fn inspect_body(model: &WorldModel, name: &PrefixedName) -> WorldResult<BodyInfo> {
        let body = model.body(name)?;
        let pose = model.global_transform(name)?;
        let (_, rotation, translation) = pose.to_scale_rotation_translation();
        let (yaw, pitch, roll) = rotation.to_euler(EulerRot::ZYX);

        let parent = model.parent_connection(name)?;
        let dofs = match parent {
            Some(connection) => connection
                .referenced_dofs()
                .into_iter()
                .map(|dof| model.state().get(&dof).map(|state| (dof, state)))
                .collect::<WorldResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(BodyInfo {
            name: body.name.clone(),
            parent: parent.map(|c| c.parent.clone()),
            connection: parent.map(|c| (c.name.clone(), c.kind())),
            children: model
                .children(name)?
                .into_iter()
                .map(|b| b.name.clone())
                .collect(),
            position: translation.to_array(),
            rpy: [roll, pitch, yaw],
            dofs,
            views: model
                .views()
                .filter(|v| v.refers_to_body(name))
                .map(|v| (v.name.clone(), v.kind.clone()))
                .collect(),
            visual_bounds: body.visual.local_bounding_box(),
        })
    }

    /// List all body names in canonical order.
    pub fn list_bodies(model: &WorldModel) -> Vec<PrefixedName> {
        model.bodies().map(|b| b.name.clone()).collect()
    }

    /// Indented kinematic tree starting at the root.
    pub fn tree(model: &WorldModel) -> WorldResult<String> {
        let mut out = String::new();
        if model.body_count() == 0 {
            return Ok(out);
        }
        let root = model.root()?.name.clone();
        let _ = writeln!(out, "{root}");
        Self::write_subtree(model, &root, 1, &mut out)?;
        Ok(out)
    }

    fn write_subtree(
        model: &WorldModel,
        body: &PrefixedName,
        depth: usize,
        out: &mut String,
    ) -> WorldResult<()> {
        for connection in model.child_connections(body)? {
            let dofs: Vec<String> = connection.dof_names().map(|d| d.to_string()).collect();
            let _ = write!(
                out,
                "{:indent$}{} [{:?} via {}",
                "",
                connection.child,
                connection.kind(),
                connection.name,
                indent = depth * 2
            );
            if dofs.is_empty() {
                let _ = writeln!(out, "]");
            } else {
                let _ = writeln!(out, "; {}]", dofs.join(", "));
            }
            Self::write_subtree(model, &connection.child, depth + 1, out)?;
        }
        Ok(())
    }
}

/// Summary of a world model for the inspector.
#[derive(Debug, Clone)]
pub struct WorldSummary {
    pub root: Option<PrefixedName>,
    pub body_count: usize,
    pub connection_count: usize,
    pub dof_count: usize,
    pub view_count: usize,
    pub pending_events: usize,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self
            .root
            .as_ref()
            .map_or_else(|| "-".to_string(), |r| r.to_string());
        write!(
            f,
            "World: root={} bodies={} connections={} dofs={} views={} pending_events={}",
            root,
            self.body_count,
            self.connection_count,
            self.dof_count,
            self.view_count,
            self.pending_events
        )
    }
}

/// Detailed info about a single body.
#[derive(Debug, Clone)]
pub struct BodyInfo {
    pub name: PrefixedName,
    pub parent: Option<PrefixedName>,
    pub connection: Option<(PrefixedName, ConnectionKind)>,
    pub children: Vec<PrefixedName>,
    /// Global position.
    pub position: [f64; 3],
    /// Global orientation as roll, pitch, yaw.
    pub rpy: [f64; 3],
    /// DoFs the parent connection depends on.
    pub dofs: Vec<(PrefixedName, DofState)>,
    /// Views that list this body.
    pub views: Vec<(PrefixedName, ViewKind)>,
    pub visual_bounds: Option<BoundingBox>,
}

impl fmt::Display for BodyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Body {} pos=({:.3}, {:.3}, {:.3}) rpy=({:.3}, {:.3}, {:.3})",
            self.name,
            self.position[0],
            self.position[1],
            self.position[2],
            self.rpy[0],
            self.rpy[1],
            self.rpy[2],
        )?;
        if let Some((connection, kind)) = &self.connection {
            write!(f, " via {connection} ({kind:?})")?;
        }
        for (dof, state) in &self.dofs {
            write!(f, " {dof}={:.3}", state.position)?;
        }
        for (view, kind) in &self.views {
            write!(f, " [{kind} {view}]")?;
        }
        Ok(())
    }
}
