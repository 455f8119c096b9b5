use crate::dof::DegreeOfFreedom;
use crate::error::WorldResult;
use crate::expression::TransformExpression;
use crate::state::WorldState;
use glam::{DMat4, DVec3};
use kinetree_common::{Pose, PrefixedName};
use serde::{Deserialize, Serialize};

/// Shape of the motion a connection allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    Fixed,
    Prismatic,
    Revolute,
    Free,
}

impl ConnectionKind {
    /// Number of owned DoFs this kind requires.
    pub fn dof_count(&self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Prismatic | Self::Revolute => 1,
            Self::Free => 6,
        }
    }
}

const FREE_AXES: [&str; 6] = ["x", "y", "z", "roll", "pitch", "yaw"];

/// Directed edge parent -> child carrying a transformation expression.
///
/// `dofs` declares the degrees of freedom the connection owns. When the
/// connection is added to a world, DoFs not yet registered are registered
/// from these declarations; already registered ones are shared as they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub name: PrefixedName,
    pub parent: PrefixedName,
    pub child: PrefixedName,
    kind: ConnectionKind,
    dofs: Vec<DegreeOfFreedom>,
    expression: TransformExpression,
}

impl Connection {
    /// Rigid connection at `origin`.
    pub fn fixed(parent: impl Into<PrefixedName>, child: impl Into<PrefixedName>, origin: Pose) -> Self {
        let (parent, child) = (parent.into(), child.into());
        Self {
            name: default_name(&parent, &child),
            parent,
            child,
            kind: ConnectionKind::Fixed,
            dofs: Vec::new(),
            expression: TransformExpression::Constant(origin),
        }
    }

    /// Translation along `axis` by the position of `dof`.
    pub fn prismatic(
        parent: impl Into<PrefixedName>,
        child: impl Into<PrefixedName>,
        origin: Pose,
        axis: DVec3,
        dof: DegreeOfFreedom,
    ) -> Self {
        let (parent, child) = (parent.into(), child.into());
        Self {
            name: default_name(&parent, &child),
            parent,
            child,
            kind: ConnectionKind::Prismatic,
            expression: TransformExpression::Prismatic {
                origin,
                axis,
                dof: dof.name.clone(),
                multiplier: 1.0,
                offset: 0.0,
            },
            dofs: vec![dof],
        }
    }

    /// Rotation about `axis` by the position of `dof`, in radians.
    pub fn revolute(
        parent: impl Into<PrefixedName>,
        child: impl Into<PrefixedName>,
        origin: Pose,
        axis: DVec3,
        dof: DegreeOfFreedom,
    ) -> Self {
        let (parent, child) = (parent.into(), child.into());
        Self {
            name: default_name(&parent, &child),
            parent,
            child,
            kind: ConnectionKind::Revolute,
            expression: TransformExpression::Revolute {
                origin,
                axis,
                dof: dof.name.clone(),
                multiplier: 1.0,
                offset: 0.0,
            },
            dofs: vec![dof],
        }
    }

    /// Six unbounded DoFs `{name}/x .. {name}/yaw` combined into a full rigid motion.
    pub fn free(parent: impl Into<PrefixedName>, child: impl Into<PrefixedName>, origin: Pose) -> Self {
        let (parent, child) = (parent.into(), child.into());
        let name = default_name(&parent, &child);
        let dofs = free_dofs(&name);
        Self {
            expression: TransformExpression::Free {
                origin,
                dofs: dofs.clone().map(|d| d.name),
            },
            dofs: dofs.to_vec(),
            name,
            parent,
            child,
            kind: ConnectionKind::Free,
        }
    }

    /// Rename the connection. A free connection's own DoFs follow the new name.
    pub fn named(mut self, name: impl Into<PrefixedName>) -> Self {
        self.name = name.into();
        if self.kind == ConnectionKind::Free {
            let dofs = free_dofs(&self.name);
            if let TransformExpression::Free { dofs: names, .. } = &mut self.expression {
                *names = dofs.clone().map(|d| d.name);
            }
            self.dofs = dofs.to_vec();
        }
        self
    }

    /// Scale and shift the DoF position of a single-axis connection.
    /// No effect on other kinds.
    pub fn with_multiplier_offset(mut self, m: f64, o: f64) -> Self {
        if let TransformExpression::Prismatic {
            multiplier, offset, ..
        }
        | TransformExpression::Revolute {
            multiplier, offset, ..
        } = &mut self.expression
        {
            *multiplier = m;
            *offset = o;
        }
        self
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Declared DoFs, in order.
    pub fn declared_dofs(&self) -> &[DegreeOfFreedom] {
        &self.dofs
    }

    /// Owned DoF names, in order.
    pub fn dof_names(&self) -> impl Iterator<Item = &PrefixedName> {
        self.dofs.iter().map(|d| &d.name)
    }

    /// Every DoF this connection depends on: owned ones plus those its
    /// current expression reads.
    pub fn referenced_dofs(&self) -> Vec<PrefixedName> {
        let mut names: Vec<PrefixedName> = self.dof_names().cloned().collect();
        for dof in self.expression.dofs() {
            if !names.contains(&dof) {
                names.push(dof);
            }
        }
        names
    }

    pub fn references_dof(&self, dof: &PrefixedName) -> bool {
        self.dof_names().any(|d| d == dof) || self.expression.dofs().contains(dof)
    }

    pub fn expression(&self) -> &TransformExpression {
        &self.expression
    }

    /// Child relative to parent under `state`.
    pub fn compute_local_transform(&self, state: &WorldState) -> WorldResult<DMat4> {
        self.expression.evaluate(state)
    }

    pub(crate) fn replace_expression(&mut self, expression: TransformExpression) -> TransformExpression {
        std::mem::replace(&mut self.expression, expression)
    }
}

fn default_name(parent: &PrefixedName, child: &PrefixedName) -> PrefixedName {
    child.sibling(format!("{}_T_{}", parent.name, child.name))
}

fn free_dofs(connection: &PrefixedName) -> [DegreeOfFreedom; 6] {
    FREE_AXES.map(|axis| DegreeOfFreedom::new(PrefixedName::with_prefix(axis, connection.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DofState;
    use kinetree_common::transforms_close;

    #[test]
    fn default_name_uses_child_prefix() {
        let c = Connection::fixed(
            PrefixedName::new("root"),
            PrefixedName::with_prefix("drawer", "dresser"),
            Pose::default(),
        );
        assert_eq!(c.name, PrefixedName::with_prefix("root_T_drawer", "dresser"));
        assert_eq!(c.kind(), ConnectionKind::Fixed);
        assert_eq!(c.declared_dofs().len(), 0);
    }

    #[test]
    fn kinds_own_expected_dof_counts() {
        let p = Connection::prismatic("a", "b", Pose::default(), DVec3::X, DegreeOfFreedom::new("s"));
        let f = Connection::free("a", "b", Pose::default());
        assert_eq!(p.declared_dofs().len(), ConnectionKind::Prismatic.dof_count());
        assert_eq!(f.declared_dofs().len(), ConnectionKind::Free.dof_count());
    }

    #[test]
    fn free_dofs_follow_rename() {
        let f = Connection::free("a", "b", Pose::default()).named("base");
        let names: Vec<String> = f.dof_names().map(|n| n.to_string()).collect();
        assert_eq!(names[0], "base/x");
        assert_eq!(names[5], "base/yaw");
        assert_eq!(f.expression().dofs().len(), 6);
        assert!(f.references_dof(&PrefixedName::from("base/pitch")));
    }

    #[test]
    fn referenced_dofs_include_expression_inputs() {
        let mut c = Connection::fixed("a", "b", Pose::default());
        assert!(c.referenced_dofs().is_empty());
        c.replace_expression(TransformExpression::Prismatic {
            origin: Pose::default(),
            axis: DVec3::Y,
            dof: PrefixedName::new("shared"),
            multiplier: 1.0,
            offset: 0.0,
        });
        assert_eq!(c.referenced_dofs(), vec![PrefixedName::new("shared")]);
    }

    #[test]
    fn local_transform_uses_multiplier() {
        let c = Connection::prismatic("a", "b", Pose::default(), DVec3::X, DegreeOfFreedom::new("s"))
            .with_multiplier_offset(-1.0, 0.5);
        let mut state = WorldState::default();
        state.insert(PrefixedName::new("s"), DofState::at_position(0.2));
        let m = c.compute_local_transform(&state).unwrap();
        let expected = DMat4::from_translation(DVec3::new(0.3, 0.0, 0.0));
        assert!(transforms_close(&m, &expected, 1e-12));
    }
}
