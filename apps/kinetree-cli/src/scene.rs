//! The demo scene: a dresser with a sliding drawer and a hinged door.

use glam::DVec3;
use kinetree_geometry::{Scale, Shape, ShapeKind};
use kinetree_kernel::{
    Body, Connection, DegreeOfFreedom, Pose, PrefixedName, View, ViewKind, World, WorldModel,
    WorldResult, the,
};
use std::f64::consts::FRAC_PI_2;

/// Maximum drawer extension in metres.
pub const DRAWER_TRAVEL: f64 = 0.4;

pub fn dresser() -> PrefixedName {
    PrefixedName::new("dresser")
}

pub fn drawer() -> PrefixedName {
    PrefixedName::with_prefix("drawer", "dresser")
}

pub fn handle() -> PrefixedName {
    PrefixedName::with_prefix("handle", "dresser")
}

pub fn door() -> PrefixedName {
    PrefixedName::with_prefix("door", "dresser")
}

pub fn drawer_slide() -> PrefixedName {
    PrefixedName::with_prefix("drawer_slide", "dresser")
}

pub fn door_hinge() -> PrefixedName {
    PrefixedName::with_prefix("door_hinge", "dresser")
}

fn boxed(x: f64, y: f64, z: f64) -> Shape {
    Shape::new(ShapeKind::Box {
        scale: Scale::new(x, y, z),
    })
}

/// Build the dresser scene detached, ready for `World::from_model`.
pub fn dresser_model() -> WorldResult<WorldModel> {
    let mut m = WorldModel::new();
    m.add_body(Body::new("root"))?;
    m.add_body(Body::new(dresser()).with_shape(boxed(0.5, 1.0, 0.8)))?;
    m.add_body(Body::new(drawer()).with_shape(boxed(0.45, 0.9, 0.2)))?;
    m.add_body(Body::new(handle()).with_shape(Shape::new(ShapeKind::Cylinder {
        width: 0.02,
        height: 0.1,
    })))?;
    m.add_body(Body::new(door()).with_shape(boxed(0.02, 0.5, 0.4)))?;

    m.add_connection(Connection::fixed(
        "root",
        dresser(),
        Pose::from_translation(DVec3::new(1.0, 0.0, 0.4)),
    ))?;
    m.add_connection(Connection::prismatic(
        dresser(),
        drawer(),
        Pose::from_translation(DVec3::new(0.0, 0.0, 0.2)),
        DVec3::X,
        DegreeOfFreedom::new(drawer_slide())
            .with_position_limits(0.0, DRAWER_TRAVEL)
            .with_velocity_limits(-0.5, 0.5),
    ))?;
    m.add_connection(Connection::fixed(
        drawer(),
        handle(),
        Pose::from_translation(DVec3::new(0.25, 0.0, 0.0)),
    ))?;
    m.add_connection(Connection::revolute(
        dresser(),
        door(),
        Pose::from_translation(DVec3::new(0.25, -0.5, -0.2)),
        DVec3::Z,
        DegreeOfFreedom::new(door_hinge()).with_position_limits(0.0, FRAC_PI_2),
    ))?;

    m.add_view(View::new(handle(), ViewKind::Handle).with_body(handle()), false)?;
    m.add_view(
        View::new(drawer(), ViewKind::Drawer)
            .with_body(drawer())
            .with_part(handle()),
        false,
    )?;
    m.add_view(View::new(door(), ViewKind::Door).with_body(door()), false)?;
    m.add_view(
        View::new(dresser(), ViewKind::Dresser)
            .with_body(dresser())
            .with_part(drawer())
            .with_part(door()),
        false,
    )?;
    Ok(m)
}

/// The body of the only handle in the model.
pub fn handle_body(model: &WorldModel) -> WorldResult<PrefixedName> {
    let view = the(model.views_by_kind(&ViewKind::Handle), |v| !v.bodies.is_empty())?;
    Ok(view.bodies[0].clone())
}

/// Put a new `map` body above the current root through a free connection
/// and place the old root at `xyz` rotated by `yaw`.
///
/// Returns the name of the new connection, found by querying for the
/// connection under the new root.
pub fn swap_root(world: &World, xyz: [f64; 3], yaw: f64) -> WorldResult<PrefixedName> {
    world.modify(|tx| {
        let old_root = tx.read(|m| m.root().map(|b| b.name.clone()))?;
        tx.add_body(Body::new("map"))?;
        let free = Connection::free("map", old_root, Pose::default());
        let dofs: Vec<PrefixedName> = free.dof_names().cloned().collect();
        tx.add_connection(free)?;
        let values = [xyz[0], xyz[1], xyz[2], 0.0, 0.0, yaw];
        for (dof, value) in dofs.iter().zip(values) {
            tx.set_position(dof, value)?;
        }
        Ok(())
    })?;

    let model = world.snapshot();
    let root = model.root()?.name.clone();
    let connection = the(model.connections(), |c| c.parent == root)?;
    Ok(connection.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetree_kernel::{ConnectionKind, WorldConfig};

    #[test]
    fn dresser_scene_is_a_valid_tree() {
        let m = dresser_model().unwrap();
        m.validate().unwrap();
        assert_eq!(m.body_count(), 5);
        assert_eq!(m.state().len(), 2);
        assert_eq!(m.root().unwrap().name, PrefixedName::new("root"));
        assert_eq!(m.view_count(), 4);
        assert_eq!(handle_body(&m).unwrap(), handle());
    }

    #[test]
    fn drawer_opens_along_dresser_x() {
        let world = World::from_model(dresser_model().unwrap(), WorldConfig::default()).unwrap();
        let before = world.global_transform(&handle()).unwrap();
        world
            .modify(|tx| tx.set_position(&drawer_slide(), 0.3).map(|_| ()))
            .unwrap();
        let after = world.global_transform(&handle()).unwrap();
        let delta = (after.w_axis - before.w_axis).truncate();
        assert!(delta.abs_diff_eq(DVec3::new(0.3, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn root_swap_moves_whole_scene() {
        let world = World::from_model(dresser_model().unwrap(), WorldConfig::default()).unwrap();
        let dresser_before = world.global_transform(&dresser()).unwrap();

        let name = swap_root(&world, [2.0, 0.0, 0.0], FRAC_PI_2).unwrap();
        let snapshot = world.snapshot();
        assert_eq!(snapshot.root().unwrap().name, PrefixedName::new("map"));
        assert_eq!(snapshot.connection(&name).unwrap().kind(), ConnectionKind::Free);

        let after = world.global_transform(&dresser()).unwrap().w_axis.truncate();
        // (1, 0, 0.4) turned a quarter about z, then shifted by 2 along x.
        assert!(after.abs_diff_eq(DVec3::new(2.0, 1.0, 0.4), 1e-12));
        assert_ne!(dresser_before.w_axis.truncate(), after);
    }
}
