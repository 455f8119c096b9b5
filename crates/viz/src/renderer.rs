use glam::{DMat4, DVec3};
use kinetree_kernel::{PrefixedName, WorldError, WorldModel};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Camera/view configuration for rendering.
#[derive(Debug, Clone)]
pub struct RenderView {
    /// Camera position in the reference frame.
    pub eye: DVec3,
    /// Point the camera is looking at.
    pub target: DVec3,
    /// Field of view in degrees.
    pub fov_degrees: f64,
    /// Body whose frame poses are expressed in. The root when `None`.
    pub frame: Option<PrefixedName>,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: DVec3::new(0.0, 10.0, 10.0),
            target: DVec3::ZERO,
            fov_degrees: 60.0,
            frame: None,
        }
    }
}

impl RenderView {
    pub fn in_frame_of(mut self, body: impl Into<PrefixedName>) -> Self {
        self.frame = Some(body.into());
        self
    }

    /// Pose of `body` as this view expresses it.
    pub fn pose_of(&self, model: &WorldModel, body: &PrefixedName) -> Result<DMat4, WorldError> {
        match &self.frame {
            Some(frame) => model.relative_transform(frame, body),
            None => model.global_transform(body),
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads a committed model and a view configuration, then
/// produces output. It never mutates the world.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given model and view.
    fn render(&self, model: &WorldModel, view: &RenderView) -> Self::Output;
}

/// Human-readable dump of every body's pose.
///
/// Useful for CLI output, logging, and testing the render interface.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, model: &WorldModel, view: &RenderView) -> String {
        let mut out = String::new();
        let root = match model.root() {
            Ok(body) => body.name.to_string(),
            Err(_) => "-".to_string(),
        };
        let _ = writeln!(out, "=== World {} (root={root}) ===", model.id());
        let _ = writeln!(
            out,
            "Bodies: {}  Connections: {}  DoFs: {}",
            model.body_count(),
            model.connection_count(),
            model.state().len()
        );
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            view.eye.x, view.eye.y, view.eye.z, view.target.x, view.target.y, view.target.z, view.fov_degrees
        );
        if let Some(frame) = &view.frame {
            let _ = writeln!(out, "Frame: {frame}");
        }

        for body in model.bodies() {
            match view.pose_of(model, &body.name) {
                Ok(pose) => {
                    let p = pose.w_axis;
                    let _ = writeln!(out, "  {} pos=({:.3}, {:.3}, {:.3})", body.name, p.x, p.y, p.z);
                }
                Err(err) => {
                    tracing::debug!(body = %body.name, error = %err, "pose unavailable");
                    let _ = writeln!(out, "  {} pos=unreachable", body.name);
                }
            }
        }
        out
    }
}

/// Every reachable body's pose, keyed by name.
#[derive(Debug, Default)]
pub struct PoseRenderer;

impl Renderer for PoseRenderer {
    type Output = BTreeMap<PrefixedName, DMat4>;

    fn render(&self, model: &WorldModel, view: &RenderView) -> Self::Output {
        model
            .bodies()
            .filter_map(|b| view.pose_of(model, &b.name).ok().map(|pose| (b.name.clone(), pose)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetree_kernel::{Body, BoundsPolicy, Connection, DegreeOfFreedom, Pose};

    fn drawer_model() -> WorldModel {
        let mut m = WorldModel::new();
        m.add_body(Body::new("root")).unwrap();
        m.add_body(Body::new("drawer")).unwrap();
        m.add_connection(Connection::prismatic(
            "root",
            "drawer",
            Pose::from_translation(DVec3::new(0.0, 0.0, 1.0)),
            DVec3::X,
            DegreeOfFreedom::new("slide"),
        ))
        .unwrap();
        m.set_position(&PrefixedName::new("slide"), 0.5, BoundsPolicy::Reject)
            .unwrap();
        m
    }

    #[test]
    fn debug_renderer_empty_world() {
        let output = DebugTextRenderer::new().render(&WorldModel::new(), &RenderView::default());
        assert!(output.contains("root=-"));
        assert!(output.contains("Bodies: 0"));
    }

    #[test]
    fn debug_renderer_prints_global_positions() {
        let output = DebugTextRenderer::new().render(&drawer_model(), &RenderView::default());
        assert!(output.contains("root=root"));
        assert!(output.contains("Bodies: 2"));
        assert!(output.contains("drawer pos=(0.500, 0.000, 1.000)"));
    }

    #[test]
    fn detached_body_reported_unreachable() {
        let mut m = drawer_model();
        m.add_body(Body::new("floating")).unwrap();
        let output = DebugTextRenderer::new().render(&m, &RenderView::default());
        assert!(output.contains("floating pos=unreachable"));
    }

    #[test]
    fn view_frame_changes_reference() {
        let m = drawer_model();
        let view = RenderView::default().in_frame_of("drawer");
        let poses = PoseRenderer.render(&m, &view);
        let root = poses[&PrefixedName::new("root")].w_axis.truncate();
        assert!(root.abs_diff_eq(DVec3::new(-0.5, 0.0, -1.0), 1e-12));
        assert!(poses[&PrefixedName::new("drawer")].abs_diff_eq(DMat4::IDENTITY, 1e-12));
    }

    #[test]
    fn render_view_default() {
        let view = RenderView::default();
        assert_eq!(view.fov_degrees, 60.0);
        assert_eq!(view.target, DVec3::ZERO);
        assert!(view.frame.is_none());
    }
}
