//! Geometry references carried by bodies.
//!
//! The world core stores these shapes but never interprets them; meshes are
//! referenced by path only. Renderers and collision checkers outside the core
//! give them meaning.
//!
//! # Invariants
//! - Every shape is expressed in its body's frame through `origin`.
//! - Scales are strictly positive.

use glam::DVec3;
use kinetree_common::Pose;
use serde::{Deserialize, Serialize};

/// RGBA color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Build a color, clamping each component into `[0, 1]`.
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

/// Extents along the body's x, y and z axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Scale {
    /// Build a scale; non-positive components fall back to 1.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let positive = |v: f64| if v > 0.0 { v } else { 1.0 };
        Self {
            x: positive(x),
            y: positive(y),
            z: positive(z),
        }
    }

    pub fn as_vec(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Kind of shape geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Box { scale: Scale },
    Sphere { radius: f64 },
    Cylinder { width: f64, height: f64 },
    Mesh { path: String, scale: Scale },
}

/// One shape placed in its body's frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub kind: ShapeKind,
    pub origin: Pose,
    pub color: Option<Color>,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            origin: Pose::default(),
            color: None,
        }
    }

    pub fn with_origin(mut self, origin: Pose) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Axis-aligned bound in the body frame. `None` for meshes, whose
    /// extent is unknown without loading the file.
    pub fn local_bounding_box(&self) -> Option<BoundingBox> {
        let half = match &self.kind {
            ShapeKind::Box { scale } => scale.as_vec() * 0.5,
            ShapeKind::Sphere { radius } => {
                let center = self.origin.position;
                let r = DVec3::splat(*radius);
                return Some(BoundingBox::new(center - r, center + r));
            }
            ShapeKind::Cylinder { width, height } => DVec3::new(width * 0.5, width * 0.5, height * 0.5),
            ShapeKind::Mesh { .. } => return None,
        };
        let m = self.origin.to_matrix();
        let mut bb = BoundingBox::empty();
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    let corner = DVec3::new(sx * half.x, sy * half.y, sz * half.z);
                    bb.include(m.transform_point3(corner));
                }
            }
        }
        Some(bb)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    fn include(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Ordered collection of shapes, used for a body's visual or collision geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeCollection {
    shapes: Vec<Shape>,
}

impl ShapeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Union of the primitive shapes' bounds; meshes are skipped.
    pub fn local_bounding_box(&self) -> Option<BoundingBox> {
        self.shapes
            .iter()
            .filter_map(Shape::local_bounding_box)
            .reduce(|a, b| a.merge(&b))
    }
}

impl FromIterator<Shape> for ShapeCollection {
    fn from_iter<I: IntoIterator<Item = Shape>>(iter: I) -> Self {
        Self {
            shapes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetree_common::rpy_to_quat;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn color_components_are_clamped() {
        let c = Color::new(2.0, -1.0, 0.5, 1.0);
        assert_eq!((c.r, c.g, c.b, c.a), (1.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn scale_rejects_non_positive() {
        let s = Scale::new(0.0, -2.0, 3.0);
        assert_eq!(s.as_vec(), DVec3::new(1.0, 1.0, 3.0));
    }

    #[test]
    fn box_bound_centered_on_origin() {
        let shape = Shape::new(ShapeKind::Box {
            scale: Scale::new(2.0, 4.0, 6.0),
        });
        let bb = shape.local_bounding_box().unwrap();
        assert!(bb.min.abs_diff_eq(DVec3::new(-1.0, -2.0, -3.0), 1e-12));
        assert!(bb.max.abs_diff_eq(DVec3::new(1.0, 2.0, 3.0), 1e-12));
    }

    #[test]
    fn rotated_box_bound_swaps_axes() {
        let origin = Pose::new(DVec3::ZERO, rpy_to_quat(0.0, 0.0, FRAC_PI_2));
        let shape = Shape::new(ShapeKind::Box {
            scale: Scale::new(2.0, 4.0, 6.0),
        })
        .with_origin(origin);
        let bb = shape.local_bounding_box().unwrap();
        assert!(bb.extent().abs_diff_eq(DVec3::new(4.0, 2.0, 6.0), 1e-9));
    }

    #[test]
    fn mesh_has_no_bound() {
        let shape = Shape::new(ShapeKind::Mesh {
            path: "drawer.stl".into(),
            scale: Scale::default(),
        });
        assert!(shape.local_bounding_box().is_none());
    }

    #[test]
    fn collection_bound_merges_primitives() {
        let sphere = Shape::new(ShapeKind::Sphere { radius: 0.5 })
            .with_origin(Pose::from_translation(DVec3::new(2.0, 0.0, 0.0)));
        let cube = Shape::new(ShapeKind::Box {
            scale: Scale::default(),
        });
        let mesh = Shape::new(ShapeKind::Mesh {
            path: "x.obj".into(),
            scale: Scale::default(),
        });
        let coll: ShapeCollection = [sphere, cube, mesh].into_iter().collect();
        assert_eq!(coll.len(), 3);
        let bb = coll.local_bounding_box().unwrap();
        assert!(bb.min.abs_diff_eq(DVec3::new(-0.5, -0.5, -0.5), 1e-12));
        assert!(bb.max.abs_diff_eq(DVec3::new(2.5, 0.5, 0.5), 1e-12));
        assert!(bb.contains(DVec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn empty_collection_has_no_bound() {
        assert!(ShapeCollection::new().local_bounding_box().is_none());
    }
}
