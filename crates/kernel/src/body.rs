use kinetree_common::PrefixedName;
use kinetree_geometry::{Shape, ShapeCollection};
use serde::{Deserialize, Serialize};

/// A node of the kinematic tree.
///
/// The parent link is maintained by the owning world model; a freshly built
/// body is always parentless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: PrefixedName,
    pub visual: ShapeCollection,
    pub collision: ShapeCollection,
    parent_connection: Option<PrefixedName>,
}

impl Body {
    pub fn new(name: impl Into<PrefixedName>) -> Self {
        Self {
            name: name.into(),
            visual: ShapeCollection::new(),
            collision: ShapeCollection::new(),
            parent_connection: None,
        }
    }

    /// Use `shape` for both visual and collision geometry.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.visual.push(shape.clone());
        self.collision.push(shape);
        self
    }

    pub fn parent_connection(&self) -> Option<&PrefixedName> {
        self.parent_connection.as_ref()
    }

    pub fn is_root_candidate(&self) -> bool {
        self.parent_connection.is_none()
    }

    pub(crate) fn set_parent_connection(&mut self, connection: Option<PrefixedName>) {
        self.parent_connection = connection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetree_geometry::{Scale, ShapeKind};

    #[test]
    fn new_body_has_no_parent() {
        let b = Body::new("drawer");
        assert!(b.parent_connection().is_none());
        assert!(b.is_root_candidate());
        assert!(b.visual.is_empty());
    }

    #[test]
    fn with_shape_fills_both_collections() {
        let b = Body::new("box").with_shape(Shape::new(ShapeKind::Box {
            scale: Scale::new(0.5, 0.5, 0.5),
        }));
        assert_eq!(b.visual.len(), 1);
        assert_eq!(b.collision.len(), 1);
    }
}
