use kinetree_common::PrefixedName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a view says its bodies are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViewKind {
    Container,
    Handle,
    Drawer,
    Door,
    DoubleDoor,
    Dresser,
    Fridge,
    Table,
    Wall,
    Room,
    /// Application-defined kind.
    Other(String),
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(kind) => f.write_str(kind),
            known => write!(f, "{known:?}"),
        }
    }
}

/// A semantic annotation over bodies of the world, like "this body is a
/// handle" or "these bodies form a drawer".
///
/// Views own nothing. They refer to bodies and to other views by name, and
/// every reference must resolve when a transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: PrefixedName,
    pub kind: ViewKind,
    pub bodies: Vec<PrefixedName>,
    /// Sub-views, e.g. the handle of a door.
    pub parts: Vec<PrefixedName>,
}

impl View {
    pub fn new(name: impl Into<PrefixedName>, kind: ViewKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bodies: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<PrefixedName>) -> Self {
        self.bodies.push(body.into());
        self
    }

    pub fn with_part(mut self, view: impl Into<PrefixedName>) -> Self {
        self.parts.push(view.into());
        self
    }

    pub fn refers_to_body(&self, body: &PrefixedName) -> bool {
        self.bodies.contains(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_references() {
        let door = View::new("door", ViewKind::Door)
            .with_body("door_panel")
            .with_part("door_handle");
        assert!(door.refers_to_body(&PrefixedName::new("door_panel")));
        assert!(!door.refers_to_body(&PrefixedName::new("door_handle")));
        assert_eq!(door.parts, vec![PrefixedName::new("door_handle")]);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ViewKind::Handle.to_string(), "Handle");
        assert_eq!(ViewKind::Other("Cutlery".into()).to_string(), "Cutlery");
    }
}
