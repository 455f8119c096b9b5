use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Name of a world entity, optionally scoped by a prefix.
///
/// Two names are equal only when both the name and the prefix match, so
/// `drawer/handle` and `door/handle` can live in the same world.
/// Serialized as a string so names can key JSON maps. In that form `/` and
/// `\` inside either part are escaped with `\`, which keeps
/// `PrefixedName::new("a/b")` apart from `a` / `b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrefixedName {
    pub prefix: Option<String>,
    pub name: String,
}

impl PrefixedName {
    /// A name without prefix.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            name: name.into(),
        }
    }

    /// A name scoped by `prefix`.
    pub fn with_prefix(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            name: name.into(),
        }
    }

    /// Escaped string form used for serialization.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 8);
        if let Some(prefix) = &self.prefix {
            escape_into(prefix, &mut out);
            out.push('/');
        }
        escape_into(&self.name, &mut out);
        out
    }

    /// Inverse of [`encode`](Self::encode).
    ///
    /// Unescaped input with several `/` splits on the last one, matching
    /// `From<&str>`.
    pub fn decode(encoded: &str) -> Result<Self, String> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = encoded.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(format!("dangling escape in name {encoded:?}")),
                },
                '/' => parts.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        Ok(if parts.is_empty() {
            Self::new(current)
        } else {
            Self::with_prefix(current, parts.join("/"))
        })
    }

    /// Derive a child name that shares this name's prefix.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            prefix: self.prefix.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PrefixedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The last `/` separates prefix from name, so prefixes may themselves be scoped.
impl From<&str> for PrefixedName {
    fn from(value: &str) -> Self {
        match value.rsplit_once('/') {
            Some((prefix, name)) => Self::with_prefix(name, prefix),
            None => Self::new(value),
        }
    }
}

impl From<String> for PrefixedName {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<PrefixedName> for String {
    fn from(value: PrefixedName) -> Self {
        value.to_string()
    }
}

impl Serialize for PrefixedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PrefixedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

fn escape_into(part: &str, out: &mut String) {
    for c in part.chars() {
        if matches!(c, '/' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_prefix() {
        assert_eq!(PrefixedName::new("root").to_string(), "root");
        assert_eq!(
            PrefixedName::with_prefix("handle", "drawer").to_string(),
            "drawer/handle"
        );
    }

    #[test]
    fn prefix_participates_in_equality() {
        let a = PrefixedName::with_prefix("handle", "drawer");
        let b = PrefixedName::with_prefix("handle", "door");
        assert_ne!(a, b);
        assert_ne!(a, PrefixedName::new("handle"));
    }

    #[test]
    fn parse_from_str() {
        let n = PrefixedName::from("dresser/drawer");
        assert_eq!(n.prefix.as_deref(), Some("dresser"));
        assert_eq!(n.name, "drawer");
        assert_eq!(PrefixedName::from("root"), PrefixedName::new("root"));
    }

    #[test]
    fn nested_prefix_roundtrips_through_string() {
        let n = PrefixedName::with_prefix("x", "world/root_T_dresser");
        let s: String = n.clone().into();
        assert_eq!(PrefixedName::from(s), n);
    }

    #[test]
    fn slash_inside_name_is_not_a_prefix() {
        let plain = PrefixedName::new("a/b");
        let scoped = PrefixedName::with_prefix("b", "a");
        assert_ne!(plain.encode(), scoped.encode());
        assert_eq!(PrefixedName::decode(&plain.encode()).unwrap(), plain);
        assert_eq!(PrefixedName::decode(&scoped.encode()).unwrap(), scoped);

        let json = serde_json::to_string(&vec![plain.clone(), scoped.clone()]).unwrap();
        let back: Vec<PrefixedName> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![plain, scoped]);
    }

    #[test]
    fn nested_prefix_and_backslash_survive_encoding() {
        let n = PrefixedName::with_prefix("x\\y", "world/root_T_dresser");
        assert_eq!(n.encode(), "world\\/root_T_dresser/x\\\\y");
        assert_eq!(PrefixedName::decode(&n.encode()).unwrap(), n);
        assert!(PrefixedName::decode("dangling\\").is_err());
    }

    #[test]
    fn sibling_keeps_prefix() {
        let n = PrefixedName::with_prefix("container", "drawer");
        assert_eq!(n.sibling("handle"), PrefixedName::with_prefix("handle", "drawer"));
    }
}
