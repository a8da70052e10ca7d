//! Node identity and naming.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ArmError;

/// The key part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    Text(String),
}

/// Process-unique node identifier: a namespace index plus a numeric or
/// string key.
///
/// Displays in the familiar `ns=<n>;i=<num>` / `ns=<n>;s=<text>` notation and
/// parses back from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub const fn numeric(namespace: u16, id: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(id),
        }
    }

    pub fn text(namespace: u16, id: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::Text(id.into()),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "ns={};i={}", self.namespace, n),
            Identifier::Text(s) => write!(f, "ns={};s={}", self.namespace, s),
        }
    }
}

impl FromStr for NodeId {
    type Err = ArmError;

    /// Parse `ns=1;i=42`, `ns=1;s=Robot`, or the namespace-0 shorthand `i=85`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArmError::InvalidArgument(format!("malformed node id '{s}'"));

        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail.split_once(';').ok_or_else(invalid)?;
                (ns.parse::<u16>().map_err(|_| invalid())?, rest)
            }
            None => (0, s),
        };

        if let Some(num) = rest.strip_prefix("i=") {
            let id = num.parse::<u32>().map_err(|_| invalid())?;
            Ok(Self::numeric(namespace, id))
        } else if let Some(text) = rest.strip_prefix("s=") {
            if text.is_empty() {
                return Err(invalid());
            }
            Ok(Self::text(namespace, text))
        } else {
            Err(invalid())
        }
    }
}

/// Namespace-0 nodes every address space starts with.
pub mod well_known {
    use super::NodeId;

    /// The containment root.
    pub const ROOT_FOLDER: NodeId = NodeId::numeric(0, 84);
    /// Parent of every device instance.
    pub const OBJECTS_FOLDER: NodeId = NodeId::numeric(0, 85);
    /// Parent of every type node.
    pub const TYPES_FOLDER: NodeId = NodeId::numeric(0, 86);
}

/// A name qualified by the namespace that defines it, used for type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: u16, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}
