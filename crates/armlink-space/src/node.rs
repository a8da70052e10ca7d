//! Node, reference, and attribute definitions.

use std::fmt;

use armlink_types::{ArmError, DataType, LocalizedText, NodeId, QualifiedName, Variant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::method::{Argument, MethodHandler};

// ────────────────────────────────────────────────────────────────────────────
// Classification
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    ObjectType,
    VariableType,
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Typed edge between two nodes.
///
/// `Organizes` and `HasComponent` are owning (containment) edges; every node
/// except the root has exactly one of them pointing at it.
/// `HasTypeDefinition` is a non-owning classification edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Organizes,
    HasComponent,
    HasTypeDefinition,
}

impl ReferenceKind {
    pub fn is_hierarchical(self) -> bool {
        matches!(self, ReferenceKind::Organizes | ReferenceKind::HasComponent)
    }
}

/// Forward reference stored on the source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub target: NodeId,
}

/// Whether a variable's value may be read and/or written remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

impl AccessLevel {
    pub fn readable(self) -> bool {
        matches!(self, AccessLevel::ReadOnly | AccessLevel::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, AccessLevel::ReadWrite | AccessLevel::WriteOnly)
    }

    /// Bit mask in the CurrentRead = 1 / CurrentWrite = 2 convention.
    pub fn bits(self) -> i32 {
        (self.readable() as i32) | ((self.writable() as i32) << 1)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Node
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct VariableAttributes {
    pub data_type: DataType,
    pub access_level: AccessLevel,
}

/// Method signature plus the stateless handler bound to it.
#[derive(Clone)]
pub struct MethodAttributes {
    pub inputs: Vec<Argument>,
    pub outputs: Vec<Argument>,
    pub handler: MethodHandler,
}

impl MethodAttributes {
    /// Check the argument count and every argument against the declared
    /// input signature.
    pub fn validate_inputs(&self, inputs: &[Variant]) -> Result<(), ArmError> {
        if inputs.len() != self.inputs.len() {
            return Err(ArmError::ArityMismatch {
                expected: self.inputs.len(),
                actual: inputs.len(),
            });
        }
        for (declared, value) in self.inputs.iter().zip(inputs) {
            declared.check(value)?;
        }
        Ok(())
    }

    /// Check handler output against the declared output signature.
    pub fn validate_outputs(&self, outputs: &[Variant]) -> Result<(), ArmError> {
        if outputs.len() != self.outputs.len() {
            return Err(ArmError::Internal(format!(
                "handler returned {} outputs, {} declared",
                outputs.len(),
                self.outputs.len()
            )));
        }
        for (declared, value) in self.outputs.iter().zip(outputs) {
            declared
                .check(value)
                .map_err(|e| ArmError::Internal(format!("output '{}': {e}", declared.name)))?;
        }
        Ok(())
    }

    /// Zero values shaped like the declared outputs.
    pub fn default_outputs(&self) -> Vec<Variant> {
        self.outputs
            .iter()
            .map(|a| Variant::default_for(a.data_type))
            .collect()
    }
}

impl fmt::Debug for MethodAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodAttributes")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum NodeBody {
    Object {
        type_definition: Option<NodeId>,
        folder: bool,
    },
    Variable(VariableAttributes),
    Method(MethodAttributes),
    ObjectType {
        name: QualifiedName,
    },
    VariableType {
        name: QualifiedName,
        data_type: DataType,
    },
}

/// A unit in the address space.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Unique among the node's siblings.
    pub browse_name: String,
    pub display_name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub body: NodeBody,
}

impl Node {
    pub fn class(&self) -> NodeClass {
        match self.body {
            NodeBody::Object { .. } => NodeClass::Object,
            NodeBody::Variable(_) => NodeClass::Variable,
            NodeBody::Method(_) => NodeClass::Method,
            NodeBody::ObjectType { .. } => NodeClass::ObjectType,
            NodeBody::VariableType { .. } => NodeClass::VariableType,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableAttributes> {
        match &self.body {
            NodeBody::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodAttributes> {
        match &self.body {
            NodeBody::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Type node this instance is classified by, if any.
    pub fn type_definition(&self) -> Option<&NodeId> {
        match &self.body {
            NodeBody::Object {
                type_definition, ..
            } => type_definition.as_ref(),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attributes & values
// ────────────────────────────────────────────────────────────────────────────

/// Node attributes addressable through the Read and Write services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeId {
    NodeId,
    NodeClass,
    BrowseName,
    DisplayName,
    Description,
    DataType,
    AccessLevel,
    Value,
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A value plus the time its source last produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Variant,
    pub source_timestamp: DateTime<Utc>,
}

impl DataValue {
    pub fn now(value: Variant) -> Self {
        Self {
            value,
            source_timestamp: Utc::now(),
        }
    }
}
