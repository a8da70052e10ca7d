//! Workspace-wide error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DataType, NodeId, Permission, QualifiedName, SessionHandle};

/// Coarse classification of an [`ArmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller or configuration bug in the node graph.  Fatal during startup,
    /// reported as a status at runtime.
    Structural,
    /// Authentication, session, or authorization failure.  Always audited.
    Security,
    /// Bad caller input.  Nothing was mutated.
    Validation,
    /// Unexpected failure inside a handler.
    Internal,
}

/// Every failure the address space, device model, session manager, and
/// dispatcher can produce.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ArmError {
    // ── structural ──────────────────────────────────────────────────────────
    #[error("Unknown type: {0}")]
    UnknownType(QualifiedName),

    #[error("Type already registered: {0}")]
    DuplicateType(QualifiedName),

    #[error("Browse name '{name}' already used under {parent}")]
    DuplicateBrowseName { parent: NodeId, name: String },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Child '{name}' not found under {parent}")]
    ChildNotFound { parent: NodeId, name: String },

    #[error("Method {method} is not a method of {object}")]
    MethodNotFound { object: NodeId, method: NodeId },

    #[error("Node {node} is not a {expected}")]
    InvalidNodeClass { node: NodeId, expected: String },

    // ── security ────────────────────────────────────────────────────────────
    #[error("Authentication failed for '{principal}'")]
    AuthenticationFailed { principal: String },

    #[error("Too many authentication attempts")]
    TooManyAttempts,

    #[error("Session not found: {0}")]
    SessionNotFound(SessionHandle),

    #[error("Session expired: {0}")]
    SessionExpired(SessionHandle),

    #[error("Session limit of {max} reached")]
    SessionLimitReached { max: usize },

    #[error("Permission denied: '{required}' required")]
    PermissionDenied { required: Permission },

    // ── validation ──────────────────────────────────────────────────────────
    #[error("Expected {expected} values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Joint {joint} target {value} is outside [{min}, {max}]")]
    OutOfBounds {
        joint: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index {index} out of range for {count} joints")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Node {0} is not readable")]
    NotReadable(NodeId),

    #[error("Node {0} is not writable")]
    NotWritable(NodeId),

    #[error("Attribute {attribute} is not valid for {node}")]
    AttributeInvalid { node: NodeId, attribute: String },

    #[error("Password policy violation: {0}")]
    PasswordPolicy(String),

    // ── internal ────────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArmError::UnknownType(_)
            | ArmError::DuplicateType(_)
            | ArmError::DuplicateBrowseName { .. }
            | ArmError::NodeNotFound(_)
            | ArmError::ChildNotFound { .. }
            | ArmError::MethodNotFound { .. }
            | ArmError::InvalidNodeClass { .. } => ErrorKind::Structural,

            ArmError::AuthenticationFailed { .. }
            | ArmError::TooManyAttempts
            | ArmError::SessionNotFound(_)
            | ArmError::SessionExpired(_)
            | ArmError::SessionLimitReached { .. }
            | ArmError::PermissionDenied { .. } => ErrorKind::Security,

            ArmError::ArityMismatch { .. }
            | ArmError::OutOfBounds { .. }
            | ArmError::TypeMismatch { .. }
            | ArmError::InvalidArgument(_)
            | ArmError::IndexOutOfRange { .. }
            | ArmError::NotReadable(_)
            | ArmError::NotWritable(_)
            | ArmError::AttributeInvalid { .. }
            | ArmError::PasswordPolicy(_) => ErrorKind::Validation,

            ArmError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_names_joint_and_limits() {
        let err = ArmError::OutOfBounds {
            joint: 0,
            value: 200.0,
            min: -180.0,
            max: 180.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("Joint 0"));
        assert!(msg.contains("200"));
        assert!(msg.contains("180"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ArmError::NodeNotFound(NodeId::numeric(1, 9)).kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            ArmError::PermissionDenied {
                required: Permission::Write
            }
            .kind(),
            ErrorKind::Security
        );
        assert_eq!(
            ArmError::SessionExpired(SessionHandle::generate()).kind(),
            ErrorKind::Security
        );
        assert_eq!(
            ArmError::TypeMismatch {
                expected: DataType::Double,
                actual: DataType::String
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(ArmError::Internal("boom".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn permission_denied_display() {
        let err = ArmError::PermissionDenied {
            required: Permission::Call,
        };
        assert!(err.to_string().contains("'call'"));
    }

    #[test]
    fn error_serialization_roundtrip() {
        let err = ArmError::ChildNotFound {
            parent: NodeId::numeric(1, 1000),
            name: "IsMoving".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: ArmError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ArmError::ChildNotFound { ref name, .. } if name == "IsMoving"));
    }
}
