//! Status codes returned across the service boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ArmError;

/// Outcome of one service operation (or one item of a batch).
///
/// Every [`ArmError`] maps onto exactly one code via `From<&ArmError>`; the
/// service dispatcher relies on that mapping so that no error crosses into
/// the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Good,
    BadNodeIdUnknown,
    BadAttributeIdInvalid,
    BadNotReadable,
    BadNotWritable,
    BadTypeMismatch,
    BadInvalidArgument,
    BadMethodInvalid,
    BadInternalError,
    BadConfigurationError,
    BadIdentityTokenRejected,
    BadTooManyOperations,
    BadSessionIdInvalid,
    BadSessionExpired,
    BadTooManySessions,
    BadUserAccessDenied,
}

impl StatusCode {
    pub fn is_good(self) -> bool {
        self == StatusCode::Good
    }

    pub fn is_bad(self) -> bool {
        !self.is_good()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<&ArmError> for StatusCode {
    fn from(err: &ArmError) -> Self {
        match err {
            ArmError::UnknownType(_)
            | ArmError::DuplicateType(_)
            | ArmError::DuplicateBrowseName { .. }
            | ArmError::ChildNotFound { .. }
            | ArmError::InvalidNodeClass { .. }
            | ArmError::PasswordPolicy(_) => StatusCode::BadConfigurationError,
            ArmError::NodeNotFound(_) => StatusCode::BadNodeIdUnknown,
            ArmError::MethodNotFound { .. } => StatusCode::BadMethodInvalid,

            ArmError::AuthenticationFailed { .. } => StatusCode::BadIdentityTokenRejected,
            ArmError::TooManyAttempts => StatusCode::BadTooManyOperations,
            ArmError::SessionNotFound(_) => StatusCode::BadSessionIdInvalid,
            ArmError::SessionExpired(_) => StatusCode::BadSessionExpired,
            ArmError::SessionLimitReached { .. } => StatusCode::BadTooManySessions,
            ArmError::PermissionDenied { .. } => StatusCode::BadUserAccessDenied,

            ArmError::ArityMismatch { .. }
            | ArmError::OutOfBounds { .. }
            | ArmError::InvalidArgument(_)
            | ArmError::IndexOutOfRange { .. } => StatusCode::BadInvalidArgument,
            ArmError::TypeMismatch { .. } => StatusCode::BadTypeMismatch,
            ArmError::NotReadable(_) => StatusCode::BadNotReadable,
            ArmError::NotWritable(_) => StatusCode::BadNotWritable,
            ArmError::AttributeInvalid { .. } => StatusCode::BadAttributeIdInvalid,

            ArmError::Internal(_) => StatusCode::BadInternalError,
        }
    }
}
