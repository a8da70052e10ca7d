//! `armlink-types` – shared vocabulary for every armlink crate.
//!
//! Nothing in here knows about sessions, locks, or the network.  The types
//! describe *what* flows between the address space, the device model, and the
//! service dispatcher:
//!
//! - [`NodeId`], [`QualifiedName`], [`LocalizedText`] – node identity and naming.
//! - [`DataType`] / [`Variant`] – the closed set of value kinds a variable or
//!   method argument may carry.
//! - [`StatusCode`] – the per-operation outcome returned to remote callers.
//! - [`Permission`] / [`PermissionSet`] – what an authenticated principal may do.
//! - [`SessionHandle`] – opaque handle issued to a remote caller.
//! - [`ArmError`] – the workspace-wide error enum.

mod error;
mod node_id;
mod permission;
mod status;
mod variant;

pub use error::{ArmError, ErrorKind};
pub use node_id::{Identifier, NodeId, QualifiedName, well_known};
pub use permission::{Permission, PermissionSet};
pub use status::StatusCode;
pub use variant::{DataType, LocalizedText, Variant};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle identifying one authenticated session.
///
/// Handles are random (UUID v4) so they cannot be guessed from one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    /// Generate a fresh random handle.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID, e.g. one decoded by the transport.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
