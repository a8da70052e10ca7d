//! Decoded service requests and the responses handed back to the transport.
//!
//! Every response carries a top-level [`StatusCode`].  Batch services
//! additionally carry one status per item.

use std::time::Duration;

use armlink_kernel::Credential;
use armlink_space::{AttributeId, DataValue, Node, NodeClass, ReferenceKind};
use armlink_types::{NodeId, PermissionSet, SessionHandle, StatusCode, Variant};

// ── session lifecycle ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub credential: Credential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionResponse {
    pub status: StatusCode,
    pub session: Option<SessionHandle>,
    pub permissions: PermissionSet,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionRequest {
    pub session: SessionHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionResponse {
    pub status: StatusCode,
}

// ── browse ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseRequest {
    pub session: SessionHandle,
    pub node_id: NodeId,
}

/// One reference returned by Browse, with enough of the target to display it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    pub reference: ReferenceKind,
    pub node_id: NodeId,
    pub browse_name: String,
    pub display_name: String,
    pub node_class: NodeClass,
    pub type_definition: Option<NodeId>,
}

impl ReferenceDescription {
    pub(crate) fn new(reference: ReferenceKind, node: &Node) -> Self {
        Self {
            reference,
            node_id: node.id.clone(),
            browse_name: node.browse_name.clone(),
            display_name: node.display_name.text.clone(),
            node_class: node.class(),
            type_definition: node.type_definition().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseResponse {
    pub status: StatusCode,
    pub references: Vec<ReferenceDescription>,
}

// ── read ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute: AttributeId,
}

impl ReadValueId {
    pub fn value(node_id: NodeId) -> Self {
        Self {
            node_id,
            attribute: AttributeId::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub session: SessionHandle,
    pub items: Vec<ReadValueId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub status: StatusCode,
    pub value: Option<DataValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub status: StatusCode,
    pub results: Vec<ReadResult>,
}

// ── write ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct WriteValue {
    pub node_id: NodeId,
    pub attribute: AttributeId,
    pub value: Variant,
}

impl WriteValue {
    pub fn value(node_id: NodeId, value: impl Into<Variant>) -> Self {
        Self {
            node_id,
            attribute: AttributeId::Value,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub session: SessionHandle,
    pub items: Vec<WriteValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub status: StatusCode,
    pub results: Vec<StatusCode>,
}

// ── call ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub session: SessionHandle,
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub inputs: Vec<Variant>,
}

/// Once the method is resolved, `outputs` always has the declared arity,
/// whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub status: StatusCode,
    pub outputs: Vec<Variant>,
}
