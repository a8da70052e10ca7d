//! [`ServiceDispatcher`] – the single boundary between decoded requests and
//! the core.
//!
//! Each entry point validates the session, authorizes the operation's
//! permission, and only then touches the address space or a device.  Every
//! failure is converted to a [`StatusCode`] here; nothing else crosses into
//! the transport.
//!
//! | Service | Permission |
//! |---------|------------|
//! | Browse  | `read`     |
//! | Read    | `read`     |
//! | Write   | `write`    |
//! | Call    | `call`     |

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use armlink_hal::Robot;
use armlink_kernel::{AuditEvent, AuditEventKind, AuditSink, Session, SessionManager};
use armlink_space::{AddressSpace, MethodAttributes, MethodContext};
use armlink_types::{
    ArmError, ErrorKind, NodeId, Permission, PermissionSet, SessionHandle, StatusCode, Variant,
};
use tracing::{debug, error, warn};

use crate::services::{
    BrowseRequest, BrowseResponse, CallRequest, CallResponse, CloseSessionRequest,
    CloseSessionResponse, CreateSessionRequest, CreateSessionResponse, ReadRequest, ReadResponse,
    ReadResult, ReferenceDescription, WriteRequest, WriteResponse,
};

pub struct ServiceDispatcher {
    space: Arc<AddressSpace>,
    sessions: Arc<SessionManager>,
    /// Device behind each bound object node.
    devices: HashMap<NodeId, Arc<Robot>>,
    audit: Arc<dyn AuditSink>,
}

impl ServiceDispatcher {
    pub fn new(space: Arc<AddressSpace>, sessions: Arc<SessionManager>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            space,
            sessions,
            devices: HashMap::new(),
            audit,
        }
    }

    /// Bind `robot` to the object node `object`.  Methods called on that
    /// object or anything beneath it receive the robot as their device.
    pub fn with_device(mut self, object: NodeId, robot: Arc<Robot>) -> Self {
        self.devices.insert(object, robot);
        self
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn begin(&self, handle: &SessionHandle, required: Permission) -> Result<Session, ArmError> {
        let session = self.sessions.validate(handle)?;
        self.sessions.authorize(&session, required)?;
        Ok(session)
    }

    fn device_for(&self, object: &NodeId) -> Option<&Robot> {
        let mut current = Some(object);
        while let Some(id) = current {
            if let Some(robot) = self.devices.get(id) {
                return Some(robot.as_ref());
            }
            current = self.space.parent_of(id);
        }
        None
    }

    // ── session lifecycle ───────────────────────────────────────────────────

    pub fn create_session(&self, request: CreateSessionRequest) -> CreateSessionResponse {
        match self.sessions.authenticate(&request.credential) {
            Ok(session) => CreateSessionResponse {
                status: StatusCode::Good,
                session: Some(session.handle),
                permissions: session.permissions,
                timeout: session.timeout,
            },
            Err(e) => CreateSessionResponse {
                status: StatusCode::from(&e),
                session: None,
                permissions: PermissionSet::new(),
                timeout: self.sessions.policy().session_timeout,
            },
        }
    }

    /// Idempotent; closing an unknown handle is not an error.
    pub fn close_session(&self, request: CloseSessionRequest) -> CloseSessionResponse {
        self.sessions.close(&request.session);
        CloseSessionResponse {
            status: StatusCode::Good,
        }
    }

    // ── browse / read / write ───────────────────────────────────────────────

    pub fn browse(&self, request: BrowseRequest) -> BrowseResponse {
        let result = self.begin(&request.session, Permission::Read).and_then(|_| {
            self.space.browse_children(&request.node_id).map(|refs| {
                refs.into_iter()
                    .map(|(kind, node)| ReferenceDescription::new(kind, node))
                    .collect::<Vec<_>>()
            })
        });
        match result {
            Ok(references) => BrowseResponse {
                status: StatusCode::Good,
                references,
            },
            Err(e) => {
                debug!(node = %request.node_id, error = %e, "browse failed");
                BrowseResponse {
                    status: StatusCode::from(&e),
                    references: Vec::new(),
                }
            }
        }
    }

    pub fn read(&self, request: ReadRequest) -> ReadResponse {
        if let Err(e) = self.begin(&request.session, Permission::Read) {
            return ReadResponse {
                status: StatusCode::from(&e),
                results: Vec::new(),
            };
        }
        let items: Vec<_> = request
            .items
            .into_iter()
            .map(|item| (item.node_id, item.attribute))
            .collect();
        let results = self
            .space
            .read_attributes(&items)
            .into_iter()
            .map(|r| match r {
                Ok(value) => ReadResult {
                    status: StatusCode::Good,
                    value: Some(value),
                },
                Err(e) => ReadResult {
                    status: StatusCode::from(&e),
                    value: None,
                },
            })
            .collect();
        ReadResponse {
            status: StatusCode::Good,
            results,
        }
    }

    pub fn write(&self, request: WriteRequest) -> WriteResponse {
        let session = match self.begin(&request.session, Permission::Write) {
            Ok(s) => s,
            Err(e) => {
                return WriteResponse {
                    status: StatusCode::from(&e),
                    results: Vec::new(),
                };
            }
        };
        let items: Vec<_> = request
            .items
            .into_iter()
            .map(|w| (w.node_id, w.attribute, w.value))
            .collect();
        let results: Vec<StatusCode> = self
            .space
            .write_attributes(&items)
            .iter()
            .map(|r| match r {
                Ok(()) => StatusCode::Good,
                Err(e) => StatusCode::from(e),
            })
            .collect();

        for ((node, attribute, value), status) in items.iter().zip(&results) {
            self.audit.record(
                AuditEvent::new(
                    AuditEventKind::ValueWritten,
                    session.principal.to_string(),
                    status.is_good(),
                )
                .session(session.handle)
                .detail(format!("{node} {attribute} = {value:?}: {status}")),
            );
        }
        WriteResponse {
            status: StatusCode::Good,
            results,
        }
    }

    // ── call ────────────────────────────────────────────────────────────────

    pub fn call(&self, request: CallRequest) -> CallResponse {
        let session = match self.begin(&request.session, Permission::Call) {
            Ok(s) => s,
            Err(e) => {
                return CallResponse {
                    status: StatusCode::from(&e),
                    outputs: Vec::new(),
                };
            }
        };

        let method = match self.resolve_method(&request.object_id, &request.method_id) {
            Ok(m) => m,
            Err(e) => {
                debug!(object = %request.object_id, method = %request.method_id, error = %e, "call target not resolved");
                self.audit_call(&session, &request, StatusCode::from(&e));
                return CallResponse {
                    status: StatusCode::from(&e),
                    outputs: Vec::new(),
                };
            }
        };

        let (status, outputs) = self.invoke(method, &request);
        self.audit_call(&session, &request, status);
        CallResponse { status, outputs }
    }

    /// The method node, provided it is owned (directly or transitively) by
    /// `object`.
    fn resolve_method(&self, object: &NodeId, method: &NodeId) -> Result<&MethodAttributes, ArmError> {
        self.space.find(object)?;
        let not_found = || ArmError::MethodNotFound {
            object: object.clone(),
            method: method.clone(),
        };
        let node = self.space.find(method).map_err(|_| not_found())?;
        let attrs = node.as_method().ok_or_else(not_found)?;
        if !self.space.is_ancestor(object, method) {
            return Err(not_found());
        }
        Ok(attrs)
    }

    fn invoke(&self, method: &MethodAttributes, request: &CallRequest) -> (StatusCode, Vec<Variant>) {
        if let Err(e) = method.validate_inputs(&request.inputs) {
            debug!(method = %request.method_id, error = %e, "call arguments rejected");
            return (StatusCode::BadInvalidArgument, method.default_outputs());
        }

        let ctx = MethodContext {
            space: &self.space,
            object_id: &request.object_id,
            method_id: &request.method_id,
            device: self.device_for(&request.object_id),
        };
        let result = catch_unwind(AssertUnwindSafe(|| (method.handler)(&ctx, &request.inputs)))
            .unwrap_or_else(|_| Err(ArmError::Internal("method handler panicked".into())))
            .and_then(|outputs| method.validate_outputs(&outputs).map(|()| outputs));

        match result {
            Ok(outputs) => (StatusCode::Good, outputs),
            Err(e) if e.kind() == ErrorKind::Validation => {
                warn!(method = %request.method_id, error = %e, "method rejected input");
                (StatusCode::BadInvalidArgument, method.default_outputs())
            }
            Err(e) => {
                error!(method = %request.method_id, error = %e, "method handler failed");
                (StatusCode::BadInternalError, method.default_outputs())
            }
        }
    }

    fn audit_call(&self, session: &Session, request: &CallRequest, status: StatusCode) {
        self.audit.record(
            AuditEvent::new(
                AuditEventKind::MethodCalled,
                session.principal.to_string(),
                status.is_good(),
            )
            .session(session.handle)
            .detail(format!(
                "{} on {}: {status}",
                request.method_id, request.object_id
            )),
        );
    }
}
