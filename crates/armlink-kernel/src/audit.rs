//! Audit trail for security and service events.
//!
//! Every authentication attempt, session transition, access denial, method
//! call, and write produces exactly one [`AuditEvent`], delivered
//! synchronously to an [`AuditSink`] at the point it happens.  Sinks never
//! batch and never drop an event without saying so in the log.

use std::fmt;

use armlink_types::SessionHandle;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const AUDIT_TARGET: &str = "armlink::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventKind {
    AuthenticationSucceeded,
    AuthenticationFailed,
    SessionOpened,
    SessionClosed,
    SessionExpired,
    /// A request arrived with a handle the manager does not know.
    SessionRejected,
    AccessDenied,
    MethodCalled,
    ValueWritten,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditEventKind,
    /// Username, `anonymous`, or `unknown` when no session could be resolved.
    pub principal: String,
    pub session: Option<SessionHandle>,
    pub success: bool,
    pub detail: String,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, principal: impl Into<String>, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            principal: principal.into(),
            session: None,
            success,
            detail: String::new(),
        }
    }

    pub fn session(mut self, handle: SessionHandle) -> Self {
        self.session = Some(handle);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

// ────────────────────────────────────────────────────────────────────────────
// Sinks
// ────────────────────────────────────────────────────────────────────────────

/// Writes each event as a structured log line on [`AUDIT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let session = event.session.map(|h| h.to_string()).unwrap_or_default();
        if event.success {
            info!(
                target: AUDIT_TARGET,
                kind = %event.kind,
                principal = %event.principal,
                session = %session,
                detail = %event.detail,
                "audit"
            );
        } else {
            warn!(
                target: AUDIT_TARGET,
                kind = %event.kind,
                principal = %event.principal,
                session = %session,
                detail = %event.detail,
                "audit"
            );
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: AuditEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn last(&self) -> Option<AuditEvent> {
        self.events.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

/// Forwards events to an async consumer over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            warn!(
                target: AUDIT_TARGET,
                kind = %event.kind,
                principal = %event.principal,
                "audit receiver closed; event not delivered"
            );
        }
    }
}
