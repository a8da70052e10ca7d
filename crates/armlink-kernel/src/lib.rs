//! `armlink-kernel` – the security gate.
//!
//! Decides who may talk to the arm and records that they did.  Nothing in
//! here knows about nodes or joints.
//!
//! # Modules
//!
//! - [`user_store`] – [`UserStore`][user_store::UserStore]: credential
//!   records with SHA-256 password digests and a
//!   [`PasswordPolicy`][user_store::PasswordPolicy], behind the
//!   [`Authenticator`][user_store::Authenticator] trait.
//! - [`session_manager`] – [`SessionManager`][session_manager::SessionManager]:
//!   issues and validates session handles, enforces idle timeout, session
//!   count, and authentication rate limits, and answers authorization
//!   checks against each session's permission set.
//! - [`audit`] – [`AuditSink`][audit::AuditSink] plus the tracing, in-memory,
//!   and channel-backed sinks.

pub mod audit;
pub mod session_manager;
pub mod user_store;

pub use audit::{
    AUDIT_TARGET, AuditEvent, AuditEventKind, AuditSink, ChannelAuditSink, MemoryAuditSink,
    TracingAuditSink,
};
pub use session_manager::{Credential, Principal, Session, SessionManager, SessionPolicy};
pub use user_store::{Authenticator, PasswordPolicy, UserRecord, UserStore, hash_password};
