//! [`SessionManager`] – authentication, session lifetime, and authorization.
//!
//! Sessions live in a concurrent map keyed by [`SessionHandle`].  Idle
//! expiry works like a heartbeat watchdog: every successful
//! [`SessionManager::validate`] refreshes `last_activity`, and a session whose
//! idle time exceeds its timeout is removed either lazily on next use or by
//! [`SessionManager::sweep_expired`].
//!
//! Every security-relevant outcome is handed to the [`AuditSink`].

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use armlink_types::{ArmError, Permission, PermissionSet, SessionHandle};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::user_store::Authenticator;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Deployment-wide session rules.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPolicy {
    pub allow_anonymous: bool,
    pub anonymous_permissions: PermissionSet,
    pub session_timeout: Duration,
    pub max_sessions: usize,
    /// `0` disables the limit.
    pub max_auth_attempts_per_minute: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            allow_anonymous: false,
            anonymous_permissions: [Permission::Read].into_iter().collect(),
            session_timeout: Duration::from_millis(30_000),
            max_sessions: 100,
            max_auth_attempts_per_minute: 30,
        }
    }
}

/// What a caller presents to open a session.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Anonymous,
    UserName { username: String, password: String },
}

impl Credential {
    pub fn user(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential::UserName {
            username: username.into(),
            password: password.into(),
        }
    }

    fn principal(&self) -> Principal {
        match self {
            Credential::Anonymous => Principal::Anonymous,
            Credential::UserName { username, .. } => Principal::User(username.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Anonymous => f.write_str("Anonymous"),
            Credential::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"[redacted]")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    Anonymous,
    User(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => f.write_str("anonymous"),
            Principal::User(name) => f.write_str(name),
        }
    }
}

/// One authenticated interaction context.
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: SessionHandle,
    pub principal: Principal,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub last_activity: Instant,
    pub timeout: Duration,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > self.timeout
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SessionManager
// ────────────────────────────────────────────────────────────────────────────

pub struct SessionManager {
    sessions: DashMap<SessionHandle, Session>,
    /// Admitted sessions; reserved before insert so `max_sessions` holds
    /// under concurrent authentication.
    active: AtomicUsize,
    authenticator: Arc<dyn Authenticator>,
    audit: Arc<dyn AuditSink>,
    policy: SessionPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl SessionManager {
    pub fn new(
        policy: SessionPolicy,
        authenticator: Arc<dyn Authenticator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let limiter = NonZeroU32::new(policy.max_auth_attempts_per_minute)
            .map(|n| RateLimiter::direct(Quota::per_minute(n)));
        Self {
            sessions: DashMap::new(),
            active: AtomicUsize::new(0),
            authenticator,
            audit,
            policy,
            limiter,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Copy of a session without refreshing it.
    pub fn get(&self, handle: &SessionHandle) -> Option<Session> {
        self.sessions.get(handle).map(|s| s.value().clone())
    }

    /// Check `credential` and open a session carrying the matched
    /// permissions.  Every attempt is audited.
    pub fn authenticate(&self, credential: &Credential) -> Result<Session, ArmError> {
        let principal = credential.principal();

        if let Some(limiter) = &self.limiter
            && limiter.check().is_err()
        {
            warn!(principal = %principal, "authentication rate limit exceeded");
            self.audit.record(
                AuditEvent::new(AuditEventKind::AuthenticationFailed, principal.to_string(), false)
                    .detail("rate limit exceeded"),
            );
            return Err(ArmError::TooManyAttempts);
        }

        let permissions = match credential {
            Credential::Anonymous if self.policy.allow_anonymous => {
                Ok(self.policy.anonymous_permissions.clone())
            }
            Credential::Anonymous => Err(ArmError::AuthenticationFailed {
                principal: principal.to_string(),
            }),
            Credential::UserName { username, password } => {
                self.authenticator.authenticate(username, password)
            }
        };
        let permissions = match permissions {
            Ok(p) => p,
            Err(e) => {
                warn!(principal = %principal, error = %e, "authentication failed");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::AuthenticationFailed, principal.to_string(), false)
                        .detail(e.to_string()),
                );
                return Err(e);
            }
        };

        let max = self.policy.max_sessions;
        if self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .is_err()
        {
            let err = ArmError::SessionLimitReached { max };
            warn!(principal = %principal, max, "session limit reached");
            self.audit.record(
                AuditEvent::new(AuditEventKind::AuthenticationFailed, principal.to_string(), false)
                    .detail(err.to_string()),
            );
            return Err(err);
        }

        let session = Session {
            handle: SessionHandle::generate(),
            principal: principal.clone(),
            permissions,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            timeout: self.policy.session_timeout,
        };
        self.sessions.insert(session.handle, session.clone());

        info!(principal = %principal, session = %session.handle, permissions = %session.permissions, "session opened");
        self.audit.record(
            AuditEvent::new(AuditEventKind::AuthenticationSucceeded, principal.to_string(), true)
                .session(session.handle),
        );
        self.audit.record(
            AuditEvent::new(AuditEventKind::SessionOpened, principal.to_string(), true)
                .session(session.handle)
                .detail(format!("permissions {}", session.permissions)),
        );
        Ok(session)
    }

    /// Resolve `handle` to a live session and refresh its activity time.
    ///
    /// An idle session past its timeout is removed and reported as
    /// `SessionExpired`; later calls with the same handle get
    /// `SessionNotFound`.
    pub fn validate(&self, handle: &SessionHandle) -> Result<Session, ArmError> {
        {
            let Some(mut entry) = self.sessions.get_mut(handle) else {
                debug!(session = %handle, "unknown session handle");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::SessionRejected, "unknown", false).session(*handle),
                );
                return Err(ArmError::SessionNotFound(*handle));
            };
            if !entry.is_expired() {
                entry.last_activity = Instant::now();
                return Ok(entry.value().clone());
            }
        }
        self.expire(handle);
        Err(ArmError::SessionExpired(*handle))
    }

    /// Fail with `PermissionDenied` unless `session` holds `required`.
    pub fn authorize(&self, session: &Session, required: Permission) -> Result<(), ArmError> {
        if session.has(required) {
            return Ok(());
        }
        warn!(principal = %session.principal, session = %session.handle, %required, "access denied");
        self.audit.record(
            AuditEvent::new(AuditEventKind::AccessDenied, session.principal.to_string(), false)
                .session(session.handle)
                .detail(format!("'{required}' required")),
        );
        Err(ArmError::PermissionDenied { required })
    }

    /// Remove the session if present.  Returns whether anything was removed.
    pub fn close(&self, handle: &SessionHandle) -> bool {
        match self.sessions.remove(handle) {
            Some((_, session)) => {
                self.active.fetch_sub(1, Ordering::SeqCst);
                info!(principal = %session.principal, session = %handle, "session closed");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::SessionClosed, session.principal.to_string(), true)
                        .session(*handle),
                );
                true
            }
            None => false,
        }
    }

    /// Close every open session, e.g. at shutdown.
    pub fn close_all(&self) -> usize {
        let handles: Vec<SessionHandle> = self.sessions.iter().map(|e| *e.key()).collect();
        handles.iter().filter(|h| self.close(h)).count()
    }

    /// Remove every idle-expired session, auditing each one.
    pub fn sweep_expired(&self) -> Vec<SessionHandle> {
        let candidates: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter(|e| e.is_expired())
            .map(|e| *e.key())
            .collect();
        let expired: Vec<_> = candidates.into_iter().filter(|h| self.expire(h)).collect();
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired sessions");
        }
        expired
    }

    fn expire(&self, handle: &SessionHandle) -> bool {
        match self.sessions.remove_if(handle, |_, s| s.is_expired()) {
            Some((_, session)) => {
                self.active.fetch_sub(1, Ordering::SeqCst);
                info!(principal = %session.principal, session = %handle, "session expired");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::SessionExpired, session.principal.to_string(), true)
                        .session(*handle)
                        .detail(format!("idle longer than {:?}", session.timeout)),
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::user_store::{PasswordPolicy, UserStore};
    use std::thread;

    fn users() -> Arc<UserStore> {
        let mut store = UserStore::new(PasswordPolicy::default());
        store
            .add_user("operator", "operator123", "operator", [Permission::Read].into_iter().collect())
            .unwrap();
        store
            .add_user("admin", "admin123", "admin", PermissionSet::all())
            .unwrap();
        Arc::new(store)
    }

    fn manager(policy: SessionPolicy) -> (SessionManager, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        (SessionManager::new(policy, users(), audit.clone()), audit)
    }

    fn short_timeout() -> SessionPolicy {
        SessionPolicy {
            session_timeout: Duration::from_millis(20),
            ..SessionPolicy::default()
        }
    }

    #[test]
    fn authenticate_copies_user_permissions() {
        let (mgr, audit) = manager(SessionPolicy::default());
        let s = mgr.authenticate(&Credential::user("operator", "operator123")).unwrap();
        assert_eq!(s.principal, Principal::User("operator".into()));
        assert!(s.has(Permission::Read));
        assert!(!s.has(Permission::Write));
        assert_eq!(mgr.len(), 1);
        assert_eq!(audit.count(AuditEventKind::AuthenticationSucceeded), 1);
        assert_eq!(audit.count(AuditEventKind::SessionOpened), 1);
    }

    #[test]
    fn bad_credentials_are_rejected_and_audited() {
        let (mgr, audit) = manager(SessionPolicy::default());
        let err = mgr.authenticate(&Credential::user("operator", "wrong")).unwrap_err();
        assert!(matches!(err, ArmError::AuthenticationFailed { .. }));
        assert!(mgr.is_empty());
        let event = audit.last().unwrap();
        assert_eq!(event.kind, AuditEventKind::AuthenticationFailed);
        assert_eq!(event.principal, "operator");
        assert!(!event.success);
    }

    #[test]
    fn anonymous_follows_policy() {
        let (mgr, _) = manager(SessionPolicy::default());
        assert!(matches!(
            mgr.authenticate(&Credential::Anonymous),
            Err(ArmError::AuthenticationFailed { ref principal }) if principal == "anonymous"
        ));

        let (mgr, _) = manager(SessionPolicy {
            allow_anonymous: true,
            ..SessionPolicy::default()
        });
        let s = mgr.authenticate(&Credential::Anonymous).unwrap();
        assert_eq!(s.principal, Principal::Anonymous);
        assert!(s.has(Permission::Read));
        assert!(!s.has(Permission::Call));
    }

    #[test]
    fn validate_refreshes_activity() {
        let (mgr, _) = manager(short_timeout());
        let s = mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        thread::sleep(Duration::from_millis(10));
        mgr.validate(&s.handle).unwrap();
        thread::sleep(Duration::from_millis(15));
        // 25 ms since creation, but only 15 ms idle.
        assert!(mgr.validate(&s.handle).is_ok());
    }

    #[test]
    fn idle_session_expires_then_disappears() {
        let (mgr, audit) = manager(short_timeout());
        let s = mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        thread::sleep(Duration::from_millis(30));

        assert!(matches!(mgr.validate(&s.handle), Err(ArmError::SessionExpired(h)) if h == s.handle));
        assert!(matches!(mgr.validate(&s.handle), Err(ArmError::SessionNotFound(_))));
        assert!(mgr.is_empty());
        assert_eq!(audit.count(AuditEventKind::SessionExpired), 1);
    }

    #[test]
    fn unknown_handle_is_not_found() {
        let (mgr, audit) = manager(SessionPolicy::default());
        let h = SessionHandle::generate();
        assert!(matches!(mgr.validate(&h), Err(ArmError::SessionNotFound(x)) if x == h));
        assert_eq!(audit.count(AuditEventKind::SessionRejected), 1);
    }

    #[test]
    fn authorize_denies_missing_permission() {
        let (mgr, audit) = manager(SessionPolicy::default());
        let s = mgr.authenticate(&Credential::user("operator", "operator123")).unwrap();
        assert!(mgr.authorize(&s, Permission::Read).is_ok());
        for p in [Permission::Write, Permission::Call, Permission::Admin] {
            assert!(matches!(
                mgr.authorize(&s, p),
                Err(ArmError::PermissionDenied { required }) if required == p
            ));
        }
        assert_eq!(audit.count(AuditEventKind::AccessDenied), 3);
    }

    #[test]
    fn close_is_idempotent() {
        let (mgr, audit) = manager(SessionPolicy::default());
        let s = mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        assert!(mgr.close(&s.handle));
        assert!(!mgr.close(&s.handle));
        assert!(matches!(mgr.validate(&s.handle), Err(ArmError::SessionNotFound(_))));
        assert_eq!(audit.count(AuditEventKind::SessionClosed), 1);
    }

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let (mgr, audit) = manager(short_timeout());
        let old = mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        thread::sleep(Duration::from_millis(30));
        let fresh = mgr.authenticate(&Credential::user("operator", "operator123")).unwrap();

        let swept = mgr.sweep_expired();
        assert_eq!(swept, vec![old.handle]);
        assert!(mgr.get(&fresh.handle).is_some());
        assert!(mgr.get(&old.handle).is_none());
        assert_eq!(audit.count(AuditEventKind::SessionExpired), 1);
        assert!(mgr.sweep_expired().is_empty());
    }

    #[test]
    fn session_limit_is_enforced_and_released() {
        let (mgr, _) = manager(SessionPolicy {
            max_sessions: 2,
            ..SessionPolicy::default()
        });
        let a = mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        assert!(matches!(
            mgr.authenticate(&Credential::user("admin", "admin123")),
            Err(ArmError::SessionLimitReached { max: 2 })
        ));
        mgr.close(&a.handle);
        assert!(mgr.authenticate(&Credential::user("admin", "admin123")).is_ok());
    }

    #[test]
    fn session_limit_holds_under_concurrency() {
        let (mgr, _) = manager(SessionPolicy {
            max_sessions: 5,
            max_auth_attempts_per_minute: 0,
            ..SessionPolicy::default()
        });
        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    let _ = mgr.authenticate(&Credential::user("admin", "admin123"));
                });
            }
        });
        assert_eq!(mgr.len(), 5);
    }

    #[test]
    fn rate_limit_rejects_excess_attempts() {
        let (mgr, audit) = manager(SessionPolicy {
            max_auth_attempts_per_minute: 3,
            ..SessionPolicy::default()
        });
        for _ in 0..3 {
            let _ = mgr.authenticate(&Credential::user("operator", "wrong"));
        }
        assert!(matches!(
            mgr.authenticate(&Credential::user("operator", "operator123")),
            Err(ArmError::TooManyAttempts)
        ));
        assert_eq!(audit.count(AuditEventKind::AuthenticationFailed), 4);
    }

    #[test]
    fn close_all_empties_the_table() {
        let (mgr, _) = manager(SessionPolicy::default());
        for _ in 0..3 {
            mgr.authenticate(&Credential::user("admin", "admin123")).unwrap();
        }
        assert_eq!(mgr.close_all(), 3);
        assert!(mgr.is_empty());
    }

    #[test]
    fn credential_debug_redacts_password() {
        let c = Credential::user("admin", "admin123");
        assert!(!format!("{c:?}").contains("admin123"));
    }
}
