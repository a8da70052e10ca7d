//! [`UserStore`] – credential records and password checks.
//!
//! Passwords are never kept in clear: a record stores the SHA-256 digest of
//! the password as lowercase hex.  New passwords must satisfy the store's
//! [`PasswordPolicy`].

use std::collections::HashMap;
use std::fmt;

use armlink_types::{ArmError, PermissionSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ────────────────────────────────────────────────────────────────────────────
// Password policy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_true")]
    pub require_numbers: bool,
    #[serde(default)]
    pub require_uppercase: bool,
    #[serde(default)]
    pub require_lowercase: bool,
    #[serde(default)]
    pub require_special: bool,
}

fn default_min_length() -> usize {
    8
}
fn default_true() -> bool {
    true
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            require_numbers: true,
            require_uppercase: false,
            require_lowercase: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// A policy that accepts any password.
    pub fn permissive() -> Self {
        Self {
            min_length: 0,
            require_numbers: false,
            ..Self::default()
        }
    }

    pub fn check(&self, password: &str) -> Result<(), ArmError> {
        if password.chars().count() < self.min_length {
            return Err(ArmError::PasswordPolicy(format!(
                "must be at least {} characters",
                self.min_length
            )));
        }
        let requirements = [
            (self.require_numbers, password.chars().any(|c| c.is_ascii_digit()), "a digit"),
            (self.require_uppercase, password.chars().any(char::is_uppercase), "an uppercase letter"),
            (self.require_lowercase, password.chars().any(char::is_lowercase), "a lowercase letter"),
            (
                self.require_special,
                password.chars().any(|c| !c.is_alphanumeric()),
                "a special character",
            ),
        ];
        for (required, present, what) in requirements {
            if required && !present {
                return Err(ArmError::PasswordPolicy(format!("must contain {what}")));
            }
        }
        Ok(())
    }
}

/// SHA-256 of `password`, lowercase hex.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ────────────────────────────────────────────────────────────────────────────
// Records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub permissions: PermissionSet,
    pub description: Option<String>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("password_hash", &"[redacted]")
            .field("role", &self.role)
            .field("permissions", &self.permissions)
            .field("description", &self.description)
            .finish()
    }
}

/// Credential check used by the session manager.
pub trait Authenticator: Send + Sync {
    /// Permissions granted to `username` when `secret` is correct.
    fn authenticate(&self, username: &str, secret: &str) -> Result<PermissionSet, ArmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// UserStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct UserStore {
    users: HashMap<String, UserRecord>,
    policy: PasswordPolicy,
}

impl UserStore {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self {
            users: HashMap::new(),
            policy,
        }
    }

    /// Add a user with a clear-text password, checking it against the
    /// policy and hashing it.
    pub fn add_user(
        &mut self,
        username: &str,
        password: &str,
        role: &str,
        permissions: PermissionSet,
    ) -> Result<(), ArmError> {
        self.policy.check(password)?;
        self.insert(UserRecord {
            username: username.to_string(),
            password_hash: hash_password(password),
            role: role.to_string(),
            permissions,
            description: None,
        })
    }

    /// Add a record whose password is already hashed.
    pub fn insert(&mut self, record: UserRecord) -> Result<(), ArmError> {
        if record.username.is_empty() {
            return Err(ArmError::InvalidArgument("username must not be empty".into()));
        }
        if self.users.contains_key(&record.username) {
            return Err(ArmError::InvalidArgument(format!(
                "user '{}' already exists",
                record.username
            )));
        }
        self.users.insert(record.username.clone(), record);
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }
}

impl Authenticator for UserStore {
    fn authenticate(&self, username: &str, secret: &str) -> Result<PermissionSet, ArmError> {
        let failed = || ArmError::AuthenticationFailed {
            principal: username.to_string(),
        };
        let record = self.users.get(username).ok_or_else(failed)?;
        if !digests_match(&record.password_hash, &hash_password(secret)) {
            return Err(failed());
        }
        Ok(record.permissions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armlink_types::Permission;

    fn store() -> UserStore {
        let mut s = UserStore::new(PasswordPolicy::default());
        s.add_user("operator", "operator123", "operator", [Permission::Read].into_iter().collect())
            .unwrap();
        s.add_user(
            "engineer",
            "engineer123",
            "engineer",
            [Permission::Read, Permission::Write, Permission::Call]
                .into_iter()
                .collect(),
        )
        .unwrap();
        s
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn correct_password_returns_permissions() {
        let perms = store().authenticate("operator", "operator123").unwrap();
        assert!(perms.contains(Permission::Read));
        assert!(!perms.contains(Permission::Write));
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_alike() {
        let s = store();
        assert!(matches!(
            s.authenticate("operator", "nope"),
            Err(ArmError::AuthenticationFailed { ref principal }) if principal == "operator"
        ));
        assert!(matches!(
            s.authenticate("ghost", "operator123"),
            Err(ArmError::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn password_is_not_stored_in_clear() {
        let s = store();
        let record = s.get("operator").unwrap();
        assert_ne!(record.password_hash, "operator123");
        assert!(!format!("{record:?}").contains(&record.password_hash));
    }

    #[test]
    fn policy_rejects_short_or_digitless_passwords() {
        let mut s = UserStore::new(PasswordPolicy::default());
        assert!(matches!(
            s.add_user("a", "short1", "r", PermissionSet::new()),
            Err(ArmError::PasswordPolicy(_))
        ));
        assert!(matches!(
            s.add_user("a", "longenough", "r", PermissionSet::new()),
            Err(ArmError::PasswordPolicy(_))
        ));
        assert!(s.is_empty());
    }

    #[test]
    fn strict_policy_checks_every_class() {
        let policy = PasswordPolicy {
            require_uppercase: true,
            require_lowercase: true,
            require_special: true,
            ..PasswordPolicy::default()
        };
        assert!(policy.check("abcdefg1").is_err());
        assert!(policy.check("Abcdefg1").is_err());
        assert!(policy.check("Abcdef1!").is_ok());
        assert!(PasswordPolicy::permissive().check("").is_ok());
    }

    #[test]
    fn duplicate_user_is_rejected() {
        let mut s = store();
        assert!(matches!(
            s.add_user("operator", "another123", "operator", PermissionSet::new()),
            Err(ArmError::InvalidArgument(_))
        ));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: PasswordPolicy = serde_json::from_str(r#"{"require_special": true}"#).unwrap();
        assert_eq!(policy.min_length, 8);
        assert!(policy.require_numbers);
        assert!(policy.require_special);
    }
}
