//! Configuration vault – reads/writes `~/.armlink/config.toml`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use armlink_hal::{RobotConfig, joint_names};
use armlink_kernel::{PasswordPolicy, SessionPolicy, UserRecord, UserStore, hash_password};
use armlink_types::{Permission, PermissionSet};
use serde::{Deserialize, Serialize};

/// Persisted deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub robot: RobotSection,
    #[serde(default)]
    pub security: SecuritySection,
}

// ────────────────────────────────────────────────────────────────────────────
// [robot]
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSection {
    #[serde(default = "default_robot_name")]
    pub name: String,
    #[serde(default = "default_joint_count")]
    pub joint_count: usize,
    /// Empty means `Joint1` … `JointN`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joint_names: Vec<String>,
    /// Empty means all zeros.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_positions: Vec<f64>,
    #[serde(default = "default_min_position")]
    pub min_position: f64,
    #[serde(default = "default_max_position")]
    pub max_position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

fn default_robot_name() -> String {
    "Robot".to_string()
}
fn default_joint_count() -> usize {
    6
}
fn default_min_position() -> f64 {
    -180.0
}
fn default_max_position() -> f64 {
    180.0
}

impl Default for RobotSection {
    fn default() -> Self {
        Self {
            name: default_robot_name(),
            joint_count: default_joint_count(),
            joint_names: Vec::new(),
            default_positions: Vec::new(),
            min_position: default_min_position(),
            max_position: default_max_position(),
            manufacturer: None,
            serial_number: None,
        }
    }
}

impl RobotSection {
    /// Expand into a [`RobotConfig`].  Consistency is checked later, when the
    /// server is built.
    pub fn to_robot_config(&self) -> RobotConfig {
        let joint_names = if self.joint_names.is_empty() {
            joint_names(self.joint_count)
        } else {
            self.joint_names.clone()
        };
        let default_positions = if self.default_positions.is_empty() {
            vec![0.0; self.joint_count]
        } else {
            self.default_positions.clone()
        };
        RobotConfig {
            name: self.name.clone(),
            joint_names,
            default_positions,
            min_position: self.min_position,
            max_position: self.max_position,
            manufacturer: self.manufacturer.clone(),
            serial_number: self.serial_number.clone(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// [security]
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default = "default_anonymous_permissions")]
    pub anonymous_permissions: PermissionSet,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    #[serde(default = "default_max_auth_attempts")]
    pub max_auth_attempts_per_minute: u32,
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    #[serde(default = "default_users")]
    pub users: Vec<UserEntry>,
}

fn default_anonymous_permissions() -> PermissionSet {
    [Permission::Read].into_iter().collect()
}
fn default_session_timeout_ms() -> u64 {
    30_000
}
fn default_max_sessions() -> usize {
    100
}
fn default_sweep_interval_ms() -> u64 {
    5_000
}
fn default_max_auth_attempts() -> u32 {
    30
}
fn default_users() -> Vec<UserEntry> {
    vec![
        UserEntry::new("operator", "operator123", "operator", [Permission::Read])
            .described("Monitor joint positions"),
        UserEntry::new(
            "engineer",
            "engineer123",
            "engineer",
            [Permission::Read, Permission::Write, Permission::Call],
        )
        .described("Jog and configure the arm"),
        UserEntry::new("admin", "admin123", "admin", Permission::ALL)
            .described("Full access"),
    ]
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            allow_anonymous: false,
            anonymous_permissions: default_anonymous_permissions(),
            session_timeout_ms: default_session_timeout_ms(),
            max_sessions: default_max_sessions(),
            sweep_interval_ms: default_sweep_interval_ms(),
            max_auth_attempts_per_minute: default_max_auth_attempts(),
            password_policy: PasswordPolicy::default(),
            users: default_users(),
        }
    }
}

impl SecuritySection {
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            allow_anonymous: self.allow_anonymous,
            anonymous_permissions: self.anonymous_permissions.clone(),
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            max_sessions: self.max_sessions,
            max_auth_attempts_per_minute: self.max_auth_attempts_per_minute,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Hash every configured password into a [`UserStore`], enforcing the
    /// password policy.
    pub fn user_store(&self) -> Result<UserStore, String> {
        let mut store = UserStore::new(self.password_policy.clone());
        for user in &self.users {
            self.password_policy
                .check(&user.password)
                .map_err(|e| format!("user '{}': {e}", user.username))?;
            store
                .insert(UserRecord {
                    username: user.username.clone(),
                    password_hash: hash_password(&user.password),
                    role: user.role.clone(),
                    permissions: user.permissions.clone(),
                    description: user.description.clone(),
                })
                .map_err(|e| e.to_string())?;
        }
        Ok(store)
    }
}

/// One `[[security.users]]` record.  The password is kept in clear text in
/// the file; restrict its permissions.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: PermissionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UserEntry {
    pub fn new(
        username: &str,
        password: &str,
        role: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role: role.to_string(),
            permissions: permissions.into_iter().collect(),
            description: None,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

impl fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserEntry")
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("role", &self.role)
            .field("permissions", &self.permissions)
            .field("description", &self.description)
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loading and saving
// ────────────────────────────────────────────────────────────────────────────

/// `ARMLINK_CONFIG` when set, otherwise `~/.armlink/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ARMLINK_CONFIG")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".armlink").join("config.toml")
}

/// Load the config from `path`, with environment overrides applied.
/// Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ARMLINK_*` environment overrides.  Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARMLINK_SESSION_TIMEOUT_MS` | `security.session_timeout_ms` |
/// | `ARMLINK_ALLOW_ANONYMOUS` | `security.allow_anonymous` |
/// | `ARMLINK_JOINT_COUNT` | `robot.joint_count` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARMLINK_SESSION_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.security.session_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("ARMLINK_ALLOW_ANONYMOUS")
        && let Ok(allow) = v.parse::<bool>()
    {
        cfg.security.allow_anonymous = allow;
    }
    if let Ok(v) = std::env::var("ARMLINK_JOINT_COUNT")
        && let Ok(count) = v.parse::<usize>()
    {
        cfg.robot.joint_count = count;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
