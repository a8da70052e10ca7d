//! [`Robot`] – the six-axis arm simulation.
//!
//! The robot is a two-state machine (Idle / Moving) over a fixed-length
//! vector of joint positions.  All state lives behind one
//! [`parking_lot::RwLock`]:
//!
//! * [`Robot::move_to`] holds the write lock for validation, assignment, and
//!   observer propagation, so concurrent moves are serialized and no reader
//!   ever sees a half-written vector.
//! * [`Robot::read_position`], [`Robot::positions`], and [`Robot::status`]
//!   take the read lock.
//!
//! Motion is instantaneous: `is_moving` is `true` only while the write lock
//! is held, so observers see a `true` publish followed by a `false` one, and
//! lock-free pollers never see it set.

use std::sync::Arc;

use armlink_types::ArmError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::rules::{ArityRule, JointBoundsRule, MotionRule, MotionVerifier};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Static description of an arm: joint naming, home pose, and travel range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Browse name of the arm object, e.g. `"Robot"`.
    #[serde(default = "default_name")]
    pub name: String,
    /// One name per joint, in joint order.
    #[serde(default = "default_joint_names")]
    pub joint_names: Vec<String>,
    /// Home pose, one entry per joint.
    #[serde(default = "default_positions")]
    pub default_positions: Vec<f64>,
    /// Lower travel bound in degrees, shared by all joints.
    #[serde(default = "default_min")]
    pub min_position: f64,
    /// Upper travel bound in degrees, shared by all joints.
    #[serde(default = "default_max")]
    pub max_position: f64,
    /// Nameplate data; exposed as `Manufacturer` / `SerialNumber` when set.
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

const DEFAULT_JOINT_COUNT: usize = 6;

fn default_name() -> String {
    "Robot".to_string()
}
fn default_joint_names() -> Vec<String> {
    joint_names(DEFAULT_JOINT_COUNT)
}
fn default_positions() -> Vec<f64> {
    vec![0.0; DEFAULT_JOINT_COUNT]
}
fn default_min() -> f64 {
    -180.0
}
fn default_max() -> f64 {
    180.0
}

/// `Joint1` … `JointN`.
pub fn joint_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Joint{i}")).collect()
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            joint_names: default_joint_names(),
            default_positions: default_positions(),
            min_position: default_min(),
            max_position: default_max(),
            manufacturer: None,
            serial_number: None,
        }
    }
}

impl RobotConfig {
    /// Default configuration resized to `count` joints, homed at zero.
    pub fn with_joint_count(count: usize) -> Self {
        Self {
            joint_names: joint_names(count),
            default_positions: vec![0.0; count],
            ..Self::default()
        }
    }

    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }

    /// Check internal consistency: non-empty, names and home pose agree on
    /// the joint count, the range is ordered, and the home pose is in range.
    pub fn validate(&self) -> Result<(), ArmError> {
        if self.joint_names.is_empty() {
            return Err(ArmError::InvalidArgument(
                "robot must have at least one joint".to_string(),
            ));
        }
        if self.default_positions.len() != self.joint_names.len() {
            return Err(ArmError::ArityMismatch {
                expected: self.joint_names.len(),
                actual: self.default_positions.len(),
            });
        }
        if !(self.min_position <= self.max_position) {
            return Err(ArmError::InvalidArgument(format!(
                "min_position {} exceeds max_position {}",
                self.min_position, self.max_position
            )));
        }
        JointBoundsRule {
            min: self.min_position,
            max: self.max_position,
        }
        .check(&self.default_positions)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Observer seam
// ────────────────────────────────────────────────────────────────────────────

/// Receives every state change while the robot's write lock is held.
///
/// The address space implements this to keep its bound variables in step
/// with the device; the robot itself knows nothing about nodes.
pub trait StateObserver: Send + Sync {
    fn publish(&self, positions: &[f64], moving: bool);
}

// ────────────────────────────────────────────────────────────────────────────
// Robot
// ────────────────────────────────────────────────────────────────────────────

/// Point-in-time copy of the robot state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    pub positions: Vec<f64>,
    pub is_moving: bool,
    pub timestamp: DateTime<Utc>,
}

struct Inner {
    positions: Vec<f64>,
    moving: bool,
    observers: Vec<Arc<dyn StateObserver>>,
}

impl Inner {
    fn notify(&self) {
        for observer in &self.observers {
            observer.publish(&self.positions, self.moving);
        }
    }
}

/// The simulated arm.
///
/// ```
/// use armlink_hal::{Robot, RobotConfig};
///
/// let robot = Robot::new(RobotConfig::default()).unwrap();
/// robot.move_to(&[45.0, -30.0, 60.0, 0.0, -45.0, 90.0]).unwrap();
/// assert_eq!(robot.read_position(2).unwrap(), 60.0);
/// assert!(robot.move_to(&[200.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
/// ```
pub struct Robot {
    config: RobotConfig,
    verifier: MotionVerifier,
    inner: RwLock<Inner>,
}

impl Robot {
    /// Build a robot at its home pose.  Fails when `config` is inconsistent.
    pub fn new(config: RobotConfig) -> Result<Self, ArmError> {
        config.validate()?;
        let mut verifier = MotionVerifier::new();
        verifier.add_rule(Box::new(ArityRule {
            joint_count: config.joint_count(),
        }));
        verifier.add_rule(Box::new(JointBoundsRule {
            min: config.min_position,
            max: config.max_position,
        }));
        let positions = config.default_positions.clone();
        Ok(Self {
            config,
            verifier,
            inner: RwLock::new(Inner {
                positions,
                moving: false,
                observers: Vec::new(),
            }),
        })
    }

    /// Add an extra motion rule, evaluated after the built-in arity and
    /// bounds checks.
    pub fn with_rule(mut self, rule: Box<dyn MotionRule>) -> Self {
        self.verifier.add_rule(rule);
        self
    }

    /// Register an observer and immediately publish the current state to it.
    pub fn attach(&self, observer: Arc<dyn StateObserver>) {
        let mut inner = self.inner.write();
        observer.publish(&inner.positions, inner.moving);
        inner.observers.push(observer);
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn joint_count(&self) -> usize {
        self.config.joint_count()
    }

    /// Current position of joint `index`.
    pub fn read_position(&self, index: usize) -> Result<f64, ArmError> {
        let inner = self.inner.read();
        inner
            .positions
            .get(index)
            .copied()
            .ok_or(ArmError::IndexOutOfRange {
                index,
                count: inner.positions.len(),
            })
    }

    /// Snapshot of every joint position.
    pub fn positions(&self) -> Vec<f64> {
        self.inner.read().positions.clone()
    }

    pub fn is_moving(&self) -> bool {
        self.inner.read().moving
    }

    pub fn status(&self) -> RobotStatus {
        let inner = self.inner.read();
        RobotStatus {
            positions: inner.positions.clone(),
            is_moving: inner.moving,
            timestamp: Utc::now(),
        }
    }

    /// Move every joint to `targets` in one step.
    ///
    /// Validation happens before any assignment; on error nothing changes
    /// and observers are not notified.  On success the new vector is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`ArmError::ArityMismatch`] – `targets.len()` differs from the joint count.
    /// - [`ArmError::OutOfBounds`] – the first joint whose target is out of range.
    pub fn move_to(&self, targets: &[f64]) -> Result<Vec<f64>, ArmError> {
        let mut inner = self.inner.write();

        if let Err(e) = self.verifier.verify(targets) {
            warn!(robot = %self.config.name, error = %e, "move rejected");
            return Err(e);
        }

        inner.moving = true;
        inner.notify();
        debug!(robot = %self.config.name, ?targets, "move started");

        inner.positions = targets.to_vec();
        inner.moving = false;
        inner.notify();

        info!(robot = %self.config.name, positions = ?inner.positions, "move completed");
        Ok(inner.positions.clone())
    }

    /// Move back to the configured home pose.
    pub fn move_home(&self) -> Result<Vec<f64>, ArmError> {
        self.move_to(&self.config.default_positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    const TARGET: [f64; 6] = [45.0, -30.0, 60.0, 0.0, -45.0, 90.0];

    fn robot() -> Robot {
        Robot::new(RobotConfig::default()).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<(Vec<f64>, bool)>>,
    }

    impl StateObserver for Recorder {
        fn publish(&self, positions: &[f64], moving: bool) {
            self.log.lock().push((positions.to_vec(), moving));
        }
    }

    #[test]
    fn starts_at_home_and_idle() {
        let r = robot();
        assert_eq!(r.positions(), vec![0.0; 6]);
        assert!(!r.is_moving());
        assert_eq!(r.joint_count(), 6);
        assert_eq!(r.name(), "Robot");
    }

    #[test]
    fn read_position_round_trips_exactly() {
        let r = robot();
        let targets = [0.1, -179.999, 1e-9, 33.333333333333336, -0.0, 180.0];
        r.move_to(&targets).unwrap();
        for (i, expected) in targets.iter().enumerate() {
            assert_eq!(r.read_position(i).unwrap().to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn read_position_rejects_bad_index() {
        let r = robot();
        assert!(matches!(
            r.read_position(6),
            Err(ArmError::IndexOutOfRange { index: 6, count: 6 })
        ));
    }

    #[test]
    fn move_to_returns_new_vector() {
        let r = robot();
        let result = r.move_to(&TARGET).unwrap();
        assert_eq!(result, TARGET.to_vec());
        assert!(!r.is_moving());
    }

    #[test]
    fn out_of_bounds_leaves_state_unchanged() {
        let r = robot();
        r.move_to(&TARGET).unwrap();
        let result = r.move_to(&[0.0, 0.0, 0.0, 200.0, 0.0, -200.0]);
        assert!(matches!(
            result,
            Err(ArmError::OutOfBounds { joint: 3, min, max, .. }) if min == -180.0 && max == 180.0
        ));
        assert_eq!(r.positions(), TARGET.to_vec());
    }

    #[test]
    fn wrong_length_leaves_state_unchanged() {
        let r = robot();
        let result = r.move_to(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(ArmError::ArityMismatch {
                expected: 6,
                actual: 3
            })
        ));
        assert_eq!(r.positions(), vec![0.0; 6]);
    }

    #[test]
    fn move_home_restores_default_pose() {
        let config = RobotConfig {
            default_positions: vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
            ..RobotConfig::default()
        };
        let r = Robot::new(config).unwrap();
        r.move_to(&TARGET).unwrap();
        let home = r.move_home().unwrap();
        assert_eq!(home, vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        assert_eq!(r.positions(), home);
    }

    #[test]
    fn observer_sees_moving_then_idle() {
        let r = robot();
        let recorder = Arc::new(Recorder::default());
        r.attach(recorder.clone());
        r.move_to(&TARGET).unwrap();

        let log = recorder.log.lock();
        assert_eq!(log.len(), 3, "initial publish + moving + idle");
        assert_eq!(log[0], (vec![0.0; 6], false));
        assert!(log[1].1, "second publish reports moving");
        assert_eq!(log[2], (TARGET.to_vec(), false));
    }

    #[test]
    fn rejected_move_does_not_notify() {
        let r = robot();
        let recorder = Arc::new(Recorder::default());
        r.attach(recorder.clone());
        let _ = r.move_to(&[500.0; 6]);
        assert_eq!(recorder.log.lock().len(), 1);
    }

    #[test]
    fn extra_rule_is_enforced() {
        use crate::rules::JointLimitRule;
        let r = robot().with_rule(Box::new(JointLimitRule {
            joint: 0,
            min: -10.0,
            max: 10.0,
        }));
        assert!(r.move_to(&[5.0, 170.0, 0.0, 0.0, 0.0, 0.0]).is_ok());
        assert!(matches!(
            r.move_to(&[45.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Err(ArmError::OutOfBounds { joint: 0, .. })
        ));
    }

    #[test]
    fn concurrent_readers_never_see_mixed_vectors() {
        let r = robot();
        let a = vec![1.0; 6];
        let b = vec![-1.0; 6];

        thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2_000 {
                    let t = if i % 2 == 0 { &a } else { &b };
                    r.move_to(t).unwrap();
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..2_000 {
                        let snapshot = r.positions();
                        let first = snapshot[0];
                        assert!(
                            snapshot.iter().all(|v| *v == first),
                            "mixed vector observed: {snapshot:?}"
                        );
                    }
                });
            }
        });
    }

    #[test]
    fn config_validation_catches_inconsistencies() {
        let mut c = RobotConfig::default();
        c.default_positions.pop();
        assert!(matches!(c.validate(), Err(ArmError::ArityMismatch { .. })));

        let mut c = RobotConfig::default();
        c.default_positions[2] = 500.0;
        assert!(matches!(c.validate(), Err(ArmError::OutOfBounds { joint: 2, .. })));

        let c = RobotConfig {
            min_position: 10.0,
            max_position: -10.0,
            ..RobotConfig::with_joint_count(1)
        };
        assert!(c.validate().is_err());

        assert!(RobotConfig::with_joint_count(0).validate().is_err());
        assert!(Robot::new(RobotConfig::with_joint_count(3)).is_ok());
    }

    #[test]
    fn status_reports_snapshot() {
        let r = robot();
        r.move_to(&TARGET).unwrap();
        let status = r.status();
        assert_eq!(status.positions, TARGET.to_vec());
        assert!(!status.is_moving);
    }
}
