//! [`MotionVerifier`] – safety interlock for joint targets.
//!
//! Every target vector handed to [`Robot::move_to`][crate::Robot::move_to] is
//! passed through [`MotionVerifier::verify`] before anything is assigned.
//! Registered [`MotionRule`]s run in insertion order and the first violation
//! is returned.
//!
//! Built-in rules:
//! - [`ArityRule`] – the vector must have exactly one entry per joint.
//! - [`JointBoundsRule`] – every entry must lie in the arm-wide range.
//! - [`JointLimitRule`] – one joint gets a tighter range of its own.

use armlink_types::ArmError;

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single physical invariant that a target vector must satisfy.
pub trait MotionRule: Send + Sync {
    /// Human-readable name used in log lines.
    fn name(&self) -> &str;

    /// Return `Ok(())` when `targets` satisfies the invariant.
    fn check(&self, targets: &[f64]) -> Result<(), ArmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// MotionVerifier
// ────────────────────────────────────────────────────────────────────────────

/// Ordered collection of [`MotionRule`]s.
///
/// ```
/// use armlink_hal::rules::{ArityRule, JointBoundsRule, MotionVerifier};
///
/// let mut verifier = MotionVerifier::new();
/// verifier.add_rule(Box::new(ArityRule { joint_count: 2 }));
/// verifier.add_rule(Box::new(JointBoundsRule { min: -180.0, max: 180.0 }));
///
/// assert!(verifier.verify(&[10.0, -10.0]).is_ok());
/// assert!(verifier.verify(&[10.0]).is_err());
/// assert!(verifier.verify(&[10.0, 190.0]).is_err());
/// ```
#[derive(Default)]
pub struct MotionVerifier {
    rules: Vec<Box<dyn MotionRule>>,
}

impl MotionVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn MotionRule>) {
        self.rules.push(rule);
    }

    /// Validate `targets` against every rule, returning the first violation.
    pub fn verify(&self, targets: &[f64]) -> Result<(), ArmError> {
        for rule in &self.rules {
            if let Err(e) = rule.check(targets) {
                tracing::debug!(rule = rule.name(), error = %e, "motion rule rejected targets");
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Rejects vectors whose length differs from the joint count.
pub struct ArityRule {
    pub joint_count: usize,
}

impl MotionRule for ArityRule {
    fn name(&self) -> &str {
        "arity"
    }

    fn check(&self, targets: &[f64]) -> Result<(), ArmError> {
        if targets.len() != self.joint_count {
            return Err(ArmError::ArityMismatch {
                expected: self.joint_count,
                actual: targets.len(),
            });
        }
        Ok(())
    }
}

/// Rejects any entry outside `[min, max]` (inclusive), naming the first
/// offending joint.  NaN is never inside the range.
pub struct JointBoundsRule {
    pub min: f64,
    pub max: f64,
}

impl MotionRule for JointBoundsRule {
    fn name(&self) -> &str {
        "joint_bounds"
    }

    fn check(&self, targets: &[f64]) -> Result<(), ArmError> {
        let range = self.min..=self.max;
        match targets.iter().position(|v| !range.contains(v)) {
            Some(joint) => Err(ArmError::OutOfBounds {
                joint,
                value: targets[joint],
                min: self.min,
                max: self.max,
            }),
            None => Ok(()),
        }
    }
}

/// Tighter range for a single joint, e.g. a wrist with a cable wrap.
pub struct JointLimitRule {
    pub joint: usize,
    pub min: f64,
    pub max: f64,
}

impl MotionRule for JointLimitRule {
    fn name(&self) -> &str {
        "joint_limit"
    }

    fn check(&self, targets: &[f64]) -> Result<(), ArmError> {
        if let Some(&value) = targets.get(self.joint)
            && !(self.min..=self.max).contains(&value)
        {
            return Err(ArmError::OutOfBounds {
                joint: self.joint,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}
