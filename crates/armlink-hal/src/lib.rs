//! `armlink-hal` – the device model.
//!
//! Owns the simulated six-axis arm and the rules that guard its motion.  It
//! has no notion of nodes, sessions, or the network; the address space hooks
//! in through the [`StateObserver`] seam.
//!
//! # Modules
//!
//! - [`robot`] – [`Robot`]: joint positions, the moving flag, and the
//!   bounds-checked `move_to` / `move_home` transitions.
//! - [`rules`] – [`MotionVerifier`][rules::MotionVerifier]: ordered
//!   [`MotionRule`][rules::MotionRule]s evaluated before any assignment.

pub mod robot;
pub mod rules;

pub use robot::{Robot, RobotConfig, RobotStatus, StateObserver, joint_names};
pub use rules::{ArityRule, JointBoundsRule, JointLimitRule, MotionRule, MotionVerifier};
