//! [`RobotServer`] – wires the address space, robot, session manager, and
//! dispatcher together.
//!
//! Construction order: types → address space → robot bound to its variable
//! nodes → session manager over the user store → dispatcher.  Any missing
//! node or inconsistent configuration fails [`RobotServerBuilder::build`].

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use armlink_hal::{MotionRule, Robot, RobotConfig};
use armlink_kernel::{AuditSink, Authenticator, SessionManager, SessionPolicy, TracingAuditSink};
use armlink_space::{AddressSpace, RobotNodes, bind_robot, build_robot};
use armlink_types::{ArmError, NodeId};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::dispatcher::ServiceDispatcher;

/// Default period of the expired-session sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(5_000);

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

pub struct RobotServerBuilder {
    robot: RobotConfig,
    policy: SessionPolicy,
    authenticator: Arc<dyn Authenticator>,
    audit: Arc<dyn AuditSink>,
    sweep_interval: Duration,
    rules: Vec<Box<dyn MotionRule>>,
}

impl RobotServerBuilder {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            robot: RobotConfig::default(),
            policy: SessionPolicy::default(),
            authenticator,
            audit: Arc::new(TracingAuditSink),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            rules: Vec::new(),
        }
    }

    pub fn robot(mut self, config: RobotConfig) -> Self {
        self.robot = config;
        self
    }

    pub fn policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Extra motion rule, checked after the robot's arity and bounds rules.
    pub fn rule(mut self, rule: Box<dyn MotionRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> Result<RobotServer, ArmError> {
        if self.sweep_interval.is_zero() {
            return Err(ArmError::InvalidArgument("sweep interval must be non-zero".into()));
        }

        let mut space = AddressSpace::new();
        let nodes = build_robot(&mut space, &self.robot)?;
        let space = Arc::new(space);

        let robot = self
            .rules
            .into_iter()
            .try_fold(Robot::new(self.robot)?, |robot, rule| {
                Ok::<_, ArmError>(robot.with_rule(rule))
            })?;
        let robot = Arc::new(robot);
        bind_robot(&space, &nodes, &robot)?;

        let sessions = Arc::new(SessionManager::new(
            self.policy,
            self.authenticator,
            Arc::clone(&self.audit),
        ));
        let dispatcher = ServiceDispatcher::new(Arc::clone(&space), Arc::clone(&sessions), self.audit)
            .with_device(nodes.object.clone(), Arc::clone(&robot));

        info!(
            robot = %robot.name(),
            nodes = space.len(),
            types = space.types().len(),
            "robot server ready"
        );
        Ok(RobotServer {
            dispatcher: Arc::new(dispatcher),
            space,
            sessions,
            robot,
            nodes,
            sweep_interval: self.sweep_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RobotServer
// ────────────────────────────────────────────────────────────────────────────

pub struct RobotServer {
    dispatcher: Arc<ServiceDispatcher>,
    space: Arc<AddressSpace>,
    sessions: Arc<SessionManager>,
    robot: Arc<Robot>,
    nodes: RobotNodes,
    sweep_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl RobotServer {
    pub fn builder(authenticator: Arc<dyn Authenticator>) -> RobotServerBuilder {
        RobotServerBuilder::new(authenticator)
    }

    /// Entry point for the transport.
    pub fn dispatcher(&self) -> Arc<ServiceDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn nodes(&self) -> &RobotNodes {
        &self.nodes
    }

    /// Start the periodic expired-session sweep.  The task ends after
    /// [`RobotServer::shutdown`] or when the handle is aborted.
    pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let shutdown = Arc::clone(&self.shutdown);
        let period = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::Acquire) {
                    debug!("session sweeper stopping");
                    break;
                }
                sessions.sweep_expired();
            }
        })
    }

    /// Stop the sweeper and close every open session.  Returns how many
    /// sessions were closed.
    pub fn shutdown(&self) -> usize {
        self.shutdown.store(true, Ordering::Release);
        let closed = self.sessions.close_all();
        info!(closed, "robot server shut down");
        closed
    }

    /// Indented outline of the `Objects` subtree, one node per line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        render(&self.space, &armlink_types::well_known::OBJECTS_FOLDER, 0, &mut out);
        out
    }
}

fn render(space: &AddressSpace, id: &NodeId, depth: usize, out: &mut String) {
    let Ok(node) = space.find(id) else {
        return;
    };
    let _ = writeln!(
        out,
        "{:indent$}{} [{}] {}",
        "",
        node.browse_name,
        node.class(),
        node.id,
        indent = depth * 2
    );
    let Ok(children) = space.browse_children(id) else {
        return;
    };
    for (kind, child) in children {
        if kind.is_hierarchical() {
            render(space, &child.id, depth + 1, out);
        }
    }
}
