//! Robot ↔ address-space wiring.
//!
//! [`RobotNodes`] resolves, once, every node of an arm subtree that other
//! components touch.  [`SpaceBinding`] is the robot's [`StateObserver`]: it
//! runs under the robot's write lock and pushes positions and the moving
//! flag into the bound variables in a single value-table update.

use std::sync::Arc;

use armlink_hal::{Robot, StateObserver};
use armlink_types::{ArmError, DataType, NodeId, Variant};
use tracing::error;

use crate::address_space::AddressSpace;
use crate::node::NodeClass;
use crate::robot_model::{
    CURRENT_POSITION, IS_MOVING, MOVE_HOME, MOVE_TO_POSITION, OPERATING_MODE, SPEED_OVERRIDE,
};

#[derive(Debug, Clone, PartialEq)]
pub struct JointNodes {
    pub name: String,
    pub object: NodeId,
    pub current_position: NodeId,
}

/// Resolved node ids of one arm.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotNodes {
    pub object: NodeId,
    pub joints: Vec<JointNodes>,
    pub is_moving: NodeId,
    pub move_to_position: NodeId,
    pub move_home: NodeId,
    pub operating_mode: NodeId,
    pub speed_override: NodeId,
}

impl RobotNodes {
    /// Look up every expected child of `object` by browse name and check its
    /// node class and data type.
    pub fn resolve(space: &AddressSpace, object: &NodeId, joint_names: &[String]) -> Result<Self, ArmError> {
        let joints = joint_names
            .iter()
            .map(|name| {
                let joint = space.get_child_by_name(object, name)?.id.clone();
                let current_position = expect_variable(space, &joint, CURRENT_POSITION, DataType::Double)?;
                Ok(JointNodes {
                    name: name.clone(),
                    object: joint,
                    current_position,
                })
            })
            .collect::<Result<Vec<_>, ArmError>>()?;

        Ok(Self {
            object: object.clone(),
            joints,
            is_moving: expect_variable(space, object, IS_MOVING, DataType::Boolean)?,
            move_to_position: expect_method(space, object, MOVE_TO_POSITION)?,
            move_home: expect_method(space, object, MOVE_HOME)?,
            operating_mode: expect_variable(space, object, OPERATING_MODE, DataType::String)?,
            speed_override: expect_variable(space, object, SPEED_OVERRIDE, DataType::Double)?,
        })
    }

    pub fn position_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.joints.iter().map(|j| &j.current_position)
    }
}

fn expect_variable(
    space: &AddressSpace,
    parent: &NodeId,
    name: &str,
    data_type: DataType,
) -> Result<NodeId, ArmError> {
    let node = space.get_child_by_name(parent, name)?;
    match node.as_variable() {
        Some(var) if var.data_type == data_type => Ok(node.id.clone()),
        Some(var) => Err(ArmError::TypeMismatch {
            expected: data_type,
            actual: var.data_type,
        }),
        None => Err(ArmError::InvalidNodeClass {
            node: node.id.clone(),
            expected: NodeClass::Variable.to_string(),
        }),
    }
}

fn expect_method(space: &AddressSpace, parent: &NodeId, name: &str) -> Result<NodeId, ArmError> {
    let node = space.get_child_by_name(parent, name)?;
    if node.class() != NodeClass::Method {
        return Err(ArmError::InvalidNodeClass {
            node: node.id.clone(),
            expected: NodeClass::Method.to_string(),
        });
    }
    Ok(node.id.clone())
}

// ────────────────────────────────────────────────────────────────────────────
// SpaceBinding
// ────────────────────────────────────────────────────────────────────────────

pub struct SpaceBinding {
    space: Arc<AddressSpace>,
    positions: Vec<NodeId>,
    is_moving: NodeId,
}

impl SpaceBinding {
    pub fn new(space: Arc<AddressSpace>, nodes: &RobotNodes) -> Self {
        Self {
            space,
            positions: nodes.position_ids().cloned().collect(),
            is_moving: nodes.is_moving.clone(),
        }
    }
}

impl StateObserver for SpaceBinding {
    fn publish(&self, positions: &[f64], moving: bool) {
        let mut updates: Vec<(NodeId, Variant)> = self
            .positions
            .iter()
            .zip(positions)
            .map(|(id, p)| (id.clone(), Variant::Double(*p)))
            .collect();
        updates.push((self.is_moving.clone(), Variant::Boolean(moving)));

        if let Err(e) = self.space.set_values(&updates) {
            error!(error = %e, "failed to publish robot state to address space");
        }
    }
}

/// Attach `robot` to its resolved nodes.  The current state is published
/// immediately, so the variables are correct before the first request.
pub fn bind_robot(space: &Arc<AddressSpace>, nodes: &RobotNodes, robot: &Robot) -> Result<(), ArmError> {
    if robot.joint_count() != nodes.joints.len() {
        return Err(ArmError::ArityMismatch {
            expected: nodes.joints.len(),
            actual: robot.joint_count(),
        });
    }
    robot.attach(Arc::new(SpaceBinding::new(Arc::clone(space), nodes)));
    Ok(())
}
