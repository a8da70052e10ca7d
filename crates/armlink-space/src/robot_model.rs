//! Robot nodeset: the arm's type definitions and its instantiation script.
//!
//! ```text
//! Objects
//! └── Robot                      RobotArmType
//!     ├── IsMoving               Boolean, ReadOnly
//!     ├── MoveToPosition()       in: Double[N]  out: Boolean
//!     ├── MoveHome()             out: Boolean
//!     ├── Manufacturer           String, ReadOnly   (optional)
//!     ├── SerialNumber           String, ReadOnly   (optional)
//!     ├── Joint1 … JointN        JointType
//!     │   ├── CurrentPosition    PositionType (Double, ReadOnly)
//!     │   └── EngineeringUnits   String, ReadOnly
//!     ├── OperatingMode          String, ReadWrite  (ad hoc)
//!     └── SpeedOverride          Double, ReadWrite  (ad hoc)
//! ```

use armlink_hal::RobotConfig;
use armlink_types::{ArmError, DataType, QualifiedName, Variant, well_known};
use tracing::info;

use crate::address_space::{AddressSpace, INSTANCE_NAMESPACE, VariableSpec};
use crate::binding::RobotNodes;
use crate::method::{Argument, MethodContext};
use crate::node::AccessLevel;
use crate::type_registry::{MethodDeclaration, SlotKind, TypeDefinition};

pub const POSITION_TYPE: &str = "PositionType";
pub const JOINT_TYPE: &str = "JointType";
pub const MOTION_DEVICE_TYPE: &str = "MotionDeviceType";
pub const ROBOT_ARM_TYPE: &str = "RobotArmType";

pub const IS_MOVING: &str = "IsMoving";
pub const MOVE_TO_POSITION: &str = "MoveToPosition";
pub const MOVE_HOME: &str = "MoveHome";
pub const CURRENT_POSITION: &str = "CurrentPosition";
pub const ENGINEERING_UNITS: &str = "EngineeringUnits";
pub const MANUFACTURER: &str = "Manufacturer";
pub const SERIAL_NUMBER: &str = "SerialNumber";
pub const OPERATING_MODE: &str = "OperatingMode";
pub const SPEED_OVERRIDE: &str = "SpeedOverride";

pub fn type_name(name: &str) -> QualifiedName {
    QualifiedName::new(INSTANCE_NAMESPACE, name)
}

fn read_only(data_type: DataType, initial: Variant) -> SlotKind {
    SlotKind::Variable {
        data_type,
        access_level: AccessLevel::ReadOnly,
        initial,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Register the arm types for a `joint_count`-joint robot.
///
/// Several robots may share one space as long as they agree on the joint
/// count, since `MoveToPosition` declares a fixed-length input.  Calling
/// this again with the same count is a no-op.
pub fn register_robot_types(space: &mut AddressSpace, joint_count: usize) -> Result<(), ArmError> {
    if space.types().contains(&type_name(ROBOT_ARM_TYPE)) {
        return check_registered_arity(space, joint_count);
    }

    space.register_type(
        TypeDefinition::variable(
            type_name(POSITION_TYPE),
            DataType::Double,
            AccessLevel::ReadOnly,
            Variant::Double(0.0),
        )
        .described("Joint angle in degrees"),
    )?;

    space.register_type(
        TypeDefinition::object(type_name(JOINT_TYPE))
            .described("One rotary axis")
            .mandatory(CURRENT_POSITION, SlotKind::Instance(type_name(POSITION_TYPE)))
            .optional(ENGINEERING_UNITS, read_only(DataType::String, Variant::from("deg"))),
    )?;

    space.register_type(
        TypeDefinition::object(type_name(MOTION_DEVICE_TYPE))
            .mandatory(IS_MOVING, read_only(DataType::Boolean, Variant::Boolean(false)))
            .optional(MANUFACTURER, read_only(DataType::String, Variant::from("")))
            .optional(SERIAL_NUMBER, read_only(DataType::String, Variant::from(""))),
    )?;

    space.register_type(
        TypeDefinition::object(type_name(ROBOT_ARM_TYPE))
            .derived_from(type_name(MOTION_DEVICE_TYPE))
            .described("Serial-link robot arm")
            .mandatory(
                MOVE_TO_POSITION,
                SlotKind::Method(MethodDeclaration {
                    inputs: vec![
                        Argument::array("targetPositions", DataType::DoubleArray, joint_count)
                            .with_description("Target angle per joint, in degrees"),
                    ],
                    outputs: vec![Argument::scalar("success", DataType::Boolean)],
                    handler: move_to_position,
                }),
            )
            .mandatory(
                MOVE_HOME,
                SlotKind::Method(MethodDeclaration {
                    inputs: vec![],
                    outputs: vec![Argument::scalar("success", DataType::Boolean)],
                    handler: move_home,
                }),
            ),
    )?;
    Ok(())
}

fn check_registered_arity(space: &AddressSpace, joint_count: usize) -> Result<(), ArmError> {
    let registered = space
        .types()
        .effective_slots(&type_name(ROBOT_ARM_TYPE))?
        .into_iter()
        .find_map(|slot| match &slot.kind {
            SlotKind::Method(decl) if slot.browse_name == MOVE_TO_POSITION => {
                decl.inputs.first().and_then(|a| a.array_length)
            }
            _ => None,
        });
    match registered {
        Some(n) if n == joint_count => Ok(()),
        Some(n) => Err(ArmError::ArityMismatch {
            expected: n,
            actual: joint_count,
        }),
        None => Err(ArmError::Internal(format!(
            "{ROBOT_ARM_TYPE} has no {MOVE_TO_POSITION} signature"
        ))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Instantiation
// ────────────────────────────────────────────────────────────────────────────

/// Build the node tree for one arm under `Objects` and resolve every node
/// the binding and dispatcher rely on.  Any missing node fails here, not on
/// first use.
pub fn build_robot(space: &mut AddressSpace, config: &RobotConfig) -> Result<RobotNodes, ArmError> {
    config.validate()?;
    register_robot_types(space, config.joint_count())?;

    let mut optional = Vec::new();
    if config.manufacturer.is_some() {
        optional.push(MANUFACTURER);
    }
    if config.serial_number.is_some() {
        optional.push(SERIAL_NUMBER);
    }
    let robot = space.instantiate(
        &type_name(ROBOT_ARM_TYPE),
        &well_known::OBJECTS_FOLDER,
        &config.name,
        &optional,
    )?;

    for joint in &config.joint_names {
        space.instantiate(&type_name(JOINT_TYPE), &robot, joint, &[ENGINEERING_UNITS])?;
    }

    space.add_variable(
        &robot,
        VariableSpec::new(OPERATING_MODE, Variant::from("Automatic"), AccessLevel::ReadWrite)
            .described("Automatic or Manual"),
    )?;
    space.add_variable(
        &robot,
        VariableSpec::new(SPEED_OVERRIDE, Variant::Double(100.0), AccessLevel::ReadWrite)
            .described("Speed override in percent"),
    )?;

    let mut nameplate = Vec::new();
    for (slot, value) in [
        (MANUFACTURER, &config.manufacturer),
        (SERIAL_NUMBER, &config.serial_number),
    ] {
        if let Some(value) = value {
            let id = space.get_child_by_name(&robot, slot)?.id.clone();
            nameplate.push((id, Variant::from(value.as_str())));
        }
    }
    space.set_values(&nameplate)?;

    let nodes = RobotNodes::resolve(space, &robot, &config.joint_names)?;
    info!(robot = %config.name, node = %robot, joints = config.joint_count(), "robot nodeset built");
    Ok(nodes)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

fn move_to_position(ctx: &MethodContext<'_>, inputs: &[Variant]) -> Result<Vec<Variant>, ArmError> {
    let robot = ctx.require_device()?;
    let targets = inputs
        .first()
        .and_then(Variant::as_f64_slice)
        .ok_or_else(|| ArmError::InvalidArgument("targetPositions must be Double[]".into()))?;
    robot.move_to(targets)?;
    Ok(vec![Variant::Boolean(true)])
}

fn move_home(ctx: &MethodContext<'_>, _inputs: &[Variant]) -> Result<Vec<Variant>, ArmError> {
    ctx.require_device()?.move_home()?;
    Ok(vec![Variant::Boolean(true)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeClass, ReferenceKind};
    use armlink_hal::Robot;

    fn built() -> (AddressSpace, RobotNodes) {
        let mut space = AddressSpace::new();
        let nodes = build_robot(&mut space, &RobotConfig::default()).unwrap();
        (space, nodes)
    }

    #[test]
    fn objects_folder_organizes_robot() {
        let (space, nodes) = built();
        let robot = space
            .get_child_by_name(&well_known::OBJECTS_FOLDER, "Robot")
            .unwrap();
        assert_eq!(robot.id, nodes.object);
        let children = space.browse_children(&well_known::OBJECTS_FOLDER).unwrap();
        assert!(children
            .iter()
            .any(|(k, n)| *k == ReferenceKind::Organizes && n.browse_name == "Robot"));
    }

    #[test]
    fn robot_exposes_joints_methods_and_flag() {
        let (space, nodes) = built();
        let children = space.browse_children(&nodes.object).unwrap();
        let joints = children
            .iter()
            .filter(|(_, n)| n.browse_name.starts_with("Joint"))
            .count();
        assert_eq!(joints, 6);
        let move_node = space.get_child_by_name(&nodes.object, MOVE_TO_POSITION).unwrap();
        assert_eq!(move_node.class(), NodeClass::Method);
        let signature = move_node.as_method().unwrap();
        assert_eq!(signature.inputs[0].array_length, Some(6));
        assert_eq!(
            space.get_child_by_name(&nodes.object, IS_MOVING).unwrap().class(),
            NodeClass::Variable
        );
        assert!(matches!(
            space.get_child_by_name(&nodes.object, MANUFACTURER),
            Err(ArmError::ChildNotFound { .. })
        ));
    }

    #[test]
    fn robot_conforms_to_its_supertype() {
        let (space, nodes) = built();
        assert!(space.conforms_to(&nodes.object, &type_name(ROBOT_ARM_TYPE)));
        assert!(space.conforms_to(&nodes.object, &type_name(MOTION_DEVICE_TYPE)));
        assert!(!space.conforms_to(&nodes.object, &type_name(JOINT_TYPE)));
        assert!(space.conforms_to(&nodes.joints[0].current_position, &type_name(POSITION_TYPE)));
    }

    #[test]
    fn nameplate_values_are_written_when_configured() {
        let mut space = AddressSpace::new();
        let config = RobotConfig {
            manufacturer: Some("ArmLink".into()),
            serial_number: Some("AL-0001".into()),
            ..RobotConfig::default()
        };
        let nodes = build_robot(&mut space, &config).unwrap();
        let serial = space.get_child_by_name(&nodes.object, SERIAL_NUMBER).unwrap();
        assert_eq!(space.read_value(&serial.id).unwrap().value, Variant::from("AL-0001"));
    }

    #[test]
    fn second_robot_must_share_joint_count() {
        let mut space = AddressSpace::new();
        build_robot(&mut space, &RobotConfig::default()).unwrap();

        let twin = RobotConfig {
            name: "Robot2".into(),
            ..RobotConfig::default()
        };
        assert!(build_robot(&mut space, &twin).is_ok());

        let small = RobotConfig {
            name: "Robot3".into(),
            ..RobotConfig::with_joint_count(3)
        };
        assert!(matches!(
            build_robot(&mut space, &small),
            Err(ArmError::ArityMismatch { expected: 6, actual: 3 })
        ));
    }

    #[test]
    fn duplicate_robot_name_is_rejected() {
        let (mut space, _) = built();
        assert!(matches!(
            build_robot(&mut space, &RobotConfig::default()),
            Err(ArmError::DuplicateBrowseName { .. })
        ));
    }

    #[test]
    fn handlers_drive_the_device() {
        let (space, nodes) = built();
        let robot = Robot::new(RobotConfig::default()).unwrap();
        let ctx = MethodContext {
            space: &space,
            object_id: &nodes.object,
            method_id: &nodes.move_to_position,
            device: Some(&robot),
        };
        let targets = Variant::DoubleArray(vec![45.0, -30.0, 60.0, 0.0, -45.0, 90.0]);
        assert_eq!(move_to_position(&ctx, &[targets]).unwrap(), vec![Variant::Boolean(true)]);
        assert_eq!(robot.read_position(5).unwrap(), 90.0);

        assert_eq!(move_home(&ctx, &[]).unwrap(), vec![Variant::Boolean(true)]);
        assert_eq!(robot.positions(), vec![0.0; 6]);

        let bad = Variant::DoubleArray(vec![200.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            move_to_position(&ctx, &[bad]),
            Err(ArmError::OutOfBounds { joint: 0, .. })
        ));
    }

    #[test]
    fn handler_without_device_is_internal_error() {
        let (space, nodes) = built();
        let ctx = MethodContext {
            space: &space,
            object_id: &nodes.object,
            method_id: &nodes.move_home,
            device: None,
        };
        assert!(matches!(move_home(&ctx, &[]), Err(ArmError::Internal(_))));
    }
}
