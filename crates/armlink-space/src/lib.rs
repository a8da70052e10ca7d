//! `armlink-space` – the typed address space.
//!
//! # Modules
//!
//! - [`node`] – nodes, references, attributes, and timestamped values.
//! - [`type_registry`] – object/variable type definitions with single
//!   inheritance and mandatory/optional child slots.
//! - [`address_space`] – the node graph: type-driven instantiation, ad hoc
//!   insertion, lookup, browse, and the value table.
//! - [`method`] – method signatures and the stateless handler seam.
//! - [`robot_model`] – the arm's types, instantiation script, and method
//!   handlers.
//! - [`binding`] – resolves an arm's nodes and keeps them in step with the
//!   device.

pub mod address_space;
pub mod binding;
pub mod method;
pub mod node;
pub mod robot_model;
pub mod type_registry;

pub use address_space::{AddressSpace, INSTANCE_NAMESPACE, MethodSpec, VariableSpec};
pub use binding::{JointNodes, RobotNodes, SpaceBinding, bind_robot};
pub use method::{Argument, MethodContext, MethodHandler};
pub use node::{
    AccessLevel, AttributeId, DataValue, MethodAttributes, Node, NodeBody, NodeClass, Reference,
    ReferenceKind, VariableAttributes,
};
pub use robot_model::{build_robot, register_robot_types};
pub use type_registry::{
    MethodDeclaration, ModellingRule, SlotDefinition, SlotKind, TypeDefinition, TypeKind,
    TypeRegistry,
};
