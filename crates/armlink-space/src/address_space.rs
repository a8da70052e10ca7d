//! [`AddressSpace`] – the typed node graph.
//!
//! Structure (nodes and references) is built through `&mut self` during
//! bootstrap and is immutable afterwards; the finished space is shared as
//! `Arc<AddressSpace>`.  Variable values live in a separate table behind a
//! single [`RwLock`], so a batch read takes one snapshot and a device update
//! replaces several values in one step.
//!
//! Containment forms a tree rooted at [`well_known::ROOT_FOLDER`]: every
//! other node has exactly one owning parent (`Organizes` from a folder,
//! `HasComponent` otherwise).  `HasTypeDefinition` edges point from instances
//! to the type nodes kept under [`well_known::TYPES_FOLDER`].

use std::collections::HashMap;

use armlink_types::{
    ArmError, DataType, LocalizedText, NodeId, QualifiedName, Variant, well_known,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::method::{Argument, MethodHandler};
use crate::node::{
    AccessLevel, AttributeId, DataValue, MethodAttributes, Node, NodeBody, NodeClass, Reference,
    ReferenceKind, VariableAttributes,
};
use crate::type_registry::{ModellingRule, SlotKind, TypeDefinition, TypeKind, TypeRegistry};

/// Namespace for every node created after bootstrap of the well-known folders.
pub const INSTANCE_NAMESPACE: u16 = 1;

const FIRST_INSTANCE_ID: u32 = 1000;

// ────────────────────────────────────────────────────────────────────────────
// Ad hoc node specs
// ────────────────────────────────────────────────────────────────────────────

/// Input to [`AddressSpace::add_variable`].
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub browse_name: String,
    pub data_type: DataType,
    pub access_level: AccessLevel,
    pub value: Variant,
    pub description: Option<String>,
}

impl VariableSpec {
    /// Variable whose data type is taken from its initial value.
    pub fn new(browse_name: impl Into<String>, value: Variant, access_level: AccessLevel) -> Self {
        Self {
            browse_name: browse_name.into(),
            data_type: value.data_type(),
            access_level,
            value,
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input to [`AddressSpace::add_method`].
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub browse_name: String,
    pub inputs: Vec<Argument>,
    pub outputs: Vec<Argument>,
    pub handler: MethodHandler,
    pub description: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// AddressSpace
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Entry {
    node: Node,
    parent: Option<NodeId>,
    /// Forward references in insertion order.
    references: Vec<Reference>,
}

#[derive(Debug)]
pub struct AddressSpace {
    types: TypeRegistry,
    type_nodes: HashMap<QualifiedName, NodeId>,
    nodes: HashMap<NodeId, Entry>,
    values: RwLock<HashMap<NodeId, DataValue>>,
    next_id: u32,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// An empty space holding only the `Root`, `Objects`, and `Types` folders.
    pub fn new() -> Self {
        let mut space = Self {
            types: TypeRegistry::new(),
            type_nodes: HashMap::new(),
            nodes: HashMap::new(),
            values: RwLock::new(HashMap::new()),
            next_id: FIRST_INSTANCE_ID,
        };
        space.nodes.insert(
            well_known::ROOT_FOLDER,
            Entry {
                node: folder(well_known::ROOT_FOLDER, "Root"),
                parent: None,
                references: Vec::new(),
            },
        );
        for (id, name) in [
            (well_known::OBJECTS_FOLDER, "Objects"),
            (well_known::TYPES_FOLDER, "Types"),
        ] {
            space.link(&well_known::ROOT_FOLDER, folder(id, name), ReferenceKind::Organizes);
        }
        space
    }

    // ── lookup ──────────────────────────────────────────────────────────────

    pub fn find(&self, id: &NodeId) -> Result<&Node, ArmError> {
        self.entry(id).map(|e| &e.node)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Owning parent; `None` only for the root.
    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|e| e.parent.as_ref())
    }

    pub fn references(&self, id: &NodeId) -> Result<&[Reference], ArmError> {
        self.entry(id).map(|e| e.references.as_slice())
    }

    /// Every forward reference of `id` with its resolved target, in
    /// insertion order.
    pub fn browse_children(&self, id: &NodeId) -> Result<Vec<(ReferenceKind, &Node)>, ArmError> {
        let entry = self.entry(id)?;
        entry
            .references
            .iter()
            .map(|r| Ok((r.kind, self.find(&r.target)?)))
            .collect()
    }

    /// Contained child of `parent` with the given browse name.
    pub fn get_child_by_name(&self, parent: &NodeId, name: &str) -> Result<&Node, ArmError> {
        self.entry(parent)?
            .references
            .iter()
            .filter(|r| r.kind.is_hierarchical())
            .filter_map(|r| self.nodes.get(&r.target))
            .map(|e| &e.node)
            .find(|n| n.browse_name == name)
            .ok_or_else(|| ArmError::ChildNotFound {
                parent: parent.clone(),
                name: name.to_string(),
            })
    }

    /// Follow a browse-name path down from `start`.
    pub fn resolve_path(&self, start: &NodeId, path: &[&str]) -> Result<&Node, ArmError> {
        let mut node = self.find(start)?;
        for name in path {
            node = self.get_child_by_name(&node.id, name)?;
        }
        Ok(node)
    }

    /// `true` when `ancestor` strictly contains `id`.
    pub fn is_ancestor(&self, ancestor: &NodeId, id: &NodeId) -> bool {
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_of(parent);
        }
        false
    }

    // ── types ───────────────────────────────────────────────────────────────

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Register a type and create its type node under `Types`.  The type
    /// node's identifier is the type name in the type's namespace.
    pub fn register_type(&mut self, definition: TypeDefinition) -> Result<NodeId, ArmError> {
        let name = definition.name.clone();
        let id = NodeId::text(name.namespace, name.name.clone());
        if self.nodes.contains_key(&id) {
            return Err(ArmError::DuplicateType(name));
        }
        let body = match &definition.kind {
            TypeKind::Object => NodeBody::ObjectType { name: name.clone() },
            TypeKind::Variable { data_type, .. } => NodeBody::VariableType {
                name: name.clone(),
                data_type: *data_type,
            },
        };
        let description = definition.description.clone().map(LocalizedText::en);
        self.types.register(definition)?;

        let node = Node {
            id: id.clone(),
            browse_name: name.name.clone(),
            display_name: LocalizedText::en(name.name.clone()),
            description,
            body,
        };
        self.link(&well_known::TYPES_FOLDER, node, ReferenceKind::Organizes);
        self.type_nodes.insert(name, id.clone());
        Ok(id)
    }

    pub fn type_node(&self, name: &QualifiedName) -> Result<&NodeId, ArmError> {
        self.type_nodes
            .get(name)
            .ok_or_else(|| ArmError::UnknownType(name.clone()))
    }

    /// Type an instance node is classified by.
    pub fn type_of(&self, id: &NodeId) -> Option<&QualifiedName> {
        let type_id = self
            .nodes
            .get(id)?
            .references
            .iter()
            .find(|r| r.kind == ReferenceKind::HasTypeDefinition)?;
        match &self.nodes.get(&type_id.target)?.node.body {
            NodeBody::ObjectType { name } | NodeBody::VariableType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// `true` when `id` is an instance of `type_name` or one of its subtypes.
    pub fn conforms_to(&self, id: &NodeId, type_name: &QualifiedName) -> bool {
        self.type_of(id)
            .is_some_and(|t| self.types.is_subtype_of(t, type_name))
    }

    /// Materialise an instance of `type_name` under `parent`.
    ///
    /// Mandatory slots are always created; optional slots only when named in
    /// `optional_slots`.  Nested instance slots receive their own mandatory
    /// children only.  Every precondition is checked before the first node
    /// is inserted, so a failure leaves the space untouched.
    pub fn instantiate(
        &mut self,
        type_name: &QualifiedName,
        parent: &NodeId,
        browse_name: &str,
        optional_slots: &[&str],
    ) -> Result<NodeId, ArmError> {
        let slots = self.types.effective_slots(type_name)?;
        self.check_insertable(parent, browse_name)?;
        for requested in optional_slots {
            let declared = slots
                .iter()
                .any(|s| s.browse_name == *requested && s.rule == ModellingRule::Optional);
            if !declared {
                return Err(ArmError::InvalidArgument(format!(
                    "type {type_name} has no optional slot '{requested}'"
                )));
            }
        }

        let id = self.materialise(type_name, parent, browse_name, optional_slots)?;
        debug!(node = %id, type_name = %type_name, parent = %parent, "instantiated");
        Ok(id)
    }

    fn materialise(
        &mut self,
        type_name: &QualifiedName,
        parent: &NodeId,
        browse_name: &str,
        optional_slots: &[&str],
    ) -> Result<NodeId, ArmError> {
        let definition = self.types.get(type_name)?.clone();
        let type_node = self.type_node(type_name)?.clone();
        let slots: Vec<_> = self
            .types
            .effective_slots(type_name)?
            .into_iter()
            .filter(|s| {
                s.rule == ModellingRule::Mandatory || optional_slots.contains(&s.browse_name.as_str())
            })
            .cloned()
            .collect();

        let id = self.allocate_id();
        let description = definition.description.clone().map(LocalizedText::en);
        let (body, initial) = match definition.kind {
            TypeKind::Object => (
                NodeBody::Object {
                    type_definition: Some(type_node.clone()),
                    folder: false,
                },
                None,
            ),
            TypeKind::Variable {
                data_type,
                access_level,
                initial,
            } => (
                NodeBody::Variable(VariableAttributes {
                    data_type,
                    access_level,
                }),
                Some(initial),
            ),
        };
        let node = Node {
            id: id.clone(),
            browse_name: browse_name.to_string(),
            display_name: LocalizedText::en(browse_name),
            description,
            body,
        };
        self.link(parent, node, self.containment_kind(parent));
        self.push_reference(&id, ReferenceKind::HasTypeDefinition, type_node);
        if let Some(value) = initial {
            self.values.get_mut().insert(id.clone(), DataValue::now(value));
        }

        for slot in slots {
            let description = slot.description.clone();
            match slot.kind {
                SlotKind::Instance(child_type) => {
                    self.materialise(&child_type, &id, &slot.browse_name, &[])?;
                }
                SlotKind::Variable {
                    data_type,
                    access_level,
                    initial,
                } => {
                    self.insert_variable(
                        &id,
                        VariableSpec {
                            browse_name: slot.browse_name,
                            data_type,
                            access_level,
                            value: initial,
                            description,
                        },
                    );
                }
                SlotKind::Method(decl) => {
                    self.insert_method(
                        &id,
                        MethodSpec {
                            browse_name: slot.browse_name,
                            inputs: decl.inputs,
                            outputs: decl.outputs,
                            handler: decl.handler,
                            description,
                        },
                    );
                }
            }
        }
        Ok(id)
    }

    // ── ad hoc insertion ────────────────────────────────────────────────────

    pub fn add_object(
        &mut self,
        parent: &NodeId,
        browse_name: &str,
        description: Option<&str>,
    ) -> Result<NodeId, ArmError> {
        self.check_insertable(parent, browse_name)?;
        let id = self.allocate_id();
        let node = Node {
            id: id.clone(),
            browse_name: browse_name.to_string(),
            display_name: LocalizedText::en(browse_name),
            description: description.map(LocalizedText::en),
            body: NodeBody::Object {
                type_definition: None,
                folder: false,
            },
        };
        self.link(parent, node, self.containment_kind(parent));
        Ok(id)
    }

    pub fn add_variable(&mut self, parent: &NodeId, spec: VariableSpec) -> Result<NodeId, ArmError> {
        self.check_insertable(parent, &spec.browse_name)?;
        if spec.value.data_type() != spec.data_type {
            return Err(ArmError::TypeMismatch {
                expected: spec.data_type,
                actual: spec.value.data_type(),
            });
        }
        Ok(self.insert_variable(parent, spec))
    }

    pub fn add_method(&mut self, parent: &NodeId, spec: MethodSpec) -> Result<NodeId, ArmError> {
        self.check_insertable(parent, &spec.browse_name)?;
        let parent_class = self.find(parent)?.class();
        if parent_class != NodeClass::Object {
            return Err(ArmError::InvalidNodeClass {
                node: parent.clone(),
                expected: NodeClass::Object.to_string(),
            });
        }
        Ok(self.insert_method(parent, spec))
    }

    fn insert_variable(&mut self, parent: &NodeId, spec: VariableSpec) -> NodeId {
        let id = self.allocate_id();
        let node = Node {
            id: id.clone(),
            display_name: LocalizedText::en(spec.browse_name.clone()),
            browse_name: spec.browse_name,
            description: spec.description.map(LocalizedText::en),
            body: NodeBody::Variable(VariableAttributes {
                data_type: spec.data_type,
                access_level: spec.access_level,
            }),
        };
        self.link(parent, node, self.containment_kind(parent));
        self.values.get_mut().insert(id.clone(), DataValue::now(spec.value));
        id
    }

    fn insert_method(&mut self, parent: &NodeId, spec: MethodSpec) -> NodeId {
        let id = self.allocate_id();
        let node = Node {
            id: id.clone(),
            display_name: LocalizedText::en(spec.browse_name.clone()),
            browse_name: spec.browse_name,
            description: spec.description.map(LocalizedText::en),
            body: NodeBody::Method(MethodAttributes {
                inputs: spec.inputs,
                outputs: spec.outputs,
                handler: spec.handler,
            }),
        };
        self.link(parent, node, ReferenceKind::HasComponent);
        id
    }

    /// Parent must exist and accept children, and `browse_name` must be
    /// free among its contained children.
    fn check_insertable(&self, parent: &NodeId, browse_name: &str) -> Result<(), ArmError> {
        let parent_node = self.find(parent)?;
        if !matches!(parent_node.class(), NodeClass::Object | NodeClass::Variable) {
            return Err(ArmError::InvalidNodeClass {
                node: parent.clone(),
                expected: "Object or Variable".to_string(),
            });
        }
        if self.get_child_by_name(parent, browse_name).is_ok() {
            return Err(ArmError::DuplicateBrowseName {
                parent: parent.clone(),
                name: browse_name.to_string(),
            });
        }
        Ok(())
    }

    fn containment_kind(&self, parent: &NodeId) -> ReferenceKind {
        match self.nodes.get(parent).map(|e| &e.node.body) {
            Some(NodeBody::Object { folder: true, .. }) => ReferenceKind::Organizes,
            _ => ReferenceKind::HasComponent,
        }
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId::numeric(INSTANCE_NAMESPACE, self.next_id);
        self.next_id += 1;
        id
    }

    fn link(&mut self, parent: &NodeId, node: Node, kind: ReferenceKind) {
        let id = node.id.clone();
        self.nodes.insert(
            id.clone(),
            Entry {
                node,
                parent: Some(parent.clone()),
                references: Vec::new(),
            },
        );
        self.push_reference(parent, kind, id);
    }

    fn push_reference(&mut self, source: &NodeId, kind: ReferenceKind, target: NodeId) {
        if let Some(entry) = self.nodes.get_mut(source) {
            entry.references.push(Reference { kind, target });
        }
    }

    fn entry(&self, id: &NodeId) -> Result<&Entry, ArmError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ArmError::NodeNotFound(id.clone()))
    }

    // ── values & attributes ─────────────────────────────────────────────────

    /// Current value of a readable variable.
    pub fn read_value(&self, id: &NodeId) -> Result<DataValue, ArmError> {
        let values = self.values.read();
        self.read_attribute_with(&values, id, AttributeId::Value)
    }

    /// Read a batch of attributes against one snapshot of the value table.
    pub fn read_attributes(&self, items: &[(NodeId, AttributeId)]) -> Vec<Result<DataValue, ArmError>> {
        let values = self.values.read();
        items
            .iter()
            .map(|(id, attribute)| self.read_attribute_with(&values, id, *attribute))
            .collect()
    }

    fn read_attribute_with(
        &self,
        values: &HashMap<NodeId, DataValue>,
        id: &NodeId,
        attribute: AttributeId,
    ) -> Result<DataValue, ArmError> {
        let node = self.find(id)?;
        let invalid = || ArmError::AttributeInvalid {
            node: id.clone(),
            attribute: attribute.to_string(),
        };
        let value = match attribute {
            AttributeId::NodeId => Variant::String(node.id.to_string()),
            AttributeId::NodeClass => Variant::String(node.class().to_string()),
            AttributeId::BrowseName => Variant::String(node.browse_name.clone()),
            AttributeId::DisplayName => Variant::LocalizedText(node.display_name.clone()),
            AttributeId::Description => Variant::LocalizedText(
                node.description.clone().unwrap_or_else(|| LocalizedText::en("")),
            ),
            AttributeId::DataType => match &node.body {
                NodeBody::Variable(v) => Variant::String(v.data_type.to_string()),
                NodeBody::VariableType { data_type, .. } => Variant::String(data_type.to_string()),
                _ => return Err(invalid()),
            },
            AttributeId::AccessLevel => match &node.body {
                NodeBody::Variable(v) => Variant::Int32(v.access_level.bits()),
                _ => return Err(invalid()),
            },
            AttributeId::Value => {
                let var = node.as_variable().ok_or_else(invalid)?;
                if !var.access_level.readable() {
                    return Err(ArmError::NotReadable(id.clone()));
                }
                return values
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ArmError::Internal(format!("variable {id} has no value")));
            }
        };
        Ok(DataValue::now(value))
    }

    /// Remote write of a batch.  Only `Value` is writable; each item is
    /// checked against access level and data type, and applied only if it
    /// passes.  The whole batch runs under one write lock.
    pub fn write_attributes(&self, items: &[(NodeId, AttributeId, Variant)]) -> Vec<Result<(), ArmError>> {
        let mut values = self.values.write();
        items
            .iter()
            .map(|(id, attribute, value)| {
                let var = self.writable_variable(id, *attribute)?;
                if value.data_type() != var.data_type {
                    return Err(ArmError::TypeMismatch {
                        expected: var.data_type,
                        actual: value.data_type(),
                    });
                }
                values.insert(id.clone(), DataValue::now(value.clone()));
                Ok(())
            })
            .collect()
    }

    /// Remote write of a single value.
    pub fn write_value(&self, id: &NodeId, value: Variant) -> Result<(), ArmError> {
        self.write_attributes(&[(id.clone(), AttributeId::Value, value)])
            .pop()
            .unwrap_or_else(|| Err(ArmError::Internal("empty write result".into())))
    }

    fn writable_variable(&self, id: &NodeId, attribute: AttributeId) -> Result<&VariableAttributes, ArmError> {
        let node = self.find(id)?;
        if attribute != AttributeId::Value {
            return Err(ArmError::NotWritable(id.clone()));
        }
        let var = node.as_variable().ok_or_else(|| ArmError::AttributeInvalid {
            node: id.clone(),
            attribute: attribute.to_string(),
        })?;
        if !var.access_level.writable() {
            return Err(ArmError::NotWritable(id.clone()));
        }
        Ok(var)
    }

    /// Device-side update of several variables in one step.  Access levels
    /// do not apply; data types do.  Nothing is written unless every update
    /// is valid.
    pub fn set_values(&self, updates: &[(NodeId, Variant)]) -> Result<(), ArmError> {
        for (id, value) in updates {
            let node = self.find(id)?;
            let var = node.as_variable().ok_or_else(|| ArmError::InvalidNodeClass {
                node: id.clone(),
                expected: NodeClass::Variable.to_string(),
            })?;
            if value.data_type() != var.data_type {
                return Err(ArmError::TypeMismatch {
                    expected: var.data_type,
                    actual: value.data_type(),
                });
            }
        }
        let now = chrono::Utc::now();
        let mut values = self.values.write();
        for (id, value) in updates {
            values.insert(
                id.clone(),
                DataValue {
                    value: value.clone(),
                    source_timestamp: now,
                },
            );
        }
        Ok(())
    }
}

fn folder(id: NodeId, name: &str) -> Node {
    Node {
        id,
        browse_name: name.to_string(),
        display_name: LocalizedText::en(name),
        description: None,
        body: NodeBody::Object {
            type_definition: None,
            folder: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodContext;

    fn qn(name: &str) -> QualifiedName {
        QualifiedName::new(INSTANCE_NAMESPACE, name)
    }

    fn ok_handler(_: &MethodContext<'_>, _: &[Variant]) -> Result<Vec<Variant>, ArmError> {
        Ok(vec![])
    }

    fn position_slot() -> SlotKind {
        SlotKind::Variable {
            data_type: DataType::Double,
            access_level: AccessLevel::ReadOnly,
            initial: Variant::Double(0.0),
        }
    }

    fn space_with_joint_type() -> AddressSpace {
        let mut space = AddressSpace::new();
        space
            .register_type(
                TypeDefinition::object(qn("JointType"))
                    .mandatory("CurrentPosition", position_slot())
                    .optional(
                        "EngineeringUnits",
                        SlotKind::Variable {
                            data_type: DataType::String,
                            access_level: AccessLevel::ReadOnly,
                            initial: Variant::from("deg"),
                        },
                    ),
            )
            .unwrap();
        space
    }

    #[test]
    fn new_space_has_well_known_folders() {
        let space = AddressSpace::new();
        let root = space.browse_children(&well_known::ROOT_FOLDER).unwrap();
        let names: Vec<_> = root.iter().map(|(_, n)| n.browse_name.as_str()).collect();
        assert_eq!(names, ["Objects", "Types"]);
        assert!(root.iter().all(|(k, _)| *k == ReferenceKind::Organizes));
        assert!(space.parent_of(&well_known::ROOT_FOLDER).is_none());
    }

    #[test]
    fn find_unknown_node_fails() {
        let space = AddressSpace::new();
        let err = space.find(&NodeId::numeric(1, 4242)).unwrap_err();
        assert!(matches!(err, ArmError::NodeNotFound(_)));
    }

    #[test]
    fn instantiate_creates_mandatory_slots_only_by_default() {
        let mut space = space_with_joint_type();
        let joint = space
            .instantiate(&qn("JointType"), &well_known::OBJECTS_FOLDER, "Joint1", &[])
            .unwrap();

        assert!(space.get_child_by_name(&joint, "CurrentPosition").is_ok());
        assert!(matches!(
            space.get_child_by_name(&joint, "EngineeringUnits"),
            Err(ArmError::ChildNotFound { .. })
        ));
        assert!(space.conforms_to(&joint, &qn("JointType")));
        assert_eq!(space.parent_of(&joint), Some(&well_known::OBJECTS_FOLDER));
    }

    #[test]
    fn instantiate_creates_requested_optional_slots() {
        let mut space = space_with_joint_type();
        let joint = space
            .instantiate(
                &qn("JointType"),
                &well_known::OBJECTS_FOLDER,
                "Joint1",
                &["EngineeringUnits"],
            )
            .unwrap();
        let units = space.get_child_by_name(&joint, "EngineeringUnits").unwrap();
        assert_eq!(space.read_value(&units.id).unwrap().value, Variant::from("deg"));
    }

    #[test]
    fn instantiate_rejects_unknown_type_and_duplicate_name() {
        let mut space = space_with_joint_type();
        let before = space.len();
        assert!(matches!(
            space.instantiate(&qn("Missing"), &well_known::OBJECTS_FOLDER, "X", &[]),
            Err(ArmError::UnknownType(_))
        ));

        space
            .instantiate(&qn("JointType"), &well_known::OBJECTS_FOLDER, "Joint1", &[])
            .unwrap();
        let after_first = space.len();
        assert!(after_first > before);
        assert!(matches!(
            space.instantiate(&qn("JointType"), &well_known::OBJECTS_FOLDER, "Joint1", &[]),
            Err(ArmError::DuplicateBrowseName { ref name, .. }) if name == "Joint1"
        ));
        assert_eq!(space.len(), after_first);
    }

    #[test]
    fn instantiate_rejects_undeclared_optional_slot() {
        let mut space = space_with_joint_type();
        let before = space.len();
        let err = space
            .instantiate(
                &qn("JointType"),
                &well_known::OBJECTS_FOLDER,
                "Joint1",
                &["CurrentPosition"],
            )
            .unwrap_err();
        assert!(matches!(err, ArmError::InvalidArgument(_)));
        assert_eq!(space.len(), before);
    }

    #[test]
    fn type_nodes_live_under_types_folder() {
        let space = space_with_joint_type();
        let type_id = space.type_node(&qn("JointType")).unwrap();
        assert_eq!(type_id, &NodeId::text(1, "JointType"));
        assert_eq!(space.find(type_id).unwrap().class(), NodeClass::ObjectType);
        assert_eq!(space.parent_of(type_id), Some(&well_known::TYPES_FOLDER));
    }

    #[test]
    fn browse_children_is_insertion_ordered_and_stable() {
        let mut space = AddressSpace::new();
        let obj = space
            .add_object(&well_known::OBJECTS_FOLDER, "Cell", None)
            .unwrap();
        for name in ["Zeta", "Alpha", "Mid"] {
            space
                .add_variable(&obj, VariableSpec::new(name, Variant::Int32(0), AccessLevel::ReadOnly))
                .unwrap();
        }
        let first: Vec<_> = space
            .browse_children(&obj)
            .unwrap()
            .iter()
            .map(|(_, n)| n.browse_name.clone())
            .collect();
        let second: Vec<_> = space
            .browse_children(&obj)
            .unwrap()
            .iter()
            .map(|(_, n)| n.browse_name.clone())
            .collect();
        assert_eq!(first, ["Zeta", "Alpha", "Mid"]);
        assert_eq!(first, second);
    }

    #[test]
    fn add_variable_checks_initial_type() {
        let mut space = AddressSpace::new();
        let spec = VariableSpec {
            data_type: DataType::Boolean,
            ..VariableSpec::new("Flag", Variant::Double(1.0), AccessLevel::ReadOnly)
        };
        assert!(matches!(
            space.add_variable(&well_known::OBJECTS_FOLDER, spec),
            Err(ArmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn methods_cannot_have_children() {
        let mut space = AddressSpace::new();
        let reset = MethodSpec {
            browse_name: "Reset".into(),
            inputs: vec![],
            outputs: vec![],
            handler: ok_handler,
            description: None,
        };
        let method = space
            .add_method(&well_known::OBJECTS_FOLDER, reset.clone())
            .unwrap();
        assert_eq!(space.find(&method).unwrap().class(), NodeClass::Method);

        assert!(matches!(
            space.add_method(&method, reset),
            Err(ArmError::InvalidNodeClass { .. })
        ));
        assert!(matches!(
            space.add_variable(
                &method,
                VariableSpec::new("X", Variant::Int32(0), AccessLevel::ReadOnly)
            ),
            Err(ArmError::InvalidNodeClass { .. })
        ));
    }

    #[test]
    fn write_enforces_access_level_and_type() {
        let mut space = AddressSpace::new();
        let ro = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("Ro", Variant::Double(1.0), AccessLevel::ReadOnly),
            )
            .unwrap();
        let rw = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("Rw", Variant::Double(1.0), AccessLevel::ReadWrite),
            )
            .unwrap();

        assert!(matches!(
            space.write_value(&ro, Variant::Double(2.0)),
            Err(ArmError::NotWritable(_))
        ));
        assert!(matches!(
            space.write_value(&rw, Variant::from("nope")),
            Err(ArmError::TypeMismatch { .. })
        ));
        assert_eq!(space.read_value(&rw).unwrap().value, Variant::Double(1.0));

        space.write_value(&rw, Variant::Double(2.5)).unwrap();
        assert_eq!(space.read_value(&rw).unwrap().value, Variant::Double(2.5));
    }

    #[test]
    fn write_only_variable_is_not_readable() {
        let mut space = AddressSpace::new();
        let wo = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("Secret", Variant::from(""), AccessLevel::WriteOnly),
            )
            .unwrap();
        assert!(matches!(space.read_value(&wo), Err(ArmError::NotReadable(_))));
        assert!(space.write_value(&wo, Variant::from("x")).is_ok());
    }

    #[test]
    fn attributes_follow_node_class() {
        let mut space = AddressSpace::new();
        let var = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("Speed", Variant::Double(1.0), AccessLevel::ReadWrite)
                    .described("speed override"),
            )
            .unwrap();
        let results = space.read_attributes(&[
            (var.clone(), AttributeId::BrowseName),
            (var.clone(), AttributeId::DataType),
            (var.clone(), AttributeId::AccessLevel),
            (var.clone(), AttributeId::Description),
            (well_known::OBJECTS_FOLDER, AttributeId::Value),
            (well_known::OBJECTS_FOLDER, AttributeId::NodeClass),
        ]);
        assert_eq!(results[0].as_ref().unwrap().value, Variant::from("Speed"));
        assert_eq!(results[1].as_ref().unwrap().value, Variant::from("Double"));
        assert_eq!(results[2].as_ref().unwrap().value, Variant::Int32(3));
        assert_eq!(
            results[3].as_ref().unwrap().value,
            Variant::LocalizedText(LocalizedText::en("speed override"))
        );
        assert!(matches!(results[4], Err(ArmError::AttributeInvalid { .. })));
        assert_eq!(results[5].as_ref().unwrap().value, Variant::from("Object"));
    }

    #[test]
    fn only_value_attribute_is_writable() {
        let mut space = AddressSpace::new();
        let rw = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("Mode", Variant::from("Auto"), AccessLevel::ReadWrite),
            )
            .unwrap();
        let results = space.write_attributes(&[
            (rw.clone(), AttributeId::BrowseName, Variant::from("Renamed")),
            (rw.clone(), AttributeId::Value, Variant::from("Manual")),
            (NodeId::numeric(1, 9999), AttributeId::Value, Variant::from("x")),
        ]);
        assert!(matches!(results[0], Err(ArmError::NotWritable(_))));
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(ArmError::NodeNotFound(_))));
    }

    #[test]
    fn set_values_is_all_or_nothing() {
        let mut space = AddressSpace::new();
        let a = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("A", Variant::Double(0.0), AccessLevel::ReadOnly),
            )
            .unwrap();
        let b = space
            .add_variable(
                &well_known::OBJECTS_FOLDER,
                VariableSpec::new("B", Variant::Boolean(false), AccessLevel::ReadOnly),
            )
            .unwrap();

        let err = space
            .set_values(&[(a.clone(), Variant::Double(5.0)), (b.clone(), Variant::Double(1.0))])
            .unwrap_err();
        assert!(matches!(err, ArmError::TypeMismatch { .. }));
        assert_eq!(space.read_value(&a).unwrap().value, Variant::Double(0.0));

        space
            .set_values(&[(a.clone(), Variant::Double(5.0)), (b.clone(), Variant::Boolean(true))])
            .unwrap();
        let snapshot = space.read_attributes(&[(a, AttributeId::Value), (b, AttributeId::Value)]);
        assert_eq!(snapshot[0].as_ref().unwrap().value, Variant::Double(5.0));
        assert_eq!(snapshot[1].as_ref().unwrap().value, Variant::Boolean(true));
        assert_eq!(
            snapshot[0].as_ref().unwrap().source_timestamp,
            snapshot[1].as_ref().unwrap().source_timestamp
        );
    }

    #[test]
    fn ancestry_walks_containment_only() {
        let mut space = space_with_joint_type();
        let robot = space
            .add_object(&well_known::OBJECTS_FOLDER, "Robot", None)
            .unwrap();
        let joint = space
            .instantiate(&qn("JointType"), &robot, "Joint1", &[])
            .unwrap();
        let pos = space.resolve_path(&robot, &["Joint1", "CurrentPosition"]).unwrap().id.clone();

        assert!(space.is_ancestor(&robot, &pos));
        assert!(space.is_ancestor(&joint, &pos));
        assert!(space.is_ancestor(&well_known::ROOT_FOLDER, &pos));
        assert!(!space.is_ancestor(&pos, &robot));
        assert!(!space.is_ancestor(&robot, &robot));
        let type_id = space.type_node(&qn("JointType")).unwrap().clone();
        assert!(!space.is_ancestor(&type_id, &joint));
    }
}
