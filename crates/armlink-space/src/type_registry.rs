//! [`TypeRegistry`] – object- and variable-type definitions.
//!
//! A [`TypeDefinition`] is a template: an ordered list of [`SlotDefinition`]s
//! naming the children every instance gets.  Types may derive from a parent
//! type and inherit its slots; a derived slot with the same browse name
//! replaces the inherited one in place.
//!
//! Registration validates everything instantiation later relies on (parent
//! and slot types exist, initial values match their data types, slot names
//! are unique), so a registered type can always be instantiated.  Since a
//! slot may only reference an already-registered type, definitions cannot
//! form cycles.

use std::collections::{HashMap, HashSet};

use armlink_types::{ArmError, DataType, QualifiedName, Variant};

use crate::method::{Argument, MethodHandler};
use crate::node::AccessLevel;

// ────────────────────────────────────────────────────────────────────────────
// Definitions
// ────────────────────────────────────────────────────────────────────────────

/// Whether instances are objects or variables.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Object,
    Variable {
        data_type: DataType,
        access_level: AccessLevel,
        initial: Variant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModellingRule {
    /// Created with every instance.
    Mandatory,
    /// Created only when requested at instantiation time.
    Optional,
}

/// Method declared by a type, shared by all of its instances.
#[derive(Clone)]
pub struct MethodDeclaration {
    pub inputs: Vec<Argument>,
    pub outputs: Vec<Argument>,
    pub handler: MethodHandler,
}

impl std::fmt::Debug for MethodDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDeclaration")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum SlotKind {
    /// An instance of another registered type.
    Instance(QualifiedName),
    /// A plain variable with no type of its own.
    Variable {
        data_type: DataType,
        access_level: AccessLevel,
        initial: Variant,
    },
    Method(MethodDeclaration),
}

/// A named child that instances of a type receive.
#[derive(Debug, Clone)]
pub struct SlotDefinition {
    pub browse_name: String,
    pub rule: ModellingRule,
    pub kind: SlotKind,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: QualifiedName,
    pub parent: Option<QualifiedName>,
    pub kind: TypeKind,
    pub slots: Vec<SlotDefinition>,
    pub description: Option<String>,
}

impl TypeDefinition {
    pub fn object(name: QualifiedName) -> Self {
        Self {
            name,
            parent: None,
            kind: TypeKind::Object,
            slots: Vec::new(),
            description: None,
        }
    }

    pub fn variable(
        name: QualifiedName,
        data_type: DataType,
        access_level: AccessLevel,
        initial: Variant,
    ) -> Self {
        Self {
            name,
            parent: None,
            kind: TypeKind::Variable {
                data_type,
                access_level,
                initial,
            },
            slots: Vec::new(),
            description: None,
        }
    }

    pub fn derived_from(mut self, parent: QualifiedName) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mandatory(self, browse_name: impl Into<String>, kind: SlotKind) -> Self {
        self.slot(browse_name, ModellingRule::Mandatory, kind)
    }

    pub fn optional(self, browse_name: impl Into<String>, kind: SlotKind) -> Self {
        self.slot(browse_name, ModellingRule::Optional, kind)
    }

    fn slot(mut self, browse_name: impl Into<String>, rule: ModellingRule, kind: SlotKind) -> Self {
        self.slots.push(SlotDefinition {
            browse_name: browse_name.into(),
            rule,
            kind,
            description: None,
        });
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TypeRegistry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<QualifiedName, TypeDefinition>,
    /// Registration order, for deterministic listings.
    order: Vec<QualifiedName>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition.  Fails with `DuplicateType` if the name is taken and
    /// `UnknownType` if the parent or any instance slot names an unregistered
    /// type.
    pub fn register(&mut self, definition: TypeDefinition) -> Result<(), ArmError> {
        if self.types.contains_key(&definition.name) {
            return Err(ArmError::DuplicateType(definition.name));
        }

        if let Some(parent) = &definition.parent {
            let parent_def = self.get(parent)?;
            let same_kind = matches!(
                (&parent_def.kind, &definition.kind),
                (TypeKind::Object, TypeKind::Object)
                    | (TypeKind::Variable { .. }, TypeKind::Variable { .. })
            );
            if !same_kind {
                return Err(ArmError::InvalidArgument(format!(
                    "type {} cannot derive from {parent}: kinds differ",
                    definition.name
                )));
            }
        }

        if let TypeKind::Variable {
            data_type, initial, ..
        } = &definition.kind
        {
            check_initial(*data_type, initial)?;
        }

        let mut seen = HashSet::new();
        for slot in &definition.slots {
            if !seen.insert(slot.browse_name.as_str()) {
                return Err(ArmError::InvalidArgument(format!(
                    "type {} declares slot '{}' twice",
                    definition.name, slot.browse_name
                )));
            }
            match &slot.kind {
                SlotKind::Instance(type_name) => {
                    self.get(type_name)?;
                }
                SlotKind::Variable {
                    data_type, initial, ..
                } => check_initial(*data_type, initial)?,
                SlotKind::Method(_) => {}
            }
        }

        tracing::debug!(type_name = %definition.name, slots = definition.slots.len(), "type registered");
        self.order.push(definition.name.clone());
        self.types.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &QualifiedName) -> Result<&TypeDefinition, ArmError> {
        self.types
            .get(name)
            .ok_or_else(|| ArmError::UnknownType(name.clone()))
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.types.contains_key(name)
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// `true` when `name` is `ancestor` or derives from it, directly or not.
    pub fn is_subtype_of(&self, name: &QualifiedName, ancestor: &QualifiedName) -> bool {
        let mut current = self.types.get(name);
        while let Some(def) = current {
            if &def.name == ancestor {
                return true;
            }
            current = def.parent.as_ref().and_then(|p| self.types.get(p));
        }
        false
    }

    /// Every slot an instance of `name` receives, base type first.  A derived
    /// slot replaces an inherited one of the same browse name in place.
    pub fn effective_slots(&self, name: &QualifiedName) -> Result<Vec<&SlotDefinition>, ArmError> {
        let mut chain = Vec::new();
        let mut current = Some(self.get(name)?);
        while let Some(def) = current {
            chain.push(def);
            current = match &def.parent {
                Some(parent) => Some(self.get(parent)?),
                None => None,
            };
        }

        let mut slots: Vec<&SlotDefinition> = Vec::new();
        for def in chain.into_iter().rev() {
            for slot in &def.slots {
                match slots.iter().position(|s| s.browse_name == slot.browse_name) {
                    Some(i) => slots[i] = slot,
                    None => slots.push(slot),
                }
            }
        }
        Ok(slots)
    }
}

fn check_initial(data_type: DataType, initial: &Variant) -> Result<(), ArmError> {
    if initial.data_type() != data_type {
        return Err(ArmError::TypeMismatch {
            expected: data_type,
            actual: initial.data_type(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qn(name: &str) -> QualifiedName {
        QualifiedName::new(1, name)
    }

    fn double_slot(initial: f64) -> SlotKind {
        SlotKind::Variable {
            data_type: DataType::Double,
            access_level: AccessLevel::ReadOnly,
            initial: Variant::Double(initial),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = TypeRegistry::new();
        reg.register(TypeDefinition::object(qn("JointType"))).unwrap();
        let err = reg.register(TypeDefinition::object(qn("JointType"))).unwrap_err();
        assert!(matches!(err, ArmError::DuplicateType(ref n) if n.name == "JointType"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_parent_or_slot_type_is_rejected() {
        let mut reg = TypeRegistry::new();
        let err = reg
            .register(TypeDefinition::object(qn("Arm")).derived_from(qn("Missing")))
            .unwrap_err();
        assert!(matches!(err, ArmError::UnknownType(_)));

        let err = reg
            .register(
                TypeDefinition::object(qn("Arm")).mandatory("Joint1", SlotKind::Instance(qn("Nope"))),
            )
            .unwrap_err();
        assert!(matches!(err, ArmError::UnknownType(ref n) if n.name == "Nope"));
        assert!(reg.is_empty());
    }

    #[test]
    fn initial_value_must_match_data_type() {
        let mut reg = TypeRegistry::new();
        let bad = TypeDefinition::object(qn("T")).mandatory(
            "Flag",
            SlotKind::Variable {
                data_type: DataType::Boolean,
                access_level: AccessLevel::ReadOnly,
                initial: Variant::Double(1.0),
            },
        );
        assert!(matches!(reg.register(bad), Err(ArmError::TypeMismatch { .. })));
    }

    #[test]
    fn duplicate_slot_names_are_rejected() {
        let mut reg = TypeRegistry::new();
        let def = TypeDefinition::object(qn("T"))
            .mandatory("A", double_slot(0.0))
            .optional("A", double_slot(1.0));
        assert!(matches!(reg.register(def), Err(ArmError::InvalidArgument(_))));
    }

    #[test]
    fn variable_type_cannot_derive_from_object_type() {
        let mut reg = TypeRegistry::new();
        reg.register(TypeDefinition::object(qn("Base"))).unwrap();
        let def = TypeDefinition::variable(
            qn("Pos"),
            DataType::Double,
            AccessLevel::ReadOnly,
            Variant::Double(0.0),
        )
        .derived_from(qn("Base"));
        assert!(matches!(reg.register(def), Err(ArmError::InvalidArgument(_))));
    }

    #[test]
    fn subtype_relation_is_transitive() {
        let mut reg = TypeRegistry::new();
        reg.register(TypeDefinition::object(qn("Device"))).unwrap();
        reg.register(TypeDefinition::object(qn("Motion")).derived_from(qn("Device")))
            .unwrap();
        reg.register(TypeDefinition::object(qn("Arm")).derived_from(qn("Motion")))
            .unwrap();

        assert!(reg.is_subtype_of(&qn("Arm"), &qn("Device")));
        assert!(reg.is_subtype_of(&qn("Arm"), &qn("Arm")));
        assert!(!reg.is_subtype_of(&qn("Device"), &qn("Arm")));
        assert!(!reg.is_subtype_of(&qn("Unknown"), &qn("Device")));
    }

    #[test]
    fn effective_slots_put_base_first_and_let_derived_override() {
        let mut reg = TypeRegistry::new();
        reg.register(
            TypeDefinition::object(qn("Base"))
                .mandatory("A", double_slot(1.0))
                .mandatory("B", double_slot(2.0)),
        )
        .unwrap();
        reg.register(
            TypeDefinition::object(qn("Derived"))
                .derived_from(qn("Base"))
                .mandatory("C", double_slot(3.0))
                .optional("A", double_slot(9.0)),
        )
        .unwrap();

        let slots = reg.effective_slots(&qn("Derived")).unwrap();
        let names: Vec<_> = slots.iter().map(|s| s.browse_name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(slots[0].rule, ModellingRule::Optional);
    }

    #[test]
    fn iter_follows_registration_order() {
        let mut reg = TypeRegistry::new();
        for name in ["Z", "A", "M"] {
            reg.register(TypeDefinition::object(qn(name))).unwrap();
        }
        let names: Vec<_> = reg.iter().map(|d| d.name.name.as_str()).collect();
        assert_eq!(names, ["Z", "A", "M"]);
    }
}
