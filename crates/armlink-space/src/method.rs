//! Method signatures and the handler seam.
//!
//! A method node stores a plain function pointer.  Handlers are stateless:
//! everything they may touch arrives through [`MethodContext`], so the same
//! handler can be shared by every instance of a type.

use armlink_hal::Robot;
use armlink_types::{ArmError, DataType, NodeId, Variant};
use serde::{Deserialize, Serialize};

use crate::AddressSpace;

/// Signature every method handler implements.
pub type MethodHandler = fn(&MethodContext<'_>, &[Variant]) -> Result<Vec<Variant>, ArmError>;

/// What a handler gets to see for one invocation.
pub struct MethodContext<'a> {
    pub space: &'a AddressSpace,
    /// The object the method was called on.
    pub object_id: &'a NodeId,
    pub method_id: &'a NodeId,
    /// The device whose object subtree contains `object_id`, if any.
    pub device: Option<&'a Robot>,
}

impl MethodContext<'_> {
    /// The bound device, or an internal error when the method was called on
    /// an object with no device behind it.
    pub fn require_device(&self) -> Result<&Robot, ArmError> {
        self.device.ok_or_else(|| {
            ArmError::Internal(format!("no device bound to object {}", self.object_id))
        })
    }
}

/// One declared input or output of a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub data_type: DataType,
    /// Required element count for array arguments.  `None` accepts any
    /// length.
    pub array_length: Option<usize>,
    pub description: Option<String>,
}

impl Argument {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            array_length: None,
            description: None,
        }
    }

    pub fn array(name: impl Into<String>, data_type: DataType, length: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            array_length: Some(length),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Type and (for arrays) length check of one supplied value.
    pub fn check(&self, value: &Variant) -> Result<(), ArmError> {
        if value.data_type() != self.data_type {
            return Err(ArmError::TypeMismatch {
                expected: self.data_type,
                actual: value.data_type(),
            });
        }
        if let (Some(expected), Some(values)) = (self.array_length, value.as_f64_slice())
            && values.len() != expected
        {
            return Err(ArmError::ArityMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(())
    }
}
