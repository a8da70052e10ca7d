//! Typed values carried by variables and method arguments.
//!
//! [`Variant`] is a closed sum type: every boundary that accepts a value
//! matches on it exhaustively and compares its [`DataType`] against the
//! declared one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Text with a locale tag, e.g. `("en", "Joint 1")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalizedText {
    pub locale: String,
    pub text: String,
}

impl LocalizedText {
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            text: text.into(),
        }
    }

    /// Shorthand for English text.
    pub fn en(text: impl Into<String>) -> Self {
        Self::new("en", text)
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Declared data type of a variable or argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Double,
    String,
    LocalizedText,
    DoubleArray,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "Boolean",
            DataType::Int32 => "Int32",
            DataType::Double => "Double",
            DataType::String => "String",
            DataType::LocalizedText => "LocalizedText",
            DataType::DoubleArray => "Double[]",
        };
        f.write_str(name)
    }
}

/// A value tagged with its [`DataType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    Boolean(bool),
    Int32(i32),
    Double(f64),
    String(String),
    LocalizedText(LocalizedText),
    DoubleArray(Vec<f64>),
}

impl Variant {
    pub fn data_type(&self) -> DataType {
        match self {
            Variant::Boolean(_) => DataType::Boolean,
            Variant::Int32(_) => DataType::Int32,
            Variant::Double(_) => DataType::Double,
            Variant::String(_) => DataType::String,
            Variant::LocalizedText(_) => DataType::LocalizedText,
            Variant::DoubleArray(_) => DataType::DoubleArray,
        }
    }

    /// The zero value of `data_type`: `false`, `0`, `0.0`, empty text, or an
    /// empty array.
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Variant::Boolean(false),
            DataType::Int32 => Variant::Int32(0),
            DataType::Double => Variant::Double(0.0),
            DataType::String => Variant::String(String::new()),
            DataType::LocalizedText => Variant::LocalizedText(LocalizedText::en("")),
            DataType::DoubleArray => Variant::DoubleArray(Vec::new()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        match self {
            Variant::DoubleArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int32(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<LocalizedText> for Variant {
    fn from(v: LocalizedText) -> Self {
        Variant::LocalizedText(v)
    }
}

impl From<Vec<f64>> for Variant {
    fn from(v: Vec<f64>) -> Self {
        Variant::DoubleArray(v)
    }
}
