//! Typed axis values shared by the parser, the axis model and the request model.

use serde::{Deserialize, Serialize};

/// Sentinel accepted by gated axes meaning "keep the host default".
pub const SENTINEL_DEFAULT: &str = "Default";
/// Sentinel meaning "feature disabled" on gated axes with choices, and
/// "no VAE" on the VAE axis.
pub const SENTINEL_NONE: &str = "None";
/// Sentinel meaning "let the host pick the VAE".
pub const SENTINEL_AUTOMATIC: &str = "Automatic";

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

/// Declared type of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
    String,
    /// Placeholder axis that carries no values.
    None,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AxisValue
// ---------------------------------------------------------------------------

/// A single parsed axis value.
///
/// Serializes untagged so manifests and combination hashes carry plain JSON
/// scalars (`20`, `7.5`, `true`, `"Euler a"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl AxisValue {
    /// Numeric view used for bound checks. Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value is the literal text `sentinel`.
    pub fn is_text(&self, sentinel: &str) -> bool {
        self.as_str() == Some(sentinel)
    }

    /// Whether the value's runtime type matches the declared axis type.
    pub fn matches(&self, value_type: ValueType) -> bool {
        matches!(
            (self, value_type),
            (Self::Int(_), ValueType::Integer)
                | (Self::Float(_), ValueType::Float)
                | (Self::Bool(_), ValueType::Boolean)
                | (Self::Text(_), ValueType::String)
        )
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Bool(v) => serde_json::Value::from(*v),
            Self::Text(v) => serde_json::Value::from(v.as_str()),
        }
    }
}

impl std::fmt::Display for AxisValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Text(v) => f.write_str(v),
        }
    }
}
