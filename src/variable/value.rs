use crate::foundation::error::{CadenzaError, CadenzaResult};

/// A typed operand produced or consumed by trigger expressions.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Boolean operand.
    Bool(bool),
    /// Integer operand.
    Int(i64),
    /// Real operand.
    Real(f64),
    /// String operand.
    Str(String),
}

impl Value {
    /// Static type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Str(_) => "string",
        }
    }

    /// Read as boolean; errors on any other type.
    pub fn as_bool(&self) -> CadenzaResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(CadenzaError::expression(format!(
                "expected bool, got {}",
                other.type_name()
            ))),
        }
    }

    /// Read as a real number, promoting integers.
    pub fn as_real(&self) -> CadenzaResult<f64> {
        match self {
            Self::Int(i) => Ok(*i as f64),
            Self::Real(r) => Ok(*r),
            other => Err(CadenzaError::expression(format!(
                "expected numeric operand, got {}",
                other.type_name()
            ))),
        }
    }

    /// Whether this value is numeric (int or real).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Real(_))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}
