/// Convenience result type used across Cadenza.
pub type CadenzaResult<T> = Result<T, CadenzaError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum CadenzaError {
    /// Invalid user-provided or scene-configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while typing or evaluating trigger expressions.
    #[error("expression error: {0}")]
    Expression(String),

    /// Errors while evaluating sequencer state for a tick.
    #[error("sequencing error: {0}")]
    Sequencing(String),

    /// Errors when serializing or deserializing scene data.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenzaError {
    /// Build a [`CadenzaError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CadenzaError::Expression`] value.
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Build a [`CadenzaError::Sequencing`] value.
    pub fn sequencing(msg: impl Into<String>) -> Self {
        Self::Sequencing(msg.into())
    }

    /// Build a [`CadenzaError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
