/// Convenience result type used across the renderer.
pub type FlameResult<T> = Result<T, FlameError>;

/// Top-level error taxonomy used by renderer APIs.
#[derive(thiserror::Error, Debug)]
pub enum FlameError {
    /// Invalid flame configuration, detected before any worker starts.
    #[error("validation error: {0}")]
    Validation(String),

    /// A checkpoint does not fit the flame snapshot it is resumed against.
    #[error("state mismatch: {0}")]
    StateMismatch(String),

    /// Failures while a render pass is running.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Errors when serializing or deserializing checkpoints.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlameError {
    /// Build a [`FlameError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FlameError::StateMismatch`] value.
    pub fn state_mismatch(msg: impl Into<String>) -> Self {
        Self::StateMismatch(msg.into())
    }

    /// Build a [`FlameError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`FlameError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
