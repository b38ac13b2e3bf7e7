//! Error types for inference operations.

use thiserror::Error;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors that can occur while preprocessing or classifying an image.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid input shape: expected {expected:?}, got {actual:?}")]
    InvalidShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model returned no class scores")]
    EmptyOutput,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InferenceError {
    /// Create a shape mismatch error.
    pub fn invalid_shape(expected: &[usize], actual: &[usize]) -> Self {
        Self::InvalidShape {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a model load error.
    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad(message.into())
    }

    /// Create an inference error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short, stable label for the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::InvalidShape { .. } => "shape",
            Self::ModelNotFound(_) => "model_not_found",
            Self::ModelLoad(_) => "model_load",
            Self::Inference(_) => "inference",
            Self::EmptyOutput => "empty_output",
            Self::Internal(_) => "internal",
        }
    }
}
