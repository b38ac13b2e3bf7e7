//! Digit classification core.
//!
//! This crate provides:
//! - Image preprocessing into the fixed `[1, 28, 28, 1]` model input
//! - The `Classifier` seam and an ONNX Runtime implementation
//! - The decode → preprocess → predict pipeline

pub mod error;
pub mod model;
pub mod pipeline;
pub mod preprocess;

pub use error::{InferenceError, InferenceResult};
pub use model::{argmax, check_input_shape, Classifier, OnnxClassifier};
pub use pipeline::{classify_image, Prediction};
pub use preprocess::{preprocess_decoded, preprocess_image, INPUT_SHAPE, INPUT_SIZE};
