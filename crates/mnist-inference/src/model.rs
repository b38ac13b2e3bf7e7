//! Pretrained digit classifier backed by ONNX Runtime.
//!
//! The model is loaded once and shared read-only between requests. Execution
//! provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CPU fallback on all platforms

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{InferenceError, InferenceResult};
use crate::preprocess::INPUT_SHAPE;

/// A classifier mapping a normalized `[1, 28, 28, 1]` tensor to class scores.
///
/// Implementations must be safe to call from many requests at once.
pub trait Classifier: Send + Sync {
    /// Per-class scores for a single input tensor.
    fn scores(&self, input: &Array4<f32>) -> InferenceResult<Vec<f32>>;

    /// Index of the highest scoring class.
    fn predict(&self, input: &Array4<f32>) -> InferenceResult<usize> {
        let scores = self.scores(input)?;
        argmax(&scores).ok_or(InferenceError::EmptyOutput)
    }

    /// Human readable description of the loaded model.
    fn describe(&self) -> String {
        "classifier".to_string()
    }
}

/// Index of the maximum score. Ties go to the lowest index and NaN never wins.
///
/// Returns `None` when there is no non-NaN score.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }

    best.map(|(i, _)| i)
}

/// Reject tensors that do not match the model's input contract.
pub fn check_input_shape(input: &Array4<f32>) -> InferenceResult<()> {
    if input.shape() != INPUT_SHAPE {
        return Err(InferenceError::invalid_shape(&INPUT_SHAPE, input.shape()));
    }
    Ok(())
}

/// Digit classifier running an ONNX model.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    model_path: PathBuf,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Load the model artifact at `model_path`.
    ///
    /// Returns error if the file doesn't exist or cannot be loaded.
    pub fn load(model_path: impl AsRef<Path>) -> InferenceResult<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(InferenceError::model_not_found(model_path.display().to_string()));
        }

        let session = create_session(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| InferenceError::model_load("Model declares no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferenceError::model_load("Model declares no outputs"))?;

        info!(
            model_path = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "Digit classifier initialized"
        );

        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.to_path_buf(),
            input_name,
            output_name,
        })
    }

    /// Path the model was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Name of the model's input tensor.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Name of the model output read as class scores.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    fn to_value(input: &Array4<f32>) -> InferenceResult<Value> {
        let data: Vec<f32> = input.iter().copied().collect();
        Tensor::from_array((INPUT_SHAPE.to_vec(), data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::internal(format!("Failed to create tensor: {}", e)))
    }
}

impl Classifier for OnnxClassifier {
    fn scores(&self, input: &Array4<f32>) -> InferenceResult<Vec<f32>> {
        check_input_shape(input)?;
        let value = Self::to_value(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![value])
            .map_err(|e| InferenceError::inference(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| InferenceError::inference(format!("Missing {} tensor", self.output_name)))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference(format!("Failed to extract tensor: {}", e)))?;

        let scores: Vec<f32> = tensor.1.iter().copied().collect();
        debug!(classes = scores.len(), "Inference completed");

        Ok(scores)
    }

    fn describe(&self) -> String {
        self.model_path.display().to_string()
    }
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> InferenceResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| InferenceError::model_load(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| InferenceError::model_load(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::model_load(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for digit classification");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for digit classification");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| InferenceError::model_load(format!("Failed to load ONNX model: {}", e)))
}
