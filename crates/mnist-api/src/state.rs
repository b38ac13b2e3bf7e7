//! Application state.

use std::sync::Arc;

use mnist_inference::{Classifier, InferenceResult, OnnxClassifier};
use tracing::info;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub classifier: Arc<dyn Classifier>,
}

impl AppState {
    /// Create application state, loading the model from the configured path.
    pub fn new(config: ApiConfig) -> InferenceResult<Self> {
        info!("Model Path : {}", config.model_path.display());
        let classifier = OnnxClassifier::load(&config.model_path)?;
        info!("Model Loaded Successfully");

        Ok(Self::with_classifier(config, Arc::new(classifier)))
    }

    /// Create application state around an already loaded classifier.
    pub fn with_classifier(config: ApiConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self { config, classifier }
    }
}
