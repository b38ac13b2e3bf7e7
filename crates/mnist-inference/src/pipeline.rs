//! End-to-end classification of uploaded image bytes.

use crate::error::{InferenceError, InferenceResult};
use crate::model::{argmax, Classifier};
use crate::preprocess::preprocess_image;

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the highest scoring class.
    pub class_index: usize,
    /// Raw per-class scores as returned by the model.
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Score of the predicted class.
    pub fn confidence(&self) -> f32 {
        self.scores[self.class_index]
    }
}

/// Decode, normalize and classify raw image bytes.
pub fn classify_image(classifier: &dyn Classifier, bytes: &[u8]) -> InferenceResult<Prediction> {
    let input = preprocess_image(bytes)?;
    let scores = classifier.scores(&input)?;
    let class_index = argmax(&scores).ok_or(InferenceError::EmptyOutput)?;

    Ok(Prediction { class_index, scores })
}
