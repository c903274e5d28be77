use std::path::{Path, PathBuf};

use ndarray::Array4;

use crate::detection::infrastructure::execution_provider::load_session;
use crate::emotion::domain::emotion_model::{EmotionModel, EmotionModelProvider};
use crate::shared::constants::EMOTION_MODEL_NAME;
use crate::shared::model_resolver;

/// MobileNetV2 emotion classifier exported to ONNX.
///
/// Expects NHWC input and produces softmax scores in label order.
pub struct OnnxEmotionModel {
    session: ort::session::Session,
}

impl OnnxEmotionModel {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        log::info!("Loaded emotion model from {}", model_path.display());
        Ok(Self { session })
    }

    /// Locates the classifier in the cache or `model_dirs` and loads it.
    pub fn resolve(model_dirs: &[PathBuf]) -> Result<Self, Box<dyn std::error::Error>> {
        let path = model_resolver::resolve(EMOTION_MODEL_NAME, None, model_dirs, None)?;
        Self::new(&path)
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn predict(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(input.clone())?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Emotion model produced no outputs".into());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OnnxEmotionModelProvider {
    model_dirs: Vec<PathBuf>,
}

impl OnnxEmotionModelProvider {
    pub fn new(model_dirs: Vec<PathBuf>) -> Self {
        Self { model_dirs }
    }
}

impl EmotionModelProvider for OnnxEmotionModelProvider {
    fn load(&self) -> Result<Box<dyn EmotionModel>, Box<dyn std::error::Error>> {
        Ok(Box::new(OnnxEmotionModel::resolve(&self.model_dirs)?))
    }
}
