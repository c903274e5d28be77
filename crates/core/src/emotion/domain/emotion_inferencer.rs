use crate::emotion::domain::emotion_model::EmotionModel;
use crate::emotion::domain::face_crop::to_model_input;
use crate::shared::emotion::{Emotion, EmotionVector};
use crate::shared::frame::Frame;

/// Neutral floor applied to uncertain predictions.
const NEUTRAL_FLOOR: f64 = 0.6;

/// Scale applied to every non-neutral label of an uncertain prediction.
const UNCERTAIN_SCALE: f64 = 0.8;

/// Turns a face crop into an emotion distribution.
///
/// Never fails: any error inside preprocessing or the model yields
/// [`EmotionVector::neutral`].
pub struct EmotionInferencer {
    model: Box<dyn EmotionModel>,
    confidence_threshold: f64,
    input_size: u32,
}

impl EmotionInferencer {
    pub fn new(model: Box<dyn EmotionModel>, confidence_threshold: f64, input_size: u32) -> Self {
        Self {
            model,
            confidence_threshold,
            input_size,
        }
    }

    pub fn predict(&mut self, face: &Frame) -> EmotionVector {
        match self.try_predict(face) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Emotion inference failed, using neutral fallback: {e}");
                EmotionVector::neutral()
            }
        }
    }

    fn try_predict(&mut self, face: &Frame) -> Result<EmotionVector, Box<dyn std::error::Error>> {
        let input = to_model_input(face, self.input_size).ok_or("face crop is empty")?;
        let raw = self.model.predict(&input)?;
        let probs = EmotionVector::from_model_output(&raw).ok_or_else(|| {
            format!(
                "model returned {} values, expected {}",
                raw.len(),
                Emotion::COUNT
            )
        })?;
        Ok(correct_low_confidence(probs, self.confidence_threshold))
    }
}

/// Biases an uncertain prediction toward `neutral`.
///
/// When the peak probability is below `threshold`, neutral is raised to at
/// least 0.6 and every other label is scaled by 0.8. The result is always
/// renormalized.
pub fn correct_low_confidence(probs: EmotionVector, threshold: f64) -> EmotionVector {
    let mut probs = probs.normalized();
    if probs.max_probability() < threshold {
        for emotion in Emotion::ALL {
            let p = probs.get(emotion);
            let corrected = if emotion == Emotion::Neutral {
                p.max(NEUTRAL_FLOOR)
            } else {
                p * UNCERTAIN_SCALE
            };
            probs.set(emotion, corrected);
        }
    }
    probs.normalized()
}
