use ndarray::Array4;

/// Domain interface for an emotion classifier.
///
/// `input` is a `[1, size, size, 3]` NHWC batch scaled to `[-1, 1]`. The
/// returned vector is aligned to [`Emotion::ALL`](crate::shared::emotion::Emotion::ALL).
/// Loading happens in the implementation's constructor; a constructed model
/// is ready.
pub trait EmotionModel: Send {
    fn predict(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}

/// Loads a classifier for each new stream.
pub trait EmotionModelProvider: Send + Sync {
    fn load(&self) -> Result<Box<dyn EmotionModel>, Box<dyn std::error::Error>>;
}
