use std::collections::VecDeque;

use crate::shared::constants::{CURRENT_WEIGHT, HISTORY_DEPTH, PREVIOUS_WEIGHT};
use crate::shared::emotion::{Emotion, EmotionVector};

/// Bounded history of per-frame emotion results for one stream.
///
/// Index 0 is the most recent frame. Each entry holds one vector per face,
/// in detection order.
#[derive(Debug, Clone)]
pub struct InferenceHistory {
    entries: VecDeque<Vec<EmotionVector>>,
    depth: usize,
}

impl InferenceHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth + 1),
            depth: depth.max(1),
        }
    }

    /// Records a frame's results as the new most recent entry.
    pub fn push(&mut self, frame_results: Vec<EmotionVector>) {
        self.entries.push_front(frame_results);
        self.entries.truncate(self.depth);
    }

    /// First face of the most recent frame, if any.
    pub fn latest_primary(&self) -> Option<&EmotionVector> {
        self.entries.front().and_then(|faces| faces.first())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every frame, e.g. after the camera was reopened.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for InferenceHistory {
    fn default() -> Self {
        Self::new(HISTORY_DEPTH)
    }
}

/// Blends a fresh inference with the previous frame's result.
///
/// The reference is the first face of the most recent history entry, for
/// every face in the current frame. Faces are not identified across frames.
#[derive(Debug, Clone, Copy)]
pub struct TemporalSmoother {
    current_weight: f64,
    previous_weight: f64,
}

impl TemporalSmoother {
    pub fn new(current_weight: f64, previous_weight: f64) -> Self {
        Self {
            current_weight,
            previous_weight,
        }
    }

    pub fn smooth(&self, current: &EmotionVector, history: &InferenceHistory) -> EmotionVector {
        let Some(previous) = history.latest_primary() else {
            return *current;
        };
        let mut blended = *current;
        for emotion in Emotion::ALL {
            blended.set(
                emotion,
                self.current_weight * current.get(emotion)
                    + self.previous_weight * previous.get(emotion),
            );
        }
        blended.normalized()
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(CURRENT_WEIGHT, PREVIOUS_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn happy() -> EmotionVector {
        EmotionVector::from_probs([0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_empty_history_returns_current() {
        let smoother = TemporalSmoother::default();
        let history = InferenceHistory::default();
        assert_eq!(smoother.smooth(&happy(), &history), happy());
    }

    #[test]
    fn test_blends_with_most_recent_first_face() {
        let smoother = TemporalSmoother::default();
        let mut history = InferenceHistory::default();
        history.push(vec![happy()]);
        history.push(vec![EmotionVector::neutral(), happy()]);

        let out = smoother.smooth(&happy(), &history);
        assert_relative_eq!(out.get(Emotion::Happy), 0.7, epsilon = 1e-9);
        assert_relative_eq!(out.get(Emotion::Neutral), 0.3, epsilon = 1e-9);
        assert_relative_eq!(out.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_previous_entry_without_faces_is_ignored() {
        let smoother = TemporalSmoother::default();
        let mut history = InferenceHistory::default();
        history.push(vec![]);
        assert_eq!(smoother.smooth(&happy(), &history), happy());
    }

    #[test]
    fn test_output_is_renormalized() {
        let smoother = TemporalSmoother::new(0.9, 0.9);
        let mut history = InferenceHistory::default();
        history.push(vec![EmotionVector::neutral()]);
        let out = smoother.smooth(&happy(), &history);
        assert_relative_eq!(out.sum(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(out.get(Emotion::Happy), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_history_bounded_most_recent_first() {
        let mut history = InferenceHistory::default();
        for i in 0..8 {
            let mut v = EmotionVector::neutral();
            v.set(Emotion::Happy, i as f64);
            history.push(vec![v]);
        }
        assert_eq!(history.len(), HISTORY_DEPTH);
        assert_relative_eq!(history.latest_primary().unwrap().get(Emotion::Happy), 7.0);
    }

    #[test]
    fn test_clear() {
        let mut history = InferenceHistory::default();
        history.push(vec![happy()]);
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest_primary().is_none());
    }
}
