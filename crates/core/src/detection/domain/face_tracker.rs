use std::collections::VecDeque;

use crate::shared::constants::{
    CURRENT_WEIGHT, HISTORY_DEPTH, PREVIOUS_WEIGHT, TRACKING_THRESHOLD_PX,
};
use crate::shared::face_rect::FaceRect;

/// Positional stabilizer for face rectangles across frames.
///
/// Each detection is matched to the nearest rectangle (by center distance)
/// of the most recent tracked frame. Matches closer than `threshold` are
/// blended: `0.7 * current + 0.3 * previous` by default. There is no
/// identity beyond that nearest-center match.
pub struct FaceTracker {
    history: VecDeque<Vec<FaceRect>>,
    depth: usize,
    threshold: f64,
    weights: (f64, f64),
}

impl FaceTracker {
    pub fn new(depth: usize, threshold: f64, current_weight: f64, previous_weight: f64) -> Self {
        Self {
            history: VecDeque::with_capacity(depth + 1),
            depth: depth.max(1),
            threshold,
            weights: (current_weight, previous_weight),
        }
    }

    pub fn track(&mut self, detected: &[FaceRect]) -> Vec<FaceRect> {
        let Some(last) = self.history.back() else {
            self.history.push_back(detected.to_vec());
            return detected.to_vec();
        };

        // Hold the last known faces through dropped detections.
        if detected.is_empty() {
            return last.clone();
        }

        let tracked: Vec<FaceRect> = detected
            .iter()
            .map(|current| match nearest(current, last) {
                Some((prev, distance)) if distance < self.threshold => {
                    current.blend(prev, self.weights.0, self.weights.1)
                }
                _ => *current,
            })
            .collect();

        self.history.push_back(tracked.clone());
        while self.history.len() > self.depth {
            self.history.pop_front();
        }
        tracked
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn latest(&self) -> Option<&[FaceRect]> {
        self.history.back().map(|v| v.as_slice())
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new(
            HISTORY_DEPTH,
            TRACKING_THRESHOLD_PX,
            CURRENT_WEIGHT,
            PREVIOUS_WEIGHT,
        )
    }
}

fn nearest<'a>(current: &FaceRect, candidates: &'a [FaceRect]) -> Option<(&'a FaceRect, f64)> {
    candidates
        .iter()
        .map(|c| (c, current.center_distance(c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
