use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::detection::domain::face_detector::DetectorKind;
use crate::shared::constants::INFERENCE_SAMPLE_CAPACITY;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Frames-per-second counter latched once per one-second window.
///
/// Each tick counts a frame. The tick that closes a window publishes the
/// count (including itself) as the new rate and restarts the count at zero.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Instant,
    count: u32,
    fps: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            fps: 0,
        }
    }

    /// Counts one frame at `now` and returns the latched rate.
    pub fn tick(&mut self, now: Instant) -> u32 {
        self.count += 1;
        if now.saturating_duration_since(self.window_start) >= FPS_WINDOW {
            self.fps = self.count;
            self.count = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Frames counted in the current, still open window.
    pub fn pending(&self) -> u32 {
        self.count
    }
}

/// Ring of recent inference durations, in seconds.
#[derive(Debug, Clone)]
pub struct InferenceTimes {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl InferenceTimes {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed.as_secs_f64());
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn max(&self) -> f64 {
        self.samples.iter().copied().fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for InferenceTimes {
    fn default() -> Self {
        Self::new(INFERENCE_SAMPLE_CAPACITY)
    }
}

/// Point-in-time view of a stream's performance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub fps: u32,
    /// Seconds.
    pub avg_inference_time: f64,
    /// Seconds.
    pub max_inference_time: f64,
    /// Seconds.
    pub frame_interval: f64,
    pub detector_kind: DetectorKind,
}
