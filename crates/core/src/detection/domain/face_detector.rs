use serde::{Deserialize, Serialize};

use crate::shared::face_rect::FaceRect;
use crate::shared::frame::Frame;

/// Per-call detection thresholds.
///
/// The locator runs a strict pass first and retries with a permissive set
/// when the strict pass finds nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    pub confidence: f64,
    /// Minimum face edge length in source pixels.
    pub min_face_size: u32,
}

impl DetectionParams {
    pub const PRIMARY_MIN_FACE: u32 = 30;
    pub const PERMISSIVE_MIN_FACE: u32 = 20;

    pub fn primary(confidence: f64) -> Self {
        Self {
            confidence,
            min_face_size: Self::PRIMARY_MIN_FACE,
        }
    }

    /// Lower cutoff (60% of primary, floor 0.1) and smaller minimum size.
    pub fn permissive(confidence: f64) -> Self {
        Self {
            confidence: (confidence * 0.6).max(0.1),
            min_face_size: Self::PERMISSIVE_MIN_FACE,
        }
    }
}

/// Domain interface for face detection.
///
/// Implementations may cache buffers between frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        params: &DetectionParams,
    ) -> Result<Vec<FaceRect>, Box<dyn std::error::Error>>;
}

/// Builds detectors for new streams. Each stream owns its own instance.
pub trait DetectorProvider: Send + Sync {
    fn create(&self, kind: DetectorKind) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>>;
}

/// Which detector backend a locator was built with. Chosen once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// BlazeFace short-range: fast, lower accuracy.
    Fast,
    /// YOLO face: slower, higher accuracy.
    Accurate,
}

impl DetectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorKind::Fast => "fast",
            DetectorKind::Accurate => "accurate",
        }
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    /// Also accepts the legacy `haar`/`dnn` names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "haar" => Ok(DetectorKind::Fast),
            "accurate" | "dnn" => Ok(DetectorKind::Accurate),
            other => Err(format!("unknown detector kind '{other}'")),
        }
    }
}
