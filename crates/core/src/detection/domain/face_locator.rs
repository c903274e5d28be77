use crate::detection::domain::face_detector::{DetectionParams, DetectorKind, FaceDetector};
use crate::detection::domain::face_tracker::FaceTracker;
use crate::shared::face_rect::FaceRect;
use crate::shared::frame::Frame;

/// Finds faces in a frame and stabilizes them against recent frames.
///
/// Detection runs a strict pass, then one permissive retry when the strict
/// pass finds nothing. Tracking is delegated to [`FaceTracker`].
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
    kind: DetectorKind,
    primary: DetectionParams,
    permissive: DetectionParams,
    tracker: FaceTracker,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>, kind: DetectorKind, confidence: f64) -> Self {
        Self {
            detector,
            kind,
            primary: DetectionParams::primary(confidence),
            permissive: DetectionParams::permissive(confidence),
            tracker: FaceTracker::default(),
        }
    }

    pub fn with_tracker(mut self, tracker: FaceTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    /// Raw detections for `frame`, clamped to its bounds.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRect>, Box<dyn std::error::Error>> {
        let mut faces = self.detector.detect(frame, &self.primary)?;
        if faces.is_empty() {
            log::trace!("No faces at strict thresholds, retrying permissively");
            faces = self.detector.detect(frame, &self.permissive)?;
        }
        Ok(faces
            .iter()
            .filter_map(|r| r.clamp_to(frame.width(), frame.height()))
            .collect())
    }

    pub fn track(&mut self, detected: &[FaceRect]) -> Vec<FaceRect> {
        self.tracker.track(detected)
    }

    /// Drops tracked faces so the next frame is taken as detected.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    /// `detect` followed by `track`.
    pub fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceRect>, Box<dyn std::error::Error>> {
        let detected = self.detect(frame)?;
        Ok(self.track(&detected))
    }
}
