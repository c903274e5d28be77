use std::path::{Path, PathBuf};

use crate::detection::domain::face_detector::{DetectorKind, DetectorProvider, FaceDetector};
use crate::shared::constants::{BLAZEFACE_MODEL_NAME, YOLO_MODEL_NAME, YOLO_MODEL_URL};
use crate::shared::model_resolver::{self, ProgressFn};

use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::onnx_yolo_detector::OnnxYoloDetector;

/// Model file name and optional download URL for a detector kind.
pub fn model_for(kind: DetectorKind) -> (&'static str, Option<&'static str>) {
    match kind {
        DetectorKind::Fast => (BLAZEFACE_MODEL_NAME, None),
        DetectorKind::Accurate => (YOLO_MODEL_NAME, Some(YOLO_MODEL_URL)),
    }
}

/// Resolves the model for `kind` and loads the matching backend.
pub fn create_detector(
    kind: DetectorKind,
    model_dirs: &[PathBuf],
    progress: Option<ProgressFn>,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let (name, url) = model_for(kind);
    let path = model_resolver::resolve(name, url, model_dirs, progress)?;
    create_detector_from(kind, &path)
}

pub fn create_detector_from(
    kind: DetectorKind,
    model_path: &Path,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Loading {kind} face detector from {}", model_path.display());
    Ok(match kind {
        DetectorKind::Fast => Box::new(OnnxBlazefaceDetector::new(model_path)?),
        DetectorKind::Accurate => Box::new(OnnxYoloDetector::new(model_path)?),
    })
}

/// Loads ONNX detectors from the model cache and `model_dirs`.
#[derive(Debug, Clone, Default)]
pub struct OnnxDetectorProvider {
    model_dirs: Vec<PathBuf>,
}

impl OnnxDetectorProvider {
    pub fn new(model_dirs: Vec<PathBuf>) -> Self {
        Self { model_dirs }
    }
}

impl DetectorProvider for OnnxDetectorProvider {
    fn create(&self, kind: DetectorKind) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
        create_detector(kind, &self.model_dirs, None)
    }
}
