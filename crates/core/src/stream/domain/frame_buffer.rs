use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::detection::domain::face_detector::DetectorKind;
use crate::rendering::jpeg::encode_jpeg_or_placeholder;
use crate::rendering::overlay::{placeholder, Placeholder};
use crate::shared::emotion::EmotionVector;
use crate::shared::frame::Frame;
use crate::shared::observation::FaceObservation;
use crate::stream::domain::metrics::{InferenceTimes, MetricsSnapshot};

#[derive(Default)]
struct Published {
    raw: Option<Arc<Frame>>,
    processed: Option<Arc<Frame>>,
    observations: Arc<Vec<FaceObservation>>,
    /// First face of the last frame that had any faces.
    primary: Option<EmotionVector>,
    fps: u32,
    inference: InferenceTimes,
}

/// Latest frames and metrics of one stream, shared between its capture
/// thread (the only writer) and any number of readers.
///
/// Everything sits behind a single mutex that is held only to swap or clone
/// `Arc`s and small values. Frames are immutable once published, so a reader
/// holding one never sees it change. Encoding happens after the guard is
/// released.
pub struct FrameBuffer {
    inner: Mutex<Published>,
    no_feed: Arc<Frame>,
    frame_interval: Duration,
    detector_kind: DetectorKind,
    jpeg_quality: u8,
}

impl FrameBuffer {
    pub fn new(frame_interval: Duration, detector_kind: DetectorKind, jpeg_quality: u8) -> Self {
        Self {
            inner: Mutex::new(Published::default()),
            no_feed: Arc::new(placeholder(Placeholder::NoFeed)),
            frame_interval,
            detector_kind,
            jpeg_quality,
        }
    }

    // A reader that panicked mid-clone leaves nothing half-written.
    fn lock(&self) -> MutexGuard<'_, Published> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn publish_raw(&self, frame: impl Into<Arc<Frame>>, fps: u32) {
        let frame = frame.into();
        let mut inner = self.lock();
        inner.raw = Some(frame);
        inner.fps = fps;
    }

    /// Replaces the processed frame and its observations in one step.
    pub fn publish_processed(&self, frame: Frame, observations: Vec<FaceObservation>) {
        let frame = Arc::new(frame);
        let primary = observations.first().map(|o| o.emotions);
        let observations = Arc::new(observations);
        let mut inner = self.lock();
        inner.processed = Some(frame);
        inner.observations = observations;
        if primary.is_some() {
            inner.primary = primary;
        }
    }

    pub fn record_inference(&self, elapsed: Duration) {
        self.lock().inference.record(elapsed);
    }

    /// Latest raw or processed frame, or the "no feed" placeholder.
    pub fn get_frame(&self, processed: bool) -> Arc<Frame> {
        let published = {
            let inner = self.lock();
            if processed {
                inner.processed.clone()
            } else {
                inner.raw.clone()
            }
        };
        published.unwrap_or_else(|| self.no_feed.clone())
    }

    /// JPEG bytes of [`FrameBuffer::get_frame`]. Never fails.
    pub fn get_jpeg(&self, processed: bool) -> Vec<u8> {
        let frame = self.get_frame(processed);
        encode_jpeg_or_placeholder(&frame, self.jpeg_quality)
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        let inner = self.lock();
        MetricsSnapshot {
            fps: inner.fps,
            avg_inference_time: inner.inference.mean(),
            max_inference_time: inner.inference.max(),
            frame_interval: self.frame_interval.as_secs_f64(),
            detector_kind: self.detector_kind,
        }
    }

    /// Observations that belong to the current processed frame.
    pub fn observations(&self) -> Arc<Vec<FaceObservation>> {
        self.lock().observations.clone()
    }

    /// First face of the most recent frame with faces, if any frame had one.
    pub fn latest_primary(&self) -> Option<EmotionVector> {
        self.lock().primary
    }
}
