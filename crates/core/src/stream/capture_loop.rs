use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::capture::domain::camera::{CameraDevice, CameraSource, CaptureError};
use crate::detection::domain::face_locator::FaceLocator;
use crate::emotion::domain::emotion_inferencer::EmotionInferencer;
use crate::emotion::domain::face_crop::crop_face;
use crate::emotion::domain::temporal_smoother::{InferenceHistory, TemporalSmoother};
use crate::rendering::overlay::{annotate, with_status, Status};
use crate::shared::config::StreamConfig;
use crate::shared::emotion::EmotionVector;
use crate::shared::frame::Frame;
use crate::shared::observation::FaceObservation;
use crate::stream::domain::metrics::FpsCounter;
use crate::stream::domain::persistence::{EmotionRecordGateway, PersistenceThrottle};
use crate::stream::domain::stream_status::StreamStatus;
use crate::stream::stream_state::StreamState;

/// Granularity at which the reopen backoff notices a stop request.
const BACKOFF_STEP: Duration = Duration::from_millis(50);

struct PersistenceBinding {
    user_id: String,
    gateway: Arc<dyn EmotionRecordGateway>,
    throttle: PersistenceThrottle,
}

/// Body of a stream's capture thread.
///
/// Owns the camera device for the thread's whole life. Each iteration reads
/// one frame and republishes it; when a frame interval has passed since the
/// last processed frame it also runs detect, infer and smooth, publishes the
/// annotated result and offers the first face to the persistence throttle.
///
/// A failed read releases the device, waits out the backoff and reopens it.
/// After `max_read_failures` consecutive failures the stream is marked
/// FAILED and the loop exits.
pub struct CaptureLoop {
    source: Arc<dyn CameraSource>,
    device: Option<Box<dyn CameraDevice>>,
    locator: FaceLocator,
    inferencer: EmotionInferencer,
    smoother: TemporalSmoother,
    history: InferenceHistory,
    persistence: Option<PersistenceBinding>,
    state: Arc<StreamState>,
    fps: FpsCounter,
    last_processed: Option<Instant>,
    frame_interval: Duration,
    reopen_backoff: Duration,
    max_read_failures: u32,
}

impl CaptureLoop {
    pub fn new(
        source: Arc<dyn CameraSource>,
        device: Box<dyn CameraDevice>,
        locator: FaceLocator,
        inferencer: EmotionInferencer,
        state: Arc<StreamState>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            source,
            device: Some(device),
            locator,
            inferencer,
            smoother: TemporalSmoother::default(),
            history: InferenceHistory::default(),
            persistence: None,
            state,
            fps: FpsCounter::new(Instant::now()),
            last_processed: None,
            frame_interval: config.frame_interval(),
            reopen_backoff: config.reopen_backoff(),
            max_read_failures: config.max_read_failures.max(1),
        }
    }

    /// Stores the first face of processed frames for `user_id`, at most once
    /// per `interval`.
    pub fn with_persistence(
        mut self,
        user_id: impl Into<String>,
        gateway: Arc<dyn EmotionRecordGateway>,
        interval: Duration,
    ) -> Self {
        self.persistence = Some(PersistenceBinding {
            user_id: user_id.into(),
            gateway,
            throttle: PersistenceThrottle::new(interval),
        });
        self
    }

    /// Runs until the stream's running flag is cleared or the device fails
    /// for good. Releases the device before returning.
    pub fn run(mut self) {
        log::info!("Capture started on {}", self.source.describe());
        let mut failures = 0u32;

        while self.state.is_running() {
            match self.read_frame() {
                Ok(frame) => {
                    failures = 0;
                    self.handle_frame(frame);
                }
                Err(e) => {
                    failures += 1;
                    log::warn!(
                        "Frame read failed ({failures}/{} consecutive): {e}",
                        self.max_read_failures
                    );
                    if failures >= self.max_read_failures {
                        let reason = format!(
                            "{} failed {failures} consecutive reads: {e}",
                            self.source.describe()
                        );
                        log::error!("Giving up on camera: {reason}");
                        self.state.mark_failed(reason);
                        break;
                    }
                    self.recover();
                }
            }
        }

        self.device = None;
        self.state.mark_stopped();
        log::info!("Capture stopped on {}", self.source.describe());
    }

    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        match self.device.as_mut() {
            Some(device) => device.read_frame(),
            None => Err(CaptureError::Read("camera is not open".into()).into()),
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        let now = Instant::now();
        let fps = self.fps.tick(now);
        let frame = Arc::new(frame);
        self.state.buffer().publish_raw(frame.clone(), fps);

        let due = self
            .last_processed
            .map_or(true, |last| now.saturating_duration_since(last) >= self.frame_interval);
        if due {
            self.last_processed = Some(now);
            self.process(&frame);
        }
    }

    fn process(&mut self, frame: &Frame) {
        let started = Instant::now();
        let buffer = self.state.buffer();

        let faces = match self.locator.locate(frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.sequence());
                buffer.publish_processed(with_status(frame, Status::ProcessingError), Vec::new());
                return;
            }
        };
        if faces.is_empty() {
            buffer.publish_processed(with_status(frame, Status::NoFace), Vec::new());
            return;
        }

        let mut observations = Vec::with_capacity(faces.len());
        for rect in faces {
            let raw = match crop_face(frame, &rect) {
                Some(face) => self.inferencer.predict(&face),
                None => EmotionVector::neutral(),
            };
            let smoothed = self.smoother.smooth(&raw, &self.history);
            observations.push(FaceObservation::new(rect, smoothed));
        }
        self.history
            .push(observations.iter().map(|o| o.emotions).collect());
        buffer.record_inference(started.elapsed());

        let primary = observations[0].emotions;
        buffer.publish_processed(annotate(frame, &observations), observations);
        self.persist(&primary);
    }

    fn persist(&mut self, emotions: &EmotionVector) {
        if let Some(binding) = self.persistence.as_mut() {
            binding.throttle.persist(
                binding.gateway.as_ref(),
                &binding.user_id,
                emotions,
                Instant::now(),
                SystemTime::now(),
            );
        }
    }

    fn recover(&mut self) {
        self.state.set_status(StreamStatus::Recovering);
        self.device = None;
        self.sleep_while_running(self.reopen_backoff);
        if !self.state.is_running() {
            return;
        }
        match self.source.open() {
            Ok(device) => {
                log::info!("Reopened {}", self.source.describe());
                self.device = Some(device);
                self.locator.reset();
                self.history.clear();
                self.state.set_status(StreamStatus::Running);
            }
            Err(e) => log::warn!("Reopening {} failed: {e}", self.source.describe()),
        }
    }

    fn sleep_while_running(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.state.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(BACKOFF_STEP.min(deadline - now));
        }
    }
}
