use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::capture::domain::camera::CameraSource;
use crate::detection::domain::face_detector::DetectorProvider;
use crate::detection::domain::face_locator::FaceLocator;
use crate::emotion::domain::emotion_inferencer::EmotionInferencer;
use crate::emotion::domain::emotion_model::EmotionModelProvider;
use crate::shared::config::StreamConfig;
use crate::shared::emotion::{Emotion, EmotionVector};
use crate::shared::frame::Frame;
use crate::shared::observation::FaceObservation;
use crate::stream::capture_loop::CaptureLoop;
use crate::stream::domain::frame_buffer::FrameBuffer;
use crate::stream::domain::metrics::MetricsSnapshot;
use crate::stream::domain::persistence::EmotionRecordGateway;
use crate::stream::domain::stream_status::StreamStatus;
use crate::stream::stream_error::StreamError;
use crate::stream::stream_key::StreamKey;
use crate::stream::stream_state::StreamState;

/// Collaborators injected into every stream a registry creates.
#[derive(Clone)]
pub struct StreamDeps {
    pub camera: Arc<dyn CameraSource>,
    pub detectors: Arc<dyn DetectorProvider>,
    pub models: Arc<dyn EmotionModelProvider>,
    /// Records are stored only for user streams, and only when set.
    pub gateway: Option<Arc<dyn EmotionRecordGateway>>,
}

struct Worker {
    handle: JoinHandle<()>,
    /// Disconnects when the capture thread exits.
    done: Receiver<()>,
}

/// One camera stream: a capture thread plus the state it publishes.
///
/// Reads never block on the capture thread beyond a short copy.
pub struct Stream {
    key: StreamKey,
    config: StreamConfig,
    deps: StreamDeps,
    state: Arc<StreamState>,
    worker: Mutex<Option<Worker>>,
}

impl Stream {
    pub fn new(key: StreamKey, config: StreamConfig, deps: StreamDeps) -> Self {
        let buffer = FrameBuffer::new(config.frame_interval(), config.detector, config.jpeg_quality);
        Self {
            key,
            config,
            deps,
            state: Arc::new(StreamState::new(buffer)),
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the detector and model, opens the camera and spawns the capture
    /// thread. A no-op if the stream is already running.
    ///
    /// Any failure here is reported to the caller and no thread is spawned.
    pub fn start(&self) -> Result<(), StreamError> {
        let mut worker = self.worker();
        if worker.is_some() && self.state.is_running() {
            return Ok(());
        }
        if let Some(previous) = worker.take() {
            self.join(previous);
        }

        let capture = self.build_capture_loop().map_err(|e| {
            self.state.mark_failed(e.to_string());
            e
        })?;

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        self.state.set_running(true);
        self.state.set_status(StreamStatus::Running);
        let handle = thread::Builder::new()
            .name(format!("capture-{}", self.key))
            .spawn(move || {
                let _done = done_tx;
                capture.run();
            })
            .map_err(|e| {
                let err = StreamError::DeviceUnavailable(format!("failed to spawn capture thread: {e}"));
                self.state.mark_failed(err.to_string());
                err
            })?;

        *worker = Some(Worker {
            handle,
            done: done_rx,
        });
        log::info!("Stream {} started on {}", self.key, self.deps.camera.describe());
        Ok(())
    }

    fn build_capture_loop(&self) -> Result<CaptureLoop, StreamError> {
        let kind = self.config.detector;
        let detector = self.deps.detectors.create(kind).map_err(|e| {
            log::error!("Failed to create {kind} face detector: {e}");
            StreamError::Detector(e.to_string())
        })?;
        let model = self.deps.models.load().map_err(|e| {
            log::error!("Failed to load emotion model: {e}");
            StreamError::ModelLoad(e.to_string())
        })?;
        let device = self.deps.camera.open().map_err(|e| {
            log::error!("Failed to open {}: {e}", self.deps.camera.describe());
            StreamError::DeviceUnavailable(e.to_string())
        })?;

        let locator = FaceLocator::new(detector, kind, self.config.face_confidence_threshold);
        let inferencer = EmotionInferencer::new(
            model,
            self.config.emotion_confidence_threshold,
            self.config.input_size,
        );
        let capture = CaptureLoop::new(
            self.deps.camera.clone(),
            device,
            locator,
            inferencer,
            self.state.clone(),
            &self.config,
        );

        Ok(match (self.key.user_id(), &self.deps.gateway) {
            (Some(user_id), Some(gateway)) => {
                capture.with_persistence(user_id, gateway.clone(), self.config.storage_interval())
            }
            _ => capture,
        })
    }

    /// Signals the capture thread to exit and waits up to the join timeout.
    ///
    /// Idempotent; stopping a stream that never started succeeds. If the
    /// thread does not exit in time it is detached and releases the camera
    /// itself once its current read returns.
    pub fn stop(&self) -> Result<(), StreamError> {
        self.state.set_running(false);
        let Some(worker) = self.worker().take() else {
            return Ok(());
        };
        self.join(worker);
        log::info!("Stream {} stopped", self.key);
        Ok(())
    }

    fn join(&self, worker: Worker) {
        match worker.done.recv_timeout(self.config.join_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    log::error!("Capture thread of stream {} panicked", self.key);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Capture thread of stream {} did not exit within {:?}, detaching",
                    self.key,
                    self.config.join_timeout()
                );
            }
        }
        self.state.mark_stopped();
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn status(&self) -> StreamStatus {
        self.state.status()
    }

    /// `Err(DeviceUnavailable)` once the stream has given up on its camera.
    pub fn check(&self) -> Result<(), StreamError> {
        if self.state.status() == StreamStatus::Failed {
            let reason = self
                .state
                .failure()
                .unwrap_or_else(|| "camera failed".to_string());
            return Err(StreamError::DeviceUnavailable(reason));
        }
        Ok(())
    }

    pub fn get_frame(&self, processed: bool) -> Arc<Frame> {
        self.state.buffer().get_frame(processed)
    }

    pub fn get_jpeg(&self, processed: bool) -> Vec<u8> {
        self.state.buffer().get_jpeg(processed)
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.state.buffer().get_metrics()
    }

    pub fn observations(&self) -> Arc<Vec<FaceObservation>> {
        self.state.buffer().observations()
    }

    /// First face of the latest smoothed result and its dominant label.
    pub fn current_emotions(&self) -> (EmotionVector, Emotion) {
        let emotions = self
            .state
            .buffer()
            .latest_primary()
            .unwrap_or_else(EmotionVector::neutral);
        (emotions, emotions.dominant())
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("key", &self.key)
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
