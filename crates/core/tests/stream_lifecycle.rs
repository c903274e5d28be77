use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use ndarray::Array4;

use moodlens_core::capture::domain::camera::{CameraDevice, CameraSource};
use moodlens_core::detection::domain::face_detector::{
    DetectionParams, DetectorKind, DetectorProvider, FaceDetector,
};
use moodlens_core::emotion::domain::emotion_model::{EmotionModel, EmotionModelProvider};
use moodlens_core::shared::config::{ConfigError, StreamConfig};
use moodlens_core::shared::emotion::{Emotion, EmotionVector};
use moodlens_core::shared::face_rect::FaceRect;
use moodlens_core::shared::frame::Frame;
use moodlens_core::stream::domain::persistence::EmotionRecordGateway;
use moodlens_core::stream::domain::stream_status::StreamStatus;
use moodlens_core::stream::stream_error::StreamError;
use moodlens_core::stream::stream_handle::StreamDeps;
use moodlens_core::stream::stream_key::StreamKey;
use moodlens_core::stream::stream_registry::StreamRegistry;

const W: u32 = 96;
const H: u32 = 72;

// --- Fakes ---

/// Produces frames at ~200 fps until `broken` is set, then fails every read.
struct FakeDevice {
    sequence: u64,
    broken: Arc<AtomicBool>,
}

impl CameraDevice for FakeDevice {
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        thread::sleep(Duration::from_millis(5));
        if self.broken.load(Ordering::SeqCst) {
            return Err("device unplugged".into());
        }
        self.sequence += 1;
        Ok(Frame::new(vec![120; (W * H * 3) as usize], W, H, self.sequence))
    }
}

#[derive(Default)]
struct FakeCamera {
    opens: AtomicUsize,
    broken: Arc<AtomicBool>,
    /// Simulates a slow device handshake.
    open_delay_ms: AtomicU64,
}

impl CameraSource for FakeCamera {
    fn open(&self) -> Result<Box<dyn CameraDevice>, Box<dyn std::error::Error>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(self.open_delay_ms.load(Ordering::SeqCst)));
        if self.broken.load(Ordering::SeqCst) {
            return Err("device unplugged".into());
        }
        Ok(Box::new(FakeDevice {
            sequence: 0,
            broken: self.broken.clone(),
        }))
    }

    fn describe(&self) -> String {
        "fake webcam".into()
    }
}

struct CenterFace;

impl FaceDetector for CenterFace {
    fn detect(
        &mut self,
        _frame: &Frame,
        _params: &DetectionParams,
    ) -> Result<Vec<FaceRect>, Box<dyn std::error::Error>> {
        Ok(vec![FaceRect::new(32, 20, 32, 32)])
    }
}

struct Detectors;

impl DetectorProvider for Detectors {
    fn create(
        &self,
        _kind: DetectorKind,
    ) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
        Ok(Box::new(CenterFace))
    }
}

/// Uncertain output: peak 0.3 on `sad`, so low-confidence correction applies.
struct UncertainModel;

impl EmotionModel for UncertainModel {
    fn predict(&mut self, _input: &Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        Ok(vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.3, 0.2])
    }
}

struct Models;

impl EmotionModelProvider for Models {
    fn load(&self) -> Result<Box<dyn EmotionModel>, Box<dyn std::error::Error>> {
        Ok(Box::new(UncertainModel))
    }
}

#[derive(Default)]
struct RecordingGateway {
    records: Mutex<Vec<(String, Instant)>>,
}

impl EmotionRecordGateway for RecordingGateway {
    fn save_emotion_record(
        &self,
        user_id: &str,
        emotions: &EmotionVector,
        _timestamp: SystemTime,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        assert!((emotions.sum() - 1.0).abs() < 1e-6);
        self.records
            .lock()
            .unwrap()
            .push((user_id.to_string(), Instant::now()));
        Ok(())
    }
}

// --- Helpers ---

fn config(max_streams: usize) -> StreamConfig {
    StreamConfig {
        frame_interval_secs: 0.02,
        storage_interval_secs: 0.2,
        max_concurrent_streams: max_streams,
        max_read_failures: 3,
        reopen_backoff_ms: 10,
        join_timeout_ms: 2000,
        input_size: 16,
        ..StreamConfig::default()
    }
}

fn deps(camera: Arc<FakeCamera>, gateway: Option<Arc<RecordingGateway>>) -> StreamDeps {
    StreamDeps {
        camera,
        detectors: Arc::new(Detectors),
        models: Arc::new(Models),
        gateway: gateway.map(|g| g as Arc<dyn EmotionRecordGateway>),
    }
}

fn registry(
    max_streams: usize,
    camera: Arc<FakeCamera>,
    gateway: Option<Arc<RecordingGateway>>,
) -> StreamRegistry {
    StreamRegistry::new(config(max_streams), deps(camera, gateway)).unwrap()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn user(id: &str) -> StreamKey {
    StreamKey::User(id.to_string())
}

// --- Tests ---

#[test]
fn test_acquired_stream_publishes_processed_frames() {
    let reg = registry(2, Arc::new(FakeCamera::default()), None);
    let stream = reg.acquire(StreamKey::Session("a".into())).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !stream
        .observations()
        .is_empty()));

    let raw = stream.get_frame(false);
    assert!(raw.sequence() > 0);
    assert_eq!((raw.width(), raw.height()), (W, H));

    let (emotions, dominant) = stream.current_emotions();
    assert!(emotions.get(Emotion::Neutral) > emotions.get(Emotion::Sad));
    assert_eq!(dominant, Emotion::Neutral);
    assert!((emotions.sum() - 1.0).abs() < 1e-6);

    let jpeg = stream.get_jpeg(true);
    assert_eq!(jpeg[..2], [0xFF, 0xD8]);

    let metrics = stream.get_metrics();
    assert_eq!(metrics.detector_kind, DetectorKind::Accurate);
    assert!((metrics.frame_interval - 0.02).abs() < 1e-9);
    assert!(wait_until(Duration::from_secs(3), || stream.get_metrics().fps > 0));
}

#[test]
fn test_acquire_same_key_returns_same_stream() {
    let reg = registry(2, Arc::new(FakeCamera::default()), None);
    let first = reg.acquire(user("1")).unwrap();
    let second = reg.acquire(user("1")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(reg.active_count(), 1);
}

#[test]
fn test_capacity_exceeded_leaves_registry_untouched() {
    let reg = registry(2, Arc::new(FakeCamera::default()), None);
    reg.acquire(user("1")).unwrap();
    reg.acquire(user("2")).unwrap();

    let err = reg.acquire(user("3")).unwrap_err();
    assert_eq!(err, StreamError::CapacityExceeded { max: 2 });
    assert_eq!(reg.len(), 2);
    assert!(reg.get(&user("3")).is_none());

    // Releasing one frees a slot.
    assert!(reg.release(&user("1")).unwrap());
    assert!(reg.acquire(user("3")).is_ok());
}

#[test]
fn test_release_stops_and_is_idempotent() {
    let reg = registry(2, Arc::new(FakeCamera::default()), None);
    let stream = reg.acquire(user("1")).unwrap();

    assert!(reg.release(&user("1")).unwrap());
    assert!(!stream.is_running());
    assert_eq!(stream.status(), StreamStatus::Stopped);
    assert!(reg.is_empty());

    assert!(!reg.release(&user("1")).unwrap());
    assert!(stream.stop().is_ok());
}

#[test]
fn test_direct_stop_deregisters_stream() {
    let reg = registry(2, Arc::new(FakeCamera::default()), None);
    let stream = reg.acquire(user("1")).unwrap();
    assert_eq!(reg.len(), 1);

    stream.stop().unwrap();
    assert!(reg.get(&user("1")).is_none());
    assert_eq!(reg.len(), 0);
    assert!(reg.is_empty());
    assert!(!reg.release(&user("1")).unwrap());
}

#[test]
fn test_slow_camera_open_does_not_block_registry() {
    let camera = Arc::new(FakeCamera::default());
    camera.open_delay_ms.store(800, Ordering::SeqCst);
    let reg = registry(1, camera, None);

    thread::scope(|s| {
        let starting = s.spawn(|| reg.acquire(user("a")));
        thread::sleep(Duration::from_millis(200));

        let queried = Instant::now();
        assert!(reg.get(&user("b")).is_none());
        assert_eq!(reg.active_count(), 0);
        // The slot reserved for "a" already counts against capacity.
        assert_eq!(
            reg.acquire(user("b")).unwrap_err(),
            StreamError::CapacityExceeded { max: 1 }
        );
        assert!(queried.elapsed() < Duration::from_millis(300));

        assert!(starting.join().unwrap().is_ok());
    });
    assert_eq!(reg.active_count(), 1);
}

#[test]
fn test_concurrent_acquire_of_starting_key_shares_stream() {
    let camera = Arc::new(FakeCamera::default());
    camera.open_delay_ms.store(300, Ordering::SeqCst);
    let reg = registry(2, camera.clone(), None);

    let (first, second) = thread::scope(|s| {
        let first = s.spawn(|| reg.acquire(user("a")));
        thread::sleep(Duration::from_millis(50));
        let second = s.spawn(|| reg.acquire(user("a")));
        (first.join().unwrap().unwrap(), second.join().unwrap().unwrap())
    });

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(camera.opens.load(Ordering::SeqCst), 1);
    assert_eq!(reg.active_count(), 1);
}

#[test]
fn test_invalid_config_is_rejected_by_registry() {
    let config = StreamConfig {
        frame_interval_secs: f64::INFINITY,
        ..StreamConfig::default()
    };
    let result = StreamRegistry::new(config, deps(Arc::new(FakeCamera::default()), None));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_unopenable_camera_fails_acquire() {
    let camera = Arc::new(FakeCamera::default());
    camera.broken.store(true, Ordering::SeqCst);
    let reg = registry(2, camera, None);

    let err = reg.acquire(user("1")).unwrap_err();
    assert!(matches!(err, StreamError::DeviceUnavailable(_)));
    assert!(reg.is_empty());
}

#[test]
fn test_persistent_read_failures_end_in_failed_state() {
    let camera = Arc::new(FakeCamera::default());
    let reg = registry(2, camera.clone(), None);
    let stream = reg.acquire(user("1")).unwrap();
    assert!(wait_until(Duration::from_secs(5), || stream.get_frame(false).sequence() > 0));

    camera.broken.store(true, Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(5), || stream.status()
        == StreamStatus::Failed));

    assert!(!stream.is_running());
    assert!(matches!(stream.check(), Err(StreamError::DeviceUnavailable(_))));
    // Initial open plus one reopen attempt per non-final failure.
    assert_eq!(camera.opens.load(Ordering::SeqCst), 3);
    assert_eq!(reg.active_count(), 0);

    // A failed stream no longer counts against capacity and is replaced.
    camera.broken.store(false, Ordering::SeqCst);
    let replacement = reg.acquire(user("1")).unwrap();
    assert!(!Arc::ptr_eq(&stream, &replacement));
    assert!(replacement.is_running());
}

#[test]
fn test_user_stream_persists_at_storage_interval() {
    let gateway = Arc::new(RecordingGateway::default());
    let reg = registry(2, Arc::new(FakeCamera::default()), Some(gateway.clone()));
    reg.acquire(user("alice")).unwrap();
    let session = reg.acquire(StreamKey::Session("anon".into())).unwrap();

    thread::sleep(Duration::from_millis(1100));
    reg.shutdown_all();
    assert!(!session.is_running());

    let records = gateway.records.lock().unwrap();
    // ~1.1 s at a 0.2 s interval; processing runs at 50 Hz.
    assert!(records.len() >= 2, "only {} records", records.len());
    assert!(records.len() <= 6, "{} records", records.len());
    assert!(records.iter().all(|(id, _)| id == "alice"));
    for pair in records.windows(2) {
        assert!(pair[1].1.duration_since(pair[0].1) >= Duration::from_millis(190));
    }
}
