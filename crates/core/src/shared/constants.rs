pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Short-range BlazeFace export; not published, must be placed in a search dir.
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// MobileNetV2 emotion classifier exported to ONNX (NHWC, 96×96×3 input).
pub const EMOTION_MODEL_NAME: &str = "emotion_model_final.onnx";

pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

/// Depth of both the face-track and the inference history.
pub const HISTORY_DEPTH: usize = 5;

/// Max center distance (pixels) for matching a detection to a prior rect.
pub const TRACKING_THRESHOLD_PX: f64 = 30.0;

/// Weights of the current and previous observation in positional and
/// emotion blending.
pub const CURRENT_WEIGHT: f64 = 0.7;
pub const PREVIOUS_WEIGHT: f64 = 0.3;

/// Capacity of the inference-duration ring used for mean/max reporting.
pub const INFERENCE_SAMPLE_CAPACITY: usize = 100;

/// Margin added on each side of a face before cropping for inference.
pub const FACE_CROP_MARGIN: f64 = 0.2;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Directory name used under the platform config/cache dirs.
pub const APP_DIR_NAME: &str = "MoodLens";
