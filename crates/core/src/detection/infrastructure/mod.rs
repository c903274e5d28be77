pub mod detector_factory;
pub mod execution_provider;
pub mod math;
pub mod onnx_blazeface_detector;
pub mod onnx_yolo_detector;
