use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open camera {device}: {reason}")]
    Open { device: String, reason: String },
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("camera stream ended")]
    EndOfStream,
}

/// An opened camera. Owned by exactly one capture thread.
///
/// Dropping the device releases it.
pub trait CameraDevice: Send {
    /// Blocks until the next frame is available.
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;
}

/// Opens camera devices. Shared by the registry across streams.
pub trait CameraSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn CameraDevice>, Box<dyn std::error::Error>>;

    /// Human-readable device name for logs and errors.
    fn describe(&self) -> String;
}
