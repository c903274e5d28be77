use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("maximum concurrent streams ({max}) reached")]
    CapacityExceeded { max: usize },
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to load emotion model: {0}")]
    ModelLoad(String),
    #[error("failed to create face detector: {0}")]
    Detector(String),
}
