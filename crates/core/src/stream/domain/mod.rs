pub mod frame_buffer;
pub mod metrics;
pub mod persistence;
pub mod stream_status;
