use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::stream::domain::frame_buffer::FrameBuffer;
use crate::stream::domain::stream_status::{StatusCell, StreamStatus};

/// State shared between a stream handle and its capture thread.
pub struct StreamState {
    running: AtomicBool,
    status: StatusCell,
    buffer: FrameBuffer,
    failure: Mutex<Option<String>>,
}

impl StreamState {
    pub fn new(buffer: FrameBuffer) -> Self {
        Self {
            running: AtomicBool::new(false),
            status: StatusCell::new(StreamStatus::Starting),
            buffer,
            failure: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn status(&self) -> StreamStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: StreamStatus) {
        self.status.set(status);
    }

    pub fn mark_stopped(&self) {
        self.status.set_unless_failed(StreamStatus::Stopped);
    }

    /// Enters the terminal FAILED state and stops the loop.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
        self.status.set(StreamStatus::Failed);
        self.set_running(false);
    }

    pub fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }
}
