use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle of a stream as seen by pollers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Constructed, capture thread not yet running.
    Starting,
    Running,
    /// Camera released after a failed read, waiting to reopen.
    Recovering,
    /// Gave up after too many consecutive read failures.
    Failed,
    Stopped,
}

impl StreamStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamStatus::Starting => "starting",
            StreamStatus::Running => "running",
            StreamStatus::Recovering => "recovering",
            StreamStatus::Failed => "failed",
            StreamStatus::Stopped => "stopped",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => StreamStatus::Starting,
            1 => StreamStatus::Running,
            2 => StreamStatus::Recovering,
            3 => StreamStatus::Failed,
            _ => StreamStatus::Stopped,
        }
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free status slot written by the capture thread.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(status: StreamStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub fn get(&self) -> StreamStatus {
        StreamStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, status: StreamStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Sets `status` unless the stream has already failed.
    pub fn set_unless_failed(&self, status: StreamStatus) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != StreamStatus::Failed as u8).then_some(status as u8)
            });
    }
}
