use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::shared::config::{ConfigError, StreamConfig};
use crate::stream::stream_error::StreamError;
use crate::stream::stream_handle::{Stream, StreamDeps};
use crate::stream::stream_key::StreamKey;

#[derive(Default)]
struct Slots {
    streams: HashMap<StreamKey, Arc<Stream>>,
    /// Keys whose stream is being started outside the guard.
    starting: HashSet<StreamKey>,
}

impl Slots {
    /// Removes streams that are no longer running, stopped directly or
    /// failed. The caller drops them after releasing the guard.
    fn take_finished(&mut self) -> Vec<Arc<Stream>> {
        let finished: Vec<StreamKey> = self
            .streams
            .iter()
            .filter(|(_, s)| !s.is_running())
            .map(|(k, _)| k.clone())
            .collect();
        finished
            .iter()
            .filter_map(|k| self.streams.remove(k))
            .collect()
    }

    fn occupied(&self) -> usize {
        self.streams.values().filter(|s| s.is_running()).count() + self.starting.len()
    }
}

/// Maps keys to their live streams and bounds how many run at once.
///
/// Constructed once and shared by whatever layer serves clients. Every
/// change to the map happens under one guard. Starting a stream (model load,
/// camera open) and stopping one (thread join) happen with the guard
/// released; a key being started holds a reserved slot until it commits.
pub struct StreamRegistry {
    config: StreamConfig,
    deps: StreamDeps,
    slots: Mutex<Slots>,
    /// Signalled whenever a reserved slot commits or rolls back.
    settled: Condvar,
}

impl StreamRegistry {
    pub fn new(config: StreamConfig, deps: StreamDeps) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            deps,
            slots: Mutex::new(Slots::default()),
            settled: Condvar::new(),
        })
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the running stream for `key`, starting a new one if needed.
    ///
    /// Fails with `CapacityExceeded`, leaving the registry untouched, when
    /// the maximum number of streams is already running or starting. A
    /// concurrent `acquire` of a key that is still starting waits for it.
    pub fn acquire(&self, key: StreamKey) -> Result<Arc<Stream>, StreamError> {
        let mut finished = Vec::new();
        let reserved = self.reserve(&key, &mut finished);
        // Finished streams may still be joining their threads.
        drop(finished);
        let stream = match reserved? {
            Reservation::Existing(stream) => return Ok(stream),
            Reservation::Reserved(stream) => stream,
        };

        let started = stream.start();

        let mut slots = self.slots();
        slots.starting.remove(&key);
        let result = match started {
            Ok(()) => {
                slots.streams.insert(key, stream.clone());
                log::info!("Registered stream {} ({} active)", stream.key(), slots.streams.len());
                Ok(stream)
            }
            Err(e) => {
                log::warn!("Stream {key} failed to start: {e}");
                Err(e)
            }
        };
        drop(slots);
        self.settled.notify_all();
        result
    }

    fn reserve(
        &self,
        key: &StreamKey,
        finished: &mut Vec<Arc<Stream>>,
    ) -> Result<Reservation, StreamError> {
        let mut slots = self.slots();
        while slots.starting.contains(key) {
            slots = self
                .settled
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if let Some(existing) = slots.streams.get(key) {
            if existing.is_running() {
                return Ok(Reservation::Existing(existing.clone()));
            }
        }

        let max = self.config.max_concurrent_streams;
        let occupied = slots.occupied();
        if occupied >= max {
            log::warn!("Refusing stream {key}: {occupied}/{max} streams running");
            return Err(StreamError::CapacityExceeded { max });
        }

        finished.extend(slots.take_finished());
        slots.starting.insert(key.clone());
        Ok(Reservation::Reserved(Arc::new(Stream::new(
            key.clone(),
            self.config.clone(),
            self.deps.clone(),
        ))))
    }

    /// Stops and removes the stream for `key`. Returns whether one existed.
    pub fn release(&self, key: &StreamKey) -> Result<bool, StreamError> {
        let removed = self.slots().streams.remove(key);
        match removed {
            Some(stream) => {
                stream.stop()?;
                log::info!("Released stream {key}");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The running stream for `key`, if any.
    pub fn get(&self, key: &StreamKey) -> Option<Arc<Stream>> {
        self.with_running(|streams| streams.get(key).cloned())
    }

    /// Number of streams whose capture thread is running.
    pub fn active_count(&self) -> usize {
        self.with_running(|streams| streams.len())
    }

    pub fn len(&self) -> usize {
        self.active_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deregisters finished streams, then reads the remaining ones.
    fn with_running<R>(&self, read: impl FnOnce(&HashMap<StreamKey, Arc<Stream>>) -> R) -> R {
        let (result, finished) = {
            let mut slots = self.slots();
            let finished = slots.take_finished();
            (read(&slots.streams), finished)
        };
        drop(finished);
        result
    }

    pub fn shutdown_all(&self) {
        let drained: Vec<Arc<Stream>> = self.slots().streams.drain().map(|(_, s)| s).collect();
        for stream in &drained {
            if let Err(e) = stream.stop() {
                log::warn!("Failed to stop stream {}: {e}", stream.key());
            }
        }
        if !drained.is_empty() {
            log::info!("Stopped {} streams", drained.len());
        }
    }
}

enum Reservation {
    Existing(Arc<Stream>),
    Reserved(Arc<Stream>),
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
