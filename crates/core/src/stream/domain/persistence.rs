use std::time::{Duration, Instant, SystemTime};

use crate::shared::emotion::EmotionVector;

/// Narrow interface to the external emotion record store.
///
/// Implementations report failure through the `Result`; they must not panic
/// into the capture thread.
pub trait EmotionRecordGateway: Send + Sync {
    fn save_emotion_record(
        &self,
        user_id: &str,
        emotions: &EmotionVector,
        timestamp: SystemTime,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Less than one storage interval since the last write attempt.
    Throttled,
    Saved,
    Failed,
}

/// Limits gateway calls to one per storage interval.
///
/// Every call, successful or not, opens a new interval, so a failing store
/// is retried at the storage rate rather than on every frame. Only a
/// successful write moves `last_success`.
#[derive(Debug, Clone)]
pub struct PersistenceThrottle {
    interval: Duration,
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
}

impl PersistenceThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
            last_success: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last_attempt
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    pub fn persist(
        &mut self,
        gateway: &dyn EmotionRecordGateway,
        user_id: &str,
        emotions: &EmotionVector,
        now: Instant,
        timestamp: SystemTime,
    ) -> PersistOutcome {
        if !self.is_due(now) {
            return PersistOutcome::Throttled;
        }
        self.last_attempt = Some(now);
        match gateway.save_emotion_record(user_id, emotions, timestamp) {
            Ok(()) => {
                self.last_success = Some(now);
                log::debug!("Stored emotion record for {user_id}");
                PersistOutcome::Saved
            }
            Err(e) => {
                match self.last_success {
                    Some(last) => log::warn!(
                        "Failed to store emotion record for {user_id} (last stored {:.1}s ago): {e}",
                        now.saturating_duration_since(last).as_secs_f64()
                    ),
                    None => log::warn!("Failed to store emotion record for {user_id}: {e}"),
                }
                PersistOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl EmotionRecordGateway for CountingGateway {
        fn save_emotion_record(
            &self,
            _user_id: &str,
            _emotions: &EmotionVector,
            _timestamp: SystemTime,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err("database unavailable".into())
            } else {
                Ok(())
            }
        }
    }

    fn persist_at(
        throttle: &mut PersistenceThrottle,
        gateway: &CountingGateway,
        now: Instant,
    ) -> PersistOutcome {
        throttle.persist(
            gateway,
            "user-1",
            &EmotionVector::neutral(),
            now,
            SystemTime::now(),
        )
    }

    #[test]
    fn test_first_frame_is_written() {
        let gateway = CountingGateway::default();
        let mut throttle = PersistenceThrottle::new(Duration::from_secs(2));
        assert_eq!(
            persist_at(&mut throttle, &gateway, Instant::now()),
            PersistOutcome::Saved
        );
    }

    #[test]
    fn test_ten_frames_per_second_write_once_per_interval() {
        let gateway = CountingGateway::default();
        let mut throttle = PersistenceThrottle::new(Duration::from_secs(2));
        let start = Instant::now();

        let mut saved_at = Vec::new();
        for i in 0..100u64 {
            let now = start + Duration::from_millis(i * 100);
            if persist_at(&mut throttle, &gateway, now) == PersistOutcome::Saved {
                saved_at.push(i * 100);
            }
        }

        // 10 s of frames: writes at 0, 2, 4, 6, 8 s.
        assert_eq!(saved_at, vec![0, 2000, 4000, 6000, 8000]);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 5);
        for pair in saved_at.windows(2) {
            assert!(pair[1] - pair[0] >= 2000);
        }
    }

    #[test]
    fn test_failed_write_keeps_last_success() {
        let gateway = CountingGateway::default();
        let mut throttle = PersistenceThrottle::new(Duration::from_secs(2));
        let start = Instant::now();

        assert_eq!(persist_at(&mut throttle, &gateway, start), PersistOutcome::Saved);

        gateway.failing.store(true, Ordering::SeqCst);
        let due = start + Duration::from_secs(2);
        assert_eq!(persist_at(&mut throttle, &gateway, due), PersistOutcome::Failed);
        assert_eq!(throttle.last_success(), Some(start));

        // The retry waits for the next interval.
        gateway.failing.store(false, Ordering::SeqCst);
        let next = due + Duration::from_millis(100);
        assert_eq!(persist_at(&mut throttle, &gateway, next), PersistOutcome::Throttled);
        let retry = due + Duration::from_secs(2);
        assert_eq!(persist_at(&mut throttle, &gateway, retry), PersistOutcome::Saved);
        assert_eq!(throttle.last_success(), Some(retry));
    }

    #[test]
    fn test_failing_gateway_is_called_once_per_interval() {
        let gateway = CountingGateway::default();
        gateway.failing.store(true, Ordering::SeqCst);
        let mut throttle = PersistenceThrottle::new(Duration::from_secs(2));
        let start = Instant::now();

        // 10 fps for just under two intervals.
        let outcomes: Vec<PersistOutcome> = (0..40u64)
            .map(|i| persist_at(&mut throttle, &gateway, start + Duration::from_millis(i * 100)))
            .collect();

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes[0], PersistOutcome::Failed);
        assert_eq!(outcomes[20], PersistOutcome::Failed);
        assert!(throttle.last_success().is_none());
    }
}
