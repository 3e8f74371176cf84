//! Session-relative timestamps

use std::time::{Duration, Instant, SystemTime};

/// Clock anchored at the start of one recording session.
///
/// Readings come from a monotonic source, so two readings taken in order
/// never go backwards.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    anchor: Instant,
    started_at: SystemTime,
}

impl SessionClock {
    /// Anchor a new clock at the current instant
    #[must_use]
    pub fn start() -> Self {
        Self {
            anchor: Instant::now(),
            started_at: SystemTime::now(),
        }
    }

    /// Milliseconds elapsed since the anchor
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        duration_ms(self.anchor.elapsed())
    }

    /// Monotonic anchor
    #[must_use]
    pub fn anchor(&self) -> Instant {
        self.anchor
    }

    /// Wall-clock time the session started
    #[must_use]
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

/// Whole milliseconds in a duration, saturating at `u64::MAX`
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_are_monotonic() {
        let clock = SessionClock::start();
        let mut last = clock.now_ms();
        for _ in 0..1000 {
            let next = clock.now_ms();
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(Duration::from_micros(1999)), 1);
        assert_eq!(duration_ms(Duration::from_secs(2)), 2000);
    }
}
