use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock for tracking time.
///
/// Ticks are monotonic milliseconds since the clock was created. All clones
/// of a clock share the same time source, so posters, workers, and the
/// delayed-task manager observe a single timeline.
#[derive(Debug, Clone)]
pub struct Clock {
    start: Instant,
    time: TimeSource,
}

impl Clock {
    /// Create a new system clock.
    ///
    /// The system clock will start with the current system time.
    pub fn system() -> Self {
        Self {
            start: Instant::now(),
            time: TimeSource::System,
        }
    }

    /// Create a new simulated clock.
    ///
    /// The simulated clock will start with frozen time.
    /// Time can be advanced by calling [`Clock::advance`].
    pub fn simulated() -> Self {
        Self {
            start: Instant::now(),
            time: TimeSource::Simulated {
                offset_ms: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    /// Return the current tick.
    pub fn tick(&self) -> u64 {
        match &self.time {
            TimeSource::System => {
                let ms = Instant::now().duration_since(self.start).as_millis();
                ms.try_into().expect("Duration too far into the future")
            }
            TimeSource::Simulated { offset_ms } => offset_ms.load(Ordering::SeqCst),
        }
    }

    /// Convert a tick count to a duration value.
    pub fn tick_to_duration(&self, ticks: u64) -> Duration {
        Duration::from_millis(ticks)
    }

    /// Return the current instant.
    pub fn now(&self) -> Instant {
        match &self.time {
            TimeSource::System => Instant::now(),
            TimeSource::Simulated { offset_ms } => {
                self.start + Duration::from_millis(offset_ms.load(Ordering::SeqCst))
            }
        }
    }

    /// Advance simulated time.
    ///
    /// ### Panics
    /// Panics if called on a system clock created with [`Clock::system`].
    pub fn advance(&self, duration: Duration) {
        match &self.time {
            TimeSource::System => panic!("Cannot advance system clock"),
            TimeSource::Simulated { offset_ms } => {
                let ms: u64 = duration
                    .as_millis()
                    .try_into()
                    .expect("Duration too far into the future");
                offset_ms.fetch_add(ms, Ordering::SeqCst);
            }
        }
    }
}

#[derive(Debug, Clone)]
enum TimeSource {
    System,
    Simulated { offset_ms: Arc<AtomicU64> },
}
