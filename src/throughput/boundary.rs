use std::time::{Duration, SystemTime};

use tokio::time::Instant;

/// Tracks the previous sample boundary of one attempt.
///
/// The first boundary is the moment the attempt was issued; every emitted
/// chunk moves the boundary to its own arrival time.
#[derive(Debug, Clone, Copy)]
pub struct SampleBoundary {
    since: Instant,
    since_wall: SystemTime,
}

impl SampleBoundary {
    /// Starts tracking at `now`.
    #[must_use]
    pub fn starting_at(now: Instant) -> Self {
        Self {
            since: now,
            since_wall: SystemTime::now(),
        }
    }

    /// Closes the current interval at `now` and opens the next one.
    ///
    /// Returns the wall-clock start of the closed interval and its length.
    pub fn split(&mut self, now: Instant) -> (SystemTime, Duration) {
        let elapsed = now.saturating_duration_since(self.since);
        let started = self.since_wall;
        self.since = now;
        self.since_wall = started + elapsed;
        (started, elapsed)
    }
}
