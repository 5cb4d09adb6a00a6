//! Size-stability state machine.
//!
//! Pure bookkeeping: the caller stats the file, feeds the observation in
//! with the current instant, and gets back a verdict. No I/O happens here,
//! which keeps the timing rules testable without a clock.

use std::path::Path;
use std::time::{Duration, Instant};

/// What a single stat of the watched path found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The path does not exist or could not be stat'ed.
    Missing,
    /// The file exists with this many bytes.
    Size(u64),
}

impl Observation {
    /// Stat `path` and classify the result.
    pub fn of(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(m) => Observation::Size(m.len()),
            Err(_) => Observation::Missing,
        }
    }
}

/// Outcome of feeding one observation to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing on disk yet. Tracking was reset.
    Absent,
    /// Below the minimum size; not meaningful output yet.
    TooSmall { size: u64 },
    /// Size changed since the last tick; the stability clock restarted.
    Growing { size: u64 },
    /// Same size as last tick, but not for long enough.
    Settling { size: u64, elapsed: Duration },
    /// Same size for at least the stability window.
    Stable { size: u64 },
}

/// Tracks last observed size and when that size was first seen.
///
/// Owned by exactly one poller; nothing here is shared.
#[derive(Debug)]
pub struct StabilityTracker {
    min_file_size: u64,
    stability_window: Duration,
    last_size: Option<u64>,
    stable_since: Option<Instant>,
}

impl StabilityTracker {
    pub fn new(min_file_size: u64, stability_window: Duration) -> Self {
        Self {
            min_file_size,
            stability_window,
            last_size: None,
            stable_since: None,
        }
    }

    /// Apply one observation taken at `now`.
    ///
    /// A `Stable` verdict leaves the state untouched, so a later tick at the
    /// same size reports `Stable` again. The poller relies on that to retry a
    /// failed read.
    pub fn observe(&mut self, observation: Observation, now: Instant) -> Verdict {
        let size = match observation {
            Observation::Missing => {
                self.last_size = None;
                self.stable_since = None;
                return Verdict::Absent;
            }
            Observation::Size(size) => size,
        };

        if size < self.min_file_size {
            self.last_size = Some(size);
            self.stable_since = None;
            return Verdict::TooSmall { size };
        }

        if self.last_size != Some(size) {
            self.last_size = Some(size);
            self.stable_since = Some(now);
            return Verdict::Growing { size };
        }

        let since = match self.stable_since {
            Some(since) => since,
            None => {
                self.stable_since = Some(now);
                return Verdict::Settling {
                    size,
                    elapsed: Duration::ZERO,
                };
            }
        };

        let elapsed = now.saturating_duration_since(since);
        if elapsed < self.stability_window {
            Verdict::Settling { size, elapsed }
        } else {
            Verdict::Stable { size }
        }
    }

    /// Last observed size (`None` before the first observation or after the
    /// file went missing).
    #[cfg(test)]
    pub(crate) fn last_size(&self) -> Option<u64> {
        self.last_size
    }

    /// When the current size was first observed.
    #[cfg(test)]
    pub(crate) fn stable_since(&self) -> Option<Instant> {
        self.stable_since
    }
}
