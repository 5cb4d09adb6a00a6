/// Output-stability monitor for an externally written file.
///
/// Runs a background task that periodically stats the output file. Once the
/// size has held steady for `stability_window` (and is at least
/// `min_file_size`), the full contents are delivered once on the result
/// channel and the task exits.
use crate::config::WatchdogConfig;
use crate::log::{Field, Level, LogSink};
use crate::stability::{Observation, StabilityTracker, Verdict};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// tokio intervals reject a zero period.
const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);
/// Keeps `Instant + period` from overflowing on absurd intervals.
const MAX_POLL_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Watches one path and hands back its contents once they stop changing.
///
/// Start-once: the first [`start`](Watchdog::start) spawns the poller, later
/// calls do nothing. Dropping the watchdog (and every [`StopHandle`]) stops
/// the poller.
pub struct Watchdog {
    path: PathBuf,
    config: WatchdogConfig,
    stop: StopHandle,
    poller: Option<Poller>,
    task: Option<JoinHandle<()>>,
    results: ResultReceiver,
}

/// Cloneable handle that requests the poller to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Request termination. Returns `true` only for the call that actually
    /// issued the signal; every other call is a no-op.
    pub fn stop(&self) -> bool {
        self.signal.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.signal.borrow()
    }
}

/// Read side of the single-slot result channel.
#[derive(Debug)]
pub struct ResultReceiver {
    inner: mpsc::Receiver<String>,
}

impl ResultReceiver {
    /// Wait for the stable content.
    ///
    /// Returns `None` once the poller has exited without delivering, i.e.
    /// it was stopped.
    pub async fn recv(&mut self) -> Option<String> {
        self.inner.recv().await
    }

    /// Take the content if it has already been delivered.
    pub fn try_recv(&mut self) -> Option<String> {
        self.inner.try_recv().ok()
    }
}

/// Everything the background task owns.
struct Poller {
    path: PathBuf,
    config: WatchdogConfig,
    logger: Option<Arc<dyn LogSink>>,
    result_tx: mpsc::Sender<String>,
    stop_rx: watch::Receiver<bool>,
}

impl Watchdog {
    /// Create an unstarted watchdog. No I/O and no background work yet.
    pub fn new(
        path: impl Into<PathBuf>,
        config: WatchdogConfig,
        logger: Option<Arc<dyn LogSink>>,
    ) -> Self {
        let path = path.into();
        let (result_tx, result_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        Self {
            poller: Some(Poller {
                path: path.clone(),
                config,
                logger,
                result_tx,
                stop_rx,
            }),
            path,
            config,
            stop: StopHandle {
                signal: Arc::new(stop_tx),
            },
            task: None,
            results: ResultReceiver { inner: result_rx },
        }
    }

    /// Spawn the polling task on the current tokio runtime.
    ///
    /// Returns `true` if this call spawned it, `false` if the watchdog was
    /// already started.
    pub fn start(&mut self) -> bool {
        let Some(poller) = self.poller.take() else {
            return false;
        };
        self.task = Some(tokio::spawn(poller.run()));
        true
    }

    /// Request termination without waiting for it. Idempotent.
    pub fn stop(&self) -> bool {
        self.stop.stop()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn result_channel(&mut self) -> &mut ResultReceiver {
        &mut self.results
    }

    /// Whether the poller was started and has not exited yet.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }
}

impl Poller {
    async fn run(mut self) {
        let period = tick_period(self.config.poll_interval);
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tracker =
            StabilityTracker::new(self.config.min_file_size, self.config.stability_window);

        loop {
            let tick = tokio::select! {
                biased;
                // Err means every stop sender is gone; treat it as a stop too.
                _ = self.stop_rx.changed() => {
                    self.emit(Level::Debug, "watchdog stopped", &[("path", &self.path.display())]);
                    break;
                }
                tick = ticker.tick() => tick,
            };

            // Measure on the ticker's schedule, not on wake-up time.
            if self.poll_once(&mut tracker, tick.into_std()) {
                break;
            }
        }
    }

    /// One observation. Returns `true` once content has been delivered.
    fn poll_once(&self, tracker: &mut StabilityTracker, now: std::time::Instant) -> bool {
        let path = self.path.display();
        let size = match tracker.observe(Observation::of(&self.path), now) {
            Verdict::Stable { size } => size,
            Verdict::Growing { size } => {
                self.emit(
                    Level::Debug,
                    "output file size changed",
                    &[("path", &path), ("size", &size)],
                );
                return false;
            }
            _ => return false,
        };

        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.emit(
                    Level::Warn,
                    "failed to read stable output file",
                    &[("path", &path), ("size", &size), ("error", &e)],
                );
                return false;
            }
        };

        self.emit(
            Level::Info,
            "output file stable, delivering content",
            &[("path", &path), ("size", &bytes.len())],
        );
        deliver(&self.result_tx, String::from_utf8_lossy(&bytes).into_owned());
        true
    }

    fn emit(&self, level: Level, message: &str, fields: &[Field<'_>]) {
        if let Some(logger) = &self.logger {
            logger.log(level, message, fields);
        }
    }
}

fn tick_period(poll_interval: Duration) -> Duration {
    poll_interval.clamp(MIN_POLL_PERIOD, MAX_POLL_PERIOD)
}

/// Non-blocking handoff into the single result slot.
///
/// A full slot already holds an unread result; the new value is dropped.
fn deliver(result_tx: &mpsc::Sender<String>, content: String) -> bool {
    result_tx.try_send(content).is_ok()
}
