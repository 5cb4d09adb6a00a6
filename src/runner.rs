/// Run a single watchdog to completion under a caller-imposed deadline.
///
/// The watchdog itself never gives up; this is where timeouts and Ctrl-C
/// turn into a stop request.
use crate::config::WatchdogConfig;
use crate::log::{LogSink, TracingSink};
use crate::watchdog::Watchdog;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The file settled; here is what it contained.
    Stable { content: String },
    /// The deadline passed before the file settled.
    TimedOut,
    /// The interrupt future resolved first.
    Interrupted,
    /// The poller exited without delivering anything.
    Stopped,
}

/// Watch `path` until it settles, `timeout` elapses, or `interrupt` resolves.
///
/// A `None` timeout waits indefinitely. Delivered content wins any tie.
pub async fn watch_file(
    path: impl Into<PathBuf>,
    config: WatchdogConfig,
    timeout: Option<Duration>,
    interrupt: impl Future<Output = ()>,
) -> WatchOutcome {
    let logger: Arc<dyn LogSink> = Arc::new(TracingSink);
    let mut watchdog = Watchdog::new(path, config, Some(logger));
    let config = watchdog.config();
    tracing::info!(
        path = %watchdog.path().display(),
        poll_interval = ?config.poll_interval,
        stability_window = ?config.stability_window,
        min_file_size = config.min_file_size,
        "watching output file"
    );
    watchdog.start();

    let deadline = async move {
        match timeout {
            Some(t) => tokio::time::sleep(t).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        biased;
        content = watchdog.result_channel().recv() => match content {
            Some(content) => WatchOutcome::Stable { content },
            None => WatchOutcome::Stopped,
        },
        _ = interrupt => {
            tracing::info!("interrupted, stopping watchdog");
            WatchOutcome::Interrupted
        }
        _ = deadline => {
            tracing::warn!(
                timeout_secs = timeout.map(|t| t.as_secs()),
                "output file did not settle before the deadline"
            );
            WatchOutcome::TimedOut
        }
    };

    watchdog.stop();
    outcome
}
