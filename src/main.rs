use clap::Parser;
use output_watchdog::config::FileConfig;
use output_watchdog::runner::{self, WatchOutcome};
use output_watchdog::WatchdogConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Wait for an agent's output file to stop growing, then print its contents.
///
/// Recovers results from processes that crash or hang after writing their
/// output without ever signalling completion.
#[derive(Parser, Debug)]
#[command(name = "output-watchdog", version, about)]
pub struct Cli {
    /// Output file to watch (need not exist yet)
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "watchdog.toml")]
    config: PathBuf,

    /// Seconds between size checks (overrides config)
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Seconds the size must stay unchanged (overrides config)
    #[arg(long, value_name = "SECS")]
    stability_window: Option<u64>,

    /// Smallest file size accepted as real output (overrides config)
    #[arg(long, value_name = "BYTES")]
    min_size: Option<u64>,

    /// Give up after this many seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print a JSON object with path, byte count and content
    #[arg(long)]
    json: bool,

    /// Print resolved settings, don't watch
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (size changes, stop requests)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Settings after merging CLI overrides onto the config file.
#[derive(Debug)]
struct Resolved {
    watchdog: WatchdogConfig,
    timeout: Option<Duration>,
}

fn resolve(cli: &Cli, file: &FileConfig) -> Resolved {
    let mut watchdog = file.watchdog.to_watchdog_config();
    if let Some(secs) = cli.poll_interval {
        watchdog.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.stability_window {
        watchdog.stability_window = Duration::from_secs(secs);
    }
    if let Some(bytes) = cli.min_size {
        watchdog.min_file_size = bytes;
    }

    let timeout = cli
        .timeout
        .or(file.run.timeout_secs)
        .map(Duration::from_secs);

    Resolved { watchdog, timeout }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn render(path: &Path, content: &str, json: bool) -> String {
    if json {
        serde_json::json!({
            "path": path.display().to_string(),
            "bytes": content.len(),
            "content": content,
        })
        .to_string()
    } else {
        content.to_string()
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    let file_config = match FileConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(1);
        }
    };
    let resolved = resolve(&cli, &file_config);

    if cli.dry_run {
        println!("path:             {}", cli.path.display());
        println!("poll interval:    {:?}", resolved.watchdog.poll_interval);
        println!("stability window: {:?}", resolved.watchdog.stability_window);
        println!("min file size:    {} bytes", resolved.watchdog.min_file_size);
        match resolved.timeout {
            Some(t) => println!("timeout:          {t:?}"),
            None => println!("timeout:          none"),
        }
        return ExitCode::SUCCESS;
    }

    let outcome =
        runner::watch_file(&cli.path, resolved.watchdog, resolved.timeout, interrupted()).await;

    match outcome {
        WatchOutcome::Stable { content } => {
            let rendered = render(&cli.path, &content, cli.json);
            if cli.json {
                println!("{rendered}");
            } else {
                print!("{rendered}");
            }
            ExitCode::SUCCESS
        }
        WatchOutcome::TimedOut => ExitCode::from(2),
        WatchOutcome::Stopped => {
            tracing::error!("watchdog stopped without delivering output");
            ExitCode::from(3)
        }
        WatchOutcome::Interrupted => ExitCode::from(130),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("output-watchdog").chain(args.iter().copied()))
    }

    #[test]
    fn test_resolve_uses_file_config_by_default() {
        let cli = parse(&["out.jsonl"]);
        let file = FileConfig::parse(
            "[watchdog]\npoll_interval_secs = 1\nmin_file_size = 64\n[run]\ntimeout_secs = 30\n",
        )
        .unwrap();

        let resolved = resolve(&cli, &file);
        assert_eq!(resolved.watchdog.poll_interval, Duration::from_secs(1));
        assert_eq!(resolved.watchdog.stability_window, Duration::from_secs(15));
        assert_eq!(resolved.watchdog.min_file_size, 64);
        assert_eq!(resolved.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_resolve_cli_overrides_config() {
        let cli = parse(&[
            "out.jsonl",
            "--poll-interval",
            "2",
            "--stability-window",
            "40",
            "--min-size",
            "1",
            "--timeout",
            "90",
        ]);
        let file = FileConfig::parse("[run]\ntimeout_secs = 30\n").unwrap();

        let resolved = resolve(&cli, &file);
        assert_eq!(
            resolved.watchdog,
            WatchdogConfig::new(Duration::from_secs(2), Duration::from_secs(40), 1)
        );
        assert_eq!(resolved.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_resolve_no_timeout() {
        let cli = parse(&["out.jsonl"]);
        let resolved = resolve(&cli, &FileConfig::default());
        assert_eq!(resolved.timeout, None);
        assert_eq!(resolved.watchdog, WatchdogConfig::default());
    }

    #[test]
    fn test_render_raw_content() {
        assert_eq!(render(Path::new("a.txt"), "hello", false), "hello");
    }

    #[test]
    fn test_render_json_envelope() {
        let rendered = render(Path::new("/tmp/a.jsonl"), "hi\n", true);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["path"], "/tmp/a.jsonl");
        assert_eq!(value["bytes"], 3);
        assert_eq!(value["content"], "hi\n");
    }
}
