use allocbot::{
    config::{load_config_from_path, resolve_config_path},
    journal::{JournalWriter, LockOptions},
    logger::{self, LogTag, LoggerConfig},
    observer::{observe_once, AnomalyWatcher},
    paths::{self, JournalPaths},
    shutdown,
};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "tool_anomaly_watch")]
#[command(about = "Tail the signals journal and record anomalies", long_about = None)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    journal_dir: Option<PathBuf>,

    /// Seconds between passes
    #[arg(long, default_value_t = 30)]
    interval: u64,

    /// Stop after this many passes
    #[arg(long)]
    max_passes: Option<u64>,

    #[arg(long = "debug", value_name = "TAG")]
    debug: Vec<String>,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let directories = paths::ensure_all_directories();
    logger::init(
        "tool_anomaly_watch",
        LoggerConfig::from_flags(&args.debug, args.verbose, false),
    );
    for failure in directories {
        logger::warning(LogTag::System, &format!("{}, continuing", failure));
    }

    let config = load_config_from_path(&resolve_config_path(args.config.as_deref()))
        .context("Startup configuration rejected")?;
    if let Err(e) = shutdown::install_shutdown_handlers() {
        logger::warning(LogTag::System, &format!("Could not install signal handler: {}", e));
    }

    let journals = args
        .journal_dir
        .as_deref()
        .map(JournalPaths::in_dir)
        .unwrap_or_default();
    let writer = JournalWriter::new(
        journals,
        LockOptions::from_config(&config.journal),
        format!("observer-{}", uuid::Uuid::new_v4()),
    );
    let read_wait = Duration::from_millis(config.journal.read_wait_timeout_ms);
    let mut watcher = AnomalyWatcher::new(config.observer.clone());

    logger::info(
        LogTag::Observer,
        &format!("Watching {}", writer.paths().signals.display()),
    );

    let mut passes = 0u64;
    loop {
        if shutdown::is_shutdown_requested() {
            break;
        }
        passes += 1;
        let written = observe_once(&mut watcher, &writer, read_wait);
        logger::debug(
            LogTag::Observer,
            &format!("Pass {}: {} anomaly record(s)", passes, written),
        );

        if args.max_passes.map_or(false, |max| passes >= max) {
            break;
        }
        if shutdown::sleep_or_shutdown(Duration::from_secs(args.interval)).await {
            break;
        }
    }

    logger::info(LogTag::Observer, &format!("Stopped after {} pass(es)", passes));
    logger::flush();
    Ok(())
}
