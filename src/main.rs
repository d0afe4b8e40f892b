use allocbot::{
    config::{load_config_from_path, resolve_config_path, StrategyConfig},
    logger::{self, LogTag, LoggerConfig},
    paths::{self, JournalPaths},
    run::{run_bot, RunOptions},
    shutdown,
    version::VERSION,
};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "allocbot")]
#[command(version, about = "Regime-driven portfolio allocation decision loop", long_about = None)]
struct Args {
    /// Pool statistics JSON, re-read every cycle
    #[arg(long)]
    pools: Option<PathBuf>,

    /// Strategy config (TOML); falls back to $ALLOCBOT_CONFIG, then <base>/data/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to sleep between cycles
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Stop after this many cycles
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Directory holding the shared journals
    #[arg(long)]
    journal_dir: Option<PathBuf>,

    /// Persisted cycle state file
    #[arg(long)]
    state: Option<PathBuf>,

    /// Enable debug output for a subsystem (repeatable, or "all")
    #[arg(long = "debug", value_name = "TAG")]
    debug: Vec<String>,

    #[arg(long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        let body = toml::to_string_pretty(&StrategyConfig::default())
            .context("Failed to render default config")?;
        println!("{}", body);
        return Ok(());
    }

    // Logger needs the logs directory for its file sink
    let directories = paths::ensure_all_directories();
    logger::init(
        "allocbot",
        LoggerConfig::from_flags(&args.debug, args.verbose, args.quiet),
    );
    for failure in directories {
        logger::warning(LogTag::System, &format!("{}, continuing", failure));
    }
    logger::info(LogTag::System, &format!("allocbot v{} starting", VERSION));

    let config_path = resolve_config_path(args.config.as_deref());
    let config = match load_config_from_path(&config_path) {
        Ok(config) => config,
        Err(e) => {
            logger::error(LogTag::Config, &format!("Invalid configuration: {}", e));
            logger::flush();
            return Err(e).context("Startup configuration rejected");
        }
    };

    if let Err(e) = shutdown::install_shutdown_handlers() {
        logger::warning(
            LogTag::System,
            &format!("Could not install signal handler: {}", e),
        );
    }

    let journals = match &args.journal_dir {
        Some(dir) => JournalPaths::in_dir(dir),
        None => JournalPaths::default(),
    };
    let options = RunOptions {
        pools_path: args.pools.unwrap_or_else(paths::get_pools_path),
        journals,
        state_path: args.state.unwrap_or_else(paths::get_state_path),
        interval: Duration::from_secs(args.interval),
        max_cycles: args.max_cycles,
    };
    logger::info(
        LogTag::System,
        &format!(
            "Pools: {} | journals: {} | state: {}",
            options.pools_path.display(),
            options
                .journals
                .signals
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            options.state_path.display()
        ),
    );

    run_bot(config, options).await;
    logger::flush();
    Ok(())
}
