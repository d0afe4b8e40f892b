// Decision loop: read -> pipeline -> append -> sleep

use crate::{
    allocation::{AllocationState, AllocationStateSource, JournalAllocationSource},
    config::StrategyConfig,
    errors::AllocBotError,
    journal::{JournalWriter, LockOptions},
    logger::{self, LogTag},
    market::load_pools,
    paths::JournalPaths,
    pipeline::{run_cycle, CycleInputs, CycleOutcome, CycleState},
    shutdown,
    signals::{ConfidenceIndex, JournalSignalSource, SignalSource},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Everything the loop needs besides the strategy config
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pools_path: PathBuf,
    pub journals: JournalPaths,
    pub state_path: PathBuf,
    pub interval: Duration,
    /// Stop after this many iterations; `None` runs until a shutdown signal
    pub max_cycles: Option<u64>,
}

/// What happened over the lifetime of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub completed: u64,
    pub skipped: u64,
    pub journal_failures: usize,
}

/// Run decision cycles until `max_cycles` or a shutdown signal
pub async fn run_bot(config: StrategyConfig, options: RunOptions) -> RunSummary {
    let run_id = uuid::Uuid::new_v4().to_string();
    let lock = LockOptions::from_config(&config.journal);
    let read_wait = Duration::from_millis(config.journal.read_wait_timeout_ms);

    let writer = JournalWriter::new(options.journals.clone(), lock, run_id.clone());
    let signal_source = JournalSignalSource::new(
        options.journals.external_signals.clone(),
        config.journal.signal_tail_lines,
        read_wait,
    );
    let allocation_source = JournalAllocationSource::new(
        options.journals.allocation.clone(),
        AllocationState::from_named(&config.portfolio.initial_allocation),
        read_wait,
    );

    let mut state = CycleState::load(&options.state_path);
    let mut summary = RunSummary::default();

    logger::info(
        LogTag::System,
        &format!(
            "Decision loop started (run {}, interval {:?}, resuming after cycle {})",
            run_id, options.interval, state.cycle
        ),
    );

    loop {
        if shutdown::is_shutdown_requested() {
            break;
        }

        summary.iterations += 1;
        let started = Instant::now();
        match execute_cycle(&config, &options, &state, &writer, &signal_source, &allocation_source) {
            Ok((outcome, failures)) => {
                summary.completed += 1;
                summary.journal_failures += failures;
                log_progress(&outcome, started.elapsed());
                state = outcome.next_state;
                if let Err(e) = state.save(&options.state_path) {
                    logger::error(LogTag::System, &format!("State save failed: {}", e));
                }
            }
            Err(e) => {
                summary.skipped += 1;
                logger::warning(LogTag::Cycle, &format!("Cycle skipped: {}", e));
            }
        }

        if options.max_cycles.map_or(false, |max| summary.iterations >= max) {
            break;
        }
        if shutdown::sleep_or_shutdown(options.interval).await {
            break;
        }
    }

    logger::info(
        LogTag::System,
        &format!(
            "Decision loop stopped: {} iteration(s), {} completed, {} skipped, {} journal write failure(s)",
            summary.iterations, summary.completed, summary.skipped, summary.journal_failures
        ),
    );
    summary
}

/// One iteration; an input error skips the cycle without touching state
fn execute_cycle(
    config: &StrategyConfig,
    options: &RunOptions,
    state: &CycleState,
    writer: &JournalWriter,
    signals: &dyn SignalSource,
    allocations: &dyn AllocationStateSource,
) -> Result<(CycleOutcome, usize), AllocBotError> {
    let (pools, skipped) = load_pools(&options.pools_path)?;
    logger::debug(
        LogTag::Market,
        &format!("Loaded {} pool record(s), skipped {}", pools.len(), skipped),
    );

    let confidence = ConfidenceIndex::from_signals(&signals.read_signals());
    let allocation = allocations.current_state();

    let inputs = CycleInputs {
        pools: &pools,
        confidence: &confidence,
        allocation: &allocation,
    };
    let outcome = run_cycle(&inputs, config, state);

    let mut report = writer.record_cycle(&outcome);
    if let Some(next) = &outcome.applied_allocation {
        if let Err(e) = writer.record_allocation(Some(outcome.cycle), next, "simulated_execution") {
            report.failed += 1;
            logger::error(LogTag::Journal, &format!("Allocation write failed: {}", e));
        }
    }

    Ok((outcome, report.failed))
}

/// Per-cycle progress on stdout; not subject to `--quiet`
fn log_progress(outcome: &CycleOutcome, elapsed: Duration) {
    let line = progress_line(outcome, elapsed);
    println!("{}", line);
    logger::debug(LogTag::Cycle, &line);
}

fn progress_line(outcome: &CycleOutcome, elapsed: Duration) -> String {
    let plan = match &outcome.plan.safety.cancelled_reason {
        Some(reason) => format!("cancelled ({})", reason),
        None if outcome.plan.is_empty() => "no action".to_string(),
        None => format!(
            "{} action(s), ${:.2}{}",
            outcome.plan.actions.len(),
            outcome.plan.moved_usd(),
            if outcome.plan.safety.capped { " capped" } else { "" }
        ),
    };
    let exit = if outcome.exit.exit {
        format!(" | exit: {}", outcome.exit.reason)
    } else {
        String::new()
    };
    let fallbacks = if outcome.fallbacks.is_empty() {
        String::new()
    } else {
        format!(" | {} fallback(s)", outcome.fallbacks.len())
    };

    format!(
        "[{}] #{} {} ({:+.2}, {}) | {} | {} pools | plan: {}{}{} | {}ms",
        chrono::Local::now().format("%H:%M:%S"),
        outcome.cycle,
        outcome.decision.label,
        outcome.decision.score,
        outcome.decision.reason,
        outcome.mode.tier,
        outcome.pools_used,
        plan,
        exit,
        fallbacks,
        elapsed.as_millis()
    )
}
