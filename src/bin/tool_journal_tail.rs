use allocbot::{
    allocation::Direction,
    journal::{read_tail, AllocationRecord, AnomalyRecord, DecisionRecord, SignalRecord},
    paths::JournalPaths,
    types::{Bucket, ModeTier},
};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "tool_journal_tail")]
#[command(about = "Print the most recent records of every journal", long_about = None)]
struct Args {
    #[arg(long)]
    journal_dir: Option<PathBuf>,

    /// Records per journal
    #[arg(short = 'n', long, default_value_t = 10)]
    lines: usize,

    /// Milliseconds to wait for a writer's lock before reading anyway
    #[arg(long, default_value_t = 1_000)]
    wait_ms: u64,
}

fn main() {
    let args = Args::parse();
    let journals = args
        .journal_dir
        .as_deref()
        .map(JournalPaths::in_dir)
        .unwrap_or_default();
    let wait = Duration::from_millis(args.wait_ms);

    header("SIGNALS", &journals.signals);
    let signals: Vec<SignalRecord> = read_tail(&journals.signals, args.lines, true, wait);
    for r in &signals {
        let s = &r.payload;
        let exit = if s.exit.exit {
            format!(" EXIT {}", s.exit.reason).red().bold().to_string()
        } else {
            String::new()
        };
        println!(
            "{} #{:<5} {:<12} {:+.2} {} actions={} moved=${:.2}{}",
            r.timestamp.format("%m-%d %H:%M:%S").to_string().dimmed(),
            s.cycle,
            s.context.to_string().cyan(),
            s.score,
            tier(s.mode.tier),
            s.plan.actions,
            s.plan.moved_usd,
            exit
        );
    }

    header("DECISIONS", &journals.decisions);
    let decisions: Vec<DecisionRecord> = read_tail(&journals.decisions, args.lines, true, wait);
    for r in &decisions {
        let d = &r.payload;
        let amount = match d.direction {
            Direction::Increase => format!("+${:.2}", d.amount_usd).green(),
            Direction::Decrease => format!("-${:.2}", d.amount_usd).red(),
        };
        println!(
            "{} #{:<5} {:<8} {}{}",
            r.timestamp.format("%m-%d %H:%M:%S").to_string().dimmed(),
            d.cycle,
            d.bucket.to_string(),
            amount,
            if d.capped { " (capped)".yellow().to_string() } else { String::new() }
        );
    }

    header("ALLOCATION", &journals.allocation);
    let allocations: Vec<AllocationRecord> =
        read_tail(&journals.allocation, args.lines, true, wait);
    for r in &allocations {
        let state = &r.payload.state;
        let parts: Vec<String> = Bucket::ALL
            .iter()
            .map(|b| format!("{}=${:.2}", b, state.amount(*b)))
            .collect();
        println!(
            "{} {:<20} {} total=${:.2}",
            r.timestamp.format("%m-%d %H:%M:%S").to_string().dimmed(),
            r.payload.source,
            parts.join(" "),
            state.total()
        );
    }

    header("ANOMALIES", &journals.anomalies);
    let anomalies: Vec<AnomalyRecord> = read_tail(&journals.anomalies, args.lines, true, wait);
    for r in &anomalies {
        let a = &r.payload;
        println!(
            "{} {:<16} {}",
            r.timestamp.format("%m-%d %H:%M:%S").to_string().dimmed(),
            a.kind.as_str().yellow(),
            a.detail
        );
    }
}

fn header(title: &str, path: &std::path::Path) {
    println!();
    println!("{} {}", title.bold(), path.display().to_string().dimmed());
}

fn tier(tier: ModeTier) -> ColoredString {
    let text = tier.to_string();
    match tier {
        ModeTier::Normal => text.green(),
        ModeTier::Tension => text.yellow(),
        ModeTier::Alerte => text.bright_yellow(),
        ModeTier::Crise => text.red(),
        ModeTier::Panic => text.red().bold(),
    }
}
