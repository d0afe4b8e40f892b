//! Log formatting and output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Dual output (console + file)
//! - Broken pipe handling for piped commands

use super::file::write_to_file;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 9;
const LOG_TYPE_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, log_type: &str, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();

    let tag_str = format_tag(&tag);
    let log_type_str = format_log_type(log_type);

    let mut lines = message.split('\n');
    let first = lines.next().unwrap_or_default();

    print_stdout_safe(&format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        log_type_str,
        first
    ));

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let tag_clean = tag.to_plain_string();
    write_to_file(&format!("{} [{}] [{}] {}", timestamp, tag_clean, log_type, first));

    // Continuation lines keep the prefix alignment
    let continuation_prefix = " ".repeat(time.len() + TAG_WIDTH + LOG_TYPE_WIDTH + 7);
    for line in lines {
        print_stdout_safe(&format!("{}{}", continuation_prefix, line));
        write_to_file(&format!("{} [{}] [{}] {}", timestamp, tag_clean, log_type, line));
    }
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Journal => label.bright_blue().bold(),
        LogTag::Market => label.bright_cyan().bold(),
        LogTag::Detector => label.bright_green().bold(),
        LogTag::Mode => label.bright_red().bold(),
        LogTag::Policy => label.bright_magenta().bold(),
        LogTag::Scoring => label.bright_purple().bold(),
        LogTag::Planner => label.bright_green().bold(),
        LogTag::Exit => label.bright_red().bold(),
        LogTag::Cycle => label.bright_cyan().bold(),
        LogTag::Observer => label.bright_yellow().bold(),
        LogTag::Signals => label.bright_white().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

/// Format log type with appropriate color
fn format_log_type(log_type: &str) -> ColoredString {
    let label = format!("{:<width$}", log_type, width = LOG_TYPE_WIDTH);
    match log_type.to_uppercase().as_str() {
        "ERROR" => label.bright_red().bold(),
        "WARNING" => label.bright_yellow().bold(),
        "DEBUG" | "VERBOSE" => label.dimmed(),
        _ => label.white().bold(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    if let Err(e) = writeln!(stdout(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    if let Err(e) = stdout().flush() {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
