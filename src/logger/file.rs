/// Daily log file sink
///
/// The sink is opened by `logger::init` and stays closed otherwise, in which
/// case `write_to_file` is a no-op.
use crate::paths;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

static LOG_FILE: Lazy<Mutex<Option<BufWriter<File>>>> = Lazy::new(|| Mutex::new(None));

/// Open `<logs>/<binary>_<date>.log` for appending
pub fn init_file_logging(binary_name: &str) {
    let dir = paths::get_logs_directory();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Failed to create logs directory {}: {}", dir.display(), e);
        return;
    }

    let file_name = format!("{}_{}.log", binary_name, Local::now().format("%Y-%m-%d"));
    let path = dir.join(file_name);

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            *LOG_FILE.lock() = Some(BufWriter::new(file));
        }
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
        }
    }
}

/// Append one line to the log file if it is open
pub fn write_to_file(line: &str) {
    let mut guard = LOG_FILE.lock();
    if let Some(writer) = guard.as_mut() {
        if writeln!(writer, "{}", line).is_err() {
            // Sink is dropped after the first failed write
            *guard = None;
        }
    }
}

pub fn flush_file_logging() {
    if let Some(writer) = LOG_FILE.lock().as_mut() {
        let _ = writer.flush();
    }
}
