//! Tolerant tailed reads of JSONL journals
//!
//! Lines are scanned backwards from the end of the file in fixed-size chunks,
//! so a long journal is never loaded whole. Every line is parsed on its own;
//! lines that fail to parse (a writer caught mid-append, a crashed writer's
//! fragment) are skipped and do not count toward `max_lines`.

use super::lock::{wait_unlocked, LockOptions};
use crate::logger::{self, LogTag};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

const CHUNK_SIZE: u64 = 8 * 1024;
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Read the last `max_lines` parsable records of `path` (all when 0), in file order
///
/// With `wait_if_locked` the call first waits up to `timeout` for a writer's
/// lock marker to disappear, then reads regardless. A marker past the default
/// stale age is not waited on. A missing or unreadable
/// file yields an empty list.
pub fn read_tail<T: DeserializeOwned>(
    path: &Path,
    max_lines: usize,
    wait_if_locked: bool,
    timeout: Duration,
) -> Vec<T> {
    let stale_after = LockOptions::default().stale_after;
    if wait_if_locked && !wait_unlocked(path, timeout, WAIT_POLL, stale_after) {
        logger::debug(
            LogTag::Journal,
            &format!("{} still locked after {:?}, reading anyway", path.display(), timeout),
        );
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            logger::warning(
                LogTag::Journal,
                &format!("Cannot open {} for reading: {}", path.display(), e),
            );
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let result = scan_lines_backwards(&mut file, |line| {
        match serde_json::from_slice::<T>(line) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
        max_lines == 0 || records.len() < max_lines
    });

    if let Err(e) = result {
        logger::warning(
            LogTag::Journal,
            &format!("Read of {} interrupted: {}", path.display(), e),
        );
    }
    if skipped > 0 {
        logger::debug(
            LogTag::Journal,
            &format!("Skipped {} unparsable line(s) in {}", skipped, path.display()),
        );
    }

    records.reverse();
    records
}

/// Feed non-empty lines to `visit` from last to first until it returns false
fn scan_lines_backwards<F>(file: &mut File, mut visit: F) -> std::io::Result<()>
where
    F: FnMut(&[u8]) -> bool,
{
    let mut pos = file.seek(SeekFrom::End(0))?;
    // Bytes of the (possibly incomplete) line that starts before `pos`
    let mut carry: Vec<u8> = Vec::new();

    while pos > 0 {
        let read_len = CHUNK_SIZE.min(pos);
        pos -= read_len;
        file.seek(SeekFrom::Start(pos))?;

        let mut buf = vec![0u8; read_len as usize];
        file.read_exact(&mut buf)?;
        buf.extend_from_slice(&carry);

        // Everything before the first newline may continue in the previous chunk
        let split_at = if pos == 0 {
            0
        } else {
            match buf.iter().position(|b| *b == b'\n') {
                Some(i) => i + 1,
                None => {
                    carry = buf;
                    continue;
                }
            }
        };

        for line in buf[split_at..].rsplit(|b| *b == b'\n') {
            let line = trim_line(line);
            if line.is_empty() {
                continue;
            }
            if !visit(line) {
                return Ok(());
            }
        }

        carry = buf[..split_at].to_vec();
    }

    Ok(())
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\r' || line[end - 1] == b' ' || line[end - 1] == b'\t') {
        end -= 1;
    }
    let mut start = 0;
    while start < end && (line[start] == b' ' || line[start] == b'\t') {
        start += 1;
    }
    &line[start..end]
}
