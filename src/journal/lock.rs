//! Advisory lock markers for shared journals
//!
//! A journal `x.jsonl` is guarded by a sibling marker `x.jsonl.lock` created
//! with `create_new`. The lock is cooperative: a caller that cannot get it
//! within its timeout proceeds anyway, and a marker older than `stale_after`
//! is treated as left behind by a crashed holder and reclaimed.

use crate::logger::{self, LogTag};
use crate::paths::lock_path_for;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Timing knobs for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
            stale_after: Duration::from_secs(30),
        }
    }
}

impl LockOptions {
    pub fn from_config(config: &crate::config::JournalConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.lock_timeout_ms),
            poll_interval: Duration::from_millis(config.lock_poll_ms.max(1)),
            stale_after: Duration::from_secs(config.stale_lock_secs),
        }
    }
}

/// Contents of a lock marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    pub owner_pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockToken {
    fn current() -> Self {
        Self {
            owner_pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// Held advisory lock; the marker is removed on drop
#[derive(Debug)]
pub struct LockGuard {
    marker: PathBuf,
    token: LockToken,
}

impl LockGuard {
    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Only remove the marker if it is still ours; after a stale reclaim
        // another process may own it now.
        match read_token(&self.marker) {
            Some(current) if current != self.token => {
                logger::debug(
                    LogTag::Journal,
                    &format!(
                        "Lock {} now owned by pid {}, leaving it in place",
                        self.marker.display(),
                        current.owner_pid
                    ),
                );
            }
            _ => remove_marker(&self.marker),
        }
    }
}

/// Typed entry point: `JournalLock::acquire(path, &opts) -> Option<LockGuard>`
pub struct JournalLock;

impl JournalLock {
    /// Try to lock `journal`; `None` means "proceed without exclusivity"
    pub fn acquire(journal: &Path, options: &LockOptions) -> Option<LockGuard> {
        let marker = lock_path_for(journal);
        let deadline = Instant::now() + options.timeout;
        let mut reclaimed = false;

        loop {
            match try_create(&marker) {
                Ok(token) => return Some(LockGuard { marker, token }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => {
                    logger::warning(
                        LogTag::Journal,
                        &format!("Cannot create lock {}: {}", marker.display(), e),
                    );
                    return None;
                }
            }

            if !reclaimed && marker_age(&marker).map_or(false, |age| age > options.stale_after) {
                reclaimed = true;
                // Two processes can both see the marker as stale, and the later
                // remove can delete the earlier reclaimer's fresh marker. Both then
                // write concurrently; appends stay line-atomic and readers skip
                // torn lines, so the lock stays advisory here.
                logger::warning(
                    LogTag::Journal,
                    &format!("Reclaiming stale lock {}", marker.display()),
                );
                remove_marker(&marker);
                match try_create(&marker) {
                    Ok(token) => return Some(LockGuard { marker, token }),
                    Err(e) => {
                        logger::debug(
                            LogTag::Journal,
                            &format!("Stale lock retry lost for {}: {}", marker.display(), e),
                        );
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                logger::warning(
                    LogTag::Journal,
                    &format!(
                        "Lock timeout after {:?} on {}, proceeding without exclusivity",
                        options.timeout,
                        journal.display()
                    ),
                );
                return None;
            }

            std::thread::sleep(options.poll_interval.min(deadline - now));
        }
    }
}

/// Boolean form of `JournalLock::acquire`
///
/// On success the marker is left in place; call `release_lock` when done.
pub fn acquire_lock(
    journal: &Path,
    timeout: Duration,
    poll_interval: Duration,
    stale_after: Duration,
) -> bool {
    let options = LockOptions {
        timeout,
        poll_interval,
        stale_after,
    };
    match JournalLock::acquire(journal, &options) {
        Some(guard) => {
            std::mem::forget(guard);
            true
        }
        None => false,
    }
}

/// Best-effort removal of the marker guarding `journal`
pub fn release_lock(journal: &Path) {
    remove_marker(&lock_path_for(journal));
}

/// Whether `journal` currently has a lock marker
pub fn is_locked(journal: &Path) -> bool {
    lock_path_for(journal).exists()
}

/// Wait until `journal` is unlocked or `timeout` elapses; returns whether it is free
///
/// A marker older than `stale_after` belongs to a dead holder and counts as free.
pub fn wait_unlocked(
    journal: &Path,
    timeout: Duration,
    poll_interval: Duration,
    stale_after: Duration,
) -> bool {
    let marker = lock_path_for(journal);
    let deadline = Instant::now() + timeout;
    while marker.exists() {
        if marker_age(&marker).map_or(false, |age| age > stale_after) {
            logger::debug(
                LogTag::Journal,
                &format!("Ignoring stale lock {}", marker.display()),
            );
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(poll_interval.min(deadline - now));
    }
    true
}

fn try_create(marker: &Path) -> std::io::Result<LockToken> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(marker)?;
    let token = LockToken::current();
    // Marker contents are informational; an empty marker still locks.
    if let Ok(body) = serde_json::to_vec(&token) {
        let _ = file.write_all(&body);
    }
    Ok(token)
}

fn read_token(marker: &Path) -> Option<LockToken> {
    let bytes = fs::read(marker).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn marker_age(marker: &Path) -> Option<Duration> {
    if let Some(token) = read_token(marker) {
        let age = Utc::now().signed_duration_since(token.acquired_at);
        return age.to_std().ok().or(Some(Duration::ZERO));
    }
    let modified = fs::metadata(marker).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

fn remove_marker(marker: &Path) {
    match fs::remove_file(marker) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            logger::warning(
                LogTag::Journal,
                &format!("Failed to remove lock {}: {}", marker.display(), e),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(120),
            poll_interval: Duration::from_millis(10),
            stale_after: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_acquire_and_release_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("signals.jsonl");

        let guard = JournalLock::acquire(&journal, &fast()).expect("lock should be free");
        assert!(is_locked(&journal));
        assert_eq!(guard.token().owner_pid, std::process::id());

        drop(guard);
        assert!(!is_locked(&journal));
    }

    #[test]
    fn test_second_acquire_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("signals.jsonl");

        let _held = JournalLock::acquire(&journal, &fast()).unwrap();
        let started = Instant::now();
        assert!(JournalLock::acquire(&journal, &fast()).is_none());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("decisions.jsonl");
        let stale = LockToken {
            owner_pid: 999_999,
            acquired_at: Utc::now() - chrono::Duration::minutes(10),
        };
        fs::write(lock_path_for(&journal), serde_json::to_vec(&stale).unwrap()).unwrap();

        let guard = JournalLock::acquire(&journal, &fast()).expect("stale lock reclaimed");
        assert_eq!(guard.token().owner_pid, std::process::id());
    }

    #[test]
    fn test_guard_leaves_foreign_marker() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("signals.jsonl");
        let guard = JournalLock::acquire(&journal, &fast()).unwrap();

        let foreign = LockToken {
            owner_pid: 4242,
            acquired_at: Utc::now(),
        };
        fs::write(guard.marker_path(), serde_json::to_vec(&foreign).unwrap()).unwrap();
        drop(guard);

        assert!(is_locked(&journal));
        release_lock(&journal);
        assert!(!is_locked(&journal));
    }

    #[test]
    fn test_bool_api_and_missing_marker_release() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("anomalies.jsonl");
        let opts = fast();

        assert!(acquire_lock(&journal, opts.timeout, opts.poll_interval, opts.stale_after));
        assert!(is_locked(&journal));
        release_lock(&journal);
        release_lock(&journal);
        assert!(!is_locked(&journal));
    }

    #[test]
    fn test_missing_directory_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("nope").join("signals.jsonl");
        assert!(JournalLock::acquire(&journal, &fast()).is_none());
    }

    #[test]
    fn test_wait_unlocked_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("signals.jsonl");
        let stale_after = fast().stale_after;
        assert!(wait_unlocked(&journal, Duration::from_millis(10), Duration::from_millis(5), stale_after));

        let _held = JournalLock::acquire(&journal, &fast()).unwrap();
        assert!(!wait_unlocked(&journal, Duration::from_millis(30), Duration::from_millis(5), stale_after));
    }

    #[test]
    fn test_wait_unlocked_ignores_stale_marker() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("allocation.jsonl");
        let stale = LockToken {
            owner_pid: 999_999,
            acquired_at: Utc::now() - chrono::Duration::minutes(10),
        };
        fs::write(lock_path_for(&journal), serde_json::to_vec(&stale).unwrap()).unwrap();

        let started = Instant::now();
        assert!(wait_unlocked(
            &journal,
            Duration::from_secs(5),
            Duration::from_millis(5),
            Duration::from_secs(60),
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
        // Waiting never removes the marker
        assert!(is_locked(&journal));
    }
}
