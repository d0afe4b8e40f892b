use crate::logger::{self, LogTag};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

// ═══════════════════════════════════════════════════════════════════════════════
// SHUTDOWN MANAGEMENT
// ═══════════════════════════════════════════════════════════════════════════════
//
// Cancellation is cooperative: the loop checks the flag once per iteration,
// and the only thing a signal interrupts is the sleep between cycles. A cycle
// in progress always runs to its end-of-cycle save point.
// ═══════════════════════════════════════════════════════════════════════════════

pub static SHUTDOWN_MANAGER: Lazy<ShutdownManager> = Lazy::new(ShutdownManager::new);

pub struct ShutdownManager {
    shutdown_requested: AtomicBool,
    wake: Notify,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Set the flag and wake a sleeping loop; repeated calls are no-ops
    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::AcqRel) {
            self.wake.notify_one();
        }
    }

    /// Sleep for `duration` unless shutdown is requested first
    ///
    /// Returns true when the sleep was cut short.
    pub async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        if self.is_shutdown_requested() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_shutdown_requested(),
            _ = self.wake.notified() => true,
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the Ctrl+C / SIGTERM handler
pub fn install_shutdown_handlers() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        logger::warning(
            LogTag::System,
            "Shutdown signal received, finishing current cycle",
        );
        SHUTDOWN_MANAGER.request_shutdown();
    })
}

pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_MANAGER.is_shutdown_requested()
}

pub fn request_shutdown() {
    SHUTDOWN_MANAGER.request_shutdown();
}

pub async fn sleep_or_shutdown(duration: Duration) -> bool {
    SHUTDOWN_MANAGER.sleep_or_shutdown(duration).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_signal() {
        let manager = ShutdownManager::new();
        assert!(!manager.sleep_or_shutdown(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_request_interrupts_sleep() {
        let manager = ShutdownManager::new();
        manager.request_shutdown();
        let started = std::time::Instant::now();
        assert!(manager.sleep_or_shutdown(Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        manager.request_shutdown();
        assert!(manager.is_shutdown_requested());
    }
}
