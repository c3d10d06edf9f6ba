//! Graceful shutdown on SIGINT / SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Exit status used when a second signal forces termination.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Shared cancellation token.
///
/// The first signal only sets the flag, letting the current game's
/// in-flight evaluation finish and the cache close cleanly. A second signal
/// exits immediately.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the process-wide signal handler. Can only succeed once per
    /// process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let requested = Arc::clone(&self.requested);
        ctrlc::set_handler(move || {
            if requested.swap(true, Ordering::SeqCst) {
                warn!("second interrupt, exiting immediately");
                std::process::exit(FORCED_EXIT_CODE);
            }
            info!("shutdown requested, finishing current work (interrupt again to force)");
        })
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// The underlying flag, for code that polls it directly.
    pub fn flag(&self) -> &AtomicBool {
        &self.requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        assert!(!other.is_requested());
        shutdown.request();
        assert!(other.is_requested());
        assert!(other.flag().load(Ordering::SeqCst));
    }
}
