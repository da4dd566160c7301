//! Scoped resources held by one transcode attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{Engine, EngineError};

/// Holds the in-progress flag for as long as it lives.
#[derive(Debug)]
pub(crate) struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    /// Sets the flag, or returns `None` if it was already set.
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Virtual files staged by one attempt, removed by [`StagedFiles::release`].
pub(crate) struct StagedFiles {
    engine: Arc<dyn Engine>,
    names: Vec<String>,
}

impl StagedFiles {
    pub(crate) fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            names: Vec::new(),
        }
    }

    pub(crate) fn track(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    /// Deletes every tracked file. Failures are logged, never returned.
    /// Returns how many files were deleted.
    pub(crate) async fn release(self) -> usize {
        let mut deleted = 0;
        for name in &self.names {
            match self.engine.delete_file(name).await {
                Ok(()) => deleted += 1,
                Err(EngineError::FileNotFound { .. }) => {
                    debug!(file = %name, "Staged file already absent");
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to clean up staged file");
                }
            }
        }
        deleted
    }
}
