//! Cooperative stop flag shared between signal handlers and long-running services.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once; observed by the crawl loop at page boundaries.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
