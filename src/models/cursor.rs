//! Crawl cursor: pagination offset plus the operator's run/stop flag.

use serde::{Deserialize, Serialize};

/// Whether the crawler should keep paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Run,
    Stop,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Stop => "stop",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "run" => Some(Self::Run),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Durable position of the crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCursor {
    pub offset: u64,
    pub run_state: RunState,
}

impl CrawlCursor {
    pub fn stop_requested(&self) -> bool {
        self.run_state == RunState::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cursor() {
        let cursor = CrawlCursor::default();
        assert_eq!(cursor.offset, 0);
        assert_eq!(cursor.run_state, RunState::Run);
        assert!(!cursor.stop_requested());
    }

    #[test]
    fn test_run_state_str() {
        for state in [RunState::Run, RunState::Stop] {
            assert_eq!(RunState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(RunState::from_str("paused"), None);
    }
}
