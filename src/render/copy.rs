use super::markdown::BlockId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const COPY_CONFIRMATION_WINDOW: Duration = Duration::from_secs(2);

/// Tracks which code blocks were just copied.
///
/// Entries are keyed by [`BlockId`], so re-rendering a growing answer leaves
/// confirmations for blocks that are already on screen untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CopyFeedback {
    confirmed: HashMap<BlockId, Instant>,
}

impl CopyFeedback {
    pub fn confirm(&mut self, id: BlockId, now: Instant) {
        self.confirmed.insert(id, now);
    }

    pub fn is_confirmed(&self, id: &BlockId, now: Instant) -> bool {
        self.confirmed
            .get(id)
            .is_some_and(|at| now.saturating_duration_since(*at) < COPY_CONFIRMATION_WINDOW)
    }

    /// Drops expired confirmations. Returns true when anything changed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.confirmed.len();
        self.confirmed
            .retain(|_, at| now.saturating_duration_since(*at) < COPY_CONFIRMATION_WINDOW);
        before != self.confirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }
}
