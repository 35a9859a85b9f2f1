use std::sync::Arc;

use tracing::info;

use coach_core::Clock;
use coach_core::model::{Nudge, NudgeId};
use storage::repository::NudgeRepository;

use crate::error::NudgeInboxError;

/// Read side of the nudge queue for whatever delivers nudges to the learner.
#[derive(Clone)]
pub struct NudgeInbox {
    clock: Clock,
    nudges: Arc<dyn NudgeRepository>,
}

impl NudgeInbox {
    #[must_use]
    pub fn new(clock: Clock, nudges: Arc<dyn NudgeRepository>) -> Self {
        Self { clock, nudges }
    }

    /// Undelivered nudges, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NudgeInboxError::Storage` on repository failures.
    pub async fn pending(&self, limit: Option<usize>) -> Result<Vec<Nudge>, NudgeInboxError> {
        Ok(self.nudges.pending_nudges(limit).await?)
    }

    /// Mark nudges as delivered now. Returns how many changed state.
    ///
    /// # Errors
    ///
    /// Returns `NudgeInboxError::Storage` on repository failures.
    pub async fn mark_delivered(&self, ids: &[NudgeId]) -> Result<usize, NudgeInboxError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let marked = self.nudges.mark_delivered(ids, self.clock.now()).await?;
        info!(requested = ids.len(), marked, "nudges delivered");
        Ok(marked)
    }
}
