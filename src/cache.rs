use tokio::sync::Mutex;

use crate::error::ExtractError;
use crate::keys::{parse_key_schedule, KeySchedule};
use crate::util;

/// Source of the player script text. Split off from the sources API so the
/// cache only depends on the one call it needs.
pub trait FetchScript {
    async fn fetch_script(&self) -> Result<String, ExtractError>;
}

/// Holds the last-known-good key schedule for one embed host.
///
/// The slot starts empty and is populated on first `get`. The fetch and parse
/// of a cold slot run while the lock is held, so concurrent cold callers
/// serialize behind a single computation instead of fetching the script N
/// times. A warm `get` is lock-and-clone only.
#[derive(Default)]
pub struct ScheduleCache {
    slot: Mutex<KeySchedule>,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schedule, computing and storing it first if the
    /// slot is empty. The slot is only written once fetch and parse have both
    /// succeeded, so an error or a cancelled fetch leaves it empty rather
    /// than half-written.
    pub async fn get<F: FetchScript>(&self, source: &F) -> Result<KeySchedule, ExtractError> {
        let mut slot = self.slot.lock().await;
        if slot.is_empty() {
            util::debug("schedule cache cold, fetching player script");
            let script = source.fetch_script().await?;
            *slot = parse_key_schedule(&script)?;
            util::debug(format!("cached key schedule with {} pairs", slot.pairs().len()));
        }
        Ok(slot.clone())
    }

    /// Drops the cached schedule so the next `get` recomputes it. Clears only
    /// if the slot is still populated: when several attempts fail against the
    /// same stale schedule, the first invalidation wins and later ones are
    /// no-ops.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if !slot.is_empty() {
            util::debug("invalidating cached key schedule");
            *slot = KeySchedule::empty();
        }
    }
}
