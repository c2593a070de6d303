//! Action dispatcher: the single entry point for tracker reads and writes.
//!
//! Each call reloads configuration and state from the store, applies the
//! action, and commits state plus one history entry with a versioned write.
//! Writes to the same tracker are serialized by a per-tracker lock inside the
//! process, and by the store's version check across processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use derive_getters::Getters;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::{
    Action, ActionError, ActionOutcome, Actor, HistoryEntry, StoreError, StoredState,
    TrackerConfig, TrackerId, TrackerState, TrackerStore, TrackerView,
};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Contention budgets for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct DispatchSettings {
    /// How long to wait for the per-tracker lock.
    lock_timeout: Duration,
    /// Load-compute-store cycles before giving up on version conflicts.
    max_attempts: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

impl DispatchSettings {
    /// Sets the lock wait timeout.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Sets the attempt budget. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Routes actions to engines and persists the results.
///
/// Clones share locks and store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<dyn TrackerStore>,
    locks: Arc<Mutex<HashMap<TrackerId, Arc<Mutex<()>>>>>,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Creates a dispatcher over `store` with default settings.
    pub fn new(store: Arc<dyn TrackerStore>) -> Self {
        Self::with_settings(store, DispatchSettings::default())
    }

    /// Creates a dispatcher over `store`.
    #[instrument(skip(store))]
    pub fn with_settings(store: Arc<dyn TrackerStore>, settings: DispatchSettings) -> Self {
        info!("Creating dispatcher");
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
            settings,
        }
    }

    /// The active settings.
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Applies `action` to tracker `id` on behalf of `actor`.
    ///
    /// On success the new state and exactly one history entry are committed
    /// together. On failure nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] describing why the action was rejected.
    pub fn dispatch(
        &self,
        id: TrackerId,
        action: &Action,
        actor: &Actor,
    ) -> Result<ActionOutcome, ActionError> {
        self.dispatch_with_rng(id, action, actor, &mut rand::thread_rng())
    }

    /// [`dispatch`](Self::dispatch) with a caller-supplied random source.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] describing why the action was rejected.
    #[instrument(skip(self, action, actor, rng), fields(action = %action.kind(), actor = %actor))]
    pub fn dispatch_with_rng<R: Rng + ?Sized>(
        &self,
        id: TrackerId,
        action: &Action,
        actor: &Actor,
        rng: &mut R,
    ) -> Result<ActionOutcome, ActionError> {
        action.validate()?;
        if self.store.get_tracker(id)?.is_none() {
            debug!("Unknown tracker");
            return Err(ActionError::NotFound { tracker_id: id });
        }

        self.with_tracker_lock(id, || self.commit_action(id, action, actor, rng))
    }

    /// Load, apply, and store until the write lands or the attempt budget runs out.
    fn commit_action<R: Rng + ?Sized>(
        &self,
        id: TrackerId,
        action: &Action,
        actor: &Actor,
        rng: &mut R,
    ) -> Result<ActionOutcome, ActionError> {
        for attempt in 1..=self.settings.max_attempts {
            let config = self
                .store
                .get_tracker(id)?
                .ok_or(ActionError::NotFound { tracker_id: id })?;
            let (mut state, version) = self
                .store
                .get_state(id)?
                .ok_or(ActionError::NotFound { tracker_id: id })?
                .into_parts();

            let (outcome, subject, details) = action.apply(&config, &mut state, rng)?.into_parts();
            state.record(HistoryEntry::new(
                Utc::now(),
                action.kind(),
                actor.clone(),
                subject,
                details,
            ));

            match self.store.put_state(id, &state, version) {
                Ok(new_version) => {
                    info!(version = new_version, "Action committed");
                    return Ok(outcome);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(attempt, "Version conflict, reloading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted(id))
    }

    /// Saves `config` for tracker `id`, creating it if needed.
    ///
    /// The turn resets to the first participant; points reset when the mode
    /// is points. No history entry is written.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Conflict`] under sustained contention or
    /// [`ActionError::Storage`] on backend failure.
    #[instrument(skip(self, config), fields(title = %config.title(), mode = %config.mode()))]
    pub fn configure(
        &self,
        id: TrackerId,
        config: TrackerConfig,
    ) -> Result<TrackerView, ActionError> {
        self.with_tracker_lock(id, || self.commit_config(id, config))
    }

    fn commit_config(
        &self,
        id: TrackerId,
        config: TrackerConfig,
    ) -> Result<TrackerView, ActionError> {
        for attempt in 1..=self.settings.max_attempts {
            let existing = self.store.get_state(id)?;
            let (state, expected) = match existing {
                Some(stored) => {
                    let (state, version) = stored.into_parts();
                    (state.reconfigured(&config), Some(version))
                }
                None => (TrackerState::initial(&config), None),
            };

            match self.store.save_tracker(id, &config, &state, expected) {
                Ok(version) => {
                    info!(version, created = expected.is_none(), "Tracker configured");
                    return Ok(TrackerView::build(
                        id,
                        config,
                        &StoredState::new(state, version),
                    ));
                }
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(attempt, "Version conflict, reloading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted(id))
    }

    /// Current view of tracker `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub fn view(&self, id: TrackerId) -> Result<TrackerView, ActionError> {
        let config = self
            .store
            .get_tracker(id)?
            .ok_or(ActionError::NotFound { tracker_id: id })?;
        let stored = self
            .store
            .get_state(id)?
            .ok_or(ActionError::NotFound { tracker_id: id })?;
        debug!(version = stored.version(), "Tracker loaded");
        Ok(TrackerView::build(id, config, &stored))
    }

    /// All trackers, ordered by title and then id.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Storage`] on backend failure.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<TrackerView>, ActionError> {
        let mut trackers = self.store.list_trackers()?;
        trackers.sort_by(|(a_id, a), (b_id, b)| a.title().cmp(b.title()).then(a_id.cmp(b_id)));

        let mut views = Vec::with_capacity(trackers.len());
        for (id, config) in trackers {
            // A tracker deleted between listing and loading is skipped.
            if let Some(stored) = self.store.get_state(id)? {
                views.push(TrackerView::build(id, config, &stored));
            }
        }
        debug!(count = views.len(), "Trackers listed");
        Ok(views)
    }

    /// Runs `work` while holding tracker `id`'s lock, then drops the lock
    /// entry if no other caller is waiting on it.
    fn with_tracker_lock<T>(
        &self,
        id: TrackerId,
        work: impl FnOnce() -> Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        let lock = self.tracker_lock(id);
        let result = self.acquire(id, &lock).and_then(|_guard| work());
        self.release(id, lock);
        result
    }

    fn tracker_lock(&self, id: TrackerId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    fn release(&self, id: TrackerId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Held by the map and by `lock` only: nobody else is queued.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn acquire<'a>(
        &self,
        id: TrackerId,
        lock: &'a Mutex<()>,
    ) -> Result<MutexGuard<'a, ()>, ActionError> {
        let deadline = Instant::now() + self.settings.lock_timeout;
        loop {
            match lock.try_lock() {
                Ok(guard) => return Ok(guard),
                // The guarded value is `()`, so a panicked holder leaves nothing to repair.
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    warn!(tracker_id = %id, "Timed out waiting for tracker lock");
                    return Err(ActionError::Conflict {
                        tracker_id: id,
                        detail: "timed out waiting for tracker lock".to_string(),
                    });
                }
                Err(TryLockError::WouldBlock) => thread::sleep(LOCK_POLL_INTERVAL),
            }
        }
    }

    fn exhausted(&self, id: TrackerId) -> ActionError {
        warn!(tracker_id = %id, attempts = self.settings.max_attempts, "Giving up after version conflicts");
        ActionError::Conflict {
            tracker_id: id,
            detail: format!(
                "gave up after {} conflicting attempts",
                self.settings.max_attempts
            ),
        }
    }
}
