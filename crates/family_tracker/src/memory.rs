//! In-process tracker store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument, warn};

use crate::store::ensure_append_only;
use crate::{StoreError, StoredState, TrackerConfig, TrackerId, TrackerState, TrackerStore};

#[derive(Debug, Clone)]
struct Record {
    config: TrackerConfig,
    state: TrackerState,
    version: u64,
}

/// [`TrackerStore`] backed by a shared map. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<TrackerId, Record>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory tracker store");
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<TrackerId, Record>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::backend(format!("memory store lock poisoned: {e}")))
    }
}

impl TrackerStore for MemoryStore {
    #[instrument(skip(self))]
    fn get_tracker(&self, id: TrackerId) -> Result<Option<TrackerConfig>, StoreError> {
        let config = self.records()?.get(&id).map(|r| r.config.clone());
        debug!(found = config.is_some(), "Tracker lookup");
        Ok(config)
    }

    #[instrument(skip(self))]
    fn get_state(&self, id: TrackerId) -> Result<Option<StoredState>, StoreError> {
        Ok(self
            .records()?
            .get(&id)
            .map(|r| StoredState::new(r.state.clone(), r.version)))
    }

    #[instrument(skip(self, state), fields(history = state.history().len()))]
    fn put_state(
        &self,
        id: TrackerId,
        state: &TrackerState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut records = self.records()?;
        let record = records
            .get_mut(&id)
            .ok_or(StoreError::TrackerNotFound { tracker_id: id })?;

        if record.version != expected_version {
            warn!(stored = record.version, expected_version, "Stale state write");
            return Err(StoreError::VersionConflict {
                tracker_id: id,
                expected: Some(expected_version),
            });
        }
        ensure_append_only(id, record.state.history().len(), state.history().len())?;

        record.state = state.clone();
        record.version += 1;
        debug!(version = record.version, "State committed");
        Ok(record.version)
    }

    #[instrument(skip(self, config, state), fields(title = %config.title()))]
    fn save_tracker(
        &self,
        id: TrackerId,
        config: &TrackerConfig,
        state: &TrackerState,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut records = self.records()?;
        let version = match (records.get(&id), expected_version) {
            (None, None) => 1,
            (None, Some(_)) => return Err(StoreError::TrackerNotFound { tracker_id: id }),
            (Some(record), Some(expected)) if record.version == expected => {
                ensure_append_only(id, record.state.history().len(), state.history().len())?;
                expected + 1
            }
            (Some(_), _) => {
                warn!(?expected_version, "Stale tracker save");
                return Err(StoreError::VersionConflict {
                    tracker_id: id,
                    expected: expected_version,
                });
            }
        };

        records.insert(
            id,
            Record {
                config: config.clone(),
                state: state.clone(),
                version,
            },
        );
        info!(version, "Tracker saved");
        Ok(version)
    }

    #[instrument(skip(self))]
    fn list_trackers(&self) -> Result<Vec<(TrackerId, TrackerConfig)>, StoreError> {
        Ok(self
            .records()?
            .iter()
            .map(|(id, r)| (*id, r.config.clone()))
            .collect())
    }
}
