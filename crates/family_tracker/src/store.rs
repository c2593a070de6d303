//! Persistence seam for tracker configuration and state.

use derive_getters::Getters;
use derive_new::new;

use crate::{StoreError, TrackerConfig, TrackerId, TrackerState};

/// A tracker's state together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct StoredState {
    /// The state as last committed.
    state: TrackerState,
    /// Incremented on every committed write.
    version: u64,
}

impl StoredState {
    /// Splits into state and version.
    pub fn into_parts(self) -> (TrackerState, u64) {
        (self.state, self.version)
    }
}

/// Storage for tracker configuration, state, and history.
///
/// Every write is a compare-and-swap on the stored version: it commits
/// atomically when the caller's `expected_version` still matches, and fails
/// with [`StoreError::VersionConflict`] otherwise. History is append-only;
/// a write carrying fewer entries than are stored fails with
/// [`StoreError::HistoryRewrite`].
pub trait TrackerStore: std::fmt::Debug + Send + Sync {
    /// Configuration for `id`, if the tracker exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on backend failure.
    fn get_tracker(&self, id: TrackerId) -> Result<Option<TrackerConfig>, StoreError>;

    /// State and version for `id`, if the tracker exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on backend failure.
    fn get_state(&self, id: TrackerId) -> Result<Option<StoredState>, StoreError>;

    /// Replaces the state of an existing tracker and returns the new version.
    ///
    /// History entries past the stored count are appended in the same commit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TrackerNotFound`], [`StoreError::VersionConflict`],
    /// [`StoreError::HistoryRewrite`], or [`StoreError::Backend`].
    fn put_state(
        &self,
        id: TrackerId,
        state: &TrackerState,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Saves configuration and state together and returns the new version.
    ///
    /// `expected_version` is `None` to create a tracker that must not exist
    /// yet, or the version last read to update one that does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TrackerNotFound`], [`StoreError::VersionConflict`],
    /// [`StoreError::HistoryRewrite`], or [`StoreError::Backend`].
    fn save_tracker(
        &self,
        id: TrackerId,
        config: &TrackerConfig,
        state: &TrackerState,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Every stored tracker, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on backend failure.
    fn list_trackers(&self) -> Result<Vec<(TrackerId, TrackerConfig)>, StoreError>;
}

/// Rejects a write whose history is shorter than what is stored.
///
/// # Errors
///
/// Returns [`StoreError::HistoryRewrite`] when `proposed < stored`.
pub fn ensure_append_only(
    tracker_id: TrackerId,
    stored: usize,
    proposed: usize,
) -> Result<(), StoreError> {
    if proposed < stored {
        return Err(StoreError::HistoryRewrite {
            tracker_id,
            stored,
            proposed,
        });
    }
    Ok(())
}
