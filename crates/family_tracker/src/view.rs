//! Read-side projection of a tracker for display surfaces.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::{HistoryEntry, Mode, StoredState, TrackerConfig, TrackerId};

/// One row of the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct ScoreLine {
    /// Roster name.
    participant: String,
    /// Current score.
    score: i64,
}

/// Everything a dashboard card shows for one tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct TrackerView {
    /// Tracker identity.
    tracker_id: TrackerId,
    /// Saved configuration.
    config: TrackerConfig,
    /// Whose turn it is, when the roster is non-empty.
    current_participant: Option<String>,
    /// Scores in roster order; empty unless the tracker is in points mode.
    scores: Vec<ScoreLine>,
    /// History, most recent first.
    history: Vec<HistoryEntry>,
    /// Version of the state this view was built from.
    version: u64,
}

impl TrackerView {
    /// Projects stored configuration and state.
    ///
    /// A roster name with no points entry is shown with a score of 0.
    pub fn build(tracker_id: TrackerId, config: TrackerConfig, stored: &StoredState) -> Self {
        let state = stored.state();
        let participants = config.participants();

        let scores = if *config.mode() == Mode::Points {
            participants
                .iter()
                .map(|name| ScoreLine::new(name.to_string(), state.score(name).unwrap_or(0)))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            tracker_id,
            current_participant: state.current_participant(participants).map(str::to_string),
            scores,
            history: state.history().newest_first().cloned().collect(),
            version: *stored.version(),
            config,
        }
    }
}
