//! Mutable per-tracker runtime state.

use std::collections::BTreeMap;

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{HistoryEntry, HistoryLog, Mode, Participants, TrackerConfig};

/// Participant name → score.
///
/// Keys are the roster at the moment points mode was last saved. Later roster
/// edits do not add or remove keys.
pub type PointsTable = BTreeMap<String, i64>;

/// Runtime state of one tracker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters, new)]
pub struct TrackerState {
    /// 0-based index into the roster.
    current_turn_index: usize,
    /// Scores for points-mode trackers.
    points: PointsTable,
    /// Audit log of applied actions.
    history: HistoryLog,
}

impl TrackerState {
    /// State for a tracker saved for the first time.
    #[instrument(skip(config), fields(mode = %config.mode()))]
    pub fn initial(config: &TrackerConfig) -> Self {
        Self::default().reconfigured(config)
    }

    /// State after the tracker's configuration is saved again.
    ///
    /// The turn resets to the first participant. Scores are zeroed for every
    /// participant when the mode is points and left alone otherwise. History
    /// is kept.
    #[instrument(skip(self, config), fields(mode = %config.mode()))]
    pub fn reconfigured(mut self, config: &TrackerConfig) -> Self {
        self.current_turn_index = 0;
        if *config.mode() == Mode::Points {
            self.points = config
                .participants()
                .iter()
                .map(|name| (name.to_string(), 0))
                .collect();
            debug!(participants = self.points.len(), "Points table reset");
        }
        self
    }

    /// Name of the participant whose turn it is.
    ///
    /// An index left out of range by a roster edit wraps, matching how the
    /// next advance treats it.
    pub fn current_participant<'a>(&self, participants: &'a Participants) -> Option<&'a str> {
        match participants.len() {
            0 => None,
            n => participants.get(self.current_turn_index % n),
        }
    }

    /// Score for `participant`, if it has a points entry.
    pub fn score(&self, participant: &str) -> Option<i64> {
        self.points.get(participant).copied()
    }

    pub(crate) fn set_turn_index(&mut self, index: usize) {
        self.current_turn_index = index;
    }

    pub(crate) fn points_mut(&mut self) -> &mut PointsTable {
        &mut self.points
    }

    /// Appends a history entry.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.append(entry);
    }
}
