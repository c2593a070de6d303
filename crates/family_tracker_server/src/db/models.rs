//! Row types and their conversion to the tracker domain.

use std::str::FromStr;

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use family_tracker::{
    ActionKind, Actor, HistoryEntry, Mode, Participants, PointsTable, RotationInterval,
    TrackerConfig, TrackerId,
};
use tracing::instrument;

use crate::db::{DbError, schema};

/// Tracker configuration row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::trackers)]
pub struct TrackerRow {
    id: i64,
    title: String,
    mode: String,
    rotation_interval: Option<String>,
    participants: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TrackerRow {
    /// Parses the row into its id and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a column holds an unknown enum value or bad JSON.
    #[instrument(skip(self), fields(id = self.id))]
    pub fn into_config(self) -> Result<(TrackerId, TrackerConfig), DbError> {
        let id = tracker_id(self.id)?;
        let mode = Mode::from_str(&self.mode)?;
        let interval = self
            .rotation_interval
            .as_deref()
            .map(RotationInterval::from_str)
            .transpose()?;
        let participants: Participants = serde_json::from_str(&self.participants)?;
        Ok((id, TrackerConfig::new(self.title, mode, interval, participants)))
    }
}

/// Insertable tracker configuration.
#[derive(Debug, Clone, Insertable, Getters, new)]
#[diesel(table_name = schema::trackers)]
pub struct NewTrackerRow {
    id: i64,
    title: String,
    mode: String,
    rotation_interval: Option<String>,
    participants: String,
}

impl NewTrackerRow {
    /// Flattens a configuration into column values.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the roster cannot be encoded.
    pub fn from_config(id: TrackerId, config: &TrackerConfig) -> Result<Self, DbError> {
        Ok(Self::new(
            id.get(),
            config.title().clone(),
            config.mode().to_string(),
            config.rotation_interval().as_ref().map(ToString::to_string),
            serde_json::to_string(config.participants())?,
        ))
    }
}

/// Runtime state row, one per tracker.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Getters, new)]
#[diesel(table_name = schema::tracker_states)]
pub struct StateRow {
    tracker_id: i64,
    current_turn_index: i64,
    points: String,
    version: i64,
}

impl StateRow {
    /// Decodes the points column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on malformed JSON.
    pub fn points_table(&self) -> Result<PointsTable, DbError> {
        Ok(serde_json::from_str(&self.points)?)
    }
}

/// Stored history entry.
#[derive(Debug, Clone, Queryable, Selectable, Getters)]
#[diesel(table_name = schema::history_entries)]
pub struct HistoryRow {
    id: i32,
    tracker_id: i64,
    seq: i64,
    recorded_at: NaiveDateTime,
    action: String,
    actor: String,
    participant: String,
    details: String,
}

impl HistoryRow {
    /// Parses the row into a domain entry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the action column is not a known kind.
    pub fn into_entry(self) -> Result<HistoryEntry, DbError> {
        Ok(HistoryEntry::new(
            self.recorded_at.and_utc(),
            ActionKind::from_str(&self.action)?,
            Actor::new(self.actor),
            self.participant,
            self.details,
        ))
    }
}

/// Insertable history entry.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::history_entries)]
pub struct NewHistoryRow {
    tracker_id: i64,
    seq: i64,
    recorded_at: NaiveDateTime,
    action: String,
    actor: String,
    participant: String,
    details: String,
}

impl NewHistoryRow {
    /// Flattens an entry at position `seq` of tracker `id`'s log.
    pub fn from_entry(id: TrackerId, seq: i64, entry: &HistoryEntry) -> Self {
        Self::new(
            id.get(),
            seq,
            entry.timestamp().naive_utc(),
            entry.action().to_string(),
            entry.actor().as_str().to_string(),
            entry.participant().clone(),
            entry.details().clone(),
        )
    }
}

#[track_caller]
fn tracker_id(raw: i64) -> Result<TrackerId, DbError> {
    TrackerId::new(raw).map_err(|e| DbError::new(format!("Corrupt tracker id: {}", e)))
}
