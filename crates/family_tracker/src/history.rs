//! Append-only audit log of effective tracker changes.
//!
//! Storage order is append order. Consumers present the log newest-first via
//! [`HistoryLog::newest_first`]; the reversal happens on read only.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::Mode;

/// Kind of action recorded in a history entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    /// Move to the next participant.
    AdvanceTurn,
    /// Add or subtract one point.
    UpdatePoints,
    /// Pick a participant at random.
    RandomPick,
    /// Jump the turn to a named participant.
    OverrideTurn,
    /// Replace a participant's score.
    OverridePoints,
    /// Record an arbitrary winner.
    OverrideRandom,
}

impl ActionKind {
    /// Whether this is a manual-correction action that ignores the tracker mode.
    pub fn is_override(self) -> bool {
        matches!(
            self,
            Self::OverrideTurn | Self::OverridePoints | Self::OverrideRandom
        )
    }

    /// Whether a tracker in `mode` accepts this action.
    pub fn accepted_in(self, mode: Mode) -> bool {
        match self {
            Self::AdvanceTurn => mode.is_turn_based(),
            Self::UpdatePoints => mode == Mode::Points,
            Self::RandomPick => mode == Mode::Random,
            Self::OverrideTurn | Self::OverridePoints | Self::OverrideRandom => true,
        }
    }
}

/// Identity of whoever invoked an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    /// Sentinel recorded for anonymous callers.
    pub const GUEST: &'static str = "guest";

    /// Creates an actor from a login name; blank names become [`Actor::guest`].
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim();
        if name.is_empty() {
            Self::guest()
        } else {
            Self(name.to_string())
        }
    }

    /// The anonymous actor.
    pub fn guest() -> Self {
        Self(Self::GUEST.to_string())
    }

    /// Resolves an optional login name.
    pub fn from_optional(name: Option<&str>) -> Self {
        name.map_or_else(Self::guest, Self::new)
    }

    /// The login name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::guest()
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct HistoryEntry {
    /// When the change took effect.
    timestamp: DateTime<Utc>,
    /// What kind of change it was.
    action: ActionKind,
    /// Who made it.
    actor: Actor,
    /// The participant the change was about.
    participant: String,
    /// Human-readable summary.
    details: String,
}

impl HistoryEntry {
    /// Renders the entry as `"{details} - YYYY-MM-DD HH:MM:SS"`.
    pub fn display_line(&self) -> String {
        format!(
            "{} - {}",
            self.details,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Ordered, append-only sequence of [`HistoryEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog(Vec<HistoryEntry>);

impl HistoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from entries already in append order.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self(entries)
    }

    /// Appends an entry at the end.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in append order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    /// Entries appended after the first `count`, in append order.
    pub fn since(&self, count: usize) -> &[HistoryEntry] {
        self.0.get(count..).unwrap_or_default()
    }

    /// Entries most-recent-first.
    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.0.iter().rev()
    }
}
