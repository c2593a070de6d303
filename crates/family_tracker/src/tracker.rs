//! Tracker configuration: identity, mode, rotation interval, and roster.
//!
//! Configuration is written by an admin surface and read-only to the action
//! handlers. The roster order defines turn order and is the index space for
//! [`TrackerState::current_turn_index`](crate::TrackerState).

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::ActionError;

/// Unique identifier of a tracker. Always positive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct TrackerId(i64);

impl TrackerId {
    /// Creates a tracker id, rejecting zero and negative values.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidInput`] if `raw` is not positive.
    pub fn new(raw: i64) -> Result<Self, ActionError> {
        if raw <= 0 {
            return Err(ActionError::invalid_input(format!(
                "tracker id must be positive, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    /// Returns the raw integer id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TrackerId {
    type Error = ActionError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<TrackerId> for i64 {
    fn from(id: TrackerId) -> Self {
        id.0
    }
}

/// Operating mode of a tracker.
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
pub enum Mode {
    /// Turn passes on a calendar interval (advanced by an external scheduler or by hand).
    Rotation,
    /// Turn passes only when someone taps "advance".
    Manual,
    /// Each participant accumulates an integer score.
    Points,
    /// A participant is chosen at random on demand.
    Random,
}

impl Mode {
    /// Whether the mode tracks a current turn.
    pub fn is_turn_based(self) -> bool {
        matches!(self, Self::Rotation | Self::Manual)
    }

    /// Returns the label shown in the admin form.
    pub fn label(self) -> &'static str {
        match self {
            Self::Rotation => "Chronological Rotation",
            Self::Manual => "Manual Tap-to-Advance",
            Self::Points => "Score/Point Tracking",
            Self::Random => "Random Picker",
        }
    }
}

/// Calendar interval for rotation trackers. Metadata only.
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RotationInterval {
    /// Once per day.
    Daily,
    /// Once per week.
    Weekly,
    /// Once per month.
    Monthly,
}

/// Ordered roster of unique participant names.
///
/// Names are trimmed, blank entries dropped, and duplicates (compared
/// case-insensitively) rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Participants(Vec<String>);

impl Participants {
    /// Builds a roster from names in turn order.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidInput`] if two names differ only by case.
    #[instrument(skip(names))]
    pub fn new<I, S>(names: I) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let folded = name.to_lowercase();
            if roster.iter().any(|existing| existing.to_lowercase() == folded) {
                return Err(ActionError::invalid_input(format!(
                    "duplicate participant '{name}'"
                )));
            }
            roster.push(name.to_string());
        }
        Ok(Self(roster))
    }

    /// Parses a comma-separated roster such as `"Jacey, Simon"`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidInput`] on duplicate names.
    pub fn parse(raw: &str) -> Result<Self, ActionError> {
        Self::new(raw.split(','))
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Position of `name`, ignoring case.
    pub fn position_ignore_case(&self, name: &str) -> Option<usize> {
        let needle = name.trim().to_lowercase();
        self.0.iter().position(|p| p.to_lowercase() == needle)
    }

    /// Names in turn order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates names in turn order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Joins the roster back into the comma-separated form.
    pub fn to_comma_separated(&self) -> String {
        self.0.join(", ")
    }
}

impl TryFrom<Vec<String>> for Participants {
    type Error = ActionError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<Participants> for Vec<String> {
    fn from(participants: Participants) -> Self {
        participants.0
    }
}

/// Per-tracker configuration as saved by the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct TrackerConfig {
    /// Display name.
    title: String,
    /// Operating mode.
    mode: Mode,
    /// Calendar interval, meaningful only for [`Mode::Rotation`].
    #[serde(default)]
    rotation_interval: Option<RotationInterval>,
    /// Roster in turn order.
    #[serde(default)]
    participants: Participants,
}
