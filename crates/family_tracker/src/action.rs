//! First-class action requests and their outcomes.
//!
//! An [`Action`] carries the caller's intent and parameters. Applying it
//! checks mode compatibility, then delegates to the turn, points, or random
//! engine, which returns an [`Effect`] describing what changed.

use derive_getters::Getters;
use derive_new::new;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::{ActionError, ActionKind, TrackerConfig, TrackerId, TrackerState, points, random, turn};

/// Direction of a one-point score change.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PointDirection {
    /// +1.
    Add,
    /// -1.
    Subtract,
}

impl PointDirection {
    /// The signed change.
    pub fn delta(self) -> i64 {
        match self {
            Self::Add => 1,
            Self::Subtract => -1,
        }
    }

    /// Capitalized verb used in history details.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
        }
    }
}

/// An action and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Pass the turn to the next participant.
    AdvanceTurn,
    /// Add or subtract one point.
    UpdatePoints {
        /// Points-table key.
        participant: String,
        /// Which way to move the score.
        direction: PointDirection,
    },
    /// Choose a participant uniformly at random.
    RandomPick,
    /// Jump the turn to a named participant.
    OverrideTurn {
        /// Roster name, matched case-insensitively.
        participant: String,
        /// Why the override happened.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Replace a score outright.
    OverridePoints {
        /// Points-table key.
        participant: String,
        /// The new score.
        new_score: i64,
        /// Why the override happened.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Record a winner without drawing.
    OverrideRandom {
        /// Any non-empty name.
        winner: String,
        /// Why the override happened.
        #[serde(default)]
        reason: Option<String>,
    },
}

impl Action {
    /// The kind recorded in history.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AdvanceTurn => ActionKind::AdvanceTurn,
            Self::UpdatePoints { .. } => ActionKind::UpdatePoints,
            Self::RandomPick => ActionKind::RandomPick,
            Self::OverrideTurn { .. } => ActionKind::OverrideTurn,
            Self::OverridePoints { .. } => ActionKind::OverridePoints,
            Self::OverrideRandom { .. } => ActionKind::OverrideRandom,
        }
    }

    /// Checks parameters that do not depend on stored state.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidInput`] for a blank participant or winner.
    pub fn validate(&self) -> Result<(), ActionError> {
        let (field, value) = match self {
            Self::AdvanceTurn | Self::RandomPick => return Ok(()),
            Self::UpdatePoints { participant, .. }
            | Self::OverrideTurn { participant, .. }
            | Self::OverridePoints { participant, .. } => ("participant", participant),
            Self::OverrideRandom { winner, .. } => ("winner", winner),
        };
        if value.trim().is_empty() {
            return Err(ActionError::invalid_input(format!("missing {field}")));
        }
        Ok(())
    }

    /// Applies the action to `state` under `config`.
    ///
    /// `state` is only modified when `Ok` is returned. History is not touched;
    /// the caller records the returned [`Effect`].
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidAction`] when a non-override action does
    /// not fit the tracker's mode, plus whatever the engine rejects.
    #[instrument(skip(self, config, state, rng), fields(action = %self.kind(), mode = %config.mode()))]
    pub fn apply<R: Rng + ?Sized>(
        &self,
        config: &TrackerConfig,
        state: &mut TrackerState,
        rng: &mut R,
    ) -> Result<Effect, ActionError> {
        self.validate()?;

        let kind = self.kind();
        let mode = *config.mode();
        if !kind.accepted_in(mode) {
            warn!(action = %kind, mode = %mode, "Action rejected for tracker mode");
            return Err(ActionError::InvalidAction { action: kind, mode });
        }

        let participants = config.participants();
        match self {
            Self::AdvanceTurn => turn::advance_turn(participants, state),
            Self::OverrideTurn {
                participant,
                reason,
            } => turn::override_turn(participants, state, participant, reason.as_deref()),
            Self::UpdatePoints {
                participant,
                direction,
            } => points::update_points(state, participant, *direction),
            Self::OverridePoints {
                participant,
                new_score,
                reason,
            } => points::override_points(state, participant, *new_score, reason.as_deref()),
            Self::RandomPick => random::pick(participants, rng),
            Self::OverrideRandom { winner, reason } => {
                random::override_pick(winner, reason.as_deref())
            }
        }
    }
}

/// An action addressed to a tracker, as received from the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct ActionRequest {
    /// Target tracker.
    tracker_id: TrackerId,
    /// What to do.
    #[serde(flatten)]
    action: Action,
}

impl ActionRequest {
    /// Splits the request into its parts.
    pub fn into_parts(self) -> (TrackerId, Action) {
        (self.tracker_id, self.action)
    }
}

/// Result returned to the caller of a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionOutcome {
    /// The turn moved.
    Turn {
        /// Whose turn it is now.
        new_participant_name: String,
    },
    /// A score changed.
    Points {
        /// Whose score changed.
        participant: String,
        /// The score after the change.
        new_score: i64,
    },
    /// A winner was chosen.
    Pick {
        /// The chosen name.
        winner_name: String,
    },
}

/// What an engine changed: the caller-facing outcome plus the history subject and text.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Effect {
    /// Returned to the caller.
    outcome: ActionOutcome,
    /// Participant recorded in history.
    subject: String,
    /// Human-readable history text.
    details: String,
}

impl Effect {
    /// Splits the effect into outcome, subject, and details.
    pub fn into_parts(self) -> (ActionOutcome, String, String) {
        (self.outcome, self.subject, self.details)
    }
}
