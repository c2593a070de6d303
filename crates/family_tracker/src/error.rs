//! Action and storage error types.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use crate::{ActionKind, Mode, TrackerId};

/// Machine-readable error category returned across the action boundary.
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
pub enum ErrorKind {
    /// Unknown tracker id.
    NotFound,
    /// The action needs at least one participant.
    EmptyParticipants,
    /// The named participant is not in the roster or points table.
    ParticipantNotFound,
    /// The action kind does not fit the tracker's mode.
    InvalidAction,
    /// Write contention outlasted the retry or wait budget.
    Conflict,
    /// Malformed parameters.
    InvalidInput,
    /// The persistence backend failed.
    Storage,
}

/// Failure of a tracker action. No state is written when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ActionError {
    /// No tracker is stored under the id.
    #[display("tracker {} not found", tracker_id)]
    NotFound {
        /// The id that failed to resolve.
        tracker_id: TrackerId,
    },

    /// The roster is empty.
    #[display("tracker has no participants")]
    EmptyParticipants,

    /// The named participant is unknown.
    #[display("participant '{}' not found", participant)]
    ParticipantNotFound {
        /// The name as supplied by the caller.
        participant: String,
    },

    /// Non-override action sent to a tracker in an incompatible mode.
    #[display("action '{}' is not available in {} mode", action, mode)]
    InvalidAction {
        /// The rejected action.
        action: ActionKind,
        /// The tracker's configured mode.
        mode: Mode,
    },

    /// Another writer held the tracker for too long.
    #[display("tracker {} is busy: {}", tracker_id, detail)]
    Conflict {
        /// The contended tracker.
        tracker_id: TrackerId,
        /// Which budget ran out.
        detail: String,
    },

    /// A parameter was missing or malformed.
    #[display("invalid input: {}", reason)]
    InvalidInput {
        /// What was wrong.
        reason: String,
    },

    /// The store reported a failure unrelated to the action itself.
    #[display("storage failure: {}", message)]
    Storage {
        /// Backend error text.
        message: String,
    },
}

impl ActionError {
    /// Shorthand for [`ActionError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ActionError::ParticipantNotFound`].
    pub fn participant_not_found(participant: impl Into<String>) -> Self {
        Self::ParticipantNotFound {
            participant: participant.into(),
        }
    }

    /// The error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::EmptyParticipants => ErrorKind::EmptyParticipants,
            Self::ParticipantNotFound { .. } => ErrorKind::ParticipantNotFound,
            Self::InvalidAction { .. } => ErrorKind::InvalidAction,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Short reason string for the boundary layer to translate.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Backend failure with caller location tracking.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Backend error: {} at {}:{}", message, file, line)]
pub struct BackendError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl BackendError {
    /// Creates a backend error at the caller's location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Errors surfaced by a [`TrackerStore`](crate::TrackerStore).
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StoreError {
    /// The stored version no longer matches the caller's expectation.
    #[display(
        "version conflict on tracker {}: expected version {:?}",
        tracker_id,
        expected
    )]
    VersionConflict {
        /// The tracker being written.
        tracker_id: TrackerId,
        /// The version the caller read, `None` for a first save.
        expected: Option<u64>,
    },

    /// No configuration or state row exists for the id.
    #[display("tracker {} not found in store", tracker_id)]
    TrackerNotFound {
        /// The missing tracker.
        tracker_id: TrackerId,
    },

    /// A write tried to drop entries from the append-only history.
    #[display(
        "history for tracker {} cannot shrink from {} to {} entries",
        tracker_id,
        stored,
        proposed
    )]
    HistoryRewrite {
        /// The tracker being written.
        tracker_id: TrackerId,
        /// Entries already stored.
        stored: usize,
        /// Entries in the rejected write.
        proposed: usize,
    },

    /// Connection, query, or serialization failure.
    #[display("{}", _0)]
    Backend(BackendError),
}

impl StoreError {
    /// Wraps a message as [`StoreError::Backend`] at the caller's location.
    #[track_caller]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(BackendError::new(message))
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TrackerNotFound { tracker_id } => Self::NotFound { tracker_id },
            StoreError::VersionConflict { tracker_id, .. } => Self::Conflict {
                tracker_id,
                detail: "version conflict".to_string(),
            },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}
