//! Turn engine for rotation and manual trackers.

use tracing::{debug, info, instrument};

use crate::{ActionError, ActionOutcome, Effect, Participants, TrackerState};

/// Moves the turn to the next participant, wrapping at the end of the roster.
///
/// A stored index past the end (left behind by a roster edit) is reduced
/// modulo the roster length before stepping.
///
/// # Errors
///
/// Returns [`ActionError::EmptyParticipants`] when the roster is empty.
#[instrument(skip(participants, state), fields(count = participants.len()))]
pub fn advance_turn(
    participants: &Participants,
    state: &mut TrackerState,
) -> Result<Effect, ActionError> {
    let count = participants.len();
    if count == 0 {
        return Err(ActionError::EmptyParticipants);
    }

    let current = *state.current_turn_index() % count;
    let next = (current + 1) % count;
    let name = participants
        .get(next)
        .ok_or(ActionError::EmptyParticipants)?
        .to_string();

    state.set_turn_index(next);
    debug!(from = current, to = next, "Turn advanced");

    Ok(Effect::new(
        ActionOutcome::Turn {
            new_participant_name: name.clone(),
        },
        name.clone(),
        format!("Advanced to {name}"),
    ))
}

/// Jumps the turn to `participant`, matched case-insensitively.
///
/// The returned outcome and history entry carry the roster's spelling of
/// the name.
///
/// # Errors
///
/// Returns [`ActionError::ParticipantNotFound`] when no roster name matches.
#[instrument(skip(participants, state))]
pub fn override_turn(
    participants: &Participants,
    state: &mut TrackerState,
    participant: &str,
    reason: Option<&str>,
) -> Result<Effect, ActionError> {
    let index = participants
        .position_ignore_case(participant)
        .ok_or_else(|| ActionError::participant_not_found(participant))?;
    let name = participants
        .get(index)
        .ok_or_else(|| ActionError::participant_not_found(participant))?
        .to_string();

    state.set_turn_index(index);
    info!(participant = %name, index, "Turn overridden");

    Ok(Effect::new(
        ActionOutcome::Turn {
            new_participant_name: name.clone(),
        },
        name,
        format!("Manual override. Reason: {}", reason.unwrap_or_default()),
    ))
}
