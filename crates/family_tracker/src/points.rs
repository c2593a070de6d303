//! Points engine. Scores are keyed by exact participant name; surrounding
//! whitespace in the requested name is ignored.

use tracing::{debug, info, instrument};

use crate::{ActionError, ActionOutcome, Effect, PointDirection, TrackerState};

/// Adds or subtracts one point for `participant`.
///
/// Scores saturate at the `i64` bounds rather than wrapping.
///
/// # Errors
///
/// Returns [`ActionError::ParticipantNotFound`] when the points table has no
/// entry for `participant`.
#[instrument(skip(state))]
pub fn update_points(
    state: &mut TrackerState,
    participant: &str,
    direction: PointDirection,
) -> Result<Effect, ActionError> {
    let participant = participant.trim();
    let score = state
        .points_mut()
        .get_mut(participant)
        .ok_or_else(|| ActionError::participant_not_found(participant))?;
    *score = score.saturating_add(direction.delta());
    let new_score = *score;
    debug!(new_score, "Score updated");

    Ok(Effect::new(
        ActionOutcome::Points {
            participant: participant.to_string(),
            new_score,
        },
        participant.to_string(),
        format!("{} point for {participant}", direction.verb()),
    ))
}

/// Sets `participant`'s score to `new_score`.
///
/// # Errors
///
/// Returns [`ActionError::ParticipantNotFound`] when the points table has no
/// entry for `participant`.
#[instrument(skip(state))]
pub fn override_points(
    state: &mut TrackerState,
    participant: &str,
    new_score: i64,
    reason: Option<&str>,
) -> Result<Effect, ActionError> {
    let participant = participant.trim();
    let score = state
        .points_mut()
        .get_mut(participant)
        .ok_or_else(|| ActionError::participant_not_found(participant))?;
    *score = new_score;
    info!(new_score, "Score overridden");

    Ok(Effect::new(
        ActionOutcome::Points {
            participant: participant.to_string(),
            new_score,
        },
        participant.to_string(),
        format!(
            "Manual override. New score: {new_score}. Reason: {}",
            reason.unwrap_or_default()
        ),
    ))
}
