//! Random picker engine. Picks never touch turn or points state.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument};

use crate::{ActionError, ActionOutcome, Effect, Participants};

/// Chooses a participant uniformly at random.
///
/// # Errors
///
/// Returns [`ActionError::EmptyParticipants`] when the roster is empty.
#[instrument(skip(participants, rng), fields(count = participants.len()))]
pub fn pick<R: Rng + ?Sized>(
    participants: &Participants,
    rng: &mut R,
) -> Result<Effect, ActionError> {
    let winner = participants
        .as_slice()
        .choose(rng)
        .ok_or(ActionError::EmptyParticipants)?
        .clone();
    debug!(winner = %winner, "Random pick");

    Ok(Effect::new(
        ActionOutcome::Pick {
            winner_name: winner.clone(),
        },
        winner.clone(),
        format!("Random pick: {winner}"),
    ))
}

/// Records `winner` as the pick without drawing.
///
/// The winner need not be on the roster.
///
/// # Errors
///
/// Returns [`ActionError::InvalidInput`] for a blank winner.
#[instrument]
pub fn override_pick(winner: &str, reason: Option<&str>) -> Result<Effect, ActionError> {
    let winner = winner.trim();
    if winner.is_empty() {
        return Err(ActionError::invalid_input("missing winner"));
    }
    info!("Random pick overridden");

    Ok(Effect::new(
        ActionOutcome::Pick {
            winner_name: winner.to_string(),
        },
        winner.to_string(),
        format!(
            "Manual override. Winner: {winner}. Reason: {}",
            reason.unwrap_or_default()
        ),
    ))
}
