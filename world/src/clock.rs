//! Pure phase transition table for the run clock.
//!
//! The table is total: every `(phase, trigger)` pair either yields the next
//! phase or a [`TransitionError`] explaining the refusal. The world owns the
//! timers and counters that decide when a trigger fires; this module only
//! answers whether the transition itself is legal.

use nighthold_core::{error::TransitionError, Phase, PhaseTrigger};

/// Resolves the phase that follows `phase` when `trigger` arrives.
///
/// # Errors
///
/// Returns [`TransitionError::TerminalPhase`] once the run has ended and
/// [`TransitionError::InvalidTrigger`] for any trigger that does not apply
/// to the current phase.
pub fn advance(phase: Phase, trigger: PhaseTrigger) -> Result<Phase, TransitionError> {
    if phase.is_terminal() {
        return Err(TransitionError::TerminalPhase { phase });
    }

    match (phase, trigger) {
        (Phase::Boot, PhaseTrigger::BootCompleted) => Ok(Phase::Day),
        (Phase::Day, PhaseTrigger::DayTimerElapsed) => Ok(Phase::Night),
        (Phase::Night, PhaseTrigger::NightResolved) => Ok(Phase::Settlement),
        (Phase::Settlement, PhaseTrigger::RewardCommitted) => Ok(Phase::Day),
        (Phase::Settlement, PhaseTrigger::TargetDayReached) => Ok(Phase::Victory),
        (_, PhaseTrigger::CastleDestroyed) => Ok(Phase::Defeat),
        (phase, trigger) => Err(TransitionError::InvalidTrigger { phase, trigger }),
    }
}
