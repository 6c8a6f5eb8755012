//! Error taxonomy shared across the Nighthold crates.
//!
//! Every failure the engine can report carries a [`Severity`] class and a
//! stable machine-readable code so that presentation layers can render a
//! deterministic message without inventing their own semantics. Expected
//! edge cases, such as a spawn tick with no eligible candidates, are policy
//! rather than errors and never appear here.

use thiserror::Error;

use crate::{ArchetypeId, LaneId, Phase, PhaseTrigger, RewardId};

/// Failure classes the engine distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Run-integrity threat; the affected operation halts until confirmed.
    Critical,
    /// The operation failed but the simulation continues.
    Recoverable,
    /// Input or configuration was rejected before use.
    Validation,
}

/// Reasons the run clock refuses a phase transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum TransitionError {
    /// The run already ended; terminal phases accept no triggers.
    #[error("run already ended in {phase:?}")]
    TerminalPhase {
        /// Terminal phase the run is resting in.
        phase: Phase,
    },
    /// The trigger does not apply to the current phase.
    #[error("trigger {trigger:?} is not valid in phase {phase:?}")]
    InvalidTrigger {
        /// Phase the run was in when the trigger arrived.
        phase: Phase,
        /// Trigger that was refused.
        trigger: PhaseTrigger,
    },
}

impl TransitionError {
    /// Severity class of the refusal.
    ///
    /// A refused trigger in a live phase halts only itself and the run
    /// carries on. A trigger arriving after the run already ended means the
    /// caller lost track of a finished run, which is a run-integrity fault.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::TerminalPhase { .. } => Severity::Critical,
            Self::InvalidTrigger { .. } => Severity::Recoverable,
        }
    }

    /// Stable machine-readable code for the refusal.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TerminalPhase { .. } => "clock/terminal-phase",
            Self::InvalidTrigger { .. } => "clock/invalid-trigger",
        }
    }
}

/// Reasons a budget computation rejects its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum BudgetError {
    /// Day numbers are one-based; zero can never be budgeted.
    #[error("day number must be at least 1, got {day}")]
    InvalidDayNumber {
        /// Day number that was rejected.
        day: u32,
    },
}

impl BudgetError {
    /// Severity class of the rejection.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Validation
    }

    /// Stable machine-readable code for the rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDayNumber { .. } => "budget/invalid-day",
        }
    }
}

/// Reasons the spawn composer rejects a budget snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ComposeError {
    /// The snapshot's day and night numbers are inconsistent or zero.
    ///
    /// A malformed budget is never silently treated as an empty one.
    #[error("budget snapshot is malformed: day {day_number}, night {night_number}")]
    InvalidBudget {
        /// Day number carried by the rejected snapshot.
        day_number: u32,
        /// Night number carried by the rejected snapshot.
        night_number: u32,
    },
}

impl ComposeError {
    /// Severity class of the rejection.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Validation
    }

    /// Stable machine-readable code for the rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidBudget { .. } => "spawn/invalid-budget",
        }
    }
}

/// Reasons a reward selection commit is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum SelectionError {
    /// The chosen index does not address one of the three options.
    #[error("chosen index {index} is outside the offer's three options")]
    IndexOutOfRange {
        /// Index that was rejected.
        index: u32,
    },
    /// No offer is pending for the current night.
    #[error("no reward offer is pending")]
    NoPendingOffer,
    /// The night's offer was already committed once.
    #[error("the reward offer for this night was already committed")]
    AlreadyCommitted,
}

impl SelectionError {
    /// Severity class of the refusal.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Validation
    }

    /// Stable machine-readable code for the refusal.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::IndexOutOfRange { .. } => "reward/index-out-of-range",
            Self::NoPendingOffer => "reward/no-pending-offer",
            Self::AlreadyCommitted => "reward/already-committed",
        }
    }
}

/// Reasons a structure placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum PlacementError {
    /// Structures can only be placed during the day.
    #[error("structures can only be placed during the day")]
    InvalidPhase,
    /// The requested region extends beyond the configured grid bounds.
    #[error("the requested footprint extends beyond the grid")]
    OutOfBounds,
    /// The requested footprint overlaps an occupied cell.
    #[error("the requested footprint overlaps an occupied cell")]
    Occupied,
}

impl PlacementError {
    /// Severity class of the rejection.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Validation
    }

    /// Stable machine-readable code for the rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPhase => "structure/invalid-phase",
            Self::OutOfBounds => "structure/out-of-bounds",
            Self::Occupied => "structure/occupied",
        }
    }
}

/// Reasons a structure removal request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum RemovalError {
    /// Structures can only be removed while a day or night is active.
    #[error("structures can only be removed during the day or night")]
    InvalidPhase,
    /// No structure with the provided identifier exists.
    #[error("no structure with the provided identifier exists")]
    MissingStructure,
}

impl RemovalError {
    /// Severity class of the rejection.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Validation
    }

    /// Stable machine-readable code for the rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPhase => "structure/removal-invalid-phase",
            Self::MissingStructure => "structure/missing",
        }
    }
}

/// Reasons a configuration aggregate fails validation at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// The day timer would never elapse.
    #[error("day duration must be non-zero")]
    ZeroDayDuration,
    /// The night would have no extent to schedule spawns into.
    #[error("night duration must be non-zero")]
    ZeroNightDuration,
    /// The spawn cadence would never produce a tick.
    #[error("spawn cadence step must be non-zero")]
    ZeroCadenceStep,
    /// The cadence step does not land a single tick inside the spawn window.
    #[error("spawn cadence step must land at least one tick inside the active window")]
    CadenceBeyondWindow,
    /// Budget growth of zero would collapse every night to nothing.
    #[error("budget growth must be non-zero")]
    ZeroGrowth,
    /// A run with no target day could never be won.
    #[error("target day must be at least 1")]
    ZeroTargetDay,
    /// A castle with no hit points would be defeated at boot.
    #[error("castle maximum hit points must be non-zero")]
    ZeroCastleHp,
    /// At least one spawn lane must exist.
    #[error("at least one spawn lane must be configured")]
    MissingLanes,
    /// Every configured lane must carry spawn weight.
    #[error("lane {lane:?} has zero spawn weight")]
    ZeroLaneWeight {
        /// Lane whose weight was rejected.
        lane: LaneId,
    },
    /// Archetype identifiers must be unique within the table.
    #[error("archetype {archetype:?} appears more than once")]
    DuplicateArchetype {
        /// Identifier that appeared twice.
        archetype: ArchetypeId,
    },
    /// Reward identifiers must be unique within the catalog.
    #[error("reward {reward:?} appears more than once")]
    DuplicateReward {
        /// Identifier that appeared twice.
        reward: RewardId,
    },
    /// Budget table breakpoints must be unique per day.
    #[error("budget table defines day {day} more than once")]
    DuplicateBudgetBreakpoint {
        /// Day that appeared twice.
        day: u32,
    },
    /// Difficulty multipliers of zero would erase entire subsystems.
    #[error("difficulty multiplier `{name}` must be non-zero")]
    ZeroMultiplier {
        /// Name of the rejected multiplier field.
        name: &'static str,
    },
    /// The grid must have at least one column and one row.
    #[error("grid dimensions must be non-zero")]
    ZeroGridDimension,
    /// The cooldown floor must not exceed the full retarget cooldown.
    #[error("retarget cooldown floor exceeds the cooldown itself")]
    FloorExceedsCooldown,
    /// A zero per-tick retarget cap would starve every blocked agent.
    #[error("retarget per-tick cap must be non-zero")]
    ZeroRetargetCap,
    /// A zero search radius could never find a blocking structure.
    #[error("retarget search radius must be non-zero")]
    ZeroSearchRadius,
}

impl ConfigError {
    /// Severity class of the rejection.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        Severity::Validation
    }

    /// Stable machine-readable code for the rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ZeroDayDuration => "config/zero-day-duration",
            Self::ZeroNightDuration => "config/zero-night-duration",
            Self::ZeroCadenceStep => "config/zero-cadence-step",
            Self::CadenceBeyondWindow => "config/cadence-beyond-window",
            Self::ZeroGrowth => "config/zero-growth",
            Self::ZeroTargetDay => "config/zero-target-day",
            Self::ZeroCastleHp => "config/zero-castle-hp",
            Self::MissingLanes => "config/missing-lanes",
            Self::ZeroLaneWeight { .. } => "config/zero-lane-weight",
            Self::DuplicateArchetype { .. } => "config/duplicate-archetype",
            Self::DuplicateReward { .. } => "config/duplicate-reward",
            Self::DuplicateBudgetBreakpoint { .. } => "config/duplicate-breakpoint",
            Self::ZeroMultiplier { .. } => "config/zero-multiplier",
            Self::ZeroGridDimension => "config/zero-grid-dimension",
            Self::FloorExceedsCooldown => "config/floor-exceeds-cooldown",
            Self::ZeroRetargetCap => "config/zero-retarget-cap",
            Self::ZeroSearchRadius => "config/zero-search-radius",
        }
    }
}
