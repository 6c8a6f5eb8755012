#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure nightly budget computation across the three pressure channels.

use nighthold_core::{
    config::{BudgetConfig, DifficultyConfig},
    error::BudgetError,
    BudgetSnapshot, NightFlags, PER_MILLE_SCALE,
};

/// Pure scheduler that turns a day number into per-channel spawn budgets.
///
/// The three channels are computed independently: the normal track compounds
/// from its day-one base, the elite track reads its breakpoint table, and the
/// boss track reads its table verbatim. Tuning one track can never move
/// another, and identical inputs always produce identical snapshots.
#[derive(Clone, Debug)]
pub struct BudgetScheduler {
    budget: BudgetConfig,
    difficulty: DifficultyConfig,
}

impl BudgetScheduler {
    /// Creates a scheduler over validated budget and difficulty tuning.
    #[must_use]
    pub fn new(budget: BudgetConfig, difficulty: DifficultyConfig) -> Self {
        Self { budget, difficulty }
    }

    /// Computes the budget snapshot for the provided night.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::InvalidDayNumber`] when `day_number` is zero;
    /// day numbers are one-based.
    pub fn compute(
        &self,
        day_number: u32,
        flags: NightFlags,
    ) -> Result<BudgetSnapshot, BudgetError> {
        if day_number == 0 {
            return Err(BudgetError::InvalidDayNumber { day: day_number });
        }

        let grown = compound_budget(
            self.budget.base_budget_day1(),
            self.budget.growth_per_mille(),
            day_number,
        );
        let normal = apply_per_mille(grown, self.difficulty.budget_mult_normal());

        let elite = if flags.elite() {
            apply_per_mille(
                self.budget.elite_table().value_for(day_number),
                self.difficulty.budget_mult_elite(),
            )
        } else {
            0
        };

        // Boss counts are read from the table verbatim; difficulty never
        // scales them.
        let boss = if flags.boss() {
            self.budget.boss_table().value_for(day_number)
        } else {
            0
        };

        Ok(BudgetSnapshot::new(
            day_number, day_number, normal, elite, boss,
        ))
    }
}

/// Applies per-day compound growth with flooring after every step.
///
/// The recurrence keeps every intermediate value an integer, so the same
/// inputs reproduce the same budget on every platform.
fn compound_budget(base: u32, growth_per_mille: u32, day_number: u32) -> u32 {
    let mut budget = u128::from(base);
    for _ in 1..day_number {
        budget = budget.saturating_mul(u128::from(growth_per_mille)) / u128::from(PER_MILLE_SCALE);
        budget = budget.min(u128::from(u32::MAX));
    }
    budget as u32
}

fn apply_per_mille(value: u32, multiplier: u32) -> u32 {
    let scaled = u128::from(value) * u128::from(multiplier) / u128::from(PER_MILLE_SCALE);
    scaled.min(u128::from(u32::MAX)) as u32
}
