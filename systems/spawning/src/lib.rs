#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawn composition for night assaults.
//!
//! The composer turns a [`BudgetSnapshot`] into a [`SpawnPlan`]: a timetable of
//! lane-tagged, channel-tagged spawn entries covering the active portion of the
//! night. Identical inputs always produce byte-identical plans; randomness is
//! confined to per-(tick, lane) SplitMix64 streams reseeded from SHA-256 so
//! that no entry depends on how many draws earlier entries consumed.

use std::time::Duration;

use nighthold_core::{
    config::{ArchetypeTable, LaneWeight, SpawnConfig},
    error::ComposeError,
    ArchetypeId, BudgetSnapshot, Channel, LaneId, NightFlags, NightSeedContext, SpawnEntry,
    SpawnPlan, RNG_STREAM_SPAWN_PREFIX,
};
use sha2::{Digest, Sha256};

/// Upper bound on distinct archetypes sampled for a single (tick, lane) slot.
const SELECTION_WIDTH: usize = 5;

/// Archetype admitted to a channel's candidate pool for one night.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    archetype: ArchetypeId,
    weight: u64,
}

/// Pure system that composes deterministic spawn timetables from night budgets.
#[derive(Debug)]
pub struct SpawnComposer {
    spawn: SpawnConfig,
    archetypes: ArchetypeTable,
    selection_workspace: Vec<Candidate>,
    picked_workspace: Vec<ArchetypeId>,
}

impl SpawnComposer {
    /// Creates a composer over the supplied cadence and archetype catalog.
    #[must_use]
    pub fn new(spawn: SpawnConfig, archetypes: ArchetypeTable) -> Self {
        Self {
            spawn,
            archetypes,
            selection_workspace: Vec::new(),
            picked_workspace: Vec::new(),
        }
    }

    /// Composes the spawn timetable for one night.
    ///
    /// Entries are ordered by tick offset, then by channel, then by lane. Each
    /// channel's entry count never exceeds the corresponding budget field;
    /// ticks without eligible archetypes forfeit their share instead of
    /// carrying it forward, and a lane table without any spawn weight
    /// forfeits the whole night.
    pub fn compose(
        &mut self,
        budget: &BudgetSnapshot,
        flags: NightFlags,
        context: NightSeedContext,
    ) -> Result<SpawnPlan, ComposeError> {
        if budget.day_number() == 0 || budget.night_number() != budget.day_number() {
            return Err(ComposeError::InvalidBudget {
                day_number: budget.day_number(),
                night_number: budget.night_number(),
            });
        }

        let day_number = budget.day_number();
        let night_number = budget.night_number();
        if budget.total() == 0 {
            return Ok(SpawnPlan::empty(day_number, night_number));
        }

        let window = self.spawn.active_window();
        let step = self.spawn.cadence_step();
        let tick_count = tick_count(window, step);
        if tick_count == 0 {
            return Ok(SpawnPlan::empty(day_number, night_number));
        }

        let pools = [
            self.channel_pool(Channel::Normal, flags),
            self.channel_pool(Channel::Elite, flags),
            self.channel_pool(Channel::Boss, flags),
        ];
        let mut remaining = [
            budget.normal(),
            budget.elite(),
            budget.boss(),
        ];

        let mut entries = Vec::new();
        let lanes: Vec<LaneWeight> = self.spawn.lane_weights().to_vec();
        for tick_index in 0..tick_count {
            let remaining_ticks = tick_count - tick_index;
            let offset = step * tick_index;
            for (slot, channel) in Channel::ALL.iter().copied().enumerate() {
                if remaining[slot] == 0 {
                    continue;
                }
                let sub_budget =
                    ((remaining[slot] + remaining_ticks - 1) / remaining_ticks).min(remaining[slot]);
                remaining[slot] -= sub_budget;
                if pools[slot].is_empty() {
                    // Forfeited: nothing can spawn on this channel tonight.
                    continue;
                }
                let shares = split_across_lanes(sub_budget, &lanes);
                for (lane_index, share) in shares.iter().copied().enumerate() {
                    if share == 0 {
                        continue;
                    }
                    let lane = lanes[lane_index].lane();
                    let base = derive_slot_seed(context, lane, tick_index);
                    let mut rng = SplitMix64::new(derive_channel_seed(base, channel));
                    self.select_archetypes(&pools[slot], &mut rng);
                    for emit_index in 0..share {
                        let cursor = (emit_index as usize) % self.picked_workspace.len();
                        entries.push(SpawnEntry::new(
                            offset,
                            lane,
                            self.picked_workspace[cursor],
                            channel,
                        ));
                    }
                }
            }
        }

        Ok(SpawnPlan::new(day_number, night_number, entries))
    }

    /// Collects the archetypes admitted to `channel` for a night with `flags`,
    /// in ascending id order.
    fn channel_pool(&self, channel: Channel, flags: NightFlags) -> Vec<Candidate> {
        self.archetypes
            .definitions()
            .iter()
            .filter(|definition| definition.channels().contains(channel))
            .filter_map(|definition| {
                let weight = u64::from(definition.spawn_weight())
                    * u64::from(definition.night_weights().weight_for(flags));
                (weight > 0).then_some(Candidate {
                    archetype: definition.id(),
                    weight,
                })
            })
            .collect()
    }

    /// Draws up to [`SELECTION_WIDTH`] archetypes from `pool` by weighted
    /// sampling without replacement, leaving the result in `picked_workspace`.
    fn select_archetypes(&mut self, pool: &[Candidate], rng: &mut SplitMix64) {
        self.selection_workspace.clear();
        self.selection_workspace.extend_from_slice(pool);
        self.picked_workspace.clear();

        let picks = SELECTION_WIDTH.min(self.selection_workspace.len());
        for _ in 0..picks {
            let total: u64 = self
                .selection_workspace
                .iter()
                .map(|candidate| candidate.weight)
                .sum();
            let mut roll = rng.next_u64() % total;
            let mut chosen = 0;
            for (index, candidate) in self.selection_workspace.iter().enumerate() {
                if roll < candidate.weight {
                    chosen = index;
                    break;
                }
                roll -= candidate.weight;
            }
            self.picked_workspace
                .push(self.selection_workspace[chosen].archetype);
            let _ = self.selection_workspace.remove(chosen);
        }
    }
}

/// Number of cadence ticks whose offsets fall inside the active window.
fn tick_count(window: Duration, step: Duration) -> u32 {
    let window_ms = window.as_millis();
    let step_ms = step.as_millis();
    if step_ms == 0 {
        return 0;
    }
    ((window_ms + step_ms - 1) / step_ms) as u32
}

/// Splits `sub_budget` across lanes proportionally to their weights, assigning
/// the floored remainders to the lanes with the largest fractional parts.
/// Earlier lanes win remainder ties, so the split is fully deterministic.
/// A table without any weight takes no share at all; the sub-budget is
/// forfeited like a tick without eligible archetypes.
fn split_across_lanes(sub_budget: u32, lanes: &[LaneWeight]) -> Vec<u32> {
    let total: u64 = lanes.iter().map(|lane| u64::from(lane.weight())).sum();
    if total == 0 {
        return vec![0; lanes.len()];
    }
    let mut shares = Vec::with_capacity(lanes.len());
    let mut remainders = Vec::with_capacity(lanes.len());
    let mut assigned = 0u32;
    for (index, lane) in lanes.iter().enumerate() {
        let scaled = u64::from(sub_budget) * u64::from(lane.weight());
        let share = (scaled / total) as u32;
        shares.push(share);
        remainders.push((index, scaled % total));
        assigned += share;
    }
    remainders.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));
    let mut leftover = sub_budget - assigned;
    for (index, _) in remainders {
        if leftover == 0 {
            break;
        }
        shares[index] += 1;
        leftover -= 1;
    }
    shares
}

fn derive_slot_seed(context: NightSeedContext, lane: LaneId, tick_index: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(context.run_seed().to_le_bytes());
    hasher.update(context.day_number().to_le_bytes());
    hasher.update(lane.get().to_le_bytes());
    hasher.update(tick_index.to_le_bytes());
    finalize_seed(hasher)
}

fn derive_channel_seed(base: u64, channel: Channel) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(RNG_STREAM_SPAWN_PREFIX.as_bytes());
    hasher.update(channel.label().as_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

#[derive(Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nighthold_core::config::{ArchetypeDefinition, ChannelSet, NightWeights};

    fn default_composer() -> SpawnComposer {
        SpawnComposer::new(SpawnConfig::default(), ArchetypeTable::default())
    }

    fn context(seed: u64, day: u32) -> NightSeedContext {
        NightSeedContext::new(seed, day)
    }

    fn channel_count(plan: &SpawnPlan, channel: Channel) -> u32 {
        plan.channel_count(channel)
    }

    #[test]
    fn identical_inputs_compose_identical_plans() {
        let budget = BudgetSnapshot::new(6, 6, 103, 12, 0);
        let flags = NightFlags::new(true, false);

        let mut composer = default_composer();
        let first = composer
            .compose(&budget, flags, context(42, 6))
            .expect("plan");
        let second = composer
            .compose(&budget, flags, context(42, 6))
            .expect("plan");

        assert_eq!(first, second);
    }

    #[test]
    fn run_seed_selects_different_archetype_sequences() {
        let budget = BudgetSnapshot::new(6, 6, 103, 12, 0);
        let flags = NightFlags::new(true, false);

        let mut composer = default_composer();
        let first = composer
            .compose(&budget, flags, context(1, 6))
            .expect("plan");
        let second = composer
            .compose(&budget, flags, context(2, 6))
            .expect("plan");

        assert_ne!(first, second);
    }

    #[test]
    fn entries_stay_inside_the_active_window() {
        let budget = BudgetSnapshot::new(15, 15, 200, 36, 2);
        let flags = NightFlags::new(true, true);

        let mut composer = default_composer();
        let plan = composer
            .compose(&budget, flags, context(7, 15))
            .expect("plan");
        let window = SpawnConfig::default().active_window();

        assert!(!plan.is_empty());
        for entry in plan.entries() {
            assert!(entry.tick_offset() < window);
        }
    }

    #[test]
    fn entry_offsets_are_nondecreasing() {
        let budget = BudgetSnapshot::new(3, 3, 86, 8, 0);
        let flags = NightFlags::new(true, false);

        let mut composer = default_composer();
        let plan = composer
            .compose(&budget, flags, context(11, 3))
            .expect("plan");

        let mut previous = Duration::ZERO;
        for entry in plan.entries() {
            assert!(entry.tick_offset() >= previous);
            previous = entry.tick_offset();
        }
    }

    #[test]
    fn channel_counts_never_exceed_the_budget() {
        let budget = BudgetSnapshot::new(15, 15, 200, 36, 2);
        let flags = NightFlags::new(true, true);

        let mut composer = default_composer();
        let plan = composer
            .compose(&budget, flags, context(9, 15))
            .expect("plan");

        assert!(channel_count(&plan, Channel::Normal) <= budget.normal());
        assert!(channel_count(&plan, Channel::Elite) <= budget.elite());
        assert!(channel_count(&plan, Channel::Boss) <= budget.boss());
        assert_eq!(channel_count(&plan, Channel::Boss), budget.boss());
    }

    #[test]
    fn zero_budget_composes_an_empty_plan() {
        let budget = BudgetSnapshot::new(4, 4, 0, 0, 0);
        let mut composer = default_composer();

        let plan = composer
            .compose(&budget, NightFlags::new(false, false), context(5, 4))
            .expect("plan");

        assert!(plan.is_empty());
    }

    #[test]
    fn channels_without_eligible_archetypes_forfeit_their_budget() {
        let definitions = vec![ArchetypeDefinition::new(
            ArchetypeId::new(1),
            "Gnawer".to_string(),
            1_000,
            ChannelSet::new(true, false, false),
            NightWeights::new(1_000, 1_000, 0),
        )];
        let table = ArchetypeTable::from_definitions(definitions);
        let mut composer = SpawnComposer::new(SpawnConfig::default(), table);

        let budget = BudgetSnapshot::new(5, 5, 40, 0, 2);
        let plan = composer
            .compose(&budget, NightFlags::new(false, true), context(3, 5))
            .expect("plan");

        // Boss nights zero out the only archetype's weight, and no archetype
        // rides the boss channel, so the whole night stays silent.
        assert!(plan.is_empty());
    }

    #[test]
    fn lane_shares_follow_the_largest_remainder() {
        let lanes = vec![
            LaneWeight::new(LaneId::new(0), 2),
            LaneWeight::new(LaneId::new(1), 1),
        ];
        let spawn = SpawnConfig::new(
            Duration::from_secs(8),
            Duration::from_secs(10),
            lanes,
        );
        let mut composer = SpawnComposer::new(spawn, ArchetypeTable::default());

        // One cadence tick inside the window forces the whole budget through a
        // single largest-remainder split.
        let budget = BudgetSnapshot::new(2, 2, 10, 0, 0);
        let plan = composer
            .compose(&budget, NightFlags::new(false, false), context(13, 2))
            .expect("plan");

        let first_lane = plan
            .entries()
            .iter()
            .filter(|entry| entry.lane() == LaneId::new(0))
            .count();
        let second_lane = plan
            .entries()
            .iter()
            .filter(|entry| entry.lane() == LaneId::new(1))
            .count();
        assert_eq!(first_lane, 7);
        assert_eq!(second_lane, 3);
    }

    #[test]
    fn weightless_lanes_forfeit_the_whole_night() {
        let lanes = vec![LaneWeight::new(LaneId::new(0), 0)];
        let spawn = SpawnConfig::new(
            Duration::from_secs(10),
            Duration::from_secs(180),
            lanes,
        );
        let mut composer = SpawnComposer::new(spawn, ArchetypeTable::default());

        let budget = BudgetSnapshot::new(1, 1, 50, 0, 0);
        let plan = composer
            .compose(&budget, NightFlags::new(false, false), context(17, 1))
            .expect("plan");

        assert!(plan.is_empty());
    }

    #[test]
    fn day_zero_budgets_are_rejected() {
        let budget = BudgetSnapshot::new(0, 0, 50, 0, 0);
        let mut composer = default_composer();

        let error = composer
            .compose(&budget, NightFlags::new(false, false), context(1, 0))
            .expect_err("invalid budget");

        assert_eq!(
            error,
            ComposeError::InvalidBudget {
                day_number: 0,
                night_number: 0,
            }
        );
    }

    #[test]
    fn mismatched_night_numbers_are_rejected() {
        let budget = BudgetSnapshot::new(3, 4, 50, 0, 0);
        let mut composer = default_composer();

        let error = composer
            .compose(&budget, NightFlags::new(false, false), context(1, 3))
            .expect_err("invalid budget");

        assert_eq!(
            error,
            ComposeError::InvalidBudget {
                day_number: 3,
                night_number: 4,
            }
        );
    }
}
