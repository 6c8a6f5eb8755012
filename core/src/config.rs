//! Validated configuration aggregate consumed at boot.
//!
//! Adapters assemble a [`SiegeConfig`] from whatever source they parse, then
//! hand it to the world, which calls [`SiegeConfig::validate`] before the run
//! leaves the boot phase. Validation is all-or-nothing: the first rejected
//! field fails the whole aggregate and the world substitutes
//! [`SiegeConfig::default`] instead, surfacing the rejection as an audit
//! event. All tuning ratios are per-mille integers against
//! [`PER_MILLE_SCALE`](crate::PER_MILLE_SCALE).

use std::time::Duration;

use crate::error::ConfigError;
use crate::{
    ArchetypeId, Channel, LaneId, NightFlags, RewardId, PER_MILLE_SCALE, SPAWN_WINDOW_PER_MILLE,
};

/// Difficulty multipliers applied across the run, expressed per-mille.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DifficultyConfig {
    enemy_hp_mult: u32,
    enemy_dmg_mult: u32,
    budget_mult_normal: u32,
    budget_mult_elite: u32,
    budget_mult_boss: u32,
    resource_mult: u32,
}

impl DifficultyConfig {
    /// Creates a difficulty table with explicit per-mille multipliers.
    #[must_use]
    pub const fn new(
        enemy_hp_mult: u32,
        enemy_dmg_mult: u32,
        budget_mult_normal: u32,
        budget_mult_elite: u32,
        budget_mult_boss: u32,
        resource_mult: u32,
    ) -> Self {
        Self {
            enemy_hp_mult,
            enemy_dmg_mult,
            budget_mult_normal,
            budget_mult_elite,
            budget_mult_boss,
            resource_mult,
        }
    }

    /// Multiplier applied to enemy hit points by the combat collaborator.
    #[must_use]
    pub const fn enemy_hp_mult(&self) -> u32 {
        self.enemy_hp_mult
    }

    /// Multiplier applied to enemy damage by the combat collaborator.
    #[must_use]
    pub const fn enemy_dmg_mult(&self) -> u32 {
        self.enemy_dmg_mult
    }

    /// Multiplier applied to the normal channel's nightly budget.
    #[must_use]
    pub const fn budget_mult_normal(&self) -> u32 {
        self.budget_mult_normal
    }

    /// Multiplier applied to the elite channel's nightly budget.
    #[must_use]
    pub const fn budget_mult_elite(&self) -> u32 {
        self.budget_mult_elite
    }

    /// Multiplier carried for schema completeness but never applied.
    ///
    /// Boss counts are difficulty-independent: the scheduler reads the boss
    /// table verbatim. The field is still validated like its siblings so a
    /// malformed difficulty block is rejected as a whole.
    #[must_use]
    pub const fn budget_mult_boss(&self) -> u32 {
        self.budget_mult_boss
    }

    /// Multiplier applied to gold grants when rewards are committed.
    #[must_use]
    pub const fn resource_mult(&self) -> u32 {
        self.resource_mult
    }
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self::new(
            PER_MILLE_SCALE,
            PER_MILLE_SCALE,
            PER_MILLE_SCALE,
            PER_MILLE_SCALE,
            PER_MILLE_SCALE,
            PER_MILLE_SCALE,
        )
    }
}

/// One day-keyed entry in a budget breakpoint table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BudgetBreakpoint {
    day: u32,
    value: u32,
}

impl BudgetBreakpoint {
    /// Creates a breakpoint that takes effect from the provided day onward.
    #[must_use]
    pub const fn new(day: u32, value: u32) -> Self {
        Self { day, value }
    }

    /// First day the breakpoint applies to.
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// Budget value in effect from the breakpoint's day onward.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }
}

/// Day-keyed budget table with breakpoint semantics.
///
/// A lookup resolves to the value of the greatest breakpoint whose day does
/// not exceed the requested day, or zero when no breakpoint applies yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BudgetTable {
    breakpoints: Vec<BudgetBreakpoint>,
}

impl BudgetTable {
    /// Creates a table from breakpoints, sorting them by day.
    #[must_use]
    pub fn from_breakpoints(mut breakpoints: Vec<BudgetBreakpoint>) -> Self {
        breakpoints.sort_by_key(BudgetBreakpoint::day);
        Self { breakpoints }
    }

    /// Breakpoints in ascending day order.
    #[must_use]
    pub fn breakpoints(&self) -> &[BudgetBreakpoint] {
        &self.breakpoints
    }

    /// Value in effect on the provided day.
    #[must_use]
    pub fn value_for(&self, day: u32) -> u32 {
        self.breakpoints
            .iter()
            .take_while(|breakpoint| breakpoint.day() <= day)
            .last()
            .map_or(0, BudgetBreakpoint::value)
    }
}

/// Tuning for the nightly budget computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetConfig {
    base_budget_day1: u32,
    growth_per_mille: u32,
    elite_table: BudgetTable,
    boss_table: BudgetTable,
}

impl BudgetConfig {
    /// Creates a budget configuration with explicit tuning.
    #[must_use]
    pub fn new(
        base_budget_day1: u32,
        growth_per_mille: u32,
        elite_table: BudgetTable,
        boss_table: BudgetTable,
    ) -> Self {
        Self {
            base_budget_day1,
            growth_per_mille,
            elite_table,
            boss_table,
        }
    }

    /// Normal-channel spawn count on the first day.
    #[must_use]
    pub const fn base_budget_day1(&self) -> u32 {
        self.base_budget_day1
    }

    /// Per-mille compound growth applied to the normal budget each day.
    #[must_use]
    pub const fn growth_per_mille(&self) -> u32 {
        self.growth_per_mille
    }

    /// Elite-channel breakpoint table, consulted on elite nights only.
    #[must_use]
    pub const fn elite_table(&self) -> &BudgetTable {
        &self.elite_table
    }

    /// Boss-count breakpoint table, consulted on boss nights only.
    #[must_use]
    pub const fn boss_table(&self) -> &BudgetTable {
        &self.boss_table
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self::new(
            50,
            1_200,
            BudgetTable::from_breakpoints(vec![
                BudgetBreakpoint::new(3, 8),
                BudgetBreakpoint::new(6, 12),
                BudgetBreakpoint::new(9, 18),
                BudgetBreakpoint::new(12, 26),
                BudgetBreakpoint::new(15, 36),
            ]),
            BudgetTable::from_breakpoints(vec![BudgetBreakpoint::new(1, 2)]),
        )
    }
}

/// Relative spawn share assigned to one lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneWeight {
    lane: LaneId,
    weight: u32,
}

impl LaneWeight {
    /// Creates a lane weight entry.
    #[must_use]
    pub const fn new(lane: LaneId, weight: u32) -> Self {
        Self { lane, weight }
    }

    /// Lane the weight applies to.
    #[must_use]
    pub const fn lane(&self) -> LaneId {
        self.lane
    }

    /// Relative share of each tick's spawns routed into the lane.
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }
}

/// Tuning for the nightly spawn composer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnConfig {
    cadence_step: Duration,
    night_duration: Duration,
    lane_weights: Vec<LaneWeight>,
}

impl SpawnConfig {
    /// Creates a spawn configuration with explicit tuning.
    #[must_use]
    pub fn new(
        cadence_step: Duration,
        night_duration: Duration,
        lane_weights: Vec<LaneWeight>,
    ) -> Self {
        Self {
            cadence_step,
            night_duration,
            lane_weights,
        }
    }

    /// Interval between successive spawn ticks.
    #[must_use]
    pub const fn cadence_step(&self) -> Duration {
        self.cadence_step
    }

    /// Full duration of a night from nightfall to settlement.
    #[must_use]
    pub const fn night_duration(&self) -> Duration {
        self.night_duration
    }

    /// Lane weights in configuration order.
    #[must_use]
    pub fn lane_weights(&self) -> &[LaneWeight] {
        &self.lane_weights
    }

    /// Portion of the night during which spawning is allowed.
    ///
    /// The final stretch past the window produces no spawns regardless of
    /// remaining budget.
    #[must_use]
    pub fn active_window(&self) -> Duration {
        self.night_duration * SPAWN_WINDOW_PER_MILLE / PER_MILLE_SCALE
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(10),
            Duration::from_secs(180),
            vec![
                LaneWeight::new(LaneId::new(0), 1),
                LaneWeight::new(LaneId::new(1), 1),
            ],
        )
    }
}

/// Cadence at which nights carry elite and boss markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NightSchedule {
    elite_every: u32,
    boss_every: u32,
}

impl NightSchedule {
    /// Creates a schedule with explicit elite and boss cadences.
    ///
    /// A cadence of zero disables that marker entirely.
    #[must_use]
    pub const fn new(elite_every: u32, boss_every: u32) -> Self {
        Self {
            elite_every,
            boss_every,
        }
    }

    /// Every how many days a night carries the elite marker.
    #[must_use]
    pub const fn elite_every(&self) -> u32 {
        self.elite_every
    }

    /// Every how many days a night carries the boss marker.
    #[must_use]
    pub const fn boss_every(&self) -> u32 {
        self.boss_every
    }

    /// Resolves the markers for the provided one-based day.
    #[must_use]
    pub const fn flags_for(&self, day: u32) -> NightFlags {
        let elite = self.elite_every != 0 && day % self.elite_every == 0;
        let boss = self.boss_every != 0 && day % self.boss_every == 0;
        NightFlags::new(elite, boss)
    }
}

impl Default for NightSchedule {
    fn default() -> Self {
        Self::new(3, 5)
    }
}

/// Channel pools an archetype or reward participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSet {
    normal: bool,
    elite: bool,
    boss: bool,
}

impl ChannelSet {
    /// Creates a set with explicit membership per channel.
    #[must_use]
    pub const fn new(normal: bool, elite: bool, boss: bool) -> Self {
        Self {
            normal,
            elite,
            boss,
        }
    }

    /// Set containing every channel.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(true, true, true)
    }

    /// Reports whether the set contains the provided channel.
    #[must_use]
    pub const fn contains(&self, channel: Channel) -> bool {
        match channel {
            Channel::Normal => self.normal,
            Channel::Elite => self.elite,
            Channel::Boss => self.boss,
        }
    }
}

/// Per-mille sampling multipliers keyed by the night's dominant character.
///
/// These bias which archetypes a night favors; they never touch channel
/// budget accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NightWeights {
    calm: u32,
    elite: u32,
    boss: u32,
}

impl NightWeights {
    /// Creates night weights with explicit per-mille multipliers.
    #[must_use]
    pub const fn new(calm: u32, elite: u32, boss: u32) -> Self {
        Self { calm, elite, boss }
    }

    /// Uniform weights that leave sampling priority untouched.
    #[must_use]
    pub const fn uniform() -> Self {
        Self::new(PER_MILLE_SCALE, PER_MILLE_SCALE, PER_MILLE_SCALE)
    }

    /// Multiplier in effect on calm nights.
    #[must_use]
    pub const fn calm(&self) -> u32 {
        self.calm
    }

    /// Multiplier in effect on elite nights.
    #[must_use]
    pub const fn elite(&self) -> u32 {
        self.elite
    }

    /// Multiplier in effect on boss nights.
    #[must_use]
    pub const fn boss(&self) -> u32 {
        self.boss
    }

    /// Multiplier selected by the night's dominant character.
    #[must_use]
    pub const fn weight_for(&self, flags: NightFlags) -> u32 {
        match flags.dominant_channel() {
            Channel::Normal => self.calm,
            Channel::Elite => self.elite,
            Channel::Boss => self.boss,
        }
    }
}

/// One enemy archetype available to the spawn composer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchetypeDefinition {
    id: ArchetypeId,
    name: String,
    spawn_weight: u32,
    channels: ChannelSet,
    night_weights: NightWeights,
}

impl ArchetypeDefinition {
    /// Creates an archetype definition.
    #[must_use]
    pub fn new(
        id: ArchetypeId,
        name: String,
        spawn_weight: u32,
        channels: ChannelSet,
        night_weights: NightWeights,
    ) -> Self {
        Self {
            id,
            name,
            spawn_weight,
            channels,
            night_weights,
        }
    }

    /// Identifier of the archetype.
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Display name of the archetype.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base sampling weight of the archetype.
    #[must_use]
    pub const fn spawn_weight(&self) -> u32 {
        self.spawn_weight
    }

    /// Channel pools the archetype participates in.
    #[must_use]
    pub const fn channels(&self) -> ChannelSet {
        self.channels
    }

    /// Night-character sampling multipliers for the archetype.
    #[must_use]
    pub const fn night_weights(&self) -> NightWeights {
        self.night_weights
    }
}

/// Sorted table of all enemy archetypes known to the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchetypeTable {
    definitions: Vec<ArchetypeDefinition>,
}

impl ArchetypeTable {
    /// Creates a table from definitions, sorting them by identifier.
    #[must_use]
    pub fn from_definitions(mut definitions: Vec<ArchetypeDefinition>) -> Self {
        definitions.sort_by_key(ArchetypeDefinition::id);
        Self { definitions }
    }

    /// Definitions in ascending identifier order.
    #[must_use]
    pub fn definitions(&self) -> &[ArchetypeDefinition] {
        &self.definitions
    }

    /// Iterator over the definitions in deterministic order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &ArchetypeDefinition> {
        self.definitions.iter()
    }
}

/// Kinds of grants a reward catalog entry can apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RewardKind {
    /// A run-long passive artifact.
    Relic,
    /// A defending unit added to the garrison.
    Unit,
    /// A grant of technology points.
    TechPoints {
        /// Points granted when committed.
        amount: u32,
    },
    /// A grant of gold.
    Gold {
        /// Gold granted when committed, before the resource multiplier.
        amount: u32,
    },
}

impl RewardKind {
    /// Reports whether the kind is a gold grant.
    ///
    /// Gold entries are exempt from the non-repeat rule; they never enter
    /// the reward history.
    #[must_use]
    pub const fn is_gold(&self) -> bool {
        matches!(self, Self::Gold { .. })
    }
}

/// One entry in the reward catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardDefinition {
    id: RewardId,
    name: String,
    kind: RewardKind,
    pools: ChannelSet,
}

impl RewardDefinition {
    /// Creates a reward definition.
    #[must_use]
    pub fn new(id: RewardId, name: String, kind: RewardKind, pools: ChannelSet) -> Self {
        Self {
            id,
            name,
            kind,
            pools,
        }
    }

    /// Identifier of the catalog entry.
    #[must_use]
    pub const fn id(&self) -> RewardId {
        self.id
    }

    /// Display name of the catalog entry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of grant the entry applies when committed.
    #[must_use]
    pub const fn kind(&self) -> RewardKind {
        self.kind
    }

    /// Night pools the entry may be offered in.
    #[must_use]
    pub const fn pools(&self) -> ChannelSet {
        self.pools
    }
}

/// Sorted reward catalog plus the gold fallback tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardCatalog {
    definitions: Vec<RewardDefinition>,
    gold_fallback_amount: u32,
}

impl RewardCatalog {
    /// Creates a catalog from definitions, sorting them by identifier.
    #[must_use]
    pub fn from_definitions(mut definitions: Vec<RewardDefinition>, gold_fallback_amount: u32) -> Self {
        definitions.sort_by_key(RewardDefinition::id);
        Self {
            definitions,
            gold_fallback_amount,
        }
    }

    /// Definitions in ascending identifier order.
    #[must_use]
    pub fn definitions(&self) -> &[RewardDefinition] {
        &self.definitions
    }

    /// Iterator over the definitions in deterministic order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &RewardDefinition> {
        self.definitions.iter()
    }

    /// Gold granted per option when the catalog cannot fill an offer.
    #[must_use]
    pub const fn gold_fallback_amount(&self) -> u32 {
        self.gold_fallback_amount
    }
}

impl Default for RewardCatalog {
    fn default() -> Self {
        Self::from_definitions(
            vec![
                RewardDefinition::new(
                    RewardId::new(0),
                    String::from("Oaken Palisade Plans"),
                    RewardKind::Relic,
                    ChannelSet::all(),
                ),
                RewardDefinition::new(
                    RewardId::new(1),
                    String::from("Miners' Guild Charter"),
                    RewardKind::Relic,
                    ChannelSet::all(),
                ),
                RewardDefinition::new(
                    RewardId::new(2),
                    String::from("Veteran Halberdiers"),
                    RewardKind::Unit,
                    ChannelSet::all(),
                ),
                RewardDefinition::new(
                    RewardId::new(3),
                    String::from("Siege Engineers"),
                    RewardKind::Unit,
                    ChannelSet::new(true, true, false),
                ),
                RewardDefinition::new(
                    RewardId::new(4),
                    String::from("Arcane Scholars"),
                    RewardKind::TechPoints { amount: 25 },
                    ChannelSet::all(),
                ),
                RewardDefinition::new(
                    RewardId::new(5),
                    String::from("Masterwork Forge"),
                    RewardKind::TechPoints { amount: 40 },
                    ChannelSet::new(false, true, true),
                ),
                RewardDefinition::new(
                    RewardId::new(6),
                    String::from("Royal Treasury Grant"),
                    RewardKind::Gold { amount: 150 },
                    ChannelSet::all(),
                ),
                RewardDefinition::new(
                    RewardId::new(7),
                    String::from("Dragonbone Trophy"),
                    RewardKind::Relic,
                    ChannelSet::new(false, false, true),
                ),
                RewardDefinition::new(
                    RewardId::new(8),
                    String::from("Twilight Sentinels"),
                    RewardKind::Unit,
                    ChannelSet::new(false, true, true),
                ),
                RewardDefinition::new(
                    RewardId::new(9),
                    String::from("War Chest"),
                    RewardKind::Gold { amount: 250 },
                    ChannelSet::new(false, false, true),
                ),
            ],
            100,
        )
    }
}

/// Tuning for the run clock and castle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    day_duration: Duration,
    target_day: u32,
    castle_max_hp: u32,
    starting_gold: u32,
}

impl ClockConfig {
    /// Creates a clock configuration with explicit tuning.
    #[must_use]
    pub const fn new(
        day_duration: Duration,
        target_day: u32,
        castle_max_hp: u32,
        starting_gold: u32,
    ) -> Self {
        Self {
            day_duration,
            target_day,
            castle_max_hp,
            starting_gold,
        }
    }

    /// Daylight duration before nightfall.
    #[must_use]
    pub const fn day_duration(&self) -> Duration {
        self.day_duration
    }

    /// Day the run is won at the end of, castle permitting.
    #[must_use]
    pub const fn target_day(&self) -> u32 {
        self.target_day
    }

    /// Maximum castle hit points.
    #[must_use]
    pub const fn castle_max_hp(&self) -> u32 {
        self.castle_max_hp
    }

    /// Gold balance the run starts with.
    #[must_use]
    pub const fn starting_gold(&self) -> u32 {
        self.starting_gold
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(90), 30, 100, 200)
    }
}

/// Tuning for the retarget resolver's cooldown and search bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetargetConfig {
    cooldown: Duration,
    cooldown_floor: Duration,
    max_retargets_per_tick: u32,
    search_radius: u32,
}

impl RetargetConfig {
    /// Creates a retarget configuration with explicit tuning.
    #[must_use]
    pub const fn new(
        cooldown: Duration,
        cooldown_floor: Duration,
        max_retargets_per_tick: u32,
        search_radius: u32,
    ) -> Self {
        Self {
            cooldown,
            cooldown_floor,
            max_retargets_per_tick,
            search_radius,
        }
    }

    /// Time an agent waits between retarget computations.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Minimum wait honored even when a structural change fires early.
    #[must_use]
    pub const fn cooldown_floor(&self) -> Duration {
        self.cooldown_floor
    }

    /// Maximum retarget computations allowed within one tick.
    #[must_use]
    pub const fn max_retargets_per_tick(&self) -> u32 {
        self.max_retargets_per_tick
    }

    /// Radius in cells the candidate search is allowed to explore.
    #[must_use]
    pub const fn search_radius(&self) -> u32 {
        self.search_radius
    }
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_millis(500), 8, 24)
    }
}

/// How the run treats a failed day-boundary snapshot write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotPolicy {
    /// Gameplay continues; the persistence collaborator retries on its own.
    Tolerant,
    /// The run halts until the failure is acknowledged.
    Blocking,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::Tolerant
    }
}

/// Dimensions of the siege grid.
///
/// Lanes spawn along the northern edge and the castle objective occupies the
/// southern edge row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridConfig {
    columns: u32,
    rows: u32,
}

impl GridConfig {
    /// Creates a grid configuration with explicit dimensions.
    #[must_use]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::new(20, 28)
    }
}

/// Complete configuration aggregate for one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiegeConfig {
    difficulty: DifficultyConfig,
    budget: BudgetConfig,
    spawn: SpawnConfig,
    schedule: NightSchedule,
    archetypes: ArchetypeTable,
    rewards: RewardCatalog,
    clock: ClockConfig,
    retarget: RetargetConfig,
    snapshot_policy: SnapshotPolicy,
    grid: GridConfig,
}

impl SiegeConfig {
    /// Creates a configuration aggregate from explicit sections.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        difficulty: DifficultyConfig,
        budget: BudgetConfig,
        spawn: SpawnConfig,
        schedule: NightSchedule,
        archetypes: ArchetypeTable,
        rewards: RewardCatalog,
        clock: ClockConfig,
        retarget: RetargetConfig,
        snapshot_policy: SnapshotPolicy,
        grid: GridConfig,
    ) -> Self {
        Self {
            difficulty,
            budget,
            spawn,
            schedule,
            archetypes,
            rewards,
            clock,
            retarget,
            snapshot_policy,
            grid,
        }
    }

    /// Difficulty multipliers for the run.
    #[must_use]
    pub const fn difficulty(&self) -> &DifficultyConfig {
        &self.difficulty
    }

    /// Nightly budget tuning.
    #[must_use]
    pub const fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    /// Spawn composer tuning.
    #[must_use]
    pub const fn spawn(&self) -> &SpawnConfig {
        &self.spawn
    }

    /// Elite/boss night cadence.
    #[must_use]
    pub const fn schedule(&self) -> &NightSchedule {
        &self.schedule
    }

    /// Enemy archetype table.
    #[must_use]
    pub const fn archetypes(&self) -> &ArchetypeTable {
        &self.archetypes
    }

    /// Reward catalog and fallback tuning.
    #[must_use]
    pub const fn rewards(&self) -> &RewardCatalog {
        &self.rewards
    }

    /// Run clock and castle tuning.
    #[must_use]
    pub const fn clock(&self) -> &ClockConfig {
        &self.clock
    }

    /// Retarget resolver tuning.
    #[must_use]
    pub const fn retarget(&self) -> &RetargetConfig {
        &self.retarget
    }

    /// Policy applied to failed day-boundary snapshot writes.
    #[must_use]
    pub const fn snapshot_policy(&self) -> SnapshotPolicy {
        self.snapshot_policy
    }

    /// Siege grid dimensions.
    #[must_use]
    pub const fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Validates the aggregate, rejecting the first malformed field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered; the caller treats the
    /// aggregate as unusable and substitutes defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.day_duration().is_zero() {
            return Err(ConfigError::ZeroDayDuration);
        }
        if self.spawn.night_duration().is_zero() {
            return Err(ConfigError::ZeroNightDuration);
        }
        if self.spawn.cadence_step().is_zero() {
            return Err(ConfigError::ZeroCadenceStep);
        }
        if self.spawn.cadence_step() >= self.spawn.active_window() {
            return Err(ConfigError::CadenceBeyondWindow);
        }
        if self.budget.growth_per_mille() == 0 {
            return Err(ConfigError::ZeroGrowth);
        }
        if self.clock.target_day() == 0 {
            return Err(ConfigError::ZeroTargetDay);
        }
        if self.clock.castle_max_hp() == 0 {
            return Err(ConfigError::ZeroCastleHp);
        }
        if self.spawn.lane_weights().is_empty() {
            return Err(ConfigError::MissingLanes);
        }
        for lane_weight in self.spawn.lane_weights() {
            if lane_weight.weight() == 0 {
                return Err(ConfigError::ZeroLaneWeight {
                    lane: lane_weight.lane(),
                });
            }
        }
        for pair in self.archetypes.definitions().windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(ConfigError::DuplicateArchetype {
                    archetype: pair[0].id(),
                });
            }
        }
        for pair in self.rewards.definitions().windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(ConfigError::DuplicateReward {
                    reward: pair[0].id(),
                });
            }
        }
        for table in [self.budget.elite_table(), self.budget.boss_table()] {
            for pair in table.breakpoints().windows(2) {
                if pair[0].day() == pair[1].day() {
                    return Err(ConfigError::DuplicateBudgetBreakpoint { day: pair[0].day() });
                }
            }
        }
        let multipliers = [
            ("enemy_hp_mult", self.difficulty.enemy_hp_mult()),
            ("enemy_dmg_mult", self.difficulty.enemy_dmg_mult()),
            ("budget_mult_normal", self.difficulty.budget_mult_normal()),
            ("budget_mult_elite", self.difficulty.budget_mult_elite()),
            ("budget_mult_boss", self.difficulty.budget_mult_boss()),
            ("resource_mult", self.difficulty.resource_mult()),
        ];
        for (name, value) in multipliers {
            if value == 0 {
                return Err(ConfigError::ZeroMultiplier { name });
            }
        }
        if self.grid.columns() == 0 || self.grid.rows() == 0 {
            return Err(ConfigError::ZeroGridDimension);
        }
        if self.retarget.cooldown_floor() > self.retarget.cooldown() {
            return Err(ConfigError::FloorExceedsCooldown);
        }
        if self.retarget.max_retargets_per_tick() == 0 {
            return Err(ConfigError::ZeroRetargetCap);
        }
        if self.retarget.search_radius() == 0 {
            return Err(ConfigError::ZeroSearchRadius);
        }
        Ok(())
    }
}

impl Default for ArchetypeTable {
    fn default() -> Self {
        Self::from_definitions(vec![
            ArchetypeDefinition::new(
                ArchetypeId::new(0),
                String::from("Gnawer"),
                1_200,
                ChannelSet::new(true, false, false),
                NightWeights::new(1_000, 800, 600),
            ),
            ArchetypeDefinition::new(
                ArchetypeId::new(1),
                String::from("Husk"),
                1_000,
                ChannelSet::new(true, false, false),
                NightWeights::new(1_000, 1_000, 800),
            ),
            ArchetypeDefinition::new(
                ArchetypeId::new(2),
                String::from("Shrieker"),
                700,
                ChannelSet::new(true, true, false),
                NightWeights::new(800, 1_200, 800),
            ),
            ArchetypeDefinition::new(
                ArchetypeId::new(3),
                String::from("Ironhide"),
                400,
                ChannelSet::new(true, true, false),
                NightWeights::new(600, 1_400, 1_000),
            ),
            ArchetypeDefinition::new(
                ArchetypeId::new(4),
                String::from("Gravewarden"),
                300,
                ChannelSet::new(false, true, true),
                NightWeights::new(0, 1_200, 1_200),
            ),
            ArchetypeDefinition::new(
                ArchetypeId::new(5),
                String::from("Night Tyrant"),
                200,
                ChannelSet::new(false, false, true),
                NightWeights::new(0, 0, 1_500),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SiegeConfig::default().validate().is_ok());
    }

    #[test]
    fn budget_table_uses_breakpoint_semantics() {
        let table = BudgetTable::from_breakpoints(vec![
            BudgetBreakpoint::new(6, 12),
            BudgetBreakpoint::new(3, 8),
        ]);
        assert_eq!(table.value_for(2), 0);
        assert_eq!(table.value_for(3), 8);
        assert_eq!(table.value_for(5), 8);
        assert_eq!(table.value_for(6), 12);
        assert_eq!(table.value_for(40), 12);
    }

    #[test]
    fn schedule_flags_follow_cadence() {
        let schedule = NightSchedule::default();
        assert_eq!(schedule.flags_for(1), NightFlags::new(false, false));
        assert_eq!(schedule.flags_for(3), NightFlags::new(true, false));
        assert_eq!(schedule.flags_for(5), NightFlags::new(false, true));
        assert_eq!(schedule.flags_for(15), NightFlags::new(true, true));
    }

    #[test]
    fn disabled_cadence_never_flags_nights() {
        let schedule = NightSchedule::new(0, 0);
        for day in 1..=30 {
            assert_eq!(schedule.flags_for(day), NightFlags::default());
        }
    }

    #[test]
    fn active_window_covers_four_fifths_of_the_night() {
        let spawn = SpawnConfig::default();
        assert_eq!(spawn.active_window(), Duration::from_secs(144));
    }

    #[test]
    fn night_weights_follow_dominant_channel() {
        let weights = NightWeights::new(1_000, 1_400, 300);
        assert_eq!(weights.weight_for(NightFlags::new(false, false)), 1_000);
        assert_eq!(weights.weight_for(NightFlags::new(true, false)), 1_400);
        assert_eq!(weights.weight_for(NightFlags::new(true, true)), 300);
    }

    #[test]
    fn validate_rejects_zero_multiplier() {
        let mut config = SiegeConfig::default();
        config.difficulty = DifficultyConfig::new(1_000, 1_000, 0, 1_000, 1_000, 1_000);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroMultiplier {
                name: "budget_mult_normal"
            })
        );
    }

    #[test]
    fn validate_rejects_duplicate_archetypes() {
        let mut config = SiegeConfig::default();
        config.archetypes = ArchetypeTable::from_definitions(vec![
            ArchetypeDefinition::new(
                ArchetypeId::new(7),
                String::from("First"),
                100,
                ChannelSet::all(),
                NightWeights::uniform(),
            ),
            ArchetypeDefinition::new(
                ArchetypeId::new(7),
                String::from("Second"),
                100,
                ChannelSet::all(),
                NightWeights::uniform(),
            ),
        ]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateArchetype {
                archetype: ArchetypeId::new(7)
            })
        );
    }

    #[test]
    fn validate_rejects_cooldown_floor_above_cooldown() {
        let mut config = SiegeConfig::default();
        config.retarget = RetargetConfig::new(
            Duration::from_millis(400),
            Duration::from_millis(500),
            8,
            24,
        );
        assert_eq!(config.validate(), Err(ConfigError::FloorExceedsCooldown));
    }

    #[test]
    fn channel_set_membership() {
        let set = ChannelSet::new(true, false, true);
        assert!(set.contains(Channel::Normal));
        assert!(!set.contains(Channel::Elite));
        assert!(set.contains(Channel::Boss));
        assert!(ChannelSet::all().contains(Channel::Elite));
    }
}
