#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Nighthold siege engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for collaborators
//! to react to deterministically. Systems consume immutable plans and views,
//! never the world itself, and respond exclusively with new values for the
//! world to commit.

pub mod config;
pub mod error;

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RewardKind;
use crate::error::{
    ConfigError, PlacementError, RemovalError, SelectionError, Severity, TransitionError,
};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Nighthold.";

/// Fixed-point scale applied to all per-mille tuning ratios.
///
/// A ratio of `1_000` means multiply by one. Budget growth, difficulty
/// multipliers, and sampling weights are all expressed against this scale so
/// that every arithmetic step stays in integers and replays bit-exactly on
/// any platform.
pub const PER_MILLE_SCALE: u32 = 1_000;

/// Per-mille share of the night during which spawning is allowed.
///
/// The remaining share at the end of the night never spawns, regardless of
/// leftover budget.
pub const SPAWN_WINDOW_PER_MILLE: u32 = 800;

/// Label prefix mixed into per-channel spawn sampling streams.
pub const RNG_STREAM_SPAWN_PREFIX: &str = "spawn-channel";

/// Label mixed into the reward shuffle stream.
pub const RNG_STREAM_REWARD: &str = "reward-shuffle";

/// Opaque identifier assigned to a single playthrough.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    /// Creates a new run identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier of a spawn lane leading toward the castle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(u32);

impl LaneId {
    /// Creates a new lane identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of an enemy archetype defined by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Creates a new archetype identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a player-built structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(u32);

impl StructureId {
    /// Creates a new structure identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of an enemy agent managed by the external combat collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a reward catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RewardId(u32);

impl RewardId {
    /// Creates a new reward identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Phases a run moves through from boot to a terminal outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Configuration is validated and the run is assembled.
    Boot,
    /// Daylight build window; the day timer runs toward nightfall.
    Day,
    /// Active siege; waves spawn and the castle takes damage.
    Night,
    /// Post-night window in which the reward offer is resolved.
    Settlement,
    /// The castle survived through the configured target day.
    Victory,
    /// The castle fell; the run is over.
    Defeat,
}

impl Phase {
    /// Reports whether the phase ends the run permanently.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Victory | Self::Defeat)
    }
}

/// Triggers that request a phase transition from the run clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseTrigger {
    /// Boot finished assembling the run.
    BootCompleted,
    /// The day timer reached the configured day duration.
    DayTimerElapsed,
    /// The host reported all wave batches resolved and combat settled.
    NightResolved,
    /// The reward selection for the night was committed.
    RewardCommitted,
    /// The final settlement resolved with the castle standing.
    TargetDayReached,
    /// The castle's hit points reached zero.
    CastleDestroyed,
}

/// Independent enemy-pressure budget tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Baseline nightly pressure present every night.
    Normal,
    /// Additional pressure on nights flagged elite.
    Elite,
    /// Boss pressure on nights flagged boss.
    Boss,
}

impl Channel {
    /// All channels in canonical sampling order.
    pub const ALL: [Channel; 3] = [Channel::Normal, Channel::Elite, Channel::Boss];

    /// Stable label mixed into seed derivation for this channel's stream.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Elite => "elite",
            Self::Boss => "boss",
        }
    }
}

/// Elite/boss markers attached to a night by the night schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NightFlags {
    elite: bool,
    boss: bool,
}

impl NightFlags {
    /// Creates night flags with explicit elite and boss markers.
    #[must_use]
    pub const fn new(elite: bool, boss: bool) -> Self {
        Self { elite, boss }
    }

    /// Reports whether the night carries the elite marker.
    #[must_use]
    pub const fn elite(&self) -> bool {
        self.elite
    }

    /// Reports whether the night carries the boss marker.
    #[must_use]
    pub const fn boss(&self) -> bool {
        self.boss
    }

    /// Channel that dominates sampling priority and reward pools this night.
    ///
    /// Boss outranks elite, elite outranks normal. A night flagged both elite
    /// and boss therefore resolves to [`Channel::Boss`].
    #[must_use]
    pub const fn dominant_channel(&self) -> Channel {
        if self.boss {
            Channel::Boss
        } else if self.elite {
            Channel::Elite
        } else {
            Channel::Normal
        }
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Reports whether the rectangle covers the provided cell.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        let column_end = self.origin.column().saturating_add(self.size.width());
        let row_end = self.origin.row().saturating_add(self.size.height());
        cell.column() >= self.origin.column()
            && cell.column() < column_end
            && cell.row() >= self.origin.row()
            && cell.row() < row_end
    }

    /// Iterates the covered cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let origin = self.origin;
        let size = self.size;
        (0..size.height()).flat_map(move |row_offset| {
            (0..size.width()).map(move |column_offset| {
                CellCoord::new(
                    origin.column().saturating_add(column_offset),
                    origin.row().saturating_add(row_offset),
                )
            })
        })
    }
}

/// Contents of a blocked cell in the dense obstacle grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Obstacle {
    /// Static terrain that can never be removed or attacked.
    Terrain,
    /// A player-built structure that agents may attack to clear the path.
    Structure(StructureId),
}

/// Kinds of player-built structures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Single-cell palisade segment.
    Wall,
    /// Two-by-two defensive tower.
    Tower,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Validates configuration and assembles the run out of the boot phase.
    Boot,
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Reports castle damage resolved by the external combat collaborator.
    DamageCastle {
        /// Hit points to subtract from the castle.
        amount: u32,
    },
    /// Reports that a planned wave batch was released into a lane.
    ReportWave {
        /// Lane that received the batch.
        lane: LaneId,
        /// Number of agents spawned in the batch.
        spawn_count: u32,
        /// Budget channel the batch was drawn from.
        channel: Channel,
        /// Total budget allotted to that channel this night.
        channel_budget: u32,
    },
    /// Reports that all wave batches resolved and night combat settled.
    ResolveNight,
    /// Presents the settlement reward offer to the run.
    OfferReward {
        /// Offer produced by the reward director for this night.
        offer: RewardOffer,
    },
    /// Commits the player's choice from the pending reward offer.
    CommitReward {
        /// Zero-based index into the offer's three options.
        chosen_index: u32,
    },
    /// Requests immediate placement of a structure at the provided origin.
    PlaceStructure {
        /// Kind of structure to construct at the origin.
        kind: StructureKind,
        /// Upper-left cell that defines the structure's footprint.
        origin: CellCoord,
    },
    /// Requests removal of an existing structure from the world.
    DestroyStructure {
        /// Identifier of the structure targeted for removal.
        structure: StructureId,
    },
    /// Enqueues a timed build that completes during a later day tick.
    QueueBuild {
        /// Kind of structure the build will place once ready.
        kind: StructureKind,
        /// Upper-left cell the finished structure will occupy.
        origin: CellCoord,
        /// Daylight time the build takes to complete.
        build_time: Duration,
    },
    /// Reports the outcome of the externally executed snapshot write.
    ReportSnapshot {
        /// Result observed by the persistence collaborator.
        result: SnapshotWriteResult,
    },
    /// Clears the halt raised by a blocking snapshot failure.
    AcknowledgeSaveFailure,
}

/// Envelope attached to every event broadcast by the world.
///
/// Collaborators correlate events across runs via the run identifier and
/// order them via the simulation timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Run the event belongs to.
    pub run: RunId,
    /// Simulation time at which the event was emitted.
    pub at: Duration,
    /// Typed payload describing what happened.
    pub kind: EventKind,
}

/// Closed enumeration of everything the world reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A new day began.
    DayStarted {
        /// One-based day number that just started.
        day: u32,
    },
    /// Nightfall; the siege for this day begins.
    NightStarted {
        /// Day the night belongs to.
        day: u32,
        /// One-based night number, always equal to the day number.
        night: u32,
        /// Elite/boss markers resolved from the night schedule.
        flags: NightFlags,
    },
    /// Night combat settled; the settlement window opened.
    SettlementStarted {
        /// Day whose night just settled.
        day: u32,
    },
    /// A planned wave batch was released into a lane.
    WaveSpawned {
        /// Lane that received the batch.
        lane: LaneId,
        /// Number of agents spawned in the batch.
        spawn_count: u32,
        /// Budget channel the batch was drawn from.
        channel: Channel,
        /// Total budget allotted to that channel this night.
        channel_budget: u32,
    },
    /// The castle's hit points changed.
    CastleHpChanged {
        /// Hit points before the change.
        previous: u32,
        /// Hit points after the change.
        current: u32,
    },
    /// The settlement reward offer was presented.
    RewardOffered {
        /// Offer awaiting a player selection.
        offer: RewardOffer,
    },
    /// A reward selection was committed to the run.
    RewardCommitted {
        /// Option that was granted.
        option: RewardOption,
    },
    /// A reward commit request was rejected.
    RewardCommitRejected {
        /// Index provided in the commit request.
        chosen_index: u32,
        /// Specific reason the commit failed.
        reason: SelectionError,
    },
    /// A structure was placed into the world.
    StructurePlaced {
        /// Identifier assigned to the structure by the world.
        structure: StructureId,
        /// Kind of structure that was placed.
        kind: StructureKind,
        /// Region of cells occupied by the structure.
        region: CellRect,
    },
    /// A structure was removed from the world.
    StructureDestroyed {
        /// Identifier of the structure that was removed.
        structure: StructureId,
        /// Region of cells previously occupied by the structure.
        region: CellRect,
    },
    /// A structure placement request was rejected.
    StructurePlacementRejected {
        /// Kind of structure requested for placement.
        kind: StructureKind,
        /// Origin cell provided in the placement request.
        origin: CellCoord,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// A structure removal request was rejected.
    StructureRemovalRejected {
        /// Identifier of the structure targeted for removal.
        structure: StructureId,
        /// Specific reason the removal failed.
        reason: RemovalError,
    },
    /// A timed build was accepted into the build queue.
    BuildQueued {
        /// Kind of structure the build will place.
        kind: StructureKind,
        /// Upper-left cell the finished structure will occupy.
        origin: CellCoord,
        /// Daylight time remaining until the build completes.
        ready_in: Duration,
    },
    /// A day boundary was reached and a snapshot write is required.
    SnapshotRequested {
        /// Payload the persistence collaborator must write atomically.
        snapshot: RunSnapshot,
    },
    /// The persistence collaborator confirmed the day-boundary write.
    SaveAutosaved {
        /// Day whose snapshot was written.
        day: u32,
    },
    /// The persistence collaborator reported a failed write.
    SaveFailed {
        /// Severity derived from the configured snapshot policy.
        severity: Severity,
        /// Human-readable context reported by the collaborator.
        context: String,
    },
    /// A phase transition request was refused.
    TransitionRejected {
        /// Phase the run was in when the trigger arrived.
        phase: Phase,
        /// Trigger that was refused.
        trigger: PhaseTrigger,
        /// Specific reason the transition failed.
        reason: TransitionError,
    },
    /// Configuration was rejected and built-in defaults were substituted.
    ConfigFallback {
        /// First validation failure that rejected the configuration.
        reason: ConfigError,
    },
    /// The run reached a terminal phase.
    RunEnded {
        /// Outcome the run ended with.
        outcome: RunOutcome,
    },
}

/// Result of the externally executed day-boundary snapshot write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotWriteResult {
    /// The snapshot was persisted in full.
    Saved,
    /// The write failed; the prior snapshot remains intact.
    Failed {
        /// Human-readable context reported by the collaborator.
        context: String,
    },
}

/// Terminal outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// The castle survived through the target day.
    Victory,
    /// The castle fell.
    Defeat,
}

/// Immutable output of one nightly budget computation.
///
/// The three tracks are computed independently of one another; perturbing the
/// tuning of one track never moves the others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BudgetSnapshot {
    day_number: u32,
    night_number: u32,
    normal: u32,
    elite: u32,
    boss: u32,
}

impl BudgetSnapshot {
    /// Creates a budget snapshot with explicit per-channel spawn counts.
    #[must_use]
    pub const fn new(
        day_number: u32,
        night_number: u32,
        normal: u32,
        elite: u32,
        boss: u32,
    ) -> Self {
        Self {
            day_number,
            night_number,
            normal,
            elite,
            boss,
        }
    }

    /// One-based day the budget was computed for.
    #[must_use]
    pub const fn day_number(&self) -> u32 {
        self.day_number
    }

    /// One-based night the budget was computed for.
    #[must_use]
    pub const fn night_number(&self) -> u32 {
        self.night_number
    }

    /// Spawn count allotted to the normal channel.
    #[must_use]
    pub const fn normal(&self) -> u32 {
        self.normal
    }

    /// Spawn count allotted to the elite channel.
    #[must_use]
    pub const fn elite(&self) -> u32 {
        self.elite
    }

    /// Spawn count allotted to the boss channel.
    #[must_use]
    pub const fn boss(&self) -> u32 {
        self.boss
    }

    /// Spawn count allotted to the provided channel.
    #[must_use]
    pub const fn channel_budget(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Normal => self.normal,
            Channel::Elite => self.elite,
            Channel::Boss => self.boss,
        }
    }

    /// Total spawn count across all three channels.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.normal
            .saturating_add(self.elite)
            .saturating_add(self.boss)
    }
}

/// One planned spawn within a night.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnEntry {
    tick_offset: Duration,
    lane: LaneId,
    archetype: ArchetypeId,
    channel: Channel,
}

impl SpawnEntry {
    /// Creates a spawn entry with explicit provenance.
    #[must_use]
    pub const fn new(
        tick_offset: Duration,
        lane: LaneId,
        archetype: ArchetypeId,
        channel: Channel,
    ) -> Self {
        Self {
            tick_offset,
            lane,
            archetype,
            channel,
        }
    }

    /// Offset from night start at which the spawn is due.
    #[must_use]
    pub const fn tick_offset(&self) -> Duration {
        self.tick_offset
    }

    /// Lane the agent spawns into.
    #[must_use]
    pub const fn lane(&self) -> LaneId {
        self.lane
    }

    /// Archetype of the spawned agent.
    #[must_use]
    pub const fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    /// Budget channel the spawn was drawn from.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }
}

/// Time-ordered spawn schedule for one night.
///
/// Generated once at night start and consumed batch-by-batch by the host;
/// whatever the night does not spend is discarded with the plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnPlan {
    day_number: u32,
    night_number: u32,
    entries: Vec<SpawnEntry>,
}

impl SpawnPlan {
    /// Creates a plan from entries already ordered by tick offset.
    #[must_use]
    pub fn new(day_number: u32, night_number: u32, entries: Vec<SpawnEntry>) -> Self {
        Self {
            day_number,
            night_number,
            entries,
        }
    }

    /// Creates an empty plan for a night with nothing to spawn.
    #[must_use]
    pub const fn empty(day_number: u32, night_number: u32) -> Self {
        Self {
            day_number,
            night_number,
            entries: Vec::new(),
        }
    }

    /// One-based day the plan belongs to.
    #[must_use]
    pub const fn day_number(&self) -> u32 {
        self.day_number
    }

    /// One-based night the plan belongs to.
    #[must_use]
    pub const fn night_number(&self) -> u32 {
        self.night_number
    }

    /// Planned spawns ordered by tick offset.
    #[must_use]
    pub fn entries(&self) -> &[SpawnEntry] {
        &self.entries
    }

    /// Reports whether the plan schedules any spawns at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of planned spawns drawn from the provided channel.
    #[must_use]
    pub fn channel_count(&self, channel: Channel) -> u32 {
        let count = self
            .entries
            .iter()
            .filter(|entry| entry.channel() == channel)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Exclusive catalog availability states for the settlement reward pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// At least three eligible non-gold entries remain.
    CatalogAvailable,
    /// No eligible non-gold entries remain at all.
    ///
    /// Offers never carry this state: the moment eligibility drops below
    /// three, offers collapse straight to [`PoolState::GoldFallback`]. The
    /// value exists for catalog-state queries only.
    Exhausted,
    /// Fewer than three eligible entries remain; all options degrade to gold.
    GoldFallback,
}

/// One selectable option within a reward offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardOption {
    /// An entry drawn from the configured reward catalog.
    Catalog {
        /// Catalog identifier of the entry.
        id: RewardId,
        /// Kind of grant the entry applies when committed.
        kind: RewardKind,
    },
    /// A fixed gold grant offered when the catalog cannot fill the offer.
    Gold {
        /// Amount of gold granted when committed.
        amount: u32,
    },
}

/// Post-night decision artifact holding exactly three options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardOffer {
    day_number: u32,
    night_number: u32,
    pool_state: PoolState,
    options: [RewardOption; 3],
}

impl RewardOffer {
    /// Creates an offer for the provided night.
    #[must_use]
    pub const fn new(
        day_number: u32,
        night_number: u32,
        pool_state: PoolState,
        options: [RewardOption; 3],
    ) -> Self {
        Self {
            day_number,
            night_number,
            pool_state,
            options,
        }
    }

    /// One-based day the offer was built for.
    #[must_use]
    pub const fn day_number(&self) -> u32 {
        self.day_number
    }

    /// One-based night the offer was built for.
    #[must_use]
    pub const fn night_number(&self) -> u32 {
        self.night_number
    }

    /// Catalog availability state the offer was built under.
    #[must_use]
    pub const fn pool_state(&self) -> PoolState {
        self.pool_state
    }

    /// All three options in presentation order.
    #[must_use]
    pub const fn options(&self) -> &[RewardOption; 3] {
        &self.options
    }

    /// Retrieves the option at the provided zero-based index, if in range.
    #[must_use]
    pub fn option(&self, index: u32) -> Option<RewardOption> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.options.get(index).copied())
    }
}

/// Read-only view over the catalog rewards a run has already earned.
#[derive(Clone, Copy, Debug)]
pub struct RewardHistoryView<'a> {
    earned: &'a BTreeSet<RewardId>,
}

impl<'a> RewardHistoryView<'a> {
    /// Captures a view over the provided earned-reward set.
    #[must_use]
    pub const fn new(earned: &'a BTreeSet<RewardId>) -> Self {
        Self { earned }
    }

    /// Reports whether the reward was already committed during this run.
    #[must_use]
    pub fn contains(&self, reward: RewardId) -> bool {
        self.earned.contains(&reward)
    }

    /// Number of distinct catalog rewards earned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.earned.len()
    }

    /// Reports whether no catalog reward has been earned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.earned.is_empty()
    }
}

/// Target an agent is ordered to attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttackTarget {
    /// A specific blocking structure.
    Structure(StructureId),
    /// The castle objective itself.
    Objective,
}

/// Order issued to one enemy agent for the current tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnemyCommand {
    /// Follow the provided path toward the objective.
    Navigate {
        /// Cells to traverse, starting adjacent to the agent.
        path: Vec<CellCoord>,
    },
    /// Attack the provided target until it falls or the path reopens.
    Attack {
        /// Target the agent should engage.
        target: AttackTarget,
    },
    /// Do nothing this tick; the retarget cooldown is still running.
    Hold,
}

/// Action states an enemy agent moves through while besieging the castle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentActionState {
    /// The agent is following a live path toward the objective.
    Navigating,
    /// The agent has no path and is waiting out the retarget cooldown.
    Blocked,
    /// The agent is attacking a structure or the objective directly.
    AttackingBlocker,
    /// A structural change invalidated the agent's plan; resolve again.
    Reevaluate,
}

/// Immutable description of one agent handed to the retarget resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentContext {
    /// Identifier of the agent being resolved.
    pub id: AgentId,
    /// Cell the agent currently occupies.
    pub cell: CellCoord,
    /// Action state the agent reported entering this tick.
    pub state: AgentActionState,
}

/// Immutable representation of a single structure's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructureSnapshot {
    /// Identifier allocated to the structure by the world.
    pub id: StructureId,
    /// Kind of structure that was constructed.
    pub kind: StructureKind,
    /// Region of cells occupied by the structure.
    pub region: CellRect,
}

/// Read-only snapshot describing all structures placed within the run.
#[derive(Clone, Debug, Default)]
pub struct StructureView {
    snapshots: Vec<StructureSnapshot>,
}

impl StructureView {
    /// Creates a new structure view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<StructureSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &StructureSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<StructureSnapshot> {
        self.snapshots
    }
}

/// Read-only view into the dense obstacle grid.
#[derive(Clone, Copy, Debug)]
pub struct BlockView<'a> {
    cells: &'a [Option<Obstacle>],
    columns: u32,
    rows: u32,
}

impl<'a> BlockView<'a> {
    /// Captures a new block view backed by the provided cell slice.
    #[must_use]
    pub fn new(cells: &'a [Option<Obstacle>], columns: u32, rows: u32) -> Self {
        Self {
            cells,
            columns,
            rows,
        }
    }

    /// Returns the obstacle occupying the provided cell, if any.
    #[must_use]
    pub fn obstacle(&self, cell: CellCoord) -> Option<Obstacle> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    /// Reports whether the cell is traversable.
    ///
    /// Cells outside the grid are treated as blocked so that path searches
    /// never walk off the map.
    #[must_use]
    pub fn is_free(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .is_some_and(|index| self.cells.get(index).copied().unwrap_or(None).is_none())
    }

    /// Provides the dimensions of the underlying obstacle grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Read-only view into the dense objective-distance field.
#[derive(Clone, Copy, Debug)]
pub struct NavigationView<'a> {
    distances: &'a [u16],
    columns: u32,
    rows: u32,
}

impl<'a> NavigationView<'a> {
    /// Sentinel distance marking a cell with no route to the objective.
    pub const UNREACHABLE: u16 = u16::MAX;

    /// Captures a new navigation view backed by the provided distance slice.
    #[must_use]
    pub fn new(distances: &'a [u16], columns: u32, rows: u32) -> Self {
        Self {
            distances,
            columns,
            rows,
        }
    }

    /// Distance recorded for the provided cell, if it lies within the field.
    #[must_use]
    pub fn distance(&self, cell: CellCoord) -> Option<u16> {
        if cell.column() >= self.columns || cell.row() >= self.rows {
            return None;
        }

        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        self.distances.get(row * width + column).copied()
    }

    /// Reports whether a route to the objective exists from the cell.
    #[must_use]
    pub fn is_reachable(&self, cell: CellCoord) -> bool {
        self.distance(cell)
            .is_some_and(|distance| distance != Self::UNREACHABLE)
    }

    /// Provides the dimensions of the underlying distance field.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }
}

/// One pending timed build awaiting completion during a day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedBuild {
    kind: StructureKind,
    origin: CellCoord,
    remaining: Duration,
}

impl QueuedBuild {
    /// Creates a queued build with the provided time remaining.
    #[must_use]
    pub const fn new(kind: StructureKind, origin: CellCoord, remaining: Duration) -> Self {
        Self {
            kind,
            origin,
            remaining,
        }
    }

    /// Kind of structure the build will place.
    #[must_use]
    pub const fn kind(&self) -> StructureKind {
        self.kind
    }

    /// Upper-left cell the finished structure will occupy.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Daylight time remaining until the build completes.
    #[must_use]
    pub const fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Returns the build with the provided amount of time elapsed.
    #[must_use]
    pub fn elapsed_by(self, dt: Duration) -> Self {
        Self {
            remaining: self.remaining.saturating_sub(dt),
            ..self
        }
    }

    /// Reports whether the build has finished counting down.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// Day-boundary checkpoint persisted atomically by the host.
///
/// The payload is all-or-nothing at the persistence boundary: either every
/// field lands on disk or the prior snapshot stays untouched, so a restored
/// run can never mix state from two different days.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    run: RunId,
    seed: u64,
    day_number: u32,
    phase_timer_baseline: Duration,
    build_queue: Vec<QueuedBuild>,
}

impl RunSnapshot {
    /// Creates a snapshot of the provided run state.
    #[must_use]
    pub fn new(
        run: RunId,
        seed: u64,
        day_number: u32,
        phase_timer_baseline: Duration,
        build_queue: Vec<QueuedBuild>,
    ) -> Self {
        Self {
            run,
            seed,
            day_number,
            phase_timer_baseline,
            build_queue,
        }
    }

    /// Run the snapshot belongs to.
    #[must_use]
    pub const fn run(&self) -> RunId {
        self.run
    }

    /// Immutable seed that sources all of the run's randomness.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// One-based day the snapshot was taken at the start of.
    #[must_use]
    pub const fn day_number(&self) -> u32 {
        self.day_number
    }

    /// Phase timer value to resume the day from.
    #[must_use]
    pub const fn phase_timer_baseline(&self) -> Duration {
        self.phase_timer_baseline
    }

    /// Timed builds still pending when the snapshot was taken.
    #[must_use]
    pub fn build_queue(&self) -> &[QueuedBuild] {
        &self.build_queue
    }
}

/// Seed material handed to the deterministic night systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NightSeedContext {
    run_seed: u64,
    day_number: u32,
}

impl NightSeedContext {
    /// Creates a seed context for the provided run seed and day.
    #[must_use]
    pub const fn new(run_seed: u64, day_number: u32) -> Self {
        Self {
            run_seed,
            day_number,
        }
    }

    /// Immutable run seed sourcing all derived streams.
    #[must_use]
    pub const fn run_seed(&self) -> u64 {
        self.run_seed
    }

    /// One-based day whose night is being generated.
    #[must_use]
    pub const fn day_number(&self) -> u32 {
        self.day_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn cell_rect_contains_its_cells_and_nothing_else() {
        let rect = CellRect::from_origin_and_size(CellCoord::new(2, 3), CellRectSize::new(2, 2));
        assert!(rect.contains(CellCoord::new(2, 3)));
        assert!(rect.contains(CellCoord::new(3, 4)));
        assert!(!rect.contains(CellCoord::new(4, 3)));
        assert!(!rect.contains(CellCoord::new(1, 3)));

        let cells: Vec<CellCoord> = rect.cells().collect();
        assert_eq!(
            cells,
            vec![
                CellCoord::new(2, 3),
                CellCoord::new(3, 3),
                CellCoord::new(2, 4),
                CellCoord::new(3, 4),
            ]
        );
    }

    #[test]
    fn dominant_channel_prefers_boss_over_elite() {
        assert_eq!(
            NightFlags::new(false, false).dominant_channel(),
            Channel::Normal
        );
        assert_eq!(
            NightFlags::new(true, false).dominant_channel(),
            Channel::Elite
        );
        assert_eq!(
            NightFlags::new(false, true).dominant_channel(),
            Channel::Boss
        );
        assert_eq!(NightFlags::new(true, true).dominant_channel(), Channel::Boss);
    }

    #[test]
    fn budget_snapshot_resolves_channels() {
        let snapshot = BudgetSnapshot::new(4, 4, 86, 8, 0);
        assert_eq!(snapshot.channel_budget(Channel::Normal), 86);
        assert_eq!(snapshot.channel_budget(Channel::Elite), 8);
        assert_eq!(snapshot.channel_budget(Channel::Boss), 0);
        assert_eq!(snapshot.total(), 94);
    }

    #[test]
    fn spawn_plan_counts_entries_per_channel() {
        let entries = vec![
            SpawnEntry::new(
                Duration::from_secs(0),
                LaneId::new(0),
                ArchetypeId::new(1),
                Channel::Normal,
            ),
            SpawnEntry::new(
                Duration::from_secs(10),
                LaneId::new(1),
                ArchetypeId::new(2),
                Channel::Normal,
            ),
            SpawnEntry::new(
                Duration::from_secs(10),
                LaneId::new(0),
                ArchetypeId::new(7),
                Channel::Boss,
            ),
        ];
        let plan = SpawnPlan::new(3, 3, entries);
        assert_eq!(plan.channel_count(Channel::Normal), 2);
        assert_eq!(plan.channel_count(Channel::Elite), 0);
        assert_eq!(plan.channel_count(Channel::Boss), 1);
        assert!(!plan.is_empty());
    }

    #[test]
    fn reward_offer_guards_option_index() {
        let options = [
            RewardOption::Gold { amount: 100 },
            RewardOption::Gold { amount: 100 },
            RewardOption::Gold { amount: 100 },
        ];
        let offer = RewardOffer::new(5, 5, PoolState::GoldFallback, options);
        assert!(offer.option(2).is_some());
        assert!(offer.option(3).is_none());
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn run_id_round_trips_through_bincode() {
        assert_round_trip(&RunId::new(77));
    }

    #[test]
    fn structure_id_round_trips_through_bincode() {
        assert_round_trip(&StructureId::new(42));
    }

    #[test]
    fn cell_coord_round_trips_through_bincode() {
        assert_round_trip(&CellCoord::new(5, 7));
    }

    #[test]
    fn structure_kind_round_trips_through_bincode() {
        assert_round_trip(&StructureKind::Tower);
    }

    #[test]
    fn run_snapshot_round_trips_through_bincode() {
        let queue = vec![QueuedBuild::new(
            StructureKind::Wall,
            CellCoord::new(4, 9),
            Duration::from_secs(12),
        )];
        let snapshot = RunSnapshot::new(RunId::new(1), 9_876, 14, Duration::from_secs(3), queue);
        assert_round_trip(&snapshot);
    }
}
