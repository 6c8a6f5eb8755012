#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative run state management for the Nighthold siege engine.
//!
//! The world owns the run clock, the castle, the obstacle grid, the build
//! queue, and the reward ledger. Adapters drive it exclusively through
//! [`apply`] and observe it through the [`query`] module and the events each
//! command emits. All randomness lives in the pure night systems; the world
//! itself is a deterministic fold over the command stream.

mod navigation;
mod structures;

pub mod clock;

use std::collections::BTreeSet;
use std::time::Duration;

use nighthold_core::{
    config::{RewardKind, SiegeConfig, SnapshotPolicy},
    error::{PlacementError, RemovalError, SelectionError, Severity},
    CellCoord, CellRect, Command, Event, EventKind, Obstacle, Phase, PhaseTrigger, QueuedBuild,
    RewardId, RewardOffer, RewardOption, RunId, RunOutcome, RunSnapshot, SnapshotWriteResult,
    StructureId, StructureKind, PER_MILLE_SCALE, WELCOME_BANNER,
};

use crate::navigation::NavigationField;
use crate::structures::{footprint_for, StructureRegistry};

/// Represents the authoritative state of a single Nighthold run.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    run: RunId,
    seed: u64,
    config: SiegeConfig,
    phase: Phase,
    day_number: u32,
    phase_elapsed: Duration,
    sim_now: Duration,
    tick_index: u64,
    castle_hp: u32,
    gold: u32,
    reward_history: BTreeSet<RewardId>,
    pending_offer: Option<RewardOffer>,
    committed_night: Option<u32>,
    build_queue: Vec<QueuedBuild>,
    structures: StructureRegistry,
    obstacles: Vec<Option<Obstacle>>,
    navigation: NavigationField,
    halted: bool,
}

impl World {
    /// Creates a run resting in the boot phase, ready for [`Command::Boot`].
    ///
    /// The provided configuration is held as-is until boot validates it; a
    /// malformed aggregate is replaced with defaults at that point and the
    /// substitution reported through [`EventKind::ConfigFallback`].
    #[must_use]
    pub fn new(run: RunId, seed: u64, config: SiegeConfig) -> Self {
        let mut world = Self {
            banner: WELCOME_BANNER,
            run,
            seed,
            config,
            phase: Phase::Boot,
            day_number: 0,
            phase_elapsed: Duration::ZERO,
            sim_now: Duration::ZERO,
            tick_index: 0,
            castle_hp: 0,
            gold: 0,
            reward_history: BTreeSet::new(),
            pending_offer: None,
            committed_night: None,
            build_queue: Vec::new(),
            structures: StructureRegistry::new(),
            obstacles: Vec::new(),
            navigation: NavigationField::default(),
            halted: false,
        };
        world.reset_grid();
        world
    }

    fn event(&self, kind: EventKind) -> Event {
        Event {
            run: self.run,
            at: self.sim_now,
            kind,
        }
    }

    fn advance_phase(&mut self, trigger: PhaseTrigger, out_events: &mut Vec<Event>) -> bool {
        match clock::advance(self.phase, trigger) {
            Ok(next) => {
                self.phase = next;
                self.phase_elapsed = Duration::ZERO;
                true
            }
            Err(reason) => {
                out_events.push(self.event(EventKind::TransitionRejected {
                    phase: self.phase,
                    trigger,
                    reason,
                }));
                false
            }
        }
    }

    fn begin_day(&mut self, day: u32, out_events: &mut Vec<Event>) {
        self.day_number = day;
        out_events.push(self.event(EventKind::DayStarted { day }));
        out_events.push(self.event(EventKind::SnapshotRequested {
            snapshot: self.capture_snapshot(),
        }));
    }

    fn capture_snapshot(&self) -> RunSnapshot {
        RunSnapshot::new(
            self.run,
            self.seed,
            self.day_number,
            self.sim_now.saturating_sub(self.phase_elapsed),
            self.build_queue.clone(),
        )
    }

    fn reset_grid(&mut self) {
        let grid = self.config.grid();
        let columns = usize::try_from(grid.columns()).unwrap_or(0);
        let rows = usize::try_from(grid.rows()).unwrap_or(0);
        self.obstacles = vec![None; columns.saturating_mul(rows)];
        self.rebuild_navigation();
    }

    fn rebuild_navigation(&mut self) {
        let grid = self.config.grid();
        let objective = self.objective_cells();
        self.navigation
            .rebuild(grid.columns(), grid.rows(), &objective, &self.obstacles);
    }

    fn objective_cells(&self) -> Vec<CellCoord> {
        let grid = self.config.grid();
        let Some(row) = grid.rows().checked_sub(1) else {
            return Vec::new();
        };
        (0..grid.columns())
            .map(|column| CellCoord::new(column, row))
            .collect()
    }

    fn grid_index(&self, cell: CellCoord) -> Option<usize> {
        let grid = self.config.grid();
        if cell.column() >= grid.columns() || cell.row() >= grid.rows() {
            return None;
        }
        cell_index(grid.columns(), cell)
    }

    fn cell_is_free(&self, cell: CellCoord) -> bool {
        self.grid_index(cell)
            .is_some_and(|index| self.obstacles.get(index).copied().flatten().is_none())
    }

    fn region_in_bounds(&self, region: &CellRect) -> bool {
        let grid = self.config.grid();
        let column_end = region
            .origin()
            .column()
            .saturating_add(region.size().width());
        let row_end = region.origin().row().saturating_add(region.size().height());
        column_end <= grid.columns() && row_end <= grid.rows()
    }

    fn place_structure_now(
        &mut self,
        kind: StructureKind,
        origin: CellCoord,
    ) -> Result<(StructureId, CellRect), PlacementError> {
        let region = CellRect::from_origin_and_size(origin, footprint_for(kind));
        if !self.region_in_bounds(&region) {
            return Err(PlacementError::OutOfBounds);
        }
        if region.cells().any(|cell| !self.cell_is_free(cell)) {
            return Err(PlacementError::Occupied);
        }

        let structure = self.structures.insert(kind, region);
        for cell in region.cells() {
            if let Some(index) = self.grid_index(cell) {
                self.obstacles[index] = Some(Obstacle::Structure(structure));
            }
        }
        self.rebuild_navigation();
        Ok((structure, region))
    }

    fn advance_build_queue(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        if self.build_queue.is_empty() {
            return;
        }

        let advanced: Vec<QueuedBuild> = self
            .build_queue
            .drain(..)
            .map(|build| build.elapsed_by(dt))
            .collect();

        for build in advanced {
            if build.is_ready() {
                // Completion re-validates: a cell taken since queueing rejects
                // the build instead of overwriting the occupant.
                match self.place_structure_now(build.kind(), build.origin()) {
                    Ok((structure, region)) => {
                        out_events.push(self.event(EventKind::StructurePlaced {
                            structure,
                            kind: build.kind(),
                            region,
                        }));
                    }
                    Err(reason) => {
                        out_events.push(self.event(EventKind::StructurePlacementRejected {
                            kind: build.kind(),
                            origin: build.origin(),
                            reason,
                        }));
                    }
                }
            } else {
                self.build_queue.push(build);
            }
        }
    }

    fn grant_option(&mut self, option: RewardOption) {
        match option {
            RewardOption::Catalog { id, kind } => match kind {
                RewardKind::Gold { amount } => self.grant_gold(amount),
                RewardKind::Relic | RewardKind::Unit | RewardKind::TechPoints { .. } => {
                    let _ = self.reward_history.insert(id);
                }
            },
            RewardOption::Gold { amount } => self.grant_gold(amount),
        }
    }

    fn grant_gold(&mut self, amount: u32) {
        let scaled = u64::from(amount) * u64::from(self.config.difficulty().resource_mult())
            / u64::from(PER_MILLE_SCALE);
        self.gold = self
            .gold
            .saturating_add(u32::try_from(scaled).unwrap_or(u32::MAX));
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Every observable consequence is appended to `out_events`; identical command
/// streams against identical worlds produce identical event streams. While a
/// blocking save failure holds the run, only snapshot reports and the failure
/// acknowledgement are processed.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    if world.halted
        && !matches!(
            command,
            Command::ReportSnapshot { .. } | Command::AcknowledgeSaveFailure
        )
    {
        return;
    }

    match command {
        Command::Boot => {
            if world.phase != Phase::Boot {
                let _ = world.advance_phase(PhaseTrigger::BootCompleted, out_events);
            } else {
                if let Err(reason) = world.config.validate() {
                    world.config = SiegeConfig::default();
                    out_events.push(world.event(EventKind::ConfigFallback { reason }));
                }
                world.castle_hp = world.config.clock().castle_max_hp();
                world.gold = world.config.clock().starting_gold();
                world.reset_grid();
                if world.advance_phase(PhaseTrigger::BootCompleted, out_events) {
                    world.begin_day(1, out_events);
                }
            }
        }
        Command::Tick { dt } => {
            // Time advances only while a run is active.
            if world.phase == Phase::Boot || world.phase.is_terminal() {
                return;
            }

            world.tick_index = world.tick_index.saturating_add(1);
            world.sim_now = world.sim_now.saturating_add(dt);
            world.phase_elapsed = world.phase_elapsed.saturating_add(dt);

            if world.phase == Phase::Day {
                world.advance_build_queue(dt, out_events);
                if world.phase_elapsed >= world.config.clock().day_duration()
                    && world.advance_phase(PhaseTrigger::DayTimerElapsed, out_events)
                {
                    let day = world.day_number;
                    let flags = world.config.schedule().flags_for(day);
                    out_events.push(world.event(EventKind::NightStarted {
                        day,
                        night: day,
                        flags,
                    }));
                }
            }
        }
        Command::DamageCastle { amount } => {
            // Combat resolves only at night; stray damage has nothing to hit.
            if world.phase != Phase::Night || amount == 0 {
                return;
            }

            let previous = world.castle_hp;
            world.castle_hp = world.castle_hp.saturating_sub(amount);
            out_events.push(world.event(EventKind::CastleHpChanged {
                previous,
                current: world.castle_hp,
            }));

            if world.castle_hp == 0
                && world.advance_phase(PhaseTrigger::CastleDestroyed, out_events)
            {
                out_events.push(world.event(EventKind::RunEnded {
                    outcome: RunOutcome::Defeat,
                }));
            }
        }
        Command::ReportWave {
            lane,
            spawn_count,
            channel,
            channel_budget,
        } => {
            // Wave reports outside the night have nothing to echo.
            if world.phase == Phase::Night {
                out_events.push(world.event(EventKind::WaveSpawned {
                    lane,
                    spawn_count,
                    channel,
                    channel_budget,
                }));
            }
        }
        Command::ResolveNight => {
            if world.advance_phase(PhaseTrigger::NightResolved, out_events) {
                out_events.push(world.event(EventKind::SettlementStarted {
                    day: world.day_number,
                }));
            }
        }
        Command::OfferReward { offer } => {
            // The first offer presented for a night wins; repeats and offers
            // outside the settlement window are dropped.
            if world.phase == Phase::Settlement
                && world.pending_offer.is_none()
                && world.committed_night != Some(world.day_number)
            {
                world.pending_offer = Some(offer);
                out_events.push(world.event(EventKind::RewardOffered { offer }));
            }
        }
        Command::CommitReward { chosen_index } => {
            if world.committed_night == Some(world.day_number) {
                out_events.push(world.event(EventKind::RewardCommitRejected {
                    chosen_index,
                    reason: SelectionError::AlreadyCommitted,
                }));
            } else if world.pending_offer.is_none() {
                out_events.push(world.event(EventKind::RewardCommitRejected {
                    chosen_index,
                    reason: SelectionError::NoPendingOffer,
                }));
            } else {
                let option = world
                    .pending_offer
                    .as_ref()
                    .and_then(|offer| offer.option(chosen_index));
                match option {
                    None => {
                        out_events.push(world.event(EventKind::RewardCommitRejected {
                            chosen_index,
                            reason: SelectionError::IndexOutOfRange {
                                index: chosen_index,
                            },
                        }));
                    }
                    Some(option) => {
                        world.pending_offer = None;
                        world.grant_option(option);
                        world.committed_night = Some(world.day_number);
                        out_events.push(world.event(EventKind::RewardCommitted { option }));

                        if world.day_number >= world.config.clock().target_day() {
                            if world.advance_phase(PhaseTrigger::TargetDayReached, out_events) {
                                out_events.push(world.event(EventKind::RunEnded {
                                    outcome: RunOutcome::Victory,
                                }));
                            }
                        } else {
                            let next_day = world.day_number.saturating_add(1);
                            if world.advance_phase(PhaseTrigger::RewardCommitted, out_events) {
                                world.begin_day(next_day, out_events);
                            }
                        }
                    }
                }
            }
        }
        Command::PlaceStructure { kind, origin } => {
            if world.phase != Phase::Day {
                out_events.push(world.event(EventKind::StructurePlacementRejected {
                    kind,
                    origin,
                    reason: PlacementError::InvalidPhase,
                }));
            } else {
                match world.place_structure_now(kind, origin) {
                    Ok((structure, region)) => {
                        out_events.push(world.event(EventKind::StructurePlaced {
                            structure,
                            kind,
                            region,
                        }));
                    }
                    Err(reason) => {
                        out_events.push(world.event(EventKind::StructurePlacementRejected {
                            kind,
                            origin,
                            reason,
                        }));
                    }
                }
            }
        }
        Command::DestroyStructure { structure } => {
            if !matches!(world.phase, Phase::Day | Phase::Night) {
                out_events.push(world.event(EventKind::StructureRemovalRejected {
                    structure,
                    reason: RemovalError::InvalidPhase,
                }));
            } else {
                match world.structures.remove(structure) {
                    Some(state) => {
                        for cell in state.region.cells() {
                            if let Some(index) = world.grid_index(cell) {
                                world.obstacles[index] = None;
                            }
                        }
                        world.rebuild_navigation();
                        out_events.push(world.event(EventKind::StructureDestroyed {
                            structure,
                            region: state.region,
                        }));
                    }
                    None => {
                        out_events.push(world.event(EventKind::StructureRemovalRejected {
                            structure,
                            reason: RemovalError::MissingStructure,
                        }));
                    }
                }
            }
        }
        Command::QueueBuild {
            kind,
            origin,
            build_time,
        } => {
            if world.phase != Phase::Day {
                out_events.push(world.event(EventKind::StructurePlacementRejected {
                    kind,
                    origin,
                    reason: PlacementError::InvalidPhase,
                }));
            } else {
                let region = CellRect::from_origin_and_size(origin, footprint_for(kind));
                let reason = if !world.region_in_bounds(&region) {
                    Some(PlacementError::OutOfBounds)
                } else if region.cells().any(|cell| !world.cell_is_free(cell)) {
                    Some(PlacementError::Occupied)
                } else {
                    None
                };
                match reason {
                    Some(reason) => {
                        out_events.push(world.event(EventKind::StructurePlacementRejected {
                            kind,
                            origin,
                            reason,
                        }));
                    }
                    None => {
                        world
                            .build_queue
                            .push(QueuedBuild::new(kind, origin, build_time));
                        out_events.push(world.event(EventKind::BuildQueued {
                            kind,
                            origin,
                            ready_in: build_time,
                        }));
                    }
                }
            }
        }
        Command::ReportSnapshot { result } => match result {
            SnapshotWriteResult::Saved => {
                out_events.push(world.event(EventKind::SaveAutosaved {
                    day: world.day_number,
                }));
            }
            SnapshotWriteResult::Failed { context } => {
                let severity = match world.config.snapshot_policy() {
                    SnapshotPolicy::Tolerant => Severity::Recoverable,
                    SnapshotPolicy::Blocking => {
                        world.halted = true;
                        Severity::Critical
                    }
                };
                out_events.push(world.event(EventKind::SaveFailed { severity, context }));
            }
        },
        Command::AcknowledgeSaveFailure => {
            world.halted = false;
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use nighthold_core::{
        config::SiegeConfig, BlockView, CellCoord, LaneId, NavigationView, NightFlags,
        NightSeedContext, Phase, QueuedBuild, RewardHistoryView, RewardOffer, RunSnapshot,
        StructureSnapshot, StructureView,
    };

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Phase the run is currently resting in.
    #[must_use]
    pub fn phase(world: &World) -> Phase {
        world.phase
    }

    /// One-based day number, or zero before boot.
    #[must_use]
    pub fn day_number(world: &World) -> u32 {
        world.day_number
    }

    /// Current castle hit points.
    #[must_use]
    pub fn castle_hp(world: &World) -> u32 {
        world.castle_hp
    }

    /// Configured castle hit point ceiling.
    #[must_use]
    pub fn castle_max_hp(world: &World) -> u32 {
        world.config.clock().castle_max_hp()
    }

    /// Gold currently held by the run.
    #[must_use]
    pub fn gold(world: &World) -> u32 {
        world.gold
    }

    /// Reports whether a blocking save failure is holding the run.
    #[must_use]
    pub fn is_halted(world: &World) -> bool {
        world.halted
    }

    /// Number of ticks applied since boot.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Elite/boss markers the night schedule assigns to the current day.
    #[must_use]
    pub fn night_flags(world: &World) -> NightFlags {
        world.config.schedule().flags_for(world.day_number)
    }

    /// Seed material for the current day's deterministic night systems.
    #[must_use]
    pub fn night_seed_context(world: &World) -> NightSeedContext {
        NightSeedContext::new(world.seed, world.day_number)
    }

    /// Captures a read-only view of the placed structures.
    #[must_use]
    pub fn structure_view(world: &World) -> StructureView {
        let snapshots: Vec<StructureSnapshot> = world
            .structures
            .iter()
            .map(|state| StructureSnapshot {
                id: state.id,
                kind: state.kind,
                region: state.region,
            })
            .collect();
        StructureView::from_snapshots(snapshots)
    }

    /// Exposes a read-only view of the dense obstacle grid.
    #[must_use]
    pub fn block_view(world: &World) -> BlockView<'_> {
        let grid = world.config.grid();
        BlockView::new(&world.obstacles, grid.columns(), grid.rows())
    }

    /// Exposes a read-only view of the objective-distance field.
    #[must_use]
    pub fn navigation_view(world: &World) -> NavigationView<'_> {
        NavigationView::new(
            world.navigation.cells(),
            world.navigation.columns(),
            world.navigation.rows(),
        )
    }

    /// Enumerates the objective cells along the southern grid row.
    #[must_use]
    pub fn objective_cells(world: &World) -> Vec<CellCoord> {
        world.objective_cells()
    }

    /// Spawn cell assigned to each configured lane along the northern row.
    ///
    /// Lanes are spread evenly across the row in configuration order.
    #[must_use]
    pub fn lane_spawn_cells(world: &World) -> Vec<(LaneId, CellCoord)> {
        let grid = world.config.grid();
        let lanes = world.config.spawn().lane_weights();
        let count = u64::try_from(lanes.len()).unwrap_or(0);
        lanes
            .iter()
            .enumerate()
            .map(|(index, lane_weight)| {
                let step = u64::try_from(index).unwrap_or(0);
                let numerator = u64::from(grid.columns()) * (2 * step + 1);
                let column = u32::try_from(numerator / (2 * count).max(1)).unwrap_or(0);
                (lane_weight.lane(), CellCoord::new(column, 0))
            })
            .collect()
    }

    /// Reports whether every lane spawn cell currently reaches the objective.
    #[must_use]
    pub fn lanes_reach_objective(world: &World) -> bool {
        lane_spawn_cells(world).iter().all(|(_, cell)| {
            world
                .navigation
                .distance(*cell)
                .is_some_and(|distance| distance != u16::MAX)
        })
    }

    /// Non-gold rewards committed so far this run.
    #[must_use]
    pub fn reward_history_view(world: &World) -> RewardHistoryView<'_> {
        RewardHistoryView::new(&world.reward_history)
    }

    /// Offer awaiting a commit during settlement, if any.
    #[must_use]
    pub fn pending_offer(world: &World) -> Option<&RewardOffer> {
        world.pending_offer.as_ref()
    }

    /// Timed builds still counting down.
    #[must_use]
    pub fn build_queue(world: &World) -> &[QueuedBuild] {
        &world.build_queue
    }

    /// Validated configuration the run is playing under.
    #[must_use]
    pub fn config(world: &World) -> &SiegeConfig {
        &world.config
    }

    /// Captures a day-boundary checkpoint of the current state.
    #[must_use]
    pub fn snapshot(world: &World) -> RunSnapshot {
        world.capture_snapshot()
    }
}

fn cell_index(columns: u32, cell: CellCoord) -> Option<usize> {
    if cell.column() >= columns {
        return None;
    }
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    row.checked_mul(usize::try_from(columns).ok()?)?
        .checked_add(column)
}
