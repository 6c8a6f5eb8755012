//! Headless run loop that drives a whole siege from boot to a terminal phase.
//!
//! The driver owns the world plus one instance of every pure system and plays
//! the canonical exchange each night: budget, spawn plan, wave reports, castle
//! damage, resolution, reward settlement, snapshot persistence. Everything the
//! world reports is rendered into a transcript whose hash doubles as a replay
//! fingerprint, so two runs with the same seed and tuning must match line for
//! line.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use nighthold_core::{
    config::{ClockConfig, RewardKind, SiegeConfig},
    AgentActionState, AgentContext, AgentId, CellCoord, Channel, Command, Event, EventKind,
    LaneId, Phase, RewardOption, RunId, RunOutcome, SnapshotWriteResult, SpawnEntry,
    StructureKind, PER_MILLE_SCALE,
};
use nighthold_system_budget::BudgetScheduler;
use nighthold_system_retarget::{next_action_state, RetargetResolver};
use nighthold_system_reward::RewardDirector;
use nighthold_system_spawning::SpawnComposer;
use nighthold_world::{apply, query, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::snapshot_store::SnapshotStore;

/// Time advanced per daylight tick.
const DAY_STEP: Duration = Duration::from_secs(1);

/// Upper bound of the nightly damage roll; larger wave batches overwhelm it.
const ASSAULT_RESISTANCE: u32 = 64;

/// Spawn count per extra point of castle damage on a successful breach.
const ASSAULT_PRESSURE_DIVISOR: u32 = 24;

/// Knobs collected from the command line.
#[derive(Debug)]
pub(crate) struct DriverOptions {
    /// Seed the run clock and the combat stand-in both derive from.
    pub(crate) seed: u64,
    /// Overrides the configured target day when present.
    pub(crate) days: Option<u32>,
    /// Directory receiving day-boundary snapshots; `None` disables saving.
    pub(crate) save_dir: Option<PathBuf>,
    /// Suppresses per-event output.
    pub(crate) quiet: bool,
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RunReport {
    /// Terminal outcome, or `None` when the loop stopped short of one.
    pub(crate) outcome: Option<RunOutcome>,
    /// Day number the run ended on.
    pub(crate) days_survived: u32,
    /// Castle hit points at the end.
    pub(crate) castle_hp: u32,
    /// Gold held at the end.
    pub(crate) gold: u32,
    /// Number of transcript lines rendered.
    pub(crate) events_rendered: usize,
    /// Hash of the full transcript; equal seeds must produce equal values.
    pub(crate) fingerprint: u64,
}

/// Owns the world and the pure systems for one headless run.
#[derive(Debug)]
pub(crate) struct Driver {
    world: World,
    scheduler: BudgetScheduler,
    composer: SpawnComposer,
    resolver: RetargetResolver,
    director: RewardDirector,
    store: Option<SnapshotStore>,
    assault_rng: ChaCha8Rng,
    assault_clock: Duration,
    vanguard: BTreeMap<LaneId, AgentActionState>,
    quiet: bool,
    transcript: Vec<String>,
}

impl Driver {
    /// Assembles a driver from command-line options and loaded tuning.
    pub(crate) fn new(options: DriverOptions, config: SiegeConfig) -> Self {
        let config = match options.days {
            Some(days) => override_target_day(config, days),
            None => config,
        };
        let run = RunId::new(options.seed);
        let scheduler =
            BudgetScheduler::new(config.budget().clone(), config.difficulty().clone());
        let composer = SpawnComposer::new(config.spawn().clone(), config.archetypes().clone());
        let resolver = RetargetResolver::new(config.retarget().clone());
        let director = RewardDirector::new(config.rewards().clone());
        let store = options
            .save_dir
            .map(|save_dir| SnapshotStore::new(&save_dir, run));

        Self {
            world: World::new(run, options.seed, config),
            scheduler,
            composer,
            resolver,
            director,
            store,
            assault_rng: ChaCha8Rng::seed_from_u64(options.seed),
            assault_clock: Duration::ZERO,
            vanguard: BTreeMap::new(),
            quiet: options.quiet,
            transcript: Vec::new(),
        }
    }

    /// Plays the run to a terminal phase and reports the result.
    pub(crate) fn run(&mut self) -> Result<RunReport> {
        if !self.quiet {
            println!("{}", query::welcome_banner(&self.world));
        }
        self.dispatch(Command::Boot);
        self.bind_systems();

        loop {
            if query::is_halted(&self.world) {
                // Headless runs have no operator to confirm the failure, so
                // the driver acknowledges after rendering it.
                self.dispatch(Command::AcknowledgeSaveFailure);
            }
            match query::phase(&self.world) {
                Phase::Day => self.play_day(),
                Phase::Night => self.play_night()?,
                Phase::Settlement => self.settle(),
                Phase::Boot | Phase::Victory | Phase::Defeat => break,
            }
        }

        Ok(self.report())
    }

    /// Rebinds every system to the tuning the world actually accepted.
    ///
    /// Boot substitutes defaults for invalid tuning, and the systems must
    /// follow that substitution or their plans would disagree with the run.
    fn bind_systems(&mut self) {
        let config = query::config(&self.world).clone();
        self.scheduler =
            BudgetScheduler::new(config.budget().clone(), config.difficulty().clone());
        self.composer = SpawnComposer::new(config.spawn().clone(), config.archetypes().clone());
        self.resolver = RetargetResolver::new(config.retarget().clone());
        self.director = RewardDirector::new(config.rewards().clone());
    }

    /// Applies one command, renders its events, and executes snapshot writes.
    fn dispatch(&mut self, command: Command) {
        let mut events = Vec::new();
        apply(&mut self.world, command, &mut events);

        let mut followups = Vec::new();
        for event in &events {
            self.note(render_event_line(event));
            if let EventKind::SnapshotRequested { snapshot } = &event.kind {
                if let Some(store) = &self.store {
                    let result = match store.persist(snapshot) {
                        Ok(()) => SnapshotWriteResult::Saved,
                        Err(error) => SnapshotWriteResult::Failed {
                            context: format!("{error:#}"),
                        },
                    };
                    followups.push(Command::ReportSnapshot { result });
                }
            }
        }
        for followup in followups {
            self.dispatch(followup);
        }
    }

    fn note(&mut self, line: String) {
        if !self.quiet {
            println!("{line}");
        }
        self.transcript.push(line);
    }

    /// Ticks daylight forward until nightfall.
    fn play_day(&mut self) {
        while query::phase(&self.world) == Phase::Day && !query::is_halted(&self.world) {
            self.dispatch(Command::Tick { dt: DAY_STEP });
        }
    }

    /// Plays one night: budget, composition, cadence-aligned wave feeding,
    /// the castle-damage stand-in, and final resolution.
    fn play_night(&mut self) -> Result<()> {
        let day = query::day_number(&self.world);
        let flags = query::night_flags(&self.world);
        let context = query::night_seed_context(&self.world);
        let budget = self.scheduler.compute(day, flags)?;
        let plan = self.composer.compose(&budget, flags, context)?;

        self.vanguard.clear();
        self.note(format!(
            "night {} assault plan: {} spawns, lanes open: {}",
            plan.night_number(),
            plan.entries().len(),
            query::lanes_reach_objective(&self.world),
        ));

        let step = query::config(&self.world).spawn().cadence_step();
        let night_duration = query::config(&self.world).spawn().night_duration();
        let mut cursor = 0usize;
        let mut elapsed = Duration::ZERO;
        while elapsed < night_duration
            && query::phase(&self.world) == Phase::Night
            && !query::is_halted(&self.world)
        {
            let due = collect_due(plan.entries(), &mut cursor, elapsed);
            let mut threat = 0u32;
            for (lane, channel, spawn_count) in due {
                threat = threat.saturating_add(spawn_count);
                self.dispatch(Command::ReportWave {
                    lane,
                    spawn_count,
                    channel,
                    channel_budget: budget.channel_budget(channel),
                });
            }
            if threat > 0 {
                self.resolve_assault(threat);
            }
            self.dispatch(Command::Tick { dt: step });
            elapsed = elapsed.saturating_add(step);
            self.assault_clock = self.assault_clock.saturating_add(step);
        }

        if query::phase(&self.world) == Phase::Night {
            self.dispatch(Command::ResolveNight);
        }
        Ok(())
    }

    /// Stands in for the external combat collaborator.
    ///
    /// One vanguard agent per lane asks the resolver for orders; only lanes
    /// that can actually walk to the objective press the assault. The damage
    /// roll is the sole consumer of the driver's RNG, so replays stay aligned
    /// command for command.
    fn resolve_assault(&mut self, threat: u32) {
        let now = self.assault_clock;
        self.resolver.begin_tick(now);
        let mut breached = false;
        for (lane, cell) in query::lane_spawn_cells(&self.world) {
            let previous = self
                .vanguard
                .get(&lane)
                .copied()
                .unwrap_or(AgentActionState::Reevaluate);
            let agent = AgentContext {
                id: AgentId::new(lane.get()),
                cell,
                state: previous,
            };
            let order = self.resolver.resolve(
                &agent,
                query::block_view(&self.world),
                query::navigation_view(&self.world),
                now,
            );
            let state = next_action_state(previous, &order);
            let _ = self.vanguard.insert(lane, state);
            if state == AgentActionState::Navigating {
                breached = true;
            }
        }
        if !breached {
            // Walled-out waves grind on structures instead of the castle.
            return;
        }

        let roll = self.assault_rng.gen_range(0..ASSAULT_RESISTANCE);
        if roll < threat {
            let amount = scale_per_mille(
                1 + threat / ASSAULT_PRESSURE_DIVISOR,
                query::config(&self.world).difficulty().enemy_dmg_mult(),
            );
            if amount > 0 {
                self.dispatch(Command::DamageCastle { amount });
            }
        }
    }

    /// Settles the night: builds the offer and banks the first option.
    fn settle(&mut self) {
        let flags = query::night_flags(&self.world);
        let context = query::night_seed_context(&self.world);
        let offer = self.director.build_selection(
            query::reward_history_view(&self.world),
            flags,
            context,
        );
        self.dispatch(Command::OfferReward { offer });
        // The runner always banks the first option; choosing belongs to a
        // real host surface.
        self.dispatch(Command::CommitReward { chosen_index: 0 });
    }

    fn report(&self) -> RunReport {
        let outcome = match query::phase(&self.world) {
            Phase::Victory => Some(RunOutcome::Victory),
            Phase::Defeat => Some(RunOutcome::Defeat),
            Phase::Boot | Phase::Day | Phase::Night | Phase::Settlement => None,
        };
        let mut hasher = DefaultHasher::new();
        self.transcript.hash(&mut hasher);
        RunReport {
            outcome,
            days_survived: query::day_number(&self.world),
            castle_hp: query::castle_hp(&self.world),
            gold: query::gold(&self.world),
            events_rendered: self.transcript.len(),
            fingerprint: hasher.finish(),
        }
    }

    #[cfg(test)]
    fn transcript(&self) -> &[String] {
        &self.transcript
    }
}

/// Replaces the configured target day, keeping every other clock field.
fn override_target_day(config: SiegeConfig, days: u32) -> SiegeConfig {
    let clock = ClockConfig::new(
        config.clock().day_duration(),
        days,
        config.clock().castle_max_hp(),
        config.clock().starting_gold(),
    );
    SiegeConfig::new(
        config.difficulty().clone(),
        config.budget().clone(),
        config.spawn().clone(),
        config.schedule().clone(),
        config.archetypes().clone(),
        config.rewards().clone(),
        clock,
        config.retarget().clone(),
        config.snapshot_policy(),
        config.grid().clone(),
    )
}

/// Pops every plan entry due at `elapsed` and folds consecutive entries that
/// share a lane and channel into one wave batch.
fn collect_due(
    entries: &[SpawnEntry],
    cursor: &mut usize,
    elapsed: Duration,
) -> Vec<(LaneId, Channel, u32)> {
    let mut batches: Vec<(LaneId, Channel, u32)> = Vec::new();
    while let Some(entry) = entries.get(*cursor) {
        if entry.tick_offset() > elapsed {
            break;
        }
        match batches.last_mut() {
            Some((lane, channel, count))
                if *lane == entry.lane() && *channel == entry.channel() =>
            {
                *count += 1;
            }
            _ => batches.push((entry.lane(), entry.channel(), 1)),
        }
        *cursor += 1;
    }
    batches
}

fn scale_per_mille(value: u32, multiplier_per_mille: u32) -> u32 {
    let scaled = u64::from(value) * u64::from(multiplier_per_mille) / u64::from(PER_MILLE_SCALE);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Renders one event as a timestamped transcript line.
fn render_event_line(event: &Event) -> String {
    let at = event.at.as_secs_f64();
    let detail = match &event.kind {
        EventKind::DayStarted { day } => format!("day {day} begins"),
        EventKind::NightStarted { day, night, flags } => format!(
            "night {night} falls on day {day} (elite: {}, boss: {})",
            flags.elite(),
            flags.boss(),
        ),
        EventKind::SettlementStarted { day } => {
            format!("settlement opens after night {day}")
        }
        EventKind::WaveSpawned {
            lane,
            spawn_count,
            channel,
            channel_budget,
        } => format!(
            "wave of {spawn_count} {} enemies on lane {} (channel budget {channel_budget})",
            channel.label(),
            lane.get(),
        ),
        EventKind::CastleHpChanged { previous, current } => {
            format!("castle hp {previous} -> {current}")
        }
        EventKind::RewardOffered { offer } => format!(
            "reward offer for night {} ({:?}): {}",
            offer.night_number(),
            offer.pool_state(),
            render_options(offer.options()),
        ),
        EventKind::RewardCommitted { option } => {
            format!("reward committed: {}", render_option(option))
        }
        EventKind::RewardCommitRejected {
            chosen_index,
            reason,
        } => format!(
            "reward commit for option {chosen_index} rejected: {}",
            reason.code(),
        ),
        EventKind::StructurePlaced {
            structure,
            kind,
            region,
        } => format!(
            "{} {} placed at {}",
            structure_label(*kind),
            structure.get(),
            render_cell(region.origin()),
        ),
        EventKind::StructureDestroyed { structure, region } => format!(
            "structure {} destroyed at {}",
            structure.get(),
            render_cell(region.origin()),
        ),
        EventKind::StructurePlacementRejected {
            kind,
            origin,
            reason,
        } => format!(
            "{} placement at {} rejected: {}",
            structure_label(*kind),
            render_cell(*origin),
            reason.code(),
        ),
        EventKind::StructureRemovalRejected { structure, reason } => format!(
            "removal of structure {} rejected: {}",
            structure.get(),
            reason.code(),
        ),
        EventKind::BuildQueued {
            kind,
            origin,
            ready_in,
        } => format!(
            "{} queued at {} (ready in {:.1}s)",
            structure_label(*kind),
            render_cell(*origin),
            ready_in.as_secs_f64(),
        ),
        EventKind::SnapshotRequested { snapshot } => format!(
            "snapshot requested for day {} (seed {:#x})",
            snapshot.day_number(),
            snapshot.seed(),
        ),
        EventKind::SaveAutosaved { day } => format!("snapshot for day {day} saved"),
        EventKind::SaveFailed { severity, context } => {
            format!("snapshot save failed ({severity:?}): {context}")
        }
        EventKind::TransitionRejected {
            phase,
            trigger,
            reason,
        } => format!(
            "transition {trigger:?} out of {phase:?} rejected: {}",
            reason.code(),
        ),
        EventKind::ConfigFallback { reason } => format!(
            "configuration rejected ({}), defaults substituted",
            reason.code(),
        ),
        EventKind::RunEnded { outcome } => match outcome {
            RunOutcome::Victory => "the castle stands; the run is won".to_string(),
            RunOutcome::Defeat => "the castle has fallen; the run is lost".to_string(),
        },
    };
    format!("[{at:>7.1}s] {detail}")
}

fn render_options(options: &[RewardOption; 3]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(index, option)| format!("[{index}] {}", render_option(option)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_option(option: &RewardOption) -> String {
    match option {
        RewardOption::Catalog { id, kind } => {
            format!("catalog #{} ({})", id.get(), reward_kind_label(*kind))
        }
        RewardOption::Gold { amount } => format!("{amount} gold"),
    }
}

fn reward_kind_label(kind: RewardKind) -> String {
    match kind {
        RewardKind::Relic => "relic".to_string(),
        RewardKind::Unit => "unit".to_string(),
        RewardKind::TechPoints { amount } => format!("{amount} tech points"),
        RewardKind::Gold { amount } => format!("{amount} gold"),
    }
}

const fn structure_label(kind: StructureKind) -> &'static str {
    match kind {
        StructureKind::Wall => "wall",
        StructureKind::Tower => "tower",
    }
}

fn render_cell(cell: CellCoord) -> String {
    format!("({}, {})", cell.column(), cell.row())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nighthold_core::config::{
        ArchetypeTable, BudgetConfig, BudgetTable, DifficultyConfig, GridConfig, LaneWeight,
        NightSchedule, RetargetConfig, RewardCatalog, SnapshotPolicy, SpawnConfig,
    };
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_path() -> PathBuf {
        static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);
        let index = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("nighthold-driver-{}-{index}", std::process::id()))
    }

    /// Tuning with three-second days and twenty-second nights so whole runs
    /// finish in a few dozen dispatches.
    fn fast_config(castle_hp: u32, base_budget: u32, policy: SnapshotPolicy) -> SiegeConfig {
        SiegeConfig::new(
            DifficultyConfig::default(),
            BudgetConfig::new(
                base_budget,
                1_000,
                BudgetTable::from_breakpoints(Vec::new()),
                BudgetTable::from_breakpoints(Vec::new()),
            ),
            SpawnConfig::new(
                Duration::from_secs(5),
                Duration::from_secs(20),
                vec![
                    LaneWeight::new(LaneId::new(0), 1),
                    LaneWeight::new(LaneId::new(1), 1),
                ],
            ),
            NightSchedule::default(),
            ArchetypeTable::default(),
            RewardCatalog::default(),
            ClockConfig::new(Duration::from_secs(3), 30, castle_hp, 50),
            RetargetConfig::default(),
            policy,
            GridConfig::new(8, 6),
        )
    }

    fn drive(
        seed: u64,
        days: u32,
        save_dir: Option<PathBuf>,
        config: SiegeConfig,
    ) -> (RunReport, Vec<String>) {
        let mut driver = Driver::new(
            DriverOptions {
                seed,
                days: Some(days),
                save_dir,
                quiet: true,
            },
            config,
        );
        let report = driver.run().expect("run completes");
        (report, driver.transcript().to_vec())
    }

    #[test]
    fn identical_seeds_replay_identically() {
        let (first, first_lines) =
            drive(9, 3, None, fast_config(40, 6, SnapshotPolicy::Tolerant));
        let (second, second_lines) =
            drive(9, 3, None, fast_config(40, 6, SnapshotPolicy::Tolerant));

        assert_eq!(first, second);
        assert_eq!(first_lines, second_lines);
        assert_eq!(first.outcome, Some(RunOutcome::Victory));
        assert_eq!(first.days_survived, 3);
    }

    #[test]
    fn run_seeds_steer_the_transcript() {
        let (first, _) = drive(1, 3, None, fast_config(40, 6, SnapshotPolicy::Tolerant));
        let (second, _) = drive(2, 3, None, fast_config(40, 6, SnapshotPolicy::Tolerant));

        assert_ne!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn an_overwhelming_assault_defeats_the_run() {
        // Four cadence ticks split a 400-point budget, so the first wave batch
        // carries 100 spawns and the damage roll in 0..64 can never miss.
        let (report, lines) =
            drive(3, 10, None, fast_config(1, 400, SnapshotPolicy::Tolerant));

        assert_eq!(report.outcome, Some(RunOutcome::Defeat));
        assert_eq!(report.days_survived, 1);
        assert_eq!(report.castle_hp, 0);
        assert!(lines.iter().any(|line| line.contains("castle has fallen")));
    }

    #[test]
    fn a_starved_budget_survives_to_the_target_day() {
        let (report, lines) =
            drive(7, 2, None, fast_config(40, 0, SnapshotPolicy::Tolerant));

        assert_eq!(report.outcome, Some(RunOutcome::Victory));
        assert_eq!(report.days_survived, 2);
        assert_eq!(report.castle_hp, 40);
        assert!(lines.iter().any(|line| line.contains("castle stands")));
    }

    #[test]
    fn snapshots_land_at_every_day_boundary() {
        let save_dir = scratch_path();

        let (report, lines) = drive(
            5,
            2,
            Some(save_dir.clone()),
            fast_config(40, 0, SnapshotPolicy::Tolerant),
        );

        assert_eq!(report.outcome, Some(RunOutcome::Victory));
        assert!(lines.iter().any(|line| line.contains("snapshot for day 1 saved")));
        assert!(lines.iter().any(|line| line.contains("snapshot for day 2 saved")));

        let store = SnapshotStore::new(&save_dir, RunId::new(5));
        let loaded = store.load().expect("snapshot loads");
        assert_eq!(loaded.day_number(), 2);

        let _ = fs::remove_dir_all(&save_dir);
    }

    #[test]
    fn a_failing_save_directory_does_not_stop_a_tolerant_run() {
        // A plain file where the save directory should be makes every
        // persist attempt fail.
        let decoy = scratch_path();
        fs::write(&decoy, b"not a directory").expect("write decoy");

        let (report, lines) = drive(
            11,
            2,
            Some(decoy.clone()),
            fast_config(40, 0, SnapshotPolicy::Tolerant),
        );

        assert_eq!(report.outcome, Some(RunOutcome::Victory));
        assert!(lines
            .iter()
            .any(|line| line.contains("snapshot save failed (Recoverable)")));

        let _ = fs::remove_file(&decoy);
    }

    #[test]
    fn a_blocking_save_failure_is_acknowledged_and_resumed() {
        let decoy = scratch_path();
        fs::write(&decoy, b"not a directory").expect("write decoy");

        let (report, lines) = drive(
            13,
            2,
            Some(decoy.clone()),
            fast_config(40, 0, SnapshotPolicy::Blocking),
        );

        assert_eq!(report.outcome, Some(RunOutcome::Victory));
        assert!(lines
            .iter()
            .any(|line| line.contains("snapshot save failed (Critical)")));

        let _ = fs::remove_file(&decoy);
    }

    #[test]
    fn wave_batches_fold_consecutive_entries_by_lane_and_channel() {
        let entries = vec![
            SpawnEntry::new(Duration::ZERO, LaneId::new(0), archetype(1), Channel::Normal),
            SpawnEntry::new(Duration::ZERO, LaneId::new(0), archetype(2), Channel::Normal),
            SpawnEntry::new(Duration::ZERO, LaneId::new(1), archetype(1), Channel::Normal),
            SpawnEntry::new(Duration::from_secs(5), LaneId::new(0), archetype(1), Channel::Elite),
        ];
        let mut cursor = 0;

        let first = collect_due(&entries, &mut cursor, Duration::ZERO);
        assert_eq!(
            first,
            vec![
                (LaneId::new(0), Channel::Normal, 2),
                (LaneId::new(1), Channel::Normal, 1),
            ]
        );

        let second = collect_due(&entries, &mut cursor, Duration::from_secs(5));
        assert_eq!(second, vec![(LaneId::new(0), Channel::Elite, 1)]);
        assert_eq!(cursor, entries.len());
    }

    fn archetype(id: u32) -> nighthold_core::ArchetypeId {
        nighthold_core::ArchetypeId::new(id)
    }
}
