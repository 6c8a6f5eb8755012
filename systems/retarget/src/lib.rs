#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-agent pathing fallback for enemies whose objective route is walled off.
//!
//! The resolver answers one question each tick for each blocked agent: keep
//! walking, wait, or start hitting something. Agents with a live navigation
//! distance follow the gradient toward the objective. Agents without one are
//! throttled by a per-agent cooldown and a per-tick computation cap before a
//! bounded breadth-first search picks the nearest blocking structure by path
//! cost. An agent is never left without orders: when no structure is in reach
//! the objective itself becomes the target.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use nighthold_core::{
    config::RetargetConfig, AgentActionState, AgentContext, AgentId, AttackTarget, BlockView,
    CellCoord, EnemyCommand, NavigationView, Obstacle, StructureId,
};

/// Resolver that turns blocked-path queries into deterministic enemy commands.
#[derive(Debug)]
pub struct RetargetResolver {
    config: RetargetConfig,
    last_retarget: BTreeMap<AgentId, Duration>,
    structures_changed_at: Option<Duration>,
    retargets_this_tick: u32,
    search_visited: Vec<bool>,
    search_queue: VecDeque<(CellCoord, u32)>,
}

impl RetargetResolver {
    /// Creates a resolver with an empty cooldown ledger.
    #[must_use]
    pub fn new(config: RetargetConfig) -> Self {
        Self {
            config,
            last_retarget: BTreeMap::new(),
            structures_changed_at: None,
            retargets_this_tick: 0,
            search_visited: Vec::new(),
            search_queue: VecDeque::new(),
        }
    }

    /// Opens a new tick: resets the per-tick computation cap and drops ledger
    /// entries whose cooldown has fully lapsed.
    pub fn begin_tick(&mut self, now: Duration) {
        self.retargets_this_tick = 0;
        let cooldown = self.config.cooldown();
        self.last_retarget
            .retain(|_, last| now.saturating_sub(*last) < cooldown);
    }

    /// Records that a structure was placed or destroyed at `now`.
    ///
    /// Agents that resolved before this instant may re-resolve once the
    /// cooldown floor has passed instead of waiting out the full cooldown.
    pub fn note_structures_changed(&mut self, now: Duration) {
        self.structures_changed_at = Some(now);
    }

    /// Reports whether the agent is allowed to run a retarget computation.
    ///
    /// Denied while the per-tick cap is exhausted or the agent's cooldown is
    /// still running; a structural change shortens the wait to the cooldown
    /// floor but never below it.
    #[must_use]
    pub fn can_retarget(&self, agent: AgentId, now: Duration) -> bool {
        if self.retargets_this_tick >= self.config.max_retargets_per_tick() {
            return false;
        }

        let Some(last) = self.last_retarget.get(&agent).copied() else {
            return true;
        };
        let elapsed = now.saturating_sub(last);
        if elapsed >= self.config.cooldown() {
            return true;
        }

        let changed_since = self
            .structures_changed_at
            .is_some_and(|changed| changed > last);
        changed_since && elapsed >= self.config.cooldown_floor()
    }

    /// Resolves one agent's command for the current tick.
    ///
    /// A reachable agent always navigates. An unreachable agent holds while
    /// throttled, otherwise attacks the nearest blocking structure by path
    /// cost with ties broken toward the lowest structure identifier, and
    /// falls back to attacking the objective when no structure is in search
    /// range. `Hold` never consumes the cooldown, so a throttled agent's next
    /// eligible instant stays fixed.
    pub fn resolve(
        &mut self,
        agent: &AgentContext,
        blocks: BlockView<'_>,
        navigation: NavigationView<'_>,
        now: Duration,
    ) -> EnemyCommand {
        if navigation.is_reachable(agent.cell) {
            return EnemyCommand::Navigate {
                path: trace_path(agent.cell, &navigation),
            };
        }

        if !self.can_retarget(agent.id, now) {
            return EnemyCommand::Hold;
        }

        self.retargets_this_tick += 1;
        let _ = self.last_retarget.insert(agent.id, now);

        let target = match self.nearest_blocking_structure(agent.cell, blocks) {
            Some(structure) => AttackTarget::Structure(structure),
            None => AttackTarget::Objective,
        };
        EnemyCommand::Attack { target }
    }

    /// Breadth-first search over free cells, capped at `search_radius` steps,
    /// returning the blocking structure with the lowest path cost.
    fn nearest_blocking_structure(
        &mut self,
        origin: CellCoord,
        blocks: BlockView<'_>,
    ) -> Option<StructureId> {
        let (columns, rows) = blocks.dimensions();
        let cell_count = usize::try_from(columns).ok()? * usize::try_from(rows).ok()?;
        self.search_visited.clear();
        self.search_visited.resize(cell_count, false);
        self.search_queue.clear();

        let origin_index = grid_index(columns, rows, origin)?;
        self.search_visited[origin_index] = true;
        self.search_queue.push_back((origin, 0));

        let radius = self.config.search_radius();
        let mut best: Option<BlockerCandidate> = None;

        while let Some((cell, depth)) = self.search_queue.pop_front() {
            let cost = depth + 1;
            if cost > radius {
                continue;
            }

            for neighbor in cardinal_neighbors(cell, columns, rows) {
                match blocks.obstacle(neighbor) {
                    Some(Obstacle::Structure(structure)) => {
                        let candidate = BlockerCandidate {
                            path_cost: cost,
                            structure,
                        };
                        match &mut best {
                            Some(existing) => {
                                if candidate.precedes(existing) {
                                    *existing = candidate;
                                }
                            }
                            None => best = Some(candidate),
                        }
                    }
                    Some(Obstacle::Terrain) => {}
                    None => {
                        let Some(index) = grid_index(columns, rows, neighbor) else {
                            continue;
                        };
                        if !self.search_visited[index] {
                            self.search_visited[index] = true;
                            self.search_queue.push_back((neighbor, cost));
                        }
                    }
                }
            }
        }

        best.map(|candidate| candidate.structure)
    }
}

/// Maps a resolved command onto the agent action state machine.
///
/// `Hold` keeps an attack in progress alive and otherwise parks the agent as
/// blocked; a fresh command always wins over the previous state.
#[must_use]
pub fn next_action_state(current: AgentActionState, command: &EnemyCommand) -> AgentActionState {
    match command {
        EnemyCommand::Navigate { .. } => AgentActionState::Navigating,
        EnemyCommand::Attack { .. } => AgentActionState::AttackingBlocker,
        EnemyCommand::Hold => {
            if current == AgentActionState::AttackingBlocker {
                AgentActionState::AttackingBlocker
            } else {
                AgentActionState::Blocked
            }
        }
    }
}

/// Walks the navigation gradient from `start` down to the zero-distance sink.
///
/// The returned cells begin adjacent to `start` and end on the objective; an
/// agent already standing on the objective receives an empty path. Each step
/// strictly decreases the recorded distance, so the walk always terminates.
fn trace_path(start: CellCoord, navigation: &NavigationView<'_>) -> Vec<CellCoord> {
    let (columns, rows) = navigation.dimensions();
    let mut path = Vec::new();
    let mut cell = start;
    let mut current = match finite_distance(navigation, cell) {
        Some(distance) => distance,
        None => return path,
    };

    while current > 0 {
        let mut best: Option<StepCandidate> = None;
        for neighbor in cardinal_neighbors(cell, columns, rows) {
            let Some(distance) = finite_distance(navigation, neighbor) else {
                continue;
            };
            if distance >= current {
                continue;
            }
            let candidate = StepCandidate {
                distance,
                cell: neighbor,
            };
            best = Some(match best {
                None => candidate,
                Some(existing) => {
                    if candidate.precedes(existing) {
                        candidate
                    } else {
                        existing
                    }
                }
            });
        }

        let Some(step) = best else {
            break;
        };
        path.push(step.cell);
        cell = step.cell;
        current = step.distance;
    }

    path
}

fn finite_distance(navigation: &NavigationView<'_>, cell: CellCoord) -> Option<u16> {
    navigation
        .distance(cell)
        .filter(|&distance| distance != NavigationView::UNREACHABLE)
}

fn grid_index(columns: u32, rows: u32, cell: CellCoord) -> Option<usize> {
    if cell.column() >= columns || cell.row() >= rows {
        return None;
    }
    let row = usize::try_from(cell.row()).ok()?;
    let column = usize::try_from(cell.column()).ok()?;
    let width = usize::try_from(columns).ok()?;
    Some(row * width + column)
}

fn cardinal_neighbors(cell: CellCoord, columns: u32, rows: u32) -> impl Iterator<Item = CellCoord> {
    let mut buffer = [None; 4];
    if cell.row() > 0 {
        buffer[0] = Some(CellCoord::new(cell.column(), cell.row() - 1));
    }
    if cell.column() + 1 < columns {
        buffer[1] = Some(CellCoord::new(cell.column() + 1, cell.row()));
    }
    if cell.row() + 1 < rows {
        buffer[2] = Some(CellCoord::new(cell.column(), cell.row() + 1));
    }
    if cell.column() > 0 {
        buffer[3] = Some(CellCoord::new(cell.column() - 1, cell.row()));
    }
    buffer.into_iter().flatten()
}

#[derive(Clone, Copy, Debug)]
struct BlockerCandidate {
    path_cost: u32,
    structure: StructureId,
}

impl BlockerCandidate {
    fn precedes(&self, other: &Self) -> bool {
        if self.path_cost != other.path_cost {
            return self.path_cost < other.path_cost;
        }
        self.structure < other.structure
    }
}

#[derive(Clone, Copy, Debug)]
struct StepCandidate {
    distance: u16,
    cell: CellCoord,
}

impl StepCandidate {
    fn precedes(self, other: Self) -> bool {
        let rank = (self.distance, self.cell.column(), self.cell.row());
        let other_rank = (other.distance, other.cell.column(), other.cell.row());
        rank < other_rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: u32 = 5;
    const ROWS: u32 = 3;

    fn config() -> RetargetConfig {
        RetargetConfig::new(
            Duration::from_secs(2),
            Duration::from_millis(500),
            8,
            24,
        )
    }

    fn agent(id: u32, cell: CellCoord) -> AgentContext {
        AgentContext {
            id: AgentId::new(id),
            cell,
            state: AgentActionState::Blocked,
        }
    }

    fn unreachable_field() -> Vec<u16> {
        vec![NavigationView::UNREACHABLE; (COLUMNS * ROWS) as usize]
    }

    fn open_cells() -> Vec<Option<Obstacle>> {
        vec![None; (COLUMNS * ROWS) as usize]
    }

    fn place(cells: &mut [Option<Obstacle>], cell: CellCoord, obstacle: Obstacle) {
        let index = (cell.row() * COLUMNS + cell.column()) as usize;
        cells[index] = Some(obstacle);
    }

    #[test]
    fn reachable_agent_navigates_down_the_gradient() {
        let mut resolver = RetargetResolver::new(config());
        let cells = open_cells();
        // Row-major distances converging on the sink at (2, 2).
        let distances: Vec<u16> = vec![4, 3, 2, 3, 4, 3, 2, 1, 2, 3, 2, 1, 0, 1, 2];

        let command = resolver.resolve(
            &agent(1, CellCoord::new(2, 0)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        assert_eq!(
            command,
            EnemyCommand::Navigate {
                path: vec![CellCoord::new(2, 1), CellCoord::new(2, 2)],
            }
        );
    }

    #[test]
    fn agent_on_the_objective_receives_an_empty_path() {
        let mut resolver = RetargetResolver::new(config());
        let cells = open_cells();
        let mut distances = unreachable_field();
        distances[(2 * COLUMNS + 2) as usize] = 0;

        let command = resolver.resolve(
            &agent(1, CellCoord::new(2, 2)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        assert_eq!(command, EnemyCommand::Navigate { path: Vec::new() });
    }

    #[test]
    fn blocked_agent_attacks_the_nearest_structure_by_path_cost() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(2, 1),
            Obstacle::Structure(StructureId::new(7)),
        );
        place(
            &mut cells,
            CellCoord::new(4, 1),
            Obstacle::Structure(StructureId::new(3)),
        );
        let distances = unreachable_field();

        let command = resolver.resolve(
            &agent(1, CellCoord::new(0, 1)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        // The lower id sits farther away by walked cells, so path cost wins.
        assert_eq!(
            command,
            EnemyCommand::Attack {
                target: AttackTarget::Structure(StructureId::new(7)),
            }
        );
    }

    #[test]
    fn path_cost_outranks_straight_line_proximity() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(&mut cells, CellCoord::new(0, 1), Obstacle::Terrain);
        place(&mut cells, CellCoord::new(1, 1), Obstacle::Terrain);
        place(
            &mut cells,
            CellCoord::new(0, 2),
            Obstacle::Structure(StructureId::new(1)),
        );
        place(
            &mut cells,
            CellCoord::new(3, 0),
            Obstacle::Structure(StructureId::new(9)),
        );
        let distances = unreachable_field();

        let command = resolver.resolve(
            &agent(1, CellCoord::new(0, 0)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        // Two cells of terrain force a six-step walk to the structure two
        // cells away, so the one three cells away wins on path cost.
        assert_eq!(
            command,
            EnemyCommand::Attack {
                target: AttackTarget::Structure(StructureId::new(9)),
            }
        );
    }

    #[test]
    fn equidistant_blockers_break_ties_toward_the_lowest_identifier() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(0, 1),
            Obstacle::Structure(StructureId::new(9)),
        );
        place(
            &mut cells,
            CellCoord::new(2, 1),
            Obstacle::Structure(StructureId::new(4)),
        );
        let distances = unreachable_field();

        let command = resolver.resolve(
            &agent(1, CellCoord::new(1, 1)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        assert_eq!(
            command,
            EnemyCommand::Attack {
                target: AttackTarget::Structure(StructureId::new(4)),
            }
        );
    }

    #[test]
    fn terrain_only_blockage_falls_back_to_the_objective() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(&mut cells, CellCoord::new(0, 0), Obstacle::Terrain);
        place(&mut cells, CellCoord::new(1, 1), Obstacle::Terrain);
        place(&mut cells, CellCoord::new(0, 2), Obstacle::Terrain);
        let distances = unreachable_field();

        let command = resolver.resolve(
            &agent(1, CellCoord::new(0, 1)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        assert_eq!(
            command,
            EnemyCommand::Attack {
                target: AttackTarget::Objective,
            }
        );
    }

    #[test]
    fn cooldown_holds_and_releases_without_moving_the_window() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(1, 1),
            Obstacle::Structure(StructureId::new(5)),
        );
        let distances = unreachable_field();
        let subject = agent(1, CellCoord::new(0, 1));

        resolver.begin_tick(Duration::ZERO);
        let first = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );
        assert!(matches!(first, EnemyCommand::Attack { .. }));

        resolver.begin_tick(Duration::from_secs(1));
        let second = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::from_secs(1),
        );
        assert_eq!(second, EnemyCommand::Hold);

        // The hold above must not have restarted the cooldown.
        resolver.begin_tick(Duration::from_secs(2));
        let third = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::from_secs(2),
        );
        assert!(matches!(third, EnemyCommand::Attack { .. }));
    }

    #[test]
    fn structural_change_reopens_resolution_after_the_floor() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(1, 1),
            Obstacle::Structure(StructureId::new(5)),
        );
        let distances = unreachable_field();
        let subject = agent(1, CellCoord::new(0, 1));

        resolver.begin_tick(Duration::ZERO);
        let first = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );
        assert!(matches!(first, EnemyCommand::Attack { .. }));

        resolver.note_structures_changed(Duration::from_millis(300));

        // Inside the floor the change is not yet actionable.
        resolver.begin_tick(Duration::from_millis(400));
        let early = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::from_millis(400),
        );
        assert_eq!(early, EnemyCommand::Hold);

        resolver.begin_tick(Duration::from_millis(700));
        let reopened = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::from_millis(700),
        );
        assert!(matches!(reopened, EnemyCommand::Attack { .. }));
    }

    #[test]
    fn unchanged_structures_never_shortcut_the_cooldown() {
        let mut resolver = RetargetResolver::new(config());
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(1, 1),
            Obstacle::Structure(StructureId::new(5)),
        );
        let distances = unreachable_field();
        let subject = agent(1, CellCoord::new(0, 1));

        resolver.begin_tick(Duration::ZERO);
        let _ = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        resolver.begin_tick(Duration::from_millis(700));
        let command = resolver.resolve(
            &subject,
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::from_millis(700),
        );

        assert_eq!(command, EnemyCommand::Hold);
    }

    #[test]
    fn per_tick_cap_defers_the_overflowing_agent() {
        let capped = RetargetConfig::new(
            Duration::from_secs(2),
            Duration::from_millis(500),
            2,
            24,
        );
        let mut resolver = RetargetResolver::new(capped);
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(2, 1),
            Obstacle::Structure(StructureId::new(5)),
        );
        let distances = unreachable_field();

        resolver.begin_tick(Duration::ZERO);
        for id in 1..=2 {
            let command = resolver.resolve(
                &agent(id, CellCoord::new(0, 1)),
                BlockView::new(&cells, COLUMNS, ROWS),
                NavigationView::new(&distances, COLUMNS, ROWS),
                Duration::ZERO,
            );
            assert!(matches!(command, EnemyCommand::Attack { .. }));
        }
        let overflow = resolver.resolve(
            &agent(3, CellCoord::new(0, 1)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );
        assert_eq!(overflow, EnemyCommand::Hold);

        resolver.begin_tick(Duration::from_millis(100));
        let next_tick = resolver.resolve(
            &agent(3, CellCoord::new(0, 1)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::from_millis(100),
        );
        assert!(matches!(next_tick, EnemyCommand::Attack { .. }));
    }

    #[test]
    fn search_radius_caps_the_candidate_hunt() {
        let narrow = RetargetConfig::new(
            Duration::from_secs(2),
            Duration::from_millis(500),
            8,
            2,
        );
        let mut resolver = RetargetResolver::new(narrow);
        let mut cells = open_cells();
        place(
            &mut cells,
            CellCoord::new(3, 0),
            Obstacle::Structure(StructureId::new(5)),
        );
        let distances = unreachable_field();

        let command = resolver.resolve(
            &agent(1, CellCoord::new(0, 0)),
            BlockView::new(&cells, COLUMNS, ROWS),
            NavigationView::new(&distances, COLUMNS, ROWS),
            Duration::ZERO,
        );

        // Path cost three exceeds the two-cell radius, so the structure is
        // invisible to the search.
        assert_eq!(
            command,
            EnemyCommand::Attack {
                target: AttackTarget::Objective,
            }
        );
    }

    #[test]
    fn action_states_follow_the_resolved_command() {
        let navigate = EnemyCommand::Navigate { path: Vec::new() };
        let attack = EnemyCommand::Attack {
            target: AttackTarget::Objective,
        };

        assert_eq!(
            next_action_state(AgentActionState::Blocked, &navigate),
            AgentActionState::Navigating
        );
        assert_eq!(
            next_action_state(AgentActionState::Reevaluate, &attack),
            AgentActionState::AttackingBlocker
        );
        assert_eq!(
            next_action_state(AgentActionState::AttackingBlocker, &EnemyCommand::Hold),
            AgentActionState::AttackingBlocker
        );
        assert_eq!(
            next_action_state(AgentActionState::Navigating, &EnemyCommand::Hold),
            AgentActionState::Blocked
        );
        assert_eq!(
            next_action_state(AgentActionState::Reevaluate, &EnemyCommand::Hold),
            AgentActionState::Blocked
        );
    }
}
