use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use nighthold_core::{
    config::{
        ArchetypeDefinition, ArchetypeTable, BudgetBreakpoint, BudgetConfig, BudgetTable,
        ChannelSet, ClockConfig, DifficultyConfig, GridConfig, LaneWeight, NightSchedule,
        NightWeights, RetargetConfig, RewardCatalog, RewardDefinition, RewardKind, SiegeConfig,
        SnapshotPolicy, SpawnConfig,
    },
    ArchetypeId, Channel, LaneId, RewardId,
};

const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Loads a run configuration from the TOML file at the provided path.
///
/// Absent sections and fields inherit the built-in defaults. Shape problems
/// (unreadable file, malformed TOML, unknown names) are reported here; value
/// problems are left for the world to reject at boot.
pub(crate) fn load_config(path: &Path) -> Result<SiegeConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<SiegeConfig> {
    let raw: RawConfig =
        toml::from_str(contents).context("failed to parse config toml contents")?;
    if raw.version != SUPPORTED_CONFIG_VERSION {
        bail!(
            "unsupported config version {}; expected {SUPPORTED_CONFIG_VERSION}",
            raw.version
        );
    }
    raw.build()
}

#[derive(Debug, serde::Deserialize)]
struct RawConfig {
    version: u32,
    #[serde(default)]
    difficulty: RawDifficulty,
    #[serde(default)]
    budget: RawBudget,
    #[serde(default)]
    spawn: RawSpawn,
    #[serde(default)]
    schedule: RawSchedule,
    #[serde(default)]
    archetype: Vec<RawArchetype>,
    #[serde(default)]
    rewards: Option<RawRewards>,
    #[serde(default)]
    clock: RawClock,
    #[serde(default)]
    retarget: RawRetarget,
    #[serde(default)]
    snapshot: Option<RawSnapshot>,
    #[serde(default)]
    grid: RawGrid,
}

impl RawConfig {
    fn build(self) -> Result<SiegeConfig> {
        let defaults = SiegeConfig::default();
        let archetypes = if self.archetype.is_empty() {
            defaults.archetypes().clone()
        } else {
            build_archetypes(self.archetype)?
        };
        let rewards = match self.rewards {
            Some(raw) => raw.build(defaults.rewards())?,
            None => defaults.rewards().clone(),
        };
        let snapshot_policy = match &self.snapshot {
            Some(raw) => parse_policy(&raw.policy)?,
            None => SnapshotPolicy::default(),
        };

        Ok(SiegeConfig::new(
            self.difficulty.merge(defaults.difficulty()),
            self.budget.merge(defaults.budget()),
            self.spawn.merge(defaults.spawn()),
            self.schedule.merge(defaults.schedule()),
            archetypes,
            rewards,
            self.clock.merge(defaults.clock()),
            self.retarget.merge(defaults.retarget()),
            snapshot_policy,
            self.grid.merge(defaults.grid()),
        ))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawDifficulty {
    enemy_hp_mult: Option<u32>,
    enemy_dmg_mult: Option<u32>,
    budget_mult_normal: Option<u32>,
    budget_mult_elite: Option<u32>,
    budget_mult_boss: Option<u32>,
    resource_mult: Option<u32>,
}

impl RawDifficulty {
    fn merge(&self, base: &DifficultyConfig) -> DifficultyConfig {
        DifficultyConfig::new(
            self.enemy_hp_mult.unwrap_or(base.enemy_hp_mult()),
            self.enemy_dmg_mult.unwrap_or(base.enemy_dmg_mult()),
            self.budget_mult_normal.unwrap_or(base.budget_mult_normal()),
            self.budget_mult_elite.unwrap_or(base.budget_mult_elite()),
            self.budget_mult_boss.unwrap_or(base.budget_mult_boss()),
            self.resource_mult.unwrap_or(base.resource_mult()),
        )
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawBudget {
    base_budget_day1: Option<u32>,
    growth_per_mille: Option<u32>,
    elite_table: Option<Vec<(u32, u32)>>,
    boss_table: Option<Vec<(u32, u32)>>,
}

impl RawBudget {
    fn merge(&self, base: &BudgetConfig) -> BudgetConfig {
        BudgetConfig::new(
            self.base_budget_day1.unwrap_or(base.base_budget_day1()),
            self.growth_per_mille.unwrap_or(base.growth_per_mille()),
            self.elite_table
                .as_deref()
                .map_or_else(|| base.elite_table().clone(), table_from_pairs),
            self.boss_table
                .as_deref()
                .map_or_else(|| base.boss_table().clone(), table_from_pairs),
        )
    }
}

fn table_from_pairs(pairs: &[(u32, u32)]) -> BudgetTable {
    BudgetTable::from_breakpoints(
        pairs
            .iter()
            .map(|&(day, value)| BudgetBreakpoint::new(day, value))
            .collect(),
    )
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawSpawn {
    cadence_step_secs: Option<u64>,
    night_duration_secs: Option<u64>,
    lanes: Option<Vec<(u32, u32)>>,
}

impl RawSpawn {
    fn merge(&self, base: &SpawnConfig) -> SpawnConfig {
        let lane_weights = match &self.lanes {
            Some(lanes) => lanes
                .iter()
                .map(|&(lane, weight)| LaneWeight::new(LaneId::new(lane), weight))
                .collect(),
            None => base.lane_weights().to_vec(),
        };
        SpawnConfig::new(
            self.cadence_step_secs
                .map_or(base.cadence_step(), Duration::from_secs),
            self.night_duration_secs
                .map_or(base.night_duration(), Duration::from_secs),
            lane_weights,
        )
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawSchedule {
    elite_every: Option<u32>,
    boss_every: Option<u32>,
}

impl RawSchedule {
    fn merge(&self, base: &NightSchedule) -> NightSchedule {
        NightSchedule::new(
            self.elite_every.unwrap_or(base.elite_every()),
            self.boss_every.unwrap_or(base.boss_every()),
        )
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawArchetype {
    id: u32,
    name: String,
    spawn_weight: u32,
    channels: Vec<String>,
    calm_weight: u32,
    elite_weight: u32,
    boss_weight: u32,
}

fn build_archetypes(raw: Vec<RawArchetype>) -> Result<ArchetypeTable> {
    let mut definitions = Vec::with_capacity(raw.len());
    for entry in raw {
        let channels = parse_channel_set(&entry.channels)
            .with_context(|| format!("invalid channels for archetype `{}`", entry.name))?;
        definitions.push(ArchetypeDefinition::new(
            ArchetypeId::new(entry.id),
            entry.name,
            entry.spawn_weight,
            channels,
            NightWeights::new(entry.calm_weight, entry.elite_weight, entry.boss_weight),
        ));
    }
    Ok(ArchetypeTable::from_definitions(definitions))
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawRewards {
    gold_fallback_amount: Option<u32>,
    #[serde(default)]
    entry: Vec<RawReward>,
}

#[derive(Debug, serde::Deserialize)]
struct RawReward {
    id: u32,
    name: String,
    kind: String,
    amount: Option<u32>,
    pools: Vec<String>,
}

impl RawRewards {
    fn build(self, base: &RewardCatalog) -> Result<RewardCatalog> {
        let fallback = self
            .gold_fallback_amount
            .unwrap_or(base.gold_fallback_amount());
        if self.entry.is_empty() {
            return Ok(RewardCatalog::from_definitions(
                base.definitions().to_vec(),
                fallback,
            ));
        }

        let mut definitions = Vec::with_capacity(self.entry.len());
        for entry in self.entry {
            let kind = parse_reward_kind(&entry.kind, entry.amount)
                .with_context(|| format!("invalid kind for reward `{}`", entry.name))?;
            let pools = parse_channel_set(&entry.pools)
                .with_context(|| format!("invalid pools for reward `{}`", entry.name))?;
            definitions.push(RewardDefinition::new(
                RewardId::new(entry.id),
                entry.name,
                kind,
                pools,
            ));
        }
        Ok(RewardCatalog::from_definitions(definitions, fallback))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawClock {
    day_duration_secs: Option<u64>,
    target_day: Option<u32>,
    castle_max_hp: Option<u32>,
    starting_gold: Option<u32>,
}

impl RawClock {
    fn merge(&self, base: &ClockConfig) -> ClockConfig {
        ClockConfig::new(
            self.day_duration_secs
                .map_or(base.day_duration(), Duration::from_secs),
            self.target_day.unwrap_or(base.target_day()),
            self.castle_max_hp.unwrap_or(base.castle_max_hp()),
            self.starting_gold.unwrap_or(base.starting_gold()),
        )
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawRetarget {
    cooldown_millis: Option<u64>,
    cooldown_floor_millis: Option<u64>,
    max_retargets_per_tick: Option<u32>,
    search_radius: Option<u32>,
}

impl RawRetarget {
    fn merge(&self, base: &RetargetConfig) -> RetargetConfig {
        RetargetConfig::new(
            self.cooldown_millis
                .map_or(base.cooldown(), Duration::from_millis),
            self.cooldown_floor_millis
                .map_or(base.cooldown_floor(), Duration::from_millis),
            self.max_retargets_per_tick
                .unwrap_or(base.max_retargets_per_tick()),
            self.search_radius.unwrap_or(base.search_radius()),
        )
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawSnapshot {
    policy: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawGrid {
    columns: Option<u32>,
    rows: Option<u32>,
}

impl RawGrid {
    fn merge(&self, base: &GridConfig) -> GridConfig {
        GridConfig::new(
            self.columns.unwrap_or(base.columns()),
            self.rows.unwrap_or(base.rows()),
        )
    }
}

fn parse_channel(name: &str) -> Result<Channel> {
    match name {
        "normal" => Ok(Channel::Normal),
        "elite" => Ok(Channel::Elite),
        "boss" => Ok(Channel::Boss),
        _ => bail!("unknown channel `{name}`"),
    }
}

fn parse_channel_set(names: &[String]) -> Result<ChannelSet> {
    let mut normal = false;
    let mut elite = false;
    let mut boss = false;
    for name in names {
        match parse_channel(name)? {
            Channel::Normal => normal = true,
            Channel::Elite => elite = true,
            Channel::Boss => boss = true,
        }
    }
    Ok(ChannelSet::new(normal, elite, boss))
}

fn parse_reward_kind(kind: &str, amount: Option<u32>) -> Result<RewardKind> {
    match kind {
        "relic" => Ok(RewardKind::Relic),
        "unit" => Ok(RewardKind::Unit),
        "tech_points" => {
            let amount = amount.context("tech_points rewards require an `amount` field")?;
            Ok(RewardKind::TechPoints { amount })
        }
        "gold" => {
            let amount = amount.context("gold rewards require an `amount` field")?;
            Ok(RewardKind::Gold { amount })
        }
        _ => bail!("unknown reward kind `{kind}`"),
    }
}

fn parse_policy(name: &str) -> Result<SnapshotPolicy> {
    match name {
        "tolerant" => Ok(SnapshotPolicy::Tolerant),
        "blocking" => Ok(SnapshotPolicy::Blocking),
        _ => bail!("unknown snapshot policy `{name}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_version_only_config_matches_the_defaults() {
        let parsed = parse_config("version = 1").expect("config should parse");
        assert_eq!(parsed, SiegeConfig::default());
    }

    #[test]
    fn sections_override_only_their_own_fields() {
        let contents = r#"
            version = 1

            [clock]
            day_duration_secs = 45
            castle_max_hp = 250

            [grid]
            columns = 10
        "#;

        let parsed = parse_config(contents).expect("config should parse");
        assert_eq!(parsed.clock().day_duration(), Duration::from_secs(45));
        assert_eq!(parsed.clock().castle_max_hp(), 250);
        assert_eq!(parsed.clock().target_day(), 30);
        assert_eq!(parsed.grid().columns(), 10);
        assert_eq!(parsed.grid().rows(), 28);
    }

    #[test]
    fn budget_tables_parse_from_day_value_pairs() {
        let contents = r#"
            version = 1

            [budget]
            elite_table = [[2, 5], [7, 11]]
        "#;

        let parsed = parse_config(contents).expect("config should parse");
        let table = parsed.budget().elite_table();
        assert_eq!(table.value_for(1), 0);
        assert_eq!(table.value_for(2), 5);
        assert_eq!(table.value_for(9), 11);
        assert_eq!(parsed.budget().base_budget_day1(), 50);
    }

    #[test]
    fn archetype_entries_replace_the_default_table() {
        let contents = r#"
            version = 1

            [[archetype]]
            id = 3
            name = "Bone Colossus"
            spawn_weight = 400
            channels = ["elite", "boss"]
            calm_weight = 0
            elite_weight = 1200
            boss_weight = 1500
        "#;

        let parsed = parse_config(contents).expect("config should parse");
        let definitions = parsed.archetypes().definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name(), "Bone Colossus");
        assert!(!definitions[0].channels().contains(Channel::Normal));
        assert!(definitions[0].channels().contains(Channel::Boss));
    }

    #[test]
    fn reward_entries_parse_each_kind() {
        let contents = r#"
            version = 1

            [rewards]
            gold_fallback_amount = 75

            [[rewards.entry]]
            id = 0
            name = "Warding Sigil"
            kind = "relic"
            pools = ["normal", "elite", "boss"]

            [[rewards.entry]]
            id = 1
            name = "Ember Cache"
            kind = "gold"
            amount = 120
            pools = ["normal"]
        "#;

        let parsed = parse_config(contents).expect("config should parse");
        let catalog = parsed.rewards();
        assert_eq!(catalog.gold_fallback_amount(), 75);
        assert_eq!(catalog.definitions().len(), 2);
        assert_eq!(
            catalog.definitions()[1].kind(),
            RewardKind::Gold { amount: 120 }
        );
    }

    #[test]
    fn the_snapshot_policy_parses_by_name() {
        let contents = r#"
            version = 1

            [snapshot]
            policy = "blocking"
        "#;

        let parsed = parse_config(contents).expect("config should parse");
        assert_eq!(parsed.snapshot_policy(), SnapshotPolicy::Blocking);
    }

    #[test]
    fn unknown_channel_names_are_rejected() {
        let contents = r#"
            version = 1

            [[archetype]]
            id = 0
            name = "Gnawer"
            spawn_weight = 1000
            channels = ["nocturnal"]
            calm_weight = 1000
            elite_weight = 1000
            boss_weight = 1000
        "#;

        assert!(parse_config(contents).is_err());
    }

    #[test]
    fn tech_points_rewards_require_an_amount() {
        let contents = r#"
            version = 1

            [[rewards.entry]]
            id = 0
            name = "Arcane Scholars"
            kind = "tech_points"
            pools = ["normal"]
        "#;

        assert!(parse_config(contents).is_err());
    }

    #[test]
    fn a_version_mismatch_is_rejected() {
        assert!(parse_config("version = 2").is_err());
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(parse_config("version = [oops").is_err());
    }
}
