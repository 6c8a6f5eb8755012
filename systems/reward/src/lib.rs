#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Settlement reward offers built from the run's catalog and history.
//!
//! After every night the director assembles exactly three options. While the
//! catalog still holds at least three eligible entries for the night's pool
//! the offer is drawn from the catalog in a seeded order; the moment
//! eligibility drops below three the offer collapses to three identical gold
//! grants. There is no intermediate state and no partial mixing, and gold
//! grants repeat freely because they never enter the reward history.

use nighthold_core::{
    config::{RewardCatalog, RewardDefinition},
    NightFlags, NightSeedContext, PoolState, RewardHistoryView, RewardOffer, RewardOption,
    RNG_STREAM_REWARD,
};
use sha2::{Digest, Sha256};

/// Pure system that assembles settlement reward offers.
#[derive(Debug)]
pub struct RewardDirector {
    catalog: RewardCatalog,
}

impl RewardDirector {
    /// Creates a director over the supplied reward catalog.
    #[must_use]
    pub fn new(catalog: RewardCatalog) -> Self {
        Self { catalog }
    }

    /// Builds the offer for the night described by `context`.
    ///
    /// Never fails: catalog exhaustion degrades to the gold fallback rather
    /// than erroring. The same history, flags, and seed context always yield
    /// the same offer.
    #[must_use]
    pub fn build_selection(
        &self,
        history: RewardHistoryView<'_>,
        flags: NightFlags,
        context: NightSeedContext,
    ) -> RewardOffer {
        let day_number = context.day_number();
        let mut eligible: Vec<RewardOption> = self
            .eligible(history, flags)
            .map(|definition| RewardOption::Catalog {
                id: definition.id(),
                kind: definition.kind(),
            })
            .collect();

        if eligible.len() < 3 {
            let gold = RewardOption::Gold {
                amount: self.catalog.gold_fallback_amount(),
            };
            return RewardOffer::new(
                day_number,
                day_number,
                PoolState::GoldFallback,
                [gold, gold, gold],
            );
        }

        let mut rng = SplitMix64::new(derive_selection_seed(context));
        shuffle(&mut eligible, &mut rng);
        RewardOffer::new(
            day_number,
            day_number,
            PoolState::CatalogAvailable,
            [eligible[0], eligible[1], eligible[2]],
        )
    }

    /// Classifies the catalog's availability for the night's pool.
    ///
    /// Offers themselves never carry [`PoolState::Exhausted`]; the state is
    /// still distinguishable here so adapters can report a fully spent
    /// catalog separately from one that merely dipped below three entries.
    #[must_use]
    pub fn catalog_state(&self, history: RewardHistoryView<'_>, flags: NightFlags) -> PoolState {
        match self.eligible(history, flags).count() {
            0 => PoolState::Exhausted,
            1 | 2 => PoolState::GoldFallback,
            _ => PoolState::CatalogAvailable,
        }
    }

    /// Catalog entries still offerable for the night, in ascending id order.
    fn eligible<'a>(
        &'a self,
        history: RewardHistoryView<'a>,
        flags: NightFlags,
    ) -> impl Iterator<Item = &'a RewardDefinition> {
        let dominant = flags.dominant_channel();
        self.catalog.definitions().iter().filter(move |definition| {
            !definition.kind().is_gold()
                && definition.pools().contains(dominant)
                && !history.contains(definition.id())
        })
    }
}

/// In-place Fisher-Yates driven by the selection stream.
fn shuffle(options: &mut [RewardOption], rng: &mut SplitMix64) {
    for index in (1..options.len()).rev() {
        let swap = sample_uniform_inclusive(rng, 0, index as u32);
        options.swap(index, swap as usize);
    }
}

fn derive_selection_seed(context: NightSeedContext) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(context.run_seed().to_le_bytes());
    hasher.update(context.day_number().to_le_bytes());
    derive_labeled_seed(finalize_seed(hasher), RNG_STREAM_REWARD)
}

fn derive_labeled_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

fn sample_uniform_inclusive(rng: &mut SplitMix64, min: u32, max: u32) -> u32 {
    if min == max {
        return min;
    }

    let range = u64::from(max.saturating_sub(min)) + 1;
    let value = rng.next_u64();
    let offset = value % range;
    min.saturating_add(offset as u32)
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
