use crate::game::activity::ActivityId;
use crate::game::catalog::{Catalog, push_weighted};
use chrono::NaiveTime;
use log::{debug, warn};
use rand::{Rng, RngExt};
use rustc_hash::FxHashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// No catalog item accepts this player count (or all of them are resolved).
    NoEligibleActivities { player_count: u8 },
    /// The catalog holds nothing but the target, so no decoy can be drawn.
    CatalogExhausted { requested: usize, produced: usize },
}

impl std::fmt::Display for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEligibleActivities { player_count } => {
                write!(f, "no eligible activity for {player_count} player(s)")
            }
            Self::CatalogExhausted {
                requested,
                produced,
            } => write!(
                f,
                "catalog ran out of distinct activities ({produced} of {requested} decoys)"
            ),
        }
    }
}

impl std::error::Error for SelectError {}

/// Exclusion sets that decide which activities may be picked as a target.
#[derive(Debug, Default, Clone)]
pub struct SelectionPools {
    resolved: FxHashSet<ActivityId>,
    declined: FxHashSet<ActivityId>,
}

impl SelectionPools {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn is_resolved(&self, id: ActivityId) -> bool {
        self.resolved.contains(&id)
    }

    #[inline(always)]
    pub fn is_declined(&self, id: ActivityId) -> bool {
        self.declined.contains(&id)
    }

    pub fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    #[cfg(test)]
    pub fn declined_len(&self) -> usize {
        self.declined.len()
    }

    /// The activity was played: never offer it again, and forgive every decline.
    pub fn on_accepted(&mut self, id: ActivityId) {
        self.resolved.insert(id);
        self.declined.clear();
    }

    /// Keep the activity out of target selection until the next acceptance.
    pub fn on_declined(&mut self, id: ActivityId) {
        self.declined.insert(id);
    }
}

/// Weighted candidate list for one spin. Each activity appears once per
/// point of weight, so uniform draws over `entries` are weight-biased.
#[derive(Debug, Clone)]
pub struct EligiblePool {
    pub player_count: u8,
    pub entries: Vec<ActivityId>,
}

impl EligiblePool {
    #[cfg(test)]
    pub fn contains(&self, id: ActivityId) -> bool {
        self.entries.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered reel contents for one populate call.
#[derive(Debug, Clone)]
pub struct ReelPlan {
    pub items: Vec<ActivityId>,
    pub target_index: Option<usize>,
}

impl ReelPlan {
    pub fn target(&self) -> Option<ActivityId> {
        self.target_index.and_then(|i| self.items.get(i).copied())
    }
}

pub struct ActivitySelector {
    catalog: Arc<Catalog>,
}

impl ActivitySelector {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    #[inline(always)]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Activities that accept `player_count`, are open at `now` and have not
    /// been resolved. Declined activities stay in: they can still be decoys.
    pub fn eligible_pool(
        &self,
        player_count: u8,
        pools: &SelectionPools,
        now: NaiveTime,
    ) -> EligiblePool {
        let mut entries = Vec::new();
        for (id, activity) in self.catalog.iter() {
            if !activity.players.allows(player_count)
                || !activity.availability.is_open(now)
                || pools.is_resolved(id)
            {
                continue;
            }
            push_weighted(&mut entries, id, activity.weight);
        }
        EligiblePool {
            player_count,
            entries,
        }
    }

    /// Uniform draw over the pool's entries, skipping declined activities.
    /// The winner is removed from `pool` so it can't also show up as a decoy.
    pub fn select_target<R: Rng + ?Sized>(
        &self,
        pool: &mut EligiblePool,
        pools: &SelectionPools,
        rng: &mut R,
    ) -> Result<ActivityId, SelectError> {
        if pool.is_empty() {
            return Err(SelectError::NoEligibleActivities {
                player_count: pool.player_count,
            });
        }

        let mut candidates: Vec<ActivityId> = pool
            .entries
            .iter()
            .copied()
            .filter(|&id| !pools.is_declined(id))
            .collect();
        if candidates.is_empty() {
            warn!(
                "Every eligible activity for {} player(s) was declined; allowing repeats.",
                pool.player_count
            );
            candidates = pool.entries.clone();
        }

        let id = candidates[rng.random_range(0..candidates.len())];
        pool.entries.retain(|&x| x != id);
        Ok(id)
    }

    /// Draws `count` decoys from `working`, never repeating anything in
    /// `on_wheel`. An exhausted `working` pool is refilled from the whole
    /// catalog with exclusions ignored. Once every catalog item is on the
    /// wheel, decoys repeat, but `never` (the target) is still kept off.
    pub fn fill_decoys<R: Rng + ?Sized>(
        &self,
        count: usize,
        working: &mut Vec<ActivityId>,
        on_wheel: &mut FxHashSet<ActivityId>,
        never: Option<ActivityId>,
        rng: &mut R,
    ) -> Result<Vec<ActivityId>, SelectError> {
        let mut out = Vec::with_capacity(count);
        working.retain(|id| !on_wheel.contains(id));

        while out.len() < count {
            if working.is_empty() {
                self.refill(working, on_wheel, never, out.len(), count);
                if working.is_empty() {
                    return Err(SelectError::CatalogExhausted {
                        requested: count,
                        produced: out.len(),
                    });
                }
            }

            let id = working[rng.random_range(0..working.len())];
            working.retain(|&x| x != id);
            on_wheel.insert(id);
            out.push(id);
        }

        Ok(out)
    }

    fn refill(
        &self,
        working: &mut Vec<ActivityId>,
        on_wheel: &FxHashSet<ActivityId>,
        never: Option<ActivityId>,
        produced: usize,
        count: usize,
    ) {
        let entries = self.catalog.weighted_entries();
        working.extend(entries.iter().copied().filter(|id| !on_wheel.contains(id)));
        if !working.is_empty() {
            warn!("Decoy pool exhausted after {produced} of {count}; refilled from full catalog.");
            return;
        }
        working.extend(entries.into_iter().filter(|&id| Some(id) != never));
        if !working.is_empty() {
            debug!("Catalog has fewer items than the reel; repeating decoys after {produced} of {count}.");
        }
    }

    /// Target plus decoys for a reel of `reel_size` slots, with the target
    /// placed at `target_index`.
    pub fn plan_spin<R: Rng + ?Sized>(
        &self,
        player_count: u8,
        pools: &SelectionPools,
        now: NaiveTime,
        reel_size: usize,
        target_index: usize,
        rng: &mut R,
    ) -> Result<ReelPlan, SelectError> {
        debug_assert!(target_index < reel_size);
        let mut pool = self.eligible_pool(player_count, pools, now);
        let target = self.select_target(&mut pool, pools, rng)?;

        let mut on_wheel = FxHashSet::default();
        on_wheel.insert(target);
        let decoys = self.fill_decoys(
            reel_size.saturating_sub(1),
            &mut pool.entries,
            &mut on_wheel,
            Some(target),
            rng,
        )?;

        let mut items = decoys;
        items.insert(target_index.min(items.len()), target);
        Ok(ReelPlan {
            target_index: Some(target_index.min(items.len() - 1)),
            items,
        })
    }

    /// Decoys only, used to dress the reel before the first spin.
    pub fn plan_idle<R: Rng + ?Sized>(
        &self,
        player_count: u8,
        pools: &SelectionPools,
        now: NaiveTime,
        reel_size: usize,
        rng: &mut R,
    ) -> Result<ReelPlan, SelectError> {
        let mut pool = self.eligible_pool(player_count, pools, now);
        let mut on_wheel = FxHashSet::default();
        let items = self.fill_decoys(reel_size, &mut pool.entries, &mut on_wheel, None, rng)?;
        Ok(ReelPlan {
            items,
            target_index: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{ActivitySelector, SelectError, SelectionPools};
    use crate::game::activity::{Activity, ActivityId, PlayerCountRule};
    use crate::game::catalog::Catalog;
    use chrono::NaiveTime;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rustc_hash::FxHashSet;
    use std::sync::Arc;

    pub(crate) fn activity(name: &str, players: PlayerCountRule, weight: u32) -> Activity {
        Activity {
            name: name.to_string(),
            description: format!("{name} body"),
            tags: Default::default(),
            players,
            weight,
            availability: Default::default(),
            qr_link: None,
        }
    }

    pub(crate) fn open_catalog(names: &[&str]) -> Arc<Catalog> {
        Arc::new(Catalog::new(
            names
                .iter()
                .map(|n| activity(n, PlayerCountRule::default(), 1))
                .collect(),
        ))
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).expect("valid time")
    }

    #[test]
    fn eligible_pool_filters_players_and_resolved() {
        let catalog = Arc::new(Catalog::new(vec![
            activity("Pairs", PlayerCountRule { exact: Some(2), ..Default::default() }, 1),
            activity("Crowd", PlayerCountRule { min: Some(4), ..Default::default() }, 3),
            activity("Anyone", PlayerCountRule::default(), 2),
        ]));
        let selector = ActivitySelector::new(catalog);
        let mut pools = SelectionPools::new();

        let pool = selector.eligible_pool(4, &pools, noon());
        assert_eq!(pool.entries.len(), 5, "Crowd x3 + Anyone x2");
        assert!(!pool.contains(ActivityId(0)));

        pools.on_accepted(ActivityId(1));
        let pool = selector.eligible_pool(4, &pools, noon());
        assert_eq!(pool.entries, vec![ActivityId(2), ActivityId(2)]);
    }

    #[test]
    fn select_target_never_returns_resolved_or_declined() {
        let selector = ActivitySelector::new(open_catalog(&["A", "B", "C", "D"]));
        let mut pools = SelectionPools::new();
        pools.on_accepted(ActivityId(0));
        pools.on_declined(ActivityId(1));
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let mut pool = selector.eligible_pool(3, &pools, noon());
            let id = selector
                .select_target(&mut pool, &pools, &mut rng)
                .expect("pool is non-empty");
            assert!(id == ActivityId(2) || id == ActivityId(3), "picked {id:?}");
            assert!(!pool.contains(id), "target must leave the working pool");
        }
    }

    #[test]
    fn select_target_on_empty_pool_is_an_error() {
        let catalog = Arc::new(Catalog::new(vec![activity(
            "Trio",
            PlayerCountRule { exact: Some(3), ..Default::default() },
            1,
        )]));
        let selector = ActivitySelector::new(catalog);
        let pools = SelectionPools::new();
        let mut pool = selector.eligible_pool(5, &pools, noon());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            selector.select_target(&mut pool, &pools, &mut rng),
            Err(SelectError::NoEligibleActivities { player_count: 5 })
        );
    }

    #[test]
    fn accepting_clears_declined_and_excludes_forever() {
        let selector = ActivitySelector::new(open_catalog(&["A", "B", "C"]));
        let mut pools = SelectionPools::new();
        pools.on_declined(ActivityId(0));
        pools.on_declined(ActivityId(1));
        assert_eq!(pools.declined_len(), 2);

        pools.on_accepted(ActivityId(2));
        assert_eq!(pools.declined_len(), 0);
        for players in 1..=10 {
            let pool = selector.eligible_pool(players, &pools, noon());
            assert!(!pool.contains(ActivityId(2)));
        }
    }

    #[test]
    fn fill_decoys_refills_and_stays_unique() {
        let names: Vec<String> = (0..20).map(|i| format!("Item {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let selector = ActivitySelector::new(open_catalog(&refs));
        let mut rng = StdRng::seed_from_u64(99);

        let mut working = vec![ActivityId(0), ActivityId(1), ActivityId(1), ActivityId(2)];
        let mut on_wheel = FxHashSet::default();
        on_wheel.insert(ActivityId(2));

        let decoys = selector
            .fill_decoys(15, &mut working, &mut on_wheel, Some(ActivityId(2)), &mut rng)
            .expect("catalog has enough items");
        assert_eq!(decoys.len(), 15);
        let unique: FxHashSet<ActivityId> = decoys.iter().copied().collect();
        assert_eq!(unique.len(), 15, "decoys must be mutually unique");
        assert!(!unique.contains(&ActivityId(2)), "decoys must skip items already on the wheel");
        assert!(unique.contains(&ActivityId(0)) && unique.contains(&ActivityId(1)));
    }

    #[test]
    fn small_catalog_repeats_decoys_but_never_the_target() {
        let selector = ActivitySelector::new(open_catalog(&["A", "B", "C", "D", "E"]));
        let pools = SelectionPools::new();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..50 {
            let plan = selector
                .plan_spin(2, &pools, noon(), 16, 8, &mut rng)
                .expect("five items are enough to fill the reel");
            assert_eq!(plan.items.len(), 16);
            let target = plan.target().expect("spin plans carry a target");
            assert_eq!(plan.items.iter().filter(|&&id| id == target).count(), 1);
            let unique: FxHashSet<ActivityId> = plan.items.iter().copied().collect();
            assert_eq!(unique.len(), 5, "every catalog item shows up before any repeats");
        }

        let idle = selector
            .plan_idle(2, &pools, noon(), 16, &mut rng)
            .expect("idle reel fills from repeats");
        assert_eq!(idle.items.len(), 16);
    }

    #[test]
    fn fill_decoys_fails_when_only_the_target_exists() {
        let selector = ActivitySelector::new(open_catalog(&["Only"]));
        let mut rng = StdRng::seed_from_u64(3);
        let mut working = Vec::new();
        let mut on_wheel = FxHashSet::default();
        on_wheel.insert(ActivityId(0));
        assert_eq!(
            selector.fill_decoys(5, &mut working, &mut on_wheel, Some(ActivityId(0)), &mut rng),
            Err(SelectError::CatalogExhausted { requested: 5, produced: 0 })
        );
    }

    #[test]
    fn declined_item_can_return_as_decoy_but_not_target() {
        let names: Vec<String> = (0..16).map(|i| format!("Item {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let selector = ActivitySelector::new(open_catalog(&refs));
        let mut pools = SelectionPools::new();
        pools.on_declined(ActivityId(5));
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..50 {
            let plan = selector
                .plan_spin(2, &pools, noon(), 16, 8, &mut rng)
                .expect("catalog covers two players");
            assert_eq!(plan.items.len(), 16);
            assert_ne!(plan.target(), Some(ActivityId(5)));
            // All 16 catalog items fit on the wheel, so the declined one is always a decoy.
            assert!(plan.items.contains(&ActivityId(5)));
        }
    }
}
