// Market price adjustment: popularity-tiered price deltas, conserved by
// redistributing every increase as decreases among unpopular entities.
//
// Races are processed strictly in chronological order and the working
// price ledger carries forward from one race into the next. That
// sequential dependency is load-bearing: tiers and decrease-pool ordering
// for race N+1 are computed from the prices as mutated by race N.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::LeagueConfig;
use crate::engine::resolve::resolve_team;
use crate::model::{Constructor, Participant, Race, Rider, TeamSnapshot};

// ---------------------------------------------------------------------------
// Tier thresholds and deltas
// ---------------------------------------------------------------------------

/// Popularity percentage above which an entity is dominant.
const DOMINANT_THRESHOLD: f64 = 75.0;
/// Popularity percentage above which an entity is very popular.
const VERY_POPULAR_THRESHOLD: f64 = 50.0;
/// Popularity percentage above which an entity is popular.
const POPULAR_THRESHOLD: f64 = 25.0;

/// Price delta for the dominant tier, in the sport's native price unit.
const DOMINANT_DELTA: i64 = 30;
/// Price delta for the very-popular tier.
const VERY_POPULAR_DELTA: i64 = 20;
/// Price delta for the popular tier.
const POPULAR_DELTA: i64 = 10;
/// Size of one decrease step during redistribution.
const DECREASE_STEP: i64 = 10;

/// Popularity tier for one race, bucketed by the percentage of qualifying
/// participants who selected the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Dominant,
    VeryPopular,
    Popular,
    Differential,
    Unpopular,
}

fn tier_of(percent: f64) -> Tier {
    if percent > DOMINANT_THRESHOLD {
        Tier::Dominant
    } else if percent > VERY_POPULAR_THRESHOLD {
        Tier::VeryPopular
    } else if percent > POPULAR_THRESHOLD {
        Tier::Popular
    } else if percent > 0.0 {
        Tier::Differential
    } else {
        Tier::Unpopular
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One entity whose price moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub id: i64,
    pub old_price: i64,
    pub new_price: i64,
}

/// The diff produced by one adjustment run. The caller must persist the
/// price updates and mark every listed race `prices_adjusted` atomically;
/// that gate is what makes a correctly persisted re-run a no-op.
#[derive(Debug, Clone, Default)]
pub struct PriceAdjustment {
    pub rider_prices: Vec<PriceUpdate>,
    pub constructor_prices: Vec<PriceUpdate>,
    pub processed_race_ids: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Per-race delta computation
// ---------------------------------------------------------------------------

/// One entity's standing going into a race's market round.
struct PoolEntry {
    id: i64,
    /// Working ledger price, not the season-start price.
    price: i64,
    selected_by: usize,
    /// An entity with an active condition flag never funds decreases,
    /// though it still receives increases if selected.
    locked: bool,
}

/// Compute the price deltas one race applies to one entity pool.
///
/// Increases: dominant +30, very popular +20, popular +10. The summed
/// increase is funded by decreases drawn from the unpopular tier, falling
/// back to the differential tier when no entity went unselected. The pool
/// is walked most-expensive-first (price ties broken by ascending id) in
/// fixed −10 steps, round-robin, until the distributed total reaches the
/// increase floored to a multiple of 10. With both pools empty the
/// increases stand unfunded.
fn race_deltas(entries: &[PoolEntry], qualifying: usize) -> HashMap<i64, i64> {
    let mut deltas: HashMap<i64, i64> = HashMap::new();
    if qualifying == 0 {
        return deltas;
    }

    let mut total_increase: i64 = 0;
    let mut unpopular: Vec<&PoolEntry> = Vec::new();
    let mut differential: Vec<&PoolEntry> = Vec::new();

    for entry in entries {
        let percent = entry.selected_by as f64 / qualifying as f64 * 100.0;
        match tier_of(percent) {
            Tier::Dominant => {
                deltas.insert(entry.id, DOMINANT_DELTA);
                total_increase += DOMINANT_DELTA;
            }
            Tier::VeryPopular => {
                deltas.insert(entry.id, VERY_POPULAR_DELTA);
                total_increase += VERY_POPULAR_DELTA;
            }
            Tier::Popular => {
                deltas.insert(entry.id, POPULAR_DELTA);
                total_increase += POPULAR_DELTA;
            }
            Tier::Differential if !entry.locked => differential.push(entry),
            Tier::Unpopular if !entry.locked => unpopular.push(entry),
            Tier::Differential | Tier::Unpopular => {}
        }
    }

    let mut pool = if unpopular.is_empty() {
        differential
    } else {
        unpopular
    };
    pool.sort_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id)));

    let steps = (total_increase / DECREASE_STEP) as usize;
    if !pool.is_empty() {
        for i in 0..steps {
            let entry = pool[i % pool.len()];
            *deltas.entry(entry.id).or_insert(0) -= DECREASE_STEP;
        }
    }

    deltas
}

// ---------------------------------------------------------------------------
// The adjustment fold
// ---------------------------------------------------------------------------

/// Run the price adjustment over every unprocessed past race.
///
/// Races are selected by `race_date < now` and `prices_adjusted == false`,
/// then processed in ascending date order (round breaks date ties), each
/// race mutating the working ledger the next race reads. Participants whose
/// resolved roster for a race is empty do not count toward that race's
/// popularity denominator; a race with no qualifying participants at all
/// contributes zero deltas but is still reported as processed.
///
/// Returns `None` when there is nothing unprocessed. Otherwise the diff
/// lists only entities whose price actually changed, every resulting price
/// clamped to a minimum of 0.
pub fn adjust_prices(
    now: DateTime<Utc>,
    races: &[Race],
    riders: &[Rider],
    constructors: &[Constructor],
    participants: &[Participant],
    snapshots: &[TeamSnapshot],
    league: &LeagueConfig,
) -> Option<PriceAdjustment> {
    let mut pending: Vec<&Race> = races
        .iter()
        .filter(|r| r.is_past(now) && !r.prices_adjusted)
        .collect();
    pending.sort_by_key(|r| (r.race_date, r.round));

    if pending.is_empty() {
        return None;
    }

    let mut rider_ledger: HashMap<i64, i64> = riders.iter().map(|r| (r.id, r.price)).collect();
    let mut constructor_ledger: HashMap<i64, i64> =
        constructors.iter().map(|c| (c.id, c.price)).collect();

    for race in &pending {
        let rosters: Vec<_> = participants
            .iter()
            .map(|p| resolve_team(p.id, race, snapshots))
            .filter(|roster| !roster.is_empty())
            .collect();
        let qualifying = rosters.len();

        let mut rider_counts: HashMap<i64, usize> = HashMap::new();
        let mut constructor_counts: HashMap<i64, usize> = HashMap::new();
        for roster in &rosters {
            for &rider_id in &roster.rider_ids {
                *rider_counts.entry(rider_id).or_insert(0) += 1;
            }
            if let Some(cid) = roster.constructor_id {
                *constructor_counts.entry(cid).or_insert(0) += 1;
            }
        }

        let rider_entries: Vec<PoolEntry> = riders
            .iter()
            .map(|r| PoolEntry {
                id: r.id,
                price: rider_ledger.get(&r.id).copied().unwrap_or(r.price),
                selected_by: rider_counts.get(&r.id).copied().unwrap_or(0),
                locked: r.condition.is_some(),
            })
            .collect();
        apply_deltas(&mut rider_ledger, &race_deltas(&rider_entries, qualifying));

        if league.has_constructors {
            let constructor_entries: Vec<PoolEntry> = constructors
                .iter()
                .map(|c| PoolEntry {
                    id: c.id,
                    price: constructor_ledger.get(&c.id).copied().unwrap_or(c.price),
                    selected_by: constructor_counts.get(&c.id).copied().unwrap_or(0),
                    locked: false,
                })
                .collect();
            apply_deltas(
                &mut constructor_ledger,
                &race_deltas(&constructor_entries, qualifying),
            );
        }

        debug!(
            race_id = race.id,
            round = race.round,
            qualifying, "market round applied"
        );
    }

    let rider_prices = diff_prices(riders.iter().map(|r| (r.id, r.price)), &rider_ledger);
    let constructor_prices = diff_prices(
        constructors.iter().map(|c| (c.id, c.price)),
        &constructor_ledger,
    );

    Some(PriceAdjustment {
        rider_prices,
        constructor_prices,
        processed_race_ids: pending.iter().map(|r| r.id).collect(),
    })
}

/// Apply a race's deltas to the working ledger, flooring every price at 0.
fn apply_deltas(ledger: &mut HashMap<i64, i64>, deltas: &HashMap<i64, i64>) {
    for (&id, &delta) in deltas {
        let price = ledger.entry(id).or_insert(0);
        *price = (*price + delta).max(0);
    }
}

/// Diff the final ledger against original prices, in input order, keeping
/// only entities whose price actually changed.
fn diff_prices(
    originals: impl Iterator<Item = (i64, i64)>,
    ledger: &HashMap<i64, i64>,
) -> Vec<PriceUpdate> {
    originals
        .filter_map(|(id, old_price)| {
            let new_price = ledger.get(&id).copied().unwrap_or(old_price);
            (new_price != old_price).then_some(PriceUpdate {
                id,
                old_price,
                new_price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, price: i64, selected_by: usize) -> PoolEntry {
        PoolEntry {
            id,
            price,
            selected_by,
            locked: false,
        }
    }

    // ------------------------------------------------------------------
    // Tier bucketing
    // ------------------------------------------------------------------

    #[test]
    fn tier_boundaries_are_exclusive() {
        assert_eq!(tier_of(100.0), Tier::Dominant);
        assert_eq!(tier_of(75.0), Tier::VeryPopular);
        assert_eq!(tier_of(50.0), Tier::Popular);
        assert_eq!(tier_of(25.0), Tier::Differential);
        assert_eq!(tier_of(0.1), Tier::Differential);
        assert_eq!(tier_of(0.0), Tier::Unpopular);
    }

    // ------------------------------------------------------------------
    // Delta computation
    // ------------------------------------------------------------------

    #[test]
    fn increases_match_tiers() {
        // 10 qualifying participants: 8, 6, and 3 selections land in the
        // dominant, very-popular, and popular tiers respectively.
        let entries = vec![entry(1, 100, 8), entry(2, 90, 6), entry(3, 80, 3)];
        let deltas = race_deltas(&entries, 10);

        assert_eq!(deltas.get(&1), Some(&30));
        assert_eq!(deltas.get(&2), Some(&20));
        assert_eq!(deltas.get(&3), Some(&10));
    }

    #[test]
    fn decreases_fund_increases_round_robin() {
        // +30 total increase, two unpopular entities. The most expensive
        // absorbs two -10 steps, the other one.
        let entries = vec![entry(1, 100, 9), entry(2, 80, 0), entry(3, 60, 0)];
        let deltas = race_deltas(&entries, 10);

        assert_eq!(deltas.get(&1), Some(&30));
        assert_eq!(deltas.get(&2), Some(&-20));
        assert_eq!(deltas.get(&3), Some(&-10));
    }

    #[test]
    fn differential_pool_is_fallback_only() {
        // One differential (10%) entity and one unpopular entity: the
        // unpopular one takes the whole decrease.
        let entries = vec![entry(1, 100, 9), entry(2, 80, 1), entry(3, 60, 0)];
        let deltas = race_deltas(&entries, 10);

        assert_eq!(deltas.get(&2), None);
        assert_eq!(deltas.get(&3), Some(&-30));
    }

    #[test]
    fn locked_entries_never_fund_decreases() {
        let entries = vec![
            entry(1, 100, 9),
            PoolEntry {
                id: 2,
                price: 80,
                selected_by: 0,
                locked: true,
            },
            entry(3, 60, 0),
        ];
        let deltas = race_deltas(&entries, 10);

        assert_eq!(deltas.get(&2), None);
        assert_eq!(deltas.get(&3), Some(&-30));
    }

    #[test]
    fn empty_pools_leave_increases_unfunded() {
        let entries = vec![
            entry(1, 100, 9),
            PoolEntry {
                id: 2,
                price: 80,
                selected_by: 0,
                locked: true,
            },
        ];
        let deltas = race_deltas(&entries, 10);

        assert_eq!(deltas.get(&1), Some(&30));
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn zero_qualifying_participants_produce_no_deltas() {
        let entries = vec![entry(1, 100, 0), entry(2, 80, 0)];
        assert!(race_deltas(&entries, 0).is_empty());
    }

    #[test]
    fn conservation_up_to_the_rounding_floor() {
        let entries = vec![
            entry(1, 120, 10),
            entry(2, 110, 7),
            entry(3, 100, 4),
            entry(4, 90, 1),
            entry(5, 80, 0),
            entry(6, 70, 0),
        ];
        let deltas = race_deltas(&entries, 10);

        let increase: i64 = deltas.values().filter(|&&d| d > 0).sum();
        let decrease: i64 = deltas.values().filter(|&&d| d < 0).sum();
        assert_eq!(increase, 60);
        assert_eq!(decrease, -60);
    }
}
