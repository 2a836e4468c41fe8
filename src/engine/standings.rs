// Leaderboard aggregation: per-participant standings and league-wide
// statistics, all read-only folds over resolved rosters and race points.

use std::collections::HashMap;

use crate::config::LeagueConfig;
use crate::engine::resolve::{resolve_latest_team, resolve_team};
use crate::engine::score::{effective_points, score_roster};
use crate::model::{Constructor, Participant, Race, Rider, SeasonPoints, TeamSnapshot};

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// Which slice of the season the standings cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandingsView {
    /// Accumulate every race.
    General,
    /// A single race's scores only.
    Race(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandingsRow {
    pub participant_id: i64,
    pub score: f64,
}

/// Rank every participant by roster score.
///
/// For each covered race, each participant's roster is resolved as of that
/// race and scored against the race's raw points; scores accumulate across
/// races. Sorted descending by score; the sort is stable, so equal scores
/// keep the input participant order. Zero participants or races yield an
/// empty/zero-valued result, never an error.
pub fn compute_standings(
    view: StandingsView,
    participants: &[Participant],
    races: &[Race],
    snapshots: &[TeamSnapshot],
    season: &SeasonPoints,
    riders: &[Rider],
    constructors: &[Constructor],
    league: &LeagueConfig,
) -> Vec<StandingsRow> {
    let covered: Vec<&Race> = match view {
        StandingsView::General => races.iter().collect(),
        StandingsView::Race(race_id) => races.iter().filter(|r| r.id == race_id).collect(),
    };

    let empty = HashMap::new();

    let mut rows: Vec<StandingsRow> = participants
        .iter()
        .map(|participant| {
            let score = covered
                .iter()
                .map(|race| {
                    let roster = resolve_team(participant.id, race, snapshots);
                    let points = season.get(&race.id).unwrap_or(&empty);
                    score_roster(&roster, points, riders, constructors, league).total
                })
                .sum();
            StandingsRow {
                participant_id: participant.id,
                score,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

// ---------------------------------------------------------------------------
// League statistics
// ---------------------------------------------------------------------------

/// Selection popularity of one entity among roster-having participants.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionStat {
    pub id: i64,
    pub count: usize,
    pub percent: f64,
}

/// The rider with the highest summed points across all races.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonMvp {
    pub rider_id: i64,
    pub points: i32,
}

/// A low-ownership, high-value rider: selected by under 25% of
/// roster-having participants, more than 10 season points, best
/// points-per-price ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenGem {
    pub rider_id: i64,
    pub points: i32,
    pub points_per_price: f64,
}

/// League-wide statistics, each an independent fold over the same inputs.
#[derive(Debug, Clone, Default)]
pub struct LeagueStats {
    pub most_selected_rider: Option<SelectionStat>,
    pub most_selected_constructor: Option<SelectionStat>,
    pub mvp: Option<SeasonMvp>,
    pub hidden_gem: Option<HiddenGem>,
    pub average_roster_cost: f64,
}

/// Ownership threshold below which a rider can qualify as a hidden gem.
const HIDDEN_GEM_MAX_PERCENT: f64 = 25.0;

/// Season points a rider must exceed to qualify as a hidden gem.
const HIDDEN_GEM_MIN_POINTS: i32 = 10;

/// Compute the league statistics block.
///
/// Selection counts come from each participant's latest resolved roster;
/// participants whose latest roster is empty do not count toward the
/// denominator (nor toward the average roster cost). Arg-max ties keep the
/// first entity in input order.
pub fn league_stats(
    participants: &[Participant],
    snapshots: &[TeamSnapshot],
    season: &SeasonPoints,
    riders: &[Rider],
    constructors: &[Constructor],
    league: &LeagueConfig,
) -> LeagueStats {
    let rosters: Vec<_> = participants
        .iter()
        .map(|p| resolve_latest_team(p.id, snapshots))
        .filter(|r| !r.is_empty())
        .collect();

    let qualifying = rosters.len();

    // Selection counts per rider and per constructor.
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

    let most_selected_rider = arg_max_selection(
        riders.iter().map(|r| r.id),
        &rider_counts,
        qualifying,
    );
    let most_selected_constructor = if league.has_constructors {
        arg_max_selection(
            constructors.iter().map(|c| c.id),
            &constructor_counts,
            qualifying,
        )
    } else {
        None
    };

    // Season totals per rider, honoring the sprint flag.
    let mut season_totals: HashMap<i64, i32> = HashMap::new();
    for points in season.values() {
        for &rider_id in points.keys() {
            *season_totals.entry(rider_id).or_insert(0) +=
                effective_points(points, rider_id, league).total();
        }
    }

    let mvp = riders
        .iter()
        .map(|r| SeasonMvp {
            rider_id: r.id,
            points: season_totals.get(&r.id).copied().unwrap_or(0),
        })
        .fold(None::<SeasonMvp>, |best, candidate| match best {
            Some(b) if b.points >= candidate.points => Some(b),
            _ => Some(candidate),
        })
        .filter(|m| m.points > 0);

    let hidden_gem = riders
        .iter()
        .filter(|r| r.price > 0)
        .filter(|r| {
            let count = rider_counts.get(&r.id).copied().unwrap_or(0);
            qualifying > 0
                && (count as f64 / qualifying as f64) * 100.0 < HIDDEN_GEM_MAX_PERCENT
        })
        .filter_map(|r| {
            let points = season_totals.get(&r.id).copied().unwrap_or(0);
            (points > HIDDEN_GEM_MIN_POINTS).then(|| HiddenGem {
                rider_id: r.id,
                points,
                points_per_price: f64::from(points) / r.price as f64,
            })
        })
        .fold(None::<HiddenGem>, |best, candidate| match best {
            Some(b) if b.points_per_price >= candidate.points_per_price => Some(b),
            _ => Some(candidate),
        });

    let average_roster_cost = if qualifying == 0 {
        0.0
    } else {
        let total: i64 = rosters
            .iter()
            .map(|roster| roster_cost(roster.rider_ids.as_slice(), roster.constructor_id, riders, constructors))
            .sum();
        total as f64 / qualifying as f64
    };

    LeagueStats {
        most_selected_rider,
        most_selected_constructor,
        mvp,
        hidden_gem,
        average_roster_cost,
    }
}

/// Arg-max of selection counts over entities in input order; `None` when
/// nobody has a roster or nothing was ever selected.
fn arg_max_selection(
    ids: impl Iterator<Item = i64>,
    counts: &HashMap<i64, usize>,
    qualifying: usize,
) -> Option<SelectionStat> {
    if qualifying == 0 {
        return None;
    }
    ids.map(|id| {
        let count = counts.get(&id).copied().unwrap_or(0);
        SelectionStat {
            id,
            count,
            percent: count as f64 / qualifying as f64 * 100.0,
        }
    })
    .fold(None::<SelectionStat>, |best, candidate| match best {
        Some(b) if b.count >= candidate.count => Some(b),
        _ => Some(candidate),
    })
    .filter(|s| s.count > 0)
}

/// Current market cost of a roster: rider prices plus the constructor
/// price. Unknown ids contribute nothing.
fn roster_cost(
    rider_ids: &[i64],
    constructor_id: Option<i64>,
    riders: &[Rider],
    constructors: &[Constructor],
) -> i64 {
    let rider_total: i64 = rider_ids
        .iter()
        .filter_map(|id| riders.iter().find(|r| r.id == *id))
        .map(|r| r.price)
        .sum();
    let constructor_total = constructor_id
        .and_then(|id| constructors.iter().find(|c| c.id == id))
        .map_or(0, |c| c.price);
    rider_total + constructor_total
}
