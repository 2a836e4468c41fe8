// Score breakdown: converts raw per-rider race points into a roster score.
//
// Rider contributions are direct lookups. The constructor contribution is
// the average of its two best riders' points, with riders tied to a
// constructor either by explicit id or by team-name fallback.

use crate::config::LeagueConfig;
use crate::engine::resolve::ResolvedRoster;
use crate::model::{Constructor, RacePoints, Rider, RoundPoints};

// ---------------------------------------------------------------------------
// Score types
// ---------------------------------------------------------------------------

/// One rostered rider's contribution, split main vs sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiderScore {
    pub rider_id: i64,
    pub main: i32,
    pub sprint: i32,
    pub points: i32,
}

/// The constructor contribution: average of the two best riders.
///
/// `points` carries the fraction; rounding happens at display time only.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorScore {
    pub constructor_id: i64,
    pub points: f64,
    /// The riders whose results produced the score, best first. One entry
    /// when only a single rider scored, empty when none did.
    pub top_two_rider_ids: Vec<i64>,
}

/// Complete breakdown for one roster at one race.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterScore {
    pub rider_scores: Vec<RiderScore>,
    pub constructor_score: Option<ConstructorScore>,
    pub total: f64,
}

impl RosterScore {
    /// The all-zero score an empty roster produces.
    pub fn zero() -> Self {
        RosterScore {
            rider_scores: Vec::new(),
            constructor_score: None,
            total: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Rider-to-constructor matching
// ---------------------------------------------------------------------------

/// How a rider was tied to a constructor. Two strategies, tried in order:
/// the explicit `constructor_id` link, then team-name string equality for
/// riders that predate the constructor link. The fallback is a deliberate
/// compatibility rule, not a repair path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorLink {
    ById,
    ByTeamName,
}

/// Resolve whether `rider` belongs to `constructor`, and via which strategy.
pub fn constructor_link(rider: &Rider, constructor: &Constructor) -> Option<ConstructorLink> {
    match rider.constructor_id {
        Some(id) if id == constructor.id => Some(ConstructorLink::ById),
        Some(_) => None,
        None if rider.team == constructor.name => Some(ConstructorLink::ByTeamName),
        None => None,
    }
}

/// All riders belonging to a constructor, in input order.
pub fn constructor_riders<'a>(
    constructor: &Constructor,
    riders: &'a [Rider],
) -> Vec<&'a Rider> {
    riders
        .iter()
        .filter(|r| constructor_link(r, constructor).is_some())
        .collect()
}

// ---------------------------------------------------------------------------
// Points lookup
// ---------------------------------------------------------------------------

/// Effective points for one rider, honoring the sprint capability flag.
/// A rider absent from the race data scored zero; that is expected
/// mid-season state, not an error.
pub fn effective_points(points: &RacePoints, rider_id: i64, league: &LeagueConfig) -> RoundPoints {
    let raw = points.get(&rider_id).copied().unwrap_or_default();
    if league.has_sprint_points {
        raw
    } else {
        RoundPoints::new(raw.main, 0)
    }
}

// ---------------------------------------------------------------------------
// Constructor scoring
// ---------------------------------------------------------------------------

/// Score a constructor from its riders' results: the average of the two
/// highest-scoring riders, 0 standing in for a missing second rider, 0.0
/// total when no rider scored. The fraction is carried as-is.
pub fn best_two_average(
    constructor: &Constructor,
    riders: &[Rider],
    points: &RacePoints,
    league: &LeagueConfig,
) -> ConstructorScore {
    let mut scored: Vec<(i64, i32)> = constructor_riders(constructor, riders)
        .iter()
        .map(|r| (r.id, effective_points(points, r.id, league).total()))
        .collect();

    // Best first; equal scores keep the lower rider id for determinism.
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let top_two: Vec<(i64, i32)> = scored.into_iter().take(2).collect();
    let points_sum: i32 = top_two.iter().map(|&(_, p)| p).sum();

    ConstructorScore {
        constructor_id: constructor.id,
        points: if top_two.is_empty() {
            0.0
        } else {
            f64::from(points_sum) / 2.0
        },
        top_two_rider_ids: top_two.into_iter().map(|(id, _)| id).collect(),
    }
}

// ---------------------------------------------------------------------------
// Roster scoring
// ---------------------------------------------------------------------------

/// Score a resolved roster against one race's raw points.
///
/// Unknown rider or constructor ids degrade to zero contributions, never
/// an error. The total is rider points plus the constructor fraction; it
/// is only rounded by display layers.
pub fn score_roster(
    roster: &ResolvedRoster,
    points: &RacePoints,
    riders: &[Rider],
    constructors: &[Constructor],
    league: &LeagueConfig,
) -> RosterScore {
    if roster.is_empty() {
        return RosterScore::zero();
    }

    let rider_scores: Vec<RiderScore> = roster
        .rider_ids
        .iter()
        .map(|&rider_id| {
            let p = effective_points(points, rider_id, league);
            RiderScore {
                rider_id,
                main: p.main,
                sprint: p.sprint,
                points: p.total(),
            }
        })
        .collect();

    let constructor_score = if league.has_constructors {
        roster.constructor_id.and_then(|id| {
            constructors
                .iter()
                .find(|c| c.id == id)
                .map(|c| best_two_average(c, riders, points, league))
        })
    } else {
        None
    };

    let rider_total: i32 = rider_scores.iter().map(|s| s.points).sum();
    let constructor_total = constructor_score.as_ref().map_or(0.0, |c| c.points);

    RosterScore {
        rider_scores,
        constructor_score,
        total: f64::from(rider_total) + constructor_total,
    }
}
