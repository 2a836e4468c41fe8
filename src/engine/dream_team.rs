// Dream team: the highest-scoring legal roster found for one race.
//
// This is a greedy search, not a knapsack solver: for each constructor
// candidate (best-two score descending) the rider slots are filled in
// points-descending order, skipping riders the remaining budget cannot
// cover. The result is a local optimum. That limitation is part of the
// product behavior surfaced to users; do not silently replace this with a
// globally optimal search.

use crate::config::LeagueConfig;
use crate::engine::score::{best_two_average, effective_points};
use crate::model::{Constructor, RacePoints, Rider};

/// The best roster the greedy search found, with its score and cost.
#[derive(Debug, Clone, PartialEq)]
pub struct DreamTeam {
    pub rider_ids: Vec<i64>,
    pub constructor_id: Option<i64>,
    pub score: f64,
    pub cost: i64,
}

/// Search for the highest-scoring roster of exactly `rider_limit` riders
/// (plus a constructor, in constructor-enabled leagues) costing at most
/// `budget`. Returns `None` when no combination fills every slot within
/// the budget.
pub fn compute_dream_team(
    points: &RacePoints,
    riders: &[Rider],
    constructors: &[Constructor],
    budget: i64,
    rider_limit: usize,
    league: &LeagueConfig,
) -> Option<DreamTeam> {
    if rider_limit == 0 {
        return None;
    }

    // Riders ordered by race points descending; ties prefer the cheaper
    // rider, then the lower id, so the greedy walk is deterministic.
    let mut ranked: Vec<&Rider> = riders.iter().collect();
    ranked.sort_by(|a, b| {
        let pa = effective_points(points, a.id, league).total();
        let pb = effective_points(points, b.id, league).total();
        pb.cmp(&pa)
            .then(a.price.cmp(&b.price))
            .then(a.id.cmp(&b.id))
    });

    if !league.has_constructors {
        return greedy_fill(&ranked, points, budget, rider_limit, league).map(
            |(rider_ids, cost, score)| DreamTeam {
                rider_ids,
                constructor_id: None,
                score,
                cost,
            },
        );
    }

    // Constructor candidates by their own best-two score, descending.
    let mut candidates: Vec<&Constructor> = constructors.iter().collect();
    candidates.sort_by(|a, b| {
        let sa = best_two_average(a, riders, points, league).points;
        let sb = best_two_average(b, riders, points, league).points;
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    let mut best: Option<DreamTeam> = None;
    for constructor in candidates {
        let remaining = budget - constructor.price;
        if remaining < 0 {
            continue;
        }

        let Some((rider_ids, rider_cost, rider_score)) =
            greedy_fill(&ranked, points, remaining, rider_limit, league)
        else {
            continue;
        };

        let constructor_score = best_two_average(constructor, riders, points, league);
        let team = DreamTeam {
            rider_ids,
            constructor_id: Some(constructor.id),
            score: rider_score + constructor_score.points,
            cost: rider_cost + constructor.price,
        };

        if best.as_ref().map_or(true, |b| team.score > b.score) {
            best = Some(team);
        }
    }

    best
}

/// Walk the ranked rider list, taking every affordable rider until the
/// roster is full. Returns `None` when the walk ends with open slots.
fn greedy_fill(
    ranked: &[&Rider],
    points: &RacePoints,
    budget: i64,
    rider_limit: usize,
    league: &LeagueConfig,
) -> Option<(Vec<i64>, i64, f64)> {
    let mut rider_ids = Vec::with_capacity(rider_limit);
    let mut cost: i64 = 0;
    let mut score: i32 = 0;

    for rider in ranked {
        if rider_ids.len() == rider_limit {
            break;
        }
        if cost + rider.price > budget {
            continue;
        }
        rider_ids.push(rider.id);
        cost += rider.price;
        score += effective_points(points, rider.id, league).total();
    }

    (rider_ids.len() == rider_limit).then_some((rider_ids, cost, f64::from(score)))
}
