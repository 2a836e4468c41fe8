// Team snapshot resolution: which roster a participant had in force at a
// given race, derived from the append-only snapshot history.

use crate::model::{Race, TeamSnapshot};

// ---------------------------------------------------------------------------
// Resolved roster
// ---------------------------------------------------------------------------

/// The roster in force for one participant at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRoster {
    pub rider_ids: Vec<i64>,
    pub constructor_id: Option<i64>,
}

impl ResolvedRoster {
    /// The neutral roster: no riders, no constructor. What a participant
    /// who has never saved a team resolves to.
    pub fn empty() -> Self {
        ResolvedRoster::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rider_ids.is_empty() && self.constructor_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the roster a participant had when `race` was run.
///
/// Considers only snapshots created strictly before the race date and
/// picks the latest of those. Snapshots sharing the latest `created_at`
/// are tie-broken by highest snapshot id (ids are append-ordered, so the
/// later insert wins).
///
/// Absent data is never an error: a participant with no qualifying
/// snapshot resolves to the empty roster.
pub fn resolve_team(
    participant_id: i64,
    race: &Race,
    snapshots: &[TeamSnapshot],
) -> ResolvedRoster {
    let winner = snapshots
        .iter()
        .filter(|s| s.participant_id == participant_id && s.created_at < race.race_date)
        .max_by_key(|s| (s.created_at, s.id));

    match winner {
        Some(snapshot) => ResolvedRoster {
            rider_ids: snapshot.rider_ids.clone(),
            constructor_id: snapshot.constructor_id,
        },
        None => ResolvedRoster::empty(),
    }
}

/// Resolve the participant's current roster: the latest snapshot overall,
/// unconstrained by any race cutoff. Used for "my team" displays and
/// market-validity checks. Same tie-break as `resolve_team`.
pub fn resolve_latest_team(participant_id: i64, snapshots: &[TeamSnapshot]) -> ResolvedRoster {
    let winner = snapshots
        .iter()
        .filter(|s| s.participant_id == participant_id)
        .max_by_key(|s| (s.created_at, s.id));

    match winner {
        Some(snapshot) => ResolvedRoster {
            rider_ids: snapshot.rider_ids.clone(),
            constructor_id: snapshot.constructor_id,
        },
        None => ResolvedRoster::empty(),
    }
}
