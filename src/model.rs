// League entities shared by the engines, the storage layer, and the
// results importer. All of these are plain data: the engines receive them
// as immutable snapshots and express every mutation as a returned diff.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Riders and constructors
// ---------------------------------------------------------------------------

/// A selectable rider on the season grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: i64,
    pub name: String,
    /// Team label. Descriptive, but also the fallback key that ties a rider
    /// to a constructor when `constructor_id` is unset.
    pub team: String,
    /// Bike/chassis label. Descriptive only.
    pub bike: String,
    /// Current market price. Moved only by the price engine or an explicit
    /// admin override.
    pub price: i64,
    /// Season-start price anchor. Immutable after creation.
    pub initial_price: i64,
    /// Injury/unavailability reason. A rider with an active condition is
    /// never drafted into a market decrease pool.
    pub condition: Option<String>,
    pub constructor_id: Option<i64>,
    /// Full-grid entry, as opposed to a wildcard or replacement ride.
    pub is_official: bool,
}

/// A constructor (team) entry, structurally parallel to `Rider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constructor {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub initial_price: i64,
}

// ---------------------------------------------------------------------------
// Races
// ---------------------------------------------------------------------------

/// One round of the season calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    pub id: i64,
    /// Ordinal position in the season. Used for sorting tie-breaks when two
    /// races share a date.
    pub round: u32,
    pub gp_name: String,
    pub location: String,
    /// Sole ordering and past-vs-future oracle for the engines.
    pub race_date: DateTime<Utc>,
    /// Set once the price engine has consumed this race's popularity data.
    /// Gates against double-application.
    pub prices_adjusted: bool,
}

impl Race {
    /// Whether the race has already been run as of `now`.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.race_date < now
    }
}

// ---------------------------------------------------------------------------
// Participants and snapshots
// ---------------------------------------------------------------------------

/// A league member. The live roster is never stored here; it is derived
/// from the participant's `TeamSnapshot` history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub name: String,
}

/// An immutable, append-only record of a roster as saved by a participant.
/// Snapshots are totally ordered per participant by `created_at`; the
/// system only ever appends new ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub id: i64,
    pub participant_id: i64,
    pub rider_ids: Vec<i64>,
    pub constructor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    /// The race this snapshot was saved for, when known.
    pub race_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Race results
// ---------------------------------------------------------------------------

/// Raw scored points for one rider at one race, split main vs sprint.
/// Leagues without sprint races simply carry 0 in `sprint`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPoints {
    pub main: i32,
    pub sprint: i32,
}

impl RoundPoints {
    pub fn new(main: i32, sprint: i32) -> Self {
        RoundPoints { main, sprint }
    }

    pub fn total(&self) -> i32 {
        self.main + self.sprint
    }
}

/// Points for every scoring rider at a single race, keyed by rider id.
/// A rider absent from the map scored zero.
pub type RacePoints = HashMap<i64, RoundPoints>;

/// All scored races of the season, keyed by race id.
pub type SeasonPoints = HashMap<i64, RacePoints>;

// ---------------------------------------------------------------------------
// League settings
// ---------------------------------------------------------------------------

/// Singleton league-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeagueSettings {
    /// Global roster-lock timestamp. `None` means the market never closes.
    pub market_deadline: Option<DateTime<Utc>>,
}

impl LeagueSettings {
    /// Whether roster edits are currently allowed. Consulted only by the
    /// save-team path; scoring and pricing ignore it.
    pub fn market_open(&self, now: DateTime<Utc>) -> bool {
        match self.market_deadline {
            Some(deadline) => now < deadline,
            None => true,
        }
    }
}
