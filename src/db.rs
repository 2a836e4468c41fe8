// SQLite persistence layer for the league: entity storage, snapshot
// history, race results, and the transactional application of engine
// diffs.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::LeagueConfig;
use crate::engine::market::PriceAdjustment;
use crate::model::{
    Constructor, LeagueSettings, Participant, Race, Rider, RoundPoints, SeasonPoints,
    TeamSnapshot,
};

/// SQLite-backed persistence for riders, constructors, races, participants,
/// team snapshots, race results, and league settings.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS constructors (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                name          TEXT NOT NULL UNIQUE,
                price         INTEGER NOT NULL,
                initial_price INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS riders (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL UNIQUE,
                team           TEXT NOT NULL,
                bike           TEXT NOT NULL DEFAULT '',
                price          INTEGER NOT NULL,
                initial_price  INTEGER NOT NULL,
                condition      TEXT,
                constructor_id INTEGER REFERENCES constructors(id),
                is_official    INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS races (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                round           INTEGER NOT NULL,
                gp_name         TEXT NOT NULL,
                location        TEXT NOT NULL,
                race_date       TEXT NOT NULL,
                prices_adjusted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS participants (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS team_snapshots (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                participant_id INTEGER NOT NULL REFERENCES participants(id),
                rider_ids      TEXT NOT NULL,
                constructor_id INTEGER REFERENCES constructors(id),
                created_at     TEXT NOT NULL,
                race_id        INTEGER REFERENCES races(id)
            );

            CREATE TABLE IF NOT EXISTS round_points (
                race_id  INTEGER NOT NULL REFERENCES races(id),
                rider_id INTEGER NOT NULL REFERENCES riders(id),
                main     INTEGER NOT NULL,
                sprint   INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (race_id, rider_id)
            );

            CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_participant
                ON team_snapshots(participant_id, created_at);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Loaders ("fetch all current rows")
    // ------------------------------------------------------------------

    pub fn load_riders(&self) -> Result<Vec<Rider>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, team, bike, price, initial_price, condition,
                        constructor_id, is_official
                 FROM riders ORDER BY id",
            )
            .context("failed to prepare rider query")?;

        let riders = stmt
            .query_map([], |row| {
                Ok(Rider {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    team: row.get(2)?,
                    bike: row.get(3)?,
                    price: row.get(4)?,
                    initial_price: row.get(5)?,
                    condition: row.get(6)?,
                    constructor_id: row.get(7)?,
                    is_official: row.get(8)?,
                })
            })
            .context("failed to query riders")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read rider rows")?;

        Ok(riders)
    }

    pub fn load_constructors(&self) -> Result<Vec<Constructor>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, price, initial_price FROM constructors ORDER BY id")
            .context("failed to prepare constructor query")?;

        let constructors = stmt
            .query_map([], |row| {
                Ok(Constructor {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    initial_price: row.get(3)?,
                })
            })
            .context("failed to query constructors")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read constructor rows")?;

        Ok(constructors)
    }

    pub fn load_races(&self) -> Result<Vec<Race>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, round, gp_name, location, race_date, prices_adjusted
                 FROM races ORDER BY race_date, round",
            )
            .context("failed to prepare race query")?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            })
            .context("failed to query races")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read race rows")?;

        raw.into_iter()
            .map(|(id, round, gp_name, location, date, prices_adjusted)| {
                Ok(Race {
                    id,
                    round,
                    gp_name,
                    location,
                    race_date: parse_timestamp(&date)?,
                    prices_adjusted,
                })
            })
            .collect()
    }

    pub fn load_participants(&self) -> Result<Vec<Participant>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name FROM participants ORDER BY id")
            .context("failed to prepare participant query")?;

        let participants = stmt
            .query_map([], |row| {
                Ok(Participant {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("failed to query participants")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read participant rows")?;

        Ok(participants)
    }

    pub fn load_snapshots(&self) -> Result<Vec<TeamSnapshot>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, participant_id, rider_ids, constructor_id, created_at, race_id
                 FROM team_snapshots ORDER BY id",
            )
            .context("failed to prepare snapshot query")?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            })
            .context("failed to query snapshots")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read snapshot rows")?;

        raw.into_iter()
            .map(|(id, participant_id, rider_ids, constructor_id, created_at, race_id)| {
                Ok(TeamSnapshot {
                    id,
                    participant_id,
                    rider_ids: serde_json::from_str(&rider_ids)
                        .with_context(|| format!("invalid rider id list in snapshot {id}"))?,
                    constructor_id,
                    created_at: parse_timestamp(&created_at)?,
                    race_id,
                })
            })
            .collect()
    }

    pub fn load_season_points(&self) -> Result<SeasonPoints> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT race_id, rider_id, main, sprint FROM round_points")
            .context("failed to prepare points query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            })
            .context("failed to query round points")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read round point rows")?;

        let mut season = SeasonPoints::new();
        for (race_id, rider_id, main, sprint) in rows {
            season
                .entry(race_id)
                .or_default()
                .insert(rider_id, RoundPoints::new(main, sprint));
        }
        Ok(season)
    }

    pub fn load_settings(&self) -> Result<LeagueSettings> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = 'market_deadline'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query market deadline")?;

        let market_deadline = match raw {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        };

        Ok(LeagueSettings { market_deadline })
    }

    // ------------------------------------------------------------------
    // Season setup / admin edits
    // ------------------------------------------------------------------

    /// Insert a rider. The given price doubles as the immutable
    /// `initial_price` anchor. Returns the new rider id.
    pub fn insert_rider(
        &self,
        name: &str,
        team: &str,
        bike: &str,
        price: i64,
        constructor_id: Option<i64>,
        is_official: bool,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "INSERT INTO riders (name, team, bike, price, initial_price, constructor_id, is_official)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6)
             RETURNING id",
            params![name, team, bike, price, constructor_id, is_official],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to insert rider '{name}'"))
    }

    /// Insert a constructor. The given price doubles as `initial_price`.
    pub fn insert_constructor(&self, name: &str, price: i64) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "INSERT INTO constructors (name, price, initial_price)
             VALUES (?1, ?2, ?2)
             RETURNING id",
            params![name, price],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to insert constructor '{name}'"))
    }

    pub fn insert_race(
        &self,
        round: u32,
        gp_name: &str,
        location: &str,
        race_date: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "INSERT INTO races (round, gp_name, location, race_date)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
            params![round, gp_name, location, race_date.to_rfc3339()],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to insert race '{gp_name}'"))
    }

    pub fn insert_participant(&self, name: &str) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "INSERT INTO participants (name) VALUES (?1) RETURNING id",
            params![name],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to insert participant '{name}'"))
    }

    /// Admin override: set a rider's current price directly, bypassing the
    /// price engine. `initial_price` is left untouched.
    pub fn set_rider_price(&self, rider_id: i64, price: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE riders SET price = ?1 WHERE id = ?2",
                params![price, rider_id],
            )
            .context("failed to update rider price")?;
        if changed == 0 {
            bail!("no rider with id {rider_id}");
        }
        Ok(())
    }

    /// Admin override: set a constructor's current price directly.
    pub fn set_constructor_price(&self, constructor_id: i64, price: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE constructors SET price = ?1 WHERE id = ?2",
                params![price, constructor_id],
            )
            .context("failed to update constructor price")?;
        if changed == 0 {
            bail!("no constructor with id {constructor_id}");
        }
        Ok(())
    }

    /// Admin edit: set or clear a rider's condition (injury) flag.
    pub fn set_rider_condition(&self, rider_id: i64, condition: Option<&str>) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE riders SET condition = ?1 WHERE id = ?2",
                params![condition, rider_id],
            )
            .context("failed to update rider condition")?;
        if changed == 0 {
            bail!("no rider with id {rider_id}");
        }
        Ok(())
    }

    /// Set (or clear, with `None`) the global market deadline.
    pub fn set_market_deadline(&self, deadline: Option<DateTime<Utc>>) -> Result<()> {
        let conn = self.conn();
        match deadline {
            Some(ts) => conn
                .execute(
                    "INSERT INTO settings (key, value) VALUES ('market_deadline', ?1)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![ts.to_rfc3339()],
                )
                .context("failed to store market deadline")?,
            None => conn
                .execute("DELETE FROM settings WHERE key = 'market_deadline'", [])
                .context("failed to clear market deadline")?,
        };
        Ok(())
    }

    /// Remove a participant and, in the same transaction, every snapshot
    /// that depends on them.
    pub fn delete_participant(&self, participant_id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin participant delete")?;
        tx.execute(
            "DELETE FROM team_snapshots WHERE participant_id = ?1",
            params![participant_id],
        )
        .context("failed to delete participant snapshots")?;
        let changed = tx
            .execute(
                "DELETE FROM participants WHERE id = ?1",
                params![participant_id],
            )
            .context("failed to delete participant")?;
        if changed == 0 {
            bail!("no participant with id {participant_id}");
        }
        tx.commit().context("failed to commit participant delete")
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Append a team snapshot after validating it against the league rules:
    /// a non-empty, duplicate-free rider list within the roster size, every
    /// id known, at most one (existing) constructor, and total cost within
    /// the budget cap. Snapshots are append-only; nothing here ever updates
    /// or deletes an existing row.
    pub fn save_snapshot(
        &self,
        participant_id: i64,
        rider_ids: &[i64],
        constructor_id: Option<i64>,
        created_at: DateTime<Utc>,
        race_id: Option<i64>,
        league: &LeagueConfig,
    ) -> Result<i64> {
        if rider_ids.is_empty() {
            bail!("a team snapshot needs at least one rider");
        }
        if rider_ids.len() > league.roster_size {
            bail!(
                "roster has {} riders but the limit is {}",
                rider_ids.len(),
                league.roster_size
            );
        }
        let mut seen = std::collections::HashSet::new();
        for &id in rider_ids {
            if !seen.insert(id) {
                bail!("rider {id} appears twice in the roster");
            }
        }
        if constructor_id.is_some() && !league.has_constructors {
            bail!("this league does not roster constructors");
        }

        let conn = self.conn();

        let mut cost: i64 = 0;
        for &id in rider_ids {
            let price: Option<i64> = conn
                .query_row("SELECT price FROM riders WHERE id = ?1", params![id], |r| {
                    r.get(0)
                })
                .optional()
                .context("failed to look up rider price")?;
            match price {
                Some(p) => cost += p,
                None => bail!("no rider with id {id}"),
            }
        }
        if let Some(cid) = constructor_id {
            let price: Option<i64> = conn
                .query_row(
                    "SELECT price FROM constructors WHERE id = ?1",
                    params![cid],
                    |r| r.get(0),
                )
                .optional()
                .context("failed to look up constructor price")?;
            match price {
                Some(p) => cost += p,
                None => bail!("no constructor with id {cid}"),
            }
        }
        if cost > league.budget {
            bail!("roster costs {cost} but the budget cap is {}", league.budget);
        }

        let rider_json =
            serde_json::to_string(rider_ids).context("failed to serialize rider ids")?;
        conn.query_row(
            "INSERT INTO team_snapshots (participant_id, rider_ids, constructor_id, created_at, race_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
            params![
                participant_id,
                rider_json,
                constructor_id,
                created_at.to_rfc3339(),
                race_id
            ],
            |row| row.get(0),
        )
        .context("failed to append team snapshot")
    }

    // ------------------------------------------------------------------
    // Race results
    // ------------------------------------------------------------------

    /// Upsert one race's results in a single transaction. Re-importing a
    /// corrected sheet overwrites the previous rows per (race, rider).
    pub fn upsert_round_points(
        &self,
        race_id: i64,
        points: &[(i64, RoundPoints)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin results transaction")?;
        for &(rider_id, round) in points {
            tx.execute(
                "INSERT INTO round_points (race_id, rider_id, main, sprint)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(race_id, rider_id) DO UPDATE SET
                    main   = excluded.main,
                    sprint = excluded.sprint",
                params![race_id, rider_id, round.main, round.sprint],
            )
            .context("failed to upsert round points")?;
        }
        tx.commit().context("failed to commit results")
    }

    // ------------------------------------------------------------------
    // Price adjustment persistence
    // ------------------------------------------------------------------

    /// Apply a price-adjustment diff atomically: every changed price is
    /// written and every processed race is marked `prices_adjusted` in one
    /// transaction, preserving the idempotence gate.
    pub fn apply_price_adjustment(&self, adjustment: &PriceAdjustment) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin price adjustment transaction")?;

        for update in &adjustment.rider_prices {
            tx.execute(
                "UPDATE riders SET price = ?1 WHERE id = ?2",
                params![update.new_price, update.id],
            )
            .context("failed to write rider price")?;
        }
        for update in &adjustment.constructor_prices {
            tx.execute(
                "UPDATE constructors SET price = ?1 WHERE id = ?2",
                params![update.new_price, update.id],
            )
            .context("failed to write constructor price")?;
        }
        for race_id in &adjustment.processed_race_ids {
            tx.execute(
                "UPDATE races SET prices_adjusted = 1 WHERE id = ?1",
                params![race_id],
            )
            .context("failed to mark race as processed")?;
        }

        tx.commit().context("failed to commit price adjustment")
    }
}

/// Parse an RFC 3339 timestamp stored at the database boundary.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp '{raw}' in database"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::market::PriceUpdate;
    use chrono::TimeZone;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    /// Helper: league rules used across all db tests.
    fn test_league() -> LeagueConfig {
        LeagueConfig {
            name: "Test League".into(),
            sport: "motogp".into(),
            roster_size: 3,
            budget: 500,
            has_constructors: true,
            has_sprint_points: true,
        }
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        for expected in [
            "riders",
            "constructors",
            "races",
            "participants",
            "team_snapshots",
            "round_points",
            "settings",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    // ------------------------------------------------------------------
    // Entity round trips
    // ------------------------------------------------------------------

    #[test]
    fn rider_round_trip() {
        let db = test_db();
        let ducati = db.insert_constructor("Ducati", 350).unwrap();
        let id = db
            .insert_rider("Pecco Bagnaia", "Ducati", "Desmosedici", 280, Some(ducati), true)
            .unwrap();
        db.insert_rider("Test Wildcard", "Ducati", "Desmosedici", 40, None, false)
            .unwrap();
        db.set_rider_condition(id, Some("shoulder injury")).unwrap();

        let riders = db.load_riders().unwrap();
        assert_eq!(riders.len(), 2);
        assert_eq!(riders[0].name, "Pecco Bagnaia");
        assert_eq!(riders[0].price, 280);
        assert_eq!(riders[0].initial_price, 280);
        assert_eq!(riders[0].condition.as_deref(), Some("shoulder injury"));
        assert_eq!(riders[0].constructor_id, Some(ducati));
        assert!(riders[0].is_official);
        assert!(riders[1].constructor_id.is_none());
        assert!(!riders[1].is_official);
    }

    #[test]
    fn race_round_trip_preserves_date_and_flag() {
        let db = test_db();
        db.insert_race(1, "Qatar GP", "Lusail", ts(2, 18)).unwrap();
        db.insert_race(2, "Americas GP", "Austin", ts(16, 19)).unwrap();

        let races = db.load_races().unwrap();
        assert_eq!(races.len(), 2);
        assert_eq!(races[0].gp_name, "Qatar GP");
        assert_eq!(races[0].race_date, ts(2, 18));
        assert!(!races[0].prices_adjusted);
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    #[test]
    fn snapshot_round_trip() {
        let db = test_db();
        let league = test_league();
        let c = db.insert_constructor("Aprilia", 100).unwrap();
        let r1 = db.insert_rider("Rider A", "Aprilia", "", 100, Some(c), true).unwrap();
        let r2 = db.insert_rider("Rider B", "Aprilia", "", 80, Some(c), true).unwrap();
        let p = db.insert_participant("Alice").unwrap();

        let id = db
            .save_snapshot(p, &[r1, r2], Some(c), ts(1, 12), None, &league)
            .unwrap();

        let snapshots = db.load_snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, id);
        assert_eq!(snapshots[0].participant_id, p);
        assert_eq!(snapshots[0].rider_ids, vec![r1, r2]);
        assert_eq!(snapshots[0].constructor_id, Some(c));
        assert_eq!(snapshots[0].created_at, ts(1, 12));
        assert_eq!(snapshots[0].race_id, None);
    }

    #[test]
    fn save_snapshot_rejects_rule_violations() {
        let db = test_db();
        let league = test_league();
        let r1 = db.insert_rider("Rider A", "T", "", 100, None, true).unwrap();
        let r2 = db.insert_rider("Rider B", "T", "", 100, None, true).unwrap();
        let r3 = db.insert_rider("Rider C", "T", "", 100, None, true).unwrap();
        let r4 = db.insert_rider("Rider D", "T", "", 400, None, true).unwrap();
        let p = db.insert_participant("Alice").unwrap();

        // Empty roster
        assert!(db.save_snapshot(p, &[], None, ts(1, 0), None, &league).is_err());
        // Too many riders
        assert!(db
            .save_snapshot(p, &[r1, r2, r3, r4], None, ts(1, 0), None, &league)
            .is_err());
        // Duplicate rider
        assert!(db
            .save_snapshot(p, &[r1, r1], None, ts(1, 0), None, &league)
            .is_err());
        // Unknown rider
        assert!(db
            .save_snapshot(p, &[9999], None, ts(1, 0), None, &league)
            .is_err());
        // Over budget (100 + 100 + 400 > 500)
        assert!(db
            .save_snapshot(p, &[r1, r2, r4], None, ts(1, 0), None, &league)
            .is_err());
        // Unknown constructor
        assert!(db
            .save_snapshot(p, &[r1], Some(42), ts(1, 0), None, &league)
            .is_err());

        // A legal roster still saves after all the rejections.
        assert!(db
            .save_snapshot(p, &[r1, r2, r3], None, ts(1, 0), None, &league)
            .is_ok());
        assert_eq!(db.load_snapshots().unwrap().len(), 1);
    }

    // ------------------------------------------------------------------
    // Round points
    // ------------------------------------------------------------------

    #[test]
    fn upsert_round_points_overwrites() {
        let db = test_db();
        let race = db.insert_race(1, "Qatar GP", "Lusail", ts(2, 18)).unwrap();
        let rider = db.insert_rider("Rider A", "T", "", 100, None, true).unwrap();

        db.upsert_round_points(race, &[(rider, RoundPoints::new(20, 9))])
            .unwrap();
        db.upsert_round_points(race, &[(rider, RoundPoints::new(25, 12))])
            .unwrap();

        let season = db.load_season_points().unwrap();
        assert_eq!(season[&race][&rider], RoundPoints::new(25, 12));
    }

    // ------------------------------------------------------------------
    // Price adjustment
    // ------------------------------------------------------------------

    #[test]
    fn apply_price_adjustment_writes_and_marks_atomically() {
        let db = test_db();
        let rider = db.insert_rider("Rider A", "T", "", 100, None, true).unwrap();
        let constructor = db.insert_constructor("Ducati", 300).unwrap();
        let race = db.insert_race(1, "Qatar GP", "Lusail", ts(2, 18)).unwrap();

        let adjustment = PriceAdjustment {
            rider_prices: vec![PriceUpdate {
                id: rider,
                old_price: 100,
                new_price: 130,
            }],
            constructor_prices: vec![PriceUpdate {
                id: constructor,
                old_price: 300,
                new_price: 280,
            }],
            processed_race_ids: vec![race],
        };
        db.apply_price_adjustment(&adjustment).unwrap();

        assert_eq!(db.load_riders().unwrap()[0].price, 130);
        assert_eq!(db.load_constructors().unwrap()[0].price, 280);
        assert!(db.load_races().unwrap()[0].prices_adjusted);
        // Initial price anchors never move.
        assert_eq!(db.load_riders().unwrap()[0].initial_price, 100);
    }

    // ------------------------------------------------------------------
    // Settings / participants
    // ------------------------------------------------------------------

    #[test]
    fn market_deadline_round_trip() {
        let db = test_db();
        assert!(db.load_settings().unwrap().market_deadline.is_none());

        db.set_market_deadline(Some(ts(10, 12))).unwrap();
        assert_eq!(db.load_settings().unwrap().market_deadline, Some(ts(10, 12)));

        db.set_market_deadline(None).unwrap();
        assert!(db.load_settings().unwrap().market_deadline.is_none());
    }

    #[test]
    fn delete_participant_cascades_to_snapshots() {
        let db = test_db();
        let league = test_league();
        let r = db.insert_rider("Rider A", "T", "", 100, None, true).unwrap();
        let p = db.insert_participant("Alice").unwrap();
        db.save_snapshot(p, &[r], None, ts(1, 0), None, &league).unwrap();

        db.delete_participant(p).unwrap();
        assert!(db.load_participants().unwrap().is_empty());
        assert!(db.load_snapshots().unwrap().is_empty());
    }
}
