// League engine entry point.
//
// Startup sequence:
// 1. Parse CLI arguments
// 2. Initialize tracing (log to file, not the terminal)
// 3. Load config
// 4. Open database
// 5. Dispatch the subcommand against the engine

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use paddock_engine::config::{self, Config};
use paddock_engine::db::Database;
use paddock_engine::engine::dream_team::compute_dream_team;
use paddock_engine::engine::market::adjust_prices;
use paddock_engine::engine::resolve::{resolve_latest_team, resolve_team, ResolvedRoster};
use paddock_engine::engine::score::score_roster;
use paddock_engine::engine::standings::{compute_standings, league_stats, StandingsView};
use paddock_engine::import;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "paddock", about = "Fantasy GP scoring and market engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the leaderboard, overall or for a single race.
    Standings {
        #[arg(long)]
        race: Option<i64>,
    },
    /// Show league-wide statistics.
    Stats,
    /// Run the market price adjustment over unprocessed past races.
    AdjustPrices,
    /// Compute the best greedy roster for one race's results.
    DreamTeam {
        #[arg(long)]
        race: i64,
    },
    /// Import a race's results from a CSV sheet.
    ImportResults {
        #[arg(long)]
        race: i64,
        /// CSV path; defaults to `<results_dir>/round_<round>.csv`.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Save a participant's team as a new snapshot.
    SaveTeam {
        #[arg(long)]
        participant: i64,
        #[arg(long, value_delimiter = ',')]
        riders: Vec<i64>,
        #[arg(long)]
        constructor: Option<i64>,
        /// Race this roster targets, when known.
        #[arg(long)]
        race: Option<i64>,
    },
    /// Show a participant's roster, current or as of a race.
    Team {
        #[arg(long)]
        participant: i64,
        #[arg(long)]
        race: Option<i64>,
    },
    /// Admin: set an entity's price directly.
    SetPrice {
        #[arg(long)]
        rider: Option<i64>,
        #[arg(long)]
        constructor: Option<i64>,
        #[arg(long)]
        price: i64,
    },
    /// Admin: set or clear a rider's condition flag.
    SetCondition {
        #[arg(long)]
        rider: i64,
        /// Omit to clear the flag.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Admin: set or clear the market deadline (RFC 3339).
    SetDeadline {
        #[arg(long)]
        when: Option<String>,
    },
    /// Admin: register a rider.
    AddRider {
        #[arg(long)]
        name: String,
        #[arg(long)]
        team: String,
        #[arg(long, default_value = "")]
        bike: String,
        #[arg(long)]
        price: i64,
        #[arg(long)]
        constructor: Option<i64>,
        /// Mark the entry as a wildcard/reserve ride rather than a
        /// full-grid one.
        #[arg(long)]
        wildcard: bool,
    },
    /// Admin: register a constructor.
    AddConstructor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: i64,
    },
    /// Admin: register a race.
    AddRace {
        #[arg(long)]
        round: u32,
        #[arg(long)]
        gp: String,
        #[arg(long)]
        location: String,
        /// Race date, RFC 3339.
        #[arg(long)]
        date: String,
    },
    /// Admin: register a participant.
    AddParticipant {
        #[arg(long)]
        name: String,
    },
    /// Admin: remove a participant and their snapshot history.
    RemoveParticipant {
        #[arg(long)]
        participant: i64,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Parse CLI arguments
    let cli = Cli::parse();

    // 2. Initialize tracing
    init_tracing()?;

    // 3. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, roster of {}, budget {}",
        config.league.name, config.league.roster_size, config.league.budget
    );

    // 4. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;

    // 5. Dispatch
    run_command(cli.command, &config, &db)
}

fn run_command(command: Command, config: &Config, db: &Database) -> anyhow::Result<()> {
    match command {
        Command::Standings { race } => cmd_standings(config, db, race),
        Command::Stats => cmd_stats(config, db),
        Command::AdjustPrices => cmd_adjust_prices(config, db),
        Command::DreamTeam { race } => cmd_dream_team(config, db, race),
        Command::ImportResults { race, file } => cmd_import_results(config, db, race, file),
        Command::SaveTeam {
            participant,
            riders,
            constructor,
            race,
        } => cmd_save_team(config, db, participant, &riders, constructor, race),
        Command::Team { participant, race } => cmd_team(config, db, participant, race),
        Command::SetPrice {
            rider,
            constructor,
            price,
        } => cmd_set_price(db, rider, constructor, price),
        Command::SetCondition { rider, reason } => {
            db.set_rider_condition(rider, reason.as_deref())?;
            println!("Condition updated for rider {rider}.");
            Ok(())
        }
        Command::SetDeadline { when } => cmd_set_deadline(db, when),
        Command::AddRider {
            name,
            team,
            bike,
            price,
            constructor,
            wildcard,
        } => {
            let id = db.insert_rider(&name, &team, &bike, price, constructor, !wildcard)?;
            println!("Rider '{name}' registered with id {id}.");
            Ok(())
        }
        Command::AddConstructor { name, price } => {
            let id = db.insert_constructor(&name, price)?;
            println!("Constructor '{name}' registered with id {id}.");
            Ok(())
        }
        Command::AddRace {
            round,
            gp,
            location,
            date,
        } => {
            let date = parse_rfc3339(&date)?;
            let id = db.insert_race(round, &gp, &location, date)?;
            println!("Race '{gp}' (round {round}) registered with id {id}.");
            Ok(())
        }
        Command::AddParticipant { name } => {
            let id = db.insert_participant(&name)?;
            println!("Participant '{name}' registered with id {id}.");
            Ok(())
        }
        Command::RemoveParticipant { participant } => {
            db.delete_participant(participant)?;
            println!("Participant {participant} removed, snapshots included.");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_standings(config: &Config, db: &Database, race: Option<i64>) -> anyhow::Result<()> {
    let participants = db.load_participants()?;
    let races = db.load_races()?;
    let snapshots = db.load_snapshots()?;
    let season = db.load_season_points()?;
    let riders = db.load_riders()?;
    let constructors = db.load_constructors()?;

    let view = match race {
        Some(id) => StandingsView::Race(id),
        None => StandingsView::General,
    };
    let rows = compute_standings(
        view,
        &participants,
        &races,
        &snapshots,
        &season,
        &riders,
        &constructors,
        &config.league,
    );

    if rows.is_empty() {
        println!("No participants yet.");
        return Ok(());
    }
    for (rank, row) in rows.iter().enumerate() {
        let name = participants
            .iter()
            .find(|p| p.id == row.participant_id)
            .map_or("?", |p| p.name.as_str());
        println!("{:>3}. {:<24} {:>8.1}", rank + 1, name, row.score);
    }
    Ok(())
}

fn cmd_stats(config: &Config, db: &Database) -> anyhow::Result<()> {
    let participants = db.load_participants()?;
    let snapshots = db.load_snapshots()?;
    let season = db.load_season_points()?;
    let riders = db.load_riders()?;
    let constructors = db.load_constructors()?;

    let stats = league_stats(
        &participants,
        &snapshots,
        &season,
        &riders,
        &constructors,
        &config.league,
    );

    let rider_name = |id: i64| {
        riders
            .iter()
            .find(|r| r.id == id)
            .map_or("?".to_string(), |r| r.name.clone())
    };

    match &stats.most_selected_rider {
        Some(s) => println!(
            "Most selected rider:       {} ({:.0}% of rosters)",
            rider_name(s.id),
            s.percent
        ),
        None => println!("Most selected rider:       -"),
    }
    if config.league.has_constructors {
        match &stats.most_selected_constructor {
            Some(s) => {
                let name = constructors
                    .iter()
                    .find(|c| c.id == s.id)
                    .map_or("?", |c| c.name.as_str());
                println!(
                    "Most selected constructor: {} ({:.0}% of rosters)",
                    name, s.percent
                );
            }
            None => println!("Most selected constructor: -"),
        }
    }
    match &stats.mvp {
        Some(m) => println!(
            "Season MVP:                {} ({} pts)",
            rider_name(m.rider_id),
            m.points
        ),
        None => println!("Season MVP:                -"),
    }
    match &stats.hidden_gem {
        Some(g) => println!(
            "Hidden gem:                {} ({} pts, {:.2} pts/price)",
            rider_name(g.rider_id),
            g.points,
            g.points_per_price
        ),
        None => println!("Hidden gem:                -"),
    }
    println!("Average roster cost:       {:.1}", stats.average_roster_cost);
    Ok(())
}

fn cmd_adjust_prices(config: &Config, db: &Database) -> anyhow::Result<()> {
    let races = db.load_races()?;
    let riders = db.load_riders()?;
    let constructors = db.load_constructors()?;
    let participants = db.load_participants()?;
    let snapshots = db.load_snapshots()?;

    let Some(adjustment) = adjust_prices(
        Utc::now(),
        &races,
        &riders,
        &constructors,
        &participants,
        &snapshots,
        &config.league,
    ) else {
        println!("No unprocessed races; prices unchanged.");
        return Ok(());
    };

    db.apply_price_adjustment(&adjustment)
        .context("failed to persist price adjustment")?;

    info!(
        races = adjustment.processed_race_ids.len(),
        rider_changes = adjustment.rider_prices.len(),
        constructor_changes = adjustment.constructor_prices.len(),
        "price adjustment applied"
    );
    println!(
        "Processed {} race(s).",
        adjustment.processed_race_ids.len()
    );
    for update in &adjustment.rider_prices {
        let name = riders
            .iter()
            .find(|r| r.id == update.id)
            .map_or("?", |r| r.name.as_str());
        println!(
            "  {:<24} {:>6} -> {:<6}",
            name, update.old_price, update.new_price
        );
    }
    for update in &adjustment.constructor_prices {
        let name = constructors
            .iter()
            .find(|c| c.id == update.id)
            .map_or("?", |c| c.name.as_str());
        println!(
            "  {:<24} {:>6} -> {:<6}",
            name, update.old_price, update.new_price
        );
    }
    Ok(())
}

fn cmd_dream_team(config: &Config, db: &Database, race_id: i64) -> anyhow::Result<()> {
    let riders = db.load_riders()?;
    let constructors = db.load_constructors()?;
    let season = db.load_season_points()?;

    let Some(points) = season.get(&race_id) else {
        println!("No results recorded for race {race_id} yet.");
        return Ok(());
    };

    let team = compute_dream_team(
        points,
        &riders,
        &constructors,
        config.league.budget,
        config.league.roster_size,
        &config.league,
    );

    match team {
        Some(team) => {
            // Greedy search; the best achievable team it found, not a
            // guaranteed global optimum.
            println!("Dream team (score {:.1}, cost {}):", team.score, team.cost);
            for id in &team.rider_ids {
                let name = riders
                    .iter()
                    .find(|r| r.id == *id)
                    .map_or("?", |r| r.name.as_str());
                println!("  {name}");
            }
            if let Some(cid) = team.constructor_id {
                let name = constructors
                    .iter()
                    .find(|c| c.id == cid)
                    .map_or("?", |c| c.name.as_str());
                println!("  [{name}]");
            }
        }
        None => println!("No legal roster fits the budget for race {race_id}."),
    }
    Ok(())
}

fn cmd_import_results(
    config: &Config,
    db: &Database,
    race_id: i64,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let races = db.load_races()?;
    let Some(race) = races.iter().find(|r| r.id == race_id) else {
        bail!("no race with id {race_id}");
    };

    let path = file.unwrap_or_else(|| {
        PathBuf::from(&config.data_paths.results_dir).join(format!("round_{}.csv", race.round))
    });
    let riders = db.load_riders()?;

    let results = import::load_results(&path, &riders)
        .with_context(|| format!("failed to import results from {}", path.display()))?;
    if results.is_empty() {
        warn!("result sheet {} matched no riders", path.display());
    }
    db.upsert_round_points(race_id, &results)?;
    println!(
        "Imported {} result row(s) for {} (round {}).",
        results.len(),
        race.gp_name,
        race.round
    );
    Ok(())
}

fn cmd_save_team(
    config: &Config,
    db: &Database,
    participant: i64,
    riders: &[i64],
    constructor: Option<i64>,
    race: Option<i64>,
) -> anyhow::Result<()> {
    let settings = db.load_settings()?;
    let now = Utc::now();
    if !settings.market_open(now) {
        bail!("the market is closed; roster changes are locked");
    }

    let id = db.save_snapshot(participant, riders, constructor, now, race, &config.league)?;
    info!(participant, snapshot = id, "team snapshot saved");
    println!("Team saved (snapshot {id}).");
    Ok(())
}

fn cmd_team(
    config: &Config,
    db: &Database,
    participant: i64,
    race: Option<i64>,
) -> anyhow::Result<()> {
    let snapshots = db.load_snapshots()?;
    let riders = db.load_riders()?;
    let constructors = db.load_constructors()?;

    let roster: ResolvedRoster = match race {
        Some(race_id) => {
            let races = db.load_races()?;
            let Some(race) = races.iter().find(|r| r.id == race_id) else {
                bail!("no race with id {race_id}");
            };
            resolve_team(participant, race, &snapshots)
        }
        None => resolve_latest_team(participant, &snapshots),
    };

    if roster.is_empty() {
        println!("No team on record.");
        return Ok(());
    }
    for id in &roster.rider_ids {
        let name = riders
            .iter()
            .find(|r| r.id == *id)
            .map_or("?", |r| r.name.as_str());
        println!("  {name}");
    }
    if let Some(cid) = roster.constructor_id {
        let name = constructors
            .iter()
            .find(|c| c.id == cid)
            .map_or("?", |c| c.name.as_str());
        println!("  [{name}]");
    }

    // Score the roster at the selected race, when one was given.
    if let Some(race_id) = race {
        let season = db.load_season_points()?;
        if let Some(points) = season.get(&race_id) {
            let score = score_roster(&roster, points, &riders, &constructors, &config.league);
            println!("Score: {:.1}", score.total);
        }
    }
    Ok(())
}

fn cmd_set_price(
    db: &Database,
    rider: Option<i64>,
    constructor: Option<i64>,
    price: i64,
) -> anyhow::Result<()> {
    match (rider, constructor) {
        (Some(id), None) => {
            db.set_rider_price(id, price)?;
            info!(rider = id, price, "admin price override");
            println!("Rider {id} price set to {price}.");
        }
        (None, Some(id)) => {
            db.set_constructor_price(id, price)?;
            info!(constructor = id, price, "admin price override");
            println!("Constructor {id} price set to {price}.");
        }
        _ => bail!("pass exactly one of --rider or --constructor"),
    }
    Ok(())
}

fn cmd_set_deadline(db: &Database, when: Option<String>) -> anyhow::Result<()> {
    match when {
        Some(raw) => {
            let deadline = parse_rfc3339(&raw)?;
            db.set_market_deadline(Some(deadline))?;
            println!("Market deadline set to {deadline}.");
        }
        None => {
            db.set_market_deadline(None)?;
            println!("Market deadline cleared.");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_rfc3339(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{raw}' is not an RFC 3339 timestamp"))
}

/// Initialize tracing to log to a file (not the terminal, which carries
/// the command output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("paddock.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("paddock_engine=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
