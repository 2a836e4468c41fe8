// Race result ingestion from CSV.
//
// Reads admin-exported result sheets: one row per scoring rider with
// `Rider,Main,Sprint` columns. Rows are matched against the rider table by
// name; anything that does not match is skipped with a warning, because
// partial result sheets are the expected common case.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::model::{Rider, RoundPoints};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

/// One raw result row. The Sprint column may be absent entirely in
/// leagues without sprint races. Extra columns are silently absorbed.
#[derive(Debug, Deserialize)]
#[allow(dead_code, non_snake_case)]
struct RawResultRow {
    Rider: String,
    Main: i32,
    #[serde(default)]
    Sprint: i32,
    /// Absorb any extra columns the exporting sheet includes.
    #[serde(flatten)]
    _extra: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Reader-based loader (private, enables testing without temp files)
// ---------------------------------------------------------------------------

fn load_rows_from_reader<R: Read>(rdr: R) -> Result<Vec<RawResultRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawResultRow>() {
        match result {
            Ok(raw) => rows.push(raw),
            Err(e) => warn!("skipping malformed result row: {}", e),
        }
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Public loader
// ---------------------------------------------------------------------------

/// Load one race's results from a CSV file, matching rows to riders by
/// case-insensitive trimmed name. Unknown rider names are skipped with a
/// warning; a later row for the same rider overwrites the earlier one.
pub fn load_results(
    path: &Path,
    riders: &[Rider],
) -> Result<Vec<(i64, RoundPoints)>, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let rows = load_rows_from_reader(file).map_err(|e| ImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;

    let by_name: HashMap<String, i64> = riders
        .iter()
        .map(|r| (r.name.trim().to_lowercase(), r.id))
        .collect();

    let mut points: HashMap<i64, RoundPoints> = HashMap::new();
    for raw in rows {
        let key = raw.Rider.trim().to_lowercase();
        match by_name.get(&key) {
            Some(&rider_id) => {
                points.insert(rider_id, RoundPoints::new(raw.Main, raw.Sprint));
            }
            None => warn!("skipping result row for unknown rider '{}'", raw.Rider.trim()),
        }
    }

    // Deterministic output order for logging and tests.
    let mut results: Vec<(i64, RoundPoints)> = points.into_iter().collect();
    results.sort_by_key(|&(id, _)| id);
    Ok(results)
}
