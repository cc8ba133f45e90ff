use crate::diagnostics::{Diagnostic, DiagnosticReport};
use crate::entities::Designation;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed master CSV columns, followed by one column per visitation year
pub const MASTER_COLUMNS: [&str; 8] = [
    "canonical_id",
    "name",
    "designation",
    "states",
    "latitude",
    "longitude",
    "area_sq_mi",
    "established_date",
];

/// One physical NPS unit after consolidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkRecord {
    pub canonical_id: String,
    pub name: String,
    pub designation: Designation,
    pub states: BTreeSet<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area_sq_mi: Option<f64>,
    pub established_date: Option<NaiveDate>,
    /// Sparse: a missing year was not reported
    pub visits_by_year: BTreeMap<i32, u64>,
}

impl ParkRecord {
    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn visits_in(&self, year: i32) -> Option<u64> {
        self.visits_by_year.get(&year).copied()
    }

    /// Most recent reported year and its count
    pub fn latest_visits(&self) -> Option<(i32, u64)> {
        self.visits_by_year.iter().next_back().map(|(y, v)| (*y, *v))
    }

    /// "ID,MT,WY"
    pub fn states_label(&self) -> String {
        self.states.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Union of all visitation years, ascending
pub fn all_years(records: &[ParkRecord]) -> Vec<i32> {
    let years: BTreeSet<i32> = records
        .iter()
        .flat_map(|r| r.visits_by_year.keys().copied())
        .collect();
    years.into_iter().collect()
}

// ============================================================================
// MASTER CSV
// ============================================================================

fn opt_to_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_master_csv(path: &Path, records: &[ParkRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create master CSV {}", path.display()))?;

    let years = all_years(records);
    let mut header: Vec<String> = MASTER_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(years.iter().map(|y| y.to_string()));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.canonical_id.clone(),
            record.name.clone(),
            record.designation.as_str().to_string(),
            record.states_label(),
            opt_to_cell(record.latitude),
            opt_to_cell(record.longitude),
            opt_to_cell(record.area_sq_mi),
            opt_to_cell(record.established_date.map(|d| d.format(DATE_FORMAT))),
        ];
        row.extend(years.iter().map(|y| opt_to_cell(record.visits_in(*y))));
        writer.write_record(&row)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write master CSV {}", path.display()))?;
    Ok(records.len())
}

fn parse_opt<T: std::str::FromStr>(value: &str, field: &str, line: usize) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<T>()
        .map(Some)
        .map_err(|_| anyhow::anyhow!("line {}: invalid {} '{}'", line, field, value))
}

pub fn load_master_csv(path: &Path) -> Result<Vec<ParkRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read master CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut idx = [0usize; 8];
    for (slot, column) in idx.iter_mut().zip(MASTER_COLUMNS.iter()) {
        *slot = headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                source: "master".to_string(),
                column: column.to_string(),
            })?;
    }
    let years: Vec<(i32, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.parse::<i32>().ok().map(|y| (y, i)))
        .collect();

    let mut records = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let line = row_idx + 2;
        let row = result.with_context(|| format!("Failed to read master CSV line {}", line))?;
        let get = |i: usize| row.get(i).unwrap_or("").trim();

        let states: BTreeSet<String> = get(idx[3])
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        let established_date = match get(idx[7]) {
            "" => None,
            s => Some(
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .with_context(|| format!("line {}: invalid established_date '{}'", line, s))?,
            ),
        };

        let mut visits_by_year = BTreeMap::new();
        for (year, i) in &years {
            if let Some(count) = parse_opt::<u64>(get(*i), "visit count", line)? {
                visits_by_year.insert(*year, count);
            }
        }

        records.push(ParkRecord {
            canonical_id: get(idx[0]).to_string(),
            name: get(idx[1]).to_string(),
            designation: Designation::classify(get(idx[2])),
            states,
            latitude: parse_opt(get(idx[4]), "latitude", line)?,
            longitude: parse_opt(get(idx[5]), "longitude", line)?,
            area_sq_mi: parse_opt(get(idx[6]), "area_sq_mi", line)?,
            established_date,
            visits_by_year,
        });
    }

    Ok(records)
}

// ============================================================================
// SQLITE
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parks (
            position INTEGER PRIMARY KEY,
            canonical_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            designation TEXT NOT NULL,
            states TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            area_sq_mi REAL,
            established_date TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS park_visits (
            canonical_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            visits INTEGER NOT NULL,
            PRIMARY KEY (canonical_id, year)
        )",
        [],
    )?;

    // ==========================================================================
    // Diagnostics Table (audit trail, one run_id per consolidation)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS diagnostics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            run_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            kind TEXT NOT NULL,
            source TEXT NOT NULL,
            line INTEGER,
            subject TEXT NOT NULL,
            message TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_parks_designation ON parks(designation)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_diagnostics_run ON diagnostics(run_id)",
        [],
    )?;

    Ok(())
}

/// Replace the stored master set with `records`
pub fn insert_park_records(conn: &Connection, records: &[ParkRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM park_visits", [])?;
    tx.execute("DELETE FROM parks", [])?;

    for (position, record) in records.iter().enumerate() {
        tx.execute(
            "INSERT INTO parks (
                position, canonical_id, name, designation, states,
                latitude, longitude, area_sq_mi, established_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                position as i64,
                record.canonical_id,
                record.name,
                record.designation.as_str(),
                record.states_label(),
                record.latitude,
                record.longitude,
                record.area_sq_mi,
                record.established_date.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )
        .with_context(|| format!("Failed to insert park {}", record.canonical_id))?;

        for (year, count) in &record.visits_by_year {
            let count = i64::try_from(*count)
                .with_context(|| format!("Visit count too large for {}", record.canonical_id))?;
            tx.execute(
                "INSERT INTO park_visits (canonical_id, year, visits) VALUES (?1, ?2, ?3)",
                params![record.canonical_id, year, count],
            )?;
        }
    }

    tx.commit()?;
    Ok(records.len())
}

/// Store a run's diagnostics under a fresh run id
pub fn insert_diagnostics(conn: &Connection, report: &DiagnosticReport) -> Result<String> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let timestamp = Utc::now().to_rfc3339();

    let tx = conn.unchecked_transaction()?;
    for d in &report.diagnostics {
        tx.execute(
            "INSERT INTO diagnostics (
                event_id, run_id, timestamp, kind, source, line, subject, message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                uuid::Uuid::new_v4().to_string(),
                run_id,
                timestamp,
                d.kind.as_str(),
                d.source,
                d.line.map(|l| l as i64),
                d.subject,
                d.message,
            ],
        )?;
    }
    tx.commit()?;

    Ok(run_id)
}

pub fn get_diagnostics_for_run(conn: &Connection, run_id: &str) -> Result<Vec<Diagnostic>> {
    let mut stmt = conn.prepare(
        "SELECT kind, source, line, subject, message
         FROM diagnostics
         WHERE run_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map(params![run_id], |row| {
            let kind: String = row.get(0)?;
            let line: Option<i64> = row.get(2)?;
            Ok((kind, row.get::<_, String>(1)?, line, row.get::<_, String>(3)?, row.get::<_, String>(4)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(kind, source, line, subject, message)| {
            let kind = serde_json::from_value(serde_json::Value::String(kind.clone()))
                .with_context(|| format!("Unknown diagnostic kind '{}'", kind))?;
            Ok(Diagnostic {
                kind,
                source,
                line: line.map(|l| l as usize),
                subject,
                message,
            })
        })
        .collect()
}

pub fn get_all_park_records(conn: &Connection) -> Result<Vec<ParkRecord>> {
    let mut visits: HashMap<String, BTreeMap<i32, u64>> = HashMap::new();
    {
        let mut stmt = conn.prepare("SELECT canonical_id, year, visits FROM park_visits")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (id, year, count) in rows {
            visits.entry(id).or_default().insert(year, count.max(0) as u64);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT canonical_id, name, designation, states,
                latitude, longitude, area_sq_mi, established_date
         FROM parks
         ORDER BY position",
    )?;

    let records = stmt
        .query_map([], |row| {
            let designation: String = row.get(2)?;
            let states: String = row.get(3)?;
            let established: Option<String> = row.get(7)?;
            let canonical_id: String = row.get(0)?;

            Ok(ParkRecord {
                visits_by_year: visits.remove(&canonical_id).unwrap_or_default(),
                canonical_id,
                name: row.get(1)?,
                designation: Designation::classify(&designation),
                states: states
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect(),
                latitude: row.get(4)?,
                longitude: row.get(5)?,
                area_sq_mi: row.get(6)?,
                established_date: established
                    .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM parks", [], |row| row.get(0))?;

    Ok(count)
}
