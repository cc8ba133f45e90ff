// 🏗️ Source Loaders
// One loader per source. Each reads a delimited file through its column
// mapping and normalizes rows into a small per-source struct. Bad rows are
// skipped and counted; only file-level problems abort the load.

use crate::config::{
    delimiter_byte, AcreageSource, AreaUnit, EstablishedSource, IdentitySource, VisitationSource,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::entities::{Designation, StateRegistry};
use crate::error::PipelineError;
use anyhow::Result;
use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceType - which of the four inputs a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Identity,
    Acreage,
    Established,
    Visitation,
}

impl SourceType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceType::Identity => "Park sites",
            SourceType::Acreage => "Acreage report",
            SourceType::Established => "Establishment dates",
            SourceType::Visitation => "Visitation report",
        }
    }

    /// Short code used in diagnostics and config sections
    pub fn code(&self) -> &'static str {
        match self {
            SourceType::Identity => "identity",
            SourceType::Acreage => "acreage",
            SourceType::Established => "established",
            SourceType::Visitation => "visitation",
        }
    }
}

/// What the reconciler needs from an auxiliary row, whatever its source
pub trait SourceKey {
    fn raw_name(&self) -> &str;
    fn states(&self) -> &BTreeSet<String>;
    fn line_number(&self) -> usize;
}

/// Authoritative park site row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRow {
    pub park_code: Option<String>,
    pub name: String,
    pub designation: Designation,
    pub states: BTreeSet<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcreageRow {
    pub raw_name: String,
    pub states: BTreeSet<String>,
    pub area_sq_mi: f64,
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishedRow {
    pub raw_name: String,
    pub states: BTreeSet<String>,
    pub established: NaiveDate,
    pub line_number: usize,
}

/// Visits for one park. Long-layout files produce one row per (park, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitationRow {
    pub raw_name: String,
    pub states: BTreeSet<String>,
    pub visits: BTreeMap<i32, u64>,
    pub line_number: usize,
}

macro_rules! impl_source_key {
    ($row:ty) => {
        impl SourceKey for $row {
            fn raw_name(&self) -> &str {
                &self.raw_name
            }
            fn states(&self) -> &BTreeSet<String> {
                &self.states
            }
            fn line_number(&self) -> usize {
                self.line_number
            }
        }
    };
}

impl_source_key!(AcreageRow);
impl_source_key!(EstablishedRow);
impl_source_key!(VisitationRow);

/// A malformed row the loader dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub line_number: usize,
    pub raw_name: String,
    pub reason: String,
}

/// LoadOutcome - normalized rows plus everything that was skipped
#[derive(Debug, Clone)]
pub struct LoadOutcome<R> {
    pub source_type: SourceType,
    pub source_file: String,
    pub rows: Vec<R>,
    pub skipped: Vec<SkippedRow>,
}

impl<R> LoadOutcome<R> {
    fn new(source_type: SourceType, source_file: String) -> Self {
        LoadOutcome {
            source_type,
            source_file,
            rows: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, line_number: usize, raw_name: &str, reason: String) {
        log::warn!(
            "{}:{} skipped '{}': {}",
            self.source_type.code(),
            line_number,
            raw_name,
            reason
        );
        self.skipped.push(SkippedRow {
            line_number,
            raw_name: raw_name.to_string(),
            reason,
        });
    }

    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.skipped
            .iter()
            .map(|s| {
                Diagnostic::new(
                    DiagnosticKind::RowSkipped,
                    self.source_type.code(),
                    Some(s.line_number),
                    &s.raw_name,
                    s.reason.clone(),
                )
            })
            .collect()
    }
}

// ============================================================================
// LOADER TRAIT
// ============================================================================

/// SourceLoader - one implementation per input
pub trait SourceLoader {
    type Row;

    /// Read and normalize a file. Errors only for file-level problems
    /// (missing file, unreadable header, missing required column).
    fn load(&self, file_path: &Path) -> Result<LoadOutcome<Self::Row>>;

    fn source_type(&self) -> SourceType;

    /// Loader version (for provenance in the audit table)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// SHARED READING HELPERS
// ============================================================================

/// Open reader + resolved header row
struct SourceTable {
    source: SourceType,
    headers: Vec<String>,
    reader: csv::Reader<File>,
}

impl SourceTable {
    fn open(source: SourceType, file_path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(file_path).map_err(|e| PipelineError::Io {
            path: file_path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::Io {
                path: file_path.display().to_string(),
                message: format!("unreadable header: {}", e),
            })?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        Ok(SourceTable {
            source,
            headers,
            reader,
        })
    }

    fn position(&self, column: &str) -> Option<usize> {
        let wanted = column.trim();
        self.headers
            .iter()
            .position(|h| h == wanted)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(wanted)))
    }

    /// Required column: missing is fatal
    fn required(&self, column: &str) -> Result<usize, PipelineError> {
        self.position(column).ok_or_else(|| PipelineError::MissingColumn {
            source: self.source.code().to_string(),
            column: column.to_string(),
        })
    }

    /// Optional column: missing leaves the field null
    fn optional(&self, column: Option<&String>) -> Option<usize> {
        let column = column?;
        let idx = self.position(column);
        if idx.is_none() {
            log::warn!(
                "{}: optional column '{}' not found, field left empty",
                self.source.code(),
                column
            );
        }
        idx
    }

    /// Iterate records as (line number, record or read error)
    fn rows(&mut self) -> impl Iterator<Item = (usize, Result<StringRecord, String>)> + '_ {
        self.reader.records().enumerate().map(|(idx, result)| match result {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(idx + 2);
                (line, Ok(record))
            }
            Err(e) => (idx + 2, Err(e.to_string())),
        })
    }
}

fn source_file_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.csv")
        .to_string()
}

fn cell<'a>(record: &'a StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Parse a report number: "1,234.5", "$12", "" (None)
pub fn parse_number(value: &str) -> Result<Option<f64>, String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(format!("unparseable number '{}'", value)),
    }
}

/// Parse a non-negative whole count. Spreadsheet exports write "1234.0".
pub fn parse_count(value: &str) -> Result<Option<u64>, String> {
    match parse_number(value) {
        Ok(Some(n)) if n < 0.0 => Err(format!("negative count '{}'", value)),
        Ok(Some(n)) if n.fract() != 0.0 => Err(format!("fractional count '{}'", value)),
        Ok(Some(n)) => Ok(Some(n as u64)),
        Ok(None) => Ok(None),
        Err(_) => Err(format!("unparseable count '{}'", value)),
    }
}

/// Parse a date, dropping Wikipedia footnote markers ("March 1, 1872[5]")
pub fn parse_date(value: &str, formats: &[String]) -> Result<Option<NaiveDate>, String> {
    let mut cleaned = String::with_capacity(value.len());
    let mut depth = 0;
    for c in value.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => cleaned.push(c),
            _ => {}
        }
    }
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Ok(None);
    }

    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Ok(Some(date));
        }
    }
    Err(format!("unparseable date '{}'", value))
}

/// Parse the API "latLong" cell: "lat:44.59824417, long:-110.5471695"
pub fn parse_lat_long(value: &str) -> Result<Option<(f64, f64)>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let mut lat = None;
    let mut long = None;
    for part in value.split(',') {
        let (key, number) = match part.split_once(':') {
            Some(kv) => kv,
            None => return Err(format!("unparseable lat/long '{}'", value)),
        };
        let number = number
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("unparseable lat/long '{}'", value))?;
        match key.trim().to_lowercase().as_str() {
            "lat" => lat = Some(number),
            "long" | "lng" | "lon" => long = Some(number),
            _ => return Err(format!("unparseable lat/long '{}'", value)),
        }
    }

    match (lat, long) {
        (Some(lat), Some(long)) => Ok(Some((lat, long))),
        _ => Err(format!("incomplete lat/long '{}'", value)),
    }
}

fn check_coordinates(lat: Option<f64>, long: Option<f64>) -> Result<(), String> {
    if let Some(lat) = lat {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {} out of range", lat));
        }
    }
    if let Some(long) = long {
        if !(-180.0..=180.0).contains(&long) {
            return Err(format!("longitude {} out of range", long));
        }
    }
    Ok(())
}

/// Header that names a year column in a wide visitation report
fn year_header(header: &str) -> Option<i32> {
    let header = header.trim();
    let header = header.strip_suffix(".0").unwrap_or(header);
    if header.len() != 4 || !header.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    header.parse().ok()
}

// ============================================================================
// IDENTITY LOADER
// ============================================================================

pub struct IdentityLoader {
    config: IdentitySource,
    states: StateRegistry,
}

impl IdentityLoader {
    pub fn new(config: &IdentitySource) -> Self {
        IdentityLoader {
            config: config.clone(),
            states: StateRegistry::new(),
        }
    }
}

impl SourceLoader for IdentityLoader {
    type Row = IdentityRow;

    fn load(&self, file_path: &Path) -> Result<LoadOutcome<IdentityRow>> {
        let columns = &self.config.columns;
        let mut table = SourceTable::open(
            SourceType::Identity,
            file_path,
            delimiter_byte(&self.config.delimiter),
        )?;

        let name_idx = table.required(&columns.name)?;
        let code_idx = table.optional(columns.code.as_ref());
        let designation_idx = table.optional(columns.designation.as_ref());
        let states_idx = table.optional(columns.states.as_ref());
        let lat_idx = table.optional(columns.latitude.as_ref());
        let long_idx = table.optional(columns.longitude.as_ref());
        let lat_long_idx = table.optional(columns.lat_long.as_ref());

        let mut outcome = LoadOutcome::new(SourceType::Identity, source_file_name(file_path));

        for (line, result) in table.rows() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    outcome.skip(line, "", e);
                    continue;
                }
            };

            let name = cell(&record, Some(name_idx));
            if name.is_empty() {
                outcome.skip(line, name, "empty park name".to_string());
                continue;
            }

            let states = match self.states.parse_states(cell(&record, states_idx)) {
                Ok(states) => states,
                Err(token) => {
                    outcome.skip(line, name, format!("unknown state '{}'", token));
                    continue;
                }
            };

            let coordinates = if lat_idx.is_some() || long_idx.is_some() {
                parse_number(cell(&record, lat_idx)).and_then(|lat| {
                    parse_number(cell(&record, long_idx)).map(|long| (lat, long))
                })
            } else {
                parse_lat_long(cell(&record, lat_long_idx))
                    .map(|pair| (pair.map(|p| p.0), pair.map(|p| p.1)))
            };
            let (latitude, longitude) = match coordinates
                .and_then(|(lat, long)| check_coordinates(lat, long).map(|_| (lat, long)))
            {
                Ok(pair) => pair,
                Err(reason) => {
                    outcome.skip(line, name, reason);
                    continue;
                }
            };

            let park_code = Some(cell(&record, code_idx))
                .filter(|c| !c.is_empty())
                .map(|c| c.to_lowercase());

            outcome.rows.push(IdentityRow {
                park_code,
                name: name.to_string(),
                designation: Designation::classify(cell(&record, designation_idx)),
                states,
                latitude,
                longitude,
                line_number: line,
            });
        }

        log::info!(
            "{}: loaded {} rows, skipped {}",
            outcome.source_file,
            outcome.rows.len(),
            outcome.skip_count()
        );
        Ok(outcome)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Identity
    }
}

// ============================================================================
// ACREAGE LOADER
// ============================================================================

pub struct AcreageLoader {
    config: AcreageSource,
    states: StateRegistry,
}

impl AcreageLoader {
    pub fn new(config: &AcreageSource) -> Self {
        AcreageLoader {
            config: config.clone(),
            states: StateRegistry::new(),
        }
    }

    fn unit(&self) -> AreaUnit {
        self.config.area_unit
    }
}

impl SourceLoader for AcreageLoader {
    type Row = AcreageRow;

    fn load(&self, file_path: &Path) -> Result<LoadOutcome<AcreageRow>> {
        let columns = &self.config.columns;
        let mut table = SourceTable::open(
            SourceType::Acreage,
            file_path,
            delimiter_byte(&self.config.delimiter),
        )?;

        let name_idx = table.required(&columns.name)?;
        let area_idx = table.required(&columns.area)?;
        let states_idx = table.optional(columns.states.as_ref());

        let mut outcome = LoadOutcome::new(SourceType::Acreage, source_file_name(file_path));

        for (line, result) in table.rows() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    outcome.skip(line, "", e);
                    continue;
                }
            };

            let name = cell(&record, Some(name_idx));
            if name.is_empty() {
                outcome.skip(line, name, "empty park name".to_string());
                continue;
            }

            let states = match self.states.parse_states(cell(&record, states_idx)) {
                Ok(states) => states,
                Err(token) => {
                    outcome.skip(line, name, format!("unknown state '{}'", token));
                    continue;
                }
            };

            let area = match parse_number(cell(&record, Some(area_idx))) {
                Ok(Some(area)) if area < 0.0 => {
                    outcome.skip(line, name, format!("negative area {}", area));
                    continue;
                }
                Ok(Some(area)) => area,
                Ok(None) => {
                    outcome.skip(line, name, "empty area".to_string());
                    continue;
                }
                Err(reason) => {
                    outcome.skip(line, name, reason);
                    continue;
                }
            };

            outcome.rows.push(AcreageRow {
                raw_name: name.to_string(),
                states,
                area_sq_mi: self.unit().to_sq_mi(area),
                line_number: line,
            });
        }

        log::info!(
            "{}: loaded {} rows, skipped {}",
            outcome.source_file,
            outcome.rows.len(),
            outcome.skip_count()
        );
        Ok(outcome)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Acreage
    }
}

// ============================================================================
// ESTABLISHMENT DATE LOADER
// ============================================================================

pub struct EstablishedLoader {
    config: EstablishedSource,
    formats: Vec<String>,
    states: StateRegistry,
}

impl EstablishedLoader {
    pub fn new(config: &EstablishedSource) -> Self {
        EstablishedLoader {
            config: config.clone(),
            formats: config.formats(),
            states: StateRegistry::new(),
        }
    }
}

impl SourceLoader for EstablishedLoader {
    type Row = EstablishedRow;

    fn load(&self, file_path: &Path) -> Result<LoadOutcome<EstablishedRow>> {
        let columns = &self.config.columns;
        let mut table = SourceTable::open(
            SourceType::Established,
            file_path,
            delimiter_byte(&self.config.delimiter),
        )?;

        let name_idx = table.required(&columns.name)?;
        let date_idx = table.required(&columns.date)?;
        let states_idx = table.optional(columns.states.as_ref());

        let mut outcome = LoadOutcome::new(SourceType::Established, source_file_name(file_path));

        for (line, result) in table.rows() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    outcome.skip(line, "", e);
                    continue;
                }
            };

            let name = cell(&record, Some(name_idx));
            if name.is_empty() {
                outcome.skip(line, name, "empty park name".to_string());
                continue;
            }

            let states = match self.states.parse_states(cell(&record, states_idx)) {
                Ok(states) => states,
                Err(token) => {
                    outcome.skip(line, name, format!("unknown state '{}'", token));
                    continue;
                }
            };

            let established = match parse_date(cell(&record, Some(date_idx)), &self.formats) {
                Ok(Some(date)) => date,
                Ok(None) => {
                    outcome.skip(line, name, "empty date".to_string());
                    continue;
                }
                Err(reason) => {
                    outcome.skip(line, name, reason);
                    continue;
                }
            };

            outcome.rows.push(EstablishedRow {
                raw_name: name.to_string(),
                states,
                established,
                line_number: line,
            });
        }

        log::info!(
            "{}: loaded {} rows, skipped {}",
            outcome.source_file,
            outcome.rows.len(),
            outcome.skip_count()
        );
        Ok(outcome)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Established
    }
}

// ============================================================================
// VISITATION LOADER
// ============================================================================

pub struct VisitationLoader {
    config: VisitationSource,
    states: StateRegistry,
}

impl VisitationLoader {
    pub fn new(config: &VisitationSource) -> Self {
        VisitationLoader {
            config: config.clone(),
            states: StateRegistry::new(),
        }
    }
}

/// Where the visit counts live in a file
enum VisitLayout {
    /// One row per (park, year)
    Long { year_idx: usize, visits_idx: usize },
    /// One row per park, one column per year
    Wide { years: Vec<(i32, usize)> },
}

impl SourceLoader for VisitationLoader {
    type Row = VisitationRow;

    fn load(&self, file_path: &Path) -> Result<LoadOutcome<VisitationRow>> {
        let columns = &self.config.columns;
        let mut table = SourceTable::open(
            SourceType::Visitation,
            file_path,
            delimiter_byte(&self.config.delimiter),
        )?;

        let name_idx = table.required(&columns.name)?;
        let states_idx = table.optional(columns.states.as_ref());

        let layout = match (&columns.year, &columns.visits) {
            (Some(year), Some(visits)) => VisitLayout::Long {
                year_idx: table.required(year)?,
                visits_idx: table.required(visits)?,
            },
            _ => {
                let mut years: Vec<(i32, usize)> = table
                    .headers
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, h)| year_header(h).map(|y| (y, idx)))
                    .collect();
                if years.is_empty() {
                    return Err(PipelineError::MissingColumn {
                        source: SourceType::Visitation.code().to_string(),
                        column: "<year columns>".to_string(),
                    }
                    .into());
                }
                years.sort();
                VisitLayout::Wide { years }
            }
        };

        let mut outcome = LoadOutcome::new(SourceType::Visitation, source_file_name(file_path));

        for (line, result) in table.rows() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    outcome.skip(line, "", e);
                    continue;
                }
            };

            let name = cell(&record, Some(name_idx));
            if name.is_empty() {
                outcome.skip(line, name, "empty park name".to_string());
                continue;
            }

            let states = match self.states.parse_states(cell(&record, states_idx)) {
                Ok(states) => states,
                Err(token) => {
                    outcome.skip(line, name, format!("unknown state '{}'", token));
                    continue;
                }
            };

            let visits = match &layout {
                VisitLayout::Long {
                    year_idx,
                    visits_idx,
                } => read_long_visits(&record, *year_idx, *visits_idx),
                VisitLayout::Wide { years } => read_wide_visits(&record, years),
            };

            match visits {
                Ok(visits) => outcome.rows.push(VisitationRow {
                    raw_name: name.to_string(),
                    states,
                    visits,
                    line_number: line,
                }),
                Err(reason) => outcome.skip(line, name, reason),
            }
        }

        log::info!(
            "{}: loaded {} rows, skipped {}",
            outcome.source_file,
            outcome.rows.len(),
            outcome.skip_count()
        );
        Ok(outcome)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Visitation
    }
}

fn read_long_visits(
    record: &StringRecord,
    year_idx: usize,
    visits_idx: usize,
) -> Result<BTreeMap<i32, u64>, String> {
    let year_cell = cell(record, Some(year_idx));
    let year = year_header(year_cell).ok_or_else(|| format!("unparseable year '{}'", year_cell))?;

    let count = parse_count(cell(record, Some(visits_idx)))?
        .ok_or_else(|| "empty visit count".to_string())?;

    let mut visits = BTreeMap::new();
    visits.insert(year, count);
    Ok(visits)
}

fn read_wide_visits(
    record: &StringRecord,
    years: &[(i32, usize)],
) -> Result<BTreeMap<i32, u64>, String> {
    let mut visits = BTreeMap::new();
    for (year, idx) in years {
        // Empty cell = year not reported
        if let Some(count) = parse_count(cell(record, Some(*idx)))? {
            visits.insert(*year, count);
        }
    }
    if visits.is_empty() {
        return Err("no visit counts reported".to_string());
    }
    Ok(visits)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AcreageColumns, EstablishedColumns, IdentityColumns, VisitationColumns,
    };
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn identity_config() -> IdentitySource {
        IdentitySource {
            file: "parks.csv".to_string(),
            delimiter: None,
            columns: IdentityColumns {
                code: Some("park_code".to_string()),
                name: "park_name".to_string(),
                designation: Some("designation".to_string()),
                states: Some("states".to_string()),
                latitude: Some("lat".to_string()),
                longitude: Some("long".to_string()),
                lat_long: None,
            },
        }
    }

    fn acreage_config(unit: AreaUnit) -> AcreageSource {
        AcreageSource {
            file: "acreage.csv".to_string(),
            delimiter: None,
            area_unit: unit,
            columns: AcreageColumns {
                name: "Area Name".to_string(),
                states: Some("State".to_string()),
                area: "Gross Area Acres".to_string(),
            },
        }
    }

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_source_type_codes() {
        assert_eq!(SourceType::Identity.code(), "identity");
        assert_eq!(SourceType::Acreage.code(), "acreage");
        assert_eq!(SourceType::Established.code(), "established");
        assert_eq!(SourceType::Visitation.code(), "visitation");
        assert_eq!(SourceType::Visitation.name(), "Visitation report");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234.5"), Ok(Some(1234.5)));
        assert_eq!(parse_number(" $12 "), Ok(Some(12.0)));
        assert_eq!(parse_number(""), Ok(None));
        assert!(parse_number("n/a").is_err());
        assert!(parse_number("inf").is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("4,115,000"), Ok(Some(4_115_000)));
        assert_eq!(parse_count("1234.0"), Ok(Some(1234)));
        assert_eq!(parse_count(""), Ok(None));
        assert!(parse_count("-5").is_err());
        assert!(parse_count("12.5").is_err());
        assert!(parse_count("lots").is_err());
    }

    #[test]
    fn test_parse_date_formats_and_footnotes() {
        let formats: Vec<String> = crate::config::DEFAULT_DATE_FORMATS
            .iter()
            .map(|f| f.to_string())
            .collect();
        let yellowstone = NaiveDate::from_ymd_opt(1872, 3, 1).unwrap();

        assert_eq!(parse_date("1872-03-01", &formats), Ok(Some(yellowstone)));
        assert_eq!(parse_date("March 1, 1872", &formats), Ok(Some(yellowstone)));
        assert_eq!(parse_date("March 1, 1872[5]", &formats), Ok(Some(yellowstone)));
        assert_eq!(parse_date("03/01/1872", &formats), Ok(Some(yellowstone)));
        assert_eq!(parse_date("", &formats), Ok(None));
        assert!(parse_date("sometime in 1872", &formats).is_err());
    }

    #[test]
    fn test_parse_lat_long() {
        assert_eq!(
            parse_lat_long("lat:44.59824417, long:-110.5471695"),
            Ok(Some((44.59824417, -110.5471695)))
        );
        assert_eq!(parse_lat_long(""), Ok(None));
        assert!(parse_lat_long("lat:44.5").is_err());
        assert!(parse_lat_long("44.5,-110.5").is_err());
    }

    #[test]
    fn test_year_header() {
        assert_eq!(year_header("2018"), Some(2018));
        assert_eq!(year_header("1979.0"), Some(1979));
        assert_eq!(year_header("ParkName"), None);
        assert_eq!(year_header("20181"), None);
    }

    #[test]
    fn test_identity_loader_normalizes_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "parks.csv",
            "park_code,park_name,designation,states,lat,long\n\
             YELL,Yellowstone National Park,National Park,\"WY,MT,ID\",44.59824417,-110.5471695\n\
             inup,Inupiat Heritage Center,Heritage Center,AK,,\n",
        );

        let outcome = IdentityLoader::new(&identity_config()).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.skip_count(), 0);

        let yell = &outcome.rows[0];
        assert_eq!(yell.park_code.as_deref(), Some("yell"));
        assert_eq!(yell.designation, Designation::NationalPark);
        assert_eq!(yell.states, set(&["ID", "MT", "WY"]));
        assert_eq!(yell.latitude, Some(44.59824417));
        assert_eq!(yell.line_number, 2);

        let inup = &outcome.rows[1];
        assert_eq!(inup.designation, Designation::OtherDesignation);
        assert_eq!(inup.latitude, None);
        assert_eq!(inup.longitude, None);
    }

    #[test]
    fn test_identity_loader_lat_long_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "api.csv",
            "parkCode,fullName,latLong\n\
             zion,Zion National Park,\"lat:37.29839254, long:-113.0265138\"\n",
        );
        let mut config = identity_config();
        config.columns = IdentityColumns {
            code: Some("parkCode".to_string()),
            name: "fullName".to_string(),
            designation: None,
            states: None,
            latitude: None,
            longitude: None,
            lat_long: Some("latLong".to_string()),
        };

        let outcome = IdentityLoader::new(&config).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].latitude, Some(37.29839254));
        assert_eq!(outcome.rows[0].longitude, Some(-113.0265138));
        assert!(outcome.rows[0].states.is_empty());
    }

    #[test]
    fn test_identity_loader_skips_bad_rows_and_keeps_going() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "parks.csv",
            "park_code,park_name,designation,states,lat,long\n\
             xxxx,,National Park,AK,,\n\
             zion,Zion National Park,National Park,UT,north,-113.0\n\
             nope,Nowhere National Park,National Park,Atlantis,,\n\
             acad,Acadia National Park,National Park,ME,44.3,-68.2\n",
        );

        let outcome = IdentityLoader::new(&identity_config()).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].name, "Acadia National Park");
        assert_eq!(outcome.skip_count(), 3);
        assert_eq!(outcome.skipped[0].line_number, 2);
        assert_eq!(outcome.skipped[0].reason, "empty park name");
        assert!(outcome.skipped[1].reason.contains("unparseable number"));
        assert!(outcome.skipped[2].reason.contains("unknown state 'Atlantis'"));

        let diagnostics = outcome.diagnostics();
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::RowSkipped));
        assert_eq!(diagnostics[1].source, "identity");
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "parks.csv", "code,title\nzion,Zion\n");

        let err = IdentityLoader::new(&identity_config()).load(&path).unwrap_err();
        let err = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(err, PipelineError::MissingColumn { column, .. } if column == "park_name"));
    }

    #[test]
    fn test_missing_optional_column_leaves_field_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "parks.csv", "park_name\nZion National Park\n");

        let outcome = IdentityLoader::new(&identity_config()).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].park_code, None);
        assert_eq!(outcome.rows[0].designation, Designation::OtherDesignation);
        assert!(outcome.rows[0].states.is_empty());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");
        let err = IdentityLoader::new(&identity_config()).load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Io { .. })
        ));
    }

    #[test]
    fn test_acreage_loader_converts_acres() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "acreage.csv",
            "Area Name,State,Gross Area Acres\n\
             Gates of the Arctic NP,AK,\"7,523,897.45\"\n\
             Arches NP,UT,76679.96\n\
             Bad Row NP,UT,-5\n\
             Empty NP,UT,\n",
        );

        let outcome = AcreageLoader::new(&acreage_config(AreaUnit::Acres)).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert!((outcome.rows[0].area_sq_mi - 7_523_897.45 / 640.0).abs() < 1e-9);
        assert_eq!(outcome.rows[0].states, set(&["AK"]));
        assert_eq!(outcome.skip_count(), 2);
        assert!(outcome.skipped[0].reason.contains("negative area"));
        assert_eq!(outcome.skipped[1].reason, "empty area");
    }

    #[test]
    fn test_acreage_loader_tab_delimited_square_miles() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "acreage.tsv",
            "Area Name\tState\tGross Area Acres\nZion NP\tUT\t229.1\n",
        );
        let mut config = acreage_config(AreaUnit::SqMi);
        config.delimiter = Some("tab".to_string());

        let outcome = AcreageLoader::new(&config).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].area_sq_mi, 229.1);
    }

    #[test]
    fn test_established_loader() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "dates.csv",
            "park_name,state,date_established\n\
             Yellowstone,\"Wyoming, Montana, Idaho\",\"March 1, 1872\"\n\
             Zion,Utah,not a date\n",
        );
        let config = EstablishedSource {
            file: "dates.csv".to_string(),
            delimiter: None,
            date_formats: Vec::new(),
            columns: EstablishedColumns {
                name: "park_name".to_string(),
                states: Some("state".to_string()),
                date: "date_established".to_string(),
            },
        };

        let outcome = EstablishedLoader::new(&config).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].states, set(&["ID", "MT", "WY"]));
        assert_eq!(
            outcome.rows[0].established,
            NaiveDate::from_ymd_opt(1872, 3, 1).unwrap()
        );
        assert_eq!(outcome.skip_count(), 1);
        assert_eq!(outcome.skipped[0].raw_name, "Zion");
    }

    #[test]
    fn test_visitation_loader_long_layout() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "visits.csv",
            "ParkName,State,Year,RecreationVisitors\n\
             Zion NP,UT,2017,\"4,504,812\"\n\
             Zion NP,UT,2018,4320033\n\
             Zion NP,UT,20x8,1\n",
        );
        let config = VisitationSource {
            file: "visits.csv".to_string(),
            delimiter: None,
            columns: VisitationColumns {
                name: "ParkName".to_string(),
                states: Some("State".to_string()),
                year: Some("Year".to_string()),
                visits: Some("RecreationVisitors".to_string()),
            },
        };

        let outcome = VisitationLoader::new(&config).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].visits.get(&2017), Some(&4_504_812));
        assert_eq!(outcome.rows[1].visits.get(&2018), Some(&4_320_033));
        assert_eq!(outcome.skip_count(), 1);
        assert!(outcome.skipped[0].reason.contains("unparseable year"));
    }

    #[test]
    fn test_visitation_loader_wide_layout_is_sparse() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "visits.csv",
            "park_name,state,2016,2015,2017\n\
             Acadia NP,ME,3303393,2811184,\n\
             Nothing NP,ME,,,\n",
        );
        let config = VisitationSource {
            file: "visits.csv".to_string(),
            delimiter: None,
            columns: VisitationColumns {
                name: "park_name".to_string(),
                states: Some("state".to_string()),
                year: None,
                visits: None,
            },
        };

        let outcome = VisitationLoader::new(&config).load(&path).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        let years: Vec<i32> = outcome.rows[0].visits.keys().copied().collect();
        assert_eq!(years, vec![2015, 2016]);
        assert_eq!(outcome.skip_count(), 1);
        assert_eq!(outcome.skipped[0].reason, "no visit counts reported");
    }

    #[test]
    fn test_visitation_loader_wide_without_year_columns_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "visits.csv", "park_name,visits\nAcadia NP,5\n");
        let config = VisitationSource {
            file: "visits.csv".to_string(),
            delimiter: None,
            columns: VisitationColumns {
                name: "park_name".to_string(),
                states: None,
                year: None,
                visits: None,
            },
        };

        let err = VisitationLoader::new(&config).load(&path).unwrap_err();
        assert!(err.to_string().contains("<year columns>"));
    }
}
