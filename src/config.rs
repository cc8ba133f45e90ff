// ⚙️ Pipeline configuration
//
// One explicit value describes a run: where each source lives, which of its
// columns hold what, and where the outputs go. Loaders receive their own
// section; nothing reads process-wide state.

use crate::error::PipelineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y", "%B %e, %Y"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub reconcile: ReconcileOptions,
    #[serde(default)]
    pub output: OutputConfig,
    /// Directory relative source/output paths resolve against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "nps parks".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub identity: IdentitySource,
    #[serde(default)]
    pub acreage: Option<AcreageSource>,
    #[serde(default)]
    pub established: Option<EstablishedSource>,
    #[serde(default)]
    pub visitation: Option<VisitationSource>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySource {
    pub file: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    pub columns: IdentityColumns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityColumns {
    /// NPS park code ("yell"); becomes the canonical id when present
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub states: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    /// Combined API column: "lat:44.59824417, long:-110.5471695"
    #[serde(default)]
    pub lat_long: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcreageSource {
    pub file: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub area_unit: AreaUnit,
    pub columns: AcreageColumns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcreageColumns {
    pub name: String,
    #[serde(default)]
    pub states: Option<String>,
    pub area: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    #[default]
    Acres,
    #[serde(alias = "square_miles")]
    SqMi,
}

impl AreaUnit {
    pub const ACRES_PER_SQ_MI: f64 = 640.0;

    pub fn to_sq_mi(&self, value: f64) -> f64 {
        match self {
            AreaUnit::Acres => value / Self::ACRES_PER_SQ_MI,
            AreaUnit::SqMi => value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstablishedSource {
    pub file: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    /// chrono formats tried in order
    #[serde(default)]
    pub date_formats: Vec<String>,
    pub columns: EstablishedColumns,
}

impl EstablishedSource {
    pub fn formats(&self) -> Vec<String> {
        if self.date_formats.is_empty() {
            DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()
        } else {
            self.date_formats.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstablishedColumns {
    pub name: String,
    #[serde(default)]
    pub states: Option<String>,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisitationSource {
    pub file: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    pub columns: VisitationColumns,
}

/// Long layout maps `year` + `visits`; wide layout leaves both out and
/// reads every header that is a year.
#[derive(Debug, Clone, Deserialize)]
pub struct VisitationColumns {
    pub name: String,
    #[serde(default)]
    pub states: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub visits: Option<String>,
}

impl VisitationColumns {
    pub fn is_long_layout(&self) -> bool {
        self.year.is_some() && self.visits.is_some()
    }
}

// ---------------------------------------------------------------------------
// Reconcile + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileOptions {
    /// Let a row without any state match when exactly one canonical record
    /// carries its normalized name. Off by default: state overlap required.
    #[serde(default)]
    pub allow_stateless_unique_match: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub master_csv: Option<String>,
    #[serde(default)]
    pub sqlite: Option<String>,
    #[serde(default)]
    pub diagnostics_json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; relative paths inside it resolve against its directory
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let input = std::fs::read_to_string(path).map_err(|e| PipelineError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml(&input)?;
        config.base_dir = path.parent().map(|p| p.to_path_buf());
        Ok(config)
    }

    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let sources = &self.sources;

        let id = &sources.identity;
        require_file("identity", &id.file)?;
        require_column("identity", "name", &id.columns.name)?;
        check_delimiter("identity", &id.delimiter)?;
        if id.columns.latitude.is_some() != id.columns.longitude.is_some() {
            return Err(PipelineError::ConfigValidation(
                "identity: latitude and longitude must be mapped together".into(),
            ));
        }

        if let Some(acreage) = &sources.acreage {
            require_file("acreage", &acreage.file)?;
            require_column("acreage", "name", &acreage.columns.name)?;
            require_column("acreage", "area", &acreage.columns.area)?;
            check_delimiter("acreage", &acreage.delimiter)?;
        }

        if let Some(established) = &sources.established {
            require_file("established", &established.file)?;
            require_column("established", "name", &established.columns.name)?;
            require_column("established", "date", &established.columns.date)?;
            check_delimiter("established", &established.delimiter)?;
            if established.date_formats.iter().any(|f| f.trim().is_empty()) {
                return Err(PipelineError::ConfigValidation(
                    "established: date_formats must not contain empty entries".into(),
                ));
            }
        }

        if let Some(visitation) = &sources.visitation {
            require_file("visitation", &visitation.file)?;
            require_column("visitation", "name", &visitation.columns.name)?;
            check_delimiter("visitation", &visitation.delimiter)?;
            if visitation.columns.year.is_some() != visitation.columns.visits.is_some() {
                return Err(PipelineError::ConfigValidation(
                    "visitation: year and visits must be mapped together (long layout) or both omitted (wide layout)".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Delimiter byte for a source section; comma unless configured
pub fn delimiter_byte(delimiter: &Option<String>) -> u8 {
    match delimiter.as_deref() {
        Some("\\t") | Some("tab") => b'\t',
        Some(d) if d.len() == 1 => d.as_bytes()[0],
        _ => b',',
    }
}

fn require_file(source: &str, file: &str) -> Result<(), PipelineError> {
    if file.trim().is_empty() {
        return Err(PipelineError::ConfigValidation(format!(
            "{source}: file must not be empty"
        )));
    }
    Ok(())
}

fn require_column(source: &str, field: &str, column: &str) -> Result<(), PipelineError> {
    if column.trim().is_empty() {
        return Err(PipelineError::ConfigValidation(format!(
            "{source}: column '{field}' must not be empty"
        )));
    }
    Ok(())
}

fn check_delimiter(source: &str, delimiter: &Option<String>) -> Result<(), PipelineError> {
    match delimiter.as_deref() {
        None | Some("\\t") | Some("tab") => Ok(()),
        Some(d) if d.len() == 1 && d.is_ascii() => Ok(()),
        Some(d) => Err(PipelineError::ConfigValidation(format!(
            "{source}: delimiter must be a single ASCII character, got '{d}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
