// 🔎 Designation Selector - subset the master set, order preserved

use crate::db::ParkRecord;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::entities::Designation;

/// Keyword that selects every record
pub const ALL: &str = "all";

/// Parsed selector argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignationFilter {
    All,
    Only(Designation),
}

impl DesignationFilter {
    /// None when the value is neither "all" nor a known designation
    pub fn parse(value: &str) -> Option<DesignationFilter> {
        if value.trim().eq_ignore_ascii_case(ALL) {
            return Some(DesignationFilter::All);
        }
        Designation::parse(value).map(DesignationFilter::Only)
    }

    pub fn matches(&self, record: &ParkRecord) -> bool {
        match self {
            DesignationFilter::All => true,
            DesignationFilter::Only(d) => record.designation == *d,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DesignationFilter::All => "All parks".to_string(),
            DesignationFilter::Only(d) => d.plural(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub records: Vec<&'a ParkRecord>,
    /// Set when the requested designation was not recognized
    pub diagnostic: Option<Diagnostic>,
}

impl<'a> Selection<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn select(records: &[ParkRecord], filter: DesignationFilter) -> Vec<&ParkRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// Filter by designation name (singular or plural) or "all".
/// An unknown name yields an empty selection and a diagnostic.
pub fn select_by_designation<'a>(records: &'a [ParkRecord], designation: &str) -> Selection<'a> {
    match DesignationFilter::parse(designation) {
        Some(filter) => {
            let records = select(records, filter);
            log::info!("selected {} records for '{}'", records.len(), filter.label());
            Selection {
                records,
                diagnostic: None,
            }
        }
        None => {
            log::warn!("unknown designation '{}'", designation);
            Selection {
                records: Vec::new(),
                diagnostic: Some(Diagnostic::new(
                    DiagnosticKind::UnknownDesignation,
                    "selector",
                    None,
                    designation,
                    "not a known designation; see `nps-parks designations`".to_string(),
                )),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
