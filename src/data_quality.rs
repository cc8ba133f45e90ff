// ✅ Data Quality Engine - missing-field warnings for a selection
//
// Before rendering a view, the operator wants to know which parks will be
// missing from it: no coordinates for a map, no area for a size chart, no
// visits in the latest year for a visitor chart, no state at all.

use crate::db::ParkRecord;
use serde::{Deserialize, Serialize};

// ============================================================================
// CHECKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityCheck {
    Location,
    Size,
    Visitors,
    State,
}

impl QualityCheck {
    pub const ALL: [QualityCheck; 4] = [
        QualityCheck::Location,
        QualityCheck::Size,
        QualityCheck::Visitors,
        QualityCheck::State,
    ];

    pub fn field(&self) -> &'static str {
        match self {
            QualityCheck::Location => "latitude/longitude",
            QualityCheck::Size => "area_sq_mi",
            QualityCheck::Visitors => "visits_by_year",
            QualityCheck::State => "states",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            // Without a state a park can never be reconciled
            QualityCheck::State => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Record cannot be joined or placed
    Warning,  // Record will be missing from a view
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub check: QualityCheck,
    pub severity: Severity,
    pub field: String,
    pub issue: String,
    /// Park names, selection order
    pub parks: Vec<String>,
}

impl QualityIssue {
    pub fn count(&self) -> usize {
        self.parks.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub total: usize,
    /// Latest visitation year in the selection, if any
    pub latest_year: Option<i32>,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            return format!("{} parks, no missing data", self.total);
        }
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|i| format!("{} missing {}", i.count(), i.field))
            .collect();
        format!("{} parks: {}", self.total, parts.join(", "))
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn issue(&self, check: QualityCheck) -> Option<&QualityIssue> {
        self.issues.iter().find(|i| i.check == check)
    }
}

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine {
    checks: Vec<QualityCheck>,
}

impl DataQualityEngine {
    /// Engine running every check
    pub fn new() -> Self {
        DataQualityEngine {
            checks: QualityCheck::ALL.to_vec(),
        }
    }

    pub fn with_checks(checks: &[QualityCheck]) -> Self {
        DataQualityEngine {
            checks: checks.to_vec(),
        }
    }

    pub fn check(&self, records: &[&ParkRecord]) -> QualityReport {
        let latest_year = records
            .iter()
            .filter_map(|r| r.visits_by_year.keys().next_back().copied())
            .max();

        let mut issues = Vec::new();
        for check in &self.checks {
            let parks: Vec<String> = records
                .iter()
                .filter(|r| Self::is_missing(*check, r, latest_year))
                .map(|r| r.name.clone())
                .collect();
            if parks.is_empty() {
                continue;
            }

            let issue = match (check, latest_year) {
                (QualityCheck::Visitors, Some(year)) => {
                    format!("{} parks have no visitor data for {}", parks.len(), year)
                }
                _ => format!("{} parks are missing {}", parks.len(), check.field()),
            };
            log::warn!("{}", issue);
            issues.push(QualityIssue {
                check: *check,
                severity: check.severity(),
                field: check.field().to_string(),
                issue,
                parks,
            });
        }

        QualityReport {
            total: records.len(),
            latest_year,
            issues,
        }
    }

    fn is_missing(check: QualityCheck, record: &ParkRecord, latest_year: Option<i32>) -> bool {
        match check {
            QualityCheck::Location => !record.has_location(),
            QualityCheck::Size => record.area_sq_mi.is_none(),
            QualityCheck::Visitors => match latest_year {
                Some(year) => record.visits_in(year).is_none(),
                None => true,
            },
            QualityCheck::State => record.states.is_empty(),
        }
    }
}

impl Default for DataQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
