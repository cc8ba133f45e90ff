// 🧩 Consolidation Engine - Left-join matched source rows onto the identity table
//
// One ParkRecord per canonical park, in identity order. Fields start empty
// and are filled by the matched rows of each source. A second, different
// value for the same field replaces the first and is reported as a
// conflict (last write wins, in load order).

use crate::db::ParkRecord;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::parser::{AcreageRow, EstablishedRow, SourceType, VisitationRow};
use crate::reconciliation::{CanonicalPark, IdentityTable, Reconciliation};
use std::collections::{BTreeMap, HashMap};

const AREA_EPSILON: f64 = 1e-9;

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct Consolidation {
    pub records: Vec<ParkRecord>,
    pub conflicts: Vec<Diagnostic>,
}

impl Consolidation {
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    pub fn summary(&self) -> String {
        let with_area = self.records.iter().filter(|r| r.area_sq_mi.is_some()).count();
        let with_date = self
            .records
            .iter()
            .filter(|r| r.established_date.is_some())
            .count();
        let with_visits = self
            .records
            .iter()
            .filter(|r| !r.visits_by_year.is_empty())
            .count();
        format!(
            "{} parks: {} with area, {} with established date, {} with visits, {} conflicts",
            self.records.len(),
            with_area,
            with_date,
            with_visits,
            self.conflicts.len()
        )
    }
}

impl From<&CanonicalPark> for ParkRecord {
    fn from(park: &CanonicalPark) -> Self {
        ParkRecord {
            canonical_id: park.canonical_id.clone(),
            name: park.name.clone(),
            designation: park.designation,
            states: park.states.clone(),
            latitude: park.latitude,
            longitude: park.longitude,
            area_sq_mi: None,
            established_date: None,
            visits_by_year: BTreeMap::new(),
        }
    }
}

// ============================================================================
// CONSOLIDATOR
// ============================================================================

pub struct Consolidator<'a> {
    table: &'a IdentityTable,
    records: Vec<ParkRecord>,
    /// (record index, field) -> source line that last set it
    written_by: HashMap<(usize, String), usize>,
    conflicts: Vec<Diagnostic>,
}

impl<'a> Consolidator<'a> {
    /// Seed one empty record per canonical park
    pub fn new(table: &'a IdentityTable) -> Self {
        Consolidator {
            table,
            records: table.parks().iter().map(ParkRecord::from).collect(),
            written_by: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn apply_acreage(&mut self, matches: &Reconciliation<AcreageRow>) {
        for m in &matches.matched {
            let Some(idx) = self.table.index_of(&m.canonical_id) else {
                continue;
            };
            let new_value = m.row.area_sq_mi;
            let previous = self.records[idx].area_sq_mi;
            if let Some(old) = previous {
                if (old - new_value).abs() > AREA_EPSILON {
                    self.conflict(
                        idx,
                        matches.source,
                        "area_sq_mi",
                        m.row.line_number,
                        old.to_string(),
                        new_value.to_string(),
                    );
                }
            }
            self.records[idx].area_sq_mi = Some(new_value);
            self.mark(idx, "area_sq_mi", m.row.line_number);
        }
    }

    pub fn apply_established(&mut self, matches: &Reconciliation<EstablishedRow>) {
        for m in &matches.matched {
            let Some(idx) = self.table.index_of(&m.canonical_id) else {
                continue;
            };
            let new_value = m.row.established;
            if let Some(old) = self.records[idx].established_date {
                if old != new_value {
                    self.conflict(
                        idx,
                        matches.source,
                        "established_date",
                        m.row.line_number,
                        old.to_string(),
                        new_value.to_string(),
                    );
                }
            }
            self.records[idx].established_date = Some(new_value);
            self.mark(idx, "established_date", m.row.line_number);
        }
    }

    pub fn apply_visitation(&mut self, matches: &Reconciliation<VisitationRow>) {
        for m in &matches.matched {
            let Some(idx) = self.table.index_of(&m.canonical_id) else {
                continue;
            };
            for (&year, &count) in &m.row.visits {
                let field = format!("visits_{}", year);
                if let Some(&old) = self.records[idx].visits_by_year.get(&year) {
                    if old != count {
                        self.conflict(
                            idx,
                            matches.source,
                            &field,
                            m.row.line_number,
                            old.to_string(),
                            count.to_string(),
                        );
                    }
                }
                self.records[idx].visits_by_year.insert(year, count);
                self.mark(idx, &field, m.row.line_number);
            }
        }
    }

    pub fn finish(self) -> Consolidation {
        let consolidation = Consolidation {
            records: self.records,
            conflicts: self.conflicts,
        };
        log::info!("consolidated {}", consolidation.summary());
        consolidation
    }

    fn mark(&mut self, idx: usize, field: &str, line: usize) {
        self.written_by.insert((idx, field.to_string()), line);
    }

    fn conflict(
        &mut self,
        idx: usize,
        source: SourceType,
        field: &str,
        line: usize,
        old: String,
        new: String,
    ) {
        let record = &self.records[idx];
        let earlier = self
            .written_by
            .get(&(idx, field.to_string()))
            .map(|l| format!("line {}", l))
            .unwrap_or_else(|| "an earlier row".to_string());
        let message = format!(
            "{} {} (from {}) replaced by {}",
            field, old, earlier, new
        );
        log::warn!(
            "{}:{} conflict for '{}': {}",
            source.code(),
            line,
            record.canonical_id,
            message
        );
        self.conflicts.push(Diagnostic::new(
            DiagnosticKind::Conflict,
            source.code(),
            Some(line),
            &record.canonical_id,
            message,
        ));
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Designation;
    use crate::parser::IdentityRow;
    use crate::reconciliation::ReconciliationEngine;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn table() -> IdentityTable {
        let rows = vec![
            IdentityRow {
                park_code: Some("acad".to_string()),
                name: "Acadia National Park".to_string(),
                designation: Designation::NationalPark,
                states: set(&["ME"]),
                latitude: Some(44.3),
                longitude: Some(-68.2),
                line_number: 2,
            },
            IdentityRow {
                park_code: Some("zion".to_string()),
                name: "Zion National Park".to_string(),
                designation: Designation::NationalPark,
                states: set(&["UT"]),
                latitude: None,
                longitude: None,
                line_number: 3,
            },
        ];
        IdentityTable::build(rows).0
    }

    fn visits(name: &str, state: &str, years: &[(i32, u64)], line: usize) -> VisitationRow {
        VisitationRow {
            raw_name: name.to_string(),
            states: set(&[state]),
            visits: years.iter().copied().collect(),
            line_number: line,
        }
    }

    #[test]
    fn test_records_follow_identity_order_and_start_empty() {
        let table = table();
        let result = Consolidator::new(&table).finish();
        let ids: Vec<&str> = result.records.iter().map(|r| r.canonical_id.as_str()).collect();
        assert_eq!(ids, vec!["acad", "zion"]);
        assert_eq!(result.records[0].latitude, Some(44.3));
        assert!(result.records[0].area_sq_mi.is_none());
        assert!(result.records[0].visits_by_year.is_empty());
        assert_eq!(result.conflict_count(), 0);
    }

    #[test]
    fn test_visits_without_acreage() {
        let table = table();
        let engine = ReconciliationEngine::new();
        let matched = engine.reconcile(
            &table,
            SourceType::Visitation,
            vec![visits(
                "Acadia NP",
                "ME",
                &[(2015, 2_811_184), (2016, 3_303_393), (2017, 3_509_271), (2018, 3_537_575)],
                2,
            )],
        );

        let mut consolidator = Consolidator::new(&table);
        consolidator.apply_visitation(&matched);
        let result = consolidator.finish();

        let acadia = &result.records[0];
        assert_eq!(acadia.visits_by_year.keys().copied().collect::<Vec<_>>(), vec![2015, 2016, 2017, 2018]);
        assert!(acadia.area_sq_mi.is_none());
        assert!(result.records[1].visits_by_year.is_empty());
    }

    #[test]
    fn test_last_write_wins_with_conflict() {
        let table = table();
        let engine = ReconciliationEngine::new();
        let matched = engine.reconcile(
            &table,
            SourceType::Acreage,
            vec![
                AcreageRow {
                    raw_name: "Zion NP".to_string(),
                    states: set(&["UT"]),
                    area_sq_mi: 229.0,
                    line_number: 2,
                },
                AcreageRow {
                    raw_name: "Zion National Park".to_string(),
                    states: set(&["UT"]),
                    area_sq_mi: 232.0,
                    line_number: 5,
                },
            ],
        );

        let mut consolidator = Consolidator::new(&table);
        consolidator.apply_acreage(&matched);
        let result = consolidator.finish();

        assert_eq!(result.records[1].area_sq_mi, Some(232.0));
        assert_eq!(result.conflict_count(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.kind, DiagnosticKind::Conflict);
        assert_eq!(conflict.subject, "zion");
        assert_eq!(conflict.line, Some(5));
        assert_eq!(conflict.message, "area_sq_mi 229 (from line 2) replaced by 232");
    }

    #[test]
    fn test_small_area_conflict_shows_both_values() {
        let table = table();
        let engine = ReconciliationEngine::new();
        let row = |area: f64, line: usize| AcreageRow {
            raw_name: "Zion NP".to_string(),
            states: set(&["UT"]),
            area_sq_mi: area,
            line_number: line,
        };
        let matched = engine.reconcile(&table, SourceType::Acreage, vec![row(229.001, 2), row(229.004, 3)]);

        let mut consolidator = Consolidator::new(&table);
        consolidator.apply_acreage(&matched);
        let result = consolidator.finish();

        assert_eq!(result.conflict_count(), 1);
        assert_eq!(
            result.conflicts[0].message,
            "area_sq_mi 229.001 (from line 2) replaced by 229.004"
        );
    }

    #[test]
    fn test_identical_repeat_is_not_a_conflict() {
        let table = table();
        let date = NaiveDate::from_ymd_opt(1919, 11, 19).unwrap();
        let row = |line| EstablishedRow {
            raw_name: "Zion".to_string(),
            states: set(&["UT"]),
            established: date,
            line_number: line,
        };
        let matched = ReconciliationEngine::new().reconcile(&table, SourceType::Established, vec![row(2), row(3)]);

        let mut consolidator = Consolidator::new(&table);
        consolidator.apply_established(&matched);
        let result = consolidator.finish();
        assert_eq!(result.records[1].established_date, Some(date));
        assert_eq!(result.conflict_count(), 0);
    }

    #[test]
    fn test_visit_years_merge_and_conflict_per_year() {
        let table = table();
        let matched = ReconciliationEngine::new().reconcile(
            &table,
            SourceType::Visitation,
            vec![
                visits("Zion", "UT", &[(2017, 4_504_812)], 2),
                visits("Zion", "UT", &[(2018, 4_320_033)], 3),
                visits("Zion", "UT", &[(2017, 4_500_000)], 4),
            ],
        );

        let mut consolidator = Consolidator::new(&table);
        consolidator.apply_visitation(&matched);
        let result = consolidator.finish();

        let zion = &result.records[1];
        assert_eq!(zion.visits_by_year.get(&2017), Some(&4_500_000));
        assert_eq!(zion.visits_by_year.get(&2018), Some(&4_320_033));
        assert_eq!(result.conflict_count(), 1);
        assert!(result.conflicts[0].message.starts_with("visits_2017"));
    }

    #[test]
    fn test_unmatched_rows_leave_no_trace() {
        let table = table();
        let matched = ReconciliationEngine::new().reconcile(
            &table,
            SourceType::Acreage,
            vec![AcreageRow {
                raw_name: "Zion".to_string(),
                states: set(&["NV"]),
                area_sq_mi: 10.0,
                line_number: 2,
            }],
        );
        let mut consolidator = Consolidator::new(&table);
        consolidator.apply_acreage(&matched);
        let result = consolidator.finish();
        assert!(result.records.iter().all(|r| r.area_sq_mi.is_none()));
    }

    #[test]
    fn test_summary() {
        let table = table();
        let result = Consolidator::new(&table).finish();
        assert_eq!(
            result.summary(),
            "2 parks: 0 with area, 0 with established date, 0 with visits, 0 conflicts"
        );
    }
}
