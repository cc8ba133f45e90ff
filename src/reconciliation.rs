// ⚖️ Reconciliation Engine - Match every source row to one canonical park
//
// The identity source is authoritative: it decides which parks exist and
// assigns their canonical ids. Auxiliary rows (acreage, dates, visits) are
// matched by normalized name AND at least one shared state. Anything that
// does not resolve to exactly one park is reported, never guessed.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::entities::Designation;
use crate::parser::{IdentityRow, SourceKey, SourceType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// ============================================================================
// NAME NORMALIZATION
// ============================================================================

/// Designation suffixes as they appear in park names and report exports.
/// Matched on whole words after "&" has become "and".
const DESIGNATION_SUFFIXES: &[&str] = &[
    // Spelled out, compound forms first
    "national historical park and preserve",
    "national park and preserve",
    "national monument and preserve",
    "national river and recreation area",
    "national wild and scenic riverway",
    "national wild and scenic river",
    "wild and scenic river",
    "national scenic riverways",
    "national scenic riverway",
    "national scenic river",
    "national scenic trail",
    "national historic trail",
    "international historic site",
    "national battlefield park",
    "national battlefield site",
    "national battlefield",
    "national military park",
    "national historical park",
    "national historic park",
    "national historic site",
    "national recreation area",
    "national lakeshore",
    "national seashore",
    "national memorial",
    "national monument",
    "national parkway",
    "national preserve",
    "national reserve",
    "national river",
    "national park",
    // Report abbreviations
    "np and pres",
    "nm and pres",
    "nhp and pres",
    "npres",
    "pres",
    "nhp",
    "nhs",
    "nht",
    "ihs",
    "nbp",
    "nbs",
    "nmp",
    "nra",
    "nrra",
    "nwsr",
    "nsr",
    "nst",
    "nmem",
    "nb",
    "nl",
    "nm",
    "np",
    "nr",
    "ns",
    "pkwy",
];

/// Normalize a park name for matching.
///
/// "Gates of the Arctic National Park & Preserve" and "GATES OF THE
/// ARCTIC NP & PRES" both become "gates of the arctic".
pub fn normalize_park_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            '&' => cleaned.push_str(" and "),
            // "N.P." -> "np", "O'Neill" -> "oneill"
            '.' | '\'' | '\u{2019}' => {}
            c if c.is_alphanumeric() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }

    let words: Vec<&str> = cleaned.split_whitespace().collect();

    for suffix in DESIGNATION_SUFFIXES {
        let suffix_words: Vec<&str> = suffix.split(' ').collect();
        if words.len() > suffix_words.len() && words.ends_with(&suffix_words) {
            return words[..words.len() - suffix_words.len()].join(" ");
        }
    }

    words.join(" ")
}

/// Canonical id for an identity row without a park code: stable across
/// runs because it only depends on the row's content.
pub fn derive_canonical_id(
    normalized_name: &str,
    designation: Designation,
    states: &BTreeSet<String>,
) -> String {
    let states: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
    let key = format!("{}|{}|{}", normalized_name, designation.as_str(), states.join(","));

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

// ============================================================================
// IDENTITY TABLE
// ============================================================================

/// One physical park, as established by the identity source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPark {
    pub canonical_id: String,
    pub name: String,
    pub normalized_name: String,
    pub designation: Designation,
    pub states: BTreeSet<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub line_number: usize,
}

/// Canonical parks in identity order plus a name index
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    parks: Vec<CanonicalPark>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl IdentityTable {
    /// Build the table, collapsing rows that describe the same physical
    /// site (same park code, or same name, designation and states when
    /// either row has no code). Distinct park codes are distinct parks.
    pub fn build(rows: Vec<IdentityRow>) -> (IdentityTable, Vec<Diagnostic>) {
        let mut table = IdentityTable::default();
        let mut by_content: HashMap<String, Vec<usize>> = HashMap::new();
        let mut coded: Vec<bool> = Vec::new();
        let mut diagnostics = Vec::new();

        for row in rows {
            let normalized_name = normalize_park_name(&row.name);
            let content_id = derive_canonical_id(&normalized_name, row.designation, &row.states);
            let has_code = row.park_code.is_some();
            let canonical_id = row.park_code.clone().unwrap_or_else(|| content_id.clone());

            let existing = table.by_id.get(&canonical_id).copied().or_else(|| {
                by_content
                    .get(&content_id)?
                    .iter()
                    .copied()
                    .find(|&idx| !has_code || !coded[idx])
            });

            if let Some(idx) = existing {
                let kept = &mut table.parks[idx];
                log::warn!(
                    "identity:{} '{}' duplicates line {} ({})",
                    row.line_number,
                    row.name,
                    kept.line_number,
                    kept.canonical_id
                );
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DuplicateIdentity,
                    SourceType::Identity.code(),
                    Some(row.line_number),
                    &row.name,
                    format!(
                        "same site as line {}, collapsed into '{}'",
                        kept.line_number, kept.canonical_id
                    ),
                ));
                // The first row wins; a duplicate only fills gaps
                if kept.latitude.is_none() && kept.longitude.is_none() {
                    kept.latitude = row.latitude;
                    kept.longitude = row.longitude;
                }
                continue;
            }

            let idx = table.parks.len();
            table.by_id.insert(canonical_id.clone(), idx);
            by_content.entry(content_id).or_default().push(idx);
            coded.push(has_code);
            table
                .by_name
                .entry(normalized_name.clone())
                .or_default()
                .push(idx);
            table.parks.push(CanonicalPark {
                canonical_id,
                name: row.name,
                normalized_name,
                designation: row.designation,
                states: row.states,
                latitude: row.latitude,
                longitude: row.longitude,
                line_number: row.line_number,
            });
        }

        log::info!(
            "identity table: {} parks ({} duplicate rows collapsed)",
            table.parks.len(),
            diagnostics.len()
        );
        (table, diagnostics)
    }

    pub fn parks(&self) -> &[CanonicalPark] {
        &self.parks
    }

    pub fn len(&self) -> usize {
        self.parks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parks.is_empty()
    }

    pub fn index_of(&self, canonical_id: &str) -> Option<usize> {
        self.by_id.get(canonical_id).copied()
    }

    pub fn get(&self, canonical_id: &str) -> Option<&CanonicalPark> {
        self.index_of(canonical_id).map(|idx| &self.parks[idx])
    }

    fn candidates(&self, normalized_name: &str) -> &[usize] {
        self.by_name
            .get(normalized_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// MATCH RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnmatchedReason {
    /// No canonical park has this normalized name
    NoNameMatch,
    /// Name matches, but no candidate shares a state with the row
    NoStateOverlap,
    /// More than one candidate survives the state tie-break
    Ambiguous { candidates: usize },
    /// Row or candidate has no states to confirm the name match
    MissingState,
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::NoNameMatch => write!(f, "no identity record with this name"),
            UnmatchedReason::NoStateOverlap => {
                write!(f, "name matches but no identity record shares a state")
            }
            UnmatchedReason::Ambiguous { candidates } => {
                write!(f, "ambiguous: {} identity records match name and state", candidates)
            }
            UnmatchedReason::MissingState => write!(f, "no states to confirm the name match"),
        }
    }
}

/// An auxiliary row that resolved to no canonical park
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedRow {
    pub raw_name: String,
    pub normalized_name: String,
    pub states: BTreeSet<String>,
    pub line_number: usize,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Clone)]
pub struct MatchedRow<R> {
    pub canonical_id: String,
    pub row: R,
}

/// Result of reconciling one auxiliary source
#[derive(Debug, Clone)]
pub struct Reconciliation<R> {
    pub source: SourceType,
    pub matched: Vec<MatchedRow<R>>,
    pub unmatched: Vec<UnmatchedRow>,
}

impl<R> Reconciliation<R> {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.unmatched
            .iter()
            .map(|u| {
                Diagnostic::new(
                    DiagnosticKind::Unmatched,
                    self.source.code(),
                    Some(u.line_number),
                    &u.raw_name,
                    u.reason.to_string(),
                )
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} matched, {} unmatched",
            self.source.code(),
            self.matched.len(),
            self.unmatched.len()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Accept a unique name match when the row or the candidate has no
    /// states. Off by default: state overlap is required.
    pub allow_stateless_unique_match: bool,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            allow_stateless_unique_match: false,
        }
    }

    pub fn with_stateless_unique_match(mut self, allow: bool) -> Self {
        self.allow_stateless_unique_match = allow;
        self
    }

    /// Resolve one row key to a park index in the table
    pub fn resolve(
        &self,
        table: &IdentityTable,
        normalized_name: &str,
        states: &BTreeSet<String>,
    ) -> Result<usize, UnmatchedReason> {
        let candidates = table.candidates(normalized_name);
        if candidates.is_empty() {
            return Err(UnmatchedReason::NoNameMatch);
        }

        let overlapping: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&idx| !table.parks[idx].states.is_disjoint(states))
            .collect();

        match overlapping.len() {
            1 => return Ok(overlapping[0]),
            n if n > 1 => return Err(UnmatchedReason::Ambiguous { candidates: n }),
            _ => {}
        }

        // No overlap. Either a real disagreement, or nothing to compare.
        let stateless: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&idx| states.is_empty() || table.parks[idx].states.is_empty())
            .collect();

        if stateless.is_empty() {
            return Err(UnmatchedReason::NoStateOverlap);
        }
        if !self.allow_stateless_unique_match {
            return Err(UnmatchedReason::MissingState);
        }
        if candidates.len() == 1 {
            Ok(candidates[0])
        } else {
            Err(UnmatchedReason::Ambiguous {
                candidates: candidates.len(),
            })
        }
    }

    /// Match every row of one auxiliary source against the identity table
    pub fn reconcile<R: SourceKey>(
        &self,
        table: &IdentityTable,
        source: SourceType,
        rows: Vec<R>,
    ) -> Reconciliation<R> {
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for row in rows {
            let normalized_name = normalize_park_name(row.raw_name());

            match self.resolve(table, &normalized_name, row.states()) {
                Ok(idx) => {
                    let canonical_id = table.parks[idx].canonical_id.clone();
                    log::debug!(
                        "{}:{} '{}' -> {}",
                        source.code(),
                        row.line_number(),
                        row.raw_name(),
                        canonical_id
                    );
                    matched.push(MatchedRow { canonical_id, row });
                }
                Err(reason) => {
                    log::warn!(
                        "{}:{} '{}' unmatched: {}",
                        source.code(),
                        row.line_number(),
                        row.raw_name(),
                        reason
                    );
                    unmatched.push(UnmatchedRow {
                        raw_name: row.raw_name().to_string(),
                        normalized_name,
                        states: row.states().clone(),
                        line_number: row.line_number(),
                        reason,
                    });
                }
            }
        }

        let result = Reconciliation {
            source,
            matched,
            unmatched,
        };
        log::info!("{}", result.summary());
        result
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AcreageRow;

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn identity(code: Option<&str>, name: &str, designation: Designation, states: &[&str], line: usize) -> IdentityRow {
        IdentityRow {
            park_code: code.map(|c| c.to_string()),
            name: name.to_string(),
            designation,
            states: set(states),
            latitude: None,
            longitude: None,
            line_number: line,
        }
    }

    fn acreage(name: &str, states: &[&str], area: f64, line: usize) -> AcreageRow {
        AcreageRow {
            raw_name: name.to_string(),
            states: set(states),
            area_sq_mi: area,
            line_number: line,
        }
    }

    #[test]
    fn test_normalize_strips_designation_suffixes() {
        assert_eq!(
            normalize_park_name("Gates of the Arctic National Park & Preserve"),
            "gates of the arctic"
        );
        assert_eq!(normalize_park_name("GATES OF THE ARCTIC NP & PRES"), "gates of the arctic");
        assert_eq!(normalize_park_name("Zion NP"), "zion");
        assert_eq!(normalize_park_name("Zion N.P."), "zion");
        assert_eq!(normalize_park_name("Little Bighorn Battlefield NM"), "little bighorn battlefield");
        assert_eq!(normalize_park_name("Adams NHP"), "adams");
        assert_eq!(
            normalize_park_name("Chesapeake & Ohio Canal National Historical Park"),
            "chesapeake and ohio canal"
        );
        assert_eq!(normalize_park_name("  Hawai'i   Volcanoes  "), "hawaii volcanoes");
    }

    #[test]
    fn test_normalize_keeps_name_that_is_only_a_suffix() {
        assert_eq!(normalize_park_name("National Park"), "national park");
        assert_eq!(normalize_park_name("NP"), "np");
    }

    #[test]
    fn test_normalize_only_strips_whole_words() {
        assert_eq!(normalize_park_name("Rocky Mountains"), "rocky mountains");
        assert_eq!(normalize_park_name("Padre Island NS"), "padre island");
    }

    #[test]
    fn test_derived_id_is_stable_and_short() {
        let a = derive_canonical_id("zion", Designation::NationalPark, &set(&["UT"]));
        let b = derive_canonical_id("zion", Designation::NationalPark, &set(&["UT"]));
        let c = derive_canonical_id("zion", Designation::NationalMonument, &set(&["UT"]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_table_uses_park_code() {
        let (table, diagnostics) = IdentityTable::build(vec![
            identity(Some("yell"), "Yellowstone National Park", Designation::NationalPark, &["WY", "MT", "ID"], 2),
            identity(None, "Some Memorial", Designation::NationalMemorial, &["DC"], 3),
        ]);
        assert!(diagnostics.is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(table.parks()[0].canonical_id, "yell");
        assert_eq!(table.parks()[1].canonical_id.len(), 12);
        assert_eq!(table.get("yell").unwrap().normalized_name, "yellowstone");
    }

    #[test]
    fn test_identity_table_collapses_duplicate_rows() {
        let mut second = identity(None, "Gates of the Arctic", Designation::NationalPark, &["AK"], 3);
        second.latitude = Some(67.78);
        second.longitude = Some(-153.3);

        let (table, diagnostics) = IdentityTable::build(vec![
            identity(None, "Gates of the Arctic", Designation::NationalPark, &["AK"], 2),
            second,
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.parks()[0].line_number, 2);
        assert_eq!(table.parks()[0].latitude, Some(67.78));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DuplicateIdentity);
        assert_eq!(diagnostics[0].line, Some(3));
    }

    #[test]
    fn test_identity_table_collapses_repeated_code() {
        let (table, diagnostics) = IdentityTable::build(vec![
            identity(Some("zion"), "Zion National Park", Designation::NationalPark, &["UT"], 2),
            identity(Some("zion"), "Zion", Designation::NationalPark, &["UT"], 7),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.parks()[0].name, "Zion National Park");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_identity_table_keeps_distinct_codes_apart() {
        let (table, diagnostics) = IdentityTable::build(vec![
            identity(Some("whho"), "President's Park (White House)", Designation::OtherDesignation, &["DC"], 2),
            identity(Some("prpa"), "President's Park White House", Designation::OtherDesignation, &["DC"], 3),
        ]);
        assert!(diagnostics.is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(table.parks()[0].canonical_id, "whho");
        assert_eq!(table.parks()[1].canonical_id, "prpa");

        // An auxiliary row naming both sites cannot pick one
        let result = ReconciliationEngine::new().reconcile(
            &table,
            SourceType::Acreage,
            vec![acreage("Presidents Park White House", &["DC"], 0.03, 2)],
        );
        assert_eq!(result.matched_count(), 0);
        assert!(matches!(
            result.unmatched[0].reason,
            UnmatchedReason::Ambiguous { .. }
        ));
    }

    #[test]
    fn test_identity_table_collapses_codeless_row_into_coded_site() {
        let (table, diagnostics) = IdentityTable::build(vec![
            identity(Some("gaar"), "Gates of the Arctic", Designation::NationalPark, &["AK"], 2),
            identity(None, "Gates of the Arctic National Park", Designation::NationalPark, &["AK"], 3),
            identity(Some("gaa2"), "Gates of the Arctic", Designation::NationalPark, &["AK"], 4),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.parks()[0].canonical_id, "gaar");
        assert_eq!(table.parks()[1].canonical_id, "gaa2");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, Some(3));
    }

    #[test]
    fn test_reconcile_duplicate_identity_matches_once() {
        let (table, _) = IdentityTable::build(vec![
            identity(None, "Gates of the Arctic", Designation::NationalPark, &["AK"], 2),
            identity(None, "Gates of the Arctic", Designation::NationalPark, &["AK"], 3),
        ]);
        let engine = ReconciliationEngine::new();
        let result = engine.reconcile(
            &table,
            SourceType::Acreage,
            vec![
                acreage("gates of the arctic", &["AK"], 100.0, 2),
                acreage("Zion", &["UT"], 229.0, 3),
            ],
        );

        assert_eq!(result.matched_count(), 1);
        assert_eq!(result.matched[0].canonical_id, table.parks()[0].canonical_id);
        assert_eq!(result.unmatched_count(), 1);
        assert_eq!(result.unmatched[0].raw_name, "Zion");
        assert_eq!(result.unmatched[0].reason, UnmatchedReason::NoNameMatch);

        let diagnostics = result.diagnostics();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Unmatched);
        assert_eq!(diagnostics[0].source, "acreage");
        assert_eq!(diagnostics[0].line, Some(3));
    }

    #[test]
    fn test_state_overlap_breaks_name_ties() {
        let (table, _) = IdentityTable::build(vec![
            identity(Some("aaa1"), "Lincoln Home National Historic Site", Designation::NationalHistoricSite, &["IL"], 2),
            identity(Some("aaa2"), "Lincoln Home National Memorial", Designation::NationalMemorial, &["KY"], 3),
        ]);
        let engine = ReconciliationEngine::new();

        let result = engine.reconcile(
            &table,
            SourceType::Acreage,
            vec![
                acreage("Lincoln Home NHS", &["IL"], 0.02, 2),
                acreage("Lincoln Home", &["OH"], 1.0, 3),
            ],
        );
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].canonical_id, "aaa1");
        assert_eq!(result.unmatched[0].reason, UnmatchedReason::NoStateOverlap);
    }

    #[test]
    fn test_still_ambiguous_after_state_overlap_is_unmatched() {
        let (table, _) = IdentityTable::build(vec![
            identity(Some("p1"), "Twin National Park", Designation::NationalPark, &["CA"], 2),
            identity(Some("p2"), "Twin National Monument", Designation::NationalMonument, &["CA", "NV"], 3),
        ]);
        let result = ReconciliationEngine::new().reconcile(
            &table,
            SourceType::Visitation,
            vec![acreage("Twin", &["CA"], 1.0, 4)],
        );
        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched[0].reason, UnmatchedReason::Ambiguous { candidates: 2 });
    }

    #[test]
    fn test_multi_state_park_matches_on_any_state() {
        let (table, _) = IdentityTable::build(vec![identity(
            Some("grsm"),
            "Great Smoky Mountains National Park",
            Designation::NationalPark,
            &["NC", "TN"],
            2,
        )]);
        let result = ReconciliationEngine::new().reconcile(
            &table,
            SourceType::Acreage,
            vec![acreage("Great Smoky Mountains NP", &["TN"], 816.0, 2)],
        );
        assert_eq!(result.matched[0].canonical_id, "grsm");
    }

    #[test]
    fn test_stateless_rows() {
        let (table, _) = IdentityTable::build(vec![identity(
            Some("zion"),
            "Zion National Park",
            Designation::NationalPark,
            &["UT"],
            2,
        )]);

        let strict = ReconciliationEngine::new();
        let result = strict.reconcile(&table, SourceType::Acreage, vec![acreage("Zion NP", &[], 229.0, 2)]);
        assert_eq!(result.unmatched[0].reason, UnmatchedReason::MissingState);

        let lenient = ReconciliationEngine::new().with_stateless_unique_match(true);
        let result = lenient.reconcile(&table, SourceType::Acreage, vec![acreage("Zion NP", &[], 229.0, 2)]);
        assert_eq!(result.matched[0].canonical_id, "zion");
    }

    #[test]
    fn test_summary() {
        let (table, _) = IdentityTable::build(Vec::new());
        let result = ReconciliationEngine::new().reconcile(
            &table,
            SourceType::Established,
            vec![acreage("Zion", &["UT"], 1.0, 2)],
        );
        assert_eq!(result.summary(), "established: 0 matched, 1 unmatched");
    }
}
