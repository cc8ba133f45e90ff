// NPS Parks - Core Library
// Load park sources, reconcile them to canonical ids, consolidate one master
// record per park, and select by designation.

pub mod config;
pub mod consolidation;
pub mod data_quality;
pub mod db;
pub mod diagnostics;
pub mod entities;
pub mod error;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod reconciliation;
pub mod selector;
pub mod tables;

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use consolidation::{Consolidation, Consolidator};
pub use data_quality::{DataQualityEngine, QualityCheck, QualityIssue, QualityReport, Severity};
pub use db::{
    get_all_park_records, insert_diagnostics, insert_park_records, load_master_csv,
    setup_database, verify_count, write_master_csv, ParkRecord,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticReport};
pub use entities::{Designation, StateRegistry};
pub use error::PipelineError;
pub use parser::{
    AcreageLoader, AcreageRow, EstablishedLoader, EstablishedRow, IdentityLoader, IdentityRow,
    LoadOutcome, SourceKey, SourceLoader, SourceType, VisitationLoader, VisitationRow,
};
pub use pipeline::{run, write_outputs, PipelineRun, SourceStats};
pub use reconciliation::{
    normalize_park_name, IdentityTable, ReconciliationEngine, Reconciliation, UnmatchedReason,
    UnmatchedRow,
};
pub use selector::{select_by_designation, DesignationFilter, Selection};
pub use tables::View;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
