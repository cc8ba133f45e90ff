// 🔄 Pipeline - load → reconcile → consolidate → write
//
// Strictly sequential. A fatal error (bad config, missing file, missing
// column) stops the run; everything else lands in the DiagnosticReport.

use crate::config::PipelineConfig;
use crate::consolidation::Consolidator;
use crate::db::{self, ParkRecord};
use crate::diagnostics::DiagnosticReport;
use crate::parser::{
    AcreageLoader, EstablishedLoader, IdentityLoader, SourceKey, SourceLoader, SourceType,
    VisitationLoader,
};
use crate::reconciliation::{IdentityTable, Reconciliation, ReconciliationEngine};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

/// Per-source counts for the end-of-run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStats {
    pub source: SourceType,
    pub file: String,
    pub loaded: usize,
    pub skipped: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl SourceStats {
    pub fn summary(&self) -> String {
        format!(
            "{:<12} {:>5} rows, {:>3} skipped, {:>5} matched, {:>3} unmatched ({})",
            self.source.code(),
            self.loaded,
            self.skipped,
            self.matched,
            self.unmatched,
            self.file
        )
    }
}

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub name: String,
    pub records: Vec<ParkRecord>,
    pub report: DiagnosticReport,
    pub stats: Vec<SourceStats>,
    pub duplicate_identities: usize,
    pub conflicts: usize,
}

impl PipelineRun {
    pub fn unmatched(&self) -> usize {
        self.stats.iter().map(|s| s.unmatched).sum()
    }

    pub fn skipped(&self) -> usize {
        self.stats.iter().map(|s| s.skipped).sum()
    }
}

/// Paths written by `write_outputs`
#[derive(Debug, Clone, Default)]
pub struct OutputSummary {
    pub master_csv: Option<PathBuf>,
    pub sqlite: Option<PathBuf>,
    pub run_id: Option<String>,
    pub diagnostics_json: Option<PathBuf>,
}

fn load_and_match<L>(
    loader: &L,
    file: PathBuf,
    engine: &ReconciliationEngine,
    table: &IdentityTable,
    report: &mut DiagnosticReport,
    stats: &mut Vec<SourceStats>,
) -> Result<Reconciliation<L::Row>>
where
    L: SourceLoader,
    L::Row: SourceKey,
{
    let outcome = loader.load(&file).with_context(|| {
        format!(
            "Failed to load {} source {}",
            loader.source_type().code(),
            file.display()
        )
    })?;
    report.extend(outcome.diagnostics());

    let loaded = outcome.rows.len();
    let skipped = outcome.skip_count();
    let source_file = outcome.source_file.clone();
    let matches = engine.reconcile(table, loader.source_type(), outcome.rows);
    report.extend(matches.diagnostics());

    stats.push(SourceStats {
        source: loader.source_type(),
        file: source_file,
        loaded,
        skipped,
        matched: matches.matched_count(),
        unmatched: matches.unmatched_count(),
    });
    Ok(matches)
}

/// Run the whole pipeline for one config
pub fn run(config: &PipelineConfig) -> Result<PipelineRun> {
    config.validate()?;
    let sources = &config.sources;
    let mut report = DiagnosticReport::new();
    let mut stats = Vec::new();

    // Identity: decides which parks exist
    let identity_file = config.resolve(&sources.identity.file);
    let identity = IdentityLoader::new(&sources.identity)
        .load(&identity_file)
        .with_context(|| format!("Failed to load identity source {}", identity_file.display()))?;
    report.extend(identity.diagnostics());

    let loaded = identity.rows.len();
    let skipped = identity.skip_count();
    let source_file = identity.source_file.clone();
    let (table, duplicates) = IdentityTable::build(identity.rows);
    let duplicate_identities = duplicates.len();
    report.extend(duplicates);
    stats.push(SourceStats {
        source: SourceType::Identity,
        file: source_file,
        loaded,
        skipped,
        matched: table.len(),
        unmatched: 0,
    });

    let engine = ReconciliationEngine::new()
        .with_stateless_unique_match(config.reconcile.allow_stateless_unique_match);
    let mut consolidator = Consolidator::new(&table);

    // Fixed load order: acreage, established, visitation
    if let Some(acreage) = &sources.acreage {
        let matches = load_and_match(
            &AcreageLoader::new(acreage),
            config.resolve(&acreage.file),
            &engine,
            &table,
            &mut report,
            &mut stats,
        )?;
        consolidator.apply_acreage(&matches);
    }

    if let Some(established) = &sources.established {
        let matches = load_and_match(
            &EstablishedLoader::new(established),
            config.resolve(&established.file),
            &engine,
            &table,
            &mut report,
            &mut stats,
        )?;
        consolidator.apply_established(&matches);
    }

    if let Some(visitation) = &sources.visitation {
        let matches = load_and_match(
            &VisitationLoader::new(visitation),
            config.resolve(&visitation.file),
            &engine,
            &table,
            &mut report,
            &mut stats,
        )?;
        consolidator.apply_visitation(&matches);
    }

    let consolidation = consolidator.finish();
    let conflicts = consolidation.conflict_count();
    report.extend(consolidation.conflicts);
    log::info!("{}", report.summary());

    Ok(PipelineRun {
        name: config.name.clone(),
        records: consolidation.records,
        report,
        stats,
        duplicate_identities,
        conflicts,
    })
}

/// Write every configured output for a finished run
pub fn write_outputs(config: &PipelineConfig, run: &PipelineRun) -> Result<OutputSummary> {
    let mut summary = OutputSummary::default();
    let output = &config.output;

    if let Some(file) = &output.master_csv {
        let path = config.resolve(file);
        db::write_master_csv(&path, &run.records)?;
        log::info!("wrote {} records to {}", run.records.len(), path.display());
        summary.master_csv = Some(path);
    }

    if let Some(file) = &output.sqlite {
        let path = config.resolve(file);
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        db::setup_database(&conn)?;
        db::insert_park_records(&conn, &run.records)?;
        let run_id = db::insert_diagnostics(&conn, &run.report)?;
        log::info!(
            "stored {} parks in {} (run {})",
            db::verify_count(&conn)?,
            path.display(),
            run_id
        );
        summary.sqlite = Some(path);
        summary.run_id = Some(run_id);
    }

    if let Some(file) = &output.diagnostics_json {
        let path = config.resolve(file);
        let json = run.report.to_json().context("Failed to serialize diagnostics")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write diagnostics {}", path.display()))?;
        summary.diagnostics_json = Some(path);
    }

    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================
