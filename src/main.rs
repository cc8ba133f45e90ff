use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use nps_parks::data_quality::DataQualityEngine;
use nps_parks::tables::{render_markdown, View};
use nps_parks::{
    load_master_csv, logging, pipeline, select_by_designation, Designation, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "nps-parks")]
#[command(about = "Consolidate NPS park sources into one master record set")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Warnings and errors only
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every configured source and write the master record set
    Consolidate {
        /// Pipeline config (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
    },

    /// Filter the master set by designation and print a markdown table
    Select {
        /// Master CSV written by `consolidate`
        #[arg(long, short = 'm')]
        master: PathBuf,

        /// Designation (singular or plural) or "all"
        #[arg(long, short = 'd', default_value = "all")]
        designation: String,

        #[arg(long, value_enum, default_value = "location")]
        view: View,

        /// Show at most N rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List accepted designation names
    Designations,

    /// Browse the master set in the terminal
    Browse {
        #[arg(long, short = 'm')]
        master: PathBuf,

        #[arg(long, short = 'd', default_value = "all")]
        designation: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.quiet));

    match cli.command {
        Command::Consolidate { config } => run_consolidate(&config),
        Command::Select {
            master,
            designation,
            view,
            limit,
        } => run_select(&master, &designation, view, limit),
        Command::Designations => {
            run_designations();
            Ok(())
        }
        Command::Browse {
            master,
            designation,
        } => run_browse(&master, &designation),
    }
}

fn run_consolidate(config_path: &Path) -> Result<()> {
    println!("🏞️  NPS Parks - Consolidation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Config
    println!("\n⚙️  Reading config...");
    let config = PipelineConfig::from_path(config_path)
        .with_context(|| format!("Invalid config {}", config_path.display()))?;
    println!("✓ {}", config.name);

    // 2. Load, reconcile, consolidate
    println!("\n📂 Loading and reconciling sources...");
    let run = pipeline::run(&config)?;
    for stats in &run.stats {
        println!("✓ {}", stats.summary());
    }
    if run.duplicate_identities > 0 {
        println!("✓ Collapsed {} duplicate identity rows", run.duplicate_identities);
    }
    println!("✓ {} parks in master set, {} conflicts", run.records.len(), run.conflicts);

    // 3. Outputs
    println!("\n💾 Writing outputs...");
    let outputs = pipeline::write_outputs(&config, &run)?;
    if let Some(path) = &outputs.master_csv {
        println!("✓ Master CSV: {}", path.display());
    }
    if let (Some(path), Some(run_id)) = (&outputs.sqlite, &outputs.run_id) {
        println!("✓ SQLite: {} (run {})", path.display(), run_id);
    }
    if let Some(path) = &outputs.diagnostics_json {
        println!("✓ Diagnostics: {}", path.display());
    }

    // 4. Diagnostics
    println!("\n🔍 {}", run.report.summary());
    for diagnostic in &run.report.diagnostics {
        println!("   {}", diagnostic);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✅ Done: {} parks, {} skipped rows, {} unmatched rows",
        run.records.len(),
        run.skipped(),
        run.unmatched()
    );
    Ok(())
}

fn run_select(master: &Path, designation: &str, view: View, limit: Option<usize>) -> Result<()> {
    let records = load_master_csv(master)
        .with_context(|| format!("Failed to load master set {}", master.display()))?;

    let selection = select_by_designation(&records, designation);
    if let Some(diagnostic) = &selection.diagnostic {
        println!("⚠️  {}", diagnostic);
        return Ok(());
    }
    if selection.is_empty() {
        println!("No parks with designation '{}'", designation);
        return Ok(());
    }

    println!("{}", render_markdown(&selection.records, view, limit));

    let quality = DataQualityEngine::with_checks(view.checks()).check(&selection.records);
    for issue in &quality.issues {
        println!("⚠️  {}:", issue.issue);
        for park in &issue.parks {
            println!("   - {}", park);
        }
    }
    Ok(())
}

fn run_designations() {
    for designation in Designation::ALL {
        println!("{:<34} {}", designation.as_str(), designation.plural());
    }
}

#[cfg(feature = "tui")]
fn run_browse(master: &Path, designation: &str) -> Result<()> {
    use nps_parks::selector::DesignationFilter;
    use nps_parks::ui;

    let records = load_master_csv(master)
        .with_context(|| format!("Failed to load master set {}", master.display()))?;

    let filter = match DesignationFilter::parse(designation) {
        Some(filter) => filter,
        None => {
            eprintln!("❌ Unknown designation '{}'", designation);
            eprintln!("   Run: nps-parks designations");
            std::process::exit(2);
        }
    };

    let mut app = ui::App::new(records, filter);
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_browse(_master: &Path, _designation: &str) -> Result<()> {
    eprintln!("❌ Browse mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}
