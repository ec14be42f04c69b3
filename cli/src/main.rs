use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tabula_kernel::adapters::{InMemoryPhysicalStore, PhysicalTable};
use tabula_kernel::audit::audit_tables;
use tabula_kernel::layout::diff::LayoutDiff;
use tabula_kernel::layout::{LayoutDocument, ResolvedLayout};
use tabula_kernel::meta::{InMemoryMetaTable, MetaSnapshot, MetaTable};
use tabula_kernel::resolve::LayoutResolver;
use tabula_kernel::state::policy_config::ReconcilePolicy;
use tabula_kernel::validate::LayoutValidator;

/// Tabula table layout CLI
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(about = "Table layout administration (dry-run)", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", env = "TABULA_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a layout document without resolving it
    Validate {
        /// Path to layout document JSON
        #[arg(long)]
        layout: PathBuf,
    },

    /// Resolve a layout document and show the change it would make
    Plan {
        /// Path to layout document JSON
        #[arg(long)]
        layout: PathBuf,

        /// Path to meta table snapshot JSON
        #[arg(long)]
        meta: Option<PathBuf>,
    },

    /// Compare the meta table with the storage engine
    Audit {
        /// Path to meta table snapshot JSON
        #[arg(long)]
        meta: PathBuf,

        /// Path to storage engine snapshot JSON
        #[arg(long)]
        physical: PathBuf,

        /// Path to reconcile policy JSON
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    table: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    resolved_layout: ResolvedLayout,
    diff: LayoutDiff,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Validate { layout } => validate(&layout),
        Command::Plan { layout, meta } => plan(&layout, meta.as_deref()),
        Command::Audit {
            meta,
            physical,
            policy,
        } => audit(&meta, &physical, policy.as_deref()),
    }
}

fn init_logging(level: &str) {
    // RUST_LOG wins over --log-level. Logs go to stderr; stdout is JSON.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn validate(layout: &Path) -> Result<ExitCode> {
    let doc: LayoutDocument = read_json(layout)?;
    let result = LayoutValidator::standard().validate(&doc);

    let output = ValidateOutput {
        table: doc.name.clone(),
        valid: result.is_ok(),
        error: result.as_ref().err().map(ToString::to_string),
    };
    print_json(&output)?;

    Ok(if output.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn plan(layout: &Path, meta: Option<&Path>) -> Result<ExitCode> {
    let doc: LayoutDocument = read_json(layout)?;
    let meta = match meta {
        Some(path) => InMemoryMetaTable::from_snapshot(read_json::<MetaSnapshot>(path)?),
        None => InMemoryMetaTable::new(),
    };

    let current = meta.get_current_layout(&doc.name)?;
    let resolved = LayoutResolver::default()
        .resolve(&doc.name, &doc, current.as_ref())
        .with_context(|| format!("resolving layout for table `{}`", doc.name))?;
    let diff = LayoutDiff::between(current.as_ref(), &resolved);

    info!(
        table = %doc.name,
        layout_id = %resolved.layout_id(),
        physical_change = diff.touches_physical(),
        "planned layout"
    );

    print_json(&PlanOutput {
        resolved_layout: resolved,
        diff,
    })?;
    Ok(ExitCode::SUCCESS)
}

fn audit(meta: &Path, physical: &Path, policy: Option<&Path>) -> Result<ExitCode> {
    let meta = InMemoryMetaTable::from_snapshot(read_json(meta)?);
    let physical =
        InMemoryPhysicalStore::from_tables(read_json::<BTreeMap<String, PhysicalTable>>(physical)?);

    let policy = match policy {
        Some(path) => read_json::<ReconcilePolicy>(path)?,
        None => ReconcilePolicy::default_policy(),
    };

    let report = audit_tables(&meta, &physical, &LayoutValidator::standard(), &policy)?;
    print_json(&report)?;

    Ok(if report.drift_report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
