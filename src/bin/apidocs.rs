//! API Reference Model CLI
//!
//! Loads one API document (or a directory of them), builds the
//! cross-referenced document model and writes it as JSON.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kube_apidocs::graph::load_documents;
use kube_apidocs::{pipeline, DocsConfig, DocumentSink, JsonSink};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apidocs")]
#[command(about = "Build the API reference document model from an OpenAPI document")]
struct Cli {
    /// API document, or a directory of *.json documents
    #[arg(short, long)]
    spec: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail when orphaned definitions are found
    #[arg(long)]
    strict: bool,

    /// Do not attach operations to definitions
    #[arg(long)]
    no_operations: bool,

    /// Write the effective configuration (TOML) to this file
    #[arg(long)]
    save_config: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = DocsConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.strict {
        config.generation.strict = true;
    }
    if cli.no_operations {
        config.generation.build_operations = false;
    }
    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("failed to save configuration to {}", path))?;
        eprintln!("💾 Saved configuration to {}", path);
    }

    let loaded = load_documents(&cli.spec)?;
    eprintln!("📂 Loaded {} document(s) from {:?}", loaded.sources.len(), cli.spec);

    let model = pipeline::build(&loaded.document, &config)?;

    eprintln!("📊 Summary:");
    eprintln!("  Definitions: {}", model.graph.len());
    eprintln!("  Operations:  {}", model.operations.len());
    eprintln!("  Orphaned:    {}", model.orphaned_operations.len());
    for (group, versions) in model.group_versions() {
        let versions: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        eprintln!("  {}: {}", group, versions.join(", "));
    }

    if model.diagnostics.is_empty() {
        info!("No diagnostics");
    } else {
        warn!(warnings = model.diagnostics.warning_count(), "Diagnostics reported");
        eprintln!();
        eprintln!("{}", model.diagnostics.format_all());
    }

    match &cli.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
            JsonSink::new(BufWriter::new(file)).write(&model)?;
            eprintln!("✅ Wrote {:?}", path);
        }
        None => {
            JsonSink::new(io::stdout().lock()).write(&model)?;
        }
    }

    Ok(())
}
