use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use xrefmap::cli;
use xrefmap::config::MappingConfig;
use xrefmap::mapper::{Mapper, MapperOptions};
use xrefmap::methods::MethodRegistry;
use xrefmap::scheduler::LocalScheduler;
use xrefmap::store::{MemoryCoreStore, MemoryXrefStore, XrefStore};

#[derive(Parser)]
#[command(name = "map_xrefs", about = "Map external references onto a core genome annotation")]
struct Cli {
    /// Path to the species mapping configuration (JSON)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Path to the xref database snapshot (JSON)
    #[arg(short = 'x', long = "xref-db")]
    xref_db: PathBuf,

    /// Path to the core database snapshot (JSON)
    #[arg(short = 'e', long = "core-db")]
    core_db: PathBuf,

    /// Working directory for FASTA dumps, map files, and outputs
    #[arg(short = 'w', long = "workdir")]
    workdir: PathBuf,

    /// Restrict the core dump to one genomic slice
    #[arg(long)]
    location: Option<String>,

    /// Stop the core dump after this many transcripts
    #[arg(long)]
    maxdump: Option<usize>,

    /// Skip FASTA dumping when every expected file already exists
    #[arg(long)]
    dumpcheck: bool,

    /// Skip alignment dispatch when every expected map file already exists
    #[arg(long = "use-existing-mappings")]
    use_existing_mappings: bool,

    /// Remove outputs of a previous run before starting
    #[arg(long = "delete-existing")]
    delete_existing: bool,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let cli_args = Cli::parse();

    cli::banner("Map Xrefs");

    // ── Configuration ────────────────────────────────────
    cli::section("Configuration");

    let config = MappingConfig::from_file(&cli_args.config)?;
    cli::kv("Config", &cli_args.config.display().to_string());
    cli::kv("Species", &config.species);
    cli::kv("Rules", &config.rules.len().to_string());
    if let Some(ref consortium) = config.consortium {
        cli::kv("Consortium", consortium);
    }
    eprintln!();

    // ── Stores ───────────────────────────────────────────
    cli::section("Stores");

    let xref_store = MemoryXrefStore::from_file(&cli_args.xref_db)?;
    let core_store = MemoryCoreStore::from_file(&cli_args.core_db)?;
    cli::kv("Xref store", &cli_args.xref_db.display().to_string());
    cli::kv("Xrefs", &xref_store.xrefs().len().to_string());
    cli::kv("Core store", &cli_args.core_db.display().to_string());
    eprintln!();

    // ── Mapping ──────────────────────────────────────────
    cli::section("Mapping");

    std::fs::create_dir_all(&cli_args.workdir)?;
    let scheduler = LocalScheduler::new();
    let mapper = Mapper {
        config: &config,
        xref_store: &xref_store,
        core_store: &core_store,
        scheduler: &scheduler,
        registry: MethodRegistry::builtin(),
        options: MapperOptions {
            workdir: cli_args.workdir.clone(),
            location: cli_args.location,
            maxdump: cli_args.maxdump,
            dumpcheck: cli_args.dumpcheck,
            use_existing_mappings: cli_args.use_existing_mappings,
            delete_existing: cli_args.delete_existing,
        },
    };
    let summary = mapper.run()?;

    cli::kv("Jobs submitted", &summary.jobs_submitted.to_string());
    cli::kv("Mappings kept", &summary.mappings_kept.to_string());
    cli::kv("Xrefs written", &summary.xrefs_written.to_string());
    cli::kv("Object xrefs written", &summary.object_xrefs_written.to_string());
    cli::kv(
        "Transcript display xrefs",
        &summary.transcripts_with_display.to_string(),
    );
    cli::kv("Gene display xrefs", &summary.genes_with_display.to_string());
    cli::kv("Genes described", &summary.genes_described.to_string());
    cli::success(&format!(
        "output written to {}",
        cli_args.workdir.display()
    ));

    cli::print_summary(start);
    Ok(())
}
