//! The top-level mapping pipeline: config → dump → align → parse →
//! propagate → select → describe → emit.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli;
use crate::config::MappingConfig;
use crate::context::PipelineContext;
use crate::description;
use crate::display;
use crate::dump::{self, RuleFilters};
use crate::emit::{self, Loader, TableWriters};
use crate::ids::{self, IdAllocator};
use crate::mapfile;
use crate::methods::MethodRegistry;
use crate::model::SequenceKind;
use crate::propagate::{self, PropagateEnv};
use crate::rules;
use crate::scheduler::{AlignmentJob, JobId, Scheduler, SchedulerOutcome};
use crate::store::{CoreMaps, CoreStore, XrefStore};

/// Environment knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct MapperOptions {
    pub workdir: PathBuf,
    /// Restrict the core dump to one genomic slice.
    pub location: Option<String>,
    /// Truncate the core dump after this many transcripts.
    pub maxdump: Option<usize>,
    /// Skip FASTA dumping when every expected file already exists.
    pub dumpcheck: bool,
    /// Skip alignment dispatch when every expected map file already exists.
    pub use_existing_mappings: bool,
    /// Remove outputs of a previous run before starting.
    pub delete_existing: bool,
}

/// Counters reported after a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub jobs_submitted: usize,
    pub mappings_kept: usize,
    pub xrefs_written: usize,
    pub object_xrefs_written: usize,
    pub transcripts_with_display: usize,
    pub genes_with_display: usize,
    pub genes_described: usize,
}

/// The engine: owns the pipeline context and drives the stages strictly
/// sequentially. Concurrency lives in the scheduler, behind the single
/// wait-for-all barrier.
pub struct Mapper<'a> {
    pub config: &'a MappingConfig,
    pub xref_store: &'a dyn XrefStore,
    pub core_store: &'a dyn CoreStore,
    pub scheduler: &'a dyn Scheduler,
    pub registry: MethodRegistry,
    pub options: MapperOptions,
}

impl Mapper<'_> {
    pub fn run(&self) -> Result<RunSummary> {
        let workdir = &self.options.workdir;
        let mut summary = RunSummary::default();

        if self.options.delete_existing {
            let removed = emit::delete_existing_outputs(workdir)?;
            cli::kv("Removed stale files", &removed.to_string());
        }

        // Resolve species, source, and external_db names once up front
        let species_ids = self.xref_store.species_ids();
        let source_ids = self.xref_store.source_ids();
        let external_dbs = self.core_store.external_db_ids();
        let mut source_names: BTreeMap<u64, String> = BTreeMap::new();
        let mut external_db_of_source: BTreeMap<u64, u64> = BTreeMap::new();
        for (name, &source_id) in &source_ids {
            source_names.insert(source_id, name.clone());
            if let Some(&external_db_id) = external_dbs.get(name) {
                external_db_of_source.insert(source_id, external_db_id);
            }
        }

        let mut ctx = PipelineContext::default();
        for xref in self.xref_store.xrefs() {
            if external_db_of_source.contains_key(&xref.source_id) {
                ctx.xref_to_source.insert(xref.xref_id, xref.source_id);
            }
        }

        let xref_offset = ids::offset_after(self.core_store.max_xref_id());
        let mut allocator = IdAllocator::after_max(self.core_store.max_object_xref_id());

        // Translate the rule table into per-rule fetch filters
        let mut filters = Vec::with_capacity(self.config.rules.len());
        for rule in &self.config.rules {
            filters.push(RuleFilters {
                dna: rules::build_filter(rule, SequenceKind::Dna, &species_ids, &source_ids)?,
                peptide: rules::build_filter(
                    rule,
                    SequenceKind::Peptide,
                    &species_ids,
                    &source_ids,
                )?,
            });
        }

        let xref_fastas =
            dump::dump_xref_fastas(self.xref_store, &filters, workdir, self.options.dumpcheck)?;
        let core_fastas = dump::dump_core_fastas(
            self.core_store,
            &self.config.species,
            workdir,
            self.options.location.as_deref(),
            self.options.maxdump,
            self.options.dumpcheck,
        )?;

        // Build the job list; unknown methods are skipped, not fatal
        let mut jobs: Vec<AlignmentJob> = Vec::new();
        let mut expected_maps: Vec<(PathBuf, SequenceKind)> = Vec::new();
        for (rule, fastas) in self.config.rules.iter().zip(&xref_fastas) {
            let Some(method) = self.registry.get(&rule.method) else {
                cli::warning(&format!("no handler for method {}; rule skipped", rule.method));
                continue;
            };
            ctx.method_thresholds.insert(
                method.name.to_string(),
                (
                    method.query_identity_threshold,
                    method.target_identity_threshold,
                ),
            );
            for (kind, query, target) in [
                (SequenceKind::Dna, &fastas.dna, &core_fastas.dna),
                (SequenceKind::Peptide, &fastas.peptide, &core_fastas.protein),
            ] {
                let output = emit::map_file_path(workdir, method.name, kind, fastas.rule_index);
                jobs.push(AlignmentJob {
                    method: method.name.to_string(),
                    command: method.command(query, target),
                    output: output.clone(),
                });
                expected_maps.push((output, kind));
            }
        }

        let reuse = self.options.use_existing_mappings
            && expected_maps.iter().all(|(path, _)| path.exists());
        if reuse {
            cli::kv("Mappings", "reusing existing map files");
        } else {
            summary.jobs_submitted = self.dispatch(jobs);
        }

        let mut writers = TableWriters::create(workdir)?;

        for (path, kind) in &expected_maps {
            if !path.exists() {
                cli::warning(&format!("missing map file {}", path.display()));
                continue;
            }
            let stats = mapfile::process_map_file(
                path,
                &mut ctx,
                &mut allocator,
                &mut writers,
                self.core_store.analysis_id(*kind),
            )?;
            summary.mappings_kept += stats.kept;
        }

        let core_maps = CoreMaps::build(self.core_store);
        let env = PropagateEnv {
            store: self.xref_store,
            external_db_of_source: &external_db_of_source,
            xref_offset,
        };
        propagate::write_primary_xrefs(&env, &mut ctx, &mut writers)?;
        propagate::process_dependents(&env, &mut ctx, &mut allocator, &mut writers)?;
        propagate::process_direct_xrefs(&env, &mut ctx, &core_maps, &mut allocator, &mut writers)?;
        propagate::write_orphan_xrefs(&env, &mut ctx, &mut writers)?;
        propagate::write_synonyms(&env, &ctx, &mut writers)?;
        propagate::write_interpro(&env, &mut writers)?;

        let display_stats = display::run(
            &ctx,
            &core_maps,
            &self.config.display_sources,
            &source_names,
            xref_offset,
            &mut writers,
        )?;
        summary.transcripts_with_display = display_stats.transcripts;
        summary.genes_with_display = display_stats.genes;

        let description_filters = self.config.compiled_filters()?;
        summary.genes_described = description::run(
            &ctx,
            &core_maps,
            self.xref_store,
            &source_names,
            &description_filters,
            self.config.consortium.as_deref(),
            &mut writers,
        )?;

        writers.finish()?;

        summary.xrefs_written = ctx.xrefs_written.len();
        summary.object_xrefs_written = ctx.object_xrefs_written.len();
        Ok(summary)
    }

    /// Submit every job, publish the id set, then block until all have
    /// ended. Scheduler failure is a warning: the parser works with
    /// whatever map files exist.
    fn dispatch(&self, jobs: Vec<AlignmentJob>) -> usize {
        let mut job_ids: Vec<JobId> = Vec::new();
        for job in jobs {
            match self.scheduler.submit(job) {
                SchedulerOutcome::Submitted(id) => job_ids.push(id),
                SchedulerOutcome::Failed(reason) => {
                    cli::warning(&format!("job submission failed: {reason}"));
                }
            }
        }
        let published: Vec<String> = job_ids.iter().map(u64::to_string).collect();
        cli::kv("Jobs", &published.join(", "));

        if let Err(reason) = self.scheduler.wait_all(&job_ids) {
            cli::warning(&format!("scheduler failure: {reason}"));
        }
        job_ids.len()
    }

    /// Bulk-load the emitted file set and run the UPDATE scripts.
    pub fn upload(&self, loader: &mut dyn Loader, truncate: bool) -> Result<()> {
        emit::upload(&self.options.workdir, loader, truncate)
            .context("upload of emitted files failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCoreStore, MemoryXrefStore};
    use std::path::Path;
    use tempfile::tempdir;

    const XREF_SNAPSHOT: &str = r#"{
        "species": [ { "species_id": 7955, "name": "danio_rerio" } ],
        "sources": [
            { "source_id": 1, "name": "Uniprot/SWISSPROT" },
            { "source_id": 2, "name": "GO" },
            { "source_id": 3, "name": "ZFIN_ID" }
        ],
        "xrefs": [
            { "xref_id": 7, "accession": "P07000", "label": "cyc", "version": 1,
              "description": "Cytochrome c", "source_id": 1, "species_id": 7955 },
            { "xref_id": 9, "accession": "GO:0005739", "source_id": 2, "species_id": 7955 },
            { "xref_id": 20, "accession": "ZDB-GENE-1", "label": "cyc-zf",
              "description": "cyclin c", "source_id": 3, "species_id": 7955 }
        ],
        "primary_xrefs": [
            { "xref_id": 7, "kind": "peptide", "sequence": "MKVLYTRE" }
        ],
        "dependent_xrefs": [
            { "master_xref_id": 7, "dependent_xref_id": 9, "linkage_annotation": "IEA" }
        ],
        "direct_xrefs": [
            { "xref_id": 20, "stable_id": "ENSDART100", "object_type": "Transcript" }
        ],
        "synonyms": [ { "xref_id": 7, "synonym": "cyc-a" } ]
    }"#;

    const CORE_SNAPSHOT: &str = r#"{
        "external_dbs": [
            { "external_db_id": 2200, "name": "Uniprot/SWISSPROT" },
            { "external_db_id": 1000, "name": "GO" },
            { "external_db_id": 2400, "name": "ZFIN_ID" }
        ],
        "max_xref_id": 1000,
        "max_object_xref_id": 50,
        "analysis_ids": { "dna": 901, "peptide": 902 },
        "genes": [ { "gene_id": 1, "stable_id": "ENSDARG001" } ],
        "transcripts": [
            { "transcript_id": 100, "gene_id": 1, "stable_id": "ENSDART100",
              "cdna": "ACGTACGTACGT" }
        ],
        "translations": [
            { "translation_id": 501, "transcript_id": 100, "stable_id": "ENSDARP501",
              "peptide": "MKVLYTRE" }
        ]
    }"#;

    /// Stands in for the batch scheduler: every submitted peptide job gets a
    /// fixed alignment result written to its map file.
    struct StubScheduler;

    impl Scheduler for StubScheduler {
        fn submit(&self, job: AlignmentJob) -> SchedulerOutcome {
            let content = if job.output.to_string_lossy().contains("_peptide_") {
                "xref:7:501:95:100:104:0:99:0:103:M 104:470\n"
            } else {
                ""
            };
            std::fs::write(&job.output, content).unwrap();
            SchedulerOutcome::Submitted(job.output.to_string_lossy().len() as JobId)
        }

        fn wait_all(&self, _jobs: &[JobId]) -> Result<(), String> {
            Ok(())
        }

        fn cancel_all(&self, _jobs: &[JobId]) {}
    }

    /// Fails the test if the pipeline dispatches at all.
    struct PanicScheduler;

    impl Scheduler for PanicScheduler {
        fn submit(&self, job: AlignmentJob) -> SchedulerOutcome {
            panic!("unexpected submission of {}", job.output.display());
        }

        fn wait_all(&self, _jobs: &[JobId]) -> Result<(), String> {
            panic!("unexpected wait");
        }

        fn cancel_all(&self, _jobs: &[JobId]) {}
    }

    fn config() -> MappingConfig {
        serde_json::from_str(
            r#"{
                "species": "danio_rerio",
                "rules": [
                    { "method": "ExonerateGappedBest1",
                      "pairs": [ { "species": "*", "source": "*" } ] }
                ],
                "display_sources": ["ZFIN_ID", "Uniprot/SWISSPROT"],
                "description_filters": [],
                "consortium": "ZFIN_ID"
            }"#,
        )
        .unwrap()
    }

    fn mapper<'a>(
        config: &'a MappingConfig,
        xref_store: &'a MemoryXrefStore,
        core_store: &'a MemoryCoreStore,
        scheduler: &'a dyn Scheduler,
        workdir: &Path,
        reuse: bool,
    ) -> Mapper<'a> {
        Mapper {
            config,
            xref_store,
            core_store,
            scheduler,
            registry: MethodRegistry::builtin(),
            options: MapperOptions {
                workdir: workdir.to_path_buf(),
                location: None,
                maxdump: None,
                dumpcheck: reuse,
                use_existing_mappings: reuse,
                delete_existing: false,
            },
        }
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn full_pipeline_produces_the_output_file_set() {
        let dir = tempdir().unwrap();
        let xref_store = MemoryXrefStore::from_json(XREF_SNAPSHOT).unwrap();
        let core_store: MemoryCoreStore = serde_json::from_str(CORE_SNAPSHOT).unwrap();
        let config = config();
        let scheduler = StubScheduler;
        let m = mapper(&config, &xref_store, &core_store, &scheduler, dir.path(), false);
        let summary = m.run().unwrap();

        assert_eq!(summary.jobs_submitted, 2);
        assert_eq!(summary.mappings_kept, 1);
        assert_eq!(summary.xrefs_written, 3);

        // xref ids are shifted past the core maximum (offset 1001)
        let xref = read(dir.path(), "xref.txt");
        assert_eq!(
            xref,
            "1008\t2200\tP07000\tcyc\t1\tCytochrome c\n\
             1010\t1000\tGO:0005739\tGO:0005739\t0\t\tDEPENDENT\n\
             1021\t2400\tZDB-GENE-1\tcyc-zf\t0\tcyclin c\n"
        );

        // object_xref ids continue past the core maximum of 50; the aligned
        // row precedes the dependent row
        let object_xref = read(dir.path(), "object_xref.txt");
        assert_eq!(
            object_xref,
            "51\t501\tTranslation\t7\n\
             52\t501\tTranslation\t9\tDEPENDENT\n\
             53\t100\tTranscript\t20\n"
        );

        let identity = read(dir.path(), "identity_xref.txt");
        assert_eq!(identity, "51\t95\t91\t1\t99\t1\t103\tM104\t470\t\\N\t902\n");

        assert_eq!(read(dir.path(), "go_xref.txt"), "52\tIEA\n");
        assert_eq!(read(dir.path(), "external_synonym.txt"), "1008\tcyc-a\n");

        // ZFIN_ID (priority 0) beats SWISSPROT for the transcript and gene
        assert_eq!(read(dir.path(), "transcript_display_xref.txt"), "1021\t100\n");
        assert_eq!(read(dir.path(), "gene_display_xref.txt"), "1021\t1\n");
        assert_eq!(
            read(dir.path(), "transcript_display_xref.sql"),
            "UPDATE transcript SET display_xref_id=1021 WHERE transcript_id=100;\n"
        );

        // The consortium description wins over SWISSPROT
        assert_eq!(
            read(dir.path(), "gene_description.txt"),
            "1\tcyclin c [Source:ZFIN_ID;Acc:ZDB-GENE-1]\n"
        );
    }

    #[test]
    fn rerun_with_existing_mappings_is_byte_identical() {
        let dir = tempdir().unwrap();
        let xref_store = MemoryXrefStore::from_json(XREF_SNAPSHOT).unwrap();
        let core_store: MemoryCoreStore = serde_json::from_str(CORE_SNAPSHOT).unwrap();
        let config = config();

        let scheduler = StubScheduler;
        let m = mapper(&config, &xref_store, &core_store, &scheduler, dir.path(), false);
        m.run().unwrap();

        let tables = [
            "xref.txt",
            "object_xref.txt",
            "identity_xref.txt",
            "external_synonym.txt",
            "go_xref.txt",
            "interpro.txt",
            "gene_description.txt",
            "transcript_display_xref.txt",
            "gene_display_xref.txt",
        ];
        let first: Vec<String> = tables.iter().map(|t| read(dir.path(), t)).collect();

        // Second run must neither dump nor dispatch, and must reproduce the
        // outputs byte for byte
        let panic_scheduler = PanicScheduler;
        let m = mapper(
            &config,
            &xref_store,
            &core_store,
            &panic_scheduler,
            dir.path(),
            true,
        );
        let summary = m.run().unwrap();
        assert_eq!(summary.jobs_submitted, 0);

        let second: Vec<String> = tables.iter().map(|t| read(dir.path(), t)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_method_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let xref_store = MemoryXrefStore::from_json(XREF_SNAPSHOT).unwrap();
        let core_store: MemoryCoreStore = serde_json::from_str(CORE_SNAPSHOT).unwrap();
        let config: MappingConfig = serde_json::from_str(
            r#"{
                "species": "danio_rerio",
                "rules": [
                    { "method": "NoSuchAligner",
                      "pairs": [ { "species": "*", "source": "*" } ] }
                ],
                "display_sources": ["ZFIN_ID"]
            }"#,
        )
        .unwrap();
        let scheduler = PanicScheduler;
        let m = mapper(&config, &xref_store, &core_store, &scheduler, dir.path(), false);
        let summary = m.run().unwrap();
        assert_eq!(summary.jobs_submitted, 0);
        assert_eq!(summary.mappings_kept, 0);
        // Direct xrefs still flow through
        assert!(read(dir.path(), "xref.txt").contains("ZDB-GENE-1"));
    }
}
