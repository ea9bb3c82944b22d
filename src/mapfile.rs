//! Parser for alignment map files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::cli;
use crate::context::PipelineContext;
use crate::emit::TableWriters;
use crate::error::Error;
use crate::ids::IdAllocator;
use crate::model::{IdentityScores, ObjectType, SequenceKind};

/// One colon-separated alignment record.
///
/// `label:query_id:target_id:identity:query_len:target_len:q_start:q_end:t_start:t_end:cigar:score`
/// where the query is the xref sequence and the target is the core object.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRecord {
    pub label: String,
    pub query_id: u64,
    pub target_id: u64,
    pub identity: u64,
    pub query_len: u64,
    pub target_len: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub target_start: u64,
    pub target_end: u64,
    pub cigar: String,
    pub score: String,
}

impl MapRecord {
    /// Query identity percent: `floor(100·identity/query_len)`.
    #[must_use]
    pub fn query_identity(&self) -> u32 {
        (self.identity * 100 / self.query_len) as u32
    }

    /// Target identity percent: `floor(100·identity/target_len)`.
    #[must_use]
    pub fn target_identity(&self) -> u32 {
        (self.identity * 100 / self.target_len) as u32
    }

    /// Keep iff either identity reaches its method threshold.
    #[must_use]
    pub fn passes(&self, query_threshold: u32, target_threshold: u32) -> bool {
        self.query_identity() >= query_threshold || self.target_identity() >= target_threshold
    }
}

/// Parse one map line. Returns `None` for lines that are not alignment
/// records (the tool writes banner lines around its output).
pub fn parse_line(line: &str) -> Result<Option<MapRecord>, Error> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != 12 {
        return Ok(None);
    }

    let number = |i: usize, what: &str| -> Result<u64, Error> {
        fields[i]
            .parse()
            .map_err(|e| Error::Parse(format!("invalid {what} '{}': {e}", fields[i])))
    };

    let query_len = number(4, "query length")?;
    let target_len = number(5, "target length")?;
    if query_len == 0 || target_len == 0 {
        return Err(Error::Parse(format!(
            "zero-length sequence in record: {line}"
        )));
    }

    Ok(Some(MapRecord {
        label: fields[0].to_string(),
        query_id: number(1, "query id")?,
        target_id: number(2, "target id")?,
        identity: number(3, "identity")?,
        query_len,
        target_len,
        query_start: number(6, "query start")?,
        query_end: number(7, "query end")?,
        target_start: number(8, "target start")?,
        target_end: number(9, "target end")?,
        cigar: fields[10].replace(' ', ""),
        score: fields[11].to_string(),
    }))
}

/// Decompose `<Method>_<dna|peptide>_<N>.map` into its parts.
#[must_use]
pub fn parse_map_filename(name: &str) -> Option<(String, SequenceKind, usize)> {
    let stem = name.strip_suffix(".map")?;
    let mut parts = stem.rsplitn(3, '_');
    let index: usize = parts.next()?.parse().ok()?;
    let kind = match parts.next()? {
        "dna" => SequenceKind::Dna,
        "peptide" => SequenceKind::Peptide,
        _ => return None,
    };
    let method = parts.next()?;
    if method.is_empty() {
        return None;
    }
    Some((method.to_string(), kind, index))
}

/// Counters from one map file.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapStats {
    pub records: usize,
    pub kept: usize,
    pub below_threshold: usize,
    pub unknown_source: usize,
    pub duplicates: usize,
}

/// Parse one map file, emitting object_xref and identity_xref rows for the
/// mappings that pass the method's thresholds, and updating the in-memory
/// indices for the downstream stages.
pub fn process_map_file(
    path: &Path,
    ctx: &mut PipelineContext,
    allocator: &mut IdAllocator,
    writers: &mut TableWriters,
    analysis_id: u64,
) -> Result<MapStats, Error> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Parse(format!("bad map file name: {}", path.display())))?;
    let Some((method, kind, _)) = parse_map_filename(name) else {
        return Err(Error::Parse(format!("unrecognized map file name: {name}")));
    };
    let Some(&(query_threshold, target_threshold)) = ctx.method_thresholds.get(&method) else {
        cli::warning(&format!("no thresholds recorded for method {method}; skipping {name}"));
        return Ok(MapStats::default());
    };
    let object_type = match kind {
        SequenceKind::Dna => ObjectType::Transcript,
        SequenceKind::Peptide => ObjectType::Translation,
    };

    let mut stats = MapStats::default();
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let record = match parse_line(&line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                cli::warning(&format!("{name}: {e}"));
                continue;
            }
        };
        stats.records += 1;

        if !record.passes(query_threshold, target_threshold) {
            stats.below_threshold += 1;
            continue;
        }
        if !ctx.xref_to_source.contains_key(&record.query_id) {
            stats.unknown_source += 1;
            continue;
        }

        let key = (object_type, record.target_id, record.query_id);
        if !ctx.object_xrefs_written.insert(key) {
            stats.duplicates += 1;
            continue;
        }

        let object_xref_id = allocator.allocate();
        writers.object_xref(
            object_xref_id,
            record.target_id,
            object_type,
            record.query_id,
            false,
        )?;
        // Alignment starts are 0-based; shift to the 1-based convention.
        writers.identity_xref(
            object_xref_id,
            record.query_identity(),
            record.target_identity(),
            record.query_start + 1,
            record.query_end,
            record.target_start + 1,
            record.target_end,
            &record.cigar,
            &record.score,
            analysis_id,
        )?;

        let object = (object_type, record.target_id);
        ctx.add_mapping(object, record.query_id);
        ctx.record_identities(
            object,
            record.query_id,
            IdentityScores {
                query_identity: record.query_identity(),
                target_identity: record.target_identity(),
            },
        );
        ctx.primary_xref_ids
            .entry(record.query_id)
            .or_default()
            .insert(object);
        stats.kept += 1;
    }

    Ok(stats)
}
