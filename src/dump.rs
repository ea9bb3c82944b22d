//! FASTA dumping for xref and core sequences.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::model::SequenceKind;
use crate::store::{CoreStore, XrefStore};

const LINE_WIDTH: usize = 60;

/// The dna/peptide rule filters for one rule index.
pub struct RuleFilters {
    pub dna: Option<crate::rules::RuleFilter>,
    pub peptide: Option<crate::rules::RuleFilter>,
}

/// Paths of the per-rule xref FASTA pair.
#[derive(Debug, Clone)]
pub struct XrefFastaPair {
    pub rule_index: usize,
    pub dna: PathBuf,
    pub peptide: PathBuf,
}

/// Paths of the core FASTA pair.
#[derive(Debug, Clone)]
pub struct CoreFastaPair {
    pub dna: PathBuf,
    pub protein: PathBuf,
}

/// Write one FASTA record: bare numeric id header, sequence wrapped at 60.
fn write_record<W: Write>(writer: &mut W, id: u64, sequence: &str) -> Result<(), Error> {
    writeln!(writer, ">{id}")?;
    let bytes = sequence.as_bytes();
    for chunk in bytes.chunks(LINE_WIDTH) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

pub fn xref_fasta_path(workdir: &Path, rule_index: usize, kind: SequenceKind) -> PathBuf {
    workdir.join(format!("xref_{rule_index}_{}.fasta", kind.as_str()))
}

/// Dump the per-rule xref FASTA subsets.
///
/// With `dumpcheck` set, the whole dump is skipped when every expected file
/// already exists on disk.
pub fn dump_xref_fastas(
    store: &dyn XrefStore,
    filters: &[RuleFilters],
    workdir: &Path,
    dumpcheck: bool,
) -> Result<Vec<XrefFastaPair>, Error> {
    let pairs: Vec<XrefFastaPair> = (0..filters.len())
        .map(|i| XrefFastaPair {
            rule_index: i,
            dna: xref_fasta_path(workdir, i, SequenceKind::Dna),
            peptide: xref_fasta_path(workdir, i, SequenceKind::Peptide),
        })
        .collect();

    if dumpcheck
        && pairs
            .iter()
            .all(|p| p.dna.exists() && p.peptide.exists())
    {
        return Ok(pairs);
    }

    for (pair, rule) in pairs.iter().zip(filters) {
        dump_one(store, SequenceKind::Dna, rule.dna.as_ref(), &pair.dna)?;
        dump_one(
            store,
            SequenceKind::Peptide,
            rule.peptide.as_ref(),
            &pair.peptide,
        )?;
    }
    Ok(pairs)
}

fn dump_one(
    store: &dyn XrefStore,
    kind: SequenceKind,
    filter: Option<&crate::rules::RuleFilter>,
    path: &Path,
) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for primary in store.primary_xrefs(kind, filter) {
        write_record(&mut writer, primary.xref_id, &primary.sequence)?;
    }
    writer.flush()?;
    Ok(())
}

/// Dump the core sequences: spliced cDNA per transcript and peptide per
/// translation, keyed by internal id.
///
/// `location` restricts the dump to one genomic slice; `maxdump` truncates
/// after that many transcripts (translations are bounded through the capped
/// transcript set).
pub fn dump_core_fastas(
    core: &dyn CoreStore,
    species: &str,
    workdir: &Path,
    location: Option<&str>,
    maxdump: Option<usize>,
    dumpcheck: bool,
) -> Result<CoreFastaPair, Error> {
    let pair = CoreFastaPair {
        dna: workdir.join(format!("{species}_dna.fasta")),
        protein: workdir.join(format!("{species}_protein.fasta")),
    };

    if dumpcheck && pair.dna.exists() && pair.protein.exists() {
        return Ok(pair);
    }

    let mut transcripts = core.transcripts(location);
    if let Some(cap) = maxdump {
        transcripts.truncate(cap);
    }

    let mut dna_writer = BufWriter::new(File::create(&pair.dna)?);
    for transcript in &transcripts {
        write_record(&mut dna_writer, transcript.transcript_id, &transcript.cdna)?;
    }
    dna_writer.flush()?;

    let kept: std::collections::BTreeSet<u64> =
        transcripts.iter().map(|t| t.transcript_id).collect();
    let mut protein_writer = BufWriter::new(File::create(&pair.protein)?);
    for translation in core.translations() {
        if kept.contains(&translation.transcript_id) {
            write_record(
                &mut protein_writer,
                translation.translation_id,
                &translation.peptide,
            )?;
        }
    }
    protein_writer.flush()?;

    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCoreStore, MemoryXrefStore};
    use tempfile::tempdir;

    fn xref_store() -> MemoryXrefStore {
        MemoryXrefStore::from_json(
            r#"{
                "sources": [ { "source_id": 1, "name": "RefSeq_dna" } ],
                "xrefs": [
                    { "xref_id": 7, "accession": "NM_1", "source_id": 1, "species_id": 7955 }
                ],
                "primary_xrefs": [
                    { "xref_id": 7, "kind": "dna",
                      "sequence": "ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTAC" }
                ]
            }"#,
        )
        .unwrap()
    }

    fn core_store() -> MemoryCoreStore {
        serde_json::from_str(
            r#"{
                "external_dbs": [],
                "transcripts": [
                    { "transcript_id": 1, "gene_id": 1, "stable_id": "T1", "cdna": "ACGT" },
                    { "transcript_id": 2, "gene_id": 1, "stable_id": "T2", "cdna": "GGGG" }
                ],
                "translations": [
                    { "translation_id": 10, "transcript_id": 1, "stable_id": "P1", "peptide": "MK" },
                    { "translation_id": 20, "transcript_id": 2, "stable_id": "P2", "peptide": "MV" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn records_wrap_at_sixty_columns() {
        let dir = tempdir().unwrap();
        let store = xref_store();
        let filters = vec![RuleFilters {
            dna: None,
            peptide: None,
        }];
        let pairs = dump_xref_fastas(&store, &filters, dir.path(), false).unwrap();
        let content = std::fs::read_to_string(&pairs[0].dna).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], ">7");
        assert_eq!(lines[1].len(), 60);
        assert_eq!(lines[2].len(), 10);
        // peptide file exists but is empty (no peptide primaries)
        assert_eq!(std::fs::read_to_string(&pairs[0].peptide).unwrap(), "");
    }

    #[test]
    fn dumpcheck_skips_existing_dumps() {
        let dir = tempdir().unwrap();
        let store = xref_store();
        let filters = vec![RuleFilters {
            dna: None,
            peptide: None,
        }];
        let pairs = dump_xref_fastas(&store, &filters, dir.path(), false).unwrap();
        std::fs::write(&pairs[0].dna, "sentinel").unwrap();
        dump_xref_fastas(&store, &filters, dir.path(), true).unwrap();
        // Untouched because every expected file was present
        assert_eq!(std::fs::read_to_string(&pairs[0].dna).unwrap(), "sentinel");
    }

    #[test]
    fn core_dump_writes_both_files() {
        let dir = tempdir().unwrap();
        let pair =
            dump_core_fastas(&core_store(), "danio_rerio", dir.path(), None, None, false).unwrap();
        let dna = std::fs::read_to_string(&pair.dna).unwrap();
        assert_eq!(dna, ">1\nACGT\n>2\nGGGG\n");
        let protein = std::fs::read_to_string(&pair.protein).unwrap();
        assert_eq!(protein, ">10\nMK\n>20\nMV\n");
    }

    #[test]
    fn maxdump_caps_transcripts_and_their_translations() {
        let dir = tempdir().unwrap();
        let pair =
            dump_core_fastas(&core_store(), "danio_rerio", dir.path(), None, Some(1), false)
                .unwrap();
        assert_eq!(std::fs::read_to_string(&pair.dna).unwrap(), ">1\nACGT\n");
        assert_eq!(std::fs::read_to_string(&pair.protein).unwrap(), ">10\nMK\n");
    }
}
