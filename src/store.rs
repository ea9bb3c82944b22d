//! Database adapter contracts and their JSON-snapshot implementations.
//!
//! The engine never executes SQL itself; it talks to the xref store and the
//! core annotation store through these traits. The `Memory*` implementations
//! load a JSON snapshot from disk and back both the `map_xrefs` binary and
//! the test suite.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    DependentXref, DirectXref, Gene, InterproPair, ObjectType, PrimaryXref, SequenceKind, Source,
    Synonym, Transcript, Translation, Xref,
};
use crate::rules::RuleFilter;

/// Read access to the curated xref database.
pub trait XrefStore {
    /// Species name → species id.
    fn species_ids(&self) -> BTreeMap<String, u64>;
    /// Source name → source id.
    fn source_ids(&self) -> BTreeMap<String, u64>;
    fn source_name(&self, source_id: u64) -> Option<&str>;
    fn xref(&self, xref_id: u64) -> Option<&Xref>;
    fn xrefs(&self) -> &[Xref];
    /// Primary xrefs of the given kind passing the rule filter (all of the
    /// kind when no filter applies).
    fn primary_xrefs(&self, kind: SequenceKind, filter: Option<&RuleFilter>) -> Vec<PrimaryXref>;
    /// Dependent edges whose master is in the given set.
    fn dependents_of(&self, master_ids: &[u64]) -> Vec<DependentXref>;
    fn direct_xrefs(&self) -> &[DirectXref];
    fn synonyms(&self) -> &[Synonym];
    fn interpro_pairs(&self) -> &[InterproPair];
    /// Xrefs appearing in neither the primary nor the dependent table.
    fn orphan_xref_ids(&self) -> Vec<u64>;
}

/// Read access to the core annotation database.
pub trait CoreStore {
    fn max_xref_id(&self) -> Option<u64>;
    fn max_object_xref_id(&self) -> Option<u64>;
    /// external_db name → external_db id in the target.
    fn external_db_ids(&self) -> BTreeMap<String, u64>;
    /// Analysis id attached to identity_xref rows of the given mapping kind.
    fn analysis_id(&self, kind: SequenceKind) -> u64;
    fn genes(&self) -> &[Gene];
    /// Transcripts, optionally restricted to one genomic slice.
    fn transcripts(&self, location: Option<&str>) -> Vec<Transcript>;
    fn translations(&self) -> &[Translation];
}

/// In-memory xref store deserialized from a JSON snapshot.
#[derive(Debug, Deserialize)]
pub struct MemoryXrefStore {
    #[serde(default)]
    species: Vec<SpeciesRow>,
    sources: Vec<Source>,
    xrefs: Vec<Xref>,
    #[serde(default)]
    primary_xrefs: Vec<PrimaryXref>,
    #[serde(default)]
    dependent_xrefs: Vec<DependentXref>,
    #[serde(default)]
    direct_xrefs: Vec<DirectXref>,
    #[serde(default)]
    synonyms: Vec<Synonym>,
    #[serde(default)]
    interpro: Vec<InterproPair>,

    #[serde(skip)]
    xref_index: BTreeMap<u64, usize>,
    #[serde(skip)]
    source_names: BTreeMap<u64, String>,
}

#[derive(Debug, Deserialize)]
struct SpeciesRow {
    species_id: u64,
    name: String,
}

impl MemoryXrefStore {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read xref snapshot: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse xref snapshot: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mut store: Self = serde_json::from_str(content)?;
        store.build_indices();
        Ok(store)
    }

    fn build_indices(&mut self) {
        self.xref_index = self
            .xrefs
            .iter()
            .enumerate()
            .map(|(i, x)| (x.xref_id, i))
            .collect();
        self.source_names = self
            .sources
            .iter()
            .map(|s| (s.source_id, s.name.clone()))
            .collect();
    }
}

impl XrefStore for MemoryXrefStore {
    fn species_ids(&self) -> BTreeMap<String, u64> {
        self.species
            .iter()
            .map(|s| (s.name.clone(), s.species_id))
            .collect()
    }

    fn source_ids(&self) -> BTreeMap<String, u64> {
        self.sources
            .iter()
            .map(|s| (s.name.clone(), s.source_id))
            .collect()
    }

    fn source_name(&self, source_id: u64) -> Option<&str> {
        self.source_names.get(&source_id).map(String::as_str)
    }

    fn xref(&self, xref_id: u64) -> Option<&Xref> {
        self.xref_index.get(&xref_id).map(|&i| &self.xrefs[i])
    }

    fn xrefs(&self) -> &[Xref] {
        &self.xrefs
    }

    fn primary_xrefs(&self, kind: SequenceKind, filter: Option<&RuleFilter>) -> Vec<PrimaryXref> {
        self.primary_xrefs
            .iter()
            .filter(|p| p.kind == kind)
            .filter(|p| match (filter, self.xref(p.xref_id)) {
                (None, _) => true,
                (Some(f), Some(xref)) => f.matches(xref.species_id, xref.source_id),
                (Some(_), None) => false,
            })
            .cloned()
            .collect()
    }

    fn dependents_of(&self, master_ids: &[u64]) -> Vec<DependentXref> {
        let wanted: BTreeSet<u64> = master_ids.iter().copied().collect();
        self.dependent_xrefs
            .iter()
            .filter(|d| wanted.contains(&d.master_xref_id))
            .cloned()
            .collect()
    }

    fn direct_xrefs(&self) -> &[DirectXref] {
        &self.direct_xrefs
    }

    fn synonyms(&self) -> &[Synonym] {
        &self.synonyms
    }

    fn interpro_pairs(&self) -> &[InterproPair] {
        &self.interpro
    }

    fn orphan_xref_ids(&self) -> Vec<u64> {
        let attached: BTreeSet<u64> = self
            .primary_xrefs
            .iter()
            .map(|p| p.xref_id)
            .chain(self.dependent_xrefs.iter().map(|d| d.dependent_xref_id))
            .collect();
        self.xrefs
            .iter()
            .map(|x| x.xref_id)
            .filter(|id| !attached.contains(id))
            .collect()
    }
}

/// In-memory core store deserialized from a JSON snapshot.
#[derive(Debug, Deserialize)]
pub struct MemoryCoreStore {
    external_dbs: Vec<ExternalDbRow>,
    #[serde(default)]
    max_xref_id: Option<u64>,
    #[serde(default)]
    max_object_xref_id: Option<u64>,
    #[serde(default)]
    analysis_ids: BTreeMap<SequenceKind, u64>,
    #[serde(default)]
    genes: Vec<Gene>,
    #[serde(default)]
    transcripts: Vec<Transcript>,
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct ExternalDbRow {
    external_db_id: u64,
    name: String,
}

impl MemoryCoreStore {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read core snapshot: {}", path.display()))?;
        let store: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse core snapshot: {}", path.display()))?;
        Ok(store)
    }
}

impl CoreStore for MemoryCoreStore {
    fn max_xref_id(&self) -> Option<u64> {
        self.max_xref_id
    }

    fn max_object_xref_id(&self) -> Option<u64> {
        self.max_object_xref_id
    }

    fn external_db_ids(&self) -> BTreeMap<String, u64> {
        self.external_dbs
            .iter()
            .map(|db| (db.name.clone(), db.external_db_id))
            .collect()
    }

    fn analysis_id(&self, kind: SequenceKind) -> u64 {
        self.analysis_ids.get(&kind).copied().unwrap_or(0)
    }

    fn genes(&self) -> &[Gene] {
        &self.genes
    }

    fn transcripts(&self, location: Option<&str>) -> Vec<Transcript> {
        self.transcripts
            .iter()
            .filter(|t| location.is_none_or(|slice| t.seq_region == slice))
            .cloned()
            .collect()
    }

    fn translations(&self) -> &[Translation] {
        &self.translations
    }
}

/// Lookup tables derived from the core store, built once per run.
#[derive(Debug, Default)]
pub struct CoreMaps {
    /// Stable id → internal id, per object type.
    pub stable_ids: BTreeMap<ObjectType, BTreeMap<String, u64>>,
    /// Transcript stable id → translation stable id.
    pub translation_stable_of_transcript: BTreeMap<String, String>,
    /// Transcript internal id → translation internal id.
    pub transcript_to_translation: BTreeMap<u64, u64>,
    /// Translation internal id → transcript internal id.
    pub translation_to_transcript: BTreeMap<u64, u64>,
    /// Gene internal id → transcript internal ids.
    pub gene_transcripts: BTreeMap<u64, Vec<u64>>,
    /// Transcript internal id → spliced cDNA length.
    pub transcript_lengths: BTreeMap<u64, u64>,
}

impl CoreMaps {
    pub fn build(core: &dyn CoreStore) -> Self {
        let mut maps = Self::default();

        let mut gene_stable = BTreeMap::new();
        for gene in core.genes() {
            gene_stable.insert(gene.stable_id.clone(), gene.gene_id);
        }
        maps.stable_ids.insert(ObjectType::Gene, gene_stable);

        let mut transcript_stable = BTreeMap::new();
        let mut stable_of_transcript_id = BTreeMap::new();
        for transcript in core.transcripts(None) {
            transcript_stable.insert(transcript.stable_id.clone(), transcript.transcript_id);
            stable_of_transcript_id.insert(transcript.transcript_id, transcript.stable_id.clone());
            maps.gene_transcripts
                .entry(transcript.gene_id)
                .or_default()
                .push(transcript.transcript_id);
            maps.transcript_lengths
                .insert(transcript.transcript_id, transcript.cdna.len() as u64);
        }
        maps.stable_ids.insert(ObjectType::Transcript, transcript_stable);

        let mut translation_stable = BTreeMap::new();
        for translation in core.translations() {
            translation_stable.insert(translation.stable_id.clone(), translation.translation_id);
            maps.transcript_to_translation
                .insert(translation.transcript_id, translation.translation_id);
            maps.translation_to_transcript
                .insert(translation.translation_id, translation.transcript_id);
            if let Some(transcript_stable_id) = stable_of_transcript_id.get(&translation.transcript_id)
            {
                maps.translation_stable_of_transcript
                    .insert(transcript_stable_id.clone(), translation.stable_id.clone());
            }
        }
        maps.stable_ids.insert(ObjectType::Translation, translation_stable);

        maps
    }

    /// Resolve a stable id to an internal id for the given object type.
    #[must_use]
    pub fn internal_id(&self, object_type: ObjectType, stable_id: &str) -> Option<u64> {
        self.stable_ids
            .get(&object_type)
            .and_then(|ids| ids.get(stable_id))
            .copied()
    }
}
