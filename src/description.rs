//! Gene description assembly from the mapped xref pool.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::context::{ObjectKey, PipelineContext};
use crate::emit::TableWriters;
use crate::error::Error;
use crate::model::ObjectType;
use crate::store::{CoreMaps, XrefStore};

/// Source ranking for description selection, worst first. The consortium
/// source, when configured, ranks above all of these.
const RANKED_SOURCES: [&str; 4] = [
    "Uniprot/SPTREMBL",
    "RefSeq_dna",
    "RefSeq_peptide",
    "Uniprot/SWISSPROT",
];

/// Filler words ordering SPTREMBL descriptions, dirtiest first. A
/// description matching none of them beats every match.
const FILLER_WORDS: [&str; 10] = [
    "unknown",
    "hypothetical",
    "putative",
    "novel",
    "probable",
    "[0-9]{3}",
    "kDa",
    "fragment",
    "cdna",
    "protein",
];

static FILLER_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FILLER_WORDS
        .iter()
        .map(|word| {
            RegexBuilder::new(word)
                .case_insensitive(true)
                .build()
                .expect("filler word regexes are static")
        })
        .collect()
});

/// Position of the cleanest filler word found, with no match ranking above
/// every match.
fn filler_score(description: &str) -> usize {
    FILLER_REGEXES
        .iter()
        .rposition(|re| re.is_match(description))
        .map_or(FILLER_WORDS.len(), |i| i)
}

fn source_rank(name: &str, consortium: Option<&str>) -> i32 {
    if consortium == Some(name) {
        return RANKED_SOURCES.len() as i32;
    }
    RANKED_SOURCES
        .iter()
        .position(|s| *s == name)
        .map_or(-1, |i| i as i32)
}

/// Load every xref description, delete all filter-regex matches, and drop
/// xrefs whose description comes out empty.
pub fn filtered_descriptions(
    store: &dyn XrefStore,
    filters: &[Regex],
) -> BTreeMap<u64, String> {
    let mut descriptions = BTreeMap::new();
    for xref in store.xrefs() {
        if xref.description.is_empty() {
            continue;
        }
        let mut description = xref.description.clone();
        for filter in filters {
            description = filter.replace_all(&description, "").into_owned();
        }
        let description = description.trim().to_string();
        if !description.is_empty() {
            descriptions.insert(xref.xref_id, description);
        }
    }
    descriptions
}

/// One described xref in a gene's pool, remembered with the object it was
/// reached through so identities can be fetched for the comparison.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    xref_id: u64,
    object: ObjectKey,
}

fn source_name_of<'a>(
    candidate: &Candidate,
    ctx: &PipelineContext,
    source_names: &'a BTreeMap<u64, String>,
) -> &'a str {
    ctx.xref_to_source
        .get(&candidate.xref_id)
        .and_then(|source_id| source_names.get(source_id))
        .map_or("", String::as_str)
}

fn compare_candidates(
    a: &Candidate,
    b: &Candidate,
    ctx: &PipelineContext,
    source_names: &BTreeMap<u64, String>,
    descriptions: &BTreeMap<u64, String>,
    consortium: Option<&str>,
) -> Ordering {
    let name_a = source_name_of(a, ctx, source_names);
    let name_b = source_name_of(b, ctx, source_names);

    let by_rank = source_rank(name_a, consortium).cmp(&source_rank(name_b, consortium));
    if by_rank != Ordering::Equal || name_a != name_b {
        return by_rank;
    }

    match name_a {
        "Uniprot/SWISSPROT" | "RefSeq_dna" | "RefSeq_peptide" => {
            let scores = |c: &Candidate| {
                let s = ctx.identities(c.object, c.xref_id);
                (
                    s.map_or(0, |s| s.query_identity),
                    s.map_or(0, |s| s.target_identity),
                )
            };
            scores(a).cmp(&scores(b))
        }
        "Uniprot/SPTREMBL" => {
            let score = |c: &Candidate| {
                descriptions.get(&c.xref_id).map_or(0, |d| filler_score(d))
            };
            score(a).cmp(&score(b))
        }
        _ => Ordering::Equal,
    }
}

/// Build one description per gene from the xrefs reachable through its
/// transcripts and translations, and emit the gene_description rows.
///
/// The pool is sorted under the source-rank total order (stable), and the
/// last element wins.
pub fn run(
    ctx: &PipelineContext,
    maps: &CoreMaps,
    store: &dyn XrefStore,
    source_names: &BTreeMap<u64, String>,
    filters: &[Regex],
    consortium: Option<&str>,
    writers: &mut TableWriters,
) -> Result<usize, Error> {
    let descriptions = filtered_descriptions(store, filters);
    let mut described_genes = 0;

    for (&gene_id, transcripts) in &maps.gene_transcripts {
        let mut pool: Vec<Candidate> = Vec::new();
        let mut in_pool = std::collections::BTreeSet::new();

        for &transcript_id in transcripts {
            let mut objects = vec![(ObjectType::Transcript, transcript_id)];
            if let Some(&translation_id) = maps.transcript_to_translation.get(&transcript_id) {
                objects.push((ObjectType::Translation, translation_id));
            }
            for object in objects {
                let Some(xrefs) = ctx.object_xref_mappings.get(&object) else {
                    continue;
                };
                for &xref_id in xrefs {
                    if descriptions.contains_key(&xref_id) && in_pool.insert(xref_id) {
                        pool.push(Candidate { xref_id, object });
                    }
                }
            }
        }

        if pool.is_empty() {
            continue;
        }
        pool.sort_by(|a, b| {
            compare_candidates(a, b, ctx, source_names, &descriptions, consortium)
        });
        let winner = pool[pool.len() - 1];

        let Some(xref) = store.xref(winner.xref_id) else {
            continue;
        };
        let source_name = ctx
            .xref_to_source
            .get(&winner.xref_id)
            .and_then(|source_id| source_names.get(source_id))
            .map_or("", String::as_str);
        let description = &descriptions[&winner.xref_id];
        writers.gene_description(
            gene_id,
            &format!(
                "{description} [Source:{source_name};Acc:{}]",
                xref.accession
            ),
        )?;
        described_genes += 1;
    }

    Ok(described_genes)
}
