//! Display-xref selection for transcripts and genes.

use std::collections::BTreeMap;

use crate::cli;
use crate::context::{ObjectKey, PipelineContext};
use crate::emit::TableWriters;
use crate::error::Error;
use crate::model::ObjectType;
use crate::store::CoreMaps;

/// The winning xref for one object, with the keys the tie-breaks need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayChoice {
    pub xref_id: u64,
    /// Index into the priority list; lower is better.
    pub priority: usize,
    pub query_identity: u32,
}

/// Phase 1: best candidate per transcript and translation.
///
/// The priority index is the primary key; ties go to the higher query
/// identity. An xref whose source is not in the priority list, or whose
/// source cannot be resolved at all, is disqualified.
pub fn select_object_best(
    ctx: &PipelineContext,
    priorities: &[String],
    source_names: &BTreeMap<u64, String>,
) -> BTreeMap<ObjectKey, DisplayChoice> {
    let mut best: BTreeMap<ObjectKey, DisplayChoice> = BTreeMap::new();

    for (&object, xrefs) in &ctx.object_xref_mappings {
        if object.0 == ObjectType::Gene {
            continue;
        }
        for &xref_id in xrefs {
            let Some(source_id) = ctx.xref_to_source.get(&xref_id) else {
                cli::warning(&format!("xref {xref_id} has no recorded source; disqualified"));
                continue;
            };
            let Some(name) = source_names.get(source_id) else {
                cli::warning(&format!("source {source_id} has no name; disqualified"));
                continue;
            };
            let Some(priority) = priorities.iter().position(|p| p == name) else {
                continue;
            };
            let candidate = DisplayChoice {
                xref_id,
                priority,
                query_identity: ctx.query_identity(object, xref_id),
            };
            // Lower priority index wins; priority ties go to the higher
            // query identity
            let replace = match best.get(&object) {
                None => true,
                Some(current) => {
                    candidate.priority < current.priority
                        || (candidate.priority == current.priority
                            && candidate.query_identity > current.query_identity)
                }
            };
            if replace {
                best.insert(object, candidate);
            }
        }
    }

    best
}

/// Phase 2: reconcile each transcript with its translation.
///
/// The translation's choice wins only when it has strictly better priority
/// AND strictly greater query identity; otherwise the transcript keeps its
/// own.
pub fn reconcile_transcripts(
    best: &BTreeMap<ObjectKey, DisplayChoice>,
    maps: &CoreMaps,
) -> BTreeMap<u64, DisplayChoice> {
    let mut transcripts: std::collections::BTreeSet<u64> = std::collections::BTreeSet::new();
    for &(object_type, object_id) in best.keys() {
        match object_type {
            ObjectType::Transcript => {
                transcripts.insert(object_id);
            }
            ObjectType::Translation => {
                if let Some(&transcript_id) = maps.translation_to_transcript.get(&object_id) {
                    transcripts.insert(transcript_id);
                }
            }
            ObjectType::Gene => {}
        }
    }

    let mut chosen = BTreeMap::new();
    for transcript_id in transcripts {
        let from_transcript = best.get(&(ObjectType::Transcript, transcript_id));
        let from_translation = maps
            .transcript_to_translation
            .get(&transcript_id)
            .and_then(|translation_id| best.get(&(ObjectType::Translation, *translation_id)));

        let choice = match (from_transcript, from_translation) {
            (None, None) => continue,
            (Some(t), None) => *t,
            (None, Some(p)) => *p,
            (Some(t), Some(p)) => {
                if p.priority < t.priority && p.query_identity > t.query_identity {
                    *p
                } else {
                    *t
                }
            }
        };
        chosen.insert(transcript_id, choice);
    }
    chosen
}

/// Phase 3: each gene takes the best-priority xref among its transcripts,
/// ties broken by the longest transcript.
pub fn select_gene_best(
    chosen: &BTreeMap<u64, DisplayChoice>,
    maps: &CoreMaps,
) -> BTreeMap<u64, u64> {
    let mut gene_best = BTreeMap::new();
    for (&gene_id, transcripts) in &maps.gene_transcripts {
        let mut best: Option<(DisplayChoice, u64)> = None;
        for transcript_id in transcripts {
            let Some(&choice) = chosen.get(transcript_id) else {
                continue;
            };
            let length = maps
                .transcript_lengths
                .get(transcript_id)
                .copied()
                .unwrap_or(0);
            let better = match best {
                None => true,
                Some((current, current_length)) => {
                    choice.priority < current.priority
                        || (choice.priority == current.priority && length > current_length)
                }
            };
            if better {
                best = Some((choice, length));
            }
        }
        if let Some((choice, _)) = best {
            gene_best.insert(gene_id, choice.xref_id);
        }
    }
    gene_best
}

/// Counts reported by the selector.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayStats {
    pub transcripts: usize,
    pub genes: usize,
}

/// Run all three phases and emit the display files with shifted xref ids.
pub fn run(
    ctx: &PipelineContext,
    maps: &CoreMaps,
    priorities: &[String],
    source_names: &BTreeMap<u64, String>,
    xref_offset: u64,
    writers: &mut TableWriters,
) -> Result<DisplayStats, Error> {
    let best = select_object_best(ctx, priorities, source_names);
    let chosen = reconcile_transcripts(&best, maps);
    for (&transcript_id, choice) in &chosen {
        writers.transcript_display(choice.xref_id + xref_offset, transcript_id)?;
    }

    let gene_best = select_gene_best(&chosen, maps);
    for (&gene_id, &xref_id) in &gene_best {
        writers.gene_display(xref_id + xref_offset, gene_id)?;
    }

    Ok(DisplayStats {
        transcripts: chosen.len(),
        genes: gene_best.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdentityScores;
    use crate::store::{CoreMaps, MemoryCoreStore};

    fn source_names() -> BTreeMap<u64, String> {
        [
            (1, "Uniprot/SWISSPROT".to_string()),
            (2, "RefSeq_peptide".to_string()),
            (3, "ZFIN_ID".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn priorities() -> Vec<String> {
        // indices: ZFIN_ID=0 ... SWISSPROT=3, RefSeq_peptide=5
        vec![
            "ZFIN_ID".to_string(),
            "HGNC".to_string(),
            "MGI".to_string(),
            "Uniprot/SWISSPROT".to_string(),
            "EntrezGene".to_string(),
            "RefSeq_peptide".to_string(),
        ]
    }

    fn ctx_with(candidates: &[(ObjectKey, u64, u64, u32)]) -> PipelineContext {
        // (object, xref, source, query_identity)
        let mut ctx = PipelineContext::default();
        for &(object, xref_id, source_id, qi) in candidates {
            ctx.add_mapping(object, xref_id);
            ctx.xref_to_source.insert(xref_id, source_id);
            ctx.record_identities(
                object,
                xref_id,
                IdentityScores {
                    query_identity: qi,
                    target_identity: qi,
                },
            );
        }
        ctx
    }

    fn maps_for(
        transcripts: &[(u64, u64, u64)], // (transcript, gene, cdna_len)
        translations: &[(u64, u64)],     // (translation, transcript)
    ) -> CoreMaps {
        let core_json = serde_json::json!({
            "external_dbs": [],
            "genes": transcripts
                .iter()
                .map(|&(_, gene, _)| serde_json::json!({
                    "gene_id": gene, "stable_id": format!("G{gene}")
                }))
                .collect::<Vec<_>>(),
            "transcripts": transcripts
                .iter()
                .map(|&(t, gene, len)| serde_json::json!({
                    "transcript_id": t, "gene_id": gene, "stable_id": format!("T{t}"),
                    "cdna": "A".repeat(len as usize)
                }))
                .collect::<Vec<_>>(),
            "translations": translations
                .iter()
                .map(|&(p, t)| serde_json::json!({
                    "translation_id": p, "transcript_id": t, "stable_id": format!("P{p}"),
                    "peptide": "M"
                }))
                .collect::<Vec<_>>(),
        });
        let core: MemoryCoreStore = serde_json::from_str(&core_json.to_string()).unwrap();
        CoreMaps::build(&core)
    }

    #[test]
    fn priority_beats_identity() {
        // Transcript 5: xref A (SWISSPROT@3, qi=70) vs xref B (RefSeq_peptide@5, qi=90)
        let object = (ObjectType::Transcript, 5);
        let ctx = ctx_with(&[(object, 100, 1, 70), (object, 200, 2, 90)]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        assert_eq!(
            best[&object],
            DisplayChoice {
                xref_id: 100,
                priority: 3,
                query_identity: 70
            }
        );
    }

    #[test]
    fn identity_breaks_priority_ties() {
        let object = (ObjectType::Transcript, 5);
        let ctx = ctx_with(&[(object, 100, 1, 70), (object, 101, 1, 85)]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        assert_eq!(best[&object].xref_id, 101);
    }

    #[test]
    fn sources_outside_the_list_are_disqualified() {
        let object = (ObjectType::Transcript, 5);
        let mut ctx = ctx_with(&[(object, 100, 1, 70)]);
        // xref 300's source is real but unlisted
        ctx.add_mapping(object, 300);
        ctx.xref_to_source.insert(300, 99);
        let mut names = source_names();
        names.insert(99, "UnlistedSource".to_string());
        let best = select_object_best(&ctx, &priorities(), &names);
        assert_eq!(best[&object].xref_id, 100);
    }

    #[test]
    fn translation_overrides_only_on_strictly_better_priority_and_identity() {
        // Transcript 5 best: priority 5 (RefSeq_peptide), qi=70.
        // Translation 50 best: priority 3 (SWISSPROT), qi=85 → wins.
        let t_object = (ObjectType::Transcript, 5);
        let p_object = (ObjectType::Translation, 50);
        let ctx = ctx_with(&[(t_object, 200, 2, 70), (p_object, 100, 1, 85)]);
        let maps = maps_for(&[(5, 1, 100)], &[(50, 5)]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        let chosen = reconcile_transcripts(&best, &maps);
        assert_eq!(chosen[&5].xref_id, 100);

        // Same priorities but the translation's identity is NOT strictly
        // greater → transcript keeps its own
        let ctx = ctx_with(&[(t_object, 200, 2, 85), (p_object, 100, 1, 85)]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        let chosen = reconcile_transcripts(&best, &maps);
        assert_eq!(chosen[&5].xref_id, 200);
    }

    #[test]
    fn translation_only_choice_is_used() {
        let p_object = (ObjectType::Translation, 50);
        let ctx = ctx_with(&[(p_object, 100, 1, 85)]);
        let maps = maps_for(&[(5, 1, 100)], &[(50, 5)]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        let chosen = reconcile_transcripts(&best, &maps);
        assert_eq!(chosen[&5].xref_id, 100);
    }

    #[test]
    fn gene_ties_break_on_transcript_length() {
        // Gene 1 has transcripts 11 (len 2000) and 12 (len 3500), equal priority
        let o11 = (ObjectType::Transcript, 11);
        let o12 = (ObjectType::Transcript, 12);
        let ctx = ctx_with(&[(o11, 100, 1, 90), (o12, 101, 1, 90)]);
        let maps = maps_for(&[(11, 1, 2000), (12, 1, 3500)], &[]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        let chosen = reconcile_transcripts(&best, &maps);
        let gene_best = select_gene_best(&chosen, &maps);
        assert_eq!(gene_best[&1], 101);
    }

    #[test]
    fn gene_prefers_priority_over_length() {
        let o11 = (ObjectType::Transcript, 11);
        let o12 = (ObjectType::Transcript, 12);
        // ZFIN_ID (priority 0) on the short transcript beats SWISSPROT on the long
        let ctx = ctx_with(&[(o11, 100, 3, 50), (o12, 101, 1, 99)]);
        let maps = maps_for(&[(11, 1, 200), (12, 1, 3500)], &[]);
        let best = select_object_best(&ctx, &priorities(), &source_names());
        let chosen = reconcile_transcripts(&best, &maps);
        let gene_best = select_gene_best(&chosen, &maps);
        assert_eq!(gene_best[&1], 100);
    }
}
