//! Propagation of mappings across primary, dependent, and direct relations.

use std::collections::BTreeMap;

use crate::cli;
use crate::context::PipelineContext;
use crate::emit::TableWriters;
use crate::error::Error;
use crate::ids::IdAllocator;
use crate::model::{ObjectType, Xref};
use crate::store::{CoreMaps, XrefStore};

/// Master xrefs are consumed in chunks of this size to keep the dependent
/// lookup's `IN (...)` clause bounded.
const DEPENDENT_CHUNK: usize = 200;

/// Stable-id suffixes tried when a direct xref's target is unknown
/// (legacy UTR-transcript compensation).
const STABLE_ID_SUFFIXES: [&str; 4] = [".1", ".2", ".3", ".4"];

/// Shared lookups for the propagation passes.
pub struct PropagateEnv<'a> {
    pub store: &'a dyn XrefStore,
    /// source id → external_db id in the target; sources missing here are
    /// dropped from all outputs.
    pub external_db_of_source: &'a BTreeMap<u64, u64>,
    /// Offset added to xref ids on emission.
    pub xref_offset: u64,
}

impl PropagateEnv<'_> {
    fn external_db_id(&self, xref: &Xref) -> Option<u64> {
        self.external_db_of_source.get(&xref.source_id).copied()
    }

    /// Write the xref row once, applying the source filter and the
    /// written-set guard. Returns true when the xref is in the output.
    fn write_xref(
        &self,
        ctx: &mut PipelineContext,
        writers: &mut TableWriters,
        xref: &Xref,
        dependent: bool,
    ) -> Result<bool, Error> {
        let Some(external_db_id) = self.external_db_id(xref) else {
            return Ok(false);
        };
        if ctx.xrefs_written.contains(&xref.xref_id) {
            return Ok(true);
        }
        writers.xref(
            xref.xref_id + self.xref_offset,
            external_db_id,
            &xref.accession,
            xref.display_label(),
            xref.version,
            &xref.description,
            dependent,
        )?;
        ctx.xrefs_written.insert(xref.xref_id);
        Ok(true)
    }
}

/// (a) Primary pass: one xref row for every xref that aligned to a core
/// object.
pub fn write_primary_xrefs(
    env: &PropagateEnv,
    ctx: &mut PipelineContext,
    writers: &mut TableWriters,
) -> Result<(), Error> {
    let ids: Vec<u64> = ctx.primary_xref_ids.keys().copied().collect();
    for xref_id in ids {
        if let Some(xref) = env.store.xref(xref_id) {
            env.write_xref(ctx, writers, xref, false)?;
        }
    }
    Ok(())
}

/// (b) Dependent closure: walk dependents of every mapped master, linking
/// each dependent to the master's core objects and inheriting identities.
pub fn process_dependents(
    env: &PropagateEnv,
    ctx: &mut PipelineContext,
    allocator: &mut IdAllocator,
    writers: &mut TableWriters,
) -> Result<(), Error> {
    let masters: Vec<u64> = ctx.primary_xref_ids.keys().copied().collect();
    for chunk in masters.chunks(DEPENDENT_CHUNK) {
        for edge in env.store.dependents_of(chunk) {
            let Some(dependent) = env.store.xref(edge.dependent_xref_id).cloned() else {
                cli::warning(&format!(
                    "dependent xref {} not found in xref store",
                    edge.dependent_xref_id
                ));
                continue;
            };
            if !env.write_xref(ctx, writers, &dependent, true)? {
                continue;
            }
            let is_go = env.store.source_name(dependent.source_id) == Some("GO");

            let objects: Vec<_> = ctx.primary_xref_ids[&edge.master_xref_id]
                .iter()
                .copied()
                .collect();
            for object in objects {
                let (object_type, object_id) = object;
                if !ctx
                    .object_xrefs_written
                    .insert((object_type, object_id, dependent.xref_id))
                {
                    continue;
                }
                let object_xref_id = allocator.allocate();
                writers.object_xref(
                    object_xref_id,
                    object_id,
                    object_type,
                    dependent.xref_id,
                    true,
                )?;
                // Dependents inherit the master's alignment identities
                if let Some(scores) = ctx.identities(object, edge.master_xref_id) {
                    ctx.record_identities(object, dependent.xref_id, scores);
                }
                if is_go {
                    writers.go_xref(object_xref_id, &edge.linkage_annotation)?;
                }
                ctx.add_mapping(object, dependent.xref_id);
            }
        }
    }
    Ok(())
}

/// Direct xrefs: curated edges to stable ids, resolved to internal ids.
pub fn process_direct_xrefs(
    env: &PropagateEnv,
    ctx: &mut PipelineContext,
    core_maps: &CoreMaps,
    allocator: &mut IdAllocator,
    writers: &mut TableWriters,
) -> Result<(), Error> {
    for direct in env.store.direct_xrefs() {
        let Some(xref) = env.store.xref(direct.xref_id).cloned() else {
            cli::warning(&format!(
                "direct xref {} not found in xref store",
                direct.xref_id
            ));
            continue;
        };
        if env.external_db_id(&xref).is_none() {
            continue;
        }

        let mut object_type = direct.object_type;
        let mut stable_id = direct.stable_id.clone();

        // CCDS is curated against transcripts but attaches to the translation
        if env.store.source_name(xref.source_id) == Some("CCDS")
            && object_type == ObjectType::Transcript
        {
            match core_maps.translation_stable_of_transcript.get(&stable_id) {
                Some(translation_stable) => {
                    stable_id = translation_stable.clone();
                    object_type = ObjectType::Translation;
                }
                None => {
                    cli::warning(&format!(
                        "CCDS xref {} targets transcript {} with no translation; skipped",
                        xref.accession, direct.stable_id
                    ));
                    continue;
                }
            }
        }

        let Some(object_id) = resolve_stable_id(core_maps, object_type, &stable_id) else {
            cli::warning(&format!(
                "direct xref {}: unknown {} stable id {}; skipped",
                xref.accession, object_type, stable_id
            ));
            continue;
        };

        env.write_xref(ctx, writers, &xref, false)?;
        if !ctx
            .object_xrefs_written
            .insert((object_type, object_id, xref.xref_id))
        {
            continue;
        }
        let object_xref_id = allocator.allocate();
        writers.object_xref(object_xref_id, object_id, object_type, xref.xref_id, false)?;
        ctx.add_mapping((object_type, object_id), xref.xref_id);
    }
    Ok(())
}

fn resolve_stable_id(
    core_maps: &CoreMaps,
    object_type: ObjectType,
    stable_id: &str,
) -> Option<u64> {
    if let Some(id) = core_maps.internal_id(object_type, stable_id) {
        return Some(id);
    }
    STABLE_ID_SUFFIXES
        .iter()
        .find_map(|suffix| core_maps.internal_id(object_type, &format!("{stable_id}{suffix}")))
}

/// Orphan xrefs: present in the store with a known external_db but attached
/// through neither the primary nor the dependent table.
pub fn write_orphan_xrefs(
    env: &PropagateEnv,
    ctx: &mut PipelineContext,
    writers: &mut TableWriters,
) -> Result<(), Error> {
    for xref_id in env.store.orphan_xref_ids() {
        if let Some(xref) = env.store.xref(xref_id) {
            env.write_xref(ctx, writers, xref, false)?;
        }
    }
    Ok(())
}

/// (c) Synonyms for every xref that made it into the output.
pub fn write_synonyms(
    env: &PropagateEnv,
    ctx: &PipelineContext,
    writers: &mut TableWriters,
) -> Result<(), Error> {
    for synonym in env.store.synonyms() {
        if ctx.xrefs_written.contains(&synonym.xref_id) {
            writers.external_synonym(synonym.xref_id + env.xref_offset, &synonym.synonym)?;
        }
    }
    Ok(())
}

/// The interpro table is passed through verbatim.
pub fn write_interpro(env: &PropagateEnv, writers: &mut TableWriters) -> Result<(), Error> {
    for pair in env.store.interpro_pairs() {
        writers.interpro(&pair.interpro, &pair.pfam)?;
    }
    Ok(())
}
