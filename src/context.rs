//! Process-wide pipeline state threaded through the mapping stages.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{IdentityScores, ObjectType};

/// A core object key: type plus internal id.
pub type ObjectKey = (ObjectType, u64);

/// The in-memory indices shared across pipeline stages.
///
/// Each field is written by exactly one stage and read downstream. Ordered
/// maps keep enumeration deterministic, so re-runs reproduce the emitted
/// files byte for byte.
#[derive(Debug, Default)]
pub struct PipelineContext {
    /// Per-method (query, target) identity thresholds, recorded at dispatch.
    pub method_thresholds: BTreeMap<String, (u32, u32)>,

    /// Candidate xrefs per core object, in the order they were attached.
    pub object_xref_mappings: BTreeMap<ObjectKey, Vec<u64>>,

    /// Alignment identities per (object, xref).
    pub object_xref_identities: BTreeMap<ObjectKey, BTreeMap<u64, IdentityScores>>,

    /// Core objects each primary xref aligned to.
    pub primary_xref_ids: BTreeMap<u64, BTreeSet<ObjectKey>>,

    /// Source of every xref eligible for emission (unknown sources excluded).
    pub xref_to_source: BTreeMap<u64, u64>,

    /// Xrefs already written to xref.txt.
    pub xrefs_written: BTreeSet<u64>,

    /// (object type, object id, xref id) triples already written to object_xref.txt.
    pub object_xrefs_written: BTreeSet<(ObjectType, u64, u64)>,
}

impl PipelineContext {
    /// Attach an xref as a mapping candidate for a core object.
    pub fn add_mapping(&mut self, object: ObjectKey, xref_id: u64) {
        self.object_xref_mappings
            .entry(object)
            .or_default()
            .push(xref_id);
    }

    /// Record alignment identities for an (object, xref) pair.
    pub fn record_identities(&mut self, object: ObjectKey, xref_id: u64, scores: IdentityScores) {
        self.object_xref_identities
            .entry(object)
            .or_default()
            .insert(xref_id, scores);
    }

    /// Identities for an (object, xref) pair, if any alignment produced them.
    #[must_use]
    pub fn identities(&self, object: ObjectKey, xref_id: u64) -> Option<IdentityScores> {
        self.object_xref_identities
            .get(&object)
            .and_then(|by_xref| by_xref.get(&xref_id))
            .copied()
    }

    /// Query identity for an (object, xref) pair; 0 when never aligned.
    #[must_use]
    pub fn query_identity(&self, object: ObjectKey, xref_id: u64) -> u32 {
        self.identities(object, xref_id)
            .map_or(0, |s| s.query_identity)
    }
}
