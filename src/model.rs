//! Data model for external references and the core objects they attach to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of alignable sequence carried by a primary xref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Dna,
    Peptide,
}

impl SequenceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dna => "dna",
            Self::Peptide => "peptide",
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core genomic object types that can carry xrefs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Gene,
    Transcript,
    Translation,
}

impl ObjectType {
    /// Capitalized name as written to object_xref rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gene => "Gene",
            Self::Transcript => "Transcript",
            Self::Translation => "Translation",
        }
    }
}

impl std::str::FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gene" => Ok(Self::Gene),
            "transcript" => Ok(Self::Transcript),
            "translation" => Ok(Self::Translation),
            _ => Err(Error::Parse(format!("unrecognized object type: {s}"))),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named provenance for xrefs, local to the xref store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub source_id: u64,
    pub name: String,
}

/// An external identifier with its curated metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xref {
    pub xref_id: u64,
    pub accession: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub source_id: u64,
    pub species_id: u64,
}

impl Xref {
    /// The label shown for this xref; falls back to the accession.
    #[must_use]
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.accession
        } else {
            &self.label
        }
    }
}

/// The alignable sequence attached to a primary xref.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryXref {
    pub xref_id: u64,
    pub kind: SequenceKind,
    pub sequence: String,
}

/// A curated master → dependent edge between two xrefs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependentXref {
    pub master_xref_id: u64,
    pub dependent_xref_id: u64,
    #[serde(default)]
    pub linkage_annotation: String,
}

/// A hand-curated edge from an xref to a core object stable id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectXref {
    pub xref_id: u64,
    pub stable_id: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub linkage_xref: String,
}

/// An alternative name for an xref.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synonym {
    pub xref_id: u64,
    pub synonym: String,
}

/// An (InterPro accession, Pfam accession) pair, passed through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterproPair {
    pub interpro: String,
    pub pfam: String,
}

/// Query/target identity percentages for an aligned mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityScores {
    pub query_identity: u32,
    pub target_identity: u32,
}

/// A gene in the core annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gene {
    pub gene_id: u64,
    pub stable_id: String,
}

/// A transcript with its spliced cDNA sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub transcript_id: u64,
    pub gene_id: u64,
    pub stable_id: String,
    #[serde(default)]
    pub seq_region: String,
    pub cdna: String,
}

/// A translation with its peptide sequence, owned by one transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub translation_id: u64,
    pub transcript_id: u64,
    pub stable_id: String,
    pub peptide: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_round_trip() {
        for (s, t) in [
            ("gene", ObjectType::Gene),
            ("Transcript", ObjectType::Transcript),
            ("TRANSLATION", ObjectType::Translation),
        ] {
            assert_eq!(s.parse::<ObjectType>().unwrap(), t);
        }
        assert!("exon".parse::<ObjectType>().is_err());
    }

    #[test]
    fn object_type_capitalized() {
        assert_eq!(ObjectType::Translation.as_str(), "Translation");
        assert_eq!("gene".parse::<ObjectType>().unwrap().as_str(), "Gene");
    }

    #[test]
    fn display_label_falls_back_to_accession() {
        let mut xref = Xref {
            xref_id: 1,
            accession: "Q9GZX4".to_string(),
            version: 2,
            label: String::new(),
            description: String::new(),
            source_id: 1,
            species_id: 9606,
        };
        assert_eq!(xref.display_label(), "Q9GZX4");
        xref.label = "SSX9".to_string();
        assert_eq!(xref.display_label(), "SSX9");
    }

    #[test]
    fn sequence_kind_strings() {
        assert_eq!(SequenceKind::Dna.as_str(), "dna");
        assert_eq!(SequenceKind::Peptide.to_string(), "peptide");
    }
}
