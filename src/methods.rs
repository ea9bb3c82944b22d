//! Alignment method handlers and their identity thresholds.

use std::collections::BTreeMap;
use std::path::Path;

/// An alignment method: a pair of identity thresholds plus the external
/// command that produces map files in the expected colon-separated format.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: &'static str,
    /// Minimum query identity (percent) for a mapping to be kept.
    pub query_identity_threshold: u32,
    /// Minimum target identity (percent) for a mapping to be kept.
    pub target_identity_threshold: u32,
    gapped: bool,
}

impl Method {
    /// The exonerate invocation for one (query, target) FASTA pair.
    ///
    /// The `--ryo` template emits exactly the map-file record layout:
    /// `label:query_id:target_id:identity:query_len:target_len:q_start:q_end:t_start:t_end:cigar:score`.
    #[must_use]
    pub fn command(&self, query: &Path, target: &Path) -> Vec<String> {
        let model = if self.gapped {
            "affine:local"
        } else {
            "ungapped"
        };
        vec![
            "exonerate".to_string(),
            "--showalignment".to_string(),
            "false".to_string(),
            "--showvulgar".to_string(),
            "false".to_string(),
            "--ryo".to_string(),
            "xref:%qi:%ti:%ei:%ql:%tl:%qab:%qae:%tab:%tae:%C:%s\\n".to_string(),
            "--model".to_string(),
            model.to_string(),
            "--bestn".to_string(),
            "1".to_string(),
            "--subopt".to_string(),
            "no".to_string(),
            query.display().to_string(),
            target.display().to_string(),
        ]
    }
}

/// Registry of known method handlers, looked up by the rule table's method
/// names. An unknown name is skipped with a warning, not a fatal error.
#[derive(Debug)]
pub struct MethodRegistry {
    methods: BTreeMap<&'static str, Method>,
}

impl MethodRegistry {
    #[must_use]
    pub fn builtin() -> Self {
        let methods = [
            Method {
                name: "ExonerateGappedBest1",
                query_identity_threshold: 90,
                target_identity_threshold: 90,
                gapped: true,
            },
            Method {
                name: "ExonerateBasic",
                query_identity_threshold: 55,
                target_identity_threshold: 55,
                gapped: false,
            },
        ];
        Self {
            methods: methods.into_iter().map(|m| (m.name, m)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }
}
