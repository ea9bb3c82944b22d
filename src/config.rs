//! Per-species mapping configuration.

use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// One (species pattern, source pattern) pair of a mapping rule.
/// `"*"` matches any species or source.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternPair {
    pub species: String,
    pub source: String,
}

/// A mapping rule: an alignment method applied to the primary xrefs
/// selected by its pattern pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub method: String,
    pub pairs: Vec<PatternPair>,
}

impl RuleConfig {
    /// True when every pair is the full wildcard, i.e. the rule fetches everything.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.pairs.iter().all(|p| p.species == "*" && p.source == "*")
    }
}

/// Species-specific mapping knobs, loaded from a JSON configuration file.
#[derive(Debug, Deserialize)]
pub struct MappingConfig {
    pub species: String,
    pub rules: Vec<RuleConfig>,
    /// Display-xref source names, highest priority first.
    pub display_sources: Vec<String>,
    /// Case-insensitive regexes deleted from gene descriptions.
    #[serde(default)]
    pub description_filters: Vec<String>,
    /// The authoritative naming body for this species, if any.
    #[serde(default)]
    pub consortium: Option<String>,
}

impl MappingConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.species.is_empty() {
            bail!("config has no species name");
        }
        if self.rules.is_empty() {
            bail!("config has no mapping rules");
        }
        for rule in &self.rules {
            if rule.method.is_empty() {
                bail!("mapping rule with empty method name");
            }
            if rule.pairs.is_empty() {
                bail!("mapping rule '{}' has no (species, source) pairs", rule.method);
            }
        }
        if self.display_sources.is_empty() {
            bail!("config has no display sources");
        }
        // Verify the filter regexes compile before the pipeline starts
        self.compiled_filters()?;
        Ok(())
    }

    /// Compile the description filters as case-insensitive regexes.
    pub fn compiled_filters(&self) -> Result<Vec<Regex>> {
        self.description_filters
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid description filter regex: '{pattern}'"))
            })
            .collect()
    }
}
