//! Translation of the rule table into primary-xref fetch filters.

use std::collections::BTreeMap;

use crate::config::RuleConfig;
use crate::error::Error;
use crate::model::SequenceKind;

/// One OR-clause of a rule filter. `None` means wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleClause {
    pub species_id: Option<u64>,
    pub source_id: Option<u64>,
}

/// The primary-xref selection for one rule and one sequence kind.
///
/// A rule whose pairs are all full wildcards produces no filter at all
/// (fetch everything of that kind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFilter {
    pub kind: SequenceKind,
    pub clauses: Vec<RuleClause>,
}

impl RuleFilter {
    /// True when a primary xref with the given species and source passes.
    #[must_use]
    pub fn matches(&self, species_id: u64, source_id: u64) -> bool {
        self.clauses.iter().any(|clause| {
            clause.species_id.is_none_or(|s| s == species_id)
                && clause.source_id.is_none_or(|s| s == source_id)
        })
    }

    /// Render the filter as the SQL predicate handed to the database adapter.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let clauses: Vec<String> = self
            .clauses
            .iter()
            .map(|clause| match (clause.species_id, clause.source_id) {
                (Some(sp), Some(src)) => format!("(species_id = {sp} AND source_id = {src})"),
                (Some(sp), None) => format!("(species_id = {sp})"),
                (None, Some(src)) => format!("(source_id = {src})"),
                (None, None) => "(1)".to_string(),
            })
            .collect();
        format!(
            "primary_xref.sequence_type = '{}' AND ({})",
            self.kind.as_str(),
            clauses.join(" OR ")
        )
    }
}

/// Build the filter for one rule and sequence kind.
///
/// Returns `None` when every pair is `("*", "*")`. A species or source name
/// that cannot be resolved is a fatal configuration error listing the valid
/// names.
pub fn build_filter(
    rule: &RuleConfig,
    kind: SequenceKind,
    species_ids: &BTreeMap<String, u64>,
    source_ids: &BTreeMap<String, u64>,
) -> Result<Option<RuleFilter>, Error> {
    if rule.is_unrestricted() {
        return Ok(None);
    }

    let mut clauses = Vec::with_capacity(rule.pairs.len());
    for pair in &rule.pairs {
        let species_id = resolve(&pair.species, species_ids, "species", &rule.method)?;
        let source_id = resolve(&pair.source, source_ids, "source", &rule.method)?;
        clauses.push(RuleClause {
            species_id,
            source_id,
        });
    }

    Ok(Some(RuleFilter { kind, clauses }))
}

fn resolve(
    pattern: &str,
    ids: &BTreeMap<String, u64>,
    what: &str,
    method: &str,
) -> Result<Option<u64>, Error> {
    if pattern == "*" {
        return Ok(None);
    }
    match ids.get(pattern) {
        Some(&id) => Ok(Some(id)),
        None => {
            let valid: Vec<&str> = ids.keys().map(String::as_str).collect();
            Err(Error::Config(format!(
                "unknown {what} name '{pattern}' in rule '{method}'; valid names: {}",
                valid.join(", ")
            )))
        }
    }
}
