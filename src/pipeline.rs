//! The end-to-end reconciliation contract used by the CLI and by library callers.

use log::info;
use serde::Serialize;

use crate::{
    compare::{self, ComparisonResult},
    config::ReconConfig,
    data::Value,
    dataset::Dataset,
    enrich::{EnrichStats, concatenate, enrich},
    error::{ReconError, Result},
    filter::{self, Filtered, Predicates},
    normalize::strip_leading_numeric_prefix,
    roles::{KeywordTable, ResolvedSchema, SemanticRole, resolve},
    sanitize::sanitize,
};

/// Outcome of [`reconcile`]. Every variant carries the export-sanitized dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Enriched { dataset: Dataset, stats: EnrichStats },
    /// The price join was not possible; the reference was stacked below the primary.
    Concatenated { dataset: Dataset, reason: String },
    PrimaryOnly(Dataset),
    ReferenceOnly(Dataset),
}

impl Reconciliation {
    pub fn dataset(&self) -> &Dataset {
        match self {
            Reconciliation::Enriched { dataset, .. }
            | Reconciliation::Concatenated { dataset, .. }
            | Reconciliation::PrimaryOnly(dataset)
            | Reconciliation::ReferenceOnly(dataset) => dataset,
        }
    }

    pub fn into_dataset(self) -> Dataset {
        match self {
            Reconciliation::Enriched { dataset, .. }
            | Reconciliation::Concatenated { dataset, .. }
            | Reconciliation::PrimaryOnly(dataset)
            | Reconciliation::ReferenceOnly(dataset) => dataset,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reconciliation::Enriched { .. } => "enriched",
            Reconciliation::Concatenated { .. } => "concatenated",
            Reconciliation::PrimaryOnly(_) => "primary_only",
            Reconciliation::ReferenceOnly(_) => "reference_only",
        }
    }

    fn map_dataset<F>(self, f: F) -> Self
    where
        F: FnOnce(Dataset) -> Dataset,
    {
        match self {
            Reconciliation::Enriched { dataset, stats } => Reconciliation::Enriched {
                dataset: f(dataset),
                stats,
            },
            Reconciliation::Concatenated { dataset, reason } => Reconciliation::Concatenated {
                dataset: f(dataset),
                reason,
            },
            Reconciliation::PrimaryOnly(dataset) => Reconciliation::PrimaryOnly(f(dataset)),
            Reconciliation::ReferenceOnly(dataset) => Reconciliation::ReferenceOnly(f(dataset)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReconciliationReport<'a> {
    pub outcome: &'static str,
    pub rows: usize,
    pub columns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

impl<'a> From<&'a Reconciliation> for ReconciliationReport<'a> {
    fn from(outcome: &'a Reconciliation) -> Self {
        let dataset = outcome.dataset();
        let (stats, reason) = match outcome {
            Reconciliation::Enriched { stats, .. } => (Some(*stats), None),
            Reconciliation::Concatenated { reason, .. } => (None, Some(reason.as_str())),
            _ => (None, None),
        };
        ReconciliationReport {
            outcome: outcome.kind(),
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            code_matches: stats.map(|s| s.code_matches),
            name_matches: stats.map(|s| s.name_matches),
            unmatched: stats.map(|s| s.unmatched),
            reason,
        }
    }
}

/// Runs ingestion cleanup, enrichment (or the concatenation fallback) and export
/// sanitization. Fails only when neither table has any data.
pub fn reconcile(
    primary: &Dataset,
    reference: &Dataset,
    config: &ReconConfig,
) -> Result<Reconciliation> {
    let outcome = match (primary.is_empty(), reference.is_empty()) {
        (true, true) => return Err(ReconError::NoInput),
        (false, true) => {
            info!("No reference data; keeping the primary table as loaded");
            Reconciliation::PrimaryOnly(clean_primary(primary, &config.keywords.join))
        }
        (true, false) => {
            info!("No primary data; keeping the reference table as loaded");
            Reconciliation::ReferenceOnly(reference.clone())
        }
        (false, false) => {
            let cleaned = clean_primary(primary, &config.keywords.join);
            match enrich(&cleaned, reference, &config.keywords, &config.labels) {
                Ok(enriched) => Reconciliation::Enriched {
                    dataset: enriched.dataset,
                    stats: enriched.stats,
                },
                Err(ReconError::JoinInfeasible(reason)) => Reconciliation::Concatenated {
                    dataset: concatenate(&cleaned, reference, &reason),
                    reason,
                },
                Err(other) => return Err(other),
            }
        }
    };
    Ok(outcome.map_dataset(|dataset| sanitize_for_export(&dataset, config)))
}

/// Removes numeric prefixes such as `"123 - "` from the professional name column.
fn clean_primary(primary: &Dataset, table: &KeywordTable) -> Dataset {
    let roles = resolve(primary, table);
    match roles
        .column(SemanticRole::ProfessionalName)
        .and_then(|label| primary.column_index(label))
    {
        Some(idx) => primary.map_column(idx, |value| match value {
            Value::Empty => Value::Empty,
            other => Value::from_raw(&strip_leading_numeric_prefix(&other.as_display())),
        }),
        None => primary.clone(),
    }
}

pub fn resolve_schema(dataset: &Dataset, table: &KeywordTable) -> ResolvedSchema {
    resolve(dataset, table)
}

pub fn filter(dataset: &Dataset, predicates: &Predicates, config: &ReconConfig) -> Filtered {
    filter::filter(dataset, predicates, &config.keywords.query)
}

pub fn compare(a: &Dataset, b: &Dataset, key: &str) -> ComparisonResult {
    compare::compare(a, b, key)
}

pub fn sanitize_for_export(dataset: &Dataset, config: &ReconConfig) -> Dataset {
    let roles = resolve(dataset, &config.keywords.join);
    sanitize(dataset, &roles, &config.sanitize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_are_rejected() {
        let err = reconcile(&Dataset::default(), &Dataset::default(), &ReconConfig::default())
            .unwrap_err();
        assert!(matches!(err, ReconError::NoInput));
    }

    #[test]
    fn missing_reference_keeps_primary_with_clean_names() {
        let primary = Dataset::from_strings(&["Profesional"], &[vec!["123 - Ana Ruiz"]]);
        let outcome = reconcile(&primary, &Dataset::default(), &ReconConfig::default()).unwrap();
        assert_eq!(outcome.kind(), "primary_only");
        assert_eq!(
            outcome.dataset().cell(0, "Profesional"),
            Some(&Value::Text("Ana Ruiz".into()))
        );
    }

    #[test]
    fn infeasible_join_concatenates() {
        let primary = Dataset::from_strings(&["Paciente"], &[vec!["x"]]);
        let reference = Dataset::from_strings(&["Codigo", "Valor"], &[vec!["1", "10"]]);
        let outcome = reconcile(&primary, &reference, &ReconConfig::default()).unwrap();
        assert!(matches!(outcome, Reconciliation::Concatenated { .. }));
        assert_eq!(outcome.dataset().row_count(), 2);
        assert_eq!(outcome.dataset().headers(), ["Paciente", "Codigo", "Valor"]);
    }
}
