//! Aggregates over the reconciled dataset: billed total, distinct option lists, the
//! professional × procedure rollup, value per procedure and services per patient.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    dataset::Dataset,
    roles::{KeywordTable, SemanticRole, resolve},
};

const VALUE_LABELS: &[&str] = &["valor", "value"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupRow {
    pub professional: String,
    pub procedure: String,
    pub services: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureTotal {
    pub procedure: String,
    pub value: f64,
}

/// One patient's services broken down by procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub patient: String,
    pub services: BTreeMap<String, usize>,
    pub total_services: usize,
    pub value: f64,
}

/// Distinct values offered for each filterable dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub professional: Vec<String>,
    pub procedure: Vec<String>,
    pub city: Vec<String>,
}

/// The column holding the billed amount: a column literally named "Valor"/"Value", else
/// the resolved total column.
pub fn value_column<'a>(dataset: &'a Dataset, table: &KeywordTable) -> Option<&'a str> {
    if let Some(exact) = dataset
        .headers()
        .iter()
        .find(|label| VALUE_LABELS.contains(&label.trim().to_lowercase().as_str()))
    {
        return Some(exact.as_str());
    }
    let roles = resolve(dataset, table);
    let label = roles.column(SemanticRole::TotalValue)?;
    dataset
        .headers()
        .iter()
        .find(|h| h.as_str() == label)
        .map(|h| h.as_str())
}

/// Sum of the strictly positive amounts in the value column; zero without one.
pub fn total_value(dataset: &Dataset, table: &KeywordTable) -> f64 {
    let Some(idx) = value_index(dataset, table) else {
        return 0.0;
    };
    dataset
        .column(idx)
        .filter_map(|v| v.as_number())
        .filter(|n| *n > 0.0)
        .sum()
}

/// Distinct values of a role's column, de-duplicated case-insensitively (the last
/// spelling seen is kept) and sorted.
pub fn options(dataset: &Dataset, role: SemanticRole, table: &KeywordTable) -> Vec<String> {
    let roles = resolve(dataset, table);
    let column = match role {
        SemanticRole::City => crate::filter::city_column(&roles),
        other => roles.column(other),
    };
    let Some(idx) = column.and_then(|label| dataset.column_index(label)) else {
        return Vec::new();
    };
    let mut spellings = HashMap::new();
    for value in dataset.column(idx) {
        let text = value.as_display().trim().to_string();
        if !text.is_empty() {
            spellings.insert(text.to_lowercase(), text);
        }
    }
    spellings.into_values().sorted().collect()
}

pub fn filter_options(dataset: &Dataset, table: &KeywordTable) -> FilterOptions {
    FilterOptions {
        professional: options(dataset, SemanticRole::ProfessionalName, table),
        procedure: options(dataset, SemanticRole::ProcedureName, table),
        city: options(dataset, SemanticRole::City, table),
    }
}

fn role_index(dataset: &Dataset, table: &KeywordTable, role: SemanticRole) -> Option<usize> {
    resolve(dataset, table)
        .column(role)
        .and_then(|label| dataset.column_index(label))
}

fn value_index(dataset: &Dataset, table: &KeywordTable) -> Option<usize> {
    value_column(dataset, table).and_then(|label| dataset.column_index(label))
}

/// Billed value per procedure, largest first. Unreadable amounts count as zero.
pub fn procedure_totals(dataset: &Dataset, table: &KeywordTable) -> Vec<ProcedureTotal> {
    let (Some(procedure_idx), Some(value_idx)) = (
        role_index(dataset, table, SemanticRole::ProcedureName),
        value_index(dataset, table),
    ) else {
        return Vec::new();
    };
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in dataset.rows() {
        *totals.entry(row[procedure_idx].as_display()).or_default() +=
            row[value_idx].as_number().unwrap_or(0.0);
    }
    totals
        .into_iter()
        .map(|(procedure, value)| ProcedureTotal { procedure, value })
        .sorted_by(|a, b| b.value.total_cmp(&a.value))
        .collect()
}

/// Service counts per patient and procedure plus the patient's billed value, busiest
/// patients first.
pub fn patient_summary(dataset: &Dataset, table: &KeywordTable) -> Vec<PatientSummary> {
    let (Some(patient_idx), Some(procedure_idx)) = (
        role_index(dataset, table, SemanticRole::PatientName),
        role_index(dataset, table, SemanticRole::ProcedureName),
    ) else {
        return Vec::new();
    };
    let value_idx = value_index(dataset, table);

    let mut patients: BTreeMap<String, PatientSummary> = BTreeMap::new();
    for row in dataset.rows() {
        let patient = row[patient_idx].as_display();
        let entry = patients
            .entry(patient.clone())
            .or_insert_with(|| PatientSummary {
                patient,
                services: BTreeMap::new(),
                total_services: 0,
                value: 0.0,
            });
        *entry
            .services
            .entry(row[procedure_idx].as_display())
            .or_default() += 1;
        entry.total_services += 1;
        entry.value += value_idx
            .and_then(|idx| row[idx].as_number())
            .unwrap_or(0.0);
    }
    patients
        .into_values()
        .sorted_by(|a, b| b.total_services.cmp(&a.total_services))
        .collect()
}

/// Service counts and billed value per professional and procedure, ordered by
/// professional and then by descending service count.
pub fn professional_procedure_rollup(dataset: &Dataset, table: &KeywordTable) -> Vec<RollupRow> {
    let (Some(professional_idx), Some(procedure_idx)) = (
        role_index(dataset, table, SemanticRole::ProfessionalName),
        role_index(dataset, table, SemanticRole::ProcedureName),
    ) else {
        return Vec::new();
    };
    let value_idx = value_index(dataset, table);

    let mut groups: BTreeMap<(String, String), (usize, f64)> = BTreeMap::new();
    for row in dataset.rows() {
        let key = (
            row[professional_idx].as_display(),
            row[procedure_idx].as_display(),
        );
        let amount = value_idx
            .and_then(|idx| row[idx].as_number())
            .unwrap_or(0.0);
        let entry = groups.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += amount;
    }

    groups
        .into_iter()
        .map(|((professional, procedure), (services, value))| RollupRow {
            professional,
            procedure,
            services,
            value,
        })
        .sorted_by(|a, b| {
            a.professional
                .cmp(&b.professional)
                .then_with(|| b.services.cmp(&a.services))
        })
        .collect()
}
