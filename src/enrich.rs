//! Price enrichment of a billing table from a reference price catalog.
//!
//! Prices are looked up by procedure code first and by procedure name second. Within a
//! lookup the first catalog row carrying a price for a key wins; later duplicates are
//! ignored. Every output row gets `total = unit value × quantity`, replacing whatever
//! total the billing export carried.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::{
    config::{KeywordTables, Labels},
    data::Value,
    dataset::Dataset,
    error::{ReconError, Result},
    normalize::{normalize_code, normalize_name},
    roles::{ResolvedSchema, SemanticRole, resolve},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrichStats {
    pub code_matches: usize,
    pub name_matches: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub dataset: Dataset,
    pub stats: EnrichStats,
    pub unit_column: String,
    pub total_column: String,
}

/// Columns taking part in the join, by side.
#[derive(Debug)]
struct JoinPlan<'a> {
    reference_price: &'a str,
    code: Option<(&'a str, &'a str)>,
    name: Option<(&'a str, &'a str)>,
}

impl<'a> JoinPlan<'a> {
    fn new(primary: &'a ResolvedSchema, reference: &'a ResolvedSchema) -> Result<Self> {
        let reference_price = reference.column(SemanticRole::UnitValue).ok_or_else(|| {
            ReconError::JoinInfeasible("reference table has no unit price column".to_string())
        })?;
        let pair = |role| Some((primary.column(role)?, reference.column(role)?));
        let code = pair(SemanticRole::ProcedureCode);
        let name = pair(SemanticRole::ProcedureName);
        if code.is_none() && name.is_none() {
            return Err(ReconError::JoinInfeasible(
                "no procedure code or procedure name column present in both tables".to_string(),
            ));
        }
        Ok(JoinPlan {
            reference_price,
            code,
            name,
        })
    }
}

/// Key → price cell, keeping the first priced row seen for each key.
#[derive(Debug, Default)]
struct PriceLookup {
    prices: HashMap<String, Value>,
}

impl PriceLookup {
    fn build(
        reference: &Dataset,
        key_column: usize,
        price_column: usize,
        key_fn: fn(&Value) -> String,
    ) -> Self {
        let mut prices = HashMap::new();
        for row in reference.rows() {
            let price = &row[price_column];
            if price.is_empty() {
                continue;
            }
            let key = key_fn(&row[key_column]);
            if key.is_empty() {
                continue;
            }
            prices.entry(key).or_insert_with(|| price.clone());
        }
        PriceLookup { prices }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            None
        } else {
            self.prices.get(key)
        }
    }

    fn len(&self) -> usize {
        self.prices.len()
    }
}

enum MatchSource {
    Code,
    Name,
}

/// Fills unit prices in `primary` from `reference` and recomputes totals.
///
/// Returns [`ReconError::JoinInfeasible`] when the reference has no price column or the
/// two tables share neither a code nor a name role; callers fall back to [`concatenate`].
pub fn enrich(
    primary: &Dataset,
    reference: &Dataset,
    tables: &KeywordTables,
    labels: &Labels,
) -> Result<Enriched> {
    let primary_roles = resolve(primary, &tables.join);
    let reference_roles = resolve(reference, &tables.reference);
    let plan = JoinPlan::new(&primary_roles, &reference_roles)?;
    debug!("Join plan: {plan:?}");

    let index_of = |dataset: &Dataset, label: &str| {
        dataset
            .column_index(label)
            .ok_or_else(|| ReconError::JoinInfeasible(format!("column '{label}' vanished")))
    };
    let price_idx = index_of(reference, plan.reference_price)?;

    let code_lookup = match plan.code {
        Some((primary_label, reference_label)) => Some((
            index_of(primary, primary_label)?,
            PriceLookup::build(
                reference,
                index_of(reference, reference_label)?,
                price_idx,
                normalize_code,
            ),
        )),
        None => None,
    };
    let name_lookup = match plan.name {
        Some((primary_label, reference_label)) => Some((
            index_of(primary, primary_label)?,
            PriceLookup::build(
                reference,
                index_of(reference, reference_label)?,
                price_idx,
                normalize_name,
            ),
        )),
        None => None,
    };
    debug!(
        "Price lookups: {} code key(s), {} name key(s)",
        code_lookup.as_ref().map(|(_, l)| l.len()).unwrap_or(0),
        name_lookup.as_ref().map(|(_, l)| l.len()).unwrap_or(0)
    );

    let unit_idx = primary_roles
        .column(SemanticRole::UnitValue)
        .and_then(|label| primary.column_index(label));
    let quantity_idx = primary_roles
        .column(SemanticRole::Quantity)
        .and_then(|label| primary.column_index(label));

    let mut stats = EnrichStats::default();
    let mut units = Vec::with_capacity(primary.row_count());
    let mut totals = Vec::with_capacity(primary.row_count());
    for row in primary.rows() {
        let found = code_lookup
            .as_ref()
            .and_then(|(idx, lookup)| lookup.get(&normalize_code(&row[*idx])))
            .map(|price| (price, MatchSource::Code))
            .or_else(|| {
                name_lookup
                    .as_ref()
                    .and_then(|(idx, lookup)| lookup.get(&normalize_name(&row[*idx])))
                    .map(|price| (price, MatchSource::Name))
            });

        let existing = unit_idx
            .and_then(|idx| row[idx].as_number())
            .unwrap_or(0.0);
        let unit = match found.and_then(|(price, source)| Some((price.as_number()?, source))) {
            Some((price, MatchSource::Code)) => {
                stats.code_matches += 1;
                price
            }
            Some((price, MatchSource::Name)) => {
                stats.name_matches += 1;
                price
            }
            None => {
                stats.unmatched += 1;
                existing
            }
        };
        let quantity = quantity_idx
            .and_then(|idx| row[idx].as_number())
            .unwrap_or(1.0);

        units.push(Value::Number(unit));
        totals.push(Value::Number(unit * quantity));
    }

    let unit_column = primary_roles
        .column(SemanticRole::UnitValue)
        .unwrap_or(labels.unit_value.as_str())
        .to_string();
    let total_column = match primary_roles.column(SemanticRole::TotalValue) {
        Some(label)
            if label != unit_column
                && Some(label) != primary_roles.column(SemanticRole::Quantity) =>
        {
            label.to_string()
        }
        _ => labels.total.clone(),
    };

    let dataset = primary
        .with_column(&unit_column, units)
        .with_column(&total_column, totals);
    info!(
        "Enriched {} row(s): {} by code, {} by name, {} unmatched",
        dataset.row_count(),
        stats.code_matches,
        stats.name_matches,
        stats.unmatched
    );
    Ok(Enriched {
        dataset,
        stats,
        unit_column,
        total_column,
    })
}

/// Degraded reconciliation: stack the reference below the primary.
pub fn concatenate(primary: &Dataset, reference: &Dataset, reason: &str) -> Dataset {
    warn!("Price join skipped ({reason}); concatenating tables instead");
    primary.concat(reference)
}
