use chrono::NaiveDate;
use log::{debug, warn};

use crate::{
    data::Value,
    dataset::Dataset,
    normalize::normalize_name,
    roles::{KeywordTable, ResolvedSchema, SemanticRole, resolve},
};

/// Query predicates keyed by semantic role. `None` leaves a dimension unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicates {
    pub professional: Option<String>,
    pub procedure: Option<String>,
    pub city: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Predicates {
    fn has_date_bounds(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub dataset: Dataset,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
enum Condition {
    Equals { column: usize, needle: String },
    DateRange {
        column: usize,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl Condition {
    fn matches(&self, row: &[Value]) -> bool {
        match self {
            Condition::Equals { column, needle } => normalize_name(&row[*column]) == *needle,
            Condition::DateRange { column, from, to } => match row[*column].as_date() {
                Some(date) => {
                    from.is_none_or(|from| date >= from) && to.is_none_or(|to| date <= to)
                }
                None => false,
            },
        }
    }
}

/// City predicates look at the city/municipality column, and only fall back to the
/// site/branch column when the dataset has no city column at all.
pub fn city_column(roles: &ResolvedSchema) -> Option<&str> {
    roles
        .column(SemanticRole::City)
        .or_else(|| roles.column(SemanticRole::Site))
}

pub fn filter(dataset: &Dataset, predicates: &Predicates, table: &KeywordTable) -> Filtered {
    let roles = resolve(dataset, table);
    let mut warnings = Vec::new();
    let mut conditions = Vec::new();

    let text_predicates = [
        (
            "professional",
            predicates.professional.as_deref(),
            roles.column(SemanticRole::ProfessionalName),
        ),
        (
            "procedure",
            predicates.procedure.as_deref(),
            roles.column(SemanticRole::ProcedureName),
        ),
        ("city", predicates.city.as_deref(), city_column(&roles)),
    ];
    for (dimension, wanted, column) in text_predicates {
        let Some(wanted) = wanted.filter(|w| !w.trim().is_empty()) else {
            continue;
        };
        match column.and_then(|label| dataset.column_index(label)) {
            Some(column) => conditions.push(Condition::Equals {
                column,
                needle: wanted.trim().to_lowercase(),
            }),
            None => warnings.push(format!(
                "No {dimension} column found; {dimension} filter ignored"
            )),
        }
    }

    if predicates.has_date_bounds() {
        match roles
            .column(SemanticRole::Date)
            .and_then(|label| dataset.column_index(label))
        {
            Some(column) if dataset.column(column).any(|v| v.as_date().is_some()) => {
                conditions.push(Condition::DateRange {
                    column,
                    from: predicates.date_from,
                    to: predicates.date_to,
                });
            }
            Some(column) => warnings.push(format!(
                "Date column '{}' has no readable dates; date filter ignored",
                dataset.headers()[column]
            )),
            None => warnings.push("No date column found; date filter ignored".to_string()),
        }
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    debug!("Filter conditions: {conditions:?}");

    let keep = dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| conditions.iter().all(|condition| condition.matches(row)))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    Filtered {
        dataset: dataset.select_rows(keep),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_strings(
            &["Profesional", "Nombre Procedimiento", "Sede", "Fecha"],
            &[
                vec!["Ana Ruiz", "Consulta", "Norte", "05/03/2024"],
                vec!["ana ruiz ", "Terapia", "Sur", "20/03/2024"],
                vec!["Luis Gil", "Consulta", "Norte", "sin fecha"],
            ],
        )
    }

    #[test]
    fn equality_is_case_insensitive_and_exact() {
        let predicates = Predicates {
            professional: Some("ANA RUIZ".into()),
            ..Predicates::default()
        };
        let result = filter(&sample(), &predicates, &KeywordTable::query_defaults());
        assert_eq!(result.dataset.row_count(), 2);

        let partial = Predicates {
            professional: Some("Ana".into()),
            ..Predicates::default()
        };
        let result = filter(&sample(), &partial, &KeywordTable::query_defaults());
        assert_eq!(result.dataset.row_count(), 0);
    }

    #[test]
    fn city_falls_back_to_site() {
        let predicates = Predicates {
            city: Some("norte".into()),
            ..Predicates::default()
        };
        let result = filter(&sample(), &predicates, &KeywordTable::query_defaults());
        assert_eq!(result.dataset.row_count(), 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn date_bounds_are_inclusive_and_drop_unreadable_cells() {
        let predicates = Predicates {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 5),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 20),
            ..Predicates::default()
        };
        let result = filter(&sample(), &predicates, &KeywordTable::query_defaults());
        assert_eq!(result.dataset.row_count(), 2);
    }

    #[test]
    fn date_column_without_readable_dates_is_ignored_with_warning() {
        let dataset = Dataset::from_strings(
            &["Profesional", "Fecha"],
            &[vec!["Ana", "pendiente"], vec!["Luis", "sin fecha"]],
        );
        let predicates = Predicates {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..Predicates::default()
        };
        let result = filter(&dataset, &predicates, &KeywordTable::query_defaults());
        assert_eq!(result.dataset.row_count(), 2);
        assert_eq!(
            result.warnings,
            ["Date column 'Fecha' has no readable dates; date filter ignored"]
        );
    }
}
