//! Export cleanup applied before a dataset is persisted or written to a spreadsheet.
//!
//! Each column gets exactly one rule, picked in this order: date columns are parsed
//! day-first, professional names lose their numeric prefix (and are length-capped like
//! free text), price/total columns become numbers, purely numeric columns are left alone
//! and everything else is treated as free text that must be safe to open in a
//! spreadsheet. No rule can fail; malformed cells degrade to empty, zero or cleaned text.
//! Running the sanitizer twice changes nothing.

use log::debug;

use crate::{
    config::SanitizeOptions,
    data::Value,
    dataset::Dataset,
    normalize::strip_leading_numeric_prefix,
    roles::{ResolvedSchema, SemanticRole},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    Date,
    ProfessionalName,
    Numeric,
    Untouched,
    FreeText,
}

pub fn classify_column(
    dataset: &Dataset,
    idx: usize,
    roles: &ResolvedSchema,
    options: &SanitizeOptions,
) -> ColumnRule {
    let label = &dataset.headers()[idx];
    let lowered = label.to_lowercase();
    let mut non_empty = dataset.column(idx).filter(|v| !v.is_empty()).peekable();
    let has_values = non_empty.peek().is_some();

    let date_label = options
        .date_keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()));
    if date_label || (has_values && dataset.column(idx).all(is_date_or_empty)) {
        return ColumnRule::Date;
    }
    if roles.column(SemanticRole::ProfessionalName) == Some(label.as_str()) {
        return ColumnRule::ProfessionalName;
    }
    if roles.column(SemanticRole::UnitValue) == Some(label.as_str())
        || roles.column(SemanticRole::TotalValue) == Some(label.as_str())
    {
        return ColumnRule::Numeric;
    }
    if has_values && non_empty.all(|v| matches!(v, Value::Number(_))) {
        return ColumnRule::Untouched;
    }
    ColumnRule::FreeText
}

fn is_date_or_empty(value: &Value) -> bool {
    matches!(value, Value::Date(_) | Value::Empty)
}

pub fn sanitize(dataset: &Dataset, roles: &ResolvedSchema, options: &SanitizeOptions) -> Dataset {
    let rules = (0..dataset.column_count())
        .map(|idx| classify_column(dataset, idx, roles, options))
        .collect::<Vec<_>>();
    debug!(
        "Sanitize rules: {:?}",
        dataset.headers().iter().zip(&rules).collect::<Vec<_>>()
    );

    let rows = dataset
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .zip(&rules)
                .map(|(value, rule)| apply_rule(*rule, value, options.max_cell_chars))
                .collect()
        })
        .collect();
    Dataset::new(dataset.headers().to_vec(), rows)
}

fn apply_rule(rule: ColumnRule, value: &Value, max_chars: usize) -> Value {
    match rule {
        ColumnRule::Date => value.as_date().map(Value::Date).unwrap_or_default(),
        ColumnRule::ProfessionalName => match value {
            Value::Empty => Value::Empty,
            other => {
                let name = strip_leading_numeric_prefix(&other.as_display());
                let capped = name.chars().take(max_chars).collect::<String>();
                Value::from_raw(capped.trim_end())
            }
        },
        ColumnRule::Numeric => Value::Number(value.as_number().unwrap_or(0.0)),
        ColumnRule::Untouched => value.clone(),
        ColumnRule::FreeText => Value::from_raw(&clean_text(&value.as_display(), max_chars)),
    }
}

fn is_stripped_control(ch: char) -> bool {
    matches!(ch, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Makes a text cell safe for spreadsheet consumers: drops control characters that
/// break XML-based formats, neutralizes formulas and caps the length.
pub fn clean_text(raw: &str, max_chars: usize) -> String {
    let mut cleaned = raw
        .chars()
        .filter(|ch| !is_stripped_control(*ch))
        .collect::<String>();
    if cleaned.starts_with('=') {
        cleaned.insert(0, '\'');
    }
    if cleaned.chars().count() > max_chars {
        cleaned = cleaned.chars().take(max_chars).collect();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_neutralizes_formulas() {
        assert_eq!(clean_text("=SUM(A1:A2)", 32_700), "'=SUM(A1:A2)");
        assert_eq!(clean_text("'=SUM(A1:A2)", 32_700), "'=SUM(A1:A2)");
        assert_eq!(clean_text("a=b", 32_700), "a=b");
    }

    #[test]
    fn clean_text_strips_control_but_keeps_tab_and_newlines() {
        assert_eq!(clean_text("a\u{0}b\u{7}c\td\ne\rf\u{1b}", 100), "abc\td\ne\rf");
    }

    #[test]
    fn each_column_gets_its_rule() {
        let dataset = Dataset::from_strings(
            &["Profesional", "Fecha Inicio", "Valor Unitario", "Nota"],
            &[
                vec!["12 - Ana", "05/03/2024", "1.500", "=1+1"],
                vec!["", "sin fecha", "n/a", ""],
            ],
        );
        let roles = crate::roles::resolve(&dataset, &crate::roles::KeywordTable::join_defaults());
        let cleaned = sanitize(&dataset, &roles, &SanitizeOptions::default());
        assert_eq!(
            cleaned.rows()[0],
            vec![
                Value::Text("Ana".into()),
                Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
                Value::Number(1.5),
                Value::Text("'=1+1".into()),
            ]
        );
        assert_eq!(
            cleaned.rows()[1],
            vec![Value::Empty, Value::Empty, Value::Number(0.0), Value::Empty]
        );
        assert_eq!(sanitize(&cleaned, &roles, &SanitizeOptions::default()), cleaned);
    }

    #[test]
    fn professional_names_are_capped() {
        let long_name = format!("12 - {}", "A".repeat(40_000));
        let dataset = Dataset::from_strings(
            &["Profesional"],
            &[vec![long_name.as_str()], vec!["7 - Ana Ruiz"]],
        );
        let roles = crate::roles::resolve(&dataset, &crate::roles::KeywordTable::join_defaults());
        let options = SanitizeOptions::default();
        let cleaned = sanitize(&dataset, &roles, &options);
        assert_eq!(
            cleaned.rows()[0][0].as_display().chars().count(),
            options.max_cell_chars
        );
        assert_eq!(cleaned.rows()[1][0], Value::Text("Ana Ruiz".into()));
        assert_eq!(sanitize(&cleaned, &roles, &options), cleaned);

        let narrow = SanitizeOptions {
            max_cell_chars: 4,
            ..SanitizeOptions::default()
        };
        let cut = sanitize(&dataset, &roles, &narrow);
        assert_eq!(cut.rows()[1][0], Value::Text("Ana".into()));
        assert_eq!(sanitize(&cut, &roles, &narrow), cut);
    }

    #[test]
    fn clean_text_truncates_by_characters() {
        let long = "ñ".repeat(40);
        assert_eq!(clean_text(&long, 32).chars().count(), 32);
    }
}
