mod common;

use billing_recon::{
    compare::compare,
    config::{KeywordTables, Labels, ReconConfig},
    data::Value,
    dataset::Dataset,
    enrich::enrich,
    filter::Predicates,
    io_utils::{ReadOptions, read_dataset},
    pipeline::{self, Reconciliation},
    roles::{KeywordTable, SemanticRole},
    summary,
};
use chrono::NaiveDate;
use common::{BILLING_CSV, CATALOG_CSV, TestWorkspace};

fn reconciled() -> Reconciliation {
    let workspace = TestWorkspace::new();
    let primary = read_dataset(
        &workspace.write("billing.csv", BILLING_CSV),
        &ReadOptions::default(),
    )
    .expect("read billing");
    let reference = read_dataset(
        &workspace.write("catalog.csv", CATALOG_CSV),
        &ReadOptions::default(),
    )
    .expect("read catalog");
    pipeline::reconcile(&primary, &reference, &ReconConfig::default()).expect("reconcile")
}

#[test]
fn first_catalog_price_wins_and_total_is_recomputed() {
    let primary = Dataset::from_strings(
        &["Codigo", "Nombre Procedimiento", "Valor Unitario", "Cantidad"],
        &[vec!["001", "Consulta", "", "2"]],
    );
    let reference = Dataset::from_strings(
        &["Codigo", "Valor"],
        &[vec!["001", "50000"], vec!["001", "99999"]],
    );
    let enriched = enrich(
        &primary,
        &reference,
        &KeywordTables::default(),
        &Labels::default(),
    )
    .expect("enrich");
    assert_eq!(
        enriched.dataset.cell(0, "Valor Unitario"),
        Some(&Value::Number(50000.0))
    );
    assert_eq!(
        enriched.dataset.cell(0, &enriched.total_column),
        Some(&Value::Number(100000.0))
    );
}

#[test]
fn name_fallback_ignores_case_and_padding() {
    let primary = Dataset::from_strings(
        &["Nombre Procedimiento", "Cantidad"],
        &[vec!["CONSULTA ", "3"]],
    );
    let reference = Dataset::from_strings(
        &["Nombre Procedimiento", "Precio"],
        &[vec!["consulta", "20000"]],
    );
    let enriched = enrich(
        &primary,
        &reference,
        &KeywordTables::default(),
        &Labels::default(),
    )
    .expect("enrich");
    assert_eq!(enriched.stats.name_matches, 1);
    assert_eq!(
        enriched.dataset.cell(0, "Total"),
        Some(&Value::Number(60000.0))
    );
}

#[test]
fn reconcile_prices_by_code_then_name_and_keeps_unmatched_values() {
    let outcome = reconciled();
    let Reconciliation::Enriched { dataset, stats } = &outcome else {
        panic!("expected an enriched outcome, got {}", outcome.kind());
    };
    assert_eq!(stats.code_matches, 1);
    assert_eq!(stats.name_matches, 1);
    assert_eq!(stats.unmatched, 1);

    let units = (0..3)
        .map(|row| dataset.cell(row, "Valor Unitario").cloned())
        .collect::<Vec<_>>();
    assert_eq!(
        units,
        [
            Some(Value::Number(50000.0)),
            Some(Value::Number(30000.0)),
            Some(Value::Number(15000.0)),
        ]
    );
    let totals = (0..3)
        .map(|row| dataset.cell(row, "Total").cloned())
        .collect::<Vec<_>>();
    assert_eq!(
        totals,
        [
            Some(Value::Number(100000.0)),
            Some(Value::Number(30000.0)),
            Some(Value::Number(15000.0)),
        ]
    );
}

#[test]
fn reconciled_dataset_is_export_clean() {
    let outcome = reconciled();
    let dataset = outcome.dataset();
    assert_eq!(
        dataset.cell(0, "Profesional"),
        Some(&Value::Text("Ana Ruiz".into()))
    );
    assert_eq!(
        dataset.cell(0, "Fecha"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()))
    );
    assert_eq!(
        dataset.cell(0, "Codigo"),
        Some(&Value::Text("001".into()))
    );
    let again = pipeline::sanitize_for_export(dataset, &ReconConfig::default());
    assert_eq!(&again, dataset);
}

#[test]
fn filter_and_summary_over_reconciled_dataset() {
    let outcome = reconciled();
    let config = ReconConfig::default();
    let dataset = outcome.dataset();
    assert_eq!(
        summary::total_value(dataset, &config.keywords.query),
        145000.0
    );

    let march = Predicates {
        date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
        date_to: NaiveDate::from_ymd_opt(2024, 3, 31),
        ..Predicates::default()
    };
    let filtered = pipeline::filter(dataset, &march, &config);
    assert!(filtered.warnings.is_empty());
    assert_eq!(filtered.dataset.row_count(), 2);

    let luis_in_bogota = Predicates {
        professional: Some("luis gil".into()),
        city: Some(" BOGOTA".into()),
        ..Predicates::default()
    };
    let filtered = pipeline::filter(dataset, &luis_in_bogota, &config);
    assert_eq!(filtered.dataset.row_count(), 2);

    let rollup = summary::professional_procedure_rollup(dataset, &config.keywords.query);
    assert_eq!(rollup.len(), 3);
    assert_eq!(rollup[0].professional, "Ana Ruiz");
    assert_eq!(rollup[0].value, 100000.0);
}

#[test]
fn date_filter_without_date_column_is_skipped_with_warning() {
    let dataset = Dataset::from_strings(&["Profesional"], &[vec!["Ana"], vec!["Luis"]]);
    let predicates = Predicates {
        date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
        ..Predicates::default()
    };
    let filtered = pipeline::filter(&dataset, &predicates, &ReconConfig::default());
    assert_eq!(filtered.dataset.row_count(), 2);
    assert_eq!(filtered.warnings.len(), 1);
}

#[test]
fn missing_reference_price_column_degrades_to_concatenation() {
    let primary = Dataset::from_strings(&["Codigo", "Cantidad"], &[vec!["001", "1"]]);
    let reference = Dataset::from_strings(&["Codigo", "Descripcion"], &[vec!["001", "x"]]);
    let outcome =
        pipeline::reconcile(&primary, &reference, &ReconConfig::default()).expect("reconcile");
    let Reconciliation::Concatenated { dataset, reason } = &outcome else {
        panic!("expected concatenation, got {}", outcome.kind());
    };
    assert!(reason.contains("price"));
    assert_eq!(dataset.row_count(), 2);
}

#[test]
fn comparator_reports_matched_and_one_sided_keys() {
    let a = Dataset::from_strings(&["ID"], &[vec!["1"], vec!["2"]]);
    let b = Dataset::from_strings(&["ID"], &[vec!["2"], vec!["3"]]);
    let result = compare(&a, &b, "ID");
    assert!(result.advisory.is_none());
    assert_eq!(result.matched.row_count(), 1);
    assert_eq!(result.matched.cell(0, "ID"), Some(&Value::Text("2".into())));
    assert_eq!(result.only_in_a.cell(0, "ID"), Some(&Value::Text("1".into())));
    assert_eq!(result.only_in_b.cell(0, "ID"), Some(&Value::Text("3".into())));
}

#[test]
fn comparator_expands_duplicate_keys() {
    let a = Dataset::from_strings(
        &["ID", "Lado"],
        &[vec!["7", "a1"], vec![" 7", "a2"], vec!["8", "a3"]],
    );
    let b = Dataset::from_strings(
        &["ID", "Lado"],
        &[vec!["7 ", "b1"], vec!["7", "b2"], vec!["7", "b3"]],
    );
    let result = compare(&a, &b, "ID");
    assert_eq!(result.matched.row_count(), 6);
    assert_eq!(result.matched.headers(), ["ID", "Lado_A", "Lado_B"]);
    assert_eq!(result.only_in_a.row_count(), 1);
    assert_eq!(result.only_in_b.row_count(), 0);
}

#[test]
fn comparator_keys_are_case_sensitive() {
    let a = Dataset::from_strings(&["ID"], &[vec!["abc"]]);
    let b = Dataset::from_strings(&["ID"], &[vec!["ABC"]]);
    let result = compare(&a, &b, "ID");
    assert_eq!(result.matched.row_count(), 0);
    assert_eq!(result.only_in_a.row_count(), 1);
    assert_eq!(result.only_in_b.row_count(), 1);
}

#[test]
fn comparator_without_common_columns_returns_advisory() {
    let a = Dataset::from_strings(&["A"], &[vec!["1"]]);
    let b = Dataset::from_strings(&["B"], &[vec!["1"]]);
    let result = compare(&a, &b, "A");
    assert!(result.advisory.is_some());
    assert_eq!(result.matched.row_count(), 0);
}

#[test]
fn custom_keyword_tables_change_resolution() {
    let dataset = Dataset::from_strings(&["Prestador", "Servicio"], &[vec!["Ana", "Consulta"]]);
    let table = KeywordTable::query_defaults()
        .with_role(SemanticRole::ProfessionalName, vec!["prestador"]);
    let schema = pipeline::resolve_schema(&dataset, &table);
    assert_eq!(schema.column(SemanticRole::ProfessionalName), Some("Prestador"));
    assert_eq!(schema.column(SemanticRole::ProcedureName), None);
}
