pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod io_utils;
pub mod normalize;
pub mod pipeline;
pub mod roles;
pub mod sanitize;
pub mod store;
pub mod summary;
pub mod table;

use std::{
    collections::{BTreeMap, BTreeSet},
    env, fs,
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands, InputOptions, TableKind},
    config::ReconConfig,
    data::Value,
    dataset::Dataset,
    filter::Predicates,
    io_utils::ReadOptions,
    pipeline::ReconciliationReport,
    roles::{KeywordTable, SemanticRole},
    store::{ArtifactStore, Session},
    summary::{FilterOptions, PatientSummary, ProcedureTotal, RollupRow},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("billing_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = ReconConfig::discover(cli.config.as_deref(), cli.workspace.as_deref())
        .context("Loading configuration")?;
    debug!("Workspace: {:?}", config.workspace);
    let mut session = Session::new(ArtifactStore::new(&config.workspace));
    match cli.command {
        Commands::Reconcile(args) => handle_reconcile(&args, &config, &mut session),
        Commands::Resolve(args) => handle_resolve(&args, &config),
        Commands::Filter(args) => handle_filter(&args, &config, &mut session),
        Commands::Compare(args) => handle_compare(&args),
        Commands::Sanitize(args) => handle_sanitize(&args, &config),
        Commands::Summary(args) => handle_summary(&args, &config, &mut session),
        Commands::Status => handle_status(&mut session),
        Commands::Clear => handle_clear(&mut session),
    }
}

fn read_options(options: &InputOptions) -> Result<ReadOptions> {
    Ok(ReadOptions {
        delimiter: options.delimiter,
        encoding: io_utils::resolve_encoding(options.input_encoding.as_deref())?,
    })
}

fn load(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    io_utils::read_dataset(path, options).with_context(|| format!("Reading {path:?}"))
}

/// The dataset named on the command line, else the stored one.
fn input_or_current(
    input: Option<&Path>,
    options: &InputOptions,
    session: &mut Session,
) -> Result<Dataset> {
    match input {
        Some(path) => load(path, &read_options(options)?),
        None => session
            .current()
            .context("Loading the stored dataset")?
            .cloned()
            .ok_or_else(|| anyhow!("No reconciled dataset yet; run `reconcile` first")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Serializing output")?
    );
    Ok(())
}

fn handle_reconcile(
    args: &cli::ReconcileArgs,
    config: &ReconConfig,
    session: &mut Session,
) -> Result<()> {
    let options = read_options(&args.options)?;
    let primary = load(&args.primary, &options)?;
    let reference = match &args.reference {
        Some(path) => load(path, &options)?,
        None => Dataset::default(),
    };
    info!(
        "Loaded {} primary row(s) and {} reference row(s)",
        primary.row_count(),
        reference.row_count()
    );

    let outcome =
        pipeline::reconcile(&primary, &reference, config).context("Reconciling tables")?;
    let report = ReconciliationReport::from(&outcome);
    let saved = session
        .replace(outcome.dataset().clone())
        .context("Storing the reconciled dataset")?;

    if args.json {
        #[derive(Serialize)]
        struct Output<'a> {
            #[serde(flatten)]
            report: &'a ReconciliationReport<'a>,
            #[serde(flatten)]
            saved: &'a store::SavedArtifacts,
        }
        return print_json(&Output {
            report: &report,
            saved: &saved,
        });
    }
    println!(
        "Reconciliation {}: {} row(s), {} column(s)",
        report.outcome, report.rows, report.columns
    );
    if let (Some(code), Some(name), Some(unmatched)) =
        (report.code_matches, report.name_matches, report.unmatched)
    {
        println!("Priced by code: {code}, by name: {name}, unmatched: {unmatched}");
    }
    if let Some(reason) = report.reason {
        println!("Price join skipped: {reason}");
    }
    println!("Dataset: {}", saved.current.display());
    println!("Export: {}", saved.export.display());
    println!("Updated at: {}", saved.updated_at);
    Ok(())
}

fn handle_resolve(args: &cli::ResolveArgs, config: &ReconConfig) -> Result<()> {
    let dataset = load(&args.input, &read_options(&args.options)?)?;
    let keywords: &KeywordTable = match args.table {
        TableKind::Join => &config.keywords.join,
        TableKind::Reference => &config.keywords.reference,
        TableKind::Query => &config.keywords.query,
    };
    let schema = pipeline::resolve_schema(&dataset, keywords);
    let bindings = keywords
        .roles()
        .map(|role| (role, schema.column(role)))
        .collect::<BTreeMap<SemanticRole, Option<&str>>>();

    if args.json {
        return print_json(&bindings);
    }
    let rows = bindings
        .iter()
        .map(|(role, column)| {
            vec![
                role.to_string(),
                column.map(str::to_string).unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_rows(&["role", "column"], &rows));
    Ok(())
}

fn handle_filter(
    args: &cli::FilterArgs,
    config: &ReconConfig,
    session: &mut Session,
) -> Result<()> {
    let dataset = input_or_current(args.input.as_deref(), &args.options, session)?;
    let predicates = Predicates {
        professional: args.professional.clone(),
        procedure: args.procedure.clone(),
        city: args.city.clone(),
        date_from: args.from,
        date_to: args.to,
    };
    let filtered = pipeline::filter(&dataset, &predicates, config);
    info!(
        "{} of {} row(s) match",
        filtered.dataset.row_count(),
        dataset.row_count()
    );

    match &args.output {
        Some(path) => {
            io_utils::write_dataset(&filtered.dataset, path, args.options.delimiter)
                .with_context(|| format!("Writing {path:?}"))?;
            info!("Wrote {} row(s) to {path:?}", filtered.dataset.row_count());
        }
        None => {
            print!("{}", table::render_dataset(&filtered.dataset, args.limit));
            let total = summary::total_value(&filtered.dataset, &config.keywords.query);
            println!("Rows: {}", filtered.dataset.row_count());
            println!("Total value: {}", Value::Number(total));
        }
    }
    Ok(())
}

fn handle_compare(args: &cli::CompareArgs) -> Result<()> {
    let options = read_options(&args.options)?;
    let left = load(&args.left, &options)?;
    let right = load(&args.right, &options)?;

    let Some(key) = &args.key else {
        let candidates = compare::common_columns(&left, &right);
        if candidates.is_empty() {
            println!("The tables share no column names");
        } else {
            println!("Candidate key columns:");
            for column in candidates {
                println!("  {column}");
            }
        }
        return Ok(());
    };

    let result = pipeline::compare(&left, &right, key);
    if let Some(advisory) = &result.advisory {
        println!("{advisory}");
        return Ok(());
    }

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("Creating {dir:?}"))?;
        for (name, dataset) in [
            ("matched.csv", &result.matched),
            ("only_in_a.csv", &result.only_in_a),
            ("only_in_b.csv", &result.only_in_b),
        ] {
            let path = dir.join(name);
            io_utils::write_csv(dataset, &path, None)
                .with_context(|| format!("Writing {path:?}"))?;
        }
        info!("Comparison tables written to {dir:?}");
    }

    if args.json {
        #[derive(Serialize)]
        struct Counts<'a> {
            key: &'a str,
            matched: usize,
            only_in_a: usize,
            only_in_b: usize,
        }
        return print_json(&Counts {
            key,
            matched: result.matched.row_count(),
            only_in_a: result.only_in_a.row_count(),
            only_in_b: result.only_in_b.row_count(),
        });
    }
    println!("Key: {key}");
    println!("Matched: {}", result.matched.row_count());
    println!("Only in A: {}", result.only_in_a.row_count());
    println!("Only in B: {}", result.only_in_b.row_count());
    Ok(())
}

fn handle_sanitize(args: &cli::SanitizeArgs, config: &ReconConfig) -> Result<()> {
    let dataset = load(&args.input, &read_options(&args.options)?)?;
    let cleaned = pipeline::sanitize_for_export(&dataset, config);
    io_utils::write_dataset(&cleaned, &args.output, args.options.delimiter)
        .with_context(|| format!("Writing {:?}", args.output))?;
    info!(
        "Sanitized {} row(s) into {:?}",
        cleaned.row_count(),
        args.output
    );
    Ok(())
}

fn handle_summary(
    args: &cli::SummaryArgs,
    config: &ReconConfig,
    session: &mut Session,
) -> Result<()> {
    let dataset = input_or_current(args.input.as_deref(), &args.options, session)?;
    let keywords = &config.keywords.query;
    if args.list_options {
        return print_filter_options(&summary::filter_options(&dataset, keywords), args.json);
    }

    let total = summary::total_value(&dataset, keywords);
    let rollup = summary::professional_procedure_rollup(&dataset, keywords);
    if rollup.is_empty() {
        warn!("No professional or procedure name column found; rollup is empty");
    }
    let procedures = summary::procedure_totals(&dataset, keywords);
    let patients = summary::patient_summary(&dataset, keywords);

    if args.json {
        #[derive(Serialize)]
        struct Output<'a> {
            rows: usize,
            total_value: f64,
            rollup: &'a [RollupRow],
            procedures: &'a [ProcedureTotal],
            patients: &'a [PatientSummary],
        }
        return print_json(&Output {
            rows: dataset.row_count(),
            total_value: total,
            rollup: &rollup,
            procedures: &procedures,
            patients: &patients,
        });
    }
    println!("Rows: {}", dataset.row_count());
    println!("Total value: {}", Value::Number(total));
    if !rollup.is_empty() {
        let rows = rollup
            .iter()
            .map(|row| {
                vec![
                    row.professional.clone(),
                    row.procedure.clone(),
                    row.services.to_string(),
                    Value::Number(row.value).to_string(),
                ]
            })
            .collect::<Vec<_>>();
        print!(
            "{}",
            table::render_rows(&["professional", "procedure", "services", "value"], &rows)
        );
    }
    if !procedures.is_empty() {
        let rows = procedures
            .iter()
            .map(|row| vec![row.procedure.clone(), Value::Number(row.value).to_string()])
            .collect::<Vec<_>>();
        println!();
        print!("{}", table::render_rows(&["procedure", "value"], &rows));
    }
    if !patients.is_empty() {
        println!();
        print!("{}", render_patients(&patients));
    }
    Ok(())
}

fn print_filter_options(options: &FilterOptions, json: bool) -> Result<()> {
    if json {
        return print_json(options);
    }
    for (dimension, values) in [
        ("Professionals", &options.professional),
        ("Procedures", &options.procedure),
        ("Cities", &options.city),
    ] {
        println!("{dimension} ({}):", values.len());
        for value in values {
            println!("  {value}");
        }
    }
    Ok(())
}

/// Patient × procedure service counts with per-patient totals.
fn render_patients(patients: &[PatientSummary]) -> String {
    let procedures = patients
        .iter()
        .flat_map(|patient| patient.services.keys())
        .collect::<BTreeSet<_>>();
    let mut headers = vec!["patient"];
    headers.extend(procedures.iter().map(|p| p.as_str()));
    headers.extend(["services", "value"]);
    let rows = patients
        .iter()
        .map(|patient| {
            let mut row = vec![patient.patient.clone()];
            row.extend(procedures.iter().map(|procedure| {
                patient
                    .services
                    .get(*procedure)
                    .copied()
                    .unwrap_or(0)
                    .to_string()
            }));
            row.push(patient.total_services.to_string());
            row.push(Value::Number(patient.value).to_string());
            row
        })
        .collect::<Vec<_>>();
    table::render_rows(&headers, &rows)
}

fn handle_status(session: &mut Session) -> Result<()> {
    match session.store().last_updated()? {
        Some(stamp) => println!("Last update: {stamp}"),
        None => println!("Never updated"),
    }
    if let Some(dataset) = session.current().context("Loading the stored dataset")? {
        println!(
            "Current dataset: {} row(s), {} column(s)",
            dataset.row_count(),
            dataset.column_count()
        );
    }
    Ok(())
}

fn handle_clear(session: &mut Session) -> Result<()> {
    let removed = session.clear().context("Removing stored artifacts")?;
    println!("Removed {removed} file(s)");
    Ok(())
}
