use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::data::parse_day_first_date;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile billing exports against a price catalog",
    long_about = None
)]
pub struct Cli {
    /// Directory holding the persisted artifacts (overrides the configuration file)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
    /// YAML configuration file (defaults to billing-recon.yml inside the workspace)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enrich a billing table with catalog prices and store the result
    Reconcile(ReconcileArgs),
    /// Show which column plays each semantic role in a file
    Resolve(ResolveArgs),
    /// Filter the current dataset (or a file) by professional, procedure, city and dates
    Filter(FilterArgs),
    /// Cross-check two tables on a shared key column
    Compare(CompareArgs),
    /// Clean a file for spreadsheet export
    Sanitize(SanitizeArgs),
    /// Total billed value and services per professional and procedure
    Summary(SummaryArgs),
    /// Show when the stored dataset was last updated
    Status,
    /// Remove every stored artifact
    Clear,
}

#[derive(Debug, Clone, Default, Args)]
pub struct InputOptions {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Billing export to enrich
    #[arg(short, long)]
    pub primary: PathBuf,
    /// Price catalog
    #[arg(short, long)]
    pub reference: Option<PathBuf>,
    #[command(flatten)]
    pub options: InputOptions,
    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableKind {
    Join,
    Reference,
    Query,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// File whose header should be resolved
    #[arg(short, long)]
    pub input: PathBuf,
    /// Keyword table to resolve with
    #[arg(long, value_enum, default_value_t = TableKind::Join)]
    pub table: TableKind,
    #[command(flatten)]
    pub options: InputOptions,
    /// Print the bindings as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// File to filter (defaults to the stored dataset)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Exact professional name (case-insensitive)
    #[arg(long)]
    pub professional: Option<String>,
    /// Exact procedure name (case-insensitive)
    #[arg(long)]
    pub procedure: Option<String>,
    /// Exact city or site (case-insensitive)
    #[arg(long)]
    pub city: Option<String>,
    /// Earliest date to keep, day first (e.g. 05/03/2024)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,
    /// Latest date to keep, day first
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,
    /// Write the matching rows here (.csv, .tsv or .xlsx) instead of printing them
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Maximum number of rows to print
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
    #[command(flatten)]
    pub options: InputOptions,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Table A
    #[arg(long)]
    pub left: PathBuf,
    /// Table B
    #[arg(long)]
    pub right: PathBuf,
    /// Key column present in both tables; omit to list the candidates
    #[arg(short, long)]
    pub key: Option<String>,
    /// Directory receiving matched.csv, only_in_a.csv and only_in_b.csv
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    #[command(flatten)]
    pub options: InputOptions,
    /// Print counts as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SanitizeArgs {
    /// File to clean
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination (.csv, .tsv or .xlsx)
    #[arg(short, long)]
    pub output: PathBuf,
    #[command(flatten)]
    pub options: InputOptions,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// File to summarize (defaults to the stored dataset)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    #[command(flatten)]
    pub options: InputOptions,
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
    /// List the distinct professional, procedure and city values instead
    #[arg(long = "options")]
    pub list_options: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "pipe" | "|" => Ok(b'|'),
        "semicolon" | ";" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() || !first.is_ascii() {
                return Err(format!(
                    "Delimiter must be a single ASCII character, got '{other}'"
                ));
            }
            Ok(first as u8)
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_day_first_date(value).ok_or_else(|| format!("'{value}' is not a recognizable date"))
}
