//! Reading and writing datasets as delimited text or spreadsheets.
//!
//! The format follows the file extension: `.xlsx`, `.xlsm`, `.xls`, `.xlsb` and `.ods`
//! are read through calamine (first sheet, first row as header) and everything else is
//! read as CSV/TSV. Delimited input keeps every cell as text so identifiers such as
//! `"001"` survive untouched. Spreadsheets can only be written as `.xlsx`.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read},
    path::Path,
};

use anyhow::anyhow;
use calamine::{Data, Reader, open_workbook_auto};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::{
    data::{Value, date_from_serial, date_to_serial, parse_day_first_date},
    dataset::Dataset,
    error::{ReconError, Result},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];
const EXPORT_DATE_FORMAT: &str = "dd/mm/yyyy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited,
    Spreadsheet,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Self {
        match extension(path) {
            Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) => FileFormat::Spreadsheet,
            _ => FileFormat::Delimited,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Overrides the delimiter implied by the extension.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> anyhow::Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match extension(path).as_deref() {
        Some("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn read_dataset(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    let dataset = match FileFormat::from_path(path) {
        FileFormat::Spreadsheet => read_spreadsheet(path)?,
        FileFormat::Delimited => read_delimited(path, options)?,
    };
    debug!(
        "Read {} row(s) x {} column(s) from {path:?}",
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

pub fn open_csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader)
}

fn read_delimited(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    let file = File::open(path).map_err(|err| ReconError::io(path, err))?;
    let delimiter = resolve_delimiter(path, options.delimiter);
    let mut reader = open_csv_reader(BufReader::new(file), delimiter);
    let csv_error = |source: csv::Error| ReconError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = FieldDecoder::new(options.encoding);
    let headers = decoder.decode_record(reader.byte_headers().map_err(csv_error)?);
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(csv_error)?;
        rows.push(
            decoder
                .decode_record(&record)
                .iter()
                .map(|field| Value::from_raw(field))
                .collect(),
        );
    }
    if decoder.replaced > 0 {
        warn!(
            "{} field(s) in {path:?} were not valid {}; undecodable bytes were replaced",
            decoder.replaced,
            options.encoding.name()
        );
    }
    Ok(Dataset::new(headers, rows))
}

struct FieldDecoder {
    encoding: &'static Encoding,
    replaced: usize,
}

impl FieldDecoder {
    fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            replaced: 0,
        }
    }

    fn decode_record(&mut self, record: &csv::ByteRecord) -> Vec<String> {
        record
            .iter()
            .map(|field| {
                let (text, had_errors) = self.encoding.decode_with_bom_removal(field);
                if had_errors {
                    self.replaced += 1;
                }
                text.into_owned()
            })
            .collect()
    }
}

fn read_spreadsheet(path: &Path) -> Result<Dataset> {
    let read_error = |message: String| ReconError::SpreadsheetRead {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|err| read_error(err.to_string()))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Err(read_error("workbook contains no sheets".to_string()));
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|err| read_error(format!("sheet '{sheet}': {err}")))?;
    debug!("Reading sheet '{sheet}' of {path:?}");

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|row| {
            row.iter()
                .map(|cell| cell_value(cell).as_display())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let rows = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|value| !value.is_empty()))
        .collect();
    Ok(Dataset::new(headers, rows))
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::String(text) => Value::from_raw(text),
        Data::Float(n) => Value::Number(*n),
        Data::Int(n) => Value::Number(*n as f64),
        Data::Bool(b) => Value::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            date_from_serial(serial)
                .map(Value::Date)
                .unwrap_or(Value::Number(serial))
        }
        Data::DateTimeIso(text) => parse_day_first_date(text)
            .map(Value::Date)
            .unwrap_or_else(|| Value::from_raw(text)),
        Data::DurationIso(text) => Value::from_raw(text),
        Data::Error(err) => Value::Text(format!("#{err:?}")),
    }
}

/// Writes `dataset` as `.xlsx` or as delimited text, depending on the extension.
pub fn write_dataset(dataset: &Dataset, path: &Path, delimiter: Option<u8>) -> Result<()> {
    match extension(path).as_deref() {
        Some("xlsx") => write_xlsx(dataset, path),
        Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext) => {
            Err(ReconError::UnsupportedFormat(path.to_path_buf()))
        }
        _ => write_csv(dataset, path, delimiter),
    }
}

pub fn write_csv(dataset: &Dataset, path: &Path, delimiter: Option<u8>) -> Result<()> {
    let file = File::create(path).map_err(|err| ReconError::io(path, err))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(resolve_delimiter(path, delimiter))
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(BufWriter::new(file));
    let csv_error = |source: csv::Error| ReconError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer.write_record(dataset.headers()).map_err(csv_error)?;
    for row in dataset.rows() {
        writer
            .write_record(row.iter().map(Value::as_display))
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|err| ReconError::io(path, err))
}

/// Single-sheet workbook with a bold header row. Numbers stay numeric and dates are
/// written as date cells formatted `dd/mm/yyyy`.
pub fn write_xlsx(dataset: &Dataset, path: &Path) -> Result<()> {
    let xlsx_error = |source: XlsxError| ReconError::SpreadsheetWrite {
        path: path.to_path_buf(),
        source,
    };
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format(EXPORT_DATE_FORMAT);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, label) in dataset.headers().iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, label, &header_format)
            .map_err(xlsx_error)?;
    }
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let row_num = row_idx as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            let written = match value {
                Value::Empty => continue,
                Value::Text(text) => worksheet.write_string(row_num, col, text),
                Value::Number(n) => worksheet.write_number(row_num, col, *n),
                Value::Date(date) => worksheet.write_number_with_format(
                    row_num,
                    col,
                    date_to_serial(*date),
                    &date_format,
                ),
            };
            written.map_err(xlsx_error)?;
        }
    }
    workbook.save(path).map_err(xlsx_error)
}
