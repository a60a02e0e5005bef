//! Plain-text rendering of datasets and report rows for the terminal.

use std::fmt::Write as _;

use crate::{data::Value, dataset::Dataset};

const MAX_CELL_WIDTH: usize = 40;

/// Renders up to `limit` rows of `dataset`. Numbers are right-aligned and long cells are
/// cut to a fixed width.
pub fn render_dataset(dataset: &Dataset, limit: usize) -> String {
    let rows = dataset
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(Cell::from_value).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let headers = dataset
        .headers()
        .iter()
        .map(|h| Cell::text(h))
        .collect::<Vec<_>>();
    let mut output = render(&headers, &rows);
    if dataset.row_count() > limit {
        let _ = writeln!(
            output,
            "... {} more row(s)",
            dataset.row_count() - limit
        );
    }
    output
}

/// Renders string rows under `headers`; no truncation by row count.
pub fn render_rows(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| Cell::text(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|cell| Cell::text(cell)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    render(&headers, &rows)
}

struct Cell {
    text: String,
    numeric: bool,
}

impl Cell {
    fn text(raw: &str) -> Self {
        Cell {
            text: flatten(raw),
            numeric: false,
        }
    }

    fn from_value(value: &Value) -> Self {
        Cell {
            text: flatten(&value.as_display()),
            numeric: matches!(value, Value::Number(_)),
        }
    }

    fn width(&self) -> usize {
        self.text.chars().count()
    }
}

/// Single-line, width-capped view of a cell.
fn flatten(raw: &str) -> String {
    let single_line = raw
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>();
    if single_line.chars().count() > MAX_CELL_WIDTH {
        let mut cut = single_line
            .chars()
            .take(MAX_CELL_WIDTH - 1)
            .collect::<String>();
        cut.push('…');
        cut
    } else {
        single_line
    }
}

fn render(headers: &[Cell], rows: &[Vec<Cell>]) -> String {
    let mut widths = headers.iter().map(|h| h.width().max(1)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let mut output = String::new();
    push_line(&mut output, headers, &widths);
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", rule.join("  "));
    for row in rows {
        push_line(&mut output, row, &widths);
    }
    output
}

fn push_line(output: &mut String, cells: &[Cell], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = " ".repeat(width.saturating_sub(cell.width()));
            if cell.numeric {
                format!("{pad}{}", cell.text)
            } else {
                format!("{}{pad}", cell.text)
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(output, "{}", line.trim_end());
}
