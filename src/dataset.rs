//! In-memory table shared by every reconciliation stage.
//!
//! A [`Dataset`] keeps its header labels trimmed and unique (the first occurrence of a
//! duplicated label wins, together with its cells) and every row exactly as wide as the
//! header. Stages never mutate a dataset they were handed; they build a new one.

use std::collections::HashSet;

use serde::Serialize;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut seen = HashSet::new();
        let mut keep = Vec::with_capacity(headers.len());
        let mut labels = Vec::with_capacity(headers.len());
        for (idx, raw) in headers.iter().enumerate() {
            let trimmed = raw.trim();
            let label = if trimmed.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                trimmed.to_string()
            };
            if seen.insert(label.clone()) {
                keep.push(idx);
                labels.push(label);
            }
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                if keep.len() == headers.len() {
                    row.resize(headers.len(), Value::Empty);
                    row
                } else {
                    keep.iter()
                        .map(|idx| row.get_mut(*idx).map(std::mem::take).unwrap_or_default())
                        .collect()
                }
            })
            .collect();

        Dataset {
            headers: labels,
            rows,
        }
    }

    /// Builds a dataset from string cells, treating empty strings as missing.
    pub fn from_strings(headers: &[&str], rows: &[Vec<&str>]) -> Self {
        Dataset::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| Value::from_raw(cell)).collect())
                .collect(),
        )
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// True when there is nothing to reconcile: no columns or no rows.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == label)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Returns a copy with `label` holding `values`, replacing the column in place when
    /// it exists and appending it otherwise.
    pub fn with_column(&self, label: &str, values: Vec<Value>) -> Dataset {
        let mut headers = self.headers.clone();
        let mut rows = self.rows.clone();
        let idx = match self.column_index(label) {
            Some(idx) => idx,
            None => {
                headers.push(label.trim().to_string());
                for row in &mut rows {
                    row.push(Value::Empty);
                }
                headers.len() - 1
            }
        };
        for (row, value) in rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Dataset::new(headers, rows)
    }

    /// Returns a copy with the cells of column `idx` rewritten by `f`.
    pub fn map_column<F>(&self, idx: usize, mut f: F) -> Dataset
    where
        F: FnMut(&Value) -> Value,
    {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[idx] = f(&row[idx]);
                row
            })
            .collect();
        Dataset {
            headers: self.headers.clone(),
            rows,
        }
    }

    pub fn select_rows<I>(&self, indices: I) -> Dataset
    where
        I: IntoIterator<Item = usize>,
    {
        Dataset {
            headers: self.headers.clone(),
            rows: indices
                .into_iter()
                .filter_map(|idx| self.rows.get(idx).cloned())
                .collect(),
        }
    }

    /// Stacks `other` below `self`; the header is the union of both, with columns only
    /// present in `other` appended and missing cells left empty.
    pub fn concat(&self, other: &Dataset) -> Dataset {
        let mut headers = self.headers.clone();
        for label in &other.headers {
            if !headers.contains(label) {
                headers.push(label.clone());
            }
        }
        let width = headers.len();
        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        for row in &self.rows {
            let mut row = row.clone();
            row.resize(width, Value::Empty);
            rows.push(row);
        }
        let positions = other
            .headers
            .iter()
            .map(|label| headers.iter().position(|h| h == label).unwrap_or_default())
            .collect::<Vec<_>>();
        for row in &other.rows {
            let mut combined = vec![Value::Empty; width];
            for (value, position) in row.iter().zip(&positions) {
                combined[*position] = value.clone();
            }
            rows.push(combined);
        }
        Dataset { headers, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_labels_and_keeps_first_duplicate() {
        let dataset = Dataset::new(
            vec![" Code ".into(), "Name".into(), "Code".into()],
            vec![vec![
                Value::Text("001".into()),
                Value::Text("Consulta".into()),
                Value::Text("999".into()),
            ]],
        );
        assert_eq!(dataset.headers(), ["Code", "Name"]);
        assert_eq!(dataset.rows()[0][0], Value::Text("001".into()));
        assert_eq!(dataset.rows()[0].len(), 2);
    }

    #[test]
    fn new_pads_short_rows_and_names_blank_headers() {
        let dataset = Dataset::new(
            vec!["a".into(), "".into()],
            vec![vec![Value::Number(1.0)]],
        );
        assert_eq!(dataset.headers(), ["a", "column_2"]);
        assert_eq!(dataset.rows()[0], vec![Value::Number(1.0), Value::Empty]);
    }

    #[test]
    fn concat_unions_headers() {
        let left = Dataset::from_strings(&["id", "name"], &[vec!["1", "x"]]);
        let right = Dataset::from_strings(&["price", "id"], &[vec!["10", "2"]]);
        let combined = left.concat(&right);
        assert_eq!(combined.headers(), ["id", "name", "price"]);
        assert_eq!(combined.row_count(), 2);
        assert_eq!(
            combined.rows()[1],
            vec![Value::Text("2".into()), Value::Empty, Value::Text("10".into())]
        );
    }

    #[test]
    fn with_column_appends_or_replaces() {
        let base = Dataset::from_strings(&["id"], &[vec!["1"], vec!["2"]]);
        let appended = base.with_column("Total", vec![Value::Number(5.0), Value::Number(6.0)]);
        assert_eq!(appended.headers(), ["id", "Total"]);
        let replaced = appended.with_column("id", vec![Value::Empty, Value::Empty]);
        assert_eq!(replaced.cell(0, "id"), Some(&Value::Empty));
        assert_eq!(base.column_count(), 1);
    }
}
