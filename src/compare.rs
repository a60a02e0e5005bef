//! Two-way cross-check of arbitrary tables on a shared key column.
//!
//! Keys are compared after trimming only, so `" 42"` and `"42"` match while `"abc"` and
//! `"ABC"` do not. Duplicated keys are not collapsed: a key present `m` times in A and `n`
//! times in B produces `m × n` matched rows.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::{info, warn};

use crate::{data::Value, dataset::Dataset, normalize::normalize_code};

const LEFT_SUFFIX: &str = "_A";
const RIGHT_SUFFIX: &str = "_B";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonResult {
    pub key: String,
    pub matched: Dataset,
    pub only_in_a: Dataset,
    pub only_in_b: Dataset,
    /// Set when the comparison could not run, e.g. the key is not shared by both tables.
    pub advisory: Option<String>,
}

impl ComparisonResult {
    fn advisory(key: &str, message: String) -> Self {
        warn!("{message}");
        ComparisonResult {
            key: key.to_string(),
            advisory: Some(message),
            ..ComparisonResult::default()
        }
    }
}

/// Labels present in both tables, in A's column order.
pub fn common_columns(a: &Dataset, b: &Dataset) -> Vec<String> {
    let right = b.headers().iter().collect::<HashSet<_>>();
    a.headers()
        .iter()
        .filter(|label| right.contains(label))
        .cloned()
        .collect()
}

pub fn compare(a: &Dataset, b: &Dataset, key: &str) -> ComparisonResult {
    let candidates = common_columns(a, b);
    if candidates.is_empty() {
        return ComparisonResult::advisory(
            key,
            "The tables share no column names; nothing to compare".to_string(),
        );
    }
    let (Some(a_key), Some(b_key)) = (a.column_index(key), b.column_index(key)) else {
        return ComparisonResult::advisory(
            key,
            format!(
                "Column '{key}' is not present in both tables; choose one of: {}",
                candidates.join(", ")
            ),
        );
    };

    let a_keys = a.column(a_key).map(normalize_code).collect::<Vec<_>>();
    let b_keys = b.column(b_key).map(normalize_code).collect::<Vec<_>>();

    let mut b_buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row_idx, k) in b_keys.iter().enumerate() {
        b_buckets.entry(k.as_str()).or_default().push(row_idx);
    }
    let a_key_set = a_keys.iter().map(|k| k.as_str()).collect::<HashSet<_>>();

    let layout = MatchedLayout::new(a.headers(), b.headers(), a_key, b_key);
    let mut matched_rows = Vec::new();
    let mut only_a_rows = Vec::new();
    for (row_idx, k) in a_keys.iter().enumerate() {
        let left = &a.rows()[row_idx];
        match b_buckets.get(k.as_str()) {
            Some(bucket) => {
                for right_idx in bucket {
                    matched_rows.push(layout.combine(left, &b.rows()[*right_idx], k));
                }
            }
            None => only_a_rows.push(with_key(left, a_key, k)),
        }
    }
    let only_b_rows = b_keys
        .iter()
        .enumerate()
        .filter(|(_, k)| !a_key_set.contains(k.as_str()))
        .map(|(row_idx, k)| with_key(&b.rows()[row_idx], b_key, k))
        .collect_vec();

    let result = ComparisonResult {
        key: key.to_string(),
        matched: Dataset::new(layout.headers.clone(), matched_rows),
        only_in_a: Dataset::new(a.headers().to_vec(), only_a_rows),
        only_in_b: Dataset::new(b.headers().to_vec(), only_b_rows),
        advisory: None,
    };
    info!(
        "Compared on '{}': {} matched, {} only in A, {} only in B",
        key,
        result.matched.row_count(),
        result.only_in_a.row_count(),
        result.only_in_b.row_count()
    );
    result
}

fn with_key(row: &[Value], key_idx: usize, key: &str) -> Vec<Value> {
    let mut row = row.to_vec();
    row[key_idx] = Value::from_raw(key);
    row
}

/// Column layout of the matched table: A's columns (key included once), then B's
/// non-key columns. Labels found on both sides get `_A` / `_B` suffixes, numbered
/// (`Amount_A_2`) when the suffixed label is already taken.
struct MatchedLayout {
    headers: Vec<String>,
    a_key: usize,
    b_columns: Vec<usize>,
}

impl MatchedLayout {
    fn new(a_headers: &[String], b_headers: &[String], a_key: usize, b_key: usize) -> Self {
        let b_labels = b_headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != b_key)
            .map(|(_, label)| label.as_str())
            .collect::<HashSet<_>>();
        let a_labels = a_headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != a_key)
            .map(|(_, label)| label.as_str())
            .collect::<HashSet<_>>();
        let mut taken = a_headers
            .iter()
            .chain(b_headers)
            .cloned()
            .collect::<HashSet<_>>();

        let mut headers = a_headers
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                if idx != a_key && b_labels.contains(label.as_str()) {
                    suffixed_label(label, LEFT_SUFFIX, &mut taken)
                } else {
                    label.clone()
                }
            })
            .collect::<Vec<_>>();
        let mut b_columns = Vec::new();
        for (idx, label) in b_headers.iter().enumerate() {
            if idx == b_key {
                continue;
            }
            if a_labels.contains(label.as_str()) {
                headers.push(suffixed_label(label, RIGHT_SUFFIX, &mut taken));
            } else {
                headers.push(label.clone());
            }
            b_columns.push(idx);
        }
        MatchedLayout {
            headers,
            a_key,
            b_columns,
        }
    }

    fn combine(&self, left: &[Value], right: &[Value], key: &str) -> Vec<Value> {
        let mut combined = with_key(left, self.a_key, key);
        combined.extend(self.b_columns.iter().map(|idx| right[*idx].clone()));
        combined
    }
}

fn suffixed_label(label: &str, suffix: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = format!("{label}{suffix}");
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{label}{suffix}_{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
