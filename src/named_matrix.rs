//! A sparse, name-indexed 2-D float store.
//!
//! Rows and columns are identified by opaque string names rather than
//! positions. Insertion order is preserved (first time a name is seen, it
//! gets the next free slot) which keeps iteration deterministic across a
//! series of incremental updates — useful for reproducing a run exactly.
//!
//! Storage is a name-to-index map backed by [`indexmap::IndexSet`] plus a
//! dense `Vec<Vec<Option<f64>>>` of cells, rather than a hash keyed directly
//! on `(row, col)` pairs: that keeps row/column lookup, iteration and
//! subsetting all O(1)-ish against the index, while `None` cells represent
//! "never voted" without forcing every read through an extra hash lookup.

use crate::error::{EngineError, Result};
use crate::vote::{self, RawVote};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NamedMatrix {
    rows: IndexSet<String>,
    cols: IndexSet<String>,
    data: Vec<Vec<Option<f64>>>,
}

impl NamedMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rownames(&self) -> Vec<String> {
        self.rows.iter().cloned().collect()
    }

    pub fn colnames(&self) -> Vec<String> {
        self.cols.iter().cloned().collect()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn row_index_of(&self, name: &str) -> Option<usize> {
        self.rows.get_index_of(name)
    }

    pub fn col_index_of(&self, name: &str) -> Option<usize> {
        self.cols.get_index_of(name)
    }

    /// Raw access to the dense backing store, row-major.
    pub fn cells(&self) -> &[Vec<Option<f64>>] {
        &self.data
    }

    fn ensure_row(&mut self, name: &str) -> usize {
        if let Some(i) = self.rows.get_index_of(name) {
            return i;
        }
        self.rows.insert(name.to_string());
        self.data.push(vec![None; self.cols.len()]);
        self.rows.len() - 1
    }

    fn ensure_col(&mut self, name: &str) -> usize {
        if let Some(i) = self.cols.get_index_of(name) {
            return i;
        }
        self.cols.insert(name.to_string());
        for row in self.data.iter_mut() {
            row.push(None);
        }
        self.cols.len() - 1
    }

    fn coerce(value: Option<&RawVote>, normalize: bool) -> Option<f64> {
        if normalize {
            vote::normalize(value)
        } else {
            match value {
                Some(RawVote::Number(n)) if !n.is_nan() => Some(*n),
                _ => None,
            }
        }
    }

    /// Set a single cell, growing the row/column index as needed.
    /// Returns a new matrix; `normalize` defaults to `false` at this
    /// single-cell granularity since callers here usually already hold a
    /// normalised value.
    pub fn update(&self, row: &str, col: &str, value: Option<&RawVote>, normalize: bool) -> Self {
        let mut next = self.clone();
        let r = next.ensure_row(row);
        let c = next.ensure_col(col);
        next.data[r][c] = Self::coerce(value, normalize);
        next
    }

    /// Apply many cell updates at once. Later entries for the same
    /// `(row, col)` pair win. `normalize` defaults to `true` here since
    /// batches typically carry raw client vote tokens.
    pub fn batch_update(&self, updates: &[(String, String, Option<RawVote>)], normalize: bool) -> Self {
        let mut next = self.clone();
        for (row, col, value) in updates {
            let r = next.ensure_row(row);
            let c = next.ensure_col(col);
            next.data[r][c] = Self::coerce(value.as_ref(), normalize);
        }
        next
    }

    /// Restrict to the given row names, preserving the order they're
    /// passed in. Names absent from the matrix are silently skipped.
    pub fn row_subset(&self, names: &[String]) -> Self {
        let mut rows = IndexSet::new();
        let mut data = Vec::new();
        for name in names {
            if let Some(i) = self.rows.get_index_of(name.as_str()) {
                rows.insert(name.clone());
                data.push(self.data[i].clone());
            }
        }
        Self {
            rows,
            cols: self.cols.clone(),
            data,
        }
    }

    /// Restrict to the given column names, preserving the order passed in.
    pub fn col_subset(&self, names: &[String]) -> Self {
        let mut keep_idx = Vec::new();
        let mut cols = IndexSet::new();
        for name in names {
            if let Some(i) = self.cols.get_index_of(name.as_str()) {
                keep_idx.push(i);
                cols.insert(name.clone());
            }
        }
        let data = self
            .data
            .iter()
            .map(|row| keep_idx.iter().map(|&i| row[i]).collect())
            .collect();
        Self {
            rows: self.rows.clone(),
            cols,
            data,
        }
    }

    /// Keep every row *except* the given names.
    pub fn inv_row_subset(&self, names: &[String]) -> Self {
        let excluded: std::collections::HashSet<&str> = names.iter().map(String::as_str).collect();
        let keep: Vec<String> = self
            .rows
            .iter()
            .filter(|r| !excluded.contains(r.as_str()))
            .cloned()
            .collect();
        self.row_subset(&keep)
    }

    pub fn get_row(&self, name: &str) -> Result<Vec<Option<f64>>> {
        self.rows
            .get_index_of(name)
            .map(|i| self.data[i].clone())
            .ok_or_else(|| EngineError::UnknownRow(name.to_string()))
    }

    pub fn get_col(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let i = self
            .cols
            .get_index_of(name)
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))?;
        Ok(self.data.iter().map(|row| row[i]).collect())
    }

    /// Zero out every cell in the given columns (present names only),
    /// in place of dropping them entirely — used for metadata comments
    /// that should stay addressable but never contribute votes.
    pub fn zero_columns(&self, names: &[String]) -> Self {
        let mut next = self.clone();
        let idxs: Vec<usize> = names
            .iter()
            .filter_map(|n| next.cols.get_index_of(n.as_str()))
            .collect();
        for row in next.data.iter_mut() {
            for &i in &idxs {
                row[i] = Some(0.0);
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Option<RawVote> {
        Some(RawVote::Number(n))
    }

    #[test]
    fn update_grows_and_sets() {
        let m = NamedMatrix::new();
        let m = m.update("p1", "c1", num(1.0).as_ref(), false);
        assert_eq!(m.rownames(), vec!["p1".to_string()]);
        assert_eq!(m.colnames(), vec!["c1".to_string()]);
        assert_eq!(m.get_row("p1").unwrap(), vec![Some(1.0)]);
    }

    #[test]
    fn batch_update_last_write_wins() {
        let m = NamedMatrix::new();
        let updates = vec![
            ("p1".to_string(), "c1".to_string(), num(1.0)),
            ("p1".to_string(), "c1".to_string(), num(-1.0)),
        ];
        let m = m.batch_update(&updates, false);
        assert_eq!(m.get_row("p1").unwrap(), vec![Some(-1.0)]);
    }

    #[test]
    fn batch_update_normalizes_tokens() {
        let m = NamedMatrix::new();
        let updates = vec![(
            "p1".to_string(),
            "c1".to_string(),
            Some(RawVote::Text("agree".to_string())),
        )];
        let m = m.batch_update(&updates, true);
        assert_eq!(m.get_row("p1").unwrap(), vec![Some(1.0)]);
    }

    #[test]
    fn unknown_name_raises() {
        let m = NamedMatrix::new();
        assert!(matches!(m.get_row("nope"), Err(EngineError::UnknownRow(_))));
        assert!(matches!(
            m.get_col("nope"),
            Err(EngineError::UnknownColumn(_))
        ));
    }

    #[test]
    fn row_subset_filters_unknown_and_preserves_order() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p2", "c1", num(-1.0).as_ref(), false);
        let sub = m.row_subset(&["p2".to_string(), "ghost".to_string()]);
        assert_eq!(sub.rownames(), vec!["p2".to_string()]);
    }

    #[test]
    fn zero_columns_keeps_shape() {
        let m = NamedMatrix::new().update("p1", "c1", num(1.0).as_ref(), false);
        let m = m.zero_columns(&["c1".to_string()]);
        assert_eq!(m.get_col("c1").unwrap(), vec![Some(0.0)]);
    }

    #[test]
    fn inv_row_subset_excludes_given_names() {
        let m = NamedMatrix::new()
            .update("p1", "c1", num(1.0).as_ref(), false)
            .update("p2", "c1", num(-1.0).as_ref(), false);
        let sub = m.inv_row_subset(&["p1".to_string()]);
        assert_eq!(sub.rownames(), vec!["p2".to_string()]);
    }
}
