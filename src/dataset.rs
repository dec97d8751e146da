//! Named-column tabular data and the dichotomization utility.

use ndarray::Array2;

use crate::error::{RaschSimError, Result};

/// A rectangular table of numeric values with named columns.
///
/// Rows are persons, columns are items (or raw measurement variables before
/// dichotomization). Row order is the person index and is preserved by every
/// transformation in this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(RaschSimError::LengthMismatch {
                what: "column names",
                expected: values.ncols(),
                actual: names.len(),
            });
        }
        Ok(Self { names, values })
    }

    /// Wrap an integer score matrix, naming columns `Item_1..Item_k`.
    pub fn from_scores(scores: &Array2<i32>) -> Self {
        let names = (1..=scores.ncols()).map(|j| format!("Item_{j}")).collect();
        let values = scores.mapv(|v| v as f64);
        Self { names, values }
    }

    /// Convert back to an integer score matrix for the estimation pipeline.
    pub fn to_scores(&self) -> Array2<i32> {
        self.values.mapv(|v| v.round() as i32)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| RaschSimError::UnknownColumn(name.to_string()))
    }

    /// Threshold the listed columns into binary indicators.
    ///
    /// A cell becomes 1.0 iff its value is strictly greater than `threshold`;
    /// columns not listed pass through unchanged. Returns a new dataset, the
    /// input is never mutated.
    pub fn dichotomize(&self, threshold: f64, columns: &[&str]) -> Result<Dataset> {
        let mut indices = Vec::with_capacity(columns.len());
        for name in columns {
            indices.push(self.column_index(name)?);
        }

        let mut values = self.values.clone();
        for &j in &indices {
            for value in values.column_mut(j).iter_mut() {
                *value = if *value > threshold { 1.0 } else { 0.0 };
            }
        }
        Dataset::new(self.names.clone(), values)
    }
}

/// Per-item response frequency counts: for column `j`, entry `s` is the number
/// of rows scoring `s`. This is the tabular input behind per-item response
/// histograms.
pub fn response_frequencies(data: &Dataset) -> Vec<Vec<usize>> {
    let scores = data.to_scores();
    (0..scores.ncols())
        .map(|j| {
            let col = scores.column(j);
            let max = col.iter().cloned().max().unwrap_or(0).max(0) as usize;
            let mut counts = vec![0usize; max + 1];
            for &s in col.iter() {
                if s >= 0 {
                    counts[s as usize] += 1;
                }
            }
            counts
        })
        .collect()
}
