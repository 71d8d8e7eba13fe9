//! Design matrix construction for per-feature fits
//!
//! The covariate block is built once per scan, aligned to the feature
//! matrix's sample order. Each feature's fit then selects its complete-case
//! rows and appends the feature itself as the last column.

use ndarray::Array2;

use crate::data::{Covariate, CovariateKind};

/// Covariate columns shared by every feature in a scan.
#[derive(Debug, Clone)]
pub struct CovariateDesign {
    /// samples (feature-matrix column order) x covariate columns
    columns: Array2<f64>,
    names: Vec<String>,
    /// Indicator columns may be dropped from a fit when constant on its rows.
    indicator: Vec<bool>,
    /// Per sample: every covariate observed.
    complete: Vec<bool>,
}

impl CovariateDesign {
    /// Build the covariate block.
    ///
    /// `sample_map[j]` is the outcome-table row for feature-matrix column `j`.
    /// Categorical covariates use treatment coding with the first declared
    /// level as reference.
    pub fn build(covariates: &[&Covariate], sample_map: &[usize], intercept: bool) -> Self {
        let n_samples = sample_map.len();
        let n_cols = usize::from(intercept) + covariates.iter().map(|c| c.n_columns()).sum::<usize>();

        let mut columns = Array2::zeros((n_samples, n_cols));
        let mut names = Vec::with_capacity(n_cols);
        let mut indicator = Vec::with_capacity(n_cols);
        let mut complete = vec![true; n_samples];

        let mut col = 0;
        if intercept {
            columns.column_mut(0).fill(1.0);
            names.push("Intercept".to_string());
            indicator.push(false);
            col = 1;
        }

        for covariate in covariates {
            for (j, &row) in sample_map.iter().enumerate() {
                if covariate.is_missing(row) {
                    complete[j] = false;
                }
            }

            match &covariate.kind {
                CovariateKind::Continuous(values) => {
                    for (j, &row) in sample_map.iter().enumerate() {
                        let v = values[row];
                        columns[[j, col]] = if v.is_nan() { 0.0 } else { v };
                    }
                    names.push(covariate.name.clone());
                    indicator.push(false);
                    col += 1;
                }
                CovariateKind::Categorical { levels, codes } => {
                    for (offset, level) in levels.iter().enumerate().skip(1) {
                        for (j, &row) in sample_map.iter().enumerate() {
                            if codes[row] == Some(offset) {
                                columns[[j, col]] = 1.0;
                            }
                        }
                        names.push(format!("{}_{}_vs_{}", covariate.name, level, levels[0]));
                        indicator.push(true);
                        col += 1;
                    }
                }
            }
        }

        Self {
            columns,
            names,
            indicator,
            complete,
        }
    }

    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Whether every covariate is observed for feature-matrix column `j`.
    pub fn is_complete(&self, j: usize) -> bool {
        self.complete[j]
    }

    /// Assemble the design for one fit: the covariate block restricted to
    /// `rows`, followed by `feature` (already restricted to `rows`) as the
    /// last column. Indicator columns that are constant on `rows` are left
    /// out, since a level with no (or all) observations carries no contrast.
    pub fn assemble(&self, rows: &[usize], feature: &[f64]) -> Array2<f64> {
        let kept: Vec<usize> = (0..self.n_columns())
            .filter(|&c| !self.indicator[c] || !is_constant(rows.iter().map(|&r| self.columns[[r, c]])))
            .collect();

        let mut x = Array2::zeros((rows.len(), kept.len() + 1));
        for (i, &r) in rows.iter().enumerate() {
            for (k, &c) in kept.iter().enumerate() {
                x[[i, k]] = self.columns[[r, c]];
            }
            x[[i, kept.len()]] = feature[i];
        }
        x
    }
}

fn is_constant<I: Iterator<Item = f64>>(mut values: I) -> bool {
    match values.next() {
        None => true,
        Some(first) => values.all(|v| v == first),
    }
}
