//! Feature matrix representation (features × samples)

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{GenescanError, Result};

/// Reject the first repeated identifier in `ids`.
pub(crate) fn ensure_unique(ids: &[String], kind: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(GenescanError::DuplicateIdentifier {
                kind: kind.to_string(),
                id: id.clone(),
            });
        }
    }
    Ok(())
}

/// A numeric matrix of measured features.
/// Rows are features (e.g. genes), columns are samples. Missing cells are `NaN`.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    values: Array2<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl FeatureMatrix {
    /// Create a new feature matrix.
    ///
    /// Identifiers must be unique along each axis. Cells may be `NaN` (missing)
    /// but not infinite.
    pub fn new(values: Array2<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_features, n_samples) = values.dim();

        if feature_ids.len() != n_features {
            return Err(GenescanError::DimensionMismatch {
                expected: format!("{} feature IDs", n_features),
                got: format!("{} feature IDs", feature_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(GenescanError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        ensure_unique(&feature_ids, "feature")?;
        ensure_unique(&sample_ids, "sample")?;

        if values.iter().any(|x| x.is_infinite()) {
            return Err(GenescanError::InvalidInput {
                reason: "Feature values must be finite or NaN (missing)".to_string(),
            });
        }

        let n_missing = values.iter().filter(|x| x.is_nan()).count();
        if n_missing > 0 {
            log::debug!("Feature matrix has {} missing cells", n_missing);
        }

        Ok(Self {
            values,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a matrix from `(feature_id, row)` pairs.
    pub fn from_rows(rows: Vec<(String, Vec<f64>)>, sample_ids: Vec<String>) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut feature_ids = Vec::with_capacity(rows.len());
        let mut flat = Vec::with_capacity(rows.len() * n_samples);

        for (id, row) in rows {
            if row.len() != n_samples {
                return Err(GenescanError::DimensionMismatch {
                    expected: format!("{} values for feature '{}'", n_samples, id),
                    got: format!("{} values", row.len()),
                });
            }
            feature_ids.push(id);
            flat.extend(row);
        }

        let values = Array2::from_shape_vec((feature_ids.len(), n_samples), flat).map_err(|e| {
            GenescanError::InvalidInput {
                reason: format!("could not shape feature matrix: {}", e),
            }
        })?;

        Self::new(values, feature_ids, sample_ids)
    }

    pub fn n_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Values of one feature across all samples
    pub fn feature_values(&self, feature_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(feature_idx)
    }

    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|id| id == feature_id)
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Keep only the listed features, in the given order.
    pub fn select_features(&self, feature_indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = feature_indices.iter().find(|&&i| i >= self.n_features()) {
            return Err(GenescanError::InvalidInput {
                reason: format!("feature index {} out of range ({} features)", bad, self.n_features()),
            });
        }
        if feature_indices.is_empty() {
            return Err(GenescanError::EmptyData {
                reason: "No features selected".to_string(),
            });
        }

        let values = self.values.select(Axis(0), feature_indices);
        let feature_ids = feature_indices
            .iter()
            .map(|&i| self.feature_ids[i].clone())
            .collect();

        Self::new(values, feature_ids, self.sample_ids.clone())
    }
}
