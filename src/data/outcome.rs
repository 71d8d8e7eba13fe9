//! Per-sample outcome table: time-to-event, event indicator, typed covariates

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::feature_matrix::ensure_unique;
use crate::error::{GenescanError, Result};

/// One sample's outcome. `time` is `NaN` and `event` is `None` when missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub sample_id: String,
    pub time: f64,
    /// `Some(true)` = event observed, `Some(false)` = censored
    pub event: Option<bool>,
}

impl OutcomeRecord {
    pub fn new(sample_id: impl Into<String>, time: f64, event: Option<bool>) -> Self {
        Self {
            sample_id: sample_id.into(),
            time,
            event,
        }
    }
}

/// How a covariate enters the design. Declared by the caller, never inferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CovariateKind {
    /// Numeric values, `NaN` = missing. Contributes one design column.
    Continuous(Vec<f64>),
    /// Level index per sample, `None` = missing. The first level is the
    /// reference; each further level contributes one indicator column.
    Categorical { levels: Vec<String>, codes: Vec<Option<usize>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Covariate {
    pub name: String,
    pub kind: CovariateKind,
}

impl Covariate {
    /// Whether this covariate is missing for the sample at `row`.
    pub fn is_missing(&self, row: usize) -> bool {
        match &self.kind {
            CovariateKind::Continuous(values) => values[row].is_nan(),
            CovariateKind::Categorical { codes, .. } => codes[row].is_none(),
        }
    }

    /// Number of design columns contributed when every level is present.
    pub fn n_columns(&self) -> usize {
        match &self.kind {
            CovariateKind::Continuous(_) => 1,
            CovariateKind::Categorical { levels, .. } => levels.len().saturating_sub(1),
        }
    }
}

/// Outcome data for every sample, keyed by unique sample identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeTable {
    sample_ids: Vec<String>,
    times: Vec<f64>,
    events: Vec<Option<bool>>,
    covariates: BTreeMap<String, Covariate>,
}

impl OutcomeTable {
    /// Create an outcome table from column vectors.
    pub fn new(sample_ids: Vec<String>, times: Vec<f64>, events: Vec<Option<bool>>) -> Result<Self> {
        let n = sample_ids.len();
        if times.len() != n || events.len() != n {
            return Err(GenescanError::DimensionMismatch {
                expected: format!("{} times and events", n),
                got: format!("{} times, {} events", times.len(), events.len()),
            });
        }
        ensure_unique(&sample_ids, "sample")?;

        if times.iter().any(|t| t.is_infinite()) {
            return Err(GenescanError::InvalidInput {
                reason: "Outcome times must be finite or NaN (missing)".to_string(),
            });
        }

        Ok(Self {
            sample_ids,
            times,
            events,
            covariates: BTreeMap::new(),
        })
    }

    /// Create an outcome table from row records.
    pub fn from_records(records: Vec<OutcomeRecord>) -> Result<Self> {
        let mut sample_ids = Vec::with_capacity(records.len());
        let mut times = Vec::with_capacity(records.len());
        let mut events = Vec::with_capacity(records.len());
        for record in records {
            sample_ids.push(record.sample_id);
            times.push(record.time);
            events.push(record.event);
        }
        Self::new(sample_ids, times, events)
    }

    /// Add a continuous covariate column
    pub fn add_continuous(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.check_new_column(name, values.len())?;
        if values.iter().any(|v| v.is_infinite()) {
            return Err(GenescanError::InvalidInput {
                reason: format!("covariate '{}' has infinite values", name),
            });
        }
        self.covariates.insert(
            name.to_string(),
            Covariate {
                name: name.to_string(),
                kind: CovariateKind::Continuous(values),
            },
        );
        Ok(())
    }

    /// Add a categorical covariate with explicitly declared levels.
    /// `levels[0]` is the reference level.
    pub fn add_categorical(&mut self, name: &str, levels: Vec<String>, values: Vec<Option<String>>) -> Result<()> {
        self.check_new_column(name, values.len())?;
        if levels.is_empty() {
            return Err(GenescanError::InvalidInput {
                reason: format!("categorical covariate '{}' declares no levels", name),
            });
        }
        ensure_unique(&levels, "level")?;

        let codes = values
            .iter()
            .map(|value| match value {
                None => Ok(None),
                Some(v) => levels.iter().position(|l| l == v).map(Some).ok_or_else(|| {
                    GenescanError::InvalidInput {
                        reason: format!("value '{}' of covariate '{}' is not a declared level {:?}", v, name, levels),
                    }
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        self.covariates.insert(
            name.to_string(),
            Covariate {
                name: name.to_string(),
                kind: CovariateKind::Categorical { levels, codes },
            },
        );
        Ok(())
    }

    fn check_new_column(&self, name: &str, len: usize) -> Result<()> {
        if len != self.sample_ids.len() {
            return Err(GenescanError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", len),
            });
        }
        if self.covariates.contains_key(name) {
            return Err(GenescanError::DuplicateIdentifier {
                kind: "covariate".to_string(),
                id: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn events(&self) -> &[Option<bool>] {
        &self.events
    }

    pub fn record(&self, idx: usize) -> OutcomeRecord {
        OutcomeRecord {
            sample_id: self.sample_ids[idx].clone(),
            time: self.times[idx],
            event: self.events[idx],
        }
    }

    pub fn covariate(&self, name: &str) -> Option<&Covariate> {
        self.covariates.get(name)
    }

    pub fn covariate_names(&self) -> Vec<&str> {
        self.covariates.keys().map(|s| s.as_str()).collect()
    }

    /// Resolve covariate names to their columns, failing on the first unknown name.
    pub fn resolve_covariates(&self, names: &[&str]) -> Result<Vec<&Covariate>> {
        names
            .iter()
            .map(|name| {
                self.covariates.get(*name).ok_or_else(|| GenescanError::InvalidInput {
                    reason: format!("covariate '{}' not found in outcome table", name),
                })
            })
            .collect()
    }
}
