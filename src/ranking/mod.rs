//! Multiple-testing adjustment, ranking and effect-size thresholds over scan results

use std::cmp::Ordering;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{Direction, ThresholdSpec};
use crate::data::GeneSet;
use crate::scan::RegressionResult;
use crate::testing::{adjust, AdjustMethod};

/// A scan result together with its adjusted p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedResult {
    #[serde(flatten)]
    pub result: RegressionResult,
    pub padj: Option<f64>,
}

impl AdjustedResult {
    pub fn feature_id(&self) -> &str {
        &self.result.feature_id
    }
}

/// Attach adjusted p-values to scan results. Failed fits stay undefined and
/// do not count toward the number of tests.
pub fn adjust_results(results: &[RegressionResult], method: AdjustMethod) -> Vec<AdjustedResult> {
    let pvalues: Vec<Option<f64>> = results.iter().map(|r| r.pvalue).collect();
    let padj = adjust(&pvalues, method);

    results
        .iter()
        .cloned()
        .zip(padj)
        .map(|(result, padj)| AdjustedResult { result, padj })
        .collect()
}

/// Ordering key for [`rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Largest slope first
    SignedEffect,
    /// Largest |slope| first
    AbsoluteEffect,
    /// Smallest raw p-value first
    PValue,
    /// Smallest adjusted p-value first
    AdjustedPValue,
}

impl RankBy {
    fn key(self, r: &AdjustedResult) -> Option<f64> {
        match self {
            RankBy::SignedEffect => r.result.slope,
            RankBy::AbsoluteEffect => r.result.slope.map(f64::abs),
            RankBy::PValue => r.result.pvalue,
            RankBy::AdjustedPValue => r.padj,
        }
        .filter(|v| !v.is_nan())
    }

    fn descending(self) -> bool {
        matches!(self, RankBy::SignedEffect | RankBy::AbsoluteEffect)
    }
}

/// Sort results by `by`. Undefined values go last; ties keep input order.
pub fn rank(results: &[AdjustedResult], by: RankBy) -> Vec<AdjustedResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| match (by.key(a), by.key(b)) {
        (Some(x), Some(y)) => {
            if by.descending() {
                y.total_cmp(&x)
            } else {
                x.total_cmp(&y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranked
}

/// Select the features whose slope passes `spec`, as a named gene set.
pub fn threshold(results: &[AdjustedResult], spec: &ThresholdSpec) -> GeneSet {
    let cutoff = spec.value.abs();

    let selected = results.iter().filter(|r| {
        let Some(slope) = r.result.slope else {
            return false;
        };
        let passes_effect = match spec.direction {
            Direction::Negative => slope <= -cutoff,
            Direction::Positive => slope >= cutoff,
            Direction::Absolute => slope.abs() >= cutoff,
        };
        let passes_padj = match spec.max_padj {
            Some(max) => r.padj.is_some_and(|q| q <= max),
            None => true,
        };
        passes_effect && passes_padj
    });

    let set = GeneSet::new(spec.name.clone(), selected.map(|r| r.result.feature_id.clone()));
    info!(
        "Threshold '{}' ({:?} {}): {} of {} features selected",
        spec.name,
        spec.direction,
        cutoff,
        set.len(),
        results.len()
    );
    set
}
