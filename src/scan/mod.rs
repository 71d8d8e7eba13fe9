//! Batch per-feature association scans
//!
//! Each feature is fitted independently on the rayon pool. A fit that fails
//! (too few complete cases, zero variance, collinearity, divergence) is
//! recorded on that feature's result and the scan carries on; only input
//! preconditions such as sample identifier mismatches abort a run.

mod control;

pub use control::RunControl;

use log::{debug, info, warn};
use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ScanParams;
use crate::data::{align_samples, FeatureMatrix, OutcomeTable};
use crate::error::{FitFailure, Result};
use crate::glm::{fit_feature_ols, CovariateDesign, FeatureFit};
use crate::survival::fit_feature_cox;

/// Which per-feature model produced a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// `outcome ~ covariates + feature` by ordinary least squares
    LinearRegression,
    /// Cox proportional hazards on `(time, event)`
    CoxPh,
}

/// Association result for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub feature_id: String,
    /// Coefficient of the feature term: OLS slope or Cox log hazard ratio
    pub slope: Option<f64>,
    pub std_error: Option<f64>,
    /// t statistic (OLS) or Wald z (Cox)
    pub statistic: Option<f64>,
    pub pvalue: Option<f64>,
    /// Complete-case observations used by the fit (0 when it failed)
    pub n_obs: usize,
    pub failure: Option<FitFailure>,
}

impl RegressionResult {
    pub fn from_fit(feature_id: impl Into<String>, fit: std::result::Result<FeatureFit, FitFailure>) -> Self {
        let feature_id = feature_id.into();
        match fit {
            Ok(fit) => Self {
                feature_id,
                slope: Some(fit.estimate).filter(|v| v.is_finite()),
                std_error: Some(fit.std_error).filter(|v| v.is_finite()),
                statistic: Some(fit.statistic).filter(|v| !v.is_nan()),
                pvalue: Some(fit.pvalue).filter(|v| v.is_finite()),
                n_obs: fit.n_obs,
                failure: None,
            },
            Err(failure) => Self {
                feature_id,
                slope: None,
                std_error: None,
                statistic: None,
                pvalue: None,
                n_obs: 0,
                failure: Some(failure),
            },
        }
    }

    /// Hazard ratio for Cox results, `exp(slope)`.
    pub fn hazard_ratio(&self) -> Option<f64> {
        self.slope.map(f64::exp)
    }
}

/// Per-kind tally of features whose fit failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub insufficient_data: usize,
    pub singular_fit: usize,
    pub not_converged: usize,
}

impl FailureCounts {
    pub fn record(&mut self, failure: &FitFailure) {
        match failure {
            FitFailure::InsufficientData { .. } => self.insufficient_data += 1,
            FitFailure::SingularFit { .. } => self.singular_fit += 1,
            FitFailure::NotConverged { .. } => self.not_converged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.insufficient_data + self.singular_fit + self.not_converged
    }
}

/// Everything one scan produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub model: ModelKind,
    /// One entry per fitted feature, in feature-matrix row order
    pub results: Vec<RegressionResult>,
    pub failures: FailureCounts,
    /// The run was cancelled or hit its deadline before every feature was fitted
    pub interrupted: bool,
    /// Features never attempted because of the interruption
    pub not_run: Vec<String>,
}

/// Scan every feature with `time ~ covariates + feature` by OLS.
///
/// The outcome table's `time` column is the response. Covariates are looked
/// up by name in the outcome table and enter with their declared kind.
pub fn scan(
    outcome: &OutcomeTable,
    matrix: &FeatureMatrix,
    covariates: &[&str],
    params: &ScanParams,
    control: &RunControl,
) -> Result<ScanOutcome> {
    let sample_map = align_samples(matrix, outcome)?;
    let covs = outcome.resolve_covariates(covariates)?;
    let design = CovariateDesign::build(&covs, &sample_map, true);
    let response: Vec<f64> = sample_map.iter().map(|&r| outcome.times()[r]).collect();

    info!(
        "OLS scan: {} features x {} samples, design columns {:?} + feature",
        matrix.n_features(),
        matrix.n_samples(),
        design.column_names()
    );

    let fits = fit_all(matrix, control, |values| {
        fit_feature_ols(&design, &response, values, params)
    });

    Ok(assemble(ModelKind::LinearRegression, matrix, fits))
}

/// Scan every feature with a Cox proportional hazards model on `(time, event)`.
pub fn scan_survival(
    outcome: &OutcomeTable,
    matrix: &FeatureMatrix,
    covariates: &[&str],
    params: &ScanParams,
    control: &RunControl,
) -> Result<ScanOutcome> {
    let sample_map = align_samples(matrix, outcome)?;
    let covs = outcome.resolve_covariates(covariates)?;
    let design = CovariateDesign::build(&covs, &sample_map, false);
    let times: Vec<f64> = sample_map.iter().map(|&r| outcome.times()[r]).collect();
    let events: Vec<Option<bool>> = sample_map.iter().map(|&r| outcome.events()[r]).collect();

    let n_events = events.iter().filter(|e| **e == Some(true)).count();
    info!(
        "Cox scan: {} features x {} samples ({} events, {:?} ties), covariates {:?}",
        matrix.n_features(),
        matrix.n_samples(),
        n_events,
        params.ties,
        design.column_names()
    );

    let fits = fit_all(matrix, control, |values| {
        fit_feature_cox(&design, &times, &events, values, params)
    });

    Ok(assemble(ModelKind::CoxPh, matrix, fits))
}

type FitOutcome = std::result::Result<FeatureFit, FitFailure>;

fn fit_all<F>(matrix: &FeatureMatrix, control: &RunControl, fit: F) -> Vec<Option<FitOutcome>>
where
    F: Fn(ArrayView1<f64>) -> FitOutcome + Sync,
{
    (0..matrix.n_features())
        .into_par_iter()
        .map(|i| {
            if control.is_interrupted() {
                None
            } else {
                Some(fit(matrix.feature_values(i)))
            }
        })
        .collect()
}

fn assemble(model: ModelKind, matrix: &FeatureMatrix, fits: Vec<Option<FitOutcome>>) -> ScanOutcome {
    let mut results = Vec::with_capacity(fits.len());
    let mut failures = FailureCounts::default();
    let mut not_run = Vec::new();

    for (feature_id, fit) in matrix.feature_ids().iter().zip(fits) {
        match fit {
            None => not_run.push(feature_id.clone()),
            Some(fit) => {
                if let Err(failure) = &fit {
                    debug!("Feature {}: {}", feature_id, failure);
                    failures.record(failure);
                }
                results.push(RegressionResult::from_fit(feature_id.clone(), fit));
            }
        }
    }

    let interrupted = !not_run.is_empty();
    if interrupted {
        warn!(
            "Scan interrupted: {} of {} features fitted, {} not run",
            results.len(),
            matrix.n_features(),
            not_run.len()
        );
    }
    if failures.total() > 0 {
        warn!(
            "{} features could not be fitted ({} insufficient data, {} singular, {} not converged)",
            failures.total(),
            failures.insufficient_data,
            failures.singular_fit,
            failures.not_converged
        );
    }
    info!("Scan complete: {} results", results.len());

    ScanOutcome {
        model,
        results,
        failures,
        interrupted,
        not_run,
    }
}
