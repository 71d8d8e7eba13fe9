//! Ordinary least squares fit of one feature against the outcome

use ndarray::{Array1, Array2, ArrayView1};

use super::design::CovariateDesign;
use super::linalg::{cholesky, cholesky_inverse, cholesky_solve, negligible_spread};
use crate::config::ScanParams;
use crate::error::FitFailure;
use crate::testing::student_t_two_sided;

/// Estimate for the feature term of one per-feature model.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFit {
    /// OLS slope or Cox log hazard ratio
    pub estimate: f64,
    pub std_error: f64,
    /// t (OLS) or Wald z (Cox)
    pub statistic: f64,
    pub pvalue: f64,
    /// Complete-case observations used
    pub n_obs: usize,
}

/// Coefficients of a full OLS fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Array1<f64>,
    pub standard_errors: Array1<f64>,
    pub residual_df: usize,
    pub rss: f64,
}

/// Solve the normal equations `X'X b = X'y` and derive coefficient standard errors.
pub fn ols(x: &Array2<f64>, y: &Array1<f64>, pivot_tol: f64) -> Result<OlsFit, FitFailure> {
    let (n, p) = x.dim();
    if n <= p {
        return Err(FitFailure::InsufficientData {
            usable: n,
            required: p + 1,
        });
    }

    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    let l = cholesky(&xtx, pivot_tol).ok_or_else(|| FitFailure::singular("design matrix is collinear"))?;

    let coefficients = cholesky_solve(&l, &xty);
    let residuals = y - &x.dot(&coefficients);
    let rss = residuals.dot(&residuals);
    let residual_df = n - p;
    let sigma2 = rss / residual_df as f64;

    let xtx_inv = cholesky_inverse(&l);
    let standard_errors = xtx_inv.diag().mapv(|v| (sigma2 * v).max(0.0).sqrt());

    Ok(OlsFit {
        coefficients,
        standard_errors,
        residual_df,
        rss,
    })
}

/// Fit `response ~ covariates + feature` on the complete cases of one feature.
///
/// `response` and `feature` are in feature-matrix sample order; `NaN` marks a
/// missing value.
pub fn fit_feature_ols(
    design: &CovariateDesign,
    response: &[f64],
    feature: ArrayView1<f64>,
    params: &ScanParams,
) -> Result<FeatureFit, FitFailure> {
    let rows: Vec<usize> = (0..feature.len())
        .filter(|&j| design.is_complete(j) && response[j].is_finite() && feature[j].is_finite())
        .collect();
    let n = rows.len();
    let values: Vec<f64> = rows.iter().map(|&j| feature[j]).collect();

    // width after empty levels are dropped, plus one residual degree of freedom
    let mut x = design.assemble(&rows, &values);
    let required = x.ncols() + 1;
    if n < required {
        return Err(FitFailure::InsufficientData { usable: n, required });
    }
    if negligible_spread(&values, params.pivot_tol) {
        return Err(FitFailure::singular("feature has zero variance"));
    }

    // Centering leaves the slope unchanged and keeps X'X well scaled
    let k = x.ncols() - 1;
    let mean = values.iter().sum::<f64>() / n as f64;
    x.column_mut(k).mapv_inplace(|v| v - mean);

    let y: Array1<f64> = rows.iter().map(|&j| response[j]).collect();
    let fit = ols(&x, &y, params.pivot_tol)?;

    let estimate = fit.coefficients[k];
    let std_error = fit.standard_errors[k];
    let statistic = if std_error > 0.0 {
        estimate / std_error
    } else if estimate == 0.0 {
        0.0
    } else {
        f64::INFINITY.copysign(estimate)
    };

    Ok(FeatureFit {
        estimate,
        std_error,
        statistic,
        pvalue: student_t_two_sided(statistic, fit.residual_df as f64),
        n_obs: n,
    })
}
