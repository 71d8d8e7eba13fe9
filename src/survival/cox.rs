//! Cox partial likelihood, fitted by Newton-Raphson with step halving
//!
//! Risk-set sums are accumulated in one pass over samples sorted by
//! descending time, so each likelihood evaluation is O(n p^2). Tied event
//! times use Efron's approximation unless Breslow is requested.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::config::{ScanParams, TieMethod};
use crate::error::FitFailure;
use crate::glm::linalg::{cholesky, cholesky_inverse, cholesky_solve, negligible_spread};
use crate::glm::{CovariateDesign, FeatureFit};
use crate::testing::normal_two_sided;

const MAX_STEP_HALVINGS: usize = 30;

/// Result of a full Cox fit.
#[derive(Debug, Clone)]
pub struct CoxFit {
    /// Log hazard ratios, one per design column
    pub coefficients: Array1<f64>,
    pub standard_errors: Array1<f64>,
    pub log_likelihood: f64,
    /// Log partial likelihood at beta = 0
    pub null_log_likelihood: f64,
    pub iterations: usize,
}

/// Log partial likelihood, score vector and observed information.
struct Derivatives {
    loglik: f64,
    score: Array1<f64>,
    information: Array2<f64>,
}

/// Samples sorted by descending time plus the data needed per evaluation.
struct RiskData<'a> {
    x: Array2<f64>,
    times: &'a [f64],
    events: &'a [bool],
    order: Vec<usize>,
    ties: TieMethod,
}

impl<'a> RiskData<'a> {
    fn new(x: &Array2<f64>, times: &'a [f64], events: &'a [bool], ties: TieMethod) -> Self {
        // centring leaves the coefficients unchanged and keeps exp() in range
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let x = x - &means;

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[b].total_cmp(&times[a]).then(a.cmp(&b)));

        Self {
            x,
            times,
            events,
            order,
            ties,
        }
    }

    fn derivatives(&self, beta: &Array1<f64>) -> Derivatives {
        let p = self.x.ncols();
        let eta = self.x.dot(beta);
        let shift = eta.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let shift = if shift.is_finite() { shift } else { 0.0 };
        let w = eta.mapv(|e| (e - shift).exp());

        let mut loglik = 0.0;
        let mut score = Array1::<f64>::zeros(p);
        let mut information = Array2::<f64>::zeros((p, p));

        // running sums over the risk set
        let mut s0 = 0.0;
        let mut s1 = Array1::<f64>::zeros(p);
        let mut s2 = Array2::<f64>::zeros((p, p));

        let n = self.order.len();
        let mut i = 0;
        while i < n {
            let t = self.times[self.order[i]];

            // tied-event sums at this time
            let mut d = 0usize;
            let mut d0 = 0.0;
            let mut d1 = Array1::<f64>::zeros(p);
            let mut d2 = Array2::<f64>::zeros((p, p));

            let mut j = i;
            while j < n && self.times[self.order[j]] == t {
                let k = self.order[j];
                let xk = self.x.row(k);
                let wk = w[k];

                s0 += wk;
                s1.scaled_add(wk, &xk);
                add_outer(&mut s2, wk, xk);

                if self.events[k] {
                    d += 1;
                    d0 += wk;
                    d1.scaled_add(wk, &xk);
                    add_outer(&mut d2, wk, xk);
                    loglik += eta[k];
                    score += &xk;
                }
                j += 1;
            }

            for l in 0..d {
                let frac = match self.ties {
                    TieMethod::Efron => l as f64 / d as f64,
                    TieMethod::Breslow => 0.0,
                };
                let a0 = s0 - frac * d0;
                let a1 = &s1 - &(&d1 * frac);
                let a2 = &s2 - &(&d2 * frac);

                loglik -= a0.ln() + shift;
                let mean = &a1 / a0;
                score -= &mean;
                for r in 0..p {
                    for c in 0..p {
                        information[[r, c]] += a2[[r, c]] / a0 - mean[r] * mean[c];
                    }
                }
            }

            i = j;
        }

        Derivatives {
            loglik,
            score,
            information,
        }
    }
}

fn add_outer(acc: &mut Array2<f64>, weight: f64, x: ArrayView1<f64>) {
    let p = x.len();
    for r in 0..p {
        for c in 0..p {
            acc[[r, c]] += weight * x[r] * x[c];
        }
    }
}

fn converged(old: f64, new: f64, tol: f64) -> bool {
    if new == 0.0 {
        (new - old).abs() <= tol
    } else {
        (1.0 - old / new).abs() <= tol
    }
}

/// Log likelihood after a (possibly halved) Newton step, relative to the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Improved,
    /// Lower, but within the convergence tolerance
    Stalled,
    Worse,
}

fn classify_step(old: f64, new: f64, tol: f64) -> Step {
    if new >= old {
        Step::Improved
    } else if converged(old, new, tol) {
        Step::Stalled
    } else {
        Step::Worse
    }
}

/// Fit a Cox proportional hazards model.
///
/// `x` holds one row per sample and no intercept column. Convergence is a
/// relative change in log partial likelihood of at most `params.tolerance`.
pub fn cox_ph(x: &Array2<f64>, times: &[f64], events: &[bool], params: &ScanParams) -> Result<CoxFit, FitFailure> {
    let (n, p) = x.dim();
    let n_events = events.iter().filter(|&&e| e).count();
    if n_events == 0 {
        return Err(FitFailure::InsufficientData { usable: 0, required: 1 });
    }
    if n <= p {
        return Err(FitFailure::InsufficientData {
            usable: n,
            required: p + 1,
        });
    }

    let data = RiskData::new(x, times, events, params.ties);

    let mut beta = Array1::<f64>::zeros(p);
    let mut current = data.derivatives(&beta);
    let null_log_likelihood = current.loglik;
    let mut iterations = 0;
    let mut done = false;

    while iterations < params.max_iter {
        iterations += 1;

        let l = cholesky(&current.information, params.pivot_tol)
            .ok_or_else(|| FitFailure::singular("information matrix is singular"))?;
        let step = cholesky_solve(&l, &current.score);

        let mut candidate = &beta + &step;
        let mut next = data.derivatives(&candidate);
        let mut halvings = 0;
        while (!next.loglik.is_finite() || next.loglik < current.loglik) && halvings < MAX_STEP_HALVINGS {
            candidate = (&candidate + &beta) / 2.0;
            next = data.derivatives(&candidate);
            halvings += 1;
        }

        if candidate.iter().any(|b| !b.is_finite()) || !next.loglik.is_finite() {
            return Err(FitFailure::NotConverged { iterations });
        }

        match classify_step(current.loglik, next.loglik, params.tolerance) {
            Step::Worse => return Err(FitFailure::NotConverged { iterations }),
            // the current estimate already sits at the maximum
            Step::Stalled => {
                done = true;
                break;
            }
            Step::Improved => {}
        }

        let old = current.loglik;
        beta = candidate;
        current = next;

        if converged(old, current.loglik, params.tolerance) {
            done = true;
            break;
        }
    }

    if !done {
        return Err(FitFailure::NotConverged { iterations });
    }

    let l = cholesky(&current.information, params.pivot_tol)
        .ok_or_else(|| FitFailure::singular("information matrix is singular at the estimate"))?;
    let variance = cholesky_inverse(&l);
    let standard_errors = variance.diag().mapv(|v| v.max(0.0).sqrt());

    Ok(CoxFit {
        coefficients: beta,
        standard_errors,
        log_likelihood: current.loglik,
        null_log_likelihood,
        iterations,
    })
}

/// Fit `Surv(time, event) ~ covariates + feature` on one feature's complete cases.
///
/// All slices are in feature-matrix sample order.
pub fn fit_feature_cox(
    design: &CovariateDesign,
    times: &[f64],
    events: &[Option<bool>],
    feature: ArrayView1<f64>,
    params: &ScanParams,
) -> Result<FeatureFit, FitFailure> {
    let rows: Vec<usize> = (0..feature.len())
        .filter(|&j| design.is_complete(j) && times[j].is_finite() && events[j].is_some() && feature[j].is_finite())
        .collect();
    let n = rows.len();
    let values: Vec<f64> = rows.iter().map(|&j| feature[j]).collect();

    let x = design.assemble(&rows, &values);
    let required = x.ncols() + 1;
    if n < required {
        return Err(FitFailure::InsufficientData { usable: n, required });
    }
    if negligible_spread(&values, params.pivot_tol) {
        return Err(FitFailure::singular("feature has zero variance"));
    }

    let t: Vec<f64> = rows.iter().map(|&j| times[j]).collect();
    let e: Vec<bool> = rows.iter().map(|&j| events[j].unwrap_or(false)).collect();

    let fit = cox_ph(&x, &t, &e, params)?;

    let k = x.ncols() - 1;
    let estimate = fit.coefficients[k];
    let std_error = fit.standard_errors[k];
    let statistic = if std_error > 0.0 { estimate / std_error } else { f64::NAN };
    if statistic.is_nan() {
        return Err(FitFailure::singular("zero variance for the feature coefficient"));
    }

    Ok(FeatureFit {
        estimate,
        std_error,
        statistic,
        pvalue: normal_two_sided(statistic),
        n_obs: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // small tied-time data set; reference values from a direct evaluation
    // of the partial likelihood at each distinct event time
    fn tied_data() -> (Array2<f64>, Vec<f64>, Vec<bool>) {
        let x = array![[0.0], [2.0], [1.0], [1.0], [1.0], [0.0], [0.0]];
        let times = vec![4.0, 3.0, 1.0, 1.0, 2.0, 2.0, 3.0];
        let events = vec![true, true, true, false, true, true, false];
        (x, times, events)
    }

    #[test]
    fn test_efron_ties() {
        let (x, times, events) = tied_data();
        let fit = cox_ph(&x, &times, &events, &ScanParams::default()).unwrap();

        assert!((fit.coefficients[0] - 0.4607776544).abs() < 1e-6);
        assert!((fit.standard_errors[0] - 0.5627995931).abs() < 1e-6);
        assert!((fit.log_likelihood - (-5.711785578305997)).abs() < 1e-8);
        assert!((fit.null_log_likelihood - (-6.040254711277414)).abs() < 1e-8);
    }

    #[test]
    fn test_breslow_ties() {
        let (x, times, events) = tied_data();
        let params = ScanParams {
            ties: TieMethod::Breslow,
            ..ScanParams::default()
        };
        let fit = cox_ph(&x, &times, &events, &params).unwrap();

        assert!((fit.coefficients[0] - 0.4838932721).abs() < 1e-6);
        assert!((fit.standard_errors[0] - 0.5712736610).abs() < 1e-6);
        assert!((fit.log_likelihood - (-5.911984689383804)).abs() < 1e-8);
    }

    #[test]
    fn test_methods_agree_without_ties() {
        let x = array![[0.5], [1.5], [-0.3], [2.0], [0.1], [1.1]];
        let times = vec![5.0, 1.0, 6.0, 2.0, 3.0, 4.0];
        let events = vec![true, true, false, true, true, true];

        let efron = cox_ph(&x, &times, &events, &ScanParams::default()).unwrap();
        let breslow = cox_ph(
            &x,
            &times,
            &events,
            &ScanParams {
                ties: TieMethod::Breslow,
                ..ScanParams::default()
            },
        )
        .unwrap();
        assert!((efron.coefficients[0] - breslow.coefficients[0]).abs() < 1e-10);
        // higher feature, earlier event
        assert!(efron.coefficients[0] > 0.0);
    }

    #[test]
    fn test_no_events() {
        let x = array![[1.0], [2.0], [3.0]];
        let err = cox_ph(&x, &[1.0, 2.0, 3.0], &[false, false, false], &ScanParams::default()).unwrap_err();
        assert!(matches!(err, FitFailure::InsufficientData { usable: 0, .. }));
    }

    #[test]
    fn test_feature_fit_complete_case() {
        let sample_map: Vec<usize> = (0..8).collect();
        let design = CovariateDesign::build(&[], &sample_map, false);
        let feature = array![0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 0.0, f64::NAN];
        let times = [4.0, 3.0, 1.0, 1.0, 2.0, 2.0, 3.0, 9.0];
        let events = [
            Some(true),
            Some(true),
            Some(true),
            Some(false),
            Some(true),
            Some(true),
            Some(false),
            Some(true),
        ];

        let fit = fit_feature_cox(&design, &times, &events, feature.view(), &ScanParams::default()).unwrap();
        assert_eq!(fit.n_obs, 7);
        assert!((fit.estimate - 0.4607776544).abs() < 1e-6);
        assert!((fit.pvalue - 0.4129437785).abs() < 1e-6);
    }

    #[test]
    fn test_constant_feature_is_singular() {
        let sample_map: Vec<usize> = (0..4).collect();
        let design = CovariateDesign::build(&[], &sample_map, false);
        let feature = array![1.0, 1.0, 1.0, 1.0];
        let err = fit_feature_cox(
            &design,
            &[1.0, 2.0, 3.0, 4.0],
            &[Some(true); 4],
            feature.view(),
            &ScanParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitFailure::SingularFit { .. }));
    }

    #[test]
    fn test_feature_constant_up_to_rounding_is_singular() {
        let sample_map: Vec<usize> = (0..6).collect();
        let design = CovariateDesign::build(&[], &sample_map, false);
        let feature = array![0.3, 0.1 + 0.2, 0.3, 0.1 + 0.2, 0.3, 0.1 + 0.2];
        let err = fit_feature_cox(
            &design,
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            &[Some(true); 6],
            feature.view(),
            &ScanParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitFailure::SingularFit { .. }));
    }

    #[test]
    fn test_absent_level_does_not_count_toward_required() {
        use crate::data::OutcomeTable;

        let ids: Vec<String> = (1..=3).map(|i| format!("s{}", i)).collect();
        let mut table = OutcomeTable::new(ids, vec![1.0, 2.0, 3.0], vec![Some(true); 3]).unwrap();
        table
            .add_categorical(
                "stage",
                vec!["I".to_string(), "II".to_string(), "III".to_string()],
                ["I", "I", "I"].iter().map(|s| Some(s.to_string())).collect(),
            )
            .unwrap();
        let covs = table.resolve_covariates(&["stage"]).unwrap();
        let design = CovariateDesign::build(&covs, &[0, 1, 2], false);
        assert_eq!(design.n_columns(), 2);

        // both stage indicators are constant, leaving the feature alone
        let feature = array![0.5, 1.0, 0.2];
        let fit = fit_feature_cox(&design, &[1.0, 2.0, 3.0], &[Some(true); 3], feature.view(), &ScanParams::default())
            .unwrap();
        assert_eq!(fit.n_obs, 3);

        let feature = array![0.5, f64::NAN, f64::NAN];
        let err = fit_feature_cox(&design, &[1.0, 2.0, 3.0], &[Some(true); 3], feature.view(), &ScanParams::default())
            .unwrap_err();
        assert_eq!(err, FitFailure::InsufficientData { usable: 1, required: 2 });
    }

    #[test]
    fn test_step_that_lowers_likelihood_is_not_accepted() {
        assert_eq!(classify_step(-5.0, -4.9, 1e-9), Step::Improved);
        assert_eq!(classify_step(-5.0, -5.0, 1e-9), Step::Improved);
        assert_eq!(classify_step(-5.0, -5.0 - 1e-12, 1e-9), Step::Stalled);
        assert_eq!(classify_step(-5.0, -5.1, 1e-9), Step::Worse);
    }
}
