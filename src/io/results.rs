//! Run summaries printed at the end of a scan

use serde::{Deserialize, Serialize};

use crate::ranking::AdjustedResult;
use crate::scan::{FailureCounts, ModelKind, ScanOutcome};

/// Counts describing one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub model: ModelKind,
    pub total_features: usize,
    pub features_fitted: usize,
    pub failures: FailureCounts,
    pub not_run: usize,
    pub significant: usize,
    pub positive: usize,
    pub negative: usize,
    pub alpha: f64,
    pub interrupted: bool,
}

impl ScanSummary {
    /// Summarise `outcome` given its adjusted results; `alpha` is the padj cutoff.
    pub fn new(outcome: &ScanOutcome, adjusted: &[AdjustedResult], alpha: f64) -> Self {
        let significant: Vec<&AdjustedResult> = adjusted
            .iter()
            .filter(|r| r.padj.is_some_and(|q| q < alpha))
            .collect();
        let positive = significant
            .iter()
            .filter(|r| r.result.slope.is_some_and(|s| s > 0.0))
            .count();
        let negative = significant
            .iter()
            .filter(|r| r.result.slope.is_some_and(|s| s < 0.0))
            .count();

        Self {
            model: outcome.model,
            total_features: outcome.results.len() + outcome.not_run.len(),
            features_fitted: outcome.results.len() - outcome.failures.total(),
            failures: outcome.failures,
            not_run: outcome.not_run.len(),
            significant: significant.len(),
            positive,
            negative,
            alpha,
            interrupted: outcome.interrupted,
        }
    }
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (title, effect) = match self.model {
            ModelKind::LinearRegression => ("Linear Regression Scan Summary", "slope"),
            ModelKind::CoxPh => ("Cox Proportional Hazards Scan Summary", "log HR"),
        };
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(f, "Total features: {}", self.total_features)?;
        writeln!(f, "Features fitted: {}", self.features_fitted)?;
        writeln!(
            f,
            "Fit failures: {} (insufficient data {}, singular {}, not converged {})",
            self.failures.total(),
            self.failures.insufficient_data,
            self.failures.singular_fit,
            self.failures.not_converged
        )?;
        if self.interrupted {
            writeln!(f, "Interrupted: {} features not run", self.not_run)?;
        }
        writeln!(f, "Significant (padj < {}): {}", self.alpha, self.significant)?;
        writeln!(f, "  Positive {}: {}", effect, self.positive)?;
        writeln!(f, "  Negative {}: {}", effect, self.negative)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitFailure;
    use crate::scan::RegressionResult;

    #[test]
    fn test_summary_counts() {
        let ok = |id: &str, slope: f64, p: f64| RegressionResult {
            feature_id: id.to_string(),
            slope: Some(slope),
            std_error: Some(0.1),
            statistic: Some(slope / 0.1),
            pvalue: Some(p),
            n_obs: 20,
            failure: None,
        };
        let mut failures = FailureCounts::default();
        let failure = FitFailure::InsufficientData { usable: 2, required: 3 };
        failures.record(&failure);

        let outcome = ScanOutcome {
            model: ModelKind::LinearRegression,
            results: vec![
                ok("a", 1.2, 0.001),
                ok("b", -0.8, 0.002),
                ok("c", 0.1, 0.9),
                RegressionResult::from_fit("d", Err(failure)),
            ],
            failures,
            interrupted: true,
            not_run: vec!["e".to_string()],
        };
        let adjusted = crate::ranking::adjust_results(&outcome.results, crate::testing::AdjustMethod::BenjaminiHochberg);
        let summary = ScanSummary::new(&outcome, &adjusted, 0.05);

        assert_eq!(summary.total_features, 5);
        assert_eq!(summary.features_fitted, 3);
        assert_eq!(summary.significant, 2);
        assert_eq!(summary.positive, 1);
        assert_eq!(summary.negative, 1);

        let text = summary.to_string();
        assert!(text.contains("Interrupted: 1 features not run"));
        assert!(text.contains("Significant (padj < 0.05): 2"));
    }
}
