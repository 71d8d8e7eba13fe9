//! Run configuration
//!
//! Every tolerance and cutoff used by a run lives here so that a run is a pure
//! function of its inputs plus one `AnalysisConfig`. Nothing is read from the
//! environment.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::testing::AdjustMethod;

/// Handling of tied event times in the Cox partial likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieMethod {
    #[default]
    Efron,
    Breslow,
}

/// Parameters shared by the OLS and Cox per-feature scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Relative Cholesky pivot tolerance below which a design is treated as collinear.
    pub pivot_tol: f64,
    /// Maximum Newton-Raphson iterations for the Cox fit.
    pub max_iter: usize,
    /// Relative log partial likelihood change used as the Cox convergence criterion.
    pub tolerance: f64,
    /// Tie handling for the Cox fit.
    pub ties: TieMethod,
    /// Whole-run deadline in seconds. `None` disables the deadline.
    pub timeout_secs: Option<f64>,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            pivot_tol: 1e-10,
            max_iter: 20,
            tolerance: 1e-9,
            ties: TieMethod::Efron,
            timeout_secs: None,
        }
    }
}

/// Parameters for the overrepresentation test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentParams {
    /// Keep terms whose raw p-value is at most this.
    pub p_threshold: f64,
    /// Keep terms whose adjusted p-value is at most this.
    pub q_threshold: f64,
    /// Terms with fewer universe members than this are not tested.
    pub min_term_size: usize,
    /// Terms with more universe members than this are not tested.
    pub max_term_size: Option<usize>,
    pub adjust_method: AdjustMethod,
    /// Whole-run deadline in seconds. `None` disables the deadline.
    pub timeout_secs: Option<f64>,
}

impl Default for EnrichmentParams {
    fn default() -> Self {
        Self {
            p_threshold: 0.05,
            q_threshold: 0.2,
            min_term_size: 1,
            max_term_size: None,
            adjust_method: AdjustMethod::BenjaminiHochberg,
            timeout_secs: None,
        }
    }
}

/// Which side of the effect distribution a threshold selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// effect <= -|value|
    Negative,
    /// effect >= |value|
    Positive,
    /// |effect| >= |value|
    Absolute,
}

/// A named effect-size cutoff used to derive a foreground gene set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSpec {
    /// Name given to the resulting gene set.
    pub name: String,
    pub value: f64,
    pub direction: Direction,
    /// Optional additional requirement on the adjusted p-value.
    pub max_padj: Option<f64>,
}

impl Default for ThresholdSpec {
    fn default() -> Self {
        Self {
            name: "foreground".to_string(),
            value: 1.0,
            direction: Direction::Absolute,
            max_padj: None,
        }
    }
}

/// Complete configuration for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub scan: ScanParams,
    pub adjust_method: AdjustMethod,
    pub thresholds: Vec<ThresholdSpec>,
    pub enrichment: EnrichmentParams,
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"scan": {{"ties": "breslow"}}, "thresholds": [{{"name": "up", "value": 0.5, "direction": "positive"}}]}}"#
        )
        .unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.scan.ties, TieMethod::Breslow);
        assert_eq!(config.scan.max_iter, 20);
        assert_eq!(config.thresholds.len(), 1);
        assert_eq!(config.thresholds[0].direction, Direction::Positive);
        assert!(config.thresholds[0].max_padj.is_none());
        assert_eq!(config.enrichment.p_threshold, 0.05);
        assert_eq!(config.adjust_method, AdjustMethod::BenjaminiHochberg);
    }

    #[test]
    fn test_malformed_config_is_json_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();
        let err = AnalysisConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, crate::error::GenescanError::JsonError(_)));
    }
}
