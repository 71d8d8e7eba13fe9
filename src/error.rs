//! Error types for rust_genescan

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for scan and enrichment runs.
///
/// Every variant here is fatal for the run that raised it. Per-feature fit
/// problems are reported through [`FitFailure`] instead and never abort a scan.
#[derive(Error, Debug)]
pub enum GenescanError {
    #[error(
        "Sample identifiers do not correspond: only in matrix {only_in_matrix:?}, only in outcome table {only_in_outcome:?}"
    )]
    InputMismatch {
        only_in_matrix: Vec<String>,
        only_in_outcome: Vec<String>,
    },

    #[error("Foreground is not a subset of the universe: {offending:?}")]
    UniverseViolation { offending: Vec<String> },

    #[error("Unsupported annotation category '{name}' (expected one of BP, MF, CC, KEGG, ALL)")]
    UnsupportedCategory { name: String },

    #[error("Duplicate {kind} identifier '{id}'")]
    DuplicateIdentifier { kind: String, id: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for rust_genescan operations
pub type Result<T> = std::result::Result<T, GenescanError>;

/// Why a single feature's fit produced no estimate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitFailure {
    #[error("insufficient data: {usable} usable observations, {required} required")]
    InsufficientData { usable: usize, required: usize },

    #[error("singular fit: {reason}")]
    SingularFit { reason: String },

    #[error("fit did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

impl FitFailure {
    pub fn singular(reason: impl Into<String>) -> Self {
        Self::SingularFit {
            reason: reason.into(),
        }
    }
}
