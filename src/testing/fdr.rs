//! P-value adjustment methods for multiple testing correction
//!
//! Currently implements:
//! - Benjamini-Hochberg (BH) FDR correction (default for scans and enrichment)
//! - Bonferroni family-wise error rate correction
//!
//! Undefined p-values (`None` / `NaN`) are excluded from the number of tests
//! and pass through as undefined.

use serde::{Deserialize, Serialize};

/// Multiple-testing correction applied to a sequence of p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdjustMethod {
    #[default]
    #[serde(rename = "BH", alias = "bh", alias = "fdr")]
    BenjaminiHochberg,
    #[serde(rename = "bonferroni")]
    Bonferroni,
    #[serde(rename = "none")]
    None,
}

impl std::str::FromStr for AdjustMethod {
    type Err = crate::error::GenescanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bh" | "fdr" | "benjamini-hochberg" => Ok(AdjustMethod::BenjaminiHochberg),
            "bonferroni" => Ok(AdjustMethod::Bonferroni),
            "none" => Ok(AdjustMethod::None),
            _ => Err(crate::error::GenescanError::InvalidInput {
                reason: format!("Unknown adjustment method '{}'. Use: BH, bonferroni, or none", s),
            }),
        }
    }
}

/// Adjust p-values, returning a vector aligned index-for-index with the input.
pub fn adjust(pvalues: &[Option<f64>], method: AdjustMethod) -> Vec<Option<f64>> {
    let raw: Vec<f64> = pvalues
        .iter()
        .map(|p| p.filter(|v| v.is_finite()).unwrap_or(f64::NAN))
        .collect();

    let adjusted = match method {
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg(&raw),
        AdjustMethod::Bonferroni => bonferroni(&raw),
        AdjustMethod::None => raw,
    };

    adjusted
        .into_iter()
        .map(|p| if p.is_nan() { None } else { Some(p) })
        .collect()
}

/// Apply Benjamini-Hochberg FDR correction to p-values
///
/// Returns adjusted p-values (q-values) that control the false discovery rate.
/// Sorting is stable, so tied p-values are ranked by original index.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut defined: Vec<usize> = (0..pvalues.len()).filter(|&i| pvalues[i].is_finite()).collect();
    defined.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let m = defined.len() as f64;
    let mut padj = vec![f64::NAN; pvalues.len()];

    // running minimum of p * m / rank, from the largest rank down
    let mut floor = 1.0_f64;
    for (rank, &i) in defined.iter().enumerate().rev() {
        floor = floor.min(pvalues[i] * m / (rank + 1) as f64).max(0.0);
        padj[i] = floor;
    }

    padj
}

/// Apply Bonferroni correction to p-values
///
/// Simple and conservative: multiplies each p-value by the number of tests.
/// Controls the family-wise error rate (FWER) rather than the FDR.
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; pvalues.len()];
    }
    pvalues
        .iter()
        .map(|&p| {
            if !p.is_finite() {
                f64::NAN
            } else {
                (p * m as f64).clamp(0.0, 1.0)
            }
        })
        .collect()
}
