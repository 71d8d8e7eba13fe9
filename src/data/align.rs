//! Sample alignment between a feature matrix and an outcome table

use std::collections::HashMap;

use super::{FeatureMatrix, OutcomeTable};
use crate::error::{GenescanError, Result};

/// Map each matrix column to its outcome-table row by sample identifier.
///
/// The two identifier sets must be equal. Any identifier present on only one
/// side is reported in an `InputMismatch` error before any fitting starts.
pub fn align_samples(matrix: &FeatureMatrix, outcome: &OutcomeTable) -> Result<Vec<usize>> {
    let outcome_index: HashMap<&str, usize> = outcome
        .sample_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut only_in_matrix: Vec<String> = matrix
        .sample_ids()
        .iter()
        .filter(|id| !outcome_index.contains_key(id.as_str()))
        .cloned()
        .collect();

    let mut only_in_outcome: Vec<String> = outcome
        .sample_ids()
        .iter()
        .filter(|id| matrix.sample_index(id).is_none())
        .cloned()
        .collect();

    if !only_in_matrix.is_empty() || !only_in_outcome.is_empty() {
        only_in_matrix.sort();
        only_in_outcome.sort();
        return Err(GenescanError::InputMismatch {
            only_in_matrix,
            only_in_outcome,
        });
    }

    Ok(matrix
        .sample_ids()
        .iter()
        .map(|id| outcome_index[id.as_str()])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OutcomeRecord;
    use ndarray::array;

    fn matrix(samples: &[&str]) -> FeatureMatrix {
        FeatureMatrix::new(
            array![[1.0, 2.0, 3.0]],
            vec!["g1".to_string()],
            samples.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn outcome(samples: &[&str]) -> OutcomeTable {
        OutcomeTable::from_records(
            samples
                .iter()
                .enumerate()
                .map(|(i, s)| OutcomeRecord::new(*s, i as f64 + 1.0, Some(true)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_alignment_by_identifier_not_position() {
        let map = align_samples(&matrix(&["s3", "s1", "s2"]), &outcome(&["s1", "s2", "s3"])).unwrap();
        assert_eq!(map, vec![2, 0, 1]);
    }

    #[test]
    fn test_mismatch_reports_identifiers() {
        let err = align_samples(&matrix(&["s1", "s2", "s9"]), &outcome(&["s1", "s2", "s4"])).unwrap_err();
        match err {
            GenescanError::InputMismatch {
                only_in_matrix,
                only_in_outcome,
            } => {
                assert_eq!(only_in_matrix, vec!["s9".to_string()]);
                assert_eq!(only_in_outcome, vec!["s4".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extra_outcome_rows_rejected() {
        let result = align_samples(&matrix(&["s1", "s2", "s3"]), &outcome(&["s1", "s2", "s3", "s4"]));
        assert!(matches!(result, Err(GenescanError::InputMismatch { .. })));
    }
}
