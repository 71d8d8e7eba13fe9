//! rust_genescan: per-feature association scans and gene set enrichment
//!
//! Every row of a feature matrix (e.g. gene expression) is tested on its own
//! against a per-sample outcome, either by least squares or with a Cox
//! proportional hazards model. The results are adjusted for multiple testing,
//! ranked and thresholded into gene sets, which can then be tested for
//! overrepresentation in annotation terms (GO BP/MF/CC, KEGG).
//!
//! # Example
//!
//! ```ignore
//! use rust_genescan::prelude::*;
//!
//! let matrix = read_feature_matrix("expression.tsv")?;
//! let outcome = read_outcome_table("outcome.tsv", &["age:continuous".parse()?])?;
//!
//! let scanned = scan_survival(&outcome, &matrix, &["age"], &ScanParams::default(), &RunControl::new())?;
//! let adjusted = adjust_results(&scanned.results, AdjustMethod::BenjaminiHochberg);
//! let foreground = threshold(&adjusted, &ThresholdSpec::default());
//!
//! let universe = GeneSet::new("universe", matrix.feature_ids().iter().cloned());
//! let cache = AnnotationCache::new(read_annotations("go.tsv")?);
//! let enriched = run_enrichment(&foreground, &universe, &cache, "BP", &EnrichmentParams::default(), &RunControl::new())?;
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod enrichment;
pub mod error;
pub mod glm;
pub mod io;
pub mod ranking;
pub mod scan;
pub mod survival;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AnalysisConfig, Direction, EnrichmentParams, ScanParams, ThresholdSpec, TieMethod};
    pub use crate::data::{align_samples, FeatureMatrix, GeneSet, OutcomeRecord, OutcomeTable};
    pub use crate::enrichment::{
        run_enrichment, test_enrichment, AnnotationCache, AnnotationSource, AnnotationTerm, Category, CategoryFilter,
        EnrichmentOutcome, EnrichmentResult, InMemoryAnnotations,
    };
    pub use crate::error::{FitFailure, GenescanError, Result};
    pub use crate::io::{
        read_annotations, read_feature_matrix, read_gene_list, read_outcome_table, write_enrichment_results,
        write_gene_list, write_scan_results, CovariateSpec, ScanSummary,
    };
    pub use crate::ranking::{adjust_results, rank, threshold, AdjustedResult, RankBy};
    pub use crate::scan::{scan, scan_survival, ModelKind, RegressionResult, RunControl, ScanOutcome};
    pub use crate::testing::{adjust, AdjustMethod};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::array;

    fn sample_ids() -> Vec<String> {
        (1..=6).map(|i| format!("s{}", i)).collect()
    }

    #[test]
    fn test_scan_threshold_enrich_pipeline() {
        let matrix = FeatureMatrix::new(
            array![
                [0.5, 1.0, 1.5, 2.0, 2.5, 3.0],       // tracks the outcome
                [7.0, 7.0, 7.0, 7.0, 7.0, 7.0],       // constant
                [-0.5, -1.0, -1.5, -2.0, -2.5, -3.0], // anti-tracks the outcome
            ],
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            sample_ids(),
        )
        .unwrap();
        let outcome = OutcomeTable::new(
            sample_ids(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![Some(true); 6],
        )
        .unwrap();

        let scanned = scan(&outcome, &matrix, &[], &ScanParams::default(), &RunControl::new()).unwrap();
        assert_eq!(scanned.results.len(), 3);
        assert!((scanned.results[0].slope.unwrap() - 2.0).abs() < 1e-10);
        assert!((scanned.results[2].slope.unwrap() + 2.0).abs() < 1e-10);
        assert!(scanned.results[1].slope.is_none());
        assert!(matches!(scanned.results[1].failure, Some(FitFailure::SingularFit { .. })));

        let adjusted = adjust_results(&scanned.results, AdjustMethod::BenjaminiHochberg);
        assert!(adjusted[0].padj.unwrap() < 0.05);
        assert!(adjusted[2].padj.unwrap() < 0.05);
        assert!(adjusted[1].padj.is_none());

        let ranked = rank(&adjusted, RankBy::SignedEffect);
        let order: Vec<&str> = ranked.iter().map(|r| r.feature_id()).collect();
        assert_eq!(order, vec!["A", "C", "B"]);

        let spec = ThresholdSpec {
            name: "associated".to_string(),
            value: 1.0,
            direction: Direction::Absolute,
            max_padj: None,
        };
        let foreground = threshold(&adjusted, &spec);
        assert_eq!(foreground.iter().collect::<Vec<_>>(), vec!["A", "C"]);

        // universe of 40 features; one term holds both selected features
        let mut universe_ids: Vec<String> = (0..37).map(|i| format!("g{}", i)).collect();
        universe_ids.extend(["A", "B", "C"].iter().map(|s| s.to_string()));
        let universe = GeneSet::new("universe", universe_ids);

        let annotations = InMemoryAnnotations::new(vec![
            AnnotationTerm::new("GO:0001", "response", Category::BiologicalProcess, ["A", "C", "g1"]),
            AnnotationTerm::new("GO:0002", "housekeeping", Category::BiologicalProcess, ["B", "g2", "g3", "g4"]),
            AnnotationTerm::new("hsa00001", "pathway", Category::Kegg, ["A", "g5"]),
        ])
        .unwrap();
        let cache = AnnotationCache::new(annotations);

        let enriched = run_enrichment(
            &foreground,
            &universe,
            &cache,
            "BP",
            &EnrichmentParams::default(),
            &RunControl::new(),
        )
        .unwrap();

        assert_eq!(enriched.n_tested, 2);
        assert_eq!(enriched.results.len(), 1);
        let top = &enriched.results[0];
        assert_eq!(top.term_id, "GO:0001");
        assert_eq!(top.genes, vec!["A", "C"]);
        // P(X >= 2) with 40 / 3 / 2 = C(3,2) / C(40,2) = 3 / 780
        assert!((top.pvalue - 3.0 / 780.0).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_inputs_abort() {
        let matrix = FeatureMatrix::new(array![[1.0, 2.0, 3.0]], vec!["A".to_string()], vec![
            "s1".to_string(),
            "s2".to_string(),
            "s3".to_string(),
        ])
        .unwrap();
        let outcome = OutcomeTable::new(
            vec!["s1".to_string(), "s2".to_string(), "s4".to_string()],
            vec![1.0, 2.0, 3.0],
            vec![Some(true); 3],
        )
        .unwrap();

        match scan_survival(&outcome, &matrix, &[], &ScanParams::default(), &RunControl::new()) {
            Err(GenescanError::InputMismatch {
                only_in_matrix,
                only_in_outcome,
            }) => {
                assert_eq!(only_in_matrix, vec!["s3"]);
                assert_eq!(only_in_outcome, vec!["s4"]);
            }
            other => panic!("expected InputMismatch, got {:?}", other.map(|o| o.results.len())),
        }
    }
}
