//! Overrepresentation analysis of a foreground gene set against annotation terms
//!
//! Each term is tested with the hypergeometric upper tail: population is
//! the universe, successes are the term members inside the universe and
//! draws are the foreground. Raw p-values are corrected across all tested
//! terms before the significance cutoffs are applied.

mod annotations;
mod hypergeom;

pub use annotations::{AnnotationCache, AnnotationSource, AnnotationTerm, Category, CategoryFilter, InMemoryAnnotations};
pub use hypergeom::{upper_tail, UpperTail};

use std::cmp::Ordering;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EnrichmentParams;
use crate::data::GeneSet;
use crate::error::{GenescanError, Result};
use crate::scan::RunControl;
use crate::testing::adjust;

/// Test result for one annotation term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub term_id: String,
    pub description: String,
    pub category: Category,
    /// Foreground members annotated to the term
    pub overlap: usize,
    /// Universe members annotated to the term
    pub term_size: usize,
    pub foreground_size: usize,
    pub universe_size: usize,
    /// Overlap expected under random draws
    pub expected: f64,
    pub fold_enrichment: f64,
    pub pvalue: f64,
    pub ln_pvalue: f64,
    pub padj: f64,
    /// Contributing foreground identifiers, sorted
    pub genes: Vec<String>,
}

/// Everything one enrichment run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub filter: CategoryFilter,
    /// Significant terms, best first
    pub results: Vec<EnrichmentResult>,
    /// Terms that were tested (the multiple-testing family)
    pub n_tested: usize,
    pub interrupted: bool,
    /// Eligible terms never tested because of the interruption
    pub not_run: Vec<String>,
}

/// Test every eligible term in `terms` for overrepresentation in `foreground`.
///
/// `foreground` must be a subset of `universe`; otherwise the run fails with
/// the offending identifiers and nothing is tested.
pub fn test_enrichment(
    foreground: &GeneSet,
    universe: &GeneSet,
    terms: &[AnnotationTerm],
    filter: CategoryFilter,
    params: &EnrichmentParams,
    control: &RunControl,
) -> Result<EnrichmentOutcome> {
    let offending = foreground.missing_from(universe);
    if !offending.is_empty() {
        return Err(GenescanError::UniverseViolation { offending });
    }

    let min_size = params.min_term_size.max(1);
    let eligible: Vec<(&AnnotationTerm, usize)> = terms
        .iter()
        .filter(|t| filter.accepts(t.category))
        .map(|t| (t, t.features.iter().filter(|f| universe.contains(f)).count()))
        .filter(|&(_, size)| size >= min_size && params.max_term_size.map_or(true, |max| size <= max))
        .collect();

    info!(
        "Enrichment ({}): foreground {} / universe {}, {} of {} terms eligible",
        filter,
        foreground.len(),
        universe.len(),
        eligible.len(),
        terms.len()
    );

    let tested: Vec<Option<EnrichmentResult>> = eligible
        .par_iter()
        .map(|&(term, term_size)| {
            if control.is_interrupted() {
                None
            } else {
                Some(test_term(term, term_size, foreground, universe))
            }
        })
        .collect();

    let mut results = Vec::with_capacity(tested.len());
    let mut not_run = Vec::new();
    for ((term, _), outcome) in eligible.iter().zip(tested) {
        match outcome {
            Some(result) => results.push(result),
            None => not_run.push(term.id.clone()),
        }
    }
    let interrupted = !not_run.is_empty();
    if interrupted {
        warn!(
            "Enrichment interrupted: {} of {} terms tested",
            results.len(),
            eligible.len()
        );
    }

    let n_tested = results.len();
    let pvalues: Vec<Option<f64>> = results.iter().map(|r| Some(r.pvalue)).collect();
    for (result, padj) in results.iter_mut().zip(adjust(&pvalues, params.adjust_method)) {
        result.padj = padj.unwrap_or(1.0);
    }

    results.retain(|r| r.pvalue <= params.p_threshold && r.padj <= params.q_threshold);
    results.sort_by(compare_results);

    info!(
        "Enrichment complete: {} significant of {} tested (p <= {}, padj <= {})",
        results.len(),
        n_tested,
        params.p_threshold,
        params.q_threshold
    );

    Ok(EnrichmentOutcome {
        filter,
        results,
        n_tested,
        interrupted,
        not_run,
    })
}

/// Parse `category`, load its terms once through `cache` and test them.
pub fn run_enrichment(
    foreground: &GeneSet,
    universe: &GeneSet,
    cache: &AnnotationCache,
    category: &str,
    params: &EnrichmentParams,
    control: &RunControl,
) -> Result<EnrichmentOutcome> {
    let filter: CategoryFilter = category.parse()?;
    // reject before the annotation source is queried
    let offending = foreground.missing_from(universe);
    if !offending.is_empty() {
        return Err(GenescanError::UniverseViolation { offending });
    }
    let terms = cache.terms(filter, universe)?;
    test_enrichment(foreground, universe, &terms, filter, params, control)
}

fn test_term(term: &AnnotationTerm, term_size: usize, foreground: &GeneSet, universe: &GeneSet) -> EnrichmentResult {
    let genes: Vec<String> = foreground.intersect(&term.features).into_iter().collect();
    let overlap = genes.len();

    let tail = upper_tail(
        universe.len() as u64,
        term_size as u64,
        foreground.len() as u64,
        overlap as u64,
    );

    let expected = foreground.len() as f64 * term_size as f64 / universe.len() as f64;
    let fold_enrichment = if expected > 0.0 { overlap as f64 / expected } else { 0.0 };

    debug!(
        "Term {}: population {}, successes {}, draws {}, observed {}, p {:e}",
        term.id,
        universe.len(),
        term_size,
        foreground.len(),
        overlap,
        tail.pvalue
    );

    EnrichmentResult {
        term_id: term.id.clone(),
        description: term.description.clone(),
        category: term.category,
        overlap,
        term_size,
        foreground_size: foreground.len(),
        universe_size: universe.len(),
        expected,
        fold_enrichment,
        pvalue: tail.pvalue,
        ln_pvalue: tail.ln_pvalue,
        padj: 1.0,
        genes,
    }
}

fn compare_results(a: &EnrichmentResult, b: &EnrichmentResult) -> Ordering {
    a.padj
        .total_cmp(&b.padj)
        .then_with(|| b.overlap.cmp(&a.overlap))
        .then_with(|| a.term_id.cmp(&b.term_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("{}{}", prefix, i)).collect()
    }

    // universe g0..g99; term A = g0..g19 holds the whole foreground g0..g9,
    // term B = g8..g27 overlaps it in two
    fn fixture() -> (GeneSet, GeneSet, Vec<AnnotationTerm>) {
        let universe = GeneSet::new("universe", ids("g", 0..100));
        let foreground = GeneSet::new("foreground", ids("g", 0..10));
        let terms = vec![
            AnnotationTerm::new("T:A", "strong", Category::BiologicalProcess, ids("g", 0..20)),
            AnnotationTerm::new("T:B", "weak", Category::BiologicalProcess, ids("g", 8..28)),
            AnnotationTerm::new("T:C", "none", Category::MolecularFunction, ids("g", 50..70)),
            AnnotationTerm::new("T:D", "outside", Category::Kegg, ids("z", 0..5)),
        ];
        (foreground, universe, terms)
    }

    fn permissive() -> EnrichmentParams {
        EnrichmentParams {
            p_threshold: 1.0,
            q_threshold: 1.0,
            ..EnrichmentParams::default()
        }
    }

    #[test]
    fn test_full_overlap_beats_partial() {
        let (fg, universe, terms) = fixture();
        let outcome =
            test_enrichment(&fg, &universe, &terms, CategoryFilter::All, &permissive(), &RunControl::new()).unwrap();

        // T:D has no universe members and is never tested
        assert_eq!(outcome.n_tested, 3);
        let a = outcome.results.iter().find(|r| r.term_id == "T:A").unwrap();
        let b = outcome.results.iter().find(|r| r.term_id == "T:B").unwrap();
        let c = outcome.results.iter().find(|r| r.term_id == "T:C").unwrap();

        assert_eq!(a.overlap, 10);
        assert_eq!(b.overlap, 2);
        assert_eq!(b.genes, vec!["g8", "g9"]);
        assert!(a.pvalue < b.pvalue);
        assert!((a.pvalue - 1.0673177187555404e-8).abs() < 1e-15);
        assert!((a.expected - 2.0).abs() < 1e-12);
        assert!((a.fold_enrichment - 5.0).abs() < 1e-12);

        assert_eq!(c.overlap, 0);
        assert_eq!(c.pvalue, 1.0);

        assert_eq!(outcome.results[0].term_id, "T:A");
        assert!(!outcome.interrupted);
    }

    #[test]
    fn test_equal_padj_ordered_by_overlap_then_id() {
        // the last four terms all have p = 1 (overlap forced or zero), so
        // their adjusted values tie at 1.0 whatever their overlap
        let universe = GeneSet::new("universe", ids("g", 0..10));
        let foreground = GeneSet::new("foreground", ids("g", 0..3));
        let mut half = ids("g", 3..10);
        half.push("g0".to_string());
        let terms = vec![
            AnnotationTerm::new("T:b", "disjoint", Category::BiologicalProcess, ids("g", 5..10)),
            AnnotationTerm::new("T:c", "one hit", Category::BiologicalProcess, half),
            AnnotationTerm::new("T:a", "disjoint", Category::BiologicalProcess, ids("g", 6..9)),
            AnnotationTerm::new("T:d", "everything", Category::BiologicalProcess, ids("g", 0..10)),
            AnnotationTerm::new("T:x", "exact", Category::BiologicalProcess, ids("g", 0..3)),
        ];

        let outcome = test_enrichment(
            &foreground,
            &universe,
            &terms,
            CategoryFilter::All,
            &permissive(),
            &RunControl::new(),
        )
        .unwrap();

        let order: Vec<(&str, usize)> = outcome.results.iter().map(|r| (r.term_id.as_str(), r.overlap)).collect();
        assert_eq!(
            order,
            vec![("T:x", 3), ("T:d", 3), ("T:c", 1), ("T:a", 0), ("T:b", 0)]
        );
        assert!(outcome.results[1..].iter().all(|r| r.padj == 1.0));
        assert!((outcome.results[0].pvalue - 1.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_cutoffs_keep_significant_terms() {
        let (fg, universe, terms) = fixture();
        let outcome = test_enrichment(
            &fg,
            &universe,
            &terms,
            CategoryFilter::All,
            &EnrichmentParams::default(),
            &RunControl::new(),
        )
        .unwrap();
        let kept: Vec<&str> = outcome.results.iter().map(|r| r.term_id.as_str()).collect();
        assert_eq!(kept, vec!["T:A"]);
        assert!((outcome.results[0].padj - 3.0 * 1.0673177187555404e-8).abs() < 1e-14);
    }

    #[test]
    fn test_category_filter() {
        let (fg, universe, terms) = fixture();
        let outcome = test_enrichment(
            &fg,
            &universe,
            &terms,
            CategoryFilter::Only(Category::MolecularFunction),
            &permissive(),
            &RunControl::new(),
        )
        .unwrap();
        assert_eq!(outcome.n_tested, 1);
        assert_eq!(outcome.results[0].term_id, "T:C");
    }

    #[test]
    fn test_universe_violation() {
        let (_, universe, terms) = fixture();
        let fg = GeneSet::new("fg", ["g1", "q2", "q1"]);
        let err = test_enrichment(&fg, &universe, &terms, CategoryFilter::All, &permissive(), &RunControl::new())
            .unwrap_err();
        match err {
            GenescanError::UniverseViolation { offending } => assert_eq!(offending, vec!["q1", "q2"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_min_term_size() {
        let (fg, universe, terms) = fixture();
        let params = EnrichmentParams {
            min_term_size: 21,
            ..permissive()
        };
        let outcome =
            test_enrichment(&fg, &universe, &terms, CategoryFilter::All, &params, &RunControl::new()).unwrap();
        assert_eq!(outcome.n_tested, 0);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let (fg, universe, terms) = fixture();
        let run = || {
            test_enrichment(&fg, &universe, &terms, CategoryFilter::All, &permissive(), &RunControl::new())
                .unwrap()
                .results
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cancelled_run() {
        let (fg, universe, terms) = fixture();
        let control = RunControl::new();
        control.cancel();
        let outcome = test_enrichment(&fg, &universe, &terms, CategoryFilter::All, &permissive(), &control).unwrap();
        assert!(outcome.interrupted);
        assert_eq!(outcome.n_tested, 0);
        assert_eq!(outcome.not_run, vec!["T:A", "T:B", "T:C"]);
    }

    #[test]
    fn test_run_enrichment_through_cache() {
        let (fg, universe, terms) = fixture();
        let cache = AnnotationCache::new(InMemoryAnnotations::new(terms).unwrap());

        let outcome = run_enrichment(&fg, &universe, &cache, "bp", &permissive(), &RunControl::new()).unwrap();
        assert_eq!(outcome.filter, CategoryFilter::Only(Category::BiologicalProcess));
        assert_eq!(outcome.n_tested, 2);

        run_enrichment(&fg, &universe, &cache, "BP", &permissive(), &RunControl::new()).unwrap();
        assert_eq!(cache.len(), 1);

        let err = run_enrichment(&fg, &universe, &cache, "GO", &permissive(), &RunControl::new()).unwrap_err();
        assert!(matches!(err, GenescanError::UnsupportedCategory { .. }));
    }

    #[test]
    fn test_run_enrichment_rejects_foreground_before_lookup() {
        let (_, universe, terms) = fixture();
        let cache = AnnotationCache::new(InMemoryAnnotations::new(terms).unwrap());
        let fg = GeneSet::new("foreground", ["g1", "q7"]);

        let err = run_enrichment(&fg, &universe, &cache, "BP", &permissive(), &RunControl::new()).unwrap_err();
        assert!(matches!(err, GenescanError::UniverseViolation { ref offending } if offending == &vec!["q7".to_string()]));
        assert!(cache.is_empty());
    }
}
