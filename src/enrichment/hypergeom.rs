//! Hypergeometric upper tail in log space

use statrs::function::factorial::ln_binomial;

/// Upper tail `P(X >= k)` of a hypergeometric draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpperTail {
    /// `exp(ln_pvalue)`, floored at `f64::MIN_POSITIVE` when a positive tail underflows
    pub pvalue: f64,
    pub ln_pvalue: f64,
}

/// `P(X >= k)` for `X ~ Hypergeometric(population, successes, draws)`.
///
/// Terms are summed with log-sum-exp so very small tails keep an exact
/// logarithm even when their value is below the smallest f64.
pub fn upper_tail(population: u64, successes: u64, draws: u64, k: u64) -> UpperTail {
    let lower = (draws + successes).saturating_sub(population);
    let upper = successes.min(draws);

    if k <= lower {
        return UpperTail {
            pvalue: 1.0,
            ln_pvalue: 0.0,
        };
    }
    if k > upper {
        return UpperTail {
            pvalue: 0.0,
            ln_pvalue: f64::NEG_INFINITY,
        };
    }

    let ln_total = ln_binomial(population, draws);
    let terms: Vec<f64> = (k..=upper)
        .map(|i| ln_binomial(successes, i) + ln_binomial(population - successes, draws - i) - ln_total)
        .collect();

    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = terms.iter().map(|t| (t - max).exp()).sum();
    let ln_pvalue = (max + sum.ln()).min(0.0);

    let pvalue = ln_pvalue.exp();
    UpperTail {
        pvalue: if pvalue > 0.0 { pvalue } else { f64::MIN_POSITIVE },
        ln_pvalue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{DiscreteCDF, Hypergeometric};

    #[test]
    fn test_known_tails() {
        // all ten draws from a 20-member term out of 100
        let tail = upper_tail(100, 20, 10, 10);
        assert!((tail.pvalue - 1.0673177187555404e-8).abs() / 1.0673177187555404e-8 < 1e-9);

        let tail = upper_tail(100, 20, 10, 2);
        assert!((tail.pvalue - 0.6369505657923428).abs() < 1e-10);

        let tail = upper_tail(5, 2, 2, 1);
        assert!((tail.pvalue - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_matches_statrs_survival() {
        let hyper = Hypergeometric::new(100, 20, 10).unwrap();
        for k in 1..=10u64 {
            let expected = hyper.sf(k - 1);
            let tail = upper_tail(100, 20, 10, k);
            assert!(
                (tail.pvalue - expected).abs() < 1e-10,
                "k={}: {} vs {}",
                k,
                tail.pvalue,
                expected
            );
        }
    }

    #[test]
    fn test_zero_overlap_is_one() {
        let tail = upper_tail(100, 20, 10, 0);
        assert_eq!(tail.pvalue, 1.0);
        assert_eq!(tail.ln_pvalue, 0.0);
    }

    #[test]
    fn test_forced_overlap_is_one() {
        // 8 draws from 10 with 6 successes always include at least 4
        let tail = upper_tail(10, 6, 8, 4);
        assert_eq!(tail.pvalue, 1.0);
    }

    #[test]
    fn test_underflow_keeps_log() {
        let tail = upper_tail(20_000, 5_000, 5_000, 5_000);
        assert_eq!(tail.pvalue, f64::MIN_POSITIVE);
        assert!((tail.ln_pvalue - (-11241.669180227924)).abs() < 1e-6);
    }
}
