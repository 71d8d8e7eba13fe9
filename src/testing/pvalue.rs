//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Two-sided p-value from a Wald z-statistic.
///
/// An infinite statistic (zero standard error around a non-zero estimate)
/// gives 0; NaN gives NaN.
pub fn normal_two_sided(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z.is_infinite() {
        return 0.0;
    }

    let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
    (2.0 * normal.cdf(-z.abs())).min(1.0)
}

/// Two-sided p-value from a t-statistic with `df` degrees of freedom.
pub fn student_t_two_sided(stat: f64, df: f64) -> f64 {
    if stat.is_nan() || !(df > 0.0) {
        return f64::NAN;
    }
    if stat.is_infinite() {
        return 0.0;
    }

    let t_dist = StudentsT::new(0.0, 1.0, df).expect("df checked positive");
    (2.0 * t_dist.cdf(-stat.abs())).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_symmetric() {
        let p1 = normal_two_sided(2.0);
        let p2 = normal_two_sided(-2.0);
        assert!((p1 - p2).abs() < 1e-10);
    }

    #[test]
    fn test_pvalue_range() {
        for z in [-3.0, -1.0, 0.0, 1.0, 3.0] {
            let p = normal_two_sided(z);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_pvalue_zero() {
        let p = normal_two_sided(0.0);
        assert!((p - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pvalue_known_normal() {
        // 2 * pnorm(-1.959964) = 0.05
        assert!((normal_two_sided(1.959963984540054) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_pvalue_infinite_and_nan() {
        assert_eq!(normal_two_sided(f64::INFINITY), 0.0);
        assert_eq!(student_t_two_sided(f64::NEG_INFINITY, 4.0), 0.0);
        assert!(normal_two_sided(f64::NAN).is_nan());
        assert!(student_t_two_sided(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_pvalue_t_distribution() {
        // With large df, t-distribution approaches normal
        let p_normal = normal_two_sided(2.0);
        let p_t_large = student_t_two_sided(2.0, 1000.0);
        assert!((p_normal - p_t_large).abs() < 0.001);

        // With small df, t-distribution gives larger p-values (more conservative)
        let p_t_small = student_t_two_sided(2.0, 3.0);
        assert!(p_t_small > p_normal);
    }
}
