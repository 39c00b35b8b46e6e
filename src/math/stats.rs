//! Distribution functions needed for regression inference.
//!
//! Thin wrappers over `statrs` that return `NaN` instead of an error when the
//! degrees of freedom are unusable (an exactly-determined fit has none left).

use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

fn students_t(df: f64) -> Option<StudentsT> {
    if df.is_nan() || df <= 0.0 {
        return None;
    }
    StudentsT::new(0.0, 1.0, df).ok()
}

/// CDF of Student's t with `df` degrees of freedom.
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    match students_t(df) {
        Some(dist) if !t.is_nan() => dist.cdf(t),
        _ => f64::NAN,
    }
}

/// Two-sided p-value for a t statistic.
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    match students_t(df) {
        // sf on |t| keeps precision far in the tail.
        Some(dist) if !t.is_nan() => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        _ => f64::NAN,
    }
}

/// Quantile of Student's t (inverse CDF).
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    students_t(df).map_or(f64::NAN, |dist| dist.inverse_cdf(p))
}

/// Survival function `P(F > f)` of the F distribution with `(d1, d2)` dof.
pub fn f_survival(f: f64, d1: f64, d2: f64) -> f64 {
    if f.is_nan() || !(d1 > 0.0 && d2 > 0.0) {
        return f64::NAN;
    }
    if f <= 0.0 {
        return 1.0;
    }
    FisherSnedecor::new(d1, d2).map_or(f64::NAN, |dist| dist.sf(f).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_distribution_reference_values() {
        // t = 2.228 is the 97.5% point for df = 10.
        assert!((student_t_cdf(2.228, 10.0) - 0.975).abs() < 1e-3);
        assert!((student_t_cdf(0.0, 5.0) - 0.5).abs() < 1e-12);
        assert!((student_t_two_sided_p(2.228, 10.0) - 0.05).abs() < 1e-3);
        // df = 1 is Cauchy: cdf(1) = 0.75
        assert!((student_t_cdf(1.0, 1.0) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn large_dof_matches_the_normal_tail() {
        // County-day panels leave millions of residual dof.
        let df = 2e6;
        let p = student_t_two_sided_p(1.96, df);
        assert!((p - 0.049_996).abs() < 1e-5, "got {p}");
        let p = student_t_two_sided_p(5.0, df);
        assert!((p - 5.7330e-7).abs() < 1e-9, "got {p}");
        let q = student_t_quantile(0.975, df);
        assert!((q - 1.959_965).abs() < 1e-4, "got {q}");
    }

    #[test]
    fn t_quantile_inverts_cdf() {
        let q = student_t_quantile(0.975, 10.0);
        assert!((q - 2.228).abs() < 1e-3, "got {q}");
        assert!((student_t_cdf(q, 10.0) - 0.975).abs() < 1e-7);
    }

    #[test]
    fn unusable_dof_gives_nan() {
        assert!(student_t_two_sided_p(1.0, 0.0).is_nan());
        assert!(student_t_quantile(0.975, -1.0).is_nan());
        assert!(f_survival(2.0, 3.0, 0.0).is_nan());
    }

    #[test]
    fn f_survival_reference_values() {
        // F(1, d2) = t(d2)^2
        let p_t = student_t_two_sided_p(2.0, 12.0);
        let p_f = f_survival(4.0, 1.0, 12.0);
        assert!((p_t - p_f).abs() < 1e-9);
        assert_eq!(f_survival(0.0, 3.0, 10.0), 1.0);
    }
}
