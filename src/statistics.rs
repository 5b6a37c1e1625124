//! Diversity and divergence estimators.
//!
//! Pure formulas over aggregate counts. Estimators with no usable sites
//! return `0.0`; Tajima's D returns `NaN` whenever it is undefined.

/// Harmonic sum a1 = sum_{i=1}^{n-1} 1/i.
pub fn harmonic(sample_size: usize) -> f64 {
    (1..sample_size).map(|i| 1.0 / i as f64).sum()
}

/// Sum of squared reciprocals a2 = sum_{i=1}^{n-1} 1/i^2.
pub fn harmonic_sq(sample_size: usize) -> f64 {
    (1..sample_size).map(|i| 1.0 / (i as f64 * i as f64)).sum()
}

/// Jukes-Cantor correction of a proportion of differences.
///
/// Values outside `(0, 0.75)` are returned unchanged: the correction is
/// undefined at and beyond saturation.
pub fn correct_jc(p: f64) -> f64 {
    if !(p > 0.0 && p < 0.75) {
        return p;
    }
    -0.75 * (1.0 - 4.0 * p / 3.0).ln()
}

/// Scales a region-wide estimate to a per-site value, optionally
/// Jukes-Cantor corrected. `0.0` when there are no sites.
pub fn per_site(value: f64, sites: f64, jukes_cantor: bool) -> f64 {
    if sites <= 0.0 {
        return 0.0;
    }
    let p = value / sites;
    if jukes_cantor {
        correct_jc(p)
    } else {
        p
    }
}

/// Watterson's θ for a whole region: S / a1.
pub fn theta(segregating_sites: f64, sample_size: usize) -> f64 {
    if sample_size < 2 {
        return 0.0;
    }
    segregating_sites / harmonic(sample_size)
}

/// Watterson's θ per site, optionally Jukes-Cantor corrected.
pub fn theta_per_site(segregating_sites: f64, sample_size: usize, sites: f64, jukes_cantor: bool) -> f64 {
    per_site(theta(segregating_sites, sample_size), sites, jukes_cantor)
}

/// Nucleotide diversity π per site from summed mean pairwise differences.
pub fn pi(pairwise_differences: f64, sites: f64, jukes_cantor: bool) -> f64 {
    per_site(pairwise_differences, sites, jukes_cantor)
}

/// Divergence K per site from fixed differences against an outgroup.
pub fn divergence_k(differences: f64, sites: f64, jukes_cantor: bool) -> f64 {
    per_site(differences, sites, jukes_cantor)
}

/// Tajima's D from region-wide S and π (mean pairwise differences).
///
/// `NaN` when the sample has fewer than 4 sequences, there are no
/// segregating sites, or the variance is not positive.
pub fn tajima_d(sample_size: usize, segregating_sites: f64, pi: f64) -> f64 {
    if sample_size < 4 || !(segregating_sites > 0.0) {
        return f64::NAN;
    }

    let n = sample_size as f64;
    let s = segregating_sites;
    let a1 = harmonic(sample_size);
    let a2 = harmonic_sq(sample_size);

    let b1 = (n + 1.0) / (3.0 * (n - 1.0));
    let b2 = 2.0 * (n * n + n + 3.0) / (9.0 * n * (n - 1.0));

    let c1 = b1 - 1.0 / a1;
    let c2 = b2 - (n + 2.0) / (a1 * n) + a2 / (a1 * a1);

    let e1 = c1 / a1;
    let e2 = c2 / (a1 * a1 + a2);

    let var_d = e1 * s + e2 * s * (s - 1.0);
    if var_d <= 0.0 {
        return f64::NAN;
    }
    (pi - s / a1) / var_d.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harmonic() {
        assert_eq!(harmonic(1), 0.0);
        assert!((harmonic(4) - (1.0 + 0.5 + 1.0 / 3.0)).abs() < 1e-12);
        assert!((harmonic_sq(3) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_jukes_cantor_boundaries() {
        assert_eq!(correct_jc(0.75), 0.75);
        assert_eq!(correct_jc(0.9), 0.9);
        assert_eq!(correct_jc(-0.1), -0.1);
        assert_eq!(correct_jc(0.0), 0.0);
        assert!(correct_jc(0.3) > 0.3);
        assert!(correct_jc(f64::NAN).is_nan());
    }

    #[test]
    fn test_jukes_cantor_value() {
        // -3/4 ln(1 - 0.4) = 0.383119...
        assert!((correct_jc(0.3) - 0.383_119_5).abs() < 1e-6);
    }

    #[test]
    fn test_theta() {
        assert_eq!(theta(5.0, 1), 0.0);
        assert!((theta(6.0, 4) - 6.0 / (11.0 / 6.0)).abs() < 1e-12);
        assert!((theta_per_site(6.0, 4, 100.0, false) - 0.0327272727).abs() < 1e-9);
        assert_eq!(theta_per_site(6.0, 4, 0.0, true), 0.0);
        assert_eq!(per_site(theta(6.0, 4), 100.0, false), theta_per_site(6.0, 4, 100.0, false));
    }

    #[test]
    fn test_pi_and_k() {
        assert!((pi(3.0, 100.0, false) - 0.03).abs() < 1e-12);
        assert!(pi(3.0, 100.0, true) > 0.03);
        assert_eq!(pi(3.0, 0.0, false), 0.0);
        assert!((divergence_k(10.0, 50.0, false) - 0.2).abs() < 1e-12);
        assert_eq!(divergence_k(10.0, -1.0, true), 0.0);
    }

    #[test]
    fn test_tajima_d_undefined() {
        assert!(tajima_d(3, 5.0, 2.0).is_nan());
        assert!(tajima_d(20, 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_tajima_d_neutral() {
        // When pi equals theta_w, D is 0
        let n = 20;
        let s = 10.0;
        let d = tajima_d(n, s, s / harmonic(n));
        assert!(d.abs() < 1e-12, "d={}", d);
    }

    #[test]
    fn test_tajima_d_textbook() {
        // n=10, S=12, pi=3.5
        let d = tajima_d(10, 12.0, 3.5);
        assert!((d - (-0.79)).abs() < 0.01, "d={}", d);
        assert!(tajima_d(20, 5.0, 10.0) > 0.0);
    }
}
