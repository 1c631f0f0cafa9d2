use crate::PermsetError;
use std::fmt;
use std::str::FromStr;

/// How to resolve a quantile that falls between two sample points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Linear interpolation by the fractional part of the index
    #[default]
    Fraction,
    /// Take the point below
    Lower,
    /// Take the point above
    Higher,
}

impl FromStr for Interpolation {
    type Err = PermsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fraction" => Ok(Interpolation::Fraction),
            "lower" => Ok(Interpolation::Lower),
            "higher" => Ok(Interpolation::Higher),
            other => Err(PermsetError::InvalidArgument(format!(
                "interpolation method can only be 'fraction', 'lower' or 'higher', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interpolation::Fraction => "fraction",
            Interpolation::Lower => "lower",
            Interpolation::Higher => "higher",
        };
        f.write_str(s)
    }
}

fn lerp(a: f64, b: f64, fraction: f64) -> f64 {
    a + (b - a) * fraction
}

fn check_frac(frac: f64) -> Result<(), PermsetError> {
    if (0.0..=1.0).contains(&frac) {
        Ok(())
    } else {
        Err(PermsetError::InvalidArgument(format!(
            "quantile fraction {} is outside [0, 1]",
            frac
        )))
    }
}

fn pick(sorted: &[f64], frac: f64, method: Interpolation) -> f64 {
    let idx = frac * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    if idx.fract() == 0.0 {
        return sorted[lo];
    }
    match method {
        Interpolation::Fraction => lerp(sorted[lo], sorted[lo + 1], idx.fract()),
        Interpolation::Lower => sorted[lo],
        Interpolation::Higher => sorted[idx.ceil() as usize],
    }
}

/// Quantile of a slice that is already sorted ascending, with fractional
/// interpolation.
pub fn quantile_sorted(sorted: &[f64], frac: f64) -> Result<f64, PermsetError> {
    check_frac(frac)?;
    if sorted.is_empty() {
        return Err(PermsetError::InvalidArgument(
            "quantile of an empty sample".to_string(),
        ));
    }
    Ok(pick(sorted, frac, Interpolation::Fraction))
}

/// Exact quantile of an unsorted sample.
///
/// `limit` keeps only values inside the inclusive range before ranking.
pub fn quantile(
    values: &[f64],
    frac: f64,
    limit: Option<(f64, f64)>,
    method: Interpolation,
) -> Result<f64, PermsetError> {
    check_frac(frac)?;
    let mut sorted: Vec<f64> = match limit {
        Some((lo, hi)) => values
            .iter()
            .copied()
            .filter(|v| lo <= *v && *v <= hi)
            .collect(),
        None => values.to_vec(),
    };
    if sorted.is_empty() {
        return Err(PermsetError::InvalidArgument(
            "quantile of an empty sample".to_string(),
        ));
    }
    sorted.sort_by(f64::total_cmp);
    Ok(pick(&sorted, frac, method))
}

/// Piecewise-linear interpolation of `x` over points `(xp, fp)`.
///
/// `xp` must be non-decreasing. Values left of `xp[0]` return `left`
/// (default `fp[0]`), values right of the last point return `right`
/// (default last `fp`). Where `xp` repeats, the rightmost point wins.
pub fn interp(x: f64, xp: &[f64], fp: &[f64], left: Option<f64>, right: Option<f64>) -> f64 {
    assert_eq!(xp.len(), fp.len(), "xp and fp must have the same length");
    assert!(!xp.is_empty(), "interp needs at least one point");
    if x.is_nan() {
        return f64::NAN;
    }
    let last = xp.len() - 1;
    if x < xp[0] {
        return left.unwrap_or(fp[0]);
    }
    if x > xp[last] {
        return right.unwrap_or(fp[last]);
    }
    if x == xp[last] {
        return fp[last];
    }
    // xp[j] <= x < xp[j + 1]
    let j = xp.partition_point(|&v| v <= x) - 1;
    let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
    fp[j] + slope * (x - xp[j])
}

/// Normalized cumulative distribution of a histogram, with a leading zero
/// so that it lines up with the bin edges.
pub fn cumulative(counts: &[u64]) -> Vec<f64> {
    let total: u64 = counts.iter().sum();
    let mut cdf = Vec::with_capacity(counts.len() + 1);
    cdf.push(0.0);
    let mut running = 0u64;
    for &c in counts {
        running += c;
        cdf.push(if total == 0 { 0.0 } else { running as f64 / total as f64 });
    }
    cdf
}

/// Approximate quantile from histogram bin counts and their edges.
///
/// `edges` has one more entry than `counts`. Fractions outside the observed
/// cumulative range clamp to `left`/`right` (edge values when `None`).
///
/// # Panics
/// If `frac` is outside `[0, 1]` or the edge count does not match.
pub fn hist_quantile(
    counts: &[u64],
    edges: &[f64],
    frac: f64,
    left: Option<f64>,
    right: Option<f64>,
) -> f64 {
    assert!(frac >= 0.0, "frac {} < 0", frac);
    assert!(frac <= 1.0, "frac {} > 1", frac);
    assert_eq!(
        edges.len(),
        counts.len() + 1,
        "histogram needs one more edge than bins"
    );
    if counts.iter().all(|&c| c == 0) {
        return left.unwrap_or(edges[0]);
    }
    let cdf = cumulative(counts);
    interp(frac, &cdf, edges, left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_boundaries() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&a, 0.5, None, Interpolation::Fraction).unwrap(), 3.0);
        assert_eq!(quantile(&a, 0.0, None, Interpolation::Fraction).unwrap(), 1.0);
        assert_eq!(quantile(&a, 1.0, None, Interpolation::Fraction).unwrap(), 5.0);
    }

    #[test]
    fn test_quantile_sorts_input() {
        let a = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(quantile(&a, 0.25, None, Interpolation::Fraction).unwrap(), 2.0);
    }

    #[test]
    fn test_quantile_interpolation_modes() {
        let a = [10.0, 20.0, 30.0, 40.0];
        // idx = 0.5 * 3 = 1.5
        assert_eq!(quantile(&a, 0.5, None, Interpolation::Fraction).unwrap(), 25.0);
        assert_eq!(quantile(&a, 0.5, None, Interpolation::Lower).unwrap(), 20.0);
        assert_eq!(quantile(&a, 0.5, None, Interpolation::Higher).unwrap(), 30.0);
    }

    #[test]
    fn test_quantile_limit_filters_before_ranking() {
        let a = [-100.0, 1.0, 2.0, 3.0, 100.0];
        let q = quantile(&a, 1.0, Some((0.0, 3.0)), Interpolation::Fraction).unwrap();
        assert_eq!(q, 3.0);
        let q = quantile(&a, 0.0, Some((1.0, 1000.0)), Interpolation::Fraction).unwrap();
        assert_eq!(q, 1.0);
    }

    #[test]
    fn test_quantile_empty_after_limit() {
        let a = [1.0, 2.0];
        let err = quantile(&a, 0.5, Some((5.0, 6.0)), Interpolation::Fraction).unwrap_err();
        assert!(matches!(err, PermsetError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_interpolation_rejected() {
        let err = "nearest".parse::<Interpolation>().unwrap_err();
        assert!(matches!(err, PermsetError::InvalidArgument(_)));
        assert_eq!("higher".parse::<Interpolation>().unwrap(), Interpolation::Higher);
    }

    #[test]
    fn test_quantile_sorted_matches_quantile() {
        let a = [0.5, 1.5, 2.5, 9.0];
        for frac in [0.0, 0.1, 0.33, 0.5, 0.9, 1.0] {
            assert_eq!(
                quantile_sorted(&a, frac).unwrap(),
                quantile(&a, frac, None, Interpolation::Fraction).unwrap()
            );
        }
    }

    #[test]
    fn test_interp_clamps_and_interpolates() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [10.0, 20.0, 40.0];
        assert_eq!(interp(0.5, &xp, &fp, None, None), 15.0);
        assert_eq!(interp(1.5, &xp, &fp, None, None), 30.0);
        assert_eq!(interp(-1.0, &xp, &fp, None, None), 10.0);
        assert_eq!(interp(3.0, &xp, &fp, None, None), 40.0);
        assert_eq!(interp(-1.0, &xp, &fp, Some(-5.0), None), -5.0);
        assert_eq!(interp(3.0, &xp, &fp, None, Some(99.0)), 99.0);
        assert_eq!(interp(2.0, &xp, &fp, None, Some(99.0)), 40.0);
    }

    #[test]
    fn test_interp_repeated_points_use_rightmost() {
        let xp = [0.0, 0.0, 0.5, 1.0];
        let fp = [-1.0, -0.5, 0.0, 1.0];
        assert_eq!(interp(0.0, &xp, &fp, None, None), -0.5);
    }

    #[test]
    fn test_hist_quantile_uniform() {
        let counts = [10, 10, 10, 10];
        let edges = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(hist_quantile(&counts, &edges, 0.5, None, None), 2.0);
        assert_eq!(hist_quantile(&counts, &edges, 0.0, None, None), 0.0);
        assert_eq!(hist_quantile(&counts, &edges, 1.0, None, None), 4.0);
        assert!((hist_quantile(&counts, &edges, 0.125, None, None) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hist_quantile_skips_empty_leading_bins() {
        let counts = [0, 0, 5, 5];
        let edges = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(hist_quantile(&counts, &edges, 0.0, None, None), 2.0);
        assert_eq!(hist_quantile(&counts, &edges, 0.5, None, None), 3.0);
    }

    #[test]
    fn test_hist_quantile_monotone() {
        let counts = [3, 0, 7, 1, 0, 0, 12, 4];
        let edges: Vec<f64> = (0..=8).map(|i| -1.0 + 0.25 * i as f64).collect();
        let mut prev = f64::NEG_INFINITY;
        for i in 0..=1000 {
            let frac = i as f64 / 1000.0;
            let q = hist_quantile(&counts, &edges, frac, None, None);
            assert!(q >= prev, "frac {} gave {} after {}", frac, q, prev);
            prev = q;
        }
    }

    #[test]
    fn test_hist_quantile_empty_histogram() {
        let counts = [0, 0];
        let edges = [0.0, 1.0, 2.0];
        assert_eq!(hist_quantile(&counts, &edges, 0.3, None, None), 0.0);
        assert_eq!(hist_quantile(&counts, &edges, 0.3, Some(-7.0), None), -7.0);
    }

    #[test]
    #[should_panic]
    fn test_hist_quantile_rejects_out_of_range_frac() {
        hist_quantile(&[1, 1], &[0.0, 1.0, 2.0], 1.5, None, None);
    }
}
