//! Grid generation.
//!
//! Smearing extends q-ranges with logarithmically spaced points, pruning bins
//! data on linear or logarithmic intervals, and several models integrate over
//! fixed grids. All of them share these helpers.

use std::str::FromStr;

use crate::error::{Result, SasError};

/// Spacing of a grid or of binning intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
pub enum Spacing {
    #[default]
    Lin,
    Log,
}

impl FromStr for Spacing {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lin" | "linear" => Ok(Spacing::Lin),
            "log" | "logarithmic" => Ok(Spacing::Log),
            other => Err(SasError::config(format!("unknown spacing '{other}' (expected lin or log)"))),
        }
    }
}

/// `number` points between `min` and `max` (inclusive) with uniform spacing.
pub fn linspace(min: f64, max: f64, number: usize) -> Vec<f64> {
    match number {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (number as f64 - 1.0);
            (0..number).map(|i| min + step * i as f64).collect()
        }
    }
}

/// `number` log-spaced points between `min` and `max` (inclusive).
///
/// A zero lower bound is replaced by `1e-6`, a zero upper bound by `1` and a
/// zero count by `10`, so edge extensions starting at q = 0 still produce a grid.
pub fn loglist(min: f64, max: f64, number: usize) -> Vec<f64> {
    let lo = if min != 0.0 { min } else { 1e-6 };
    let hi = if max != 0.0 { max } else { 1.0 };
    let number = if number != 0 { number } else { 10 };
    linspace(lo.ln(), hi.ln(), number).into_iter().map(f64::exp).collect()
}

/// Validated log grid for user-facing ranges.
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(SasError::config(format!(
            "invalid range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(SasError::config("grid steps must be >= 2"));
    }
    Ok(loglist(min, max, steps))
}

/// Bin edges (`number + 1` values) covering `[min, max]`.
pub fn bin_edges(min: f64, max: f64, number: usize, spacing: Spacing) -> Vec<f64> {
    match spacing {
        Spacing::Lin => linspace(min, max, number + 1),
        Spacing::Log => loglist(min, max, number + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loglist_is_geometric_and_inclusive() {
        let g = loglist(0.1, 10.0, 3);
        assert_eq!(g.len(), 3);
        assert!((g[0] - 0.1).abs() < 1e-12);
        assert!((g[1] - 1.0).abs() < 1e-12);
        assert!((g[2] - 10.0).abs() < 1e-10);
    }

    #[test]
    fn loglist_replaces_zero_lower_bound() {
        let g = loglist(0.0, 1.0, 5);
        assert!((g[0] - 1e-6).abs() < 1e-18);
    }

    #[test]
    fn log_space_rejects_bad_range() {
        assert!(log_space(1.0, 0.5, 10).is_err());
        assert!(log_space(0.1, 1.0, 1).is_err());
    }

    #[test]
    fn spacing_parses_case_insensitively() {
        assert_eq!("LOG".parse::<Spacing>().unwrap(), Spacing::Log);
        assert!("cubic".parse::<Spacing>().is_err());
    }
}
