//! Binning of a series along X.
//!
//! Radial averaging switches between two reductions of the same binning:
//! `sum` (per-bin sums plus a count column, for Poisson errors) and the
//! `mean` family (per-bin means, optionally with per-bin spread).

use std::str::FromStr;

use crate::error::{Result, SasError};
use crate::math::grid::{bin_edges, Spacing};
use crate::series::{interp_linear, Role, Series};

/// Reduction applied per bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PruneMode {
    /// Mean of every column, weighted by `1/eY²` when errors are present.
    #[default]
    Mean,
    /// Mean plus one appended standard-deviation column per input column.
    #[value(name = "mean+std")]
    MeanStd,
    /// Sums of every column plus a count column; X is the bin mean.
    Sum,
    /// Plain mean with existing `eY` propagated as `√Σe² / N`.
    #[value(name = "mean+")]
    MeanPlus,
}

impl FromStr for PruneMode {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "mean+std" => Ok(Self::MeanStd),
            "sum" => Ok(Self::Sum),
            "mean+" => Ok(Self::MeanPlus),
            other => Err(SasError::config(format!(
                "unknown prune type '{other}' (expected mean, mean+std, sum or mean+)"
            ))),
        }
    }
}

/// Treatment of bins without points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EmptyFill {
    #[default]
    Remove,
    /// Every column set to the value, X set to the bin center.
    Value(f64),
    /// X set to the bin center, other columns interpolated from filled bins.
    Interp,
}

#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// Number of bins; `None` only restricts the X range.
    pub number: Option<usize>,
    pub kind: Spacing,
    pub mode: PruneMode,
    /// Weight means by `1/eY²` when the series has errors.
    pub weighted: bool,
    pub fill: EmptyFill,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            lower: None,
            upper: None,
            number: None,
            kind: Spacing::Lin,
            mode: PruneMode::Mean,
            weighted: true,
            fill: EmptyFill::Remove,
        }
    }
}

impl PruneOptions {
    pub fn bins(number: usize) -> Self {
        Self {
            number: Some(number),
            ..Self::default()
        }
    }

    pub fn lower(mut self, v: f64) -> Self {
        self.lower = Some(v);
        self
    }

    pub fn upper(mut self, v: f64) -> Self {
        self.upper = Some(v);
        self
    }

    pub fn kind(mut self, kind: Spacing) -> Self {
        self.kind = kind;
        self
    }

    pub fn mode(mut self, mode: PruneMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn fill(mut self, fill: EmptyFill) -> Self {
        self.fill = fill;
        self
    }

    pub fn unweighted(mut self) -> Self {
        self.weighted = false;
        self
    }
}

impl Series {
    /// Reduce the series to `number` bins along X between `lower` and `upper`.
    pub fn prune(&self, opts: &PruneOptions) -> Result<Series> {
        let col = self
            .role_index(Role::X)
            .ok_or_else(|| SasError::config("prune needs an X column"))?;
        if self.is_empty() {
            return Ok(self.clone());
        }
        let val = self.x();
        let data_min = val.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = val.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let valmin = opts.lower.map_or(data_min, |l| l.max(data_min));
        let valmax = opts.upper.map_or(data_max, |u| u.min(data_max));
        let selected = self.filter_rows(|i| val[i] >= valmin && val[i] <= valmax);

        let Some(number) = opts.number else {
            return Ok(selected);
        };
        if number == 0 {
            return Err(SasError::config("prune needs at least one bin"));
        }
        if selected.is_empty() {
            return Ok(selected);
        }

        let weights = selected.prune_weights(opts.weighted);
        let edges = bin_edges(valmin, valmax, number, opts.kind);
        let xs = selected.x();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); number];
        for (i, &v) in xs.iter().enumerate() {
            let b = edges.partition_point(|e| *e <= v).saturating_sub(1).min(number - 1);
            members[b].push(i);
        }
        let centers: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let nn = selected.ncols();

        let (mut out, extra_roles) = match opts.mode {
            PruneMode::Sum => (selected.bin_sums(&members, col), Vec::new()),
            PruneMode::Mean => (selected.bin_means(&members, weights.as_deref()), Vec::new()),
            PruneMode::MeanPlus if selected.ey().is_some() => (selected.bin_means_propagated(&members), Vec::new()),
            PruneMode::MeanStd | PruneMode::MeanPlus => {
                let mut cols = selected.bin_means(&members, weights.as_deref());
                cols.extend(selected.bin_stds(&members));
                let mut roles = Vec::new();
                if selected.ex().is_none() {
                    roles.push((Role::EX, col + nn));
                }
                if let (None, Some(iy)) = (selected.ey(), selected.role_index(Role::Y)) {
                    roles.push((Role::EY, iy + nn));
                }
                (cols, roles)
            }
        };

        let filled: Vec<bool> = members.iter().map(|m| !m.is_empty()).collect();
        fill_empty(&mut out, &filled, &centers, col, opts.fill);

        let with_std = !extra_roles.is_empty() || opts.mode == PruneMode::MeanStd;
        if with_std && out.len() > nn {
            interpolate_zero_errors(&mut out, col, nn);
        }

        let mut result = selected.rebuild(out);
        for (role, idx) in extra_roles {
            result.set_role(role, Some(idx))?;
        }
        Ok(result)
    }

    fn prune_weights(&self, weighted: bool) -> Option<Vec<f64>> {
        if !weighted {
            return None;
        }
        let ey = self.ey()?;
        if ey.iter().any(|&e| e == 0.0) {
            log::warn!("prune found zeros in eY; weights are ignored");
            return None;
        }
        Some(ey.iter().map(|e| 1.0 / (e * e)).collect())
    }

    fn bin_means(&self, members: &[Vec<usize>], weights: Option<&[f64]>) -> Vec<Vec<f64>> {
        let ey_index = self.role_index(Role::EY);
        let mut out: Vec<Vec<f64>> = vec![vec![0.0; members.len()]; self.ncols()];
        for (b, idx) in members.iter().enumerate() {
            if idx.is_empty() {
                continue;
            }
            let w: Vec<f64> = idx.iter().map(|&i| weights.map_or(1.0, |w| w[i])).collect();
            let wsum: f64 = w.iter().sum();
            for (c, column) in self.columns.iter().enumerate() {
                out[c][b] = idx.iter().zip(&w).map(|(&i, wi)| column[i] * wi).sum::<f64>() / wsum;
            }
            // Error of the weighted mean.
            if let (Some(_), Some(iey)) = (weights, ey_index) {
                if idx.len() > 1 {
                    out[iey][b] = (1.0 / (wsum * (idx.len() - 1) as f64)).sqrt();
                }
            }
        }
        out
    }

    fn bin_means_propagated(&self, members: &[Vec<usize>]) -> Vec<Vec<f64>> {
        let mut out = self.bin_means(members, None);
        if let Some(iey) = self.role_index(Role::EY) {
            let ey = &self.columns[iey];
            for (b, idx) in members.iter().enumerate() {
                if !idx.is_empty() {
                    let s2: f64 = idx.iter().map(|&i| ey[i] * ey[i]).sum();
                    out[iey][b] = s2.sqrt() / idx.len() as f64;
                }
            }
        }
        out
    }

    fn bin_stds(&self, members: &[Vec<usize>]) -> Vec<Vec<f64>> {
        let mut out: Vec<Vec<f64>> = vec![vec![0.0; members.len()]; self.ncols()];
        for (b, idx) in members.iter().enumerate() {
            if idx.len() < 2 {
                continue;
            }
            let n = idx.len() as f64;
            for (c, column) in self.columns.iter().enumerate() {
                let mean = idx.iter().map(|&i| column[i]).sum::<f64>() / n;
                let var = idx.iter().map(|&i| (column[i] - mean).powi(2)).sum::<f64>() / n;
                out[c][b] = var.sqrt();
            }
        }
        out
    }

    fn bin_sums(&self, members: &[Vec<usize>], col: usize) -> Vec<Vec<f64>> {
        let mut out: Vec<Vec<f64>> = vec![vec![0.0; members.len()]; self.ncols() + 1];
        let count_col = self.ncols();
        for (b, idx) in members.iter().enumerate() {
            if idx.is_empty() {
                continue;
            }
            for (c, column) in self.columns.iter().enumerate() {
                out[c][b] = idx.iter().map(|&i| column[i]).sum();
            }
            out[count_col][b] = idx.len() as f64;
            out[col][b] /= idx.len() as f64;
        }
        out
    }
}

fn fill_empty(out: &mut [Vec<f64>], filled: &[bool], centers: &[f64], col: usize, fill: EmptyFill) {
    if filled.iter().all(|f| *f) {
        return;
    }
    match fill {
        EmptyFill::Remove => {
            for column in out.iter_mut() {
                let kept: Vec<f64> = column
                    .iter()
                    .zip(filled)
                    .filter(|(_, f)| **f)
                    .map(|(v, _)| *v)
                    .collect();
                *column = kept;
            }
        }
        EmptyFill::Value(v) => {
            for (c, column) in out.iter_mut().enumerate() {
                for (b, f) in filled.iter().enumerate() {
                    if !f {
                        column[b] = if c == col { centers[b] } else { v };
                    }
                }
            }
        }
        EmptyFill::Interp => {
            let known_x: Vec<f64> = filled
                .iter()
                .enumerate()
                .filter(|(_, f)| **f)
                .map(|(b, _)| out[col][b])
                .collect();
            if known_x.is_empty() {
                return;
            }
            for (b, f) in filled.iter().enumerate() {
                if !f {
                    out[col][b] = centers[b];
                }
            }
            for c in 0..out.len() {
                if c == col {
                    continue;
                }
                let known_y: Vec<f64> = filled
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| **f)
                    .map(|(b, _)| out[c][b])
                    .collect();
                for (b, f) in filled.iter().enumerate() {
                    if !f {
                        out[c][b] = interp_linear(&known_x, &known_y, out[col][b]);
                    }
                }
            }
        }
    }
}

/// Bins holding a single point have zero spread; estimate it from the neighbours.
fn interpolate_zero_errors(out: &mut [Vec<f64>], col: usize, nn: usize) {
    let zero: Vec<bool> = out[nn + col].iter().map(|v| *v == 0.0).collect();
    if zero.iter().all(|z| *z) || !zero.iter().any(|z| *z) {
        return;
    }
    let known_x: Vec<f64> = out[col].iter().zip(&zero).filter(|(_, z)| !**z).map(|(v, _)| *v).collect();
    for c in nn..out.len() {
        let known: Vec<f64> = out[c].iter().zip(&zero).filter(|(_, z)| !**z).map(|(v, _)| *v).collect();
        for b in 0..zero.len() {
            if zero[b] {
                out[c][b] = interp_linear(&known_x, &known, out[col][b]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Series {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        Series::from_xy(x, y).unwrap()
    }

    #[test]
    fn mean_bins_average_values() {
        let p = ramp(10).prune(&PruneOptions::bins(5)).unwrap();
        assert_eq!(p.len(), 5);
        assert!((p.x()[0] - 0.5).abs() < 1e-12);
        assert!((p.y()[4] - 17.0).abs() < 1e-12);
    }

    #[test]
    fn sum_mode_counts_points() {
        let p = ramp(10).prune(&PruneOptions::bins(2).mode(PruneMode::Sum)).unwrap();
        assert_eq!(p.ncols(), 3);
        assert_eq!(p.column(2).unwrap(), &[5.0, 5.0]);
        // X is the bin mean, Y the bin sum
        assert!((p.x()[0] - 2.0).abs() < 1e-12);
        assert!((p.y()[0] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn mean_std_appends_error_columns() {
        let p = ramp(10).prune(&PruneOptions::bins(5).mode(PruneMode::MeanStd)).unwrap();
        assert_eq!(p.ncols(), 4);
        // population std of {2k, 2k+2} is 1
        assert!(p.ey().unwrap().iter().all(|e| (e - 1.0).abs() < 1e-12));
        assert_eq!(p.role_index(Role::EX), Some(2));
    }

    #[test]
    fn weighted_mean_uses_errors() {
        let s = Series::from_xye(vec![0.0, 0.1], vec![1.0, 3.0], vec![1.0, 0.5]).unwrap();
        let p = s.prune(&PruneOptions::bins(1)).unwrap();
        // weights 1 and 4
        assert!((p.y()[0] - 13.0 / 5.0).abs() < 1e-12);
        assert!((p.ey().unwrap()[0] - (1.0f64 / 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_bins_are_removed_or_filled() {
        let s = Series::from_xy(vec![0.0, 0.1, 3.9, 4.0], vec![1.0, 1.0, 5.0, 5.0]).unwrap();
        let removed = s.prune(&PruneOptions::bins(4)).unwrap();
        assert_eq!(removed.len(), 2);
        let filled = s.prune(&PruneOptions::bins(4).fill(EmptyFill::Interp)).unwrap();
        assert_eq!(filled.len(), 4);
        assert!((filled.x()[1] - 1.5).abs() < 1e-12);
        let value = s.prune(&PruneOptions::bins(4).fill(EmptyFill::Value(-1.0))).unwrap();
        assert_eq!(value.y()[2], -1.0);
    }

    #[test]
    fn range_only_without_number() {
        let p = ramp(10).prune(&PruneOptions::default().lower(2.0).upper(5.0)).unwrap();
        assert_eq!(p.x(), &[2.0, 3.0, 4.0, 5.0]);
    }
}
