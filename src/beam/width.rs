//! Primary-beam width from an empty-cell measurement.

use std::f64::consts::PI;

use crate::error::{Result, SasError};
use crate::math::levmar::{levenberg_marquardt, Bounds, LmOptions};
use crate::math::quadrature::simpson;
use crate::series::{Role, Series};

#[derive(Debug, Clone)]
pub struct BeamWidthFit {
    pub mean: f64,
    pub sigma: f64,
    pub background: f64,
    pub amplitude: f64,
    /// Half width at half maximum, usable as `bxw`.
    pub hwhm: f64,
    /// Model value at the fitted centre.
    pub peakmax: f64,
    /// The normalised primary-beam section that was fitted.
    pub profile: Series,
}

pub(crate) fn gauss(p: &[f64], x: f64) -> f64 {
    let (amplitude, mean, sigma, bgr) = (p[0], p[1], p[2], p[3]);
    amplitude * (-0.5 * ((x - mean) / sigma).powi(2)).exp() / sigma / (2.0 * PI).sqrt() + bgr
}

/// Fit a Gaussian plus background to the primary beam in `empty`.
///
/// With `range = None` the fit range is found by walking down both flanks
/// from the maximum until the intensity rises again.
pub fn get_beam_width(empty: &Series, range: Option<(f64, f64)>) -> Result<BeamWidthFit> {
    let (x, y) = (empty.x(), empty.y());
    if y.len() < 5 {
        return Err(SasError::config("primary beam trace needs at least 5 points"));
    }
    let (lower, upper) = match range {
        Some(r) => r,
        None => {
            let imax0 = y.iter().enumerate().fold(0, |m, (i, v)| if *v > y[m] { i } else { m });
            let mut imax = imax0;
            while imax + 1 < y.len() && y[imax + 1] < y[imax] {
                imax += 1;
            }
            let mut imin = imax0;
            while imin > 0 && y[imin - 1] < y[imin] {
                imin -= 1;
            }
            (x[imin], x[imax])
        }
    };
    let mut beam = empty.x_range(lower, upper);
    if beam.len() < 5 {
        return Err(SasError::config(format!("only {} points in primary beam range [{lower}, {upper}]", beam.len())));
    }

    let ymin = beam.y().iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = beam.y().iter().map(|v| v - ymin).collect();
    let norm = simpson(&shifted, beam.x());
    if !(norm > 0.0) {
        return Err(SasError::numerical("primary beam has no area above its minimum"));
    }
    if let Some(yc) = beam.y_mut() {
        yc.iter_mut().for_each(|v| *v = (*v - ymin) / norm);
    }
    if let Some(idx) = beam.role_index(Role::EY) {
        if let Some(e) = beam.column_mut(idx) {
            e.iter_mut().for_each(|v| *v /= norm);
        }
    }

    let width = 0.015;
    let (ymax, ymin) = beam
        .y()
        .iter()
        .fold((f64::NEG_INFINITY, f64::INFINITY), |(hi, lo), v| (hi.max(*v), lo.min(*v)));
    let start = [(ymax - ymin) * width * 2.0, 0.0, width, ymin];
    let weights: Option<Vec<f64>> = beam
        .ey()
        .filter(|e| e.iter().all(|v| *v > 0.0))
        .map(|e| e.iter().map(|v| 1.0 / (v * v)).collect());
    let fit = levenberg_marquardt(
        gauss,
        beam.x(),
        beam.y(),
        weights.as_deref(),
        &start,
        &Bounds::default(),
        &LmOptions::default(),
    )?;
    let [amplitude, mean, sigma, background] = [fit.params[0], fit.params[1], fit.params[2].abs(), fit.params[3]];
    let hwhm = sigma * (2.0 * 2f64.ln()).sqrt();
    let peakmax = gauss(&[amplitude, mean, sigma, background], mean);
    for (name, v) in [("mean", mean), ("sigma", sigma), ("bgr", background), ("A", amplitude), ("hwhm", hwhm), ("peakmax", peakmax)] {
        beam.put(name, v);
    }
    log::info!("primary beam width: hwhm={hwhm:.5} centre={mean:.5}");
    Ok(BeamWidthFit {
        mean,
        sigma,
        background,
        amplitude,
        hwhm,
        peakmax,
        profile: beam,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_primary_beam_width() {
        let sigma = 0.02;
        let x: Vec<f64> = (0..301).map(|i| -0.3 + i as f64 * 0.002).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| 1000.0 * (-0.5 * ((v - 0.004) / sigma).powi(2)).exp() + 3.0)
            .collect();
        let empty = Series::from_xy(x, y).unwrap();
        let fit = get_beam_width(&empty, Some((-0.1, 0.1))).unwrap();
        assert!((fit.sigma - sigma).abs() < 1e-3, "sigma={}", fit.sigma);
        assert!((fit.mean - 0.004).abs() < 1e-3);
        assert!((fit.hwhm - sigma * 1.1774).abs() < 2e-3);
    }

    #[test]
    fn automatic_range_walks_down_the_flanks() {
        let x: Vec<f64> = (0..201).map(|i| -0.2 + i as f64 * 0.002).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| 500.0 * (-0.5 * (v / 0.015).powi(2)).exp() + 1.0 + 0.5 * (v * 40.0).powi(2))
            .collect();
        let empty = Series::from_xy(x, y).unwrap();
        let fit = get_beam_width(&empty, None).unwrap();
        assert!(fit.mean.abs() < 2e-3);
        assert!(fit.hwhm > 0.0);
    }
}
