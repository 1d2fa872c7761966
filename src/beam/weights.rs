//! Beam-length and beam-width weighting functions of line profiles.

use crate::beam::{BeamWidth, LineProfile};
use crate::math::grid::linspace;
use crate::math::quadrature::simpson;
use crate::series::interp_linear;

/// Sampled weighting function `w(t)` normalised to unit integral.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    pub t: Vec<f64>,
    pub w: Vec<f64>,
}

/// Weight along the slit length for offsets `y ≥ 0`.
///
/// Without a detector slit (`dIW = 0`) the profile itself is sampled;
/// otherwise it is integrated over a window of width `dIW` centred on each
/// offset. Entries below `1e-5·max` are dropped. `None` means no length
/// smearing.
pub fn length_weights(beam: &LineProfile) -> Option<Weights> {
    if beam.a == 0.0 && beam.diw == 0.0 {
        return None;
    }
    let extent = beam.x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let y = linspace(0.0, 3.0 * extent, 100);
    let weight: Vec<f64> = if beam.diw == 0.0 {
        y.iter().map(|&v| interp_zero(&beam.x, &beam.y, v)).collect()
    } else {
        y.iter()
            .map(|&v| window_integral(&beam.x, &beam.y, v - beam.diw / 2.0, v + beam.diw / 2.0))
            .collect()
    };
    normalized(y, weight)
}

/// Weight across the slit (beam width) at offsets `x`.
///
/// A Gaussian of the given hwhm on 21 points over ±2.5σ, or a measured width
/// profile sampled at 27 points.
pub fn width_weights(beam: &LineProfile) -> Option<Weights> {
    match &beam.bxw {
        BeamWidth::Hwhm(h) if *h <= 0.0 => None,
        BeamWidth::Hwhm(h) => {
            let sigma = h / (2.0 * 2f64.ln()).sqrt();
            let x = linspace(-2.5 * sigma, 2.5 * sigma, 21);
            let w = x.iter().map(|v| (-0.5 * (v / sigma).powi(2)).exp()).collect();
            normalized(x, w)
        }
        BeamWidth::Profile(p) => {
            let (first, last) = (*p.x().first()?, *p.x().last()?);
            let x = linspace(first, last, 27);
            let w = p.interp(&x);
            normalized(x, w)
        }
    }
}

fn normalized(t: Vec<f64>, w: Vec<f64>) -> Option<Weights> {
    let max = w.iter().copied().fold(0.0, f64::max);
    if !(max > 0.0) {
        return None;
    }
    let (t, w): (Vec<f64>, Vec<f64>) = t.into_iter().zip(w).filter(|(_, v)| *v > 1e-5 * max).unzip();
    let norm = simpson(&w, &t);
    if !(norm > 0.0) {
        return None;
    }
    Some(Weights {
        w: w.into_iter().map(|v| v / norm).collect(),
        t,
    })
}

/// Linear interpolation that is zero outside the sampled range.
fn interp_zero(x: &[f64], y: &[f64], v: f64) -> f64 {
    match (x.first(), x.last()) {
        (Some(&lo), Some(&hi)) if v >= lo && v <= hi => interp_linear(x, y, v),
        _ => 0.0,
    }
}

/// Exact integral of the piecewise linear profile over `[lo, hi]`.
fn window_integral(x: &[f64], y: &[f64], lo: f64, hi: f64) -> f64 {
    let mut total = 0.0;
    for (xw, yw) in x.windows(2).zip(y.windows(2)) {
        let (a, b) = (xw[0].max(lo), xw[1].min(hi));
        if b <= a || xw[1] <= xw[0] {
            continue;
        }
        let at = |t: f64| yw[0] + (yw[1] - yw[0]) * (t - xw[0]) / (xw[1] - xw[0]);
        total += 0.5 * (b - a) * (at(a) + at(b));
    }
    total
}
