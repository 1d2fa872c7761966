//! Smearing with an explicitly given Gaussian σ(q).

use std::f64::consts::PI;

use crate::error::{Result, SasError};
use crate::series::{AttrValue, Role, Series};
use crate::smear::extrapolate::{extrapolate_y, Extrapolation};
use crate::smear::pedersen::{frame, kernel_average};

/// Gaussian kernel average with width `sigma(q)` at each output q.
///
/// Returns columns `q; smeared; unsmeared; sigma`.
pub fn resolution_explicit<S: Fn(f64) -> f64>(data: &Series, sigma: S, ext: &Extrapolation) -> Result<Series> {
    let x = data.x();
    if x.is_empty() {
        return Err(SasError::config("cannot smear an empty curve"));
    }
    let sig: Vec<f64> = x.iter().map(|&q| sigma(q)).collect();
    if let Some(bad) = sig.iter().find(|s| !(**s > 0.0)) {
        return Err(SasError::config(format!("explicit σ must be > 0, got {bad}")));
    }
    let (low, high) = if ext.extend {
        let smin = sig.iter().copied().fold(f64::INFINITY, f64::min);
        let smax = sig.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        frame(x[0], x[x.len() - 1], 3.0 * smin, 3.0 * smax)
    } else {
        (Vec::new(), Vec::new())
    };
    let yt = extrapolate_y(data, &low, &high, ext)?;
    let xt: Vec<f64> = low.iter().chain(x).chain(&high).copied().collect();

    let smeared = kernel_average(&xt, &yt, x.len(), |xp, j| {
        let s = sig[j];
        (-0.5 * ((xp - x[j]) / s).powi(2)).exp() / ((2.0 * PI).sqrt() * s)
    });

    let mut out = Series::new(vec![x.to_vec(), smeared, data.y().to_vec(), sig])?;
    out.set_role(Role::EY, None)?;
    out.copy_attrs_from(data);
    out.columnname = Some("wavevector; smeared scattering; unsmeared scattering; sigma smearing function".into());
    out.put("rf_modelname", "resFunctExplicit");
    out.put("rf_extrapolX", AttrValue::List(xt));
    out.put("rf_extrapolY", AttrValue::List(yt));
    out.put("rf_extrapolfunc", ext.to_string());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::grid::linspace;

    #[test]
    fn linear_curve_is_preserved_in_the_interior() {
        let q = linspace(0.0, 2.0, 401);
        let y: Vec<f64> = q.iter().map(|v| 1.0 + 0.5 * v).collect();
        let data = Series::from_xy(q.clone(), y.clone()).unwrap();
        let ext = Extrapolation::both(crate::smear::EdgePolicy::PowerLaw(1.0));
        let out = resolution_explicit(&data, |_| 0.02, &ext).unwrap();
        for i in 50..350 {
            assert!((out.y()[i] - y[i]).abs() < 1e-3, "i={i}");
        }
        assert_eq!(out.column(3).unwrap()[0], 0.02);
    }

    #[test]
    fn gaussian_peak_is_broadened() {
        let q = linspace(0.0, 2.0, 801);
        let w = 0.03;
        let y: Vec<f64> = q.iter().map(|v| (-0.5 * ((v - 1.0) / w).powi(2)).exp()).collect();
        let data = Series::from_xy(q, y).unwrap();
        let s = 0.04;
        let out = resolution_explicit(&data, |_| s, &Extrapolation::default()).unwrap();
        let expected = w / (w * w + s * s).sqrt();
        assert!((out.y()[400] - expected).abs() < 5e-3);
    }
}
