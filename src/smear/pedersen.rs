//! Pin-hole (SANS/SAXS) resolution after Pedersen, Posselt and Mortensen,
//! J. Appl. Cryst. 23, 321 (1990).
//!
//! The resolution at each q is a Gaussian of width σ(q) in the detector
//! plane, written in polar form:
//!
//! ```text
//! R(q, q') = q'/σ² · exp(−(q² + q'²)/2σ²) · I₀(q·q'/σ²)
//! ```
//!
//! The exponentially scaled Bessel function keeps the product finite for
//! large arguments. σ² sums a wavelength part `(q·Δλ/λ)²`, a collimation part
//! from the beam divergence and a detector part from the pixel size, all
//! divided by `8 ln 2` to turn FWHM into variance.

use std::f64::consts::LN_2;

use crate::beam::SansGeometry;
use crate::error::{Result, SasError};
use crate::math::grid::loglist;
use crate::math::special::i0e;
use crate::series::{AttrValue, Role, Series};
use crate::smear::extrapolate::{extrapolate_y, Extrapolation};

/// Extension points per σ at each edge.
const POINTS_PER_SIGMA: usize = 8;

/// Low-q and high-q grid extensions reaching 3σ beyond the data.
///
/// Each side uses σ evaluated at its own data edge. The extensions exclude
/// the data end points.
pub fn estimate_frame(x: &[f64], g: &SansGeometry) -> (Vec<f64>, Vec<f64>) {
    if !g.is_active() || x.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let xmin = x.iter().copied().fold(f64::INFINITY, f64::min);
    let xmax = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let edges = sigma2(&[xmin, xmax], g);
    let (s_lo, s_hi) = (edges[0].max(0.0).sqrt(), edges[1].max(0.0).sqrt());
    frame(xmin, xmax, 3.0 * s_lo, 3.0 * s_hi)
}

/// Log-spaced extensions `[max(0, xmin − low), xmin)` and `(xmax, xmax + high]`.
pub(crate) fn frame(xmin: f64, xmax: f64, low: f64, high: f64) -> (Vec<f64>, Vec<f64>) {
    let n = 3 * POINTS_PER_SIGMA;
    let mut lo = loglist((xmin - low).max(0.0), xmin, n);
    lo.pop();
    lo.retain(|v| *v < xmin);
    let mut hi = loglist(xmax, xmax + high, n);
    hi.remove(0);
    hi.retain(|v| *v > xmax);
    (lo, hi)
}

/// σ²(q) of the Gaussian resolution at each q.
pub fn sigma2(q: &[f64], g: &SansGeometry) -> Vec<f64> {
    let (l_coll, r1, l_det, r2) = (g.coll_dist, g.coll_aperture, g.det_dist, g.sample_aperture);
    let k0 = g.k0();
    let dq = g.detector_resolution();
    let aperture_limited = r1 / (l_coll + l_det) >= r2 / l_det;
    q.iter()
        .map(|&x| {
            let theta2 = 2.0 * (x / (2.0 * k0)).clamp(-1.0, 1.0).asin();
            let c2 = theta2.cos();
            let c2sq = c2 * c2;
            let dbeta = if aperture_limited {
                2.0 * r1 / l_coll
                    - 0.5 * r2 * r2 / (r1 * l_det * l_det * l_coll) * c2sq * c2sq * (l_coll + l_det / c2sq).powi(2)
            } else {
                2.0 * r2 * (1.0 / l_coll + c2sq / l_det) - 0.5 * r1 * r1 / r2 * l_det / l_coll / (c2sq * (l_coll + l_det / c2sq))
            };
            let half = (theta2 / 2.0).cos().powi(2);
            let sigma_c = k0 * k0 * half * dbeta * dbeta / (8.0 * LN_2);
            let sigma_d = k0 * k0 * half * c2sq * dq * dq / (8.0 * LN_2);
            (x * g.wavespread).powi(2) / (8.0 * LN_2) + sigma_c + sigma_d
        })
        .collect()
}

/// Quadrature widths of a grid: central differences, half a step at the
/// first point, a full step at the last.
pub(crate) fn integration_widths(xt: &[f64]) -> Vec<f64> {
    let n = xt.len();
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    (xt[1] - xt[0]) / 2.0
                } else if i == n - 1 {
                    xt[n - 1] - xt[n - 2]
                } else {
                    (xt[i + 1] - xt[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Normalised kernel average `Σ dx·R·Y / Σ dx·R` for every output point.
pub(crate) fn kernel_average<K: Fn(f64, usize) -> f64>(xt: &[f64], yt: &[f64], nout: usize, kernel: K) -> Vec<f64> {
    let dx = integration_widths(xt);
    (0..nout)
        .map(|j| {
            let (mut num, mut den) = (0.0, 0.0);
            for ((&x, &y), &d) in xt.iter().zip(yt).zip(&dx) {
                let r = kernel(x, j);
                num += d * r * y;
                den += d * r;
            }
            if den > 0.0 { num / den } else { f64::NAN }
        })
        .collect()
}

/// Smear `data` with the pin-hole resolution of `g`.
///
/// Returns columns `q; smeared; unsmeared; fwhm` with the input attributes
/// plus the `rf_*` record of the kernel. Inactive geometry returns the data
/// unchanged with a zero width column.
pub fn resolution_sans(data: &Series, g: &SansGeometry) -> Result<Series> {
    let x = data.x();
    if x.is_empty() {
        return Err(SasError::config("cannot smear an empty curve"));
    }
    if !g.is_active() {
        let mut out = Series::new(vec![x.to_vec(), data.y().to_vec(), data.y().to_vec(), vec![0.0; x.len()]])?;
        out.set_role(Role::EY, None)?;
        out.copy_attrs_from(data);
        return Ok(out);
    }
    let (low, high) = if g.extrapolation.extend { estimate_frame(x, g) } else { (Vec::new(), Vec::new()) };
    let yt = extrapolate_y(data, &low, &high, &g.extrapolation)?;
    let xt: Vec<f64> = low.iter().chain(x).chain(&high).copied().collect();

    let s2 = sigma2(x, g);
    let smeared = kernel_average(&xt, &yt, x.len(), |xp, j| {
        let (q, v) = (x[j], s2[j]);
        let arg = xp * q / v;
        (xp / v) * (-0.5 * (xp * xp + q * q) / v + arg.abs()).exp() * i0e(arg)
    });
    let fwhm: Vec<f64> = s2.iter().map(|v| 2.0 * (2.0 * LN_2).sqrt() * v.sqrt()).collect();

    let mut out = Series::new(vec![x.to_vec(), smeared, data.y().to_vec(), fwhm])?;
    out.set_role(Role::EY, None)?;
    out.copy_attrs_from(data);
    out.columnname = Some("wavevector; smeared scattering; unsmeared scattering; half width smearing function".into());
    out.put("rf_collDist", g.coll_dist);
    out.put("rf_collAperture", g.coll_aperture);
    out.put("rf_detDist", g.det_dist);
    out.put("rf_sampleAperture", g.sample_aperture);
    out.put("rf_detectorResolution", g.detector_resolution());
    out.put("rf_modelname", "resFunct");
    out.put("rf_extrapolX", AttrValue::List(xt));
    out.put("rf_extrapolY", AttrValue::List(yt));
    out.put("rf_wavelength", g.wavelength);
    out.put("rf_wavespread", g.wavespread);
    out.put("rf_extrapolfunc", g.extrapolation.to_string());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formfactor::sphere;
    use crate::math::grid::loglist;

    fn scenario_geometry() -> SansGeometry {
        SansGeometry {
            coll_dist: 2000.0,
            coll_aperture: 20.0,
            det_dist: 2000.0,
            sample_aperture: 10.0,
            wavelength: 0.5,
            wavespread: 0.2,
            pixel_width: 0.0,
            ring_width: 0.0,
            ..SansGeometry::default()
        }
    }

    #[test]
    fn frame_brackets_the_data() {
        let q = loglist(0.1, 3.0, 50);
        let (lo, hi) = estimate_frame(&q, &SansGeometry::default());
        assert!(lo.iter().all(|v| *v < 0.1 && *v >= 0.0));
        assert!(hi.iter().all(|v| *v > 3.0));
        assert_eq!(hi.len(), 23);
    }

    #[test]
    fn frame_edges_follow_local_sigma() {
        let g = SansGeometry::default();
        let q = loglist(0.5, 3.0, 40);
        let (lo, hi) = estimate_frame(&q, &g);
        let s = sigma2(&[0.5, 3.0], &g);
        let (span_lo, span_hi) = (0.5 - lo[0], hi[hi.len() - 1] - 3.0);
        assert!((span_lo - 3.0 * s[0].sqrt()).abs() < 1e-9 * span_lo.max(1.0));
        assert!((span_hi - 3.0 * s[1].sqrt()).abs() < 1e-9 * span_hi.max(1.0));
        // the wavelength spread widens the high-q side
        assert!(span_lo < 0.5 * span_hi);
    }

    #[test]
    fn sphere_minimum_is_filled() {
        let q = loglist(0.1, 10.0, 500);
        let ideal = sphere(&q, 6.0, 1.0).unwrap();
        let smeared = resolution_sans(&ideal, &scenario_geometry()).unwrap();
        // First minimum at qR = 4.493.
        let i = q.iter().position(|v| *v * 6.0 >= 4.493).unwrap();
        let ideal_min = (i - 2..i + 2).map(|k| ideal.y()[k]).fold(f64::INFINITY, f64::min);
        assert!(smeared.y()[i] > 10.0 * ideal_min);
        assert_eq!(smeared.ncols(), 4);
        assert!(smeared.attr("rf_detDist").is_some());
    }

    #[test]
    fn forward_intensity_is_preserved() {
        let q = loglist(0.001, 1.0, 200);
        let ideal = sphere(&q, 1.0, 1.0).unwrap();
        let mut g = scenario_geometry();
        g.extrapolation = Extrapolation::both(crate::smear::EdgePolicy::Guinier);
        let smeared = resolution_sans(&ideal, &g).unwrap();
        assert!((smeared.y()[0] / ideal.y()[0] - 1.0).abs() < 0.01);
    }

    #[test]
    fn inactive_geometry_is_identity() {
        let data = Series::from_xy(vec![0.1, 0.2], vec![1.0, 0.5]).unwrap();
        let g = SansGeometry {
            coll_dist: 0.0,
            ..SansGeometry::default()
        };
        let out = resolution_sans(&data, &g).unwrap();
        assert_eq!(out.y(), data.y());
    }
}
