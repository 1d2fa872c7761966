//! Dynamic structure factors `S(q,ω)`.
//!
//! Elastic contributions are delta functions; on a discrete ω grid they are
//! added to the value at ω = 0 (within `1e-8`) and nowhere else.

use std::f64::consts::PI;

use crate::dynamic::time::{auto_lmax, cloud_multipoles, Resolution, Scatterer};
use crate::dynamic::{dynamic_series, lorentzian, positive, ELASTIC_EPS, KB, PLANCK};
use crate::error::{Result, SasError};
use crate::math::faddeeva::{erfi, voigt as voigt_profile};
use crate::math::quadrature::trapz;
use crate::math::special::{hyp1f1, ln_gamma, spherical_jn, spherical_jn_derivative_zeros};
use crate::series::Series;

fn add_elastic(w: &[f64], y: &mut [f64], amplitude: f64) {
    for (wi, yi) in w.iter().zip(y.iter_mut()) {
        if wi.abs() < ELASTIC_EPS {
            *yi += amplitude;
        }
    }
}

/// Elastic line: 1 at ω = 0, 0 elsewhere.
pub fn elastic_w(w: &[f64]) -> Result<Series> {
    let mut y = vec![0.0; w.len()];
    add_elastic(w, &mut y, 1.0);
    dynamic_series(w, vec![y], "w; Iqw", "elastic_w")
}

/// Translational diffusion, a Lorentzian of width `q²D`.
pub fn trans_diff_w(w: &[f64], q: f64, d: f64) -> Result<Series> {
    positive("diffusion coefficient", d)?;
    let width = q * q * d;
    let y = w.iter().map(|&w| lorentzian(w, width)).collect();
    let mut out = dynamic_series(w, vec![y], "w; Iqw", "trans_diff_w")?;
    out.put("wavevector", q);
    out.put("D", d);
    Ok(out)
}

/// Jump diffusion with residence time `t0` and Gaussian jump length `r0`.
pub fn jump_diff_w(w: &[f64], q: f64, t0: f64, r0: f64) -> Result<Series> {
    positive("residence time", t0)?;
    let width = (1.0 - (-q * q * r0 * r0 / 2.0).exp()) / t0;
    let y = w.iter().map(|&w| lorentzian(w, width)).collect();
    let mut out = dynamic_series(w, vec![y], "w; Iqw", "jump_diff_w")?;
    out.put("wavevector", q);
    out.put("meanresidencetime", t0);
    out.put("meanjumplength", r0);
    Ok(out)
}

/// Diffusion in a harmonic potential in 2 or 3 dimensions, as a sum of
/// Lorentzians of width `n/τ` plus the elastic incoherent structure factor.
///
/// `nmax` defaults to `min(max(6q²u², 30), 1000)`. One dimension has no
/// closed form here; transform the time-domain model instead.
pub fn diffusion_harmonic_potential_w(
    w: &[f64],
    q: f64,
    tau: f64,
    rmsd: f64,
    ndim: usize,
    nmax: Option<usize>,
) -> Result<Series> {
    positive("correlation time", tau)?;
    let x = q * q * rmsd * rmsd;
    let nmax = nmax.unwrap_or_else(|| ((6.0 * x) as usize).clamp(30, 1000));
    let (eisf, amplitudes): (f64, Vec<f64>) = match ndim {
        3 => {
            // Poisson weights; logarithms keep large n finite.
            let an = (1..=nmax)
                .map(|n| {
                    let nf = n as f64;
                    if x > 0.0 { (nf * x.ln() - ln_gamma(nf + 1.0) - x).exp() } else { 0.0 }
                })
                .collect();
            ((-x).exp(), an)
        }
        2 => {
            let sx = x.sqrt();
            let eisf = if sx < 1e-8 { 1.0 } else { PI.sqrt() / 2.0 * (-x).exp() * erfi(sx) / sx };
            let an = (1..=nmax)
                .map(|n| {
                    let nf = n as f64;
                    if x > 0.0 {
                        PI.sqrt() / 2.0 * (nf * x.ln() - ln_gamma(1.5 + nf)).exp() * hyp1f1(1.0 + nf, 1.5 + nf, -x)
                    } else {
                        0.0
                    }
                })
                .collect();
            (eisf, an)
        }
        other => {
            return Err(SasError::config(format!(
                "harmonic potential in frequency domain needs ndim 2 or 3, got {other}"
            )));
        }
    };
    let mut y: Vec<f64> = w
        .iter()
        .map(|&w| {
            amplitudes
                .iter()
                .enumerate()
                .filter(|(_, a)| a.is_finite())
                .map(|(i, a)| a * lorentzian(w, (i + 1) as f64 / tau))
                .sum()
        })
        .collect();
    add_elastic(w, &mut y, eisf);
    let mut out = dynamic_series(w, vec![y], "w; Iqw", "diffusion_harmonic_potential_w")?;
    out.put("u0", rmsd);
    out.put("dimension", ndim as f64);
    out.put("wavevector", q);
    out.put("meancorrelationtime", tau);
    out.put("gaussWidth", rmsd);
    out.put("nmax", nmax as f64);
    out.put("Ds", rmsd * rmsd / tau);
    out.put("EISF", eisf);
    Ok(out)
}

/// `3 j₁(x)/x`, the form amplitude of a sphere.
fn sphere_amplitude(x: f64) -> f64 {
    if x.abs() < 1e-6 { 1.0 - x * x / 10.0 } else { 3.0 * spherical_jn(1, x) / x }
}

/// Diffusion inside an impermeable sphere (Volino–Dianoux).
///
/// Uses the first 98 non-trivial roots of `j_l'`.
pub fn diffusion_in_sphere_w(w: &[f64], q: f64, d: f64, radius: f64) -> Result<Series> {
    positive("diffusion coefficient", d)?;
    positive("radius", radius)?;
    let qa = q * radius;
    let roots = spherical_jn_derivative_zeros();
    let terms: Vec<(f64, f64)> = roots
        .iter()
        .skip(1)
        .take(98)
        .map(|&(x, l)| {
            let lf = l as f64;
            let x2 = x * x;
            let ll = lf * (lf + 1.0);
            let anl = if (x - qa).abs() < 1e-12 {
                1.5 * spherical_jn(l, x).powi(2) * (x2 - ll) / x2
            } else {
                let num = qa * spherical_jn(l + 1, qa) - lf * spherical_jn(l, qa);
                6.0 * x2 / (x2 - ll) * (num / (qa * qa - x2)).powi(2)
            };
            ((2.0 * lf + 1.0) * anl, x2 * d / (radius * radius))
        })
        .collect();
    let mut y: Vec<f64> = w.iter().map(|&w| terms.iter().map(|(a, g)| a * lorentzian(w, *g)).sum()).collect();
    let eisf = sphere_amplitude(qa).powi(2);
    add_elastic(w, &mut y, eisf);
    let mut out = dynamic_series(w, vec![y], "w; Iqw", "diffusion_in_sphere_w")?;
    out.put("radius", radius);
    out.put("wavevector", q);
    out.put("diffusion", d);
    out.put("EISF", eisf);
    Ok(out)
}

/// Rotational diffusion of a rigid cloud, columns `w; Iqwinc; Iqwcoh`.
///
/// The `l = 0` multipole is elastic.
pub fn rot_diffusion_w(w: &[f64], q: f64, cloud: &[Scatterer], dr: f64, lmax: Option<usize>) -> Result<Series> {
    if cloud.is_empty() {
        return Err(SasError::config("scatterer cloud is empty"));
    }
    positive("rotational diffusion", dr)?;
    let lmax = lmax.unwrap_or_else(|| auto_lmax(q, cloud, 2.0, 7));
    let (inc, coh) = cloud_multipoles(q, cloud, lmax);
    let spectrum = |strength: &[f64]| -> Vec<f64> {
        let mut y: Vec<f64> = w
            .iter()
            .map(|&w| {
                strength.iter().enumerate().skip(1).map(|(l, s)| s * lorentzian(w, (l * (l + 1)) as f64 * dr)).sum()
            })
            .collect();
        add_elastic(w, &mut y, strength[0]);
        y
    };
    let yinc = spectrum(&inc);
    let ycoh = spectrum(&coh);
    let mut out = dynamic_series(w, vec![yinc, ycoh], "w; Iqwinc; Iqwcoh", "rot_diffusion_w")?;
    out.put("radiusOfGyration", cloud.iter().map(|s| s.pos.norm_squared()).sum::<f64>().sqrt());
    out.put("Iq_coh", coh.iter().sum::<f64>());
    out.put("Iq_inc", inc.iter().sum::<f64>());
    out.put("wavevector", q);
    out.put("rotDiffusion", dr);
    out.put("lmax", lmax as f64);
    Ok(out)
}

/// Jumps between `n` sites equally spaced on a circle of radius `r0`.
pub fn n_site_jump_diffusion_w(w: &[f64], q: f64, n: usize, t0: f64, r0: f64) -> Result<Series> {
    if n < 2 {
        return Err(SasError::config("jump diffusion needs at least two sites"));
    }
    positive("residence time", t0)?;
    let nf = n as f64;
    let qa = q * r0;
    let bn = |order: usize| -> f64 {
        (1..=n)
            .map(|p| {
                let pf = p as f64;
                spherical_jn(0, 2.0 * qa * (PI * pf / nf).sin()) * (order as f64 * 2.0 * PI * pf / nf).cos()
            })
            .sum::<f64>()
            / nf
    };
    let t1 = t0 / (1.0 - (2.0 * PI / nf).cos());
    let lines: Vec<(f64, f64)> = (1..n)
        .map(|order| {
            let tn = t1 * (PI / nf).sin().powi(2) / (order as f64 * PI / nf).sin().powi(2);
            (bn(order), 1.0 / tn)
        })
        .collect();
    let mut y: Vec<f64> = w.iter().map(|&w| lines.iter().map(|(b, g)| b * lorentzian(w, *g)).sum()).collect();
    let b0 = bn(0);
    add_elastic(w, &mut y, b0);
    let mut out = dynamic_series(w, vec![y], "w; Iqw", "n_site_jump_diffusion_w")?;
    out.put("r0", r0);
    out.put("wavevector", q);
    out.put("t0", t0);
    out.put("N", nf);
    out.put("EISF", b0);
    Ok(out)
}

/// Frequency-domain resolution as unnormalised Gaussians plus background,
/// columns `w; Rw`. The attribute `integral` holds the trapezoid area.
pub fn resolution_w(w: &[f64], res: &Resolution) -> Result<Series> {
    res.validate()?;
    let y: Vec<f64> = w
        .iter()
        .map(|&w| {
            res.peaks.iter().map(|p| p.amp * (-0.5 * ((w - p.mean) / p.sigma).powi(2)).exp()).sum::<f64>() + res.bgr
        })
        .collect();
    let integral = trapz(&y, w);
    let mut out = dynamic_series(w, vec![y], "w; Rw", "resolution_w")?;
    res.annotate(&mut out);
    out.put("integral", integral);
    Ok(out)
}

/// Normalised Lorentzian `γ/(π((x−mean)² + γ²))`.
pub fn lorentz(x: &[f64], mean: f64, gamma: f64) -> Result<Series> {
    positive("gamma", gamma)?;
    let y = x.iter().map(|&x| lorentzian(x - mean, gamma)).collect();
    let mut out = dynamic_series(x, vec![y], "x; y", "lorentz")?;
    out.put("mean", mean);
    out.put("gamma", gamma);
    Ok(out)
}

/// Normalised Gaussian.
pub fn gauss(x: &[f64], mean: f64, sigma: f64) -> Result<Series> {
    positive("sigma", sigma)?;
    let y = x
        .iter()
        .map(|&x| (-0.5 * ((x - mean) / sigma).powi(2)).exp() / sigma / (2.0 * PI).sqrt())
        .collect();
    let mut out = dynamic_series(x, vec![y], "x; y", "gauss")?;
    out.put("mean", mean);
    out.put("sigma", sigma);
    Ok(out)
}

/// Voigt profile with area `amplitude`; `lg` is the Lorentzian/Gaussian
/// width ratio and `asym` skews the width.
pub fn voigt(x: &[f64], center: f64, fwhm: f64, lg: f64, asym: f64, amplitude: f64) -> Result<Series> {
    positive("fwhm", fwhm)?;
    let y = x.iter().map(|&x| voigt_profile(x, center, fwhm, lg, asym, amplitude)).collect();
    let fwhm_g = fwhm / (0.5346 * lg + (0.2166 * lg * lg + 1.0).sqrt());
    let mut out = dynamic_series(x, vec![y], "x; y", "voigt")?;
    out.put("center", center);
    out.put("sigma", fwhm_g / (2.0 * (2.0 * 2f64.ln()).sqrt()));
    out.put("gamma", fwhm_g / 2.0);
    out.put("fwhm", fwhm);
    out.put("lorenzianOverGaussian", lg);
    out.put("asymmetry", asym);
    Ok(out)
}

/// Bose occupation `1/(exp(ħω/kT) − 1)` with ω in 1/ns; 0 at ω = 0.
pub fn bose_distribution(w: &[f64], temp: f64) -> Result<Series> {
    positive("temperature", temp)?;
    let y = w.iter().map(|&w| bose(w, temp)).collect();
    let mut out = dynamic_series(w, vec![y], "w; n", "bose_distribution")?;
    out.put("temperature", temp);
    Ok(out)
}

pub(crate) fn bose(w: f64, temp: f64) -> f64 {
    if w == 0.0 {
        return 0.0;
    }
    1.0 / (PLANCK * w * 1e9 / (KB * temp)).exp_m1()
}

/// Half width at half maximum on both sides of `center` (default: the
/// position of the maximum), ignoring `|x − center| < gap`.
///
/// Returns `[right, left]`; a side is `None` when it does not fall below
/// half of its maximum.
pub fn get_hwhm(data: &Series, center: Option<f64>, gap: f64) -> [Option<f64>; 2] {
    let gap = gap.abs();
    let (x, y) = (data.x(), data.y());
    let center = center.unwrap_or_else(|| {
        x.iter().zip(y).fold((0.0, f64::NEG_INFINITY), |acc, (&xi, &yi)| if yi > acc.1 { (xi, yi) } else { acc }).0
    });
    let right: Vec<(f64, f64)> =
        x.iter().zip(y).filter(|(xi, _)| **xi >= center + gap).map(|(&xi, &yi)| (xi - center, yi)).collect();
    let mut left: Vec<(f64, f64)> =
        x.iter().zip(y).filter(|(xi, _)| **xi <= center - gap).map(|(&xi, &yi)| (xi - center, yi)).collect();
    left.reverse();
    [half_crossing(&right), half_crossing(&left)]
}

/// Distance from the centre where the values, walked outward, first fall
/// below `(max − min)/2`.
fn half_crossing(side: &[(f64, f64)]) -> Option<f64> {
    if side.len() < 2 {
        return None;
    }
    let max = side.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let min = side.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    if !(min < max / 2.0) {
        return None;
    }
    let half = (max - min) / 2.0;
    side.windows(2).find(|p| p[0].1 >= half && p[1].1 < half).map(|p| {
        let (x0, y0) = p[0];
        let (x1, y1) = p[1];
        (x0 + (half - y0) * (x1 - x0) / (y1 - y0)).abs()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::time::sphere_cloud;
    use crate::math::grid::linspace;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn elastic_line_only_at_zero() {
        let w = [-1.0, 0.0, 1e-9, 0.5];
        let e = elastic_w(&w).unwrap();
        assert_eq!(e.y(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn diffusion_lorentzian_peak_and_area() {
        let s = trans_diff_w(&[0.0], 2.0, 0.05).unwrap();
        assert_relative_eq!(s.y()[0], 1.0 / (PI * 0.2), max_relative = 1e-12);
        let w = linspace(-2000.0, 2000.0, 400_001);
        let s = trans_diff_w(&w, 1.0, 0.1).unwrap();
        assert_relative_eq!(trapz(s.y(), &w), 1.0, max_relative = 1e-3);
    }

    #[test]
    fn jump_width_saturates() {
        let s = jump_diff_w(&[0.0], 100.0, 2.0, 0.3).unwrap();
        assert_relative_eq!(s.y()[0], 2.0 / PI, max_relative = 1e-9);
    }

    #[test]
    fn harmonic_weights_sum_to_one() {
        // EISF plus all inelastic weights gives the static structure factor 1
        for ndim in [2, 3] {
            let s = diffusion_harmonic_potential_w(&[0.0], 1.2, 1.0, 0.6, ndim, Some(60)).unwrap();
            let eisf = s.attr_f64("EISF").unwrap();
            // at ω = 0 the n-th Lorentzian contributes a_n τ/(nπ)
            assert!(s.y()[0] > eisf);
            let w = linspace(-20_000.0, 20_000.0, 800_001);
            let full = diffusion_harmonic_potential_w(&w, 1.2, 1.0, 0.6, ndim, Some(60)).unwrap();
            let inelastic = trapz(full.y(), &w) - eisf * (w[1] - w[0]);
            assert_relative_eq!(inelastic + eisf, 1.0, max_relative = 2e-2);
        }
        assert!(diffusion_harmonic_potential_w(&[0.0], 1.0, 1.0, 0.5, 1, None).is_err());
    }

    #[test]
    fn sphere_eisf_limits() {
        let s = diffusion_in_sphere_w(&[0.0, 1.0], 1e-4, 0.1, 1.0).unwrap();
        assert_relative_eq!(s.attr_f64("EISF").unwrap(), 1.0, max_relative = 1e-6);
        let s = diffusion_in_sphere_w(&[0.0, 1.0], 3.0, 0.1, 1.0).unwrap();
        let eisf = s.attr_f64("EISF").unwrap();
        assert!(eisf < 0.2);
        assert!(s.y()[0] > eisf);
        assert!(s.y()[1] > 0.0);
    }

    #[test]
    fn rotation_elastic_part_is_monopole() {
        let cloud = sphere_cloud(1.0);
        let s = rot_diffusion_w(&[0.0, 0.3], 2.0, &cloud, 0.1, Some(10)).unwrap();
        let (inc, _) = cloud_multipoles(2.0, &cloud, 10);
        assert!(s.y()[0] > inc[0]);
        assert!(s.y()[1] < s.y()[0]);
        assert_eq!(s.columnname.as_deref(), Some("w; Iqwinc; Iqwcoh"));
    }

    #[test]
    fn two_site_jump() {
        // two sites: EISF (1 + j0(2qr))/2
        let s = n_site_jump_diffusion_w(&[0.0], 1.5, 2, 1.0, 0.5).unwrap();
        let expected = (1.0 + spherical_jn(0, 1.5)) / 2.0;
        assert_relative_eq!(s.attr_f64("EISF").unwrap(), expected, max_relative = 1e-12);
        assert!(n_site_jump_diffusion_w(&[0.0], 1.0, 1, 1.0, 0.5).is_err());
    }

    #[test]
    fn resolution_integral() {
        let w = linspace(-10.0, 10.0, 2001);
        let res = Resolution::single(0.5).push(2.0, 0.5, 0.5);
        let s = resolution_w(&w, &res).unwrap();
        let expected = 1.5 * 0.5 * (2.0 * PI).sqrt();
        assert_relative_eq!(s.attr_f64("integral").unwrap(), expected, max_relative = 1e-6);
        assert_relative_eq!(s.y()[1000], 1.0 + 0.5 * (-8.0f64).exp(), max_relative = 1e-9);
    }

    #[test]
    fn line_shapes() {
        let l = lorentz(&[1.0], 1.0, 0.5).unwrap();
        assert_relative_eq!(l.y()[0], 1.0 / (0.5 * PI), max_relative = 1e-12);
        let g = gauss(&[0.0], 0.0, 2.0).unwrap();
        assert_relative_eq!(g.y()[0], 1.0 / (2.0 * (2.0 * PI).sqrt()), max_relative = 1e-12);
        let x = linspace(-50.0, 50.0, 20_001);
        let v = voigt(&x, 0.0, 1.0, 1.0, 0.0, 2.0).unwrap();
        assert_relative_eq!(trapz(v.y(), &x), 2.0, max_relative = 2e-2);
    }

    #[test]
    fn bose_occupation() {
        let s = bose_distribution(&[0.0, 1.0], 300.0).unwrap();
        assert_eq!(s.y()[0], 0.0);
        let x = PLANCK * 1e9 / (KB * 300.0);
        assert_relative_eq!(s.y()[1], 1.0 / x.exp_m1(), max_relative = 1e-12);
        assert!(s.y()[1] > 1000.0);
    }

    #[test]
    fn hwhm_of_lorentzian() {
        let x = linspace(-10.0, 10.0, 20_001);
        let l = lorentz(&x, 0.0, 1.0).unwrap();
        let [right, left] = get_hwhm(&l, None, 0.0);
        // (max - min)/2 sits slightly below the true half maximum
        assert_abs_diff_eq!(right.unwrap(), 1.0, epsilon = 2e-2);
        assert_abs_diff_eq!(left.unwrap(), 1.0, epsilon = 2e-2);
        let flat = dynamic_series(&[0.0, 1.0, 2.0], vec![vec![1.0, 1.0, 1.0]], "x; y", "flat").unwrap();
        assert_eq!(get_hwhm(&flat, Some(0.0), 0.0), [None, None]);
    }
}
