//! Polymer chain form factors.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::error::{Result, SasError};
use crate::formfactor::cloud::{debye, orientational_average, Amplitudes, AverageOptions, CloudPoint};
use crate::formfactor::sphere::{multi_shell_sphere, sphere, Shell};
use crate::formfactor::{model_series, non_negative};
use crate::math::faddeeva::dawson;
use crate::math::quadrature::simpson;
use crate::math::smooth::{smooth, SmoothWindow};
use crate::math::special::{gamma_li, j1x, si, sinc};
use crate::series::Series;

/// Debye-type form factor of a Gaussian chain with Flory exponent `nu`
/// (0.5 ideal chain, ~0.6 swollen). Normalised to 1 at q = 0.
pub fn gaussian_chain(q: &[f64], rg: f64, nu: f64) -> Result<Series> {
    non_negative("radius of gyration", rg)?;
    if nu <= 0.0 {
        return Err(SasError::config(format!("Flory exponent must be > 0, got {nu}")));
    }
    let nu2 = 2.0 * nu;
    let y = q
        .iter()
        .map(|&x| {
            let u = x * x * rg * rg * (nu2 + 1.0) * (nu2 + 2.0) / 6.0;
            if u < 1e-5 {
                1.0 - u * (2.0 / (1.0 + nu2) - 1.0 / (1.0 + nu))
            } else {
                (u.powf(-1.0 / nu2) * gamma_li(1.0 / nu2, u) - u.powf(-1.0 / nu) * gamma_li(1.0 / nu, u)) / nu
            }
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Fq", "gaussianChain")?;
    out.put("radiusOfGyration", rg);
    out.put("nu", nu);
    Ok(out)
}

/// Ideal ring polymer, `D(x)/x` with the Dawson function `D` and `x = q·Rg/2`.
pub fn ring_polymer(q: &[f64], rg: f64) -> Result<Series> {
    non_negative("radius of gyration", rg)?;
    let y = q
        .iter()
        .map(|&x| {
            let u = x * rg / 2.0;
            if u == 0.0 { 1.0 } else { dawson(u) / u }
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Fq", "ringPolymer")?;
    out.put("radiusOfGyration", rg);
    Ok(out)
}

const WLC_LIMIT: f64 = 100.0;

/// Integrand of the Kholodenko wormlike chain.
fn wlc_fz(z: f64, ef: f64, stiff: bool) -> f64 {
    if z == 0.0 {
        return 1.0;
    }
    if ef == 0.0 {
        return if z < WLC_LIMIT { z / z.sinh() } else { 2.0 * z * (-z).exp() };
    }
    match (stiff, z < WLC_LIMIT) {
        (false, true) => (z * ef).sinh() / z.sinh() / ef,
        (false, false) => (z * (ef - 1.0)).exp() / ef,
        (true, true) => (z * ef).sin() / z.sinh() / ef,
        (true, false) => 0.0,
    }
}

fn wlc_p0(q: f64, x: f64, a2: f64, rtol: f64) -> Result<f64> {
    let ratio = a2 * q / 3.0;
    let ef = (ratio * ratio - 1.0).abs().sqrt();
    let stiff = ratio > 1.0;
    let estimate = |n: usize| {
        let z: Vec<f64> = (0..n).map(|i| x * i as f64 / (n - 1) as f64).collect();
        let fz: Vec<f64> = z.iter().map(|&v| wlc_fz(v, ef, stiff)).collect();
        let fzz: Vec<f64> = fz.iter().zip(&z).map(|(f, v)| f * v).collect();
        2.0 / x * (simpson(&fz, &z) - simpson(&fzz, &z) / x)
    };
    let mut n = 1001;
    let mut p0 = estimate(n);
    for _ in 0..12 {
        n = 2 * n - 1;
        let next = estimate(n);
        if (next - p0).abs() < rtol * next.abs() {
            return Ok(next);
        }
        p0 = next;
    }
    Err(SasError::numerical(format!("wormlike chain integral did not converge at q={q}")))
}

/// Kholodenko wormlike chain of contour length `n` and persistence length
/// `a` (Kuhn length `2a`). With a cross-section radius the chain becomes a
/// flexible cylinder and the result is scaled to `(V·Δρ)²`.
pub fn wormlike_chain(
    q: &[f64],
    n: f64,
    a: f64,
    radius: Option<f64>,
    sld: f64,
    solvent_sld: f64,
    rtol: f64,
) -> Result<Series> {
    if n <= 0.0 || a <= 0.0 {
        return Err(SasError::config("wormlike chain length and persistence length must be > 0"));
    }
    let a2 = 2.0 * a;
    let x = 3.0 * n / a2;
    let p0 = q.iter().map(|&v| wlc_p0(v, x, a2, rtol)).collect::<Result<Vec<_>>>()?;
    let (volume, contrast, r) = match radius {
        Some(r) if r > 0.0 => (PI * r * r * n, sld - solvent_sld, r),
        _ => (1.0, 1.0, 0.0),
    };
    let i0 = (volume * contrast).powi(2);
    let iq = q
        .iter()
        .zip(&p0)
        .map(|(&v, p)| {
            let pcs = if r > 0.0 { j1x(v * r).powi(2) } else { 1.0 };
            i0 * p * pcs
        })
        .collect();
    let k = a2 / n;
    let rg = ((a2 * n / 6.0) * (1.0 - 1.5 * k + 1.5 * k * k - 0.75 * k.powi(3) * (1.0 - (-2.0 / k).exp()))).sqrt();
    let mut out = model_series(q, vec![iq], "q; Iq", "wormlikeChain")?;
    out.put("chainRadius", r);
    out.put("chainLength", n);
    out.put("persistenceLength", a);
    out.put("Rg", rg);
    out.put("volume", volume);
    out.put("contrast", contrast);
    out.put("I0", i0);
    Ok(out)
}

/// `Σ_{j<n} (n − j)·s^j`.
fn weighted_geometric(s: f64, n: usize) -> f64 {
    let mut sum = 0.0;
    let mut p = 1.0;
    for j in 0..n {
        sum += (n - j) as f64 * p;
        p *= s;
    }
    sum
}

/// Pearl necklace of `n` spheres of radius `rc` joined by `n − 1` rods of
/// length `l` (Schweins & Huber). `ms` and `mr` are the masses of one pearl
/// and one rod and fix the relative weights of the three terms.
///
/// Geometric series are summed explicitly so the q → 0 limit is regular.
pub fn pearl_necklace(q: &[f64], n: usize, rc: f64, l: f64, ms: f64, mr: f64) -> Result<Series> {
    if n == 0 {
        return Err(SasError::config("pearl necklace needs at least one pearl"));
    }
    non_negative("pearl radius", rc)?;
    non_negative("string length", l)?;
    let nf = n as f64;
    let m = n - 1;
    let mf = m as f64;
    let total = mf * mr + nf * ms;
    if total <= 0.0 {
        return Err(SasError::config("pearl necklace masses must be positive"));
    }
    let a1 = ms * ms / (total * total);
    let a2 = mr * mr / (total * total);
    let a3 = mr * ms / (total * total);
    let a = l + 2.0 * rc;
    let y = q
        .iter()
        .map(|&x| {
            let s = sinc(x * a);
            let y1 = crate::formfactor::sphere::fa_sphere(x * rc);
            let (y2, y3) = if x * l < 1e-12 {
                (1.0, sinc(x * rc))
            } else {
                (si(x * l) / (x * l), (si(x * (a - rc)) - si(x * rc)) / (x * l))
            };
            let z1 = 2.0 * y1 * y1 * (weighted_geometric(s, n) - nf / 2.0);
            let z2 = mf * (2.0 * y2 - sinc(x * l / 2.0).powi(2))
                + if m > 0 { 2.0 * y3 * y3 * weighted_geometric(s, m - 1) } else { 0.0 };
            let z3 = 4.0 * y3 * y1 * weighted_geometric(s, m);
            a1 * z1 + a2 * z2 + a3 * z3
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Fq", "pearlNecklace")?;
    out.put("pearlRadius", rc);
    out.put("A1", a1);
    out.put("A2", a2);
    out.put("A3", a3);
    out.put("numberPearls", nf);
    out.put("numberRods", mf);
    out.put("mr", mr);
    out.put("ms", ms);
    out.put("numberMonomers", ms * nf + mr * mf);
    out.put("stringLength", l);
    Ok(out)
}

/// Parameters of [`linear_pearls`].
#[derive(Debug, Clone)]
pub struct LinearPearls {
    pub pearls: usize,
    pub radius: f64,
    /// Gap between neighbouring pearl surfaces.
    pub spacing: f64,
    pub pearl_sld: f64,
    /// Radius of the connecting strings; 0 leaves them out.
    pub connector_radius: f64,
    /// Gaussian coils per connector.
    pub connectors: usize,
    pub shell_thickness: f64,
    pub shell_sld: f64,
    pub solvent_sld: f64,
    /// RMS displacement of all points; > 0 switches to an explicit
    /// orientational average.
    pub rms: f64,
    /// Flat smoothing window applied to the explicit average.
    pub smooth: usize,
}

impl Default for LinearPearls {
    fn default() -> Self {
        Self {
            pearls: 5,
            radius: 2.0,
            spacing: 2.0,
            pearl_sld: 1.0,
            connector_radius: 0.0,
            connectors: 1,
            shell_thickness: 0.0,
            shell_sld: 0.0,
            solvent_sld: 0.0,
            rms: 0.0,
            smooth: 7,
        }
    }
}

/// Straight chain of spheres (optionally core-shell) connected by Gaussian
/// coils, evaluated as a point cloud. Columns `q; Iq`.
pub fn linear_pearls(q: &[f64], p: &LinearPearls) -> Result<Series> {
    if p.pearls == 0 || p.radius <= 0.0 {
        return Err(SasError::config("linear pearls need at least one pearl of positive radius"));
    }
    let l = p.spacing.max(0.0);
    let d = p.shell_thickness.abs();
    let pearl = if d > 0.0 && p.shell_sld != p.solvent_sld {
        multi_shell_sphere(q, &[Shell::constant(p.radius, p.pearl_sld), Shell::constant(d, p.shell_sld)], p.solvent_sld)?
    } else {
        sphere(q, p.radius, p.pearl_sld - p.solvent_sld)?
    };
    let fa0 = pearl.attr_f64("fa0").unwrap_or(0.0);
    let fa = pearl.column(2).map(<[f64]>::to_vec).unwrap_or_default();

    let step = 2.0 * p.radius + 2.0 * d + l;
    let mut points: Vec<CloudPoint> = (0..p.pearls)
        .map(|i| CloudPoint::new(Vector3::new(i as f64 * step, 0.0, 0.0), fa0))
        .collect();
    let mut rows = vec![fa];
    let mut f0 = vec![fa0];

    let n = if p.connector_radius > 0.0 && l > 0.0 { p.connectors } else { 0 };
    if n > 0 {
        let connector_sl = PI * p.connector_radius.powi(2) * l * (p.pearl_sld - p.solvent_sld);
        let crg = l / 2.0 / n as f64;
        for m in 0..p.pearls - 1 {
            let start = m as f64 * step + p.radius + d + crg;
            for k in 0..n {
                let x = start + 2.0 * crg * k as f64;
                points.push(CloudPoint::new(Vector3::new(x, 0.0, 0.0), connector_sl / n as f64).with_ff(1));
            }
        }
        let coil = gaussian_chain(q, crg, 0.5)?;
        rows.push(coil.y().iter().map(|v| v.max(0.0).sqrt()).collect());
        f0.push(1.0);
    }
    let amps = Amplitudes::new(rows, &f0)?;

    let cloud = if p.rms > 0.0 {
        let opts = AverageOptions {
            rms: p.rms,
            ..Default::default()
        };
        let mut avg = orientational_average(q, &points, Some(&amps), &opts)?;
        if p.smooth > 1 {
            let smoothed = smooth(avg.y(), p.smooth, SmoothWindow::Flat)?;
            if let Some(y) = avg.y_mut() {
                *y = smoothed;
            }
        }
        avg
    } else {
        debye(q, &points, Some(&amps))?
    };
    let i0 = cloud.attr_f64("I0").unwrap_or(1.0);
    let iq = cloud.y().iter().map(|v| v * i0).collect();
    let mut out = model_series(q, vec![iq], "q; Iq", "linearPearls")?;
    out.put("I0", i0);
    out.put("numberPearls", p.pearls as f64);
    out.put("pearlRadius", p.radius);
    out.put("connectorRadius", p.connector_radius);
    out.put("fulllength", step * (p.pearls as f64 - 1.0) + 2.0 * (p.radius + d));
    out.put("rms", p.rms);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debye_function(u: f64) -> f64 {
        if u < 1e-3 {
            1.0 - u / 3.0 + u * u / 12.0
        } else {
            2.0 * ((-u).exp_m1() + u) / (u * u)
        }
    }

    #[test]
    fn ideal_gaussian_chain_is_debye() {
        let q = [0.0, 1e-4, 1e-3, 6e-3, 0.05, 0.2, 1.0];
        let rg = 5.0;
        let g = gaussian_chain(&q, rg, 0.5).unwrap();
        assert_eq!(g.y()[0], 1.0);
        for i in 1..q.len() {
            let u = (q[i] * rg).powi(2);
            assert!((g.y()[i] - debye_function(u)).abs() < 1e-8, "q={}", q[i]);
        }
    }

    #[test]
    fn ring_starts_at_one_and_decays() {
        let r = ring_polymer(&[0.0, 0.1, 1.0], 4.0).unwrap();
        assert_eq!(r.y()[0], 1.0);
        assert!(r.y()[1] < 1.0 && r.y()[2] < r.y()[1]);
    }

    #[test]
    fn flexible_wormlike_chain_tends_to_debye() {
        let (n, a) = (1000.0, 1.0);
        let q = [0.05, 0.1];
        let w = wormlike_chain(&q, n, a, None, 1.0, 0.0, 0.001).unwrap();
        let rg2 = 2.0 * a * n / 6.0;
        for (i, x) in q.iter().enumerate() {
            let d = debye_function(x * x * rg2);
            assert!((w.y()[i] / d - 1.0).abs() < 0.01, "q={x}");
        }
        let rg = w.attr_f64("Rg").unwrap();
        assert!((rg * rg / rg2 - 1.0).abs() < 0.01);
    }

    #[test]
    fn wormlike_chain_with_cross_section_scales_to_volume() {
        let w = wormlike_chain(&[0.0], 50.0, 5.0, Some(1.0), 2.0, 1.0, 0.01).unwrap();
        let v = PI * 50.0;
        assert!((w.y()[0] / (v * v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn necklace_is_normalised_at_zero() {
        let p = pearl_necklace(&[0.0, 1e-6, 0.1], 10, 2.0, 5.0, 3.0, 1.0).unwrap();
        assert!((p.y()[0] - 1.0).abs() < 1e-12);
        assert!((p.y()[1] - 1.0).abs() < 1e-6);
        assert!(p.y()[2] < 1.0);
    }

    #[test]
    fn necklace_without_rods_is_pearl_chain() {
        // Pearls only: A2 = A3 = 0 and pairs k bonds apart contribute sinc(qA)^k.
        let q = [0.3];
        let (n, rc) = (3usize, 2.0);
        let p = pearl_necklace(&q, n, rc, 0.0, 1.0, 0.0).unwrap();
        let s = sinc(q[0] * 2.0 * rc);
        let fa = crate::formfactor::sphere::fa_sphere(q[0] * rc);
        let expected = fa * fa * (3.0 + 4.0 * s + 2.0 * s * s) / 9.0;
        assert!((p.y()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn single_pearl_is_a_sphere() {
        let q = [0.0, 0.2, 0.5];
        let opts = LinearPearls {
            pearls: 1,
            radius: 3.0,
            ..Default::default()
        };
        let lp = linear_pearls(&q, &opts).unwrap();
        let s = sphere(&q, 3.0, 1.0).unwrap();
        for i in 0..q.len() {
            assert!((lp.y()[i] - s.y()[i]).abs() < 1e-9 * s.y()[0]);
        }
    }

    #[test]
    fn connectors_add_forward_scattering() {
        let q = [0.0];
        let bare = linear_pearls(&q, &LinearPearls::default()).unwrap();
        let linked = linear_pearls(
            &q,
            &LinearPearls {
                connector_radius: 0.5,
                connectors: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(linked.y()[0] > bare.y()[0]);
    }
}
