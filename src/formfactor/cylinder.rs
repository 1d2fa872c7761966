//! Cylinders, discs and polyhedra.
//!
//! Cylinder amplitudes at axis angle α to q are
//!
//! ```text
//! fa = πr²L · 2J₁(qr sin α)/(qr sin α) · sin(qL cos α/2)/(qL cos α/2)
//! ```
//!
//! with spherical caps (Kaya, J. Appl. Cryst. 37, 223, 2004) added as a
//! Gauss integral over the cap slices. Orientational averages integrate
//! `fa²·sin α` with Gauss–Legendre nodes evaluated in parallel.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{Result, SasError};
use crate::formfactor::cloud::fibonacci_sphere;
use crate::formfactor::{model_series, non_negative};
use crate::math::quadrature::{fixed_gauss, gauss_nodes};
use crate::math::special::{j1x, sinc};
use crate::series::{AttrValue, Series};

/// Orientation of the cylinder axis relative to q (radians).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    Fixed(f64),
    /// Average over axis angles in `[a0, a1] ⊂ [0, π/2]`.
    Range(f64, f64),
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Range(0.0, PI / 2.0)
    }
}

impl Orientation {
    fn clamped(self) -> Orientation {
        match self {
            Orientation::Range(a, b) if (a - b).abs() < 1e-12 => Orientation::Fixed(a),
            Orientation::Range(a, b) => Orientation::Range(a.max(0.0), b.min(PI / 2.0)),
            fixed => fixed,
        }
    }

    fn describe(self) -> AttrValue {
        match self {
            Orientation::Fixed(a) => AttrValue::Number(a),
            Orientation::Range(a, b) => AttrValue::List(vec![a, b]),
        }
    }
}

/// `<fa(α, q)²>` over `orientation` with `sin α` weights.
///
/// The amplitude closure returns all q values for one angle; angles are
/// evaluated in parallel and gathered in input order.
pub(crate) fn orientation_average<F>(nq: usize, orientation: Orientation, nalpha: usize, fa2: F) -> Vec<f64>
where
    F: Fn(f64) -> Vec<f64> + Sync,
{
    match orientation.clamped() {
        Orientation::Fixed(a) => fa2(a),
        Orientation::Range(a0, a1) => {
            let (nodes, weights) = gauss_nodes(a0, a1, nalpha.max(2));
            let rows: Vec<Vec<f64>> = nodes.par_iter().map(|&a| fa2(a)).collect();
            let norm = a0.cos() - a1.cos();
            let mut out = vec![0.0; nq];
            for ((row, &w), &a) in rows.iter().zip(&weights).zip(&nodes) {
                for (o, v) in out.iter_mut().zip(row) {
                    *o += w * a.sin() * v;
                }
            }
            out.iter().map(|v| v / norm).collect()
        }
    }
}

/// Amplitude of a cylinder of radius `r` and length `l` at axis angle α.
///
/// `r = 0` is a thin rod of length `l`, `l = 0` an infinitely thin disc of
/// radius `r` (amplitude per unit thickness).
pub(crate) fn fa_cylinder(q: f64, r: f64, l: f64, alpha: f64) -> f64 {
    let (s, c) = alpha.sin_cos();
    match (r > 0.0, l > 0.0) {
        (true, true) => PI * r * r * l * j1x(q * r * s) * sinc(q * l * c / 2.0),
        (true, false) => PI * r * r * j1x(q * r * s),
        (false, true) => l * sinc(q * l * c / 2.0),
        (false, false) => 0.0,
    }
}

/// Amplitude of both spherical caps on a cylinder of radius `r` and length
/// `l`. The cap sphere centre sits at `±(l/2 + h)`: `h > 0` gives barbells,
/// `h < 0` lenses.
pub(crate) fn fa_caps(q: f64, r: f64, l: f64, h: f64, alpha: f64, ncap: usize) -> f64 {
    let big_r = (r * r + h * h).sqrt();
    if big_r == 0.0 {
        return 0.0;
    }
    let (s, c) = alpha.sin_cos();
    let lower = -h / big_r;
    fixed_gauss(
        |t| {
            let slice = (1.0 - t * t).max(0.0);
            2.0 * PI * big_r.powi(3) * (q * c * (big_r * t + h + l / 2.0)).cos() * slice * j1x(q * big_r * s * slice.sqrt())
        },
        lower,
        1.0,
        ncap,
    )
}

pub(crate) struct CylinderShells {
    radii: Vec<f64>,
    dsld: Vec<f64>,
}

impl CylinderShells {
    pub(crate) fn new(shells: &[(f64, f64)], solvent_sld: f64) -> Result<Self> {
        if shells.is_empty() {
            return Err(SasError::config("at least one cylinder shell is needed"));
        }
        let mut radii = Vec::with_capacity(shells.len());
        let mut r = 0.0;
        for (t, _) in shells {
            non_negative("cylinder shell thickness", *t)?;
            r += t;
            radii.push(r);
        }
        Ok(Self {
            radii,
            dsld: shells.iter().map(|(_, s)| s - solvent_sld).collect(),
        })
    }

    /// Amplitude at axis angle `alpha`; `cap` is `(height, gauss nodes)`.
    pub(crate) fn amplitude(&self, q: f64, l: f64, alpha: f64, cap: Option<(f64, usize)>) -> f64 {
        let one = |r: f64| {
            let body = if l > 0.0 || cap.is_none() { fa_cylinder(q, r, l, alpha) } else { 0.0 };
            let caps = match cap {
                Some((h, n)) if r > 0.0 => fa_caps(q, r, l, h, alpha, n),
                _ => 0.0,
            };
            body + caps
        };
        self.radii
            .iter()
            .enumerate()
            .map(|(k, &r)| {
                let inner = if k == 0 { 0.0 } else { one(self.radii[k - 1]) };
                self.dsld[k] * (one(r) - inner)
            })
            .sum()
    }
}

/// Radially layered cylinder of length `length`. `shells` are
/// `(thickness, sld)` pairs from the axis outwards. `cap_height` adds
/// spherical end caps; `nalpha` Gauss nodes are used for the average.
///
/// Columns `q; Iq`.
pub fn multi_shell_cylinder(
    q: &[f64],
    length: f64,
    shells: &[(f64, f64)],
    solvent_sld: f64,
    orientation: Orientation,
    cap_height: Option<f64>,
    nalpha: usize,
) -> Result<Series> {
    non_negative("cylinder length", length)?;
    let sh = CylinderShells::new(shells, solvent_sld)?;
    let cap = cap_height.map(|h| (h, 31));
    let iq = orientation_average(q.len(), orientation, nalpha, |a| {
        q.iter().map(|&x| sh.amplitude(x, length, a, cap).powi(2)).collect()
    });
    let fa0 = sh.amplitude(0.0, length, 0.0, cap);
    let outer = sh.radii[sh.radii.len() - 1];
    let mut out = model_series(q, vec![iq], "q; Iq", "multiShellCylinder")?;
    out.put("outerCylinderVolume", PI * outer * outer * length);
    out.put("Radius", outer);
    out.put("cylinderLength", length);
    out.put("alpha", orientation.describe());
    out.put("shellradii", AttrValue::List(sh.radii.clone()));
    out.put("solventSLD", solvent_sld);
    if let Some(h) = cap_height {
        out.put("capHeight", h);
        out.put("capRadii", AttrValue::List(sh.radii.iter().map(|r| (r * r + h * h).sqrt()).collect()));
    }
    out.put("I0", fa0 * fa0);
    Ok(out)
}

/// Homogeneous cylinder, optionally with caps.
pub fn cylinder(
    q: &[f64],
    length: f64,
    radius: f64,
    sld: f64,
    solvent_sld: f64,
    orientation: Orientation,
    cap_height: Option<f64>,
) -> Result<Series> {
    let mut out = multi_shell_cylinder(q, length, &[(radius, sld)], solvent_sld, orientation, cap_height, 90)?;
    out.modelname = Some("cylinder".into());
    Ok(out)
}

/// Disc of radius `radius` and thickness `thickness`.
pub fn disc(q: &[f64], radius: f64, thickness: f64, sld: f64, solvent_sld: f64, orientation: Orientation) -> Result<Series> {
    let mut out = multi_shell_cylinder(q, thickness, &[(radius, sld)], solvent_sld, orientation, None, 60)?;
    out.modelname = Some("disc".into());
    Ok(out)
}

/// Cylinder with a Gaussian-smeared surface of width `sigma_surf`: the
/// amplitude is damped by `exp(−σ²q²/2)`.
pub fn fuzzy_cylinder(
    q: &[f64],
    length: f64,
    radius: f64,
    sigma_surf: f64,
    sld: f64,
    solvent_sld: f64,
    orientation: Orientation,
) -> Result<Series> {
    non_negative("cylinder length", length)?;
    non_negative("cylinder radius", radius)?;
    non_negative("surface width", sigma_surf)?;
    let dsld = sld - solvent_sld;
    let iq = orientation_average(q.len(), orientation, 90, |a| {
        q.iter()
            .map(|&x| (dsld * fa_cylinder(x, radius, length, a) * (-sigma_surf.powi(2) * x * x / 2.0).exp()).powi(2))
            .collect()
    });
    let fa0 = dsld * fa_cylinder(0.0, radius, length, 0.0);
    let mut out = model_series(q, vec![iq], "q; Iq", "fuzzyCylinder")?;
    out.put("cylinderVolume", PI * radius * radius * length);
    out.put("radius", radius);
    out.put("cylinderLength", length);
    out.put("sigmasurf", sigma_surf);
    out.put("alpha", orientation.describe());
    out.put("I0", fa0 * fa0);
    Ok(out)
}

/// Disc with shells growing in both directions: shell k adds
/// `radial[k]` to the radius and `axial[k]` on each face (the first
/// axial value is the full core thickness).
pub fn multi_shell_disc(
    q: &[f64],
    radial: &[f64],
    axial: &[f64],
    shell_sld: &[f64],
    solvent_sld: f64,
    orientation: Orientation,
) -> Result<Series> {
    let n = shell_sld.len();
    if n == 0 || radial.len() != n || axial.len() != n {
        return Err(SasError::config("radial, axial and SLD shell lists must have the same non-zero length"));
    }
    let mut radii = Vec::with_capacity(n);
    let mut thick = Vec::with_capacity(n);
    let (mut r, mut d) = (0.0, 0.0);
    for k in 0..n {
        r += radial[k].abs();
        d += if k == 0 { axial[0].abs() } else { 2.0 * axial[k].abs() };
        radii.push(r);
        thick.push(d);
    }
    let dsld: Vec<f64> = shell_sld.iter().map(|s| s - solvent_sld).collect();
    let amplitude = |x: f64, a: f64| -> f64 {
        (0..n)
            .map(|k| {
                let inner = if k == 0 { 0.0 } else { fa_cylinder(x, radii[k - 1], thick[k - 1], a) };
                dsld[k] * (fa_cylinder(x, radii[k], thick[k], a) - inner)
            })
            .sum()
    };
    let iq = orientation_average(q.len(), orientation, 60, |a| q.iter().map(|&x| amplitude(x, a).powi(2)).collect());
    let fa0 = amplitude(0.0, 0.0);
    let mut out = model_series(q, vec![iq], "q; Iq", "multiShellDisc")?;
    out.put("outerDiscVolume", PI * r * r * d);
    out.put("radii", AttrValue::List(radii));
    out.put("discthickness", AttrValue::List(thick));
    out.put("alpha", orientation.describe());
    out.put("I0", fa0 * fa0);
    Ok(out)
}

/// Rectangular cuboid with edges `a`, `b`, `c`, averaged with `n` Gauss
/// nodes per angle.
pub fn cuboid(q: &[f64], a: f64, b: f64, c: f64, sld: f64, solvent_sld: f64, n: usize) -> Result<Series> {
    if a <= 0.0 || b <= 0.0 || c <= 0.0 {
        return Err(SasError::config("cuboid edges must be > 0"));
    }
    let contrast = sld - solvent_sld;
    let volume = a * b * c;
    let i0 = (volume * contrast).powi(2);
    let (phi, wphi) = gauss_nodes(0.0, PI / 2.0, n);
    let (theta, wtheta) = gauss_nodes(0.0, PI / 2.0, n);
    let iq = q
        .iter()
        .map(|&x| {
            let mut sum = 0.0;
            for (&p, &wp) in phi.iter().zip(&wphi) {
                let (sp, cp) = p.sin_cos();
                for (&t, &wt) in theta.iter().zip(&wtheta) {
                    let (st, ct) = t.sin_cos();
                    let f = sinc(x * a * st * cp / 2.0) * sinc(x * b * st * sp / 2.0) * sinc(x * c * ct / 2.0);
                    sum += wp * wt * f * f * st;
                }
            }
            i0 * sum * 2.0 / PI
        })
        .collect();
    let mut out = model_series(q, vec![iq], "q; Iq", "cuboid")?;
    out.put("I0", i0);
    out.put("edges", AttrValue::List(vec![a, b, c]));
    out.put("contrast", contrast);
    Ok(out)
}

/// Squared amplitude of an equilateral triangular prism with edge `2r`
/// and height `h` for the wavevector components.
fn prism_fq(qx: f64, qy: f64, qz: f64, r: f64, h: f64) -> f64 {
    let sq3 = 3f64.sqrt();
    let q = (qx * qx + qy * qy + qz * qz).sqrt();
    // The closed form is singular on the lines qx = 0 and qx² = 3qy².
    let mut qx = qx;
    while (qx * (qx * qx - 3.0 * qy * qy)).abs() < 1e-9 * q.powi(3).max(1e-300) {
        qx += 1e-6 * q.max(1e-12);
    }
    let i = Complex64::i();
    let fa = 2.0 * sq3 * (-i * qy * r / sq3).exp() * h / (qx * (qx * qx - 3.0 * qy * qy))
        * (qx * (i * qy * r * sq3).exp() - qx * (qx * r).cos() - i * sq3 * qy * (qx * r).sin())
        * sinc(qz * h / 2.0);
    fa.norm_sqr()
}

/// Equilateral triangular prism (edge `2r`, height `h`) averaged over
/// `2·n + 1` Fibonacci directions.
pub fn prism(q: &[f64], r: f64, h: f64, sld: f64, solvent_sld: f64, n: usize) -> Result<Series> {
    if r <= 0.0 || h <= 0.0 {
        return Err(SasError::config("prism edge and height must be > 0"));
    }
    let volume = 3f64.sqrt() * r * r * h;
    let contrast = sld - solvent_sld;
    let dirs = fibonacci_sphere(n.max(1));
    let iq = q
        .iter()
        .map(|&x| {
            if x == 0.0 {
                return (volume * contrast).powi(2);
            }
            let sum: f64 = dirs.iter().map(|d| prism_fq(x * d.x, x * d.y, x * d.z, r, h)).sum();
            contrast * contrast * sum / dirs.len() as f64
        })
        .collect();
    let mut out = model_series(q, vec![iq], "q; Iq", "prism")?;
    out.put("I0", (volume * contrast).powi(2));
    out.put("height", h);
    out.put("edge", r);
    out.put("volume", volume);
    out.put("contrast", contrast);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formfactor::sphere;
    use crate::math::grid::linspace;

    #[test]
    fn forward_intensity_is_volume_squared() {
        let c = cylinder(&[0.0, 1e-4], 20.0, 3.0, 2.0, 1.0, Orientation::default(), None).unwrap();
        let v = PI * 9.0 * 20.0;
        assert!((c.y()[0] / (v * v) - 1.0).abs() < 1e-9);
        assert!((c.y()[1] / (v * v) - 1.0).abs() < 1e-5);
        assert_eq!(c.attr_f64("I0"), Some(v * v));
    }

    #[test]
    fn long_rod_follows_one_over_q() {
        // For L ≫ 1/q ≫ R the average tends to π/(qL) · (πR²L)².
        let (l, r) = (2000.0, 0.5);
        let q = [0.05, 0.1];
        let c = cylinder(&q, l, r, 1.0, 0.0, Orientation::default(), None).unwrap();
        let v = PI * r * r * l;
        for (i, x) in q.iter().enumerate() {
            let expected = PI / (x * l) * v * v;
            assert!((c.y()[i] / expected - 1.0).abs() < 0.03, "q={x}");
        }
    }

    #[test]
    fn hemispherical_caps_on_zero_length_make_a_sphere() {
        let q = linspace(0.01, 1.5, 20);
        let r = 3.0;
        let c = cylinder(&q, 0.0, r, 1.0, 0.0, Orientation::default(), Some(0.0)).unwrap();
        let s = sphere(&q, r, 1.0).unwrap();
        for i in 0..q.len() {
            assert!((c.y()[i] - s.y()[i]).abs() < 1e-4 * s.y()[0], "i={i}");
        }
    }

    #[test]
    fn fixed_orientation_matches_single_angle() {
        let q = [0.3];
        let a = cylinder(&q, 10.0, 2.0, 1.0, 0.0, Orientation::Fixed(0.4), None).unwrap();
        let expected = fa_cylinder(0.3, 2.0, 10.0, 0.4).powi(2);
        assert!((a.y()[0] - expected).abs() < 1e-12 * expected);
    }

    #[test]
    fn fuzzy_surface_reduces_high_q() {
        let q = [0.0, 1.0];
        let plain = cylinder(&q, 10.0, 2.0, 1.0, 0.0, Orientation::default(), None).unwrap();
        let fuzzy = fuzzy_cylinder(&q, 10.0, 2.0, 0.5, 1.0, 0.0, Orientation::default()).unwrap();
        assert!((fuzzy.y()[0] - plain.y()[0]).abs() < 1e-9 * plain.y()[0]);
        assert!(fuzzy.y()[1] < plain.y()[1]);
    }

    #[test]
    fn single_shell_disc_equals_disc() {
        let q = linspace(0.01, 1.0, 15);
        let a = multi_shell_disc(&q, &[5.0], &[2.0], &[1.0], 0.0, Orientation::default()).unwrap();
        let b = disc(&q, 5.0, 2.0, 1.0, 0.0, Orientation::default()).unwrap();
        for i in 0..q.len() {
            assert!((a.y()[i] - b.y()[i]).abs() < 1e-9 * b.y()[0]);
        }
    }

    #[test]
    fn cube_forward_and_guinier() {
        let q = [0.0, 0.01];
        let c = cuboid(&q, 4.0, 4.0, 4.0, 1.0, 0.0, 30).unwrap();
        assert!((c.y()[0] - 4096.0).abs() < 1e-6);
        // Rg² = a²/4 for a cube.
        let expected = 4096.0 * (-0.0001 * 4.0 / 3.0_f64).exp();
        assert!((c.y()[1] / expected - 1.0).abs() < 1e-5);
    }

    #[test]
    fn prism_forward_scattering() {
        let q = [0.0, 1e-3];
        let p = prism(&q, 2.0, 3.0, 1.0, 0.0, 100).unwrap();
        let v = 3f64.sqrt() * 4.0 * 3.0;
        assert!((p.y()[0] - v * v).abs() < 1e-9);
        assert!((p.y()[1] / (v * v) - 1.0).abs() < 1e-4);
    }
}
