//! Spheres, radial shells, ellipsoids and superballs.

use std::f64::consts::PI;

use crate::error::{Result, SasError};
use crate::formfactor::cloud::{orientational_average, quasi_random_box, AverageOptions, CloudPoint};
use crate::formfactor::{model_series, non_negative};
use crate::math::quadrature::adaptive_gauss_many;
use crate::math::special::gamma;
use crate::series::{AttrValue, Series};

/// Normalised sphere amplitude `3(sin x − x cos x)/x³`, 1 at the origin.
pub fn fa_sphere(qr: f64) -> f64 {
    // the closed form cancels badly for small arguments
    if qr.abs() < 1e-2 {
        let x2 = qr * qr;
        1.0 - x2 / 10.0 + x2 * x2 / 280.0
    } else {
        3.0 * (qr.sin() - qr * qr.cos()) / qr.powi(3)
    }
}

/// Homogeneous sphere of `radius` and scattering length density difference
/// `contrast`. Columns `q; Iq; fa`.
pub fn sphere(q: &[f64], radius: f64, contrast: f64) -> Result<Series> {
    non_negative("sphere radius", radius)?;
    let fa0 = 4.0 / 3.0 * PI * radius.powi(3) * contrast;
    let fa: Vec<f64> = q.iter().map(|&x| fa0 * fa_sphere(x * radius)).collect();
    let iq = fa.iter().map(|v| v * v).collect();
    let mut out = model_series(q, vec![iq, fa], "q; Iq; fa", "sphere")?;
    out.put("radius", radius);
    out.put("I0", fa0 * fa0);
    out.put("fa0", fa0);
    out.put("contrast", contrast);
    Ok(out)
}

/// One radial shell, innermost first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shell {
    Constant { thickness: f64, sld: f64 },
    /// SLD changes linearly from `inner` to `outer` across the shell.
    Linear { thickness: f64, inner: f64, outer: f64 },
}

impl Shell {
    pub fn constant(thickness: f64, sld: f64) -> Self {
        Shell::Constant { thickness, sld }
    }

    pub fn thickness(&self) -> f64 {
        match self {
            Shell::Constant { thickness, .. } | Shell::Linear { thickness, .. } => *thickness,
        }
    }

    fn inner_sld(&self) -> f64 {
        match self {
            Shell::Constant { sld, .. } => *sld,
            Shell::Linear { inner, .. } => *inner,
        }
    }

    fn slope(&self) -> f64 {
        match self {
            Shell::Constant { .. } => 0.0,
            Shell::Linear { thickness, inner, outer } if *thickness > 0.0 => (outer - inner) / thickness,
            Shell::Linear { .. } => 0.0,
        }
    }
}

/// `∫₀^r 4πr'² sin(qr')/(qr') dr'`.
fn ball(q: f64, r: f64) -> f64 {
    4.0 * PI * ((q * r).sin() - q * r * (q * r).cos()) / q.powi(3)
}

/// Antiderivative of `4πr² (r − ri) sin(qr)/(qr)`.
fn ramp(q: f64, r: f64, ri: f64) -> f64 {
    let (s, c) = (q * r).sin_cos();
    4.0 * PI / q.powi(4) * (q * (2.0 * r - ri) * s + q * q * r * (ri - r) * c + 2.0 * c)
}

/// Radially layered sphere. Columns `q; Iq; fa`.
///
/// The innermost shell must have constant SLD. Attributes record the outer
/// radii and a contrast profile (`contrastprofile_r`, `contrastprofile_sld`).
pub fn multi_shell_sphere(q: &[f64], shells: &[Shell], solvent_sld: f64) -> Result<Series> {
    if shells.is_empty() {
        return Err(SasError::config("at least one shell is needed"));
    }
    if matches!(shells[0], Shell::Linear { .. }) {
        return Err(SasError::config("innermost shell needs a constant SLD"));
    }
    for s in shells {
        non_negative("shell thickness", s.thickness())?;
    }
    let mut radii = Vec::with_capacity(shells.len());
    let mut r = 0.0;
    for s in shells {
        r += s.thickness();
        radii.push(r);
    }
    let rmax = r;
    if rmax <= 0.0 {
        return Err(SasError::config("shells have zero total thickness"));
    }
    let inner = |k: usize| if k == 0 { 0.0 } else { radii[k - 1] };

    let fa0: f64 = shells
        .iter()
        .enumerate()
        .map(|(k, s)| {
            let (ri, ro) = (inner(k), radii[k]);
            let constant = (s.inner_sld() - solvent_sld) * 4.0 / 3.0 * PI * (ro.powi(3) - ri.powi(3));
            let linear = s.slope() * 4.0 * PI * ((ro.powi(4) - ri.powi(4)) / 4.0 - ri * (ro.powi(3) - ri.powi(3)) / 3.0);
            constant + linear
        })
        .sum();
    let qlimit = 5e-3 / rmax;
    let fa: Vec<f64> = q
        .iter()
        .map(|&x| {
            if x < qlimit {
                return fa0;
            }
            shells
                .iter()
                .enumerate()
                .map(|(k, s)| {
                    let (ri, ro) = (inner(k), radii[k]);
                    let outer_ball = ball(x, ro) - if ri > 0.0 { ball(x, ri) } else { 0.0 };
                    let mut v = (s.inner_sld() - solvent_sld) * outer_ball;
                    let slope = s.slope();
                    if slope != 0.0 {
                        v += slope * (ramp(x, ro, ri) - ramp(x, ri, ri));
                    }
                    v
                })
                .sum()
        })
        .collect();
    let iq = fa.iter().map(|v| v * v).collect();
    let mut out = model_series(q, vec![iq, fa], "q; Iq; fa", "multiShellSphere")?;
    let mut prof_r = Vec::new();
    let mut prof_sld = Vec::new();
    for (k, s) in shells.iter().enumerate() {
        prof_r.extend([inner(k), radii[k]]);
        prof_sld.extend([s.inner_sld(), s.inner_sld() + s.slope() * s.thickness()]);
    }
    out.put("shellradii", AttrValue::List(radii));
    out.put("contrastprofile_r", AttrValue::List(prof_r));
    out.put("contrastprofile_sld", AttrValue::List(prof_sld));
    out.put("outerVolume", 4.0 / 3.0 * PI * rmax.powi(3));
    out.put("solventSLD", solvent_sld);
    out.put("I0", fa0 * fa0);
    out.put("fa0", fa0);
    Ok(out)
}

/// Rotational ellipsoid with semi-axis `ra` along the rotation axis and
/// `rb` perpendicular to it. See [`multi_shell_ellipsoid`].
pub fn ellipsoid(q: &[f64], ra: f64, rb: f64, sld: f64, solvent_sld: f64, alpha: (f64, f64)) -> Result<Series> {
    let mut out = multi_shell_ellipsoid(q, &[ra], &[rb], &[sld], solvent_sld, alpha)?;
    out.modelname = Some("ellipsoid".into());
    out.put("RotationAxisRadius", ra);
    out.put("RotatedAxisRadius", rb);
    Ok(out)
}

/// Layered rotational ellipsoid averaged over orientations whose axis
/// makes an angle in `alpha` (degrees, `(0, 90)` is isotropic) with q.
///
/// Columns `q; Iq; beta` with the asymmetry factor `beta = <fa>²/<fa²>`.
pub fn multi_shell_ellipsoid(
    q: &[f64],
    pole_shells: &[f64],
    equator_shells: &[f64],
    shell_sld: &[f64],
    solvent_sld: f64,
    alpha: (f64, f64),
) -> Result<Series> {
    let n = shell_sld.len();
    if n == 0 || pole_shells.len() != n || equator_shells.len() != n {
        return Err(SasError::config(format!(
            "pole ({}), equator ({}) and SLD ({n}) shell lists must have the same non-zero length",
            pole_shells.len(),
            equator_shells.len()
        )));
    }
    let cumulative = |v: &[f64]| {
        v.iter()
            .scan(0.0, |acc, x| {
                *acc += x.abs();
                Some(*acc)
            })
            .collect::<Vec<f64>>()
    };
    let requ = cumulative(equator_shells);
    let rpol = cumulative(pole_shells);
    if requ.iter().chain(&rpol).any(|r| *r <= 0.0) {
        return Err(SasError::config("ellipsoid radii must be > 0"));
    }
    let dsld: Vec<f64> = shell_sld.iter().map(|s| s - solvent_sld).collect();
    let vr: Vec<f64> = requ.iter().zip(&rpol).map(|(e, p)| 4.0 / 3.0 * PI * e * e * p).collect();
    // Weight of shell k's ellipsoid after subtracting the next shell's contrast.
    let weight: Vec<f64> = (0..n)
        .map(|k| vr[k] * (dsld[k] - if k + 1 < n { dsld[k + 1] } else { 0.0 }))
        .collect();
    let fa0: f64 = weight.iter().sum();
    let scale: f64 = weight.iter().map(|w| w.abs()).sum::<f64>().max(f64::MIN_POSITIVE);

    let (x0, x1) = {
        let a = alpha.0.to_radians().cos();
        let b = alpha.1.to_radians().cos();
        (a.min(b), a.max(b))
    };
    let amplitude = |x: f64, qv: f64| -> f64 {
        (0..n)
            .map(|k| {
                let nu = rpol[k] / requ[k];
                let z = qv * requ[k] * (1.0 + x * x * (nu * nu - 1.0)).sqrt();
                weight[k] * fa_sphere(z)
            })
            .sum::<f64>()
            / scale
    };
    let nq = q.len();
    let (fq, fa) = if (x1 - x0).abs() < 1e-12 {
        let fa: Vec<f64> = q.iter().map(|&qv| amplitude(x0, qv)).collect();
        (fa.iter().map(|v| v * v).collect::<Vec<f64>>(), fa)
    } else {
        let both = adaptive_gauss_many(
            |x| {
                let fa: Vec<f64> = q.iter().map(|&qv| amplitude(x, qv)).collect();
                fa.iter().map(|v| v * v).chain(fa.iter().copied()).collect()
            },
            x0,
            x1,
            1e-10,
            1e-7,
            2048,
        )?;
        let width = x1 - x0;
        (
            both[..nq].iter().map(|v| v / width).collect(),
            both[nq..].iter().map(|v| v / width).collect(),
        )
    };
    let iq: Vec<f64> = fq.iter().map(|v| v * scale * scale).collect();
    let beta: Vec<f64> = fa
        .iter()
        .zip(&fq)
        .map(|(a, f)| if *f > 0.0 { a * a / f } else { 1.0 })
        .collect();
    let mut out = model_series(q, vec![iq, beta], "q; Iq; beta", "multiShellEllipsoid")?;
    out.put("equatorshellradii", AttrValue::List(requ.clone()));
    out.put("poleshellradii", AttrValue::List(rpol.clone()));
    out.put("outerVolume", vr[n - 1]);
    out.put("alpha", AttrValue::List(vec![alpha.0, alpha.1]));
    out.put("I0", fa0 * fa0);
    Ok(out)
}

/// Superball `|x|^2p + |y|^2p + |z|^2p ≤ R^2p` (p = 0.5 octahedron,
/// p = 1 sphere, p → ∞ cube) represented by a quasi-random point cloud.
///
/// Columns `q; Iq; beta; fa`; `n_grid` sets the cloud density.
pub fn superball(q: &[f64], radius: f64, p: f64, sld: f64, solvent_sld: f64, n_grid: usize) -> Result<Series> {
    if radius <= 0.0 || p <= 0.0 {
        return Err(SasError::config("superball radius and p must be > 0"));
    }
    let p2 = 2.0 * p.min(101.0);
    let radius = radius.abs();
    let contrast = sld - solvent_sld;
    let frac = gamma(1.0 + 1.0 / p2).powi(3) / gamma(1.0 + 3.0 / p2);
    let volume = 8.0 * radius.powi(3) * frac;
    let count = ((n_grid.pow(3) as f64) / frac) as usize;
    let norm = |v: &nalgebra::Vector3<f64>| {
        (v.x.abs().powf(p2) + v.y.abs().powf(p2) + v.z.abs().powf(p2)).powf(1.0 / p2)
    };
    let points: Vec<CloudPoint> = quasi_random_box(radius, count)
        .into_iter()
        .filter(|v| norm(v) < radius)
        .map(|v| CloudPoint::new(v, 1.0))
        .collect();
    let opts = AverageOptions {
        n: 4 * n_grid,
        ..AverageOptions::default()
    };
    let cloud = orientational_average(q, &points, None, &opts)?;
    let i0 = (volume * contrast).powi(2);
    let iq: Vec<f64> = cloud.y().iter().map(|v| v * i0).collect();
    let beta = cloud.column(2).map(<[f64]>::to_vec).unwrap_or_default();
    let fa: Vec<f64> = cloud.column(3).unwrap_or_default().iter().map(|v| v * volume * contrast).collect();
    let mut out = model_series(q, vec![iq, beta, fa], "q; Iq; beta; fa", "superball")?;
    out.put("R", radius);
    out.put("Volume", volume);
    out.put("rounding_p", p2 / 2.0);
    out.put("contrast", contrast);
    out.put("I0", i0);
    out.put("cloudpoints", points.len() as f64);
    Ok(out)
}
