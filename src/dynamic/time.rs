//! Intermediate scattering functions `I(q,t)`.

use std::f64::consts::{PI, SQRT_2};

use nalgebra::Vector3;
use num_complex::Complex64;

use crate::dynamic::{dynamic_series, positive, KB};
use crate::error::{Result, SasError};
use crate::math::faddeeva::erfi;
use crate::math::mittag_leffler::mittag_leffler_a;
use crate::math::quadrature::fixed_gauss;
use crate::math::special::{erf, gamma, normalized_legendre_m, si, sinc, spherical_jn_all};
use crate::series::Series;

/// `A exp(−q²(D t + ½|w|w t²))`; `w` adds a ballistic-like term.
pub fn simple_diffusion(q: f64, t: &[f64], d: f64, w: f64, amplitude: f64) -> Result<Series> {
    let y = t.iter().map(|&t| amplitude * (-q * q * (d * t + 0.5 * w.abs() * w * t * t)).exp()).collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "simple_diffusion")?;
    out.put("amplitude", amplitude);
    out.put("Diffusioncoefficient", d);
    out.put("wavevector", q);
    Ok(out)
}

/// Sum of two [`simple_diffusion`] terms with amplitudes `a0`, `a1`.
#[allow(clippy::too_many_arguments)]
pub fn double_diffusion(q: f64, t: &[f64], a0: f64, d0: f64, w0: f64, a1: f64, d1: f64, w1: f64) -> Result<Series> {
    let term = |a: f64, d: f64, w: f64, t: f64| a * (-q * q * (d * t + 0.5 * w.abs() * w * t * t)).exp();
    let y = t.iter().map(|&t| term(a0, d0, w0, t) + term(a1, d1, w1, t)).collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "double_diffusion")?;
    out.put("amplitude0", a0);
    out.put("D0", d0);
    out.put("amplitude1", a1);
    out.put("D1", d1);
    out.put("wavevector", q);
    Ok(out)
}

/// Cumulant expansion in terms of diffusion-like coefficients:
/// `k0 exp(−q²(k1 t + ½|k2|k2 t² + k3³t³/6 + |k4|k4³t⁴/24 + (k5 t)⁵/120))`.
pub fn cumulant_diff(t: &[f64], q: f64, k: [f64; 6]) -> Result<Series> {
    let [k0, k1, k2, k3, k4, k5] = k;
    let y = t
        .iter()
        .map(|&t| {
            let e = k1 * t
                + 0.5 * k2.abs() * k2 * t * t
                + k3.powi(3) * t.powi(3) / 6.0
                + k4.abs() * k4.powi(3) * t.powi(4) / 24.0
                + (k5 * t).powi(5) / 120.0;
            k0 * (-q * q * e).exp()
        })
        .collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "cumulant_diff")?;
    out.put("k0tok5", k.to_vec());
    out.put("wavevector", q);
    Ok(out)
}

/// Plain cumulant series `k0 exp(−k1x + k2x²/2 − k3x³/6 + k4x⁴/24 − k5x⁵/120)`.
pub fn cumulant(x: &[f64], k: [f64; 6]) -> Result<Series> {
    let [k0, k1, k2, k3, k4, k5] = k;
    let y = x
        .iter()
        .map(|&x| {
            k0 * (-k1 * x + k2 * x * x / 2.0 - k3 * x.powi(3) / 6.0 + k4 * x.powi(4) / 24.0 - k5 * x.powi(5) / 120.0)
                .exp()
        })
        .collect();
    let mut out = dynamic_series(x, vec![y], "t; Iqt", "cumulant")?;
    out.put("k0tok5", k.to_vec());
    Ok(out)
}

/// Cumulant form used for dynamic light scattering correlation functions
/// with relaxation time `g`, polydispersity `sigma` and `skewness`.
pub fn cumulant_dls(t: &[f64], a: f64, g: f64, sigma: f64, skewness: f64, bgr: f64) -> Result<Series> {
    positive("relaxation time", g)?;
    let y = t
        .iter()
        .map(|&t| {
            let poly = 1.0 + (sigma / g * t).powi(2) / 2.0 - (skewness / g * t).powi(3) / 6.0;
            a * (-t / g).exp() * poly + bgr
        })
        .collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "cumulant_dls")?;
    out.put("A", a);
    out.put("relaxationtime", g);
    out.put("sigma", sigma);
    out.put("skewness", skewness);
    out.put("elastic", bgr);
    Ok(out)
}

/// `amp exp(−(γt)^β)`.
pub fn stretched_exp(t: &[f64], gamma: f64, beta: f64, amp: f64) -> Result<Series> {
    let y = t.iter().map(|&t| amp * (-(t * gamma).powf(beta)).exp()).collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "stretched_exp")?;
    out.put("amp", amp);
    out.put("gamma", gamma);
    out.put("beta", beta);
    Ok(out)
}

/// Random jump diffusion with residence time `t0` and jump length `l0`:
/// `Γ = Dq²/(1 + Dq²t0)` with `D = l0²/(6 t0)`.
pub fn jump_diffusion(t: &[f64], q: f64, t0: f64, l0: f64) -> Result<Series> {
    positive("residence time", t0)?;
    let d = l0 * l0 / 6.0 / t0;
    let rate = d * q * q / (1.0 + d * q * q * t0);
    let y = t.iter().map(|&t| (-rate * t).exp()).collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "jump_diffusion")?;
    out.put("residencetime", t0);
    out.put("jumplength", l0);
    out.put("diffusioncoefficient", d);
    Ok(out)
}

/// Three-site methyl group rotation with a stretched relaxation.
/// `fraction` of the hydrogens take part, `rhh` is the H–H distance.
pub fn methyl_rotation(t: &[f64], q: f64, t0: f64, fraction: f64, rhh: f64, beta: f64) -> Result<Series> {
    positive("residence time", t0)?;
    let eisf = (1.0 + 2.0 * sinc(q * rhh)) / 3.0;
    let y = t
        .iter()
        .map(|&t| (1.0 - fraction) + fraction * (eisf + (1.0 - eisf) * (-(t / t0).powf(beta)).exp()))
        .collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "methyl_rotation")?;
    out.put("wavevector", q);
    out.put("residencetime", t0);
    out.put("rhh", rhh);
    out.put("beta", beta);
    out.put("EISF", eisf);
    out.put("methylfraction", fraction);
    Ok(out)
}

/// `√π/2 e^{−a} erfi(√a)/√a`, the 2-D EISF kernel.
fn planar_kernel(a: f64) -> f64 {
    if a < 1e-10 {
        return 1.0 - 2.0 * a / 3.0;
    }
    0.5 * PI.sqrt() * (-a).exp() * erfi(a.sqrt()) / a.sqrt()
}

/// `√π/2 erf(√a)/√a`, the 1-D EISF kernel.
fn linear_kernel(a: f64) -> f64 {
    if a < 1e-10 {
        return 1.0 - a / 3.0;
    }
    0.5 * PI.sqrt() * erf(a.sqrt()) / a.sqrt()
}

/// Diffusion in a harmonic potential with mean square displacement `rmsd²`
/// and relaxation time `tau`, for `ndim` of 1, 2 or 3.
///
/// `beta ≤ 0` uses an exponential memory `1 − exp(−t/τ)`, `beta > 0` the
/// algebraic form `1 − (1 + t/(τβ))^(−β)`. The value at t = 0 is the EISF.
pub fn diffusion_harmonic_potential(t: &[f64], q: f64, rmsd: f64, tau: f64, beta: f64, ndim: usize) -> Result<Series> {
    positive("tau", tau)?;
    let kernel: fn(f64) -> f64 = match ndim {
        3 => |a: f64| (-a).exp(),
        2 => planar_kernel,
        1 => linear_kernel,
        other => return Err(SasError::config(format!("ndim should be one of 1, 2, 3, got {other}"))),
    };
    let q2u2 = q * q * rmsd * rmsd;
    let eisf = kernel(q2u2);
    let y = t
        .iter()
        .map(|&t| {
            if t == 0.0 {
                return eisf;
            }
            let ft = if beta <= 0.0 { 1.0 - (-t / tau).exp() } else { 1.0 - (1.0 + t / tau / beta).powf(-beta) };
            kernel(q2u2 * ft)
        })
        .collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "diffusion_harmonic_potential")?;
    out.put("tau", tau);
    out.put("Ds", rmsd * rmsd / tau);
    out.put("rmsd", rmsd);
    out.put("EISF", eisf);
    out.put("wavevector", q);
    out.put("dimension", ndim as f64);
    Ok(out)
}

/// Fractional diffusion of a particle hopping between traps.
///
/// The in-trap mean square displacement `6u²(1 − E_γ(−(t/τ)^γ))` does not
/// depend on q, so it is computed once for a time grid and reused for every
/// wavevector.
#[derive(Debug, Clone)]
pub struct PeriodicPotential {
    t: Vec<f64>,
    u: f64,
    rt: f64,
    dg: f64,
    gamma: f64,
    trap_msd: Vec<f64>,
}

impl PeriodicPotential {
    /// `u` trap size, `rt` in-trap relaxation time, `dg` fractional
    /// long-time diffusion coefficient, `gamma` in (0, 1].
    pub fn new(t: &[f64], u: f64, rt: f64, dg: f64, gamma: f64) -> Result<Self> {
        positive("relaxation time", rt)?;
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(SasError::config(format!("fractional exponent must be in (0, 1], got {gamma}")));
        }
        let trap_msd = t
            .iter()
            .map(|&t| {
                if t <= 0.0 {
                    return Ok(0.0);
                }
                let e = mittag_leffler_a(-(t / rt).powf(gamma), gamma)?;
                Ok(6.0 * u * u * (1.0 - e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { t: t.to_vec(), u, rt, dg, gamma, trap_msd })
    }

    pub fn trap_msd(&self) -> &[f64] {
        &self.trap_msd
    }

    /// Columns `t; Iqt; Iqt_diff; Iqt_trap`: the full ISF, the free
    /// fractional diffusion including the trap plateau, and the trap part.
    pub fn at(&self, q: f64) -> Result<Series> {
        let g1 = gamma(self.gamma + 1.0);
        let msd = |t: f64| 6.0 * self.dg * t.max(0.0).powf(self.gamma) / g1;
        let mut full = Vec::with_capacity(self.t.len());
        let mut diff = Vec::with_capacity(self.t.len());
        let mut trap = Vec::with_capacity(self.t.len());
        for (&t, &m) in self.t.iter().zip(&self.trap_msd) {
            let free = (-q * q / 6.0 * msd(t)).exp();
            let in_trap = (-q * q / 6.0 * m).exp();
            full.push(free * in_trap);
            diff.push((-q * q / 6.0 * (msd(t) + 6.0 * self.u * self.u)).exp());
            trap.push(in_trap);
        }
        let mut out = dynamic_series(&self.t, vec![full, diff, trap], "t; Iqt; Iqt_diff; Iqt_trap", "diffusion_periodic_potential")?;
        out.put("wavevector", q);
        out.put("fractionalDiffusionCoefficient", self.dg);
        out.put("displacement_u", self.u);
        out.put("relaxationtime", self.rt);
        out.put("fractionalCoefficient_gamma", self.gamma);
        Ok(out)
    }
}

/// Convenience wrapper around [`PeriodicPotential`] for a single q.
pub fn diffusion_periodic_potential(t: &[f64], q: f64, u: f64, rt: f64, dg: f64, gamma: f64) -> Result<Series> {
    PeriodicPotential::new(t, u, rt, dg, gamma)?.at(q)
}

/// Zimm kernel `g(y) = 2/π ∫₀^∞ cos(yx)/x² (1 − exp(−x^{3/2}/√2)) dx`.
///
/// Substituting `x = s²` removes the `x^{-1/2}` singularity at the origin;
/// beyond `X = 100` the bracket is 1 and the tail is integrated exactly.
fn zimm_g(y: f64) -> f64 {
    const X: f64 = 100.0;
    let smax = X.sqrt();
    let h = |s: f64| {
        if s < 1e-4 {
            SQRT_2 * (y * s * s).cos()
        } else {
            2.0 * (y * s * s).cos() * (-(-s.powi(3) / SQRT_2).exp_m1()) / s.powi(3)
        }
    };
    let panels = ((2.0 * y * smax * smax / PI).ceil() as usize).clamp(8, 4000);
    let width = smax / panels as f64;
    let body: f64 = (0..panels)
        .map(|p| {
            let a = p as f64 * width;
            fixed_gauss(&h, a, a + width, 16)
        })
        .sum();
    let tail = if y == 0.0 { 1.0 / X } else { (y * X).cos() / X - y * (PI / 2.0 - si(y * X)) };
    2.0 / PI * (body + tail)
}

/// Zimm dynamics of an infinite chain from the exact integral
/// `S(q,t) = ∫₀^∞ exp(−u − (Ωt)^{2/3} g(u(Ωt)^{2/3})) du` with
/// `Ω = q³k_BT/(6πη)`. `temp` in K, `viscosity` in Pa·s.
pub fn integral_zimm(t: &[f64], q: f64, temp: f64, viscosity: f64, amp: f64) -> Result<Series> {
    positive("viscosity", viscosity)?;
    positive("temperature", temp)?;
    let omega = (q * 1e9).powi(3) * KB * temp / (6.0 * PI * viscosity);
    let y = t
        .iter()
        .map(|&t| {
            let c = (omega * t.max(1e-20) * 1e-9).powf(2.0 / 3.0);
            let integrand = |u: f64| (-u - c * zimm_g(u * c)).exp();
            let panels = 8;
            let width = 40.0 / panels as f64;
            let s: f64 = (0..panels).map(|p| fixed_gauss(&integrand, p as f64 * width, (p + 1) as f64 * width, 16)).sum();
            amp * s
        })
        .collect();
    let mut out = dynamic_series(t, vec![y], "t; Iqt", "integral_zimm")?;
    out.put("q", q);
    out.put("OmegaZimm", omega);
    out.put("Temperature", temp);
    out.put("viscosity", viscosity);
    out.put("amplitude", amp);
    Ok(out)
}

/// Point scatterer with incoherent and coherent scattering length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scatterer {
    pub pos: Vector3<f64>,
    pub b_inc: f64,
    pub b_coh: f64,
}

impl Scatterer {
    pub fn new(pos: Vector3<f64>) -> Self {
        Self { pos, b_inc: 1.0, b_coh: 1.0 }
    }
}

/// Points of a 10×10×10 grid spanning `[-R, R]³` that lie inside the sphere.
pub fn sphere_cloud(radius: f64) -> Vec<Scatterer> {
    let n = 10;
    let step = 2.0 * radius / (n - 1) as f64;
    let mut out = Vec::new();
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let p = Vector3::new(i as f64, j as f64, k as f64) * step - Vector3::repeat(radius);
                if p.norm() < radius {
                    out.push(Scatterer::new(p));
                }
            }
        }
    }
    out
}

/// Default multipole order `min(max(2⌊πqR/6·f⌋, lmin), 100)`.
pub(crate) fn auto_lmax(q: f64, cloud: &[Scatterer], factor: f64, lmin: usize) -> usize {
    let rmax = cloud.iter().map(|s| s.pos.norm()).fold(0.0, f64::max);
    (2 * (PI * q * rmax / 6.0 * factor) as usize).max(lmin).min(100)
}

/// Multipole strengths of a cloud: incoherent `Σ b_inc² (2l+1) j_l²` and
/// coherent `4π Σ_m |Σ b_coh j_l Y_lm|²` for `l = 0..=lmax`.
pub(crate) fn cloud_multipoles(q: f64, cloud: &[Scatterer], lmax: usize) -> (Vec<f64>, Vec<f64>) {
    let mut inc = vec![0.0; lmax + 1];
    let mut s = vec![vec![Complex64::new(0.0, 0.0); lmax + 1]; lmax + 1];
    for p in cloud {
        let r = p.pos.norm();
        let jl = spherical_jn_all(lmax, q * r);
        let (cos_theta, phi) = if r > 0.0 { (p.pos.z / r, p.pos.y.atan2(p.pos.x)) } else { (1.0, 0.0) };
        for l in 0..=lmax {
            inc[l] += p.b_inc * p.b_inc * (2 * l + 1) as f64 * jl[l] * jl[l];
        }
        for m in 0..=lmax {
            let plm = normalized_legendre_m(lmax, m, cos_theta);
            let phase = Complex64::from_polar(1.0, m as f64 * phi);
            for l in m..=lmax {
                s[l][m] += phase * (p.b_coh * jl[l] * plm[l - m]);
            }
        }
    }
    let coh = s
        .iter()
        .map(|row| {
            let sum: f64 = row.iter().enumerate().map(|(m, v)| if m == 0 { v.norm_sqr() } else { 2.0 * v.norm_sqr() }).sum();
            4.0 * PI * sum
        })
        .collect();
    (inc, coh)
}

/// Rotational and translational diffusion of a rigid cloud of scatterers.
///
/// `I(q,t) = exp(−q²D_t t) Σ_l S_l(q) exp(−l(l+1)D_r t)` for the incoherent
/// and the coherent multipoles. Columns `t; Iqtinc; Iqtcoh`.
pub fn trans_rot_diffusion(t: &[f64], q: f64, cloud: &[Scatterer], dr: f64, dt: f64, lmax: Option<usize>) -> Result<Series> {
    if cloud.is_empty() {
        return Err(SasError::config("scatterer cloud is empty"));
    }
    let lmax = lmax.unwrap_or_else(|| auto_lmax(q, cloud, 1.0, 6));
    let (inc, coh) = cloud_multipoles(q, cloud, lmax);
    let relax = |strength: &[f64], t: f64| -> f64 {
        strength.iter().enumerate().map(|(l, s)| s * (-((l * (l + 1)) as f64) * dr * t).exp()).sum()
    };
    let mut yinc = Vec::with_capacity(t.len());
    let mut ycoh = Vec::with_capacity(t.len());
    for &tt in t {
        let trans = (-q * q * dt * tt).exp();
        yinc.push(trans * relax(&inc, tt));
        ycoh.push(trans * relax(&coh, tt));
    }
    let mut out = dynamic_series(t, vec![yinc, ycoh], "t; Iqtinc; Iqtcoh", "trans_rot_diffusion")?;
    out.put("radiusOfGyration", cloud.iter().map(|s| s.pos.norm_squared()).sum::<f64>().sqrt());
    out.put("Iq_coh", coh.iter().sum::<f64>());
    out.put("Iq_inc", inc.iter().sum::<f64>());
    out.put("wavevector", q);
    out.put("rotDiffusion", dr);
    out.put("transDiffusion", dt);
    out.put("lmax", lmax as f64);
    Ok(out)
}

/// One Gaussian line of an instrument resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionPeak {
    pub mean: f64,
    pub sigma: f64,
    pub amp: f64,
}

/// Instrument resolution as a sum of Gaussians plus background.
///
/// In the time domain each line is a normalised Gaussian in t; in the
/// frequency domain ([`crate::dynamic::resolution_w`]) the lines are
/// unnormalised Gaussians in ω with widths given in 1/ns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    pub peaks: Vec<ResolutionPeak>,
    pub bgr: f64,
}

impl Resolution {
    pub fn single(sigma: f64) -> Self {
        Self { peaks: vec![ResolutionPeak { mean: 0.0, sigma, amp: 1.0 }], bgr: 0.0 }
    }

    pub fn push(mut self, mean: f64, sigma: f64, amp: f64) -> Self {
        self.peaks.push(ResolutionPeak { mean, sigma, amp });
        self
    }

    pub fn with_background(mut self, bgr: f64) -> Self {
        self.bgr = bgr;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.peaks.is_empty() {
            return Err(SasError::config("resolution needs at least one Gaussian"));
        }
        for p in &self.peaks {
            positive("resolution width", p.sigma)?;
        }
        Ok(())
    }

    pub(crate) fn annotate(&self, out: &mut Series) {
        out.put("means", self.peaks.iter().map(|p| p.mean).collect::<Vec<_>>());
        out.put("sigmas", self.peaks.iter().map(|p| p.sigma).collect::<Vec<_>>());
        out.put("amps", self.peaks.iter().map(|p| p.amp).collect::<Vec<_>>());
    }
}

/// Time-domain resolution, columns `t; Rqt`.
pub fn resolution(t: &[f64], res: &Resolution) -> Result<Series> {
    res.validate()?;
    let y = t
        .iter()
        .map(|&t| {
            let sum: f64 = res
                .peaks
                .iter()
                .map(|p| p.amp * (-0.5 * ((t - p.mean) / p.sigma).powi(2)).exp() / (2.0 * PI).sqrt() / p.sigma)
                .sum();
            sum + res.bgr
        })
        .collect();
    let mut out = dynamic_series(t, vec![y], "t; Rqt", "resolution")?;
    res.annotate(&mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::grid::linspace;
    use crate::math::quadrature::trapz;
    use approx::assert_relative_eq;

    #[test]
    fn simple_diffusion_decay() {
        let t = [0.0, 1.0, 2.0];
        let s = simple_diffusion(0.5, &t, 0.2, 0.0, 2.0).unwrap();
        assert_relative_eq!(s.y()[0], 2.0);
        assert_relative_eq!(s.y()[2], 2.0 * (-0.25 * 0.2 * 2.0f64).exp(), max_relative = 1e-12);
        assert!(s.ey().is_none());
        let d = double_diffusion(0.5, &t, 1.0, 0.2, 0.0, 1.0, 0.2, 0.0).unwrap();
        assert_relative_eq!(d.y()[1], s.y()[1], max_relative = 1e-12);
    }

    #[test]
    fn cumulants_reduce_to_exponential() {
        let t = linspace(0.0, 5.0, 11);
        let c = cumulant(&t, [1.0, 0.7, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let cd = cumulant_diff(&t, 1.0, [1.0, 0.7, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let dls = cumulant_dls(&t, 1.0, 1.0 / 0.7, 0.0, 0.0, 0.0).unwrap();
        let se = stretched_exp(&t, 0.7, 1.0, 1.0).unwrap();
        for i in 0..t.len() {
            let e = (-0.7 * t[i]).exp();
            assert_relative_eq!(c.y()[i], e, max_relative = 1e-12);
            assert_relative_eq!(cd.y()[i], e, max_relative = 1e-12);
            assert_relative_eq!(dls.y()[i], e, max_relative = 1e-12);
            assert_relative_eq!(se.y()[i], e, max_relative = 1e-12);
        }
    }

    #[test]
    fn jump_diffusion_limits() {
        // small q: plain diffusion with D = l0²/6t0
        let s = jump_diffusion(&[1.0], 0.01, 2.0, 0.3).unwrap();
        let d: f64 = 0.09 / 12.0;
        assert_relative_eq!(s.y()[0], (-d * 1e-4).exp(), max_relative = 1e-9);
        // large q: rate saturates at 1/t0
        let s = jump_diffusion(&[1.0], 1e4, 2.0, 0.3).unwrap();
        assert_relative_eq!(s.y()[0], (-0.5f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn methyl_rotation_eisf() {
        let s = methyl_rotation(&[0.0, 1e6], 10.0, 0.001, 1.0, 0.12, 0.8).unwrap();
        let eisf = s.attr_f64("EISF").unwrap();
        assert_relative_eq!(s.y()[0], 1.0, max_relative = 1e-12);
        assert_relative_eq!(s.y()[1], eisf, max_relative = 1e-9);
        assert_relative_eq!(eisf, (1.0 + 2.0 * (1.2f64).sin() / 1.2) / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn harmonic_potential_eisf_at_zero_time() {
        let q2u2: f64 = 0.8;
        let expected = [
            0.5 * PI.sqrt() * erf(q2u2.sqrt()) / q2u2.sqrt(),
            0.5 * PI.sqrt() * (-q2u2).exp() * erfi(q2u2.sqrt()) / q2u2.sqrt(),
            (-q2u2).exp(),
        ];
        let t = [0.0, 0.5, 1e3];
        for ndim in 1..=3 {
            let s = diffusion_harmonic_potential(&t, 2.0, 0.8f64.sqrt() / 2.0, 1.0, 0.0, ndim).unwrap();
            assert_relative_eq!(s.y()[0], expected[ndim - 1], max_relative = 1e-9);
            assert_relative_eq!(s.attr_f64("EISF").unwrap(), expected[ndim - 1], max_relative = 1e-9);
            // long-time limit reaches the EISF as well
            assert_relative_eq!(s.y()[2], expected[ndim - 1], max_relative = 1e-9);
            assert!(s.y()[1] > s.y()[2]);
        }
        assert!(diffusion_harmonic_potential(&t, 2.0, 0.5, 1.0, 0.0, 4).is_err());
    }

    #[test]
    fn periodic_potential_trap_saturates() {
        let t = [0.0, 0.1, 1.0, 100.0];
        let model = PeriodicPotential::new(&t, 0.5, 1.0, 0.0, 1.0).unwrap();
        let msd = model.trap_msd();
        assert_eq!(msd[0], 0.0);
        assert_relative_eq!(msd[2], 6.0 * 0.25 * (1.0 - (-1.0f64).exp()), max_relative = 1e-9);
        assert_relative_eq!(msd[3], 1.5, max_relative = 1e-9);
        let s = model.at(2.0).unwrap();
        assert_relative_eq!(s.y()[0], 1.0);
        // without long-time diffusion the ISF levels off at exp(−q²u²)
        assert_relative_eq!(s.y()[3], (-1.0f64).exp(), max_relative = 1e-9);
        assert!(PeriodicPotential::new(&t, 0.5, 1.0, 0.0, 1.5).is_err());
    }

    #[test]
    fn zimm_integral_starts_at_amplitude_and_decays() {
        let s = integral_zimm(&[0.0, 5.0, 20.0], 0.5, 293.0, 1e-3, 1.0).unwrap();
        let y = s.y();
        assert!((y[0] - 1.0).abs() < 0.02, "{}", y[0]);
        assert!(y[1] < y[0] && y[2] < y[1]);
        assert!(y[2] > 0.0);
    }

    #[test]
    fn cloud_multipoles_sum_to_debye() {
        let cloud = sphere_cloud(2.0);
        let q = 1.3;
        let (inc, coh) = cloud_multipoles(q, &cloud, 40);
        assert_relative_eq!(inc.iter().sum::<f64>(), cloud.len() as f64, max_relative = 1e-6);
        let mut debye = 0.0;
        for a in &cloud {
            for b in &cloud {
                debye += sinc(q * (a.pos - b.pos).norm());
            }
        }
        assert_relative_eq!(coh.iter().sum::<f64>(), debye, max_relative = 1e-6);
    }

    #[test]
    fn trans_rot_diffusion_relaxes_to_l0() {
        let cloud = sphere_cloud(1.0);
        let s = trans_rot_diffusion(&[0.0, 1e3], 2.0, &cloud, 0.1, 0.0, None).unwrap();
        let (inc, _) = cloud_multipoles(2.0, &cloud, 6);
        assert_relative_eq!(s.y()[0], s.attr_f64("Iq_inc").unwrap(), max_relative = 1e-12);
        assert_relative_eq!(s.y()[1], inc[0], max_relative = 1e-9);
        assert!(trans_rot_diffusion(&[0.0], 1.0, &[], 0.1, 0.0, None).is_err());
    }

    #[test]
    fn time_resolution_is_normalised() {
        let t = linspace(-10.0, 10.0, 2001);
        let r = resolution(&t, &Resolution::single(1.0).push(2.0, 0.5, 0.5)).unwrap();
        assert_relative_eq!(trapz(r.y(), &t), 1.5, max_relative = 1e-6);
        assert!(resolution(&t, &Resolution::default()).is_err());
    }
}
