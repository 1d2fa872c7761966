//! Zilman–Granek membrane undulation dynamics.
//!
//! Both variants share the bending kernel
//!
//! ```text
//! K(r,t) = ∫ (1 − J₀(kr) exp(−κ k³ t / 4η)) / k³ dk
//! ```
//!
//! integrated from the lower cut-off `επ/ξ` to `π/m_t`. It depends on r and
//! t only, so it is tabulated once on the r quadrature nodes and shared by
//! all wavevectors.

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::dynamic::{dynamic_series, positive};
use crate::error::{Result, SasError};
use crate::math::quadrature::{adaptive_gauss_many, fixed_gauss_many, gauss_nodes};
use crate::math::special::j0;
use crate::series::Series;

const MAX_ORDER: usize = 256;
/// Exponents below this are clipped before `exp`.
const EXP_FLOOR: f64 = -500.0;

/// Membrane parameters.
///
/// `kappa` is the bending rigidity in kT and `eta` the solvent viscosity in
/// kT·ns/nm³ (1 mPa·s ≈ 0.2414 kT·ns/nm³ at 300 K).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZilmanGranek {
    pub kappa: f64,
    pub eta: f64,
    /// Membrane thickness setting the upper wavevector cut-off `π/mt`.
    pub mt: f64,
    /// Scales the lower cut-off and the r range.
    pub eps: f64,
    pub amp: f64,
    /// Quadrature order in r and μ; also sets the inner tolerances.
    pub ngauss: usize,
    /// Angle between q and the membrane normal (lamellar phase only).
    pub mu: f64,
}

impl ZilmanGranek {
    pub fn bicontinuous(kappa: f64, eta: f64) -> Self {
        Self { kappa, eta, mt: 1.0, eps: 1.0, amp: 1.0, ngauss: 60, mu: 0.0 }
    }

    pub fn lamellar(kappa: f64, eta: f64) -> Self {
        Self { kappa, eta, mt: 0.1, eps: 1.0, amp: 1.0, ngauss: 40, mu: 0.001 }
    }

    pub fn ngauss(mut self, n: usize) -> Self {
        self.ngauss = n;
        self
    }

    pub fn amp(mut self, amp: f64) -> Self {
        self.amp = amp;
        self
    }

    fn validate(&self) -> Result<()> {
        positive("bending rigidity", self.kappa)?;
        positive("viscosity", self.eta)?;
        positive("membrane thickness", self.mt)?;
        positive("eps", self.eps)?;
        if self.ngauss < 2 {
            return Err(SasError::config("ngauss must be at least 2"));
        }
        Ok(())
    }
}

/// `K(r, t)` for all times.
fn bending_kernel(r: f64, t: &[f64], klow: f64, opts: &ZilmanGranek) -> Vec<f64> {
    let kmax = PI / opts.mt;
    let rate = opts.kappa / (4.0 * opts.eta);
    let integrand = |k: f64| -> Vec<f64> {
        let jk = j0(k * r);
        let k3 = k * k * k;
        t.iter().map(|&t| (1.0 - jk * (-rate * k3 * t).exp()) / k3).collect()
    };
    let panel = |a: f64, b: f64, rtol: f64| -> Vec<f64> {
        adaptive_gauss_many(&integrand, a, b, 0.0, rtol, MAX_ORDER).unwrap_or_else(|err| {
            log::debug!("bending kernel at r={r:.3}: {err}; using order {MAX_ORDER}");
            fixed_gauss_many(&integrand, a, b, MAX_ORDER)
        })
    };
    let ng = opts.ngauss as f64;
    let split = kmax / 8.0;
    if klow < split {
        let low = panel(klow, split, 0.1 / ng);
        let high = panel(split, kmax, 1.0 / ng);
        low.iter().zip(high).map(|(a, b)| a + b).collect()
    } else {
        panel(klow, kmax, 1.0 / ng)
    }
}

struct KernelTable {
    r: Vec<f64>,
    weights: Vec<f64>,
    /// `K` per r node, per time (t = 0 first).
    k: Vec<Vec<f64>>,
}

impl KernelTable {
    fn new(rmax: f64, t: &[f64], klow: f64, opts: &ZilmanGranek) -> Result<Self> {
        if !(klow < PI / opts.mt) {
            return Err(SasError::config(format!(
                "lower wavevector cut-off {klow:.4} exceeds the membrane cut-off {:.4}",
                PI / opts.mt
            )));
        }
        let (r, weights) = gauss_nodes(0.0, rmax, opts.ngauss);
        let k = r.iter().map(|&r| bending_kernel(r, t, klow, opts)).collect();
        Ok(Self { r, weights, k })
    }
}

fn with_zero_time(t: &[f64]) -> Result<Vec<f64>> {
    if t.iter().any(|v| *v < 0.0 || !v.is_finite()) {
        return Err(SasError::config("membrane models need finite non-negative times"));
    }
    let mut tt = Vec::with_capacity(t.len() + 1);
    tt.push(0.0);
    tt.extend_from_slice(t);
    Ok(tt)
}

fn normalised(t: &[f64], raw: Vec<f64>, amp: f64, modelname: &str) -> Result<Series> {
    let s0 = raw[0];
    if !(s0.abs() > 0.0) || !s0.is_finite() {
        return Err(SasError::numerical(format!("{modelname}: S(t=0) = {s0}")));
    }
    let y = raw[1..].iter().map(|v| amp * v / s0).collect();
    dynamic_series(t, vec![y], "t; Iqt", modelname)
}

fn annotate(out: &mut Series, q: f64, opts: &ZilmanGranek) {
    out.put("q", q);
    out.put("kappa", opts.kappa);
    out.put("eta", opts.eta);
    out.put("eps", opts.eps);
    out.put("mt", opts.mt);
    out.put("amp", opts.amp);
}

/// Bicontinuous microemulsion with domain size `xi`; one `t; Iqt` series per
/// q, normalised to `amp` at t = 0.
pub fn zilman_granek_bicontinuous(t: &[f64], q: &[f64], xi: f64, opts: &ZilmanGranek) -> Result<Vec<Series>> {
    opts.validate()?;
    positive("domain size", xi)?;
    let tt = with_zero_time(t)?;
    let range = opts.eps * xi;
    let table = KernelTable::new(3.0 * range, &tt, opts.eps * PI / xi, opts)?;
    let (mus, mu_weights) = gauss_nodes(0.0, 1.0, opts.ngauss);
    q.par_iter()
        .map(|&qq| {
            let mut raw = vec![0.0; tt.len()];
            for (mu, wmu) in mus.iter().zip(&mu_weights) {
                let pre = -qq * qq * mu * mu / (2.0 * PI * opts.kappa);
                let radial = (1.0 - mu * mu).sqrt();
                for ((r, wr), kr) in table.r.iter().zip(&table.weights).zip(&table.k) {
                    let base = r * j0(qq * r * radial) * wmu * wr;
                    let damping = r * r / (range * range);
                    for (acc, k) in raw.iter_mut().zip(kr) {
                        *acc += base * (pre * k - damping).max(EXP_FLOOR).exp();
                    }
                }
            }
            let mut out = normalised(t, raw, opts.amp, "zilman_granek_bicontinuous")?;
            annotate(&mut out, qq, opts);
            out.put("xi", xi);
            Ok(out)
        })
        .collect()
}

/// Lamellar phase with layer spacing `df`; one `t; Iqt` series per q,
/// normalised to `amp` at t = 0.
pub fn zilman_granek_lamellar(t: &[f64], q: &[f64], df: f64, opts: &ZilmanGranek) -> Result<Vec<Series>> {
    opts.validate()?;
    positive("layer spacing", df)?;
    let tt = with_zero_time(t)?;
    let table = KernelTable::new(df / opts.eps, &tt, opts.eps * PI / df, opts)?;
    let smu = opts.mu.sin();
    q.par_iter()
        .map(|&qq| {
            let pre = -qq * qq * (1.0 - smu * smu) / (2.0 * PI * opts.kappa);
            let mut raw = vec![0.0; tt.len()];
            for ((r, wr), kr) in table.r.iter().zip(&table.weights).zip(&table.k) {
                let base = r * j0(qq * r * smu) * wr;
                for (acc, k) in raw.iter_mut().zip(kr) {
                    *acc += base * (pre * k).max(EXP_FLOOR).exp();
                }
            }
            let mut out = normalised(t, raw, opts.amp, "zilman_granek_lamellar")?;
            annotate(&mut out, qq, opts);
            out.put("df", df);
            out.put("mu", opts.mu);
            Ok(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const T: [f64; 4] = [0.0, 1.0, 10.0, 100.0];

    #[test]
    fn bicontinuous_decays_from_amplitude() {
        let opts = ZilmanGranek::bicontinuous(1.0, 0.24).ngauss(20).amp(0.8);
        let out = zilman_granek_bicontinuous(&T, &[0.3, 1.0], 10.0, &opts).unwrap();
        assert_eq!(out.len(), 2);
        for s in &out {
            assert_relative_eq!(s.y()[0], 0.8, max_relative = 1e-12);
            assert!(s.y()[3] < s.y()[1]);
            assert_eq!(s.columnname.as_deref(), Some("t; Iqt"));
        }
        assert_eq!(out[1].attr_f64("q"), Some(1.0));
        assert!(out[1].y()[2] < out[0].y()[2]);
    }

    #[test]
    fn viscous_lamellae_barely_relax() {
        let thin = ZilmanGranek::lamellar(1.0, 0.24).ngauss(20);
        let frozen = ZilmanGranek::lamellar(1.0, 1e6).ngauss(20);
        let a = zilman_granek_lamellar(&T, &[1.0], 5.0, &thin).unwrap();
        let b = zilman_granek_lamellar(&T, &[1.0], 5.0, &frozen).unwrap();
        assert_relative_eq!(a[0].y()[0], 1.0, max_relative = 1e-12);
        for v in b[0].y() {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-4);
        }
        assert!((a[0].y()[1] - 1.0).abs() > (b[0].y()[1] - 1.0).abs());
        assert_eq!(a[0].attr_f64("df"), Some(5.0));
    }

    #[test]
    fn invalid_parameters() {
        let opts = ZilmanGranek::bicontinuous(1.0, 0.24);
        assert!(zilman_granek_bicontinuous(&[-1.0], &[1.0], 10.0, &opts).is_err());
        assert!(zilman_granek_bicontinuous(&T, &[1.0], 0.0, &opts).is_err());
        // cut-off above π/mt
        assert!(zilman_granek_bicontinuous(&T, &[1.0], 0.5, &opts).is_err());
    }
}
