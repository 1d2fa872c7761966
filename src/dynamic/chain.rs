//! Finite Rouse and Zimm chains as explicit bead mode sums.
//!
//! The coherent intermediate scattering function of an N-bead chain is
//!
//! ```text
//! S(q,t) = exp(−q² D_cm t) Σ_nm exp(−q²/6 B_nm(t)) / Σ_nm exp(−q²/6 B_nm(0))
//! B_nm(t) = |n−m|^{2μ} l² + Σ_p A_p cos(pπn/N) cos(pπm/N) (1 − exp(−t/τ_p))
//! ```
//!
//! with mode amplitudes `A_p` and relaxation times `τ_p` set by the model
//! variant. The incoherent function uses the diagonal `n = m` only.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;

use crate::dynamic::{dynamic_series, positive, KB};
use crate::error::{Result, SasError};
use crate::series::Series;

/// Modes included in the sum.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainModes {
    /// The first `p` modes with unit weight, limited to N.
    Count(usize),
    /// Explicit relative weight of each mode.
    Weights(Vec<f64>),
}

impl ChainModes {
    fn weights(&self, n: usize) -> Vec<f64> {
        match self {
            ChainModes::Count(p) => vec![1.0; (*p).min(n)],
            ChainModes::Weights(w) => w.iter().map(|v| v.abs()).collect(),
        }
    }
}

/// Scale factor for the centre-of-mass diffusion as function of q.
pub type DiffusionScale = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Rouse variants: internal friction models and the compacting potential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouseFriction {
    /// Rouse with internal friction, `τ_p = τ_R/p² + τ_i`.
    Rif,
    /// Reaction-limited internal friction, `τ_p = τ_R/p² + Nτ_i/p`.
    Rni,
    /// Friction of a chain with approximate power law, `τ_p = τ_R/p² + τ_i ln(Nπ/p)`.
    Rap,
    /// Internal friction by a spring-dashpot element with ratios `m`, `b`.
    SpecRif { m: f64, b: f64 },
    /// Compacted chain in a harmonic potential of strength `rk`.
    Crif { rk: f64 },
}

impl RouseFriction {
    pub fn name(&self) -> &'static str {
        match self {
            RouseFriction::Rif => "rif",
            RouseFriction::Rni => "rni",
            RouseFriction::Rap => "rap",
            RouseFriction::SpecRif { .. } => "specrif",
            RouseFriction::Crif { .. } => "crif",
        }
    }

    fn rk(&self) -> Option<f64> {
        match self {
            RouseFriction::Crif { rk } => Some(*rk),
            _ => None,
        }
    }
}

impl fmt::Display for RouseFriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses the parameter-free variants; `specrif` and `crif` need their
/// parameters and are built directly.
impl FromStr for RouseFriction {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rif" => Ok(RouseFriction::Rif),
            "rni" => Ok(RouseFriction::Rni),
            "rap" => Ok(RouseFriction::Rap),
            "specrif" | "crif" => Err(SasError::config(format!("ftype '{s}' needs parameters"))),
            other => Err(SasError::config(format!("unknown Rouse ftype '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZimmFriction {
    /// Zimm with internal friction.
    Zif,
    /// Compacted Zimm chain with potential strength `rk` (μ = 0.5 only).
    Czif { rk: f64 },
}

impl ZimmFriction {
    pub fn name(&self) -> &'static str {
        match self {
            ZimmFriction::Zif => "zif",
            ZimmFriction::Czif { .. } => "czif",
        }
    }
}

impl FromStr for ZimmFriction {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zif" => Ok(ZimmFriction::Zif),
            "czif" => Err(SasError::config("ftype 'czif' needs the potential strength rk")),
            other => Err(SasError::config(format!("unknown Zimm ftype '{other}'"))),
        }
    }
}

/// Parameters of a finite Rouse chain.
///
/// One of `frict` (bead friction in kg/s), `dcm` (nm²/ns) or `wl4`
/// (nm⁴/ns) is needed; `frict` and `dcm` may both be given.
#[derive(Clone)]
pub struct RouseChain {
    pub n: usize,
    /// Bond length in nm.
    pub l: f64,
    pub modes: ChainModes,
    pub frict: Option<f64>,
    pub dcm: Option<f64>,
    pub wl4: Option<f64>,
    pub dcm_scale: Option<DiffusionScale>,
    /// Internal friction time in ns.
    pub tintern: f64,
    pub temp: f64,
    pub ftype: RouseFriction,
}

impl RouseChain {
    pub fn new(n: usize, l: f64) -> Self {
        Self {
            n,
            l,
            modes: ChainModes::Count(n),
            frict: None,
            dcm: None,
            wl4: None,
            dcm_scale: None,
            tintern: 0.0,
            temp: 293.0,
            ftype: RouseFriction::Rif,
        }
    }

    pub fn frict(mut self, v: f64) -> Self {
        self.frict = Some(v);
        self
    }

    pub fn dcm(mut self, v: f64) -> Self {
        self.dcm = Some(v);
        self
    }

    pub fn wl4(mut self, v: f64) -> Self {
        self.wl4 = Some(v);
        self
    }

    pub fn modes(mut self, modes: ChainModes) -> Self {
        self.modes = modes;
        self
    }

    pub fn tintern(mut self, v: f64) -> Self {
        self.tintern = v;
        self
    }

    pub fn ftype(mut self, ftype: RouseFriction) -> Self {
        self.ftype = ftype;
        self
    }
}

impl fmt::Debug for RouseChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouseChain")
            .field("n", &self.n)
            .field("l", &self.l)
            .field("modes", &self.modes)
            .field("frict", &self.frict)
            .field("dcm", &self.dcm)
            .field("wl4", &self.wl4)
            .field("tintern", &self.tintern)
            .field("temp", &self.temp)
            .field("ftype", &self.ftype)
            .finish_non_exhaustive()
    }
}

/// Parameters of a finite Zimm chain. Two of `n`, `l` and `dcm` are needed.
#[derive(Clone)]
pub struct ZimmChain {
    pub n: Option<usize>,
    pub l: Option<f64>,
    pub dcm: Option<f64>,
    pub modes: Option<ChainModes>,
    pub dcm_scale: Option<DiffusionScale>,
    pub tintern: f64,
    /// Flory exponent, clamped to [0.1, 0.9].
    pub mu: f64,
    /// Solvent viscosity in mPa·s.
    pub viscosity: f64,
    pub temp: f64,
    pub ftype: ZimmFriction,
}

impl Default for ZimmChain {
    fn default() -> Self {
        Self {
            n: None,
            l: None,
            dcm: None,
            modes: None,
            dcm_scale: None,
            tintern: 0.0,
            mu: 0.5,
            viscosity: 1.0,
            temp: 293.0,
            ftype: ZimmFriction::Zif,
        }
    }
}

impl fmt::Debug for ZimmChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZimmChain")
            .field("n", &self.n)
            .field("l", &self.l)
            .field("dcm", &self.dcm)
            .field("modes", &self.modes)
            .field("tintern", &self.tintern)
            .field("mu", &self.mu)
            .field("viscosity", &self.viscosity)
            .field("temp", &self.temp)
            .field("ftype", &self.ftype)
            .finish_non_exhaustive()
    }
}

/// Mode sum of one chain for all times (t = 0 first).
struct ModeSum {
    /// Coherent `B_nm(t)` for the upper triangle `n ≤ m`, row-major by pair.
    coherent: Vec<Vec<f64>>,
    /// Pair multiplicity (1 on the diagonal, 2 otherwise).
    pair_weight: Vec<f64>,
    /// Incoherent `B_nn(t)`.
    incoherent: Vec<Vec<f64>>,
    /// Static part and per-mode amplitudes of each pair for the t → ∞ limit.
    base: Vec<f64>,
    mode_terms: Vec<Vec<f64>>,
}

impl ModeSum {
    fn new(t: &[f64], n: usize, l: f64, mu: f64, amplitudes: &[f64], times: &[f64]) -> Self {
        let nf = n as f64;
        let cos: Vec<Vec<f64>> = (1..=amplitudes.len())
            .map(|p| (1..=n).map(|bead| (p as f64 * PI * bead as f64 / nf).cos()).collect())
            .collect();
        let relax: Vec<Vec<f64>> =
            times.iter().map(|tau| t.iter().map(|&t| if *tau > 0.0 { -(-t / tau).exp_m1() } else { 1.0 }).collect()).collect();
        let pairs: Vec<(usize, usize)> = (0..n).flat_map(|a| (a..n).map(move |b| (a, b))).collect();
        let rows: Vec<(Vec<f64>, f64, Vec<f64>)> = pairs
            .par_iter()
            .map(|&(a, b)| {
                let base = ((b - a) as f64).powf(2.0 * mu) * l * l;
                let terms: Vec<f64> = amplitudes.iter().enumerate().map(|(p, amp)| amp * cos[p][a] * cos[p][b]).collect();
                let row = (0..t.len())
                    .map(|i| base + terms.iter().zip(&relax).map(|(w, e)| w * e[i]).sum::<f64>())
                    .collect();
                (row, base, terms)
            })
            .collect();
        let pair_weight = pairs.iter().map(|(a, b)| if a == b { 1.0 } else { 2.0 }).collect();
        let incoherent = (0..n)
            .map(|a| {
                (0..t.len())
                    .map(|i| amplitudes.iter().enumerate().map(|(p, amp)| amp * cos[p][a] * cos[p][a] * relax[p][i]).sum())
                    .collect()
            })
            .collect();
        let mut coherent = Vec::with_capacity(rows.len());
        let mut base = Vec::with_capacity(rows.len());
        let mut mode_terms = Vec::with_capacity(rows.len());
        for (row, b, terms) in rows {
            coherent.push(row);
            base.push(b);
            mode_terms.push(terms);
        }
        Self { coherent, pair_weight, incoherent, base, mode_terms }
    }

    fn coherent_sum(&self, q: f64, i: usize) -> f64 {
        self.coherent.iter().zip(&self.pair_weight).map(|(row, w)| w * (-q * q / 6.0 * row[i]).exp()).sum()
    }

    fn incoherent_sum(&self, q: f64, i: usize) -> f64 {
        self.incoherent.iter().map(|row| (-q * q / 6.0 * row[i]).exp()).sum()
    }

    /// Fully relaxed limit and the contribution of each single mode.
    fn relaxed(&self, q: f64) -> (f64, Vec<f64>) {
        let nmodes = self.mode_terms.first().map_or(0, Vec::len);
        let mut total = 0.0;
        let mut per_mode = vec![0.0; nmodes];
        for ((b, terms), w) in self.base.iter().zip(&self.mode_terms).zip(&self.pair_weight) {
            total += w * (-q * q / 6.0 * (b + terms.iter().sum::<f64>())).exp();
            for (acc, term) in per_mode.iter_mut().zip(terms) {
                *acc += w * (-q * q / 6.0 * (b + term)).exp();
            }
        }
        (total, per_mode)
    }
}

struct ChainResult<'a> {
    re: f64,
    l: f64,
    n: usize,
    dcm: f64,
    dcm_scale: Option<&'a DiffusionScale>,
    amplitudes: Vec<f64>,
    times: Vec<f64>,
    mu: f64,
}

impl ChainResult<'_> {
    fn evaluate(&self, t: &[f64], q: &[f64], modelname: &str) -> Result<Vec<Series>> {
        let mut tt = Vec::with_capacity(t.len() + 1);
        tt.push(0.0);
        tt.extend_from_slice(t);
        let sum = ModeSum::new(&tt, self.n, self.l, self.mu, &self.amplitudes, &self.times);
        q.iter()
            .map(|&qq| {
                let scale = self.dcm_scale.map_or(1.0, |f| f(qq));
                let b0 = sum.coherent_sum(qq, 0);
                let b0i = sum.incoherent_sum(qq, 0);
                let (binf, per_mode) = sum.relaxed(qq);
                let mut sqt = Vec::with_capacity(t.len());
                let mut sqt_inf = Vec::with_capacity(t.len());
                let mut sqt_inc = Vec::with_capacity(t.len());
                for (i, &time) in t.iter().enumerate() {
                    let diff = (-qq * qq * self.dcm * scale * time).exp();
                    sqt.push(diff * sum.coherent_sum(qq, i + 1) / b0);
                    sqt_inf.push(diff * binf / b0);
                    sqt_inc.push(diff * sum.incoherent_sum(qq, i + 1) / b0i);
                }
                let mut out = dynamic_series(t, vec![sqt, sqt_inf, sqt_inc], "time; Sqt; Sqt_inf; Sqtinc", modelname)?;
                out.put("modecontribution", per_mode.iter().map(|v| v / b0).collect::<Vec<_>>());
                out.put("q", qq);
                out.put("Re", self.re);
                out.put("ll", self.l);
                out.put("N", self.n as f64);
                out.put("Dcm", self.dcm);
                out.put("effectiveDCM", self.dcm * scale);
                out.put("moderelaxationtimes", self.times.clone());
                out.put("modeAmplist", self.amplitudes.clone());
                Ok(out)
            })
            .collect()
    }
}

fn check_time(t: &[f64]) -> Result<()> {
    if t.iter().any(|v| *v < 0.0) {
        return Err(SasError::config("chain models need non-negative times"));
    }
    Ok(())
}

/// Finite Rouse chain; one series per q with columns
/// `time; Sqt; Sqt_inf; Sqtinc`.
pub fn finite_rouse(t: &[f64], q: &[f64], chain: &RouseChain) -> Result<Vec<Series>> {
    check_time(t)?;
    if chain.n < 2 {
        return Err(SasError::config("a chain needs at least two beads"));
    }
    positive("bond length", chain.l)?;
    positive("temperature", chain.temp)?;
    let nf = chain.n as f64;
    let kt = KB * chain.temp;
    let re = match chain.ftype.rk() {
        Some(rk) => {
            positive("rk", rk)?;
            (2.0 * chain.l * chain.l / rk.sqrt() * (nf / 2.0 * rk.sqrt()).tanh()).sqrt()
        }
        None => chain.l * nf.sqrt(),
    };
    let (frict, dcm) = match (chain.frict, chain.dcm, chain.wl4) {
        (Some(f), Some(d), _) => (f, d),
        (None, Some(d), _) => (kt / nf / (d * 1e-9), d),
        (Some(f), None, _) => (f, kt / nf / f * 1e9),
        (None, None, Some(wl4)) => {
            let d = wl4 / (3.0 * re * re);
            (kt / nf / (d * 1e-9), d)
        }
        (None, None, None) => return Err(SasError::config("finite Rouse needs one of Dcm, frict or Wl4")),
    };
    positive("bead friction", frict)?;

    let tr1 = frict * nf * nf * chain.l * chain.l / (3.0 * PI * PI * kt) * 1e-9;
    let weights = chain.modes.weights(chain.n);
    let ti = chain.tintern.abs();
    let mut amplitudes = Vec::with_capacity(weights.len());
    let mut times = Vec::with_capacity(weights.len());
    for (i, w) in weights.iter().enumerate() {
        let p = (i + 1) as f64;
        let a = 4.0 * re * re / (PI * PI) * w;
        let (tau, amp) = match chain.ftype {
            RouseFriction::Rif => (tr1 / (p * p) + ti, a / (p * p)),
            RouseFriction::Rni => (tr1 / (p * p) + nf * ti / p, a / (p * p)),
            RouseFriction::Rap => (tr1 / (p * p) + ti * (nf / p * PI).ln(), a / (p * p)),
            RouseFriction::SpecRif { m, b } => {
                (tr1 / (p * p) / (1.0 + b * m * m) + (1.0 + m * m / (1.0 + b * m * m)) * ti, a / (p * p))
            }
            RouseFriction::Crif { rk } => {
                let k = nf * nf / (PI * PI) * rk + p * p;
                (tr1 / k + ti, a / k)
            }
        };
        times.push(tau);
        amplitudes.push(amp);
    }
    let result = ChainResult {
        re,
        l: chain.l,
        n: chain.n,
        dcm,
        dcm_scale: chain.dcm_scale.as_ref(),
        amplitudes,
        times,
        mu: 0.5,
    };
    let mut out = result.evaluate(t, q, "finite_rouse")?;
    for s in &mut out {
        s.put("Dcmrouse", kt / nf / frict * 1e9);
        s.put("Temperature", chain.temp);
        s.put("trouse", tr1);
        s.put("tintern", chain.tintern);
        s.put("beadfriction", frict);
        s.put("Drot", 1.0 / 6.0 / tr1);
        s.put("internalfriction_g_ns", chain.tintern * 1e-9 * 3.0 * kt / (chain.l * 1e-9).powi(2) * 1e-6);
        s.put("ftype", chain.ftype.name());
        if let RouseFriction::SpecRif { m, b } = chain.ftype {
            s.put("specm", m);
            s.put("specb", b);
        }
        if let Some(rk) = chain.ftype.rk() {
            s.put("rk", rk);
        }
    }
    Ok(out)
}

/// Finite Zimm chain with hydrodynamic interaction; one series per q with
/// columns `time; Sqt; Sqt_inf; Sqtinc`.
pub fn finite_zimm(t: &[f64], q: &[f64], chain: &ZimmChain) -> Result<Vec<Series>> {
    check_time(t)?;
    positive("temperature", chain.temp)?;
    positive("viscosity", chain.viscosity)?;
    let kt = KB * chain.temp;
    let viscosity = chain.viscosity * 1e-3;
    let mu = chain.mu.clamp(0.1, 0.9);
    let fact = 8.0 / (3.0 * 6f64.sqrt() * PI.powf(1.5)) + (mu - 0.5) / (0.6 - 0.5) * (0.203 - 0.196);
    let l_given = chain.l.filter(|l| *l > 0.0);
    // Re from D_cm and the inverse.
    let re_of_dcm = |d: f64| fact * kt / (d * 1e-9 * viscosity) * 1e9;
    let dcm_of_re = |re: f64| fact * kt / (re * 1e-9 * viscosity) * 1e9;

    let (n, l, dcm, re, tz1, rk) = match chain.ftype {
        ZimmFriction::Czif { rk } => {
            positive("rk", rk)?;
            if (mu - 0.5).abs() > 1e-12 {
                return Err(SasError::config("ftype 'czif' only allows mu = 0.5"));
            }
            let sr = rk.sqrt();
            let (n, l, dcm, re) = match (chain.n, l_given, chain.dcm) {
                (Some(n), Some(l), None) => {
                    let re = 2.0 * l * l / sr * (n as f64 / 2.0 * sr).tanh();
                    (n as f64, l, dcm_of_re(re), re)
                }
                (Some(n), None, Some(d)) => {
                    let re = re_of_dcm(d);
                    (n as f64, re * (sr / 2.0 / (n as f64 / 2.0 * sr).tanh()).sqrt(), d, re)
                }
                (None, Some(l), Some(d)) => {
                    let re = re_of_dcm(d);
                    (2.0 / sr * (re * re / 2.0 / (l * l)).atanh(), l, d, re)
                }
                (Some(n), Some(l), Some(d)) => (n as f64, l, d, 2.0 * l * l / sr * (n as f64 / 2.0 * sr).tanh()),
                _ => return Err(SasError::config("finite Zimm needs at least two of Dcm, N, l")),
            };
            let tz1 = viscosity * n.powf(1.5) * (l * 1e-9).powi(3) / ((3.0 * PI).sqrt() * kt) * 1e9;
            (n, l, dcm, re, tz1, Some(rk))
        }
        ZimmFriction::Zif => {
            let (n, l, dcm, re) = match (chain.n, l_given, chain.dcm) {
                (Some(n), Some(l), None) => {
                    let re = l * (n as f64).powf(mu);
                    (n as f64, l, dcm_of_re(re), re)
                }
                (Some(n), None, Some(d)) => {
                    let re = re_of_dcm(d);
                    (n as f64, re / (n as f64).powf(mu), d, re)
                }
                (None, Some(l), Some(d)) => {
                    let re = re_of_dcm(d);
                    (((re / l).powf(1.0 / mu)).floor(), l, d, re)
                }
                (Some(n), Some(l), Some(d)) => (n as f64, l, d, l * (n as f64).powf(mu)),
                _ => return Err(SasError::config("finite Zimm needs at least two of Dcm, N, l")),
            };
            let tz1 = viscosity * (re * 1e-9).powi(3) / ((3.0 * PI).sqrt() * kt) * 1e9;
            (n, l, dcm, re, tz1, None)
        }
    };
    if !(n.is_finite() && n >= 2.0) {
        return Err(SasError::config(format!("finite Zimm chain needs at least two beads, got {n}")));
    }
    let nbeads = n as usize;
    let weights = chain.modes.clone().unwrap_or(ChainModes::Count(nbeads)).weights(nbeads);
    let ti = chain.tintern.abs();
    let mut amplitudes = Vec::with_capacity(weights.len());
    let mut times = Vec::with_capacity(weights.len());
    for (i, w) in weights.iter().enumerate() {
        let p = (i + 1) as f64;
        match rk {
            Some(rk) => {
                let k = n * n / (PI * PI) * rk;
                amplitudes.push(4.0 * n * l * l / (PI * PI) * w / (k + p.powf(2.0 * mu + 1.0)));
                times.push(tz1 * p.sqrt() / (k + p * p) + ti);
            }
            None => {
                amplitudes.push(4.0 * re * re / (PI * PI) * w / p.powf(2.0 * mu + 1.0));
                times.push(tz1 * p.powf(-3.0 * mu) + ti);
            }
        }
    }
    let result = ChainResult {
        re,
        l,
        n: nbeads,
        dcm,
        dcm_scale: chain.dcm_scale.as_ref(),
        amplitudes,
        times,
        mu,
    };
    let mut out = result.evaluate(t, q, "finite_zimm")?;
    for s in &mut out {
        s.put("DZimm", dcm_of_re(re));
        s.put("mu", mu);
        s.put("viscosity", viscosity);
        s.put("Temperature", chain.temp);
        s.put("tzimm", tz1);
        s.put("tintern", chain.tintern);
        s.put("Drot", 1.0 / 6.0 / tz1);
        s.put("ftype", chain.ftype.name());
        if let Some(rk) = rk {
            s.put("rk", rk);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ftype_strings() {
        assert_eq!("rni".parse::<RouseFriction>().unwrap(), RouseFriction::Rni);
        assert!("crif".parse::<RouseFriction>().is_err());
        assert!("rouse".parse::<RouseFriction>().is_err());
        assert_eq!("zif".parse::<ZimmFriction>().unwrap(), ZimmFriction::Zif);
        assert!("xif".parse::<ZimmFriction>().is_err());
    }

    #[test]
    fn rouse_needs_a_mobility() {
        let chain = RouseChain::new(20, 0.5);
        assert!(finite_rouse(&[1.0], &[0.5], &chain).is_err());
        assert!(finite_rouse(&[1.0], &[0.5], &RouseChain::new(1, 0.5).dcm(0.01)).is_err());
    }

    #[test]
    fn rouse_small_q_is_center_of_mass_diffusion() {
        let chain = RouseChain::new(30, 0.4).dcm(0.02);
        let t = [0.0, 5.0, 50.0];
        let out = finite_rouse(&t, &[1e-3], &chain).unwrap();
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.columnname.as_deref(), Some("time; Sqt; Sqt_inf; Sqtinc"));
        for (time, y) in t.iter().zip(s.y()) {
            assert_relative_eq!(*y, (-1e-6 * 0.02 * time).exp(), max_relative = 1e-6);
        }
        assert_relative_eq!(s.attr_f64("Dcmrouse").unwrap(), 0.02, max_relative = 1e-9);
    }

    #[test]
    fn rouse_internal_relaxation() {
        let chain = RouseChain::new(40, 0.5).frict(1e-12).dcm(1e-6);
        let t = [0.0, 1.0, 10.0, 100.0, 1e5];
        let out = finite_rouse(&t, &[1.0, 2.0], &chain).unwrap();
        assert_eq!(out.len(), 2);
        for s in &out {
            let y = s.y();
            assert_relative_eq!(y[0], 1.0, max_relative = 1e-12);
            assert_relative_eq!(s.column(3).unwrap()[0], 1.0, max_relative = 1e-12);
            for w in y.windows(2) {
                assert!(w[1] <= w[0]);
            }
            // after all modes relaxed the coherent function meets the relaxed limit
            let last = t.len() - 1;
            let inf = s.column(2).unwrap()[last];
            assert_relative_eq!(y[last], inf, max_relative = 1e-6);
        }
        // faster decay at larger q
        assert!(out[1].y()[2] < out[0].y()[2]);
    }

    #[test]
    fn internal_friction_slows_the_modes() {
        let t = [2.0];
        let plain = finite_rouse(&t, &[1.5], &RouseChain::new(30, 0.5).dcm(1e-4)).unwrap();
        let slow = finite_rouse(&t, &[1.5], &RouseChain::new(30, 0.5).dcm(1e-4).tintern(50.0)).unwrap();
        assert!(slow[0].y()[0] > plain[0].y()[0]);
        let crif = RouseChain::new(30, 0.5).dcm(1e-4).ftype(RouseFriction::Crif { rk: 0.01 });
        let c = finite_rouse(&t, &[1.5], &crif).unwrap();
        assert!(c[0].attr_f64("Re").unwrap() < 0.5 * 30f64.sqrt());
    }

    #[test]
    fn zimm_parameter_combinations() {
        let base = ZimmChain { n: Some(50), l: Some(0.5), ..Default::default() };
        let a = finite_zimm(&[1.0], &[0.8], &base).unwrap();
        let dcm = a[0].attr_f64("Dcm").unwrap();
        let re = a[0].attr_f64("Re").unwrap();
        assert_relative_eq!(re, 0.5 * 50f64.sqrt(), max_relative = 1e-12);
        // recover the bond length from N and Dcm
        let b = finite_zimm(&[1.0], &[0.8], &ZimmChain { n: Some(50), dcm: Some(dcm), ..Default::default() }).unwrap();
        assert_relative_eq!(b[0].attr_f64("ll").unwrap(), 0.5, max_relative = 1e-9);
        assert_relative_eq!(b[0].y()[0], a[0].y()[0], max_relative = 1e-9);
        assert!(finite_zimm(&[1.0], &[0.8], &ZimmChain { n: Some(50), ..Default::default() }).is_err());
        let czif = ZimmChain { mu: 0.6, ftype: ZimmFriction::Czif { rk: 0.1 }, ..base };
        assert!(finite_zimm(&[1.0], &[0.8], &czif).is_err());
    }
}
