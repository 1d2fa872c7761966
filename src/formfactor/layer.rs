//! Planar multilayers and multilamellar vesicles.
//!
//! A multilayer is a one-dimensional contrast profile built from box layers
//! (stacked from the origin) and Gaussian layers (at absolute positions).
//! Its form factor per unit area is
//!
//! ```text
//! F(q) = Σ_ij a_i(q) a_j(q) Δρ_i Δρ_j cos(q (p_i − p_j))
//! ```
//!
//! with box amplitudes `d·sin(qd/2)/(qd/2)` and Gaussian amplitudes
//! `σ·exp(−q²σ²/2)`. Multilamellar vesicles combine this profile with the
//! structure factor of `N` concentric shells.

use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::{Result, SasError};
use crate::formfactor::model_series;
use crate::formfactor::sphere::fa_sphere;
use crate::math::grid::linspace;
use crate::math::quadrature::gauss_nodes;
use crate::math::special::{erf, sinc};
use crate::series::{AttrValue, Series};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layer {
    /// Box layer; boxes are stacked in the given order.
    Box { thickness: f64, sld: f64 },
    /// Gaussian layer centred at `position` with standard deviation `width`.
    Gauss { position: f64, width: f64, sld: f64 },
}

/// Which layers have a fluctuating SLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SldLayer {
    Outer,
    Inner,
    InOut,
    Center,
}

impl FromStr for SldLayer {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "outersld" | "outer" => Ok(Self::Outer),
            "innersld" | "inner" => Ok(Self::Inner),
            "inoutsld" | "inout" => Ok(Self::InOut),
            "centersld" | "center" => Ok(Self::Center),
            other => Err(SasError::config(format!("unknown SLD fluctuation layer '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LayerFluctuation {
    #[default]
    None,
    /// Gaussian thickness fluctuation with this standard deviation; the
    /// profile grows symmetrically about its centre.
    Thickness(f64),
    /// The selected layers' SLD is scaled by `linspace(0, 1, weights.len())`
    /// and averaged with `weights`.
    Sld { layer: SldLayer, weights: Vec<f64> },
}

/// Layer stack description for [`multilayer`].
#[derive(Debug, Clone, Default)]
pub struct MultiLayer {
    pub layers: Vec<Layer>,
    /// Shift the box stack so that it is centred at 0.
    pub center_boxes: bool,
    pub fluctuation: LayerFluctuation,
    pub solvent_sld: f64,
}

struct Profile {
    /// Box thickness or Gaussian width.
    width: Vec<f64>,
    pos: Vec<f64>,
    dsld: Vec<f64>,
    is_box: Vec<bool>,
    edges: Vec<f64>,
}

impl Profile {
    fn new(ml: &MultiLayer) -> Result<Self> {
        let mut p = Profile {
            width: Vec::new(),
            pos: Vec::new(),
            dsld: Vec::new(),
            is_box: Vec::new(),
            edges: Vec::new(),
        };
        let mut edge = 0.0;
        for layer in &ml.layers {
            if let Layer::Box { thickness, sld } = *layer {
                let t = thickness.abs();
                if p.edges.is_empty() {
                    p.edges.push(0.0);
                }
                p.width.push(t);
                p.pos.push(edge + t / 2.0);
                p.dsld.push(sld - ml.solvent_sld);
                p.is_box.push(true);
                edge += t;
                p.edges.push(edge);
            }
        }
        if ml.center_boxes && !p.edges.is_empty() {
            let shift = edge / 2.0;
            p.edges.iter_mut().for_each(|e| *e -= shift);
            p.pos.iter_mut().for_each(|v| *v -= shift);
        }
        for layer in &ml.layers {
            if let Layer::Gauss { position, width, sld } = *layer {
                p.width.push(width.abs());
                p.pos.push(position);
                p.dsld.push(sld - ml.solvent_sld);
                p.is_box.push(false);
            }
        }
        if p.pos.is_empty() {
            return Err(SasError::config("multilayer needs at least one layer"));
        }
        Ok(p)
    }

    fn center(&self) -> f64 {
        let (lo, hi) = min_max(&self.pos);
        (lo + hi) / 2.0
    }

    /// `(min, max, widest Gaussian)` of the profile.
    fn extent(&self) -> (f64, f64, f64) {
        let all: Vec<f64> = self.edges.iter().chain(&self.pos).copied().collect();
        let (lo, hi) = min_max(&all);
        let w = self
            .width
            .iter()
            .zip(&self.is_box)
            .filter(|(_, b)| !**b)
            .fold(0.0f64, |m, (w, _)| m.max(*w));
        (lo, hi, w)
    }

    fn grown(&self, dx: f64, center: f64) -> Profile {
        let shift = |v: f64| if v > center { v + dx } else { v - dx };
        let edges: Vec<f64> = self.edges.iter().map(|&e| shift(e)).collect();
        let mut width = self.width.clone();
        let mut k = 0;
        for (w, b) in width.iter_mut().zip(&self.is_box) {
            if *b {
                *w = edges[k + 1] - edges[k];
                k += 1;
            }
        }
        Profile {
            width,
            pos: self.pos.iter().map(|&v| shift(v)).collect(),
            dsld: self.dsld.clone(),
            is_box: self.is_box.clone(),
            edges,
        }
    }

    /// Returns `(F(q), fa(q))` for one q.
    fn scatter(&self, q: f64) -> (f64, f64) {
        let a: Vec<f64> = self
            .width
            .iter()
            .zip(&self.is_box)
            .zip(&self.dsld)
            .map(|((&w, &b), &s)| {
                let amp = if b { w * sinc(q * w / 2.0) } else { w * (-q * q * w * w / 2.0).exp() };
                amp * s
            })
            .collect();
        let mut fq = 0.0;
        let mut fa = 0.0;
        for i in 0..a.len() {
            fa += a[i] * (q * self.pos[i]).cos();
            for j in 0..a.len() {
                fq += a[i] * a[j] * (q * (self.pos[i] - self.pos[j])).cos();
            }
        }
        (fq, fa)
    }

    fn contrast_profile(&self, x: &[f64]) -> Vec<f64> {
        let mut k = 0;
        let mut y = vec![0.0; x.len()];
        for i in 0..self.pos.len() {
            if self.is_box[i] {
                let (lo, hi) = (self.edges[k], self.edges[k + 1]);
                k += 1;
                for (yy, &xx) in y.iter_mut().zip(x) {
                    if xx >= lo && xx <= hi {
                        *yy += self.dsld[i];
                    }
                }
            } else {
                let (p, w) = (self.pos[i], self.width[i]);
                for (yy, &xx) in y.iter_mut().zip(x) {
                    *yy += self.dsld[i] * (-0.5 * ((xx - p) / w).powi(2)).exp() / (2.0 * PI).sqrt();
                }
            }
        }
        y
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

fn gauss_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    (-0.5 * ((x - mean) / sigma).powi(2)).exp() / ((2.0 * PI).sqrt() * sigma)
}

/// Weighted average of `(F, fa)` over profile variants.
fn average(q: &[f64], variants: &[(Profile, f64)]) -> (Vec<f64>, Vec<f64>) {
    let wsum: f64 = variants.iter().map(|(_, w)| w).sum();
    let mut fq = vec![0.0; q.len()];
    let mut fa = vec![0.0; q.len()];
    for (p, w) in variants {
        for (i, &x) in q.iter().enumerate() {
            let (f, a) = p.scatter(x);
            fq[i] += w * f / wsum;
            fa[i] += w * a / wsum;
        }
    }
    (fq, fa.into_iter().map(|v| v * v).collect())
}

/// Form factor of a planar multilayer. Columns `q; Fq; Fa2` where `Fa2` is
/// the squared mean amplitude of a fluctuating stack (0 without
/// fluctuations).
pub fn multilayer(q: &[f64], ml: &MultiLayer) -> Result<Series> {
    let base = Profile::new(ml)?;
    let (lo, hi, gw) = base.extent();
    let x = linspace(lo - gw * 3.6, hi + gw * 3.6, 500);

    let (fq, fa2, profile) = match &ml.fluctuation {
        LayerFluctuation::None => {
            let fq = q.iter().map(|&v| base.scatter(v).0).collect();
            let profile = base.contrast_profile(&x);
            (fq, vec![0.0; q.len()], profile)
        }
        LayerFluctuation::Thickness(ds) if *ds > 0.0 => {
            let center = base.center();
            let variants: Vec<(Profile, f64)> = linspace(-2.0 * ds, 2.0 * ds, 23)
                .into_iter()
                .map(|d| (base.grown(d / 2.0, center), gauss_pdf(d, 0.0, *ds)))
                .collect();
            let (fq, fa2) = average(q, &variants);
            (fq, fa2, weighted_profile(&variants, &x))
        }
        LayerFluctuation::Thickness(_) => {
            return Err(SasError::config("thickness fluctuation must be > 0"));
        }
        LayerFluctuation::Sld { layer, weights } => {
            if weights.is_empty() || weights.iter().sum::<f64>() <= 0.0 {
                return Err(SasError::config("SLD fluctuation needs positive weights"));
            }
            let (pmin, pmax) = min_max(&base.pos);
            let mut sorted = base.pos.clone();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted[sorted.len() / 2];
            let selected: Vec<bool> = base
                .pos
                .iter()
                .map(|&p| match layer {
                    SldLayer::Outer => p >= pmax,
                    SldLayer::Inner => p <= pmin,
                    SldLayer::InOut => p >= pmax || p <= pmin,
                    SldLayer::Center => p == mid,
                })
                .collect();
            let variants: Vec<(Profile, f64)> = linspace(0.0, 1.0, weights.len())
                .into_iter()
                .zip(weights)
                .map(|(scale, &w)| {
                    let mut p = base.grown(0.0, f64::INFINITY);
                    for (s, sel) in p.dsld.iter_mut().zip(&selected) {
                        if *sel {
                            *s *= scale;
                        }
                    }
                    (p, w)
                })
                .collect();
            let (fq, fa2) = average(q, &variants);
            (fq, fa2, weighted_profile(&variants, &x))
        }
    };

    let mut out = model_series(q, vec![fq, fa2], "q; Fq; Fa2", "multilayer")?;
    out.put("profilewidth", (hi + gw) - (lo - gw));
    out.put("contrastprofile_x", AttrValue::List(x));
    out.put("contrastprofile_sld", AttrValue::List(profile));
    out.put("layerpos", AttrValue::List(base.pos.clone()));
    out.put("solventSLD", ml.solvent_sld);
    if let LayerFluctuation::Thickness(ds) = ml.fluctuation {
        out.put("thicknessfluctuation", ds);
    }
    Ok(out)
}

fn weighted_profile(variants: &[(Profile, f64)], x: &[f64]) -> Vec<f64> {
    let wsum: f64 = variants.iter().map(|(_, w)| w).sum();
    let mut y = vec![0.0; x.len()];
    for (p, w) in variants {
        for (yy, v) in y.iter_mut().zip(p.contrast_profile(x)) {
            *yy += w * v / wsum;
        }
    }
    y
}

/// Structure factor of `n` equally spaced concentric shells up to radius
/// `r`, where each shell is displaced randomly by `displace` (Frielinghaus).
///
/// `S(Q) = Σ_ij A_i A_j K^|i−j| / (R² Σ R_i²)` with `A_i = R_i² j₀(Q R_i)`,
/// `R_i = iR/n` and `K = 3j₁(Q·displace)/(Q·displace)`.
fn shell_structure_factor(q: f64, r: f64, displace: f64, n: usize) -> f64 {
    let k = if displace > 0.0 { fa_sphere(q * displace) } else { 1.0 };
    let mut norm = 0.0;
    let mut diag = 0.0;
    let mut cross = 0.0;
    let mut b = 0.0;
    let mut a_prev = 0.0;
    for i in 1..=n {
        let ri = i as f64 * r / n as f64;
        let ai = ri * ri * sinc(q * ri);
        b = k * (b + a_prev);
        diag += ai * ai;
        cross += ai * b;
        norm += ri * ri;
        a_prev = ai;
    }
    (diag + 2.0 * cross) / (r * r * norm)
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / 2f64.sqrt()))
}

/// Discrete Gaussian of shell numbers truncated at 1 and `nmax` (0 for no
/// upper bound). Widths below 0.4 collapse to the mean.
fn discrete_gaussian(mean: f64, sigma: f64, nmax: f64) -> (Vec<usize>, Vec<f64>) {
    if sigma < 0.4 {
        return (vec![mean.round().max(1.0) as usize], vec![1.0]);
    }
    let a = (0.5 - mean) / sigma;
    let b = if nmax == 0.0 { 10.0 } else { (nmax - mean) / sigma };
    let (ca, cb) = (normal_cdf(a), normal_cdf(b));
    let cdf = |x: f64| ((normal_cdf((x - mean) / sigma) - ca) / (cb - ca)).clamp(0.0, 1.0);
    let mut nn = Vec::new();
    let mut w = Vec::new();
    let mut v = (mean - 5.0 * sigma).floor();
    while v < mean + 5.0 * sigma {
        if v > 0.0 {
            let p = cdf(v + 0.5) - cdf(v - 0.5);
            if p > 0.005 {
                nn.push(v as usize);
                w.push(p);
            }
        }
        v += 1.0;
    }
    let total: f64 = w.iter().sum();
    (nn, w.into_iter().map(|x| x / total).collect())
}

/// Parameters of a multilamellar vesicle.
#[derive(Debug, Clone)]
pub struct Vesicle {
    /// Outer radius.
    pub radius: f64,
    /// Mean number of shells.
    pub shells: f64,
    /// Volume fraction of vesicles.
    pub phi: f64,
    /// RMS random displacement of shells.
    pub displace: f64,
    /// Gaussian width of the outer radius.
    pub d_radius: f64,
    /// Gaussian width of the shell number.
    pub d_shells: f64,
    /// Gauss nodes of the radius average.
    pub n_gauss: usize,
}

impl Default for Vesicle {
    fn default() -> Self {
        Self {
            radius: 100.0,
            shells: 3.0,
            phi: 0.1,
            displace: 0.0,
            d_radius: 0.0,
            d_shells: 0.0,
            n_gauss: 100,
        }
    }
}

/// Multilamellar vesicles: `I = φ·(4πR²)²·F(q)·S(q)` with the shell profile
/// `F` from [`multilayer`] and the shell structure factor `S`. Without
/// layers (or `φ = 0`) only `S(q)` is returned. Columns `q; Iq; Sq; Fq`.
pub fn multilamellar_vesicles(q: &[f64], v: &Vesicle, layers: Option<&MultiLayer>) -> Result<Series> {
    if v.radius <= 0.0 || v.shells < 1.0 {
        return Err(SasError::config("vesicle radius must be > 0 with at least one shell"));
    }
    let with_layers = v.phi != 0.0 && layers.is_some_and(|l| !l.layers.is_empty());
    let (fq, surface, phi, shellmax, profile) = match layers {
        Some(ml) if with_layers => {
            let f = multilayer(q, ml)?;
            let width = f.attr_f64("profilewidth").unwrap_or(0.0);
            (f.y().to_vec(), 4.0 * PI * v.radius * v.radius, v.phi, width, Some(f))
        }
        _ => (vec![1.0; q.len()], 1.0, 1.0, 0.0, None),
    };
    if v.shells * (v.displace + shellmax) > v.radius {
        log::warn!(
            "layers do not fit inside vesicle: N={} displace={} R={}",
            v.shells,
            v.displace,
            v.radius
        );
    }
    let nmax = if v.displace != 0.0 { v.radius / v.displace } else { 0.0 };
    let (ns, nw) = discrete_gaussian(v.shells, v.d_shells, nmax);
    if ns.is_empty() {
        return Err(SasError::config("no shell number fits inside the vesicle"));
    }
    let sq_at = |r: f64| -> Vec<f64> {
        q.iter()
            .map(|&x| ns.iter().zip(&nw).map(|(&n, w)| w * shell_structure_factor(x, r, v.displace, n)).sum())
            .collect()
    };
    let sq = if v.d_radius > 0.0 {
        let (rs, ws) = gauss_nodes(v.radius - 3.0 * v.d_radius, v.radius + 3.0 * v.d_radius, v.n_gauss.max(2));
        let mut acc = vec![0.0; q.len()];
        let mut norm = 0.0;
        for (&r, &w) in rs.iter().zip(&ws) {
            let g = w * gauss_pdf(r, v.radius, v.d_radius);
            norm += g;
            for (a, s) in acc.iter_mut().zip(sq_at(r)) {
                *a += g * s;
            }
        }
        acc.into_iter().map(|a| a / norm).collect()
    } else {
        sq_at(v.radius)
    };
    let iq = fq.iter().zip(&sq).map(|(f, s)| phi * surface * surface * f * s).collect();

    let mut out = model_series(q, vec![iq, sq, fq], "q; Iq; Sq; Fq", "multilamellarVesicles")?;
    if let Some(f) = &profile {
        out.copy_attrs_from(f);
    }
    out.put("outerShellVolume", surface * shellmax);
    out.put("Ndistribution", AttrValue::List(ns.iter().map(|&n| n as f64).collect()));
    out.put("Nweight", AttrValue::List(nw));
    out.put("displace", v.displace);
    out.put("phi", phi);
    out.put("preFactor", phi * (surface * shellmax).powi(2));
    Ok(out)
}
