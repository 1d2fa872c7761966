//! Beam profiles: the instrument resolution that smears an ideal curve.
//!
//! A [`BeamProfile`] is a closed sum type:
//!
//! - `Measured`: symmetrised, normalised primary-beam trace of a
//!   line-collimation camera
//! - `Trapez`: idealised trapezoidal line profile with long edge `a` and short
//!   edge `b`
//! - `Sans`: pin-hole collimation geometry (Pedersen kernel)
//! - `Explicit`: tabulated σ(q)
//! - `Const`: one σ for every q
//!
//! Profiles are built once by [`prepare_beam_profile`] and are immutable
//! during a smearing pass. A [`Series`] can carry its own profile so that
//! several datasets measured on different instruments can be fitted together.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SasError};
use crate::math::quadrature::trapz;
use crate::math::ols::polyfit;
use crate::series::{PruneOptions, Series};
use crate::smear::Extrapolation;

mod weights;
mod width;

pub use weights::{length_weights, width_weights, Weights};
pub use width::{get_beam_width, BeamWidthFit};
pub(crate) use width::gauss;

/// Cu Kα wavelength in nm, used when a line profile gives none.
pub const DEFAULT_WAVELENGTH_NM: f64 = 0.155418;
/// SAXSpace sample–detector distance in mm.
pub const DEFAULT_DET_DIST_MM: f64 = 305.3558;

/// String tag of a profile variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Measured,
    Trapez,
    Sans,
    Explicit,
    Const,
}

impl ProfileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Measured => "measured",
            ProfileKind::Trapez => "trapez",
            ProfileKind::Sans => "SANS",
            ProfileKind::Explicit => "explicit",
            ProfileKind::Const => "const",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "measured" => Ok(ProfileKind::Measured),
            "trapez" | "trapz" => Ok(ProfileKind::Trapez),
            "sans" => Ok(ProfileKind::Sans),
            "explicit" => Ok(ProfileKind::Explicit),
            "const" | "constant" => Ok(ProfileKind::Const),
            other => Err(SasError::config(format!("beam profile type '{other}' not recognized"))),
        }
    }
}

/// Beam width perpendicular to the slit.
#[derive(Debug, Clone)]
pub enum BeamWidth {
    /// Half width at half maximum of a Gaussian; `0` disables width smearing.
    Hwhm(f64),
    /// Measured width profile, used as weights after interpolation.
    Profile(Series),
}

impl Default for BeamWidth {
    fn default() -> Self {
        BeamWidth::Hwhm(0.0)
    }
}

/// Line-collimation profile (`Measured` and `Trapez`).
///
/// `x` is symmetric around zero and `∫ y dx = 1`.
#[derive(Debug, Clone)]
pub struct LineProfile {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// nm
    pub wavelength: f64,
    /// mm
    pub det_dist: f64,
    /// Detector slit integration width in q units.
    pub diw: f64,
    pub bxw: BeamWidth,
    /// Long edge (full width at the foot).
    pub a: f64,
    /// Short edge (full width of the plateau).
    pub b: f64,
}

impl LineProfile {
    /// Conversion from detector millimetres to q in 1/nm.
    pub fn qscale(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength / self.det_dist
    }

    pub fn integral(&self) -> f64 {
        trapz(&self.y, &self.x)
    }
}

/// Pin-hole collimation geometry. Lengths in mm, wavelength in nm.
#[derive(Debug, Clone, PartialEq)]
pub struct SansGeometry {
    /// Collimation length `L`.
    pub coll_dist: f64,
    /// Collimation aperture radius `r1`.
    pub coll_aperture: f64,
    /// Sample–detector distance `l`.
    pub det_dist: f64,
    /// Sample aperture radius `r2`.
    pub sample_aperture: f64,
    pub wavelength: f64,
    /// Relative FWHM wavelength spread Δλ/λ.
    pub wavespread: f64,
    pub pixel_width: f64,
    /// Number of pixels averaged per ring.
    pub ring_width: f64,
    pub extrapolation: Extrapolation,
}

impl Default for SansGeometry {
    fn default() -> Self {
        Self {
            coll_dist: 8000.0,
            coll_aperture: 10.0,
            det_dist: 8000.0,
            sample_aperture: 10.0,
            wavelength: 0.5,
            wavespread: 0.2,
            pixel_width: 10.0,
            ring_width: 1.0,
            extrapolation: Extrapolation::default(),
        }
    }
}

impl SansGeometry {
    /// Smearing is applied only when both distances are positive; otherwise
    /// the kernel is the identity.
    pub fn is_active(&self) -> bool {
        self.coll_dist > 0.0 && self.det_dist > 0.0 && self.wavelength > 0.0
    }

    pub fn k0(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength
    }

    /// Detector angular resolution `dq = pixel·ring/l`.
    pub fn detector_resolution(&self) -> f64 {
        self.pixel_width * self.ring_width / self.det_dist
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("collDist", self.coll_dist),
            ("collAperture", self.coll_aperture),
            ("detDist", self.det_dist),
            ("sampleAperture", self.sample_aperture),
            ("wavelength", self.wavelength),
            ("wavespread", self.wavespread),
            ("dpixelWidth", self.pixel_width),
            ("dringwidth", self.ring_width),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            Some((name, v)) => Err(SasError::config(format!("SANS geometry {name}={v} must be finite and >= 0"))),
            None => Ok(()),
        }
    }
}

/// Tabulated σ(q).
#[derive(Debug, Clone)]
pub struct ExplicitSigma {
    pub q: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl ExplicitSigma {
    pub fn sigma_at(&self, q: f64) -> f64 {
        crate::series::interp_linear(&self.q, &self.sigma, q)
    }

    pub fn min_sigma(&self) -> f64 {
        self.sigma.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_sigma(&self) -> f64 {
        self.sigma.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone)]
pub enum BeamProfile {
    Measured(LineProfile),
    Trapez(LineProfile),
    Sans(SansGeometry),
    Explicit(ExplicitSigma),
    Const(f64),
}

impl BeamProfile {
    pub fn kind(&self) -> ProfileKind {
        match self {
            BeamProfile::Measured(_) => ProfileKind::Measured,
            BeamProfile::Trapez(_) => ProfileKind::Trapez,
            BeamProfile::Sans(_) => ProfileKind::Sans,
            BeamProfile::Explicit(_) => ProfileKind::Explicit,
            BeamProfile::Const(_) => ProfileKind::Const,
        }
    }

    pub fn line(&self) -> Option<&LineProfile> {
        match self {
            BeamProfile::Measured(p) | BeamProfile::Trapez(p) => Some(p),
            _ => None,
        }
    }

    /// σ(q) for the explicit variants.
    pub fn sigma_at(&self, q: f64) -> Option<f64> {
        match self {
            BeamProfile::Explicit(e) => Some(e.sigma_at(q)),
            BeamProfile::Const(s) => Some(*s),
            _ => None,
        }
    }

    /// The line profile as `[x, y]` for plotting or export.
    pub fn to_series(&self) -> Option<Series> {
        let p = self.line()?;
        let mut s = Series::from_xy(p.x.clone(), p.y.clone()).ok()?;
        s.put("a", p.a);
        s.put("b", p.b);
        s.put("dIW", p.diw);
        if let BeamWidth::Hwhm(h) = p.bxw {
            s.put("bxw", h);
        }
        s.put("wavelength", p.wavelength);
        s.put("detDist", p.det_dist);
        s.put("qscale", p.qscale());
        s.put("beamProfType", self.kind().as_str());
        Some(s.with_columnname("x; profile"))
    }
}

/// Input accepted by [`prepare_beam_profile`].
#[derive(Debug, Clone, Copy)]
pub enum ProfileSource<'a> {
    /// One σ for all q.
    Sigma(f64),
    /// Column `column` of `data` holds σ at `data.X`.
    Explicit { data: &'a Series, column: usize },
    /// Measured primary-beam trace (first two columns are used).
    Measured(&'a Series),
    /// A bare kind; only `Trapez` and `Sans` can be built from options alone.
    Kind(ProfileKind),
}

/// Optional overrides; unset fields take the per-kind defaults.
#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    pub coll_dist: Option<f64>,
    pub coll_aperture: Option<f64>,
    pub det_dist: Option<f64>,
    pub sample_aperture: Option<f64>,
    pub wavelength: Option<f64>,
    pub wavespread: Option<f64>,
    pub pixel_width: Option<f64>,
    pub ring_width: Option<f64>,
    pub extrapolation: Option<Extrapolation>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub diw: Option<f64>,
    pub bxw: Option<BeamWidth>,
}

impl ProfileOptions {
    pub fn trapez(a: f64, b: f64) -> Self {
        Self {
            a: Some(a),
            b: Some(b),
            ..Self::default()
        }
    }

    pub fn diw(mut self, diw: f64) -> Self {
        self.diw = Some(diw);
        self
    }

    pub fn bxw(mut self, hwhm: f64) -> Self {
        self.bxw = Some(BeamWidth::Hwhm(hwhm));
        self
    }

    /// SANS geometry options from a full geometry.
    pub fn sans(g: &SansGeometry) -> Self {
        Self {
            coll_dist: Some(g.coll_dist),
            coll_aperture: Some(g.coll_aperture),
            det_dist: Some(g.det_dist),
            sample_aperture: Some(g.sample_aperture),
            wavelength: Some(g.wavelength),
            wavespread: Some(g.wavespread),
            pixel_width: Some(g.pixel_width),
            ring_width: Some(g.ring_width),
            extrapolation: Some(g.extrapolation),
            ..Self::default()
        }
    }

    /// Apply the set geometry fields on top of `base`.
    pub fn apply_to(&self, base: &SansGeometry) -> SansGeometry {
        SansGeometry {
            coll_dist: self.coll_dist.unwrap_or(base.coll_dist),
            coll_aperture: self.coll_aperture.unwrap_or(base.coll_aperture),
            det_dist: self.det_dist.unwrap_or(base.det_dist),
            sample_aperture: self.sample_aperture.unwrap_or(base.sample_aperture),
            wavelength: self.wavelength.unwrap_or(base.wavelength),
            wavespread: self.wavespread.unwrap_or(base.wavespread),
            pixel_width: self.pixel_width.unwrap_or(base.pixel_width),
            ring_width: self.ring_width.unwrap_or(base.ring_width),
            extrapolation: self.extrapolation.unwrap_or(base.extrapolation),
        }
    }
}

/// Build a beam profile from `source`.
///
/// Line profiles are normalised to unit area. A measured trace is pruned to
/// 100 points, baseline-subtracted, centred on its 0.8·max plateau and
/// mirrored to make it even; the trapezoid edges `a`, `b` are then fitted by a
/// straight line through the positive flank between 10% and 90% of the
/// maximum.
pub fn prepare_beam_profile(source: ProfileSource<'_>, opts: &ProfileOptions) -> Result<BeamProfile> {
    let profile = match source {
        ProfileSource::Sigma(sigma) => {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(SasError::config(format!("single-σ profile needs σ > 0, got {sigma}")));
            }
            BeamProfile::Const(sigma)
        }
        ProfileSource::Explicit { data, column } => explicit_profile(data, column)?,
        ProfileSource::Measured(data) => BeamProfile::Measured(measured_profile(data, opts)?),
        ProfileSource::Kind(ProfileKind::Trapez) => BeamProfile::Trapez(trapez_profile(opts)?),
        ProfileSource::Kind(ProfileKind::Sans) => {
            let geometry = opts.apply_to(&SansGeometry::default());
            geometry.validate()?;
            BeamProfile::Sans(geometry)
        }
        ProfileSource::Kind(kind) => {
            return Err(SasError::config(format!("a '{kind}' beam profile needs data")));
        }
    };
    log::debug!("prepared {} beam profile", profile.kind());
    Ok(profile)
}

fn explicit_profile(data: &Series, column: usize) -> Result<BeamProfile> {
    let sigma = data
        .column(column)
        .ok_or_else(|| SasError::config(format!("explicit σ column {column} not in data with {} columns", data.ncols())))?;
    if let Some(bad) = sigma.iter().find(|s| !(**s > 0.0)) {
        return Err(SasError::config(format!("explicit σ must be > 0, found {bad}")));
    }
    Ok(BeamProfile::Explicit(ExplicitSigma {
        q: data.x().to_vec(),
        sigma: sigma.to_vec(),
    }))
}

fn line_defaults(opts: &ProfileOptions) -> (f64, f64, f64, BeamWidth) {
    (
        opts.wavelength.unwrap_or(DEFAULT_WAVELENGTH_NM),
        opts.det_dist.unwrap_or(DEFAULT_DET_DIST_MM),
        opts.diw.unwrap_or(0.0),
        opts.bxw.clone().unwrap_or_default(),
    )
}

fn measured_profile(data: &Series, opts: &ProfileOptions) -> Result<LineProfile> {
    let xy = data.select_columns(&[0, 1])?;
    let pruned = xy.prune(&PruneOptions::bins(100).unweighted())?;
    let mut x = pruned.x().to_vec();
    let mut y = pruned.y().to_vec();
    if x.len() < 5 {
        return Err(SasError::config(format!("measured beam profile has only {} points", x.len())));
    }

    let ymin = y.iter().copied().fold(f64::INFINITY, f64::min);
    y.iter_mut().for_each(|v| *v -= ymin);
    let ymax = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(ymax > 0.0) {
        return Err(SasError::numerical("measured beam profile is flat"));
    }
    let plateau: Vec<f64> = x.iter().zip(&y).filter(|(_, v)| **v > 0.8 * ymax).map(|(x, _)| *x).collect();
    let center = plateau.iter().sum::<f64>() / plateau.len() as f64;
    x.iter_mut().for_each(|v| *v -= center);

    // Mirror the shorter side onto the longer one.
    let negative = x.iter().filter(|v| **v < 0.0).count();
    let positive = x.iter().filter(|v| **v > 0.0).count();
    let ml = (2 * negative.min(positive)).min(y.len());
    let span = if negative > positive { y.len() - ml..y.len() } else { 0..ml };
    let window: Vec<f64> = y[span.clone()].to_vec();
    for (k, i) in span.enumerate() {
        y[i] = 0.5 * (window[k] + window[window.len() - 1 - k]);
    }

    let norm = trapz(&y, &x);
    if !(norm > 0.0) {
        return Err(SasError::numerical("measured beam profile has no area"));
    }
    y.iter_mut().for_each(|v| *v /= norm);

    let (a, b) = fit_trapez_edges(&x, &y)?;
    let (wavelength, det_dist, diw, bxw) = line_defaults(opts);
    Ok(LineProfile {
        x,
        y,
        wavelength,
        det_dist,
        diw,
        bxw,
        a: opts.a.unwrap_or(a),
        b: opts.b.unwrap_or(b),
    })
}

/// Straight line through the positive high flank: its zero crossing gives the
/// foot `a/2`, its crossing with the plateau height gives `b/2`.
fn fit_trapez_edges(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    let ymax = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (fx, fy): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(xv, yv)| **yv < 0.9 * ymax && **yv > 0.1 * ymax && **xv > 0.0)
        .map(|(a, b)| (*a, *b))
        .unzip();
    let top: Vec<(f64, f64)> = x.iter().zip(y).filter(|(_, yv)| **yv > 0.9 * ymax).map(|(a, b)| (*a, *b)).collect();
    let top_extent = top.iter().map(|(xv, _)| xv.abs()).fold(0.0, f64::max);
    let inner: Vec<f64> = top.iter().filter(|(xv, _)| xv.abs() < 0.9 * top_extent).map(|(_, yv)| *yv).collect();
    let top_mean = if inner.is_empty() {
        top.iter().map(|(_, yv)| yv).sum::<f64>() / top.len().max(1) as f64
    } else {
        inner.iter().sum::<f64>() / inner.len() as f64
    };
    let coeffs = polyfit(&fx, &fy, None, 1)
        .ok_or_else(|| SasError::numerical(format!("beam flank fit failed on {} points", fx.len())))?;
    let (intercept, slope) = (coeffs[0], coeffs[1]);
    if slope == 0.0 {
        return Err(SasError::numerical("beam flank has zero slope"));
    }
    Ok((-2.0 * intercept / slope, 2.0 * (top_mean - intercept) / slope))
}

fn trapez_profile(opts: &ProfileOptions) -> Result<LineProfile> {
    let (Some(mut a), Some(mut b)) = (opts.a, opts.b) else {
        return Err(SasError::config("trapez beam profile needs both edges a and b"));
    };
    if !(a > 0.0 && b > 0.0) {
        return Err(SasError::config(format!("trapez edges must be > 0 (a={a}, b={b})")));
    }
    if a == b {
        a *= 1.0 + 1e-7;
        b *= 1.0 - 1e-7;
    }
    if a < b {
        std::mem::swap(&mut a, &mut b);
    }
    let x = vec![-a, -a / 2.0, -b / 2.0, b / 2.0, a / 2.0, a];
    let raw = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
    let norm = trapz(&raw, &x);
    let y = raw.iter().map(|v| v / norm).collect();
    let (wavelength, det_dist, diw, bxw) = line_defaults(opts);
    Ok(LineProfile {
        x,
        y,
        wavelength,
        det_dist,
        diw,
        bxw,
        a,
        b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured_trace() -> Series {
        // Trapezoid (a=1, b=0.4) centred at 0.3 on a baseline of 5.
        let x: Vec<f64> = (0..400).map(|i| -1.2 + i as f64 * 0.006).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| {
                let d = (v - 0.3).abs();
                let h = if d <= 0.2 {
                    1.0
                } else if d <= 0.5 {
                    (0.5 - d) / 0.3
                } else {
                    0.0
                };
                5.0 + 100.0 * h
            })
            .collect();
        Series::from_xy(x, y).unwrap()
    }

    #[test]
    fn trapez_is_normalized_and_ordered() {
        let p = prepare_beam_profile(ProfileSource::Kind(ProfileKind::Trapez), &ProfileOptions::trapez(0.5, 1.0)).unwrap();
        let BeamProfile::Trapez(line) = &p else { panic!("wrong kind") };
        assert_eq!(line.a, 1.0);
        assert_eq!(line.b, 0.5);
        assert!((line.integral() - 1.0).abs() < 5e-4);
        assert_eq!(line.wavelength, DEFAULT_WAVELENGTH_NM);
    }

    #[test]
    fn equal_trapez_edges_are_nudged_apart() {
        let p = prepare_beam_profile(ProfileSource::Kind(ProfileKind::Trapez), &ProfileOptions::trapez(1.0, 1.0)).unwrap();
        let line = p.line().unwrap();
        assert!(line.a > line.b);
        assert!((line.integral() - 1.0).abs() < 5e-4);
    }

    #[test]
    fn measured_profile_is_centered_and_fitted() {
        let trace = measured_trace();
        let p = prepare_beam_profile(ProfileSource::Measured(&trace), &ProfileOptions::default()).unwrap();
        let line = p.line().unwrap();
        assert!((line.integral() - 1.0).abs() < 5e-4);
        assert!((line.a - 1.0).abs() < 0.08, "a={}", line.a);
        assert!((line.b - 0.4).abs() < 0.08, "b={}", line.b);
        let peak = line.x[line.y.iter().enumerate().fold(0, |m, (i, v)| if *v > line.y[m] { i } else { m })];
        assert!(peak.abs() < 0.25);
    }

    #[test]
    fn sigma_must_be_positive() {
        assert!(matches!(
            prepare_beam_profile(ProfileSource::Sigma(0.0), &ProfileOptions::default()),
            Err(SasError::Config(_))
        ));
        let p = prepare_beam_profile(ProfileSource::Sigma(0.02), &ProfileOptions::default()).unwrap();
        assert_eq!(p.sigma_at(3.0), Some(0.02));
    }

    #[test]
    fn explicit_column_is_interpolated() {
        let data = Series::new(vec![vec![0.1, 1.0], vec![5.0, 6.0], vec![0.01, 0.1]]).unwrap();
        let p = prepare_beam_profile(ProfileSource::Explicit { data: &data, column: 2 }, &ProfileOptions::default())
            .unwrap();
        assert_eq!(p.kind(), ProfileKind::Explicit);
        assert!((p.sigma_at(0.55).unwrap() - 0.055).abs() < 1e-12);
    }

    #[test]
    fn sans_takes_overrides_and_kind_parses() {
        let opts = ProfileOptions {
            coll_dist: Some(2000.0),
            wavelength: Some(0.6),
            ..ProfileOptions::default()
        };
        let p = prepare_beam_profile(ProfileSource::Kind("SANS".parse().unwrap()), &opts).unwrap();
        let BeamProfile::Sans(g) = p else { panic!("wrong kind") };
        assert_eq!(g.coll_dist, 2000.0);
        assert_eq!(g.det_dist, 8000.0);
        assert!(g.is_active());
        assert!("sphere".parse::<ProfileKind>().is_err());
        assert!(prepare_beam_profile(ProfileSource::Kind(ProfileKind::Measured), &opts).is_err());
    }
}
