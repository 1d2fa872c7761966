//! Bridge from time-domain models to the frequency domain.
//!
//! `S(ω) = 1/2π ∫ I(t) R(t) exp(−iωt) dt` with `I(t)` mirrored to negative
//! times, evaluated by one real-symmetric FFT.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::dynamic::frequency::bose;
use crate::dynamic::positive;
use crate::dynamic::time::Resolution;
use crate::error::{Result, SasError};
use crate::math::quadrature::simpson;
use crate::series::{interp_linear, Role, Series};

/// Largest number of time samples a transform may request.
const MAX_SAMPLES: usize = 1 << 24;

/// Instrument resolution used by [`time2frequency_ff`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrequencyResolution {
    /// No broadening; the time model itself must decay.
    Elastic,
    /// One Gaussian of width σ (1/ns) in ω.
    Width(f64),
    /// Gaussians in ω as used by [`crate::dynamic::resolution_w`]; means are ignored.
    Gaussians(Resolution),
}

impl FrequencyResolution {
    /// `(σ, amplitude)` of each line.
    fn lines(&self) -> Vec<(f64, f64)> {
        match self {
            // Nominal width that only fixes the covered time range.
            FrequencyResolution::Elastic => vec![(0.5, 1.0)],
            FrequencyResolution::Width(s) => vec![(*s, 1.0)],
            FrequencyResolution::Gaussians(res) => res.peaks.iter().map(|p| (p.sigma, p.amp)).collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            FrequencyResolution::Elastic => Ok(()),
            FrequencyResolution::Width(s) => positive("resolution width", *s),
            FrequencyResolution::Gaussians(res) => res.validate(),
        }
    }

    /// Time-domain resolution normalised to 1 at t = 0.
    fn in_time(&self, t: &[f64]) -> Vec<f64> {
        if matches!(self, FrequencyResolution::Elastic) {
            return vec![1.0; t.len()];
        }
        let lines = self.lines();
        let norm: f64 = lines.iter().map(|(s, a)| s * a).sum();
        t.iter()
            .map(|&t| lines.iter().map(|(s, a)| a * s * (-0.5 * (s * t).powi(2)).exp()).sum::<f64>() / norm)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourierOptions {
    /// Covered time range in units of the narrowest resolution `1/σ`.
    pub tfactor: f64,
    /// Time steps per `1/max|ω|`; larger values reduce aliasing.
    pub oversample: usize,
}

impl Default for FourierOptions {
    fn default() -> Self {
        Self { tfactor: 7.0, oversample: 2 }
    }
}

/// Fourier transform of a time-domain model, broadened by `resolution`.
///
/// `model` is evaluated at `t = 0, Δt, …, (n−1)Δt` with
/// `Δt = 1/(oversample·max|w|)` and `n = max(len(w), tfactor·oversample·max|w|/σ_min)`.
/// The result lives on the symmetric FFT grid (use [`shift_and_binning`] to
/// map it onto measured frequencies); `Sq` holds its integral, which equals
/// `I(t = 0)`.
pub fn time2frequency_ff<F>(model: F, resolution: &FrequencyResolution, w: &[f64], opts: &FourierOptions) -> Result<Series>
where
    F: Fn(&[f64]) -> Result<Series>,
{
    resolution.validate()?;
    let wmax = w.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if !(wmax > 0.0) || !wmax.is_finite() {
        return Err(SasError::config("frequency grid needs a non-zero finite value"));
    }
    if !(opts.tfactor > 0.0) || opts.oversample == 0 {
        return Err(SasError::config("tfactor and oversample must be positive"));
    }
    let oversample = opts.oversample as f64;
    let dt = 1.0 / (oversample * wmax);
    let smin = resolution.lines().iter().map(|l| l.0).fold(f64::INFINITY, f64::min);
    let wanted = (wmax / smin * opts.tfactor * oversample).ceil();
    if !(wanted < MAX_SAMPLES as f64) {
        return Err(SasError::config(format!("transform would need {wanted} time samples")));
    }
    let nn = (wanted as usize).max(w.len()).max(2);
    let t: Vec<f64> = (0..nn).map(|i| i as f64 * dt).collect();
    let tm = model(&t)?;
    if tm.len() != nn {
        return Err(SasError::config(format!("time model returned {} values for {nn} times", tm.len())));
    }
    let timeresol = resolution.in_time(&t);
    let ry: Vec<f64> = timeresol.iter().zip(tm.y()).map(|(r, y)| r * y).collect();

    // Circularly symmetric sequence of odd length: y[M−k] = y[k].
    let m = 2 * nn - 1;
    let mut buffer: Vec<Complex<f64>> = Vec::with_capacity(m);
    buffer.extend(ry.iter().map(|&v| Complex::new(v, 0.0)));
    buffer.extend(ry[1..].iter().rev().map(|&v| Complex::new(v, 0.0)));
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(m).process(&mut buffer);

    let dw = 2.0 * PI / (m as f64 * dt);
    let half: Vec<f64> = buffer[..nn].iter().map(|c| dt * c.re.abs() / (2.0 * PI)).collect();
    let mut wn = Vec::with_capacity(m);
    let mut wy = Vec::with_capacity(m);
    for j in (1..nn).rev() {
        wn.push(-(j as f64) * dw);
        wy.push(half[j]);
    }
    for (j, v) in half.iter().enumerate() {
        wn.push(j as f64 * dw);
        wy.push(*v);
    }
    let integral = simpson(&wy, &wn);

    let mut out = Series::new(vec![wn, wy])?;
    out.copy_attrs_from(&tm);
    out.set_role(Role::EY, None)?;
    let name = format!("{}_t2w", tm.modelname.as_deref().unwrap_or(""));
    let mut out = out.with_columnname("w; Iqw").with_modelname(&name);
    out.put("Sq", integral);
    out.put("timeresol", timeresol);
    out.put("dt", dt);
    log::debug!("time2frequency_ff: {nn} samples, dt={dt:.4e}, Sq={integral:.6}");
    Ok(out)
}

/// Shift `data` by `w0` along ω and resample it on `w` (default: the
/// unshifted abscissa of `data`).
///
/// `dw = None` averages the cubic spline over the neighbouring intervals of
/// each point, `Some(0)` interpolates linearly and `Some(dw)` averages over
/// `[wᵢ − dw, wᵢ + dw]`.
pub fn shift_and_binning(data: &Series, w: Option<&[f64]>, dw: Option<f64>, w0: f64) -> Result<Series> {
    if data.is_empty() {
        return Err(SasError::config("nothing to shift"));
    }
    let target: Vec<f64> = w.map_or_else(|| data.x().to_vec(), <[f64]>::to_vec);
    let mut shifted = data.select_columns(&[
        data.role_index(Role::X).unwrap_or(0),
        data.role_index(Role::Y).unwrap_or(1),
    ])?;
    if let Some(x) = shifted.column_mut(0) {
        for v in x.iter_mut() {
            *v += w0;
        }
    }
    let shifted = shifted.sort_by_x();
    let y: Vec<f64> = match dw {
        Some(d) if d < 0.0 => return Err(SasError::config(format!("bin width must not be negative, got {d}"))),
        Some(d) if d == 0.0 => target.iter().map(|&v| interp_linear(shifted.x(), shifted.y(), v)).collect(),
        Some(d) => {
            let spline = shifted.spline()?;
            target.iter().map(|&v| spline.integrate(v - d, v + d) / (2.0 * d)).collect()
        }
        None => {
            let spline = shifted.spline()?;
            let n = target.len();
            (0..n)
                .map(|i| {
                    let left = if i > 0 { target[i] - target[i - 1] } else { 0.0 };
                    let right = if i + 1 < n { target[i + 1] - target[i] } else { 0.0 };
                    if left + right > 0.0 {
                        spline.integrate(target[i] - left, target[i] + right) / (left + right)
                    } else {
                        spline.eval(target[i])
                    }
                })
                .collect()
        }
    };
    let mut out = Series::new(vec![target, y])?;
    out.copy_attrs_from(data);
    out.columnname = data.columnname.clone();
    out.modelname = data.modelname.clone();
    out.put("w0", w0);
    Ok(out)
}

/// Dynamic susceptibility `χ''(ω) = S(ω)/n(ω)` for ω > 0 and
/// `S(ω)/(n(−ω) + 1)` for ω < 0, with Bose occupation `n`; 0 at ω = 0.
pub fn dynamic_susceptibility(data: &Series, temp: f64) -> Result<Series> {
    positive("temperature", temp)?;
    let x = data.x().to_vec();
    let mut out = data.clone();
    let y = out.y_mut().ok_or_else(|| SasError::config("susceptibility needs a Y column"))?;
    for (yi, &w) in y.iter_mut().zip(&x) {
        *yi = if w > 0.0 {
            *yi / bose(w, temp)
        } else if w < 0.0 {
            *yi / (bose(-w, temp) + 1.0)
        } else {
            0.0
        };
    }
    let name = format!("{}_Susceptibility", data.modelname.as_deref().unwrap_or(""));
    out.put("temperature", temp);
    Ok(out.with_modelname(&name))
}
