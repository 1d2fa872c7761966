//! Iterative desmearing after Lake (Acta Cryst. 23, 191, 1967) with the
//! smoothing step of Vad et al. (J. Appl. Cryst. 44, 2011).
//!
//! Starting from the observed curve `u₀ = I_obs`, every step smears the
//! previous estimate and corrects it by the ratio of observed to smeared
//! intensity:
//!
//! ```text
//! γₙ = I_obs / smear(uₙ₋₁)
//! uₙ = I_obs · smooth(uₙ₋₁ / I_obs) · γₙ
//! ```
//!
//! The convergence metric is the mean of `|γₙ − 1|` over `q ≤ qmax`.

use crate::beam::BeamProfile;
use crate::error::{Result, SasError};
use crate::math::smooth::{odd_window, smooth, SmoothWindow};
use crate::series::Series;
use crate::smear::smear;

#[derive(Debug, Clone)]
pub struct DesmearOptions {
    /// `|iterations|` is the maximum number of estimates kept. A negative
    /// value also stops as soon as γ has not decreased for two steps.
    pub iterations: i32,
    /// Smoothing window; even sizes are rounded up to the next odd size.
    pub window: usize,
    pub window_kind: SmoothWindow,
    /// Upper q of the convergence metric.
    pub qmax: f64,
}

impl Default for DesmearOptions {
    fn default() -> Self {
        Self {
            iterations: -15,
            window: 4,
            window_kind: SmoothWindow::Flat,
            qmax: 4.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DesmearStep {
    pub curve: Series,
    /// Mean `|γ − 1|`; `1` for the starting curve.
    pub gamma: f64,
    /// Mean squared distance between smeared estimate and observation.
    pub chi2: f64,
    /// Whether γ reached a new minimum in this step.
    pub decreasing: bool,
}

/// All estimates in order plus the index of the returned one.
#[derive(Debug, Clone)]
pub struct Desmeared {
    pub best: usize,
    pub steps: Vec<DesmearStep>,
}

impl Desmeared {
    pub fn result(&self) -> &Series {
        &self.steps[self.best].curve
    }
}

pub fn desmear(observed: &Series, profile: &BeamProfile, opts: &DesmearOptions) -> Result<Desmeared> {
    if opts.iterations == 0 {
        return Err(SasError::config("desmearing needs at least one iteration"));
    }
    let i0 = observed.y();
    if i0.iter().any(|v| *v == 0.0 || !v.is_finite()) {
        return Err(SasError::numerical("observed intensity must be finite and non-zero for desmearing"));
    }
    let window = odd_window(opts.window);
    let limit = opts.iterations.unsigned_abs() as usize;
    let in_range: Vec<bool> = observed.x().iter().map(|q| *q <= opts.qmax).collect();
    if !in_range.iter().any(|b| *b) {
        return Err(SasError::config(format!("no data below qmax={} for the convergence metric", opts.qmax)));
    }

    let mut steps = vec![DesmearStep {
        curve: observed.clone(),
        gamma: 1.0,
        chi2: 1.0,
        decreasing: true,
    }];
    log::debug!("desmearing: step, gamma, minimal gamma");
    loop {
        let prev = &steps[steps.len() - 1].curve;
        let smeared = smear(prev, profile)?;
        let gamma: Vec<f64> = i0.iter().zip(smeared.y()).map(|(o, s)| o / s).collect();
        let ratio: Vec<f64> = prev.y().iter().zip(i0).map(|(u, o)| u / o).collect();
        let smoothed = smooth(&ratio, window, opts.window_kind)?;
        let mut next = prev.clone();
        if let Some(col) = next.y_mut() {
            *col = i0.iter().zip(&smoothed).zip(&gamma).map(|((o, s), g)| o * s * g).collect();
        }

        let (sum, count) = gamma
            .iter()
            .zip(&in_range)
            .filter(|(_, keep)| **keep)
            .fold((0.0, 0usize), |(s, n), (g, _)| (s + (g - 1.0).abs(), n + 1));
        let mean_gamma = sum / count as f64;
        let chi2 = smeared.y().iter().zip(i0).map(|(s, o)| (s - o).powi(2)).sum::<f64>() / i0.len() as f64;
        let min_gamma = steps.iter().map(|s| s.gamma).fold(f64::INFINITY, f64::min);
        let decreasing = mean_gamma <= min_gamma;
        steps.push(DesmearStep {
            curve: next,
            gamma: mean_gamma,
            chi2,
            decreasing,
        });
        log::debug!("{:3} {mean_gamma:8.5e} {:8.5e} {decreasing}", steps.len(), min_gamma.min(mean_gamma));

        if steps.len() >= limit {
            return Ok(Desmeared {
                best: steps.len() - 1,
                steps,
            });
        }
        let n = steps.len();
        if opts.iterations < 0 && !steps[n - 1].decreasing && !steps[n - 2].decreasing {
            let best = steps
                .iter()
                .enumerate()
                .fold(0, |b, (i, s)| if s.gamma < steps[b].gamma { i } else { b });
            return Ok(Desmeared { best, steps });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::{prepare_beam_profile, ProfileKind, ProfileOptions, ProfileSource};
    use crate::formfactor::sphere;
    use crate::math::grid::linspace;

    #[test]
    fn recovers_a_slit_smeared_sphere() {
        let q = linspace(0.01, 2.0, 400);
        let ideal = sphere(&q, 2.0, 1.0).unwrap();
        let opts = ProfileOptions::trapez(1.0, 0.5).diw(1.0).bxw(0.015);
        let profile = prepare_beam_profile(ProfileSource::Kind(ProfileKind::Trapez), &opts).unwrap();
        let observed = smear(&ideal, &profile).unwrap();
        let out = desmear(&observed, &profile, &DesmearOptions::default()).unwrap();
        assert!(out.steps.len() >= 2);
        assert!(out.steps[out.best].gamma < out.steps[0].gamma);
        let result = out.result();
        for (i, q) in q.iter().enumerate() {
            if (0.05..=0.5).contains(q) {
                let rel = (result.y()[i] / ideal.y()[i] - 1.0).abs();
                assert!(rel < 5e-2, "q={q} rel={rel}");
            }
        }
    }

    #[test]
    fn positive_iterations_run_to_the_limit() {
        let q = linspace(0.01, 1.0, 100);
        let ideal = sphere(&q, 1.0, 1.0).unwrap();
        let profile = prepare_beam_profile(
            ProfileSource::Kind(ProfileKind::Trapez),
            &ProfileOptions::trapez(0.3, 0.1),
        )
        .unwrap();
        let observed = smear(&ideal, &profile).unwrap();
        let opts = DesmearOptions {
            iterations: 4,
            ..DesmearOptions::default()
        };
        let out = desmear(&observed, &profile, &opts).unwrap();
        assert_eq!(out.steps.len(), 4);
        assert_eq!(out.best, 3);
    }
}
