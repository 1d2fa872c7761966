//! Models wrapped with instrument resolution.
//!
//! [`Smeared`] evaluates a model on a q grid extended far enough for the
//! kernel, smears the result and trims it back to the requested q. The
//! profile can be replaced per call, which is how datasets from different
//! instruments are fitted together: each dataset carries its own profile and
//! [`Smeared::call_for`] picks it up.

use crate::beam::BeamProfile;
use crate::error::{Result, SasError};
use crate::series::{Role, Series};
use crate::smear::explicit::resolution_explicit;
use crate::smear::extrapolate::Extrapolation;
use crate::smear::kratky::smear_line;
use crate::smear::pedersen::{estimate_frame, frame, resolution_sans};

/// Anything that maps a q grid onto a curve.
pub trait ScatteringModel {
    fn evaluate(&self, q: &[f64]) -> Result<Series>;
}

impl<F> ScatteringModel for F
where
    F: Fn(&[f64]) -> Result<Series>,
{
    fn evaluate(&self, q: &[f64]) -> Result<Series> {
        self(q)
    }
}

#[derive(Debug, Clone)]
pub struct Smeared<M> {
    model: M,
    profile: BeamProfile,
}

impl<M: ScatteringModel> Smeared<M> {
    pub fn new(model: M, profile: BeamProfile) -> Self {
        Self { model, profile }
    }

    pub fn profile(&self) -> &BeamProfile {
        &self.profile
    }

    pub fn call(&self, q: &[f64]) -> Result<Series> {
        self.call_with(q, None)
    }

    /// Use the profile attached to `data` if it has one.
    pub fn call_for(&self, data: &Series) -> Result<Series> {
        self.call_with(data.x(), data.beam_profile())
    }

    /// Evaluate with `profile` taking precedence over the wrapper's own.
    pub fn call_with(&self, q: &[f64], profile: Option<&BeamProfile>) -> Result<Series> {
        if q.is_empty() {
            return Err(SasError::config("smeared model called with an empty q grid"));
        }
        let profile = profile.unwrap_or(&self.profile);
        let mut out = match profile {
            BeamProfile::Sans(g) => {
                if !g.is_active() {
                    return self.model.evaluate(q);
                }
                let (low, high) = estimate_frame(q, g);
                let ideal = self.model.evaluate(&extended(&low, q, &high))?;
                let mut g = g.clone();
                g.extrapolation = Extrapolation::none();
                let smeared = resolution_sans(&ideal, &g)?;
                smeared.select_rows(low.len()..low.len() + q.len())
            }
            BeamProfile::Explicit(e) => self.explicit(q, e.min_sigma(), e.max_sigma(), profile)?,
            BeamProfile::Const(s) => self.explicit(q, *s, *s, profile)?,
            BeamProfile::Measured(line) | BeamProfile::Trapez(line) => {
                let mut ideal = self.model.evaluate(q)?;
                let y = smear_line(ideal.x(), ideal.y(), line)?;
                if let Some(col) = ideal.y_mut() {
                    *col = y;
                }
                ideal.set_role(Role::EY, None)?;
                ideal
            }
        };
        out.set_beam_profile(Some(profile.clone()));
        Ok(out)
    }

    /// Extend by 3σ on each side, evaluate, smear and trim.
    fn explicit(&self, q: &[f64], smin: f64, smax: f64, profile: &BeamProfile) -> Result<Series> {
        let (low, high) = frame(q[0], q[q.len() - 1], 3.0 * smin, 3.0 * smax);
        let ideal = self.model.evaluate(&extended(&low, q, &high))?;
        let smeared = resolution_explicit(&ideal, |v| profile.sigma_at(v).unwrap_or(smin), &Extrapolation::none())?;
        Ok(smeared.select_rows(low.len()..low.len() + q.len()))
    }
}

impl<M: ScatteringModel> ScatteringModel for Smeared<M> {
    fn evaluate(&self, q: &[f64]) -> Result<Series> {
        self.call(q)
    }
}

fn extended(low: &[f64], q: &[f64], high: &[f64]) -> Vec<f64> {
    low.iter().chain(q).chain(high).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::{prepare_beam_profile, ProfileKind, ProfileOptions, ProfileSource, SansGeometry};
    use crate::formfactor::sphere;
    use crate::math::grid::loglist;
    use crate::smear::smear;

    fn sphere_model(q: &[f64]) -> Result<Series> {
        sphere(q, 5.0, 1.0)
    }

    #[test]
    fn output_has_the_requested_grid() {
        let q = loglist(0.05, 3.0, 120);
        let sans = prepare_beam_profile(ProfileSource::Kind(ProfileKind::Sans), &ProfileOptions::default()).unwrap();
        let model = Smeared::new(sphere_model, sans);
        let out = model.call(&q).unwrap();
        assert_eq!(out.x(), q.as_slice());
        assert_eq!(out.beam_profile().map(|p| p.kind()), Some(ProfileKind::Sans));
    }

    #[test]
    fn per_dataset_profile_takes_precedence() {
        let q = loglist(0.05, 3.0, 120);
        let sans = prepare_beam_profile(ProfileSource::Kind(ProfileKind::Sans), &ProfileOptions::default()).unwrap();
        let model = Smeared::new(sphere_model, sans);
        let off = BeamProfile::Sans(SansGeometry {
            coll_dist: 0.0,
            ..SansGeometry::default()
        });
        let data = Series::from_xy(q.clone(), vec![0.0; q.len()]).unwrap().with_beam_profile(off);
        let bypassed = model.call_for(&data).unwrap();
        let ideal = sphere(&q, 5.0, 1.0).unwrap();
        assert_eq!(bypassed.y(), ideal.y());
        assert_ne!(model.call(&q).unwrap().y(), ideal.y());
    }

    #[test]
    fn wrapper_agrees_with_smearing_a_dense_curve() {
        let q = loglist(0.1, 2.0, 100);
        let model = Smeared::new(sphere_model, BeamProfile::Const(0.02));
        let wrapped = model.call(&q).unwrap();
        let direct = smear(&sphere(&q, 5.0, 1.0).unwrap(), &BeamProfile::Const(0.02)).unwrap();
        for i in 10..90 {
            let rel = (wrapped.y()[i] - direct.y()[i]).abs() / direct.y()[i];
            assert!(rel < 0.05, "i={i} rel={rel}");
        }
    }
}
