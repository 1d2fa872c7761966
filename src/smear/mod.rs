//! Resolution smearing and desmearing of 1-D scattering curves.
//!
//! - [`smear`] applies a [`BeamProfile`] to sampled data (line collimation,
//!   pin-hole SANS/SAXS, or an explicit Gaussian σ)
//! - [`Smeared`] wraps a model so it is evaluated on an extended grid and
//!   smeared on every call
//! - [`desmear`] inverts line-collimation smearing iteratively (Lake with
//!   Vad's smoothing)

use crate::beam::BeamProfile;
use crate::error::Result;
use crate::series::{Role, Series};

pub mod desmear;
pub mod explicit;
pub mod extrapolate;
pub mod kratky;
pub mod model;
pub mod pedersen;

pub use desmear::{desmear, DesmearOptions, DesmearStep, Desmeared};
pub use extrapolate::{EdgePolicy, Extrapolation};
pub use model::{ScatteringModel, Smeared};

/// Smear sampled data with `profile`.
///
/// The result carries the data attributes, no eY column, and `profile`
/// attached. Pin-hole and explicit σ results have the extra columns
/// `unsmeared` and the kernel width.
pub fn smear(data: &Series, profile: &BeamProfile) -> Result<Series> {
    let mut out = match profile {
        BeamProfile::Sans(g) => pedersen::resolution_sans(data, g)?,
        BeamProfile::Explicit(e) => explicit::resolution_explicit(data, |q| e.sigma_at(q), &Extrapolation::default())?,
        BeamProfile::Const(s) => explicit::resolution_explicit(data, |_| *s, &Extrapolation::default())?,
        BeamProfile::Measured(line) | BeamProfile::Trapez(line) => {
            let y = kratky::smear_line(data.x(), data.y(), line)?;
            let mut out = data.clone();
            if let Some(col) = out.y_mut() {
                *col = y;
            }
            out.set_role(Role::EY, None)?;
            out
        }
    };
    out.set_beam_profile(Some(profile.clone()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formfactor::sphere;
    use crate::math::grid::loglist;

    #[test]
    fn small_q_keeps_forward_intensity() {
        let q = loglist(0.001, 2.0, 300);
        let ideal = sphere(&q, 2.0, 1.0).unwrap();
        let profile = BeamProfile::Const(0.02);
        let out = smear(&ideal, &profile).unwrap();
        assert!((out.y()[0] / ideal.y()[0] - 1.0).abs() < 0.01);
        assert!(out.ey().is_none());
        assert!(out.beam_profile().is_some());
    }
}
