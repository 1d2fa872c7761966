//! Dynamic models: intermediate scattering functions `I(q,t)` and dynamic
//! structure factors `S(q,ω)`.
//!
//! Time-domain models return a [`Series`] with X = t and columns named
//! `t; Iqt…`; frequency-domain models use X = ω and `w; Iqw…`. Models that
//! take several wavevectors return one series per q, in input order.
//!
//! Units follow the usual neutron spin-echo and backscattering convention:
//! q in 1/nm, t in ns, ω in 1/ns, diffusion coefficients in nm²/ns.

use crate::error::{Result, SasError};
use crate::series::{Role, Series};

pub mod chain;
pub mod fourier;
pub mod frequency;
pub mod membrane;
pub mod time;

pub use chain::{
    finite_rouse, finite_zimm, ChainModes, DiffusionScale, RouseChain, RouseFriction, ZimmChain, ZimmFriction,
};
pub use fourier::{dynamic_susceptibility, shift_and_binning, time2frequency_ff, FourierOptions, FrequencyResolution};
pub use frequency::{
    bose_distribution, diffusion_harmonic_potential_w, diffusion_in_sphere_w, elastic_w, gauss, get_hwhm, jump_diff_w,
    lorentz, n_site_jump_diffusion_w, resolution_w, rot_diffusion_w, trans_diff_w, voigt,
};
pub use membrane::{zilman_granek_bicontinuous, zilman_granek_lamellar, ZilmanGranek};
pub use time::{
    cumulant, cumulant_diff, cumulant_dls, diffusion_harmonic_potential, diffusion_periodic_potential,
    double_diffusion, integral_zimm, jump_diffusion, methyl_rotation, resolution, simple_diffusion, sphere_cloud,
    stretched_exp, trans_rot_diffusion, PeriodicPotential, Resolution, ResolutionPeak, Scatterer,
};

/// Boltzmann constant in J/K.
pub const KB: f64 = 1.380_649e-23;
/// Planck constant in J·s.
pub const PLANCK: f64 = 6.626_070_15e-34;

/// Build a model result from the abscissa and value columns; eY is unset.
pub(crate) fn dynamic_series(x: &[f64], columns: Vec<Vec<f64>>, columnname: &str, modelname: &str) -> Result<Series> {
    let mut all = Vec::with_capacity(columns.len() + 1);
    all.push(x.to_vec());
    all.extend(columns);
    let mut out = Series::new(all)?;
    out.set_role(Role::EY, None)?;
    Ok(out.with_columnname(columnname).with_modelname(modelname))
}

pub(crate) fn positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(SasError::config(format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

/// Lorentzian `Γ/(π(Γ² + ω²))`.
pub(crate) fn lorentzian(w: f64, gamma: f64) -> f64 {
    gamma / (gamma * gamma + w * w) / std::f64::consts::PI
}

/// Frequencies treated as ω = 0 for elastic lines.
pub(crate) const ELASTIC_EPS: f64 = 1e-8;
