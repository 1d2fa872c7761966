//! Forward X-ray scattering of water, the usual absolute-scale standard.
//!
//! `I(0) = ρ² (10 r_e)² k_B T χ_T + Σᵢ cᵢ N_A 10³ r_e² n_{e,i}²` in 1/cm, with
//! ρ the number density of water molecules and χ_T its isothermal
//! compressibility. Solutes only add their own ideal-gas term; their effect
//! on the water density is not modelled.

use std::str::FromStr;

use clap::ValueEnum;

use crate::error::{Result, SasError};
use crate::reference::elements::Component;

/// Classical electron radius in nm.
pub const ELECTRON_RADIUS: f64 = 2.817_940_326_2e-6;
const AVOGADRO: f64 = 6.022_140_76e23;
const BOLTZMANN: f64 = 1.380_649e-23;
const MW_H2O: f64 = 18.015_28;
const MW_D2O: f64 = 20.0272;

/// Unit of the leading amount of each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConcentrationUnit {
    /// mol/l
    #[default]
    Mol,
    /// g/l
    Mass,
}

impl FromStr for ConcentrationUnit {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mol" => Ok(ConcentrationUnit::Mol),
            "mass" | "g" => Ok(ConcentrationUnit::Mass),
            other => Err(SasError::config(format!("unknown concentration unit '{other}'"))),
        }
    }
}

/// Kell polynomial `(a₀ + a₁t + … + a₅t⁵)/(1 + b t)` in kg/m³, t in °C.
fn kell(t: f64, c: &[f64; 7]) -> f64 {
    let poly = c[..6].iter().rev().fold(0.0, |acc, a| acc * t + a);
    poly / (1.0 + c[6] * t)
}

// D₂O: leading coefficient adjusted to put the density maximum at 11.23 °C.
const KELL_D2O: [f64; 7] = [1104.633, 28.88152, -7.652899e-3, -136.61854e-6, 534.7350e-9, -1361.843e-12, 25.91488e-3];
const KELL_H2O: [f64; 7] =
    [999.84252, 16.945227, -7.9870641e-3, -46.170600e-6, 105.56334e-9, -280.54337e-12, 16.879850e-3];

/// Density of an H₂O/D₂O mixture in g/ml; `temp` in K.
pub fn water_density(d2o_fraction: f64, temp: f64) -> f64 {
    let t = temp - 273.15;
    let f = d2o_fraction.clamp(0.0, 1.0);
    (f * kell(t, &KELL_D2O) + (1.0 - f) * kell(t, &KELL_H2O)) / 1000.0
}

/// Isothermal compressibility of an H₂O/D₂O mixture in 1/bar; `temp` in K.
pub fn water_compressibility(d2o_fraction: f64, temp: f64) -> f64 {
    let t = temp - 273.15;
    let h2o = 50.9804 - 0.374957 * t + 7.21324e-3 * t.powi(2) - 64.1785e-6 * t.powi(3) + 0.343024e-6 * t.powi(4)
        - 0.684212e-9 * t.powi(5);
    let d2o = 53.61 - 0.4717 * t + 0.009703 * t.powi(2) - 0.0001015 * t.powi(3) + 0.0000005299 * t.powi(4);
    let f = d2o_fraction.clamp(0.0, 1.0);
    1e-6 * (f * d2o + (1.0 - f) * h2o)
}

/// Forward scattering `I(0)` in 1/cm of an aqueous solution.
///
/// Water enters as `h2o1`/`d2o1` components, e.g. `["55.5h2o1"]`; dissociated
/// ions must be listed separately (`0.1na1`, `0.1cl1`).
pub fn water_xray_scattering<S: AsRef<str>>(composition: &[S], temp: f64, units: ConcentrationUnit) -> Result<f64> {
    if !(temp > 0.0) {
        return Err(SasError::config(format!("temperature must be positive, got {temp}")));
    }
    let re_m = ELECTRON_RADIUS * 1e-9;
    let (mut ch2o, mut cd2o) = (0.0, 0.0);
    let mut solutes = 0.0;
    for text in composition {
        let c: Component = text.as_ref().parse()?;
        let conc = match units {
            ConcentrationUnit::Mol => c.amount,
            ConcentrationUnit::Mass => c.amount / c.mass(),
        };
        if c.is_water() {
            ch2o += conc;
        } else if c.is_heavy_water() {
            cd2o += conc;
        } else {
            // ideal solute: concentration in 1/m³ times (n_e r_e)²
            solutes += conc * AVOGADRO * 1000.0 * (re_m * c.electrons()).powi(2);
        }
    }
    let d2o_fraction = if ch2o + cd2o > 0.0 { cd2o / (ch2o + cd2o) } else { 0.0 };
    let mw = MW_H2O + d2o_fraction * (MW_D2O - MW_H2O);
    let number_density = water_density(d2o_fraction, temp) * 1e6 / mw * AVOGADRO;
    let chi = water_compressibility(d2o_fraction, temp) * 1e-5;
    let water = number_density.powi(2) * (re_m * 10.0).powi(2) * BOLTZMANN * temp * chi;
    let i0 = (water + solutes) / 100.0;
    log::debug!("water I(0) at {temp} K, D2O fraction {d2o_fraction:.3}: {i0:.5} 1/cm");
    Ok(i0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn density_maxima() {
        assert_relative_eq!(water_density(0.0, 277.13), 0.99997, epsilon = 5e-5);
        assert_relative_eq!(water_density(1.0, 284.38), 1.1059, epsilon = 5e-4);
        assert!(water_density(0.0, 293.15) < water_density(0.0, 277.15));
    }

    #[test]
    fn compressibility_at_room_temperature() {
        assert_relative_eq!(water_compressibility(0.0, 293.15), 45.9e-6, max_relative = 1e-2);
    }

    #[test]
    fn pure_water_absolute_scale() {
        let i0 = water_xray_scattering(&["55.5H2O1"], 293.0, ConcentrationUnit::Mol).unwrap();
        assert_relative_eq!(i0, 0.0164, max_relative = 1e-2);
    }

    #[test]
    fn salt_adds_scattering() {
        let pure = water_xray_scattering(&["55.5h2o1"], 293.0, ConcentrationUnit::Mol).unwrap();
        let salty = water_xray_scattering(&["55.5h2o1", "1na1", "1cl1"], 293.0, ConcentrationUnit::Mol).unwrap();
        assert!(salty > pure);
        assert!("kg".parse::<ConcentrationUnit>().is_err());
        assert!(water_xray_scattering(&["h2o"], 293.0, ConcentrationUnit::Mol).is_err());
    }
}
