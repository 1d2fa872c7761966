//! Silver behenate powder pattern used to calibrate the detector distance.

use crate::error::{Result, SasError};
use crate::lattice::AGBE_PERIOD;
use crate::math::faddeeva::voigt;
use crate::series::{Role, Series};

/// Peak shape parameters of the AgBe reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AgBeReference {
    /// Crystallite size in nm for the Scherrer broadening.
    pub domainsize: f64,
    /// Displacement amplitude in the Debye–Waller factor `exp(−u²q²/3)`.
    pub udw: f64,
    pub asym: f64,
    /// Lorentzian/Gaussian width ratio of the Voigt peaks.
    pub lg: f64,
}

impl Default for AgBeReference {
    fn default() -> Self {
        Self { domainsize: 100.0, udw: 0.1, asym: 0.0, lg: 1.0 }
    }
}

impl AgBeReference {
    pub fn domainsize(mut self, v: f64) -> Self {
        self.domainsize = v;
        self
    }

    pub fn udw(mut self, v: f64) -> Self {
        self.udw = v;
        self
    }

    /// Position of the n-th order peak in 1/nm.
    pub fn peak_position(order: usize) -> f64 {
        2.0 * std::f64::consts::PI * order as f64 / AGBE_PERIOD
    }

    /// Intensity at `q` (1/nm) for wavelength `wavelength` (nm), with one
    /// amplitude per reflection order starting at the first.
    ///
    /// Peaks are Voigt profiles in 2θ with the Scherrer width
    /// `0.9λ/(D cos 2θ_B)`, divided by q². Orders beyond the Ewald limit are
    /// skipped. The profile is ideal; smear it before comparing with data.
    pub fn profile(&self, q: &[f64], wavelength: f64, amplitudes: &[f64]) -> Result<Series> {
        if amplitudes.is_empty() {
            return Err(SasError::config("AgBe reference needs the peak amplitude list"));
        }
        if !(wavelength > 0.0) || !(self.domainsize > 0.0) {
            return Err(SasError::config("wavelength and domain size must be positive"));
        }
        let peaks: Vec<(f64, f64, f64)> = amplitudes
            .iter()
            .enumerate()
            .filter_map(|(i, &amp)| {
                let s = (i + 1) as f64 * wavelength / 2.0 / AGBE_PERIOD;
                if s >= 1.0 {
                    log::debug!("AgBe order {} is beyond the Ewald sphere at λ={wavelength}", i + 1);
                    return None;
                }
                let bragg = 2.0 * s.asin();
                let beta = 0.9 * wavelength / (self.domainsize * bragg.cos());
                Some((bragg, beta, amp))
            })
            .collect();
        let y = q
            .iter()
            .map(|&qq| {
                let arg = qq * wavelength / (4.0 * std::f64::consts::PI);
                if !(qq > 0.0) || arg >= 1.0 {
                    return 0.0;
                }
                let two_theta = 2.0 * arg.asin();
                let sum: f64 = peaks
                    .iter()
                    .map(|&(center, fwhm, amp)| amp * voigt(two_theta, center, fwhm, self.lg, self.asym, 1.0))
                    .sum();
                sum / (qq * qq) * (-qq * qq * self.udw * self.udw / 3.0).exp()
            })
            .collect();
        let mut out = Series::new(vec![q.to_vec(), y])?;
        out.set_role(Role::EY, None)?;
        let mut out = out.with_columnname("wavevector; intensity").with_modelname("agbe_reference");
        out.put("wavelength", wavelength);
        out.put("domainsize", self.domainsize);
        out.put("udw", self.udw);
        out.put("amplitudes", amplitudes.to_vec());
        Ok(out)
    }
}

/// [`AgBeReference::profile`] with default peak shapes.
pub fn agbe_reference(q: &[f64], wavelength: f64, amplitudes: &[f64]) -> Result<Series> {
    AgBeReference::default().profile(q, wavelength, amplitudes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::grid::linspace;

    #[test]
    fn peaks_at_reflection_orders() {
        let q = linspace(0.5, 4.0, 3501);
        let s = agbe_reference(&q, 0.154, &[1.0, 0.5, 0.3]).unwrap();
        let y = s.y();
        for order in 1..=3 {
            let q0 = AgBeReference::peak_position(order);
            let window: Vec<usize> = (0..q.len()).filter(|&i| (q[i] - q0).abs() < 0.15).collect();
            let best = window.iter().copied().fold(window[0], |b, i| if y[i] > y[b] { i } else { b });
            assert!((q[best] - q0).abs() < 5e-3, "order {order}: {} vs {q0}", q[best]);
        }
        // first order dominates
        let first = AgBeReference::peak_position(1);
        let i1 = q.iter().position(|v| (v - first).abs() < 5e-4).unwrap();
        assert!(y[i1] > 10.0 * y[0]);
    }

    #[test]
    fn requires_amplitudes() {
        assert!(agbe_reference(&[1.0], 0.154, &[]).is_err());
        assert!(agbe_reference(&[1.0], 0.0, &[1.0]).is_err());
    }

    #[test]
    fn orders_beyond_ewald_limit_are_skipped() {
        // λ = 5 nm allows only the first two orders
        let s = agbe_reference(&[1.0, 2.0], 5.0, &[1.0; 5]).unwrap();
        assert!(s.y().iter().all(|v| v.is_finite()));
    }
}
