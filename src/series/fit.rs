//! Polynomial fits in a transformed Y.

use crate::error::{Result, SasError};
use crate::math::ols::{polyfit, polyval};
use crate::series::Series;

/// Transformation applied to Y before fitting; the inverse is applied to the
/// evaluated polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PolyTransform {
    #[default]
    Identity,
    /// `log y` (a quadratic gives a Guinier-like edge).
    Log,
    /// `y^(1/p)`; a straight line in this variable is a power law of order `p`.
    Power(f64),
}

impl PolyTransform {
    fn forward(self, y: f64) -> f64 {
        match self {
            PolyTransform::Identity => y,
            PolyTransform::Log => y.ln(),
            PolyTransform::Power(p) => y.powf(1.0 / p),
        }
    }

    fn inverse(self, v: f64) -> f64 {
        match self {
            PolyTransform::Identity => v,
            PolyTransform::Log => v.exp(),
            PolyTransform::Power(p) => v.powf(p),
        }
    }
}

impl Series {
    /// Fit a polynomial of degree `deg` to `transform(Y)` versus X and return
    /// `[x_out, inverse(poly(x_out))]`.
    ///
    /// Points whose transformed value is not finite (e.g. `log` of a negative
    /// intensity) are skipped. With errors present the fit is weighted by
    /// `1/eY²`.
    pub fn polyfit(&self, x_out: &[f64], deg: usize, transform: PolyTransform) -> Result<Series> {
        let mut xs = Vec::with_capacity(self.len());
        let mut ys = Vec::with_capacity(self.len());
        let mut ws = Vec::with_capacity(self.len());
        let errors = self.ey();
        for (i, (&x, &y)) in self.x().iter().zip(self.y()).enumerate() {
            let t = transform.forward(y);
            if !t.is_finite() {
                continue;
            }
            xs.push(x);
            ys.push(t);
            let w = errors.map_or(1.0, |e| if e[i] > 0.0 { 1.0 / (e[i] * e[i]) } else { 1.0 });
            ws.push(w);
        }
        let coeffs = polyfit(&xs, &ys, Some(&ws), deg).ok_or_else(|| {
            SasError::numerical(format!("polynomial fit of degree {deg} failed on {} points", xs.len()))
        })?;
        let y_out: Vec<f64> = x_out.iter().map(|&x| transform.inverse(polyval(&coeffs, x))).collect();
        let mut out = Series::from_xy(x_out.to_vec(), y_out)?;
        out.copy_attrs_from(self);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_quadratic_extrapolates_gaussian() {
        let x: Vec<f64> = (1..20).map(|i| i as f64 * 0.05).collect();
        let y: Vec<f64> = x.iter().map(|q| 5.0 * (-q * q / 3.0).exp()).collect();
        let s = Series::from_xy(x, y).unwrap();
        let out = s.polyfit(&[0.0, 1.5], 2, PolyTransform::Log).unwrap();
        assert!((out.y()[0] - 5.0).abs() < 1e-8);
        assert!((out.y()[1] - 5.0 * (-0.75f64).exp()).abs() < 1e-8);
    }

    #[test]
    fn power_transform_reproduces_power_law() {
        let x: Vec<f64> = (1..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (0.5 + 0.2 * v).powi(3)).collect();
        let s = Series::from_xy(x, y).unwrap();
        let out = s.polyfit(&[12.0], 1, PolyTransform::Power(3.0)).unwrap();
        assert!((out.y()[0] - 2.9f64.powi(3)).abs() < 1e-8);
    }
}
