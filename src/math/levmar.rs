//! Bounded Levenberg–Marquardt fitting of a scalar model `f(params, x)`.
//!
//! The damped Gauss-Newton step is computed as the least squares solution of
//! the augmented system
//!
//! ```text
//! [ J        ] δ = [ r ]
//! [ √λ·D     ]     [ 0 ]
//! ```
//!
//! with `D = diag(‖J_j‖)`, reusing the SVD solver from `ols`. Parameters are
//! clamped to their bounds after every step. The Jacobian is numerical
//! (forward differences).

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SasError};
use crate::math::ols::solve_least_squares;

#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative chi² change accepted as convergence.
    pub tolerance: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitResult {
    pub params: Vec<f64>,
    /// Standard errors from the covariance `(JᵀWJ)⁻¹` scaled by the reduced chi².
    pub errors: Vec<f64>,
    /// Weighted sum of squared residuals.
    pub chi2: f64,
    pub iterations: usize,
}

/// Parameter box constraints; `None` entries are unbounded.
#[derive(Debug, Clone, Default)]
pub struct Bounds {
    pub lower: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
}

impl Bounds {
    fn clamp(&self, params: &mut [f64]) {
        for (i, p) in params.iter_mut().enumerate() {
            if let Some(Some(lo)) = self.lower.get(i) {
                *p = p.max(*lo);
            }
            if let Some(Some(hi)) = self.upper.get(i) {
                *p = p.min(*hi);
            }
        }
    }
}

fn chi2<F: Fn(&[f64], f64) -> f64>(f: &F, p: &[f64], x: &[f64], y: &[f64], w: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .zip(w)
        .map(|((&xi, &yi), &wi)| wi * (yi - f(p, xi)).powi(2))
        .sum()
}

/// Fit `f` to `(x, y)` starting from `start`.
///
/// `weights` are `1/σ²` per point (uniform when `None`).
pub fn levenberg_marquardt<F: Fn(&[f64], f64) -> f64>(
    f: F,
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    start: &[f64],
    bounds: &Bounds,
    opts: &LmOptions,
) -> Result<FitResult> {
    let n = x.len();
    let m = start.len();
    if n != y.len() {
        return Err(SasError::config(format!("fit data lengths differ (x={n}, y={})", y.len())));
    }
    if n < m {
        return Err(SasError::numerical(format!("{n} points cannot determine {m} parameters")));
    }
    let w: Vec<f64> = match weights {
        Some(w) => w.to_vec(),
        None => vec![1.0; n],
    };

    let mut params = start.to_vec();
    bounds.clamp(&mut params);
    let mut current = chi2(&f, &params, x, y, &w);
    if !current.is_finite() {
        return Err(SasError::numerical("model is not finite at the start values"));
    }
    let mut lambda = opts.initial_lambda;
    let mut iterations = 0;
    let mut jac = jacobian(&f, &params, x, &w);

    while iterations < opts.max_iterations {
        iterations += 1;
        let col_norms: Vec<f64> = (0..m).map(|j| jac.column(j).norm().max(1e-300)).collect();
        let mut a = DMatrix::<f64>::zeros(n + m, m);
        let mut b = DVector::<f64>::zeros(n + m);
        a.view_mut((0, 0), (n, m)).copy_from(&jac);
        for i in 0..n {
            b[i] = w[i].sqrt() * (y[i] - f(&params, x[i]));
        }
        for j in 0..m {
            a[(n + j, j)] = lambda.sqrt() * col_norms[j];
        }
        let Some(step) = solve_least_squares(&a, &b) else {
            return Err(SasError::numerical("Levenberg–Marquardt step is singular"));
        };

        let mut trial: Vec<f64> = params.iter().zip(step.iter()).map(|(p, d)| p + d).collect();
        bounds.clamp(&mut trial);
        let trial_chi2 = chi2(&f, &trial, x, y, &w);

        if trial_chi2.is_finite() && trial_chi2 <= current {
            let improvement = (current - trial_chi2) / current.max(1e-300);
            params = trial;
            current = trial_chi2;
            lambda = (lambda / 10.0).max(1e-12);
            jac = jacobian(&f, &params, x, &w);
            if improvement < opts.tolerance {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    let errors = standard_errors(&jac, current, n, m);
    log::debug!("Levenberg–Marquardt finished after {iterations} iterations, chi2={current:.4e}");
    Ok(FitResult {
        params,
        errors,
        chi2: current,
        iterations,
    })
}

fn jacobian<F: Fn(&[f64], f64) -> f64>(f: &F, p: &[f64], x: &[f64], w: &[f64]) -> DMatrix<f64> {
    let n = x.len();
    let m = p.len();
    let mut jac = DMatrix::<f64>::zeros(n, m);
    let base: Vec<f64> = x.iter().map(|&xi| f(p, xi)).collect();
    let mut shifted = p.to_vec();
    for j in 0..m {
        let h = 1e-7 * p[j].abs().max(1e-7);
        shifted[j] = p[j] + h;
        for i in 0..n {
            jac[(i, j)] = w[i].sqrt() * (f(&shifted, x[i]) - base[i]) / h;
        }
        shifted[j] = p[j];
    }
    jac
}

fn standard_errors(jac: &DMatrix<f64>, chi2: f64, n: usize, m: usize) -> Vec<f64> {
    let dof = (n.saturating_sub(m)).max(1) as f64;
    let jtj = jac.transpose() * jac;
    match jtj.try_inverse() {
        Some(cov) => (0..m).map(|j| (cov[(j, j)].abs() * chi2 / dof).sqrt()).collect(),
        None => vec![f64::NAN; m],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_gaussian_parameters() {
        let model = |p: &[f64], x: f64| p[0] * (-0.5 * ((x - p[1]) / p[2]).powi(2)).exp();
        let x: Vec<f64> = (0..81).map(|i| -4.0 + i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&v| model(&[3.0, 0.4, 0.7], v)).collect();
        let fit = levenberg_marquardt(model, &x, &y, None, &[1.0, 0.0, 1.0], &Bounds::default(), &LmOptions::default())
            .unwrap();
        assert!((fit.params[0] - 3.0).abs() < 1e-6);
        assert!((fit.params[1] - 0.4).abs() < 1e-6);
        assert!((fit.params[2].abs() - 0.7).abs() < 1e-6);
        assert!(fit.chi2 < 1e-10);
    }

    #[test]
    fn bounds_are_respected() {
        let model = |p: &[f64], x: f64| p[0] + p[1] * x;
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [-1.0, 0.0, 1.0, 2.0];
        let bounds = Bounds {
            lower: vec![Some(0.0), None],
            upper: vec![None, None],
        };
        let fit = levenberg_marquardt(model, &x, &y, None, &[0.5, 0.5], &bounds, &LmOptions::default()).unwrap();
        assert!(fit.params[0] >= 0.0);
    }

    #[test]
    fn too_few_points_is_numerical_error() {
        let model = |p: &[f64], x: f64| p[0] + p[1] * x + p[2] * x * x;
        let err = levenberg_marquardt(model, &[1.0], &[1.0], None, &[0.0; 3], &Bounds::default(), &LmOptions::default());
        assert!(matches!(err, Err(SasError::Numerical(_))));
    }
}
