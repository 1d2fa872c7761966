//! Weighted least squares solver and polynomial fits.
//!
//! Small linear regression problems show up all over the library:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! - polynomial edge extrapolation before smearing (Guinier / power law)
//! - flank regression of a measured beam profile
//! - the linear step of the Levenberg–Marquardt solver
//!
//! Rows are scaled by `sqrt(w_i)` and the resulting ordinary least squares
//! problem is solved by SVD, which also copes with tall design matrices.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit a polynomial of degree `deg` to `(x, y)` with optional weights.
///
/// Coefficients are returned lowest order first: `c[0] + c[1] x + ...`.
/// The abscissa is centered and scaled internally to keep the Vandermonde
/// matrix well conditioned.
pub fn polyfit(x: &[f64], y: &[f64], weights: Option<&[f64]>, deg: usize) -> Option<Vec<f64>> {
    let n = x.len();
    if n == 0 || n != y.len() || n < deg + 1 {
        return None;
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let spread = x.iter().map(|v| (v - mean).abs()).fold(0.0_f64, f64::max);
    let scale = if spread > 0.0 { spread } else { 1.0 };

    let mut design = DMatrix::<f64>::zeros(n, deg + 1);
    let mut rhs = DVector::<f64>::zeros(n);
    for i in 0..n {
        let w = weights.map(|w| w[i]).unwrap_or(1.0).max(0.0).sqrt();
        let u = (x[i] - mean) / scale;
        let mut p = 1.0;
        for j in 0..=deg {
            design[(i, j)] = w * p;
            p *= u;
        }
        rhs[i] = w * y[i];
    }
    let scaled = solve_least_squares(&design, &rhs)?;

    // Expand Σ b_j ((x - m)/s)^j back into powers of x.
    let mut coeffs = vec![0.0; deg + 1];
    for (j, b) in scaled.iter().enumerate() {
        let factor = b / scale.powi(j as i32);
        for k in 0..=j {
            let binom = binomial(j, k);
            coeffs[k] += factor * binom * (-mean).powi((j - k) as i32);
        }
    }
    Some(coeffs)
}

/// Evaluate a polynomial given lowest-order-first coefficients.
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn binomial(n: usize, k: usize) -> f64 {
    let mut out = 1.0;
    for i in 0..k {
        out *= (n - i) as f64 / (i + 1) as f64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn polyfit_recovers_quadratic() {
        let x: Vec<f64> = (0..20).map(|i| 10.0 + i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.5 - 0.25 * v + 0.01 * v * v).collect();
        let c = polyfit(&x, &y, None, 2).unwrap();
        assert!((c[0] - 1.5).abs() < 1e-8);
        assert!((c[1] + 0.25).abs() < 1e-9);
        assert!((c[2] - 0.01).abs() < 1e-10);
        assert!((polyval(&c, 12.0) - (1.5 - 3.0 + 1.44)).abs() < 1e-9);
    }

    #[test]
    fn polyfit_rejects_underdetermined_input() {
        assert!(polyfit(&[1.0, 2.0], &[1.0, 2.0], None, 2).is_none());
    }
}
