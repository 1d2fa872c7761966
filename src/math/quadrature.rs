//! Numerical quadrature.
//!
//! - fixed-order Gauss–Legendre (scalar and vector-valued integrands)
//! - adaptive Gauss–Legendre by order doubling
//! - trapezoid and Simpson rules on sampled data

use crate::error::{Result, SasError};

/// Gauss–Legendre nodes and weights on `[-1, 1]`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let n = n.max(1);
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let m = n.div_ceil(2);
    for i in 0..m {
        // Initial guess from the asymptotic root location, refined by Newton.
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (p, d) = legendre_with_derivative(n, z);
            dp = d;
            let dz = p / d;
            z -= dz;
            if dz.abs() < 1e-15 {
                break;
            }
        }
        let (_, d) = legendre_with_derivative(n, z);
        if d.is_finite() {
            dp = d;
        }
        let w = 2.0 / ((1.0 - z * z) * dp * dp);
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let d = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, d)
}

/// Nodes and weights mapped onto `[a, b]`.
pub fn gauss_nodes(a: f64, b: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    let (x, w) = gauss_legendre(n);
    let half = 0.5 * (b - a);
    let mid = 0.5 * (b + a);
    (
        x.iter().map(|v| mid + half * v).collect(),
        w.iter().map(|v| v * half).collect(),
    )
}

/// Fixed-order Gauss–Legendre integral of a scalar function.
pub fn fixed_gauss<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, n: usize) -> f64 {
    let (x, w) = gauss_nodes(a, b, n);
    x.iter().zip(&w).map(|(&xi, &wi)| wi * f(xi)).sum()
}

/// Fixed-order Gauss–Legendre integral of a vector-valued function.
pub fn fixed_gauss_many<F: Fn(f64) -> Vec<f64>>(f: F, a: f64, b: f64, n: usize) -> Vec<f64> {
    let (x, w) = gauss_nodes(a, b, n);
    let mut out: Vec<f64> = Vec::new();
    for (&xi, &wi) in x.iter().zip(&w) {
        let v = f(xi);
        if out.is_empty() {
            out = vec![0.0; v.len()];
        }
        for (o, vi) in out.iter_mut().zip(&v) {
            *o += wi * vi;
        }
    }
    out
}

/// Adaptive Gauss–Legendre: doubles the order until two estimates agree.
pub fn adaptive_gauss<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, tol: f64, rtol: f64, max_order: usize) -> Result<f64> {
    let mut n = 8;
    let mut previous = fixed_gauss(&f, a, b, n);
    while n < max_order {
        n *= 2;
        let current = fixed_gauss(&f, a, b, n);
        if (current - previous).abs() <= tol.max(rtol * current.abs()) {
            return Ok(current);
        }
        previous = current;
    }
    Err(SasError::numerical(format!(
        "adaptive Gauss quadrature did not converge on [{a}, {b}] within order {max_order}"
    )))
}

/// Adaptive Gauss–Legendre for vector-valued integrands (all components must converge).
pub fn adaptive_gauss_many<F: Fn(f64) -> Vec<f64>>(
    f: F,
    a: f64,
    b: f64,
    tol: f64,
    rtol: f64,
    max_order: usize,
) -> Result<Vec<f64>> {
    let mut n = 8;
    let mut previous = fixed_gauss_many(&f, a, b, n);
    while n < max_order {
        n *= 2;
        let current = fixed_gauss_many(&f, a, b, n);
        let converged = current
            .iter()
            .zip(&previous)
            .all(|(c, p)| (c - p).abs() <= tol.max(rtol * c.abs()));
        if converged {
            return Ok(current);
        }
        previous = current;
    }
    Err(SasError::numerical(format!(
        "adaptive Gauss quadrature did not converge on [{a}, {b}] within order {max_order}"
    )))
}

/// Trapezoid rule for sampled `y(x)`.
pub fn trapz(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}

/// Composite Simpson rule for (possibly non-uniform) sampled `y(x)`.
///
/// An odd number of intervals is closed with a trapezoid on the last interval.
pub fn simpson(y: &[f64], x: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 3 {
        return trapz(&y[..n], &x[..n]);
    }
    let mut total = 0.0;
    let mut i = 0;
    while i + 2 < n {
        let h0 = x[i + 1] - x[i];
        let h1 = x[i + 2] - x[i + 1];
        let hs = h0 + h1;
        if h0 <= 0.0 || h1 <= 0.0 {
            total += 0.5 * h0 * (y[i] + y[i + 1]) + 0.5 * h1 * (y[i + 1] + y[i + 2]);
        } else {
            total += hs / 6.0
                * (y[i] * (2.0 - h1 / h0) + y[i + 1] * hs * hs / (h0 * h1) + y[i + 2] * (2.0 - h0 / h1));
        }
        i += 2;
    }
    if i + 1 < n {
        total += 0.5 * (x[i + 1] - x[i]) * (y[i] + y[i + 1]);
    }
    total
}

/// Cumulative trapezoid integral (same length as input, starting at 0).
pub fn cumtrapz(y: &[f64], x: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(x.len());
    let mut acc = 0.0;
    out.push(0.0);
    for i in 1..x.len() {
        acc += 0.5 * (x[i] - x[i - 1]) * (y[i] + y[i - 1]);
        out.push(acc);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauss_legendre_weights_sum_to_two() {
        for n in [1, 2, 5, 21, 60] {
            let (_, w) = gauss_legendre(n);
            assert!((w.iter().sum::<f64>() - 2.0).abs() < 1e-12, "n={n}");
        }
    }

    #[test]
    fn fixed_gauss_is_exact_for_polynomials() {
        // n nodes integrate degree 2n-1 exactly.
        let v = fixed_gauss(|x| x.powi(7) - 3.0 * x * x + 1.0, 0.0, 2.0, 4);
        let exact = 2f64.powi(8) / 8.0 - 8.0 + 2.0;
        assert!((v - exact).abs() < 1e-10);
    }

    #[test]
    fn adaptive_gauss_handles_oscillation() {
        let v = adaptive_gauss(|x| x.sin(), 0.0, std::f64::consts::PI, 1e-12, 1e-12, 256).unwrap();
        assert!((v - 2.0).abs() < 1e-10);
    }

    #[test]
    fn simpson_beats_trapezoid_on_smooth_data() {
        let x: Vec<f64> = (0..=20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| v.exp()).collect();
        let exact = 2f64.exp() - 1.0;
        let s = simpson(&y, &x);
        let t = trapz(&y, &x);
        assert!((s - exact).abs() < 1e-5);
        assert!((s - exact).abs() < (t - exact).abs());
    }
}
