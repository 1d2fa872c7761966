//! Cubic interpolating spline with not-a-knot end conditions.
//!
//! The smearing kernels evaluate the ideal curve far off its sample points,
//! and `shift_and_binning` needs exact integrals of the interpolant. Outside
//! the sampled range the first/last polynomial piece is continued.

use crate::error::{Result, SasError};

#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Build the spline through `(x, y)`; `x` must be strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SasError::config(format!(
                "spline needs equal lengths (x={}, y={})",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(SasError::config("spline needs at least one point"));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(SasError::config("spline abscissa must be strictly increasing"));
        }
        let m = second_derivatives(x, y);
        Ok(Self { x: x.to_vec(), y: y.to_vec(), m })
    }

    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    fn interval(&self, x: f64) -> usize {
        let n = self.x.len();
        if n < 2 {
            return 0;
        }
        let i = self.x.partition_point(|v| *v <= x);
        i.saturating_sub(1).min(n - 2)
    }

    /// Polynomial coefficients of piece `i` in `t = x - x_i`.
    fn piece(&self, i: usize) -> [f64; 4] {
        if self.x.len() == 1 {
            return [self.y[0], 0.0, 0.0, 0.0];
        }
        let h = self.x[i + 1] - self.x[i];
        let (mi, mj) = (self.m[i], self.m[i + 1]);
        let b = (self.y[i + 1] - self.y[i]) / h - h * (2.0 * mi + mj) / 6.0;
        [self.y[i], b, mi / 2.0, (mj - mi) / (6.0 * h)]
    }

    pub fn eval(&self, x: f64) -> f64 {
        let i = self.interval(x);
        let [a, b, c, d] = self.piece(i);
        let t = x - self.x[i];
        a + t * (b + t * (c + t * d))
    }

    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }

    /// Exact integral of the interpolant over `[a, b]`.
    pub fn integrate(&self, a: f64, b: f64) -> f64 {
        if b < a {
            return -self.integrate(b, a);
        }
        let n = self.x.len();
        if n == 1 {
            return self.y[0] * (b - a);
        }
        let mut total = 0.0;
        let mut lo = a;
        let mut i = self.interval(a);
        loop {
            let right = if i + 1 >= n - 1 { f64::INFINITY } else { self.x[i + 1] };
            let hi = b.min(right);
            total += self.piece_integral(i, lo - self.x[i], hi - self.x[i]);
            if hi >= b {
                break;
            }
            lo = hi;
            i += 1;
        }
        total
    }

    fn piece_integral(&self, i: usize, t0: f64, t1: f64) -> f64 {
        let [a, b, c, d] = self.piece(i);
        let prim = |t: f64| t * (a + t * (b / 2.0 + t * (c / 3.0 + t * d / 4.0)));
        prim(t1) - prim(t0)
    }
}

fn second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    match n {
        1 | 2 => return vec![0.0; n],
        3 => {
            // Not-a-knot through three points is the interpolating parabola.
            let d0 = (y[1] - y[0]) / (x[1] - x[0]);
            let d1 = (y[2] - y[1]) / (x[2] - x[1]);
            let c = 2.0 * (d1 - d0) / (x[2] - x[0]);
            return vec![c; 3];
        }
        _ => {}
    }

    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let size = n - 2;
    let mut sub = vec![0.0; size];
    let mut diag = vec![0.0; size];
    let mut sup = vec![0.0; size];
    let mut rhs = vec![0.0; size];

    for k in 0..size {
        let i = k + 1;
        sub[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        sup[k] = h[i];
        rhs[k] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
    }

    // Fold the not-a-knot conditions into the first and last rows.
    let (h0, h1) = (h[0], h[1]);
    diag[0] += h0 * (h0 + h1) / h1;
    sup[0] -= h0 * h0 / h1;
    let (ha, hb) = (h[n - 3], h[n - 2]);
    sub[size - 1] -= hb * hb / ha;
    diag[size - 1] += hb * (ha + hb) / ha;

    let inner = solve_tridiagonal(&sub, &diag, &sup, &rhs);

    let mut m = vec![0.0; n];
    m[1..n - 1].copy_from_slice(&inner);
    m[0] = ((h0 + h1) * m[1] - h0 * m[2]) / h1;
    m[n - 1] = ((ha + hb) * m[n - 2] - hb * m[n - 3]) / ha;
    m
}

/// Thomas algorithm; `sub[0]` and `sup[last]` are ignored.
pub fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];
    let mut out = vec![0.0; n];
    if n == 0 {
        return out;
    }
    c[0] = sup[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - sub[i] * c[i - 1];
        c[i] = if i + 1 < n { sup[i] / denom } else { 0.0 };
        d[i] = (rhs[i] - sub[i] * d[i - 1]) / denom;
    }
    out[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        out[i] = d[i] - c[i] * out[i + 1];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproduces_cubic_exactly() {
        let x: Vec<f64> = (0..8).map(|i| i as f64 * 0.7).collect();
        let f = |v: f64| 1.0 - 2.0 * v + 0.5 * v * v - 0.1 * v * v * v;
        let y: Vec<f64> = x.iter().map(|&v| f(v)).collect();
        let s = CubicSpline::new(&x, &y).unwrap();
        for &v in &[0.1, 1.3, 2.9, 4.4, 5.0] {
            assert!((s.eval(v) - f(v)).abs() < 1e-9, "at {v}");
        }
        // Extrapolation continues the end piece.
        assert!((s.eval(5.5) - f(5.5)).abs() < 1e-8);
    }

    #[test]
    fn integral_of_cubic_is_exact() {
        let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| v * v * v).collect();
        let s = CubicSpline::new(&x, &y).unwrap();
        assert!((s.integrate(0.5, 4.5) - (4.5f64.powi(4) - 0.5f64.powi(4)) / 4.0).abs() < 1e-9);
        assert!((s.integrate(2.0, 1.0) + 15.0 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_unsorted_abscissa() {
        assert!(CubicSpline::new(&[0.0, 2.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn three_points_give_parabola() {
        let s = CubicSpline::new(&[0.0, 1.0, 3.0], &[0.0, 1.0, 9.0]).unwrap();
        assert!((s.eval(2.0) - 4.0).abs() < 1e-12);
    }
}
