//! Special functions used by the scattering models.
//!
//! Error and gamma functions come from `statrs` and integer-order Bessel
//! functions from `scilib`. The rest is evaluated here with series below a
//! crossover and asymptotic expansions above it.

use std::f64::consts::PI;
use std::sync::OnceLock;

use scilib::math::bessel;
pub use statrs::function::erf::{erf, erfc};
pub use statrs::function::gamma::{gamma, gamma_li, ln_gamma};

use crate::math::quadrature::fixed_gauss;

/// Exponentially scaled modified Bessel function `exp(-|x|) I₀(x)`.
pub fn i0e(x: f64) -> f64 {
    let x = x.abs();
    if x <= 15.0 {
        let q = x * x / 4.0;
        let mut term = 1.0;
        let mut sum = 1.0;
        let mut k = 1.0;
        while term > 1e-17 * sum {
            term *= q / (k * k);
            sum += term;
            k += 1.0;
        }
        return sum * (-x).exp();
    }
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..40 {
        let kf = k as f64;
        let next = term * (2.0 * kf - 1.0).powi(2) / (8.0 * kf * x);
        if next.abs() >= term.abs() {
            break;
        }
        term = next;
        sum += term;
    }
    sum / (2.0 * PI * x).sqrt()
}

fn bessel_asymptotic(nu: u32, x: f64) -> f64 {
    let mu = 4.0 * (nu * nu) as f64;
    let mut p = 0.0;
    let mut q = 0.0;
    let mut a = 1.0;
    let mut last = f64::INFINITY;
    for k in 0..60 {
        if k > 0 {
            let kf = k as f64;
            a *= (mu - (2.0 * kf - 1.0).powi(2)) / (8.0 * kf * x);
        }
        if a.abs() > last {
            break;
        }
        last = a.abs();
        let sign = if (k / 2) % 2 == 0 { 1.0 } else { -1.0 };
        if k % 2 == 0 {
            p += sign * a;
        } else {
            q += sign * a;
        }
        if a.abs() < 1e-17 {
            break;
        }
    }
    let chi = x - (nu as f64 / 2.0 + 0.25) * PI;
    (2.0 / (PI * x)).sqrt() * (p * chi.cos() - q * chi.sin())
}

/// Power series from `scilib` loses digits to cancellation past this.
const BESSEL_SERIES_LIMIT: f64 = 12.0;

/// Bessel function of the first kind, order 0.
pub fn j0(x: f64) -> f64 {
    let x = x.abs();
    if x < BESSEL_SERIES_LIMIT { bessel::j_n(0, x) } else { bessel_asymptotic(0, x) }
}

/// Bessel function of the first kind, order 1.
pub fn j1(x: f64) -> f64 {
    let s = x.signum();
    let x = x.abs();
    s * if x < BESSEL_SERIES_LIMIT { bessel::j_n(1, x) } else { bessel_asymptotic(1, x) }
}

/// `2 J₁(x)/x`, equal to 1 at the origin.
pub fn j1x(x: f64) -> f64 {
    if x.abs() < 1e-8 { 1.0 } else { 2.0 * j1(x) / x }
}

/// Unnormalized sinc `sin(x)/x`.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-8 { 1.0 - x * x / 6.0 } else { x.sin() / x }
}

/// Spherical Bessel functions `j_0(x) ..= j_lmax(x)`.
pub fn spherical_jn_all(lmax: usize, x: f64) -> Vec<f64> {
    let mut out = vec![0.0; lmax + 1];
    if x == 0.0 {
        out[0] = 1.0;
        return out;
    }
    let ax = x.abs();
    if ax > lmax as f64 {
        out[0] = x.sin() / x;
        if lmax >= 1 {
            out[1] = x.sin() / (x * x) - x.cos() / x;
        }
        for l in 1..lmax {
            out[l + 1] = (2 * l + 1) as f64 / x * out[l] - out[l - 1];
        }
        return out;
    }
    if ax < 1e-6 {
        // Leading term x^l / (2l+1)!!
        let mut v = 1.0;
        for (l, o) in out.iter_mut().enumerate() {
            if l > 0 {
                v *= x / (2 * l + 1) as f64;
            }
            *o = v;
        }
        return out;
    }

    // Miller's downward recurrence, normalized by j0 or j1.
    let start = lmax.max(ax as usize) + 20 + (40.0 * lmax as f64).sqrt() as usize;
    let mut scratch = vec![0.0; start + 2];
    scratch[start] = 1e-300;
    for l in (1..=start).rev() {
        scratch[l - 1] = (2 * l + 1) as f64 / x * scratch[l] - scratch[l + 1];
        if scratch[l - 1].abs() > 1e250 {
            for v in scratch[l - 1..].iter_mut() {
                *v *= 1e-250;
            }
        }
    }
    let j0 = x.sin() / x;
    let j1 = x.sin() / (x * x) - x.cos() / x;
    let scale = if j0.abs() >= j1.abs() { j0 / scratch[0] } else { j1 / scratch[1] };
    for (o, s) in out.iter_mut().zip(&scratch) {
        *o = s * scale;
    }
    out
}

/// Spherical Bessel function `j_l(x)`.
pub fn spherical_jn(l: usize, x: f64) -> f64 {
    spherical_jn_all(l, x)[l]
}

/// Derivative `j_l'(x)`.
pub fn spherical_jn_derivative(l: usize, x: f64) -> f64 {
    let j = spherical_jn_all(l + 1, x);
    if l == 0 {
        return -j[1];
    }
    if x == 0.0 {
        return if l == 1 { 1.0 / 3.0 } else { 0.0 };
    }
    j[l - 1] - (l + 1) as f64 / x * j[l]
}

/// Roots `x_nl` of `j_l'(x) = 0` sorted ascending, starting with the trivial
/// root `(0, 0)` of `j_0'`.
///
/// These are the Volino–Dianoux eigenvalues for diffusion inside a sphere.
pub fn spherical_jn_derivative_zeros() -> &'static [(f64, usize)] {
    static ZEROS: OnceLock<Vec<(f64, usize)>> = OnceLock::new();
    ZEROS.get_or_init(|| {
        let xmax = 34.0;
        let step = 0.02;
        let mut roots = vec![(0.0, 0usize)];
        for l in 0..34usize {
            let f = |x: f64| spherical_jn_derivative(l, x);
            let mut a = if l == 0 { 1.0 } else { 0.5 };
            let mut fa = f(a);
            while a < xmax {
                let b = a + step;
                let fb = f(b);
                if fa == 0.0 || fa.signum() != fb.signum() {
                    roots.push((bisect(&f, a, b), l));
                }
                a = b;
                fa = fb;
            }
        }
        roots.sort_by(|p, q| p.0.total_cmp(&q.0));
        roots
    })
}

fn bisect<F: Fn(f64) -> f64>(f: &F, mut a: f64, mut b: f64) -> f64 {
    let mut fa = f(a);
    for _ in 0..80 {
        let m = 0.5 * (a + b);
        let fm = f(m);
        if fm == 0.0 {
            return m;
        }
        if fa.signum() == fm.signum() {
            a = m;
            fa = fm;
        } else {
            b = m;
        }
    }
    0.5 * (a + b)
}

/// Sine integral `Si(x) = ∫₀ˣ sin(t)/t dt`.
pub fn si(x: f64) -> f64 {
    let s = x.signum();
    let x = x.abs();
    if x == 0.0 {
        return 0.0;
    }
    let value = if x <= 12.0 {
        si_series(x)
    } else if x <= 40.0 {
        let mut acc = si_series(12.0);
        let panels = ((x - 12.0) / 2.0).ceil() as usize;
        let h = (x - 12.0) / panels as f64;
        for p in 0..panels {
            let a = 12.0 + p as f64 * h;
            acc += fixed_gauss(|t| t.sin() / t, a, a + h, 24);
        }
        acc
    } else {
        let (mut f, mut g) = (0.0, 0.0);
        let mut term = 1.0;
        for k in 0..12 {
            if k > 0 {
                term *= -((2 * k - 1) * (2 * k)) as f64 / (x * x);
            }
            f += term;
            g += term * (2 * k + 1) as f64 / x;
        }
        PI / 2.0 - f / x * x.cos() - g / x * x.sin()
    };
    s * value
}

fn si_series(x: f64) -> f64 {
    let mut term = x;
    let mut sum = x;
    for k in 1..80 {
        let kf = k as f64;
        term *= -x * x / ((2.0 * kf) * (2.0 * kf + 1.0));
        let add = term / (2.0 * kf + 1.0);
        sum += add;
        if add.abs() < 1e-17 * sum.abs() {
            break;
        }
    }
    sum
}

/// Confluent hypergeometric function `₁F₁(a; b; x)`.
pub fn hyp1f1(a: f64, b: f64, x: f64) -> f64 {
    if x < 0.0 {
        // Kummer's transformation avoids the alternating series.
        return x.exp() * hyp1f1(b - a, b, -x);
    }
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..2000 {
        let kf = k as f64;
        term *= (a + kf) / (b + kf) * x / (kf + 1.0);
        sum += term;
        if term.abs() < 1e-16 * sum.abs() {
            break;
        }
    }
    sum
}

/// Legendre polynomials `P_0(x) ..= P_lmax(x)`.
pub fn legendre_all(lmax: usize, x: f64) -> Vec<f64> {
    let mut p = vec![0.0; lmax + 1];
    p[0] = 1.0;
    if lmax >= 1 {
        p[1] = x;
    }
    for l in 1..lmax {
        let lf = l as f64;
        p[l + 1] = ((2.0 * lf + 1.0) * x * p[l] - lf * p[l - 1]) / (lf + 1.0);
    }
    p
}

/// Fully normalized associated Legendre functions for fixed `m`,
/// `N_lm P_l^m(cos θ)` for `l = m ..= lmax` (index `l - m`).
///
/// With this normalization `Y_lm = N_lm P_l^m(cos θ) e^{imφ}` is orthonormal
/// on the sphere.
pub fn normalized_legendre_m(lmax: usize, m: usize, cos_theta: f64) -> Vec<f64> {
    if m > lmax {
        return Vec::new();
    }
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    // P̄_mm, including the Condon–Shortley phase.
    let mut pmm = (1.0 / (4.0 * PI)).sqrt();
    for k in 1..=m {
        let kf = k as f64;
        pmm *= -((2.0 * kf + 1.0) / (2.0 * kf)).sqrt() * sin_theta;
    }
    let mut out = Vec::with_capacity(lmax - m + 1);
    out.push(pmm);
    if lmax == m {
        return out;
    }
    let mf = m as f64;
    let mut prev = pmm;
    let mut cur = (2.0 * mf + 3.0).sqrt() * cos_theta * pmm;
    out.push(cur);
    for l in m + 2..=lmax {
        let lf = l as f64;
        let a = ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt();
        let b = (((lf - 1.0).powi(2) - mf * mf) / (4.0 * (lf - 1.0).powi(2) - 1.0)).sqrt();
        let next = a * (cos_theta * cur - b * prev);
        prev = cur;
        cur = next;
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bessel_j_reference_values() {
        assert_abs_diff_eq!(j0(1.0), 0.765_197_686_557_966_6, epsilon = 1e-12);
        assert_abs_diff_eq!(j1(1.0), 0.440_050_585_744_933_5, epsilon = 1e-12);
        assert_abs_diff_eq!(j0(20.0), 0.167_024_664_340_583_4, epsilon = 1e-9);
        assert_abs_diff_eq!(j1(20.0), 0.066_833_124_175_850_04, epsilon = 1e-9);
        // continuity at the series / asymptotic crossover
        assert_abs_diff_eq!(j1(11.999_999), j1(12.000_001), epsilon = 1e-6);
        assert_abs_diff_eq!(j1(-1.0), -j1(1.0), epsilon = 1e-15);
    }

    #[test]
    fn bessel_j_tracks_zeros_and_small_arguments() {
        assert_abs_diff_eq!(j0(0.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(j1(0.0), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(j0(1e-4), 1.0 - 2.5e-9, epsilon = 1e-14);
        assert_abs_diff_eq!(j0(2.404_825_557_695_773), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(j1(3.831_705_970_207_512), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(j0(14.930_917_708_487_79), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(j1x(1e-9), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(j1x(2.0), 0.576_724_807_756_873_4, epsilon = 1e-12);
        assert_abs_diff_eq!(j0(-3.0), j0(3.0), epsilon = 1e-15);
    }

    #[test]
    fn i0e_reference_values() {
        assert_abs_diff_eq!(i0e(0.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(i0e(1.0), 0.465_759_607_593_640_6, epsilon = 1e-12);
        assert_abs_diff_eq!(i0e(50.0), 0.056_561_626_647_454_19, epsilon = 1e-10);
        assert_abs_diff_eq!(i0e(15.0 - 1e-9), i0e(15.0 + 1e-9), epsilon = 1e-9);
    }

    #[test]
    fn spherical_bessel_agrees_with_closed_forms() {
        for &x in &[0.3, 2.0, 7.5, 30.0] {
            let j = spherical_jn_all(3, x);
            let (s, c) = (f64::sin(x), f64::cos(x));
            let j2 = (3.0 / (x * x) - 1.0) * s / x - 3.0 * c / (x * x);
            assert_abs_diff_eq!(j[0], s / x, epsilon = 1e-12);
            assert_abs_diff_eq!(j[2], j2, epsilon = 1e-10);
        }
        // deep in the evanescent region
        let j = spherical_jn(10, 0.5);
        assert!(j > 0.0 && j < 1e-12);
    }

    #[test]
    fn volino_zeros_start_with_known_values() {
        let z = spherical_jn_derivative_zeros();
        assert_eq!(z[0], (0.0, 0));
        // first non-trivial zeros: l=1 at 2.0816, l=2 at 3.3421, l=0 at 4.4934
        assert_abs_diff_eq!(z[1].0, 2.081_575_977_818_101, epsilon = 1e-8);
        assert_eq!(z[1].1, 1);
        assert_abs_diff_eq!(z[2].0, 3.342_093_657_365_694, epsilon = 1e-8);
        assert_eq!(z[3].1, 0);
        assert!(z.len() > 100);
    }

    #[test]
    fn sine_integral_matches_reference() {
        assert_abs_diff_eq!(si(1.0), 0.946_083_070_367_183, epsilon = 1e-12);
        assert_abs_diff_eq!(si(20.0), 1.548_241_701_043_439_7, epsilon = 1e-10);
        assert_abs_diff_eq!(si(100.0), 1.562_225_466_889_056_4, epsilon = 1e-10);
        assert_abs_diff_eq!(si(-1.0), -si(1.0), epsilon = 1e-15);
    }

    #[test]
    fn hyp1f1_reduces_to_exponential() {
        assert_abs_diff_eq!(hyp1f1(1.0, 1.0, 2.0), 2f64.exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(hyp1f1(1.0, 1.0, -3.0), (-3f64).exp(), epsilon = 1e-14);
    }

    #[test]
    fn normalized_legendre_is_orthonormal() {
        let (x, w) = crate::math::quadrature::gauss_legendre(40);
        let m = 2;
        let mut norm = [0.0; 3];
        let mut cross = 0.0;
        for (xi, wi) in x.iter().zip(&w) {
            let p = normalized_legendre_m(4, m, *xi);
            for k in 0..3 {
                norm[k] += wi * p[k] * p[k] * 2.0 * PI;
            }
            cross += wi * p[0] * p[2] * 2.0 * PI;
        }
        for v in norm {
            assert_abs_diff_eq!(v, 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(cross, 0.0, epsilon = 1e-12);
    }
}
