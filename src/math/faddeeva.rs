//! Faddeeva function and the functions derived from it.
//!
//! `w(z) = exp(-z²) erfc(-iz)` is evaluated with Weideman's rational
//! expansion (N = 32 terms). The expansion coefficients come from one FFT and
//! are computed once per process. From `w` we get:
//!
//! - Dawson's integral `D(x) = √π/2 · Im w(x)`
//! - the imaginary error function `erfi(x) = 2/√π · exp(x²) D(x)`
//! - Voigt line profiles (Gaussian ⊗ Lorentzian) for Bragg peaks

use std::f64::consts::PI;
use std::sync::OnceLock;

use num_complex::Complex64;
use rustfft::FftPlanner;

const N_TERMS: usize = 32;

struct Weideman {
    l: f64,
    coeffs: Vec<f64>,
}

fn weideman() -> &'static Weideman {
    static TABLE: OnceLock<Weideman> = OnceLock::new();
    TABLE.get_or_init(|| {
        let m = 2 * N_TERMS;
        let m2 = 2 * m;
        let l = (N_TERMS as f64 / 2f64.sqrt()).sqrt();

        let mut f = Vec::with_capacity(m2);
        f.push(0.0);
        for k in -(m as i64) + 1..m as i64 {
            let t = l * (k as f64 * PI / m as f64 / 2.0).tan();
            f.push((-t * t).exp() * (l * l + t * t));
        }

        // fftshift, then a forward transform.
        let mut buf: Vec<Complex64> = (0..m2).map(|i| Complex64::new(f[(i + m) % m2], 0.0)).collect();
        let mut planner = FftPlanner::<f64>::new();
        planner.plan_fft_forward(m2).process(&mut buf);

        let coeffs = buf[1..=N_TERMS].iter().map(|c| c.re / m2 as f64).collect();
        Weideman { l, coeffs }
    })
}

/// Faddeeva function `w(z)`.
pub fn faddeeva(z: Complex64) -> Complex64 {
    if z.im < 0.0 {
        // Reflection keeps the rational expansion in its accurate half plane.
        return 2.0 * (-z * z).exp() - faddeeva(-z);
    }
    let table = weideman();
    let i = Complex64::i();
    let denom = table.l - i * z;
    let zz = (table.l + i * z) / denom;
    let p = table
        .coeffs
        .iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * zz + c);
    2.0 * p / (denom * denom) + (1.0 / PI.sqrt()) / denom
}

/// Dawson's integral `D(x) = exp(-x²) ∫₀ˣ exp(t²) dt`.
pub fn dawson(x: f64) -> f64 {
    PI.sqrt() / 2.0 * faddeeva(Complex64::new(x, 0.0)).im
}

/// Imaginary error function `erfi(x) = -i erf(ix)`.
pub fn erfi(x: f64) -> f64 {
    2.0 / PI.sqrt() * (x * x).exp() * dawson(x)
}

/// Voigt profile normalized to area `amplitude`, centered at `center`.
///
/// `fwhm` is the total width, `lg` the Lorentzian/Gaussian width ratio and
/// `asym` an asymmetry factor that stretches the width on one side
/// (`fwhm_eff = 2 fwhm / (1 + exp(asym (x - center)))`).
pub fn voigt(x: f64, center: f64, fwhm: f64, lg: f64, asym: f64, amplitude: f64) -> f64 {
    let fwhm = 2.0 * fwhm / (1.0 + (asym * (x - center)).exp());
    // Olivero–Longbothum relation between total and Gaussian width.
    let fwhm_g = fwhm / (0.5346 * lg + (0.2166 * lg * lg + 1.0).sqrt());
    let sigma = fwhm_g / (2.0 * (2.0 * 2f64.ln()).sqrt());
    if !(sigma > 0.0) {
        return 0.0;
    }
    let z = Complex64::new(x - center, lg * fwhm_g / 2.0) / 2f64.sqrt() / sigma;
    amplitude / sigma / (2.0 * PI).sqrt() * faddeeva(z).re
}
