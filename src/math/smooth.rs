//! Running-window smoothing.
//!
//! The signal is extended by reflection at both ends before the window is
//! convolved, so the output keeps the input length and edges are not pulled
//! towards zero. Windows always have an odd length to stay centered.

use std::f64::consts::PI;
use std::str::FromStr;

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::{Result, SasError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SmoothWindow {
    /// Moving average.
    #[default]
    Flat,
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
    /// Gaussian with standard deviation `len / 7`.
    Gaussian,
    /// Low-pass filter in Fourier space, keeping `2 n / len` frequencies.
    Fourier,
}

impl FromStr for SmoothWindow {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "hanning" => Ok(Self::Hanning),
            "hamming" => Ok(Self::Hamming),
            "bartlett" => Ok(Self::Bartlett),
            "blackman" => Ok(Self::Blackman),
            "gaussian" => Ok(Self::Gaussian),
            "fourier" => Ok(Self::Fourier),
            other => Err(SasError::config(format!("unknown smoothing window '{other}'"))),
        }
    }
}

/// Window length rounded up to the next odd number.
pub fn odd_window(len: usize) -> usize {
    if len % 2 == 0 { len + 1 } else { len }
}

fn weights(kind: SmoothWindow, m: usize) -> Vec<f64> {
    let span = (m - 1) as f64;
    (0..m)
        .map(|k| {
            let k = k as f64;
            match kind {
                SmoothWindow::Flat | SmoothWindow::Fourier => 1.0,
                SmoothWindow::Hanning => 0.5 - 0.5 * (2.0 * PI * k / span).cos(),
                SmoothWindow::Hamming => 0.54 - 0.46 * (2.0 * PI * k / span).cos(),
                SmoothWindow::Bartlett => 1.0 - (2.0 * k / span - 1.0).abs(),
                SmoothWindow::Blackman => {
                    0.42 - 0.5 * (2.0 * PI * k / span).cos() + 0.08 * (4.0 * PI * k / span).cos()
                }
                SmoothWindow::Gaussian => {
                    let std = m as f64 / 7.0;
                    (-0.5 * ((k - span / 2.0) / std).powi(2)).exp()
                }
            }
        })
        .collect()
}

/// Smooth `data` with a window of (odd) length `window_len`.
pub fn smooth(data: &[f64], window_len: usize, kind: SmoothWindow) -> Result<Vec<f64>> {
    if kind == SmoothWindow::Fourier {
        return Ok(fourier_lowpass(data, window_len.max(1)));
    }
    let m = odd_window(window_len);
    if m < 3 {
        return Ok(data.to_vec());
    }
    let n = data.len();
    if n < m {
        return Err(SasError::config(format!(
            "smoothing needs at least as many points as the window ({n} < {m})"
        )));
    }
    let half = m / 2;
    let mut padded = Vec::with_capacity(n + 2 * half);
    padded.extend((1..=half).rev().map(|i| data[i]));
    padded.extend_from_slice(data);
    padded.extend((1..=half).map(|i| data[n - 1 - i]));

    let w = weights(kind, m);
    let total: f64 = w.iter().sum();
    Ok((0..n)
        .map(|i| padded[i..i + m].iter().zip(&w).map(|(v, wi)| v * wi).sum::<f64>() / total)
        .collect())
}

fn fourier_lowpass(data: &[f64], window_len: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let len = 2 * n;
    let mut buf: Vec<Complex64> = data
        .iter()
        .rev()
        .chain(data.iter())
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(len).process(&mut buf);
    let cut = len / window_len;
    for (k, c) in buf.iter_mut().enumerate() {
        if k.min(len - k) >= cut {
            *c = Complex64::new(0.0, 0.0);
        }
    }
    planner.plan_fft_inverse(len).process(&mut buf);
    buf[n..].iter().map(|c| c.re / len as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_window_averages_neighbours() {
        let data = [0.0, 0.0, 3.0, 0.0, 0.0];
        let s = smooth(&data, 3, SmoothWindow::Flat).unwrap();
        assert_eq!(s.len(), 5);
        assert!((s[1] - 1.0).abs() < 1e-12);
        assert!((s[2] - 1.0).abs() < 1e-12);
        assert!((s[0] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn even_window_is_rounded_up() {
        assert_eq!(odd_window(4), 5);
        let data: Vec<f64> = (0..20).map(|i| i as f64).collect();
        // A linear ramp is preserved by any symmetric window away from the edges.
        let s = smooth(&data, 4, SmoothWindow::Hanning).unwrap();
        for i in 3..17 {
            assert!((s[i] - data[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn constant_is_invariant_including_edges() {
        let data = vec![2.5; 30];
        for kind in [SmoothWindow::Flat, SmoothWindow::Gaussian, SmoothWindow::Blackman, SmoothWindow::Fourier] {
            let s = smooth(&data, 7, kind).unwrap();
            assert!(s.iter().all(|v| (v - 2.5).abs() < 1e-10), "{kind:?}");
        }
    }

    #[test]
    fn rejects_short_input() {
        assert!(smooth(&[1.0, 2.0], 5, SmoothWindow::Flat).is_err());
        assert!("median".parse::<SmoothWindow>().is_err());
    }
}
