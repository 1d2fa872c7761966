//! Synthetic detector images for tests and demonstrations.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};

use crate::error::{Result, SasError};
use crate::image::{Geometry, SasImage};
use crate::lattice::AGBE_PERIOD;

/// Pilatus-like pin-hole SAXS geometry: 172 µm pixels, 0.4 m, Cu Kα.
pub fn saxs_geometry(center: [f64; 2]) -> Geometry {
    Geometry {
        center,
        detector_distance: Some(0.4),
        pixel_size: Some([172e-6, 172e-6]),
        wavelength: Some(1.54),
        alpha: 0.0,
        beta: 0.0,
        gamma: 0.0,
    }
}

/// Constant image.
pub fn plateau(rows: usize, cols: usize, value: f64, geometry: Geometry) -> SasImage {
    SasImage::from_parts(rows, cols, vec![value; rows * cols], geometry)
}

/// Photon counts drawn from a Poisson distribution with the given mean.
pub fn poisson_plateau(rows: usize, cols: usize, mean: f64, geometry: Geometry, seed: u64) -> Result<SasImage> {
    let dist = Poisson::new(mean).map_err(|e| SasError::config(format!("Poisson mean {mean}: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows * cols).map(|_| dist.sample(&mut rng)).collect();
    Ok(SasImage::from_parts(rows, cols, data, geometry))
}

/// Powder rings of silver behenate.
#[derive(Debug, Clone)]
pub struct AgBeRings {
    /// Reflection orders to draw.
    pub orders: Vec<usize>,
    /// Gaussian ring width σ in 1/nm.
    pub sigma: f64,
    /// Peak height of the first order; order n is scaled by 1/n².
    pub amplitude: f64,
    pub background: f64,
}

impl Default for AgBeRings {
    fn default() -> Self {
        Self { orders: vec![1, 2, 3], sigma: 0.02, amplitude: 1000.0, background: 10.0 }
    }
}

/// Noise-free AgBe calibration image for the given geometry.
pub fn agbe_rings(rows: usize, cols: usize, geometry: Geometry, rings: &AgBeRings) -> Result<SasImage> {
    if !(rings.sigma > 0.0) {
        return Err(SasError::config("ring width must be positive"));
    }
    let mut image = plateau(rows, cols, rings.background, geometry);
    let q = image.pq_norm()?;
    for (v, q) in image.data_mut().iter_mut().zip(q.iter()) {
        for &order in &rings.orders {
            let qn = 2.0 * PI * order as f64 / AGBE_PERIOD;
            let n2 = (order * order) as f64;
            *v += rings.amplitude / n2 * (-(q - qn).powi(2) / (2.0 * rings.sigma * rings.sigma)).exp();
        }
    }
    image.description = "synthetic AgBe".to_string();
    Ok(image)
}

/// Gaussian spot (a primary beam) on a flat background.
pub fn gaussian_spot(
    rows: usize,
    cols: usize,
    spot: [f64; 2],
    sigma: f64,
    amplitude: f64,
    background: f64,
    geometry: Geometry,
) -> SasImage {
    let mut image = plateau(rows, cols, background, geometry);
    for k in 0..image.len() {
        let (i, j) = image.pixel_of(k);
        let r2 = (i - spot[0]).powi(2) + (j - spot[1]).powi(2);
        image.data_mut()[k] += amplitude * (-r2 / (2.0 * sigma * sigma)).exp();
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisson_counts_have_expected_moments() {
        let im = poisson_plateau(100, 100, 50.0, saxs_geometry([50.0, 50.0]), 7).unwrap();
        let n = im.len() as f64;
        let mean = im.data().iter().sum::<f64>() / n;
        let var = im.data().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!((mean - 50.0).abs() < 0.5);
        assert!((var / 50.0 - 1.0).abs() < 0.1);
        assert!(im.data().iter().all(|v| v.fract() == 0.0));
        assert!(poisson_plateau(2, 2, -1.0, saxs_geometry([1.0, 1.0]), 1).is_err());
    }

    #[test]
    fn first_ring_at_agbe_spacing() {
        let g = saxs_geometry([64.0, 64.0]);
        let im = agbe_rings(128, 128, g, &AgBeRings { orders: vec![1], ..Default::default() }).unwrap();
        let row = 64;
        let (j, _) = (64..128)
            .map(|j| (j, im.data()[im.index(row, j)]))
            .fold((0, f64::MIN), |a, b| if b.1 > a.1 { b } else { a });
        // q ≈ k r px / D for small angles
        let q1 = 2.0 * PI / AGBE_PERIOD;
        let r = q1 / g.wavevector().unwrap() * 0.4 / 172e-6;
        assert!((j as f64 - 64.0 - r).abs() <= 1.0);
    }
}
