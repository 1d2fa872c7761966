//! Beam center and detector distance calibration.

use crate::error::{Result, SasError};
use crate::image::{RadialOptions, SasImage};
use crate::lattice::{radial_structure_factor, Lattice, LatticeOptions};
use crate::math::faddeeva::voigt;
use crate::math::levmar::{levenberg_marquardt, Bounds, LmOptions};
use crate::reference::AgBeReference;

/// AgBe reflection orders tried by the distance recalibration.
const AGBE_ORDERS: usize = 10;
/// Half width of the q window fitted around each reflection, 1/nm.
const PEAK_WINDOW: f64 = 0.3;
const MAX_CENTER_ITERATIONS: usize = 20;

#[derive(Debug, Clone)]
pub struct RecalibrateOptions {
    pub center: Option<[f64; 2]>,
    /// Bins of the radial average.
    pub number: usize,
    /// Start value of the peak center as a multiple of the reference
    /// position. Positive values prefer the observed maximum when it stands
    /// out from the window; negative values always use `|fcenter|`.
    pub fcenter: f64,
    /// Start value of the peak width in 1/nm.
    pub fwhm: f64,
}

impl Default for RecalibrateOptions {
    fn default() -> Self {
        Self { center: None, number: 500, fcenter: 1.0, fwhm: 0.1 }
    }
}

/// Outcome of [`SasImage::recalibrate_det_distance`].
#[derive(Debug, Clone)]
pub struct DistanceCalibration {
    /// Ratio fitted/reference position of every peak that could be fitted.
    pub corrections: Vec<f64>,
    /// Mean of `corrections`; the detector distance was multiplied by it.
    pub factor: f64,
    pub relative_std: f64,
    pub distance: f64,
}

/// Voigt peak with `lg = 1` on a constant background.
/// Parameters: center, fwhm, asym, amplitude, background.
fn agbe_peak(p: &[f64], q: f64) -> f64 {
    voigt(q, p[0], p[1], 1.0, p[2], p[3]) + p[4]
}

impl SasImage {
    /// Thresholded center of intensity within inclusive row and column bounds.
    fn intensity_centroid(&self, rows: (usize, usize), cols: (usize, usize)) -> Result<[f64; 2]> {
        let (lo, hi) = (rows.0..=rows.1)
            .flat_map(|i| (cols.0..=cols.1).filter_map(move |j| self.get(i, j)))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let level = (lo + hi) / 2.0;
        let (mut sum, mut si, mut sj) = (0.0, 0.0, 0.0);
        for i in rows.0..=rows.1 {
            for j in cols.0..=cols.1 {
                if let Some(v) = self.get(i, j).filter(|v| *v >= level) {
                    sum += v;
                    si += v * i as f64;
                    sj += v * j as f64;
                }
            }
        }
        if !(sum > 0.0) {
            return Err(SasError::numerical("no intensity above the threshold to locate the center"));
        }
        Ok([si / sum, sj / sum])
    }

    /// Set the plane center to the center of intensity around `center`.
    ///
    /// Only pixels above `(max + min)/2` of the `±size` box contribute. The
    /// box follows the estimate until it moves less than 0.01 pixel. Without
    /// a first guess the whole image gives one.
    pub fn find_center_of_intensity(&mut self, center: Option<[f64; 2]>, size: usize) -> Result<[f64; 2]> {
        let mut c = match center {
            Some(c) => c,
            None => self.intensity_centroid((0, self.rows - 1), (0, self.cols - 1))?,
        };
        let clip = |v: f64, n: usize| (v.round().max(0.0) as usize).min(n - 1);
        for _ in 0..MAX_CENTER_ITERATIONS {
            let (bi, bj) = (clip(c[0], self.rows), clip(c[1], self.cols));
            let rows = (bi.saturating_sub(size), (bi + size).min(self.rows - 1));
            let cols = (bj.saturating_sub(size), (bj + size).min(self.cols - 1));
            let next = self.intensity_centroid(rows, cols)?;
            let shift = (next[0] - c[0]).hypot(next[1] - c[1]);
            c = next;
            if shift < 0.01 {
                break;
            }
        }
        log::info!("center of intensity at [{:.3}, {:.3}]", c[0], c[1]);
        self.set_center(c);
        Ok(c)
    }

    /// Rescale the detector distance so that the AgBe reflections in the
    /// radial average sit at their reference positions.
    ///
    /// Each reflection within the data range is fitted by a Voigt peak on a
    /// background; the mean ratio of fitted to reference position multiplies
    /// the detector distance. Repeating the calibration gives a factor close
    /// to 1.
    pub fn recalibrate_det_distance(&mut self, opts: &RecalibrateOptions) -> Result<DistanceCalibration> {
        let mut radial_opts = RadialOptions::default().number(opts.number);
        radial_opts.center = opts.center;
        let iq = self.radial_average(&radial_opts)?;
        let (qmin, qmax) = iq
            .x()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

        let mut corrections = Vec::new();
        for order in 1..=AGBE_ORDERS {
            let agp = AgBeReference::peak_position(order);
            if !(qmax > agp + PEAK_WINDOW && qmin < agp - PEAK_WINDOW) {
                continue;
            }
            let window = iq.x_range(agp - PEAK_WINDOW, agp + PEAK_WINDOW);
            if window.len() < 5 {
                continue;
            }
            let (x, y) = (window.x(), window.y());
            let n = y.len() as f64;
            let mean = y.iter().sum::<f64>() / n;
            let std = (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            let (imax, ymax) = y.iter().enumerate().fold((0, f64::MIN), |a, (i, v)| if *v > a.1 { (i, *v) } else { a });
            let ymin = y.iter().copied().fold(f64::INFINITY, f64::min);
            let start_center = if ymax > mean + 2.0 * std && opts.fcenter > 0.0 { x[imax] } else { agp * opts.fcenter.abs() };
            let start = [start_center, opts.fwhm.abs(), 1.0, ymax / 4.0, (ymin / 2.0).max(0.0)];
            let bounds = Bounds {
                lower: vec![None, Some(0.001), None, Some(0.0), Some(0.0)],
                upper: vec![None, Some(agp), None, None, None],
            };
            let fit = match levenberg_marquardt(agbe_peak, x, y, None, &start, &bounds, &LmOptions::default()) {
                Ok(fit) => fit,
                Err(e) => {
                    log::debug!("AgBe order {order} not fitted: {e}");
                    continue;
                }
            };
            let center = fit.params[0];
            if !(fit.params[3] > 0.0) || (center - agp).abs() > PEAK_WINDOW {
                log::debug!("AgBe order {order} rejected: center {center:.4}, amplitude {:.3}", fit.params[3]);
                continue;
            }
            log::debug!("AgBe order {order}: center {center:.4} (reference {agp:.4})");
            corrections.push(center / agp);
        }
        if corrections.is_empty() {
            return Err(SasError::numerical("no AgBe reflection could be fitted"));
        }
        let n = corrections.len() as f64;
        let factor = corrections.iter().sum::<f64>() / n;
        let relative_std = (corrections.iter().map(|c| (c - factor).powi(2)).sum::<f64>() / n).sqrt() / factor;
        let distance = self.geometry.distance()? * factor;
        self.set_detector_distance(distance)?;
        self.set_attr("distance_correction", corrections.clone());
        log::info!("correction factor {factor:.4} to new distance {distance:.4} m (relative error {relative_std:.4})");
        Ok(DistanceCalibration { corrections, factor, relative_std, distance })
    }

    /// Powder pattern of `lattice` for the current geometry, same shape and
    /// mask as the image.
    pub fn simulate_lattice_pattern(&self, lattice: &Lattice, opts: &LatticeOptions) -> Result<SasImage> {
        let q = self.pq_norm()?;
        let values = radial_structure_factor(&q, lattice, opts)?;
        let mut sim = self.rebuild(self.rows, self.cols, values, self.mask.clone());
        sim.description = format!("{} lattice", lattice.kind().name());
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic::{self, AgBeRings};

    #[test]
    fn center_of_intensity_finds_ring_center() {
        let truth = [258.0, 257.0];
        let mut im = synthetic::agbe_rings(512, 512, synthetic::saxs_geometry(truth), &AgBeRings::default()).unwrap();
        im.set_center([256.0, 256.0]);
        let c = im.find_center_of_intensity(None, 100).unwrap();
        assert!((c[0] - truth[0]).abs() < 0.3 && (c[1] - truth[1]).abs() < 0.3, "{c:?}");
        assert_eq!(im.center(), c);
    }

    #[test]
    fn spot_center_from_a_poor_guess() {
        let g = synthetic::saxs_geometry([32.0, 32.0]);
        let mut im = synthetic::gaussian_spot(64, 64, [40.3, 21.7], 2.0, 100.0, 1.0, g);
        let c = im.find_center_of_intensity(Some([35.0, 25.0]), 10).unwrap();
        assert!((c[0] - 40.3).abs() < 0.2 && (c[1] - 21.7).abs() < 0.2, "{c:?}");
    }

    #[test]
    fn recalibration_restores_distance() {
        let rings = AgBeRings { orders: (1..=10).collect(), sigma: 0.05, ..Default::default() };
        let mut im = synthetic::agbe_rings(512, 512, synthetic::saxs_geometry([256.5, 256.5]), &rings).unwrap();
        im.set_detector_distance(0.38).unwrap();
        let cal = im.recalibrate_det_distance(&RecalibrateOptions::default()).unwrap();
        assert!(cal.corrections.len() >= 3);
        assert!((cal.distance - 0.4).abs() < 0.004, "distance {}", cal.distance);
        assert_eq!(im.geometry().detector_distance, Some(cal.distance));
        assert!(cal.relative_std < 0.01);
    }

    #[test]
    fn flat_image_cannot_be_calibrated() {
        let mut im = synthetic::plateau(64, 64, 5.0, synthetic::saxs_geometry([32.0, 32.0]));
        assert!(im.recalibrate_det_distance(&RecalibrateOptions::default()).is_err());
    }

    #[test]
    fn simulated_agbe_pattern_peaks_on_first_ring() {
        let im = synthetic::plateau(128, 128, 1.0, synthetic::saxs_geometry([64.0, 64.0]));
        let sim = im.simulate_lattice_pattern(&Lattice::agbe(), &LatticeOptions::default().domainsize(200.0)).unwrap();
        let q = im.pq_norm().unwrap();
        let q1 = AgBeReference::peak_position(1);
        let (kmax, _) = sim
            .data()
            .iter()
            .enumerate()
            .filter(|(k, _)| q[*k] < 1.6)
            .fold((0, f64::MIN), |a, (k, v)| if *v > a.1 { (k, *v) } else { a });
        assert!((q[kmax] - q1).abs() < 0.03);
        assert_eq!(sim.shape(), im.shape());
    }
}
