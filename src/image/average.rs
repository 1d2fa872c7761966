//! Radial, azimuthal and line averages of detector images.
//!
//! Pixel intensities are corrected for the projection of the flat detector
//! onto the Ewald sphere before binning: `(|r|/D)³` for point collimation,
//! `1/cos(2θ)` for line collimation where only one dimension is projected.

use std::f64::consts::PI;
use std::str::FromStr;

use crate::beam::gauss;
use crate::error::{Result, SasError};
use crate::image::SasImage;
use crate::math::grid::Spacing;
use crate::math::levmar::{levenberg_marquardt, Bounds, LmOptions};
use crate::math::quadrature::simpson;
use crate::series::{PruneMode, PruneOptions, Role, Series};

/// Error estimate of binned averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErrorModel {
    #[default]
    None,
    /// `√S/N` from the bin sum; valid for raw photon counts only.
    Poisson,
    /// Population standard deviation within the bin.
    Std,
}

impl FromStr for ErrorModel {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ErrorModel::None),
            "poisson" => Ok(ErrorModel::Poisson),
            "std" => Ok(ErrorModel::Std),
            other => Err(SasError::config(format!("unknown error model '{other}' (expected poisson, std or none)"))),
        }
    }
}

/// Intensity units of a radial average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IntensityUnits {
    /// Counts per pixel.
    #[default]
    Pixel,
    /// Counts per µsr, independent of the detector distance.
    Sr,
}

impl FromStr for IntensityUnits {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pixel" | "none" => Ok(IntensityUnits::Pixel),
            "sr" => Ok(IntensityUnits::Sr),
            other => Err(SasError::config(format!("unknown intensity units '{other}' (expected pixel or sr)"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RadialOptions {
    /// New plane center; the image's own center when `None`.
    pub center: Option<[f64; 2]>,
    pub number: usize,
    pub kind: Spacing,
    pub error: ErrorModel,
    pub units: IntensityUnits,
}

impl Default for RadialOptions {
    fn default() -> Self {
        Self { center: None, number: 300, kind: Spacing::Log, error: ErrorModel::None, units: IntensityUnits::Pixel }
    }
}

impl RadialOptions {
    pub fn center(mut self, center: [f64; 2]) -> Self {
        self.center = Some(center);
        self
    }

    pub fn number(mut self, number: usize) -> Self {
        self.number = number;
        self
    }

    pub fn kind(mut self, kind: Spacing) -> Self {
        self.kind = kind;
        self
    }

    pub fn error(mut self, error: ErrorModel) -> Self {
        self.error = error;
        self
    }

    pub fn units(mut self, units: IntensityUnits) -> Self {
        self.units = units;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AzimuthOptions {
    pub center: Option<[f64; 2]>,
    /// Open `|q|` interval of the pixels to include; full range when unset.
    pub qrange: (Option<f64>, Option<f64>),
    pub number: usize,
    pub kind: Spacing,
    pub error: ErrorModel,
}

impl Default for AzimuthOptions {
    fn default() -> Self {
        Self { center: None, qrange: (None, None), number: 180, kind: Spacing::Lin, error: ErrorModel::None }
    }
}

impl AzimuthOptions {
    pub fn qrange(mut self, lower: f64, upper: f64) -> Self {
        self.qrange = (Some(lower), Some(upper));
        self
    }

    pub fn number(mut self, number: usize) -> Self {
        self.number = number;
        self
    }

    pub fn error(mut self, error: ErrorModel) -> Self {
        self.error = error;
        self
    }
}

/// Options of [`SasImage::line_average`].
#[derive(Debug, Clone, Default)]
pub struct LineOptions {
    /// Beam center column; found from the primary beam when `None`.
    pub center: Option<f64>,
    /// Bins of the returned trace; every pixel when `None`.
    pub number: Option<usize>,
    /// Column interval used to fit the primary beam; walks down the flanks
    /// of the maximum when `None`.
    pub range: Option<(f64, f64)>,
}

fn binned(x: Vec<f64>, y: Vec<f64>, number: usize, kind: Spacing, error: ErrorModel) -> Result<Series> {
    let points = Series::from_xy(x, y)?;
    let opts = PruneOptions::bins(number).kind(kind).unweighted();
    match error {
        ErrorModel::Poisson => {
            let sums = points.prune(&opts.mode(PruneMode::Sum))?;
            let count = sums.column(2).unwrap_or(&[]);
            let mean = sums.y().iter().zip(count).map(|(s, n)| s / n).collect();
            let err = sums
                .y()
                .iter()
                .zip(count)
                .map(|(s, n)| if *s > 0.0 { s.sqrt() / n } else { 0.0 })
                .collect();
            Series::from_xye(sums.x().to_vec(), mean, err)
        }
        ErrorModel::Std => points.prune(&opts.mode(PruneMode::MeanStd)),
        ErrorModel::None => points.prune(&opts),
    }
}

impl SasImage {
    /// Intensities corrected for the flat detector, `I·(|r|/D)³`.
    fn flat_corrected(&self) -> Result<Vec<f64>> {
        let d = self.geometry.distance()?;
        let l = self.pixel_distance()?;
        Ok(self.data.iter().zip(l.iter()).map(|(v, l)| v * (l / d).powi(3)).collect())
    }

    /// Radial average over unmasked pixels as a function of `|q|` in 1/nm.
    ///
    /// The result carries the image geometry, description, filename and
    /// header attributes. With [`IntensityUnits::Sr`] values and errors are
    /// divided by the pixel solid angle in µsr after the error estimate.
    pub fn radial_average(&mut self, opts: &RadialOptions) -> Result<Series> {
        if let Some(c) = opts.center {
            self.set_center(c);
        }
        self.radial_profile(opts)
    }

    /// Radial average around the current center; `opts.center` is ignored.
    pub(crate) fn radial_profile(&self, opts: &RadialOptions) -> Result<Series> {
        let data = self.flat_corrected()?;
        let q = self.pq_norm()?;
        let (mut x, mut y) = (Vec::new(), Vec::new());
        for k in (0..self.len()).filter(|k| !self.mask[*k]) {
            x.push(q[k]);
            y.push(data[k]);
        }
        let mut result = binned(x, y, opts.number, opts.kind, opts.error)?;
        if opts.units == IntensityUnits::Sr {
            let [px, py] = self.geometry.pixel()?;
            let d = self.geometry.distance()?;
            let solid_angle = px * py / (d * d) * 1e6;
            if let Some(y) = result.y_mut() {
                y.iter_mut().for_each(|v| *v /= solid_angle);
            }
            if let Some(iey) = result.role_index(Role::EY) {
                if let Some(e) = result.column_mut(iey) {
                    e.iter_mut().for_each(|v| *v /= solid_angle);
                }
            }
            result.put("units", "counts/µsr");
        }
        self.annotate(&mut result);
        Ok(result)
    }

    /// Average over the azimuth φ in (−π, π] of pixels with `|q|` in the
    /// open interval `qrange`.
    pub fn azimuth_average(&mut self, opts: &AzimuthOptions) -> Result<Series> {
        if let Some(c) = opts.center {
            self.set_center(c);
        }
        let data = self.flat_corrected()?;
        let rpt = self.pq_rpt()?;
        let qmin = opts.qrange.0.unwrap_or(f64::NEG_INFINITY);
        let qmax = opts.qrange.1.unwrap_or(f64::INFINITY);
        let (mut x, mut y) = (Vec::new(), Vec::new());
        for k in 0..self.len() {
            let [r, phi, _] = rpt[k];
            if !self.mask[k] && r > qmin && r < qmax {
                x.push(phi);
                y.push(data[k]);
            }
        }
        let mut result = binned(x, y, opts.number, opts.kind, opts.error)?;
        self.annotate(&mut result);
        if let (Some(lo), Some(hi)) = opts.qrange {
            result.put("qrange", vec![lo, hi]);
        }
        Ok(result)
    }

    /// Average of a line-collimation image along its rows (frames).
    ///
    /// Columns are detector pixels along the line. Without an explicit center
    /// a Gaussian is fitted to the primary beam of the frame-averaged profile;
    /// its center becomes the column of `q = 0` and the fitted width and peak
    /// are stored as `primarybeam_hwhm` and `primarybeam_peakmax`.
    /// Errors are the spread over frames.
    pub fn line_average(&mut self, opts: &LineOptions) -> Result<Series> {
        let d = self.geometry.distance()?;
        let px = self.geometry.pixel()?[1];
        let lambda = self.geometry.lambda()?;

        let mut cols = Vec::with_capacity(self.cols);
        let mut mean = Vec::with_capacity(self.cols);
        let mut std = Vec::with_capacity(self.cols);
        for j in 0..self.cols {
            let values: Vec<f64> = (0..self.rows).filter_map(|i| self.get(i, j)).collect();
            if values.is_empty() {
                continue;
            }
            let n = values.len() as f64;
            let m = values.iter().sum::<f64>() / n;
            cols.push(j as f64);
            mean.push(m);
            std.push((values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n).sqrt());
        }
        if cols.is_empty() {
            return Err(SasError::config("every pixel of the image is masked"));
        }

        let center = match opts.center {
            Some(c) => c,
            None => self.fit_primary_beam(&cols, &mean, opts.range)?,
        };
        let mut c = self.geometry.center;
        c[1] = center;
        self.set_center(c);

        let k4 = 4.0 * PI / (lambda / 10.0);
        let (mut q, mut y, mut e) = (Vec::new(), Vec::new(), Vec::new());
        for ((j, m), s) in cols.iter().zip(&mean).zip(&std) {
            let angle = ((j - center) * px / d).atan();
            let correction = 1.0 / angle.cos();
            q.push(k4 * (angle / 2.0).sin());
            y.push(m * correction);
            e.push(s * correction);
        }
        let mut result = Series::from_xye(q, y, e)?;
        if let Some(number) = opts.number {
            result = result.prune(&PruneOptions::bins(number).mode(PruneMode::MeanPlus))?;
        }
        if let Some(f) = &self.filename {
            result.put("filename", f.display().to_string());
        }
        result.put("detector_distance", d);
        result.put("description", self.description.as_str());
        result.put("center", center);
        for name in ["primarybeam_hwhm", "primarybeam_peakmax"] {
            if let Some(v) = self.attrs.get(name) {
                result.put(name, v.clone());
            }
        }
        Ok(result)
    }

    /// Gaussian fit of the primary beam in a column profile; returns its center.
    fn fit_primary_beam(&mut self, x: &[f64], y: &[f64], range: Option<(f64, f64)>) -> Result<f64> {
        let imax0 = y.iter().enumerate().fold(0, |m, (i, v)| if *v > y[m] { i } else { m });
        let (lower, upper) = match range {
            Some(r) => r,
            None => {
                let mut hi = imax0;
                while hi + 1 < y.len() && y[hi + 1] < y[hi] {
                    hi += 1;
                }
                let mut lo = imax0;
                while lo > 0 && y[lo - 1] < y[lo] {
                    lo -= 1;
                }
                (x[lo], x[hi])
            }
        };
        let (bx, by): (Vec<f64>, Vec<f64>) =
            x.iter().zip(y).filter(|(v, _)| **v >= lower && **v <= upper).map(|(a, b)| (*a, *b)).unzip();
        if bx.len() < 5 {
            return Err(SasError::numerical(format!(
                "only {} pixels in the primary beam [{lower}, {upper}]",
                bx.len()
            )));
        }
        let ymin = by.iter().copied().fold(f64::INFINITY, f64::min);
        let shifted: Vec<f64> = by.iter().map(|v| v - ymin).collect();
        let norm = simpson(&shifted, &bx);
        if !(norm > 0.0) {
            return Err(SasError::numerical("primary beam has no area above its minimum"));
        }
        let profile: Vec<f64> = shifted.iter().map(|v| v / norm).collect();
        let width = ((upper - lower) / 4.0).max(0.5);
        let start = [1.0, x[imax0], width, 0.0];
        let fit = levenberg_marquardt(gauss, &bx, &profile, None, &start, &Bounds::default(), &LmOptions::default())?;
        let (mean, sigma) = (fit.params[1], fit.params[2].abs());
        let hwhm = sigma * (2.0 * 2f64.ln()).sqrt();
        let peakmax = gauss(&fit.params, mean) * norm + ymin;
        log::info!("primary beam at column {mean:.3}, hwhm {hwhm:.3} pixels");
        self.set_attr("primarybeam_hwhm", hwhm);
        self.set_attr("primarybeam_peakmax", peakmax);
        Ok(mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic::{self, AgBeRings};
    use crate::lattice::AGBE_PERIOD;

    #[test]
    fn poisson_errors_follow_counting_statistics() {
        let c = 100.0;
        let mut im = synthetic::plateau(256, 256, c, synthetic::saxs_geometry([128.0, 128.0]));
        let opts = RadialOptions::default().number(40).kind(Spacing::Lin).error(ErrorModel::Poisson);
        let r = im.radial_average(&opts).unwrap();
        // pixel counts per bin from the same binning
        let q = im.pq_norm().unwrap();
        let counts = Series::from_xy(q.to_vec(), vec![1.0; q.len()])
            .unwrap()
            .prune(&PruneOptions::bins(40).mode(PruneMode::Sum).unweighted())
            .unwrap();
        let n = counts.column(2).unwrap();
        assert_eq!(r.len(), counts.len());
        let ey = r.ey().unwrap();
        for b in 0..r.len() {
            let relative = ey[b] / r.y()[b];
            let expected = 1.0 / (c * n[b]).sqrt();
            assert!((relative / expected - 1.0).abs() < 0.02, "bin {b}: {relative} vs {expected}");
            // the flat-detector correction stays below 1% on this detector
            assert!((r.y()[b] / c - 1.0).abs() < 0.01);
        }
        assert_eq!(r.attr_f64("detector_distance"), Some(0.4));
    }

    #[test]
    fn std_errors_and_solid_angle_units() {
        let mut im = synthetic::poisson_plateau(120, 120, 100.0, synthetic::saxs_geometry([60.0, 60.0]), 3).unwrap();
        let std = im.radial_average(&RadialOptions::default().number(20).kind(Spacing::Lin).error(ErrorModel::Std)).unwrap();
        let ey = std.ey().unwrap();
        // Poisson spread √100 in the outer, well populated bins
        assert!((ey[15] - 10.0).abs() < 1.5);
        assert_eq!(std.role_index(Role::EY), Some(3));

        let mut flat = synthetic::plateau(60, 60, 1.0, synthetic::saxs_geometry([30.0, 30.0]));
        let counts = flat.radial_average(&RadialOptions::default().number(10)).unwrap();
        let sr = flat.radial_average(&RadialOptions::default().number(10).units(IntensityUnits::Sr)).unwrap();
        let solid_angle = 172e-6 * 172e-6 / 0.16 * 1e6;
        for (a, b) in counts.y().iter().zip(sr.y()) {
            assert!((a / solid_angle - b).abs() < 1e-9 * b);
        }
        assert!("gauss".parse::<ErrorModel>().is_err());
    }

    fn first_peak_width(r: &Series) -> f64 {
        let q1 = 2.0 * PI / AGBE_PERIOD;
        let pts: Vec<(f64, f64)> =
            r.x().iter().zip(r.y()).filter(|(q, _)| (**q - q1).abs() < 0.15).map(|(q, v)| (*q, *v)).collect();
        let bg = pts.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let w: f64 = pts.iter().map(|p| p.1 - bg).sum();
        let m = pts.iter().map(|p| p.0 * (p.1 - bg)).sum::<f64>() / w;
        (pts.iter().map(|p| (p.0 - m).powi(2) * (p.1 - bg)).sum::<f64>() / w).sqrt()
    }

    #[test]
    fn wrong_center_broadens_agbe_peak() {
        let rings = AgBeRings::default();
        let opts = RadialOptions::default().number(500).kind(Spacing::Lin);
        let mut centred = synthetic::agbe_rings(512, 512, synthetic::saxs_geometry([256.0, 256.0]), &rings).unwrap();
        let sharp = first_peak_width(&centred.radial_average(&opts).unwrap());
        assert!((sharp - rings.sigma).abs() < 0.003, "width {sharp}");

        let mut shifted = synthetic::agbe_rings(512, 512, synthetic::saxs_geometry([258.0, 257.0]), &rings).unwrap();
        let broad = first_peak_width(&shifted.radial_average(&opts.clone().center([256.0, 256.0])).unwrap());
        assert!(broad > 1.2 * sharp, "{broad} vs {sharp}");
        assert_eq!(shifted.center(), [256.0, 256.0]);
    }

    #[test]
    fn azimuth_separates_detector_halves() {
        let mut im = synthetic::plateau(101, 101, 1.0, synthetic::saxs_geometry([50.0, 50.0]));
        for k in 0..im.len() {
            if im.pixel_of(k).0 > 50.0 {
                im.data_mut()[k] = 10.0;
            }
        }
        let az = im.azimuth_average(&AzimuthOptions::default().qrange(0.2, 0.8).number(36)).unwrap();
        assert!(!az.is_empty());
        for (phi, v) in az.x().iter().zip(az.y()) {
            // rows below the center map onto qx < 0
            if phi.abs() > PI / 2.0 + 0.2 {
                assert!((v - 10.0).abs() < 0.1, "phi {phi}: {v}");
            } else if phi.abs() < PI / 2.0 - 0.2 {
                assert!((v - 1.0).abs() < 0.01, "phi {phi}: {v}");
            }
        }
        assert_eq!(az.attr("qrange").and_then(|a| a.as_list()), Some(vec![0.2, 0.8]));
    }

    #[test]
    fn line_average_centres_primary_beam() {
        let (rows, cols) = (4, 201);
        let data: Vec<f64> = (0..rows * cols)
            .map(|k| {
                let (i, j) = (k / cols, (k % cols) as f64);
                let frame = 1.0 + 0.1 * i as f64;
                frame * (500.0 * (-0.5 * ((j - 97.3) / 3.0).powi(2)).exp() + 5.0)
            })
            .collect();
        let mut im = SasImage::from_array(rows, cols, data).unwrap();
        im.set_detector_distance(0.3).unwrap();
        im.set_pixel_size([50e-6, 50e-6]).unwrap();
        im.set_wavelength(1.54).unwrap();
        let line = im.line_average(&LineOptions::default()).unwrap();
        assert!((im.center()[1] - 97.3).abs() < 0.05, "center {}", im.center()[1]);
        let hwhm = im.attr("primarybeam_hwhm").and_then(|a| a.as_f64()).unwrap();
        assert!((hwhm - 3.0 * 1.1774).abs() < 0.05);
        assert_eq!(line.len(), cols);
        // q changes sign at the beam and errors are the spread over frames
        assert!(line.x()[97] < 0.0 && line.x()[98] > 0.0);
        let frames: Vec<f64> = (0..rows).map(|i| (1.0 + 0.1 * i as f64) * 5.0).collect();
        let m = frames.iter().sum::<f64>() / 4.0;
        let s = (frames.iter().map(|v| (v - m).powi(2)).sum::<f64>() / 4.0).sqrt();
        assert!((line.ey().unwrap()[0] - s).abs() < 1e-3);

        let pruned = im.line_average(&LineOptions { center: Some(100.0), number: Some(20), ..Default::default() }).unwrap();
        assert!(pruned.len() <= 20);
        assert_eq!(pruned.attr_f64("center"), Some(100.0));
    }
}
