//! Size reduction, smoothing and polar resampling.

use std::f64::consts::PI;

use crate::error::{Result, SasError};
use crate::image::SasImage;

/// A plain 2-D array without geometry, e.g. a polar transform for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub rows: usize,
    pub cols: usize,
    /// Row-major values.
    pub data: Vec<f64>,
    /// Value range along the rows (first to last row).
    pub row_range: (f64, f64),
    /// Value range along the columns.
    pub col_range: (f64, f64),
}

impl Plane {
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }
}

/// Normalised Gaussian kernel truncated at 4σ.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let half = (4.0 * sigma).round().max(1.0) as i64;
    let k: Vec<f64> = (-half..=half).map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp()).collect();
    let sum: f64 = k.iter().sum();
    k.into_iter().map(|v| v / sum).collect()
}

/// Convolve along rows (`along_rows`) or columns of a row-major array,
/// dropping kernel taps that fall outside.
fn convolve_axis(data: &[f64], rows: usize, cols: usize, kernel: &[f64], along_rows: bool) -> Vec<f64> {
    let half = (kernel.len() / 2) as i64;
    let mut out = vec![0.0; data.len()];
    for i in 0..rows {
        for j in 0..cols {
            let mut acc = 0.0;
            for (t, w) in kernel.iter().enumerate() {
                let o = t as i64 - half;
                let (ii, jj) = if along_rows { (i as i64, j as i64 + o) } else { (i as i64 + o, j as i64) };
                if ii >= 0 && jj >= 0 && (ii as usize) < rows && (jj as usize) < cols {
                    acc += w * data[ii as usize * cols + jj as usize];
                }
            }
            out[i * cols + j] = acc;
        }
    }
    out
}

impl SasImage {
    /// Reduce the image by averaging `bin × bin` blocks of unmasked pixels.
    ///
    /// With `border` the image is cropped first: to a `±border` box around
    /// `center` if given, otherwise by `border` pixels on every side. A block
    /// without unmasked pixels stays masked. Pixel size grows by `bin` and the
    /// plane center moves with the crop and the binning.
    pub fn reduce_size(&self, bin: usize, center: Option<[usize; 2]>, border: Option<usize>) -> Result<SasImage> {
        if bin == 0 {
            return Err(SasError::config("bin size must be at least 1"));
        }
        let (r0, r1, c0, c1) = match (border, center) {
            (Some(b), Some([ci, cj])) => (ci.saturating_sub(b), ci + b, cj.saturating_sub(b), cj + b),
            (Some(b), None) => (b, self.rows.saturating_sub(b), b, self.cols.saturating_sub(b)),
            (None, _) => (0, self.rows, 0, self.cols),
        };
        let (r1, c1) = (r1.min(self.rows), c1.min(self.cols));
        let (rows, cols) = (r1.saturating_sub(r0) / bin, c1.saturating_sub(c0) / bin);
        if rows == 0 || cols == 0 {
            return Err(SasError::config(format!(
                "cropped region {}x{} is smaller than one {bin}x{bin} block",
                r1.saturating_sub(r0),
                c1.saturating_sub(c0)
            )));
        }
        let mut data = Vec::with_capacity(rows * cols);
        let mut mask = Vec::with_capacity(rows * cols);
        for bi in 0..rows {
            for bj in 0..cols {
                let (mut sum, mut n, mut raw) = (0.0, 0usize, 0.0);
                for i in r0 + bi * bin..r0 + (bi + 1) * bin {
                    for j in c0 + bj * bin..c0 + (bj + 1) * bin {
                        let k = self.index(i, j);
                        raw += self.data[k];
                        if !self.mask[k] {
                            sum += self.data[k];
                            n += 1;
                        }
                    }
                }
                if n > 0 {
                    data.push(sum / n as f64);
                    mask.push(false);
                } else {
                    data.push(raw / (bin * bin) as f64);
                    mask.push(true);
                }
            }
        }
        let mut small = self.rebuild(rows, cols, data, mask);
        if let Some([px, py]) = self.geometry.pixel_size {
            small.set_pixel_size([px * bin as f64, py * bin as f64])?;
        }
        let shift = (bin as f64 - 1.0) / 2.0;
        let [ci, cj] = self.geometry.center;
        small.set_center([(ci - r0 as f64 - shift) / bin as f64, (cj - c0 as f64 - shift) / bin as f64]);
        Ok(small)
    }

    /// Smooth unmasked pixels with a Gaussian of width `sigma` pixels.
    ///
    /// Masked pixels neither contribute nor change; near masks and edges the
    /// kernel is renormalised over the pixels it covers.
    pub fn gaussian_filter(&mut self, sigma: f64) -> Result<()> {
        if !(sigma > 0.0) {
            return Err(SasError::config(format!("filter width must be positive, got {sigma}")));
        }
        let kernel = gaussian_kernel(sigma);
        let weight: Vec<f64> = self.mask.iter().map(|m| if *m { 0.0 } else { 1.0 }).collect();
        let weighted: Vec<f64> = self.data.iter().zip(&weight).map(|(v, w)| v * w).collect();
        let (rows, cols) = (self.rows, self.cols);
        let num = convolve_axis(&convolve_axis(&weighted, rows, cols, &kernel, true), rows, cols, &kernel, false);
        let den = convolve_axis(&convolve_axis(&weight, rows, cols, &kernel, true), rows, cols, &kernel, false);
        for k in 0..self.data.len() {
            if !self.mask[k] && den[k] > 0.0 {
                self.data[k] = num[k] / den[k];
            }
        }
        Ok(())
    }

    /// Polar transform around the plane center.
    ///
    /// Rows run over the azimuth, columns over the radius. In standard
    /// geometry the image is resampled bilinearly in pixel units at radius
    /// `(offset + column)/scale_r`; masked and outside pixels read 0. A tilted
    /// detector is binned on a regular (φ, |q|) grid instead and `scale_r`
    /// and `offset` are not used.
    pub fn get_polar(&mut self, center: Option<[f64; 2]>, scale_r: f64, offset: f64) -> Result<Plane> {
        if let Some(c) = center {
            self.set_center(c);
        }
        if !(scale_r > 0.0) {
            return Err(SasError::config(format!("radial scale must be positive, got {scale_r}")));
        }
        let (rows, cols) = (self.rows, self.cols);
        if self.geometry.is_standard() {
            let [c0, c1] = self.geometry.center;
            let offset = offset.abs();
            let value = |i: f64, j: f64| -> f64 {
                let (i0, j0) = (i.floor(), j.floor());
                if i0 < 0.0 || j0 < 0.0 || i0 as usize + 1 >= rows || j0 as usize + 1 >= cols {
                    return 0.0;
                }
                let (fi, fj) = (i - i0, j - j0);
                let (a, b) = (i0 as usize, j0 as usize);
                let at = |p: usize, q: usize| {
                    let k = self.index(p, q);
                    if self.mask[k] { 0.0 } else { self.data[k] }
                };
                at(a, b) * (1.0 - fi) * (1.0 - fj)
                    + at(a + 1, b) * fi * (1.0 - fj)
                    + at(a, b + 1) * (1.0 - fi) * fj
                    + at(a + 1, b + 1) * fi * fj
            };
            let mut data = Vec::with_capacity(rows * cols);
            for p in 0..rows {
                let phi = -PI + 2.0 * PI * p as f64 / rows as f64;
                for r in 0..cols {
                    let radius = (offset + r as f64) / scale_r;
                    data.push(value(c0 + radius * phi.cos(), c1 + radius * phi.sin()));
                }
            }
            let rmax = (offset + cols as f64 - 1.0) / scale_r;
            return Ok(Plane { rows, cols, data, row_range: (-PI, PI), col_range: (offset / scale_r, rmax) });
        }

        let rpt = self.pq_rpt()?;
        let bounds = |axis: usize| {
            rpt.iter()
                .map(|v| v[axis])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
        };
        let ((qmin, qmax), (pmin, pmax)) = (bounds(0), bounds(1));
        let mut sum = vec![0.0; rows * cols];
        let mut count = vec![0usize; rows * cols];
        let cell = |v: f64, lo: f64, hi: f64, n: usize| {
            if hi > lo { (((v - lo) / (hi - lo) * n as f64) as usize).min(n - 1) } else { 0 }
        };
        for (k, v) in rpt.iter().enumerate().filter(|(k, _)| !self.mask[*k]) {
            let idx = cell(v[1], pmin, pmax, rows) * cols + cell(v[0], qmin, qmax, cols);
            sum[idx] += self.data[k];
            count[idx] += 1;
        }
        let data = sum.iter().zip(&count).map(|(s, n)| if *n > 0 { s / *n as f64 } else { 0.0 }).collect();
        Ok(Plane { rows, cols, data, row_range: (pmin, pmax), col_range: (qmin, qmax) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic;

    #[test]
    fn binning_averages_unmasked_pixels() {
        let mut im = synthetic::plateau(8, 8, 2.0, synthetic::saxs_geometry([4.0, 4.0]));
        im.data_mut()[0] = 100.0;
        im.mask_mut()[0] = true;
        im.mask_region(6, 8, 6, 8);
        let small = im.reduce_size(2, None, None).unwrap();
        assert_eq!(small.shape(), (4, 4));
        assert_eq!(small.data()[0], 2.0);
        assert!(small.mask()[15]);
        assert_eq!(small.masked_count(), 1);
        assert_eq!(small.geometry().pixel_size, Some([344e-6, 344e-6]));
        assert_eq!(small.center(), [1.75, 1.75]);
    }

    #[test]
    fn crop_before_binning() {
        let im = synthetic::plateau(10, 10, 1.0, synthetic::saxs_geometry([5.0, 5.0]));
        let border = im.reduce_size(2, None, Some(1)).unwrap();
        assert_eq!(border.shape(), (4, 4));
        assert_eq!(border.center(), [1.75, 1.75]);
        let boxed = im.reduce_size(1, Some([5, 5]), Some(2)).unwrap();
        assert_eq!(boxed.shape(), (4, 4));
        assert_eq!(boxed.center(), [2.0, 2.0]);
        assert!(im.reduce_size(0, None, None).is_err());
        assert!(im.reduce_size(20, None, None).is_err());
    }

    #[test]
    fn gaussian_filter_keeps_plateau_and_mask() {
        let mut im = synthetic::plateau(30, 30, 4.0, synthetic::saxs_geometry([15.0, 15.0]));
        im.mask_circle([15.0, 15.0], 4.0, false);
        let center = im.index(15, 15);
        im.data_mut()[center] = 1000.0;
        im.gaussian_filter(2.0).unwrap();
        assert!(im.unmasked().all(|v| (v - 4.0).abs() < 1e-12));
        assert_eq!(im.data()[im.index(15, 15)], 1000.0);

        let mut spike = synthetic::plateau(31, 31, 0.0, synthetic::saxs_geometry([15.0, 15.0]));
        let k = spike.index(15, 15);
        spike.data_mut()[k] = 1.0;
        spike.gaussian_filter(1.5).unwrap();
        let total: f64 = spike.data().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(spike.data()[k] < 0.1 && spike.data()[spike.index(15, 16)] > 0.0);
    }

    #[test]
    fn polar_transform_straightens_a_ring() {
        let (n, radius) = (101, 30.0);
        let g = synthetic::saxs_geometry([50.0, 50.0]);
        let mut im = synthetic::plateau(n, n, 0.0, g);
        for k in 0..im.len() {
            let (i, j) = im.pixel_of(k);
            let r = (i - 50.0).hypot(j - 50.0);
            im.data_mut()[k] = (-0.5 * ((r - radius) / 1.5).powi(2)).exp();
        }
        let polar = im.get_polar(None, 2.0, 0.0).unwrap();
        for p in (0..polar.rows).step_by(10) {
            let best = (0..polar.cols).max_by(|a, b| polar.get(p, *a).total_cmp(&polar.get(p, *b))).unwrap();
            assert!((best as f64 - 2.0 * radius).abs() <= 1.0, "row {p}: column {best}");
        }
        assert_eq!(polar.col_range.0, 0.0);
    }

    #[test]
    fn tilted_detector_bins_in_q() {
        let mut im = synthetic::plateau(40, 40, 3.0, synthetic::saxs_geometry([20.0, 20.0]));
        im.set_orientation(10.0, 0.0, 0.0);
        let polar = im.get_polar(None, 1.0, 0.0).unwrap();
        assert!(polar.data.iter().all(|v| *v == 0.0 || (v - 3.0).abs() < 1e-12));
        assert!(polar.col_range.1 > polar.col_range.0);
    }
}
