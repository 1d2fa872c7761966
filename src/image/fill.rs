//! Filling masked pixels, and the image as a table of q vectors.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SasError};
use crate::image::{RadialOptions, SasImage};
use crate::series::{Role, Series};

/// Treatment of masked pixels in [`SasImage::as_data_array`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskedFill {
    /// Set masked pixels to this value.
    Value(f64),
    /// Drop masked pixels from the table.
    Remove,
    /// Linear interpolation between the nearest unmasked pixels of the same
    /// row and column.
    Linear,
    /// Same as `Linear`.
    Cubic,
    /// Value of the nearest unmasked pixel.
    Nearest,
    /// The image's own radial average at the pixel's `|q|`.
    Radial,
}

impl Default for MaskedFill {
    fn default() -> Self {
        MaskedFill::Value(0.0)
    }
}

impl FromStr for MaskedFill {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "remove" => Ok(MaskedFill::Remove),
            "linear" => Ok(MaskedFill::Linear),
            "cubic" => Ok(MaskedFill::Cubic),
            "nearest" => Ok(MaskedFill::Nearest),
            "radial" => Ok(MaskedFill::Radial),
            other => other.parse::<f64>().map(MaskedFill::Value).map_err(|_| {
                SasError::config(format!(
                    "unknown masked treatment '{other}' (expected a number, none, linear, cubic, nearest or radial)"
                ))
            }),
        }
    }
}

impl fmt::Display for MaskedFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskedFill::Value(v) => write!(f, "{v}"),
            MaskedFill::Remove => f.write_str("none"),
            MaskedFill::Linear => f.write_str("linear"),
            MaskedFill::Cubic => f.write_str("cubic"),
            MaskedFill::Nearest => f.write_str("nearest"),
            MaskedFill::Radial => f.write_str("radial"),
        }
    }
}

/// Source of the values written into masked pixels by
/// [`SasImage::interpolate_masked_radial`].
pub enum RadialFill<'a> {
    /// Function of `|q|` in 1/nm.
    Function(&'a dyn Fn(f64) -> f64),
    /// Radial curve, linearly interpolated at `|q|`.
    Curve(&'a Series),
    /// The image's own radial average.
    SelfAverage,
}

impl fmt::Debug for RadialFill<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadialFill::Function(_) => f.write_str("Function"),
            RadialFill::Curve(s) => write!(f, "Curve({} points)", s.len()),
            RadialFill::SelfAverage => f.write_str("SelfAverage"),
        }
    }
}

impl SasImage {
    fn radial_values(&self, source: &RadialFill<'_>, at: &[usize]) -> Result<Vec<f64>> {
        let q = self.pq_norm()?;
        let qs: Vec<f64> = at.iter().map(|k| q[*k]).collect();
        Ok(match source {
            RadialFill::Function(f) => qs.iter().map(|v| f(*v)).collect(),
            RadialFill::Curve(curve) => curve.interp(&qs),
            RadialFill::SelfAverage => self.radial_profile(&RadialOptions::default())?.interp(&qs),
        })
    }

    fn masked_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|k| self.mask[*k]).collect()
    }

    /// Copy of the image with masked pixels replaced by radial values. The
    /// copy's mask is reset to the read threshold.
    pub fn interpolate_masked_radial(&self, source: RadialFill<'_>) -> Result<SasImage> {
        let masked = self.masked_indices();
        let values = self.radial_values(&source, &masked)?;
        let mut image = self.clone();
        for (k, v) in masked.into_iter().zip(values) {
            image.data[k] = v;
        }
        image.mask_reset();
        Ok(image)
    }

    /// Values of unmasked pixels spread by breadth-first search; every pixel
    /// gets the value of the first unmasked pixel reached from it.
    fn nearest_filled(&self) -> Vec<f64> {
        let mut out = self.data.clone();
        let mut seen = self.mask.iter().map(|m| !m).collect::<Vec<bool>>();
        let mut queue: VecDeque<usize> = (0..self.len()).filter(|k| seen[*k]).collect();
        while let Some(k) = queue.pop_front() {
            let (i, j) = (k / self.cols, k % self.cols);
            let neighbours = [
                (i > 0).then(|| k - self.cols),
                (i + 1 < self.rows).then(|| k + self.cols),
                (j > 0).then(|| k - 1),
                (j + 1 < self.cols).then(|| k + 1),
            ];
            for n in neighbours.into_iter().flatten() {
                if !seen[n] {
                    seen[n] = true;
                    out[n] = out[k];
                    queue.push_back(n);
                }
            }
        }
        out
    }

    /// Linear interpolation between the closest unmasked pixels of the same
    /// row and of the same column, averaged; nearest value where neither
    /// direction brackets the pixel.
    fn linear_filled(&self) -> Vec<f64> {
        let nearest = self.nearest_filled();
        let mut out = self.data.clone();
        let (rows, cols) = (self.rows, self.cols);
        let between = |a: Option<(usize, f64)>, b: Option<(usize, f64)>, at: usize| match (a, b) {
            (Some((pa, va)), Some((pb, vb))) => Some(va + (vb - va) * (at - pa) as f64 / (pb - pa) as f64),
            _ => None,
        };
        for k in self.masked_indices() {
            let (i, j) = (k / cols, k % cols);
            let left = (0..j).rev().find(|c| !self.mask[i * cols + c]).map(|c| (c, self.data[i * cols + c]));
            let right = (j + 1..cols).find(|c| !self.mask[i * cols + c]).map(|c| (c, self.data[i * cols + c]));
            let up = (0..i).rev().find(|r| !self.mask[r * cols + j]).map(|r| (r, self.data[r * cols + j]));
            let down = (i + 1..rows).find(|r| !self.mask[r * cols + j]).map(|r| (r, self.data[r * cols + j]));
            let estimates: Vec<f64> = [between(left, right, j), between(up, down, i)].into_iter().flatten().collect();
            out[k] = if estimates.is_empty() {
                nearest[k]
            } else {
                estimates.iter().sum::<f64>() / estimates.len() as f64
            };
        }
        out
    }

    /// The image as a table `[qx, qy, qz, I]` with roles X, Z, W and Y.
    ///
    /// Attributes carry the image header, `qx`/`qy` along the pixel axes
    /// through the center (see [`SasImage::pq_axes`]) and `sasImageshape`.
    pub fn as_data_array(&self, masked: MaskedFill) -> Result<Series> {
        let q = self.pq()?;
        let any_masked = self.mask.iter().any(|m| *m);
        let values = match masked {
            MaskedFill::Value(v) => {
                let mut d = self.data.clone();
                d.iter_mut().zip(&self.mask).filter(|(_, m)| **m).for_each(|(x, _)| *x = v);
                d
            }
            MaskedFill::Remove => self.data.clone(),
            _ if !any_masked => self.data.clone(),
            MaskedFill::Linear | MaskedFill::Cubic => self.linear_filled(),
            MaskedFill::Nearest => self.nearest_filled(),
            MaskedFill::Radial => {
                let idx = self.masked_indices();
                let fill = self.radial_values(&RadialFill::SelfAverage, &idx)?;
                let mut d = self.data.clone();
                for (k, v) in idx.into_iter().zip(fill) {
                    d[k] = v;
                }
                d
            }
        };
        let keep: Vec<usize> = match masked {
            MaskedFill::Remove => (0..self.len()).filter(|k| !self.mask[*k]).collect(),
            _ => (0..self.len()).collect(),
        };
        let mut columns = vec![Vec::with_capacity(keep.len()); 4];
        for &k in &keep {
            columns[0].push(q[k].x);
            columns[1].push(q[k].y);
            columns[2].push(q[k].z);
            columns[3].push(values[k]);
        }
        let mut out = Series::new(columns)?;
        out.set_role(Role::EY, None)?;
        out.set_role(Role::Y, Some(3))?;
        out.set_role(Role::Z, Some(1))?;
        out.set_role(Role::W, Some(2))?;
        self.annotate(&mut out);
        let (qx, qy) = self.pq_axes()?;
        out.put("qx", qx);
        out.put("qy", qy);
        out.put("sasImageshape", vec![self.rows as f64, self.cols as f64]);
        out.columnname = Some("qx; qy; qz; I".to_string());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic;

    #[test]
    fn radial_fill_restores_plateau_inside_mask() {
        let mut im = synthetic::plateau(400, 400, 50.0, synthetic::saxs_geometry([200.0, 200.0]));
        im.mask_circle([200.0, 200.0], 120.0, false);
        let masked: Vec<usize> = (0..im.len()).filter(|k| im.mask()[*k]).collect();
        assert!(masked.len() > 44_000);
        let table = im.as_data_array(MaskedFill::Radial).unwrap();
        assert_eq!(table.len(), im.len());
        let y = table.y();
        for k in masked {
            assert!((y[k] / 50.0 - 1.0).abs() < 0.01, "pixel {k}: {}", y[k]);
        }
        assert_eq!(table.role_index(Role::W), Some(2));
        assert_eq!(table.attr("sasImageshape").and_then(|a| a.as_list()), Some(vec![400.0, 400.0]));
    }

    fn ramp() -> SasImage {
        let (rows, cols) = (20, 30);
        let data = (0..rows * cols).map(|k| (k / cols) as f64 + 2.0 * (k % cols) as f64).collect();
        let mut im = SasImage::from_array(rows, cols, data).unwrap();
        im.set_geometry(synthetic::saxs_geometry([10.0, 15.0])).unwrap();
        im.mask_region(5, 9, 10, 16);
        im
    }

    #[test]
    fn linear_fill_reproduces_a_plane() {
        let im = ramp();
        let table = im.as_data_array("linear".parse().unwrap()).unwrap();
        for k in (0..im.len()).filter(|k| im.mask()[*k]) {
            let (i, j) = im.pixel_of(k);
            assert!((table.y()[k] - (i + 2.0 * j)).abs() < 1e-9);
        }
    }

    #[test]
    fn nearest_remove_and_value() {
        let im = ramp();
        let nearest = im.as_data_array(MaskedFill::Nearest).unwrap();
        // top-left masked pixel borders the unmasked pixel above it
        let k = im.index(5, 10);
        assert!(nearest.y()[k] == 4.0 + 20.0 || nearest.y()[k] == 5.0 + 18.0);
        let removed = im.as_data_array(MaskedFill::Remove).unwrap();
        assert_eq!(removed.len(), im.len() - 24);
        let filled = im.as_data_array("-1".parse().unwrap()).unwrap();
        assert_eq!(filled.y()[k], -1.0);
        assert!("bicubic".parse::<MaskedFill>().is_err());
    }

    #[test]
    fn interpolate_masked_from_function_and_curve() {
        let mut im = synthetic::plateau(64, 64, 3.0, synthetic::saxs_geometry([32.0, 32.0]));
        im.mask_circle([32.0, 32.0], 10.0, false);
        let f = |q: f64| 7.0 + q;
        let filled = im.interpolate_masked_radial(RadialFill::Function(&f)).unwrap();
        assert_eq!(filled.masked_count(), 0);
        let q = im.pq_norm().unwrap();
        let k = im.index(32, 35);
        assert!((filled.data()[k] - 7.0 - q[k]).abs() < 1e-12);
        assert_eq!(filled.data()[0], 3.0);

        let curve = Series::from_xy(vec![0.0, 10.0], vec![1.0, 1.0]).unwrap();
        let flat = im.interpolate_masked_radial(RadialFill::Curve(&curve)).unwrap();
        assert_eq!(flat.data()[k], 1.0);
        assert_eq!(flat.masked_count(), 0);
    }
}
