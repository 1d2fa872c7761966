//! Detector images.
//!
//! A [`SasImage`] is a row-major 2-D array of counts with a pixel mask and the
//! detector geometry needed to map every pixel onto a scattering vector.
//! Pixel `[i, j]` is row `i` (height) and column `j` (width) with the origin in
//! the upper-left corner, the way detector files store them.
//!
//! Geometry lives in [`Geometry`]. Per-pixel arrays derived from it (pixel
//! positions, q vectors, polar coordinates) are cached in small LRU caches
//! keyed by the geometry values they depend on, so changing the center or
//! the distance and changing it back does not recompute anything.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, SasError};
use crate::series::{AttrValue, Series};

mod average;
mod cache;
mod calibrate;
mod exif;
mod fill;
mod files;
mod mask;
mod reduce;
mod render;
pub mod synthetic;

pub use average::{AzimuthOptions, ErrorModel, IntensityUnits, LineOptions, RadialOptions};
pub use calibrate::{DistanceCalibration, RecalibrateOptions};
pub use exif::KEYWORDS;
pub use fill::{MaskedFill, RadialFill};
pub use files::{create_image_descriptions, read_images, SaveFill};
pub use render::{ColorScale, Colormap, RenderOptions};

use cache::Caches;

/// Detector placement and beam wavelength.
///
/// Angles are in degrees. With `alpha = beta = gamma = 0` the detector normal
/// is the incident beam (standard small-angle geometry) and `center` is the
/// beam center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Pixel `[row, col]` where the detector normal through the sample hits the plane.
    pub center: [f64; 2],
    /// Sample to detector distance along the normal in m.
    pub detector_distance: Option<f64>,
    /// Pixel size along rows and columns in m.
    pub pixel_size: Option<[f64; 2]>,
    /// Wavelength in Å.
    pub wavelength: Option<f64>,
    /// Angle between incident beam and detector normal.
    pub alpha: f64,
    /// Rotation of the detector around its own normal.
    pub beta: f64,
    /// Rotation of the detector normal around the incident beam.
    pub gamma: f64,
}

impl Geometry {
    fn centered(rows: usize, cols: usize) -> Self {
        Self {
            center: [rows as f64 / 2.0, cols as f64 / 2.0],
            detector_distance: None,
            pixel_size: None,
            wavelength: None,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
        }
    }

    pub fn is_standard(&self) -> bool {
        self.alpha == 0.0 && self.beta == 0.0 && self.gamma == 0.0
    }

    pub fn distance(&self) -> Result<f64> {
        self.detector_distance
            .ok_or_else(|| SasError::config("detector distance is not set"))
    }

    pub fn pixel(&self) -> Result<[f64; 2]> {
        self.pixel_size.ok_or_else(|| SasError::config("pixel size is not set"))
    }

    pub fn lambda(&self) -> Result<f64> {
        self.wavelength.ok_or_else(|| SasError::config("wavelength is not set"))
    }

    /// `|k| = 2π/λ` in 1/nm.
    pub fn wavevector(&self) -> Result<f64> {
        Ok(2.0 * std::f64::consts::PI / (self.lambda()? / 10.0))
    }
}

/// Geometry and mask settings applied while creating an image.
///
/// Values from `copy` are applied first, explicit fields take precedence.
#[derive(Debug, Clone, Default)]
pub struct ImageOverrides<'a> {
    pub center: Option<[f64; 2]>,
    pub detector_distance: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub pixel_size: Option<[f64; 2]>,
    pub wavelength: Option<f64>,
    pub copy: Option<&'a SasImage>,
    /// Pixels with values below this are masked (0 when unset).
    pub maskbelow: Option<f64>,
}

#[derive(Clone)]
pub struct SasImage {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    mask: Vec<bool>,
    geometry: Geometry,
    pub filename: Option<PathBuf>,
    pub description: String,
    /// Free lines of the ImageDescription field not turned into attributes.
    pub image_description: Vec<String>,
    /// Free lines of the Artist field not turned into attributes.
    pub artist: Vec<String>,
    attrs: BTreeMap<String, AttrValue>,
    /// Other TIFF text fields (Make, Model, Software, ...) by tag number.
    pub(crate) tags: BTreeMap<u16, String>,
    maskbelow: f64,
    cache: RefCell<Caches>,
}

impl fmt::Debug for SasImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasImage")
            .field("shape", &(self.rows, self.cols))
            .field("masked", &self.masked_count())
            .field("geometry", &self.geometry)
            .field("filename", &self.filename)
            .finish()
    }
}

impl SasImage {
    /// Image from row-major values; pixels below 0 are masked.
    pub fn from_array(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(SasError::config("image needs at least one row and one column"));
        }
        if data.len() != rows * cols {
            return Err(SasError::config(format!(
                "{} values do not fill a {rows}x{cols} image",
                data.len()
            )));
        }
        Ok(Self::from_parts(rows, cols, data, Geometry::centered(rows, cols)))
    }

    /// Caller guarantees `data.len() == rows * cols`.
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>, geometry: Geometry) -> Self {
        let mask = data.iter().map(|v| *v < 0.0 || !v.is_finite()).collect();
        Self {
            rows,
            cols,
            data,
            mask,
            geometry,
            filename: None,
            description: "---".to_string(),
            image_description: Vec::new(),
            artist: Vec::new(),
            attrs: BTreeMap::new(),
            tags: BTreeMap::new(),
            maskbelow: 0.0,
            cache: RefCell::new(Caches::default()),
        }
    }

    /// Apply geometry overrides and the initial mask threshold.
    pub fn with_overrides(mut self, o: &ImageOverrides<'_>) -> Result<Self> {
        if let Some(other) = o.copy {
            self.set_attr_from_image(other);
        }
        if let Some(c) = o.center {
            self.set_center(c);
        }
        if let Some(d) = o.detector_distance {
            self.set_detector_distance(d)?;
        }
        if let Some(p) = o.pixel_size {
            self.set_pixel_size(p)?;
        }
        if let Some(w) = o.wavelength {
            self.set_wavelength(w)?;
        }
        let g = self.geometry;
        self.set_orientation(
            o.alpha.unwrap_or(g.alpha),
            o.beta.unwrap_or(g.beta),
            o.gamma.unwrap_or(g.gamma),
        );
        if let Some(level) = o.maskbelow {
            self.maskbelow = level;
            self.mask_reset();
        }
        Ok(self)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw values including masked pixels.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn mask_mut(&mut self) -> &mut [bool] {
        &mut self.mask
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    pub(crate) fn index(&self, i: usize, j: usize) -> usize {
        i * self.cols + j
    }

    /// Value at `[i, j]`, `None` if masked or outside.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.rows || j >= self.cols {
            return None;
        }
        let k = self.index(i, j);
        (!self.mask[k]).then_some(self.data[k])
    }

    /// Row and column of a flat pixel index.
    pub(crate) fn pixel_of(&self, k: usize) -> (f64, f64) {
        ((k / self.cols) as f64, (k % self.cols) as f64)
    }

    /// Unmasked values.
    pub fn unmasked(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().zip(&self.mask).filter(|(_, m)| !**m).map(|(v, _)| *v)
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.unmasked().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn center(&self) -> [f64; 2] {
        self.geometry.center
    }

    pub fn set_center(&mut self, center: [f64; 2]) {
        self.geometry.center = center;
    }

    /// Shortest distance between sample and detector plane, m.
    pub fn set_detector_distance(&mut self, distance: f64) -> Result<()> {
        if !(distance > 0.0) {
            return Err(SasError::config(format!("detector distance must be positive, got {distance}")));
        }
        self.geometry.detector_distance = Some(distance);
        Ok(())
    }

    pub fn set_pixel_size(&mut self, pixel_size: [f64; 2]) -> Result<()> {
        if !(pixel_size[0] > 0.0 && pixel_size[1] > 0.0) {
            return Err(SasError::config(format!("pixel size must be positive, got {pixel_size:?}")));
        }
        self.geometry.pixel_size = Some(pixel_size);
        Ok(())
    }

    /// Wavelength in Å.
    pub fn set_wavelength(&mut self, wavelength: f64) -> Result<()> {
        if !(wavelength > 0.0) {
            return Err(SasError::config(format!("wavelength must be positive, got {wavelength}")));
        }
        self.geometry.wavelength = Some(wavelength);
        Ok(())
    }

    /// Detector plane orientation in degrees; all zero in standard geometry.
    pub fn set_orientation(&mut self, alpha: f64, beta: f64, gamma: f64) {
        self.geometry.alpha = alpha;
        self.geometry.beta = beta;
        self.geometry.gamma = gamma;
    }

    pub fn set_detector_position(
        &mut self,
        center: [f64; 2],
        distance: f64,
        alpha: Option<f64>,
        beta: Option<f64>,
        gamma: Option<f64>,
    ) -> Result<()> {
        self.set_detector_distance(distance)?;
        self.set_center(center);
        let g = self.geometry;
        self.set_orientation(alpha.unwrap_or(g.alpha), beta.unwrap_or(g.beta), gamma.unwrap_or(g.gamma));
        Ok(())
    }

    /// Copy the whole geometry of `other`.
    pub fn set_attr_from_image(&mut self, other: &SasImage) {
        self.geometry = other.geometry;
    }

    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        let Geometry { center, detector_distance, pixel_size, wavelength, alpha, beta, gamma } = geometry;
        if let Some(d) = detector_distance {
            self.set_detector_distance(d)?;
        }
        if let Some(p) = pixel_size {
            self.set_pixel_size(p)?;
        }
        if let Some(w) = wavelength {
            self.set_wavelength(w)?;
        }
        self.set_center(center);
        self.set_orientation(alpha, beta, gamma);
        Ok(())
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Copy of the image with every value multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> SasImage {
        let mut out = self.clone();
        out.data.iter_mut().for_each(|v| *v *= factor);
        out
    }

    /// `self − factor·other`; the masks are combined.
    pub fn subtract(&self, other: &SasImage, factor: f64) -> Result<SasImage> {
        if other.shape() != self.shape() {
            return Err(SasError::config(format!(
                "cannot subtract a {:?} image from a {:?} image",
                other.shape(),
                self.shape()
            )));
        }
        let mut out = self.clone();
        for (k, v) in out.data.iter_mut().enumerate() {
            *v -= factor * other.data[k];
            out.mask[k] |= other.mask[k];
        }
        Ok(out)
    }

    /// Image geometry, header values and filename as series attributes.
    pub(crate) fn annotate(&self, s: &mut Series) {
        let g = &self.geometry;
        s.put("center", g.center.to_vec());
        if let Some(d) = g.detector_distance {
            s.put("detector_distance", d);
        }
        if let Some(p) = g.pixel_size {
            s.put("pixel_size", p.to_vec());
        }
        if let Some(w) = g.wavelength {
            s.put("wavelength", w);
        }
        s.put("alpha", g.alpha);
        s.put("beta", g.beta);
        s.put("gamma", g.gamma);
        s.put("description", self.description.as_str());
        if let Some(f) = &self.filename {
            s.put("filename", f.display().to_string());
        }
        for (k, v) in &self.attrs {
            s.put(k, v.clone());
        }
    }

    /// Same metadata and geometry, new pixel array.
    pub(crate) fn rebuild(&self, rows: usize, cols: usize, data: Vec<f64>, mask: Vec<bool>) -> SasImage {
        SasImage {
            rows,
            cols,
            data,
            mask,
            geometry: self.geometry,
            filename: self.filename.clone(),
            description: self.description.clone(),
            image_description: self.image_description.clone(),
            artist: self.artist.clone(),
            attrs: self.attrs.clone(),
            tags: self.tags.clone(),
            maskbelow: self.maskbelow,
            cache: RefCell::new(Caches::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plateau(rows: usize, cols: usize, value: f64) -> SasImage {
        let mut im = SasImage::from_array(rows, cols, vec![value; rows * cols]).unwrap();
        im.set_detector_distance(1.0).unwrap();
        im.set_pixel_size([172e-6, 172e-6]).unwrap();
        im.set_wavelength(1.54).unwrap();
        im
    }

    #[test]
    fn negative_pixels_start_masked() {
        let im = SasImage::from_array(2, 2, vec![1.0, -1.0, 0.0, 3.0]).unwrap();
        assert_eq!(im.mask(), &[false, true, false, false]);
        assert_eq!(im.get(0, 1), None);
        assert_eq!(im.get(1, 1), Some(3.0));
        assert!(SasImage::from_array(2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn overrides_take_precedence_over_copy() {
        let cal = plateau(4, 4, 1.0);
        let o = ImageOverrides {
            copy: Some(&cal),
            detector_distance: Some(2.5),
            maskbelow: Some(2.0),
            ..Default::default()
        };
        let im = SasImage::from_array(4, 4, vec![1.0; 16]).unwrap().with_overrides(&o).unwrap();
        assert_eq!(im.geometry().detector_distance, Some(2.5));
        assert_eq!(im.geometry().wavelength, Some(1.54));
        assert_eq!(im.masked_count(), 16);
    }

    #[test]
    fn geometry_must_be_positive() {
        let mut im = plateau(2, 2, 1.0);
        assert!(im.set_detector_distance(0.0).is_err());
        assert!(im.set_pixel_size([1e-4, -1e-4]).is_err());
        assert!(im.set_wavelength(f64::NAN).is_err());
        assert_eq!(im.geometry().detector_distance, Some(1.0));
    }

    #[test]
    fn subtraction_combines_masks() {
        let a = SasImage::from_array(1, 3, vec![5.0, -1.0, 4.0]).unwrap();
        let mut b = SasImage::from_array(1, 3, vec![1.0, 1.0, 1.0]).unwrap();
        b.mask_mut()[2] = true;
        let d = a.subtract(&b, 2.0).unwrap();
        assert_eq!(d.data(), &[3.0, -3.0, 2.0]);
        assert_eq!(d.mask(), &[false, true, true]);
    }
}
