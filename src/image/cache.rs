//! Per-pixel arrays derived from the detector geometry.
//!
//! Each array has its own LRU cache of [`CACHE_SIZE`] entries keyed by the
//! exact bit patterns of the geometry values it depends on. Changing any of
//! them makes the next lookup miss, so reads never see stale arrays.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::{Rotation3, Vector3};

use crate::error::Result;
use crate::image::SasImage;

pub(crate) const CACHE_SIZE: usize = 4;

type Key = Vec<u64>;

fn key(values: &[f64]) -> Key {
    values.iter().map(|v| v.to_bits()).collect()
}

#[derive(Clone)]
pub(crate) struct Lru<V> {
    entries: VecDeque<(Key, Arc<V>)>,
    misses: usize,
}

impl<V> Default for Lru<V> {
    fn default() -> Self {
        Self { entries: VecDeque::with_capacity(CACHE_SIZE), misses: 0 }
    }
}

impl<V> Lru<V> {
    fn get(&mut self, key: &Key) -> Option<Arc<V>> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(pos)?;
        let value = Arc::clone(&entry.1);
        self.entries.push_back(entry);
        Some(value)
    }

    fn insert(&mut self, key: Key, value: Arc<V>) {
        self.misses += 1;
        if self.entries.len() >= CACHE_SIZE {
            self.entries.pop_front();
        }
        self.entries.push_back((key, value));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Polar pixel coordinates around the plane center.
#[derive(Clone)]
pub(crate) struct Polar {
    pub azimuth: Vec<f64>,
    pub radial: Vec<f64>,
}

#[derive(Clone, Default)]
pub(crate) struct Caches {
    pub polar: Lru<Polar>,
    pub xyz: Lru<Vec<Vector3<f64>>>,
    pub xyz_norm: Lru<Vec<f64>>,
    pub q: Lru<Vec<Vector3<f64>>>,
    pub q_norm: Lru<Vec<f64>>,
    pub q_rpt: Lru<Vec<[f64; 3]>>,
}

impl Caches {
    pub(crate) fn misses(&self) -> usize {
        self.polar.misses + self.xyz.misses + self.xyz_norm.misses + self.q.misses + self.q_norm.misses + self.q_rpt.misses
    }
}

/// Look up `$field` under `$key`, computing and storing it on a miss.
macro_rules! cached {
    ($self:ident, $field:ident, $key:expr, $compute:expr) => {{
        let k = $key;
        if let Some(v) = $self.cache.borrow_mut().$field.get(&k) {
            return Ok(v);
        }
        let v = Arc::new($compute);
        $self.cache.borrow_mut().$field.insert(k, Arc::clone(&v));
        Ok(v)
    }};
}

/// Intrinsic ZYZ rotation by (γ, α, β) in degrees.
fn detector_rotation(alpha: f64, beta: f64, gamma: f64) -> Rotation3<f64> {
    let z = Vector3::z_axis();
    let y = Vector3::y_axis();
    Rotation3::from_axis_angle(&z, gamma.to_radians())
        * Rotation3::from_axis_angle(&y, alpha.to_radians())
        * Rotation3::from_axis_angle(&z, beta.to_radians())
}

impl SasImage {
    fn position_key(&self) -> Result<Key> {
        let g = &self.geometry;
        let [px, py] = g.pixel()?;
        Ok(key(&[g.center[0], g.center[1], g.distance()?, px, py, g.alpha, g.beta, g.gamma]))
    }

    fn q_key(&self) -> Result<Key> {
        let mut k = self.position_key()?;
        k.push(self.geometry.lambda()?.to_bits());
        Ok(k)
    }

    pub(crate) fn polar(&self) -> Result<Arc<Polar>> {
        let [c0, c1] = self.geometry.center;
        cached!(self, polar, key(&[c0, c1, self.rows as f64, self.cols as f64]), {
            let (mut azimuth, mut radial) = (Vec::with_capacity(self.len()), Vec::with_capacity(self.len()));
            for k in 0..self.len() {
                let (i, j) = self.pixel_of(k);
                let (x, y) = (i - c0, j - c1);
                azimuth.push(y.atan2(x));
                radial.push(x.hypot(y));
            }
            Polar { azimuth, radial }
        })
    }

    /// Polar azimuth of each pixel around the plane center, in (−π, π].
    pub fn polar_azimuth(&self) -> Result<Vec<f64>> {
        Ok(self.polar()?.azimuth.clone())
    }

    /// Distance of each pixel from the plane center in pixels.
    pub fn polar_radial(&self) -> Result<Vec<f64>> {
        Ok(self.polar()?.radial.clone())
    }

    /// Cartesian pixel positions in m, sample at the origin, beam along +Z.
    pub(crate) fn pixel_xyz(&self) -> Result<Arc<Vec<Vector3<f64>>>> {
        let g = self.geometry;
        let [px, py] = g.pixel()?;
        let d = g.distance()?;
        cached!(self, xyz, self.position_key()?, {
            let rot = (!g.is_standard()).then(|| detector_rotation(g.alpha, g.beta, g.gamma));
            (0..self.len())
                .map(|k| {
                    let (i, j) = self.pixel_of(k);
                    let v = Vector3::new((i - g.center[0]) * px, (j - g.center[1]) * py, d);
                    match &rot {
                        Some(r) => r * v,
                        None => v,
                    }
                })
                .collect::<Vec<_>>()
        })
    }

    /// Distance of each pixel from the sample in m.
    pub(crate) fn pixel_distance(&self) -> Result<Arc<Vec<f64>>> {
        let xyz = self.pixel_xyz()?;
        cached!(self, xyz_norm, self.position_key()?, xyz.iter().map(|v| v.norm()).collect::<Vec<_>>())
    }

    /// Scattering vector `q = k_f − k_i` of every pixel in 1/nm.
    ///
    /// The X component is sign-inverted so that the lower-left image corner
    /// lies in the (−, −) quadrant seen from the sample.
    pub fn pq(&self) -> Result<Arc<Vec<Vector3<f64>>>> {
        let k = self.geometry.wavevector()?;
        let xyz = self.pixel_xyz()?;
        cached!(self, q, self.q_key()?, {
            xyz.iter()
                .map(|p| {
                    let kf = p / p.norm() * k;
                    Vector3::new(-kf.x, kf.y, kf.z - k)
                })
                .collect::<Vec<_>>()
        })
    }

    /// `|q|` of every pixel in 1/nm.
    pub fn pq_norm(&self) -> Result<Arc<Vec<f64>>> {
        let q = self.pq()?;
        cached!(self, q_norm, self.q_key()?, q.iter().map(|v| v.norm()).collect::<Vec<_>>())
    }

    /// `[|q|, φ, θ]` of every pixel with the laboratory z axis along the beam.
    pub(crate) fn pq_rpt(&self) -> Result<Arc<Vec<[f64; 3]>>> {
        let q = self.pq()?;
        cached!(self, q_rpt, self.q_key()?, {
            q.iter()
                .map(|v| {
                    let r = v.norm();
                    let theta = if r > 0.0 { (v.z / r).clamp(-1.0, 1.0).acos() } else { PI / 2.0 };
                    [r, v.y.atan2(v.x), theta]
                })
                .collect::<Vec<_>>()
        })
    }

    /// q components along the pixel axes through the center: qx down the
    /// center column, qy along the center row.
    pub fn pq_axes(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let q = self.pq()?;
        let col = (self.geometry.center[1].max(0.0) as usize).min(self.cols - 1);
        let row = (self.geometry.center[0].max(0.0) as usize).min(self.rows - 1);
        let qx = (0..self.rows).map(|i| q[self.index(i, col)].x).collect();
        let qy = (0..self.cols).map(|j| q[self.index(row, j)].y).collect();
        Ok((qx, qy))
    }

    #[cfg(test)]
    pub(crate) fn cache_misses(&self) -> usize {
        self.cache.borrow().misses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic;
    use approx::assert_relative_eq;

    #[test]
    fn q_at_center_vanishes_and_follows_bragg() {
        let im = synthetic::plateau(101, 101, 1.0, synthetic::saxs_geometry([50.0, 50.0]));
        let q = im.pq_norm().unwrap();
        assert!(q[im.index(50, 50)] < 1e-12);
        // 30 pixels off center
        let g = im.geometry();
        let r = 30.0 * g.pixel_size.unwrap()[0];
        let theta = (r / g.detector_distance.unwrap()).atan();
        let expect = 2.0 * g.wavevector().unwrap() * (theta / 2.0).sin();
        assert_relative_eq!(q[im.index(80, 50)], expect, max_relative = 1e-12);
        assert_relative_eq!(q[im.index(50, 20)], expect, max_relative = 1e-12);
    }

    #[test]
    fn lower_left_corner_is_negative_quadrant() {
        let im = synthetic::plateau(11, 11, 1.0, synthetic::saxs_geometry([5.0, 5.0]));
        let q = im.pq().unwrap();
        let ll = q[im.index(10, 0)];
        assert!(ll.x < 0.0 && ll.y < 0.0);
        let ur = q[im.index(0, 10)];
        assert!(ur.x > 0.0 && ur.y > 0.0);
    }

    #[test]
    fn rotation_keeps_norm_of_pixel_distance_map() {
        let mut im = synthetic::plateau(21, 21, 1.0, synthetic::saxs_geometry([10.0, 10.0]));
        let flat = im.pixel_distance().unwrap();
        im.set_orientation(0.0, 30.0, 15.0);
        // rotations about the normal and the beam do not change distances
        let turned = im.pixel_distance().unwrap();
        for (a, b) in flat.iter().zip(turned.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
        im.set_orientation(90.0, 0.0, 0.0);
        let xyz = im.pixel_xyz().unwrap();
        // detector normal now perpendicular to the beam
        assert!(xyz[im.index(10, 10)].z.abs() < 1e-12);
    }

    #[test]
    fn geometry_changes_invalidate_and_revisits_hit() {
        let mut im = synthetic::plateau(16, 16, 1.0, synthetic::saxs_geometry([8.0, 8.0]));
        let first = im.pq_norm().unwrap();
        let misses = im.cache_misses();
        im.pq_norm().unwrap();
        assert_eq!(im.cache_misses(), misses);
        im.set_center([7.0, 8.0]);
        let moved = im.pq_norm().unwrap();
        assert!(im.cache_misses() > misses);
        assert_ne!(first[im.index(8, 8)], moved[im.index(8, 8)]);
        im.set_center([8.0, 8.0]);
        let misses = im.cache_misses();
        let back = im.pq_norm().unwrap();
        assert_eq!(im.cache_misses(), misses);
        assert!(Arc::ptr_eq(&first, &back));
    }

    #[test]
    fn every_geometry_setter_refreshes_q() {
        type Change = fn(&mut crate::image::SasImage);
        let changes: [(&str, Change); 5] = [
            ("wavelength", |im| im.set_wavelength(1.0).unwrap()),
            ("distance", |im| im.set_detector_distance(0.8).unwrap()),
            ("pixel size", |im| im.set_pixel_size([100e-6, 172e-6]).unwrap()),
            ("alpha", |im| im.set_orientation(20.0, 0.0, 0.0)),
            ("beta/gamma", |im| im.set_orientation(0.0, 25.0, 10.0)),
        ];
        for (what, change) in changes {
            let mut im = synthetic::plateau(16, 16, 1.0, synthetic::saxs_geometry([8.0, 8.0]));
            let off = im.index(13, 8);
            let norm = im.pq_norm().unwrap();
            let q = im.pq().unwrap();
            let misses = im.cache_misses();
            change(&mut im);
            let new_norm = im.pq_norm().unwrap();
            let new_q = im.pq().unwrap();
            assert!(im.cache_misses() > misses, "{what} served a stale entry");
            assert!(!Arc::ptr_eq(&q, &new_q), "{what}");
            assert!((q[off] - new_q[off]).norm() > 1e-9, "{what} left q unchanged");
            if what != "beta/gamma" {
                assert!((norm[off] - new_norm[off]).abs() > 1e-9, "{what} left |q| unchanged");
            }
        }
    }

    #[test]
    fn cache_holds_four_states() {
        let mut im = synthetic::plateau(8, 8, 1.0, synthetic::saxs_geometry([4.0, 4.0]));
        for c in 0..6 {
            im.set_center([c as f64, 4.0]);
            im.pq_norm().unwrap();
        }
        assert_eq!(im.cache.borrow().q_norm.len(), CACHE_SIZE);
    }

    #[test]
    fn missing_geometry_is_reported() {
        let im = crate::image::SasImage::from_array(4, 4, vec![1.0; 16]).unwrap();
        assert!(im.pq().is_err());
        assert!(im.polar().is_ok());
    }
}
