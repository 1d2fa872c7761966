//! Geometric masks.
//!
//! Every operator ORs its region into the existing mask; `invert` masks the
//! complement of the region instead. Points are `[row, col]` pixel positions.

use std::f64::consts::PI;

use crate::error::{Result, SasError};
use crate::image::SasImage;

type Point = [f64; 2];

/// z component of `(a − b) × (p − b)`.
fn side(a: Point, b: Point, p: Point) -> f64 {
    (a[0] - b[0]) * (p[1] - b[1]) - (a[1] - b[1]) * (p[0] - b[0])
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

impl SasImage {
    /// Reset to the initial mask: pixels below the read threshold.
    pub fn mask_reset(&mut self) {
        let level = self.maskbelow;
        for (m, v) in self.mask.iter_mut().zip(&self.data) {
            *m = *v < level || !v.is_finite();
        }
    }

    /// Use the mask of an image with the same shape.
    pub fn mask_from_image(&mut self, other: &SasImage) -> Result<()> {
        if other.shape() != self.shape() {
            return Err(SasError::config(format!(
                "mask of a {:?} image does not fit a {:?} image",
                other.shape(),
                self.shape()
            )));
        }
        self.mask.clone_from(&other.mask);
        Ok(())
    }

    fn mask_where<F: Fn(Point) -> bool>(&mut self, inside: F, invert: bool) {
        for k in 0..self.data.len() {
            let (i, j) = self.pixel_of(k);
            if inside([i, j]) != invert {
                self.mask[k] = true;
            }
        }
    }

    /// Mask rows `rmin..rmax` and columns `cmin..cmax` (upper bounds exclusive, clipped).
    pub fn mask_region(&mut self, rmin: usize, rmax: usize, cmin: usize, cmax: usize) {
        for i in rmin..rmax.min(self.rows) {
            for j in cmin..cmax.min(self.cols) {
                let k = self.index(i, j);
                self.mask[k] = true;
            }
        }
    }

    pub fn mask_regions(&mut self, regions: &[[usize; 4]]) {
        for &[a, b, c, d] in regions {
            self.mask_region(a, b, c, d);
        }
    }

    /// Mask the side left of the line looking from `p1` to `p2`.
    pub fn mask_below_line(&mut self, p1: Point, p2: Point) {
        self.mask_where(|p| side(p1, p2, p) < 0.0, false);
    }

    pub fn mask_triangle(&mut self, p1: Point, p2: Point, p3: Point, invert: bool) {
        self.mask_convex(&[p1, p2, p3], invert);
    }

    /// Mask inside a convex quadrilateral given in order around its edge.
    pub fn mask_4polygon(&mut self, p1: Point, p2: Point, p3: Point, p4: Point, invert: bool) {
        self.mask_convex(&[p1, p2, p3, p4], invert);
    }

    /// A pixel is inside when it lies on the same side of every edge as the
    /// vertex following that edge.
    fn mask_convex(&mut self, vertices: &[Point], invert: bool) {
        let n = vertices.len();
        let edges: Vec<(Point, Point, i8)> = (0..n)
            .map(|e| {
                let (a, b, c) = (vertices[e], vertices[(e + 1) % n], vertices[(e + 2) % n]);
                (a, b, sign(side(a, b, c)))
            })
            .collect();
        self.mask_where(|p| edges.iter().all(|&(a, b, s)| sign(side(a, b, p)) == s), invert);
    }

    pub fn mask_circle(&mut self, center: Point, radius: f64, invert: bool) {
        self.mask_where(|p| (p[0] - center[0]).hypot(p[1] - center[1]) < radius, invert);
    }

    /// Mask sectors around the plane center.
    ///
    /// `angles` and `widths` are in degrees; a single width applies to all
    /// sectors. With `radialmax` only pixels closer than that many pixels to
    /// the center belong to a sector.
    pub fn mask_sectors(&mut self, angles: &[f64], widths: &[f64], radialmax: Option<f64>, invert: bool) -> Result<()> {
        if widths.is_empty() || (widths.len() != 1 && widths.len() != angles.len()) {
            return Err(SasError::config(format!(
                "{} sector widths for {} sectors",
                widths.len(),
                angles.len()
            )));
        }
        let polar = self.polar()?;
        let mut region = vec![false; self.data.len()];
        for (s, angle) in angles.iter().enumerate() {
            let width = widths[if widths.len() == 1 { 0 } else { s }].abs().to_radians();
            let a = angle.to_radians();
            let lo = (a - width / 2.0).rem_euclid(2.0 * PI) - PI;
            let hi = (a + width / 2.0).rem_euclid(2.0 * PI) - PI;
            for (k, r) in region.iter_mut().enumerate() {
                let az = polar.azimuth[k];
                let within = if lo < hi { az > lo && az < hi } else { !(az < lo && az > hi) };
                let near = radialmax.is_none_or(|rmax| polar.radial[k] < rmax);
                *r |= within && near;
            }
        }
        for (m, r) in self.mask.iter_mut().zip(region) {
            if r != invert {
                *m = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::image::synthetic;
    use crate::image::SasImage;

    fn blank(n: usize) -> SasImage {
        synthetic::plateau(n, n, 1.0, synthetic::saxs_geometry([n as f64 / 2.0, n as f64 / 2.0]))
    }

    #[test]
    fn circle_and_inverse_cover_everything() {
        let mut a = blank(40);
        a.mask_circle([20.0, 20.0], 10.0, false);
        let inside = a.masked_count();
        // π r² within a pixel ring
        assert!((inside as f64 - std::f64::consts::PI * 100.0).abs() < 20.0);
        let mut b = blank(40);
        b.mask_circle([20.0, 20.0], 10.0, true);
        assert_eq!(inside + b.masked_count(), 1600);
        a.mask_circle([20.0, 20.0], 10.0, true);
        assert_eq!(a.masked_count(), 1600);
    }

    #[test]
    fn masks_accumulate() {
        let mut im = blank(10);
        im.mask_region(0, 2, 0, 10);
        im.mask_regions(&[[8, 20, 0, 10]]);
        assert_eq!(im.masked_count(), 40);
        im.mask_region(0, 2, 0, 10);
        assert_eq!(im.masked_count(), 40);
        im.mask_reset();
        assert_eq!(im.masked_count(), 0);
    }

    #[test]
    fn line_masks_left_side() {
        let mut im = blank(10);
        // looking down the rows along column 5, the left side is the larger columns
        im.mask_below_line([0.0, 5.0], [9.0, 5.0]);
        assert!(im.mask()[im.index(3, 8)]);
        assert!(!im.mask()[im.index(3, 2)]);
        assert!(!im.mask()[im.index(3, 5)]);
    }

    #[test]
    fn polygon_and_triangle() {
        let mut sq = blank(20);
        sq.mask_4polygon([5.0, 5.0], [5.0, 14.0], [14.0, 14.0], [14.0, 5.0], false);
        // interior pixels 6..=13 in both directions
        assert_eq!(sq.masked_count(), 64);
        let mut reverse = blank(20);
        reverse.mask_4polygon([14.0, 5.0], [14.0, 14.0], [5.0, 14.0], [5.0, 5.0], false);
        assert_eq!(reverse.masked_count(), 64);
        let mut tri = blank(20);
        tri.mask_triangle([2.0, 2.0], [2.0, 17.0], [17.0, 2.0], false);
        assert!(tri.mask()[tri.index(5, 5)]);
        assert!(!tri.mask()[tri.index(15, 15)]);
    }

    #[test]
    fn different_operators_commute() {
        let mut ab = blank(30);
        ab.mask_circle([10.0, 12.0], 6.0, false);
        ab.mask_sectors(&[45.0, 200.0], &[30.0, 15.0], Some(12.0), false).unwrap();
        let mut ba = blank(30);
        ba.mask_sectors(&[45.0, 200.0], &[30.0, 15.0], Some(12.0), false).unwrap();
        ba.mask_circle([10.0, 12.0], 6.0, false);
        assert_eq!(ab.mask(), ba.mask());
        assert!(ab.masked_count() > 0 && ab.masked_count() < 900);

        let mut ab = blank(30);
        ab.mask_triangle([3.0, 3.0], [3.0, 25.0], [20.0, 10.0], true);
        ab.mask_below_line([0.0, 20.0], [29.0, 5.0]);
        let mut ba = blank(30);
        ba.mask_below_line([0.0, 20.0], [29.0, 5.0]);
        ba.mask_triangle([3.0, 3.0], [3.0, 25.0], [20.0, 10.0], true);
        assert_eq!(ab.mask(), ba.mask());
        assert!(ab.masked_count() < 900);

        let mut ab = blank(30);
        ab.mask_region(0, 5, 0, 30);
        ab.mask_4polygon([8.0, 8.0], [8.0, 20.0], [22.0, 20.0], [22.0, 8.0], false);
        ab.mask_circle([15.0, 15.0], 4.0, true);
        let mut ba = blank(30);
        ba.mask_circle([15.0, 15.0], 4.0, true);
        ba.mask_4polygon([8.0, 8.0], [8.0, 20.0], [22.0, 20.0], [22.0, 8.0], false);
        ba.mask_region(0, 5, 0, 30);
        assert_eq!(ab.mask(), ba.mask());
    }

    #[test]
    fn opposite_sectors() {
        let mut im = blank(41);
        im.mask_sectors(&[0.0, 180.0], &[20.0], None, false).unwrap();
        let masked = im.masked_count() as f64;
        // two 20° wedges along an axis of a square, about a tenth of the pixels
        assert!(masked > 41.0 * 41.0 / 15.0 && masked < 41.0 * 41.0 / 7.0);
        let mut inv = blank(41);
        inv.mask_sectors(&[0.0, 180.0], &[20.0], Some(10.0), true).unwrap();
        assert!(inv.masked_count() > 41 * 41 - 70);
        assert!(blank(5).mask_sectors(&[0.0, 90.0, 180.0], &[1.0, 2.0], None, false).is_err());
    }
}
