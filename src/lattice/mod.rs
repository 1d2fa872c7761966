//! Crystal lattices and their radial reciprocal lattice.
//!
//! A lattice is given by its real-space vectors (one for a lamellar stack,
//! three for bulk crystals) and the fractional positions and scattering
//! lengths of the atoms in the unit cell. Powder diffraction only needs the
//! radial distribution of Bragg peaks, see [`Lattice::radial_reciprocal_lattice`].

mod structure_factor;

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use num_complex::Complex64;

use crate::error::{Result, SasError};

pub use structure_factor::{lattice_structure_factor, radial_structure_factor, Correction, LatticeOptions};

/// Lamellar period of silver behenate in nm.
pub const AGBE_PERIOD: f64 = 5.8378;

/// Selection threshold relative to the strongest `|F_hkl|²`.
const F2_THRESHOLD: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LatticeKind {
    Sc,
    Bcc,
    Fcc,
    Diamond,
    Hex,
    Lam,
    /// Lamellar silver behenate.
    Agbe,
}

impl LatticeKind {
    pub fn name(self) -> &'static str {
        match self {
            LatticeKind::Sc => "sc",
            LatticeKind::Bcc => "bcc",
            LatticeKind::Fcc => "fcc",
            LatticeKind::Diamond => "diamond",
            LatticeKind::Hex => "hex",
            LatticeKind::Lam => "lam",
            LatticeKind::Agbe => "agbe",
        }
    }
}

impl fmt::Display for LatticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LatticeKind {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sc" => Ok(LatticeKind::Sc),
            "bcc" => Ok(LatticeKind::Bcc),
            "fcc" => Ok(LatticeKind::Fcc),
            "diamond" => Ok(LatticeKind::Diamond),
            "hex" | "hexagonal" => Ok(LatticeKind::Hex),
            "lam" | "lamellar" => Ok(LatticeKind::Lam),
            "agbe" => Ok(LatticeKind::Agbe),
            other => Err(SasError::config(format!("unknown lattice '{other}'"))),
        }
    }
}

/// Bragg peaks grouped by `|q_hkl|`, sorted by increasing q.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadialPeaks {
    pub q: Vec<f64>,
    /// Unit-cell structure factor `|F_hkl|²` of the group.
    pub f2: Vec<f64>,
    pub multiplicity: Vec<usize>,
    /// Representative Miller indices, preferring positive ones.
    pub hkl: Vec<[i32; 3]>,
}

impl RadialPeaks {
    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }
}

/// One reciprocal lattice point with its structure factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReciprocalPoint {
    pub q: Vector3<f64>,
    pub f2: f64,
    pub hkl: [i32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    kind: LatticeKind,
    vectors: Vec<Vector3<f64>>,
    /// Fractional unit-cell positions, only the first `dim` entries are used.
    atoms: Vec<[f64; 3]>,
    b: Vec<f64>,
}

fn positive_length(what: &str, v: f64) -> Result<()> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(SasError::config(format!("{what} must be positive, got {v}")))
    }
}

impl Lattice {
    fn bravais(kind: LatticeKind, vectors: Vec<Vector3<f64>>, atoms: Vec<[f64; 3]>) -> Result<Self> {
        for v in &vectors {
            if !(v.norm() > 0.0) || !v.norm().is_finite() {
                return Err(SasError::config("lattice constants must be positive"));
            }
        }
        let b = vec![1.0; atoms.len()];
        Ok(Self { kind, vectors, atoms, b })
    }

    fn cubic(kind: LatticeKind, a: f64, atoms: Vec<[f64; 3]>) -> Result<Self> {
        positive_length("lattice constant", a)?;
        let vectors = vec![Vector3::new(a, 0.0, 0.0), Vector3::new(0.0, a, 0.0), Vector3::new(0.0, 0.0, a)];
        Self::bravais(kind, vectors, atoms)
    }

    pub fn sc(a: f64) -> Result<Self> {
        Self::cubic(LatticeKind::Sc, a, vec![[0.0; 3]])
    }

    pub fn bcc(a: f64) -> Result<Self> {
        Self::cubic(LatticeKind::Bcc, a, vec![[0.0; 3], [0.5; 3]])
    }

    pub fn fcc(a: f64) -> Result<Self> {
        Self::cubic(LatticeKind::Fcc, a, vec![[0.0; 3], [0.5, 0.5, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5]])
    }

    /// Diamond cubic with 8 atoms in the unit cell.
    pub fn diamond(a: f64) -> Result<Self> {
        let atoms = vec![
            [0.0, 0.0, 0.0],
            [0.5, 0.5, 0.0],
            [0.0, 0.5, 0.5],
            [0.5, 0.0, 0.5],
            [0.25, 0.25, 0.25],
            [0.75, 0.75, 0.25],
            [0.25, 0.75, 0.75],
            [0.75, 0.25, 0.75],
        ];
        Self::cubic(LatticeKind::Diamond, a, atoms)
    }

    /// Hexagonal lattice with in-plane distance `ab` and height `c`.
    pub fn hexagonal(ab: f64, c: f64) -> Result<Self> {
        positive_length("lattice constant a", ab)?;
        positive_length("lattice constant c", c)?;
        let vectors = vec![
            Vector3::new(ab, 0.0, 0.0),
            Vector3::new(0.5 * ab, 3f64.sqrt() / 2.0 * ab, 0.0),
            Vector3::new(0.0, 0.0, c),
        ];
        Self::bravais(LatticeKind::Hex, vectors, vec![[0.0; 3]])
    }

    /// One-dimensional stack with period `d`.
    pub fn lamellar(d: f64) -> Result<Self> {
        positive_length("lamellar period", d)?;
        Self::bravais(LatticeKind::Lam, vec![Vector3::new(d, 0.0, 0.0)], vec![[0.0; 3]])
    }

    /// Silver behenate, the usual SAXS calibrant.
    pub fn agbe() -> Self {
        Self {
            kind: LatticeKind::Agbe,
            vectors: vec![Vector3::new(AGBE_PERIOD, 0.0, 0.0)],
            atoms: vec![[0.0; 3]],
            b: vec![1.0],
        }
    }

    /// Build a lattice by name. `c` is only used by the hexagonal lattice and
    /// defaults to the hcp ratio `c/a = √(8/3)`.
    pub fn from_kind(kind: LatticeKind, a: f64, c: Option<f64>) -> Result<Self> {
        match kind {
            LatticeKind::Sc => Self::sc(a),
            LatticeKind::Bcc => Self::bcc(a),
            LatticeKind::Fcc => Self::fcc(a),
            LatticeKind::Diamond => Self::diamond(a),
            LatticeKind::Hex => Self::hexagonal(a, c.unwrap_or(a * (8.0f64 / 3.0).sqrt())),
            LatticeKind::Lam => Self::lamellar(a),
            LatticeKind::Agbe => Ok(Self::agbe()),
        }
    }

    /// Replace the scattering lengths of the unit-cell atoms.
    pub fn with_b(mut self, b: Vec<f64>) -> Result<Self> {
        if b.len() != self.atoms.len() {
            return Err(SasError::config(format!(
                "{} lattice has {} unit cell atoms, got {} scattering lengths",
                self.kind,
                self.atoms.len(),
                b.len()
            )));
        }
        self.b = b;
        Ok(self)
    }

    pub fn kind(&self) -> LatticeKind {
        self.kind
    }

    pub fn dim(&self) -> usize {
        self.vectors.len()
    }

    pub fn vectors(&self) -> &[Vector3<f64>] {
        &self.vectors
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn lattice_constants(&self) -> Vec<f64> {
        self.vectors.iter().map(|v| v.norm()).collect()
    }

    /// Volume (area, length) of the unit cell.
    pub fn unit_cell_volume(&self) -> f64 {
        match self.vectors.as_slice() {
            [a, b, c] => a.dot(&b.cross(c)).abs(),
            [a, b] => a.cross(b).norm(),
            [a] => a.norm(),
            _ => 0.0,
        }
    }

    pub fn reciprocal_vectors(&self) -> Vec<Vector3<f64>> {
        match self.vectors.as_slice() {
            [a, b, c] => {
                let v = a.dot(&b.cross(c));
                vec![b.cross(c) * (2.0 * PI / v), c.cross(a) * (2.0 * PI / v), a.cross(b) * (2.0 * PI / v)]
            }
            [a, b] => {
                let normal = a.cross(b);
                let ra = b.cross(&normal);
                let rb = normal.cross(a);
                vec![ra * (2.0 * PI / a.dot(&ra)), rb * (2.0 * PI / b.dot(&rb))]
            }
            [a] => vec![a * (2.0 * PI / a.norm_squared())],
            _ => Vec::new(),
        }
    }

    /// Absolute positions of the unit-cell atoms.
    pub fn unit_cell_positions(&self) -> Vec<Vector3<f64>> {
        self.atoms
            .iter()
            .map(|frac| self.vectors.iter().zip(frac).fold(Vector3::zeros(), |acc, (v, f)| acc + v * *f))
            .collect()
    }

    /// `|F_hkl|² = |Σ b_j exp(2πi hkl·x_j)|²`, which carries the extinction rules.
    pub fn f2hkl(&self, hkl: [i32; 3]) -> f64 {
        let dim = self.dim();
        let f: Complex64 = self
            .atoms
            .iter()
            .zip(&self.b)
            .map(|(x, b)| {
                let phase: f64 = (0..dim).map(|i| x[i] * f64::from(hkl[i])).sum();
                Complex64::from_polar(*b, 2.0 * PI * phase)
            })
            .sum();
        f.norm_sqr()
    }

    /// Reciprocal lattice points with `|h|,|k|,|l| ≤ size` whose structure
    /// factor exceeds `threshold` times the strongest one.
    pub fn reciprocal_lattice(&self, size: usize, threshold: f64) -> Vec<ReciprocalPoint> {
        let recip = self.reciprocal_vectors();
        let n = size as i32;
        let range = |axis: usize| if axis < recip.len() { -n..=n } else { 0..=0 };
        let mut points = Vec::new();
        for l in range(2) {
            for k in range(1) {
                for h in range(0) {
                    let hkl = [h, k, l];
                    let q = recip.iter().zip(hkl).fold(Vector3::zeros(), |acc, (v, m)| acc + v * f64::from(m));
                    points.push(ReciprocalPoint { q, f2: self.f2hkl(hkl), hkl });
                }
            }
        }
        let max = points.iter().map(|p| p.f2).fold(0.0, f64::max);
        points.retain(|p| p.f2 > threshold * max);
        points
    }

    /// Radial distribution of Bragg peaks up to Miller index `hklmax`.
    /// Peaks that agree in q to 1e-7 are merged and counted as multiplicity.
    pub fn radial_reciprocal_lattice(&self, hklmax: usize) -> RadialPeaks {
        const TOL: f64 = 1e7;
        let mut groups: BTreeMap<i64, (f64, usize, [i32; 3])> = BTreeMap::new();
        for p in self.reciprocal_lattice(hklmax, F2_THRESHOLD) {
            let key = (p.q.norm() * TOL).round() as i64;
            let entry = groups.entry(key).or_insert((p.f2, 0, p.hkl));
            entry.1 += 1;
            // Keep the indices with the largest (l, k, h) as representative.
            let rank = |m: [i32; 3]| (m[2], m[1], m[0]);
            if rank(p.hkl) > rank(entry.2) {
                entry.0 = p.f2;
                entry.2 = p.hkl;
            }
        }
        let mut out = RadialPeaks::default();
        for (key, (f2, count, hkl)) in groups {
            if key <= 0 {
                continue;
            }
            out.q.push(key as f64 / TOL);
            out.f2.push(f2);
            out.multiplicity.push(count);
            out.hkl.push(hkl);
        }
        out
    }

    /// Bragg angles `2 arcsin(q λ/4π)` in degrees; `wavelength` in nm,
    /// Cu Kα when `None`.
    pub fn scattering_angles(&self, wavelength: Option<f64>, size: usize) -> Vec<f64> {
        let wavelength = wavelength.unwrap_or(0.15406);
        self.radial_reciprocal_lattice(size)
            .q
            .iter()
            .map(|q| q * wavelength / 4.0 / PI)
            .filter(|s| s.abs() < 1.0)
            .map(|s| (2.0 * s.asin()).to_degrees())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lattice_names_parse() {
        assert_eq!("FCC".parse::<LatticeKind>().unwrap(), LatticeKind::Fcc);
        assert_eq!("lamellar".parse::<LatticeKind>().unwrap(), LatticeKind::Lam);
        assert!("triclinic".parse::<LatticeKind>().is_err());
    }

    #[test]
    fn reciprocal_vectors_are_dual() {
        let lat = Lattice::hexagonal(1.3, 2.1).unwrap();
        let recip = lat.reciprocal_vectors();
        for (i, a) in lat.vectors().iter().enumerate() {
            for (j, b) in recip.iter().enumerate() {
                let expected = if i == j { 2.0 * PI } else { 0.0 };
                assert!((a.dot(b) - expected).abs() < 1e-10);
            }
        }
        assert_relative_eq!(lat.unit_cell_volume(), 1.3 * 1.3 * 3f64.sqrt() / 2.0 * 2.1, max_relative = 1e-12);
    }

    #[test]
    fn simple_cubic_first_peak() {
        let peaks = Lattice::sc(2.0).unwrap().radial_reciprocal_lattice(3);
        assert_relative_eq!(peaks.q[0], PI, max_relative = 1e-6);
        assert_eq!(peaks.multiplicity[0], 6);
        assert_relative_eq!(peaks.f2[0], 1.0, max_relative = 1e-12);
        assert_eq!(peaks.hkl[0], [0, 0, 1]);
        // (110) family
        assert_relative_eq!(peaks.q[1], PI * 2f64.sqrt(), max_relative = 1e-6);
        assert_eq!(peaks.multiplicity[1], 12);
    }

    #[test]
    fn extinction_rules() {
        let a = 1.0;
        let q0 = 2.0 * PI / a;
        let bcc = Lattice::bcc(a).unwrap().radial_reciprocal_lattice(3);
        assert_relative_eq!(bcc.q[0], q0 * 2f64.sqrt(), max_relative = 1e-6);
        assert_eq!(bcc.multiplicity[0], 12);
        assert_relative_eq!(bcc.f2[0], 4.0, max_relative = 1e-9);

        let fcc = Lattice::fcc(a).unwrap().radial_reciprocal_lattice(3);
        assert_relative_eq!(fcc.q[0], q0 * 3f64.sqrt(), max_relative = 1e-6);
        assert_eq!(fcc.multiplicity[0], 8);
        assert_relative_eq!(fcc.f2[0], 16.0, max_relative = 1e-9);

        let diamond = Lattice::diamond(a).unwrap().radial_reciprocal_lattice(3);
        assert_relative_eq!(diamond.f2[0], 32.0, max_relative = 1e-9);
        // (200) is allowed for fcc but forbidden for diamond
        assert!(fcc.q.iter().any(|q| (q - 2.0 * q0).abs() < 1e-6));
        assert!(!diamond.q.iter().any(|q| (q - 2.0 * q0).abs() < 1e-6));
    }

    #[test]
    fn lamellar_orders() {
        let peaks = Lattice::agbe().radial_reciprocal_lattice(7);
        assert_eq!(peaks.len(), 7);
        for (n, q) in peaks.q.iter().enumerate() {
            assert_relative_eq!(*q, (n + 1) as f64 * 2.0 * PI / AGBE_PERIOD, max_relative = 1e-6);
            assert_eq!(peaks.multiplicity[n], 2);
        }
        assert_relative_eq!(peaks.q[0], 1.0763, max_relative = 1e-3);
    }

    #[test]
    fn scattering_angles_cu() {
        let angles = Lattice::agbe().scattering_angles(None, 3);
        let expected = (2.0 * (2.0 * PI / AGBE_PERIOD * 0.15406 / 4.0 / PI).asin()).to_degrees();
        assert_relative_eq!(angles[0], expected, max_relative = 1e-6);
    }

    #[test]
    fn scattering_lengths_must_match_atoms() {
        assert!(Lattice::bcc(1.0).unwrap().with_b(vec![1.0]).is_err());
        let lat = Lattice::bcc(1.0).unwrap().with_b(vec![1.0, 0.5]).unwrap();
        // (100) is no longer fully extinct for unequal atoms
        let peaks = lat.radial_reciprocal_lattice(2);
        assert_relative_eq!(peaks.q[0], 2.0 * PI, max_relative = 1e-6);
        assert_relative_eq!(peaks.f2[0], 0.25, max_relative = 1e-9);
        assert!(Lattice::sc(-1.0).is_err());
    }

    #[test]
    fn negative_or_zero_lengths_are_rejected() {
        assert!(matches!(Lattice::fcc(-0.5), Err(SasError::Config(_))));
        assert!(Lattice::bcc(0.0).is_err());
        assert!(Lattice::diamond(-2.0).is_err());
        assert!(Lattice::hexagonal(-1.0, 2.0).is_err());
        assert!(Lattice::hexagonal(1.0, -2.0).is_err());
        assert!(Lattice::lamellar(-5.8).is_err());
        assert!(Lattice::from_kind(LatticeKind::Sc, f64::NAN, None).is_err());
        assert!(Lattice::hexagonal(1.0, 1.6).is_ok());
    }
}
