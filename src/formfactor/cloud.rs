//! Scattering of point clouds.
//!
//! A cloud is a set of scatterers at positions `r_i` with scattering length
//! `b_i` and an optional isotropic amplitude `f_i(q)` (normalised to 1 at
//! q = 0). The normalised form factor is
//!
//! ```text
//! P(q) = < |Σ b_i f_i(q) exp(i q·r_i)|² > / (Σ b_i)²
//! ```
//!
//! - [`debye`] evaluates the orientational average with the Debye equation
//!   (exact, O(N²), no β, no displacements)
//! - [`orientational_average`] averages explicitly over Fibonacci directions,
//!   which also yields the asymmetry factor β and supports random
//!   displacements

use nalgebra::Vector3;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{Result, SasError};
use crate::math::special::sinc;
use crate::series::{Role, Series};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPoint {
    pub pos: Vector3<f64>,
    pub b: f64,
    /// Index into the amplitude table; ignored without a table.
    pub ff: usize,
}

impl CloudPoint {
    pub fn new(pos: Vector3<f64>, b: f64) -> Self {
        Self { pos, b, ff: 0 }
    }

    pub fn with_ff(mut self, ff: usize) -> Self {
        self.ff = ff;
        self
    }
}

/// Normalised amplitudes `f_k(q)` sampled on the same q grid as the result.
#[derive(Debug, Clone, Default)]
pub struct Amplitudes {
    table: Vec<Vec<f64>>,
}

impl Amplitudes {
    /// Each row is normalised by its q = 0 value (`f0`).
    pub fn new(rows: Vec<Vec<f64>>, f0: &[f64]) -> Result<Self> {
        if rows.len() != f0.len() {
            return Err(SasError::config("one forward amplitude per amplitude row is needed"));
        }
        let table = rows
            .into_iter()
            .zip(f0)
            .map(|(row, &norm)| {
                if norm == 0.0 {
                    Err(SasError::config("amplitude with zero forward value cannot be normalised"))
                } else {
                    Ok(row.into_iter().map(|v| v / norm).collect())
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { table })
    }

    fn check(&self, points: &[CloudPoint], nq: usize) -> Result<()> {
        if let Some(row) = self.table.iter().find(|r| r.len() != nq) {
            return Err(SasError::config(format!("amplitude row has {} values for {nq} q values", row.len())));
        }
        if let Some(p) = points.iter().find(|p| p.ff >= self.table.len()) {
            return Err(SasError::config(format!("cloud point refers to missing amplitude {}", p.ff)));
        }
        Ok(())
    }

    fn get(&self, ff: usize, iq: usize) -> f64 {
        self.table.get(ff).map_or(1.0, |row| row[iq])
    }
}

/// Unit vectors of a Fibonacci lattice with `2n + 1` points on the sphere.
pub fn fibonacci_sphere(n: usize) -> Vec<Vector3<f64>> {
    let golden = (1.0 + 5f64.sqrt()) / 2.0;
    let total = 2 * n + 1;
    (0..total)
        .map(|k| {
            let i = k as f64 - n as f64;
            let z = 2.0 * i / total as f64;
            let phi = 2.0 * std::f64::consts::PI * i / golden;
            let s = (1.0 - z * z).max(0.0).sqrt();
            Vector3::new(s * phi.cos(), s * phi.sin(), z)
        })
        .collect()
}

fn sum_b(points: &[CloudPoint]) -> Result<f64> {
    if points.is_empty() {
        return Err(SasError::config("cloud has no points"));
    }
    let total: f64 = points.iter().map(|p| p.b).sum();
    if total == 0.0 {
        return Err(SasError::numerical("cloud has zero total scattering length"));
    }
    Ok(total)
}

/// Debye equation `Σ_ij b_i b_j f_i f_j sin(q r_ij)/(q r_ij) / (Σ b)²`.
///
/// Returns columns `q; Pq` with attributes `I0 = (Σ b)²` and `sumblength`.
pub fn debye(q: &[f64], points: &[CloudPoint], amps: Option<&Amplitudes>) -> Result<Series> {
    let total = sum_b(points)?;
    if let Some(a) = amps {
        a.check(points, q.len())?;
    }
    let pq: Vec<f64> = q
        .iter()
        .enumerate()
        .map(|(iq, &qv)| {
            let bf: Vec<f64> = points
                .iter()
                .map(|p| p.b * amps.map_or(1.0, |a| a.get(p.ff, iq)))
                .collect();
            let mut sum: f64 = bf.iter().map(|v| v * v).sum();
            for i in 0..points.len() {
                for j in i + 1..points.len() {
                    let r = (points[i].pos - points[j].pos).norm();
                    sum += 2.0 * bf[i] * bf[j] * sinc(qv * r);
                }
            }
            sum / (total * total)
        })
        .collect();
    let mut out = Series::new(vec![q.to_vec(), pq])?;
    out.columnname = Some("q; Pq".into());
    out.put("I0", total * total);
    out.put("sumblength", total);
    Ok(out)
}

/// Options of the explicit orientational average.
#[derive(Debug, Clone)]
pub struct AverageOptions {
    /// Directions are a Fibonacci lattice of `2·n + 1` points.
    pub n: usize,
    /// Root mean square of Gaussian position displacements, redrawn for
    /// every direction.
    pub rms: f64,
    pub seed: u64,
}

impl Default for AverageOptions {
    fn default() -> Self {
        Self {
            n: 50,
            rms: 0.0,
            seed: 137,
        }
    }
}

/// Explicit average over directions.
///
/// Returns columns `q; Pq; beta; fa` normalised to `Pq(0) = 1` and the
/// attributes `I0` and `sumblength`.
pub fn orientational_average(
    q: &[f64],
    points: &[CloudPoint],
    amps: Option<&Amplitudes>,
    opts: &AverageOptions,
) -> Result<Series> {
    let total = sum_b(points)?;
    if let Some(a) = amps {
        a.check(points, q.len())?;
    }
    if opts.rms < 0.0 {
        return Err(SasError::config("rms displacement must not be negative"));
    }
    let dirs = fibonacci_sphere(opts.n.max(1));
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let normal = Normal::new(0.0, opts.rms).map_err(|e| SasError::config(e.to_string()))?;

    let nq = q.len();
    let mut fq = vec![0.0; nq];
    let mut fa = vec![Complex64::new(0.0, 0.0); nq];
    for dir in &dirs {
        let proj: Vec<f64> = points
            .iter()
            .map(|p| {
                let pos = if opts.rms > 0.0 {
                    p.pos + Vector3::new(normal.sample(&mut rng), normal.sample(&mut rng), normal.sample(&mut rng))
                } else {
                    p.pos
                };
                dir.dot(&pos)
            })
            .collect();
        for (iq, &qv) in q.iter().enumerate() {
            let amp: Complex64 = points
                .iter()
                .zip(&proj)
                .map(|(p, &x)| Complex64::from_polar(p.b * amps.map_or(1.0, |a| a.get(p.ff, iq)), qv * x))
                .sum::<Complex64>()
                / total;
            fq[iq] += amp.norm_sqr();
            fa[iq] += amp;
        }
    }
    let n = dirs.len() as f64;
    let pq: Vec<f64> = fq.iter().map(|v| v / n).collect();
    let mean: Vec<Complex64> = fa.iter().map(|v| *v / n).collect();
    let beta: Vec<f64> = mean
        .iter()
        .zip(&pq)
        .map(|(m, p)| if *p > 0.0 { m.norm_sqr() / p } else { 1.0 })
        .collect();
    let fa_real: Vec<f64> = mean.iter().map(|m| m.re).collect();

    let mut out = Series::new(vec![q.to_vec(), pq, beta, fa_real])?;
    out.set_role(Role::EY, None)?;
    out.columnname = Some("q; Pq; beta; fa".into());
    out.put("I0", total * total);
    out.put("sumblength", total);
    out.put("directions", n);
    Ok(out)
}

/// Points of a simple cubic grid with spacing `d` filling `[-half, half]³`.
pub fn cubic_grid(half: f64, d: f64) -> Vec<Vector3<f64>> {
    let n = (half / d).floor() as i64;
    let mut out = Vec::new();
    for i in -n..=n {
        for j in -n..=n {
            for k in -n..=n {
                out.push(Vector3::new(i as f64 * d, j as f64 * d, k as f64 * d));
            }
        }
    }
    out
}

/// `count` quasi-random points in `[-half, half]³` from the additive
/// R3 sequence (low discrepancy, reproducible).
pub fn quasi_random_box(half: f64, count: usize) -> Vec<Vector3<f64>> {
    quasi_random_cuboid(Vector3::new(half, half, half), count)
}

/// Quasi-random points in the cuboid `[-half.x, half.x] × …`.
pub fn quasi_random_cuboid(half: Vector3<f64>, count: usize) -> Vec<Vector3<f64>> {
    // Plastic-number generalisation of the golden ratio for 3-D.
    let g = 1.220_744_084_605_759_5_f64;
    let alpha = [1.0 / g, 1.0 / (g * g), 1.0 / (g * g * g)];
    (1..=count)
        .map(|n| {
            let c = |a: f64, h: f64| ((0.5 + a * n as f64).fract() * 2.0 - 1.0) * h;
            Vector3::new(c(alpha[0], half.x), c(alpha[1], half.y), c(alpha[2], half.z))
        })
        .collect()
}

/// Uniform pseudo-random points in a cuboid from a seeded generator.
pub fn random_cuboid(half: Vector3<f64>, count: usize, seed: u64) -> Vec<Vector3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-1.0..=1.0) * half.x,
                rng.gen_range(-1.0..=1.0) * half.y,
                rng.gen_range(-1.0..=1.0) * half.z,
            )
        })
        .collect()
}

/// Face-centred cubic lattice with cubic cell `a` covering the cuboid
/// `[-half.x, half.x] × …`. Nearest neighbours are `a/√2` apart.
pub fn fcc_grid(a: f64, half: Vector3<f64>) -> Vec<Vector3<f64>> {
    let basis = [
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.5, 0.5, 0.0),
        Vector3::new(0.5, 0.0, 0.5),
        Vector3::new(0.0, 0.5, 0.5),
    ];
    let n = |h: f64| (h / a).ceil() as i64;
    let (nx, ny, nz) = (n(half.x), n(half.y), n(half.z));
    let mut out = Vec::new();
    for i in -nx..=nx {
        for j in -ny..=ny {
            for k in -nz..=nz {
                for b in &basis {
                    let p = (Vector3::new(i as f64, j as f64, k as f64) + b) * a;
                    if p.x.abs() <= half.x && p.y.abs() <= half.y && p.z.abs() <= half.z {
                        out.push(p);
                    }
                }
            }
        }
    }
    out
}
