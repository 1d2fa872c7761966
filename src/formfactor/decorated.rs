//! Particles decorated with or filled by small droplets.
//!
//! Droplets are point scatterers with their own normalised amplitude; the
//! host particle contributes one extra point at the origin carrying its
//! analytic amplitude. The orientational average runs over a Fibonacci
//! lattice of directions (see [`cloud`](crate::formfactor::cloud)).

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::str::FromStr;

use nalgebra::Vector3;

use crate::error::{Result, SasError};
use crate::formfactor::cloud::{
    fcc_grid, fibonacci_sphere, orientational_average, quasi_random_cuboid, random_cuboid, Amplitudes,
    AverageOptions, CloudPoint,
};
use crate::formfactor::cylinder::{orientation_average, CylinderShells, Orientation};
use crate::formfactor::sphere::{fa_sphere, multi_shell_sphere, sphere, Shell};
use crate::formfactor::model_series;
use crate::series::Series;

/// Amplitude shape of a single droplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropShape {
    #[default]
    Sphere,
    /// Gaussian blob with the volume of the droplet sphere.
    Gauss,
    /// Gaussian coil with radius of gyration equal to the droplet radius.
    Coil,
}

impl FromStr for DropShape {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drop" | "sphere" => Ok(Self::Sphere),
            "gauss" => Ok(Self::Gauss),
            "coil" => Ok(Self::Coil),
            other => Err(SasError::config(format!("unknown droplet shape '{other}'"))),
        }
    }
}

impl DropShape {
    fn amplitude(self, q: f64, r: f64) -> f64 {
        match self {
            DropShape::Sphere => fa_sphere(q * r),
            DropShape::Gauss => {
                let v = 4.0 / 3.0 * PI * r.powi(3);
                (-q * q * v.powf(2.0 / 3.0) / (4.0 * PI)).exp()
            }
            DropShape::Coil => {
                let x = (q * r).powi(2);
                if x < 1e-12 { 1.0 } else { (1.0 - (-x).exp()) / x }
            }
        }
    }
}

/// How droplet centres fill a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropDistribution {
    Fcc,
    Random,
    #[default]
    QuasiRandom,
}

impl FromStr for DropDistribution {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fcc" => Ok(Self::Fcc),
            "random" => Ok(Self::Random),
            "quasirandom" => Ok(Self::QuasiRandom),
            other => Err(SasError::config(format!("unknown droplet distribution '{other}'"))),
        }
    }
}

const DROP_SEED: u64 = 137;

/// Candidate droplet centres in the cuboid `±half` with mean spacing `d`.
fn drop_centres(distribution: DropDistribution, half: Vector3<f64>, d: f64) -> Vec<Vector3<f64>> {
    let count = || (8.0 * half.x * half.y * half.z / d.powi(3)) as usize;
    match distribution {
        DropDistribution::Fcc => fcc_grid(d * 2f64.sqrt(), half),
        DropDistribution::Random => random_cuboid(half, count(), DROP_SEED),
        DropDistribution::QuasiRandom => quasi_random_cuboid(half, count()),
    }
}

/// Core (and optional shell) amplitude of a spherical host.
fn host_sphere(q: &[f64], rcore: f64, core: f64, shell: f64, shell_sld: f64, solvent: f64) -> Result<Series> {
    if shell > 0.0 && shell_sld != solvent {
        if rcore == 0.0 {
            sphere(q, shell, shell_sld - solvent)
        } else {
            multi_shell_sphere(q, &[Shell::constant(rcore, core), Shell::constant(shell, shell_sld)], solvent)
        }
    } else {
        sphere(q, rcore, core - solvent)
    }
}

/// Droplet points with amplitude index 0 plus the host point at the origin.
fn host_cloud(
    q: &[f64],
    mut points: Vec<CloudPoint>,
    droplet: Vec<f64>,
    host: &Series,
    directions: usize,
    rms: f64,
) -> Result<(Series, Vec<f64>)> {
    let fa0 = host.attr_f64("fa0").unwrap_or(0.0);
    let host_fa = host.column(2).map(<[f64]>::to_vec).unwrap_or_default();
    let mut rows = vec![droplet];
    let mut f0 = vec![1.0];
    if fa0 != 0.0 {
        points.push(CloudPoint::new(Vector3::zeros(), fa0).with_ff(1));
        rows.push(host_fa.clone());
        f0.push(fa0);
    }
    let amps = Amplitudes::new(rows, &f0)?;
    let opts = AverageOptions {
        n: directions,
        rms,
        ..Default::default()
    };
    let mut cloud = orientational_average(q, &points, Some(&amps), &opts)?;
    let i0 = cloud.attr_f64("I0").unwrap_or(1.0);
    if let Some(y) = cloud.y_mut() {
        y.iter_mut().for_each(|v| *v *= i0);
    }
    Ok((cloud, host_fa.iter().map(|v| v * v).collect()))
}

/// Shape of droplets on a decorated core-shell particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decoration {
    /// Full spheres; overlaps with core or shell take the droplet SLD.
    #[default]
    Drop,
    /// Only the part of each droplet outside the shell.
    CutDrop,
    /// Disc-like inclusions filling the shell below each droplet centre.
    Disc,
}

impl FromStr for Decoration {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drop" => Ok(Self::Drop),
            "cutdrop" => Ok(Self::CutDrop),
            "disc" => Ok(Self::Disc),
            other => Err(SasError::config(format!("unknown decoration type '{other}'"))),
        }
    }
}

/// Parameters of [`decorated_core_shell`].
#[derive(Debug, Clone)]
pub struct DecoratedCoreShell {
    pub rcore: f64,
    pub rdrop: f64,
    pub ndrop: usize,
    /// Distance of droplet centres above the shell surface.
    pub hdrop: f64,
    pub core_sld: f64,
    pub shell_thickness: f64,
    pub shell_sld: f64,
    pub drop_sld: f64,
    pub solvent_sld: f64,
    pub kind: Decoration,
    /// Fibonacci placement of droplet centres; otherwise quasi-random.
    pub fibonacci: bool,
    /// Grid points per droplet radius.
    pub resolution: usize,
    /// Directions of the orientational average are `2·n + 1`.
    pub directions: usize,
}

impl Default for DecoratedCoreShell {
    fn default() -> Self {
        Self {
            rcore: 10.0,
            rdrop: 2.0,
            ndrop: 20,
            hdrop: 0.0,
            core_sld: 1.0,
            shell_thickness: 0.0,
            shell_sld: 0.0,
            drop_sld: 1.0,
            solvent_sld: 0.0,
            kind: Decoration::Drop,
            fibonacci: true,
            resolution: 5,
            directions: 100,
        }
    }
}

/// Unit vectors of `count` droplet centres on a sphere.
fn surface_directions(count: usize, fibonacci: bool) -> Vec<Vector3<f64>> {
    if fibonacci {
        let nn = count / 2;
        let mut pts = fibonacci_sphere(nn);
        if pts.len() > count {
            pts.remove(nn / 2);
        }
        pts
    } else {
        // Golden-ratio sequence mapped onto the sphere with equal-area z.
        let g = (1.0 + 5f64.sqrt()) / 2.0;
        (0..count)
            .map(|k| {
                let z = 1.0 - 2.0 * ((k as f64 + 0.5) / count as f64);
                let phi = 2.0 * PI * (k as f64 / g).fract();
                let s = (1.0 - z * z).sqrt();
                Vector3::new(s * phi.cos(), s * phi.sin(), z)
            })
            .collect()
    }
}

/// Core-shell sphere decorated with droplets at the surface.
///
/// Droplets are discretised on a cubic grid of spacing `rdrop/resolution`.
/// Columns `q; Iq; beta; fa; cs_fq` where `cs_fq` is the undecorated host.
pub fn decorated_core_shell(q: &[f64], p: &DecoratedCoreShell) -> Result<Series> {
    if p.rdrop <= 0.0 || p.ndrop == 0 || p.resolution == 0 {
        return Err(SasError::config("decorated core-shell needs droplets of positive radius"));
    }
    let core = p.core_sld - p.solvent_sld;
    let shell = p.shell_sld - p.solvent_sld;
    let drop = p.drop_sld - p.solvent_sld;
    let rshell = p.rcore + p.shell_thickness;
    let host = host_sphere(q, p.rcore, p.core_sld, p.shell_thickness, p.shell_sld, p.solvent_sld)?;

    let dnn = p.rdrop / p.resolution as f64;
    let cell = dnn.powi(3);
    let dirs = surface_directions(p.ndrop, p.fibonacci);
    let mut cells: BTreeSet<(i64, i64, i64)> = BTreeSet::new();
    for dir in &dirs {
        let (centre, half) = match p.kind {
            Decoration::Drop | Decoration::CutDrop => (dir * (rshell + p.hdrop), p.rdrop),
            Decoration::Disc => (dir * (p.rcore + p.shell_thickness / 2.0), 2.0 * p.rdrop + p.shell_thickness),
        };
        let lo = ((centre.map(|c| c - half)) / dnn).map(f64::floor);
        let hi = ((centre.map(|c| c + half)) / dnn).map(f64::ceil);
        for i in lo.x as i64..=hi.x as i64 {
            for j in lo.y as i64..=hi.y as i64 {
                for k in lo.z as i64..=hi.z as i64 {
                    let pt = Vector3::new(i as f64, j as f64, k as f64) * dnn;
                    let r = pt.norm();
                    let inside = match p.kind {
                        Decoration::Drop => (pt - centre).norm() <= p.rdrop,
                        Decoration::CutDrop => (pt - centre).norm() <= p.rdrop && r > rshell,
                        Decoration::Disc => {
                            let axial = pt.dot(dir);
                            axial > 0.0
                                && (pt - dir * axial).norm() <= p.rdrop
                                && r >= p.rcore
                                && r <= rshell
                        }
                    };
                    if inside {
                        cells.insert((i, j, k));
                    }
                }
            }
        }
    }
    let points: Vec<CloudPoint> = cells
        .into_iter()
        .filter_map(|(i, j, k)| {
            let pt = Vector3::new(i as f64, j as f64, k as f64) * dnn;
            let r = pt.norm();
            let contrast = match p.kind {
                Decoration::Drop if r <= p.rcore => drop - core,
                Decoration::Drop if r <= rshell => drop - shell,
                Decoration::Drop | Decoration::CutDrop => drop,
                Decoration::Disc => drop - shell,
            };
            let b = contrast * cell;
            (b != 0.0).then(|| CloudPoint::new(pt, b))
        })
        .collect();
    let ndrop_points = points.len();
    let (mut out, cs_fq) = host_cloud(q, points, vec![1.0; q.len()], &host, p.directions, 0.0)?;
    out.push_column(cs_fq)?;
    out.columnname = Some("q; Iq; beta; fa; cs_fq".into());
    out.modelname = Some("decoratedCoreShell".into());
    out.put("Rcore", p.rcore);
    out.put("Ndrops", p.ndrop as f64);
    out.put("Rdrop", p.rdrop);
    out.put("Hdrop", p.hdrop);
    out.put("shellthickness", p.shell_thickness);
    out.put("coreSLD", p.core_sld);
    out.put("shellSLD", p.shell_sld);
    out.put("dropSLD", p.drop_sld);
    out.put("solventSLD", p.solvent_sld);
    out.put("gridpoints", ndrop_points as f64);
    out.put("dropSurfaceFraction", p.ndrop as f64 * p.rdrop.powi(2) / (4.0 * (rshell + p.hdrop).powi(2)));
    Ok(out)
}

/// Region of an inhomogeneous sphere that holds droplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropRegion {
    #[default]
    Core,
    Shell,
    CoreShell,
}

impl FromStr for DropRegion {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "core" => Ok(Self::Core),
            "shell" => Ok(Self::Shell),
            "coreshell" | "core+shell" => Ok(Self::CoreShell),
            other => Err(SasError::config(format!("unknown droplet region '{other}'"))),
        }
    }
}

/// Parameters of [`inhomogeneous_sphere`].
#[derive(Debug, Clone)]
pub struct InhomogeneousSphere {
    pub rcore: f64,
    pub rdrop: f64,
    /// Mean distance between droplet centres.
    pub ddrops: f64,
    pub core_sld: f64,
    pub drop_sld: f64,
    pub solvent_sld: f64,
    pub shell_thickness: f64,
    pub shell_sld: f64,
    pub shape: DropShape,
    pub region: DropRegion,
    pub distribution: DropDistribution,
    pub rms: f64,
    pub directions: usize,
}

impl Default for InhomogeneousSphere {
    fn default() -> Self {
        Self {
            rcore: 20.0,
            rdrop: 2.0,
            ddrops: 6.0,
            core_sld: 1.0,
            drop_sld: 2.0,
            solvent_sld: 0.0,
            shell_thickness: 0.0,
            shell_sld: 0.0,
            shape: DropShape::Sphere,
            region: DropRegion::Core,
            distribution: DropDistribution::QuasiRandom,
            rms: 0.0,
            directions: 100,
        }
    }
}

/// Sphere (optionally core-shell) filled with droplets.
/// Columns `q; Iq; beta; fa; sphere_fq` where `sphere_fq` is the host alone.
pub fn inhomogeneous_sphere(q: &[f64], p: &InhomogeneousSphere) -> Result<Series> {
    if p.rcore <= 0.0 || p.rdrop <= 0.0 || p.ddrops <= 0.0 {
        return Err(SasError::config("inhomogeneous sphere radii and droplet distance must be > 0"));
    }
    let shell = p.shell_thickness.max(0.0);
    let (ri, ro) = match p.region {
        _ if shell == 0.0 => (0.0, p.rcore),
        DropRegion::Core => (0.0, p.rcore),
        DropRegion::Shell => (p.rcore, p.rcore + shell),
        DropRegion::CoreShell => (0.0, p.rcore + shell),
    };
    let host = host_sphere(q, p.rcore, p.core_sld, shell, p.shell_sld, p.solvent_sld)?;
    let v = 4.0 / 3.0 * PI * p.rdrop.powi(3);
    let half = Vector3::repeat(if p.distribution == DropDistribution::Fcc { ro * 1.2 } else { ro });
    let points: Vec<CloudPoint> = drop_centres(p.distribution, half, p.ddrops)
        .into_iter()
        .filter(|c| {
            let r = c.norm();
            r <= ro && (ri == 0.0 || r > ri)
        })
        .filter_map(|c| {
            let contrast = if shell > 0.0 && c.norm() > p.rcore {
                p.drop_sld - p.shell_sld
            } else {
                p.drop_sld - p.core_sld
            };
            let b = contrast * v;
            (b != 0.0).then(|| CloudPoint::new(c, b))
        })
        .collect();
    let ndrops = points.len();
    let droplet = q.iter().map(|&x| p.shape.amplitude(x, p.rdrop)).collect();
    let (mut out, sphere_fq) = host_cloud(q, points, droplet, &host, p.directions, p.rms)?;
    out.push_column(sphere_fq)?;
    out.columnname = Some("q; Iq; beta; fa; sphere_fq".into());
    out.modelname = Some("inhomogeneousSphere".into());
    out.put("Rcore", p.rcore);
    out.put("Ndrops", ndrops as f64);
    out.put("Rdrop", p.rdrop);
    out.put("coreSLD", p.core_sld);
    out.put("dropSLD", p.drop_sld);
    out.put("shellSLD", p.shell_sld);
    out.put("solventSLD", p.solvent_sld);
    out.put("shellthickness", shell);
    out.put("dropVolumeFraction", ndrops as f64 * p.rdrop.powi(3) / p.rcore.powi(3));
    Ok(out)
}

/// Parameters of [`inhomogeneous_cylinder`].
#[derive(Debug, Clone)]
pub struct InhomogeneousCylinder {
    pub rcore: f64,
    pub length: f64,
    pub rdrop: f64,
    pub ddrops: f64,
    pub core_sld: f64,
    pub drop_sld: f64,
    pub solvent_sld: f64,
    pub shell_thickness: f64,
    pub shell_sld: f64,
    /// Spherical end caps (see [`multi_shell_cylinder`](crate::formfactor::multi_shell_cylinder)).
    pub cap_height: Option<f64>,
    pub shape: DropShape,
    pub distribution: DropDistribution,
    /// RMS droplet displacement, applied as a Debye–Waller factor.
    pub rms: f64,
    pub nalpha: usize,
    /// Azimuthal directions per axis angle.
    pub nphi: usize,
}

impl Default for InhomogeneousCylinder {
    fn default() -> Self {
        Self {
            rcore: 10.0,
            length: 50.0,
            rdrop: 2.0,
            ddrops: 6.0,
            core_sld: 1.0,
            drop_sld: 2.0,
            solvent_sld: 0.0,
            shell_thickness: 0.0,
            shell_sld: 0.0,
            cap_height: Some(0.0),
            shape: DropShape::Sphere,
            distribution: DropDistribution::QuasiRandom,
            rms: 0.0,
            nalpha: 57,
            nphi: 37,
        }
    }
}

/// Cylinder with droplets in the core (and caps).
///
/// The droplet amplitude is averaged over `nphi` azimuths before it is
/// added to the cylinder amplitude. Columns `q; fq; fq_cyl; fq_drops`.
pub fn inhomogeneous_cylinder(q: &[f64], p: &InhomogeneousCylinder) -> Result<Series> {
    if p.rcore <= 0.0 || p.length < 0.0 || p.rdrop <= 0.0 || p.ddrops <= 0.0 {
        return Err(SasError::config("inhomogeneous cylinder dimensions must be > 0"));
    }
    let shells = if p.shell_thickness > 0.0 && p.shell_sld != p.solvent_sld {
        vec![(p.rcore, p.core_sld), (p.shell_thickness, p.shell_sld)]
    } else {
        vec![(p.rcore, p.core_sld)]
    };
    let cylinder = CylinderShells::new(&shells, p.solvent_sld)?;
    let cap = p.cap_height.map(|h| (h, 31));
    let rcap = p.cap_height.map_or(0.0, |h| (p.rcore * p.rcore + h * h).sqrt());
    let rmax = rcap.max(p.rcore);
    let half_l = p.length / 2.0;

    let v = 4.0 / 3.0 * PI * p.rdrop.powi(3);
    let b = (p.drop_sld - p.core_sld) * v;
    let inside = |c: &Vector3<f64>| -> bool {
        if c.z.abs() <= half_l {
            return c.x.hypot(c.y) <= p.rcore;
        }
        match p.cap_height {
            Some(h) => (c - Vector3::new(0.0, 0.0, c.z.signum() * (half_l + h))).norm() <= rcap,
            None => false,
        }
    };
    let drops: Vec<Vector3<f64>> = if b == 0.0 {
        Vec::new()
    } else {
        drop_centres(p.distribution, Vector3::new(rmax, rmax, half_l + 2.0 * rmax), p.ddrops)
            .into_iter()
            .filter(inside)
            .collect()
    };
    let droplet: Vec<f64> = q
        .iter()
        .map(|&x| b * p.shape.amplitude(x, p.rdrop) * (-x * x * p.rms * p.rms / 2.0).exp())
        .collect();
    let nq = q.len();
    let nphi = p.nphi.max(1);

    let rows = orientation_average(3 * nq, Orientation::default(), p.nalpha, |alpha| {
        let (sa, ca) = alpha.sin_cos();
        let mut row = vec![0.0; 3 * nq];
        for (i, &x) in q.iter().enumerate() {
            let fc = cylinder.amplitude(x, p.length, alpha, cap);
            let mut fd = 0.0;
            for k in 0..nphi {
                let phi = 2.0 * PI * k as f64 / nphi as f64;
                let dir = Vector3::new(sa * phi.cos(), sa * phi.sin(), ca);
                fd += drops.iter().map(|c| (x * dir.dot(c)).cos()).sum::<f64>();
            }
            fd *= droplet[i] / nphi as f64;
            row[i] = (fc + fd).powi(2);
            row[nq + i] = fc * fc;
            row[2 * nq + i] = fd * fd;
        }
        row
    });
    let fq = rows[..nq].to_vec();
    let fq_cyl = rows[nq..2 * nq].to_vec();
    let fq_drops = rows[2 * nq..].to_vec();

    let mut core_volume = PI * p.rcore * p.rcore * p.length;
    if let Some(h) = p.cap_height {
        let t = rcap + h;
        core_volume += 2.0 * PI * t * t * (3.0 * rcap - t) / 3.0;
    }
    let mut out = model_series(q, vec![fq, fq_cyl, fq_drops], "q; fq; fq_cyl; fq_drops", "inhomogeneousCylinder")?;
    out.put("Rcore", p.rcore);
    out.put("L", p.length);
    out.put("coreVolume", core_volume);
    out.put("shellthickness", p.shell_thickness);
    out.put("Ndrops", drops.len() as f64);
    out.put("Rdrop", p.rdrop);
    out.put("coreSLD", p.core_sld);
    out.put("dropSLD", p.drop_sld);
    out.put("shellSLD", p.shell_sld);
    out.put("solventSLD", p.solvent_sld);
    out.put("dropVolumeFraction", drops.len() as f64 * v / core_volume);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formfactor::multi_shell_cylinder;

    #[test]
    fn option_names_parse() {
        assert_eq!("coil".parse::<DropShape>().unwrap(), DropShape::Coil);
        assert_eq!("fcc".parse::<DropDistribution>().unwrap(), DropDistribution::Fcc);
        assert_eq!("cutdrop".parse::<Decoration>().unwrap(), Decoration::CutDrop);
        assert!("hexagonal".parse::<DropDistribution>().is_err());
    }

    #[test]
    fn droplet_amplitudes_start_at_one() {
        for shape in [DropShape::Sphere, DropShape::Gauss, DropShape::Coil] {
            assert!((shape.amplitude(0.0, 3.0) - 1.0).abs() < 1e-12);
            assert!(shape.amplitude(0.5, 3.0) < 1.0);
        }
    }

    #[test]
    fn fibonacci_placement_gives_requested_count() {
        for n in [1, 2, 7, 20] {
            assert_eq!(surface_directions(n, true).len(), n);
            assert_eq!(surface_directions(n, false).len(), n);
        }
    }

    #[test]
    fn matched_droplets_leave_a_plain_sphere() {
        let q = [0.0, 0.1, 0.3];
        let p = InhomogeneousSphere {
            drop_sld: 1.0,
            core_sld: 1.0,
            ..Default::default()
        };
        let out = inhomogeneous_sphere(&q, &p).unwrap();
        let s = sphere(&q, p.rcore, 1.0).unwrap();
        assert_eq!(out.attr_f64("Ndrops"), Some(0.0));
        for i in 0..q.len() {
            assert!((out.y()[i] - s.y()[i]).abs() < 1e-9 * s.y()[0]);
        }
    }

    #[test]
    fn droplets_raise_forward_scattering() {
        let p = InhomogeneousSphere {
            directions: 20,
            ..Default::default()
        };
        let out = inhomogeneous_sphere(&[0.0], &p).unwrap();
        let n = out.attr_f64("Ndrops").unwrap();
        assert!(n > 0.0);
        let fa0 = 4.0 / 3.0 * PI * 20f64.powi(3);
        let expected = (fa0 + n * 4.0 / 3.0 * PI * 8.0).powi(2);
        assert!((out.y()[0] / expected - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decorating_droplets_have_their_volume() {
        let p = DecoratedCoreShell {
            core_sld: 0.0,
            ndrop: 10,
            rdrop: 2.0,
            hdrop: 3.0,
            directions: 10,
            ..Default::default()
        };
        let out = decorated_core_shell(&[0.0], &p).unwrap();
        let expected = (10.0 * 4.0 / 3.0 * PI * 8.0_f64).powi(2);
        assert!((out.y()[0] / expected - 1.0).abs() < 0.1);
    }

    #[test]
    fn matched_cylinder_droplets_reduce_to_cylinder() {
        let q = [0.01, 0.1, 0.3];
        let p = InhomogeneousCylinder {
            drop_sld: 1.0,
            ..Default::default()
        };
        let out = inhomogeneous_cylinder(&q, &p).unwrap();
        let cyl = multi_shell_cylinder(&q, p.length, &[(p.rcore, 1.0)], 0.0, Orientation::default(), Some(0.0), 57)
            .unwrap();
        for i in 0..q.len() {
            assert!((out.y()[i] - cyl.y()[i]).abs() < 1e-9 * cyl.y()[0]);
            assert_eq!(out.column(3).unwrap()[i], 0.0);
        }
    }

    #[test]
    fn cylinder_droplets_contribute() {
        let p = InhomogeneousCylinder {
            nalpha: 8,
            nphi: 5,
            ..Default::default()
        };
        let out = inhomogeneous_cylinder(&[0.05], &p).unwrap();
        assert!(out.attr_f64("Ndrops").unwrap() > 0.0);
        assert!(out.column(3).unwrap()[0] > 0.0);
    }
}
