//! Powder structure factor of a finite-size crystal.
//!
//! Bragg peaks of the radial reciprocal lattice are broadened to Voigt
//! profiles of width `2π/domainsize`, weighted by multiplicity and unit-cell
//! structure factor and combined with a Debye–Waller factor:
//!
//! ```text
//! Z0(q) = (2π)^(d-1) c / (n v_d q^(d-1)) Σ m_hkl |F_hkl|² L_hkl(q) / Σ b²
//! S(q)  = 1 + β(q) (Z0(q) − 1) exp(−q² rmsd²)
//! ```

use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::{Result, SasError};
use crate::lattice::Lattice;
use crate::math::faddeeva::voigt;
use crate::math::grid::linspace;
use crate::series::{interp_linear, Role, Series};

/// Intensity corrections for a given wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Thomson polarisation `(1 + cos²θ)/2`.
    Polarisation,
    /// Lorentz factor `1/sin θ`.
    Lorentz,
    /// Detector area element `1/sin θ`.
    Area,
    /// Lorentz-type `cos(θ/2)`.
    Lh,
}

impl Correction {
    pub const ALL: [Correction; 4] = [Correction::Polarisation, Correction::Lh, Correction::Lorentz, Correction::Area];

    /// Parse a comma separated list; `all` selects every correction.
    pub fn parse_list(s: &str) -> Result<Vec<Correction>> {
        let mut out = Vec::new();
        for word in s.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            if word.eq_ignore_ascii_case("all") {
                return Ok(Correction::ALL.to_vec());
            }
            let c = word.parse()?;
            if !out.contains(&c) {
                out.push(c);
            }
        }
        Ok(out)
    }
}

impl FromStr for Correction {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TP" | "tp" => Ok(Correction::Polarisation),
            "LC" | "lc" => Ok(Correction::Lorentz),
            "area" => Ok(Correction::Area),
            "lh" => Ok(Correction::Lh),
            other => Err(SasError::config(format!("unknown lattice correction '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatticeOptions {
    /// Domain size in nm, sets the peak width `2π/domainsize`.
    pub domainsize: f64,
    pub asym: f64,
    /// Lorentzian/Gaussian ratio of the peaks.
    pub lg: f64,
    /// Root mean square displacement for the Debye–Waller factor.
    pub rmsd: f64,
    /// Asymmetry factor of the particle form factor, interpolated at q. 1 if absent.
    pub beta: Option<Series>,
    pub hklmax: usize,
    /// Volume fraction scale of the crystal.
    pub c: f64,
    /// Wavelength in nm; enables `corrections` and the `TPf; theta` columns.
    pub wavelength: Option<f64>,
    pub corrections: Vec<Correction>,
}

impl Default for LatticeOptions {
    fn default() -> Self {
        Self {
            domainsize: 1000.0,
            asym: 0.0,
            lg: 1.0,
            rmsd: 0.02,
            beta: None,
            hklmax: 7,
            c: 1.0,
            wavelength: None,
            corrections: Vec::new(),
        }
    }
}

impl LatticeOptions {
    pub fn domainsize(mut self, v: f64) -> Self {
        self.domainsize = v;
        self
    }

    pub fn asym(mut self, v: f64) -> Self {
        self.asym = v;
        self
    }

    pub fn lg(mut self, v: f64) -> Self {
        self.lg = v;
        self
    }

    pub fn rmsd(mut self, v: f64) -> Self {
        self.rmsd = v;
        self
    }

    pub fn beta(mut self, beta: Series) -> Self {
        self.beta = Some(beta);
        self
    }

    pub fn hklmax(mut self, v: usize) -> Self {
        self.hklmax = v;
        self
    }

    pub fn wavelength(mut self, wavelength: f64, corrections: Vec<Correction>) -> Self {
        self.wavelength = Some(wavelength);
        self.corrections = corrections;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.domainsize > 0.0) {
            return Err(SasError::config("domainsize must be positive"));
        }
        if matches!(self.wavelength, Some(w) if !(w > 0.0)) {
            return Err(SasError::config("wavelength must be positive"));
        }
        Ok(())
    }
}

/// Structure factor of `lattice` for powder averaging.
///
/// Columns `q; Sq; DW; beta; Z0q`, plus `TPf; theta` when a wavelength is
/// set; in that case `Sq` includes the selected corrections.
pub fn lattice_structure_factor(q: &[f64], lattice: &Lattice, opts: &LatticeOptions) -> Result<Series> {
    opts.validate()?;
    let qmin_pos = q.iter().copied().filter(|v| *v > 0.0).fold(f64::INFINITY, f64::min);
    let floor = if qmin_pos.is_finite() { qmin_pos * 1e-4 } else { 1e-8 };
    let qq: Vec<f64> = q.iter().map(|&v| if v == 0.0 { floor } else { v }).collect();

    let n = lattice.atom_count() as f64;
    let vd = lattice.unit_cell_volume();
    let dim = lattice.dim() as i32;
    let sumb2: f64 = lattice.b().iter().map(|b| b * b).sum();
    if !(sumb2 > 0.0) {
        return Err(SasError::config("lattice scattering lengths are all zero"));
    }
    let peaks = lattice.radial_reciprocal_lattice(opts.hklmax);
    let fwhm = 2.0 * PI / opts.domainsize;

    let z0q: Vec<f64> = qq
        .iter()
        .map(|&x| {
            let sum: f64 = peaks
                .q
                .iter()
                .zip(&peaks.f2)
                .zip(&peaks.multiplicity)
                .map(|((qr, f2), m)| *m as f64 * f2 * voigt(x, *qr, fwhm, opts.lg, opts.asym, 1.0))
                .sum();
            sum * (2.0 * PI).powi(dim - 1) * opts.c / n / vd / x.powi(dim - 1) / sumb2
        })
        .collect();

    let beta = match &opts.beta {
        Some(b) => b.interp(q),
        None => vec![1.0; q.len()],
    };
    let dw: Vec<f64> = q.iter().map(|x| (-x * x * opts.rmsd * opts.rmsd).exp()).collect();
    let sq: Vec<f64> = (0..q.len()).map(|i| 1.0 + beta[i] * (z0q[i] - 1.0) * dw[i]).collect();

    let mut out = match opts.wavelength {
        None => {
            let mut s = Series::new(vec![q.to_vec(), sq, dw, beta, z0q])?;
            s.columnname = Some("q; Sq; DW; beta; Z0q".into());
            s
        }
        Some(wavelength) => {
            let theta: Vec<f64> = qq.iter().map(|x| 2.0 * (x * wavelength / 4.0 / PI).clamp(-1.0, 1.0).asin()).collect();
            let factor: Vec<f64> = theta.iter().map(|t| correction_factor(*t, &opts.corrections)).collect();
            let corrected = sq.iter().zip(&factor).map(|(s, f)| s * f).collect();
            let mut s = Series::new(vec![q.to_vec(), corrected, dw, beta, z0q, factor, theta])?;
            s.columnname = Some("q; Sq; DW; beta; Z0q; TPf; theta".into());
            s.put("Braggtheta", lattice.scattering_angles(Some(wavelength), opts.hklmax));
            s
        }
    };
    out.set_role(Role::EY, None)?;
    out.put("q_hkl", peaks.q.clone());
    out.put("fhkl", peaks.f2.clone());
    out.put("mhkl", peaks.multiplicity.iter().map(|m| *m as f64).collect::<Vec<_>>());
    out.put("hkl", peaks.hkl.iter().flat_map(|h| h.map(f64::from)).collect::<Vec<_>>());
    out.put("sumfi2", sumb2);
    out.put("latticeconstants", lattice.lattice_constants());
    out.put("lattice", lattice.kind().name());
    out.put("peakFWHM", fwhm);
    out.put("peaksigma", fwhm / (2.0 * (2.0 * 2f64.ln()).sqrt()));
    out.put("peakAsymmetry", opts.asym);
    out.put("domainsize", opts.domainsize);
    out.put("rmsd", opts.rmsd);
    out.put("lorenzianOverGaussian", opts.lg);
    Ok(out.with_modelname("lattice_structure_factor"))
}

fn correction_factor(theta: f64, corrections: &[Correction]) -> f64 {
    corrections.iter().fold(1.0, |acc, c| match c {
        Correction::Polarisation => acc * (1.0 + theta.cos().powi(2)) / 2.0,
        Correction::Lorentz | Correction::Area => acc / theta.sin(),
        Correction::Lh => acc * (theta / 2.0).cos(),
    })
}

/// Lattice structure factor at arbitrary `|q|` values (e.g. every detector
/// pixel). It is evaluated on a regular grid up to `max |q|` and linearly
/// interpolated.
pub fn radial_structure_factor(qr: &[f64], lattice: &Lattice, opts: &LatticeOptions) -> Result<Vec<f64>> {
    let qmax = qr.iter().copied().fold(0.0, f64::max);
    if !(qmax > 0.0) {
        return Err(SasError::config("no positive q value to evaluate the lattice at"));
    }
    let npoints = ((2.0 * ((qr.len() + 3) as f64 / 2.0).sqrt()) as usize).max(512);
    let grid = linspace(0.0, qmax, npoints);
    let lsf = lattice_structure_factor(&grid, lattice, opts)?;
    let (x, y) = (lsf.x(), lsf.y());
    Ok(qr.iter().map(|v| interp_linear(x, y, *v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quadrature::trapz;
    use approx::assert_relative_eq;

    #[test]
    fn corrections_parse() {
        assert_eq!(Correction::parse_list("TP, lh").unwrap(), vec![Correction::Polarisation, Correction::Lh]);
        assert_eq!(Correction::parse_list("all").unwrap().len(), 4);
        assert!(Correction::parse_list("TP,xx").is_err());
        assert!(Correction::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn lamellar_peak_area() {
        // Gaussian peaks, one order of a lamellar stack integrates to m c/(n d Σb²).
        let d = 10.0;
        let lattice = Lattice::lamellar(d).unwrap();
        let opts = LatticeOptions::default().lg(0.0).domainsize(200.0).rmsd(0.0);
        let q0 = 2.0 * PI / d;
        let q = linspace(q0 - 0.3, q0 + 0.3, 3001);
        let sf = lattice_structure_factor(&q, &lattice, &opts).unwrap();
        let z0 = sf.column(4).unwrap();
        assert_relative_eq!(trapz(z0, &q), 2.0 / d, max_relative = 0.02);
        assert_eq!(sf.columnname.as_deref(), Some("q; Sq; DW; beta; Z0q"));
        assert!(sf.ey().is_none());
    }

    #[test]
    fn structure_factor_shape() {
        let lattice = Lattice::sc(5.0).unwrap();
        let q0 = 2.0 * PI / 5.0;
        let q = linspace(0.01, 3.0, 600);
        let opts = LatticeOptions::default().domainsize(100.0).lg(0.0);
        let sf = lattice_structure_factor(&q, &lattice, &opts).unwrap();
        let sq = sf.y();
        // no correlation below the first peak
        assert!(sq[0] < 0.05);
        let peak = sq
            .iter()
            .cloned()
            .enumerate()
            .take_while(|(i, _)| q[*i] < 1.5)
            .fold((0, f64::MIN), |a, b| if b.1 > a.1 { b } else { a });
        assert!((q[peak.0] - q0).abs() < 0.02);
        assert!(peak.1 > 1.0);
        assert_eq!(sf.attr("mhkl").and_then(|a| a.as_list()).unwrap()[0], 6.0);
    }

    #[test]
    fn debye_waller_recovers_unity() {
        let lattice = Lattice::fcc(3.0).unwrap();
        let q = [30.0, 40.0];
        let sf = lattice_structure_factor(&q, &lattice, &LatticeOptions::default().rmsd(1.0)).unwrap();
        for s in sf.y() {
            assert!((s - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn wavelength_adds_columns() {
        let lattice = Lattice::agbe();
        let q = linspace(0.5, 3.0, 50);
        let opts = LatticeOptions::default().wavelength(0.154, vec![Correction::Polarisation]);
        let sf = lattice_structure_factor(&q, &lattice, &opts).unwrap();
        assert_eq!(sf.ncols(), 7);
        let theta = sf.column(6).unwrap();
        assert_relative_eq!(theta[0], 2.0 * (0.5 * 0.154 / 4.0 / PI).asin(), max_relative = 1e-12);
        let tpf = sf.column(5).unwrap();
        assert_relative_eq!(tpf[0], (1.0 + theta[0].cos().powi(2)) / 2.0, max_relative = 1e-12);
        assert!(sf.attr("Braggtheta").is_some());
        assert!(lattice_structure_factor(&q, &lattice, &LatticeOptions::default().domainsize(0.0)).is_err());
    }

    #[test]
    fn radial_matches_direct_evaluation() {
        let lattice = Lattice::agbe();
        let opts = LatticeOptions::default().domainsize(50.0);
        let qr: Vec<f64> = (0..2000).map(|i| 0.1 + i as f64 * 2.5 / 2000.0).collect();
        let fast = radial_structure_factor(&qr, &lattice, &opts).unwrap();
        let direct = lattice_structure_factor(&qr, &lattice, &opts).unwrap();
        for ((q, a), b) in qr.iter().zip(&fast).zip(direct.y()) {
            assert!((a - b).abs() < 0.02 * b.abs().max(0.1), "q={q} {a} {b}");
        }
        assert!(radial_structure_factor(&[0.0], &lattice, &opts).is_err());
    }
}
