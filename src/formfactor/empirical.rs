//! Empirical and correlation-length models.

use std::f64::consts::PI;

use crate::error::{Result, SasError};
use crate::formfactor::{model_series, non_negative};
use crate::math::special::{erf, gamma};
use crate::series::Series;

/// `A·exp(−Rg²q²/3)`.
pub fn guinier(q: &[f64], rg: f64, a: f64) -> Result<Series> {
    let mut out = gen_guinier(q, rg, a, 0)?;
    out.modelname = Some("guinier".into());
    Ok(out)
}

/// Generalised Guinier law for spheres (`alpha = 0`), rods (1) and
/// lamellae (2): `α·π·q^−α · A·exp(−Rg²q²/(3 − α))`.
pub fn gen_guinier(q: &[f64], rg: f64, a: f64, alpha: u8) -> Result<Series> {
    if alpha > 2 {
        return Err(SasError::config(format!("alpha must be 0, 1 or 2, got {alpha}")));
    }
    let al = f64::from(alpha);
    let y = q
        .iter()
        .map(|&x| {
            let pre = if alpha == 0 { 1.0 } else { al * PI * x.powf(-al) };
            pre * a * (-rg * rg * x * x / (3.0 - al)).exp()
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Fq", "genGuinier")?;
    out.put("Rg", rg);
    out.put("A", a);
    out.put("alpha", al);
    Ok(out)
}

/// Beaucage unified exponent/power-law model with Guinier scaling `g` and
/// dimension `d`.
pub fn beaucage(q: &[f64], rg: f64, g: f64, d: f64) -> Result<Series> {
    if rg <= 0.0 {
        return Err(SasError::config("Beaucage radius of gyration must be > 0"));
    }
    let c = g * d / rg.powf(d) * (6.0 * d * d / ((2.0 + d) * (2.0 + 2.0 * d))).powf(d / 2.0) * gamma(d / 2.0);
    let y = q
        .iter()
        .map(|&x| {
            if x == 0.0 {
                g
            } else {
                g * (-x * x * rg * rg / 3.0).exp() + c / x.powf(d) * erf(x * rg / 6f64.sqrt()).powf(3.0 * d)
            }
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Fq", "beaucage")?;
    out.put("GuinierScalingfactor", g);
    out.put("GuinierDimension", d);
    out.put("Rg", rg);
    Ok(out)
}

/// Guinier–Porod model (Hammouda) with a single Guinier region of shape
/// parameter `s` followed by a Porod region of exponent `d`.
pub fn guinier_porod(q: &[f64], rg: f64, s: f64, i0: f64, d: f64) -> Result<Series> {
    if s >= 3.0 || d <= s {
        return Err(SasError::config("Guinier–Porod needs s < 3 and d > s"));
    }
    let q1 = ((d - s) * (3.0 - s) / 2.0).sqrt() / rg;
    let dd = i0 * (-q1 * q1 * rg * rg / (3.0 - s)).exp() * q1.powf(d - s);
    let y = q
        .iter()
        .map(|&x| {
            if x < q1 {
                i0 / x.powf(s) * (-x * x * rg * rg / (3.0 - s)).exp()
            } else {
                dd / x.powf(d)
            }
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Iq", "guinierPorod")?;
    out.put("Rg", rg);
    out.put("s", s);
    out.put("I0", i0);
    out.put("D", dd);
    out.put("d", d);
    Ok(out)
}

/// Guinier–Porod model with two Guinier regions (shape `s2` at low q, `s1`
/// at intermediate q) and a Porod region of exponent `dd`.
pub fn guinier_porod_3d(q: &[f64], rg1: f64, s1: f64, rg2: f64, s2: f64, g2: f64, dd: f64) -> Result<Series> {
    if s1 >= 3.0 || s2 >= 3.0 || dd <= s1 {
        return Err(SasError::config("Guinier–Porod needs s1, s2 < 3 and dd > s1"));
    }
    let q1 = ((dd - s1) * (3.0 - s1) / 2.0).sqrt() / rg1;
    let q2 = ((s1 - s2) / (2.0 / (3.0 - s2) * rg2 * rg2 - 2.0 / (3.0 - s1) * rg1 * rg1)).sqrt();
    if !q2.is_finite() {
        return Err(SasError::config("Guinier–Porod regions do not intersect for these parameters"));
    }
    let g1 = g2 / ((-q2 * q2 * (rg1 * rg1 / (3.0 - s1) - rg2 * rg2 / (3.0 - s2))).exp() * q2.powf(s2 - s1));
    let d = g1 * (-q1 * q1 * rg1 * rg1 / (3.0 - s1)).exp() * q1.powf(dd - s1);
    let y = q
        .iter()
        .map(|&x| {
            if x < q2 {
                g2 / x.powf(s2) * (-x * x * rg2 * rg2 / (3.0 - s2)).exp()
            } else if x < q1 {
                g1 / x.powf(s1) * (-x * x * rg1 * rg1 / (3.0 - s1)).exp()
            } else {
                d / x.powf(dd)
            }
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Iq", "guinierPorod3d")?;
    out.put("Rg1", rg1);
    out.put("s1", s1);
    out.put("Rg2", rg2);
    out.put("s2", s2);
    out.put("G1", g1);
    out.put("G2", g2);
    out.put("dd", dd);
    Ok(out)
}

/// Teubner–Strey microemulsion model with correlation length `xi`,
/// domain period `d` and mean square SLD fluctuation `eta2`.
pub fn teubner_strey(q: &[f64], xi: f64, d: f64, eta2: f64) -> Result<Series> {
    if xi <= 0.0 || d <= 0.0 {
        return Err(SasError::config("Teubner–Strey lengths must be > 0"));
    }
    let k = 2.0 * PI / d;
    let a2 = (k * k + xi.powi(-2)).powi(2);
    let b = k * k - xi.powi(-2);
    let y = q
        .iter()
        .map(|&x| {
            let qq = x * x;
            8.0 * PI * eta2 / xi / (a2 - 2.0 * b * qq + qq * qq)
        })
        .collect();
    let mut out = model_series(q, vec![y], "q; Iq", "teubnerStrey")?;
    out.put("correlationlength", xi);
    out.put("domainsize", d);
    out.put("SLD2", eta2);
    Ok(out)
}

fn correlation(q: &[f64], xi: f64, i0: f64, name: &str, f: impl Fn(f64) -> f64) -> Result<Series> {
    non_negative("correlation length", xi)?;
    let y = q.iter().map(|&x| i0 * f(x * xi)).collect();
    let mut out = model_series(q, vec![y], "q; Iq", name)?;
    out.put("xi", xi);
    out.put("I0", i0);
    Ok(out)
}

/// Ornstein–Zernike `I0/(1 + q²ξ²)`.
pub fn ornstein_zernike(q: &[f64], xi: f64, i0: f64) -> Result<Series> {
    correlation(q, xi, i0, "ornsteinZernike", |x| 1.0 / (1.0 + x * x))
}

/// Debye–Anderson–Brumberger `I0/(1 + q²ξ²)²`.
pub fn dab(q: &[f64], xi: f64, i0: f64) -> Result<Series> {
    correlation(q, xi, i0, "DAB", |x| 1.0 / (1.0 + x * x).powi(2))
}

/// Polymer correlation-length model `I0/(1 + (qξ)^m)` with Porod exponent `m`.
pub fn polymer_cor_length(q: &[f64], xi: f64, m: f64, i0: f64) -> Result<Series> {
    let mut out = correlation(q, xi, i0, "polymerCorLength", |x| 1.0 / (1.0 + x.powf(m)))?;
    out.put("m", m);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::grid::loglist;

    #[test]
    fn guinier_slope() {
        let q = [0.0, 0.1, 0.2];
        let g = guinier(&q, 3.0, 2.0).unwrap();
        assert_eq!(g.y()[0], 2.0);
        let slope = (g.y()[2].ln() - g.y()[1].ln()) / (0.04 - 0.01);
        assert!((slope + 3.0).abs() < 1e-9);
        assert!(gen_guinier(&q, 1.0, 1.0, 3).is_err());
    }

    #[test]
    fn beaucage_matches_guinier_at_small_q() {
        let q = [0.0, 1e-3];
        let b = beaucage(&q, 5.0, 2.0, 3.0).unwrap();
        assert_eq!(b.y()[0], 2.0);
        assert!((b.y()[1] / 2.0 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn guinier_porod_is_continuous() {
        let (rg, s, d) = (4.0, 1.0, 4.0);
        let q1 = ((d - s) * (3.0 - s) / 2.0_f64).sqrt() / rg;
        let q = [q1 * (1.0 - 1e-9), q1];
        let g = guinier_porod(&q, rg, s, 1.0, d).unwrap();
        assert!((g.y()[0] / g.y()[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn guinier_porod_3d_is_continuous() {
        let q = loglist(1e-3, 2.0, 2000);
        let g = guinier_porod_3d(&q, 2.0, 1.0, 10.0, 0.0, 1.0, 4.0).unwrap();
        for w in g.y().windows(2) {
            assert!((w[1] / w[0] - 1.0).abs() < 0.05);
        }
    }

    #[test]
    fn teubner_strey_peaks_near_domain_spacing() {
        let q = loglist(0.01, 2.0, 4000);
        let t = teubner_strey(&q, 20.0, 10.0, 1.0).unwrap();
        let imax = (0..q.len()).fold(0, |b, i| if t.y()[i] > t.y()[b] { i } else { b });
        let k = 2.0 * PI / 10.0;
        let qpeak = (k * k - 1.0 / 400.0_f64).sqrt();
        assert!((q[imax] - qpeak).abs() < 0.01);
    }

    #[test]
    fn correlation_models_halve_at_inverse_length() {
        let q = [0.0, 0.1];
        assert!((ornstein_zernike(&q, 10.0, 1.0).unwrap().y()[1] - 0.5).abs() < 1e-12);
        assert!((dab(&q, 10.0, 1.0).unwrap().y()[1] - 0.25).abs() < 1e-12);
        assert!((polymer_cor_length(&q, 10.0, 1.7, 2.0).unwrap().y()[1] - 1.0).abs() < 1e-12);
    }
}
