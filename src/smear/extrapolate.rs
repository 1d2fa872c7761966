//! Edge extrapolation of sampled ideal curves before kernel smearing.
//!
//! A sampled curve ends at its first and last q, while a kernel reaches about
//! 3σ beyond. The curve is extended on an extra log grid with one policy per
//! edge:
//!
//! - `Constant`: the edge value
//! - `PowerLaw(p)`: straight line in `y^(1/p)` fitted near the edge
//! - `Guinier`: quadratic in `log y` fitted near the edge
//!
//! Low-edge fits use the points with `q ≤ 3·q_min`, high-edge fits the points
//! with `q ≥ q_max/3`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SasError};
use crate::series::{interp_linear, PolyTransform, Series};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EdgePolicy {
    #[default]
    Constant,
    PowerLaw(f64),
    Guinier,
}

impl fmt::Display for EdgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgePolicy::Constant => f.write_str("const"),
            EdgePolicy::PowerLaw(p) => write!(f, "{p}"),
            EdgePolicy::Guinier => f.write_str("guinier"),
        }
    }
}

impl FromStr for EdgePolicy {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim().to_ascii_lowercase();
        match t.as_str() {
            "no" | "const" | "constant" => Ok(EdgePolicy::Constant),
            "guinier" => Ok(EdgePolicy::Guinier),
            _ => match t.parse::<f64>() {
                Ok(p) if p != 0.0 && p.is_finite() => Ok(EdgePolicy::PowerLaw(p)),
                Ok(_) => Ok(EdgePolicy::Constant),
                Err(_) => Err(SasError::config(format!(
                    "unknown edge extrapolation '{s}' (expected no, guinier or a power)"
                ))),
            },
        }
    }
}

/// Extrapolation policy for both edges.
///
/// `extend = false` switches the extension off entirely; the smeared model
/// wrapper uses it after evaluating the model on an already extended grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrapolation {
    pub low: EdgePolicy,
    pub high: EdgePolicy,
    pub extend: bool,
}

impl Default for Extrapolation {
    fn default() -> Self {
        Self {
            low: EdgePolicy::Constant,
            high: EdgePolicy::Constant,
            extend: true,
        }
    }
}

impl Extrapolation {
    pub fn none() -> Self {
        Self {
            extend: false,
            ..Self::default()
        }
    }

    pub fn both(policy: EdgePolicy) -> Self {
        Self {
            low: policy,
            high: policy,
            extend: true,
        }
    }
}

impl fmt::Display for Extrapolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extend {
            write!(f, "{},{}", self.low, self.high)
        } else {
            f.write_str("none")
        }
    }
}

/// `"none"`, one policy for both edges, or `"low,high"`.
impl FromStr for Extrapolation {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("none") {
            return Ok(Extrapolation::none());
        }
        match s.split_once(',') {
            Some((lo, hi)) => Ok(Extrapolation {
                low: lo.parse()?,
                high: hi.parse()?,
                extend: true,
            }),
            None => Ok(Extrapolation::both(s.parse()?)),
        }
    }
}

/// Y values on `[low_x, data.X, high_x]`.
pub fn extrapolate_y(data: &Series, low_x: &[f64], high_x: &[f64], ext: &Extrapolation) -> Result<Vec<f64>> {
    let (x, y) = (data.x(), data.y());
    let (Some(&xmin), Some(&xmax)) = (x.first(), x.last()) else {
        return Err(SasError::config("cannot extrapolate an empty curve"));
    };
    let mut out = Vec::with_capacity(low_x.len() + y.len() + high_x.len());
    if !low_x.is_empty() {
        let edge = data.x_range(f64::NEG_INFINITY, 3.0 * xmin);
        out.extend(edge_values(data, &edge, low_x, ext.low)?);
    }
    out.extend_from_slice(y);
    if !high_x.is_empty() {
        let edge = data.x_range(xmax / 3.0, f64::INFINITY);
        out.extend(edge_values(data, &edge, high_x, ext.high)?);
    }
    Ok(out)
}

fn edge_values(data: &Series, edge: &Series, at: &[f64], policy: EdgePolicy) -> Result<Vec<f64>> {
    let constant = || at.iter().map(|&v| interp_linear(data.x(), data.y(), v)).collect::<Vec<f64>>();
    let (deg, transform) = match policy {
        EdgePolicy::Constant => return Ok(constant()),
        EdgePolicy::PowerLaw(p) => (1, PolyTransform::Power(p)),
        EdgePolicy::Guinier => (2, PolyTransform::Log),
    };
    if edge.len() <= deg {
        log::warn!("only {} points for {policy} edge extrapolation; using the edge value", edge.len());
        return Ok(constant());
    }
    Ok(edge.polyfit(at, deg, transform)?.y().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guinier_curve() -> Series {
        let x: Vec<f64> = (1..=60).map(|i| i as f64 * 0.05).collect();
        let y: Vec<f64> = x.iter().map(|q| 10.0 * (-q * q * 4.0 / 3.0).exp()).collect();
        Series::from_xy(x, y).unwrap()
    }

    #[test]
    fn constant_policy_repeats_edges() {
        let s = guinier_curve();
        let y = extrapolate_y(&s, &[0.01, 0.02], &[3.5], &Extrapolation::default()).unwrap();
        assert_eq!(y.len(), s.len() + 3);
        assert_eq!(y[0], s.y()[0]);
        assert_eq!(y[y.len() - 1], *s.y().last().unwrap());
    }

    #[test]
    fn guinier_policy_follows_the_curve() {
        let s = guinier_curve();
        let ext = Extrapolation {
            low: EdgePolicy::Guinier,
            ..Extrapolation::default()
        };
        let y = extrapolate_y(&s, &[0.0, 0.02], &[], &ext).unwrap();
        assert!((y[0] - 10.0).abs() < 1e-6);
        assert!((y[1] - 10.0 * (-0.02f64 * 0.02 * 4.0 / 3.0).exp()).abs() < 1e-6);
    }

    #[test]
    fn power_law_high_edge() {
        let x: Vec<f64> = (1..=40).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|q| 2.0 * q.powi(-4)).collect();
        let s = Series::from_xy(x, y).unwrap();
        let ext = Extrapolation {
            high: EdgePolicy::PowerLaw(-4.0),
            ..Extrapolation::default()
        };
        let y = extrapolate_y(&s, &[], &[5.0], &ext).unwrap();
        assert!((y[40] - 2.0 * 5f64.powi(-4)).abs() < 1e-9);
    }

    #[test]
    fn parses_policies() {
        assert_eq!("no".parse::<EdgePolicy>().unwrap(), EdgePolicy::Constant);
        assert_eq!("-4".parse::<EdgePolicy>().unwrap(), EdgePolicy::PowerLaw(-4.0));
        let ext: Extrapolation = "guinier,-4".parse().unwrap();
        assert_eq!(ext.low, EdgePolicy::Guinier);
        assert_eq!(ext.high, EdgePolicy::PowerLaw(-4.0));
        assert!(!"none".parse::<Extrapolation>().unwrap().extend);
        assert!("foo".parse::<EdgePolicy>().is_err());
    }
}
