//! Line-collimation (Kratky camera) smearing.

use crate::beam::{length_weights, width_weights, LineProfile};
use crate::error::Result;
use crate::math::quadrature::simpson;
use crate::math::spline::CubicSpline;

/// Smear the ideal curve `(q, y)` with a line profile, evaluated at `q`.
///
/// `I_s(q₀) = ∬ I(√((q₀+x)² + t²)) w_W(x) w_L(t) dx dt` with the beam-width
/// weight `w_W` and the beam-length weight `w_L`. Arguments beyond the last q
/// take the mean of the last 10 ideal samples.
pub fn smear_line(q: &[f64], y: &[f64], beam: &LineProfile) -> Result<Vec<f64>> {
    let spline = CubicSpline::new(q, y)?;
    let qmax = spline.x_max();
    let tail = &q[q.len().saturating_sub(10)..];
    let qmaxmean = tail.iter().map(|&v| spline.eval(v)).sum::<f64>() / tail.len() as f64;
    let ideal = |v: f64| if v > qmax { qmaxmean } else { spline.eval(v) };

    let wx = width_weights(beam);
    let wy = length_weights(beam);
    let out = q
        .iter()
        .map(|&q0| match (&wx, &wy) {
            (None, None) => ideal(q0),
            (None, Some(wy)) => {
                let vals: Vec<f64> = wy.t.iter().zip(&wy.w).map(|(t, w)| ideal(q0.hypot(*t)) * w).collect();
                simpson(&vals, &wy.t)
            }
            (Some(wx), None) => {
                let vals: Vec<f64> = wx.t.iter().zip(&wx.w).map(|(x, w)| ideal((q0 + x).abs()) * w).collect();
                simpson(&vals, &wx.t)
            }
            (Some(wx), Some(wy)) => {
                let inner: Vec<f64> = wx
                    .t
                    .iter()
                    .zip(&wx.w)
                    .map(|(x, wxv)| {
                        let vals: Vec<f64> =
                            wy.t.iter().zip(&wy.w).map(|(t, w)| ideal((q0 + x).hypot(*t)) * w).collect();
                        simpson(&vals, &wy.t) * wxv
                    })
                    .collect();
                simpson(&inner, &wx.t)
            }
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::{prepare_beam_profile, ProfileKind, ProfileOptions, ProfileSource};

    fn profile(a: f64, b: f64, bxw: f64) -> LineProfile {
        prepare_beam_profile(ProfileSource::Kind(ProfileKind::Trapez), &ProfileOptions::trapez(a, b).bxw(bxw))
            .unwrap()
            .line()
            .unwrap()
            .clone()
    }

    #[test]
    fn constant_curve_is_unchanged() {
        let q: Vec<f64> = (1..200).map(|i| i as f64 * 0.02).collect();
        let y = vec![3.0; q.len()];
        let s = smear_line(&q, &y, &profile(0.4, 0.2, 0.01)).unwrap();
        assert!(s.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn slit_smearing_lowers_a_decaying_curve() {
        let q: Vec<f64> = (1..300).map(|i| i as f64 * 0.01).collect();
        let y: Vec<f64> = q.iter().map(|v| (-v * v).exp()).collect();
        let s = smear_line(&q, &y, &profile(0.6, 0.3, 0.0)).unwrap();
        assert!(s[0] < y[0]);
        assert!(s[0] > 0.8 * y[0]);
        // Slit length only reaches larger q.
        assert!(s[..200].iter().zip(&y).all(|(a, b)| a <= b));
    }
}
