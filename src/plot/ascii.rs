//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output. Scattering curves span
//! decades, so both axes are logarithmic by default; points that cannot be
//! shown on a log axis (zero or negative) are left out.
//!
//! Plot elements:
//! - measured points: one marker per series (`o`, `x`, `+`, `*`)
//! - model curves: `-` line

use crate::series::Series;

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Points,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axes {
    pub log_x: bool,
    pub log_y: bool,
}

impl Default for Axes {
    fn default() -> Self {
        Self { log_x: true, log_y: true }
    }
}

const MARKERS: [char; 4] = ['o', 'x', '+', '*'];

/// Render series into a `width`×`height` grid with a one-line range header.
pub fn render_ascii_plot(series: &[(&Series, Style)], width: usize, height: usize, axes: Axes) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let to_axis = |v: f64, log: bool| if log { (v > 0.0).then(|| v.log10()) } else { v.is_finite().then_some(v) };

    let transformed: Vec<(Vec<(f64, f64)>, Style)> = series
        .iter()
        .map(|(s, style)| {
            let points = s
                .x()
                .iter()
                .zip(s.y())
                .filter_map(|(&x, &y)| Some((to_axis(x, axes.log_x)?, to_axis(y, axes.log_y)?)))
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect();
            (points, *style)
        })
        .collect();

    let all = || transformed.iter().flat_map(|(p, _)| p.iter());
    let Some((x_min, x_max)) = range(all().map(|p| p.0)) else {
        return "Plot: no points to show\n".to_string();
    };
    let (y_min, y_max) = range(all().map(|p| p.1)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    // lines first so markers overlay them
    for (points, _) in transformed.iter().filter(|(_, s)| *s == Style::Line) {
        draw_curve(&mut grid, points, x_min, x_max, y_min, y_max);
    }
    for (k, (points, _)) in transformed.iter().filter(|(_, s)| *s == Style::Points).enumerate() {
        let marker = MARKERS[k % MARKERS.len()];
        for &(x, y) in points {
            grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = marker;
        }
    }

    let shown = |v: f64, log: bool| if log { 10f64.powf(v) } else { v };
    let mut out = format!(
        "Plot: x=[{:.4e}, {:.4e}]{} | y=[{:.4e}, {:.4e}]{}\n",
        shown(x_min, axes.log_x),
        shown(x_max, axes.log_x),
        if axes.log_x { " log" } else { "" },
        shown(y_min, axes.log_y),
        shown(y_max, axes.log_y),
        if axes.log_y { " log" } else { "" },
    );
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(min.is_finite() && max.is_finite()) {
        return None;
    }
    Some(if max > min { (min, max) } else { (min - 0.5, max + 0.5) })
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, x_min, x_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x0, mut y0, x1, y1) = (x0 as isize, y0 as isize, x1 as isize, y1 as isize);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        let inside = y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len();
        if inside && grid[y0 as usize][x0 as usize] == ' ' {
            grid[y0 as usize][x0 as usize] = ch;
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let data = Series::from_xy(vec![1.0, 10.0], vec![1.0, 100.0]).unwrap();
        let model = Series::from_xy(vec![1.0, 10.0], vec![1.0, 1.0]).unwrap();
        let txt = render_ascii_plot(&[(&model, Style::Line), (&data, Style::Points)], 10, 5, Axes::default());
        let expected = concat!(
            "Plot: x=[1.0000e0, 1.0000e1] log | y=[7.9433e-1, 1.2589e2] log\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn non_positive_values_are_dropped_on_log_axes() {
        let data = Series::from_xy(vec![-1.0, 0.0, 1.0, 2.0], vec![1.0, 1.0, 0.0, 3.0]).unwrap();
        let markers = |txt: String| txt.lines().skip(1).map(|l| l.matches('o').count()).sum::<usize>();
        assert_eq!(markers(render_ascii_plot(&[(&data, Style::Points)], 12, 6, Axes::default())), 1);
        let linear = Axes { log_x: false, log_y: false };
        assert_eq!(markers(render_ascii_plot(&[(&data, Style::Points)], 12, 6, linear)), 4);
        let empty = Series::from_xy(vec![-1.0], vec![-1.0]).unwrap();
        assert_eq!(render_ascii_plot(&[(&empty, Style::Points)], 12, 6, Axes::default()), "Plot: no points to show\n");
    }
}
