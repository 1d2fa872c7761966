//! Plotters-powered widgets for the picker screens.
//!
//! Both widgets draw through `plotters-ratatui-backend`, so they scale with
//! the terminal like the rest of the layout.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Profile curves on a common axis with optional horizontal level lines.
pub struct ProfileChart<'a> {
    pub curves: &'a [Vec<(f64, f64)>],
    pub levels: &'a [f64],
    pub x_label: &'a str,
    pub y_label: &'a str,
}

impl ProfileChart<'_> {
    /// Bounds over all finite points; `None` when nothing can be drawn.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let points = self.curves.iter().flatten().filter(|(x, y)| x.is_finite() && y.is_finite());
        let (mut x0, mut x1, mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
        for &l in self.levels.iter().filter(|l| l.is_finite()) {
            y0 = y0.min(l);
            y1 = y1.max(l);
        }
        if !(x1 > x0 && y1 >= y0) {
            return None;
        }
        let pad = if y1 > y0 { 0.05 * (y1 - y0) } else { 1.0 };
        Some(([x0, x1], [y0 - pad, y1 + pad]))
    }
}

fn curve_color(k: usize) -> RGBColor {
    let c = colorous::CATEGORY10[k % colorous::CATEGORY10.len()];
    RGBColor(c.r, c.g, c.b)
}

impl Widget for ProfileChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 8 {
            buf.set_string(area.x, area.y, "Chart area too small (resize terminal).", Style::default().fg(Color::Yellow));
            return;
        }
        let Some(([x0, x1], [y0, y1])) = self.bounds() else {
            buf.set_string(area.x, area.y, "no data in range", Style::default().fg(Color::Yellow));
            return;
        };

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 8)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.3}"))
                .y_label_formatter(&|v| format!("{v:.3}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            for (k, curve) in self.curves.iter().enumerate() {
                let color = curve_color(k);
                chart.draw_series(LineSeries::new(curve.iter().copied().filter(|(x, y)| x.is_finite() && y.is_finite()), &color))?;
            }
            for &level in self.levels {
                chart.draw_series(LineSeries::new([(x0, level), (x1, level)], &WHITE))?;
            }
            Ok(())
        });
        widget.render(area, buf);
    }
}

/// Detector image as colored cells, quantized to `levels` colors on a log
/// scale. The highlight overlays pixels in white, the circle in red.
pub struct Heatmap<'a> {
    pub rows: usize,
    pub cols: usize,
    pub data: &'a [f64],
    pub mask: &'a [bool],
    pub highlight: Option<&'a [bool]>,
    pub circle: Option<([f64; 2], f64)>,
    pub levels: usize,
}

/// Screen cell to image pixel `(row, col)` for an image drawn into `area`.
pub fn cell_to_pixel(area: Rect, rows: usize, cols: usize, column: u16, row: u16) -> Option<(f64, f64)> {
    if area.width == 0 || area.height == 0 || column < area.x || row < area.y {
        return None;
    }
    let (dx, dy) = (column - area.x, row - area.y);
    if dx >= area.width || dy >= area.height {
        return None;
    }
    let i = (f64::from(dy) + 0.5) * rows as f64 / f64::from(area.height);
    let j = (f64::from(dx) + 0.5) * cols as f64 / f64::from(area.width);
    Some((i - 0.5, j - 0.5))
}

impl Heatmap<'_> {
    /// Color level of every value, `None` for masked pixels.
    pub fn quantize(&self) -> Vec<Option<usize>> {
        let logs: Vec<Option<f64>> = self
            .data
            .iter()
            .zip(self.mask)
            .map(|(v, m)| (!*m && *v > 0.0).then(|| v.log10()))
            .collect();
        let (lo, hi) = logs.iter().flatten().fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(*v), b.max(*v)));
        let levels = self.levels.max(2);
        logs.iter()
            .zip(self.mask)
            .map(|(v, m)| match v {
                _ if *m => None,
                Some(v) if hi > lo => Some((((v - lo) / (hi - lo)) * (levels - 1) as f64).round() as usize),
                _ => Some(0),
            })
            .collect()
    }
}

impl Widget for Heatmap<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.rows == 0 || self.cols == 0 {
            return;
        }
        let quantized = self.quantize();
        let levels = self.levels.max(2);
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                let Some((i, j)) = cell_to_pixel(area, self.rows, self.cols, x, y) else { continue };
                let (pi, pj) = ((i.round().max(0.0) as usize).min(self.rows - 1), (j.round().max(0.0) as usize).min(self.cols - 1));
                let k = pi * self.cols + pj;
                let color = if self.highlight.is_some_and(|h| h.get(k).copied().unwrap_or(false)) {
                    Color::White
                } else {
                    match quantized[k] {
                        None => Color::Black,
                        Some(level) => {
                            let c = colorous::TURBO.eval_rational(level, levels);
                            Color::Rgb(c.r, c.g, c.b)
                        }
                    }
                };
                buf[(x, y)].set_char(' ').set_bg(color);
            }
        }
        if let Some(([ci, cj], r)) = self.circle {
            let steps = (8.0 * r).ceil().max(16.0) as usize;
            for s in 0..steps {
                let phi = 2.0 * std::f64::consts::PI * s as f64 / steps as f64;
                let (i, j) = (ci + r * phi.sin(), cj + r * phi.cos());
                if i < -0.5 || j < -0.5 || i >= self.rows as f64 - 0.5 || j >= self.cols as f64 - 0.5 {
                    continue;
                }
                let y = area.y + ((i + 0.5) * f64::from(area.height) / self.rows as f64) as u16;
                let x = area.x + ((j + 0.5) * f64::from(area.width) / self.cols as f64) as u16;
                if x < area.x + area.width && y < area.y + area.height {
                    buf[(x, y)].set_bg(Color::Red);
                }
            }
            let y = area.y + ((ci + 0.5).max(0.0) * f64::from(area.height) / self.rows as f64) as u16;
            let x = area.x + ((cj + 0.5).max(0.0) * f64::from(area.width) / self.cols as f64) as u16;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('+').set_fg(Color::White);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_map_onto_pixels() {
        let area = Rect::new(10, 5, 20, 10);
        assert_eq!(cell_to_pixel(area, 100, 200, 10, 5), Some((4.5, 4.5)));
        assert_eq!(cell_to_pixel(area, 100, 200, 29, 14), Some((94.5, 194.5)));
        assert_eq!(cell_to_pixel(area, 100, 200, 30, 5), None);
        assert_eq!(cell_to_pixel(area, 100, 200, 9, 5), None);
    }

    #[test]
    fn quantize_spans_levels_and_skips_mask() {
        let data = [1.0, 10.0, 100.0, -1.0];
        let mask = [false, false, false, true];
        let map = Heatmap { rows: 2, cols: 2, data: &data, mask: &mask, highlight: None, circle: None, levels: 5 };
        assert_eq!(map.quantize(), vec![Some(0), Some(2), Some(4), None]);
    }

    #[test]
    fn profile_bounds_include_levels() {
        let curves = vec![vec![(0.0, 1.0), (1.0, 2.0)]];
        let chart = ProfileChart { curves: &curves, levels: &[3.0], x_label: "q", y_label: "I" };
        let ([x0, x1], [y0, y1]) = chart.bounds().unwrap();
        assert_eq!((x0, x1), (0.0, 1.0));
        assert!(y0 < 1.0 && y1 > 3.0);
        let empty: Vec<Vec<(f64, f64)>> = Vec::new();
        assert!(ProfileChart { curves: &empty, levels: &[], x_label: "", y_label: "" }.bounds().is_none());
    }

    #[test]
    fn heatmap_renders_circle_and_mask() {
        let data = vec![1.0; 16];
        let mut mask = vec![false; 16];
        mask[0] = true;
        let map = Heatmap { rows: 4, cols: 4, data: &data, mask: &mask, highlight: None, circle: Some(([2.0, 2.0], 1.0)), levels: 4 };
        let area = Rect::new(0, 0, 4, 4);
        let mut buf = Buffer::empty(area);
        map.render(area, &mut buf);
        assert_eq!(buf[(0, 0)].bg, Color::Black);
        assert_eq!(buf[(2, 2)].symbol(), "+");
        assert_eq!(buf[(3, 2)].bg, Color::Red);
    }
}
