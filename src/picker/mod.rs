//! Interactive geometry pickers.
//!
//! A picker is a state machine over [`PickerEvent`]s. Every event that
//! changes the geometry goes through the [`SasImage`] setters (so caches see
//! the new values) and recomputes the data the front-end draws: sector
//! profiles around a ring for the beam center, or a measured radial average
//! against a simulated powder pattern for a detector at an arbitrary
//! position. [`tui`] drives either machine from the terminal; closing it
//! leaves the last geometry on the image.
//!
//! In headless mode (see [`headless`]) the interactive entry points log a
//! warning and return without touching the image.

use std::f64::consts::PI;
use std::io::{self, IsTerminal};

use crate::error::Result;
use crate::image::{RadialOptions, SasImage};
use crate::lattice::{lattice_structure_factor, Lattice, LatticeOptions};
use crate::math::grid::Spacing;
use crate::reference::AgBeReference;
use crate::series::{PruneMode, PruneOptions, Series};

mod chart;
pub mod tui;

/// Whether `HEADLESS` asks for a non-interactive run.
///
/// Interactive entry points also fall back to headless behaviour when stdout
/// is not a terminal.
pub fn headless() -> bool {
    headless_from(std::env::var("HEADLESS").ok().as_deref())
}

fn headless_from(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !(v.is_empty() || v == "0" || v == "false"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Plus,
    Minus,
}

/// Quantity with its own cyclic step size in the detector position picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget {
    Center,
    Distance,
    Angle,
}

/// Step buttons of the detector position picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepButton {
    CenterRow,
    CenterCol,
    Distance,
    Alpha,
    Beta,
    Gamma,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickerEvent {
    /// Click at data coordinates of the picker's click area: pixel
    /// `(row, col)` on the image, or `(q, intensity)` on the profile plot.
    Click { button: MouseButton, x: f64, y: f64 },
    Scroll { up: bool },
    Key { key: Key, ctrl: bool },
    Step { button: StepButton, increase: bool },
    CycleStep(StepTarget),
    Close,
}

/// Where clicks of a picker land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickArea {
    Image,
    Profiles,
}

/// Everything a front-end needs to draw a picker.
#[derive(Debug)]
pub struct PickerView<'a> {
    pub title: &'static str,
    pub image: &'a SasImage,
    /// Pixels highlighted on top of the image.
    pub highlight: Option<&'a [bool]>,
    /// Circle `(center, radius)` in pixels drawn on the image.
    pub circle: Option<([f64; 2], f64)>,
    pub curves: Vec<Vec<(f64, f64)>>,
    /// Horizontal marker lines on the profile plot.
    pub levels: Vec<f64>,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub status: Vec<String>,
    pub clicks: ClickArea,
    pub help: &'static str,
    /// Number of color levels of the image.
    pub color_levels: usize,
}

pub trait Picker {
    /// Apply one event; returns `false` once the picker is closed.
    fn handle(&mut self, event: PickerEvent) -> Result<bool>;
    fn view(&self) -> PickerView<'_>;
}

/// Sector profiles around a ring to center the beam.
///
/// The image is split into `symmetry` azimuthal sectors; each shows the
/// smoothed intensity within `±width` of the circle radius. With the right
/// center the profiles peak at the same radius.
pub struct BeamCenterPicker<'a> {
    image: &'a mut SasImage,
    smoothed: Vec<f64>,
    symmetry: usize,
    levels: usize,
    radius: f64,
    width: f64,
    profiles: Vec<Option<Series>>,
    open: bool,
}

const PROFILE_BINS: usize = 50;
const MIN_RADIUS: f64 = 1.0;

/// Ring radius in pixels of AgBe order `n` for the image geometry.
fn agbe_pixel_radius(image: &SasImage, order: usize) -> Option<f64> {
    let g = image.geometry();
    let (d, [px, _], lambda) = (g.distance().ok()?, g.pixel().ok()?, g.lambda().ok()?);
    let s = AgBeReference::peak_position(order) * lambda / 10.0 / (4.0 * PI);
    (s < 1.0).then(|| d * (2.0 * s.asin()).tan() / px)
}

impl<'a> BeamCenterPicker<'a> {
    /// Starts on the AgBe ring closest to a fifth of the image size.
    pub fn new(image: &'a mut SasImage, levels: usize, symmetry: usize) -> Result<Self> {
        let (rows, cols) = image.shape();
        let target = rows.min(cols) as f64 / 5.0;
        let radius = (1..=10)
            .filter_map(|n| agbe_pixel_radius(image, n))
            .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
            .unwrap_or(target)
            .max(MIN_RADIUS);
        let mut smooth = image.clone();
        smooth.gaussian_filter(0.8)?;
        let mut picker = Self {
            smoothed: smooth.data().to_vec(),
            image,
            symmetry: symmetry.max(1),
            levels: levels.max(2),
            radius,
            width: 0.3 * radius,
            profiles: Vec::new(),
            open: true,
        };
        picker.update()?;
        Ok(picker)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn center(&self) -> [f64; 2] {
        self.image.center()
    }

    /// Sector profiles, `None` where a sector has no data in the window.
    pub fn profiles(&self) -> &[Option<Series>] {
        &self.profiles
    }

    fn move_center(&mut self, di: f64, dj: f64) {
        let [i, j] = self.image.center();
        self.image.set_center([i + di, j + dj]);
    }

    fn update(&mut self) -> Result<()> {
        let azimuth = self.image.polar_azimuth()?;
        let radial = self.image.polar_radial()?;
        let mask = self.image.mask();
        let dphi = 2.0 * PI / self.symmetry as f64;
        let (rlo, rhi) = (self.radius - self.width, self.radius + self.width);
        self.profiles = (0..self.symmetry)
            .map(|s| {
                let angle = -PI + (s as f64 + 0.5) * dphi;
                let (mut x, mut y) = (Vec::new(), Vec::new());
                for k in 0..radial.len() {
                    let inside = (azimuth[k] - angle).abs() < dphi / 2.0 && radial[k] > rlo && radial[k] < rhi;
                    if inside && !mask[k] && self.smoothed[k] > 0.0 {
                        x.push(radial[k]);
                        y.push(self.smoothed[k]);
                    }
                }
                sector_profile(x, y)
            })
            .collect();
        Ok(())
    }
}

fn sector_profile(x: Vec<f64>, y: Vec<f64>) -> Option<Series> {
    if x.len() < 2 {
        return None;
    }
    let binned = Series::from_xy(x, y)
        .ok()?
        .prune(&PruneOptions::bins(PROFILE_BINS).kind(Spacing::Lin).mode(PruneMode::Sum))
        .ok()?;
    let max = binned.y().iter().copied().fold(f64::MIN, f64::max);
    (max > 0.0).then(|| binned.map_y(|v| v / max))
}

impl Picker for BeamCenterPicker<'_> {
    fn handle(&mut self, event: PickerEvent) -> Result<bool> {
        let fine = |ctrl: bool| if ctrl { 0.1 } else { 1.0 };
        match event {
            PickerEvent::Close => {
                self.open = false;
                return Ok(false);
            }
            PickerEvent::Click { button: MouseButton::Left, x, y } => self.image.set_center([x, y]),
            PickerEvent::Click { x, y, .. } => {
                let [i, j] = self.image.center();
                self.radius = (x - i).hypot(y - j).max(MIN_RADIUS);
            }
            PickerEvent::Scroll { up } => self.radius = (self.radius + if up { 1.0 } else { -1.0 }).max(MIN_RADIUS),
            PickerEvent::Key { key, ctrl } => match key {
                Key::Up => self.move_center(-fine(ctrl), 0.0),
                Key::Down => self.move_center(fine(ctrl), 0.0),
                Key::Left => self.move_center(0.0, -fine(ctrl)),
                Key::Right => self.move_center(0.0, fine(ctrl)),
                Key::Plus if ctrl => self.width += 1.0,
                Key::Minus if ctrl => self.width = (self.width - 1.0).max(1.0),
                Key::Plus => self.radius += 1.0,
                Key::Minus => self.radius = (self.radius - 1.0).max(MIN_RADIUS),
            },
            PickerEvent::Step { .. } | PickerEvent::CycleStep(_) => return Ok(self.open),
        }
        self.update()?;
        Ok(self.open)
    }

    fn view(&self) -> PickerView<'_> {
        let [i, j] = self.image.center();
        PickerView {
            title: "beam center",
            image: self.image,
            highlight: None,
            circle: Some(([i, j], self.radius)),
            curves: self
                .profiles
                .iter()
                .flatten()
                .map(|p| p.x().iter().copied().zip(p.y().iter().copied()).collect())
                .collect(),
            levels: Vec::new(),
            x_label: "radius (pixel)",
            y_label: "normalised",
            status: vec![
                format!("center [{i:.1}, {j:.1}]"),
                format!("radius {:.1} ± {:.1} pixel, {} sectors", self.radius, self.width, self.symmetry),
            ],
            clicks: ClickArea::Image,
            help: "click center  right-click radius  arrows move (ctrl fine)  +/- radius  ctrl +/- width  q close",
            color_levels: self.levels,
        }
    }
}

/// Cyclic step sizes of one step button.
#[derive(Debug, Clone)]
pub struct StepSizes {
    sizes: &'static [f64],
    index: usize,
}

impl StepSizes {
    fn new(sizes: &'static [f64], index: usize) -> Self {
        Self { sizes, index }
    }

    pub fn current(&self) -> f64 {
        self.sizes[self.index]
    }

    fn cycle(&mut self) {
        self.index = (self.index + 1) % self.sizes.len();
    }
}

/// Parameters of the powder pattern used by [`DetectorPositionPicker`].
#[derive(Debug, Clone)]
pub struct OffsetOptions {
    pub center: Option<[f64; 2]>,
    pub distance: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub lattice: LatticeOptions,
}

impl Default for OffsetOptions {
    fn default() -> Self {
        Self {
            center: None,
            distance: None,
            alpha: None,
            beta: None,
            gamma: None,
            lattice: LatticeOptions::default().hklmax(17),
        }
    }
}

/// Measured radial average against a simulated powder pattern.
///
/// Step buttons move center, distance and the three detector angles by the
/// current step of their group; the pixels whose simulated intensity lies
/// between the two visibility thresholds are highlighted on the image.
pub struct DetectorPositionPicker<'a> {
    image: &'a mut SasImage,
    lattice: Lattice,
    opts: LatticeOptions,
    distance_step: StepSizes,
    angle_step: StepSizes,
    center_step: StepSizes,
    vmin: f64,
    vmax: f64,
    measured: Series,
    simulated: Series,
    highlight: Vec<bool>,
    clim: (f64, f64),
    reflections: Vec<([i32; 3], f64)>,
    open: bool,
}

impl<'a> DetectorPositionPicker<'a> {
    pub fn new(image: &'a mut SasImage, lattice: Lattice, opts: &OffsetOptions) -> Result<Self> {
        if let Some(c) = opts.center {
            image.set_center(c);
        }
        if let Some(d) = opts.distance {
            image.set_detector_distance(d)?;
        }
        let g = *image.geometry();
        image.set_orientation(opts.alpha.unwrap_or(g.alpha), opts.beta.unwrap_or(g.beta), opts.gamma.unwrap_or(g.gamma));
        let mut picker = Self {
            image,
            lattice,
            opts: opts.lattice.clone(),
            distance_step: StepSizes::new(&[0.0001, 0.001, 0.01, 0.1], 2),
            angle_step: StepSizes::new(&[0.1, 3.0, 30.0], 1),
            center_step: StepSizes::new(&[0.1, 1.0, 10.0, 100.0], 1),
            vmin: 0.0,
            vmax: 0.0,
            measured: Series::from_xy(vec![0.0], vec![0.0])?,
            simulated: Series::from_xy(vec![0.0], vec![0.0])?,
            highlight: Vec::new(),
            clim: (0.0, 0.0),
            reflections: Vec::new(),
            open: true,
        };
        picker.update()?;
        picker.vmax = picker.simulated.y().iter().copied().fold(f64::MIN, f64::max);
        picker.vmin = 0.1 * picker.vmax;
        picker.update()?;
        Ok(picker)
    }

    pub fn step(&self, target: StepTarget) -> f64 {
        match target {
            StepTarget::Center => self.center_step.current(),
            StepTarget::Distance => self.distance_step.current(),
            StepTarget::Angle => self.angle_step.current(),
        }
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.vmin, self.vmax)
    }

    /// Display range of the simulated pattern derived from the thresholds.
    pub fn clim(&self) -> (f64, f64) {
        self.clim
    }

    pub fn measured(&self) -> &Series {
        &self.measured
    }

    /// Simulated radial pattern scaled onto the measured one.
    pub fn simulated(&self) -> &Series {
        &self.simulated
    }

    /// Reflections within the measured q range.
    pub fn reflections(&self) -> &[([i32; 3], f64)] {
        &self.reflections
    }

    fn apply_step(&mut self, button: StepButton, increase: bool) -> Result<()> {
        let sign = if increase { 1.0 } else { -1.0 };
        let g = *self.image.geometry();
        let (c, a) = (sign * self.center_step.current(), sign * self.angle_step.current());
        match button {
            StepButton::CenterRow => self.image.set_center([g.center[0] + c, g.center[1]]),
            StepButton::CenterCol => self.image.set_center([g.center[0], g.center[1] + c]),
            StepButton::Distance => {
                let d = g.distance()? + sign * self.distance_step.current();
                if let Err(e) = self.image.set_detector_distance(d) {
                    log::warn!("distance step ignored: {e}");
                }
            }
            StepButton::Alpha => self.image.set_orientation(g.alpha + a, g.beta, g.gamma),
            StepButton::Beta => self.image.set_orientation(g.alpha, g.beta + a, g.gamma),
            StepButton::Gamma => self.image.set_orientation(g.alpha, g.beta, g.gamma + a),
        }
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        let measured = self.image.radial_average(&RadialOptions::default())?;
        let x = measured.x().to_vec();
        let bgr = measured.y().iter().copied().fold(f64::INFINITY, f64::min);
        let top = measured.y().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let scale_onto = |values: &[f64]| {
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let s = if hi > lo { (top - bgr) / (hi - lo) } else { 0.0 };
            values.iter().map(|v| (v - lo) * s + bgr).collect::<Vec<f64>>()
        };

        let mut opts = self.opts.clone();
        opts.wavelength = Some(self.image.geometry().lambda()? / 10.0);
        let sf = lattice_structure_factor(&x, &self.lattice, &opts)?;
        self.simulated = Series::from_xy(x.clone(), scale_onto(sf.y()))?;

        let pattern = self.image.simulate_lattice_pattern(&self.lattice, &opts)?;
        let unmasked: Vec<f64> = pattern.unmasked().collect();
        let scaled = scale_onto(if unmasked.is_empty() { pattern.data() } else { &unmasked });
        let mut clim = [self.vmin, self.vmax, bgr * 1.1, top * 0.9];
        clim.sort_by(f64::total_cmp);
        self.clim = (clim[1], clim[2]);
        let mut it = scaled.into_iter();
        self.highlight = pattern
            .mask()
            .iter()
            .map(|m| {
                if !unmasked.is_empty() && *m {
                    return false;
                }
                it.next().is_some_and(|v| v >= self.clim.0 && v <= self.clim.1)
            })
            .collect();

        let (qmin, qmax) = (x.first().copied().unwrap_or(0.0), x.last().copied().unwrap_or(0.0));
        let peaks = self.lattice.radial_reciprocal_lattice(self.opts.hklmax);
        self.reflections =
            peaks.hkl.iter().zip(&peaks.q).filter(|(_, q)| **q > qmin && **q < qmax).map(|(h, q)| (*h, *q)).collect();
        for (hkl, q) in &self.reflections {
            log::debug!("reflection {hkl:?} at q = {q:.4} 1/nm");
        }
        self.measured = measured;
        Ok(())
    }
}

impl Picker for DetectorPositionPicker<'_> {
    fn handle(&mut self, event: PickerEvent) -> Result<bool> {
        let fine = |ctrl: bool| if ctrl { 0.1 } else { 1.0 };
        let [i, j] = self.image.center();
        match event {
            PickerEvent::Close => {
                self.open = false;
                return Ok(false);
            }
            PickerEvent::Click { button: MouseButton::Left, y, .. } => {
                self.vmin = y;
                self.vmax = self.vmax.max(1.1 * y);
            }
            PickerEvent::Click { button: MouseButton::Right, y, .. } => {
                self.vmax = y;
                self.vmin = self.vmin.min(0.9 * y);
            }
            PickerEvent::Click { .. } | PickerEvent::Scroll { .. } => return Ok(self.open),
            PickerEvent::Key { key, ctrl } => match key {
                Key::Up => self.image.set_center([i - fine(ctrl), j]),
                Key::Down => self.image.set_center([i + fine(ctrl), j]),
                Key::Left => self.image.set_center([i, j - fine(ctrl)]),
                Key::Right => self.image.set_center([i, j + fine(ctrl)]),
                Key::Plus | Key::Minus => return Ok(self.open),
            },
            PickerEvent::Step { button, increase } => self.apply_step(button, increase)?,
            PickerEvent::CycleStep(target) => {
                match target {
                    StepTarget::Center => self.center_step.cycle(),
                    StepTarget::Distance => self.distance_step.cycle(),
                    StepTarget::Angle => self.angle_step.cycle(),
                }
                return Ok(self.open);
            }
        }
        self.update()?;
        Ok(self.open)
    }

    fn view(&self) -> PickerView<'_> {
        let g = self.image.geometry();
        let points = |s: &Series| s.x().iter().copied().zip(s.y().iter().copied()).collect();
        PickerView {
            title: "detector position",
            image: self.image,
            highlight: Some(&self.highlight),
            circle: None,
            curves: vec![points(&self.measured), points(&self.simulated)],
            levels: vec![self.clim.0, self.clim.1],
            x_label: "q (1/nm)",
            y_label: "I(q)",
            status: vec![
                format!("center    [{:.1}, {:.1}] pixel", g.center[0], g.center[1]),
                format!("distance  {:.1} mm", g.detector_distance.unwrap_or(0.0) * 1000.0),
                format!("α, β, γ   {:.1}, {:.1}, {:.1} deg", g.alpha, g.beta, g.gamma),
                format!(
                    "steps: center ±{} pixel, distance ±{} mm, angle ±{} deg",
                    self.center_step.current(),
                    self.distance_step.current() * 1000.0,
                    self.angle_step.current()
                ),
            ],
            clicks: ClickArea::Profiles,
            help: "r/R c/C center  d/D distance  a/A b/B g/G angles  1 2 3 step size  click low  right-click high  q close",
            color_levels: 16,
        }
    }
}

impl SasImage {
    /// Interactive beam center picker; see [`BeamCenterPicker`].
    pub fn pick_beamcenter(&mut self, levels: usize, symmetry: usize) -> Result<()> {
        if headless() || !io::stdout().is_terminal() {
            log::warn!("pick_beamcenter cannot be used in headless mode");
            return Ok(());
        }
        let mut picker = BeamCenterPicker::new(self, levels, symmetry)?;
        tui::run(&mut picker)
    }

    /// Interactive alignment of a detector at any position against the
    /// powder pattern of `lattice`; see [`DetectorPositionPicker`].
    pub fn calibrate_offset_detector(&mut self, lattice: Lattice, opts: &OffsetOptions) -> Result<()> {
        if headless() || !io::stdout().is_terminal() {
            log::warn!("calibrate_offset_detector cannot be used in headless mode");
            return Ok(());
        }
        let mut picker = DetectorPositionPicker::new(self, lattice, opts)?;
        tui::run(&mut picker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic::{self, AgBeRings};

    fn agbe(center: [f64; 2]) -> SasImage {
        let rings = AgBeRings { orders: vec![1, 2, 3, 4], sigma: 0.03, ..Default::default() };
        synthetic::agbe_rings(256, 256, synthetic::saxs_geometry(center), &rings).unwrap()
    }

    fn peak_radius(p: &Series) -> f64 {
        let (k, _) = p.y().iter().enumerate().fold((0, f64::MIN), |a, (k, v)| if *v > a.1 { (k, *v) } else { a });
        p.x()[k]
    }

    #[test]
    fn headless_values() {
        assert!(!headless_from(None));
        assert!(!headless_from(Some("")));
        assert!(!headless_from(Some("0")));
        assert!(!headless_from(Some("False")));
        assert!(headless_from(Some("1")));
        assert!(headless_from(Some("yes")));
    }

    #[test]
    fn sector_profiles_agree_at_the_true_center() {
        let truth = [130.0, 126.0];
        let mut im = agbe(truth);
        im.set_center([120.0, 120.0]);
        let mut picker = BeamCenterPicker::new(&mut im, 8, 6).unwrap();
        let ring = agbe_pixel_radius(picker.image, 1).unwrap();
        assert!(picker.handle(PickerEvent::Click { button: MouseButton::Left, x: truth[0], y: truth[1] }).unwrap());
        assert!(picker.handle(PickerEvent::Click { button: MouseButton::Right, x: truth[0] + ring, y: truth[1] }).unwrap());
        assert!((picker.radius() - ring).abs() < 1e-9);
        let peaks: Vec<f64> = picker.profiles().iter().flatten().map(peak_radius).collect();
        assert_eq!(peaks.len(), 6);
        for p in peaks {
            assert!((p - ring).abs() < 2.0, "sector peak at {p}, ring at {ring}");
        }
        assert!(!picker.handle(PickerEvent::Close).unwrap());
        assert_eq!(im.center(), truth);
    }

    #[test]
    fn keys_and_scroll_move_center_radius_and_width() {
        let mut im = agbe([128.0, 128.0]);
        let mut picker = BeamCenterPicker::new(&mut im, 8, 4).unwrap();
        let (r0, w0) = (picker.radius(), picker.width());
        picker.handle(PickerEvent::Key { key: Key::Up, ctrl: true }).unwrap();
        picker.handle(PickerEvent::Key { key: Key::Right, ctrl: false }).unwrap();
        let c = picker.center();
        assert!((c[0] - 127.9).abs() < 1e-12 && c[1] == 129.0);
        picker.handle(PickerEvent::Key { key: Key::Plus, ctrl: false }).unwrap();
        picker.handle(PickerEvent::Scroll { up: true }).unwrap();
        picker.handle(PickerEvent::Key { key: Key::Plus, ctrl: true }).unwrap();
        assert_eq!(picker.radius(), r0 + 2.0);
        assert_eq!(picker.width(), w0 + 1.0);
        picker.handle(PickerEvent::Scroll { up: false }).unwrap();
        assert_eq!(picker.radius(), r0 + 1.0);
        let view = picker.view();
        assert_eq!(view.clicks, ClickArea::Image);
        assert_eq!(view.circle.map(|c| c.1), Some(r0 + 1.0));
    }

    #[test]
    fn detector_picker_steps_and_thresholds() {
        let mut im = agbe([128.0, 128.0]);
        let opts = OffsetOptions { lattice: LatticeOptions::default().domainsize(100.0), ..Default::default() };
        let mut picker = DetectorPositionPicker::new(&mut im, Lattice::agbe(), &opts).unwrap();
        assert_eq!(picker.step(StepTarget::Distance), 0.01);
        picker.handle(PickerEvent::CycleStep(StepTarget::Distance)).unwrap();
        picker.handle(PickerEvent::CycleStep(StepTarget::Distance)).unwrap();
        assert_eq!(picker.step(StepTarget::Distance), 0.0001);
        picker.handle(PickerEvent::Step { button: StepButton::Distance, increase: true }).unwrap();
        picker.handle(PickerEvent::Step { button: StepButton::Alpha, increase: false }).unwrap();
        picker.handle(PickerEvent::Step { button: StepButton::CenterCol, increase: true }).unwrap();

        let (_, vmax) = picker.thresholds();
        picker.handle(PickerEvent::Click { button: MouseButton::Left, x: 1.0, y: vmax }).unwrap();
        let (lo, hi) = picker.thresholds();
        assert_eq!(lo, vmax);
        assert!((hi - 1.1 * vmax).abs() < 1e-9);
        assert!(picker.handle(PickerEvent::Close).is_ok_and(|open| !open));
        let g = im.geometry();
        assert!((g.detector_distance.unwrap() - 0.4001).abs() < 1e-12);
        assert_eq!(g.alpha, -3.0);
        assert_eq!(g.center, [128.0, 129.0]);
    }

    #[test]
    fn distance_never_goes_negative() {
        let mut im = agbe([128.0, 128.0]);
        let opts = OffsetOptions { distance: Some(0.05), ..Default::default() };
        let mut picker = DetectorPositionPicker::new(&mut im, Lattice::agbe(), &opts).unwrap();
        picker.handle(PickerEvent::CycleStep(StepTarget::Distance)).unwrap();
        picker.handle(PickerEvent::Step { button: StepButton::Distance, increase: false }).unwrap();
        picker.handle(PickerEvent::Close).unwrap();
        assert_eq!(im.geometry().detector_distance, Some(0.05));
    }

    #[test]
    fn simulated_overlay_matches_measured_first_peak() {
        let mut im = agbe([128.0, 128.0]);
        let opts = OffsetOptions { lattice: LatticeOptions::default().domainsize(200.0), ..Default::default() };
        let picker = DetectorPositionPicker::new(&mut im, Lattice::agbe(), &opts).unwrap();
        let q1 = AgBeReference::peak_position(1);
        let near = |s: &Series| {
            let w = s.x_range(q1 - 0.3, q1 + 0.3);
            peak_radius(&w)
        };
        assert!((near(picker.measured()) - q1).abs() < 0.05);
        assert!((near(picker.simulated()) - q1).abs() < 0.05);
        assert!(picker.reflections().iter().any(|(_, q)| (q - q1).abs() < 1e-3));
        let view = picker.view();
        assert_eq!(view.curves.len(), 2);
        assert_eq!(view.highlight.map(|h| h.len()), Some(256 * 256));
    }
}
