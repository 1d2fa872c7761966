//! Command-line parsing for the `sas` tool.
//!
//! Parsing lives here, dispatch in [`crate::app`]; neither touches the
//! numerics directly.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{Result, SasError};
use crate::image::{ColorScale, Colormap, ErrorModel, ImageOverrides, IntensityUnits, MaskedFill};
use crate::lattice::LatticeKind;
use crate::math::grid::Spacing;
use crate::math::smooth::SmoothWindow;
use crate::reference::ConcentrationUnit;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sas", version, about = "Small-angle scattering data reduction and resolution tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Radial average of a detector image.
    Radial(RadialArgs),
    /// Azimuthal average within a |q| ring.
    Azimuth(AzimuthArgs),
    /// Smear an ideal curve with a beam profile.
    Smear(SmearArgs),
    /// Iterative desmearing of a measured curve.
    Desmear(DesmearArgs),
    /// Forward scattering of water or an aqueous solution (absolute scale).
    Water(WaterArgs),
    /// Ideal silver behenate reference profile.
    Agbe(AgbeArgs),
    /// Interactive beam center picker.
    PickCenter(PickCenterArgs),
    /// Interactive alignment of an offset/tilted detector.
    PickOffset(PickOffsetArgs),
    /// Bin and crop a detector image.
    Reduce(ReduceArgs),
    /// Convert between file formats (tables, PDH, CSV, JSON, TIFF, PNG).
    Convert(ConvertArgs),
    /// ASCII plot of one or more curves.
    Plot(PlotArgs),
    /// Print what a file contains.
    Info(InfoArgs),
}

/// Detector image plus geometry overrides.
#[derive(Debug, Args, Clone)]
pub struct ImageArgs {
    /// TIFF image; an interactive chooser lists the images of the current
    /// directory when omitted.
    pub image: Option<PathBuf>,

    /// Beam center as row and column in pixels.
    #[arg(long, num_args = 2, value_names = ["ROW", "COL"])]
    pub center: Option<Vec<f64>>,

    /// Sample-detector distance in m.
    #[arg(long)]
    pub distance: Option<f64>,

    /// Wavelength in Å.
    #[arg(long)]
    pub wavelength: Option<f64>,

    /// Pixel size in m (square pixels).
    #[arg(long)]
    pub pixel_size: Option<f64>,

    /// Detector rotation angles in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub alpha: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub beta: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub gamma: Option<f64>,

    /// Mask pixels with values below this.
    #[arg(long, allow_hyphen_values = true)]
    pub maskbelow: Option<f64>,
}

impl ImageArgs {
    pub fn overrides(&self) -> Result<ImageOverrides<'static>> {
        let center = match self.center.as_deref() {
            None => None,
            Some([row, col]) => Some([*row, *col]),
            Some(other) => return Err(SasError::config(format!("--center needs 2 values, got {}", other.len()))),
        };
        Ok(ImageOverrides {
            center,
            detector_distance: self.distance,
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
            pixel_size: self.pixel_size.map(|p| [p, p]),
            wavelength: self.wavelength,
            copy: None,
            maskbelow: self.maskbelow,
        })
    }
}

/// Where a 1-D result goes and whether to show it.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Output file; `.csv` and `.json` by extension, a text table otherwise.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Show an ASCII plot of the result.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args)]
pub struct RadialArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    #[arg(short = 'n', long, default_value_t = 300)]
    pub bins: usize,

    #[arg(long, value_enum, default_value_t = Spacing::Log)]
    pub spacing: Spacing,

    #[arg(long, value_enum, default_value_t = ErrorModel::None)]
    pub error: ErrorModel,

    #[arg(long, value_enum, default_value_t = IntensityUnits::Pixel)]
    pub units: IntensityUnits,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct AzimuthArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Lower |q| of the ring in 1/nm.
    #[arg(long)]
    pub qmin: Option<f64>,

    /// Upper |q| of the ring in 1/nm.
    #[arg(long)]
    pub qmax: Option<f64>,

    #[arg(short = 'n', long, default_value_t = 180)]
    pub bins: usize,

    #[arg(long, value_enum, default_value_t = ErrorModel::None)]
    pub error: ErrorModel,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Beam profile selection; exactly one source is used, in the order
/// measured, trapezoid, SANS, σ.
#[derive(Debug, Args, Clone)]
pub struct ProfileArgs {
    /// Measured primary-beam trace (line collimation).
    #[arg(long, value_name = "FILE")]
    pub beam: Option<PathBuf>,

    /// Trapezoidal beam length profile, lengths `a < b` in 1/nm.
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    pub trapez: Option<Vec<f64>>,

    /// Pin-hole SANS resolution with the geometry below.
    #[arg(long)]
    pub sans: bool,

    /// One Gaussian σ for all q, in 1/nm.
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Detector slit width in 1/nm (line collimation).
    #[arg(long)]
    pub diw: Option<f64>,

    /// Beam width HWHM in 1/nm (line collimation).
    #[arg(long)]
    pub bxw: Option<f64>,

    /// SANS collimation length in mm.
    #[arg(long, default_value_t = 8000.0)]
    pub coll_dist: f64,

    /// SANS sample-detector distance in mm.
    #[arg(long, default_value_t = 8000.0)]
    pub det_dist: f64,

    /// SANS wavelength in nm.
    #[arg(long, default_value_t = 0.5)]
    pub sans_wavelength: f64,

    /// SANS relative wavelength spread Δλ/λ.
    #[arg(long, default_value_t = 0.2)]
    pub wavespread: f64,
}

#[derive(Debug, Args)]
pub struct SmearArgs {
    /// Ideal curve (table, PDH or JSON).
    pub input: PathBuf,

    #[command(flatten)]
    pub profile: ProfileArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct DesmearArgs {
    /// Measured, smeared curve.
    pub input: PathBuf,

    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Maximum number of iterations; negative values stop early once γ
    /// stops decreasing.
    #[arg(long, default_value_t = -15, allow_hyphen_values = true)]
    pub iterations: i32,

    /// Smoothing window (points).
    #[arg(long, default_value_t = 4)]
    pub window: usize,

    #[arg(long, value_enum, default_value_t = SmoothWindow::Flat)]
    pub window_kind: SmoothWindow,

    /// Upper q of the convergence metric in 1/nm.
    #[arg(long, default_value_t = 4.0)]
    pub qmax: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct WaterArgs {
    /// Components as `<amount><element><count>...`, e.g. `55.51h2o1` or
    /// `0.1na1`.
    #[arg(default_values_t = [String::from("55.51h2o1")])]
    pub composition: Vec<String>,

    /// Temperature in K.
    #[arg(short = 't', long, default_value_t = 293.15)]
    pub temperature: f64,

    #[arg(long, value_enum, default_value_t = ConcentrationUnit::Mol)]
    pub units: ConcentrationUnit,
}

#[derive(Debug, Args)]
pub struct AgbeArgs {
    /// Lower q in 1/nm.
    #[arg(long, default_value_t = 0.5)]
    pub qmin: f64,

    /// Upper q in 1/nm.
    #[arg(long, default_value_t = 5.0)]
    pub qmax: f64,

    #[arg(short = 'n', long, default_value_t = 1000)]
    pub points: usize,

    /// Wavelength in nm.
    #[arg(long, default_value_t = 0.15418)]
    pub wavelength: f64,

    /// Peak amplitudes, first order first.
    #[arg(long, num_args = 1.., default_values_t = [1.0, 0.3, 0.3])]
    pub amplitudes: Vec<f64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct PickCenterArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Number of contour levels in the image view.
    #[arg(long, default_value_t = 8)]
    pub levels: usize,

    /// Number of sectors compared around the ring.
    #[arg(long, default_value_t = 4)]
    pub symmetry: usize,

    /// Save the image with the picked geometry (TIFF).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PickOffsetArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Reference crystal.
    #[arg(long, value_enum, default_value_t = LatticeKind::Agbe)]
    pub lattice: LatticeKind,

    /// Lattice constant in nm (ignored for AgBe).
    #[arg(long, default_value_t = 5.8378)]
    pub a: f64,

    /// Highest Miller index of the simulated reflections.
    #[arg(long, default_value_t = 17)]
    pub hklmax: usize,

    /// Save the image with the aligned geometry (TIFF).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReduceArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Bin size in pixels.
    #[arg(long, default_value_t = 2)]
    pub bin: usize,

    /// Half size of the crop box around the center in pixels.
    #[arg(long)]
    pub border: Option<usize>,

    /// Output TIFF; `<input>_reduced.tif` when omitted.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Curve (table, PDH, JSON) or detector image (TIFF).
    pub input: PathBuf,

    /// Target file. Images go to `.png`, `.tif` or a pixel table; curves to
    /// `.csv`, `.json` or a text table.
    pub output: PathBuf,

    /// Treatment of masked pixels in pixel tables: a number, remove,
    /// linear, cubic, nearest or radial.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub masked: String,

    #[arg(long, value_enum, default_value_t = Colormap::Turbo)]
    pub colormap: Colormap,

    /// Intensity scale of PNG renderings: norm, log or sym.
    #[arg(long, default_value = "log")]
    pub scale: String,
}

impl ConvertArgs {
    pub fn masked_fill(&self) -> Result<MaskedFill> {
        self.masked.parse()
    }

    pub fn color_scale(&self) -> Result<ColorScale> {
        self.scale.parse()
    }
}

#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Curves to overlay; the first is drawn as points, later ones as lines
    /// when `--lines` is given.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Draw all but the first curve as lines.
    #[arg(long)]
    pub lines: bool,

    /// Linear x axis.
    #[arg(long)]
    pub linear_x: bool,

    /// Linear y axis.
    #[arg(long)]
    pub linear_y: bool,

    #[arg(long, default_value_t = 100)]
    pub width: usize,

    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    pub input: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radial_defaults() {
        let cli = Cli::parse_from(["sas", "radial", "scan.tif", "--center", "100", "120.5"]);
        let Command::Radial(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.bins, 300);
        assert_eq!(args.spacing, Spacing::Log);
        let o = args.image.overrides().unwrap();
        assert_eq!(o.center, Some([100.0, 120.5]));
        assert!(o.detector_distance.is_none());
    }

    #[test]
    fn image_path_is_optional() {
        let cli = Cli::parse_from(["sas", "pick-center", "--levels", "5"]);
        let Command::PickCenter(args) = cli.command else { panic!("wrong subcommand") };
        assert!(args.image.image.is_none());
        assert_eq!(args.levels, 5);
    }

    #[test]
    fn desmear_accepts_negative_iterations() {
        let cli = Cli::parse_from(["sas", "desmear", "curve.dat", "--trapez", "0.1", "0.3", "--iterations", "-20"]);
        let Command::Desmear(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.iterations, -20);
        assert_eq!(args.profile.trapez, Some(vec![0.1, 0.3]));
    }

    #[test]
    fn convert_options_parse() {
        let cli = Cli::parse_from(["sas", "convert", "a.tif", "a.dat", "--masked", "nearest"]);
        let Command::Convert(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.masked_fill().unwrap(), MaskedFill::Nearest);
        assert_eq!(args.color_scale().unwrap(), ColorScale::Log);
    }

    #[test]
    fn water_defaults_to_pure_water() {
        let cli = Cli::parse_from(["sas", "water"]);
        let Command::Water(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.composition, vec!["55.51h2o1".to_string()]);
    }
}
