//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that parses the
//! command line, loads inputs, calls into the library and writes or prints
//! the results.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::beam::{prepare_beam_profile, BeamProfile, ProfileKind, ProfileOptions, ProfileSource, SansGeometry};
use crate::cli::{
    AgbeArgs, AzimuthArgs, Command, ConvertArgs, DesmearArgs, ImageArgs, InfoArgs, OutputArgs, PickCenterArgs,
    PickOffsetArgs, PlotArgs, ProfileArgs, RadialArgs, ReduceArgs, SmearArgs, WaterArgs,
};
use crate::error::{Result, SasError};
use crate::image::{AzimuthOptions, RadialOptions, RenderOptions, SasImage, SaveFill};
use crate::io::{read_series, write_series};
use crate::lattice::{Lattice, LatticeOptions};
use crate::math::grid::linspace;
use crate::picker::{headless, OffsetOptions};
use crate::plot::{render_ascii_plot, Axes, Style};
use crate::reference::{agbe_reference, water_xray_scattering};
use crate::series::Series;
use crate::smear::{desmear, smear, DesmearOptions};

/// Entry point for the `sas` binary.
pub fn run() -> Result<()> {
    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Radial(args) => handle_radial(args),
        Command::Azimuth(args) => handle_azimuth(args),
        Command::Smear(args) => handle_smear(args),
        Command::Desmear(args) => handle_desmear(args),
        Command::Water(args) => handle_water(args),
        Command::Agbe(args) => handle_agbe(args),
        Command::PickCenter(args) => handle_pick_center(args),
        Command::PickOffset(args) => handle_pick_offset(args),
        Command::Reduce(args) => handle_reduce(args),
        Command::Convert(args) => handle_convert(args),
        Command::Plot(args) => handle_plot(args),
        Command::Info(args) => handle_info(args),
    }
}

fn image_path(args: &ImageArgs) -> Result<PathBuf> {
    match &args.image {
        Some(path) => crate::cli::picker::validate_image_path(path),
        None => crate::cli::picker::prompt_for_image_path(),
    }
}

fn load_image(args: &ImageArgs) -> Result<SasImage> {
    let path = image_path(args)?;
    SasImage::from_file(&path, &args.overrides()?)
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

/// Write and/or plot a 1-D result. Without an output file the table goes to
/// stdout.
fn emit(series: &Series, out: &OutputArgs) -> Result<()> {
    match &out.output {
        Some(path) => {
            write_series(series, path)?;
            log::info!("wrote {}", path.display());
        }
        None if !out.plot => print!("{}", crate::io::format_table(series)),
        None => {}
    }
    if out.plot {
        println!("{}", render_ascii_plot(&[(series, Style::Points)], out.width, out.height, Axes::default()));
    }
    Ok(())
}

fn handle_radial(args: RadialArgs) -> Result<()> {
    let mut image = load_image(&args.image)?;
    let opts = RadialOptions::default()
        .number(args.bins)
        .kind(args.spacing)
        .error(args.error)
        .units(args.units);
    let profile = image.radial_average(&opts)?;
    emit(&profile, &args.output)
}

fn handle_azimuth(args: AzimuthArgs) -> Result<()> {
    let mut image = load_image(&args.image)?;
    let mut opts = AzimuthOptions::default().number(args.bins).error(args.error);
    opts.qrange = (args.qmin, args.qmax);
    let profile = image.azimuth_average(&opts)?;
    emit(&profile, &args.output)
}

/// Build the beam profile from the first source given on the command line.
fn beam_profile(args: &ProfileArgs) -> Result<BeamProfile> {
    let line_opts = |opts: ProfileOptions| {
        let opts = match args.diw {
            Some(diw) => opts.diw(diw),
            None => opts,
        };
        match args.bxw {
            Some(bxw) => opts.bxw(bxw),
            None => opts,
        }
    };
    if let Some(path) = &args.beam {
        let trace = read_series(path)?;
        return prepare_beam_profile(ProfileSource::Measured(&trace), &line_opts(ProfileOptions::default()));
    }
    if let Some(ab) = &args.trapez {
        let [a, b] = ab.as_slice() else {
            return Err(SasError::config("--trapez needs two lengths"));
        };
        return prepare_beam_profile(ProfileSource::Kind(ProfileKind::Trapez), &line_opts(ProfileOptions::trapez(*a, *b)));
    }
    if args.sans {
        let geometry = SansGeometry {
            coll_dist: args.coll_dist,
            det_dist: args.det_dist,
            wavelength: args.sans_wavelength,
            wavespread: args.wavespread,
            ..SansGeometry::default()
        };
        return prepare_beam_profile(ProfileSource::Kind(ProfileKind::Sans), &ProfileOptions::sans(&geometry));
    }
    if let Some(sigma) = args.sigma {
        return prepare_beam_profile(ProfileSource::Sigma(sigma), &ProfileOptions::default());
    }
    Err(SasError::config("no beam profile given (use --beam, --trapez, --sans or --sigma)"))
}

fn handle_smear(args: SmearArgs) -> Result<()> {
    let data = read_series(&args.input)?;
    let profile = beam_profile(&args.profile)?;
    log::info!("smearing {} points with a {} profile", data.len(), profile.kind().as_str());
    let smeared = smear(&data, &profile)?;
    emit(&smeared, &args.output)
}

fn handle_desmear(args: DesmearArgs) -> Result<()> {
    let observed = read_series(&args.input)?;
    let profile = beam_profile(&args.profile)?;
    let opts = DesmearOptions {
        iterations: args.iterations,
        window: args.window,
        window_kind: args.window_kind,
        qmax: args.qmax,
    };
    let result = desmear(&observed, &profile, &opts)?;
    for (k, step) in result.steps.iter().enumerate() {
        let mark = if k == result.best { "*" } else { " " };
        eprintln!("{mark}{k:>3}  gamma={:.4e}  chi2={:.4e}", step.gamma, step.chi2);
    }
    emit(result.result(), &args.output)
}

fn handle_water(args: WaterArgs) -> Result<()> {
    let i0 = water_xray_scattering(&args.composition, args.temperature, args.units)?;
    println!("I(0) = {i0:.6e} 1/cm  ({} at {} K)", args.composition.join(" "), args.temperature);
    Ok(())
}

fn handle_agbe(args: AgbeArgs) -> Result<()> {
    if !(args.qmax > args.qmin) || args.points < 2 {
        return Err(SasError::config("agbe needs qmax > qmin and at least 2 points"));
    }
    let q = linspace(args.qmin, args.qmax, args.points);
    let profile = agbe_reference(&q, args.wavelength, &args.amplitudes)?;
    emit(&profile, &args.output)
}

/// Interactive steps need a terminal; report them as skipped otherwise.
fn require_interactive(step: &str) -> Result<()> {
    if headless() {
        return Err(SasError::Headless(step.to_string()));
    }
    Ok(())
}

fn print_geometry(image: &SasImage) {
    let g = image.geometry();
    println!(
        "center=[{:.2}, {:.2}] distance={:?} alpha={:.3} beta={:.3} gamma={:.3}",
        g.center[0], g.center[1], g.detector_distance, g.alpha, g.beta, g.gamma
    );
}

fn save_geometry(image: &SasImage, output: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = output {
        let written = image.save_as_tif(path, SaveFill::default())?;
        log::info!("wrote {}", written.display());
    }
    Ok(())
}

fn handle_pick_center(args: PickCenterArgs) -> Result<()> {
    require_interactive("pick-center")?;
    let mut image = load_image(&args.image)?;
    image.pick_beamcenter(args.levels, args.symmetry)?;
    print_geometry(&image);
    save_geometry(&image, args.output.as_ref())
}

fn handle_pick_offset(args: PickOffsetArgs) -> Result<()> {
    require_interactive("pick-offset")?;
    let mut image = load_image(&args.image)?;
    let lattice = Lattice::from_kind(args.lattice, args.a, None)?;
    let opts = OffsetOptions { lattice: LatticeOptions::default().hklmax(args.hklmax), ..OffsetOptions::default() };
    image.calibrate_offset_detector(lattice, &opts)?;
    print_geometry(&image);
    save_geometry(&image, args.output.as_ref())
}

fn handle_reduce(args: ReduceArgs) -> Result<()> {
    let path = image_path(&args.image)?;
    let image = SasImage::from_file(&path, &args.image.overrides()?)?;
    let reduced = image.reduce_size(args.bin, None, args.border)?;
    let output = args.output.unwrap_or_else(|| {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
        path.with_file_name(format!("{stem}_reduced.tif"))
    });
    let written = reduced.save_as_tif(&output, SaveFill::default())?;
    let (rows, cols) = reduced.shape();
    println!("{} ({rows}x{cols})", written.display());
    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<()> {
    if !is_tiff(&args.input) {
        let series = read_series(&args.input)?;
        write_series(&series, &args.output)?;
        log::info!("wrote {}", args.output.display());
        return Ok(());
    }
    let image = SasImage::from_file(&args.input, &Default::default())?;
    let ext = args.output.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let written = match ext.as_deref() {
        Some("png") => {
            let opts = RenderOptions::default().scale(args.color_scale()?).colormap(args.colormap);
            image.save_png(&args.output, &opts)?
        }
        Some("tif" | "tiff") => image.save_as_tif(&args.output, SaveFill::default())?,
        _ => {
            let table = image.as_data_array(args.masked_fill()?)?;
            write_series(&table, &args.output)?;
            args.output.clone()
        }
    };
    log::info!("wrote {}", written.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<()> {
    let series = args.inputs.iter().map(|p| read_series(p)).collect::<Result<Vec<_>>>()?;
    let styled: Vec<(&Series, Style)> = series
        .iter()
        .enumerate()
        .map(|(k, s)| (s, if args.lines && k > 0 { Style::Line } else { Style::Points }))
        .collect();
    let axes = Axes { log_x: !args.linear_x, log_y: !args.linear_y };
    println!("{}", render_ascii_plot(&styled, args.width, args.height, axes));
    Ok(())
}

fn handle_info(args: InfoArgs) -> Result<()> {
    if is_tiff(&args.input) {
        let image = SasImage::from_file(&args.input, &Default::default())?;
        let (rows, cols) = image.shape();
        println!("image     {}", args.input.display());
        println!("shape     {rows} x {cols}");
        println!("masked    {}", image.masked_count());
        if !image.description.is_empty() {
            println!("desc      {}", image.description);
        }
        print_geometry(&image);
        for (name, value) in image.attrs() {
            println!("{name:<24} {value}");
        }
        return Ok(());
    }
    let series = read_series(&args.input)?;
    println!("series    {}", args.input.display());
    println!("points    {}", series.len());
    println!("columns   {}", crate::io::column_headers(&series).join(" "));
    if let Some(name) = &series.modelname {
        println!("model     {name}");
    }
    for line in &series.comment {
        println!("# {line}");
    }
    for (name, value) in series.attrs() {
        println!("{name:<24} {value}");
    }
    Ok(())
}
