//! Colormapped 8-bit rendering for previews and publication figures.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{Result, SasError};
use crate::image::SasImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Colormap {
    /// Jet-like rainbow.
    #[default]
    Turbo,
    Viridis,
    Inferno,
    Magma,
    Plasma,
    Greys,
}

impl Colormap {
    fn gradient(self) -> colorous::Gradient {
        match self {
            Colormap::Turbo => colorous::TURBO,
            Colormap::Viridis => colorous::VIRIDIS,
            Colormap::Inferno => colorous::INFERNO,
            Colormap::Magma => colorous::MAGMA,
            Colormap::Plasma => colorous::PLASMA,
            Colormap::Greys => colorous::GREYS,
        }
    }
}

impl FromStr for Colormap {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "turbo" | "jet" => Ok(Colormap::Turbo),
            "viridis" => Ok(Colormap::Viridis),
            "inferno" => Ok(Colormap::Inferno),
            "magma" => Ok(Colormap::Magma),
            "plasma" => Ok(Colormap::Plasma),
            "greys" | "grays" | "gray" => Ok(Colormap::Greys),
            other => Err(SasError::config(format!("unknown colormap '{other}'"))),
        }
    }
}

/// Intensity scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorScale {
    Norm,
    /// Logarithmic over the positive values; the rest get the lowest color.
    Log,
    /// Linear within `±linthresh`, logarithmic outside; `linscale` stretches
    /// the linear part in decades.
    Sym { linthresh: f64, linscale: f64 },
}

impl Default for ColorScale {
    fn default() -> Self {
        ColorScale::Log
    }
}

impl FromStr for ColorScale {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "norm" | "lin" | "linear" => Ok(ColorScale::Norm),
            "log" => Ok(ColorScale::Log),
            "sym" | "symlog" => Ok(ColorScale::Sym { linthresh: 1.0, linscale: 1.0 }),
            other => Err(SasError::config(format!("unknown intensity scale '{other}' (norm, log or sym)"))),
        }
    }
}

impl ColorScale {
    fn transform(self, v: f64) -> Option<f64> {
        match self {
            ColorScale::Norm => Some(v),
            ColorScale::Log => (v > 0.0).then(|| v.log10()),
            ColorScale::Sym { linthresh, linscale } => {
                let adj = linscale / (1.0 - 0.1);
                Some(if v.abs() <= linthresh {
                    v * adj / linthresh
                } else {
                    v.signum() * (adj + (v.abs() / linthresh).log10())
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderOptions {
    pub scale: ColorScale,
    pub colormap: Colormap,
    /// Run the colormap backwards.
    pub inverse: bool,
}

impl RenderOptions {
    pub fn scale(mut self, scale: ColorScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }
}

impl SasImage {
    /// 8-bit RGB rendering; masked pixels are black.
    pub fn as_image(&self, opts: &RenderOptions) -> Result<RgbImage> {
        if opts.scale == ColorScale::Log && !self.unmasked().any(|v| v > 0.0) {
            return Err(SasError::config("log scale needs positive unmasked values"));
        }
        let scaled: Vec<Option<f64>> = self
            .data
            .iter()
            .zip(&self.mask)
            .map(|(v, m)| if *m { None } else { opts.scale.transform(*v) })
            .collect();
        let (lo, hi) = scaled
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let range = hi - lo;
        let gradient = opts.colormap.gradient();

        let rgb: Vec<u8> = scaled
            .iter()
            .zip(&self.mask)
            .flat_map(|(v, m)| {
                if *m {
                    return [0, 0, 0];
                }
                let t = match v {
                    Some(v) if range > 0.0 => (v - lo) / range,
                    Some(_) => 0.5,
                    None => 0.0,
                };
                let t = if opts.inverse { 1.0 - t } else { t };
                let c = gradient.eval_continuous(t.clamp(0.0, 1.0));
                [c.r, c.g, c.b]
            })
            .collect();
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(self.cols as u32, self.rows as u32, rgb)
            .ok_or_else(|| SasError::format("pixel buffer does not match the image size"))
    }

    /// Render and save as PNG under `path` with its extension set to `.png`.
    pub fn save_png(&self, path: impl AsRef<Path>, opts: &RenderOptions) -> Result<PathBuf> {
        let path = path.as_ref().with_extension("png");
        self.as_image(opts)?.save(&path)?;
        log::info!("saved {}", path.display());
        Ok(path)
    }
}
