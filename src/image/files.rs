//! TIFF reading and writing, directory listings.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::error::{Result, SasError};
use crate::image::exif::{self, TAG_AP_DISTANCE, TAG_AP_WAVELENGTH};
use crate::image::{Geometry, ImageOverrides, SasImage};

const TAG_IMAGE_DESCRIPTION: u16 = 270;
const TAG_ARTIST: u16 = 315;
/// Text tags kept in [`SasImage::tags`] and written back on save. Tags above
/// 700 are not carried over, except the Anton Paar ones.
const TEXT_TAGS: &[u16] = &[269, 271, 272, 285, 305, 306, 316];

/// Value written into masked pixels by [`SasImage::save_as_tif`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SaveFill {
    Value(f64),
    /// Smallest finite 32-bit float.
    Min,
}

impl Default for SaveFill {
    fn default() -> Self {
        SaveFill::Value(-1.0)
    }
}

impl SaveFill {
    fn value(self) -> f64 {
        match self {
            SaveFill::Value(v) => v,
            SaveFill::Min => f32::MIN as f64,
        }
    }
}

#[allow(unreachable_patterns)]
fn frame_values(frame: DecodingResult) -> Result<Vec<f64>> {
    Ok(match frame {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => return Err(SasError::format("unsupported TIFF sample format")),
    })
}

fn text_tag<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>, code: u16) -> Option<String> {
    match decoder.find_tag(Tag::from_u16_exhaustive(code)) {
        Ok(Some(value)) => match value.into_string() {
            Ok(s) => Some(s),
            Err(_) => {
                log::warn!("TIFF tag {code} is not text, ignored");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("TIFF tag {code} unreadable: {e}");
            None
        }
    }
}

fn number_tag<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>, code: u16) -> Option<String> {
    let value = decoder.find_tag(Tag::Unknown(code)).ok().flatten()?;
    match value.clone().into_f64() {
        Ok(v) => Some(v.to_string()),
        Err(_) => value.into_string().ok(),
    }
}

impl SasImage {
    /// Read a detector TIFF.
    ///
    /// Integer and float grey images are accepted. Frames of a multi-page file
    /// are stacked along the rows. Instrument keywords in the ImageDescription
    /// and Artist fields set geometry and attributes; `overrides` win over the
    /// file header.
    pub fn from_file(path: impl AsRef<Path>, overrides: &ImageOverrides<'_>) -> Result<SasImage> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;
        let (width, _) = decoder.dimensions()?;
        let cols = width as usize;

        let description = text_tag(&mut decoder, TAG_IMAGE_DESCRIPTION);
        let artist = text_tag(&mut decoder, TAG_ARTIST);
        let mut tags = std::collections::BTreeMap::new();
        for &code in TEXT_TAGS {
            if let Some(text) = text_tag(&mut decoder, code) {
                tags.insert(code, text);
            }
        }
        for code in [TAG_AP_WAVELENGTH, TAG_AP_DISTANCE] {
            if let Some(text) = number_tag(&mut decoder, code) {
                tags.insert(code, text);
            }
        }

        let mut data = Vec::new();
        loop {
            let (w, _) = decoder.dimensions()?;
            if w as usize != cols {
                return Err(SasError::format(format!(
                    "{}: frames of width {w} and {cols} cannot be stacked",
                    path.display()
                )));
            }
            data.extend(frame_values(decoder.read_image()?)?);
            if !decoder.more_images() {
                break;
            }
            decoder.next_image()?;
        }
        if cols == 0 || data.is_empty() || data.len() % cols != 0 {
            return Err(SasError::format(format!("{}: empty or truncated image", path.display())));
        }
        let rows = data.len() / cols;

        let mut image = SasImage::from_parts(rows, cols, data, Geometry::centered(rows, cols));
        image.filename = Some(path.to_path_buf());
        image.image_description = description.as_deref().map(exif::description_lines).unwrap_or_default();
        image.artist = artist.as_deref().map(exif::artist_lines).unwrap_or_default();
        image.tags = tags;
        image.extract_keywords();
        log::debug!("read {} ({rows}x{cols})", path.display());
        image.with_overrides(overrides)
    }

    /// Store as 32-bit float TIFF with masked pixels set to `fill`.
    ///
    /// The header keeps the free text lines and refreshes the known keywords
    /// from the current geometry, so the file reads back with the same setup.
    /// A missing `.tif`/`.tiff` extension is appended.
    pub fn save_as_tif(&self, path: impl AsRef<Path>, fill: SaveFill) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        let has_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
        if !has_ext {
            let mut name = path.as_os_str().to_os_string();
            name.push(".tif");
            path = PathBuf::from(name);
        }
        let fill = fill.value();
        let values: Vec<f32> =
            self.data.iter().zip(&self.mask).map(|(v, m)| if *m { fill as f32 } else { *v as f32 }).collect();

        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(&path)?))?;
        let mut frame = encoder.new_image::<colortype::Gray32Float>(self.cols as u32, self.rows as u32)?;
        let description = self.header_description();
        frame.encoder().write_tag(Tag::ImageDescription, description.as_str())?;
        if !self.artist.is_empty() {
            let artist = self.artist.join("\n");
            frame.encoder().write_tag(Tag::Artist, artist.as_str())?;
        }
        for (code, text) in &self.tags {
            frame.encoder().write_tag(Tag::from_u16_exhaustive(*code), text.as_str())?;
        }
        frame.write_data(&values)?;
        log::info!("saved {}", path.display());
        Ok(path)
    }
}

/// All images in `dir` with extension `ext` (case-insensitive), by file name.
pub fn read_images(dir: impl AsRef<Path>, ext: &str) -> Result<Vec<SasImage>> {
    let ext = ext.trim_start_matches('.');
    let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(ext)))
        .collect();
    paths.sort();
    paths.iter().map(|p| SasImage::from_file(p, &ImageOverrides::default())).collect()
}

fn common_prefix<'a>(names: &[&'a str]) -> &'a str {
    let Some(first) = names.first() else { return "" };
    let mut len = first.len();
    for name in &names[1..] {
        len = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(len);
    }
    &first[..len]
}

/// Write `ContentOf_<common file prefix>.txt` into `out_dir`, listing every
/// image file with its description. Returns the path written.
pub fn create_image_descriptions(images: &[SasImage], out_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let names: Vec<String> = images
        .iter()
        .map(|im| im.filename.as_ref().map(|f| f.display().to_string()).unwrap_or_default())
        .collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let prefix = common_prefix(&refs);
    let (dir, common) = match prefix.rfind(std::path::MAIN_SEPARATOR) {
        Some(i) => (&prefix[..i], &prefix[i + 1..]),
        None => ("", prefix),
    };
    let mut lines: Vec<String> = names
        .iter()
        .zip(images)
        .map(|(name, im)| format!("{}   {}", &name[dir.len()..], im.description))
        .collect();
    lines.sort();

    let common = if common.is_empty() { "--" } else { common };
    let path = out_dir.as_ref().join(format!("ContentOf_{common}.txt"));
    let mut out = BufWriter::new(File::create(&path)?);
    writeln!(out, "Content of dir {dir}")?;
    writeln!(out, " ")?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::synthetic;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sas-tools-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn tif_round_trip_keeps_data_mask_and_geometry() {
        let dir = scratch_dir("roundtrip");
        let mut im = synthetic::gaussian_spot(12, 9, [5.0, 4.0], 2.0, 50.0, 1.0, synthetic::saxs_geometry([5.5, 4.5]));
        im.mask_region(0, 2, 0, 3);
        im.description = "buffer".to_string();
        im.image_description.push("operator kim".to_string());
        let path = im.save_as_tif(dir.join("spot"), SaveFill::default()).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("tif"));

        let back = SasImage::from_file(&path, &ImageOverrides::default()).unwrap();
        assert_eq!(back.shape(), (12, 9));
        assert_eq!(back.mask(), im.mask());
        let k = im.index(5, 4);
        assert!((back.data()[k] - im.data()[k]).abs() < 1e-4);
        assert_eq!(back.data()[0], -1.0);
        assert_eq!(back.center(), [5.5, 4.5]);
        assert!((back.geometry().detector_distance.unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(back.geometry().pixel_size, Some([172e-6, 172e-6]));
        assert_eq!(back.description, "buffer");
        assert_eq!(back.image_description, vec!["operator kim".to_string()]);

        let over = ImageOverrides { detector_distance: Some(1.2), ..Default::default() };
        let moved = SasImage::from_file(&path, &over).unwrap();
        assert_eq!(moved.geometry().detector_distance, Some(1.2));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn directory_listing_and_descriptions() {
        let dir = scratch_dir("listing");
        for (i, desc) in ["water", "AgBe"].iter().enumerate() {
            let mut im = synthetic::plateau(4, 4, 2.0, synthetic::saxs_geometry([2.0, 2.0]));
            im.description = desc.to_string();
            im.save_as_tif(dir.join(format!("run_00{i}.tif")), SaveFill::Min).unwrap();
        }
        fs::write(dir.join("notes.txt"), "not an image").unwrap();
        let images = read_images(&dir, ".TIF").unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].description, "AgBe");

        let out = create_image_descriptions(&images, &dir).unwrap();
        assert!(out.ends_with("ContentOf_run_00.txt"));
        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Content of dir "));
        assert!(lines[2].ends_with("run_000.tif   water"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn common_prefix_stops_at_first_difference() {
        assert_eq!(common_prefix(&["/a/run_001.tif", "/a/run_012.tif"]), "/a/run_0");
        assert_eq!(common_prefix(&["x"]), "x");
        assert_eq!(common_prefix(&[]), "");
    }
}
