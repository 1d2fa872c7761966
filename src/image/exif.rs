//! Instrument header keywords in TIFF text fields.
//!
//! SAXS instruments write their setup into the ImageDescription (270) and
//! Artist (315) fields as `keyword value ...` lines, or as XML elements with
//! a `name` attribute in Artist. Known keywords become image attributes or
//! geometry; everything else stays in the free text lines.

use crate::image::SasImage;
use crate::series::AttrValue;

/// One known header keyword.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyword {
    /// First word of the header line.
    pub name: &'static str,
    /// Canonical attribute name.
    pub attr: &'static str,
    /// Substrings removed or replaced in the line before parsing.
    pub replace: &'static [(&'static str, &'static str)],
    /// Factor converting numeric values to SI units (m).
    pub factor: f64,
    /// Keep the rest of the line as text instead of numbers.
    pub text: bool,
}

const fn kw(name: &'static str, attr: &'static str, factor: f64) -> Keyword {
    Keyword { name, attr, replace: &[], factor, text: false }
}

/// Keyword forms of the supported instruments, first match wins per line.
pub const KEYWORDS: &[Keyword] = &[
    kw("Wavelength", "wavelength", 1.0),
    kw("Flux", "flux", 1.0),
    kw("det_exposure_time", "exposure_time", 1.0),
    kw("det_pixel_size", "pixel_size", 1.0),
    kw("beamcenter_nominal", "center", 1.0),
    kw("detector_dist", "detector_distance", 0.001),
    Keyword { name: "Meas.Description", attr: "description", replace: &[], factor: 1.0, text: true },
    kw("wavelength", "wavelength", 1.0),
    kw("Exposure_time", "exposure_time", 1.0),
    Keyword { name: "Pixel_size", attr: "pixel_size", replace: &[("m", ""), ("x ", "")], factor: 1.0, text: false },
    kw("Detector_distance", "detector_distance", 1.0),
    kw("saxsconf_Izero", "Izero", 1.0),
    kw("sample_transfact", "transmission_factor", 1.0),
    kw("sample_thickness", "sample_thickness", 1.0),
    kw("ygon", "position_y", 1.0),
    kw("zgon", "position_z", 1.0),
];

/// First line of every ImageDescription written by this crate.
pub(crate) const PROCESSED_MARKER: &str = "processed by sas-tools";

/// Private Anton Paar tags of SAXSpace line-collimation cameras.
pub(crate) const ANTON_PAAR: &str = "Anton Paar GmbH";
pub(crate) const TAG_AP_WAVELENGTH: u16 = 65024;
pub(crate) const TAG_AP_DISTANCE: u16 = 65060;
/// CCD pixel size of these cameras, m.
pub(crate) const AP_PIXEL_SIZE: f64 = 24e-6;

/// ImageDescription lines; a leading `#` is dropped.
pub(crate) fn description_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .map(|l| l.strip_prefix('#').unwrap_or(l).trim())
        .filter(|l| !l.is_empty() && *l != PROCESSED_MARKER)
        .map(str::to_string)
        .collect()
}

/// Artist lines: `name value` pairs from XML elements carrying a `name`
/// attribute, otherwise the plain text lines.
pub(crate) fn artist_lines(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with('<') {
        return trimmed.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
    }
    let mut out = Vec::new();
    let mut rest = trimmed;
    while let Some(open) = rest.find('<') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find('>') else { break };
        let tag = &rest[..close];
        rest = &rest[close + 1..];
        if tag.starts_with('/') || tag.starts_with('?') || tag.ends_with('/') {
            continue;
        }
        let Some(name) = xml_attribute(tag, "name") else { continue };
        let value = rest[..rest.find('<').unwrap_or(rest.len())].trim();
        if !value.is_empty() {
            out.push(format!("{name} {value}"));
        }
    }
    if out.is_empty() {
        log::warn!("Artist field looks like XML but has no named entries");
    }
    out
}

fn xml_attribute<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let start = tag.find(&format!("{key}=\""))? + key.len() + 2;
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// Value of a header line: the leading numbers scaled by `kw.factor`, plus
/// the trailing words as unit (`Detector_distance 0.715 m`). Lines without
/// a leading number keep their words.
fn parse_value(words: &[&str], kw: &Keyword) -> (AttrValue, Option<String>) {
    if kw.text {
        return (AttrValue::Text(words.join(" ")), None);
    }
    let numbers: Vec<f64> = words.iter().map_while(|w| w.parse::<f64>().ok()).map(|v| v * kw.factor).collect();
    let unit = words[numbers.len()..].join(" ");
    let value = match numbers.len() {
        0 => return (AttrValue::from_words(words), None),
        1 => AttrValue::Number(numbers[0]),
        _ => AttrValue::List(numbers),
    };
    (value, (!unit.is_empty()).then_some(unit))
}

/// Remove the first line starting with `kw.name` and return its parsed value.
fn take_keyword(lines: &mut Vec<String>, kw: &Keyword) -> Option<(AttrValue, Option<String>)> {
    let pos = lines.iter().position(|l| l.split_whitespace().next() == Some(kw.name))?;
    let mut line = lines.remove(pos);
    for (from, to) in kw.replace {
        line = line.replace(from, to);
    }
    let words: Vec<&str> = line.split_whitespace().skip(1).collect();
    Some(parse_value(&words, kw))
}

impl SasImage {
    /// Move known keywords from the header lines into attributes and geometry.
    pub(crate) fn extract_keywords(&mut self) {
        for kw in KEYWORDS {
            if self.attrs.contains_key(kw.attr) {
                continue;
            }
            let value = take_keyword(&mut self.image_description, kw).or_else(|| take_keyword(&mut self.artist, kw));
            let Some((value, unit)) = value else { continue };
            if let Err(e) = self.apply_keyword(kw.attr, &value) {
                log::warn!("header keyword {} ignored: {e}", kw.name);
                continue;
            }
            self.attrs.insert(kw.attr.to_string(), value);
            if let Some(unit) = unit {
                self.attrs.insert(format!("{}_unit", kw.attr), AttrValue::Text(unit));
            }
        }
        if self.artist.first().map(String::as_str) == Some(ANTON_PAAR) {
            self.apply_anton_paar();
        }
    }

    fn apply_keyword(&mut self, attr: &str, value: &AttrValue) -> crate::error::Result<()> {
        let numbers = value.as_list().unwrap_or_default();
        match (attr, numbers.as_slice()) {
            ("wavelength", [w, ..]) => self.set_wavelength(*w),
            ("detector_distance", [d, ..]) => self.set_detector_distance(*d),
            ("pixel_size", [p]) => self.set_pixel_size([*p, *p]),
            ("pixel_size", [px, py, ..]) => self.set_pixel_size([*px, *py]),
            ("center", [ci, cj, ..]) => {
                self.set_center([*ci, *cj]);
                Ok(())
            }
            ("description", _) => {
                if let AttrValue::Text(t) = value {
                    self.description = t.clone();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// SAXSpace files keep wavelength (nm) and distance (mm) in private tags.
    fn apply_anton_paar(&mut self) {
        let number = |tag: u16| self.tags.get(&tag).and_then(|v| v.trim().parse::<f64>().ok());
        let (wavelength, distance) = (number(TAG_AP_WAVELENGTH), number(TAG_AP_DISTANCE));
        let applied = wavelength.map_or(Ok(()), |w| self.set_wavelength(w * 10.0)).and_then(|_| {
            distance.map_or(Ok(()), |d| self.set_detector_distance(d * 1e-3))
        });
        if let Err(e) = applied.and_then(|_| self.set_pixel_size([AP_PIXEL_SIZE, AP_PIXEL_SIZE])) {
            log::warn!("Anton Paar header ignored: {e}");
        }
    }

    /// ImageDescription text for saving: free lines plus the known keywords
    /// with the current values.
    pub(crate) fn header_description(&self) -> String {
        let mut lines = vec![PROCESSED_MARKER.to_string()];
        lines.extend(self.image_description.iter().cloned());
        let g = &self.geometry;
        let mut written: Vec<&str> = Vec::new();
        for kw in KEYWORDS {
            if written.contains(&kw.attr) {
                continue;
            }
            let values: Option<Vec<f64>> = match kw.attr {
                "wavelength" => g.wavelength.map(|w| vec![w]),
                "detector_distance" => g.detector_distance.map(|d| vec![d]),
                "pixel_size" => g.pixel_size.map(|p| p.to_vec()),
                "center" => Some(g.center.to_vec()),
                "description" => None,
                other => self.attrs.get(other).and_then(AttrValue::as_list),
            };
            if kw.attr == "description" {
                lines.push(format!("{} {}", kw.name, self.description));
            } else if let Some(v) = values {
                let text: Vec<String> = v.iter().map(|x| format!("{}", x / kw.factor)).collect();
                lines.push(format!("{} {}", kw.name, text.join(" ")));
            } else {
                continue;
            }
            written.push(kw.attr);
        }
        lines.join("\n")
    }
}
