//! PDH (Primary Data Handling) files of the PCG SAXS suite and Anton Paar
//! SAXSess/SAXSpace instruments.
//!
//! Five header lines, `x y ey` triples, then optionally an XML block whose
//! `<parameter>` elements carry further settings (exposure time etc.).

use std::fs;
use std::path::Path;

use crate::error::{Result, SasError};
use crate::series::{AttrValue, Role, Series};

fn numbers(line: &str, what: &str) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|w| w.parse::<f64>().map_err(|_| SasError::format(format!("{what}: '{w}' is not a number"))))
        .collect()
}

/// Parse PDH text.
///
/// Header values kept as attributes:
/// - `wavelength` (line 4, 5th value) when non-zero
/// - `detector_distance` in mm (line 4, 2nd value) when non-zero
/// - `slit_length` in q units (line 5, 2nd value) when non-zero
///
/// An error column of all `-1` or containing NaN is dropped from the roles.
pub fn parse_pdh(text: &str) -> Result<Series> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 5 {
        return Err(SasError::format("PDH header needs five lines"));
    }
    let counts = numbers(lines[2], "PDH line 3")?;
    let line4 = numbers(lines[3], "PDH line 4")?;
    let line5 = numbers(lines[4], "PDH line 5")?;
    let npoints = counts.first().copied().unwrap_or(0.0).max(0.0) as usize;

    let (mut x, mut y, mut ey) = (Vec::with_capacity(npoints), Vec::with_capacity(npoints), Vec::with_capacity(npoints));
    let mut tail = Vec::new();
    for (k, line) in lines.iter().enumerate().skip(5) {
        let trimmed = line.trim();
        if trimmed.starts_with('<') || !tail.is_empty() {
            tail.push(trimmed);
            continue;
        }
        if trimmed.is_empty() || x.len() == npoints {
            continue;
        }
        let v = numbers(trimmed, &format!("PDH line {}", k + 1))?;
        if v.len() < 2 {
            return Err(SasError::format(format!("PDH line {}: expected x y [ey]", k + 1)));
        }
        x.push(v[0]);
        y.push(v[1]);
        ey.push(v.get(2).copied().unwrap_or(f64::NAN));
    }
    if x.len() < npoints {
        log::warn!("PDH header announces {npoints} points, found {}", x.len());
    }

    let mut series = Series::from_xye(x, y, ey.clone())?;
    if ey.iter().any(|e| e.is_nan()) || ey.iter().all(|e| *e == -1.0) {
        series.set_role(Role::EY, None)?;
    }
    series.comment = vec![lines[0].trim().to_string(), lines[1].trim().to_string()];
    series.put("description", lines[0].trim());
    if let Some(w) = line4.get(4).filter(|w| **w != 0.0) {
        series.put("wavelength", *w);
    }
    if let Some(d) = line4.get(1).filter(|d| **d != 0.0) {
        series.put("detector_distance", *d);
    }
    if let Some(s) = line5.get(1).filter(|s| **s != 0.0) {
        series.put("slit_length", *s);
    }
    for (name, value) in xml_parameters(&tail.join("\n")) {
        series.put(&name, value);
    }
    Ok(series)
}

/// `<parameter>` elements of the XML tail. Child elements are, in order,
/// id, unit, name and value; the unit is stored as `<name>_unit`.
fn xml_parameters(xml: &str) -> Vec<(String, AttrValue)> {
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<parameter") {
        rest = &rest[start..];
        let Some(end) = rest.find("</parameter>") else { break };
        let children = element_texts(&rest[..end]);
        rest = &rest[end + "</parameter>".len()..];
        let [_, unit, name, value, ..] = children.as_slice() else {
            log::warn!("PDH parameter element with {} children ignored", children.len());
            continue;
        };
        if name.is_empty() {
            continue;
        }
        out.push((name.clone(), AttrValue::from_words(&value.split_whitespace().collect::<Vec<_>>())));
        if !unit.is_empty() {
            out.push((format!("{name}_unit"), AttrValue::Text(unit.clone())));
        }
    }
    out
}

/// Text of the direct child elements of one element.
fn element_texts(element: &str) -> Vec<String> {
    let body = element.find('>').map_or("", |p| &element[p + 1..]);
    let mut texts = Vec::new();
    let mut rest = body;
    while let Some(open) = rest.find('<') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find('>') else { break };
        let tag = &rest[..close];
        rest = &rest[close + 1..];
        if tag.starts_with('/') {
            continue;
        }
        if tag.ends_with('/') {
            texts.push(String::new());
            continue;
        }
        texts.push(rest[..rest.find('<').unwrap_or(rest.len())].trim().to_string());
    }
    texts
}

pub fn read_pdh(path: impl AsRef<Path>) -> Result<Series> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut series = parse_pdh(&text).map_err(|e| match e {
        SasError::Format(msg) => SasError::format(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    series.put("filename", path.display().to_string());
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAXSPACE: &str = "
SAXS BOX
      4         0         0         0         0         0         0         0
  0.000000E+00   3.052516E+02   0.000000E+00   1.000000E+00   1.541800E-01
  0.000000E+00   1.332843E+00   0.000000E+00   0.000000E+00   0.000000E+00
 -1.033335E-01   2.241656E+03   1.024389E+00
 -1.001430E-01   2.199972E+03   1.052537E+00
  5.000000E-02   1.000000E+02   2.000000E+00
  1.000000E-01   5.000000E+01   1.000000E+00
<?xml version=\"1.0\"?>
<fileinfo>
<parameter><id>1</id><unit>s</unit><name>Exposure</name><value>600</value></parameter>
<parameter><id>2</id><unit/><name>Sample</name><value>water</value></parameter>
</fileinfo>
";

    #[test]
    fn header_data_and_xml() {
        let s = parse_pdh(SAXSPACE).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.x()[0], -1.033335E-01);
        assert_eq!(s.ey().map(|e| e[3]), Some(1.0));
        assert_eq!(s.attr_f64("wavelength"), Some(0.15418));
        assert_eq!(s.attr_f64("detector_distance"), Some(305.2516));
        assert_eq!(s.attr_f64("slit_length"), Some(1.332843));
        assert_eq!(s.attr_f64("Exposure"), Some(600.0));
        assert_eq!(s.attr("Exposure_unit"), Some(&AttrValue::Text("s".into())));
        assert_eq!(s.attr("Sample"), Some(&AttrValue::Text("water".into())));
        assert!(s.attr("Sample_unit").is_none());
    }

    #[test]
    fn missing_errors_drop_the_role() {
        let text = "desc\n\n2 0 0 0 0 0 0 0\n0 0 0 1 0\n0 0 0 0 0\n0.1 5 -1\n0.2 4 -1\n";
        let s = parse_pdh(text).unwrap();
        assert!(s.ey().is_none());
        assert!(s.attr("wavelength").is_none());
        assert_eq!(s.ncols(), 3);
    }

    #[test]
    fn broken_header_is_a_format_error() {
        assert!(matches!(parse_pdh("a\nb\nc\n"), Err(SasError::Format(_))));
        assert!(matches!(parse_pdh("a\nb\nx 0\n0\n0\n"), Err(SasError::Format(_))));
    }
}
