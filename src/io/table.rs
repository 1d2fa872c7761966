//! Whitespace-separated text tables.
//!
//! One series per file:
//!
//! ```text
//! # free comment
//! columnname q; Iq; eIq
//! temperature 293.15
//! sample AgBe capillary
//! 0.1 102.3 1.2
//! 0.2  98.1 1.1
//! ```
//!
//! Lines starting with `#` are comments. Lines made of numbers only are data
//! rows; every other line is a parameter line `name value ...` stored as an
//! attribute. `columnname` and `modelname` lines fill the series fields.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{Result, SasError};
use crate::series::{AttrValue, Series, RESERVED_NAMES};

/// A line that could not be used, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

/// Parsed table plus the data lines that were skipped.
#[derive(Debug, Clone)]
pub struct TableRead {
    pub series: Series,
    pub skipped: Vec<LineError>,
}

/// Parse table text. Data rows with a column count different from the first
/// row are skipped and reported.
pub fn parse_table(text: &str) -> Result<TableRead> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut skipped = Vec::new();
    let mut comments = Vec::new();
    let mut params: Vec<(String, AttrValue)> = Vec::new();
    let (mut columnname, mut modelname) = (None, None);

    for (k, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(c) = line.strip_prefix('#') {
            comments.push(c.trim().to_string());
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let numbers: Option<Vec<f64>> = words.iter().map(|w| parse_number(w)).collect();
        match numbers {
            Some(row) => {
                if let Some(first) = rows.first() {
                    if first.len() != row.len() {
                        skipped.push(LineError {
                            line: k + 1,
                            message: format!("{} values, expected {}", row.len(), first.len()),
                        });
                        continue;
                    }
                }
                rows.push(row);
            }
            None => {
                let (name, rest) = (words[0], &words[1..]);
                match name {
                    "columnname" => columnname = Some(rest.join(" ")),
                    "modelname" => modelname = Some(rest.join(" ")),
                    _ if RESERVED_NAMES.contains(&name) => comments.push(line.to_string()),
                    _ => params.push((name.to_string(), AttrValue::from_words(rest))),
                }
            }
        }
    }
    if rows.is_empty() {
        return Err(SasError::format("no data rows found"));
    }
    for e in &skipped {
        log::warn!("line {} skipped: {}", e.line, e.message);
    }

    let ncols = rows[0].len();
    let columns: Vec<Vec<f64>> = (0..ncols).map(|c| rows.iter().map(|r| r[c]).collect()).collect();
    let mut series = Series::new(columns)?;
    for (name, value) in params {
        series.set_attr(&name, value)?;
    }
    series.columnname = columnname;
    series.modelname = modelname;
    series.comment = comments;
    Ok(TableRead { series, skipped })
}

/// Fortran-style exponents (`1.0D-3`) are accepted as well.
fn parse_number(word: &str) -> Option<f64> {
    word.parse::<f64>().ok().or_else(|| word.replace(['D', 'd'], "e").parse::<f64>().ok())
}

pub fn read_table(path: impl AsRef<Path>) -> Result<Series> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut read = parse_table(&text).map_err(|e| match e {
        SasError::Format(msg) => SasError::format(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    if !read.skipped.is_empty() {
        log::info!("{}: {} lines skipped", path.display(), read.skipped.len());
    }
    read.series.put("filename", path.display().to_string());
    Ok(read.series)
}

/// Table text: comments, parameter lines, then data rows.
pub fn format_table(series: &Series) -> String {
    let mut out = String::new();
    for c in &series.comment {
        let _ = writeln!(out, "# {c}");
    }
    if let Some(name) = &series.columnname {
        let _ = writeln!(out, "columnname {name}");
    }
    if let Some(name) = &series.modelname {
        let _ = writeln!(out, "modelname {name}");
    }
    for (name, value) in series.attrs() {
        // a parameter line without value words cannot be read back
        let text = value.to_string();
        if text.trim().is_empty() {
            continue;
        }
        let _ = writeln!(out, "{name} {}", text.replace('\n', " "));
    }
    for row in 0..series.len() {
        let values: Vec<String> = series.columns().iter().map(|c| format!("{:.8e}", c[row])).collect();
        let _ = writeln!(out, "{}", values.join(" "));
    }
    out
}

pub fn write_table(series: &Series, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path.as_ref(), format_table(series))?;
    log::info!("wrote {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
# SAXS run 12
columnname q; Iq; eIq
temperature 293.15
sample AgBe capillary
pos 1 2
0.1 102.3 1.2
0.2 98.1 1.1
0.3 1.0D1

0.4 90.0 0.9
";

    #[test]
    fn parameters_become_attributes() {
        let read = parse_table(TABLE).unwrap();
        let s = read.series;
        assert_eq!(s.len(), 3);
        assert_eq!(s.x(), &[0.1, 0.2, 0.4]);
        assert_eq!(s.ey(), Some(&[1.2, 1.1, 0.9][..]));
        assert_eq!(s.attr_f64("temperature"), Some(293.15));
        assert_eq!(s.attr("sample"), Some(&AttrValue::Text("AgBe capillary".into())));
        assert_eq!(s.attr("pos"), Some(&AttrValue::List(vec![1.0, 2.0])));
        assert_eq!(s.columnname.as_deref(), Some("q; Iq; eIq"));
        assert_eq!(s.comment, vec!["SAXS run 12".to_string()]);
        assert_eq!(read.skipped, vec![LineError { line: 8, message: "2 values, expected 3".into() }]);
    }

    #[test]
    fn written_table_reads_back() {
        let s = parse_table(TABLE).unwrap().series;
        let back = parse_table(&format_table(&s)).unwrap().series;
        assert_eq!(back.attrs(), s.attrs());
        assert_eq!(back.columnname, s.columnname);
        assert_eq!(back.comment, s.comment);
        for (a, b) in back.y().iter().zip(s.y()) {
            assert!((a - b).abs() < 1e-6 * b.abs());
        }
    }

    #[test]
    fn table_without_data_is_an_error() {
        assert!(matches!(parse_table("# nothing\nname value\n"), Err(SasError::Format(_))));
    }

    #[test]
    fn file_round_trip_sets_filename() {
        let dir = std::env::temp_dir().join(format!("sas-table-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("curve.dat");
        let s = Series::from_xy(vec![1.0, 2.0], vec![3.0, 4.0]).unwrap();
        write_table(&s, &path).unwrap();
        let back = read_table(&path).unwrap();
        assert_eq!(back.x(), &[1.0, 2.0]);
        assert!(back.attr("filename").and_then(AttrValue::as_text).is_some_and(|f| f.ends_with("curve.dat")));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
