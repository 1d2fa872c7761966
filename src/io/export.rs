//! Export series to CSV and JSON.
//!
//! CSV is meant for spreadsheets: one header row, one row per point.
//! JSON keeps everything (columns, roles, attributes) for downstream scripts.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SasError};
use crate::series::{AttrValue, Role, Series};

/// Column headers: `columnname` split at `;` when it names every column,
/// otherwise the role names, `c<k>` for columns without a role.
pub fn column_headers(series: &Series) -> Vec<String> {
    let n = series.ncols();
    if let Some(names) = &series.columnname {
        let parts: Vec<String> = names.split(';').map(|p| p.trim().to_string()).collect();
        if parts.len() == n && parts.iter().all(|p| !p.is_empty()) {
            return parts;
        }
    }
    (0..n)
        .map(|k| {
            series
                .roles()
                .find(|(_, idx)| *idx == k)
                .map_or_else(|| format!("c{k}"), |(role, _)| role.name().to_string())
        })
        .collect()
}

pub fn write_csv(series: &Series, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(column_headers(series))?;
    for row in 0..series.len() {
        writer.write_record(series.columns().iter().map(|c| format!("{:.10e}", c[row])))?;
    }
    writer.flush()?;
    Ok(())
}

/// JSON representation of a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub columnname: Option<String>,
    pub modelname: Option<String>,
    #[serde(default)]
    pub comment: Vec<String>,
    /// Column index of each role.
    pub roles: BTreeMap<String, usize>,
    pub columns: Vec<Vec<f64>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl SeriesFile {
    pub fn from_series(series: &Series) -> Self {
        Self {
            tool: "sas".to_string(),
            created: Utc::now(),
            columnname: series.columnname.clone(),
            modelname: series.modelname.clone(),
            comment: series.comment.clone(),
            roles: series.roles().map(|(r, k)| (r.name().to_string(), k)).collect(),
            columns: series.columns().to_vec(),
            attributes: series.attrs().clone(),
        }
    }

    pub fn into_series(self) -> Result<Series> {
        let mut series = Series::new(self.columns)?;
        for role in [Role::X, Role::Y, Role::EY] {
            series.set_role(role, None)?;
        }
        for (name, index) in self.roles {
            series.set_role(name.parse()?, Some(index))?;
        }
        for (name, value) in self.attributes {
            series.set_attr(&name, value)?;
        }
        series.columnname = self.columnname;
        series.modelname = self.modelname;
        series.comment = self.comment;
        Ok(series)
    }
}

pub fn write_json(series: &Series, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &SeriesFile::from_series(series))?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<Series> {
    let file = File::open(path)?;
    let parsed: SeriesFile = serde_json::from_reader(file)?;
    if parsed.columns.is_empty() {
        return Err(SasError::format(format!("{}: no columns", path.display())));
    }
    parsed.into_series()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Series {
        let mut s = Series::from_xye(vec![0.1, 0.2], vec![10.0, 8.0], vec![1.0, 0.5]).unwrap();
        s.set_attr("temperature", 293.0).unwrap();
        s.set_attr("sample", "AgBe").unwrap();
        s
    }

    #[test]
    fn headers_from_roles_or_columnname() {
        let mut s = sample();
        assert_eq!(column_headers(&s), vec!["X", "Y", "eY"]);
        s.columnname = Some("q; I; e".into());
        assert_eq!(column_headers(&s), vec!["q", "I", "e"]);
        s.columnname = Some("q; I".into());
        assert_eq!(column_headers(&s), vec!["X", "Y", "eY"]);
    }

    #[test]
    fn csv_and_json_files() {
        let dir = std::env::temp_dir().join(format!("sas-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let s = sample();

        let csv_path = dir.join("curve.csv");
        write_csv(&s, &csv_path).unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.headers().unwrap().iter().collect::<Vec<_>>(), vec!["X", "Y", "eY"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1].parse::<f64>().unwrap(), 8.0);

        let json_path = dir.join("curve.json");
        write_json(&s, &json_path).unwrap();
        let back = read_json(&json_path).unwrap();
        assert_eq!(back.ey(), s.ey());
        assert_eq!(back.attrs(), s.attrs());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
