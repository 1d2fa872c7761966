//! Input/output helpers.
//!
//! - whitespace text tables with parameter lines (`table`)
//! - PDH files of SAXS instruments (`pdh`)
//! - CSV/JSON exports (`export`)
//!
//! Detector images are read and written by [`crate::image::SasImage`].

pub mod export;
pub mod pdh;
pub mod table;

pub use export::*;
pub use pdh::*;
pub use table::*;

use std::path::Path;

use crate::error::Result;
use crate::series::Series;

/// Read a 1-D data file, PDH by extension, otherwise a text table.
pub fn read_series(path: &Path) -> Result<Series> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("pdh") => read_pdh(path),
        Some("json") => read_json(path),
        _ => read_table(path),
    }
}

/// Write by extension: `.csv`, `.json`, otherwise a text table.
pub fn write_series(series: &Series, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("csv") => write_csv(series, path),
        Some("json") => write_json(series, path),
        _ => write_table(series, path),
    }
}
