//! `sas-tools` library crate.
//!
//! Small-angle scattering data handling: tagged numeric series, beam
//! profiles with smearing and desmearing, model functions, detector images
//! with calibration helpers, and the interactive geometry pickers.
//!
//! The binary (`sas`) is a thin wrapper around this library so that the
//! numerics are testable without spawning processes.

pub mod app;
pub mod beam;
pub mod cli;
pub mod dynamic;
pub mod error;
pub mod formfactor;
pub mod image;
pub mod io;
pub mod lattice;
pub mod math;
pub mod picker;
pub mod plot;
pub mod reference;
pub mod series;
pub mod smear;

pub use error::{Result, SasError};
pub use image::SasImage;
pub use series::Series;
