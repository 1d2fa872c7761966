//! Absolute-scale and calibration references.

pub mod agbe;
pub mod elements;
pub mod water;

pub use agbe::{agbe_reference, AgBeReference};
pub use elements::{element, Component, Element, ELEMENTS};
pub use water::{water_compressibility, water_density, water_xray_scattering, ConcentrationUnit, ELECTRON_RADIUS};
