//! Numerical building blocks shared by the models, smearing and image code.

pub mod faddeeva;
pub mod grid;
pub mod levmar;
pub mod mittag_leffler;
pub mod ols;
pub mod quadrature;
pub mod smooth;
pub mod special;
pub mod spline;

pub use faddeeva::{dawson, erfi, faddeeva, voigt};
pub use grid::{linspace, loglist, Spacing};
pub use ols::{polyfit, polyval, solve_least_squares};
pub use quadrature::{simpson, trapz};
pub use spline::CubicSpline;
