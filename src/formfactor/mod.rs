//! Static form factors used as ideal curves for smearing and fitting.
//!
//! Every model returns a [`Series`] with X = q and Y = intensity, no eY
//! role, a `columnname` such as `q; Iq; fa` and the model parameters as
//! attributes. `I0` is the forward intensity where the model defines one.
//!
//! - [`empirical`]: Guinier, Beaucage, Guinier–Porod, correlation-length
//!   models
//! - [`sphere`]: spheres, shells, ellipsoids, superballs
//! - [`cylinder`]: cylinders with caps, discs, cuboids, prisms
//! - [`polymer`]: Gaussian and wormlike chains, rings, pearl chains
//! - [`layer`]: multilayers and multilamellar vesicles
//! - [`decorated`]: core-shell particles decorated or filled with droplets
//! - [`cloud`]: point-cloud scattering shared by the cloud-based models

use crate::error::{Result, SasError};
use crate::series::{Role, Series};

pub mod cloud;
pub mod cylinder;
pub mod decorated;
pub mod empirical;
pub mod layer;
pub mod polymer;
pub mod sphere;

pub use cylinder::{cuboid, cylinder, disc, fuzzy_cylinder, multi_shell_cylinder, multi_shell_disc, prism, Orientation};
pub use decorated::{
    decorated_core_shell, inhomogeneous_cylinder, inhomogeneous_sphere, DecoratedCoreShell, Decoration, DropDistribution,
    DropRegion, DropShape, InhomogeneousCylinder, InhomogeneousSphere,
};
pub use empirical::{
    beaucage, dab, gen_guinier, guinier, guinier_porod, guinier_porod_3d, ornstein_zernike, polymer_cor_length,
    teubner_strey,
};
pub use layer::{multilamellar_vesicles, multilayer, Layer, LayerFluctuation, MultiLayer, SldLayer, Vesicle};
pub use polymer::{gaussian_chain, linear_pearls, pearl_necklace, ring_polymer, wormlike_chain, LinearPearls};
pub use sphere::{ellipsoid, multi_shell_ellipsoid, multi_shell_sphere, sphere, superball, Shell};

/// Assemble a model result: `[q, columns...]` without an error column.
pub(crate) fn model_series(q: &[f64], columns: Vec<Vec<f64>>, columnname: &str, modelname: &str) -> Result<Series> {
    let mut all = Vec::with_capacity(columns.len() + 1);
    all.push(q.to_vec());
    all.extend(columns);
    let mut out = Series::new(all)?;
    out.set_role(Role::EY, None)?;
    Ok(out.with_columnname(columnname).with_modelname(modelname))
}

pub(crate) fn non_negative(name: &str, value: f64) -> Result<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(SasError::config(format!("{name} must be a non-negative number, got {value}")));
    }
    Ok(())
}
