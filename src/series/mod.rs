//! Tagged numeric series.
//!
//! A [`Series`] is a column-major table of equally long numeric columns with:
//!
//! - named column roles (`X`, `Y`, `eY`, `eX`, `Z`, `W`)
//! - an open set of attributes (numbers, short lists, strings, flags) that
//!   travel with the data through slicing, copying and smearing
//! - optional `columnname`, `modelname` and comment lines
//! - optionally an attached beam profile describing the instrument resolution
//!   under which the data were measured
//!
//! Model functions return a `Series`, file readers produce one, and every
//! operation on a series returns a new series carrying the same attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::beam::BeamProfile;
use crate::error::{Result, SasError};
use crate::math::spline::CubicSpline;

mod fit;
mod prune;

pub use fit::PolyTransform;
pub use prune::{EmptyFill, PruneMode, PruneOptions};

/// Column roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    X,
    Y,
    EY,
    EX,
    Z,
    W,
}

impl Role {
    pub const ALL: [Role; 6] = [Role::X, Role::Y, Role::EY, Role::EX, Role::Z, Role::W];

    pub fn name(self) -> &'static str {
        match self {
            Role::X => "X",
            Role::Y => "Y",
            Role::EY => "eY",
            Role::EX => "eX",
            Role::Z => "Z",
            Role::W => "W",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| SasError::config(format!("unknown column role '{s}'")))
    }
}

/// Names that cannot be used as attribute names.
pub const RESERVED_NAMES: [&str; 13] = [
    "X", "Y", "eY", "eX", "Z", "eZ", "W", "eW", "columnname", "modelname", "comment", "attr", "array",
];

/// Attribute value carried by a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Flag(bool),
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::List(v) if v.len() == 1 => Some(v[0]),
            AttrValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::Number(v) => Some(vec![*v]),
            AttrValue::List(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse the value words of a parameter line (`name v1 v2 ...`).
    pub fn from_words(words: &[&str]) -> AttrValue {
        let numbers: Option<Vec<f64>> = words.iter().map(|w| w.parse::<f64>().ok()).collect();
        match numbers {
            Some(v) if v.len() == 1 => AttrValue::Number(v[0]),
            Some(v) if !v.is_empty() => AttrValue::List(v),
            _ => match words {
                ["True"] | ["true"] => AttrValue::Flag(true),
                ["False"] | ["false"] => AttrValue::Flag(false),
                _ => AttrValue::Text(words.join(" ")),
            },
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Flag(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            AttrValue::Number(v) => write!(f, "{v}"),
            AttrValue::List(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::List(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Flag(v)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Series {
    columns: Vec<Vec<f64>>,
    roles: [Option<usize>; 6],
    attrs: BTreeMap<String, AttrValue>,
    pub columnname: Option<String>,
    pub modelname: Option<String>,
    pub comment: Vec<String>,
    beam_profile: Option<Arc<BeamProfile>>,
}

impl Series {
    /// Build from columns; roles default to `X=0`, `Y=1`, `eY=2` where present.
    pub fn new(columns: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let n = first.len();
            if let Some((i, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != n) {
                return Err(SasError::config(format!(
                    "column {i} has {} values, expected {n}",
                    c.len()
                )));
            }
        }
        let mut roles = [None; 6];
        for (role, idx) in [(Role::X, 0), (Role::Y, 1), (Role::EY, 2)] {
            if idx < columns.len() {
                roles[role.slot()] = Some(idx);
            }
        }
        Ok(Self {
            columns,
            roles,
            ..Self::default()
        })
    }

    pub fn from_xy(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        Self::new(vec![x, y])
    }

    pub fn from_xye(x: Vec<f64>, y: Vec<f64>, ey: Vec<f64>) -> Result<Self> {
        Self::new(vec![x, y, ey])
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Number of points (rows).
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn column_mut(&mut self, index: usize) -> Option<&mut Vec<f64>> {
        self.columns.get_mut(index)
    }

    pub fn role_index(&self, role: Role) -> Option<usize> {
        self.roles[role.slot()]
    }

    pub fn role(&self, role: Role) -> Option<&[f64]> {
        self.role_index(role).and_then(|i| self.column(i))
    }

    /// The `X` column (empty if no column carries the role).
    pub fn x(&self) -> &[f64] {
        self.role(Role::X).unwrap_or(&[])
    }

    /// The `Y` column (empty if no column carries the role).
    pub fn y(&self) -> &[f64] {
        self.role(Role::Y).unwrap_or(&[])
    }

    pub fn ey(&self) -> Option<&[f64]> {
        self.role(Role::EY)
    }

    pub fn ex(&self) -> Option<&[f64]> {
        self.role(Role::EX)
    }

    pub fn y_mut(&mut self) -> Option<&mut Vec<f64>> {
        let i = self.role_index(Role::Y)?;
        self.columns.get_mut(i)
    }

    /// Assign (or clear) a role; indices must be in range and distinct.
    pub fn set_role(&mut self, role: Role, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            if i >= self.ncols() {
                return Err(SasError::config(format!(
                    "role {role} index {i} out of range ({} columns)",
                    self.ncols()
                )));
            }
            if let Some(other) = Role::ALL
                .into_iter()
                .find(|r| *r != role && self.role_index(*r) == Some(i))
            {
                return Err(SasError::config(format!("column {i} already carries role {other}")));
            }
        }
        self.roles[role.slot()] = index;
        Ok(())
    }

    pub fn roles(&self) -> impl Iterator<Item = (Role, usize)> + '_ {
        Role::ALL.into_iter().filter_map(|r| self.role_index(r).map(|i| (r, i)))
    }

    /// Append a column and return its index.
    pub fn push_column(&mut self, values: Vec<f64>) -> Result<usize> {
        if !self.columns.is_empty() && values.len() != self.len() {
            return Err(SasError::config(format!(
                "new column has {} values, expected {}",
                values.len(),
                self.len()
            )));
        }
        self.columns.push(values);
        Ok(self.columns.len() - 1)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        if RESERVED_NAMES.contains(&name) {
            return Err(SasError::config(format!("'{name}' is a reserved name and cannot be an attribute")));
        }
        self.attrs.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Like `set_attr` for names known not to be reserved.
    pub(crate) fn put(&mut self, name: &str, value: impl Into<AttrValue>) {
        if !RESERVED_NAMES.contains(&name) {
            self.attrs.insert(name.to_string(), value.into());
        }
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(AttrValue::as_f64)
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<AttrValue> {
        self.attrs.remove(name)
    }

    /// Copy attributes, names and comments (not data or roles) from `other`.
    pub fn copy_attrs_from(&mut self, other: &Series) {
        for (k, v) in &other.attrs {
            self.attrs.insert(k.clone(), v.clone());
        }
        if self.modelname.is_none() {
            self.modelname = other.modelname.clone();
        }
        if self.comment.is_empty() {
            self.comment = other.comment.clone();
        }
        if self.beam_profile.is_none() {
            self.beam_profile = other.beam_profile.clone();
        }
    }

    pub fn beam_profile(&self) -> Option<&BeamProfile> {
        self.beam_profile.as_deref()
    }

    pub fn set_beam_profile(&mut self, profile: Option<BeamProfile>) {
        self.beam_profile = profile.map(Arc::new);
    }

    pub fn with_beam_profile(mut self, profile: BeamProfile) -> Self {
        self.beam_profile = Some(Arc::new(profile));
        self
    }

    pub fn with_columnname(mut self, name: &str) -> Self {
        self.columnname = Some(name.to_string());
        self
    }

    pub fn with_modelname(mut self, name: &str) -> Self {
        self.modelname = Some(name.to_string());
        self
    }

    /// Same metadata, new data; roles beyond the new column count are dropped.
    fn rebuild(&self, columns: Vec<Vec<f64>>) -> Series {
        let ncols = columns.len();
        let mut roles = self.roles;
        for r in roles.iter_mut() {
            if r.is_some_and(|i| i >= ncols) {
                *r = None;
            }
        }
        Series {
            columns,
            roles,
            attrs: self.attrs.clone(),
            columnname: self.columnname.clone(),
            modelname: self.modelname.clone(),
            comment: self.comment.clone(),
            beam_profile: self.beam_profile.clone(),
        }
    }

    /// Rows in `range`.
    pub fn select_rows(&self, range: Range<usize>) -> Series {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.rebuild(self.columns.iter().map(|c| c[start..end].to_vec()).collect())
    }

    /// Rows for which `keep(row_index)` is true.
    pub fn filter_rows<F: Fn(usize) -> bool>(&self, keep: F) -> Series {
        let idx: Vec<usize> = (0..self.len()).filter(|&i| keep(i)).collect();
        self.take_rows(&idx)
    }

    /// Rows with `lower <= X <= upper`.
    pub fn x_range(&self, lower: f64, upper: f64) -> Series {
        let x = self.x().to_vec();
        self.filter_rows(|i| x[i] >= lower && x[i] <= upper)
    }

    pub(crate) fn take_rows(&self, idx: &[usize]) -> Series {
        self.rebuild(
            self.columns
                .iter()
                .map(|c| idx.iter().map(|&i| c[i]).collect())
                .collect(),
        )
    }

    /// Keep only the listed columns; roles follow their columns.
    pub fn select_columns(&self, indices: &[usize]) -> Result<Series> {
        if let Some(bad) = indices.iter().find(|&&i| i >= self.ncols()) {
            return Err(SasError::config(format!("column {bad} out of range")));
        }
        let mut out = self.rebuild(indices.iter().map(|&i| self.columns[i].clone()).collect());
        out.roles = [None; 6];
        for (role, old) in self.roles() {
            if let Some(new) = indices.iter().position(|&i| i == old) {
                out.roles[role.slot()] = Some(new);
            }
        }
        Ok(out)
    }

    /// Rows sorted by ascending X.
    pub fn sort_by_x(&self) -> Series {
        let x = self.x();
        let mut idx: Vec<usize> = (0..self.len()).collect();
        idx.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
        self.take_rows(&idx)
    }

    /// Apply `f` to the `Y` values; errors are left untouched.
    pub fn map_y<F: Fn(f64) -> f64>(&self, f: F) -> Series {
        let mut out = self.clone();
        if let Some(y) = out.y_mut() {
            for v in y.iter_mut() {
                *v = f(*v);
            }
        }
        out
    }

    /// Multiply `Y` (and `eY`) by `factor`.
    pub fn scaled(&self, factor: f64) -> Series {
        let mut out = self.map_y(|v| v * factor);
        if let Some(i) = out.role_index(Role::EY) {
            for v in out.columns[i].iter_mut() {
                *v *= factor.abs();
            }
        }
        out
    }

    /// Linear interpolation of `Y` at `xs`, clamped to the edge values.
    pub fn interp(&self, xs: &[f64]) -> Vec<f64> {
        self.interp_column(self.role_index(Role::Y).unwrap_or(1), xs)
    }

    /// Linear interpolation of column `index` along `X`, clamped at the edges.
    pub fn interp_column(&self, index: usize, xs: &[f64]) -> Vec<f64> {
        let sorted = self.sort_by_x();
        let (Some(xc), Some(yc)) = (sorted.role(Role::X), sorted.column(index)) else {
            return vec![f64::NAN; xs.len()];
        };
        xs.iter().map(|&v| interp_linear(xc, yc, v)).collect()
    }

    /// Cubic spline of `Y(X)`; duplicate X values are averaged.
    pub fn spline(&self) -> Result<CubicSpline> {
        let sorted = self.sort_by_x();
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = (Vec::new(), Vec::new());
        let mut count = 0.0;
        for (&x, &y) in sorted.x().iter().zip(sorted.y()) {
            if xs.last() == Some(&x) {
                count += 1.0;
                if let Some(last) = ys.last_mut() {
                    *last += (y - *last) / count;
                }
            } else {
                xs.push(x);
                ys.push(y);
                count = 1.0;
            }
        }
        CubicSpline::new(&xs, &ys)
    }
}

/// Linear interpolation on sorted `x`, clamped to the edge values.
pub fn interp_linear(x: &[f64], y: &[f64], v: f64) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return f64::NAN;
    }
    if v <= x[0] {
        return y[0];
    }
    if v >= x[n - 1] {
        return y[n - 1];
    }
    let i = x[..n].partition_point(|xi| *xi <= v);
    let (x0, x1) = (x[i - 1], x[i]);
    if x1 == x0 {
        return y[i];
    }
    y[i - 1] + (y[i] - y[i - 1]) * (v - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Series {
        let x = vec![3.0, 1.0, 2.0, 0.0];
        let y = vec![9.0, 1.0, 4.0, 0.0];
        let e = vec![0.3, 0.1, 0.2, 0.05];
        let mut s = Series::from_xye(x, y, e).unwrap();
        s.set_attr("temperature", 293.0).unwrap();
        s
    }

    #[test]
    fn default_roles_and_lengths() {
        let s = sample();
        assert_eq!(s.len(), 4);
        assert_eq!(s.role_index(Role::EY), Some(2));
        assert!(Series::new(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn reserved_attribute_names_are_rejected() {
        let mut s = sample();
        assert!(s.set_attr("eY", 1.0).is_err());
        assert!(s.set_attr("columnname", "q").is_err());
    }

    #[test]
    fn roles_must_be_distinct_and_in_range() {
        let mut s = sample();
        assert!(s.set_role(Role::W, Some(0)).is_err());
        assert!(s.set_role(Role::W, Some(7)).is_err());
        s.set_role(Role::EY, None).unwrap();
        s.set_role(Role::W, Some(2)).unwrap();
        assert_eq!(s.role(Role::W).unwrap()[0], 0.3);
    }

    #[test]
    fn slicing_keeps_attributes_and_roles() {
        let s = sample().sort_by_x();
        assert_eq!(s.x(), &[0.0, 1.0, 2.0, 3.0]);
        let part = s.select_rows(1..3);
        assert_eq!(part.y(), &[1.0, 4.0]);
        assert_eq!(part.attr_f64("temperature"), Some(293.0));
        let cols = s.select_columns(&[1, 0]).unwrap();
        assert_eq!(cols.role_index(Role::X), Some(1));
        assert_eq!(cols.ey(), None);
    }

    #[test]
    fn linear_interp_clamps() {
        let s = sample();
        let v = s.interp(&[-1.0, 0.5, 2.5, 10.0]);
        assert_eq!(v, vec![0.0, 0.5, 6.5, 9.0]);
    }

    #[test]
    fn attribute_words_are_typed() {
        assert_eq!(AttrValue::from_words(&["1.5"]), AttrValue::Number(1.5));
        assert_eq!(AttrValue::from_words(&["1", "2"]), AttrValue::List(vec![1.0, 2.0]));
        assert_eq!(AttrValue::from_words(&["a", "b"]), AttrValue::Text("a b".into()));
        assert_eq!(AttrValue::from_words(&["True"]), AttrValue::Flag(true));
    }
}
