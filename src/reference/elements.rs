//! Element table and chemical composition strings.
//!
//! A composition is written as an optional leading amount followed by
//! element/count pairs, each count explicit: `55.5h2o1`, `0.1na1cl1`,
//! `c3h8o3`. Symbols are case-insensitive; `d` is deuterium.

use crate::error::{Result, SasError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Atomic number, the electron count of the neutral atom.
    pub z: u32,
    /// Standard atomic weight in g/mol.
    pub mass: f64,
}

const fn el(symbol: &'static str, name: &'static str, z: u32, mass: f64) -> Element {
    Element { symbol, name, z, mass }
}

pub const ELEMENTS: &[Element] = &[
    el("h", "hydrogen", 1, 1.008),
    el("d", "deuterium", 1, 2.014_102),
    el("he", "helium", 2, 4.002_602),
    el("li", "lithium", 3, 6.94),
    el("be", "beryllium", 4, 9.012_183),
    el("b", "boron", 5, 10.81),
    el("c", "carbon", 6, 12.011),
    el("n", "nitrogen", 7, 14.007),
    el("o", "oxygen", 8, 15.999),
    el("f", "fluorine", 9, 18.998_403),
    el("ne", "neon", 10, 20.1797),
    el("na", "sodium", 11, 22.989_769),
    el("mg", "magnesium", 12, 24.305),
    el("al", "aluminium", 13, 26.981_538),
    el("si", "silicon", 14, 28.085),
    el("p", "phosphorus", 15, 30.973_762),
    el("s", "sulfur", 16, 32.06),
    el("cl", "chlorine", 17, 35.45),
    el("ar", "argon", 18, 39.948),
    el("k", "potassium", 19, 39.0983),
    el("ca", "calcium", 20, 40.078),
    el("sc", "scandium", 21, 44.955_908),
    el("ti", "titanium", 22, 47.867),
    el("v", "vanadium", 23, 50.9415),
    el("cr", "chromium", 24, 51.9961),
    el("mn", "manganese", 25, 54.938_043),
    el("fe", "iron", 26, 55.845),
    el("co", "cobalt", 27, 58.933_194),
    el("ni", "nickel", 28, 58.6934),
    el("cu", "copper", 29, 63.546),
    el("zn", "zinc", 30, 65.38),
    el("ga", "gallium", 31, 69.723),
    el("ge", "germanium", 32, 72.630),
    el("as", "arsenic", 33, 74.921_595),
    el("se", "selenium", 34, 78.971),
    el("br", "bromine", 35, 79.904),
    el("kr", "krypton", 36, 83.798),
    el("rb", "rubidium", 37, 85.4678),
    el("sr", "strontium", 38, 87.62),
    el("y", "yttrium", 39, 88.905_84),
    el("zr", "zirconium", 40, 91.224),
    el("nb", "niobium", 41, 92.906_37),
    el("mo", "molybdenum", 42, 95.95),
    el("ru", "ruthenium", 44, 101.07),
    el("rh", "rhodium", 45, 102.905_49),
    el("pd", "palladium", 46, 106.42),
    el("ag", "silver", 47, 107.8682),
    el("cd", "cadmium", 48, 112.414),
    el("in", "indium", 49, 114.818),
    el("sn", "tin", 50, 118.710),
    el("sb", "antimony", 51, 121.760),
    el("te", "tellurium", 52, 127.60),
    el("i", "iodine", 53, 126.904_47),
    el("xe", "xenon", 54, 131.293),
    el("cs", "caesium", 55, 132.905_45),
    el("ba", "barium", 56, 137.327),
    el("la", "lanthanum", 57, 138.905_47),
    el("ce", "cerium", 58, 140.116),
    el("eu", "europium", 63, 151.964),
    el("gd", "gadolinium", 64, 157.25),
    el("tb", "terbium", 65, 158.925_35),
    el("dy", "dysprosium", 66, 162.500),
    el("hf", "hafnium", 72, 178.49),
    el("ta", "tantalum", 73, 180.947_88),
    el("w", "tungsten", 74, 183.84),
    el("os", "osmium", 76, 190.23),
    el("ir", "iridium", 77, 192.217),
    el("pt", "platinum", 78, 195.084),
    el("au", "gold", 79, 196.966_57),
    el("hg", "mercury", 80, 200.592),
    el("tl", "thallium", 81, 204.38),
    el("pb", "lead", 82, 207.2),
    el("bi", "bismuth", 83, 208.980_40),
    el("th", "thorium", 90, 232.0377),
    el("u", "uranium", 92, 238.028_91),
];

pub fn element(symbol: &str) -> Result<&'static Element> {
    let symbol = symbol.to_ascii_lowercase();
    ELEMENTS
        .iter()
        .find(|e| e.symbol == symbol)
        .ok_or_else(|| SasError::config(format!("unknown element '{symbol}'")))
}

/// A parsed composition string.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Leading amount (1 when omitted); mol/l or g/l depending on the caller.
    pub amount: f64,
    pub atoms: Vec<(&'static Element, f64)>,
}

impl Component {
    /// Canonical formula without the amount, e.g. `h2o1`.
    pub fn formula(&self) -> String {
        self.atoms.iter().map(|(e, n)| format!("{}{}", e.symbol, fmt_count(*n))).collect()
    }

    /// Molar mass in g/mol.
    pub fn mass(&self) -> f64 {
        self.atoms.iter().map(|(e, n)| e.mass * n).sum()
    }

    pub fn electrons(&self) -> f64 {
        self.atoms.iter().map(|(e, n)| e.z as f64 * n).sum()
    }

    pub fn is_water(&self) -> bool {
        self.formula() == "h2o1"
    }

    pub fn is_heavy_water(&self) -> bool {
        self.formula() == "d2o1"
    }
}

fn fmt_count(n: f64) -> String {
    if n.fract() == 0.0 { format!("{}", n as i64) } else { format!("{n}") }
}

/// Split into alternating number and letter runs.
fn tokens(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut numeric: Option<bool> = None;
    for (i, ch) in s.char_indices() {
        let is_num = ch.is_ascii_digit() || ch == '.';
        if numeric.is_some_and(|n| n != is_num) {
            out.push(&s[start..i]);
            start = i;
        }
        numeric = Some(is_num);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

impl std::str::FromStr for Component {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let mut parts = tokens(&lower);
        if parts.is_empty() {
            return Err(SasError::config("empty composition"));
        }
        let number = |t: &str| -> Result<f64> {
            t.parse::<f64>().map_err(|_| SasError::config(format!("bad number '{t}' in composition '{s}'")))
        };
        let amount = if parts[0].starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            let a = number(parts[0])?;
            parts.remove(0);
            a
        } else {
            1.0
        };
        if parts.len() % 2 != 0 {
            return Err(SasError::config(format!("last element in '{s}' is missing its count")));
        }
        let atoms = parts
            .chunks(2)
            .map(|pair| Ok((element(pair[0])?, number(pair[1])?)))
            .collect::<Result<Vec<_>>>()?;
        if atoms.is_empty() {
            return Err(SasError::config(format!("composition '{s}' names no element")));
        }
        Ok(Self { amount, atoms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parse_water() {
        let c: Component = "55.5H2O1".parse().unwrap();
        assert_eq!(c.amount, 55.5);
        assert_eq!(c.formula(), "h2o1");
        assert!(c.is_water());
        assert_relative_eq!(c.mass(), 18.015, max_relative = 1e-4);
        assert_eq!(c.electrons(), 10.0);
    }

    #[test]
    fn parse_salts_and_defaults() {
        let c: Component = "na1cl1".parse().unwrap();
        assert_eq!(c.amount, 1.0);
        assert_eq!(c.electrons(), 28.0);
        let d: Component = "d2o1".parse().unwrap();
        assert!(d.is_heavy_water());
        let g: Component = "0.5c3h8o3".parse().unwrap();
        assert_eq!(g.atoms.len(), 3);
        assert_eq!(g.electrons(), 50.0);
    }

    #[test]
    fn malformed_compositions() {
        assert!("h2o".parse::<Component>().is_err());
        assert!("xx1".parse::<Component>().is_err());
        assert!("".parse::<Component>().is_err());
        assert!("12".parse::<Component>().is_err());
    }
}
