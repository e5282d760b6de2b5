//! Physical quantities carried by archetypes.
//!
//! Each quantity is an integer in its base unit (grams, millilitres,
//! millimetres). Content files may give either a bare integer in the base
//! unit or a string with unit suffixes, e.g. `"2 kg"`, `"1 L 250 ml"`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Errors raised when parsing a quantity string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("empty quantity string")]
    Empty,
    #[error("'{0}' is not a number")]
    BadNumber(String),
    #[error("unknown unit '{unit}' (expected one of: {expected})")]
    UnknownUnit { unit: String, expected: &'static str },
    #[error("number '{0}' is missing a unit")]
    MissingUnit(String),
}

/// Mass in grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Mass(pub i64);

/// Volume in millilitres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Volume(pub i64);

/// Length in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Length(pub i64);

impl Mass {
    pub const ZERO: Mass = Mass(0);

    pub fn grams(self) -> i64 {
        self.0
    }

    pub fn kilograms(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn parse(s: &str) -> Result<Self, UnitError> {
        parse_compound(s, MASS_UNITS, "mg, g, kg").map(Mass)
    }
}

impl Volume {
    pub const ZERO: Volume = Volume(0);

    pub fn millilitres(self) -> i64 {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, UnitError> {
        parse_compound(s, VOLUME_UNITS, "ml, L").map(Volume)
    }
}

impl Length {
    pub const ZERO: Length = Length(0);

    pub fn millimetres(self) -> i64 {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, UnitError> {
        parse_compound(s, LENGTH_UNITS, "mm, cm, m, km").map(Length)
    }

    /// Default longest side for an object of the given volume: the edge of
    /// a cube of that volume, rounded to whole centimetres.
    pub fn default_from_volume(v: Volume) -> Length {
        let cm = (v.0.max(0) as f64).cbrt().round() as i64;
        Length((cm * 10).max(1))
    }
}

macro_rules! impl_arith {
    ($t:ident) => {
        impl Add for $t {
            type Output = $t;
            fn add(self, rhs: $t) -> $t {
                $t(self.0.saturating_add(rhs.0))
            }
        }

        impl AddAssign for $t {
            fn add_assign(&mut self, rhs: $t) {
                self.0 = self.0.saturating_add(rhs.0);
            }
        }

        impl $t {
            /// Scale by a factor, rounding to the nearest base unit.
            pub fn scaled(self, factor: f64) -> $t {
                $t((self.0 as f64 * factor).round() as i64)
            }
        }
    };
}

impl_arith!(Mass);
impl_arith!(Volume);
impl_arith!(Length);

/// (suffix, multiplier into the base unit). Longer suffixes first.
const MASS_UNITS: &[(&str, f64)] = &[("mg", 0.001), ("kg", 1000.0), ("g", 1.0)];
const VOLUME_UNITS: &[(&str, f64)] = &[("ml", 1.0), ("mL", 1.0), ("L", 1000.0), ("l", 1000.0)];
const LENGTH_UNITS: &[(&str, f64)] = &[
    ("mm", 1.0),
    ("cm", 10.0),
    ("km", 1_000_000.0),
    ("m", 1000.0),
];

/// Parse `"<number> <unit> [<number> <unit> ...]"`, summing the parts.
fn parse_compound(s: &str, units: &[(&str, f64)], expected: &'static str) -> Result<i64, UnitError> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(UnitError::Empty);
    }

    let mut total = 0.0f64;
    let mut i = 0;
    while i < tokens.len() {
        // Accept both "250 ml" and "250ml".
        let token = tokens[i];
        let split = token
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(token.len());
        let (num_part, attached_unit) = token.split_at(split);
        let value: f64 = num_part
            .parse()
            .map_err(|_| UnitError::BadNumber(token.to_string()))?;

        let unit = if !attached_unit.is_empty() {
            i += 1;
            attached_unit
        } else {
            let u = tokens
                .get(i + 1)
                .ok_or_else(|| UnitError::MissingUnit(token.to_string()))?;
            i += 2;
            u
        };

        let factor = units
            .iter()
            .find(|(suffix, _)| *suffix == unit)
            .map(|(_, f)| *f)
            .ok_or_else(|| UnitError::UnknownUnit {
                unit: unit.to_string(),
                expected,
            })?;
        total += value * factor;
    }

    Ok(total.round() as i64)
}
