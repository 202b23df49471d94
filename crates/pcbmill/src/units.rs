use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MM_PER_INCH: f64 = 25.4;

/// Unit system shared by every coordinate and numeric option of one object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    #[default]
    Inch,
    Millimeter,
}

impl Units {
    /// Scalar that converts a length in `self` into `target`.
    pub fn factor_to(self, target: Units) -> f64 {
        match (self, target) {
            (Units::Inch, Units::Millimeter) => MM_PER_INCH,
            (Units::Millimeter, Units::Inch) => 1.0 / MM_PER_INCH,
            _ => 1.0,
        }
    }

    /// G-code unit selection word.
    pub fn gcode(self) -> &'static str {
        match self {
            Units::Inch => "G20",
            Units::Millimeter => "G21",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Inch => write!(f, "IN"),
            Units::Millimeter => write!(f, "MM"),
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" | "INCH" | "INCHES" => Ok(Units::Inch),
            "MM" | "METRIC" | "MILLIMETER" | "MILLIMETERS" => Ok(Units::Millimeter),
            other => Err(format!("unknown unit system `{other}`, use IN or MM")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors_compose_to_one() {
        let there = Units::Inch.factor_to(Units::Millimeter);
        let back = Units::Millimeter.factor_to(Units::Inch);
        assert!((there * back - 1.0).abs() < 1e-12);
        assert_eq!(Units::Inch.factor_to(Units::Inch), 1.0);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("mm".parse::<Units>().unwrap(), Units::Millimeter);
        assert_eq!("INCH".parse::<Units>().unwrap(), Units::Inch);
        assert!("furlong".parse::<Units>().is_err());
    }
}
