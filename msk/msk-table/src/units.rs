//! Angle units shared by tables and engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unit of rotational coordinate values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    /// Radians.
    #[default]
    Radians,
    /// Degrees.
    Degrees,
}

impl AngleUnit {
    /// Convert `value` from `self` to `target`.
    #[must_use]
    pub fn convert(self, value: f64, target: Self) -> f64 {
        match (self, target) {
            (Self::Degrees, Self::Radians) => value.to_radians(),
            (Self::Radians, Self::Degrees) => value.to_degrees(),
            _ => value,
        }
    }

    /// Unit declared by an `inDegrees` flag.
    #[must_use]
    pub fn from_in_degrees(in_degrees: bool) -> Self {
        if in_degrees {
            Self::Degrees
        } else {
            Self::Radians
        }
    }
}

impl fmt::Display for AngleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radians => write!(f, "radians"),
            Self::Degrees => write!(f, "degrees"),
        }
    }
}

impl FromStr for AngleUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rad" | "radians" => Ok(Self::Radians),
            "deg" | "degrees" => Ok(Self::Degrees),
            other => Err(format!("unknown angle unit `{other}` (expected radians or degrees)")),
        }
    }
}
