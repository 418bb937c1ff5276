//! Common data types for hnlsel

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Event-level correction weight with its up/down systematic variations.
///
/// `up >= nominal >= down` is not guaranteed: products of per-object
/// `value - error` factors can cross when an error exceeds its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightTriple {
    /// Central value
    pub nominal: f64,
    /// Upward variation
    pub up: f64,
    /// Downward variation
    pub down: f64,
}

impl WeightTriple {
    /// Multiplicative identity, also the no-correction default.
    pub const UNIT: WeightTriple = WeightTriple { nominal: 1.0, up: 1.0, down: 1.0 };

    /// Create a weight triple from explicit components
    pub fn new(nominal: f64, up: f64, down: f64) -> Self {
        Self { nominal, up, down }
    }

    /// Symmetric triple `(value, value + error, value - error)`.
    pub fn from_value_error(value: f64, error: f64) -> Self {
        Self { nominal: value, up: value + error, down: value - error }
    }

    /// Component-wise product.
    pub fn product(self, other: WeightTriple) -> Self {
        Self {
            nominal: self.nominal * other.nominal,
            up: self.up * other.up,
            down: self.down * other.down,
        }
    }
}

impl Default for WeightTriple {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Data-taking era. Selects calibration tables and lookup axis ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Era {
    /// 2016 legacy
    Run2016,
    /// 2017
    Run2017,
    /// 2018
    Run2018,
}

impl Era {
    /// Calendar year of the era
    pub fn year(self) -> u16 {
        match self {
            Era::Run2016 => 2016,
            Era::Run2017 => 2017,
            Era::Run2018 => 2018,
        }
    }

    /// Resolve an era from its year, rejecting anything outside Run 2.
    pub fn from_year(year: u16) -> Result<Self> {
        match year {
            2016 => Ok(Era::Run2016),
            2017 => Ok(Era::Run2017),
            2018 => Ok(Era::Run2018),
            other => Err(Error::Config(format!("unsupported data-taking year: {other}"))),
        }
    }
}

impl TryFrom<u16> for Era {
    type Error = Error;

    fn try_from(year: u16) -> Result<Self> {
        Era::from_year(year)
    }
}

impl From<Era> for u16 {
    fn from(era: Era) -> u16 {
        era.year()
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year())
    }
}
