//! Electrode materials, their standard potentials and single-cell voltages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Electrode metal. The set is closed; potentials never change at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metal {
    Mg,
    Ag,
    Cu,
    Pb,
    Fe,
    Zn,
}

impl Metal {
    pub const ALL: [Metal; 6] = [
        Metal::Mg,
        Metal::Ag,
        Metal::Cu,
        Metal::Pb,
        Metal::Fe,
        Metal::Zn,
    ];

    /// Standard reduction potential in volts.
    pub fn potential(self) -> f64 {
        match self {
            Metal::Mg => -2.37,
            Metal::Ag => 0.80,
            Metal::Cu => 0.34,
            Metal::Pb => -0.13,
            Metal::Fe => -0.44,
            Metal::Zn => -0.76,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Metal::Mg => "Mg",
            Metal::Ag => "Ag",
            Metal::Cu => "Cu",
            Metal::Pb => "Pb",
            Metal::Fe => "Fe",
            Metal::Zn => "Zn",
        }
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Rounds to two decimals, halves going toward positive infinity.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Potential difference `right - left` of a two-electrode cell.
pub fn cell_voltage(left: Metal, right: Metal) -> f64 {
    round2(right.potential() - left.potential())
}
