use serde::{Deserialize, Serialize};

use crate::Real;

/// Length unit of stored world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    #[default]
    Millimeters,
    Meters,
}

impl LengthUnit {
    /// Number of units in one metre.
    pub fn units_per_meter(self) -> Real {
        match self {
            LengthUnit::Millimeters => 1000.0,
            LengthUnit::Meters => 1.0,
        }
    }

    pub fn to_meters(self, value: Real) -> Real {
        value / self.units_per_meter()
    }

    pub fn from_meters(self, meters: Real) -> Real {
        meters * self.units_per_meter()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Millimeters => "mm",
            LengthUnit::Meters => "m",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millimeters_convert_once() {
        let unit = LengthUnit::Millimeters;
        assert_eq!(unit.to_meters(2500.0), 2.5);
        assert_eq!(unit.from_meters(unit.to_meters(2500.0)), 2500.0);
        assert_eq!(LengthUnit::Meters.to_meters(2.5), 2.5);
    }
}
