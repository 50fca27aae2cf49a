//! Extraction settings.

use msk_table::{AngleUnit, Header};
use serde::{Deserialize, Serialize};

/// Default absolute per-component tolerance for anchor drift.
pub const DEFAULT_DRIFT_TOLERANCE: f64 = 1e-9;

/// Settings for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Anchor components may change by this much between rows without an
    /// `OriginDrift` event.
    pub drift_tolerance: f64,
    /// Unit of rotational values in the table. `None` reads the header's
    /// `inDegrees` entry.
    pub table_angle_unit: Option<AngleUnit>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: DEFAULT_DRIFT_TOLERANCE,
            table_angle_unit: None,
        }
    }
}

impl ExtractionConfig {
    /// Set the drift tolerance.
    #[must_use]
    pub fn with_drift_tolerance(mut self, tolerance: f64) -> Self {
        self.drift_tolerance = tolerance;
        self
    }

    /// Override the table's declared angle unit.
    #[must_use]
    pub fn with_table_angle_unit(mut self, unit: AngleUnit) -> Self {
        self.table_angle_unit = Some(unit);
        self
    }

    /// The unit rotational table values are read in.
    #[must_use]
    pub fn table_unit(&self, header: &Header) -> AngleUnit {
        self.table_angle_unit.unwrap_or_else(|| header.angle_unit())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn header_declares_unit_unless_overridden() {
        let header = Header::new(["inDegrees=yes", "endheader"]);
        let config = ExtractionConfig::default();
        assert_eq!(config.table_unit(&header), AngleUnit::Degrees);

        let config = config.with_table_angle_unit(AngleUnit::Radians);
        assert_eq!(config.table_unit(&header), AngleUnit::Radians);
    }

    #[test]
    fn default_tolerance() {
        assert!((ExtractionConfig::default().drift_tolerance - 1e-9).abs() < f64::EPSILON);
    }
}
