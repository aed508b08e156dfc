//! Conversion between raw actuator height and a 0..=100 position percentage.
//!
//! Heights are in the desk's native length unit (telemetry reports tenths;
//! callers divide by 10 first). The mapping is linear between the per-device
//! calibration bounds:
//!
//!   pct    = round(100 * (height - base) / (max - base)), clamped to [0, 100]
//!   height = round(base + pct / 100 * (max - base))
//!
//! The inverse is informational only. Commands never carry a height; motion
//! is driven by telemetry feedback.

use crate::error::DeskError;

/// Per-device physical bounds. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    base_height: f64,
    max_height: f64,
}

impl Calibration {
    /// Validate and build. Rejects `max_height <= base_height` and non-finite bounds.
    pub fn new(base_height: f64, max_height: f64) -> Result<Self, DeskError> {
        if !base_height.is_finite() || !max_height.is_finite() || max_height <= base_height {
            return Err(DeskError::CalibrationInvalid {
                base: base_height,
                max: max_height,
            });
        }
        Ok(Self {
            base_height,
            max_height,
        })
    }

    pub fn base_height(&self) -> f64 {
        self.base_height
    }

    pub fn max_height(&self) -> f64 {
        self.max_height
    }

    #[inline]
    fn range(&self) -> f64 {
        self.max_height - self.base_height
    }

    pub fn height_to_percentage(&self, height: f64) -> u8 {
        let r = (100.0 * (height - self.base_height) / self.range()).round();
        if r.is_nan() {
            return 0;
        }
        r.clamp(0.0, 100.0) as u8
    }

    pub fn percentage_to_height(&self, pct: u8) -> f64 {
        (self.base_height + (f64::from(pct) / 100.0) * self.range()).round()
    }
}

/// Free-function form of [`Calibration::height_to_percentage`].
#[inline]
pub fn height_to_percentage(height: f64, cal: &Calibration) -> u8 {
    cal.height_to_percentage(height)
}

/// Free-function form of [`Calibration::percentage_to_height`].
#[inline]
pub fn percentage_to_height(pct: u8, cal: &Calibration) -> f64 {
    cal.percentage_to_height(pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_bounds() {
        assert!(matches!(
            Calibration::new(700.0, 700.0),
            Err(DeskError::CalibrationInvalid { .. })
        ));
        assert!(Calibration::new(700.0, 600.0).is_err());
        assert!(Calibration::new(f64::NAN, 600.0).is_err());
    }

    #[test]
    fn office_desk_reference_points() {
        let cal = Calibration::new(620.0, 1270.0).unwrap();
        assert_eq!(cal.height_to_percentage(650.0), 5);
        assert_eq!(cal.height_to_percentage(620.0), 0);
        assert_eq!(cal.height_to_percentage(1270.0), 100);
        assert_eq!(cal.percentage_to_height(50), 945.0);
    }

    #[test]
    fn out_of_range_heights_clamp() {
        let cal = Calibration::new(620.0, 1270.0).unwrap();
        assert_eq!(cal.height_to_percentage(0.0), 0);
        assert_eq!(cal.height_to_percentage(5000.0), 100);
        assert_eq!(cal.height_to_percentage(f64::INFINITY), 100);
        assert_eq!(cal.height_to_percentage(f64::NAN), 0);
    }
}
