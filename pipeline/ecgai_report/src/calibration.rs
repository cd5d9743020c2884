//! Threshold recalibration of the binary detector and confidence display.
//!
//! The raw sigmoid is mapped onto a `[0.5, 1.0]` "confidence in the stated
//! verdict" scale. The verdict comes from which side of the threshold the
//! raw value fell on, never from the recalibrated number.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Rhythm confidences at or above this are shown as `> 95%`.
pub const RHYTHM_DISPLAY_CLAMP: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(0.5);

    pub fn new(value: f64) -> Result<Self, CalibrationError> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(CalibrationError::OutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn recalibrate(self, raw: f64) -> Verdict {
        let t = self.0;
        if raw >= t {
            Verdict {
                positive: true,
                display: (raw - t) / (1.0 - t) * 0.5 + 0.5,
            }
        } else {
            Verdict {
                positive: false,
                display: (t - raw) / t * 0.5 + 0.5,
            }
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Threshold {
    type Error = CalibrationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Threshold::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub positive: bool,
    /// Confidence in the verdict, in `[0.5, 1.0]` for raw values in `[0, 1]`.
    pub display: f64,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        if self.positive {
            "Acute STEMI"
        } else {
            "Not Acute STEMI"
        }
    }

    /// Display confidence as a percentage rounded to two decimals.
    pub fn percent(&self) -> f64 {
        round2(self.display * 100.0)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Rhythm confidence as shown to readers, clamped to avoid false precision.
pub fn format_rhythm_confidence(confidence: f64) -> String {
    if confidence >= RHYTHM_DISPLAY_CLAMP {
        String::from("> 95%")
    } else {
        format_percent(confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn symmetric_around_threshold() {
        let t = Threshold::DEFAULT;
        let high = t.recalibrate(0.9);
        let low = t.recalibrate(0.1);
        assert!(high.positive);
        assert!(!low.positive);
        assert_relative_eq!(high.display, 0.9, epsilon = 1e-12);
        assert_relative_eq!(low.display, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn boundary_is_positive_at_half() {
        let verdict = Threshold::DEFAULT.recalibrate(0.5);
        assert!(verdict.positive);
        assert_eq!(verdict.display, 0.5);
        assert_eq!(verdict.label(), "Acute STEMI");
    }

    #[test]
    fn both_branches_meet_at_threshold() {
        let t = Threshold::new(0.3).unwrap();
        let upper = t.recalibrate(0.3).display;
        let lower = (0.3 - 0.3) / 0.3 * 0.5 + 0.5;
        assert_eq!(upper, lower);
    }

    #[test]
    fn threshold_bounds_are_exclusive() {
        assert_eq!(Threshold::new(0.0), Err(CalibrationError::OutOfRange(0.0)));
        assert_eq!(Threshold::new(1.0), Err(CalibrationError::OutOfRange(1.0)));
        assert!(Threshold::new(f64::NAN).is_err());
        assert!(Threshold::new(0.01).is_ok());
    }

    #[test]
    fn rhythm_display_clamps() {
        assert_eq!(format_rhythm_confidence(0.95), "> 95%");
        assert_eq!(format_rhythm_confidence(0.999), "> 95%");
        assert_eq!(format_rhythm_confidence(0.9412), "94.12%");
    }

    #[test]
    fn percent_rounds_to_two_decimals() {
        let verdict = Threshold::DEFAULT.recalibrate(0.876543);
        assert_eq!(verdict.percent(), 87.65);
    }

    proptest! {
        #[test]
        fn display_stays_in_upper_half(raw in 0.0f64..=1.0, t in 0.01f64..0.99) {
            let verdict = Threshold::new(t).unwrap().recalibrate(raw);
            prop_assert!(verdict.display >= 0.5 - 1e-12);
            prop_assert!(verdict.display <= 1.0 + 1e-12);
            prop_assert_eq!(verdict.positive, raw >= t);
        }
    }
}
