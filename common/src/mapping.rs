use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Highest temperature either end of the mapping may be set to, in °C.
pub const MAPPING_CEILING_C: f32 = 150.0;

pub const MANUAL_FREQ_MIN_HZ: u32 = 100;
pub const MANUAL_FREQ_MAX_HZ: u32 = 40_000;
pub const DUTY_PERCENT_MAX: u8 = 100;
pub const DUTY_RAW_MAX: u8 = 255;

/// Linear temperature window driving AUTO mode.
///
/// Below `start_temp_c` the fan is off, at or above `max_temp_c` it runs at
/// full duty, and in between duty scales linearly over the full 0..=255 range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureMapping {
    #[serde(rename = "startTemp")]
    start_temp_c: f32,
    #[serde(rename = "maxTemp")]
    max_temp_c: f32,
}

impl TemperatureMapping {
    pub fn new(start_temp_c: f32, max_temp_c: f32) -> Result<Self, ValidationError> {
        if !start_temp_c.is_finite() || !max_temp_c.is_finite() {
            return Err(ValidationError::NonFiniteTemperature);
        }
        let start_temp_c = quantize_temp(start_temp_c);
        let max_temp_c = quantize_temp(max_temp_c);
        if !(0.0..=MAPPING_CEILING_C).contains(&start_temp_c) {
            return Err(ValidationError::StartOutOfRange {
                start: start_temp_c,
                ceiling: MAPPING_CEILING_C,
            });
        }
        if !(0.0..=MAPPING_CEILING_C).contains(&max_temp_c) {
            return Err(ValidationError::MaxOutOfRange {
                max: max_temp_c,
                ceiling: MAPPING_CEILING_C,
            });
        }
        if start_temp_c >= max_temp_c {
            return Err(ValidationError::StartNotBelowMax {
                start: start_temp_c,
                max: max_temp_c,
            });
        }

        Ok(Self {
            start_temp_c,
            max_temp_c,
        })
    }

    pub fn start_temp_c(&self) -> f32 {
        self.start_temp_c
    }

    pub fn max_temp_c(&self) -> f32 {
        self.max_temp_c
    }

    /// Raw duty for a temperature. Rounds half away from zero, so the
    /// midpoint of 30..80 (55 °C) yields 128.
    pub fn duty_for(&self, temp_c: f32) -> u8 {
        if temp_c <= self.start_temp_c {
            return 0;
        }
        if temp_c >= self.max_temp_c {
            return DUTY_RAW_MAX;
        }

        let ratio = (temp_c - self.start_temp_c) / (self.max_temp_c - self.start_temp_c);
        let scaled = (ratio * f32::from(DUTY_RAW_MAX)).round();
        scaled.clamp(0.0, f32::from(DUTY_RAW_MAX)) as u8
    }
}

impl Default for TemperatureMapping {
    fn default() -> Self {
        Self {
            start_temp_c: 30.0,
            max_temp_c: 80.0,
        }
    }
}

/// User-facing PWM settings held for MANUAL mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPwmSettings {
    #[serde(rename = "frequency")]
    frequency_hz: u32,
    #[serde(rename = "duty")]
    duty_percent: u8,
}

impl ManualPwmSettings {
    pub fn new(frequency_hz: u32, duty_percent: u8) -> Result<Self, ValidationError> {
        if !(MANUAL_FREQ_MIN_HZ..=MANUAL_FREQ_MAX_HZ).contains(&frequency_hz) {
            return Err(ValidationError::FrequencyOutOfRange(frequency_hz));
        }
        if duty_percent > DUTY_PERCENT_MAX {
            return Err(ValidationError::DutyOutOfRange(duty_percent));
        }

        Ok(Self {
            frequency_hz,
            duty_percent,
        })
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    pub fn duty_percent(&self) -> u8 {
        self.duty_percent
    }

    pub fn duty_raw(&self) -> u8 {
        percent_to_raw(self.duty_percent)
    }
}

impl Default for ManualPwmSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 1_000,
            duty_percent: 0,
        }
    }
}

/// Snaps a temperature to the 0.01 °C grid the settings store keeps.
pub fn quantize_temp(temp_c: f32) -> f32 {
    (temp_c * 100.0).round() / 100.0
}

/// `round(percent * 255 / 100)` with half-up rounding; saturates above 100 %.
pub fn percent_to_raw(percent: u8) -> u8 {
    let percent = u32::from(percent.min(DUTY_PERCENT_MAX));
    ((percent * 255 + 50) / 100) as u8
}

/// Raw duty as a percentage with one decimal place.
pub fn raw_to_percent(raw: u8) -> f32 {
    (f32::from(raw) * 1000.0 / 255.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(start: f32, max: f32) -> TemperatureMapping {
        TemperatureMapping::new(start, max).expect("valid mapping")
    }

    #[test]
    fn midpoint_rounds_half_up() {
        assert_eq!(mapping(30.0, 80.0).duty_for(55.0), 128);
    }

    #[test]
    fn boundaries_are_exact() {
        for (start, max) in [(0.0, 1.0), (30.0, 80.0), (20.5, 21.0), (149.0, 150.0)] {
            let m = mapping(start, max);
            assert_eq!(m.duty_for(start), 0, "start of {start}..{max}");
            assert_eq!(m.duty_for(max), 255, "max of {start}..{max}");
            assert_eq!(m.duty_for(start - 10.0), 0);
            assert_eq!(m.duty_for(max + 10.0), 255);
        }
    }

    #[test]
    fn duty_never_decreases_with_temperature() {
        let m = mapping(30.0, 80.0);
        let mut previous = 0;
        let mut t = 20.0_f32;
        while t < 90.0 {
            let duty = m.duty_for(t);
            assert!(duty >= previous, "duty dropped at {t}");
            previous = duty;
            t += 0.05;
        }
        assert_eq!(previous, 255);
    }

    #[test]
    fn thresholds_snap_to_hundredths_before_validation() {
        let m = mapping(30.126, 65.5);
        assert_eq!(m.start_temp_c(), 30.13);
        assert_eq!(m.max_temp_c(), 65.5);

        assert_eq!(
            TemperatureMapping::new(40.001, 40.004),
            Err(ValidationError::StartNotBelowMax {
                start: 40.0,
                max: 40.0
            })
        );
    }

    #[test]
    fn rejects_inverted_and_out_of_range_windows() {
        assert_eq!(
            TemperatureMapping::new(50.0, 30.0),
            Err(ValidationError::StartNotBelowMax {
                start: 50.0,
                max: 30.0
            })
        );
        assert!(matches!(
            TemperatureMapping::new(40.0, 40.0),
            Err(ValidationError::StartNotBelowMax { .. })
        ));
        assert!(matches!(
            TemperatureMapping::new(-1.0, 40.0),
            Err(ValidationError::StartOutOfRange { .. })
        ));
        assert!(matches!(
            TemperatureMapping::new(30.0, 151.0),
            Err(ValidationError::MaxOutOfRange { .. })
        ));
        assert_eq!(
            TemperatureMapping::new(f32::NAN, 40.0),
            Err(ValidationError::NonFiniteTemperature)
        );
    }

    #[test]
    fn manual_settings_range_checks() {
        assert!(ManualPwmSettings::new(100, 0).is_ok());
        assert!(ManualPwmSettings::new(40_000, 100).is_ok());
        assert_eq!(
            ManualPwmSettings::new(99, 50),
            Err(ValidationError::FrequencyOutOfRange(99))
        );
        assert_eq!(
            ManualPwmSettings::new(40_001, 50),
            Err(ValidationError::FrequencyOutOfRange(40_001))
        );
        assert_eq!(
            ManualPwmSettings::new(1_000, 101),
            Err(ValidationError::DutyOutOfRange(101))
        );
    }

    #[test]
    fn percent_conversion() {
        assert_eq!(percent_to_raw(0), 0);
        assert_eq!(percent_to_raw(50), 128);
        assert_eq!(percent_to_raw(80), 204);
        assert_eq!(percent_to_raw(100), 255);
        assert_eq!(percent_to_raw(200), 255);

        assert_eq!(raw_to_percent(0), 0.0);
        assert_eq!(raw_to_percent(128), 50.2);
        assert_eq!(raw_to_percent(255), 100.0);
    }
}
