use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMode {
    Auto,
    Manual,
}

impl ControlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }

    /// Case-insensitive parse of the names used by the HTTP and MQTT surfaces.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("auto") {
            Some(Self::Auto)
        } else if value.eq_ignore_ascii_case("manual") {
            Some(Self::Manual)
        } else {
            None
        }
    }
}

/// KMeter-ISO status register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    Ready,
    SensorError,
    CommunicationError,
    DataNotReady,
    NotInitialized,
    Unknown(u8),
}

impl SensorStatus {
    pub const NOT_INITIALIZED_CODE: u8 = 255;

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ready,
            1 => Self::SensorError,
            2 => Self::CommunicationError,
            3 => Self::DataNotReady,
            Self::NOT_INITIALIZED_CODE => Self::NotInitialized,
            other => Self::Unknown(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::SensorError => "Sensor Error",
            Self::CommunicationError => "Communication Error",
            Self::DataNotReady => "Data Not Ready",
            Self::NotInitialized => "Not Initialized",
            Self::Unknown(_) => "Unknown Error",
        }
    }
}

/// One poll of the temperature source. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_c: f32,
    pub ready: bool,
    pub error_code: u8,
}

impl SensorReading {
    pub fn ready(temperature_c: f32) -> Self {
        Self {
            temperature_c,
            ready: true,
            error_code: 0,
        }
    }

    pub fn not_initialized() -> Self {
        Self {
            temperature_c: 0.0,
            ready: false,
            error_code: SensorStatus::NOT_INITIALIZED_CODE,
        }
    }

    /// Decodes a KMeter-ISO status byte and its little-endian temperature
    /// register (hundredths of a degree Celsius).
    pub fn from_kmeter(status: u8, raw_temp: [u8; 4]) -> Self {
        Self {
            temperature_c: i32::from_le_bytes(raw_temp) as f32 / 100.0,
            ready: status == 0,
            error_code: status,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.ready && self.error_code == 0 && self.temperature_c.is_finite()
    }

    pub fn status(&self) -> SensorStatus {
        SensorStatus::from_code(self.error_code)
    }

    pub fn temperature_f(&self) -> f32 {
        celsius_to_fahrenheit(self.temperature_c)
    }
}

pub fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 9.0 / 5.0 + 32.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MappingView {
    #[serde(rename = "startTemp")]
    pub start_temp_c: f32,
    #[serde(rename = "maxTemp")]
    pub max_temp_c: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManualView {
    pub frequency: u32,
    pub duty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanTelemetry {
    pub mode: &'static str,
    #[serde(rename = "autoEnabled")]
    pub auto_enabled: bool,
    #[serde(rename = "currentDuty")]
    pub current_duty: u8,
    #[serde(rename = "currentDutyPercent")]
    pub current_duty_percent: f32,
    #[serde(rename = "frequencyHz")]
    pub frequency_hz: u32,
    #[serde(rename = "temperatureCelsius")]
    pub temperature_c: Option<f32>,
    #[serde(rename = "temperatureFahrenheit")]
    pub temperature_f: Option<f32>,
    #[serde(rename = "sensorReady")]
    pub sensor_ready: bool,
    #[serde(rename = "sensorErrorCode")]
    pub sensor_error_code: u8,
    #[serde(rename = "sensorStatus")]
    pub sensor_status: &'static str,
    pub mapping: MappingView,
    pub manual: ManualView,
}

/// Compact snapshot published on the MQTT `state` topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanStatePayload {
    pub temp: Option<f32>,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: f32,
    pub duty: u8,
    pub mode: &'static str,
    #[serde(rename = "autoEnabled")]
    pub auto_enabled: bool,
    #[serde(rename = "sensorReady")]
    pub sensor_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_accepts_mixed_case() {
        assert_eq!(ControlMode::parse("auto"), Some(ControlMode::Auto));
        assert_eq!(ControlMode::parse(" MANUAL "), Some(ControlMode::Manual));
        assert_eq!(ControlMode::parse("Manual"), Some(ControlMode::Manual));
        assert_eq!(ControlMode::parse("heat"), None);
    }

    #[test]
    fn reading_usable_requires_ready_and_clean_status() {
        assert!(SensorReading::ready(42.0).is_usable());
        assert!(!SensorReading::not_initialized().is_usable());

        let stale = SensorReading {
            temperature_c: 42.0,
            ready: false,
            error_code: 0,
        };
        assert!(!stale.is_usable());

        let comm_error = SensorReading {
            temperature_c: 42.0,
            ready: true,
            error_code: 2,
        };
        assert!(!comm_error.is_usable());
        assert_eq!(comm_error.status(), SensorStatus::CommunicationError);

        assert!(!SensorReading::ready(f32::NAN).is_usable());
    }

    #[test]
    fn status_codes_map_to_labels() {
        assert_eq!(SensorStatus::from_code(0).as_str(), "Ready");
        assert_eq!(SensorStatus::from_code(3).as_str(), "Data Not Ready");
        assert_eq!(SensorStatus::from_code(255), SensorStatus::NotInitialized);
        assert_eq!(SensorStatus::from_code(9), SensorStatus::Unknown(9));
    }

    #[test]
    fn kmeter_frames_decode() {
        let reading = SensorReading::from_kmeter(0, 5_525_i32.to_le_bytes());
        assert_eq!(reading.temperature_c, 55.25);
        assert!(reading.is_usable());

        let below_zero = SensorReading::from_kmeter(0, (-1_050_i32).to_le_bytes());
        assert_eq!(below_zero.temperature_c, -10.5);

        let busy = SensorReading::from_kmeter(3, [0; 4]);
        assert!(!busy.ready);
        assert_eq!(busy.status(), SensorStatus::DataNotReady);
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(SensorReading::ready(0.0).temperature_f(), 32.0);
    }
}
