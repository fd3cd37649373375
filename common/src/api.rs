//! JSON bodies served by the `/api/*-status` routes on both builds.

use serde::Serialize;

use crate::error::ControlError;
use crate::types::FanTelemetry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PwmStatusView {
    pub mode: &'static str,
    #[serde(rename = "autoEnabled")]
    pub auto_enabled: bool,
    #[serde(rename = "currentDuty")]
    pub current_duty: u8,
    #[serde(rename = "currentDutyPercent")]
    pub current_duty_percent: f32,
    #[serde(rename = "frequencyHz")]
    pub frequency_hz: u32,
    #[serde(rename = "manualFrequency")]
    pub manual_frequency: u32,
    #[serde(rename = "manualDuty")]
    pub manual_duty: u8,
}

impl From<&FanTelemetry> for PwmStatusView {
    fn from(telemetry: &FanTelemetry) -> Self {
        Self {
            mode: telemetry.mode,
            auto_enabled: telemetry.auto_enabled,
            current_duty: telemetry.current_duty,
            current_duty_percent: telemetry.current_duty_percent,
            frequency_hz: telemetry.frequency_hz,
            manual_frequency: telemetry.manual.frequency,
            manual_duty: telemetry.manual.duty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingStatusView {
    #[serde(rename = "startTemp")]
    pub start_temp: f32,
    #[serde(rename = "maxTemp")]
    pub max_temp: f32,
    #[serde(rename = "autoEnabled")]
    pub auto_enabled: bool,
}

impl From<&FanTelemetry> for MappingStatusView {
    fn from(telemetry: &FanTelemetry) -> Self {
        Self {
            start_temp: telemetry.mapping.start_temp_c,
            max_temp: telemetry.mapping.max_temp_c,
            auto_enabled: telemetry.auto_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorStatusView {
    pub ready: bool,
    #[serde(rename = "errorCode")]
    pub error_code: u8,
    pub status: &'static str,
    #[serde(rename = "temperatureCelsius")]
    pub temperature_c: Option<f32>,
    #[serde(rename = "temperatureFahrenheit")]
    pub temperature_f: Option<f32>,
}

impl From<&FanTelemetry> for SensorStatusView {
    fn from(telemetry: &FanTelemetry) -> Self {
        Self {
            ready: telemetry.sensor_ready,
            error_code: telemetry.sensor_error_code,
            status: telemetry.sensor_status,
            temperature_c: telemetry.temperature_c,
            temperature_f: telemetry.temperature_f,
        }
    }
}

/// HTTP status for a rejected command.
pub fn http_status(err: &ControlError) -> u16 {
    match err {
        ControlError::Validation(_) => 400,
        ControlError::Persistence(_) => 500,
        ControlError::Hardware(_) => 503,
    }
}
