use serde::{Deserialize, Serialize};

use crate::mapping::{ManualPwmSettings, TemperatureMapping};
use crate::types::ControlMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub tick_interval_ms: u64,
    pub state_publish_interval_ms: u64,
    pub auto_pwm_frequency_hz: u32,
    pub sensor_read_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            state_publish_interval_ms: 30_000,
            auto_pwm_frequency_hz: 1_000,
            sensor_read_interval_ms: 5_000,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.tick_interval_ms < 100 {
            self.tick_interval_ms = defaults.tick_interval_ms;
        }
        if self.state_publish_interval_ms < 1_000 {
            self.state_publish_interval_ms = defaults.state_publish_interval_ms;
        }
        if self.sensor_read_interval_ms < 100 {
            self.sensor_read_interval_ms = defaults.sensor_read_interval_ms;
        }
        if ManualPwmSettings::new(self.auto_pwm_frequency_hz, 0).is_err() {
            self.auto_pwm_frequency_hz = defaults.auto_pwm_frequency_hz;
        }
    }
}

/// Tunables backed by the settings store. Values arrive here raw and are
/// repaired by [`PersistedSettings::sanitize`] before the controller uses them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub mode: ControlMode,
    pub auto_pwm_enabled: bool,
    pub manual_freq_hz: u32,
    pub manual_duty_percent: u8,
    pub temp_start_c: f32,
    pub temp_max_c: f32,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        let mapping = TemperatureMapping::default();
        let manual = ManualPwmSettings::default();
        Self {
            mode: ControlMode::Auto,
            auto_pwm_enabled: true,
            manual_freq_hz: manual.frequency_hz(),
            manual_duty_percent: manual.duty_percent(),
            temp_start_c: mapping.start_temp_c(),
            temp_max_c: mapping.max_temp_c(),
        }
    }
}

impl PersistedSettings {
    pub fn sanitize(&mut self) {
        self.manual_freq_hz = self.manual_freq_hz.clamp(
            crate::mapping::MANUAL_FREQ_MIN_HZ,
            crate::mapping::MANUAL_FREQ_MAX_HZ,
        );
        self.manual_duty_percent = self
            .manual_duty_percent
            .min(crate::mapping::DUTY_PERCENT_MAX);

        if TemperatureMapping::new(self.temp_start_c, self.temp_max_c).is_err() {
            let fallback = TemperatureMapping::default();
            self.temp_start_c = fallback.start_temp_c();
            self.temp_max_c = fallback.max_temp_c();
        }
    }

    pub fn mapping(&self) -> TemperatureMapping {
        TemperatureMapping::new(self.temp_start_c, self.temp_max_c).unwrap_or_default()
    }

    pub fn manual(&self) -> ManualPwmSettings {
        ManualPwmSettings::new(self.manual_freq_hz, self.manual_duty_percent).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub device_name: String,
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub mqtt_topic_prefix: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            device_name: "Fan Controller".to_string(),
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            mqtt_topic_prefix: "homeassistant/esp32".to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn sanitize(&mut self) {
        let trimmed = self.mqtt_topic_prefix.trim().trim_matches('/');
        self.mqtt_topic_prefix = if trimmed.is_empty() {
            Self::default().mqtt_topic_prefix
        } else {
            trimmed.to_string()
        };

        if self.mqtt_port == 0 {
            self.mqtt_port = 1883;
        }
        if self.device_name.trim().is_empty() {
            self.device_name = Self::default().device_name;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub controller: ControllerConfig,
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.controller.sanitize();
        self.network.sanitize();
    }
}
