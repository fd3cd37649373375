use serde::{Deserialize, Serialize};

use crate::config::PersistedSettings;
use crate::error::StoreError;
use crate::mapping::quantize_temp;
use crate::types::ControlMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ControlMode,
    AutoPwmEnabled,
    ManualFreq,
    ManualDuty,
    TempStart,
    TempMax,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        Self::ControlMode,
        Self::AutoPwmEnabled,
        Self::ManualFreq,
        Self::ManualDuty,
        Self::TempStart,
        Self::TempMax,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ControlMode => "control_mode",
            Self::AutoPwmEnabled => "auto_pwm_enabled",
            Self::ManualFreq => "manual_freq",
            Self::ManualDuty => "manual_duty",
            Self::TempStart => "temp_start",
            Self::TempMax => "temp_max",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    /// Key name in the device's flash namespace. NVS caps keys at 15 bytes
    /// and older firmware wrote the mode and auto flag under other names.
    pub fn nvs_name(self) -> &'static str {
        match self {
            Self::ControlMode => "manual_mode",
            Self::AutoPwmEnabled => "auto_pwm",
            other => other.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    U8(u8),
    U32(u32),
    F32(f32),
}

impl SettingValue {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(value),
            Self::U8(value) => Some(value != 0),
            Self::U32(value) => Some(value != 0),
            Self::F32(_) => None,
        }
    }

    pub fn as_u8(self) -> Option<u8> {
        match self {
            Self::U8(value) => Some(value),
            Self::U32(value) => u8::try_from(value).ok(),
            Self::Bool(value) => Some(u8::from(value)),
            Self::F32(_) => None,
        }
    }

    pub fn as_u32(self) -> Option<u32> {
        match self {
            Self::U8(value) => Some(u32::from(value)),
            Self::U32(value) => Some(value),
            Self::Bool(_) | Self::F32(_) => None,
        }
    }

    pub fn as_f32(self) -> Option<f32> {
        match self {
            Self::F32(value) => Some(value),
            Self::U8(value) => Some(f32::from(value)),
            Self::U32(value) => Some(value as f32),
            Self::Bool(_) => None,
        }
    }

    pub fn mode(mode: ControlMode) -> Self {
        Self::U8(match mode {
            ControlMode::Auto => 0,
            ControlMode::Manual => 1,
        })
    }

    pub fn as_mode(self) -> Option<ControlMode> {
        match self.as_u8()? {
            0 => Some(ControlMode::Auto),
            1 => Some(ControlMode::Manual),
            _ => None,
        }
    }
}

/// Durable key/value storage for the controller's tunables.
pub trait ConfigStore {
    fn get(&self, key: SettingKey) -> Result<Option<SettingValue>, StoreError>;

    /// Writes every entry or none of them.
    fn set_many(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), StoreError>;

    fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), StoreError> {
        self.set_many(&[(key, value)])
    }
}

/// Value as laid out in the device's NVS namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvsValue {
    U8(u8),
    U32(u32),
    I32(i32),
}

pub fn encode_nvs(key: SettingKey, value: SettingValue) -> Result<NvsValue, StoreError> {
    let mismatch = StoreError::TypeMismatch { key: key.as_str() };
    match key {
        SettingKey::ControlMode | SettingKey::ManualDuty => {
            value.as_u8().map(NvsValue::U8).ok_or(mismatch)
        }
        SettingKey::AutoPwmEnabled => value
            .as_bool()
            .map(|enabled| NvsValue::U8(u8::from(enabled)))
            .ok_or(mismatch),
        SettingKey::ManualFreq => value.as_u32().map(NvsValue::U32).ok_or(mismatch),
        SettingKey::TempStart | SettingKey::TempMax => value
            .as_f32()
            .filter(|temp| temp.is_finite())
            .map(|temp| NvsValue::I32((quantize_temp(temp) * 100.0).round() as i32))
            .ok_or(mismatch),
    }
}

pub fn decode_nvs(key: SettingKey, raw: NvsValue) -> Result<SettingValue, StoreError> {
    match (key, raw) {
        (SettingKey::ControlMode | SettingKey::ManualDuty, NvsValue::U8(value)) => {
            Ok(SettingValue::U8(value))
        }
        (SettingKey::AutoPwmEnabled, NvsValue::U8(value)) => Ok(SettingValue::Bool(value != 0)),
        (SettingKey::ManualFreq, NvsValue::U32(value)) => Ok(SettingValue::U32(value)),
        (SettingKey::TempStart | SettingKey::TempMax, NvsValue::I32(hundredths)) => {
            Ok(SettingValue::F32(hundredths as f32 / 100.0))
        }
        _ => Err(StoreError::TypeMismatch { key: key.as_str() }),
    }
}

impl PersistedSettings {
    /// Reads every key, keeping the default for anything missing or unreadable,
    /// then sanitizes the result.
    pub fn load<S: ConfigStore + ?Sized>(store: &S) -> Self {
        let defaults = Self::default();
        let mut settings = defaults.clone();

        settings.mode = read_key(store, SettingKey::ControlMode, SettingValue::as_mode)
            .unwrap_or(defaults.mode);
        settings.auto_pwm_enabled =
            read_key(store, SettingKey::AutoPwmEnabled, SettingValue::as_bool)
                .unwrap_or(defaults.auto_pwm_enabled);
        settings.manual_freq_hz = read_key(store, SettingKey::ManualFreq, SettingValue::as_u32)
            .unwrap_or(defaults.manual_freq_hz);
        settings.manual_duty_percent =
            read_key(store, SettingKey::ManualDuty, SettingValue::as_u8)
                .unwrap_or(defaults.manual_duty_percent);
        settings.temp_start_c = read_key(store, SettingKey::TempStart, SettingValue::as_f32)
            .unwrap_or(defaults.temp_start_c);
        settings.temp_max_c = read_key(store, SettingKey::TempMax, SettingValue::as_f32)
            .unwrap_or(defaults.temp_max_c);

        settings.sanitize();
        settings
    }

    pub fn to_entries(&self) -> [(SettingKey, SettingValue); 6] {
        [
            (SettingKey::ControlMode, SettingValue::mode(self.mode)),
            (
                SettingKey::AutoPwmEnabled,
                SettingValue::Bool(self.auto_pwm_enabled),
            ),
            (SettingKey::ManualFreq, SettingValue::U32(self.manual_freq_hz)),
            (
                SettingKey::ManualDuty,
                SettingValue::U8(self.manual_duty_percent),
            ),
            (SettingKey::TempStart, SettingValue::F32(self.temp_start_c)),
            (SettingKey::TempMax, SettingValue::F32(self.temp_max_c)),
        ]
    }
}

fn read_key<S, T>(store: &S, key: SettingKey, convert: fn(SettingValue) -> Option<T>) -> Option<T>
where
    S: ConfigStore + ?Sized,
{
    match store.get(key) {
        Ok(Some(value)) => {
            let converted = convert(value);
            if converted.is_none() {
                log::warn!("ignoring stored {} with unexpected value {:?}", key.as_str(), value);
            }
            converted
        }
        Ok(None) => None,
        Err(err) => {
            log::warn!("failed to read {}: {}", key.as_str(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        values: HashMap<SettingKey, SettingValue>,
        broken: Option<SettingKey>,
    }

    impl ConfigStore for MapStore {
        fn get(&self, key: SettingKey) -> Result<Option<SettingValue>, StoreError> {
            if self.broken == Some(key) {
                return Err(StoreError::Unavailable("bad sector".to_string()));
            }
            Ok(self.values.get(&key).copied())
        }

        fn set_many(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), StoreError> {
            self.values.extend(entries.iter().copied());
            Ok(())
        }
    }

    #[test]
    fn key_names() {
        let names: Vec<_> = SettingKey::ALL.iter().map(|key| key.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "control_mode",
                "auto_pwm_enabled",
                "manual_freq",
                "manual_duty",
                "temp_start",
                "temp_max"
            ]
        );
        assert_eq!(SettingKey::from_name("temp_max"), Some(SettingKey::TempMax));
        assert_eq!(SettingKey::from_name("target_temp"), None);
        assert!(SettingKey::ALL.iter().all(|key| key.nvs_name().len() <= 15));
    }

    #[test]
    fn empty_store_loads_defaults() {
        let store = MapStore::default();
        assert_eq!(PersistedSettings::load(&store), PersistedSettings::default());
    }

    #[test]
    fn load_round_trips_entries() {
        let mut store = MapStore::default();
        let settings = PersistedSettings {
            mode: ControlMode::Manual,
            auto_pwm_enabled: false,
            manual_freq_hz: 25_000,
            manual_duty_percent: 40,
            temp_start_c: 35.5,
            temp_max_c: 65.0,
        };
        store.set_many(&settings.to_entries()).expect("write");

        assert_eq!(PersistedSettings::load(&store), settings);
    }

    #[test]
    fn unreadable_and_mistyped_keys_fall_back_individually() {
        let mut store = MapStore {
            broken: Some(SettingKey::ManualFreq),
            ..MapStore::default()
        };
        store
            .set_many(&[
                (SettingKey::ControlMode, SettingValue::U8(7)),
                (SettingKey::ManualDuty, SettingValue::U8(60)),
                (SettingKey::TempStart, SettingValue::Bool(true)),
            ])
            .expect("write");

        let loaded = PersistedSettings::load(&store);
        assert_eq!(loaded.mode, ControlMode::Auto);
        assert_eq!(loaded.manual_freq_hz, 1_000);
        assert_eq!(loaded.manual_duty_percent, 60);
        assert_eq!(loaded.temp_start_c, 30.0);
    }

    #[test]
    fn json_values_keep_their_shape() {
        let json = serde_json::to_string(&vec![
            SettingValue::Bool(true),
            SettingValue::U8(1),
            SettingValue::U32(25_000),
            SettingValue::F32(30.5),
        ])
        .expect("serialize");
        assert_eq!(json, "[true,1,25000,30.5]");

        let parsed: Vec<SettingValue> = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed[2].as_u32(), Some(25_000));
        assert_eq!(parsed[3].as_f32(), Some(30.5));
    }

    #[test]
    fn nvs_encoding_uses_legacy_layout() {
        assert_eq!(
            encode_nvs(SettingKey::TempStart, SettingValue::F32(30.25)),
            Ok(NvsValue::I32(3_025))
        );
        assert_eq!(
            encode_nvs(SettingKey::AutoPwmEnabled, SettingValue::Bool(true)),
            Ok(NvsValue::U8(1))
        );
        assert_eq!(
            encode_nvs(SettingKey::ControlMode, SettingValue::mode(ControlMode::Manual)),
            Ok(NvsValue::U8(1))
        );
        assert_eq!(
            encode_nvs(SettingKey::ManualFreq, SettingValue::F32(1.5)),
            Err(StoreError::TypeMismatch { key: "manual_freq" })
        );

        assert_eq!(
            decode_nvs(SettingKey::TempMax, NvsValue::I32(8_000)),
            Ok(SettingValue::F32(80.0))
        );
        assert_eq!(
            decode_nvs(SettingKey::AutoPwmEnabled, NvsValue::U8(0)),
            Ok(SettingValue::Bool(false))
        );
        assert!(decode_nvs(SettingKey::ManualFreq, NvsValue::U8(3)).is_err());
    }
}
