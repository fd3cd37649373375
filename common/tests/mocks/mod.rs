//! Recording collaborators for driving `FanController` without hardware.

use fanctl_common::settings::{decode_nvs, encode_nvs, NvsValue};
use fanctl_common::{ConfigStore, PwmActuator, PwmError, SettingKey, SettingValue, StoreError};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmCall {
    SetDuty(u8),
    Reconfigure(u32),
}

#[derive(Default)]
pub struct MockPwm {
    pub calls: Vec<PwmCall>,
    pub fail_duty: bool,
    pub fail_reconfigure: bool,
}

#[allow(dead_code)]
impl MockPwm {
    pub fn duty_writes(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PwmCall::SetDuty(duty) => Some(*duty),
                PwmCall::Reconfigure(_) => None,
            })
            .collect()
    }

    pub fn reconfigures(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PwmCall::Reconfigure(hz) => Some(*hz),
                PwmCall::SetDuty(_) => None,
            })
            .collect()
    }
}

impl PwmActuator for MockPwm {
    fn set_duty(&mut self, duty: u8) -> Result<(), PwmError> {
        if self.fail_duty {
            return Err(PwmError::Duty {
                duty,
                reason: "channel stalled".to_string(),
            });
        }
        self.calls.push(PwmCall::SetDuty(duty));
        Ok(())
    }

    fn reconfigure_frequency(&mut self, hz: u32) -> Result<(), PwmError> {
        if self.fail_reconfigure {
            return Err(PwmError::Frequency {
                hz,
                reason: "timer busy".to_string(),
            });
        }
        self.calls.push(PwmCall::Reconfigure(hz));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockStore {
    pub values: HashMap<SettingKey, SettingValue>,
    pub writes: usize,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockStore {
    pub fn with(entries: &[(SettingKey, SettingValue)]) -> Self {
        Self {
            values: entries.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl ConfigStore for MockStore {
    fn get(&self, key: SettingKey) -> Result<Option<SettingValue>, StoreError> {
        Ok(self.values.get(&key).copied())
    }

    fn set_many(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("flash write failed".to_string()));
        }
        self.values.extend(entries.iter().copied());
        self.writes += 1;
        Ok(())
    }
}

/// Keeps values the way the device lays them out in NVS.
#[derive(Default, Clone)]
pub struct NvsLayoutStore {
    pub raw: HashMap<SettingKey, NvsValue>,
}

impl ConfigStore for NvsLayoutStore {
    fn get(&self, key: SettingKey) -> Result<Option<SettingValue>, StoreError> {
        self.raw
            .get(&key)
            .map(|&raw| decode_nvs(key, raw))
            .transpose()
    }

    fn set_many(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), StoreError> {
        let encoded = entries
            .iter()
            .map(|&(key, value)| encode_nvs(key, value).map(|raw| (key, raw)))
            .collect::<Result<Vec<_>, _>>()?;
        self.raw.extend(encoded);
        Ok(())
    }
}
