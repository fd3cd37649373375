use log::{debug, info, warn};

use crate::command::FanCommand;
use crate::config::{ControllerConfig, PersistedSettings};
use crate::error::{ControlError, PwmError};
use crate::mapping::{raw_to_percent, ManualPwmSettings, TemperatureMapping};
use crate::ports::{PwmActuator, TemperatureSource};
use crate::settings::{ConfigStore, SettingKey, SettingValue};
use crate::types::{
    ControlMode, FanStatePayload, FanTelemetry, ManualView, MappingView, SensorReading,
};

/// What a control tick did with the fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Updated { from: u8, to: u8 },
    Unchanged(u8),
    ManualMode,
    AutoPaused,
    SensorUnavailable,
    ActuatorFault,
}

impl TickOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Owns the control mode, thresholds and the actuator. Every mutation goes
/// through the store first; memory is only touched once the write succeeded.
pub struct FanController<S, P> {
    config: ControllerConfig,
    store: S,
    pwm: P,

    mode: ControlMode,
    auto_enabled: bool,
    mapping: TemperatureMapping,
    manual: ManualPwmSettings,

    current_duty: u8,
    applied_frequency_hz: Option<u32>,
    last_reading: Option<SensorReading>,
    sensor_usable: Option<bool>,
}

impl<S: ConfigStore, P: PwmActuator> FanController<S, P> {
    /// Restores settings from `store` and drives the actuator to the state of
    /// the restored mode. Hardware failures here are logged, not fatal.
    pub fn start(config: ControllerConfig, store: S, pwm: P) -> Self {
        let settings = PersistedSettings::load(&store);
        info!(
            "restored settings: mode={} auto={} manual={}Hz/{}% mapping={:.1}..{:.1}C",
            settings.mode.as_str(),
            settings.auto_pwm_enabled,
            settings.manual_freq_hz,
            settings.manual_duty_percent,
            settings.temp_start_c,
            settings.temp_max_c
        );

        let mut controller = Self {
            config,
            store,
            pwm,
            mode: settings.mode,
            auto_enabled: settings.auto_pwm_enabled,
            mapping: settings.mapping(),
            manual: settings.manual(),
            current_duty: 0,
            applied_frequency_hz: None,
            last_reading: None,
            sensor_usable: None,
        };

        let (hz, duty) = match controller.mode {
            ControlMode::Manual => (controller.manual.frequency_hz(), controller.manual.duty_raw()),
            ControlMode::Auto => (controller.config.auto_pwm_frequency_hz, 0),
        };
        if let Err(err) = controller
            .reconfigure(hz)
            .and_then(|()| controller.write_duty(duty, true))
        {
            warn!("PWM output not initialised: {}", err);
        }

        controller
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled
    }

    pub fn mapping(&self) -> TemperatureMapping {
        self.mapping
    }

    pub fn manual(&self) -> ManualPwmSettings {
        self.manual
    }

    pub fn current_duty(&self) -> u8 {
        self.current_duty
    }

    pub fn applied_frequency_hz(&self) -> Option<u32> {
        self.applied_frequency_hz
    }

    pub fn last_reading(&self) -> Option<SensorReading> {
        self.last_reading
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    pub fn pwm_mut(&mut self) -> &mut P {
        &mut self.pwm
    }

    pub fn settings(&self) -> PersistedSettings {
        PersistedSettings {
            mode: self.mode,
            auto_pwm_enabled: self.auto_enabled,
            manual_freq_hz: self.manual.frequency_hz(),
            manual_duty_percent: self.manual.duty_percent(),
            temp_start_c: self.mapping.start_temp_c(),
            temp_max_c: self.mapping.max_temp_c(),
        }
    }

    pub fn poll<T: TemperatureSource + ?Sized>(&mut self, source: &mut T) -> TickOutcome {
        let reading = source.read();
        self.tick(reading)
    }

    /// One control step. Never fails: bad input and actuator faults are
    /// logged and the previous duty is held.
    pub fn tick(&mut self, reading: SensorReading) -> TickOutcome {
        self.observe(reading);

        if self.mode == ControlMode::Manual {
            return TickOutcome::ManualMode;
        }
        if !self.auto_enabled {
            return TickOutcome::AutoPaused;
        }
        if self.applied_frequency_hz.is_none() {
            let hz = self.config.auto_pwm_frequency_hz;
            if self.reconfigure(hz).is_err() {
                return TickOutcome::ActuatorFault;
            }
            info!("PWM frequency restored to {} Hz", hz);
        }
        if !reading.is_usable() {
            return TickOutcome::SensorUnavailable;
        }

        let from = self.current_duty;
        let to = self.mapping.duty_for(reading.temperature_c);
        if to == from {
            return TickOutcome::Unchanged(to);
        }

        match self.write_duty(to, false) {
            Ok(()) => {
                debug!("{:.2}C -> duty {} (was {})", reading.temperature_c, to, from);
                TickOutcome::Updated { from, to }
            }
            Err(_) => TickOutcome::ActuatorFault,
        }
    }

    pub fn apply(&mut self, command: FanCommand) -> Result<(), ControlError> {
        match command {
            FanCommand::SetMode(mode) => self.set_control_mode(mode),
            FanCommand::SetManual {
                frequency_hz,
                duty_percent,
            } => self.set_manual_settings(frequency_hz, duty_percent),
            FanCommand::SetMapping {
                start_temp_c,
                max_temp_c,
            } => self.set_temperature_mapping(start_temp_c, max_temp_c),
            FanCommand::SetAutoEnabled(enabled) => self.set_auto_pwm_enabled(enabled),
        }
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), ControlError> {
        match mode {
            ControlMode::Auto => {
                self.persist(&[
                    (SettingKey::ControlMode, SettingValue::mode(ControlMode::Auto)),
                    (SettingKey::AutoPwmEnabled, SettingValue::Bool(true)),
                ])?;
                self.mode = ControlMode::Auto;
                self.auto_enabled = true;
                info!("control mode AUTO");
                self.enter_auto()?;
            }
            ControlMode::Manual => {
                self.persist(&[(SettingKey::ControlMode, SettingValue::mode(ControlMode::Manual))])?;
                self.mode = ControlMode::Manual;
                info!(
                    "control mode MANUAL ({} Hz, {}%)",
                    self.manual.frequency_hz(),
                    self.manual.duty_percent()
                );
                self.apply_manual_output()?;
            }
        }
        Ok(())
    }

    /// Stores new manual settings. They only reach the actuator while in
    /// MANUAL mode; in AUTO they wait for the next switch.
    pub fn set_manual_settings(
        &mut self,
        frequency_hz: u32,
        duty_percent: u8,
    ) -> Result<(), ControlError> {
        let manual = ManualPwmSettings::new(frequency_hz, duty_percent).map_err(|err| {
            warn!("rejected manual settings: {}", err);
            err
        })?;

        self.persist(&[
            (SettingKey::ManualFreq, SettingValue::U32(manual.frequency_hz())),
            (SettingKey::ManualDuty, SettingValue::U8(manual.duty_percent())),
        ])?;
        self.manual = manual;
        info!("manual settings {} Hz, {}%", frequency_hz, duty_percent);

        if self.mode == ControlMode::Manual {
            self.apply_manual_output()?;
        }
        Ok(())
    }

    pub fn set_temperature_mapping(
        &mut self,
        start_temp_c: f32,
        max_temp_c: f32,
    ) -> Result<(), ControlError> {
        let mapping = TemperatureMapping::new(start_temp_c, max_temp_c).map_err(|err| {
            warn!("rejected temperature mapping: {}", err);
            err
        })?;

        self.persist(&[
            (SettingKey::TempStart, SettingValue::F32(mapping.start_temp_c())),
            (SettingKey::TempMax, SettingValue::F32(mapping.max_temp_c())),
        ])?;
        self.mapping = mapping;
        info!("temperature mapping {:.1}..{:.1}C", start_temp_c, max_temp_c);

        self.recompute_auto()?;
        Ok(())
    }

    pub fn set_auto_pwm_enabled(&mut self, enabled: bool) -> Result<(), ControlError> {
        self.persist(&[(SettingKey::AutoPwmEnabled, SettingValue::Bool(enabled))])?;
        self.auto_enabled = enabled;
        info!("auto PWM {}", if enabled { "enabled" } else { "paused" });

        if enabled {
            self.recompute_auto()?;
        }
        Ok(())
    }

    pub fn telemetry(&self) -> FanTelemetry {
        let reading = self.last_reading.unwrap_or_else(SensorReading::not_initialized);
        let temperature_c = reading.is_usable().then_some(reading.temperature_c);

        FanTelemetry {
            mode: self.mode.as_str(),
            auto_enabled: self.auto_enabled,
            current_duty: self.current_duty,
            current_duty_percent: raw_to_percent(self.current_duty),
            frequency_hz: self.applied_frequency_hz.unwrap_or(0),
            temperature_c,
            temperature_f: temperature_c.map(|_| reading.temperature_f()),
            sensor_ready: reading.ready,
            sensor_error_code: reading.error_code,
            sensor_status: reading.status().as_str(),
            mapping: MappingView {
                start_temp_c: self.mapping.start_temp_c(),
                max_temp_c: self.mapping.max_temp_c(),
            },
            manual: ManualView {
                frequency: self.manual.frequency_hz(),
                duty: self.manual.duty_percent(),
            },
        }
    }

    pub fn state_payload(&self) -> FanStatePayload {
        let temp = self
            .last_reading
            .filter(SensorReading::is_usable)
            .map(|reading| reading.temperature_c);

        FanStatePayload {
            temp,
            fan_speed: raw_to_percent(self.current_duty),
            duty: self.current_duty,
            mode: self.mode.as_str(),
            auto_enabled: self.auto_enabled,
            sensor_ready: temp.is_some(),
        }
    }

    fn observe(&mut self, reading: SensorReading) {
        let usable = reading.is_usable();
        if self.sensor_usable != Some(usable) {
            if usable {
                info!("sensor ready at {:.2}C", reading.temperature_c);
            } else {
                warn!(
                    "sensor unavailable ({}), holding duty {}",
                    reading.status().as_str(),
                    self.current_duty
                );
            }
            self.sensor_usable = Some(usable);
        }
        self.last_reading = Some(reading);
    }

    fn persist(&mut self, entries: &[(SettingKey, SettingValue)]) -> Result<(), ControlError> {
        self.store.set_many(entries).map_err(|err| {
            warn!("settings not saved: {}", err);
            ControlError::Persistence(err)
        })
    }

    fn auto_target(&self) -> Option<u8> {
        self.last_reading
            .filter(SensorReading::is_usable)
            .map(|reading| self.mapping.duty_for(reading.temperature_c))
    }

    fn recompute_auto(&mut self) -> Result<(), PwmError> {
        if self.mode != ControlMode::Auto || !self.auto_enabled {
            return Ok(());
        }
        match self.auto_target() {
            Some(duty) => self.write_duty(duty, false),
            None => {
                debug!("no usable reading yet, holding duty {}", self.current_duty);
                Ok(())
            }
        }
    }

    fn enter_auto(&mut self) -> Result<(), PwmError> {
        let auto_hz = self.config.auto_pwm_frequency_hz;
        if self.applied_frequency_hz == Some(auto_hz) {
            return self.recompute_auto();
        }

        self.reconfigure(auto_hz)?;
        let duty = self.auto_target().unwrap_or(self.current_duty);
        self.write_duty(duty, true)
    }

    fn apply_manual_output(&mut self) -> Result<(), PwmError> {
        self.reconfigure(self.manual.frequency_hz())?;
        self.write_duty(self.manual.duty_raw(), true)
    }

    fn reconfigure(&mut self, hz: u32) -> Result<(), PwmError> {
        match self.pwm.reconfigure_frequency(hz) {
            Ok(()) => {
                self.applied_frequency_hz = Some(hz);
                Ok(())
            }
            Err(err) => {
                self.applied_frequency_hz = None;
                warn!("{}", err);
                Err(err)
            }
        }
    }

    fn write_duty(&mut self, duty: u8, force: bool) -> Result<(), PwmError> {
        if !force && duty == self.current_duty {
            return Ok(());
        }
        match self.pwm.set_duty(duty) {
            Ok(()) => {
                self.current_duty = duty;
                Ok(())
            }
            Err(err) => {
                warn!("{}, holding duty {}", err, self.current_duty);
                Err(err)
            }
        }
    }
}
