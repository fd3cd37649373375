pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod fan;
pub mod homeassistant;
pub mod mapping;
pub mod ports;
pub mod settings;
pub mod topics;
pub mod types;

pub use command::{CommandKind, FanCommand};
pub use config::{ControllerConfig, NetworkConfig, PersistedSettings, RuntimeConfig};
pub use error::{ControlError, PwmError, StoreError, ValidationError};
pub use fan::{FanController, TickOutcome};
pub use homeassistant::OutboundMessage;
pub use mapping::{ManualPwmSettings, TemperatureMapping};
pub use ports::{PwmActuator, TemperatureSource};
pub use settings::{ConfigStore, SettingKey, SettingValue};
pub use topics::{InboundTopic, Topics};
pub use types::{ControlMode, FanStatePayload, FanTelemetry, SensorReading, SensorStatus};
