//! Hardware seams the controller drives. The settings store lives in
//! [`crate::settings`].

use crate::error::PwmError;
use crate::types::SensorReading;

/// Supplies the latest cached thermocouple reading. Must not block on the bus.
pub trait TemperatureSource {
    fn read(&mut self) -> SensorReading;
}

pub trait PwmActuator {
    /// Writes a raw 8-bit duty. Idempotent.
    fn set_duty(&mut self, duty: u8) -> Result<(), PwmError>;

    /// Rebuilds the PWM timer at a new frequency. Output may glitch and the
    /// duty afterwards is unspecified, so callers re-apply it.
    fn reconfigure_frequency(&mut self, hz: u32) -> Result<(), PwmError>;
}
