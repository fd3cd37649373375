use esp_idf_hal::{
    gpio::OutputPin,
    ledc::{config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution},
    peripheral::Peripheral,
    units::FromValueType,
};
use log::info;

use fanctl_common::{PwmActuator, PwmError};

/// Fan PWM on LEDC timer 0 / channel 0 with 8-bit resolution, so the raw
/// duty maps straight onto the channel.
pub struct LedcFan {
    driver: LedcDriver<'static>,
    frequency_hz: u32,
}

impl LedcFan {
    pub fn new<C, T, P>(
        timer: impl Peripheral<P = T> + 'static,
        channel: impl Peripheral<P = C> + 'static,
        pin: impl Peripheral<P = P> + 'static,
        frequency_hz: u32,
    ) -> anyhow::Result<Self>
    where
        C: LedcChannel<SpeedMode = <T as LedcTimer>::SpeedMode>,
        T: LedcTimer + 'static,
        P: OutputPin,
    {
        let config = TimerConfig::new()
            .frequency(frequency_hz.Hz().into())
            .resolution(Resolution::Bits8);
        // The timer lives as long as the firmware; the channel only keeps its index.
        let timer: &'static LedcTimerDriver<'static, _> =
            Box::leak(Box::new(LedcTimerDriver::new(timer, &config)?));
        let mut driver = LedcDriver::new(channel, timer, pin)?;
        driver.set_duty(0)?;
        info!("fan PWM ready at {frequency_hz} Hz");

        Ok(Self {
            driver,
            frequency_hz,
        })
    }
}

impl PwmActuator for LedcFan {
    fn set_duty(&mut self, duty: u8) -> Result<(), PwmError> {
        self.driver
            .set_duty(u32::from(duty))
            .map_err(|err| PwmError::Duty {
                duty,
                reason: err.to_string(),
            })
    }

    fn reconfigure_frequency(&mut self, hz: u32) -> Result<(), PwmError> {
        if hz == self.frequency_hz {
            return Ok(());
        }

        let rc = unsafe {
            esp_idf_svc::sys::ledc_set_freq(
                esp_idf_svc::sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                esp_idf_svc::sys::ledc_timer_t_LEDC_TIMER_0,
                hz,
            )
        };
        if rc != esp_idf_svc::sys::ESP_OK {
            return Err(PwmError::Frequency {
                hz,
                reason: format!("ledc_set_freq returned {rc}"),
            });
        }

        info!("fan PWM {} Hz -> {} Hz", self.frequency_hz, hz);
        self.frequency_hz = hz;
        Ok(())
    }
}
