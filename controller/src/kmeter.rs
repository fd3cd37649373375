use std::time::{Duration, Instant};

use esp_idf_hal::{
    delay::BLOCK,
    gpio::{InputPin, OutputPin},
    i2c::{I2c, I2cConfig, I2cDriver},
    peripheral::Peripheral,
    units::FromValueType,
};
use log::{info, warn};

use fanctl_common::{SensorReading, TemperatureSource};

const KMETER_ADDR: u8 = 0x66;
const REG_TEMP_C: u8 = 0x00;
const REG_STATUS: u8 = 0x20;
const REG_FIRMWARE: u8 = 0xFE;
const I2C_BAUD_KHZ: u32 = 100;
const COMMUNICATION_ERROR: u8 = 2;

enum Backend {
    I2c(I2cDriver<'static>),
    Disabled,
}

/// KMeter-ISO thermocouple unit on I2C. Reads are cached and the bus is only
/// touched once per refresh interval.
pub struct KMeter {
    backend: Backend,
    refresh: Duration,
    last_poll: Option<Instant>,
    cached: SensorReading,
}

impl KMeter {
    pub fn new<I, SDA, SCL>(
        i2c: impl Peripheral<P = I> + 'static,
        sda: impl Peripheral<P = SDA> + 'static,
        scl: impl Peripheral<P = SCL> + 'static,
        refresh: Duration,
    ) -> anyhow::Result<Self>
    where
        I: I2c,
        SDA: InputPin + OutputPin,
        SCL: InputPin + OutputPin,
    {
        let config = I2cConfig::new().baudrate(I2C_BAUD_KHZ.kHz().into());
        let mut driver = I2cDriver::new(i2c, sda, scl, &config)?;

        let mut version = [0_u8; 1];
        driver.write_read(KMETER_ADDR, &[REG_FIRMWARE], &mut version, BLOCK)?;
        info!("KMeter-ISO found at 0x{KMETER_ADDR:02x}, firmware {}", version[0]);

        Ok(Self {
            backend: Backend::I2c(driver),
            refresh,
            last_poll: None,
            cached: SensorReading::not_initialized(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
            refresh: Duration::MAX,
            last_poll: None,
            cached: SensorReading::not_initialized(),
        }
    }

    fn poll(driver: &mut I2cDriver<'static>) -> SensorReading {
        let mut status = [0_u8; 1];
        if let Err(err) = driver.write_read(KMETER_ADDR, &[REG_STATUS], &mut status, BLOCK) {
            warn!("KMeter status read failed: {err}");
            return communication_error();
        }
        if status[0] != 0 {
            return SensorReading::from_kmeter(status[0], [0; 4]);
        }

        let mut raw = [0_u8; 4];
        if let Err(err) = driver.write_read(KMETER_ADDR, &[REG_TEMP_C], &mut raw, BLOCK) {
            warn!("KMeter temperature read failed: {err}");
            return communication_error();
        }
        SensorReading::from_kmeter(status[0], raw)
    }
}

fn communication_error() -> SensorReading {
    SensorReading::from_kmeter(COMMUNICATION_ERROR, [0; 4])
}

impl TemperatureSource for KMeter {
    fn read(&mut self) -> SensorReading {
        let Backend::I2c(driver) = &mut self.backend else {
            return self.cached;
        };

        let due = self
            .last_poll
            .map_or(true, |at| at.elapsed() >= self.refresh);
        if due {
            let reading = Self::poll(driver);
            if reading.status() != self.cached.status() {
                info!("KMeter status: {}", reading.status().as_str());
            }
            self.cached = reading;
            self.last_poll = Some(Instant::now());
        }
        self.cached
    }
}
