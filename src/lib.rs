//! # TCS34725 RGB and Clear Light Sensor Driver
//!
//! This is a platform-agnostic Rust driver for the TCS34725 color light-to-digital converter,
//! built using the [`embedded-hal`] traits for I2C communication and blocking delays.
//!
//! The TCS34725 provides:
//! - Clear, Red, Green and Blue channels with 16-bit counts
//! - Programmable gain (1x, 4x, 16x, 60x)
//! - Programmable integration time (2.4ms to 700ms)
//! - Clear channel interrupt with low/high thresholds and persistence filter
//! - I2C interface (address 0x29)
//!
//! ## Features
//!
//! - **Power sequencing** with integration-time aware settle delays
//! - **One-shot sampling** that leaves the device powered down afterwards
//! - **Normalized RGB**, **lux estimate** and two **color temperature** estimators
//! - **Interrupt support** with clear-channel thresholds
//! - **Bus agnostic**: any [`RegisterBus`] implementation, with [`I2cBus`] for `embedded-hal`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tcs34725::{Gain, IntegrationTime, Settings, Tcs34725};
//!
//! # fn main() {
//! # let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! # let delay = embedded_hal_mock::eh1::delay::NoopDelay::new();
//! let mut sensor = Tcs34725::new(i2c, delay).with_settings(Settings {
//!     gain: Gain::Gain4x,
//!     integration_time: IntegrationTime::Ms154,
//! });
//!
//! // Check the device ID, write settings and power up
//! sensor.init().unwrap();
//!
//! // Wake, sample and sleep again
//! let raw = sensor.get_raw_data_one_shot().unwrap();
//!
//! let rgb = tcs34725::normalize(&raw);
//! let lux = tcs34725::lux_estimate(&raw);
//! let cct = tcs34725::color_temperature_dn40(&raw, sensor.settings().integration_time);
//! # let _ = (rgb, lux, cct);
//! # }
//! ```
//!
//! ## Logging
//!
//! Enable the `defmt-03` feature to derive `defmt::Format` on the public types and emit
//! `defmt` debug/trace messages from the driver.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![no_std]
#![deny(missing_docs)]

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt-03")]
            defmt::debug!($s $(, $x)*);
            #[cfg(not(feature = "defmt-03"))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt-03")]
            defmt::trace!($s $(, $x)*);
            #[cfg(not(feature = "defmt-03"))]
            let _ = ($( & $x ),*);
        }
    };
}

pub mod color;
pub mod ll;

pub use color::{
    color_temperature_dn40, color_temperature_mccamy, lux_estimate, normalize, InvalidSample,
};
pub use ll::{BusError, I2cBus, RegisterBus, I2C_ADDRESS};

use ll::{
    ACCEPTED_IDS, AIHTH, AIHTL, AILTH, AILTL, ATIME, BDATAL, CDATAL, CONFIG, CONFIG_WLONG,
    CONTROL, ENABLE, ENABLE_AEN, ENABLE_AIEN, ENABLE_PON, ENABLE_WEN, GDATAL, ID, PERS, RDATAL,
    SF_INT_CLEAR, STATUS, STATUS_AINT, STATUS_AVALID, WTIME,
};

/// Oscillator start-up time after asserting PON
const POWER_ON_DELAY_MS: u32 = 3;

/// RGBC gain settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Gain {
    /// 1x gain
    Gain1x = 0x00,
    /// 4x gain
    Gain4x = 0x01,
    /// 16x gain
    Gain16x = 0x02,
    /// 60x gain
    Gain60x = 0x03,
}

impl TryFrom<u8> for Gain {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Gain::Gain1x),
            0x01 => Ok(Gain::Gain4x),
            0x02 => Ok(Gain::Gain16x),
            0x03 => Ok(Gain::Gain60x),
            other => Err(other),
        }
    }
}

/// RGBC integration time settings
///
/// The register holds `256 - cycles`, each cycle lasting 2.4ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum IntegrationTime {
    /// 2.4ms, 1 cycle, max count 1024
    Ms2_4 = 0xFF,
    /// 24ms, 10 cycles, max count 10240
    Ms24 = 0xF6,
    /// 50ms, 21 cycles, max count 21504
    Ms50 = 0xEB,
    /// 101ms, 43 cycles, max count 44032
    Ms101 = 0xD5,
    /// 154ms, 64 cycles, max count 65535
    Ms154 = 0xC0,
    /// 700ms, 256 cycles, max count 65535
    Ms700 = 0x00,
}

impl IntegrationTime {
    /// Value written to the ATIME register
    pub const fn register_value(self) -> u8 {
        self as u8
    }

    /// Number of 2.4ms integration cycles
    pub const fn cycles(self) -> u32 {
        256 - self as u32
    }

    /// Time to wait after starting an integration before the channels hold valid data
    pub const fn settle_delay_ms(self) -> u32 {
        match self {
            IntegrationTime::Ms2_4 => 3,
            IntegrationTime::Ms24 => 24,
            IntegrationTime::Ms50 => 50,
            IntegrationTime::Ms101 => 101,
            IntegrationTime::Ms154 => 154,
            IntegrationTime::Ms700 => 700,
        }
    }

    /// Largest count a channel can report at this integration time
    pub const fn max_count(self) -> u16 {
        let count = 1024 * self.cycles();
        if count > u16::MAX as u32 {
            u16::MAX
        } else {
            count as u16
        }
    }
}

impl TryFrom<u8> for IntegrationTime {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xFF => Ok(IntegrationTime::Ms2_4),
            0xF6 => Ok(IntegrationTime::Ms24),
            0xEB => Ok(IntegrationTime::Ms50),
            0xD5 => Ok(IntegrationTime::Ms101),
            0xC0 => Ok(IntegrationTime::Ms154),
            0x00 => Ok(IntegrationTime::Ms700),
            other => Err(other),
        }
    }
}

/// Interrupt persistence: how many consecutive out-of-range clear readings
/// raise the interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Persistence {
    /// Every RGBC cycle generates an interrupt
    Every = 0b0000,
    /// 1 clear channel value outside threshold range
    Cycles1 = 0b0001,
    /// 2 consecutive values outside threshold range
    Cycles2 = 0b0010,
    /// 3 consecutive values outside threshold range
    Cycles3 = 0b0011,
    /// 5 consecutive values outside threshold range
    Cycles5 = 0b0100,
    /// 10 consecutive values outside threshold range
    Cycles10 = 0b0101,
    /// 15 consecutive values outside threshold range
    Cycles15 = 0b0110,
    /// 20 consecutive values outside threshold range
    Cycles20 = 0b0111,
    /// 25 consecutive values outside threshold range
    Cycles25 = 0b1000,
    /// 30 consecutive values outside threshold range
    Cycles30 = 0b1001,
    /// 35 consecutive values outside threshold range
    Cycles35 = 0b1010,
    /// 40 consecutive values outside threshold range
    Cycles40 = 0b1011,
    /// 45 consecutive values outside threshold range
    Cycles45 = 0b1100,
    /// 50 consecutive values outside threshold range
    Cycles50 = 0b1101,
    /// 55 consecutive values outside threshold range
    Cycles55 = 0b1110,
    /// 60 consecutive values outside threshold range
    Cycles60 = 0b1111,
}

/// Measurement settings tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Settings {
    /// Analog gain
    pub gain: Gain,
    /// ADC integration time
    pub integration_time: IntegrationTime,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gain: Gain::Gain1x,
            integration_time: IntegrationTime::Ms2_4,
        }
    }
}

/// Raw channel counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct RawColor {
    /// Clear channel count
    pub clear: u16,
    /// Red channel count
    pub red: u16,
    /// Green channel count
    pub green: u16,
    /// Blue channel count
    pub blue: u16,
}

/// RGB scaled against the clear channel, nominally 0-255
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct NormalizedColor {
    /// Red component
    pub red: f32,
    /// Green component
    pub green: f32,
    /// Blue component
    pub blue: f32,
}

/// Device status information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Status {
    /// True if the clear channel interrupt is asserted
    pub interrupt: bool,
    /// True if an integration cycle has completed
    pub valid: bool,
}

/// All possible errors in this crate
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<E> {
    /// A bus read failed
    Read(E),
    /// A bus write failed
    Write(E),
    /// The ID register did not hold a supported device ID
    DeviceNotFound {
        /// ID read from the device
        found: u8,
    },
}

/// High-level TCS34725 driver
///
/// Owns the bus, the delay provider and the current [`Settings`]. Every
/// operation blocks until its bus transfers and settle delays complete.
pub struct Tcs34725<B, D> {
    bus: B,
    delay: D,
    address: u8,
    settings: Settings,
}

impl<I2C, D> Tcs34725<I2cBus<I2C>, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver on an I2C bus at the default address with default settings
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_bus(I2cBus::new(i2c), delay, I2C_ADDRESS, Settings::default())
    }
}

impl<B, D> Tcs34725<B, D>
where
    B: RegisterBus,
    D: DelayNs,
{
    /// Create a driver on any register bus
    pub fn with_bus(bus: B, delay: D, address: u8, settings: Settings) -> Self {
        Self {
            bus,
            delay,
            address,
            settings,
        }
    }

    /// Replace the settings applied by the next [`init`](Self::init).
    ///
    /// Does not touch the device.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Settings from the last successful gain and integration time writes
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Bus address of the device
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Verify the device ID, write the configured settings and power up.
    ///
    /// A failure after the ID check can leave the device partially
    /// configured; run `init` again before relying on it.
    pub fn init(&mut self) -> Result<(), Error<B::Error>> {
        let id = self.device_id()?;
        if !ACCEPTED_IDS.contains(&id) {
            debug!("tcs34725: unexpected device id {=u8:#x}", id);
            return Err(Error::DeviceNotFound { found: id });
        }

        let settings = self.settings;
        self.set_integration_time(settings.integration_time)?;
        self.set_gain(settings.gain)?;

        // The device boots powered down
        self.enable()?;
        debug!("tcs34725: initialized, id {=u8:#x}, {}", id, settings);
        Ok(())
    }

    /// Power up the oscillator and start the RGBC ADC.
    ///
    /// Asserting AEN triggers an integration cycle, so this blocks for the
    /// settle delay of the current integration time before returning.
    pub fn enable(&mut self) -> Result<(), Error<B::Error>> {
        self.write_register(ENABLE, ENABLE_PON)?;
        self.delay.delay_ms(POWER_ON_DELAY_MS);
        self.write_register(ENABLE, ENABLE_PON | ENABLE_AEN)?;
        self.settle();
        debug!("tcs34725: enabled");
        Ok(())
    }

    /// Put the device to sleep, leaving the other enable bits untouched
    pub fn disable(&mut self) -> Result<(), Error<B::Error>> {
        let enable = self.read_register(ENABLE)?;
        self.write_register(ENABLE, enable & !(ENABLE_PON | ENABLE_AEN))?;
        debug!("tcs34725: disabled");
        Ok(())
    }

    /// Set the integration time.
    ///
    /// On success the driver's settings are updated, so later settle delays
    /// follow the new value.
    pub fn set_integration_time(
        &mut self,
        integration_time: IntegrationTime,
    ) -> Result<(), Error<B::Error>> {
        self.write_register(ATIME, integration_time.register_value())?;
        self.settings.integration_time = integration_time;
        Ok(())
    }

    /// Set the analog gain, updating the driver's settings on success
    pub fn set_gain(&mut self, gain: Gain) -> Result<(), Error<B::Error>> {
        self.write_register(CONTROL, gain as u8)?;
        self.settings.gain = gain;
        Ok(())
    }

    /// Read the four channels, then wait out one integration period.
    ///
    /// Each channel is a separate transfer, so the channels may come from
    /// different integration cycles. All four reads are attempted even when
    /// one fails; the first failure is reported.
    pub fn get_raw_data(&mut self) -> Result<RawColor, Error<B::Error>> {
        let clear = self.read_u16(CDATAL);
        let red = self.read_u16(RDATAL);
        let green = self.read_u16(GDATAL);
        let blue = self.read_u16(BDATAL);

        self.settle();

        let raw = RawColor {
            clear: clear?,
            red: red?,
            green: green?,
            blue: blue?,
        };
        trace!("tcs34725: {}", raw);
        Ok(raw)
    }

    /// Wake the device, sample it and put it back to sleep.
    ///
    /// The disable step runs even if enabling or sampling failed. The first
    /// failure of the three steps is reported.
    pub fn get_raw_data_one_shot(&mut self) -> Result<RawColor, Error<B::Error>> {
        let enabled = self.enable();
        let sample = self.get_raw_data();
        let disabled = self.disable();

        enabled?;
        let raw = sample?;
        disabled?;
        Ok(raw)
    }

    /// Sample the channels and scale RGB against clear
    pub fn get_normalized_rgb(&mut self) -> Result<NormalizedColor, Error<B::Error>> {
        let raw = self.get_raw_data()?;
        Ok(normalize(&raw))
    }

    /// Enable or disable the clear channel interrupt
    pub fn set_interrupt(&mut self, enabled: bool) -> Result<(), Error<B::Error>> {
        let mut enable = self.read_register(ENABLE)?;
        if enabled {
            enable |= ENABLE_AIEN;
        } else {
            enable &= !ENABLE_AIEN;
        }
        self.write_register(ENABLE, enable)?;
        debug!("tcs34725: interrupt enabled: {}", enabled);
        Ok(())
    }

    /// Clear a pending clear channel interrupt
    pub fn clear_interrupt(&mut self) -> Result<(), Error<B::Error>> {
        let command = ll::command(ll::transaction::SPECIAL_FUNCTION, SF_INT_CLEAR);
        self.bus
            .write_byte(self.address, command)
            .map_err(Error::Write)
    }

    /// Set the clear channel interrupt thresholds
    pub fn set_int_limits(&mut self, low: u16, high: u16) -> Result<(), Error<B::Error>> {
        let [low_l, low_h] = low.to_le_bytes();
        let [high_l, high_h] = high.to_le_bytes();

        self.write_register(AILTL, low_l)?;
        self.write_register(AILTH, low_h)?;
        self.write_register(AIHTL, high_l)?;
        self.write_register(AIHTH, high_h)?;
        debug!("tcs34725: interrupt limits {=u16}..{=u16}", low, high);
        Ok(())
    }

    /// Set how many out-of-range cycles raise the interrupt
    pub fn set_persistence(&mut self, persistence: Persistence) -> Result<(), Error<B::Error>> {
        self.write_register(PERS, persistence as u8)
    }

    /// Set the wait time between integration cycles.
    ///
    /// Each step is 2.4ms, or 28.8ms with `long` set.
    pub fn set_wait_time(&mut self, wtime: u8, long: bool) -> Result<(), Error<B::Error>> {
        self.write_register(WTIME, wtime)?;
        self.write_register(CONFIG, if long { CONFIG_WLONG } else { 0 })
    }

    /// Enable or disable the wait timer between integration cycles
    pub fn set_wait_enabled(&mut self, enabled: bool) -> Result<(), Error<B::Error>> {
        let mut enable = self.read_register(ENABLE)?;
        if enabled {
            enable |= ENABLE_WEN;
        } else {
            enable &= !ENABLE_WEN;
        }
        self.write_register(ENABLE, enable)
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<Status, Error<B::Error>> {
        let status = self.read_register(STATUS)?;
        Ok(Status {
            interrupt: (status & STATUS_AINT) != 0,
            valid: (status & STATUS_AVALID) != 0,
        })
    }

    /// Check if an integration cycle has completed since the ADC was enabled
    pub fn is_data_valid(&mut self) -> Result<bool, Error<B::Error>> {
        Ok(self.read_status()?.valid)
    }

    /// Read the device ID register
    pub fn device_id(&mut self) -> Result<u8, Error<B::Error>> {
        self.read_register(ID)
    }

    /// Destroy the driver and return the bus and delay
    pub fn destroy(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn settle(&mut self) {
        self.delay
            .delay_ms(self.settings.integration_time.settle_delay_ms());
    }

    // Helper methods for register access
    fn read_register(&mut self, register: u8) -> Result<u8, Error<B::Error>> {
        let mut buffer = [0u8; 1];
        self.bus
            .read_block(self.address, register, &mut buffer)
            .map_err(Error::Read)?;
        Ok(buffer[0])
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, Error<B::Error>> {
        let mut buffer = [0u8; 2];
        self.bus
            .read_block(self.address, register, &mut buffer)
            .map_err(Error::Read)?;
        Ok(u16::from_le_bytes(buffer))
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<B::Error>> {
        self.bus
            .write_block(self.address, register, &[value])
            .map_err(Error::Write)
    }
}
