//! Low-level register and interface definitions for TCS34725

use embedded_hal::i2c::I2c;

/// I2C address of the TCS34725
pub const I2C_ADDRESS: u8 = 0x29;

// Register addresses
pub(crate) const ENABLE: u8 = 0x00;
pub(crate) const ATIME: u8 = 0x01;
pub(crate) const WTIME: u8 = 0x03;
pub(crate) const AILTL: u8 = 0x04;
pub(crate) const AILTH: u8 = 0x05;
pub(crate) const AIHTL: u8 = 0x06;
pub(crate) const AIHTH: u8 = 0x07;
pub(crate) const PERS: u8 = 0x0C;
pub(crate) const CONFIG: u8 = 0x0D;
pub(crate) const CONTROL: u8 = 0x0F;
pub(crate) const ID: u8 = 0x12;
pub(crate) const STATUS: u8 = 0x13;
pub(crate) const CDATAL: u8 = 0x14;
pub(crate) const RDATAL: u8 = 0x16;
pub(crate) const GDATAL: u8 = 0x18;
pub(crate) const BDATAL: u8 = 0x1A;

// ENABLE register bits
pub(crate) const ENABLE_AIEN: u8 = 0b0001_0000;
pub(crate) const ENABLE_WEN: u8 = 0b0000_1000;
pub(crate) const ENABLE_AEN: u8 = 0b0000_0010;
pub(crate) const ENABLE_PON: u8 = 0b0000_0001;

// CONFIG register bits
pub(crate) const CONFIG_WLONG: u8 = 0b0000_0010;

// STATUS register bits
pub(crate) const STATUS_AINT: u8 = 0b0001_0000;
pub(crate) const STATUS_AVALID: u8 = 0b0000_0001;

/// Device IDs accepted during initialization
pub(crate) const ACCEPTED_IDS: [u8; 2] = [0x44, 0x10];

/// Command bit, set on every addressed transaction
pub const COMMAND_BIT: u8 = 0b1000_0000;

/// Command register transaction types (bits 6:5)
pub mod transaction {
    /// Repeated byte protocol
    pub const REPEATED_BYTE: u8 = 0b00;
    /// Auto-increment protocol
    pub const AUTO_INCREMENT: u8 = 0b01;
    /// Special function
    pub const SPECIAL_FUNCTION: u8 = 0b11;
}

/// Special function code for clearing the RGBC interrupt
pub const SF_INT_CLEAR: u8 = 0b0_0110;

/// Format a command byte from a transaction type and a register address or
/// special function code.
pub const fn command(transaction: u8, address: u8) -> u8 {
    COMMAND_BIT | ((transaction << 5) & 0b0110_0000) | (address & 0b0001_1111)
}

/// Register-oriented bus capability used by the driver.
///
/// Implementors move bytes to and from the device; the driver never retries
/// a failed transfer and never holds the bus between calls.
pub trait RegisterBus {
    /// Transport error reported by the bus
    type Error;

    /// Read `data.len()` bytes starting at `register`
    fn read_block(&mut self, address: u8, register: u8, data: &mut [u8])
        -> Result<(), Self::Error>;

    /// Write `data` starting at `register`
    fn write_block(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Write a single control byte with no register payload
    fn write_byte(&mut self, address: u8, byte: u8) -> Result<(), Self::Error>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    type Error = T::Error;

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        T::read_block(self, address, register, data)
    }

    fn write_block(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Self::Error> {
        T::write_block(self, address, register, data)
    }

    fn write_byte(&mut self, address: u8, byte: u8) -> Result<(), Self::Error> {
        T::write_byte(self, address, byte)
    }
}

/// Bus interface error types
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum BusError<I2cError> {
    /// I2C communication error
    I2c(I2cError),
    /// Write payload does not fit in a single transfer
    PayloadTooLong,
}

/// Largest register payload written in one transfer
const MAX_WRITE_PAYLOAD: usize = 4;

/// [`RegisterBus`] implementation over an `embedded-hal` I2C bus
#[derive(Debug)]
pub struct I2cBus<I2C> {
    /// The I2C interface
    pub i2c: I2C,
}

impl<I2C> I2cBus<I2C> {
    /// Wrap an I2C bus
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Release the underlying I2C bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2cTrait: I2c> RegisterBus for I2cBus<I2cTrait> {
    type Error = BusError<I2cTrait::Error>;

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.i2c
            .write_read(
                address,
                &[command(transaction::AUTO_INCREMENT, register)],
                data,
            )
            .map_err(BusError::I2c)
    }

    fn write_block(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Self::Error> {
        let len = data.len();
        if len > MAX_WRITE_PAYLOAD {
            return Err(BusError::PayloadTooLong);
        }
        let mut buf = [0u8; MAX_WRITE_PAYLOAD + 1];
        buf[0] = command(transaction::AUTO_INCREMENT, register);
        buf[1..1 + len].copy_from_slice(data);
        self.i2c
            .write(address, &buf[..1 + len])
            .map_err(BusError::I2c)
    }

    fn write_byte(&mut self, address: u8, byte: u8) -> Result<(), Self::Error> {
        self.i2c.write(address, &[byte]).map_err(BusError::I2c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    extern crate std;
    use std::vec;

    #[test]
    fn test_command_format() {
        assert_eq!(command(transaction::SPECIAL_FUNCTION, SF_INT_CLEAR), 0xE6);
        assert_eq!(command(transaction::AUTO_INCREMENT, CDATAL), 0xB4);
        assert_eq!(command(transaction::REPEATED_BYTE, ID), 0x92);
        // Address bits beyond 4:0 are masked off
        assert_eq!(command(transaction::REPEATED_BYTE, 0xFF), 0x9F);
    }

    #[test]
    fn test_read_block_prefixes_command() {
        let expectations = [I2cTransaction::write_read(
            I2C_ADDRESS,
            vec![0xB4],
            vec![0x34, 0x12],
        )];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        let mut data = [0u8; 2];
        bus.read_block(I2C_ADDRESS, CDATAL, &mut data).unwrap();
        assert_eq!(u16::from_le_bytes(data), 0x1234);

        bus.release().done();
    }

    #[test]
    fn test_write_block_and_byte() {
        let expectations = [
            I2cTransaction::write(I2C_ADDRESS, vec![0xA1, 0xC0]),
            I2cTransaction::write(I2C_ADDRESS, vec![0xE6]),
        ];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        bus.write_block(I2C_ADDRESS, ATIME, &[0xC0]).unwrap();
        bus.write_byte(I2C_ADDRESS, 0xE6).unwrap();

        bus.release().done();
    }

    #[test]
    fn test_write_block_rejects_oversized_payload() {
        let mut bus = I2cBus::new(I2cMock::new(&[]));

        let result = bus.write_block(I2C_ADDRESS, AILTL, &[0; 5]);
        assert_eq!(result, Err(BusError::PayloadTooLong));

        bus.release().done();
    }
}
