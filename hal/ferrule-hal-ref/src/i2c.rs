//! I2C ports over embedded-hal
//!
//! embedded-hal expresses a repeated start as one `write_read`
//! transaction, while the interpreter issues a write without stop and
//! then a separate read. A write with `send_stop == false` is therefore
//! held in the port. The next call decides how it goes out:
//!
//! - a read from the same address becomes `write_read`
//! - a further write to the same address is appended
//! - anything else flushes the held write as a plain write first

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use heapless::Vec;

use ferrule_hal::driver::SetConfig;
use ferrule_hal::i2c::{I2cConfig, MAX_7BIT_ADDRESS};
use ferrule_hal::{EventFlag, HalError, HalResult};

/// Longest write that can be held for a repeated start
pub const I2C_HELD_WRITE_MAX: usize = 32;

struct HeldWrite {
    address: u8,
    data: Vec<u8, I2C_HELD_WRITE_MAX>,
}

pub struct I2cPort<B> {
    bus: B,
    flag: EventFlag,
    config: Option<I2cConfig>,
    held: Option<HeldWrite>,
}

impl<B: I2c + SetConfig<I2cConfig>> I2cPort<B> {
    pub fn new(flag: EventFlag, bus: B) -> Self {
        Self {
            bus,
            flag,
            config: None,
            held: None,
        }
    }

    /// Program the bus clock; a rejected configuration leaves the port
    /// unset and drops any held write
    pub fn setup(&mut self, config: &I2cConfig) -> HalResult<()> {
        debug!(
            "{:?}: setup at {} Hz, stretch {}",
            self.flag, config.frequency, config.clock_stretch
        );
        self.config = None;
        self.held = None;
        self.bus.set_config(config).map_err(|_| {
            warn!("{:?}: driver rejected {:?}", self.flag, config);
            HalError::Rejected(self.flag)
        })?;
        self.config = Some(*config);
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.config.is_some()
    }

    pub fn reset(&mut self) {
        self.config = None;
        self.held = None;
    }

    /// Bus is claimed by a write awaiting its repeated start
    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    fn check(&self, address: u8) -> HalResult<()> {
        if self.config.is_none() {
            return Err(HalError::NotInitialised(self.flag));
        }
        if address > MAX_7BIT_ADDRESS {
            return Err(HalError::InvalidAddress(address));
        }
        Ok(())
    }

    pub fn write(&mut self, address: u8, data: &[u8], send_stop: bool) -> HalResult<()> {
        self.check(address)?;

        if self.held.as_ref().is_some_and(|h| h.address != address) {
            self.flush_held()?;
        }

        match self.held.as_mut() {
            Some(held) => {
                if held.data.extend_from_slice(data).is_err() {
                    self.held = None;
                    return Err(HalError::BufferTooLong(self.flag));
                }
            }
            None if send_stop => {
                return self
                    .bus
                    .write(address, data)
                    .map_err(|e| bus_error(self.flag, e.kind()));
            }
            None => {
                let data = Vec::from_slice(data).map_err(|_| HalError::BufferTooLong(self.flag))?;
                self.held = Some(HeldWrite { address, data });
            }
        }

        if send_stop {
            self.flush_held()?;
        }
        Ok(())
    }

    /// Read, completing any held write to the same address with a
    /// repeated start
    ///
    /// A read always ends the transaction; `send_stop == false` on a read
    /// is accepted and treated as a stop.
    pub fn read(&mut self, address: u8, buf: &mut [u8], _send_stop: bool) -> HalResult<()> {
        self.check(address)?;
        let flag = self.flag;
        let result = match self.held.take() {
            Some(held) if held.address == address => {
                self.bus.write_read(address, &held.data, buf)
            }
            Some(held) => {
                self.bus
                    .write(held.address, &held.data)
                    .map_err(|e| bus_error(flag, e.kind()))?;
                self.bus.read(address, buf)
            }
            None => self.bus.read(address, buf),
        };
        result.map_err(|e| bus_error(flag, e.kind()))
    }

    fn flush_held(&mut self) -> HalResult<()> {
        match self.held.take() {
            Some(held) => self
                .bus
                .write(held.address, &held.data)
                .map_err(|e| bus_error(self.flag, e.kind())),
            None => Ok(()),
        }
    }
}

fn bus_error(flag: EventFlag, kind: ErrorKind) -> HalError {
    match kind {
        ErrorKind::NoAcknowledge(_) => debug!("{:?}: no acknowledge", flag),
        _ => warn!("{:?}: i2c fault", flag),
    }
    HalError::Bus(flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_hal_sim::i2c::{SimOp, SimTransaction};
    use ferrule_hal_sim::SimI2c;

    const DEV: u8 = 0x48;

    fn ready() -> (I2cPort<SimI2c>, SimI2c) {
        let wire = SimI2c::new();
        wire.add_device(DEV);
        let mut port = I2cPort::new(EventFlag::I2C1, wire.clone());
        port.setup(&I2cConfig::default()).unwrap();
        (port, wire)
    }

    #[test]
    fn test_checks() {
        let mut port = I2cPort::new(EventFlag::I2C1, SimI2c::new());
        assert_eq!(
            port.write(DEV, &[0], true),
            Err(HalError::NotInitialised(EventFlag::I2C1))
        );
        port.setup(&I2cConfig::FAST).unwrap();
        assert_eq!(
            port.write(0x80, &[0], true),
            Err(HalError::InvalidAddress(0x80))
        );
    }

    #[test]
    fn test_plain_write_and_read() {
        let (mut port, wire) = ready();
        port.write(DEV, &[0x05, 0x42], true).unwrap();
        assert_eq!(wire.register(DEV, 0x05), Some(0x42));
        assert!(!port.is_holding());

        port.write(DEV, &[0x05], true).unwrap();
        let mut buf = [0u8; 1];
        port.read(DEV, &mut buf, true).unwrap();
        assert_eq!(buf, [0x42]);
    }

    #[test]
    fn test_repeated_start_read() {
        let (mut port, wire) = ready();
        wire.set_register(DEV, 0x10, 0xBE);
        wire.set_register(DEV, 0x11, 0xEF);

        port.write(DEV, &[0x10], false).unwrap();
        assert!(port.is_holding());
        let mut buf = [0u8; 2];
        port.read(DEV, &mut buf, true).unwrap();
        assert_eq!(buf, [0xBE, 0xEF]);

        // One transaction: write then read, no stop in between
        assert_eq!(
            wire.take_log(),
            vec![SimTransaction {
                address: DEV,
                ops: vec![SimOp::Write(vec![0x10]), SimOp::Read(2)],
            }]
        );
    }

    #[test]
    fn test_held_writes_append() {
        let (mut port, wire) = ready();
        port.write(DEV, &[0x20], false).unwrap();
        port.write(DEV, &[0x01, 0x02], true).unwrap();
        assert_eq!(wire.register(DEV, 0x21), Some(0x02));
        assert_eq!(wire.take_log().len(), 1);
    }

    #[test]
    fn test_other_address_flushes() {
        let (mut port, wire) = ready();
        wire.add_device(0x50);
        port.write(DEV, &[0x30, 0x07], false).unwrap();
        port.write(0x50, &[0x00, 0x01], true).unwrap();
        assert_eq!(wire.register(DEV, 0x30), Some(0x07));
        assert_eq!(wire.register(0x50, 0x00), Some(0x01));
        assert_eq!(wire.take_log().len(), 2);
    }

    #[test]
    fn test_held_overflow() {
        let (mut port, _wire) = ready();
        port.write(DEV, &[0u8; 30], false).unwrap();
        assert_eq!(
            port.write(DEV, &[0u8; 4], false),
            Err(HalError::BufferTooLong(EventFlag::I2C1))
        );
        assert!(!port.is_holding());
    }

    #[test]
    fn test_nack_is_bus_error() {
        let (mut port, _wire) = ready();
        let mut buf = [0u8; 1];
        assert_eq!(
            port.read(0x33, &mut buf, true),
            Err(HalError::Bus(EventFlag::I2C1))
        );
    }

    #[test]
    fn test_setup_programs_clock() {
        let (mut port, wire) = ready();
        assert_eq!(wire.config(), Some(I2cConfig::STANDARD));

        let no_stretch = I2cConfig {
            clock_stretch: false,
            ..I2cConfig::FAST_PLUS
        };
        port.setup(&no_stretch).unwrap();
        assert_eq!(wire.config(), Some(no_stretch));

        port.write(DEV, &[0x01], false).unwrap();
        let high_speed = I2cConfig {
            frequency: 3_400_000,
            ..I2cConfig::FAST
        };
        assert_eq!(
            port.setup(&high_speed),
            Err(HalError::Rejected(EventFlag::I2C1))
        );
        assert!(!port.is_initialised());
        assert!(!port.is_holding());
        assert_eq!(wire.config(), Some(no_stretch));
    }
}
