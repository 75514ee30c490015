//! I2C bus populated with register-file slave devices

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use ferrule_hal::driver::SetConfig;
use ferrule_hal::i2c::I2cConfig;

use crate::Unsupported;

/// One operation of a recorded transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOp {
    Write(Vec<u8>),
    Read(usize),
}

/// Operations issued between one start and its stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTransaction {
    pub address: u8,
    pub ops: Vec<SimOp>,
}

/// 256 registers behind an auto-incrementing pointer
///
/// The first byte of a write sets the pointer; the rest are stored from
/// there on. Reads return registers from the pointer on.
struct RegisterDevice {
    regs: [u8; 256],
    pointer: u8,
}

impl RegisterDevice {
    fn write(&mut self, bytes: &[u8]) {
        let Some((&pointer, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = pointer;
        for &byte in data {
            self.regs[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        for slot in buf {
            *slot = self.regs[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

#[derive(Default)]
struct I2cState {
    config: Option<I2cConfig>,
    devices: BTreeMap<u8, RegisterDevice>,
    log: Vec<SimTransaction>,
}

#[derive(Clone, Default)]
pub struct SimI2c {
    state: Arc<Mutex<I2cState>>,
}

impl SimI2c {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, I2cState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a zeroed register device at `address`
    pub fn add_device(&self, address: u8) {
        self.state().devices.insert(
            address,
            RegisterDevice {
                regs: [0; 256],
                pointer: 0,
            },
        );
    }

    pub fn set_register(&self, address: u8, reg: u8, value: u8) {
        if let Some(device) = self.state().devices.get_mut(&address) {
            device.regs[reg as usize] = value;
        }
    }

    pub fn register(&self, address: u8, reg: u8) -> Option<u8> {
        self.state()
            .devices
            .get(&address)
            .map(|device| device.regs[reg as usize])
    }

    /// Transactions completed since the last call
    pub fn take_log(&self) -> Vec<SimTransaction> {
        std::mem::take(&mut self.state().log)
    }

    /// Bus settings last accepted by [`SetConfig::set_config`]
    pub fn config(&self) -> Option<I2cConfig> {
        self.state().config
    }
}

/// Fast-mode plus is the fastest the simulated controller runs
impl SetConfig<I2cConfig> for SimI2c {
    type ConfigError = Unsupported;

    fn set_config(&mut self, config: &I2cConfig) -> Result<(), Self::ConfigError> {
        if config.frequency == 0 || config.frequency > I2cConfig::FAST_PLUS.frequency {
            return Err(Unsupported);
        }
        self.state().config = Some(*config);
        Ok(())
    }
}

impl ErrorType for SimI2c {
    type Error = ErrorKind;
}

impl I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        let I2cState { devices, log, .. } = &mut *state;
        let device = devices
            .get_mut(&address)
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;

        let mut record = SimTransaction {
            address,
            ops: Vec::with_capacity(operations.len()),
        };
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    device.write(bytes);
                    record.ops.push(SimOp::Write(bytes.to_vec()));
                }
                Operation::Read(buf) => {
                    device.read(buf);
                    record.ops.push(SimOp::Read(buf.len()));
                }
            }
        }
        log.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_pointer() {
        let mut bus = SimI2c::new();
        bus.add_device(0x48);
        bus.write(0x48, &[0x10, 0xAA, 0xBB]).unwrap();
        assert_eq!(bus.register(0x48, 0x11), Some(0xBB));

        let mut buf = [0u8; 2];
        bus.write_read(0x48, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);

        let log = bus.take_log();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1].ops,
            vec![SimOp::Write(vec![0x10]), SimOp::Read(2)]
        );
    }

    #[test]
    fn test_missing_device_nacks() {
        let mut bus = SimI2c::new();
        assert_eq!(
            bus.write(0x20, &[0]),
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
        assert!(bus.take_log().is_empty());
    }

    #[test]
    fn test_clock_ceiling() {
        let mut bus = SimI2c::new();
        bus.set_config(&I2cConfig::FAST_PLUS).unwrap();
        let too_fast = I2cConfig {
            frequency: 3_400_000,
            ..I2cConfig::FAST
        };
        assert_eq!(bus.set_config(&too_fast), Err(Unsupported));
        assert_eq!(bus.config(), Some(I2cConfig::FAST_PLUS));
    }
}
