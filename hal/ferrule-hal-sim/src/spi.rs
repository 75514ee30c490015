//! SPI bus that echoes MOSI back on MISO unless a response is scripted

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::spi::{ErrorKind, ErrorType, SpiBus};
use ferrule_hal::driver::SetConfig;
use ferrule_hal::spi::SpiConfig;

use crate::Unsupported;

#[derive(Default)]
struct SpiState {
    config: Option<SpiConfig>,
    mosi: Vec<u8>,
    miso: VecDeque<u8>,
    flushes: usize,
}

impl SpiState {
    fn clock(&mut self, out: u8) -> u8 {
        self.mosi.push(out);
        self.miso.pop_front().unwrap_or(out)
    }
}

#[derive(Clone, Default)]
pub struct SimSpi {
    state: Arc<Mutex<SpiState>>,
}

impl SimSpi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SpiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes the slave returns for the next transfers, in order
    pub fn script_miso(&self, bytes: &[u8]) {
        self.state().miso.extend(bytes.iter().copied());
    }

    /// Everything clocked out since the last call
    pub fn take_mosi(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().mosi)
    }

    pub fn flushes(&self) -> usize {
        self.state().flushes
    }

    /// Configuration last accepted by [`SetConfig::set_config`]
    pub fn config(&self) -> Option<SpiConfig> {
        self.state().config
    }
}

impl SetConfig<SpiConfig> for SimSpi {
    type ConfigError = Unsupported;

    fn set_config(&mut self, config: &SpiConfig) -> Result<(), Self::ConfigError> {
        if config.frequency == 0 {
            return Err(Unsupported);
        }
        self.state().config = Some(*config);
        Ok(())
    }
}

impl ErrorType for SimSpi {
    type Error = ErrorKind;
}

impl SpiBus<u8> for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.state();
        for word in words {
            *word = state.clock(0x00);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.state();
        for &word in words {
            state.clock(word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.state();
        for i in 0..read.len().max(write.len()) {
            let received = state.clock(write.get(i).copied().unwrap_or(0x00));
            if let Some(slot) = read.get_mut(i) {
                *slot = received;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.state();
        for word in words {
            *word = state.clock(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.state().flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_and_script() {
        let mut bus = SimSpi::new();
        let mut buf = [0x11, 0x22];
        bus.transfer_in_place(&mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x22]);

        bus.script_miso(&[0xA5]);
        let mut rx = [0u8; 1];
        bus.transfer(&mut rx, &[0x33, 0x44]).unwrap();
        assert_eq!(rx, [0xA5]);
        assert_eq!(bus.take_mosi(), vec![0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_rejected_config_keeps_previous() {
        let mut bus = SimSpi::new();
        bus.set_config(&SpiConfig::default()).unwrap();

        let stopped = SpiConfig {
            frequency: 0,
            ..SpiConfig::default()
        };
        assert_eq!(bus.set_config(&stopped), Err(Unsupported));
        assert_eq!(bus.config(), Some(SpiConfig::default()));
    }
}
