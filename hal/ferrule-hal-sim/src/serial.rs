//! Serial port with injectable receive data and captured transmit

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use ferrule_hal::driver::SetConfig;
use ferrule_hal::uart::UartConfig;

use crate::Unsupported;

#[derive(Default)]
struct SerialState {
    config: Option<UartConfig>,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    fault: Option<ErrorKind>,
}

/// UART whose receive side is fed by the test and whose transmit side is
/// captured for inspection
#[derive(Clone, Default)]
pub struct SimSerial {
    state: Arc<Mutex<SerialState>>,
}

impl SimSerial {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SerialState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes arriving on the wire
    pub fn inject_rx(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes.iter().copied());
    }

    /// Everything transmitted since the last call
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().tx)
    }

    /// Make every subsequent operation fail with `kind`; `None` heals it
    pub fn set_fault(&self, kind: Option<ErrorKind>) {
        self.state().fault = kind;
    }

    /// Line settings last accepted by [`SetConfig::set_config`]
    pub fn config(&self) -> Option<UartConfig> {
        self.state().config
    }
}

impl SetConfig<UartConfig> for SimSerial {
    type ConfigError = Unsupported;

    fn set_config(&mut self, config: &UartConfig) -> Result<(), Self::ConfigError> {
        if config.baudrate == 0 {
            return Err(Unsupported);
        }
        self.state().config = Some(*config);
        Ok(())
    }
}

impl ErrorType for SimSerial {
    type Error = ErrorKind;
}

impl Read for SimSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.state();
        if let Some(kind) = state.fault {
            return Err(kind);
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl ReadReady for SimSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let state = self.state();
        match state.fault {
            Some(kind) => Err(kind),
            None => Ok(!state.rx.is_empty()),
        }
    }
}

impl Write for SimSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.state();
        if let Some(kind) = state.fault {
            return Err(kind);
        }
        state.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        match self.state().fault {
            Some(kind) => Err(kind),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rx_drains_in_order() {
        let mut port = SimSerial::new();
        port.inject_rx(b"hello");
        assert!(port.read_ready().unwrap());

        let mut buf = [0u8; 3];
        assert_eq!(port.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert!(!port.read_ready().unwrap());
    }

    #[test]
    fn test_fault_applies_to_both_directions() {
        let mut port = SimSerial::new();
        port.set_fault(Some(ErrorKind::TimedOut));
        assert_eq!(port.write(b"x"), Err(ErrorKind::TimedOut));
        assert_eq!(port.read_ready(), Err(ErrorKind::TimedOut));

        port.set_fault(None);
        port.write_all(b"ok").unwrap();
        assert_eq!(port.take_tx(), b"ok");
    }
}
