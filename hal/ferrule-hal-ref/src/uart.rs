//! Serial ports over embedded-io
//!
//! Receive is busy-polled from the idle loop: whatever the vendor driver
//! has buffered is pushed into the event queue as character events.
//! Transmit is drained on demand by [`UartPort::kick`].

use embedded_io::{Error as _, ErrorKind, Read, ReadReady, Write};

use ferrule_hal::driver::SetConfig;
use ferrule_hal::uart::UartConfig;
use ferrule_hal::{EventFlag, HalError, HalResult, SysTime, TxSource, IOEVENT_MAX_CHARS};

use crate::events::EventFlagRegistry;

/// Bytes read from the driver per poll
const RX_CHUNK: usize = IOEVENT_MAX_CHARS * 4;

/// Bytes gathered from the interpreter before each driver write
const TX_CHUNK: usize = 16;

pub struct UartPort<S> {
    serial: S,
    flag: EventFlag,
    config: Option<UartConfig>,
}

impl<S: Read + Write + ReadReady + SetConfig<UartConfig>> UartPort<S> {
    pub fn new(flag: EventFlag, serial: S) -> Self {
        Self {
            serial,
            flag,
            config: None,
        }
    }

    /// Program the line settings; a rejected configuration leaves the
    /// port unset
    pub fn setup(&mut self, config: &UartConfig) -> HalResult<()> {
        debug!(
            "{:?}: setup at {} baud, {:?} {:?} {:?}",
            self.flag, config.baudrate, config.data_bits, config.parity, config.stop_bits
        );
        self.config = None;
        self.serial.set_config(config).map_err(|_| {
            warn!("{:?}: driver rejected {:?}", self.flag, config);
            HalError::Rejected(self.flag)
        })?;
        self.config = Some(*config);
        Ok(())
    }

    pub fn config(&self) -> Option<&UartConfig> {
        self.config.as_ref()
    }

    pub fn is_initialised(&self) -> bool {
        self.config.is_some()
    }

    pub fn reset(&mut self) {
        self.config = None;
    }

    /// Drain the interpreter's transmit buffer; returns bytes written
    pub fn kick(&mut self, tx: &mut dyn TxSource) -> HalResult<usize> {
        if !self.is_initialised() {
            return Err(HalError::NotInitialised(self.flag));
        }

        let mut written = 0;
        let mut chunk = [0u8; TX_CHUNK];
        loop {
            let mut len = 0;
            while len < TX_CHUNK {
                match tx.next_char(self.flag) {
                    Some(byte) => {
                        chunk[len] = byte;
                        len += 1;
                    }
                    None => break,
                }
            }
            if len == 0 {
                break;
            }
            self.serial
                .write_all(&chunk[..len])
                .map_err(|e| io_error(self.flag, e.kind()))?;
            written += len;
            if len < TX_CHUNK {
                break;
            }
        }

        if written > 0 {
            self.serial
                .flush()
                .map_err(|e| io_error(self.flag, e.kind()))?;
        }
        Ok(written)
    }

    /// Move buffered receive data into the event queue; returns bytes read
    ///
    /// Ports that were never set up are skipped.
    pub fn poll(&mut self, events: &EventFlagRegistry, now: SysTime) -> HalResult<usize> {
        if !self.is_initialised() {
            return Ok(0);
        }

        let mut total = 0;
        let mut buf = [0u8; RX_CHUNK];
        while self
            .serial
            .read_ready()
            .map_err(|e| io_error(self.flag, e.kind()))?
        {
            let n = self
                .serial
                .read(&mut buf)
                .map_err(|e| io_error(self.flag, e.kind()))?;
            if n == 0 {
                break;
            }
            events.push_chars(self.flag, now, &buf[..n])?;
            total += n;
        }
        Ok(total)
    }
}

fn io_error(flag: EventFlag, kind: ErrorKind) -> HalError {
    match kind {
        ErrorKind::TimedOut => HalError::HardwareTimeout(flag),
        _ => {
            warn!("{:?}: serial fault", flag);
            HalError::Bus(flag)
        }
    }
}
