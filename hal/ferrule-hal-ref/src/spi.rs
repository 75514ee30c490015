//! Pipelined SPI ports over embedded-hal
//!
//! The interpreter streams words with [`SpiPort::send`], which hands back
//! the word received by the previous send. The port holds that word
//! between calls; `send(None)` flushes the bus and returns it.
//!
//! The bus itself moves bytes. A 16-bit word goes out as two bytes, high
//! byte first when the port is MSB-first and low byte first otherwise.

use embedded_hal::spi::SpiBus;

use ferrule_hal::driver::SetConfig;
use ferrule_hal::spi::{SpiConfig, WordSize};
use ferrule_hal::{EventFlag, HalError, HalResult};

pub struct SpiPort<B> {
    bus: B,
    flag: EventFlag,
    config: Option<SpiConfig>,
    pending_rx: Option<u16>,
    receive: bool,
}

impl<B: SpiBus<u8> + SetConfig<SpiConfig>> SpiPort<B> {
    pub fn new(flag: EventFlag, bus: B) -> Self {
        Self {
            bus,
            flag,
            config: None,
            pending_rx: None,
            receive: true,
        }
    }

    /// Program the bus; a rejected configuration leaves the port unset
    pub fn setup(&mut self, config: &SpiConfig) -> HalResult<()> {
        debug!(
            "{:?}: setup at {} Hz, {:?}, {:?}",
            self.flag, config.frequency, config.mode, config.word_size
        );
        self.config = None;
        self.pending_rx = None;
        self.receive = true;
        self.apply(config)?;
        self.config = Some(*config);
        Ok(())
    }

    fn apply(&mut self, config: &SpiConfig) -> HalResult<()> {
        self.bus.set_config(config).map_err(|_| {
            warn!("{:?}: driver rejected {:?}", self.flag, config);
            HalError::Rejected(self.flag)
        })
    }

    pub fn is_initialised(&self) -> bool {
        self.config.is_some()
    }

    pub fn reset(&mut self) {
        self.config = None;
        self.pending_rx = None;
        self.receive = true;
    }

    fn config(&self) -> HalResult<&SpiConfig> {
        self.config.as_ref().ok_or(HalError::NotInitialised(self.flag))
    }

    /// Send one word and return the word received by the previous send
    ///
    /// In 8-bit mode only the low byte of `data` is clocked. `None` sends
    /// nothing, waits for the bus and returns the pending word.
    pub fn send(&mut self, data: Option<u16>) -> HalResult<Option<u16>> {
        let config = *self.config()?;
        let Some(data) = data else {
            self.wait()?;
            return Ok(self.pending_rx.take());
        };

        let received = match config.word_size {
            WordSize::Eight => {
                let mut word = [data as u8];
                self.bus
                    .transfer_in_place(&mut word)
                    .map_err(|e| bus_error(self.flag, e))?;
                u16::from(word[0])
            }
            WordSize::Sixteen => {
                let mut word = word_bytes(data, config.msb_first);
                self.bus
                    .transfer_in_place(&mut word)
                    .map_err(|e| bus_error(self.flag, e))?;
                if config.msb_first {
                    u16::from_be_bytes(word)
                } else {
                    u16::from_le_bytes(word)
                }
            }
        };

        let previous = self.pending_rx.take();
        if self.receive {
            self.pending_rx = Some(received);
        }
        Ok(previous)
    }

    /// Send one 16-bit word whatever the word size, discarding what comes back
    pub fn send16(&mut self, data: u16) -> HalResult<()> {
        let bytes = word_bytes(data, self.config()?.msb_first);
        self.bus.write(&bytes).map_err(|e| bus_error(self.flag, e))?;
        self.pending_rx = None;
        Ok(())
    }

    /// Switch between 8- and 16-bit words
    ///
    /// The driver is reprogrammed with the new word size; if it refuses,
    /// the port keeps its previous configuration.
    pub fn set16(&mut self, is16: bool) -> HalResult<()> {
        let mut config = *self.config()?;
        config.word_size = if is16 {
            WordSize::Sixteen
        } else {
            WordSize::Eight
        };
        self.apply(&config)?;
        self.config = Some(config);
        self.pending_rx = None;
        Ok(())
    }

    pub fn word_size(&self) -> Option<WordSize> {
        self.config.map(|c| c.word_size)
    }

    /// Full-duplex byte transfer; bytes beyond `rx` are clocked in and
    /// dropped
    pub fn send_buffer(&mut self, tx: &[u8], rx: &mut [u8]) -> HalResult<()> {
        self.config()?;
        self.pending_rx = None;
        let result = if self.receive {
            self.bus.transfer(rx, tx)
        } else {
            self.bus.write(tx)
        };
        result.map_err(|e| bus_error(self.flag, e))
    }

    pub fn wait(&mut self) -> HalResult<()> {
        self.config()?;
        self.bus.flush().map_err(|e| bus_error(self.flag, e))
    }

    pub fn set_receive(&mut self, receive: bool) -> HalResult<()> {
        self.config()?;
        self.receive = receive;
        if !receive {
            self.pending_rx = None;
        }
        Ok(())
    }
}

fn word_bytes(word: u16, msb_first: bool) -> [u8; 2] {
    if msb_first {
        word.to_be_bytes()
    } else {
        word.to_le_bytes()
    }
}

fn bus_error<E: embedded_hal::spi::Error>(flag: EventFlag, _error: E) -> HalError {
    warn!("{:?}: spi fault", flag);
    HalError::Bus(flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_hal::spi::Mode;
    use ferrule_hal_sim::SimSpi;

    fn ready() -> (SpiPort<SimSpi>, SimSpi) {
        let wire = SimSpi::new();
        let mut port = SpiPort::new(EventFlag::SPI1, wire.clone());
        port.setup(&SpiConfig::default()).unwrap();
        (port, wire)
    }

    #[test]
    fn test_requires_setup() {
        let mut port = SpiPort::new(EventFlag::SPI1, SimSpi::new());
        assert_eq!(
            port.send(Some(1)),
            Err(HalError::NotInitialised(EventFlag::SPI1))
        );
        assert_eq!(
            port.set16(true),
            Err(HalError::NotInitialised(EventFlag::SPI1))
        );
    }

    #[test]
    fn test_pipelined_send() {
        let (mut port, wire) = ready();
        wire.script_miso(&[0xA1, 0xA2]);

        assert_eq!(port.send(Some(0x01)).unwrap(), None);
        assert_eq!(port.send(Some(0x02)).unwrap(), Some(0xA1));
        assert_eq!(port.send(None).unwrap(), Some(0xA2));
        assert_eq!(port.send(None).unwrap(), None);
        assert_eq!(wire.take_mosi(), vec![0x01, 0x02]);
        assert_eq!(wire.flushes(), 2);
    }

    #[test]
    fn test_receive_disabled() {
        let (mut port, _wire) = ready();
        port.set_receive(false).unwrap();
        assert_eq!(port.send(Some(0x10)).unwrap(), None);
        assert_eq!(port.send(None).unwrap(), None);
    }

    #[test]
    fn test_send16_byte_order() {
        let (mut port, wire) = ready();
        port.set16(true).unwrap();
        assert_eq!(port.word_size(), Some(WordSize::Sixteen));
        port.send16(0x1234).unwrap();
        assert_eq!(wire.take_mosi(), vec![0x12, 0x34]);

        let mut lsb = SpiConfig::default();
        lsb.msb_first = false;
        port.setup(&lsb).unwrap();
        port.send16(0x1234).unwrap();
        assert_eq!(wire.take_mosi(), vec![0x34, 0x12]);
    }

    #[test]
    fn test_setup_programs_driver() {
        let wire = SimSpi::new();
        let mut port = SpiPort::new(EventFlag::SPI1, wire.clone());
        let config = SpiConfig {
            frequency: 8_000_000,
            mode: Mode::Mode3,
            msb_first: false,
            word_size: WordSize::Sixteen,
        };
        port.setup(&config).unwrap();
        assert_eq!(wire.config(), Some(config));

        let stopped = SpiConfig {
            frequency: 0,
            ..config
        };
        assert_eq!(
            port.setup(&stopped),
            Err(HalError::Rejected(EventFlag::SPI1))
        );
        assert!(!port.is_initialised());
        assert_eq!(wire.config(), Some(config));
    }

    #[test]
    fn test_sixteen_bit_words() {
        let (mut port, wire) = ready();
        port.set16(true).unwrap();
        assert_eq!(wire.config().map(|c| c.word_size), Some(WordSize::Sixteen));

        wire.script_miso(&[0x12, 0x34]);
        assert_eq!(port.send(Some(0xABCD)).unwrap(), None);
        assert_eq!(wire.take_mosi(), vec![0xAB, 0xCD]);
        assert_eq!(port.send(Some(0xAB)).unwrap(), Some(0x1234));
        assert_eq!(wire.take_mosi(), vec![0x00, 0xAB]);

        port.set16(false).unwrap();
        assert_eq!(wire.config().map(|c| c.word_size), Some(WordSize::Eight));
        assert_eq!(port.send(Some(0x01FF)).unwrap(), None);
        assert_eq!(wire.take_mosi(), vec![0xFF]);
        assert_eq!(port.send(None).unwrap(), Some(0xFF));
    }

    #[test]
    fn test_sixteen_bit_lsb_first() {
        let wire = SimSpi::new();
        let mut port = SpiPort::new(EventFlag::SPI1, wire.clone());
        port.setup(&SpiConfig {
            msb_first: false,
            word_size: WordSize::Sixteen,
            ..SpiConfig::default()
        })
        .unwrap();

        wire.script_miso(&[0x34, 0x12]);
        port.send(Some(0xABCD)).unwrap();
        assert_eq!(wire.take_mosi(), vec![0xCD, 0xAB]);
        assert_eq!(port.send(None).unwrap(), Some(0x1234));
    }

    #[test]
    fn test_send_buffer_short_rx() {
        let (mut port, wire) = ready();
        wire.script_miso(&[9, 8, 7]);
        let mut rx = [0u8; 2];
        port.send_buffer(&[1, 2, 3], &mut rx).unwrap();
        assert_eq!(rx, [9, 8]);
        assert_eq!(wire.take_mosi(), vec![1, 2, 3]);
    }
}
