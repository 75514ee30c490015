//! Reference board wired to simulated silicon

#![allow(dead_code)]

use std::collections::VecDeque;

use ferrule_hal::{EventFlag, TxSource};
use ferrule_hal_ref::{Board, BoardConfig, BoardDrivers, BoardPeripherals, BoardShared};
use ferrule_hal_sim::{
    SimCounter, SimFlash, SimGpio, SimHardware, SimI2c, SimRtc, SimSerial, SimSleep, SimSpi,
};

pub struct SimDrivers;

impl BoardDrivers for SimDrivers {
    type Gpio = SimGpio;
    type GpioIn = SimGpio;
    type Counter = SimCounter;
    type Rtc = SimRtc;
    type Sleep = SimSleep;
    type Serial = SimSerial;
    type Spi = SimSpi;
    type I2c = SimI2c;
    type Flash = SimFlash;
}

pub fn shared(hw: &SimHardware) -> BoardShared<SimDrivers> {
    shared_with(hw, &BoardConfig::reference())
}

pub fn shared_with(hw: &SimHardware, config: &BoardConfig) -> BoardShared<SimDrivers> {
    BoardShared::new(config, hw.gpio.clone(), hw.counter.clone(), hw.rtc.clone())
        .expect("reference pin table is valid")
}

pub fn board<'a>(shared: &'a BoardShared<SimDrivers>, hw: &SimHardware) -> Board<'a, SimDrivers> {
    board_with(shared, hw, &BoardConfig::reference())
}

pub fn board_with<'a>(
    shared: &'a BoardShared<SimDrivers>,
    hw: &SimHardware,
    config: &BoardConfig,
) -> Board<'a, SimDrivers> {
    use ferrule_hal::PeripheralCapability;

    let peripherals = BoardPeripherals {
        gpio: hw.gpio.clone(),
        sleep: hw.sleep.clone(),
        serial: hw.serial.iter().cloned().collect(),
        spi: std::iter::once(hw.spi.clone()).collect(),
        i2c: std::iter::once(hw.i2c.clone()).collect(),
        flash: hw.flash.clone(),
    };
    let mut board = Board::new(shared, config, peripherals).expect("board comes up");
    board.init();
    board
}

/// Interpreter transmit buffer stand-in
#[derive(Default)]
pub struct Outbox {
    queued: VecDeque<(EventFlag, u8)>,
}

impl Outbox {
    pub fn queue(&mut self, device: EventFlag, bytes: &[u8]) {
        self.queued.extend(bytes.iter().map(|&b| (device, b)));
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }
}

impl TxSource for Outbox {
    fn next_char(&mut self, device: EventFlag) -> Option<u8> {
        let pos = self.queued.iter().position(|(d, _)| *d == device)?;
        self.queued.remove(pos).map(|(_, b)| b)
    }
}
