//! Simulated silicon for host testing
//!
//! Every driver here is a cheap handle around shared state, so a test can
//! keep one clone to inject stimulus (input levels, received bytes, clock
//! wraps) while the board under test owns another.

pub mod clock;
pub mod flash;
pub mod gpio;
pub mod i2c;
pub mod serial;
pub mod spi;

pub use clock::{SimCounter, SimRtc, SimSleep};
pub use flash::SimFlash;
pub use gpio::SimGpio;
pub use i2c::SimI2c;
pub use serial::SimSerial;
pub use spi::SimSpi;

/// A simulated bus refused a configuration it cannot realize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported;

/// One simulated part with every driver a board needs
///
/// Clone the handles out before giving them to a board; the clones stay
/// connected.
#[derive(Clone)]
pub struct SimHardware {
    pub gpio: SimGpio,
    pub counter: SimCounter,
    pub rtc: SimRtc,
    pub sleep: SimSleep,
    pub serial: [SimSerial; 2],
    pub spi: SimSpi,
    pub i2c: SimI2c,
    pub flash: SimFlash,
}

impl SimHardware {
    pub fn new() -> Self {
        let rtc = SimRtc::new(SimRtc::DEFAULT_CALIBRATION_Q12);
        Self {
            gpio: SimGpio::new(),
            sleep: SimSleep::new(rtc.clone()),
            counter: SimCounter::new(0),
            rtc,
            serial: [SimSerial::new(), SimSerial::new()],
            spi: SimSpi::new(),
            i2c: SimI2c::new(),
            flash: SimFlash::new(SimFlash::DEFAULT_CAPACITY),
        }
    }
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}
