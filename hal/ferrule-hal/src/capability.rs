//! The board capability traits
//!
//! A board port implements [`PeripheralCapability`] once. The interpreter
//! owns that instance and calls it from its idle loop and built-ins.
//! Interrupt handlers only ever see the [`IrqCapability`] half, reached
//! through [`PeripheralCapability::irq`].

use heapless::Vec;

use crate::error::HalResult;
use crate::event::{EventFlag, IoEvent};
use crate::flash::{FlashPage, FlashRegion};
use crate::gpio::{LogicalPin, PinFunction, PinInfo, PinState};
use crate::i2c::I2cConfig;
use crate::spi::SpiConfig;
use crate::time::SysTime;
use crate::uart::{TxSource, UartConfig};

/// Maximum free regions a board reports for its flash window
pub const MAX_FREE_REGIONS: usize = 4;

/// The interpreter's single deferred-callback timer
///
/// At most one schedule is armed at a time. `start` and `disable` run in
/// normal context; `reschedule` is also called from the firing callback,
/// so implementations must keep the slot consistent under that reentry.
pub trait UtilTimerControl {
    /// Arm the timer to fire `period` microseconds from now
    fn util_timer_start(&self, period: SysTime);

    /// Cancel the armed schedule; idempotent
    fn util_timer_disable(&self);

    /// Replace the armed schedule
    ///
    /// Defined as disable followed by start; never a partial update.
    fn util_timer_reschedule(&self, period: SysTime) {
        self.util_timer_disable();
        self.util_timer_start(period);
    }
}

/// Operations callable from interrupt context
///
/// None of these may block, allocate or take a lock that an interrupt
/// handler could also hold.
pub trait IrqCapability: UtilTimerControl + Sync {
    /// Current logic level of a pin; `false` for unknown pins
    fn pin_get_value(&self, pin: LogicalPin) -> bool;

    /// Level latched when the watched pin's last edge occurred
    fn get_watched_pin_state(&self, flag: EventFlag) -> bool;

    /// Microseconds since the time base, rollover already absorbed
    fn get_system_time(&self) -> SysTime;

    /// Append an event to the interpreter's inbound queue
    ///
    /// A full queue drops the event, counts the drop and returns
    /// [`HalError::QueueFull`](crate::HalError::QueueFull).
    fn push_event(&self, event: IoEvent) -> HalResult<()>;
}

/// Everything the interpreter requires from a board
///
/// All methods here are normal-context only.
pub trait PeripheralCapability {
    type Irq: IrqCapability;

    /// Interrupt-safe half of the board
    fn irq(&self) -> &Self::Irq;

    // Lifecycle

    /// Bring the board to its power-on state
    fn init(&mut self);

    /// Return pins, devices, watches and the timer to power-on state,
    /// keeping system time
    fn reset(&mut self);

    /// Re-run post-reset setup after a soft reset
    fn soft_init(&mut self);

    /// One idle-loop step: poll input into the event queue and service
    /// anything that is due
    fn idle(&mut self) -> HalResult<()>;

    /// Board identity bytes; returns how many were written
    fn serial_number(&self, buf: &mut [u8]) -> usize;

    // Pins

    /// Resolve a logical pin through the board's table
    fn pin_info(&self, pin: LogicalPin) -> HalResult<PinInfo>;

    /// Switch a pin's driving mode; all-or-nothing
    fn pin_set_state(&mut self, pin: LogicalPin, state: PinState) -> HalResult<()>;

    /// Current mode; [`PinState::Undefined`] if never set
    fn pin_get_state(&self, pin: LogicalPin) -> PinState;

    fn pin_set_value(&mut self, pin: LogicalPin, value: bool) -> HalResult<()>;

    fn pin_get_value(&self, pin: LogicalPin) -> bool {
        self.irq().pin_get_value(pin)
    }

    /// Drive `polarity`, hold for `duration_ms`, then drive the opposite
    ///
    /// Blocking and best effort; the hold may stretch under interrupt load.
    fn pin_pulse(&mut self, pin: LogicalPin, polarity: bool, duration_ms: f64) -> HalResult<()>;

    /// Sample an analog input, 0.0..=1.0
    fn pin_analog(&mut self, pin: LogicalPin) -> HalResult<f32>;

    /// Drive an analog or PWM output; `freq_hz` of `None` uses the default
    fn pin_analog_output(
        &mut self,
        pin: LogicalPin,
        value: f32,
        freq_hz: Option<f32>,
    ) -> HalResult<PinFunction>;

    /// Peripheral function currently routed to the pin
    fn current_pin_function(&self, pin: LogicalPin) -> Option<PinFunction>;

    /// Pin supports edge-triggered event delivery
    fn can_watch(&self, pin: LogicalPin) -> bool;

    /// Attach (`enable`) or detach a pin from event delivery
    fn pin_watch(&mut self, pin: LogicalPin, enable: bool) -> HalResult<EventFlag>;

    /// Event originated from this pin's watch
    fn is_event_for_pin(&self, event: &IoEvent, pin: LogicalPin) -> bool;

    // Events

    /// Take the oldest pending inbound event
    fn pop_event(&mut self) -> Option<IoEvent>;

    /// Events dropped because the queue was full
    fn dropped_events(&self) -> u32;

    // Devices

    fn is_device_initialised(&self, device: EventFlag) -> bool;

    fn usart_setup(&mut self, device: EventFlag, config: &UartConfig) -> HalResult<()>;

    /// Drain the interpreter's transmit buffer for `device`; returns the
    /// number of bytes written
    fn usart_kick(&mut self, device: EventFlag, tx: &mut dyn TxSource) -> HalResult<usize>;

    /// USB CDC console attached; boards without USB return `false`
    fn is_usb_serial_connected(&self) -> bool {
        false
    }

    fn spi_setup(&mut self, device: EventFlag, config: &SpiConfig) -> HalResult<()>;

    /// Pipelined send; returns the word received by the previous transfer
    ///
    /// Words are 8 or 16 bits as selected by [`Self::spi_set16`]; in 8-bit
    /// mode only the low byte of `data` is sent. `None` sends nothing and
    /// completes the pending receive instead.
    fn spi_send(&mut self, device: EventFlag, data: Option<u16>) -> HalResult<Option<u16>>;

    fn spi_send16(&mut self, device: EventFlag, data: u16) -> HalResult<()>;

    /// Select 16-bit (`true`) or 8-bit words
    fn spi_set16(&mut self, device: EventFlag, is16: bool) -> HalResult<()>;

    /// Full-duplex transfer; `rx` may be shorter than `tx`
    fn spi_send_buffer(&mut self, device: EventFlag, tx: &[u8], rx: &mut [u8]) -> HalResult<()>;

    /// Block until the last transfer has left the wire
    fn spi_wait(&mut self, device: EventFlag) -> HalResult<()>;

    /// Keep (`true`) or discard received bytes
    fn spi_set_receive(&mut self, device: EventFlag, receive: bool) -> HalResult<()>;

    fn i2c_setup(&mut self, device: EventFlag, config: &I2cConfig) -> HalResult<()>;

    fn i2c_write(
        &mut self,
        device: EventFlag,
        address: u8,
        data: &[u8],
        send_stop: bool,
    ) -> HalResult<()>;

    fn i2c_read(
        &mut self,
        device: EventFlag,
        address: u8,
        buf: &mut [u8],
        send_stop: bool,
    ) -> HalResult<()>;

    // Time

    fn get_system_time(&self) -> SysTime {
        self.irq().get_system_time()
    }

    /// Splice in externally calibrated time; may jump either way once
    fn set_system_time(&mut self, time: SysTime);

    /// Busy-wait; rejects waits that would starve interrupt work
    fn delay_us(&mut self, us: u32) -> HalResult<()>;

    /// Light sleep until woken; returns whether the board slept
    fn sleep(&mut self, time_until_wake: SysTime) -> bool;

    fn util_timer_start(&mut self, period: SysTime) {
        self.irq().util_timer_start(period)
    }

    fn util_timer_disable(&mut self) {
        self.irq().util_timer_disable()
    }

    fn util_timer_reschedule(&mut self, period: SysTime) {
        self.irq().util_timer_reschedule(period)
    }

    // Flash

    /// Bytes of flash available to interpreter storage
    fn flash_max(&self) -> u32;

    /// Read from a 4-byte aligned address
    fn flash_read(&mut self, addr: u32, buf: &mut [u8]) -> HalResult<()>;

    /// Write to a 4-byte aligned address; length must be a multiple of 4
    fn flash_write(&mut self, addr: u32, data: &[u8]) -> HalResult<()>;

    /// Page containing `addr`
    fn flash_get_page(&self, addr: u32) -> HalResult<FlashPage>;

    /// Erase the whole page containing `addr`
    fn flash_erase_page(&mut self, addr: u32) -> HalResult<()>;

    /// Regions of the window free for interpreter storage
    fn flash_free_regions(&self) -> Vec<FlashRegion, MAX_FREE_REGIONS>;

    // Miscellaneous

    /// Die temperature in °C, if the silicon has a sensor
    fn read_temperature(&mut self) -> Option<f32> {
        None
    }

    /// Reference voltage, if the silicon can measure it
    fn read_vref(&mut self) -> Option<f32> {
        None
    }

    fn random_number(&mut self) -> u32;

    fn enable_watchdog(&mut self, timeout_s: f32);

    fn kick_watchdog(&mut self);
}
