//! The reference board
//!
//! A board is split in two. [`BoardShared`] holds everything an interrupt
//! handler may touch: the pin table, the input register, the clock, the
//! event registry and the util timer. It lives wherever the port puts its
//! statics and is only ever used through `&self`. [`Board`] borrows it and
//! owns the normal-context drivers; the interpreter holds the one `Board`
//! and calls [`PeripheralCapability`] on it.
//!
//! ```ignore
//! let shared = BoardShared::<Drivers>::new(&config, gpio_in, counter, rtc)?;
//! let mut board = Board::new(&shared, &config, peripherals)?;
//! board.init();
//! loop {
//!     board.idle()?;
//!     board.service_util_timer(|irq, schedule| run_timer_task(irq, schedule));
//! }
//! ```

use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiBus;
use embedded_io::{Read, ReadReady, Write};
use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;
use rand_core::RngCore;
use rand_pcg::Pcg32;

use ferrule_hal::capability::MAX_FREE_REGIONS;
use ferrule_hal::driver::{
    CounterSource, GpioDriver, GpioInput, RtcSource, SetConfig, SleepControl,
};
use ferrule_hal::i2c::I2cConfig;
use ferrule_hal::spi::SpiConfig;
use ferrule_hal::time::{time_from_millis, MAX_BLOCKING_US};
use ferrule_hal::uart::UartConfig;
use ferrule_hal::{
    DeviceKind, EventFlag, FlashPage, FlashRegion, HalError, HalResult, IoEvent, IrqCapability,
    LogicalPin, PeripheralCapability, PhysicalPin, PinCapabilities, PinFunction, PinInfo, PinState,
    SysTime, TxSource, UtilTimerControl,
};

use crate::clock::SystemClock;
use crate::config::{BoardConfig, MAX_SERIAL_ID_LEN};
use crate::events::EventFlagRegistry;
use crate::flash::FlashStore;
use crate::gpio::PinStateMachine;
use crate::i2c::I2cPort;
use crate::pins::PinMap;
use crate::spi::SpiPort;
use crate::timer::{UtilTimer, UtilTimerSchedule};
use crate::uart::UartPort;
use crate::watchdog::SoftWatchdog;

pub const MAX_SERIAL: usize = 3;
pub const MAX_SPI: usize = 2;
pub const MAX_I2C: usize = 2;

/// Shorter sleep requests return without sleeping
const MIN_SLEEP_US: SysTime = 1_000;

/// Pins a bus setup may route: UART rx/tx or I2C scl/sda
type PinRoutes = Vec<(PinInfo, PinState), 2>;

/// Vendor drivers a board is assembled from
pub trait BoardDrivers {
    type Gpio: GpioDriver;
    type GpioIn: GpioInput;
    type Counter: CounterSource;
    type Rtc: RtcSource;
    type Sleep: SleepControl;
    type Serial: Read + Write + ReadReady + SetConfig<UartConfig>;
    type Spi: SpiBus<u8> + SetConfig<SpiConfig>;
    type I2c: I2c + SetConfig<I2cConfig>;
    type Flash: NorFlash;
}

/// Normal-context drivers handed to [`Board::new`]
///
/// Device vectors are in interpreter numbering: `serial[0]` is `SERIAL1`.
pub struct BoardPeripherals<D: BoardDrivers> {
    pub gpio: D::Gpio,
    pub sleep: D::Sleep,
    pub serial: Vec<D::Serial, MAX_SERIAL>,
    pub spi: Vec<D::Spi, MAX_SPI>,
    pub i2c: Vec<D::I2c, MAX_I2C>,
    pub flash: D::Flash,
}

/// Interrupt-safe half of the board
pub struct BoardShared<D: BoardDrivers> {
    pins: PinMap,
    gpio_in: D::GpioIn,
    clock: SystemClock<D::Counter, D::Rtc>,
    events: EventFlagRegistry,
    timer: UtilTimer,
}

impl<D: BoardDrivers> BoardShared<D> {
    pub fn new(
        config: &BoardConfig,
        gpio_in: D::GpioIn,
        counter: D::Counter,
        rtc: D::Rtc,
    ) -> HalResult<Self> {
        Ok(Self {
            pins: config.pin_map()?,
            gpio_in,
            clock: SystemClock::new(counter, rtc),
            events: EventFlagRegistry::new(),
            timer: UtilTimer::new(),
        })
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn clock(&self) -> &SystemClock<D::Counter, D::Rtc> {
        &self.clock
    }

    pub fn events(&self) -> &EventFlagRegistry {
        &self.events
    }

    pub fn timer(&self) -> &UtilTimer {
        &self.timer
    }

    /// GPIO edge interrupt entry point
    ///
    /// Latches the level for the pin's watch slot and queues an edge
    /// event stamped with the current time. Unwatched pins are ignored.
    pub fn on_pin_edge(&self, pin: PhysicalPin, level: bool) -> bool {
        let now = self.clock.now();
        self.events.on_edge(pin, level, now)
    }

    /// Fire the util timer if it is due
    ///
    /// The callback runs with the slot already cleared, so it may
    /// reschedule through the `&Self` it is given.
    pub fn service_util_timer<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Self, &UtilTimerSchedule),
    {
        let now = self.clock.now();
        self.timer.fire_due(now, |schedule| f(self, schedule))
    }
}

impl<D: BoardDrivers> UtilTimerControl for BoardShared<D> {
    fn util_timer_start(&self, period: SysTime) {
        let schedule = self.timer.start(self.clock.now(), period);
        trace!("util timer armed for {}", schedule.deadline_us);
    }

    fn util_timer_disable(&self) {
        self.timer.disable();
    }
}

impl<D: BoardDrivers> IrqCapability for BoardShared<D>
where
    Self: Sync,
{
    fn pin_get_value(&self, pin: LogicalPin) -> bool {
        self.pins
            .physical(pin)
            .is_ok_and(|physical| self.gpio_in.level(physical))
    }

    fn get_watched_pin_state(&self, flag: EventFlag) -> bool {
        self.events.latched_level(flag)
    }

    fn get_system_time(&self) -> SysTime {
        self.clock.now()
    }

    fn push_event(&self, event: IoEvent) -> HalResult<()> {
        self.events.push(event)
    }
}

/// Normal-context half of the board
pub struct Board<'a, D: BoardDrivers> {
    shared: &'a BoardShared<D>,
    serial_id: Vec<u8, MAX_SERIAL_ID_LEN>,
    console: UartConfig,
    gpio: D::Gpio,
    pin_states: PinStateMachine,
    sleep: D::Sleep,
    serial: Vec<UartPort<D::Serial>, MAX_SERIAL>,
    spi: Vec<SpiPort<D::Spi>, MAX_SPI>,
    i2c: Vec<I2cPort<D::I2c>, MAX_I2C>,
    flash: FlashStore<D::Flash>,
    watchdog: SoftWatchdog,
    rng: Option<Pcg32>,
}

impl<'a, D: BoardDrivers> Board<'a, D> {
    pub fn new(
        shared: &'a BoardShared<D>,
        config: &BoardConfig,
        peripherals: BoardPeripherals<D>,
    ) -> HalResult<Self> {
        let BoardPeripherals {
            gpio,
            sleep,
            serial,
            spi,
            i2c,
            flash,
        } = peripherals;

        let mut board = Self {
            shared,
            serial_id: config.serial_id.clone(),
            console: config.console,
            gpio,
            pin_states: PinStateMachine::new(config.state_set()),
            sleep,
            serial: Vec::new(),
            spi: Vec::new(),
            i2c: Vec::new(),
            flash: FlashStore::new(flash, config.flash.base, config.flash.size)?,
            watchdog: SoftWatchdog::default(),
            rng: None,
        };

        // Capacities match the peripheral vectors, so pushes cannot fail
        for (n, port) in (1u8..).zip(serial) {
            let _ = board.serial.push(UartPort::new(EventFlag::Serial(n), port));
        }
        for (n, bus) in (1u8..).zip(spi) {
            let _ = board.spi.push(SpiPort::new(EventFlag::Spi(n), bus));
        }
        for (n, bus) in (1u8..).zip(i2c) {
            let _ = board.i2c.push(I2cPort::new(EventFlag::I2c(n), bus));
        }

        info!(
            "board {}: {} pins, {} serial, {} spi, {} i2c",
            config.name.as_str(),
            shared.pins.len(),
            board.serial.len(),
            board.spi.len(),
            board.i2c.len()
        );
        Ok(board)
    }

    pub fn shared(&self) -> &'a BoardShared<D> {
        self.shared
    }

    /// See [`BoardShared::service_util_timer`]
    pub fn service_util_timer<F>(&self, f: F) -> bool
    where
        F: FnOnce(&BoardShared<D>, &UtilTimerSchedule),
    {
        self.shared.service_util_timer(f)
    }

    /// Software watchdog deadline missed
    pub fn watchdog_expired(&self) -> bool {
        self.watchdog.expired(self.shared.clock.now())
    }

    /// Restart system time at zero after waking from deep sleep
    pub fn wake_from_deep_sleep(&mut self) {
        self.shared.clock.wake_from_deep_sleep();
        self.shared.timer.disable();
    }

    /// Move one serial port's received bytes into the event queue
    pub fn usart_poll(&mut self, device: EventFlag) -> HalResult<usize> {
        let shared = self.shared;
        let now = shared.clock.now();
        self.serial_port(device)?.poll(&shared.events, now)
    }

    fn open_console(&mut self) {
        if self.serial.is_empty() {
            return;
        }
        let console = self.console;
        if let Err(e) = self.usart_setup(EventFlag::SERIAL1, &console) {
            warn!("console setup failed: {:?}", e);
        }
    }

    /// Resolve a bus's pins up front, keeping those the board can switch
    ///
    /// Nothing is changed here, so an unknown pin fails the whole setup
    /// before any pin leaves its current state.
    fn resolve_routes(
        &self,
        wanted: [(Option<LogicalPin>, PinState); 2],
    ) -> HalResult<PinRoutes> {
        let mut routes = PinRoutes::new();
        for (pin, state) in wanted {
            let Some(pin) = pin else {
                continue;
            };
            let info = self.shared.pins.resolve(pin)?;
            if self.pin_states.supported().contains(state) && info.supports(state) {
                // At most two entries
                let _ = routes.push((info, state));
            }
        }
        Ok(routes)
    }

    fn apply_routes(&mut self, routes: &PinRoutes) -> HalResult<()> {
        for (info, state) in routes {
            self.pin_states.set_state(&mut self.gpio, info, *state)?;
        }
        Ok(())
    }

    fn serial_port(&mut self, device: EventFlag) -> HalResult<&mut UartPort<D::Serial>> {
        let index = device_index(device, DeviceKind::Serial)?;
        self.serial
            .get_mut(index)
            .ok_or(HalError::NoSuchDevice(device))
    }

    fn spi_port(&mut self, device: EventFlag) -> HalResult<&mut SpiPort<D::Spi>> {
        let index = device_index(device, DeviceKind::Spi)?;
        self.spi.get_mut(index).ok_or(HalError::NoSuchDevice(device))
    }

    fn i2c_port(&mut self, device: EventFlag) -> HalResult<&mut I2cPort<D::I2c>> {
        let index = device_index(device, DeviceKind::I2c)?;
        self.i2c.get_mut(index).ok_or(HalError::NoSuchDevice(device))
    }

    fn rng(&mut self) -> &mut Pcg32 {
        let shared = self.shared;
        let serial_id = &self.serial_id;
        self.rng.get_or_insert_with(|| {
            let id = serial_id
                .iter()
                .fold(0u64, |acc, &b| acc.rotate_left(8) ^ u64::from(b));
            Pcg32::new(shared.clock.now() ^ id, id | 1)
        })
    }

    fn physical_edge_irq(&mut self, info: &PinInfo, enabled: bool) -> HalResult<()> {
        self.gpio
            .set_edge_interrupt(info.physical, enabled)
            .map_err(|_| HalError::Gpio(info.logical))
    }
}

fn device_index(device: EventFlag, kind: DeviceKind) -> HalResult<usize> {
    if device.kind() != kind {
        return Err(HalError::WrongDevice(device));
    }
    device.index().ok_or(HalError::NoSuchDevice(device))
}

impl<'a, D: BoardDrivers> PeripheralCapability for Board<'a, D>
where
    BoardShared<D>: Sync,
{
    type Irq = BoardShared<D>;

    fn irq(&self) -> &Self::Irq {
        self.shared
    }

    fn init(&mut self) {
        self.reset();
        self.open_console();
        info!("board initialised at {}", self.shared.clock.now());
    }

    fn reset(&mut self) {
        for info in self.shared.pins.iter() {
            if self.shared.events.watch_flag(info.physical).is_some()
                && self.gpio.set_edge_interrupt(info.physical, false).is_err()
            {
                warn!("gpio {:?}: edge interrupt left enabled", info.physical);
            }
        }
        self.shared.events.reset_watches();
        self.shared.events.clear();
        self.shared.timer.disable();
        self.pin_states.reset();
        for port in &mut self.serial {
            port.reset();
        }
        for port in &mut self.spi {
            port.reset();
        }
        for port in &mut self.i2c {
            port.reset();
        }
        self.watchdog.disable();
        debug!("board reset");
    }

    fn soft_init(&mut self) {
        if !self.is_device_initialised(EventFlag::SERIAL1) {
            self.open_console();
        }
        debug!("soft init");
    }

    fn idle(&mut self) -> HalResult<()> {
        let now = self.shared.clock.now();
        let events = &self.shared.events;
        let mut result = Ok(());
        for port in &mut self.serial {
            // Keep polling the other ports if one faults
            if let Err(e) = port.poll(events, now) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        if self.watchdog.expired(now) {
            warn!("watchdog expired");
        }
        result
    }

    fn serial_number(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.serial_id.len());
        buf[..n].copy_from_slice(&self.serial_id[..n]);
        n
    }

    fn pin_info(&self, pin: LogicalPin) -> HalResult<PinInfo> {
        self.shared.pins.resolve(pin)
    }

    fn pin_set_state(&mut self, pin: LogicalPin, state: PinState) -> HalResult<()> {
        let info = self.shared.pins.resolve(pin)?;
        self.pin_states.set_state(&mut self.gpio, &info, state)?;
        trace!("pin {:?} -> {:?}", pin, state);
        Ok(())
    }

    fn pin_get_state(&self, pin: LogicalPin) -> PinState {
        self.shared
            .pins
            .physical(pin)
            .map_or(PinState::Undefined, |physical| self.pin_states.state(physical))
    }

    fn pin_set_value(&mut self, pin: LogicalPin, value: bool) -> HalResult<()> {
        let info = self.shared.pins.resolve(pin)?;
        self.pin_states.set_value(&mut self.gpio, &info, value)
    }

    fn pin_pulse(&mut self, pin: LogicalPin, polarity: bool, duration_ms: f64) -> HalResult<()> {
        let info = self.shared.pins.resolve(pin)?;
        let duration = time_from_millis(duration_ms);
        if duration > MAX_BLOCKING_US {
            return Err(HalError::TooLong {
                requested_us: duration,
                limit_us: MAX_BLOCKING_US,
            });
        }
        self.pin_states.set_value(&mut self.gpio, &info, polarity)?;
        let held = self.shared.clock.delay_us(duration);
        self.gpio.set_level(info.physical, !polarity);
        held
    }

    fn pin_analog(&mut self, pin: LogicalPin) -> HalResult<f32> {
        self.shared.pins.resolve(pin)?;
        Err(HalError::UnsupportedState {
            pin,
            state: PinState::AdcIn,
        })
    }

    fn pin_analog_output(
        &mut self,
        pin: LogicalPin,
        _value: f32,
        _freq_hz: Option<f32>,
    ) -> HalResult<PinFunction> {
        self.shared.pins.resolve(pin)?;
        Err(HalError::UnsupportedState {
            pin,
            state: PinState::DacOut,
        })
    }

    fn current_pin_function(&self, _pin: LogicalPin) -> Option<PinFunction> {
        None
    }

    fn can_watch(&self, pin: LogicalPin) -> bool {
        let events = &self.shared.events;
        self.shared.pins.resolve(pin).is_ok_and(|info| {
            info.caps.contains(PinCapabilities::DIGITAL_IN)
                && (events.has_free_watch() || events.watch_flag(info.physical).is_some())
        })
    }

    fn pin_watch(&mut self, pin: LogicalPin, enable: bool) -> HalResult<EventFlag> {
        let info = self.shared.pins.resolve(pin)?;
        let events = &self.shared.events;

        if !enable {
            let flag = events
                .watch_flag(info.physical)
                .ok_or(HalError::NotWatched(pin))?;
            self.physical_edge_irq(&info, false)?;
            events.unbind_watch(info.physical);
            debug!("unwatched pin {:?}", pin);
            return Ok(flag);
        }

        if !info.caps.contains(PinCapabilities::DIGITAL_IN) {
            return Err(HalError::UnsupportedState {
                pin,
                state: PinState::GpioIn,
            });
        }
        if let Some(flag) = events.watch_flag(info.physical) {
            return Ok(flag);
        }
        let flag = events.bind_watch(info.physical)?;
        if let Err(e) = self.physical_edge_irq(&info, true) {
            events.unbind_watch(info.physical);
            return Err(e);
        }
        debug!("watching pin {:?} as {:?}", pin, flag);
        Ok(flag)
    }

    fn is_event_for_pin(&self, event: &IoEvent, pin: LogicalPin) -> bool {
        self.shared
            .pins
            .physical(pin)
            .is_ok_and(|physical| self.shared.events.is_event_for_pin(event, physical))
    }

    fn pop_event(&mut self) -> Option<IoEvent> {
        self.shared.events.pop()
    }

    fn dropped_events(&self) -> u32 {
        self.shared.events.dropped()
    }

    fn is_device_initialised(&self, device: EventFlag) -> bool {
        let Some(index) = device.index() else {
            return false;
        };
        match device {
            EventFlag::Serial(_) => self.serial.get(index).is_some_and(|p| p.is_initialised()),
            EventFlag::Spi(_) => self.spi.get(index).is_some_and(|p| p.is_initialised()),
            EventFlag::I2c(_) => self.i2c.get(index).is_some_and(|p| p.is_initialised()),
            EventFlag::PinWatch(_) => self.shared.events.is_slot_bound(device),
        }
    }

    fn usart_setup(&mut self, device: EventFlag, config: &UartConfig) -> HalResult<()> {
        self.serial_port(device)?;
        let routes = self.resolve_routes([
            (config.rx_pin, PinState::UsartIn),
            (config.tx_pin, PinState::UsartOut),
        ])?;
        self.serial_port(device)?.setup(config)?;
        self.apply_routes(&routes)
    }

    fn usart_kick(&mut self, device: EventFlag, tx: &mut dyn TxSource) -> HalResult<usize> {
        self.serial_port(device)?.kick(tx)
    }

    fn spi_setup(&mut self, device: EventFlag, config: &SpiConfig) -> HalResult<()> {
        self.spi_port(device)?.setup(config)
    }

    fn spi_send(&mut self, device: EventFlag, data: Option<u16>) -> HalResult<Option<u16>> {
        self.spi_port(device)?.send(data)
    }

    fn spi_send16(&mut self, device: EventFlag, data: u16) -> HalResult<()> {
        self.spi_port(device)?.send16(data)
    }

    fn spi_set16(&mut self, device: EventFlag, is16: bool) -> HalResult<()> {
        self.spi_port(device)?.set16(is16)
    }

    fn spi_send_buffer(&mut self, device: EventFlag, tx: &[u8], rx: &mut [u8]) -> HalResult<()> {
        self.spi_port(device)?.send_buffer(tx, rx)
    }

    fn spi_wait(&mut self, device: EventFlag) -> HalResult<()> {
        self.spi_port(device)?.wait()
    }

    fn spi_set_receive(&mut self, device: EventFlag, receive: bool) -> HalResult<()> {
        self.spi_port(device)?.set_receive(receive)
    }

    fn i2c_setup(&mut self, device: EventFlag, config: &I2cConfig) -> HalResult<()> {
        self.i2c_port(device)?;
        let routes = self.resolve_routes([
            (config.scl_pin, PinState::I2c),
            (config.sda_pin, PinState::I2c),
        ])?;
        self.i2c_port(device)?.setup(config)?;
        self.apply_routes(&routes)
    }

    fn i2c_write(
        &mut self,
        device: EventFlag,
        address: u8,
        data: &[u8],
        send_stop: bool,
    ) -> HalResult<()> {
        self.i2c_port(device)?.write(address, data, send_stop)
    }

    fn i2c_read(
        &mut self,
        device: EventFlag,
        address: u8,
        buf: &mut [u8],
        send_stop: bool,
    ) -> HalResult<()> {
        self.i2c_port(device)?.read(address, buf, send_stop)
    }

    fn set_system_time(&mut self, time: SysTime) {
        self.shared.clock.set(time);
    }

    fn delay_us(&mut self, us: u32) -> HalResult<()> {
        self.shared.clock.delay_us(u64::from(us))
    }

    fn sleep(&mut self, time_until_wake: SysTime) -> bool {
        let clock = &self.shared.clock;
        if !clock.has_rtc() || time_until_wake < MIN_SLEEP_US || self.shared.events.pending() > 0 {
            return false;
        }
        // Never sleep through the util timer
        let now = clock.now();
        let budget = match self.shared.timer.schedule() {
            Some(s) => time_until_wake.min(s.deadline_us.saturating_sub(now)),
            None => time_until_wake,
        };
        if budget < MIN_SLEEP_US {
            return false;
        }

        clock.enter_light_sleep();
        let slept = self.sleep.light_sleep(budget);
        let elapsed = clock.exit_light_sleep();
        trace!("light sleep for {} of {} us", elapsed, budget);
        slept
    }

    fn flash_max(&self) -> u32 {
        self.flash.max()
    }

    fn flash_read(&mut self, addr: u32, buf: &mut [u8]) -> HalResult<()> {
        self.flash.read(addr, buf)
    }

    fn flash_write(&mut self, addr: u32, data: &[u8]) -> HalResult<()> {
        self.flash.write(addr, data)
    }

    fn flash_get_page(&self, addr: u32) -> HalResult<FlashPage> {
        self.flash.page(addr)
    }

    fn flash_erase_page(&mut self, addr: u32) -> HalResult<()> {
        self.flash.erase_page(addr)
    }

    fn flash_free_regions(&self) -> Vec<FlashRegion, MAX_FREE_REGIONS> {
        self.flash.free_regions()
    }

    fn random_number(&mut self) -> u32 {
        self.rng().next_u32()
    }

    fn enable_watchdog(&mut self, timeout_s: f32) {
        let timeout = time_from_millis(f64::from(timeout_s) * 1_000.0);
        self.watchdog.enable(self.shared.clock.now(), timeout);
        info!("watchdog enabled, {} us", timeout);
    }

    fn kick_watchdog(&mut self) {
        self.watchdog.kick(self.shared.clock.now());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use ferrule_hal_sim::{SimFlash, SimGpio, SimHardware, SimI2c, SimSerial, SimSleep, SimSpi};
    use ferrule_hal_sim::{SimCounter, SimRtc};

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
        BoardShared::new(
            &BoardConfig::reference(),
            hw.gpio.clone(),
            hw.counter.clone(),
            hw.rtc.clone(),
        )
        .unwrap()
    }

    pub fn board<'a>(
        shared: &'a BoardShared<SimDrivers>,
        hw: &SimHardware,
    ) -> Board<'a, SimDrivers> {
        let peripherals = BoardPeripherals {
            gpio: hw.gpio.clone(),
            sleep: hw.sleep.clone(),
            serial: hw.serial.iter().cloned().collect(),
            spi: core::iter::once(hw.spi.clone()).collect(),
            i2c: core::iter::once(hw.i2c.clone()).collect(),
            flash: hw.flash.clone(),
        };
        let mut board = Board::new(shared, &BoardConfig::reference(), peripherals).unwrap();
        board.init();
        board
    }
}
