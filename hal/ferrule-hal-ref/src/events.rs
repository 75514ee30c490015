//! Inbound event queue and pin-watch slots
//!
//! Interrupt handlers and the idle-loop poll push [`IoEvent`]s; the
//! interpreter pops them. The queue is bounded. When it is full the new
//! event is dropped and counted, never blocking the pusher.
//!
//! A watch slot binds one physical pin to an [`EventFlag::PinWatch`]
//! flag. Slots are atomics so that the edge interrupt can look up its
//! slot and latch the level without taking a lock.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use ferrule_hal::{EventFlag, HalError, HalResult, IoEvent, PhysicalPin, SysTime, IOEVENT_MAX_CHARS};

/// Pins that can be watched at once
pub const MAX_WATCHES: usize = 16;

/// Inbound events buffered between idle-loop iterations
pub const EVENT_QUEUE_LEN: usize = 64;

const NO_PIN: u8 = u8::MAX;

pub struct EventFlagRegistry {
    queue: Channel<CriticalSectionRawMutex, IoEvent, EVENT_QUEUE_LEN>,
    dropped: AtomicU32,
    watch_pins: [AtomicU8; MAX_WATCHES],
    latched: [AtomicBool; MAX_WATCHES],
}

impl EventFlagRegistry {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: AtomicU32::new(0),
            watch_pins: [const { AtomicU8::new(NO_PIN) }; MAX_WATCHES],
            latched: [const { AtomicBool::new(false) }; MAX_WATCHES],
        }
    }

    /// Queue an event; safe from interrupt context
    pub fn push(&self, event: IoEvent) -> HalResult<()> {
        match self.queue.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("event queue full, dropped {:?} ({} total)", event.flag, dropped);
                Err(HalError::QueueFull)
            }
        }
    }

    /// Queue received bytes, split into events of at most
    /// [`IOEVENT_MAX_CHARS`] in arrival order
    ///
    /// Stops at the first chunk that does not fit.
    pub fn push_chars(&self, flag: EventFlag, time_us: SysTime, bytes: &[u8]) -> HalResult<()> {
        for chunk in bytes.chunks(IOEVENT_MAX_CHARS) {
            if let Some(event) = IoEvent::chars(flag, time_us, chunk) {
                self.push(event)?;
            }
        }
        Ok(())
    }

    pub fn pop(&self) -> Option<IoEvent> {
        self.queue.try_receive().ok()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Discard everything queued; the drop count is kept
    pub fn clear(&self) {
        self.queue.clear();
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Bind a pin to a watch slot, reusing its slot if already bound
    pub fn bind_watch(&self, pin: PhysicalPin) -> HalResult<EventFlag> {
        if let Some(flag) = self.watch_flag(pin) {
            return Ok(flag);
        }
        for (slot, bound) in self.watch_pins.iter().enumerate() {
            if bound
                .compare_exchange(NO_PIN, pin.0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.latched[slot].store(false, Ordering::Release);
                return Ok(EventFlag::PinWatch(slot as u8));
            }
        }
        Err(HalError::NoFreeWatch)
    }

    /// Release a pin's watch slot; returns the flag it had
    pub fn unbind_watch(&self, pin: PhysicalPin) -> Option<EventFlag> {
        let flag = self.watch_flag(pin)?;
        let slot = flag.index()?;
        self.watch_pins[slot].store(NO_PIN, Ordering::Release);
        Some(flag)
    }

    /// Flag of the slot a pin is bound to
    pub fn watch_flag(&self, pin: PhysicalPin) -> Option<EventFlag> {
        self.watch_pins
            .iter()
            .position(|bound| bound.load(Ordering::Acquire) == pin.0)
            .map(|slot| EventFlag::PinWatch(slot as u8))
    }

    pub fn has_free_watch(&self) -> bool {
        self.watch_pins
            .iter()
            .any(|bound| bound.load(Ordering::Acquire) == NO_PIN)
    }

    /// Edge interrupt entry: latch the level and queue an edge event
    ///
    /// Returns `false` if the pin is not watched.
    pub fn on_edge(&self, pin: PhysicalPin, level: bool, time_us: SysTime) -> bool {
        let Some(flag) = self.watch_flag(pin) else {
            return false;
        };
        if let Some(slot) = flag.index() {
            self.latched[slot].store(level, Ordering::Release);
        }
        // A full queue is already counted and logged by push
        let _ = self.push(IoEvent::edge(flag, time_us, level));
        true
    }

    /// Level latched at the last edge of a watch slot
    pub fn latched_level(&self, flag: EventFlag) -> bool {
        match flag {
            EventFlag::PinWatch(slot) => self
                .latched
                .get(slot as usize)
                .is_some_and(|l| l.load(Ordering::Acquire)),
            _ => false,
        }
    }

    /// Event came from the watch slot `pin` is currently bound to
    pub fn is_event_for_pin(&self, event: &IoEvent, pin: PhysicalPin) -> bool {
        event.flag.is_pin_watch() && self.watch_flag(pin) == Some(event.flag)
    }

    pub fn is_slot_bound(&self, flag: EventFlag) -> bool {
        match flag {
            EventFlag::PinWatch(slot) => self
                .watch_pins
                .get(slot as usize)
                .is_some_and(|bound| bound.load(Ordering::Acquire) != NO_PIN),
            _ => false,
        }
    }

    /// Release every watch slot
    pub fn reset_watches(&self) {
        for (bound, latched) in self.watch_pins.iter().zip(&self.latched) {
            bound.store(NO_PIN, Ordering::Release);
            latched.store(false, Ordering::Release);
        }
    }
}

impl Default for EventFlagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
