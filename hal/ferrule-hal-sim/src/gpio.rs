//! Simulated GPIO bank

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ferrule_hal::driver::{GpioDriver, GpioInput, PinMode};
use ferrule_hal::PhysicalPin;

/// Pins in the simulated bank
pub const SIM_PIN_COUNT: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimGpioError {
    NoSuchPin(u8),
    IrqFault(u8),
}

struct PinBank {
    levels: [AtomicBool; SIM_PIN_COUNT],
    edge_enabled: [AtomicBool; SIM_PIN_COUNT],
    modes: Mutex<[Option<PinMode>; SIM_PIN_COUNT]>,
    irq_fault: AtomicBool,
}

/// GPIO driver and input register over one shared pin bank
#[derive(Clone)]
pub struct SimGpio {
    bank: Arc<PinBank>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self {
            bank: Arc::new(PinBank {
                levels: [const { AtomicBool::new(false) }; SIM_PIN_COUNT],
                edge_enabled: [const { AtomicBool::new(false) }; SIM_PIN_COUNT],
                modes: Mutex::new([None; SIM_PIN_COUNT]),
                irq_fault: AtomicBool::new(false),
            }),
        }
    }

    /// Mode last programmed for a pin
    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        let modes = self.bank.modes.lock().unwrap_or_else(PoisonError::into_inner);
        modes.get(pin as usize).copied().flatten()
    }

    pub fn level(&self, pin: u8) -> bool {
        self.bank
            .levels
            .get(pin as usize)
            .is_some_and(|l| l.load(Ordering::SeqCst))
    }

    pub fn edge_enabled(&self, pin: u8) -> bool {
        self.bank
            .edge_enabled
            .get(pin as usize)
            .is_some_and(|e| e.load(Ordering::SeqCst))
    }

    /// Make edge-interrupt changes fail until healed
    pub fn set_irq_fault(&self, fault: bool) {
        self.bank.irq_fault.store(fault, Ordering::SeqCst);
    }

    /// Drive a pin from outside the chip
    ///
    /// Returns `true` when the change would raise an edge interrupt.
    pub fn drive_input(&self, pin: u8, level: bool) -> bool {
        let Some(slot) = self.bank.levels.get(pin as usize) else {
            return false;
        };
        let previous = slot.swap(level, Ordering::SeqCst);
        previous != level && self.edge_enabled(pin)
    }
}

impl Default for SimGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioDriver for SimGpio {
    type Error = SimGpioError;

    fn set_mode(&mut self, pin: PhysicalPin, mode: PinMode) -> Result<(), Self::Error> {
        let mut modes = self.bank.modes.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = modes
            .get_mut(pin.index())
            .ok_or(SimGpioError::NoSuchPin(pin.0))?;
        *slot = Some(mode);

        // Pulls settle the floating input
        match mode {
            PinMode::InputPullUp => self.bank.levels[pin.index()].store(true, Ordering::SeqCst),
            PinMode::InputPullDown => self.bank.levels[pin.index()].store(false, Ordering::SeqCst),
            _ => {}
        }
        Ok(())
    }

    fn set_level(&mut self, pin: PhysicalPin, high: bool) {
        if let Some(level) = self.bank.levels.get(pin.index()) {
            level.store(high, Ordering::SeqCst);
        }
    }

    fn set_edge_interrupt(&mut self, pin: PhysicalPin, enabled: bool) -> Result<(), Self::Error> {
        if self.bank.irq_fault.load(Ordering::SeqCst) {
            return Err(SimGpioError::IrqFault(pin.0));
        }
        self.bank
            .edge_enabled
            .get(pin.index())
            .ok_or(SimGpioError::NoSuchPin(pin.0))?
            .store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

impl GpioInput for SimGpio {
    fn level(&self, pin: PhysicalPin) -> bool {
        SimGpio::level(self, pin.0)
    }
}
