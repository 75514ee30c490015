//! Logical-to-physical pin table
//!
//! Every pin-level operation first resolves its logical pin here. The
//! table is fixed after board construction and is read from interrupt
//! context, so it is plain immutable data.

use heapless::Vec;

use ferrule_hal::{HalError, HalResult, LogicalPin, PhysicalPin, PinCapabilities, PinInfo};

/// Largest physical pin arena a board can describe
pub const MAX_PINS: usize = 48;

const GPIO_AF: PinCapabilities = PinCapabilities::GPIO.union(PinCapabilities::ALT_FUNCTION);
const GPIO_UART: PinCapabilities = GPIO_AF.union(PinCapabilities::USART);
const GPIO_I2C: PinCapabilities = GPIO_AF.union(PinCapabilities::I2C);

/// Reference board: logical pins 0..=15 map straight onto GPIO 0..=15
pub const REFERENCE_PINS: [PinInfo; 16] = [
    PinInfo::new(0, 0, GPIO_AF),
    PinInfo::new(1, 1, GPIO_UART), // U0TXD
    PinInfo::new(2, 2, GPIO_AF),
    PinInfo::new(3, 3, GPIO_UART), // U0RXD
    PinInfo::new(4, 4, GPIO_I2C),
    PinInfo::new(5, 5, GPIO_I2C),
    PinInfo::new(6, 6, GPIO_AF),
    PinInfo::new(7, 7, GPIO_AF),
    PinInfo::new(8, 8, GPIO_AF),
    PinInfo::new(9, 9, GPIO_AF),
    PinInfo::new(10, 10, GPIO_AF),
    PinInfo::new(11, 11, GPIO_AF),
    PinInfo::new(12, 12, GPIO_AF),
    PinInfo::new(13, 13, GPIO_AF),
    PinInfo::new(14, 14, GPIO_AF),
    PinInfo::new(15, 15, GPIO_AF),
];

/// Board pin table
///
/// Each logical pin maps to exactly one physical pin and no physical pin
/// is named twice.
#[derive(Debug, Clone)]
pub struct PinMap {
    table: Vec<PinInfo, MAX_PINS>,
}

impl PinMap {
    /// Build and validate a pin table
    pub fn new(entries: &[PinInfo]) -> HalResult<Self> {
        let mut table: Vec<PinInfo, MAX_PINS> = Vec::new();
        for entry in entries {
            if entry.physical.index() >= MAX_PINS {
                return Err(HalError::PinTableFull);
            }
            let clash = table
                .iter()
                .any(|e| e.logical == entry.logical || e.physical == entry.physical);
            if clash {
                return Err(HalError::DuplicatePin(entry.logical));
            }
            table.push(*entry).map_err(|_| HalError::PinTableFull)?;
        }
        Ok(Self { table })
    }

    /// Pin table of the reference board
    pub fn reference() -> Self {
        let mut table = Vec::new();
        // Sixteen entries always fit and never clash
        for entry in REFERENCE_PINS {
            let _ = table.push(entry);
        }
        Self { table }
    }

    pub fn resolve(&self, pin: LogicalPin) -> HalResult<PinInfo> {
        self.table
            .iter()
            .find(|e| e.logical == pin)
            .copied()
            .ok_or(HalError::UnknownPin(pin))
    }

    pub fn physical(&self, pin: LogicalPin) -> HalResult<PhysicalPin> {
        self.resolve(pin).map(|e| e.physical)
    }

    /// Reverse lookup, used when an interrupt reports a physical pin
    pub fn logical_for(&self, physical: PhysicalPin) -> Option<LogicalPin> {
        self.table
            .iter()
            .find(|e| e.physical == physical)
            .map(|e| e.logical)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PinInfo> {
        self.table.iter()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Parse a physical pin name like "gpio5", "GPIO12" or a bare "7"
pub fn parse_pin_string(s: &str) -> Option<PhysicalPin> {
    let s = s.trim();
    let digits = match s.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("gpio") => &s[4..],
        _ => s,
    };

    let pin: u8 = digits.parse().ok()?;
    if pin as usize >= MAX_PINS {
        return None;
    }

    Some(PhysicalPin(pin))
}
