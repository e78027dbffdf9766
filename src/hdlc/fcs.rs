//! # HDLC Frame Check Sequence
//!
//! FCS-16 calculation per ISO/IEC 13239 (the CRC-16/X.25 polynomial), used
//! both for the header check sequence (HCS) and the frame check sequence
//! (FCS) of DLMS HDLC frames.
//!
//! The calculator keeps the running register rather than the transmitted
//! value: feeding a frame body followed by its received FCS leaves the
//! register at `GOOD_FCS` when the frame is intact, which is the check the
//! frame validator relies on.

use once_cell::sync::Lazy;

const INITIAL_FCS: u16 = 0xFFFF;
const GOOD_FCS: u16 = 0xF0B8;
const KEY: u16 = 0x8408; // Bit-reversed 0x1021

/// Precomputed FCS table
static FCS_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for b in 0..=0xFFu16 {
        let mut v = b;
        for _ in 0..8 {
            v = if (v & 1) == 1 { (v >> 1) ^ KEY } else { v >> 1 };
        }
        table[b as usize] = v;
    }
    table
});

/// Incremental FCS-16 calculator
#[derive(Debug, Clone)]
pub struct FcsCalc {
    value: u16,
}

impl FcsCalc {
    /// Create a new FCS calculator
    pub fn new() -> Self {
        Self { value: INITIAL_FCS }
    }

    /// Reset the FCS value to initial state
    pub fn reset(&mut self) {
        self.value = INITIAL_FCS;
    }

    /// Update the FCS value with a single byte
    pub fn update(&mut self, data: u8) {
        self.value = (self.value >> 8) ^ FCS_TABLE[((self.value ^ data as u16) & 0xFF) as usize];
    }

    /// Update the FCS value with a slice of bytes
    pub fn update_slice(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Current running register value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// The checksum as it would be transmitted (ones complement of the register)
    pub fn checksum(&self) -> u16 {
        self.value ^ 0xFFFF
    }

    /// The checksum in transmission order (low byte first)
    pub fn checksum_bytes(&self) -> [u8; 2] {
        let fcs = self.checksum();
        [(fcs & 0xFF) as u8, (fcs >> 8) as u8]
    }

    /// True when the register is in the good state.
    ///
    /// Holds after feeding a byte sequence followed by the two FCS bytes
    /// that were computed over it.
    pub fn is_good(&self) -> bool {
        self.value == GOOD_FCS
    }
}

impl Default for FcsCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the FCS-16 checksum over a byte slice
pub fn fcs16(data: &[u8]) -> u16 {
    let mut calc = FcsCalc::new();
    calc.update_slice(data);
    calc.checksum()
}
