//! Memory as seen by the CPU.
//!
//! The core only ever talks to a [`Bus`]. Implementors provide byte access,
//! halfwords and words are composed little-endian on top of it. Alignment is
//! the caller's job: the executors already align addresses the way the
//! hardware does before calling in.

use thiserror::Error;

use crate::bitwise::Bits;

pub trait Bus {
    fn read_byte(&mut self, address: u32) -> u8;

    fn write_byte(&mut self, address: u32, value: u8);

    fn read_half_word(&mut self, address: u32) -> u16 {
        let part_0 = u16::from(self.read_byte(address));
        let part_1 = u16::from(self.read_byte(address.wrapping_add(1)));

        (part_1 << 8) | part_0
    }

    fn read_word(&mut self, address: u32) -> u32 {
        let part_0 = u32::from(self.read_byte(address));
        let part_1 = u32::from(self.read_byte(address.wrapping_add(1)));
        let part_2 = u32::from(self.read_byte(address.wrapping_add(2)));
        let part_3 = u32::from(self.read_byte(address.wrapping_add(3)));

        (part_3 << 24) | (part_2 << 16) | (part_1 << 8) | part_0
    }

    fn write_half_word(&mut self, address: u32, value: u16) {
        self.write_byte(address, value.get_bits(0..=7) as u8);
        self.write_byte(address.wrapping_add(1), value.get_bits(8..=15) as u8);
    }

    fn write_word(&mut self, address: u32, value: u32) {
        self.write_byte(address, value.get_bits(0..=7) as u8);
        self.write_byte(address.wrapping_add(1), value.get_bits(8..=15) as u8);
        self.write_byte(address.wrapping_add(2), value.get_bits(16..=23) as u8);
        self.write_byte(address.wrapping_add(3), value.get_bits(24..=31) as u8);
    }

    /// Instruction fetch in ARM state.
    fn fetch_arm(&mut self, address: u32) -> u32 {
        self.read_word(address)
    }

    /// Instruction fetch in THUMB state.
    fn fetch_thumb(&mut self, address: u32) -> u16 {
        self.read_half_word(address)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("{len} bytes at 0x{address:08X} do not fit in memory mapped at 0x{base:08X}..0x{end:08X}")]
    OutOfRange {
        address: u32,
        len: usize,
        base: u32,
        end: u64,
    },
}

/// A single block of RAM starting at `base`.
///
/// Reads outside of it return 0 and writes outside of it are dropped.
#[derive(Debug, Clone, Default)]
pub struct FlatMemory {
    base: u32,
    data: Vec<u8>,
}

impl FlatMemory {
    #[must_use]
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.base) + self.data.len() as u64
    }

    /// Copies `bytes` into memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when the bytes don't fit.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), BusError> {
        let (base, end) = (self.base, self.end());
        let out_of_range = || BusError::OutOfRange {
            address,
            len: bytes.len(),
            base,
            end,
        };

        let start = self.index(address).ok_or_else(out_of_range)?;
        let slot = self
            .data
            .get_mut(start..start + bytes.len())
            .ok_or_else(out_of_range)?;
        slot.copy_from_slice(bytes);

        Ok(())
    }

    /// Places 32-bit words one after the other from `address`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when the words don't fit.
    pub fn load_words(&mut self, address: u32, words: &[u32]) -> Result<(), BusError> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.load(address, &bytes)
    }

    /// Places 16-bit halfwords one after the other from `address`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when the halfwords don't fit.
    pub fn load_half_words(&mut self, address: u32, half_words: &[u16]) -> Result<(), BusError> {
        let bytes: Vec<u8> = half_words.iter().flat_map(|h| h.to_le_bytes()).collect();
        self.load(address, &bytes)
    }

    fn index(&self, address: u32) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        (offset < self.data.len()).then_some(offset)
    }
}

impl Bus for FlatMemory {
    fn read_byte(&mut self, address: u32) -> u8 {
        self.index(address).map_or_else(
            || {
                tracing::debug!("read on unmapped memory 0x{address:08X}");
                0
            },
            |i| self.data[i],
        )
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        match self.index(address) {
            Some(i) => self.data[i] = value,
            None => tracing::debug!("write on unmapped memory 0x{address:08X}"),
        }
    }
}
