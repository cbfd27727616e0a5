//! # ARM7TDMI Register File
//!
//! The 16 general-purpose registers visible at any time.
//!
//! - **R0-R7**: Unbanked, shared by every mode
//! - **R8-R12**: Two copies (FIQ and everything else)
//! - **R13 (SP)**, **R14 (LR)**: Six copies, see [`cpu_modes`](super::cpu_modes)
//! - **R15 (PC)**: Unbanked
//!
//! Plus the CPSR and one SPSR per privileged mode (System shares User's lack
//! of one). Which copy is visible is looked up from the CPSR mode on every
//! access; a mode switch never moves register contents around.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: usize = 0xF;

/// Names of the registers set in `list`, lowest first (`["R0", "R4"]`).
#[must_use]
pub fn register_list_names(list: u32) -> Vec<String> {
    (0..=15_u8)
        .filter(|i| list.get_bit(*i))
        .map(|i| format!("R{i}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    low: [u32; 8],
    r8_to_r12: [[u32; 5]; 2],
    r13_r14: [[u32; 2]; 6],
    program_counter: u32,
    pub cpsr: Psr,
    spsr: [Psr; 5],
}

impl Default for Registers {
    /// Reset state: Supervisor mode, IRQ and FIQ masked, ARM state.
    fn default() -> Self {
        let mut cpsr = Psr::from(Mode::Supervisor);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);

        Self {
            low: [0; 8],
            r8_to_r12: [[0; 5]; 2],
            r13_r14: [[0; 2]; 6],
            program_counter: 0,
            cpsr,
            spsr: [Psr::default(); 5],
        }
    }
}

impl Registers {
    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.program_counter
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.program_counter = new_value;
    }

    pub const fn advance_program_counter(&mut self, bytes: u32) {
        self.program_counter = self.program_counter.wrapping_add(bytes);
    }

    /// Reads `reg` as seen from the current mode.
    #[must_use]
    pub fn register_at(&self, reg: usize) -> u32 {
        self.banked_at(reg, self.cpsr.mode())
    }

    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        self.set_banked_at(reg, self.cpsr.mode(), new_value);
    }

    /// Reads `reg` from the User bank whatever the current mode is.
    #[must_use]
    pub fn user_register_at(&self, reg: usize) -> u32 {
        self.banked_at(reg, Mode::User)
    }

    pub fn set_user_register_at(&mut self, reg: usize, new_value: u32) {
        self.set_banked_at(reg, Mode::User, new_value);
    }

    /// Reads `reg` from the bank owned by `mode`.
    #[must_use]
    pub fn banked_at(&self, reg: usize, mode: Mode) -> u32 {
        debug_assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        match reg {
            0..=7 => self.low[reg],
            8..=12 => self.r8_to_r12[mode.r8_to_r12_bank()][reg - 8],
            13 | 14 => self.r13_r14[mode.r13_r14_bank()][reg - 13],
            _ => self.program_counter,
        }
    }

    pub fn set_banked_at(&mut self, reg: usize, mode: Mode, new_value: u32) {
        debug_assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        match reg {
            0..=7 => self.low[reg] = new_value,
            8..=12 => self.r8_to_r12[mode.r8_to_r12_bank()][reg - 8] = new_value,
            13 | 14 => self.r13_r14[mode.r13_r14_bank()][reg - 13] = new_value,
            _ => self.program_counter = new_value,
        }
    }

    /// The SPSR of the current mode. User and System have none and read
    /// the CPSR instead.
    #[must_use]
    pub fn spsr(&self) -> Psr {
        self.cpsr
            .mode()
            .spsr_slot()
            .map_or(self.cpsr, |slot| self.spsr[slot])
    }

    /// Writes the SPSR of the current mode. Ignored in User and System.
    pub fn set_spsr(&mut self, psr: Psr) {
        match self.cpsr.mode().spsr_slot() {
            Some(slot) => self.spsr[slot] = psr,
            None => tracing::debug!("SPSR write ignored in {} mode", self.cpsr.mode()),
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        (0..=REG_PROGRAM_COUNTER)
            .map(|reg| self.register_at(reg))
            .collect()
    }
}
