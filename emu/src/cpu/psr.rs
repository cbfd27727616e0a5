//! # Program Status Registers (CPSR and SPSR)
//!
//! ```text
//! 31 30 29 28 27            8 7 6 5 4   0
//! ┌──┬──┬──┬──┬───────────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │   Reserved    │I│F│T│Mode │
//! └──┴──┴──┴──┴───────────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (28-31)**: tested by [`condition`](super::condition)
//! - **I/F bits (7-6)**: IRQ/FIQ disable
//! - **T bit (5)**: ARM (0) or THUMB (1) state
//! - **Mode (4-0)**: see [`cpu_modes`](super::cpu_modes)

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::alu::ArithmeticOpResult;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;

/// Bits an MSR may change from User mode.
pub const FLAGS_MASK: u32 = 0xF000_0000;

/// Bits an MSR may change from a privileged mode. The T bit is left out on
/// purpose: only BX and exception return switch the instruction set.
pub const PRIVILEGED_MASK: u32 = FLAGS_MASK | 0b1101_1111;

/// Every defined bit: what a full SPSR write stores and what an exception
/// return copies back into the CPSR.
pub const DEFINED_MASK: u32 = FLAGS_MASK | 0b1111_1111;

/// Program Status Register (CPSR or SPSR).
///
/// Wraps the raw `u32` and provides accessors for every field. The same type
/// is used for the current register and for the five saved copies.
///
/// # Example
///
/// ```
/// use emu::cpu::psr::Psr;
///
/// let mut cpsr = Psr::default();
/// cpsr.set_zero_flag(true);
/// assert!(cpsr.zero_flag());
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    #[must_use]
    pub fn can_execute(self, cond: Condition) -> bool {
        cond.holds(self)
    }

    /// N => Bit 31, (0=Not Signed, 1=Signed)
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F => Bit 6, (0=Enable, 1=Disable)
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    /// T => Bit 5, (0=ARM, 1=THUMB)
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    #[must_use]
    pub const fn mode_bits(self) -> u32 {
        self.0 & 0b1_1111
    }

    /// M4-M0 => Bits 4-0
    ///
    /// Bit patterns that are not one of the seven modes bank like User mode.
    #[must_use]
    pub fn mode(self) -> Mode {
        let mode_bits = self.mode_bits();
        Mode::try_from(mode_bits).unwrap_or_else(|_| {
            tracing::debug!(
                "invalid mode bits 0b{mode_bits:05b} in PSR=0x{:08X}, banking as User",
                self.0
            );
            Mode::User
        })
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    /// Applies N, Z, C and V from an arithmetic result.
    pub fn set_flags(&mut self, op_result: ArithmeticOpResult) {
        self.set_carry_flag(op_result.carry);
        self.set_zero_flag(op_result.zero);
        self.set_sign_flag(op_result.sign);
        self.set_overflow_flag(op_result.overflow);
    }

    /// Logical results only ever touch N and Z.
    pub fn set_sign_and_zero(&mut self, result: u32) {
        self.set_sign_flag(result.get_bit(31));
        self.set_zero_flag(result == 0);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    pub fn set_state_bit(&mut self, value: bool) {
        self.0.set_bit(5, value);
    }

    pub const fn set_mode_raw(&mut self, m: u32) {
        self.0 = (self.0 & !0b1_1111) | (m & 0b1_1111);
    }

    pub const fn set_mode(&mut self, m: Mode) {
        self.set_mode_raw(m as u32);
    }

    /// Replaces the bits selected by `mask` with the ones in `value`.
    pub const fn write_masked(&mut self, value: u32, mask: u32) {
        self.0 = (self.0 & !mask) | (value & mask);
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_state_bit(state.into());
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);
        s.set_mode(m);
        s
    }
}

impl From<u32> for Psr {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

impl std::fmt::Display for Psr {
    /// `0x600000D3 ZC IF SUPERVISOR`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X} ", self.0)?;

        for (set, letter) in [
            (self.sign_flag(), 'N'),
            (self.zero_flag(), 'Z'),
            (self.carry_flag(), 'C'),
            (self.overflow_flag(), 'V'),
        ] {
            if set {
                write!(f, "{letter}")?;
            }
        }
        f.write_str(" ")?;

        for (set, letter) in [
            (self.irq_disable(), 'I'),
            (self.fiq_disable(), 'F'),
            (self.state_bit(), 'T'),
        ] {
            if set {
                write!(f, "{letter}")?;
            }
        }
        f.write_str(" ")?;

        match Mode::try_from(self.mode_bits()) {
            Ok(mode) => write!(f, "{mode}"),
            Err(_) => f.write_str("INVALID"),
        }
    }
}

/// The CPU execution state (ARM or THUMB), selected by the T bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// 16-bit instructions.
    Thumb,
    /// 32-bit instructions.
    Arm,
}

impl CpuState {
    /// Distance between the executing instruction and the value read from r15.
    #[must_use]
    pub const fn pipeline_offset(self) -> u32 {
        match self {
            Self::Arm => 8,
            Self::Thumb => 4,
        }
    }

    #[must_use]
    pub const fn instruction_size(self) -> u32 {
        match self {
            Self::Arm => 4,
            Self::Thumb => 2,
        }
    }
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}
