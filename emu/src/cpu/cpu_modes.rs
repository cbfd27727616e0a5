//! # Operating Modes and Register Banking
//!
//! ```text
//! ┌────────────┬────────┬────────────┬──────────────┬──────┐
//! │ Mode       │ Bits   │ r8-r12     │ r13-r14      │ SPSR │
//! ├────────────┼────────┼────────────┼──────────────┼──────┤
//! │ User       │ 10000  │ 0 (shared) │ 0 (shared)   │  -   │
//! │ FIQ        │ 10001  │ 1          │ 1            │  0   │
//! │ IRQ        │ 10010  │ 0          │ 2            │  1   │
//! │ Supervisor │ 10011  │ 0          │ 3            │  2   │
//! │ Abort      │ 10111  │ 0          │ 4            │  3   │
//! │ Undefined  │ 11011  │ 0          │ 5            │  4   │
//! │ System     │ 11111  │ 0 (shared) │ 0 (shared)   │  -   │
//! └────────────┴────────┴────────────┴──────────────┴──────┘
//! ```
//!
//! The bank indexes are looked up from the low nibble of the mode bits, so
//! switching mode only redirects which slot is visible and never copies.

use serde::{Deserialize, Serialize};

/// Bank index for r13/r14, indexed by `mode & 0xF`.
const R13_R14_MAP: [usize; 16] = [0, 1, 2, 3, 0, 0, 0, 4, 0, 0, 0, 5, 0, 0, 0, 0];

/// Bank index for r8-r12, indexed by `mode & 0xF`. Only FIQ has its own copy.
const R8_TO_R12_MAP: [usize; 16] = [0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

impl Mode {
    /// Which copy of r8-r12 is visible in this mode.
    #[must_use]
    pub const fn r8_to_r12_bank(self) -> usize {
        R8_TO_R12_MAP[self as usize & 0xF]
    }

    /// Which copy of r13 (SP) and r14 (LR) is visible in this mode.
    #[must_use]
    pub const fn r13_r14_bank(self) -> usize {
        R13_R14_MAP[self as usize & 0xF]
    }

    /// Slot of the saved PSR owned by this mode. User and System have none.
    #[must_use]
    pub const fn spsr_slot(self) -> Option<usize> {
        match self.r13_r14_bank() {
            0 => None,
            bank => Some(bank - 1),
        }
    }

    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(format!("unexpected value for mode: 0b{n:05b}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("USER"),
            Self::Fiq => f.write_str("FIQ"),
            Self::Irq => f.write_str("IRQ"),
            Self::Supervisor => f.write_str("SUPERVISOR"),
            Self::Abort => f.write_str("ABORT"),
            Self::Undefined => f.write_str("UNDEFINED"),
            Self::System => f.write_str("SYSTEM"),
        }
    }
}
