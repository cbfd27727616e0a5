//! Software interrupt services.
//!
//! The core hands every `SWI` comment field to a [`SwiService`] and waits for
//! it to return. [`BiosMath`] covers the arithmetic calls of the console BIOS
//! and is what a fresh [`Arm7tdmi`](crate::cpu::arm7tdmi::Arm7tdmi) uses.

use thiserror::Error;

use crate::cpu::psr::CpuState;
use crate::cpu::registers::Registers;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SwiError {
    #[error("SWI 0x{comment:06X}: division by zero")]
    DivisionByZero { comment: u32 },
}

pub trait SwiService {
    /// Runs the call selected by `comment` against the current registers.
    ///
    /// The comment is the raw field of the instruction: 24 bits in ARM state
    /// and 8 bits in THUMB state.
    ///
    /// # Errors
    ///
    /// A failure here stops the core, it is not an undefined instruction.
    fn handle(&mut self, comment: u32, registers: &mut Registers) -> Result<(), SwiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BiosFunction {
    Div = 0x06,
    DivArm = 0x07,
    Sqrt = 0x08,
}

impl TryFrom<u32> for BiosFunction {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x06 => Ok(Self::Div),
            0x07 => Ok(Self::DivArm),
            0x08 => Ok(Self::Sqrt),
            _ => Err(format!("BIOS function 0x{value:02X} not implemented")),
        }
    }
}

/// Division and square root BIOS calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct BiosMath;

impl BiosMath {
    /// The function number. ARM code puts it in bits 23-16 of the comment.
    fn function_number(comment: u32, state: CpuState) -> u32 {
        match state {
            CpuState::Arm => (comment >> 16) & 0xFF,
            CpuState::Thumb => comment & 0xFF,
        }
    }

    fn div(
        registers: &mut Registers,
        numerator: u32,
        denominator: u32,
        comment: u32,
    ) -> Result<(), SwiError> {
        let numerator = numerator as i32;
        let denominator = denominator as i32;
        if denominator == 0 {
            return Err(SwiError::DivisionByZero { comment });
        }

        let quotient = numerator.wrapping_div(denominator);
        registers.set_register_at(0, quotient as u32);
        registers.set_register_at(1, numerator.wrapping_rem(denominator) as u32);
        registers.set_register_at(3, quotient.unsigned_abs());

        Ok(())
    }
}

impl SwiService for BiosMath {
    fn handle(&mut self, comment: u32, registers: &mut Registers) -> Result<(), SwiError> {
        let number = Self::function_number(comment, registers.cpsr.cpu_state());

        let function = match BiosFunction::try_from(number) {
            Ok(function) => function,
            Err(e) => {
                // The BIOS doesn't range check its call number either.
                tracing::debug!("{e}, ignoring");
                return Ok(());
            }
        };

        tracing::debug!("BIOS call {function:?}");

        match function {
            BiosFunction::Div => {
                let (r0, r1) = (registers.register_at(0), registers.register_at(1));
                Self::div(registers, r0, r1, comment)
            }
            BiosFunction::DivArm => {
                let (r0, r1) = (registers.register_at(0), registers.register_at(1));
                Self::div(registers, r1, r0, comment)
            }
            BiosFunction::Sqrt => {
                let r0 = registers.register_at(0);
                registers.set_register_at(0, r0.isqrt());
                Ok(())
            }
        }
    }
}
