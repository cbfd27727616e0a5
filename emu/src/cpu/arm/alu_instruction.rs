use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl Display for ArmModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum AluInstructionKind {
    Logical,
    Arithmetic,
}

impl ArmModeAluInstruction {
    #[must_use]
    pub const fn kind(self) -> AluInstructionKind {
        match self {
            Self::And | Self::Eor | Self::Tst | Self::Teq | Self::Orr | Self::Mov | Self::Bic
            | Self::Mvn => AluInstructionKind::Logical,
            Self::Sub | Self::Rsb | Self::Add | Self::Adc | Self::Sbc | Self::Rsc | Self::Cmp
            | Self::Cmn => AluInstructionKind::Arithmetic,
        }
    }

    /// TST, TEQ, CMP and CMN only produce flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    /// Only the low nibble is looked at.
    fn from(alu_op_code: u32) -> Self {
        match alu_op_code & 0xF {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            _ => Self::Mvn,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ShiftOperator {
    Immediate(u32),
    Register(u32),
}

impl std::fmt::Display for ShiftOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "#{value}"),
            Self::Register(register) => write!(f, "R{register}"),
        }
    }
}

/// Second operand of a data processing instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: u32,
    },
    Immediate {
        base: u32,
        rotate: u32,
    },
}

impl AluSecondOperandInfo {
    /// Decodes bits 11-0. `immediate` is the I bit.
    #[must_use]
    pub fn from_operand2(immediate: bool, op2: u32) -> Self {
        if immediate {
            Self::Immediate {
                base: op2.get_bits(0..=7),
                rotate: op2.get_bits(8..=11),
            }
        } else {
            let shift_op = if op2.get_bit(4) {
                ShiftOperator::Register(op2.get_bits(8..=11))
            } else {
                ShiftOperator::Immediate(op2.get_bits(7..=11))
            };

            Self::Register {
                shift_op,
                shift_kind: op2.get_bits(5..=6).into(),
                register: op2.get_bits(0..=3),
            }
        }
    }

    /// Register-specified shifts take an extra cycle, so r15 reads 4 further.
    #[must_use]
    pub const fn is_shifted_by_register(self) -> bool {
        matches!(
            self,
            Self::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        )
    }
}

impl std::fmt::Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind,
                register,
            } => match shift_kind {
                ShiftKind::Lsl => write!(f, "R{register}"),
                ShiftKind::Ror => write!(f, "R{register}, RRX"),
                ShiftKind::Lsr | ShiftKind::Asr => write!(f, "R{register}, {shift_kind} #32"),
            },
            Self::Register {
                shift_op,
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} {shift_op}"),
            Self::Immediate { base, rotate } => {
                write!(f, "#0x{:X}", base.rotate_right(rotate * 2))
            }
        }
    }
}

/// Which status register a PSR transfer addresses (bit 22).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

impl std::fmt::Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => f.write_str("CPSR"),
            Self::Spsr => f.write_str("SPSR"),
        }
    }
}

/// Source of an MSR that only touches the flag bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MsrOperand {
    Register(u32),
    Immediate { base: u32, rotate: u32 },
}

impl std::fmt::Display for MsrOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(register) => write!(f, "R{register}"),
            Self::Immediate { base, rotate } => {
                write!(f, "#0x{:X}", base.rotate_right(rotate * 2))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PsrOpKind {
    /// Transfer PSR contents to a register.
    Mrs { destination_register: u32 },

    /// Transfer register contents to the whole PSR.
    Msr { source_register: u32 },

    /// Transfer a register or an immediate to the flag bits only.
    MsrFlg { operand: MsrOperand },
}

impl PsrOpKind {
    /// Recognises the three legal shapes of a TST/TEQ/CMP/CMN encoding with
    /// S clear. Anything else is undefined.
    #[must_use]
    pub fn decode(op_code: u32) -> Option<Self> {
        let immediate = op_code.get_bit(25);
        let bits_21_16 = op_code.get_bits(16..=21);
        let rd = op_code.get_bits(12..=15);

        if !immediate && bits_21_16 == 0b00_1111 && op_code.get_bits(0..=11) == 0 {
            Some(Self::Mrs {
                destination_register: rd,
            })
        } else if !immediate
            && bits_21_16 == 0b10_1001
            && rd == 0xF
            && op_code.get_bits(4..=11) == 0
        {
            Some(Self::Msr {
                source_register: op_code.get_bits(0..=3),
            })
        } else if bits_21_16 == 0b10_1000 && rd == 0xF {
            if immediate {
                Some(Self::MsrFlg {
                    operand: MsrOperand::Immediate {
                        base: op_code.get_bits(0..=7),
                        rotate: op_code.get_bits(8..=11),
                    },
                })
            } else if op_code.get_bits(4..=11) == 0 {
                Some(Self::MsrFlg {
                    operand: MsrOperand::Register(op_code.get_bits(0..=3)),
                })
            } else {
                None
            }
        } else {
            None
        }
    }
}
