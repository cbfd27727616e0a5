//! # ARM Instruction Decoding
//!
//! This module turns a 32-bit ARM word into an [`ArmModeInstruction`]. It does
//! not look at CPU state: the same word always decodes to the same variant.
//!
//! ## Instruction Categories
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ARM Instruction Categories                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Bits 27-25 determine the basic category:                               │
//! │                                                                         │
//! │  000 + bit7=1 bit4=1     →  Multiply, Multiply Long, SWP, LDRH/STRH...  │
//! │  000                     →  Data Processing (register operand) / PSR    │
//! │  001                     →  Data Processing (immediate operand) / MSR   │
//! │  010                     →  Load/Store (immediate offset)               │
//! │  011                     →  Load/Store (register offset), bit4=1 traps  │
//! │  100                     →  Block Data Transfer (LDM/STM)               │
//! │  101                     →  Branch (B/BL)                               │
//! │  110, 1110               →  Coprocessor (not available)                 │
//! │  1111                    →  Software Interrupt                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decoding Priority
//!
//! Inside the `000` class the encodings overlap, so they are checked in
//! this order:
//!
//! 1. Branch and Exchange (BX), an exact 24-bit pattern
//! 2. bit 7 and bit 4 set, bits 6-5 clear: Multiply, Multiply Long, SWP
//! 3. bit 7 and bit 4 set, bits 6-5 not clear: Halfword Data Transfer
//! 4. everything else: Data Processing, or PSR transfer when the opcode is
//!    TST/TEQ/CMP/CMN with S clear
//!
//! ## Instruction Encoding Example
//!
//! ```text
//! ADD R0, R1, R2, LSL #3
//!
//! 31-28  27-26  25  24-21  20  19-16  15-12  11-7   6-5  4  3-0
//! [1110] [ 00 ] [0] [0100] [0] [0001] [0000] [00011][00] [0][0010]
//!   ↑       ↑    ↑    ↑     ↑    ↑      ↑      ↑     ↑   ↑   ↑
//!   │       │    │    │     │    │      │      │     │   │   └─ Rm = R2
//!   │       │    │    │     │    │      │      │     │   └──── Shift by imm
//!   │       │    │    │     │    │      │      │     └──────── LSL
//!   │       │    │    │     │    │      │      └────────────── Shift = 3
//!   │       │    │    │     │    │      └───────────────────── Rd = R0
//!   │       │    │    │     │    └──────────────────────────── Rn = R1
//!   │       │    │    │     └───────────────────────────────── S = 0 (no flags)
//!   │       │    │    └─────────────────────────────────────── ADD opcode
//!   │       │    └──────────────────────────────────────────── Register operand
//!   │       └───────────────────────────────────────────────── Data processing
//!   └───────────────────────────────────────────────────────── Always execute
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, PsrKind, PsrOpKind, ShiftOperator,
};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    ReadWriteKind, ShiftKind,
};
use crate::cpu::registers::register_list_names;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Immediate { offset } => write!(f, "#0x{offset:X}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Immediate(shift_amount),
                shift_kind,
                register: reg_offset,
            }
            .fmt(f),
        }
    }
}

/// Why a word has no meaning.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum UndefinedReason {
    IllegalPsrTransfer,
    SignedStore,
    PostIndexedWriteBack,
    HalfwordRegisterOffset,
    MultiplyOrSwap,

    /// Bits 27-25 = 011 with bit 4 set. Reserved by the architecture, so it
    /// is raised as a trap rather than a decode diagnostic.
    Reserved,
}

impl UndefinedReason {
    #[must_use]
    pub const fn is_trap(self) -> bool {
        matches!(self, Self::Reserved)
    }
}

impl std::fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalPsrTransfer => f.write_str("Illegal psr transfer variation"),
            Self::SignedStore => f.write_str("cannot store sign extended byte/halfword"),
            Self::PostIndexedWriteBack => {
                f.write_str("post-indexed halfword transfer cannot use write back")
            }
            Self::HalfwordRegisterOffset => {
                f.write_str("halfword transfer register offset must have bits 11-8 clear")
            }
            Self::MultiplyOrSwap => f.write_str("illegal multiply or swap variation"),
            Self::Reserved => f.write_str("reserved encoding"),
        }
    }
}

/// All ARM instruction types after decoding.
///
/// ## Instruction Categories
///
/// | Variant                | Example Instructions      | Description                    |
/// |------------------------|---------------------------|--------------------------------|
/// | `DataProcessing`       | AND, ADD, CMP, MOV        | ALU operations                 |
/// | `PSRTransfer`          | MRS, MSR                  | Status register access         |
/// | `Multiply`             | MUL, MLA                  | 32-bit multiply                |
/// | `MultiplyLong`         | UMULL, SMULL              | 64-bit multiply                |
/// | `SingleDataSwap`       | SWP, SWPB                 | Atomic memory swap             |
/// | `BranchAndExchange`    | BX                        | Branch + possible ARM↔Thumb    |
/// | `HalfwordDataTransfer` | LDRH, STRH, LDRSB         | 16-bit and signed loads        |
/// | `SingleDataTransfer`   | LDR, STR, LDRB            | 32-bit and byte loads/stores   |
/// | `BlockDataTransfer`    | LDM, STM                  | Multiple register load/store   |
/// | `Branch`               | B, BL                     | Branch (and link)              |
/// | `Coprocessor`          | LDC, MCR, CDP             | Always undefined here          |
/// | `SoftwareInterrupt`    | SWI                       | BIOS call                      |
/// | `Undefined`            | -                         | Reported, never executed       |
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    PSRTransfer {
        condition: Condition,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    Multiply {
        condition: Condition,
        accumulate: bool,
        should_set_codes: bool,
        rd_destination_register: u32,
        rn_accumulate_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        condition: Condition,
        should_set_codes: bool,
        rdhi_destination_register: u32,
        rdlo_destination_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    SingleDataSwap {
        condition: Condition,
        quantity: ReadWriteKind,
        rn: u32,
        rd: u32,
        rm: u32,
    },
    BranchAndExchange {
        condition: Condition,
        register: u32,
    },
    HalfwordDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        condition: Condition,
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    },
    Branch {
        condition: Condition,
        link: bool,
        offset: i32,
    },
    Coprocessor {
        condition: Condition,
        cp_number: u32,
    },
    SoftwareInterrupt {
        condition: Condition,
        comment: u32,
    },
    Undefined {
        condition: Condition,
        reason: UndefinedReason,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl ArmModeMultiplyLongVariant {
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Smull | Self::Smlal)
    }

    #[must_use]
    pub const fn accumulates(self) -> bool {
        matches!(self, Self::Umlal | Self::Smlal)
    }
}

impl std::fmt::Display for ArmModeMultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umull => f.write_str("UMULL"),
            Self::Umlal => f.write_str("UMLAL"),
            Self::Smull => f.write_str("SMULL"),
            Self::Smlal => f.write_str("SMLAL"),
        }
    }
}

impl From<u32> for ArmModeMultiplyLongVariant {
    /// Bits 22 (signed) and 21 (accumulate).
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=22) {
            0b00 => Self::Umull,
            0b01 => Self::Umlal,
            0b10 => Self::Smull,
            _ => Self::Smlal,
        }
    }
}

impl ArmModeInstruction {
    #[must_use]
    pub const fn condition(&self) -> Condition {
        match self {
            Self::DataProcessing { condition, .. }
            | Self::PSRTransfer { condition, .. }
            | Self::Multiply { condition, .. }
            | Self::MultiplyLong { condition, .. }
            | Self::SingleDataSwap { condition, .. }
            | Self::BranchAndExchange { condition, .. }
            | Self::HalfwordDataTransfer { condition, .. }
            | Self::SingleDataTransfer { condition, .. }
            | Self::BlockDataTransfer { condition, .. }
            | Self::Branch { condition, .. }
            | Self::Coprocessor { condition, .. }
            | Self::SoftwareInterrupt { condition, .. }
            | Self::Undefined { condition, .. } => *condition,
        }
    }

    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn disassembler(&self) -> String {
        match self {
            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                let set_string = if *set_conditions { "S" } else { "" };
                match alu_instruction {
                    ArmModeAluInstruction::Tst
                    | ArmModeAluInstruction::Teq
                    | ArmModeAluInstruction::Cmp
                    | ArmModeAluInstruction::Cmn => {
                        format!("{alu_instruction}{condition} R{rn}, {op2}")
                    }
                    ArmModeAluInstruction::Mov | ArmModeAluInstruction::Mvn => {
                        format!("{alu_instruction}{condition}{set_string} R{destination}, {op2}")
                    }
                    _ => format!(
                        "{alu_instruction}{condition}{set_string} R{destination}, R{rn}, {op2}"
                    ),
                }
            }
            Self::PSRTransfer {
                condition,
                psr_kind,
                kind,
            } => match kind {
                PsrOpKind::Mrs {
                    destination_register,
                } => format!("MRS{condition} R{destination_register}, {psr_kind}"),
                PsrOpKind::Msr { source_register } => {
                    format!("MSR{condition} {psr_kind}, R{source_register}")
                }
                PsrOpKind::MsrFlg { operand } => {
                    format!("MSR{condition} {psr_kind}_flg, {operand}")
                }
            },
            Self::Multiply {
                condition,
                accumulate,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            } => {
                let s = if *should_set_codes { "S" } else { "" };
                if *accumulate {
                    format!(
                        "MLA{condition}{s} R{rd_destination_register}, R{rm_operand_register}, R{rs_operand_register}, R{rn_accumulate_register}"
                    )
                } else {
                    format!(
                        "MUL{condition}{s} R{rd_destination_register}, R{rm_operand_register}, R{rs_operand_register}"
                    )
                }
            }
            Self::MultiplyLong {
                variant,
                condition,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            } => {
                let s = if *should_set_codes { "S" } else { "" };
                format!(
                    "{variant}{condition}{s} R{rdlo_destination_register}, R{rdhi_destination_register}, R{rm_operand_register}, R{rs_operand_register}"
                )
            }
            Self::SingleDataSwap {
                condition,
                quantity,
                rn,
                rd,
                rm,
            } => {
                let b = match quantity {
                    ReadWriteKind::Word => "",
                    ReadWriteKind::Byte => "B",
                };
                format!("SWP{condition}{b} R{rd}, R{rm}, [R{rn}]")
            }
            Self::BranchAndExchange {
                condition,
                register,
            } => format!("BX{condition} R{register}"),
            Self::HalfwordDataTransfer {
                condition,
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => {
                let sign = match offsetting {
                    Offsetting::Up => "",
                    Offsetting::Down => "-",
                };

                let offset = match offset_kind {
                    HalfwordDataTransferOffsetKind::Immediate { offset: 0 } => String::new(),
                    HalfwordDataTransferOffsetKind::Immediate { offset } => {
                        format!(", #{sign}0x{offset:X}")
                    }
                    HalfwordDataTransferOffsetKind::Register { register } => {
                        format!(", {sign}R{register}")
                    }
                };

                let address = match indexing {
                    Indexing::Pre => {
                        let w = if *write_back { "!" } else { "" };
                        format!("[R{base_register}{offset}]{w}")
                    }
                    Indexing::Post => format!("[R{base_register}]{offset}"),
                };

                format!(
                    "{load_store_kind}{condition}{transfer_kind} R{source_destination_register}, {address}"
                )
            }
            Self::SingleDataTransfer {
                condition,
                kind,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => {
                let b = match quantity {
                    ReadWriteKind::Word => "",
                    ReadWriteKind::Byte => "B",
                };
                let sign = match offsetting {
                    Offsetting::Up => "",
                    Offsetting::Down => "-",
                };

                let offset = match offset_info {
                    SingleDataTransferOffsetInfo::Immediate { offset: 0 } => String::new(),
                    SingleDataTransferOffsetInfo::Immediate { offset } => {
                        format!(", #{sign}0x{offset:X}")
                    }
                    SingleDataTransferOffsetInfo::RegisterImmediate { .. } => {
                        format!(", {sign}{offset_info}")
                    }
                };

                match indexing {
                    Indexing::Pre => {
                        let w = if *write_back { "!" } else { "" };
                        format!("{kind}{condition}{b} R{rd}, [R{base_register}{offset}]{w}")
                    }
                    Indexing::Post => {
                        let t = if *write_back { "T" } else { "" };
                        format!("{kind}{condition}{b}{t} R{rd}, [R{base_register}]{offset}")
                    }
                }
            }
            Self::BlockDataTransfer {
                condition,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "STM",
                    LoadStoreKind::Load => "LDM",
                };
                let offset_modifier = match offsetting {
                    Offsetting::Down => "D",
                    Offsetting::Up => "I",
                };
                let index_type = match indexing {
                    Indexing::Pre => "B",
                    Indexing::Post => "A",
                };

                let registers = register_list_names(*register_list).join(", ");
                let w = if *write_back { "!" } else { "" };
                let f = if *load_psr { "^" } else { "" };
                format!(
                    "{op}{condition}{offset_modifier}{index_type} R{rn}{w}, {{{registers}}}{f}"
                )
            }
            Self::Branch {
                condition,
                link,
                offset,
            } => {
                let link = if *link { "L" } else { "" };
                format!("B{link}{condition} 0x{offset:08X}")
            }
            Self::Coprocessor {
                condition,
                cp_number,
            } => format!("CP{condition} p{cp_number}"),
            Self::SoftwareInterrupt { condition, comment } => {
                format!("SWI{condition} 0x{comment:06X}")
            }
            Self::Undefined { condition, reason } => format!("UND{condition} ({reason})"),
        }
    }
}

impl From<u32> for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u32) -> Self {
        let condition = Condition::from(op_code.get_bits(28..=31) as u8);
        let undefined = |reason| Self::Undefined { condition, reason };

        if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0001 {
            Self::BranchAndExchange {
                condition,
                register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(25..=27) == 0b000
            && op_code.get_bit(7)
            && op_code.get_bit(4)
            && op_code.get_bits(5..=6) == 0b00
        {
            let should_set_codes = op_code.get_bit(20);
            let rm_operand_register = op_code.get_bits(0..=3);
            let rs_operand_register = op_code.get_bits(8..=11);

            if op_code.get_bits(22..=27) == 0b00_0000 {
                Self::Multiply {
                    condition,
                    accumulate: op_code.get_bit(21),
                    should_set_codes,
                    rd_destination_register: op_code.get_bits(16..=19),
                    rn_accumulate_register: op_code.get_bits(12..=15),
                    rs_operand_register,
                    rm_operand_register,
                }
            } else if op_code.get_bits(23..=27) == 0b0_0001 {
                Self::MultiplyLong {
                    variant: ArmModeMultiplyLongVariant::from(op_code),
                    condition,
                    should_set_codes,
                    rdhi_destination_register: op_code.get_bits(16..=19),
                    rdlo_destination_register: op_code.get_bits(12..=15),
                    rs_operand_register,
                    rm_operand_register,
                }
            } else if op_code.get_bits(23..=27) == 0b0_0010
                && op_code.get_bits(20..=21) == 0b00
                && op_code.get_bits(8..=11) == 0b0000
            {
                Self::SingleDataSwap {
                    condition,
                    quantity: op_code.get_bit(22).into(),
                    rn: op_code.get_bits(16..=19),
                    rd: op_code.get_bits(12..=15),
                    rm: rm_operand_register,
                }
            } else {
                undefined(UndefinedReason::MultiplyOrSwap)
            }
        } else if op_code.get_bits(25..=27) == 0b000 && op_code.get_bit(7) && op_code.get_bit(4) {
            let indexing: Indexing = op_code.get_bit(24).into();
            let write_back = op_code.get_bit(21);
            let load_store_kind: LoadStoreKind = op_code.get_bit(20).into();
            let immediate = op_code.get_bit(22);

            // SH = 00 was handled above.
            let Some(transfer_kind) = HalfwordTransferKind::from_sh(op_code.get_bits(5..=6)) else {
                return undefined(UndefinedReason::MultiplyOrSwap);
            };

            if load_store_kind == LoadStoreKind::Store && transfer_kind.is_signed() {
                return undefined(UndefinedReason::SignedStore);
            }
            if indexing == Indexing::Post && write_back {
                return undefined(UndefinedReason::PostIndexedWriteBack);
            }
            if !immediate && op_code.get_bits(8..=11) != 0 {
                return undefined(UndefinedReason::HalfwordRegisterOffset);
            }

            let offset_kind = if immediate {
                HalfwordDataTransferOffsetKind::Immediate {
                    offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                }
            } else {
                HalfwordDataTransferOffsetKind::Register {
                    register: op_code.get_bits(0..=3),
                }
            };

            Self::HalfwordDataTransfer {
                condition,
                indexing,
                offsetting: op_code.get_bit(23).into(),
                write_back,
                load_store_kind,
                offset_kind,
                base_register: op_code.get_bits(16..=19),
                source_destination_register: op_code.get_bits(12..=15),
                transfer_kind,
            }
        } else if op_code.get_bits(26..=27) == 0b00 {
            let alu_instruction = ArmModeAluInstruction::from(op_code.get_bits(21..=24));
            let set_conditions = op_code.get_bit(20);

            // TST/TEQ/CMP/CMN without S are the PSR transfer space.
            if alu_instruction.is_test() && !set_conditions {
                return PsrOpKind::decode(op_code).map_or_else(
                    || {
                        tracing::debug!("illegal psr transfer opcode=0x{op_code:08X}");
                        undefined(UndefinedReason::IllegalPsrTransfer)
                    },
                    |kind| Self::PSRTransfer {
                        condition,
                        psr_kind: PsrKind::from(op_code.get_bit(22)),
                        kind,
                    },
                );
            }

            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
                op2: AluSecondOperandInfo::from_operand2(
                    op_code.get_bit(25),
                    op_code.get_bits(0..=11),
                ),
            }
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.get_bit(4) {
            tracing::debug!(
                "undefined instruction decode: opcode=0x{op_code:08X}, bits[25-27]=0b011, bit[4]=1"
            );
            undefined(UndefinedReason::Reserved)
        } else if op_code.get_bits(26..=27) == 0b01 {
            // The I bit has the opposite meaning than in data processing.
            let offset_info = if op_code.get_bit(25) {
                SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: op_code.get_bits(7..=11),
                    shift_kind: op_code.get_bits(5..=6).into(),
                    reg_offset: op_code.get_bits(0..=3),
                }
            } else {
                SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                }
            };

            Self::SingleDataTransfer {
                condition,
                kind: op_code.get_bit(20).into(),
                quantity: op_code.get_bit(22).into(),
                write_back: op_code.get_bit(21),
                indexing: op_code.get_bit(24).into(),
                rd: op_code.get_bits(12..=15),
                base_register: op_code.get_bits(16..=19),
                offset_info,
                offsetting: op_code.get_bit(23).into(),
            }
        } else if op_code.get_bits(25..=27) == 0b100 {
            Self::BlockDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15),
            }
        } else if op_code.get_bits(25..=27) == 0b101 {
            Self::Branch {
                condition,
                link: op_code.get_bit(24),
                offset: (op_code.get_bits(0..=23) << 2).sign_extended(26) as i32,
            }
        } else if op_code.get_bits(24..=27) == 0b1111 {
            Self::SoftwareInterrupt {
                condition,
                comment: op_code.get_bits(0..=23),
            }
        } else {
            Self::Coprocessor {
                condition,
                cp_number: op_code.get_bits(8..=11),
            }
        }
    }
}

impl std::fmt::Display for ArmModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.disassembler())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::arm::alu_instruction::MsrOperand;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        let output = ArmModeInstruction::from(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: true,
                offset: 508,
            },
            output
        );
        assert_eq!("BL 0x000001FC", output.disassembler());

        let output = ArmModeInstruction::from(0b0000_1010_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::EQ,
                link: false,
                offset: 508,
            },
            output
        );
        assert_eq!("BEQ 0x000001FC", output.disassembler());

        // B . (offset -8 lands on the instruction itself)
        let output = ArmModeInstruction::from(0xEAFF_FFFE);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: false,
                offset: -8,
            },
            output
        );
        assert_eq!("B 0xFFFFFFF8", output.disassembler());
    }

    #[test]
    fn decode_branch_and_exchange() {
        let output = ArmModeInstruction::from(0b1110_0001_0010_1111_1111_1111_0001_0001);
        assert_eq!(
            ArmModeInstruction::BranchAndExchange {
                condition: Condition::AL,
                register: 1
            },
            output
        );
        assert_eq!("BX R1", output.disassembler());

        let output = ArmModeInstruction::from(0b0000_0001_0010_1111_1111_1111_0001_0001);
        assert_eq!("BXEQ R1", output.disassembler());
    }

    #[test]
    fn decode_data_processing() {
        // ADDS R0, R1, R2
        let output = ArmModeInstruction::from(0xE091_0002);
        assert_eq!(
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: true,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(0),
                    shift_kind: ShiftKind::Lsl,
                    register: 2
                },
            },
            output
        );
        assert_eq!("ADDS R0, R1, R2", output.disassembler());

        // MOV R0, #0xFF000000
        let output = ArmModeInstruction::from(0xE3A0_04FF);
        assert_eq!("MOV R0, #0xFF000000", output.disassembler());

        // CMP R3, R4, LSR R5
        let output = ArmModeInstruction::from(0xE153_0534);
        assert_eq!("CMP R3, R4, LSR R5", output.disassembler());
    }

    #[test]
    fn decode_psr_transfer() {
        let output = ArmModeInstruction::from(0b1110_00_0_1011_0_1001_1111_000000001110);
        assert_eq!(
            ArmModeInstruction::PSRTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr {
                    source_register: 14
                }
            },
            output
        );
        assert_eq!("MSR SPSR, R14", output.disassembler());

        let output = ArmModeInstruction::from(0xE10F_0000);
        assert_eq!("MRS R0, CPSR", output.disassembler());

        let output = ArmModeInstruction::from(0xE328_F20F);
        assert_eq!(
            output,
            ArmModeInstruction::PSRTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::MsrFlg {
                    operand: MsrOperand::Immediate { base: 0xF, rotate: 2 }
                }
            }
        );
        assert_eq!("MSR CPSR_flg, #0xF0000000", output.disassembler());

        // TST without S and without a PSR shape.
        let output = ArmModeInstruction::from(0xE100_0002);
        assert_eq!(
            output,
            ArmModeInstruction::Undefined {
                condition: Condition::AL,
                reason: UndefinedReason::IllegalPsrTransfer
            }
        );
    }

    #[test]
    fn decode_multiply() {
        // MLAS R1, R2, R3, R4
        let output = ArmModeInstruction::from(0xE031_4392);
        assert_eq!(
            output,
            ArmModeInstruction::Multiply {
                condition: Condition::AL,
                accumulate: true,
                should_set_codes: true,
                rd_destination_register: 1,
                rn_accumulate_register: 4,
                rs_operand_register: 3,
                rm_operand_register: 2,
            }
        );
        assert_eq!("MLAS R1, R2, R3, R4", output.disassembler());

        // SMULL R0, R1, R2, R3
        let output = ArmModeInstruction::from(0xE0C1_0392);
        assert_eq!(
            output,
            ArmModeInstruction::MultiplyLong {
                variant: ArmModeMultiplyLongVariant::Smull,
                condition: Condition::AL,
                should_set_codes: false,
                rdhi_destination_register: 1,
                rdlo_destination_register: 0,
                rs_operand_register: 3,
                rm_operand_register: 2,
            }
        );
        assert_eq!("SMULL R0, R1, R2, R3", output.disassembler());
    }

    #[test]
    fn decode_half_word_data_transfer_immediate_offset() {
        let output = ArmModeInstruction::from(0b1110_0001_1100_0001_0000_0000_1011_0000);
        assert_eq!(
            ArmModeInstruction::HalfwordDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Store,
                offset_kind: HalfwordDataTransferOffsetKind::Immediate { offset: 0 },
                base_register: 1,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfwords,
            },
            output
        );
        assert_eq!("STRH R0, [R1]", output.disassembler());

        // LDRSB R2, [R3, #-0x21]!
        let output = ArmModeInstruction::from(0xE173_22D1);
        assert_eq!("LDRSB R2, [R3, #-0x21]!", output.disassembler());
    }

    #[test]
    fn decode_half_word_data_transfer_register_offset() {
        let output = ArmModeInstruction::from(0b1110_0001_1000_0010_0000_0000_1011_0001);
        assert_eq!(
            ArmModeInstruction::HalfwordDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Store,
                offset_kind: HalfwordDataTransferOffsetKind::Register { register: 1 },
                base_register: 2,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfwords,
            },
            output
        );
        assert_eq!("STRH R0, [R2, R1]", output.disassembler());
    }

    #[test]
    fn decode_undefined_halfword_variants() {
        // Store with S set and bits 11-8 != 0.
        assert_eq!(
            ArmModeInstruction::from(0xE1C0_01F0),
            ArmModeInstruction::Undefined {
                condition: Condition::AL,
                reason: UndefinedReason::SignedStore
            }
        );
        // Post-indexed with W set.
        assert_eq!(
            ArmModeInstruction::from(0xE0E1_00B2),
            ArmModeInstruction::Undefined {
                condition: Condition::AL,
                reason: UndefinedReason::PostIndexedWriteBack
            }
        );
        // Register offset with bits 11-8 set.
        assert_eq!(
            ArmModeInstruction::from(0xE191_01B2),
            ArmModeInstruction::Undefined {
                condition: Condition::AL,
                reason: UndefinedReason::HalfwordRegisterOffset
            }
        );
    }

    #[test]
    fn decode_single_data_transfer() {
        let output = ArmModeInstruction::from(0b11100111010100010101000000001100);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataTransfer {
                condition: Condition::AL,
                kind: LoadStoreKind::Load,
                quantity: ReadWriteKind::Byte,
                write_back: false,
                indexing: Indexing::Pre,
                rd: 5,
                base_register: 1,
                offset_info: SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: 0,
                    shift_kind: ShiftKind::Lsl,
                    reg_offset: 12
                },
                offsetting: Offsetting::Down
            }
        );
        assert_eq!("LDRB R5, [R1, -R12]", output.disassembler());

        // STR R0, [R1], #0x4
        let output = ArmModeInstruction::from(0xE481_0004);
        assert_eq!("STR R0, [R1], #0x4", output.disassembler());

        // LDRT R0, [R1], #0x4
        let output = ArmModeInstruction::from(0xE4B1_0004);
        assert_eq!("LDRT R0, [R1], #0x4", output.disassembler());
    }

    #[test]
    fn decode_reserved_register_offset_transfer() {
        assert_eq!(
            ArmModeInstruction::from(0xE791_0012),
            ArmModeInstruction::Undefined {
                condition: Condition::AL,
                reason: UndefinedReason::Reserved
            }
        );
        assert!(UndefinedReason::Reserved.is_trap());
    }

    #[test]
    fn decode_single_data_swap() {
        // SWP R1, R2, [R3]
        let output = ArmModeInstruction::from(0b1110_0001_0000_0011_0001_0000_1001_0010);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataSwap {
                condition: Condition::AL,
                quantity: ReadWriteKind::Word,
                rn: 3,
                rd: 1,
                rm: 2,
            }
        );
        assert_eq!("SWP R1, R2, [R3]", output.disassembler());

        // SWPNEB R0, R1, [R2]
        let output = ArmModeInstruction::from(0b0001_0001_0100_0010_0000_0000_1001_0001);
        assert_eq!("SWPNEB R0, R1, [R2]", output.disassembler());
    }

    #[test]
    fn decode_swap_vs_halfword_transfer() {
        let swp_opcode = 0b1110_0001_0000_0011_0001_0000_1001_0010;
        let output = ArmModeInstruction::from(swp_opcode);
        assert!(matches!(output, ArmModeInstruction::SingleDataSwap { .. }));

        let strh_opcode = 0b1110_0001_1100_0001_0000_0000_1011_0000;
        let output = ArmModeInstruction::from(strh_opcode);
        assert!(matches!(
            output,
            ArmModeInstruction::HalfwordDataTransfer { .. }
        ));
    }

    #[test]
    fn decode_block_data_transfer() {
        // LDMIA R0!, {R1, R2, PC}^
        let output = ArmModeInstruction::from(0xE8F0_8006);
        assert_eq!(
            output,
            ArmModeInstruction::BlockDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Post,
                offsetting: Offsetting::Up,
                load_psr: true,
                write_back: true,
                load_store: LoadStoreKind::Load,
                rn: 0,
                register_list: 0x8006,
            }
        );
        assert_eq!("LDMIA R0!, {R1, R2, R15}^", output.disassembler());

        // STMDB R13!, {R0, R14}
        let output = ArmModeInstruction::from(0xE92D_4001);
        assert_eq!("STMDB R13!, {R0, R14}", output.disassembler());
    }

    #[test]
    fn decode_coprocessor_and_swi() {
        let output = ArmModeInstruction::from(0xEE01_0F10);
        assert_eq!(
            output,
            ArmModeInstruction::Coprocessor {
                condition: Condition::AL,
                cp_number: 15
            }
        );

        let output = ArmModeInstruction::from(0xED90_1A00);
        assert!(matches!(output, ArmModeInstruction::Coprocessor { .. }));

        let output = ArmModeInstruction::from(0xEF06_0000);
        assert_eq!(
            output,
            ArmModeInstruction::SoftwareInterrupt {
                condition: Condition::AL,
                comment: 0x06_0000
            }
        );
        assert_eq!("SWI 0x060000", output.disassembler());
        assert_eq!("SWI 0x060000", output.to_string());
    }
}
