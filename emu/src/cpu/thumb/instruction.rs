//! # THUMB Instruction Decoding
//!
//! This module decodes 16-bit THUMB instructions. Bits 15-11 select one of
//! 32 groups, which map onto the 19 instruction formats:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    THUMB Instruction Formats                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Format 1:  000 xx          Move shifted register                      │
//! │  Format 2:  00011           Add/subtract                               │
//! │  Format 3:  001 xx          Move/compare/add/subtract immediate        │
//! │  Format 4:  010000          ALU operations                             │
//! │  Format 5:  010001          Hi register operations / BX                │
//! │  Format 6:  01001           PC-relative load                           │
//! │  Format 7:  0101 xx0        Load/store with register offset            │
//! │  Format 8:  0101 xx1        Load/store sign-extended byte/halfword     │
//! │  Format 9:  011 xx          Load/store with immediate offset           │
//! │  Format 10: 1000 x          Load/store halfword                        │
//! │  Format 11: 1001 x          SP-relative load/store                     │
//! │  Format 12: 1010 x          Load address                               │
//! │  Format 13: 10110000        Add offset to stack pointer                │
//! │  Format 14: 1011 x10x       Push/pop registers                         │
//! │  Format 15: 1100 x          Multiple load/store                        │
//! │  Format 16: 1101 xxxx       Conditional branch                         │
//! │  Format 17: 11011111        Software interrupt                         │
//! │  Format 18: 11100           Unconditional branch                       │
//! │  Format 19: 1111 x          Long branch with link                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Group `11101` and the holes inside the `1011` group have no meaning on the
//! ARM7TDMI and decode to [`ThumbModeInstruction::Undefined`].
//!
//! ## Register Restrictions
//!
//! Most THUMB instructions can only access R0-R7. To access R8-R15:
//! - Format 5 (Hi register ops): ADD, CMP, MOV with high registers
//! - BX: Can branch to any register
//! - PUSH/POP: Can include LR/PC via special bit
//!
//! ## Long Branch (BL)
//!
//! The BL instruction spans ±4MB but requires two 16-bit instructions:
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = old_PC | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};

/// Why a halfword has no meaning.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ThumbUndefinedReason {
    /// ADD, CMP or MOV in format 5 with both H1 and H2 clear.
    LowRegisterOperands,

    /// BX with H1 set.
    BranchExchangeH1,

    /// Conditional branch with condition 14. The encoding is reserved, so it
    /// is raised as a trap rather than a decode diagnostic.
    ReservedCondition,

    /// Unallocated encoding space.
    Unallocated,
}

impl ThumbUndefinedReason {
    #[must_use]
    pub const fn is_trap(self) -> bool {
        matches!(self, Self::ReservedCondition)
    }
}

impl std::fmt::Display for ThumbUndefinedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowRegisterOperands => {
                f.write_str("hi register operation needs at least one high register")
            }
            Self::BranchExchangeH1 => f.write_str("BX with H1 set"),
            Self::ReservedCondition => f.write_str("conditional branch with condition AL"),
            Self::Unallocated => f.write_str("unallocated THUMB encoding"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeInstruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u16,
        source_register: u16,
        destination_register: u16,
    },
    AddSubtract {
        operation_kind: OperandKind,
        /// Either [`Operation::Add`] or [`Operation::Sub`].
        operation: Operation,
        rn_offset3: u16,
        source_register: u16,
        destination_register: u16,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: u16,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
        source_register: u16,
        destination_register: u16,
    },
    /// Registers are already widened with H1/H2 (0-15).
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        source_register: u16,
        destination_register: u16,
    },
    PCRelativeLoad {
        destination_register: u16,
        immediate_value: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        ro: u16,
        base_register: u16,
        destination_register: u16,
    },
    LoadStoreSignExtByteHalfword {
        h: bool,
        sign_extend_flag: bool,
        offset_register: u16,
        base_register: u16,
        destination_register: u16,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        base_register: u16,
        destination_register: u16,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        base_register: u16,
        source_destination_register: u16,
    },
    SPRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: u16,
        word8: u32,
    },
    LoadAddress {
        sp: bool,
        destination_register: u16,
        offset: u32,
    },
    AddOffsetSP {
        negative: bool,
        word7: u32,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        /// LR for PUSH, PC for POP.
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: u16,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        immediate_offset: i32,
    },
    Swi {
        comment: u32,
    },
    UncondBranch {
        offset: i32,
    },
    LongBranchLink {
        h: bool,
        offset: u32,
    },
    Undefined {
        reason: ThumbUndefinedReason,
    },
}

impl From<u16> for ThumbModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u16) -> Self {
        use ThumbModeInstruction::{
            AddOffsetSP, AddSubtract, AluOp, CondBranch, HiRegisterOpBX, LoadAddress,
            LoadStoreHalfword, LoadStoreImmOffset, LoadStoreRegisterOffset,
            LoadStoreSignExtByteHalfword, LongBranchLink, MoveCompareAddSubtractImm,
            MoveShiftedRegister, MultipleLoadStore, PCRelativeLoad, PushPopReg,
            SPRelativeLoadStore, Swi, UncondBranch, Undefined,
        };

        let undefined = |reason| Undefined { reason };

        match op_code.get_bits(11..=15) {
            0x00..=0x02 => MoveShiftedRegister {
                shift_operation: op_code.get_bits(11..=12).into(),
                offset5: op_code.get_bits(6..=10),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            },
            0x03 => AddSubtract {
                operation_kind: op_code.get_bit(10).into(),
                operation: if op_code.get_bit(9) {
                    Operation::Sub
                } else {
                    Operation::Add
                },
                rn_offset3: op_code.get_bits(6..=8),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            },
            0x04..=0x07 => MoveCompareAddSubtractImm {
                operation: op_code.get_bits(11..=12).into(),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7).into(),
            },
            0x08 if !op_code.get_bit(10) => AluOp {
                alu_operation: op_code.get_bits(6..=9).into(),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            },
            0x08 => {
                let register_operation: ThumbHighRegisterOperation = op_code.get_bits(8..=9).into();
                let h1 = op_code.get_bit(7);
                let h2 = op_code.get_bit(6);

                match register_operation {
                    ThumbHighRegisterOperation::Bx if h1 => {
                        return undefined(ThumbUndefinedReason::BranchExchangeH1);
                    }
                    ThumbHighRegisterOperation::Bx => {}
                    _ if !h1 && !h2 => {
                        return undefined(ThumbUndefinedReason::LowRegisterOperands);
                    }
                    _ => {}
                }

                let rd_hd = op_code.get_bits(0..=2);
                HiRegisterOpBX {
                    register_operation,
                    source_register: op_code.get_bits(3..=6),
                    destination_register: if h1 { rd_hd | (1 << 3) } else { rd_hd },
                }
            }
            0x09 => PCRelativeLoad {
                destination_register: op_code.get_bits(8..=10),
                // The assembler places #Imm >> 2 in the Word8 field.
                immediate_value: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            0x0A | 0x0B if !op_code.get_bit(9) => LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(10).into(),
                ro: op_code.get_bits(6..=8),
                base_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            },
            0x0A | 0x0B => LoadStoreSignExtByteHalfword {
                h: op_code.get_bit(11),
                sign_extend_flag: op_code.get_bit(10),
                offset_register: op_code.get_bits(6..=8),
                base_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            },
            0x0C..=0x0F => {
                let byte_word: ReadWriteKind = op_code.get_bit(12).into();
                let offset = u32::from(op_code.get_bits(6..=10));
                let offset = match byte_word {
                    // Word offsets are stored >> 2.
                    ReadWriteKind::Word => offset << 2,
                    ReadWriteKind::Byte => offset,
                };

                LoadStoreImmOffset {
                    load_store: op_code.get_bit(11).into(),
                    byte_word,
                    offset,
                    base_register: op_code.get_bits(3..=5),
                    destination_register: op_code.get_bits(0..=2),
                }
            }
            0x10 | 0x11 => LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: u32::from(op_code.get_bits(6..=10)) << 1,
                base_register: op_code.get_bits(3..=5),
                source_destination_register: op_code.get_bits(0..=2),
            },
            0x12 | 0x13 => SPRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                destination_register: op_code.get_bits(8..=10),
                word8: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            0x14 | 0x15 => LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: op_code.get_bits(8..=10),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            0x16 if op_code.get_bits(8..=10) == 0 => AddOffsetSP {
                negative: op_code.get_bit(7),
                word7: u32::from(op_code.get_bits(0..=6)) << 2,
            },
            0x16 | 0x17 if op_code.get_bits(9..=10) == 0b10 => PushPopReg {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            },
            0x16 | 0x17 => undefined(ThumbUndefinedReason::Unallocated),
            0x18 | 0x19 => MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                base_register: op_code.get_bits(8..=10),
                register_list: op_code.get_bits(0..=7),
            },
            0x1A | 0x1B => match op_code.get_bits(8..=11) {
                0xF => Swi {
                    comment: op_code.get_bits(0..=7).into(),
                },
                0xE => undefined(ThumbUndefinedReason::ReservedCondition),
                condition => CondBranch {
                    condition: Condition::from(condition as u8),
                    immediate_offset: (u32::from(op_code.get_bits(0..=7)) << 1).sign_extended(9)
                        as i32,
                },
            },
            0x1C => UncondBranch {
                offset: (u32::from(op_code.get_bits(0..=10)) << 1).sign_extended(12) as i32,
            },
            0x1E | 0x1F => LongBranchLink {
                h: op_code.get_bit(11),
                offset: op_code.get_bits(0..=10).into(),
            },
            _ => undefined(ThumbUndefinedReason::Unallocated),
        }
    }
}

impl std::fmt::Display for ThumbModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.disassembler())
    }
}

fn low_register_names(list: u16) -> Vec<String> {
    (0..=7)
        .filter(|i| list.get_bit(*i))
        .map(|i| format!("R{i}"))
        .collect()
}

impl ThumbModeInstruction {
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn disassembler(&self) -> String {
        match self {
            Self::MoveShiftedRegister {
                shift_operation: op,
                offset5,
                source_register,
                destination_register,
            } => {
                format!("{op} R{destination_register}, R{source_register}, #{offset5}")
            }
            Self::AddSubtract {
                operation_kind,
                operation,
                rn_offset3,
                source_register: rs,
                destination_register: rd,
            } => {
                let rr = match operation_kind {
                    OperandKind::Immediate => format!("#{rn_offset3}"),
                    OperandKind::Register => format!("R{rn_offset3}"),
                };

                format!("{operation} R{rd}, R{rs}, {rr}")
            }
            Self::MoveCompareAddSubtractImm {
                operation: op,
                destination_register: r_destination,
                offset,
            } => {
                format!("{op} R{r_destination}, #{offset}")
            }
            Self::AluOp {
                alu_operation: op,
                source_register: rs,
                destination_register: rd,
            } => {
                format!("{op} R{rd}, R{rs}")
            }
            Self::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::Bx,
                source_register,
                ..
            } => format!("BX R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation: op,
                source_register,
                destination_register,
            } => {
                format!("{op} R{destination_register}, R{source_register}")
            }
            Self::PCRelativeLoad {
                destination_register: r_destination,
                immediate_value,
            } => {
                format!("LDR R{r_destination}, [PC, #{immediate_value}]")
            }
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register: rb,
                destination_register: rd,
            } => {
                let instr = match (load_store, byte_word) {
                    (LoadStoreKind::Load, ReadWriteKind::Byte) => "LDRB",
                    (LoadStoreKind::Load, ReadWriteKind::Word) => "LDR",
                    (LoadStoreKind::Store, ReadWriteKind::Byte) => "STRB",
                    (LoadStoreKind::Store, ReadWriteKind::Word) => "STR",
                };
                format!("{instr} R{rd}, [R{rb}, R{ro}]")
            }
            Self::LoadStoreSignExtByteHalfword {
                h: h_flag,
                sign_extend_flag,
                offset_register: r_offset,
                base_register: r_base,
                destination_register: r_destination,
            } => {
                let instr = match (sign_extend_flag, h_flag) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                };

                format!("{instr} R{r_destination}, [R{r_base}, R{r_offset}]")
            }
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register: rb,
                destination_register: rd,
            } => {
                let instr = match (load_store, byte_word) {
                    (LoadStoreKind::Load, ReadWriteKind::Byte) => "LDRB",
                    (LoadStoreKind::Load, ReadWriteKind::Word) => "LDR",
                    (LoadStoreKind::Store, ReadWriteKind::Byte) => "STRB",
                    (LoadStoreKind::Store, ReadWriteKind::Word) => "STR",
                };
                format!("{instr} R{rd}, [R{rb}, #{offset}]")
            }
            Self::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => {
                format!("{load_store}H R{source_destination_register}, [R{base_register}, #{offset}]")
            }
            Self::SPRelativeLoadStore {
                load_store,
                destination_register: r_destination,
                word8,
            } => {
                format!("{load_store} R{r_destination}, [SP, #{word8}]")
            }
            Self::LoadAddress {
                sp,
                destination_register: r_destination,
                offset,
            } => {
                let source = if *sp { "SP" } else { "PC" };
                format!("ADD R{r_destination}, {source}, #{offset}")
            }
            Self::AddOffsetSP { negative, word7 } => {
                let op = if *negative { "SUB" } else { "ADD" };
                format!("{op} SP, #{word7}")
            }
            Self::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => {
                let (instr, extra) = match load_store {
                    LoadStoreKind::Load => ("POP", "PC"),
                    LoadStoreKind::Store => ("PUSH", "LR"),
                };

                let mut regs = low_register_names(*register_list);
                if *pc_lr {
                    regs.push(extra.to_owned());
                }
                let registers = regs.join(", ");
                format!("{instr} {{{registers}}}")
            }
            Self::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => {
                let instr = match load_store {
                    LoadStoreKind::Load => "LDMIA",
                    LoadStoreKind::Store => "STMIA",
                };

                let registers = low_register_names(*register_list).join(", ");
                format!("{instr} R{base_register}!, {{{registers}}}")
            }
            Self::CondBranch {
                condition,
                immediate_offset,
            } => {
                format!("B{condition} #{immediate_offset}")
            }
            Self::Swi { comment } => format!("SWI 0x{comment:02X}"),
            Self::UncondBranch { offset } => {
                format!("B #{offset}")
            }
            Self::LongBranchLink { h: false, offset } => {
                let offset = (offset << 12).sign_extended(23) as i32;
                format!("BL #{offset}")
            }
            Self::LongBranchLink { h: true, offset } => {
                let offset = offset << 1;
                format!("BLH #{offset}")
            }
            Self::Undefined { reason } => format!("UNDEFINED ({reason})"),
        }
    }
}
