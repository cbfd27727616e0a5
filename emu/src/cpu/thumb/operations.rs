use crate::bios::SwiError;
use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::alu::{self, ArithmeticOpResult};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::cpu::thumb::mode::ThumbModeOpcode;

impl<B: Bus> Arm7tdmi<B> {
    #[allow(clippy::too_many_lines)]
    pub(crate) fn execute_thumb(&mut self, op_code: ThumbModeOpcode) -> Result<(), SwiError> {
        match op_code.instruction {
            ThumbModeInstruction::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => self.move_shifted_reg(
                shift_operation,
                offset5,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::AddSubtract {
                operation_kind,
                operation,
                rn_offset3,
                source_register,
                destination_register,
            } => self.add_subtract(
                operation_kind,
                operation,
                rn_offset3,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, offset),
            ThumbModeInstruction::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => self.alu_op(alu_operation, source_register, destination_register),
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => self.hi_reg_operation_branch_ex(
                register_operation,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::PCRelativeLoad {
                destination_register,
                immediate_value,
            } => self.pc_relative_load(destination_register, immediate_value),
            ThumbModeInstruction::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            } => self.load_store_register_offset(
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            ),
            ThumbModeInstruction::LoadStoreSignExtByteHalfword {
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => self.load_store_sign_extend_byte_halfword(
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            ),
            ThumbModeInstruction::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => self.load_store_immediate_offset(
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            ),
            ThumbModeInstruction::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => self.load_store_halfword(
                load_store,
                offset,
                base_register,
                source_destination_register,
            ),
            ThumbModeInstruction::SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => self.sp_relative_load_store(load_store, destination_register, word8),
            ThumbModeInstruction::LoadAddress {
                sp,
                destination_register,
                offset,
            } => self.load_address(sp, destination_register, offset),
            ThumbModeInstruction::AddOffsetSP { negative, word7 } => {
                self.add_offset_sp(negative, word7);
            }
            ThumbModeInstruction::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(load_store, pc_lr, register_list),
            ThumbModeInstruction::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.multiple_load_store(load_store, base_register, register_list),
            ThumbModeInstruction::CondBranch {
                condition,
                immediate_offset,
            } => self.cond_branch(condition, immediate_offset),
            ThumbModeInstruction::Swi { comment } => return self.software_interrupt(comment),
            ThumbModeInstruction::UncondBranch { offset } => self.uncond_branch(offset),
            ThumbModeInstruction::LongBranchLink { h, offset } => self.long_branch_link(h, offset),
            ThumbModeInstruction::Undefined { reason } => {
                if reason.is_trap() {
                    self.report_undefined_trap();
                } else {
                    self.report_undefined(&reason.to_string());
                }
            }
        }

        Ok(())
    }

    fn move_shifted_reg(&mut self, op: ShiftKind, offset5: u16, rs: u16, rd: u16) {
        let source = self.get_reg(rs.into());
        let r = alu::shift_by_immediate(
            op,
            offset5.into(),
            source,
            self.registers.cpsr.carry_flag(),
        );
        self.set_reg(rd.into(), r.result);

        self.registers.cpsr.set_carry_flag(r.carry);
        self.registers.cpsr.set_sign_and_zero(r.result);
    }

    fn add_subtract(
        &mut self,
        operation_kind: OperandKind,
        operation: Operation,
        rn_offset3: u16,
        rs: u16,
        rd: u16,
    ) {
        let rs = self.get_reg(rs.into());
        let offset = match operation_kind {
            OperandKind::Immediate => rn_offset3.into(),
            OperandKind::Register => self.get_reg(rn_offset3.into()),
        };

        let op_result = match operation {
            Operation::Sub => alu::sub(rs, offset),
            _ => alu::add(rs, offset),
        };

        self.set_reg(rd.into(), op_result.result);
        self.registers.cpsr.set_flags(op_result);
    }

    fn move_compare_add_sub_imm(&mut self, op: Operation, r_destination: u16, offset: u32) {
        let dest = r_destination.into();
        let rd_value = self.get_reg(dest);

        match op {
            Operation::Mov => {
                // The immediate is zero-extended, so N is always cleared. C is untouched.
                self.set_reg(dest, offset);
                self.registers.cpsr.set_sign_and_zero(offset);
            }
            Operation::Cmp => {
                self.registers.cpsr.set_flags(alu::sub(rd_value, offset));
            }
            Operation::Add => {
                let add_result = alu::add(rd_value, offset);
                self.set_reg(dest, add_result.result);
                self.registers.cpsr.set_flags(add_result);
            }
            Operation::Sub => {
                let sub_result = alu::sub(rd_value, offset);
                self.set_reg(dest, sub_result.result);
                self.registers.cpsr.set_flags(sub_result);
            }
        }
    }

    fn alu_op(&mut self, op: ThumbModeAluInstruction, rs: u16, rd: u16) {
        let destination = rd.into();
        let rd = self.get_reg(destination);
        let rs = self.get_reg(rs.into());
        let carry = self.registers.cpsr.carry_flag();
        let overflow = self.registers.cpsr.overflow_flag();

        // Logical results keep V.
        let logical = |result, carry| ArithmeticOpResult::new(result, carry, overflow);
        // Only the bottom byte of Rs is the shift amount. Zero keeps Rd and C.
        let shifted = |kind| {
            let r = alu::shift_by_register(kind, rs & 0xFF, rd, carry);
            logical(r.result, r.carry)
        };

        let op_result = match op {
            ThumbModeAluInstruction::And | ThumbModeAluInstruction::Tst => logical(rd & rs, carry),
            ThumbModeAluInstruction::Eor => logical(rd ^ rs, carry),
            ThumbModeAluInstruction::Lsl => shifted(ShiftKind::Lsl),
            ThumbModeAluInstruction::Lsr => shifted(ShiftKind::Lsr),
            ThumbModeAluInstruction::Asr => shifted(ShiftKind::Asr),
            ThumbModeAluInstruction::Ror => shifted(ShiftKind::Ror),
            ThumbModeAluInstruction::Adc => alu::adc(rd, rs, carry),
            ThumbModeAluInstruction::Sbc => alu::sbc(rd, rs, carry),
            ThumbModeAluInstruction::Neg => alu::sub(0, rs),
            ThumbModeAluInstruction::Cmp => alu::sub(rd, rs),
            ThumbModeAluInstruction::Cmn => alu::add(rd, rs),
            ThumbModeAluInstruction::Orr => logical(rd | rs, carry),
            ThumbModeAluInstruction::Mul => logical(rd.wrapping_mul(rs), false),
            ThumbModeAluInstruction::Bic => logical(rd & !rs, carry),
            ThumbModeAluInstruction::Mvn => logical(!rs, carry),
        };

        self.registers.cpsr.set_flags(op_result);
        if !op.is_test() {
            self.set_reg(destination, op_result.result);
        }
    }

    /// Registers are 0-15 here. Only CMP touches the flags.
    fn hi_reg_operation_branch_ex(&mut self, op: ThumbHighRegisterOperation, rs: u16, rd: u16) {
        let (rs, rd) = (usize::from(rs), usize::from(rd));
        let source = self.get_reg(rs);

        match op {
            ThumbHighRegisterOperation::Add => {
                let value = self.get_reg(rd).wrapping_add(source);
                self.set_reg_safe(rd, value);
            }
            ThumbHighRegisterOperation::Cmp => {
                let sub_result = alu::sub(self.get_reg(rd), source);
                self.registers.cpsr.set_flags(sub_result);
            }
            ThumbHighRegisterOperation::Mov => self.set_reg_safe(rd, source),
            ThumbHighRegisterOperation::Bx => self.branch_and_exchange(rs),
        }
    }

    /// Bit 1 of the PC is cleared so that the base is word aligned.
    fn word_aligned_pc(&self) -> u32 {
        self.pc() & !0b10
    }

    fn pc_relative_load(&mut self, r_destination: u16, immediate_value: u32) {
        let address = self.word_aligned_pc().wrapping_add(immediate_value);
        let value = self.bus.read_word(address);
        self.set_reg(r_destination.into(), value);
    }

    fn load_word_or_byte(&mut self, address: u32, byte_word: ReadWriteKind) -> u32 {
        match byte_word {
            ReadWriteKind::Word => self.read_word_rotated(address),
            ReadWriteKind::Byte => self.bus.read_byte(address).into(),
        }
    }

    fn store_word_or_byte(&mut self, address: u32, byte_word: ReadWriteKind, value: u32) {
        match byte_word {
            ReadWriteKind::Word => self.bus.write_word(address & !0b11, value),
            ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
        }
    }

    fn load_store_register_offset(
        &mut self,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        ro: u16,
        rb: u16,
        rd: u16,
    ) {
        let address = self
            .get_reg(rb.into())
            .wrapping_add(self.get_reg(ro.into()));

        match load_store {
            LoadStoreKind::Load => {
                let value = self.load_word_or_byte(address, byte_word);
                self.set_reg(rd.into(), value);
            }
            LoadStoreKind::Store => {
                let value = self.get_reg(rd.into());
                self.store_word_or_byte(address, byte_word, value);
            }
        }
    }

    fn load_store_sign_extend_byte_halfword(
        &mut self,
        h: bool,
        sign_extend_flag: bool,
        ro: u16,
        rb: u16,
        rd: u16,
    ) {
        let address = self
            .get_reg(rb.into())
            .wrapping_add(self.get_reg(ro.into()));
        let rd = rd.into();

        match (sign_extend_flag, h) {
            // STRH
            (false, false) => {
                let value = self.get_reg(rd) as u16;
                self.bus.write_half_word(address & !0b1, value);
            }
            // LDRH
            (false, true) => {
                let value = self.bus.read_half_word(address & !0b1);
                self.set_reg(rd, value.into());
            }
            // LDSB
            (true, false) => {
                let value = u32::from(self.bus.read_byte(address)).sign_extended(8);
                self.set_reg(rd, value);
            }
            // LDSH
            (true, true) => {
                let value = u32::from(self.bus.read_half_word(address & !0b1)).sign_extended(16);
                self.set_reg(rd, value);
            }
        }
    }

    fn load_store_immediate_offset(
        &mut self,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        rb: u16,
        rd: u16,
    ) {
        let address = self.get_reg(rb.into()).wrapping_add(offset);

        match load_store {
            LoadStoreKind::Load => {
                let value = self.load_word_or_byte(address, byte_word);
                self.set_reg(rd.into(), value);
            }
            LoadStoreKind::Store => {
                let value = self.get_reg(rd.into());
                self.store_word_or_byte(address, byte_word, value);
            }
        }
    }

    fn load_store_halfword(&mut self, load_store: LoadStoreKind, offset: u32, rb: u16, rd: u16) {
        let address = self.get_reg(rb.into()).wrapping_add(offset) & !0b1;

        match load_store {
            LoadStoreKind::Load => {
                let value = self.bus.read_half_word(address);
                self.set_reg(rd.into(), value.into());
            }
            LoadStoreKind::Store => {
                let value = self.get_reg(rd.into()) as u16;
                self.bus.write_half_word(address, value);
            }
        }
    }

    fn sp_relative_load_store(&mut self, load_store: LoadStoreKind, rd: u16, word8: u32) {
        let address = self.get_reg(REG_SP).wrapping_add(word8);

        match load_store {
            LoadStoreKind::Load => {
                let value = self.read_word_rotated(address);
                self.set_reg(rd.into(), value);
            }
            LoadStoreKind::Store => {
                let value = self.get_reg(rd.into());
                self.bus.write_word(address & !0b11, value);
            }
        }
    }

    fn load_address(&mut self, sp: bool, rd: u16, offset: u32) {
        let base = if sp {
            self.get_reg(REG_SP)
        } else {
            self.word_aligned_pc()
        };
        self.set_reg(rd.into(), base.wrapping_add(offset));
    }

    fn add_offset_sp(&mut self, negative: bool, word7: u32) {
        let sp = self.get_reg(REG_SP);
        let sp = if negative {
            sp.wrapping_sub(word7)
        } else {
            sp.wrapping_add(word7)
        };
        self.set_reg(REG_SP, sp);
    }

    /// PUSH is a full descending store: LR, when present, ends up at the
    /// highest address.
    fn push_pop_register(&mut self, load_store: LoadStoreKind, pc_lr: bool, register_list: u16) {
        let registers = (0..=7_u8).filter(|reg| register_list.get_bit(*reg));
        let sp = self.get_reg(REG_SP);

        match load_store {
            LoadStoreKind::Store => {
                let count = register_list.count_ones() + u32::from(pc_lr);
                let new_sp = sp.wrapping_sub(count * 4);
                let mut address = new_sp;

                for reg in registers {
                    let value = self.get_reg(reg.into());
                    self.bus.write_word(address & !0b11, value);
                    address = address.wrapping_add(4);
                }
                if pc_lr {
                    let value = self.get_reg(REG_LR);
                    self.bus.write_word(address & !0b11, value);
                }

                self.set_reg(REG_SP, new_sp);
            }
            LoadStoreKind::Load => {
                let mut address = sp;

                for reg in registers {
                    let value = self.bus.read_word(address & !0b11);
                    self.set_reg(reg.into(), value);
                    address = address.wrapping_add(4);
                }

                let new_pc = pc_lr.then(|| {
                    let value = self.bus.read_word(address & !0b11);
                    address = address.wrapping_add(4);
                    value
                });

                self.set_reg(REG_SP, address);
                if let Some(value) = new_pc {
                    self.set_reg_safe(REG_PROGRAM_COUNTER, value);
                }
            }
        }
    }

    /// STMIA/LDMIA with write back. A base register in the list follows the
    /// same rules as the ARM block transfer.
    fn multiple_load_store(&mut self, load_store: LoadStoreKind, rb: u16, register_list: u16) {
        let base_register = usize::from(rb);
        let base = self.get_reg(base_register);
        // An empty list moves nothing and leaves the base where it is.
        let final_base = base.wrapping_add(register_list.count_ones() * 4);
        let registers = (0..=7_u8).filter(|reg| register_list.get_bit(*reg));
        let mut address = base;

        match load_store {
            LoadStoreKind::Store => {
                let lowest = register_list.trailing_zeros() as usize;

                for reg in registers {
                    let reg = usize::from(reg);
                    let value = if reg == base_register && reg != lowest {
                        final_base
                    } else {
                        self.get_reg(reg)
                    };
                    self.bus.write_word(address & !0b11, value);
                    address = address.wrapping_add(4);
                }

                self.set_reg(base_register, final_base);
            }
            LoadStoreKind::Load => {
                self.set_reg(base_register, final_base);

                for reg in registers {
                    let value = self.bus.read_word(address & !0b11);
                    self.set_reg(reg.into(), value);
                    address = address.wrapping_add(4);
                }
            }
        }
    }

    fn cond_branch(&mut self, condition: Condition, immediate_offset: i32) {
        if self.registers.cpsr.can_execute(condition) {
            self.branch(self.pc().wrapping_add_signed(immediate_offset));
        }
    }

    fn uncond_branch(&mut self, offset: i32) {
        self.branch(self.pc().wrapping_add_signed(offset));
    }

    /// First half: LR = PC + (offset << 12), sign extended.
    /// Second half: branch to LR + (offset << 1), LR = next instruction | 1.
    fn long_branch_link(&mut self, h: bool, offset: u32) {
        let pc = self.pc();

        if h {
            let target = self.get_reg(REG_LR).wrapping_add(offset << 1);
            self.set_reg(REG_LR, pc.wrapping_sub(2) | 1);
            self.branch(target & !0b1);
        } else {
            let high = (offset << 12).sign_extended(23);
            self.set_reg(REG_LR, pc.wrapping_add(high));
        }
    }
}
