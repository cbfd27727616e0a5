use crate::bios::SwiError;
use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::cpu::alu::{self, ArithmeticOpResult, ShiftResult};
use crate::cpu::arm::alu_instruction::{
    AluInstructionKind, AluSecondOperandInfo, ArmModeAluInstruction, MsrOperand, PsrKind,
    PsrOpKind, ShiftOperator,
};
use crate::cpu::arm::instructions::{
    ArmModeInstruction, ArmModeMultiplyLongVariant, SingleDataTransferOffsetInfo,
};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    ReadWriteKind,
};
use crate::cpu::psr::{DEFINED_MASK, FLAGS_MASK, PRIVILEGED_MASK};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

impl<B: Bus> Arm7tdmi<B> {
    pub(crate) fn execute_arm(&mut self, op_code: ArmModeOpcode) -> Result<(), SwiError> {
        if !self.registers.cpsr.can_execute(op_code.condition) {
            return Ok(());
        }

        match op_code.instruction {
            ArmModeInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
                ..
            } => self.data_processing(alu_instruction, set_conditions, rn, destination, op2),
            ArmModeInstruction::PSRTransfer { psr_kind, kind, .. } => {
                self.psr_transfer(kind, psr_kind);
            }
            ArmModeInstruction::Multiply {
                accumulate,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
                ..
            } => self.multiply(
                accumulate,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            ),
            ArmModeInstruction::MultiplyLong {
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
                ..
            } => self.multiply_long(
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            ),
            ArmModeInstruction::SingleDataSwap {
                quantity, rn, rd, rm, ..
            } => self.single_data_swap(quantity, rn, rd, rm),
            ArmModeInstruction::BranchAndExchange { register, .. } => {
                self.branch_and_exchange(register as usize);
            }
            ArmModeInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
                ..
            } => self.half_word_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            ),
            ArmModeInstruction::SingleDataTransfer {
                kind,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
                ..
            } => self.single_data_transfer(
                kind,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            ),
            ArmModeInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
                ..
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch { link, offset, .. } => self.branch_relative(link, offset),
            ArmModeInstruction::Coprocessor { cp_number, .. } => {
                self.report_undefined(&format!("coprocessor {cp_number} not available"));
            }
            ArmModeInstruction::SoftwareInterrupt { comment, .. } => {
                return self.software_interrupt(comment);
            }
            ArmModeInstruction::Undefined { reason, .. } => {
                if reason.is_trap() {
                    self.report_undefined_trap();
                } else {
                    self.report_undefined(&reason.to_string());
                }
            }
        }

        Ok(())
    }

    /// Reads a register as an operand fetched one cycle late: r15 is 4
    /// further ahead than usual.
    fn reg_delayed_pc(&self, reg: u32) -> u32 {
        if reg as usize == REG_PROGRAM_COUNTER {
            self.pc().wrapping_add(4)
        } else {
            self.get_reg(reg as usize)
        }
    }

    fn user_reg_delayed_pc(&self, reg: u32) -> u32 {
        if reg as usize == REG_PROGRAM_COUNTER {
            self.pc().wrapping_add(4)
        } else {
            self.get_user_reg(reg as usize)
        }
    }

    fn set_user_reg_safe(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.branch(value & !0b11);
        } else {
            self.set_user_reg(reg, value);
        }
    }

    fn second_operand(&self, op2: AluSecondOperandInfo) -> ShiftResult {
        let carry = self.registers.cpsr.carry_flag();

        match op2 {
            AluSecondOperandInfo::Immediate { base, rotate } => {
                alu::rotated_immediate(base, rotate, carry)
            }
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Immediate(amount),
                shift_kind,
                register,
            } => alu::shift_by_immediate(shift_kind, amount, self.get_reg(register as usize), carry),
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(rs),
                shift_kind,
                register,
            } => {
                let amount = self.reg_delayed_pc(rs) & 0xFF;
                alu::shift_by_register(shift_kind, amount, self.reg_delayed_pc(register), carry)
            }
        }
    }

    fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    ) {
        let op1 = if op2.is_shifted_by_register() {
            self.reg_delayed_pc(rn)
        } else {
            self.get_reg(rn as usize)
        };
        let shifted = self.second_operand(op2);
        let op2 = shifted.result;
        let carry = self.registers.cpsr.carry_flag();

        let logical = |result| ArithmeticOpResult {
            result,
            ..Default::default()
        };

        let op_result = match alu_instruction {
            ArmModeAluInstruction::And | ArmModeAluInstruction::Tst => logical(op1 & op2),
            ArmModeAluInstruction::Eor | ArmModeAluInstruction::Teq => logical(op1 ^ op2),
            ArmModeAluInstruction::Orr => logical(op1 | op2),
            ArmModeAluInstruction::Mov => logical(op2),
            ArmModeAluInstruction::Bic => logical(op1 & !op2),
            ArmModeAluInstruction::Mvn => logical(!op2),
            ArmModeAluInstruction::Sub | ArmModeAluInstruction::Cmp => alu::sub(op1, op2),
            ArmModeAluInstruction::Rsb => alu::sub(op2, op1),
            ArmModeAluInstruction::Add | ArmModeAluInstruction::Cmn => alu::add(op1, op2),
            ArmModeAluInstruction::Adc => alu::adc(op1, op2, carry),
            ArmModeAluInstruction::Sbc => alu::sbc(op1, op2, carry),
            ArmModeAluInstruction::Rsc => alu::sbc(op2, op1, carry),
        };

        if set_conditions {
            match alu_instruction.kind() {
                AluInstructionKind::Logical => {
                    self.registers.cpsr.set_sign_and_zero(op_result.result);
                    self.registers.cpsr.set_carry_flag(shifted.carry);
                }
                AluInstructionKind::Arithmetic => self.registers.cpsr.set_flags(op_result),
            }
        }

        // Test instructions never write Rd, even when it is R15.
        if alu_instruction.is_test() {
            return;
        }

        let rd = destination as usize;
        if set_conditions {
            self.set_reg_safe_cpsr(rd, op_result.result);
        } else {
            self.set_reg_safe(rd, op_result.result);
        }
    }

    fn psr_transfer(&mut self, op_kind: PsrOpKind, psr_kind: PsrKind) {
        match op_kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr(),
                    PsrKind::Spsr => self.spsr(),
                };
                self.set_reg_safe(destination_register as usize, psr.into());
            }
            PsrOpKind::Msr { source_register } => {
                let value = self.get_reg(source_register as usize);
                self.write_psr(psr_kind, value, DEFINED_MASK);
            }
            PsrOpKind::MsrFlg { operand } => {
                let value = match operand {
                    MsrOperand::Register(register) => self.get_reg(register as usize),
                    MsrOperand::Immediate { base, rotate } => base.rotate_right(rotate * 2),
                };
                self.write_psr(psr_kind, value, FLAGS_MASK);
            }
        }
    }

    /// User mode may only touch the flags of the CPSR, and nobody may touch
    /// its T bit.
    fn write_psr(&mut self, psr_kind: PsrKind, value: u32, mask: u32) {
        match psr_kind {
            PsrKind::Cpsr => {
                let allowed = if self.registers.cpsr.mode().is_privileged() {
                    PRIVILEGED_MASK
                } else {
                    FLAGS_MASK
                };
                self.registers.cpsr.write_masked(value, mask & allowed);
            }
            PsrKind::Spsr => {
                let mut spsr = self.spsr();
                spsr.write_masked(value, mask);
                self.set_spsr(spsr);
            }
        }
    }

    fn multiply(
        &mut self,
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) {
        let mut value = self
            .get_reg(rm as usize)
            .wrapping_mul(self.get_reg(rs as usize));
        if accumulate {
            value = value.wrapping_add(self.get_reg(rn as usize));
        }

        if set_conditions {
            self.registers.cpsr.set_carry_flag(false);
            self.registers.cpsr.set_sign_and_zero(value);
        }

        self.set_reg_safe(rd as usize, value);
    }

    fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        set_conditions: bool,
        rdhi: u32,
        rdlo: u32,
        rs: u32,
        rm: u32,
    ) {
        let rm = self.get_reg(rm as usize);
        let rs = self.get_reg(rs as usize);

        let product = if variant.is_signed() {
            (i64::from(rm as i32) * i64::from(rs as i32)) as u64
        } else {
            u64::from(rm) * u64::from(rs)
        };

        let value = if variant.accumulates() {
            let accumulator = (u64::from(self.get_reg(rdhi as usize)) << 32)
                | u64::from(self.get_reg(rdlo as usize));
            product.wrapping_add(accumulator)
        } else {
            product
        };

        if set_conditions {
            self.registers.cpsr.set_carry_flag(false);
            self.registers.cpsr.set_sign_flag(value.get_bit(63));
            self.registers.cpsr.set_zero_flag(value == 0);
        }

        self.set_reg_safe(rdhi as usize, (value >> 32) as u32);
        self.set_reg_safe(rdlo as usize, value as u32);
    }

    fn single_data_swap(&mut self, quantity: ReadWriteKind, rn: u32, rd: u32, rm: u32) {
        let address = self.get_reg(rn as usize);
        let source = self.get_reg(rm as usize);

        // The old value is captured before the write so that Rd == Rm works.
        let old = match quantity {
            ReadWriteKind::Byte => {
                let old = self.bus.read_byte(address);
                self.bus.write_byte(address, source as u8);
                u32::from(old)
            }
            ReadWriteKind::Word => {
                let old = self.read_word_rotated(address);
                self.bus.write_word(address & !0b11, source);
                old
            }
        };

        self.set_reg_safe(rd as usize, old);
    }

    pub(crate) fn branch_and_exchange(&mut self, register: usize) {
        let target = self.get_reg(register);
        self.registers.cpsr.set_cpu_state(target.get_bit(0).into());
        self.set_reg_safe(REG_PROGRAM_COUNTER, target);
    }

    #[allow(clippy::too_many_arguments)]
    fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    ) {
        let offset = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => {
                self.get_reg(register as usize)
            }
        };

        let base = self.get_reg(base_register as usize);
        let effective = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };
        let write_back = write_back || indexing == Indexing::Post;

        match load_store_kind {
            LoadStoreKind::Store => {
                let value = self.reg_delayed_pc(source_destination_register);
                self.bus.write_half_word(address & !0b1, value as u16);

                if write_back {
                    self.set_reg_safe(base_register as usize, effective);
                }
            }
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => {
                        u32::from(self.bus.read_half_word(address & !0b1))
                    }
                    HalfwordTransferKind::SignedByte => {
                        u32::from(self.bus.read_byte(address)).sign_extended(8)
                    }
                    HalfwordTransferKind::SignedHalfwords => {
                        u32::from(self.bus.read_half_word(address & !0b1)).sign_extended(16)
                    }
                };

                // A load into the base register wins over write back.
                if write_back {
                    self.set_reg_safe(base_register as usize, effective);
                }
                self.set_reg_safe(source_destination_register as usize, value);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer(
        &mut self,
        kind: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) {
        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                alu::shift_by_immediate(
                    shift_kind,
                    shift_amount,
                    self.get_reg(reg_offset as usize),
                    self.registers.cpsr.carry_flag(),
                )
                .result
            }
        };

        let base = self.get_reg(base_register as usize);
        let effective = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };

        // Post-indexed with W set is LDRT/STRT: Rd comes from the User bank.
        let user_bank = indexing == Indexing::Post && write_back;
        let write_back = write_back || indexing == Indexing::Post;

        match kind {
            LoadStoreKind::Store => {
                let value = if user_bank {
                    self.user_reg_delayed_pc(rd)
                } else {
                    self.reg_delayed_pc(rd)
                };

                match quantity {
                    ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
                    ReadWriteKind::Word => self.bus.write_word(address & !0b11, value),
                }

                if write_back {
                    self.set_reg_safe(base_register as usize, effective);
                }
            }
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Byte => u32::from(self.bus.read_byte(address)),
                    ReadWriteKind::Word => self.read_word_rotated(address),
                };

                if write_back {
                    self.set_reg_safe(base_register as usize, effective);
                }

                if user_bank {
                    self.set_user_reg_safe(rd as usize, value);
                } else {
                    self.set_reg_safe(rd as usize, value);
                }
            }
        }
    }

    /// LDM/STM. Registers always go to ascending addresses, lowest register
    /// first, whatever the addressing mode.
    #[allow(clippy::too_many_arguments)]
    fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    ) {
        let base_register = rn as usize;
        let base = self.get_reg(base_register);
        // An empty list moves nothing and leaves the base where it is.
        let span = register_list.count_ones() * 4;

        let (start, final_base) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(span)),
            (Offsetting::Up, Indexing::Pre) => (base.wrapping_add(4), base.wrapping_add(span)),
            (Offsetting::Down, Indexing::Post) => (
                base.wrapping_sub(span).wrapping_add(4),
                base.wrapping_sub(span),
            ),
            (Offsetting::Down, Indexing::Pre) => {
                (base.wrapping_sub(span), base.wrapping_sub(span))
            }
        };

        let pc_in_list = register_list.get_bit(15);
        // With R15 in an LDM list the S bit means "restore CPSR" instead.
        let user_bank = load_psr && !(load_store == LoadStoreKind::Load && pc_in_list);
        let registers = (0..=15_u8).filter(|reg| register_list.get_bit(*reg));

        match load_store {
            LoadStoreKind::Store => {
                let lowest = register_list.trailing_zeros() as usize;
                let mut address = start;

                for reg in registers {
                    let reg = usize::from(reg);
                    let value = if reg == base_register && write_back && reg != lowest {
                        final_base
                    } else if user_bank {
                        self.user_reg_delayed_pc(reg as u32)
                    } else {
                        self.reg_delayed_pc(reg as u32)
                    };

                    self.bus.write_word(address & !0b11, value);
                    address = address.wrapping_add(4);
                }

                if write_back {
                    self.set_reg_safe(base_register, final_base);
                }
            }
            LoadStoreKind::Load => {
                if write_back {
                    self.set_reg_safe(base_register, final_base);
                }

                let mut address = start;
                let mut new_pc = None;

                for reg in registers {
                    let reg = usize::from(reg);
                    let value = self.bus.read_word(address & !0b11);
                    address = address.wrapping_add(4);

                    if reg == REG_PROGRAM_COUNTER {
                        new_pc = Some(value);
                    } else if user_bank {
                        self.set_user_reg(reg, value);
                    } else {
                        self.set_reg(reg, value);
                    }
                }

                if let Some(value) = new_pc {
                    if load_psr {
                        self.set_reg_safe_cpsr(REG_PROGRAM_COUNTER, value);
                    } else {
                        self.set_reg_safe(REG_PROGRAM_COUNTER, value);
                    }
                }
            }
        }
    }

    fn branch_relative(&mut self, link: bool, offset: i32) {
        let pc = self.pc();
        if link {
            self.set_reg(REG_LR, pc.wrapping_sub(4));
        }

        self.branch(pc.wrapping_add_signed(offset));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::{SwiError, SwiService};
    use crate::bus::FlatMemory;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::psr::{CpuState, Psr};
    use crate::cpu::registers::{REG_SP, Registers};
    use crate::cpu::trap::{TrapRecorder, TrapReport};
    use pretty_assertions::assert_eq;

    fn cpu_with(program: &[u32]) -> (Arm7tdmi<FlatMemory>, TrapRecorder) {
        let mut memory = FlatMemory::new(0, 0x1000);
        memory.load_words(0, program).unwrap();
        let recorder = TrapRecorder::default();
        let cpu = Arm7tdmi::new(memory).with_trap_sink(recorder.clone());

        (cpu, recorder)
    }

    #[test]
    fn check_adds_wraps_to_zero() {
        // ADDS R0, R1, R2
        let (mut cpu, _) = cpu_with(&[0xE091_0002]);
        cpu.set_reg(1, 0xFFFF_FFFF);
        cpu.set_reg(2, 1);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 0);
        assert!(cpu.cpsr().zero_flag());
        assert!(cpu.cpsr().carry_flag());
        assert!(!cpu.cpsr().overflow_flag());
        assert!(!cpu.cpsr().sign_flag());
    }

    #[test]
    fn check_add_without_s_keeps_flags() {
        // ADD R0, R1, R2
        let (mut cpu, _) = cpu_with(&[0xE081_0002]);
        cpu.set_reg(1, 0xFFFF_FFFF);
        cpu.set_reg(2, 1);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 0);
        assert!(!cpu.cpsr().zero_flag());
        assert!(!cpu.cpsr().carry_flag());
    }

    #[test]
    fn check_movs_sets_shifter_carry() {
        // MOVS R0, R1, LSR #1
        let (mut cpu, _) = cpu_with(&[0xE1B0_00A1]);
        cpu.set_reg(1, 3);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 1);
        assert!(cpu.cpsr().carry_flag());
        assert!(!cpu.cpsr().zero_flag());
    }

    #[test]
    fn check_movs_register_shift_amounts() {
        // MOVS R0, R1, LSR R2
        let (mut cpu, _) = cpu_with(&[0xE1B0_0231; 4]);
        cpu.set_reg(1, 0x8000_0001);

        cpu.set_reg(2, 32);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0);
        assert!(cpu.cpsr().carry_flag());
        assert!(cpu.cpsr().zero_flag());

        // Only the bottom byte of Rs counts: 0x120 is a shift by 32.
        cpu.registers.cpsr.set_carry_flag(false);
        cpu.set_reg(2, 0x120);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0);
        assert!(cpu.cpsr().carry_flag());

        cpu.set_reg(2, 33);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0);
        assert!(!cpu.cpsr().carry_flag());

        // 0x100 is a shift by zero: value and carry pass through.
        cpu.registers.cpsr.set_carry_flag(true);
        cpu.set_reg(2, 0x100);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0x8000_0001);
        assert!(cpu.cpsr().carry_flag());
        assert!(cpu.cpsr().sign_flag());
    }

    #[test]
    fn check_register_shift_reads_pc_plus_12() {
        // MOV R0, PC, LSL R2
        let (mut cpu, _) = cpu_with(&[0xE1A0_0000, 0xE1A0_021F]);
        cpu.set_reg(2, 0);

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 4 + 12);
    }

    #[test]
    fn check_teq() {
        // TEQ R12, #1
        let (mut cpu, _) = cpu_with(&[0b1110_00_1_1001_1_1100_0000_000000000001]);
        cpu.set_reg(12, 0xFFFF_FFFF);

        cpu.step().unwrap();

        assert!(cpu.cpsr().sign_flag());
        assert!(!cpu.cpsr().zero_flag());
        assert!(!cpu.cpsr().carry_flag());
        assert!(!cpu.cpsr().overflow_flag());
        assert_eq!(cpu.get_reg(0), 0);
    }

    #[test]
    fn check_cmp_sets_no_borrow_carry() {
        // CMP R3, #5
        let (mut cpu, _) = cpu_with(&[0xE353_0005, 0xE353_0005]);
        cpu.set_reg(3, 5);
        cpu.step().unwrap();
        assert!(cpu.cpsr().zero_flag());
        assert!(cpu.cpsr().carry_flag());

        cpu.set_reg(3, 4);
        cpu.step().unwrap();
        assert!(!cpu.cpsr().zero_flag());
        assert!(!cpu.cpsr().carry_flag());
        assert!(cpu.cpsr().sign_flag());
    }

    #[test]
    fn check_sbc_and_rsc_use_carry() {
        // SBC R0, R1, R2 ; RSC R3, R1, R2
        let (mut cpu, _) = cpu_with(&[0xE0C1_0002, 0xE0E1_3002]);
        cpu.set_reg(1, 10);
        cpu.set_reg(2, 3);

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 6);
        assert_eq!(cpu.get_reg(3) as i32, -8);
    }

    #[test]
    fn check_pc_operand_reads() {
        // ADD R0, PC, #0 ; ADD R1, PC, R2, LSL R3
        let (mut cpu, _) = cpu_with(&[0xE28F_0000, 0xE08F_1312]);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 8);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(1), 4 + 12);
    }

    #[test]
    fn check_mov_to_pc_branches() {
        // MOV PC, R0
        let (mut cpu, _) = cpu_with(&[0xE1A0_F000]);
        cpu.set_reg(0, 0x102);

        cpu.step().unwrap();

        assert_eq!(cpu.next_instruction_address(), 0x100);
        assert_eq!(cpu.pc(), 0x108);
    }

    #[test]
    fn check_subs_pc_restores_cpsr() {
        // SUBS PC, LR, #4
        let (mut cpu, _) = cpu_with(&[0xE25E_F004]);
        cpu.registers.cpsr.set_mode(Mode::Irq);
        cpu.set_reg(REG_LR, 0x104);
        cpu.set_spsr(Psr::from(0x4000_0010));

        cpu.step().unwrap();

        assert_eq!(cpu.cpsr().mode(), Mode::User);
        assert!(cpu.cpsr().zero_flag());
        assert!(!cpu.cpsr().irq_disable());
        assert_eq!(cpu.next_instruction_address(), 0x100);
    }

    #[test]
    fn check_psr_transfer() {
        let (mut cpu, _) = cpu_with(&[
            0xE129_F001, // MSR CPSR, R1
            0xE10F_0000, // MRS R0, CPSR
            0xE169_F00E, // MSR SPSR, R14
            0xE14F_2000, // MRS R2, SPSR
        ]);
        cpu.set_reg(1, 0xF000_003F);

        cpu.step().unwrap();
        cpu.step().unwrap();

        // T is never written by MSR.
        assert_eq!(cpu.get_reg(0), 0xF000_001F);
        assert_eq!(cpu.cpsr().mode(), Mode::System);

        // System has no SPSR, go back to Supervisor for the second half.
        cpu.registers.cpsr.set_mode(Mode::Supervisor);
        cpu.set_reg(14, 0x2000_0010);

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(2), 0x2000_0010);
    }

    #[test]
    fn check_msr_in_user_mode_only_sets_flags() {
        // MSR CPSR, R1
        let (mut cpu, _) = cpu_with(&[0xE129_F001]);
        cpu.registers.cpsr.set_mode(Mode::User);
        cpu.set_reg(1, 0xF000_001F);

        cpu.step().unwrap();

        assert_eq!(u32::from(cpu.cpsr()) & 0xF000_00FF, 0xF000_00D0);
        assert_eq!(cpu.cpsr().mode(), Mode::User);
    }

    #[test]
    fn check_msr_spsr_without_spsr_is_ignored() {
        // MSR SPSR, R0
        let (mut cpu, _) = cpu_with(&[0xE169_F000, 0xE169_F000]);
        cpu.set_reg(0, 0x8000_0011);

        for mode in [Mode::User, Mode::System] {
            cpu.registers.cpsr.set_mode(mode);
            let before = cpu.registers.clone();

            cpu.step().unwrap();

            let mut expected = before;
            expected.advance_program_counter(4);
            assert_eq!(cpu.registers, expected);
            assert_eq!(cpu.spsr(), cpu.cpsr());
        }
    }

    #[test]
    fn check_msr_flg_immediate() {
        // MSR CPSR_flg, #0xF0000000
        let (mut cpu, _) = cpu_with(&[0xE328_F20F]);

        cpu.step().unwrap();

        assert_eq!(u32::from(cpu.cpsr()), 0xF000_00D3);
    }

    #[test]
    fn check_signed_store_traps_without_mutation() {
        // STRH with S set and bits 11-8 != 0.
        let (mut cpu, recorder) = cpu_with(&[0xE1C0_12F3]);
        for reg in 0..=14 {
            cpu.set_reg(reg, 0x100 + reg as u32);
        }
        let registers_before: Registers = cpu.registers.clone();

        cpu.step().unwrap();

        assert_eq!(
            recorder.reports(),
            vec![TrapReport::Undefined(
                "cannot store sign extended byte/halfword".to_owned()
            )]
        );
        let mut expected = registers_before;
        expected.advance_program_counter(4);
        assert_eq!(cpu.registers, expected);
        assert_eq!(cpu.bus.read_word(0x100), 0);
    }

    #[test]
    fn check_reserved_encoding_traps() {
        let (mut cpu, recorder) = cpu_with(&[0xE791_0012]);
        cpu.step().unwrap();
        assert_eq!(recorder.reports(), vec![TrapReport::Trap]);
    }

    #[test]
    fn check_coprocessor_is_undefined() {
        let (mut cpu, recorder) = cpu_with(&[0xEE01_0F10]);
        cpu.step().unwrap();
        assert_eq!(
            recorder.reports(),
            vec![TrapReport::Undefined(
                "coprocessor 15 not available".to_owned()
            )]
        );
        assert_eq!(cpu.next_instruction_address(), 4);
    }

    #[test]
    fn check_condition_skips() {
        // MOVEQ R0, #1 ; MOVNV R0, #1
        let (mut cpu, recorder) = cpu_with(&[0x03A0_0001, 0xF3A0_0001]);

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 0);
        assert_eq!(cpu.next_instruction_address(), 8);
        assert!(recorder.reports().is_empty());
    }

    #[test]
    fn check_ldm_with_pc_restores_cpsr() {
        // LDMIA R0!, {R1, R2, PC}^
        let (mut cpu, _) = cpu_with(&[0xE8F0_8006]);
        cpu.bus.load_words(0x100, &[0x11, 0x22, 0x203]).unwrap();
        cpu.registers.cpsr.set_mode(Mode::Irq);
        cpu.set_spsr(Psr::from(0x6000_0010));
        cpu.set_reg(0, 0x100);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(1), 0x11);
        assert_eq!(cpu.get_reg(2), 0x22);
        assert_eq!(cpu.get_reg(0), 0x10C);
        assert_eq!(cpu.cpsr().mode(), Mode::User);
        assert!(cpu.cpsr().zero_flag());
        assert!(cpu.cpsr().carry_flag());
        assert_eq!(cpu.next_instruction_address(), 0x200);
    }

    #[test]
    fn check_ldm_user_bank() {
        // LDMIA R0, {R8, R13}^
        let (mut cpu, _) = cpu_with(&[0xE8D0_2100]);
        cpu.bus.load_words(0x100, &[0x88, 0xDD]).unwrap();
        cpu.registers.cpsr.set_mode(Mode::Fiq);
        cpu.set_reg(0, 0x100);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(8), 0);
        assert_eq!(cpu.get_reg(REG_SP), 0);
        assert_eq!(cpu.get_user_reg(8), 0x88);
        assert_eq!(cpu.get_user_reg(REG_SP), 0xDD);
        assert_eq!(cpu.get_reg(0), 0x100);
    }

    #[test]
    fn check_stm_base_in_list() {
        let (mut cpu, _) = cpu_with(&[
            0xE8A0_0003, // STMIA R0!, {R0, R1}
            0xE8A1_0003, // STMIA R1!, {R0, R1}
        ]);
        cpu.set_reg(0, 0x100);
        cpu.set_reg(1, 0x200);

        cpu.step().unwrap();
        // Lowest register: the old base is stored.
        assert_eq!(cpu.bus.read_word(0x100), 0x100);
        assert_eq!(cpu.bus.read_word(0x104), 0x200);
        assert_eq!(cpu.get_reg(0), 0x108);

        cpu.step().unwrap();
        // Not the lowest: the written back base is stored.
        assert_eq!(cpu.bus.read_word(0x200), 0x108);
        assert_eq!(cpu.bus.read_word(0x204), 0x208);
        assert_eq!(cpu.get_reg(1), 0x208);
    }

    #[test]
    fn check_ldm_base_in_list_writeback() {
        let (mut cpu, _) = cpu_with(&[
            0xE8B0_0003, // LDMIA R0!, {R0, R1}
            0xE8B3_000C, // LDMIA R3!, {R2, R3}
        ]);
        cpu.bus.load_words(0x100, &[0xAAAA, 0xBBBB]).unwrap();
        cpu.bus.load_words(0x200, &[0xCCCC, 0xDDDD]).unwrap();
        cpu.set_reg(0, 0x100);
        cpu.set_reg(3, 0x200);

        // The loaded value wins over the written back base.
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0xAAAA);
        assert_eq!(cpu.get_reg(1), 0xBBBB);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(2), 0xCCCC);
        assert_eq!(cpu.get_reg(3), 0xDDDD);
    }

    #[test]
    fn check_stmdb_and_ldmia_stack() {
        let (mut cpu, _) = cpu_with(&[
            0xE92D_4001, // STMDB R13!, {R0, R14}
            0xE8BD_0006, // LDMIA R13!, {R1, R2}
        ]);
        cpu.set_reg(REG_SP, 0x300);
        cpu.set_reg(0, 1);
        cpu.set_reg(REG_LR, 2);

        cpu.step().unwrap();
        assert_eq!(cpu.bus.read_word(0x2F8), 1);
        assert_eq!(cpu.bus.read_word(0x2FC), 2);
        assert_eq!(cpu.get_reg(REG_SP), 0x2F8);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(1), 1);
        assert_eq!(cpu.get_reg(2), 2);
        assert_eq!(cpu.get_reg(REG_SP), 0x300);
    }

    #[test]
    fn check_stmda_and_ldmib() {
        let (mut cpu, _) = cpu_with(&[
            0xE820_0006, // STMDA R0!, {R1, R2}
            0xE9B0_0018, // LDMIB R0!, {R3, R4}
        ]);
        cpu.set_reg(0, 0x108);
        cpu.set_reg(1, 0xA);
        cpu.set_reg(2, 0xB);

        cpu.step().unwrap();
        assert_eq!(cpu.bus.read_word(0x104), 0xA);
        assert_eq!(cpu.bus.read_word(0x108), 0xB);
        assert_eq!(cpu.get_reg(0), 0x100);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(3), 0xA);
        assert_eq!(cpu.get_reg(4), 0xB);
        assert_eq!(cpu.get_reg(0), 0x108);
    }

    #[test]
    fn check_ldr_unaligned_rotates() {
        // LDR R0, [R1]
        let (mut cpu, _) = cpu_with(&[0xE591_0000]);
        cpu.bus.load_words(0x100, &[0x4433_2211]).unwrap();
        cpu.set_reg(1, 0x101);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 0x1144_3322);
    }

    #[test]
    fn check_ldrb_register_offset() {
        // LDRB R5, [R1, -R12]
        let (mut cpu, _) = cpu_with(&[0b1110_0111_0101_0001_0101_0000_0000_1100]);
        cpu.bus.load_words(0x100, &[0x4433_2211]).unwrap();
        cpu.set_reg(1, 0x105);
        cpu.set_reg(12, 3);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(5), 0x33);
        assert_eq!(cpu.get_reg(1), 0x105);
    }

    #[test]
    fn check_str_post_indexed_and_pc_value() {
        let (mut cpu, _) = cpu_with(&[
            0xE481_0004, // STR R0, [R1], #0x4
            0xE581_F000, // STR PC, [R1]
        ]);
        cpu.set_reg(0, 0xCAFE);
        cpu.set_reg(1, 0x100);

        cpu.step().unwrap();
        assert_eq!(cpu.bus.read_word(0x100), 0xCAFE);
        assert_eq!(cpu.get_reg(1), 0x104);

        cpu.step().unwrap();
        // Instruction at 4, stored PC is 12 ahead.
        assert_eq!(cpu.bus.read_word(0x104), 4 + 12);
    }

    #[test]
    fn check_ldrt_uses_user_bank() {
        // LDRT R8, [R1], #4
        let (mut cpu, _) = cpu_with(&[0xE4B1_8004]);
        cpu.bus.load_words(0x100, &[0xAB]).unwrap();
        cpu.registers.cpsr.set_mode(Mode::Fiq);
        cpu.set_reg(1, 0x100);

        cpu.step().unwrap();

        assert_eq!(cpu.get_user_reg(8), 0xAB);
        assert_eq!(cpu.get_reg(8), 0);
        assert_eq!(cpu.get_reg(1), 0x104);
    }

    #[test]
    fn check_ldr_pc_branches() {
        // LDR PC, [R1]
        let (mut cpu, _) = cpu_with(&[0xE591_F000]);
        cpu.bus.load_words(0x100, &[0x400]).unwrap();
        cpu.set_reg(1, 0x100);

        cpu.step().unwrap();

        assert_eq!(cpu.next_instruction_address(), 0x400);
    }

    #[test]
    fn check_halfword_transfers() {
        let (mut cpu, _) = cpu_with(&[
            0xE191_00B2, // LDRH R0, [R1, R2]
            0xE191_30F2, // LDRSH R3, [R1, R2]
            0xE173_42D1, // LDRSB R4, [R3, #-0x21]!
            0xE0C1_50B4, // STRH R5, [R1], #4
        ]);
        cpu.bus.load_words(0x100, &[0xBEEF_1234]).unwrap();
        cpu.set_reg(1, 0x100);
        cpu.set_reg(2, 2);
        cpu.set_reg(5, 0x1_5678);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0xBEEF);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(3), 0xFFFF_BEEF);

        cpu.set_reg(3, 0x121);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(4), 0x34);
        assert_eq!(cpu.get_reg(3), 0x100);

        cpu.step().unwrap();
        assert_eq!(cpu.bus.read_word(0x100), 0xBEEF_5678);
        assert_eq!(cpu.get_reg(1), 0x104);
    }

    #[test]
    fn check_ldrsb_sign_extends() {
        // LDRSB R2, [R3, #-0x21]!
        let (mut cpu, _) = cpu_with(&[0xE173_22D1]);
        cpu.bus.load_words(0x100, &[0x80]).unwrap();
        cpu.set_reg(3, 0x121);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(2), 0xFFFF_FF80);
    }

    #[test]
    fn check_swap() {
        let (mut cpu, _) = cpu_with(&[
            0xE103_1092, // SWP R1, R2, [R3]
            0xE103_1091, // SWP R1, R1, [R3]
            0xE143_4095, // SWPB R4, R5, [R3]
        ]);
        cpu.bus.load_words(0x100, &[0x55]).unwrap();
        cpu.set_reg(2, 0x66);
        cpu.set_reg(3, 0x100);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(1), 0x55);
        assert_eq!(cpu.bus.read_word(0x100), 0x66);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(1), 0x66);
        assert_eq!(cpu.bus.read_word(0x100), 0x55);

        cpu.set_reg(5, 0x1FF);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(4), 0x55);
        assert_eq!(cpu.bus.read_word(0x100), 0xFF);
    }

    #[test]
    fn check_multiply() {
        // MLAS R1, R2, R3, R4
        let (mut cpu, _) = cpu_with(&[0xE031_4392]);
        cpu.set_reg(2, 3);
        cpu.set_reg(3, 4);
        cpu.set_reg(4, (-20_i32) as u32);
        cpu.registers.cpsr.set_carry_flag(true);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(1) as i32, -8);
        assert!(cpu.cpsr().sign_flag());
        assert!(!cpu.cpsr().zero_flag());
        assert!(!cpu.cpsr().carry_flag());
    }

    #[test]
    fn check_multiply_long() {
        let (mut cpu, _) = cpu_with(&[
            0xE0C1_0392, // SMULL R0, R1, R2, R3
            0xE081_0392, // UMULL R0, R1, R2, R3
            0xE0B1_0392, // UMLALS R0, R1, R2, R3
        ]);
        cpu.set_reg(2, (-2_i32) as u32);
        cpu.set_reg(3, 3);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0xFFFF_FFFA);
        assert_eq!(cpu.get_reg(1), 0xFFFF_FFFF);

        cpu.set_reg(2, 0xFFFF_FFFF);
        cpu.set_reg(3, 2);
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0xFFFF_FFFE);
        assert_eq!(cpu.get_reg(1), 1);

        // 0x1_FFFF_FFFE + 0x1_FFFF_FFFE
        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 0xFFFF_FFFC);
        assert_eq!(cpu.get_reg(1), 3);
        assert!(!cpu.cpsr().sign_flag());
        assert!(!cpu.cpsr().zero_flag());
    }

    #[test]
    fn check_branch_and_link() {
        let mut program = vec![0xEB00_007F]; // BL 0x1FC
        program.resize(0x81, 0);
        program[0x80] = 0xEAFF_FFFE; // B .
        let (mut cpu, _) = cpu_with(&program);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(REG_LR), 4);
        assert_eq!(cpu.next_instruction_address(), 0x204);

        cpu.branch(0x200);
        cpu.step().unwrap();
        assert_eq!(cpu.next_instruction_address(), 0x200);
    }

    #[test]
    fn check_bx_switches_state() {
        // BX R1
        let (mut cpu, _) = cpu_with(&[0xE12F_FF11]);
        cpu.set_reg(1, 0x201);

        cpu.step().unwrap();

        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Thumb);
        assert_eq!(cpu.next_instruction_address(), 0x200);
        assert_eq!(cpu.pc(), 0x204);
    }

    #[test]
    fn check_swi_calls_service() {
        // SWI 0x060000 (Div)
        let (mut cpu, _) = cpu_with(&[0xEF06_0000, 0xEF06_0000]);
        cpu.set_reg(0, 7);
        cpu.set_reg(1, 2);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 3);
        assert_eq!(cpu.get_reg(1), 1);

        cpu.set_reg(1, 0);
        assert_eq!(
            cpu.step(),
            Err(SwiError::DivisionByZero { comment: 0x06_0000 })
        );
        assert_eq!(cpu.next_instruction_address(), 8);
    }

    #[test]
    fn check_custom_swi_service() {
        struct EchoComment;

        impl SwiService for EchoComment {
            fn handle(&mut self, comment: u32, registers: &mut Registers) -> Result<(), SwiError> {
                registers.set_register_at(7, comment);
                Ok(())
            }
        }

        let (cpu, _) = cpu_with(&[0xEF12_3456]);
        let mut cpu = cpu.with_swi_service(EchoComment);

        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(7), 0x12_3456);
    }
}
