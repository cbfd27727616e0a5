//! # ARM7TDMI Facade
//!
//! [`Arm7tdmi`] owns the register file and a bus, and runs one instruction
//! per [`step`](Arm7tdmi::step):
//!
//! ```text
//!   fetch(r15 - offset) ──► decode ──► condition? ──► execute
//!                                                       │
//!               branched? ◄─────────────────────────────┘
//!               no: r15 += instruction size
//! ```
//!
//! ## Program counter model
//!
//! While an instruction executes, r15 holds its address plus 8 (ARM) or
//! plus 4 (THUMB), which is the value an operand read of r15 observes.
//! Every control-flow change goes through [`Arm7tdmi::branch`], which keeps
//! that invariant for the instruction at the target.

use crate::bios::{BiosMath, SwiError, SwiService};
use crate::bus::Bus;
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::psr::{CpuState, DEFINED_MASK, Psr};
use crate::cpu::registers::{REG_PROGRAM_COUNTER, Registers};
use crate::cpu::thumb::mode::ThumbModeOpcode;
use crate::cpu::trap::{TracingTrapSink, TrapSink};

pub struct Arm7tdmi<B: Bus> {
    pub bus: B,
    pub registers: Registers,

    swi_service: Box<dyn SwiService>,
    trap_sink: Box<dyn TrapSink>,

    /// Set by [`Self::branch`] so that `step` does not advance r15 past the
    /// target.
    branched: bool,
}

impl<B: Bus> Arm7tdmi<B> {
    /// Reset state: Supervisor mode, interrupts masked, ARM state at 0.
    pub fn new(bus: B) -> Self {
        let mut cpu = Self {
            bus,
            registers: Registers::default(),
            swi_service: Box::new(BiosMath),
            trap_sink: Box::new(TracingTrapSink),
            branched: false,
        };
        cpu.reset_to(0, CpuState::Arm);

        cpu
    }

    #[must_use]
    pub fn with_swi_service(mut self, service: impl SwiService + 'static) -> Self {
        self.swi_service = Box::new(service);
        self
    }

    #[must_use]
    pub fn with_trap_sink(mut self, sink: impl TrapSink + 'static) -> Self {
        self.trap_sink = Box::new(sink);
        self
    }

    /// Positions execution at `entry` in the given instruction set. Mode and
    /// registers other than r15 are left alone.
    pub fn reset_to(&mut self, entry: u32, state: CpuState) {
        self.registers.cpsr.set_cpu_state(state);
        let entry = match state {
            CpuState::Arm => entry & !0b11,
            CpuState::Thumb => entry & !0b1,
        };
        self.branch(entry);
        self.branched = false;
    }

    #[must_use]
    pub fn get_reg(&self, reg: usize) -> u32 {
        self.registers.register_at(reg)
    }

    /// Raw write. A write to r15 here does not count as a branch, use
    /// [`Self::set_reg_safe`] for results of instructions.
    pub fn set_reg(&mut self, reg: usize, value: u32) {
        self.registers.set_register_at(reg, value);
    }

    /// Writes an instruction result. r15 becomes a branch to `value` aligned
    /// for the current instruction set.
    pub fn set_reg_safe(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            let target = match self.registers.cpsr.cpu_state() {
                CpuState::Arm => value & !0b11,
                CpuState::Thumb => value & !0b1,
            };
            self.branch(target);
        } else {
            self.registers.set_register_at(reg, value);
        }
    }

    /// Like [`Self::set_reg_safe`], but a write to r15 first restores the
    /// CPSR from the SPSR of the current mode (exception return).
    pub fn set_reg_safe_cpsr(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.load_cpsr_from_spsr();
        }
        self.set_reg_safe(reg, value);
    }

    #[must_use]
    pub fn get_user_reg(&self, reg: usize) -> u32 {
        self.registers.user_register_at(reg)
    }

    pub fn set_user_reg(&mut self, reg: usize, value: u32) {
        self.registers.set_user_register_at(reg, value);
    }

    /// The stored r15, already ahead of the executing instruction.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.registers.program_counter()
    }

    /// Address of the instruction `step` will fetch next.
    #[must_use]
    pub fn next_instruction_address(&self) -> u32 {
        self.pc()
            .wrapping_sub(self.registers.cpsr.cpu_state().pipeline_offset())
    }

    /// Continues execution at `address` in the current instruction set.
    pub fn branch(&mut self, address: u32) {
        let offset = self.registers.cpsr.cpu_state().pipeline_offset();
        self.registers
            .set_program_counter(address.wrapping_add(offset));
        self.branched = true;
    }

    #[must_use]
    pub const fn cpsr(&self) -> Psr {
        self.registers.cpsr
    }

    #[must_use]
    pub fn spsr(&self) -> Psr {
        self.registers.spsr()
    }

    pub fn set_spsr(&mut self, psr: Psr) {
        self.registers.set_spsr(psr);
    }

    /// Copies the SPSR of the current mode into the CPSR. In User and System
    /// mode there is no SPSR and nothing changes.
    pub fn load_cpsr_from_spsr(&mut self) {
        let spsr = self.registers.spsr();
        self.registers
            .cpsr
            .write_masked(spsr.into(), DEFINED_MASK);
    }

    /// Word load as the ARM7TDMI does it: the aligned word is read and
    /// rotated so that the addressed byte ends up in bits 7-0.
    pub(crate) fn read_word_rotated(&mut self, address: u32) -> u32 {
        self.bus
            .read_word(address & !0b11)
            .rotate_right(8 * (address & 0b11))
    }

    pub(crate) fn report_undefined(&mut self, diagnostic: &str) {
        self.trap_sink.report_undefined(diagnostic);
    }

    pub(crate) fn report_undefined_trap(&mut self) {
        self.trap_sink.report_undefined_trap();
    }

    pub(crate) fn software_interrupt(&mut self, comment: u32) -> Result<(), SwiError> {
        self.swi_service.handle(comment, &mut self.registers)
    }

    /// Executes one instruction.
    ///
    /// # Errors
    ///
    /// Fails only when the SWI service does. The instruction has been
    /// consumed and r15 points past it.
    pub fn step(&mut self) -> Result<(), SwiError> {
        let state = self.registers.cpsr.cpu_state();
        let address = self.next_instruction_address();
        self.branched = false;

        let result = match state {
            CpuState::Arm => {
                let op_code = ArmModeOpcode::from(self.bus.fetch_arm(address));
                tracing::trace!(
                    "0x{address:08X}: 0x{:08X} {}",
                    op_code.raw,
                    op_code.instruction
                );
                self.execute_arm(op_code)
            }
            CpuState::Thumb => {
                let op_code = ThumbModeOpcode::from(self.bus.fetch_thumb(address));
                tracing::trace!(
                    "0x{address:08X}: 0x{:04X} {}",
                    op_code.raw,
                    op_code.instruction
                );
                self.execute_thumb(op_code)
            }
        };

        if !self.branched {
            self.registers
                .advance_program_counter(state.instruction_size());
        }

        result
    }

    /// r0-r15 of the current mode followed by CPSR and SPSR.
    #[must_use]
    pub fn register_dump(&self) -> String {
        let mut dump = String::new();
        for (index, value) in self.registers.to_vec().iter().enumerate() {
            dump.push_str(&format!("R{index:<2} = 0x{value:08X}"));
            dump.push(if index % 4 == 3 { '\n' } else { ' ' });
        }
        dump.push_str(&format!("CPSR = {}\n", self.cpsr()));
        dump.push_str(&format!("SPSR = {}\n", self.spsr()));

        dump
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatMemory;
    use crate::cpu::cpu_modes::Mode;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_reset_state() {
        let cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        assert_eq!(cpu.pc(), 8);
        assert_eq!(cpu.next_instruction_address(), 0);
        assert_eq!(cpu.cpsr().mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
    }

    #[test]
    fn check_step_advances_pc() {
        let mut memory = FlatMemory::new(0, 0x100);
        // MOV R0, #1 ; MOV R1, #2
        memory.load_words(0, &[0xE3A0_0001, 0xE3A0_1002]).unwrap();
        let mut cpu = Arm7tdmi::new(memory);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(0), 1);
        assert_eq!(cpu.pc(), 12);

        cpu.step().unwrap();
        assert_eq!(cpu.get_reg(1), 2);
        assert_eq!(cpu.next_instruction_address(), 8);
    }

    #[test]
    fn check_branch_keeps_pipeline_offset() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        cpu.branch(0x40);
        assert_eq!(cpu.pc(), 0x48);

        cpu.reset_to(0x81, CpuState::Thumb);
        assert_eq!(cpu.pc(), 0x84);
        assert_eq!(cpu.next_instruction_address(), 0x80);
    }

    #[test]
    fn check_set_reg_safe_aligns_pc() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        cpu.set_reg_safe(REG_PROGRAM_COUNTER, 0x103);
        assert_eq!(cpu.next_instruction_address(), 0x100);

        cpu.registers.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.set_reg_safe(REG_PROGRAM_COUNTER, 0x103);
        assert_eq!(cpu.next_instruction_address(), 0x102);
    }

    #[test]
    fn check_load_cpsr_from_spsr() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        cpu.registers.cpsr.set_mode(Mode::Irq);
        cpu.set_spsr(Psr::from(0x8000_003F));

        cpu.set_reg_safe_cpsr(REG_PROGRAM_COUNTER, 0x201);

        assert_eq!(cpu.cpsr().mode(), Mode::System);
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Thumb);
        assert!(cpu.cpsr().sign_flag());
        assert_eq!(cpu.next_instruction_address(), 0x200);
        assert_eq!(cpu.pc(), 0x204);
    }

    #[test]
    fn check_load_cpsr_in_user_mode_is_noop() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        cpu.registers.cpsr.set_mode(Mode::User);
        let before = cpu.cpsr();
        cpu.load_cpsr_from_spsr();
        assert_eq!(cpu.cpsr(), before);
    }

    #[test]
    fn check_user_registers() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        cpu.registers.cpsr.set_mode(Mode::Fiq);
        cpu.set_reg(8, 0xF1);
        cpu.set_user_reg(8, 0x51);

        assert_eq!(cpu.get_reg(8), 0xF1);
        assert_eq!(cpu.get_user_reg(8), 0x51);
    }

    #[test]
    fn check_register_dump() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0, 0x100));
        cpu.set_reg(3, 0xDEAD_BEEF);
        let dump = cpu.register_dump();
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[0],
            "R0  = 0x00000000 R1  = 0x00000000 R2  = 0x00000000 R3  = 0xDEADBEEF"
        );
        assert!(lines[3].ends_with("R15 = 0x00000008"));
        assert_eq!(lines[4], "CPSR = 0x000000D3  IF SUPERVISOR");
    }
}
