use crate::cpu::arm::instructions::ArmModeInstruction;
use crate::cpu::condition::Condition;

/// A fetched ARM word together with its decoded form.
#[derive(Debug, Clone, Copy)]
pub struct ArmModeOpcode {
    pub instruction: ArmModeInstruction,
    pub condition: Condition,
    pub raw: u32,
}

impl From<u32> for ArmModeOpcode {
    fn from(op_code: u32) -> Self {
        let instruction = ArmModeInstruction::from(op_code);
        Self {
            instruction,
            condition: instruction.condition(),
            raw: op_code,
        }
    }
}

impl std::ops::Deref for ArmModeOpcode {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl std::fmt::Display for ArmModeOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = format!("INS: {}\n", self.instruction);

        let bytes_pos1 = "POS: |..3 ..................2 ..................1 ..................0|\n";
        let bytes_pos2 = "     |1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0|\n";

        let op_code_format: &str = match &self.instruction {
            ArmModeInstruction::DataProcessing { .. } => {
                "FMT: |_Cond__|0_0|I|_code__|S|__Rn___|__Rd___|_______operand2________|"
            }
            ArmModeInstruction::PSRTransfer { .. } => {
                "FMT: |_Cond__|0_0|I|1_0|P|1_0|_field_|__Rd___|_______operand2________|"
            }
            ArmModeInstruction::Multiply { .. } => {
                "FMT: |_Cond__|0_0_0_0_0_0|A|S|__Rd___|__Rn___|__Rs___|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::MultiplyLong { .. } => {
                "FMT: |_Cond__|0_0_0_0_1|U|A|S|_RdHi__|_RdLo__|__Rs___|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::SingleDataSwap { .. } => {
                "FMT: |_Cond__|0_0_0_1_0|B|0_0|__Rn___|__Rd___|0_0_0_0|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::BranchAndExchange { .. } => {
                "FMT: |_Cond__|0_0_0_1|0_0_1_0|1_1_1_1|1_1_1_1|1_1_1_1|0_0_0_1|__Rn___|"
            }
            ArmModeInstruction::HalfwordDataTransfer { .. } => {
                "FMT: |_Cond__|0_0_0|P|U|I|W|L|__Rn___|__Rd___|_Offset|1|S|H|1|Rm/Off_|"
            }
            ArmModeInstruction::SingleDataTransfer { .. } => {
                "FMT: |_Cond__|0_1|I|P|U|B|W|L|__Rn___|__Rd___|________Offset_________|"
            }
            ArmModeInstruction::BlockDataTransfer { .. } => {
                "FMT: |_Cond__|1_0_0|P|U|S|W|L|__Rn___|_____________Reg_List__________|"
            }
            ArmModeInstruction::Branch { .. } => {
                "FMT: |_Cond__|1_0_1|L|______________________Offset___________________|"
            }
            ArmModeInstruction::Coprocessor { .. } => {
                "FMT: |_Cond__|1_1_x|_________________________|__Cp#__|_______________|"
            }
            ArmModeInstruction::SoftwareInterrupt { .. } => {
                "FMT: |_Cond__|1_1_1_1|_____________________Comment___________________|"
            }
            ArmModeInstruction::Undefined { .. } => "FMT: |_Cond__|",
        };

        let mut raw_bits = String::new();
        for i in format!("{:#034b}", self.raw).chars().skip(2) {
            raw_bits.push(i);
            raw_bits.push('_');
        }
        raw_bits.pop();
        let raw_bits = format!("RAW: |{raw_bits}|\n");

        writeln!(
            f,
            "{instruction}{bytes_pos1}{bytes_pos2}{raw_bits}{op_code_format}"
        )
    }
}
