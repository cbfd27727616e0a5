use serde::{Deserialize, Serialize};

/// Register-to-register ALU operations (format 4). They always set flags.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Lsl = 0x2,
    Lsr = 0x3,
    Asr = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Ror = 0x7,
    Tst = 0x8,
    Neg = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mul = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl ThumbModeAluInstruction {
    /// TST, CMP and CMN only produce flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Cmp | Self::Cmn)
    }
}

impl From<u16> for ThumbModeAluInstruction {
    /// Only the low nibble is looked at.
    fn from(alu_op_code: u16) -> Self {
        match alu_op_code & 0xF {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Lsl,
            0x3 => Self::Lsr,
            0x4 => Self::Asr,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Ror,
            0x8 => Self::Tst,
            0x9 => Self::Neg,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mul,
            0xE => Self::Bic,
            _ => Self::Mvn,
        }
    }
}

impl std::fmt::Display for ThumbModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Ror => f.write_str("ROR"),
            Self::Tst => f.write_str("TST"),
            Self::Neg => f.write_str("NEG"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mul => f.write_str("MUL"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

/// Format 5, selected by bits 9-8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbHighRegisterOperation {
    Add,
    Cmp,
    Mov,
    Bx,
}

impl std::fmt::Display for ThumbHighRegisterOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mov => f.write_str("MOV"),
            Self::Cmp => f.write_str("CMP"),
            Self::Add => f.write_str("ADD"),
            Self::Bx => f.write_str("BX"),
        }
    }
}

impl From<u16> for ThumbHighRegisterOperation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0 => Self::Add,
            1 => Self::Cmp,
            2 => Self::Mov,
            _ => Self::Bx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_thumb_alu_op_conversion() {
        let op: ThumbModeAluInstruction = 0b0000.into();
        assert_eq!(op, ThumbModeAluInstruction::And);
        let op: ThumbModeAluInstruction = 0b0001.into();
        assert_eq!(op, ThumbModeAluInstruction::Eor);
        let op: ThumbModeAluInstruction = 0b1110.into();
        assert_eq!(op, ThumbModeAluInstruction::Bic);
        let op: ThumbModeAluInstruction = 0b1_1111.into();
        assert_eq!(op, ThumbModeAluInstruction::Mvn);

        assert!(ThumbModeAluInstruction::Cmn.is_test());
        assert!(!ThumbModeAluInstruction::Neg.is_test());
        assert_eq!(ThumbModeAluInstruction::Neg.to_string(), "NEG");
    }

    #[test]
    fn check_high_register_operation_conversion() {
        assert_eq!(
            ThumbHighRegisterOperation::from(0b11),
            ThumbHighRegisterOperation::Bx
        );
        assert_eq!(
            ThumbHighRegisterOperation::from(0b110),
            ThumbHighRegisterOperation::Mov
        );
        assert_eq!(ThumbHighRegisterOperation::Cmp.to_string(), "CMP");
    }
}
