use serde::{Deserialize, Serialize};

/// There two different kind of write or read for memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadWriteKind {
    /// Word is a u32 value.
    #[default]
    Word,

    /// Byte is a u8 value.
    Byte,
}

impl From<bool> for ReadWriteKind {
    fn from(value: bool) -> Self {
        if value { Self::Byte } else { Self::Word }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStoreKind {
    Store,
    Load,
}

impl From<bool> for LoadStoreKind {
    fn from(b: bool) -> Self {
        if b { Self::Load } else { Self::Store }
    }
}

impl std::fmt::Display for LoadStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => f.write_str("STR"),
            Self::Load => f.write_str("LDR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indexing {
    /// Add offset after transfer.
    Post,

    /// Add offset before transfer.
    Pre,
}

impl From<bool> for Indexing {
    fn from(state: bool) -> Self {
        if state { Self::Pre } else { Self::Post }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Offsetting {
    /// Substract the offset from base.
    Down,

    /// Add the offset to base.
    Up,
}

impl From<bool> for Offsetting {
    fn from(state: bool) -> Self {
        if state { Self::Up } else { Self::Down }
    }
}

impl Offsetting {
    #[must_use]
    pub const fn apply(self, base: u32, offset: u32) -> u32 {
        match self {
            Self::Down => base.wrapping_sub(offset),
            Self::Up => base.wrapping_add(offset),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum OperandKind {
    Immediate,
    Register,
}

impl From<bool> for OperandKind {
    fn from(b: bool) -> Self {
        if b { Self::Immediate } else { Self::Register }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl From<u32> for ShiftKind {
    /// Only the low two bits are looked at.
    fn from(op: u32) -> Self {
        match op & 0b11 {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            _ => Self::Ror,
        }
    }
}

impl From<u16> for ShiftKind {
    fn from(op: u16) -> Self {
        u32::from(op).into()
    }
}

impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Ror => f.write_str("ROR"),
        }
    }
}

/// THUMB format 3 operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Operation {
    Mov,
    Cmp,
    Add,
    Sub,
}

impl From<u16> for Operation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0 => Self::Mov,
            1 => Self::Cmp,
            2 => Self::Add,
            _ => Self::Sub,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mov => f.write_str("MOV"),
            Self::Cmp => f.write_str("CMP"),
            Self::Add => f.write_str("ADD"),
            Self::Sub => f.write_str("SUB"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum HalfwordDataTransferOffsetKind {
    Immediate { offset: u32 },
    Register { register: u32 },
}

/// The `S` and `H` bits of a halfword transfer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum HalfwordTransferKind {
    UnsignedHalfwords,
    SignedByte,
    SignedHalfwords,
}

impl HalfwordTransferKind {
    /// `sh` must not be zero, that encoding belongs to SWP and multiplies.
    #[must_use]
    pub const fn from_sh(sh: u32) -> Option<Self> {
        match sh & 0b11 {
            0b01 => Some(Self::UnsignedHalfwords),
            0b10 => Some(Self::SignedByte),
            0b11 => Some(Self::SignedHalfwords),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::UnsignedHalfwords)
    }
}

impl std::fmt::Display for HalfwordTransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsignedHalfwords => f.write_str("H"),
            Self::SignedByte => f.write_str("SB"),
            Self::SignedHalfwords => f.write_str("SH"),
        }
    }
}
