//! # Flag primitives and barrel shifter
//!
//! Everything here is a pure function: operands and the incoming carry go in,
//! the result and the flags it would produce come out. The executors decide
//! which of those flags reach the CPSR.
//!
//! ```text
//!            ┌───────────────┐
//!   Rm ────► │ barrel shifter│──── op2 ───┐
//!   C  ────► │               │── carry ─┐ │
//!            └───────────────┘          │ ▼
//!   Rn ──────────────────────────────► ┌─────┐
//!                                      │ ALU │──► result, N Z C V
//!                                      └─────┘
//! ```

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// Output of an arithmetic primitive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    /// N and Z are derived from `result`.
    #[must_use]
    pub fn new(result: u32, carry: bool, overflow: bool) -> Self {
        Self {
            result,
            carry,
            overflow,
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }
}

/// Output of the barrel shifter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftResult {
    pub result: u32,
    pub carry: bool,
}

impl ShiftResult {
    const fn new(result: u32, carry: bool) -> Self {
        Self { result, carry }
    }
}

/// `a + b`. Carry is the 33rd bit of the unsigned sum.
#[must_use]
pub fn add(a: u32, b: u32) -> ArithmeticOpResult {
    adc(a, b, false)
}

/// `a - b`. Carry means "no borrow", so it is set when `a >= b` unsigned.
#[must_use]
pub fn sub(a: u32, b: u32) -> ArithmeticOpResult {
    sbc(a, b, true)
}

/// `a + b + carry`.
#[must_use]
pub fn adc(a: u32, b: u32, carry: bool) -> ArithmeticOpResult {
    let wide = u64::from(a) + u64::from(b) + u64::from(carry);
    let result = wide as u32;

    // Operands share a sign and the result does not.
    let overflow = (!(a ^ b) & (a ^ result)).get_bit(31);

    ArithmeticOpResult::new(result, wide > 0xFFFF_FFFF, overflow)
}

/// `a - b - !carry`.
#[must_use]
pub fn sbc(a: u32, b: u32, carry: bool) -> ArithmeticOpResult {
    let borrow = u32::from(!carry);
    let result = a.wrapping_sub(b).wrapping_sub(borrow);

    // Operands differ in sign and the result took the sign of the subtrahend.
    let overflow = ((a ^ b) & (a ^ result)).get_bit(31);

    ArithmeticOpResult::new(
        result,
        u64::from(a) >= u64::from(b) + u64::from(borrow),
        overflow,
    )
}

/// Shift with a 5-bit amount encoded in the instruction.
///
/// An amount of zero has a special meaning for every kind but LSL:
/// LSR and ASR #0 mean #32, ROR #0 is RRX.
#[must_use]
pub fn shift_by_immediate(kind: ShiftKind, amount: u32, value: u32, carry: bool) -> ShiftResult {
    let amount = amount & 0x1F;

    match (kind, amount) {
        (ShiftKind::Lsl, 0) => ShiftResult::new(value, carry),
        (ShiftKind::Lsl, n) => ShiftResult::new(value << n, value.get_bit((32 - n) as u8)),

        (ShiftKind::Lsr, 0) => ShiftResult::new(0, value.get_bit(31)),
        (ShiftKind::Lsr, n) => ShiftResult::new(value >> n, value.get_bit((n - 1) as u8)),

        (ShiftKind::Asr, 0) => ShiftResult::new(sign_fill(value), value.get_bit(31)),
        (ShiftKind::Asr, n) => {
            ShiftResult::new(((value as i32) >> n) as u32, value.get_bit((n - 1) as u8))
        }

        // RRX
        (ShiftKind::Ror, 0) => {
            ShiftResult::new((u32::from(carry) << 31) | (value >> 1), value.get_bit(0))
        }
        (ShiftKind::Ror, n) => {
            ShiftResult::new(value.rotate_right(n), value.get_bit((n - 1) as u8))
        }
    }
}

/// Shift by the low byte of a register.
///
/// Amount zero passes value and carry through untouched. Amounts of 32 and
/// above are handled explicitly since native shifts cannot express them.
#[must_use]
pub fn shift_by_register(kind: ShiftKind, amount: u32, value: u32, carry: bool) -> ShiftResult {
    let amount = amount & 0xFF;
    if amount == 0 {
        return ShiftResult::new(value, carry);
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => ShiftResult::new(value << amount, value.get_bit((32 - amount) as u8)),
            32 => ShiftResult::new(0, value.get_bit(0)),
            _ => ShiftResult::new(0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => ShiftResult::new(value >> amount, value.get_bit((amount - 1) as u8)),
            32 => ShiftResult::new(0, value.get_bit(31)),
            _ => ShiftResult::new(0, false),
        },
        ShiftKind::Asr => match amount {
            1..=31 => ShiftResult::new(
                ((value as i32) >> amount) as u32,
                value.get_bit((amount - 1) as u8),
            ),
            _ => ShiftResult::new(sign_fill(value), value.get_bit(31)),
        },
        ShiftKind::Ror => match amount & 0x1F {
            0 => ShiftResult::new(value, value.get_bit(31)),
            n => ShiftResult::new(value.rotate_right(n), value.get_bit((n - 1) as u8)),
        },
    }
}

/// Data processing immediate: `imm8 ROR (rotate * 2)`.
///
/// With a zero rotation the carry is passed through, otherwise it is bit 31
/// of the rotated value.
#[must_use]
pub fn rotated_immediate(imm8: u32, rotate: u32, carry: bool) -> ShiftResult {
    let rotation = (rotate & 0xF) * 2;
    if rotation == 0 {
        return ShiftResult::new(imm8, carry);
    }

    let result = imm8.rotate_right(rotation);
    ShiftResult::new(result, result.get_bit(31))
}

const fn sign_fill(value: u32) -> u32 {
    ((value as i32) >> 31) as u32
}
