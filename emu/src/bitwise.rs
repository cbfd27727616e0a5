use std::ops::RangeInclusive;

/// Bit-field helpers used by both decoders.
///
/// Indexes go from lsb to msb (right to left), so `get_bit(0)` is the least
/// significant bit.
pub trait Bits: Copy {
    const WIDTH: u8;

    fn to_u64(self) -> u64;
    fn from_u64(value: u64) -> Self;

    fn is_bit_on(self, bit_idx: u8) -> bool {
        debug_assert!(bit_idx < Self::WIDTH);
        (self.to_u64() >> bit_idx) & 1 == 1
    }

    fn is_bit_off(self, bit_idx: u8) -> bool {
        !self.is_bit_on(bit_idx)
    }

    fn get_bit(self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    fn set_bit(&mut self, bit_idx: u8, value: bool) {
        debug_assert!(bit_idx < Self::WIDTH);
        let mask = 1_u64 << bit_idx;
        let bits = self.to_u64();
        *self = Self::from_u64(if value { bits | mask } else { bits & !mask });
    }

    fn set_bit_off(&mut self, bit_idx: u8) {
        self.set_bit(bit_idx, false);
    }

    /// Extracts `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
        let start = *bits_range.start();
        let length = u32::from(*bits_range.end() - start + 1);
        debug_assert!(start + (length as u8) <= Self::WIDTH);

        let mask = if length >= 64 {
            u64::MAX
        } else {
            (1_u64 << length) - 1
        };

        Self::from_u64((self.to_u64() >> start) & mask)
    }

    /// True only when every bit in `bits_range` is set.
    fn are_bits_on(self, bits_range: RangeInclusive<u8>) -> bool {
        bits_range.into_iter().all(|bit_idx| self.is_bit_on(bit_idx))
    }

    /// Treats the low `number_of_bits` as a two's complement value and
    /// extends its sign over the whole width.
    fn sign_extended(self, number_of_bits: u8) -> Self {
        debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);
        let unused = 64 - u32::from(number_of_bits);
        let value = ((self.to_u64() << unused) as i64) >> unused;
        let width_mask = if Self::WIDTH == 64 {
            u64::MAX
        } else {
            (1_u64 << Self::WIDTH) - 1
        };

        Self::from_u64(value as u64 & width_mask)
    }
}

impl Bits for u32 {
    const WIDTH: u8 = 32;

    fn to_u64(self) -> u64 {
        u64::from(self)
    }

    fn from_u64(value: u64) -> Self {
        value as Self
    }
}

impl Bits for u16 {
    const WIDTH: u8 = 16;

    fn to_u64(self) -> u64 {
        u64::from(self)
    }

    fn from_u64(value: u64) -> Self {
        value as Self
    }
}

impl Bits for u64 {
    const WIDTH: u8 = 64;

    fn to_u64(self) -> u64 {
        self
    }

    fn from_u64(value: u64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn check_is_bit_on_and_off() {
        let b = 0b1_1001_1101_u32;
        assert!(b.is_bit_on(0));
        assert!(b.is_bit_off(1));
        assert!(b.is_bit_on(8));
        assert!(b.is_bit_off(31));
    }

    #[test]
    fn check_set_bit() {
        let mut b = 0b110_0110_u32;
        b.set_bit(0, true);
        b.set_bit(1, true);
        b.set_bit(2, false);
        b.set_bit_off(5);
        assert_eq!(b, 0b100_0011);
    }

    #[test]
    fn check_get_bits() {
        let b = 0b10_1100_1110_u32;
        assert_eq!(b.get_bits(0..=3), 0b1110);
        assert_eq!(b.get_bits(1..=1), 0b1);
        assert_eq!(b.get_bits(4..=7), 0b1100);
        assert_eq!(b.get_bits(0..=31), 0b10_1100_1110);
        assert_eq!(b.get_bits(28..=31), 0);

        let h = 0b1101_1111_0000_0001_u16;
        assert_eq!(h.get_bits(8..=15), 0b1101_1111);
        assert_eq!(h.get_bits(11..=15), 0b11011);
    }

    #[test]
    fn check_are_bits_on() {
        let b = 0b10_1100_1110_u32;
        assert!(!b.are_bits_on(0..=3));
        assert!(b.are_bits_on(1..=3));
        assert!(u32::MAX.are_bits_on(28..=31));
    }

    #[test]
    fn check_sign_extended() {
        assert_eq!(0b1001_u32.sign_extended(4) as i32, -7);
        assert_eq!(0b0111_u32.sign_extended(4), 7);
        assert_eq!(0x80_u16.sign_extended(8), 0xFF80);
        assert_eq!(0x00FF_FFFF_u32.sign_extended(24), 0xFFFF_FFFF);
    }

    #[test]
    fn get_bits_matches_shift_and_mask() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let value: u32 = rng.r#gen();
            let start = rng.gen_range(0..32_u8);
            let end = rng.gen_range(start..32_u8);
            let len = u32::from(end - start + 1);
            let expected = if len == 32 {
                value
            } else {
                (value >> start) & ((1 << len) - 1)
            };
            assert_eq!(value.get_bits(start..=end), expected);
        }
    }

    #[test]
    #[should_panic]
    fn invalid_index() {
        let b = 0_u32;
        b.is_bit_on(32);
    }
}
