use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

const BYTE_BITS: usize = 8;
const WORD_BITS: usize = 32;

/// A size or cursor position measured in bits.
///
/// Byte and word views round up, so a 9-bit value occupies 2 bytes and
/// 1 word. The same type is used as a write/read cursor by the codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitSize {
    bits: usize,
}

impl BitSize {
    pub const ZERO: BitSize = BitSize::from_bits(0);
    pub const BYTE: BitSize = BitSize::from_bits(BYTE_BITS);
    pub const WORD: BitSize = BitSize::from_bits(WORD_BITS);

    pub const fn from_bits(bits: usize) -> Self {
        Self { bits }
    }

    pub const fn from_bytes(bytes: usize) -> Self {
        Self::from_bits(bytes * BYTE_BITS)
    }

    pub const fn from_words(words: usize) -> Self {
        Self::from_bits(words * WORD_BITS)
    }

    pub const fn bits(self) -> usize {
        self.bits
    }

    /// Number of whole bytes needed to hold this many bits.
    pub const fn bytes(self) -> usize {
        self.bits.div_ceil(BYTE_BITS)
    }

    /// Number of whole 4-byte words needed to hold this many bits.
    pub const fn words(self) -> usize {
        self.bits.div_ceil(WORD_BITS)
    }

    /// Round up to the next byte boundary.
    pub const fn align_to_bytes(self) -> Self {
        Self::from_bytes(self.bytes())
    }

    /// Round up to the next word boundary.
    pub const fn align_to_words(self) -> Self {
        Self::from_words(self.words())
    }

    pub const fn is_byte_aligned(self) -> bool {
        self.bits % BYTE_BITS == 0
    }

    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.bits.checked_sub(rhs.bits) {
            Some(bits) => Some(Self::from_bits(bits)),
            None => None,
        }
    }
}

impl fmt::Display for BitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_byte_aligned() {
            write!(f, "{} bytes", self.bits / BYTE_BITS)
        } else {
            write!(f, "{} bits", self.bits)
        }
    }
}

impl Add for BitSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_bits(self.bits + rhs.bits)
    }
}

impl AddAssign for BitSize {
    fn add_assign(&mut self, rhs: Self) {
        self.bits += rhs.bits;
    }
}

impl Sub for BitSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_bits(self.bits - rhs.bits)
    }
}

impl SubAssign for BitSize {
    fn sub_assign(&mut self, rhs: Self) {
        self.bits -= rhs.bits;
    }
}

impl Mul<usize> for BitSize {
    type Output = Self;

    fn mul(self, rhs: usize) -> Self {
        Self::from_bits(self.bits * rhs)
    }
}

impl Sum for BitSize {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        let size = BitSize::from_bits(9);
        assert_eq!(size.bytes(), 2);
        assert_eq!(size.words(), 1);

        let size = BitSize::from_bits(33);
        assert_eq!(size.bytes(), 5);
        assert_eq!(size.words(), 2);

        assert_eq!(BitSize::from_bytes(4), BitSize::WORD);
        assert_eq!(BitSize::from_words(2).bits(), 64);
        assert_eq!(BitSize::ZERO.bytes(), 0);
        assert_eq!(BitSize::ZERO.words(), 0);
    }

    #[test]
    fn test_alignment_rounds_up() {
        assert_eq!(BitSize::from_bits(1).align_to_bytes(), BitSize::BYTE);
        assert_eq!(BitSize::from_bits(8).align_to_bytes(), BitSize::BYTE);
        assert_eq!(BitSize::from_bits(12).align_to_words(), BitSize::WORD);
        assert_eq!(BitSize::from_bits(40).align_to_words(), BitSize::from_words(2));
        assert!(BitSize::from_bits(16).is_byte_aligned());
        assert!(!BitSize::from_bits(17).is_byte_aligned());
    }

    #[test]
    fn test_arithmetic_and_ordering() {
        let a = BitSize::from_bits(12);
        let b = BitSize::from_bytes(1);
        assert_eq!((a + b).bits(), 20);
        assert_eq!((a - b).bits(), 4);
        assert_eq!((b * 3).bits(), 24);
        assert!(a > b);
        assert_eq!(b.checked_sub(a), None);

        let total: BitSize = [a, b, BitSize::WORD].into_iter().sum();
        assert_eq!(total.bits(), 52);
    }

    #[test]
    fn test_display() {
        assert_eq!(BitSize::from_bytes(3).to_string(), "3 bytes");
        assert_eq!(BitSize::from_bits(5).to_string(), "5 bits");
    }
}
