//! 256-bit machine word

use primitive_types::{U256, U512};
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Mul, Not, Sub};
use strata_primitives::{Address, H256};

/// Unsigned 256-bit integer with wrapping arithmetic.
///
/// Signed operations interpret the value as two's complement. The byte
/// representation is big-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Word(U256);

fn low_u256(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

impl Word {
    /// Zero
    pub const ZERO: Word = Word(U256([0; 4]));
    /// One
    pub const ONE: Word = Word(U256([1, 0, 0, 0]));
    /// All bits set (-1 in two's complement)
    pub const MAX: Word = Word(U256([u64::MAX; 4]));

    /// Build from big-endian bytes.
    ///
    /// Short input is left-padded; long input keeps its low-order 32 bytes.
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        let start = bytes.len().saturating_sub(32);
        Word(U256::from_big_endian(&bytes[start..]))
    }

    /// Big-endian 32-byte form
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        bytes
    }

    /// Big-endian bytes without leading zeros
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let bytes = self.to_be_bytes();
        bytes[32 - self.bytes_occupied()..].to_vec()
    }

    /// The underlying integer
    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// Low 20 bytes as an address
    pub fn to_address(&self) -> Address {
        Address::from_word(&self.to_be_bytes())
    }

    /// As a 32-byte hash
    pub fn to_h256(&self) -> H256 {
        H256::from_bytes(self.to_be_bytes())
    }

    /// `usize` value, `None` if it does not fit
    pub fn as_usize(&self) -> Option<usize> {
        if self.0 > U256::from(usize::MAX) {
            None
        } else {
            Some(self.0.low_u64() as usize)
        }
    }

    /// `u64` value, `None` if it does not fit
    pub fn as_u64(&self) -> Option<u64> {
        if self.0 > U256::from(u64::MAX) {
            None
        } else {
            Some(self.0.low_u64())
        }
    }

    /// Lowest 64 bits
    pub fn low_u64(&self) -> u64 {
        self.0.low_u64()
    }

    /// Number of significant bytes
    pub fn bytes_occupied(&self) -> usize {
        self.0.bits().div_ceil(8)
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Sign bit set
    pub fn is_negative(&self) -> bool {
        self.0.bit(255)
    }

    fn negate(self) -> Self {
        Word((!self.0).overflowing_add(U256::one()).0)
    }

    fn abs(self) -> Self {
        if self.is_negative() {
            self.negate()
        } else {
            self
        }
    }

    /// Unsigned division, zero divisor yields zero
    pub fn div(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            Self::ZERO
        } else {
            Word(self.0 / rhs.0)
        }
    }

    /// Unsigned remainder, zero divisor yields zero
    pub fn rem(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            Self::ZERO
        } else {
            Word(self.0 % rhs.0)
        }
    }

    /// Signed division; `MIN / -1` wraps to `MIN`
    pub fn sdiv(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::ZERO;
        }
        let quotient = self.abs().div(rhs.abs());
        if self.is_negative() != rhs.is_negative() {
            quotient.negate()
        } else {
            quotient
        }
    }

    /// Signed remainder, sign follows the dividend
    pub fn smod(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::ZERO;
        }
        let remainder = self.abs().rem(rhs.abs());
        if self.is_negative() {
            remainder.negate()
        } else {
            remainder
        }
    }

    /// `(self + rhs) % modulus` without intermediate overflow
    pub fn addmod(self, rhs: Self, modulus: Self) -> Self {
        if modulus.is_zero() {
            return Self::ZERO;
        }
        let sum = U512::from(self.0) + U512::from(rhs.0);
        Word(low_u256(sum % U512::from(modulus.0)))
    }

    /// `(self * rhs) % modulus` without intermediate overflow
    pub fn mulmod(self, rhs: Self, modulus: Self) -> Self {
        if modulus.is_zero() {
            return Self::ZERO;
        }
        let product = self.0.full_mul(rhs.0);
        Word(low_u256(product % U512::from(modulus.0)))
    }

    /// Exponentiation modulo 2^256
    pub fn exp(self, exponent: Self) -> Self {
        Word(self.0.overflowing_pow(exponent.0).0)
    }

    /// `self << shift`
    pub fn shl(self, shift: Self) -> Self {
        match shift.as_usize() {
            Some(shift) if shift < 256 => Word(self.0 << shift),
            _ => Self::ZERO,
        }
    }

    /// `self >> shift` (logical)
    pub fn shr(self, shift: Self) -> Self {
        match shift.as_usize() {
            Some(shift) if shift < 256 => Word(self.0 >> shift),
            _ => Self::ZERO,
        }
    }

    /// `self >> shift` (arithmetic)
    pub fn sar(self, shift: Self) -> Self {
        let negative = self.is_negative();
        match shift.as_usize() {
            Some(shift) if shift < 256 => {
                if negative {
                    Word(!((!self.0) >> shift))
                } else {
                    Word(self.0 >> shift)
                }
            }
            _ if negative => Self::MAX,
            _ => Self::ZERO,
        }
    }

    /// Signed less-than
    pub fn slt(&self, rhs: &Self) -> bool {
        match (self.is_negative(), rhs.is_negative()) {
            (true, false) => true,
            (false, true) => false,
            _ => self.0 < rhs.0,
        }
    }

    /// Signed greater-than
    pub fn sgt(&self, rhs: &Self) -> bool {
        rhs.slt(self)
    }

    /// Extend the sign of the low `self + 1` bytes of `value`
    pub fn signextend(self, value: Self) -> Self {
        match self.as_usize() {
            Some(byte) if byte < 31 => {
                let bit = byte * 8 + 7;
                let mask = (U256::one() << (bit + 1)) - U256::one();
                if value.0.bit(bit) {
                    Word(value.0 | !mask)
                } else {
                    Word(value.0 & mask)
                }
            }
            _ => value,
        }
    }

    /// Byte `self` of `value`, counting from the most significant
    pub fn byte(self, value: Self) -> Self {
        match self.as_usize() {
            Some(index) if index < 32 => Word(U256::from(value.0.byte(31 - index))),
            _ => Self::ZERO,
        }
    }
}

impl Add for Word {
    type Output = Word;

    fn add(self, rhs: Self) -> Self {
        Word(self.0.overflowing_add(rhs.0).0)
    }
}

impl Sub for Word {
    type Output = Word;

    fn sub(self, rhs: Self) -> Self {
        Word(self.0.overflowing_sub(rhs.0).0)
    }
}

impl Mul for Word {
    type Output = Word;

    fn mul(self, rhs: Self) -> Self {
        Word(self.0.overflowing_mul(rhs.0).0)
    }
}

impl BitAnd for Word {
    type Output = Word;

    fn bitand(self, rhs: Self) -> Self {
        Word(self.0 & rhs.0)
    }
}

impl BitOr for Word {
    type Output = Word;

    fn bitor(self, rhs: Self) -> Self {
        Word(self.0 | rhs.0)
    }
}

impl BitXor for Word {
    type Output = Word;

    fn bitxor(self, rhs: Self) -> Self {
        Word(self.0 ^ rhs.0)
    }
}

impl Not for Word {
    type Output = Word;

    fn not(self) -> Self {
        Word(!self.0)
    }
}

impl From<U256> for Word {
    fn from(value: U256) -> Self {
        Word(value)
    }
}

impl From<Word> for U256 {
    fn from(word: Word) -> Self {
        word.0
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Word(U256::from(value))
    }
}

impl From<usize> for Word {
    fn from(value: usize) -> Self {
        Word(U256::from(value))
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        if value {
            Word::ONE
        } else {
            Word::ZERO
        }
    }
}

impl From<Address> for Word {
    fn from(address: Address) -> Self {
        Word::from_be_slice(address.as_bytes())
    }
}

impl From<H256> for Word {
    fn from(hash: H256) -> Self {
        Word::from_be_slice(hash.as_bytes())
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:#x})", self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
