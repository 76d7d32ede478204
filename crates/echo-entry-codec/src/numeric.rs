// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Numeric helpers: the 128-bit decimal and checked narrowing.
//!
//! Wire layout of [`Decimal`] (16 bytes, each word little-endian):
//!
//! | offset | word  | meaning                                   |
//! |--------|-------|-------------------------------------------|
//! | 0      | flags | bit 31 sign, bits 16..24 scale (0..=28)   |
//! | 4      | hi    | mantissa bits 64..96                      |
//! | 8      | lo    | mantissa bits 0..32                       |
//! | 12     | mid   | mantissa bits 32..64                      |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// True when the host stores integers little-endian, which allows
/// primitive arrays to be copied to and from the wire in bulk.
pub const NATIVE_LITTLE_ENDIAN: bool = cfg!(target_endian = "little");

/// Largest scale a [`Decimal`] can carry.
pub const MAX_DECIMAL_SCALE: u8 = 28;

const SIGN_MASK: u32 = 0x8000_0000;
const SCALE_SHIFT: u32 = 16;
const MANTISSA_MAX: u128 = (1u128 << 96) - 1;

/// A 96-bit mantissa with a base-10 scale and a sign bit.
///
/// Equality is representational: `1.5` and `1.50` differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    flags: u32,
    hi: u32,
    lo: u32,
    mid: u32,
}

/// Failure to parse a [`Decimal`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDecimalError {
    /// Input was empty or held no digits.
    #[error("no digits in decimal literal")]
    Empty,
    /// Input held a character that is not part of a decimal literal.
    #[error("invalid character {0:?} in decimal literal")]
    InvalidCharacter(char),
    /// The integer part does not fit 96 bits.
    #[error("decimal literal overflows 96 bits")]
    Overflow,
}

impl Decimal {
    /// Zero.
    pub const ZERO: Self = Self { flags: 0, hi: 0, lo: 0, mid: 0 };

    /// Builds a decimal from `mantissa / 10^scale`, negated when `negative`.
    ///
    /// Returns `None` if the mantissa exceeds 96 bits or the scale exceeds
    /// [`MAX_DECIMAL_SCALE`].
    pub fn from_parts(mantissa: u128, scale: u8, negative: bool) -> Option<Self> {
        if mantissa > MANTISSA_MAX || scale > MAX_DECIMAL_SCALE {
            return None;
        }
        let word = |shift: u32| u32::try_from((mantissa >> shift) & 0xFFFF_FFFF).unwrap_or(0);
        let sign = if negative { SIGN_MASK } else { 0 };
        Some(Self {
            flags: sign | (u32::from(scale) << SCALE_SHIFT),
            lo: word(0),
            mid: word(32),
            hi: word(64),
        })
    }

    /// Unsigned 96-bit mantissa.
    pub fn mantissa(&self) -> u128 {
        (u128::from(self.hi) << 64) | (u128::from(self.mid) << 32) | u128::from(self.lo)
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u8 {
        u8::try_from((self.flags >> SCALE_SHIFT) & 0xFF).unwrap_or(0)
    }

    /// Whether the sign bit is set.
    pub const fn is_negative(&self) -> bool {
        self.flags & SIGN_MASK != 0
    }

    /// Wire form: flags, hi, lo, mid.
    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.flags.to_le_bytes());
        out[4..8].copy_from_slice(&self.hi.to_le_bytes());
        out[8..12].copy_from_slice(&self.lo.to_le_bytes());
        out[12..16].copy_from_slice(&self.mid.to_le_bytes());
        out
    }

    /// Inverse of [`Decimal::to_le_bytes`]. The words are taken as-is.
    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self { flags: word(0), hi: word(4), lo: word(8), mid: word(12) }
    }

    /// Nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(0.0)
    }

    /// Converts a float, truncating digits beyond the representable scale.
    ///
    /// Returns `None` for NaN, infinities and magnitudes beyond 96 bits.
    pub fn try_from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        value.to_string().parse().ok()
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from_parts(u128::from(value.unsigned_abs()), 0, value < 0).unwrap_or(Self::ZERO)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self::from_parts(u128::from(value), 0, false).unwrap_or(Self::ZERO)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa().to_string();
        let scale = usize::from(self.scale());
        if self.is_negative() && self.mantissa() != 0 {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{int}.{frac}")
        } else {
            write!(f, "0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError::Empty);
        }

        let mut mantissa: u128 = 0;
        for c in int_part.chars() {
            let digit = c.to_digit(10).ok_or(ParseDecimalError::InvalidCharacter(c))?;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(u128::from(digit)))
                .filter(|m| *m <= MANTISSA_MAX)
                .ok_or(ParseDecimalError::Overflow)?;
        }

        let mut scale = 0u8;
        let mut truncating = false;
        for c in frac_part.chars() {
            let digit = c.to_digit(10).ok_or(ParseDecimalError::InvalidCharacter(c))?;
            if truncating || scale == MAX_DECIMAL_SCALE {
                continue;
            }
            let next = mantissa * 10 + u128::from(digit);
            if next > MANTISSA_MAX {
                truncating = true;
                continue;
            }
            mantissa = next;
            scale += 1;
        }

        Self::from_parts(mantissa, scale, negative).ok_or(ParseDecimalError::Overflow)
    }
}

/// Truncating `f64 → i64`, `None` for NaN, infinities and out-of-range values.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn f64_to_i64(value: f64) -> Option<i64> {
    let in_range = value.is_finite()
        && value >= -9_223_372_036_854_775_808.0
        && value < 9_223_372_036_854_775_808.0;
    in_range.then(|| value as i64)
}

/// Truncating `f64 → u64`, `None` for NaN, infinities and out-of-range values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn f64_to_u64(value: f64) -> Option<u64> {
    let in_range = value.is_finite() && value > -1.0 && value < 18_446_744_073_709_551_616.0;
    in_range.then(|| value as u64)
}

/// `f64 → f32`; finite values beyond the `f32` range become `0.0`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn f64_to_f32(value: f64) -> f32 {
    if value.is_finite() && value.abs() > f64::from(f32::MAX) {
        return 0.0;
    }
    value as f32
}

/// Integer narrowing; out-of-range values become the target's default.
pub(crate) fn narrow<S, T>(value: S) -> T
where
    T: TryFrom<S> + Default,
{
    T::try_from(value).unwrap_or_default()
}
