// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Element types accepted by primitive arrays.

use std::fmt;

use uuid::Uuid;

use crate::error::WriteError;
use crate::numeric::{Decimal, NATIVE_LITTLE_ENDIAN};
use crate::reader::DataReader;
use crate::writer::DataWriter;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width value that can be packed into a primitive array.
///
/// Implemented for the integer types, `f32`, `f64`, `bool`, `char`,
/// [`Decimal`] and [`Uuid`]. The set is closed.
pub trait PrimitiveElement: sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + 'static {
    /// Bytes per element on the binary wire.
    const WIDTH: usize;

    /// Encodes into exactly [`Self::WIDTH`] little-endian bytes.
    fn encode_le(self, out: &mut [u8]);

    /// Decodes from the first [`Self::WIDTH`] bytes of `bytes`.
    fn decode_le(bytes: &[u8]) -> Self;

    /// Whole-slice little-endian view, when the memory layout matches the
    /// wire layout.
    fn as_le_bytes(_slice: &[Self]) -> Option<&[u8]> {
        None
    }

    /// Bulk copy from wire bytes; `false` when the layouts differ.
    fn copy_from_le_bytes(_bytes: &[u8], _out: &mut [Self]) -> bool {
        false
    }

    /// Writes one unnamed element through the matching typed method.
    fn write_element<W: DataWriter + ?Sized>(self, writer: &mut W) -> Result<(), WriteError>;

    /// Reads one element through the matching typed method.
    fn read_element<R: DataReader + ?Sized>(reader: &mut R) -> Option<Self>;
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut raw = [0u8; N];
    let n = N.min(bytes.len());
    raw[..n].copy_from_slice(&bytes[..n]);
    raw
}

macro_rules! pod_element {
    ($($ty:ty => $write:ident, $read:ident;)*) => {$(
        impl sealed::Sealed for $ty {}

        impl PrimitiveElement for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn encode_le(self, out: &mut [u8]) {
                out[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }

            fn decode_le(bytes: &[u8]) -> Self {
                <$ty>::from_le_bytes(le_array(bytes))
            }

            fn as_le_bytes(slice: &[Self]) -> Option<&[u8]> {
                (NATIVE_LITTLE_ENDIAN || Self::WIDTH == 1).then(|| bytemuck::cast_slice(slice))
            }

            fn copy_from_le_bytes(bytes: &[u8], out: &mut [Self]) -> bool {
                if !(NATIVE_LITTLE_ENDIAN || Self::WIDTH == 1) {
                    return false;
                }
                let dst: &mut [u8] = bytemuck::cast_slice_mut(out);
                if dst.len() != bytes.len() {
                    return false;
                }
                dst.copy_from_slice(bytes);
                true
            }

            fn write_element<W: DataWriter + ?Sized>(
                self,
                writer: &mut W,
            ) -> Result<(), WriteError> {
                writer.$write(None, self)
            }

            fn read_element<R: DataReader + ?Sized>(reader: &mut R) -> Option<Self> {
                reader.$read()
            }
        }
    )*};
}

pod_element! {
    i8 => write_i8, read_i8;
    u8 => write_u8, read_u8;
    i16 => write_i16, read_i16;
    u16 => write_u16, read_u16;
    i32 => write_i32, read_i32;
    u32 => write_u32, read_u32;
    i64 => write_i64, read_i64;
    u64 => write_u64, read_u64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl sealed::Sealed for bool {}

impl PrimitiveElement for bool {
    const WIDTH: usize = 1;

    fn encode_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn decode_le(bytes: &[u8]) -> Self {
        bytes.first().is_some_and(|b| *b != 0)
    }

    fn write_element<W: DataWriter + ?Sized>(self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_bool(None, self)
    }

    fn read_element<R: DataReader + ?Sized>(reader: &mut R) -> Option<Self> {
        reader.read_bool()
    }
}

/// Characters travel as one UTF-16 code unit. Characters outside the
/// Basic Multilingual Plane encode as `'\0'`.
impl sealed::Sealed for char {}

impl PrimitiveElement for char {
    const WIDTH: usize = 2;

    fn encode_le(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&char_to_unit(self).unwrap_or(0).to_le_bytes());
    }

    fn decode_le(bytes: &[u8]) -> Self {
        unit_to_char(u16::from_le_bytes(le_array(bytes)))
    }

    fn write_element<W: DataWriter + ?Sized>(self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_char(None, self)
    }

    fn read_element<R: DataReader + ?Sized>(reader: &mut R) -> Option<Self> {
        reader.read_char()
    }
}

impl sealed::Sealed for Decimal {}

impl PrimitiveElement for Decimal {
    const WIDTH: usize = 16;

    fn encode_le(self, out: &mut [u8]) {
        out[..16].copy_from_slice(&self.to_le_bytes());
    }

    fn decode_le(bytes: &[u8]) -> Self {
        Self::from_le_bytes(le_array(bytes))
    }

    fn write_element<W: DataWriter + ?Sized>(self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_decimal(None, self)
    }

    fn read_element<R: DataReader + ?Sized>(reader: &mut R) -> Option<Self> {
        reader.read_decimal()
    }
}

/// GUIDs use the mixed-endian .NET byte order.
impl sealed::Sealed for Uuid {}

impl PrimitiveElement for Uuid {
    const WIDTH: usize = 16;

    fn encode_le(self, out: &mut [u8]) {
        out[..16].copy_from_slice(&self.to_bytes_le());
    }

    fn decode_le(bytes: &[u8]) -> Self {
        Self::from_bytes_le(le_array(bytes))
    }

    fn write_element<W: DataWriter + ?Sized>(self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_guid(None, self)
    }

    fn read_element<R: DataReader + ?Sized>(reader: &mut R) -> Option<Self> {
        reader.read_guid()
    }
}

/// UTF-16 unit for `c`, `None` outside the Basic Multilingual Plane.
pub(crate) fn char_to_unit(c: char) -> Option<u16> {
    u16::try_from(u32::from(c)).ok()
}

/// Character for a UTF-16 unit; lone surrogates become U+FFFD.
pub(crate) fn unit_to_char(unit: u16) -> char {
    char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)
}
