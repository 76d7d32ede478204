// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compact binary encoding.
//!
//! Every entry starts with a one-byte [`BinaryEntryType`] tag. Named tags
//! are followed by the entry name, then the payload. All scalars are
//! little-endian.
//!
//! | entry            | layout after the tag                                  |
//! |------------------|-------------------------------------------------------|
//! | reference node   | [name], type entry, i32 id                            |
//! | struct node      | [name], type entry                                    |
//! | array            | i64 length                                            |
//! | primitive array  | i32 count, i32 bytes per element, count × width bytes |
//! | string           | [name], u8 width flag, i32 length, characters         |
//! | char             | [name], u16 UTF-16 unit                               |
//! | decimal          | [name], u32 flags, hi, lo, mid                        |
//! | GUID             | [name], 16 bytes, .NET mixed-endian order             |
//! | type entry       | `UnnamedNull` \| `TypeID` i32 \| `TypeName` i32 string |
//!
//! Strings use width flag `0` for one byte per character (Latin-1) and `1`
//! for UTF-16LE. The length counts characters or UTF-16 units.
//!
//! [`BinaryEntryType`]: crate::BinaryEntryType

mod reader;
mod writer;

pub use reader::{BinaryDataReader, PeekedEntry};
pub use writer::{BinaryDataWriter, BinaryWriterOptions};

/// String width flag for one byte per character.
pub const STRING_FLAG_8BIT: u8 = 0;
/// String width flag for UTF-16LE.
pub const STRING_FLAG_16BIT: u8 = 1;
