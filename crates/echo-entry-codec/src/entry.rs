// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entry vocabulary shared by the binary and JSON codecs.
//!
//! A stream is a flat sequence of entries. Structure comes from paired
//! markers: `StartOfNode`/`EndOfNode` and `StartOfArray`/`EndOfArray`.
//! Writers and readers track the open markers with a [`NodeStack`].

use std::fmt;

use uuid::Uuid;

use crate::error::WriteError;
use crate::numeric::Decimal;

/// Logical kind of one entry, independent of the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Unrecognised or corrupt entry.
    Invalid,
    /// Opens a node (reference node or struct node).
    StartOfNode,
    /// Closes the innermost node.
    EndOfNode,
    /// Opens a regular array; carries its declared length.
    StartOfArray,
    /// Closes the innermost array.
    EndOfArray,
    /// A packed array of primitive elements.
    PrimitiveArray,
    /// Reference to a node id inside the same stream.
    InternalReference,
    /// Reference to an external object by index.
    ExternalReferenceByIndex,
    /// Reference to an external object by GUID.
    ExternalReferenceByGuid,
    /// Reference to an external object by string id.
    ExternalReferenceByString,
    /// Any integer width.
    Integer,
    /// `f32`, `f64` or decimal.
    FloatingPoint,
    /// String or char.
    String,
    /// A GUID value.
    Guid,
    /// A boolean value.
    Boolean,
    /// Explicit null.
    Null,
    /// No more entries.
    EndOfStream,
}

macro_rules! binary_entry_types {
    ($($(#[$meta:meta])* $name:ident = $tag:literal => $entry:expr,)*) => {
        /// Wire tag written in front of every binary entry.
        ///
        /// Named variants are followed by the entry name (a binary string),
        /// unnamed variants go straight to the payload.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BinaryEntryType {
            $($(#[$meta])* $name = $tag,)*
        }

        impl BinaryEntryType {
            /// Logical entry kind for this tag.
            ///
            /// Returns `None` for `TypeName` and `TypeID`, which only appear
            /// inside node headers and never in entry position.
            pub const fn entry_type(self) -> Option<EntryType> {
                match self {
                    $(Self::$name => $entry,)*
                }
            }
        }

        impl TryFrom<u8> for BinaryEntryType {
            type Error = u8;

            fn try_from(tag: u8) -> Result<Self, u8> {
                match tag {
                    $($tag => Ok(Self::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

binary_entry_types! {
    /// Corrupt entry marker.
    Invalid = 0x00 => Some(EntryType::Invalid),
    /// Named reference node header.
    NamedStartOfReferenceNode = 0x01 => Some(EntryType::StartOfNode),
    /// Unnamed reference node header.
    UnnamedStartOfReferenceNode = 0x02 => Some(EntryType::StartOfNode),
    /// Named struct node header.
    NamedStartOfStructNode = 0x03 => Some(EntryType::StartOfNode),
    /// Unnamed struct node header.
    UnnamedStartOfStructNode = 0x04 => Some(EntryType::StartOfNode),
    /// End of the innermost node.
    EndOfNode = 0x05 => Some(EntryType::EndOfNode),
    /// Array header followed by an i64 length.
    StartOfArray = 0x06 => Some(EntryType::StartOfArray),
    /// End of the innermost array.
    EndOfArray = 0x07 => Some(EntryType::EndOfArray),
    /// Primitive array header: i32 count, i32 bytes per element, payload.
    PrimitiveArray = 0x08 => Some(EntryType::PrimitiveArray),
    /// Named internal reference (i32).
    NamedInternalReference = 0x09 => Some(EntryType::InternalReference),
    /// Unnamed internal reference (i32).
    UnnamedInternalReference = 0x0A => Some(EntryType::InternalReference),
    /// Named external reference by index (i32).
    NamedExternalReferenceByIndex = 0x0B => Some(EntryType::ExternalReferenceByIndex),
    /// Unnamed external reference by index (i32).
    UnnamedExternalReferenceByIndex = 0x0C => Some(EntryType::ExternalReferenceByIndex),
    /// Named external reference by GUID (16 bytes).
    NamedExternalReferenceByGuid = 0x0D => Some(EntryType::ExternalReferenceByGuid),
    /// Unnamed external reference by GUID (16 bytes).
    UnnamedExternalReferenceByGuid = 0x0E => Some(EntryType::ExternalReferenceByGuid),
    /// Named `i8`.
    NamedSByte = 0x0F => Some(EntryType::Integer),
    /// Unnamed `i8`.
    UnnamedSByte = 0x10 => Some(EntryType::Integer),
    /// Named `u8`.
    NamedByte = 0x11 => Some(EntryType::Integer),
    /// Unnamed `u8`.
    UnnamedByte = 0x12 => Some(EntryType::Integer),
    /// Named `i16`.
    NamedShort = 0x13 => Some(EntryType::Integer),
    /// Unnamed `i16`.
    UnnamedShort = 0x14 => Some(EntryType::Integer),
    /// Named `u16`.
    NamedUShort = 0x15 => Some(EntryType::Integer),
    /// Unnamed `u16`.
    UnnamedUShort = 0x16 => Some(EntryType::Integer),
    /// Named `i32`.
    NamedInt = 0x17 => Some(EntryType::Integer),
    /// Unnamed `i32`.
    UnnamedInt = 0x18 => Some(EntryType::Integer),
    /// Named `u32`.
    NamedUInt = 0x19 => Some(EntryType::Integer),
    /// Unnamed `u32`.
    UnnamedUInt = 0x1A => Some(EntryType::Integer),
    /// Named `i64`.
    NamedLong = 0x1B => Some(EntryType::Integer),
    /// Unnamed `i64`.
    UnnamedLong = 0x1C => Some(EntryType::Integer),
    /// Named `u64`.
    NamedULong = 0x1D => Some(EntryType::Integer),
    /// Unnamed `u64`.
    UnnamedULong = 0x1E => Some(EntryType::Integer),
    /// Named `f32`.
    NamedFloat = 0x1F => Some(EntryType::FloatingPoint),
    /// Unnamed `f32`.
    UnnamedFloat = 0x20 => Some(EntryType::FloatingPoint),
    /// Named `f64`.
    NamedDouble = 0x21 => Some(EntryType::FloatingPoint),
    /// Unnamed `f64`.
    UnnamedDouble = 0x22 => Some(EntryType::FloatingPoint),
    /// Named decimal (16 bytes).
    NamedDecimal = 0x23 => Some(EntryType::FloatingPoint),
    /// Unnamed decimal (16 bytes).
    UnnamedDecimal = 0x24 => Some(EntryType::FloatingPoint),
    /// Named char (one UTF-16 unit).
    NamedChar = 0x25 => Some(EntryType::String),
    /// Unnamed char (one UTF-16 unit).
    UnnamedChar = 0x26 => Some(EntryType::String),
    /// Named string.
    NamedString = 0x27 => Some(EntryType::String),
    /// Unnamed string.
    UnnamedString = 0x28 => Some(EntryType::String),
    /// Named GUID (16 bytes).
    NamedGuid = 0x29 => Some(EntryType::Guid),
    /// Unnamed GUID (16 bytes).
    UnnamedGuid = 0x2A => Some(EntryType::Guid),
    /// Named boolean (1 byte).
    NamedBoolean = 0x2B => Some(EntryType::Boolean),
    /// Unnamed boolean (1 byte).
    UnnamedBoolean = 0x2C => Some(EntryType::Boolean),
    /// Named null.
    NamedNull = 0x2D => Some(EntryType::Null),
    /// Unnamed null; also the "no type" marker inside node headers.
    UnnamedNull = 0x2E => Some(EntryType::Null),
    /// Type entry introducing a new type id and its name.
    TypeName = 0x2F => None,
    /// Type entry referring to a type id seen earlier.
    TypeID = 0x30 => None,
    /// Explicit end of stream.
    EndOfStream = 0x31 => Some(EntryType::EndOfStream),
    /// Named external reference by string.
    NamedExternalReferenceByString = 0x32 => Some(EntryType::ExternalReferenceByString),
    /// Unnamed external reference by string.
    UnnamedExternalReferenceByString = 0x33 => Some(EntryType::ExternalReferenceByString),
}

impl BinaryEntryType {
    /// Picks the named or unnamed tag depending on whether a name is written.
    pub const fn select(named: bool, named_tag: Self, unnamed_tag: Self) -> Self {
        if named { named_tag } else { unnamed_tag }
    }

    /// Whether the tag is followed by an entry name.
    pub const fn is_named(self) -> bool {
        matches!(
            self,
            Self::NamedStartOfReferenceNode
                | Self::NamedStartOfStructNode
                | Self::NamedInternalReference
                | Self::NamedExternalReferenceByIndex
                | Self::NamedExternalReferenceByGuid
                | Self::NamedExternalReferenceByString
                | Self::NamedSByte
                | Self::NamedByte
                | Self::NamedShort
                | Self::NamedUShort
                | Self::NamedInt
                | Self::NamedUInt
                | Self::NamedLong
                | Self::NamedULong
                | Self::NamedFloat
                | Self::NamedDouble
                | Self::NamedDecimal
                | Self::NamedChar
                | Self::NamedString
                | Self::NamedGuid
                | Self::NamedBoolean
                | Self::NamedNull
        )
    }

    /// Payload size in bytes for fixed-width entries, or `None` when the
    /// payload is variable (strings, node headers, primitive arrays) or empty.
    pub const fn fixed_payload_len(self) -> Option<usize> {
        match self {
            Self::NamedSByte
            | Self::UnnamedSByte
            | Self::NamedByte
            | Self::UnnamedByte
            | Self::NamedBoolean
            | Self::UnnamedBoolean => Some(1),
            Self::NamedShort
            | Self::UnnamedShort
            | Self::NamedUShort
            | Self::UnnamedUShort
            | Self::NamedChar
            | Self::UnnamedChar => Some(2),
            Self::NamedInt
            | Self::UnnamedInt
            | Self::NamedUInt
            | Self::UnnamedUInt
            | Self::NamedFloat
            | Self::UnnamedFloat
            | Self::NamedInternalReference
            | Self::UnnamedInternalReference
            | Self::NamedExternalReferenceByIndex
            | Self::UnnamedExternalReferenceByIndex => Some(4),
            Self::NamedLong
            | Self::UnnamedLong
            | Self::NamedULong
            | Self::UnnamedULong
            | Self::NamedDouble
            | Self::UnnamedDouble
            | Self::StartOfArray => Some(8),
            Self::NamedDecimal
            | Self::UnnamedDecimal
            | Self::NamedGuid
            | Self::UnnamedGuid
            | Self::NamedExternalReferenceByGuid
            | Self::UnnamedExternalReferenceByGuid => Some(16),
            _ => None,
        }
    }
}

/// One open marker on a [`NodeStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo<T> {
    /// Node name, if the node was written with one.
    pub name: Option<String>,
    /// Reference id, or `-1` for struct nodes and arrays.
    pub id: i32,
    /// Bound type of the node, if any.
    pub ty: Option<T>,
    /// Whether this marker is an array rather than a node.
    pub is_array: bool,
}

impl<T> NodeInfo<T> {
    fn array() -> Self {
        Self { name: None, id: -1, ty: None, is_array: true }
    }
}

/// Stack of open nodes and arrays.
///
/// Writers pop strictly and report misuse as [`WriteError`]. Readers pop
/// leniently through [`NodeStack::unwind_node`] and
/// [`NodeStack::unwind_array`], logging layout mismatches instead.
#[derive(Debug, Clone)]
pub struct NodeStack<T> {
    nodes: Vec<NodeInfo<T>>,
}

impl<T> Default for NodeStack<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T> NodeStack<T> {
    /// Number of open markers (nodes and arrays).
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    /// Innermost open marker.
    pub fn current(&self) -> Option<&NodeInfo<T>> {
        self.nodes.last()
    }

    /// Name of the innermost open node, if it has one.
    pub fn current_name(&self) -> Option<&str> {
        self.current().and_then(|node| node.name.as_deref())
    }

    /// Id of the innermost marker, `-1` when nothing is open.
    pub fn current_id(&self) -> i32 {
        self.current().map_or(-1, |node| node.id)
    }

    /// Whether the innermost marker is an array.
    pub fn is_in_array(&self) -> bool {
        self.current().is_some_and(|node| node.is_array)
    }

    /// Opens a node marker.
    pub fn push_node(&mut self, name: Option<String>, id: i32, ty: Option<T>) {
        self.nodes.push(NodeInfo { name, id, ty, is_array: false });
    }

    /// Opens an array marker.
    pub fn push_array(&mut self) {
        self.nodes.push(NodeInfo::array());
    }

    /// Closes the innermost node, which must carry `name`.
    ///
    /// # Errors
    /// [`WriteError::NoNodeToPop`] on an empty stack,
    /// [`WriteError::NotInNode`] when an array is open, and
    /// [`WriteError::NodeNameMismatch`] when the names differ.
    pub fn pop_node(&mut self, name: Option<&str>) -> Result<NodeInfo<T>, WriteError> {
        let top = self.nodes.last().ok_or(WriteError::NoNodeToPop)?;
        if top.is_array {
            return Err(WriteError::NotInNode);
        }
        if top.name.as_deref() != name {
            return Err(WriteError::NodeNameMismatch {
                expected: top.name.clone(),
                found: name.map(str::to_owned),
            });
        }
        self.nodes.pop().ok_or(WriteError::NoNodeToPop)
    }

    /// Closes the innermost array.
    ///
    /// # Errors
    /// [`WriteError::NoNodeToPop`] on an empty stack and
    /// [`WriteError::NotInArray`] when a node is open instead.
    pub fn pop_array(&mut self) -> Result<(), WriteError> {
        match self.nodes.last() {
            None => Err(WriteError::NoNodeToPop),
            Some(top) if !top.is_array => Err(WriteError::NotInArray),
            Some(_) => {
                self.nodes.pop();
                Ok(())
            }
        }
    }

    /// Closes the innermost node, discarding array markers opened above it.
    ///
    /// Returns the node and the number of discarded array markers, or
    /// `None` if no node was open.
    pub fn unwind_node(&mut self) -> Option<(NodeInfo<T>, usize)> {
        let position = self.nodes.iter().rposition(|node| !node.is_array)?;
        let discarded = self.nodes.len() - position - 1;
        self.nodes.truncate(position + 1);
        self.nodes.pop().map(|node| (node, discarded))
    }

    /// Closes the innermost array, discarding node markers opened above it.
    ///
    /// Returns the number of discarded node markers, or `None` if no array
    /// was open.
    pub fn unwind_array(&mut self) -> Option<usize> {
        let position = self.nodes.iter().rposition(|node| node.is_array)?;
        let discarded = self.nodes.len() - position - 1;
        self.nodes.truncate(position);
        Some(discarded)
    }

    /// Drops the innermost marker, whatever it is.
    pub(crate) fn pop_any(&mut self) {
        self.nodes.pop();
    }
}

/// A single primitive value together with its exact kind.
///
/// Used for dynamic dispatch into the typed writer methods and by
/// [`DataReader::read_primitive`](crate::DataReader::read_primitive).
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// `i8`
    SByte(i8),
    /// `u8`
    Byte(u8),
    /// `i16`
    Short(i16),
    /// `u16`
    UShort(u16),
    /// `i32`
    Int(i32),
    /// `u32`
    UInt(u32),
    /// `i64`
    Long(i64),
    /// `u64`
    ULong(u64),
    /// `f32`
    Float(f32),
    /// `f64`
    Double(f64),
    /// 96-bit scaled decimal.
    Decimal(Decimal),
    /// Single character.
    Char(char),
    /// String.
    String(String),
    /// GUID.
    Guid(Uuid),
    /// Boolean.
    Boolean(bool),
    /// Explicit null.
    Null,
}

impl Primitive {
    /// Logical entry kind this value is written as.
    pub const fn entry_type(&self) -> EntryType {
        match self {
            Self::SByte(_)
            | Self::Byte(_)
            | Self::Short(_)
            | Self::UShort(_)
            | Self::Int(_)
            | Self::UInt(_)
            | Self::Long(_)
            | Self::ULong(_) => EntryType::Integer,
            Self::Float(_) | Self::Double(_) | Self::Decimal(_) => EntryType::FloatingPoint,
            Self::Char(_) | Self::String(_) => EntryType::String,
            Self::Guid(_) => EntryType::Guid,
            Self::Boolean(_) => EntryType::Boolean,
            Self::Null => EntryType::Null,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SByte(v) => write!(f, "{v}i8"),
            Self::Byte(v) => write!(f, "{v}u8"),
            Self::Short(v) => write!(f, "{v}i16"),
            Self::UShort(v) => write!(f, "{v}u16"),
            Self::Int(v) => write!(f, "{v}i32"),
            Self::UInt(v) => write!(f, "{v}u32"),
            Self::Long(v) => write!(f, "{v}i64"),
            Self::ULong(v) => write!(f, "{v}u64"),
            Self::Float(v) => write!(f, "{v:?}f32"),
            Self::Double(v) => write!(f, "{v:?}f64"),
            Self::Decimal(v) => write!(f, "{v}m"),
            Self::Char(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Guid(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
        }
    }
}
