// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The writer contract shared by both encodings.

use uuid::Uuid;

use crate::element::PrimitiveElement;
use crate::entry::{NodeStack, Primitive};
use crate::error::WriteError;
use crate::numeric::Decimal;

/// Emits a stream of named or unnamed entries.
///
/// Every entry method takes an optional name: named entries are object
/// members, unnamed entries are array elements. Nodes and arrays must be
/// closed in the order they were opened.
pub trait DataWriter {
    /// Type descriptor written into node headers.
    type Type;

    /// Opens a node that carries a reference `id` other entries may point at.
    fn begin_reference_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&Self::Type>,
        id: i32,
    ) -> Result<(), WriteError>;

    /// Opens a node without identity.
    fn begin_struct_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&Self::Type>,
    ) -> Result<(), WriteError>;

    /// Closes the innermost node, which must have been opened with `name`.
    fn end_node(&mut self, name: Option<&str>) -> Result<(), WriteError>;

    /// Opens an array of `length` entries.
    fn begin_array_node(&mut self, length: i64) -> Result<(), WriteError>;

    /// Closes the innermost array.
    fn end_array_node(&mut self) -> Result<(), WriteError>;

    /// Writes a whole array of primitives as one entry.
    fn write_primitive_array<T: PrimitiveElement>(&mut self, array: &[T]) -> Result<(), WriteError>;

    /// Writes an `i8`.
    fn write_i8(&mut self, name: Option<&str>, value: i8) -> Result<(), WriteError>;
    /// Writes a `u8`.
    fn write_u8(&mut self, name: Option<&str>, value: u8) -> Result<(), WriteError>;
    /// Writes an `i16`.
    fn write_i16(&mut self, name: Option<&str>, value: i16) -> Result<(), WriteError>;
    /// Writes a `u16`.
    fn write_u16(&mut self, name: Option<&str>, value: u16) -> Result<(), WriteError>;
    /// Writes an `i32`.
    fn write_i32(&mut self, name: Option<&str>, value: i32) -> Result<(), WriteError>;
    /// Writes a `u32`.
    fn write_u32(&mut self, name: Option<&str>, value: u32) -> Result<(), WriteError>;
    /// Writes an `i64`.
    fn write_i64(&mut self, name: Option<&str>, value: i64) -> Result<(), WriteError>;
    /// Writes a `u64`.
    fn write_u64(&mut self, name: Option<&str>, value: u64) -> Result<(), WriteError>;
    /// Writes an `f32`.
    fn write_f32(&mut self, name: Option<&str>, value: f32) -> Result<(), WriteError>;
    /// Writes an `f64`.
    fn write_f64(&mut self, name: Option<&str>, value: f64) -> Result<(), WriteError>;
    /// Writes a decimal.
    fn write_decimal(&mut self, name: Option<&str>, value: Decimal) -> Result<(), WriteError>;
    /// Writes a single character.
    fn write_char(&mut self, name: Option<&str>, value: char) -> Result<(), WriteError>;
    /// Writes a string.
    fn write_string(&mut self, name: Option<&str>, value: &str) -> Result<(), WriteError>;
    /// Writes a GUID.
    fn write_guid(&mut self, name: Option<&str>, value: Uuid) -> Result<(), WriteError>;
    /// Writes a boolean.
    fn write_bool(&mut self, name: Option<&str>, value: bool) -> Result<(), WriteError>;
    /// Writes an explicit null.
    fn write_null(&mut self, name: Option<&str>) -> Result<(), WriteError>;

    /// Writes a reference to a node id in this stream.
    fn write_internal_reference(&mut self, name: Option<&str>, id: i32) -> Result<(), WriteError>;
    /// Writes a reference to an external object by index.
    fn write_external_reference_by_index(
        &mut self,
        name: Option<&str>,
        index: i32,
    ) -> Result<(), WriteError>;
    /// Writes a reference to an external object by GUID.
    fn write_external_reference_by_guid(
        &mut self,
        name: Option<&str>,
        guid: Uuid,
    ) -> Result<(), WriteError>;
    /// Writes a reference to an external object by string id.
    fn write_external_reference_by_string(
        &mut self,
        name: Option<&str>,
        id: &str,
    ) -> Result<(), WriteError>;

    /// Writes any primitive through the matching typed method.
    fn write_primitive(&mut self, name: Option<&str>, value: &Primitive) -> Result<(), WriteError> {
        match value {
            Primitive::SByte(v) => self.write_i8(name, *v),
            Primitive::Byte(v) => self.write_u8(name, *v),
            Primitive::Short(v) => self.write_i16(name, *v),
            Primitive::UShort(v) => self.write_u16(name, *v),
            Primitive::Int(v) => self.write_i32(name, *v),
            Primitive::UInt(v) => self.write_u32(name, *v),
            Primitive::Long(v) => self.write_i64(name, *v),
            Primitive::ULong(v) => self.write_u64(name, *v),
            Primitive::Float(v) => self.write_f32(name, *v),
            Primitive::Double(v) => self.write_f64(name, *v),
            Primitive::Decimal(v) => self.write_decimal(name, *v),
            Primitive::Char(v) => self.write_char(name, *v),
            Primitive::String(v) => self.write_string(name, v),
            Primitive::Guid(v) => self.write_guid(name, *v),
            Primitive::Boolean(v) => self.write_bool(name, *v),
            Primitive::Null => self.write_null(name),
        }
    }

    /// Pushes buffered output to the stream and flushes it.
    fn flush_to_stream(&mut self) -> Result<(), WriteError>;

    /// Starts a fresh session: type ids, opened references and the node
    /// stack are forgotten. Buffered output is kept.
    fn prepare_new_serialization_session(&mut self);

    /// Diagnostic rendering of buffered, not yet flushed output.
    fn data_dump(&self) -> String;

    /// Open nodes and arrays.
    fn nodes(&self) -> &NodeStack<Self::Type>;
}
