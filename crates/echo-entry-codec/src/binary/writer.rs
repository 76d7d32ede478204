// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::io::Write;

use uuid::Uuid;

use super::{STRING_FLAG_8BIT, STRING_FLAG_16BIT};
use crate::context::{DebugContext, SerializationContext, TypeBinder};
use crate::element::{PrimitiveElement, char_to_unit};
use crate::entry::{BinaryEntryType, NodeStack};
use crate::error::WriteError;
use crate::io::{DEFAULT_BUFFER_CAPACITY, WriteBuffer};
use crate::numeric::Decimal;
use crate::registry::{TypeSlot, WriterSession};
use crate::writer::DataWriter;

type Tag = BinaryEntryType;

/// Configuration for [`BinaryDataWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryWriterOptions {
    /// Write strings whose characters all fit one byte with width flag `0`.
    pub compress_strings_to_8bit: bool,
    /// Size of the batching buffer in bytes.
    pub buffer_capacity: usize,
}

impl Default for BinaryWriterOptions {
    fn default() -> Self {
        Self { compress_strings_to_8bit: false, buffer_capacity: DEFAULT_BUFFER_CAPACITY }
    }
}

/// Writes entries in the compact binary encoding.
pub struct BinaryDataWriter<W: Write, B: TypeBinder> {
    sink: WriteBuffer<W>,
    context: SerializationContext<B>,
    session: WriterSession<B::Type>,
    options: BinaryWriterOptions,
}

impl<W: Write, B: TypeBinder> BinaryDataWriter<W, B> {
    /// Writer with default options.
    pub fn new(stream: W, context: SerializationContext<B>) -> Self {
        Self::with_options(stream, context, BinaryWriterOptions::default())
    }

    /// Writer with explicit options.
    pub fn with_options(
        stream: W,
        context: SerializationContext<B>,
        options: BinaryWriterOptions,
    ) -> Self {
        Self {
            sink: WriteBuffer::new(stream, options.buffer_capacity),
            context,
            session: WriterSession::default(),
            options,
        }
    }

    /// Active options.
    pub fn options(&self) -> &BinaryWriterOptions {
        &self.options
    }

    /// Serialization context.
    pub fn context(&self) -> &SerializationContext<B> {
        &self.context
    }

    /// Current session state.
    pub fn session(&self) -> &WriterSession<B::Type> {
        &self.session
    }

    /// Underlying stream; buffered bytes may not have reached it yet.
    pub fn get_ref(&self) -> &W {
        self.sink.get_ref()
    }

    /// Flushes and returns the underlying stream.
    ///
    /// # Errors
    /// Propagates write errors from the stream.
    pub fn into_inner(self) -> Result<W, WriteError> {
        Ok(self.sink.into_inner()?)
    }

    fn write_tag(&mut self, tag: Tag) -> Result<(), WriteError> {
        self.sink.ensure_space(1)?;
        self.sink.push(tag as u8);
        Ok(())
    }

    fn write_raw<const N: usize>(&mut self, bytes: [u8; N]) -> Result<(), WriteError> {
        self.sink.ensure_space(N)?;
        self.sink.extend(&bytes);
        Ok(())
    }

    fn write_header(
        &mut self,
        name: Option<&str>,
        named: Tag,
        unnamed: Tag,
    ) -> Result<(), WriteError> {
        self.write_tag(Tag::select(name.is_some(), named, unnamed))?;
        if let Some(name) = name {
            self.write_string_value(name)?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        if self.sink.try_ensure_space(bytes.len())? {
            self.sink.extend(bytes);
        } else {
            self.sink.write_direct(bytes)?;
        }
        Ok(())
    }

    fn write_string_value(&mut self, value: &str) -> Result<(), WriteError> {
        let latin1 =
            self.options.compress_strings_to_8bit && value.chars().all(|c| u32::from(c) <= 0xFF);
        if latin1 {
            let len = value.chars().count();
            let encoded_len = i32::try_from(len).map_err(|_| WriteError::StringTooLong(len))?;
            self.write_raw([STRING_FLAG_8BIT])?;
            self.write_raw(encoded_len.to_le_bytes())?;
            if self.sink.try_ensure_space(len)? {
                for c in value.chars() {
                    self.sink.push(u8::try_from(u32::from(c)).unwrap_or(b'?'));
                }
            } else {
                let bytes: Vec<u8> =
                    value.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect();
                self.sink.write_direct(&bytes)?;
            }
        } else {
            let units = value.encode_utf16().count();
            let encoded_len = i32::try_from(units).map_err(|_| WriteError::StringTooLong(units))?;
            self.write_raw([STRING_FLAG_16BIT])?;
            self.write_raw(encoded_len.to_le_bytes())?;
            if self.sink.try_ensure_space(units * 2)? {
                for unit in value.encode_utf16() {
                    self.sink.extend(&unit.to_le_bytes());
                }
            } else {
                let bytes: Vec<u8> = value.encode_utf16().flat_map(u16::to_le_bytes).collect();
                self.sink.write_direct(&bytes)?;
            }
        }
        Ok(())
    }

    fn write_type(&mut self, ty: Option<&B::Type>) -> Result<(), WriteError> {
        let Some(ty) = ty else {
            return self.write_tag(Tag::UnnamedNull);
        };
        match self.session.types.register(ty) {
            TypeSlot::Seen(id) => {
                self.write_tag(Tag::TypeID)?;
                self.write_raw(id.to_le_bytes())
            }
            TypeSlot::New(id) => {
                self.write_tag(Tag::TypeName)?;
                self.write_raw(id.to_le_bytes())?;
                let name = self.context.bind_to_name(ty);
                self.write_string_value(&name)
            }
        }
    }
}

impl<W: Write, B: TypeBinder> DataWriter for BinaryDataWriter<W, B> {
    type Type = B::Type;

    fn begin_reference_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&B::Type>,
        id: i32,
    ) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedStartOfReferenceNode, Tag::UnnamedStartOfReferenceNode)?;
        self.write_type(ty)?;
        self.write_raw(id.to_le_bytes())?;
        if !self.session.references.open(id) {
            self.context.log_warning(&format!(
                "Reference node id {id} was opened more than once in this session"
            ));
        }
        self.session.nodes.push_node(name.map(str::to_owned), id, ty.cloned());
        Ok(())
    }

    fn begin_struct_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&B::Type>,
    ) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedStartOfStructNode, Tag::UnnamedStartOfStructNode)?;
        self.write_type(ty)?;
        self.session.nodes.push_node(name.map(str::to_owned), -1, ty.cloned());
        Ok(())
    }

    fn end_node(&mut self, name: Option<&str>) -> Result<(), WriteError> {
        self.session.nodes.pop_node(name)?;
        self.write_tag(Tag::EndOfNode)
    }

    fn begin_array_node(&mut self, length: i64) -> Result<(), WriteError> {
        self.write_tag(Tag::StartOfArray)?;
        self.write_raw(length.to_le_bytes())?;
        self.session.nodes.push_array();
        Ok(())
    }

    fn end_array_node(&mut self) -> Result<(), WriteError> {
        self.session.nodes.pop_array()?;
        self.write_tag(Tag::EndOfArray)
    }

    fn write_primitive_array<T: PrimitiveElement>(
        &mut self,
        array: &[T],
    ) -> Result<(), WriteError> {
        let too_long = || WriteError::ArrayTooLong(array.len());
        let count = i32::try_from(array.len()).map_err(|_| too_long())?;
        let width = i32::try_from(T::WIDTH).map_err(|_| too_long())?;
        let byte_len = array.len().checked_mul(T::WIDTH).ok_or_else(too_long)?;

        self.write_tag(Tag::PrimitiveArray)?;
        self.write_raw(count.to_le_bytes())?;
        self.write_raw(width.to_le_bytes())?;

        if let Some(bytes) = T::as_le_bytes(array) {
            if T::WIDTH == 1 {
                self.sink.write_direct(bytes)?;
            } else {
                self.write_bytes(bytes)?;
            }
        } else if self.sink.try_ensure_space(byte_len)? {
            for element in array {
                element.encode_le(self.sink.slot(T::WIDTH));
            }
        } else {
            for element in array {
                self.sink.ensure_space(T::WIDTH)?;
                element.encode_le(self.sink.slot(T::WIDTH));
            }
        }
        Ok(())
    }

    fn write_i8(&mut self, name: Option<&str>, value: i8) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedSByte, Tag::UnnamedSByte)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_u8(&mut self, name: Option<&str>, value: u8) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedByte, Tag::UnnamedByte)?;
        self.write_raw([value])
    }

    fn write_i16(&mut self, name: Option<&str>, value: i16) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedShort, Tag::UnnamedShort)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_u16(&mut self, name: Option<&str>, value: u16) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedUShort, Tag::UnnamedUShort)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_i32(&mut self, name: Option<&str>, value: i32) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedInt, Tag::UnnamedInt)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_u32(&mut self, name: Option<&str>, value: u32) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedUInt, Tag::UnnamedUInt)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_i64(&mut self, name: Option<&str>, value: i64) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedLong, Tag::UnnamedLong)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_u64(&mut self, name: Option<&str>, value: u64) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedULong, Tag::UnnamedULong)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_f32(&mut self, name: Option<&str>, value: f32) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedFloat, Tag::UnnamedFloat)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_f64(&mut self, name: Option<&str>, value: f64) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedDouble, Tag::UnnamedDouble)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_decimal(&mut self, name: Option<&str>, value: Decimal) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedDecimal, Tag::UnnamedDecimal)?;
        self.write_raw(value.to_le_bytes())
    }

    fn write_char(&mut self, name: Option<&str>, value: char) -> Result<(), WriteError> {
        let unit = char_to_unit(value).unwrap_or_else(|| {
            self.context.log_warning(&format!(
                "Character {value:?} does not fit one UTF-16 unit and is written as '\\0'"
            ));
            0
        });
        self.write_header(name, Tag::NamedChar, Tag::UnnamedChar)?;
        self.write_raw(unit.to_le_bytes())
    }

    fn write_string(&mut self, name: Option<&str>, value: &str) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedString, Tag::UnnamedString)?;
        self.write_string_value(value)
    }

    fn write_guid(&mut self, name: Option<&str>, value: Uuid) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedGuid, Tag::UnnamedGuid)?;
        self.write_raw(value.to_bytes_le())
    }

    fn write_bool(&mut self, name: Option<&str>, value: bool) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedBoolean, Tag::UnnamedBoolean)?;
        self.write_raw([u8::from(value)])
    }

    fn write_null(&mut self, name: Option<&str>) -> Result<(), WriteError> {
        self.write_header(name, Tag::NamedNull, Tag::UnnamedNull)
    }

    fn write_internal_reference(&mut self, name: Option<&str>, id: i32) -> Result<(), WriteError> {
        if !self.session.references.contains(id) {
            self.context.log_warning(&format!(
                "Internal reference to id {id}, which no node in this session has opened"
            ));
        }
        self.write_header(name, Tag::NamedInternalReference, Tag::UnnamedInternalReference)?;
        self.write_raw(id.to_le_bytes())
    }

    fn write_external_reference_by_index(
        &mut self,
        name: Option<&str>,
        index: i32,
    ) -> Result<(), WriteError> {
        self.write_header(
            name,
            Tag::NamedExternalReferenceByIndex,
            Tag::UnnamedExternalReferenceByIndex,
        )?;
        self.write_raw(index.to_le_bytes())
    }

    fn write_external_reference_by_guid(
        &mut self,
        name: Option<&str>,
        guid: Uuid,
    ) -> Result<(), WriteError> {
        self.write_header(
            name,
            Tag::NamedExternalReferenceByGuid,
            Tag::UnnamedExternalReferenceByGuid,
        )?;
        self.write_raw(guid.to_bytes_le())
    }

    fn write_external_reference_by_string(
        &mut self,
        name: Option<&str>,
        id: &str,
    ) -> Result<(), WriteError> {
        self.write_header(
            name,
            Tag::NamedExternalReferenceByString,
            Tag::UnnamedExternalReferenceByString,
        )?;
        self.write_string_value(id)
    }

    fn flush_to_stream(&mut self) -> Result<(), WriteError> {
        Ok(self.sink.flush()?)
    }

    fn prepare_new_serialization_session(&mut self) {
        self.session = WriterSession::default();
    }

    fn data_dump(&self) -> String {
        format!("Binary hex dump: {}", hex::encode_upper(self.sink.pending()))
    }

    fn nodes(&self) -> &NodeStack<B::Type> {
        &self.session.nodes
    }
}
