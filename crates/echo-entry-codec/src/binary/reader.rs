// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::char::REPLACEMENT_CHARACTER;
use std::io::Read;

use uuid::Uuid;

use super::{STRING_FLAG_8BIT, STRING_FLAG_16BIT};
use crate::context::{DebugContext, SerializationContext, TypeBinder};
use crate::element::{PrimitiveElement, unit_to_char};
use crate::entry::{BinaryEntryType, EntryType, NodeStack, Primitive};
use crate::io::{ByteSource, SliceSource, StreamSource};
use crate::numeric::{Decimal, f64_to_f32, f64_to_i64, f64_to_u64};
use crate::reader::{DataReader, EnteredNode};
use crate::registry::ReaderSession;

type Tag = BinaryEntryType;

/// Entry header cached by `peek_entry` until the entry is consumed.
#[derive(Debug, Clone)]
pub struct PeekedEntry {
    tag: Tag,
    entry: EntryType,
    name: Option<String>,
}

impl PeekedEntry {
    const fn bare(tag: Tag, entry: EntryType) -> Self {
        Self { tag, entry, name: None }
    }
}

enum Number {
    Signed(i64),
    Unsigned(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
}

/// Reads entries in the compact binary encoding.
pub struct BinaryDataReader<S: ByteSource, B: TypeBinder> {
    source: S,
    context: SerializationContext<B>,
    session: ReaderSession<B::Type, PeekedEntry>,
}

impl<'a, B: TypeBinder> BinaryDataReader<SliceSource<'a>, B> {
    /// Reader over an in-memory buffer.
    pub fn from_slice(bytes: &'a [u8], context: SerializationContext<B>) -> Self {
        Self::new(SliceSource::new(bytes), context)
    }
}

impl<R: Read, B: TypeBinder> BinaryDataReader<StreamSource<R>, B> {
    /// Reader pulling from a stream through a buffered window.
    pub fn from_reader(stream: R, context: SerializationContext<B>) -> Self {
        Self::new(StreamSource::new(stream), context)
    }
}

impl<S: ByteSource, B: TypeBinder> BinaryDataReader<S, B> {
    /// Reader over any byte source.
    pub fn new(source: S, context: SerializationContext<B>) -> Self {
        Self { source, context, session: ReaderSession::default() }
    }

    /// Serialization context.
    pub fn context(&self) -> &SerializationContext<B> {
        &self.context
    }

    /// Current session state.
    pub fn session(&self) -> &ReaderSession<B::Type, PeekedEntry> {
        &self.session
    }

    /// Returns the byte source, positioned after the last consumed entry
    /// header (a peeked header is lost).
    pub fn into_source(self) -> S {
        self.source
    }

    fn has_data(&mut self, n: usize) -> bool {
        match self.source.fill(n) {
            Ok(available) => available,
            Err(err) => {
                self.context.log_error(&format!("Reading from the stream failed: {err}"));
                false
            }
        }
    }

    /// Consumes whatever is left after a truncated read.
    fn exhaust(&mut self) {
        let rest = self.source.window().len();
        self.source.consume(rest);
    }

    fn read_bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        if !self.has_data(N) {
            self.context.log_error(&format!(
                "Insufficient data: expected {N} more bytes at depth {}",
                self.session.nodes.depth()
            ));
            self.exhaust();
            return None;
        }
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.source.window()[..N]);
        self.source.consume(N);
        Some(raw)
    }

    fn read_i32_value(&mut self) -> Option<i32> {
        self.read_bytes::<4>().map(i32::from_le_bytes)
    }

    fn skip_bytes(&mut self, n: usize) {
        match self.source.skip(n) {
            Ok(true) => {}
            Ok(false) => {
                self.context.log_error(&format!("Insufficient data: could not skip {n} bytes"))
            }
            Err(err) => self.context.log_error(&format!("Reading from the stream failed: {err}")),
        }
    }

    fn read_string_value(&mut self) -> Option<String> {
        let [flag] = self.read_bytes::<1>()?;
        let length = self.read_i32_value()?;
        let Ok(length) = usize::try_from(length) else {
            self.context.log_error(&format!("Invalid string length {length}"));
            return None;
        };
        // Every flag other than 8-bit reads as 16-bit.
        if flag != STRING_FLAG_8BIT && flag != STRING_FLAG_16BIT {
            self.context.log_warning(&format!(
                "Unknown string width flag {flag:#04x}; reading as 16-bit"
            ));
        }
        let byte_len = if flag == STRING_FLAG_8BIT { length } else { length.checked_mul(2)? };
        if !self.has_data(byte_len) {
            self.context.log_error(&format!(
                "Insufficient data: string of {byte_len} bytes is truncated"
            ));
            self.exhaust();
            return None;
        }
        let raw = &self.source.window()[..byte_len];
        let text = if flag == STRING_FLAG_8BIT {
            raw.iter().map(|b| char::from(*b)).collect()
        } else {
            let units = raw.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units).map(|c| c.unwrap_or(REPLACEMENT_CHARACTER)).collect()
        };
        self.source.consume(byte_len);
        Some(text)
    }

    /// Reads the type entry of a node header, registering new type ids.
    fn read_type_entry(&mut self) -> Option<B::Type> {
        let [byte] = self.read_bytes::<1>()?;
        match Tag::try_from(byte) {
            Ok(Tag::UnnamedNull) => None,
            Ok(Tag::TypeID) => {
                let id = self.read_i32_value()?;
                match self.session.types.get(id) {
                    Some(ty) => ty.clone(),
                    None => {
                        self.context.log_error(&format!(
                            "Missing type id during deserialization: {id} at depth {} (node id {})",
                            self.session.nodes.depth(),
                            self.session.nodes.current_id()
                        ));
                        None
                    }
                }
            }
            Ok(Tag::TypeName) => {
                let id = self.read_i32_value()?;
                let name = self.read_string_value()?;
                let ty = self.context.bind_to_type(&name);
                self.session.types.insert(id, ty.clone());
                ty
            }
            _ => {
                self.context.log_error(&format!(
                    "Expected TypeName, TypeID or UnnamedNull for type data, \
                     found entry flag {byte:#04x}"
                ));
                None
            }
        }
    }

    fn peeked_tag(&mut self) -> Tag {
        self.peek_entry();
        self.session.peeked.as_ref().map_or(Tag::EndOfStream, |peeked| peeked.tag)
    }

    fn take_peeked(&mut self) -> Option<PeekedEntry> {
        self.peek_entry();
        self.session.peeked.take()
    }

    fn read_number_payload(&mut self, tag: Tag) -> Option<Number> {
        match tag {
            Tag::NamedSByte | Tag::UnnamedSByte => {
                self.read_bytes::<1>().map(|b| Number::Signed(i8::from_le_bytes(b).into()))
            }
            Tag::NamedByte | Tag::UnnamedByte => {
                self.read_bytes::<1>().map(|[b]| Number::Unsigned(b.into()))
            }
            Tag::NamedShort | Tag::UnnamedShort => {
                self.read_bytes::<2>().map(|b| Number::Signed(i16::from_le_bytes(b).into()))
            }
            Tag::NamedUShort | Tag::UnnamedUShort => {
                self.read_bytes::<2>().map(|b| Number::Unsigned(u16::from_le_bytes(b).into()))
            }
            Tag::NamedInt | Tag::UnnamedInt => {
                self.read_bytes::<4>().map(|b| Number::Signed(i32::from_le_bytes(b).into()))
            }
            Tag::NamedUInt | Tag::UnnamedUInt => {
                self.read_bytes::<4>().map(|b| Number::Unsigned(u32::from_le_bytes(b).into()))
            }
            Tag::NamedLong | Tag::UnnamedLong => {
                self.read_bytes::<8>().map(|b| Number::Signed(i64::from_le_bytes(b)))
            }
            Tag::NamedULong | Tag::UnnamedULong => {
                self.read_bytes::<8>().map(|b| Number::Unsigned(u64::from_le_bytes(b)))
            }
            Tag::NamedFloat | Tag::UnnamedFloat => {
                self.read_bytes::<4>().map(|b| Number::Single(f32::from_le_bytes(b)))
            }
            Tag::NamedDouble | Tag::UnnamedDouble => {
                self.read_bytes::<8>().map(|b| Number::Double(f64::from_le_bytes(b)))
            }
            Tag::NamedDecimal | Tag::UnnamedDecimal => {
                self.read_bytes::<16>().map(|b| Number::Decimal(Decimal::from_le_bytes(b)))
            }
            _ => None,
        }
    }

    /// Consumes the peeked integer or float entry, yielding its payload.
    fn read_number(&mut self) -> Option<Number> {
        match self.peek_entry() {
            EntryType::Integer | EntryType::FloatingPoint => {
                let tag = self.take_peeked()?.tag;
                self.read_number_payload(tag)
            }
            _ => {
                self.skip_entry();
                None
            }
        }
    }

    fn read_fixed<const N: usize>(&mut self, expected: EntryType) -> Option<[u8; N]> {
        if self.peek_entry() != expected {
            self.skip_entry();
            return None;
        }
        self.session.peeked = None;
        self.read_bytes::<N>()
    }

    fn exit_marker(&mut self, end: Tag, stray: Tag, mismatch: &str) -> bool {
        loop {
            let tag = self.peeked_tag();
            if tag == end {
                self.session.peeked = None;
                return true;
            }
            if tag == stray {
                self.context.log_error(mismatch);
                self.session.peeked = None;
                continue;
            }
            if tag == Tag::EndOfStream {
                return false;
            }
            self.skip_entry();
        }
    }
}

impl<S: ByteSource, B: TypeBinder> DataReader for BinaryDataReader<S, B> {
    type Type = B::Type;

    fn peek_entry(&mut self) -> EntryType {
        if let Some(peeked) = &self.session.peeked {
            return peeked.entry;
        }
        let peeked = match self.has_data(1).then(|| self.source.window()[0]) {
            None => PeekedEntry::bare(Tag::EndOfStream, EntryType::EndOfStream),
            Some(byte) => {
                self.source.consume(1);
                match Tag::try_from(byte) {
                    Ok(tag) => match tag.entry_type() {
                        Some(entry) => {
                            let name = if tag.is_named() { self.read_string_value() } else { None };
                            PeekedEntry { tag, entry, name }
                        }
                        None => {
                            self.context.log_error(&format!(
                                "Invalid binary data stream: \
                                 {tag:?} cannot appear in entry position"
                            ));
                            PeekedEntry::bare(Tag::Invalid, EntryType::Invalid)
                        }
                    },
                    Err(byte) => {
                        self.context.log_error(&format!(
                            "Invalid binary data stream: could not parse peeked byte \
                             {byte:#04x} into a known entry type"
                        ));
                        PeekedEntry::bare(Tag::Invalid, EntryType::Invalid)
                    }
                }
            }
        };
        let entry = peeked.entry;
        self.session.peeked = Some(peeked);
        entry
    }

    fn peeked_entry_name(&self) -> Option<&str> {
        self.session.peeked.as_ref().and_then(|peeked| peeked.name.as_deref())
    }

    fn enter_node(&mut self) -> Option<EnteredNode<B::Type>> {
        match self.peeked_tag() {
            Tag::NamedStartOfReferenceNode | Tag::UnnamedStartOfReferenceNode => {
                let name = self.take_peeked().and_then(|peeked| peeked.name);
                let ty = self.read_type_entry();
                let id = self.read_i32_value()?;
                self.session.open_node(name.clone(), id, ty.clone());
                Some(EnteredNode { name, id, ty })
            }
            Tag::NamedStartOfStructNode | Tag::UnnamedStartOfStructNode => {
                let name = self.take_peeked().and_then(|peeked| peeked.name);
                let ty = self.read_type_entry();
                self.session.open_node(name.clone(), -1, ty.clone());
                Some(EnteredNode { name, id: -1, ty })
            }
            _ => {
                self.skip_entry();
                None
            }
        }
    }

    fn exit_node(&mut self) -> bool {
        let found = self.exit_marker(
            Tag::EndOfNode,
            Tag::EndOfArray,
            "Data layout mismatch; skipping past array boundary when exiting node.",
        );
        if found {
            match self.session.nodes.unwind_node() {
                Some((_, 0)) => {}
                Some((node, discarded)) => self.context.log_error(&format!(
                    "Data layout mismatch; node {:?} closed with {discarded} array(s) still open",
                    node.name
                )),
                None => {
                    self.context
                        .log_error("Data layout mismatch; exited a node that was never entered")
                }
            }
        }
        found
    }

    fn enter_array(&mut self) -> Option<i64> {
        if self.peek_entry() != EntryType::StartOfArray {
            self.skip_entry();
            return None;
        }
        self.session.peeked = None;
        self.session.nodes.push_array();
        let Some(raw) = self.read_bytes::<8>() else {
            self.session.nodes.pop_any();
            return None;
        };
        let length = i64::from_le_bytes(raw);
        if length < 0 {
            self.context.log_error(&format!("Invalid array length: {length}."));
            return Some(0);
        }
        Some(length)
    }

    fn exit_array(&mut self) -> bool {
        let found = self.exit_marker(
            Tag::EndOfArray,
            Tag::EndOfNode,
            "Data layout mismatch; skipping past node boundary when exiting array.",
        );
        if found {
            match self.session.nodes.unwind_array() {
                Some(0) => {}
                Some(discarded) => self.context.log_error(&format!(
                    "Data layout mismatch; array closed with {discarded} node(s) still open"
                )),
                None => {
                    self.context
                        .log_error("Data layout mismatch; exited an array that was never entered")
                }
            }
        }
        found
    }

    fn read_primitive_array<T: PrimitiveElement>(&mut self) -> Option<Vec<T>> {
        if self.peek_entry() != EntryType::PrimitiveArray {
            self.skip_entry();
            return None;
        }
        self.session.peeked = None;
        let count = self.read_i32_value()?;
        let width = self.read_i32_value()?;
        let (Ok(count), Ok(width)) = (usize::try_from(count), usize::try_from(width)) else {
            self.context.log_error(&format!(
                "Invalid primitive array header: {count} elements of {width} bytes"
            ));
            return None;
        };
        let Some(byte_len) = count.checked_mul(width) else {
            self.context.log_error(&format!(
                "Primitive array of {count} x {width} bytes overflows"
            ));
            self.exhaust();
            return None;
        };
        if width != T::WIDTH {
            self.context.log_error(&format!(
                "Primitive array element width mismatch: \
                 stream has {width} bytes per element, {} needs {}",
                std::any::type_name::<T>(),
                T::WIDTH
            ));
            self.skip_bytes(byte_len);
            return None;
        }
        if !self.has_data(byte_len) {
            self.context.log_error(&format!(
                "Insufficient data: primitive array of {byte_len} bytes is truncated"
            ));
            self.exhaust();
            return None;
        }
        let bytes = &self.source.window()[..byte_len];
        let mut values = vec![T::default(); count];
        if !T::copy_from_le_bytes(bytes, &mut values) {
            for (slot, chunk) in values.iter_mut().zip(bytes.chunks_exact(width)) {
                *slot = T::decode_le(chunk);
            }
        }
        self.source.consume(byte_len);
        Some(values)
    }

    fn read_i64(&mut self) -> Option<i64> {
        Some(match self.read_number()? {
            Number::Signed(v) => v,
            Number::Unsigned(v) => i64::try_from(v).unwrap_or_default(),
            Number::Single(v) => f64_to_i64(v.into()).unwrap_or_default(),
            Number::Double(v) => f64_to_i64(v).unwrap_or_default(),
            Number::Decimal(v) => f64_to_i64(v.to_f64()).unwrap_or_default(),
        })
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(match self.read_number()? {
            Number::Signed(v) => u64::try_from(v).unwrap_or_default(),
            Number::Unsigned(v) => v,
            Number::Single(v) => f64_to_u64(v.into()).unwrap_or_default(),
            Number::Double(v) => f64_to_u64(v).unwrap_or_default(),
            Number::Decimal(v) => f64_to_u64(v.to_f64()).unwrap_or_default(),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_f32(&mut self) -> Option<f32> {
        Some(match self.read_number()? {
            Number::Signed(v) => v as f32,
            Number::Unsigned(v) => v as f32,
            Number::Single(v) => v,
            Number::Double(v) => f64_to_f32(v),
            Number::Decimal(v) => f64_to_f32(v.to_f64()),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_f64(&mut self) -> Option<f64> {
        Some(match self.read_number()? {
            Number::Signed(v) => v as f64,
            Number::Unsigned(v) => v as f64,
            Number::Single(v) => v.into(),
            Number::Double(v) => v,
            Number::Decimal(v) => v.to_f64(),
        })
    }

    fn read_decimal(&mut self) -> Option<Decimal> {
        Some(match self.read_number()? {
            Number::Signed(v) => Decimal::from(v),
            Number::Unsigned(v) => Decimal::from(v),
            Number::Single(v) => Decimal::try_from_f64(v.into()).unwrap_or_default(),
            Number::Double(v) => Decimal::try_from_f64(v).unwrap_or_default(),
            Number::Decimal(v) => v,
        })
    }

    fn read_char(&mut self) -> Option<char> {
        if self.peek_entry() != EntryType::String {
            self.skip_entry();
            return None;
        }
        match self.take_peeked()?.tag {
            Tag::NamedChar | Tag::UnnamedChar => {
                self.read_bytes::<2>().map(|b| unit_to_char(u16::from_le_bytes(b)))
            }
            _ => self.read_string_value().map(|text| text.chars().next().unwrap_or('\0')),
        }
    }

    fn read_string(&mut self) -> Option<String> {
        if self.peek_entry() != EntryType::String {
            self.skip_entry();
            return None;
        }
        match self.take_peeked()?.tag {
            Tag::NamedChar | Tag::UnnamedChar => {
                self.read_bytes::<2>().map(|b| unit_to_char(u16::from_le_bytes(b)).to_string())
            }
            _ => self.read_string_value(),
        }
    }

    fn read_guid(&mut self) -> Option<Uuid> {
        self.read_fixed::<16>(EntryType::Guid).map(Uuid::from_bytes_le)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_fixed::<1>(EntryType::Boolean).map(|[b]| b != 0)
    }

    fn read_null(&mut self) -> bool {
        if self.peek_entry() == EntryType::Null {
            self.session.peeked = None;
            true
        } else {
            self.skip_entry();
            false
        }
    }

    fn read_internal_reference(&mut self) -> Option<i32> {
        self.read_fixed::<4>(EntryType::InternalReference).map(i32::from_le_bytes)
    }

    fn read_external_reference_by_index(&mut self) -> Option<i32> {
        self.read_fixed::<4>(EntryType::ExternalReferenceByIndex).map(i32::from_le_bytes)
    }

    fn read_external_reference_by_guid(&mut self) -> Option<Uuid> {
        self.read_fixed::<16>(EntryType::ExternalReferenceByGuid).map(Uuid::from_bytes_le)
    }

    fn read_external_reference_by_string(&mut self) -> Option<String> {
        if self.peek_entry() != EntryType::ExternalReferenceByString {
            self.skip_entry();
            return None;
        }
        self.session.peeked = None;
        self.read_string_value()
    }

    fn read_primitive(&mut self) -> Option<Primitive> {
        let entry = self.peek_entry();
        let tag = self.peeked_tag();
        match entry {
            EntryType::Integer | EntryType::FloatingPoint => {
                self.session.peeked = None;
                Some(match tag {
                    Tag::NamedSByte | Tag::UnnamedSByte => {
                        Primitive::SByte(i8::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedByte | Tag::UnnamedByte => {
                        Primitive::Byte(u8::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedShort | Tag::UnnamedShort => {
                        Primitive::Short(i16::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedUShort | Tag::UnnamedUShort => {
                        Primitive::UShort(u16::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedInt | Tag::UnnamedInt => {
                        Primitive::Int(i32::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedUInt | Tag::UnnamedUInt => {
                        Primitive::UInt(u32::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedLong | Tag::UnnamedLong => {
                        Primitive::Long(i64::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedULong | Tag::UnnamedULong => {
                        Primitive::ULong(u64::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedFloat | Tag::UnnamedFloat => {
                        Primitive::Float(f32::from_le_bytes(self.read_bytes()?))
                    }
                    Tag::NamedDouble | Tag::UnnamedDouble => {
                        Primitive::Double(f64::from_le_bytes(self.read_bytes()?))
                    }
                    _ => Primitive::Decimal(Decimal::from_le_bytes(self.read_bytes()?)),
                })
            }
            EntryType::String => {
                self.session.peeked = None;
                match tag {
                    Tag::NamedChar | Tag::UnnamedChar => {
                        let unit = u16::from_le_bytes(self.read_bytes::<2>()?);
                        Some(Primitive::Char(unit_to_char(unit)))
                    }
                    _ => self.read_string_value().map(Primitive::String),
                }
            }
            EntryType::Guid => self.read_guid().map(Primitive::Guid),
            EntryType::Boolean => self.read_bool().map(Primitive::Boolean),
            EntryType::Null => self.read_null().then_some(Primitive::Null),
            _ => {
                self.skip_entry();
                None
            }
        }
    }

    fn consume_current_entry(&mut self) {
        let Some(peeked) = self.take_peeked() else {
            return;
        };
        match peeked.tag {
            Tag::NamedStartOfReferenceNode | Tag::UnnamedStartOfReferenceNode => {
                let _ = self.read_type_entry();
                let _ = self.read_bytes::<4>();
            }
            Tag::NamedStartOfStructNode | Tag::UnnamedStartOfStructNode => {
                let _ = self.read_type_entry();
            }
            Tag::PrimitiveArray => {
                let (Some(count), Some(width)) = (self.read_i32_value(), self.read_i32_value())
                else {
                    return;
                };
                match (usize::try_from(count), usize::try_from(width)) {
                    (Ok(count), Ok(width)) => match count.checked_mul(width) {
                        Some(len) => self.skip_bytes(len),
                        None => self.exhaust(),
                    },
                    _ => self.context.log_error(&format!(
                        "Invalid primitive array header: {count} elements of {width} bytes"
                    )),
                }
            }
            Tag::NamedString
            | Tag::UnnamedString
            | Tag::NamedExternalReferenceByString
            | Tag::UnnamedExternalReferenceByString => {
                let _ = self.read_string_value();
            }
            tag => {
                if let Some(len) = tag.fixed_payload_len() {
                    self.skip_bytes(len);
                }
            }
        }
    }

    fn prepare_new_serialization_session(&mut self) {
        self.session = ReaderSession::default();
    }

    fn data_dump(&self) -> String {
        format!("Binary hex dump: {}", hex::encode_upper(self.source.window()))
    }

    fn nodes(&self) -> &NodeStack<B::Type> {
        &self.session.nodes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::{NameBinder, RecordingDebugContext, TypeName};

    fn reader(
        bytes: &[u8],
    ) -> (BinaryDataReader<SliceSource<'_>, NameBinder>, Arc<RecordingDebugContext>) {
        let recorder = Arc::new(RecordingDebugContext::new());
        let context = SerializationContext::new(NameBinder).with_debug_context(recorder.clone());
        (BinaryDataReader::from_slice(bytes, context), recorder)
    }

    #[test]
    fn reads_named_int() {
        let bytes = [0x17, 0x01, 0x01, 0x00, 0x00, 0x00, b'x', 0x00, 42, 0, 0, 0];
        let (mut r, _) = reader(&bytes);
        assert_eq!(r.peek_entry(), EntryType::Integer);
        assert_eq!(r.peeked_entry_name(), Some("x"));
        assert_eq!(r.peek_entry(), EntryType::Integer);
        assert_eq!(r.read_i32(), Some(42));
        assert_eq!(r.peek_entry(), EntryType::EndOfStream);
    }

    #[test]
    fn unknown_tag_is_invalid_and_logged() {
        let (mut r, log) = reader(&[0xFE, 0x2C, 0x01]);
        assert_eq!(r.peek_entry(), EntryType::Invalid);
        r.skip_entry();
        assert_eq!(r.read_bool(), Some(true));
        assert_eq!(log.errors().len(), 1);
    }

    #[test]
    fn type_entry_in_entry_position_is_invalid() {
        let (mut r, log) = reader(&[0x30, 0x31]);
        assert_eq!(r.peek_entry(), EntryType::Invalid);
        r.consume_current_entry();
        assert_eq!(r.peek_entry(), EntryType::EndOfStream);
        assert_eq!(log.errors().len(), 1);
    }

    #[test]
    fn missing_type_id_is_logged() {
        let bytes = [0x04, 0x30, 7, 0, 0, 0, 0x05];
        let (mut r, log) = reader(&bytes);
        let node = r.enter_node().unwrap();
        assert_eq!(node.ty, None::<TypeName>);
        assert!(r.exit_node());
        assert!(log.errors()[0].contains("Missing type id"));
    }

    #[test]
    fn narrowing_overflow_succeeds_with_default() {
        let (mut r, _) = reader(&[0x18, 0x2C, 0x01, 0x00, 0x00]);
        assert_eq!(r.read_i8(), Some(0));
        assert!(r.peek_entry() == EntryType::EndOfStream);
    }

    #[test]
    fn truncated_payload_fails_at_end_of_stream() {
        let (mut r, log) = reader(&[0x1C, 1, 2, 3]);
        assert_eq!(r.read_i64(), None);
        assert_eq!(r.peek_entry(), EntryType::EndOfStream);
        assert!(!log.errors().is_empty());
    }

    #[test]
    fn mismatched_read_skips_the_entry() {
        let (mut r, _) = reader(&[0x2C, 0x01, 0x18, 5, 0, 0, 0]);
        assert_eq!(r.read_i32(), None);
        assert_eq!(r.read_i32(), Some(5));
    }

    #[test]
    fn negative_array_length_reads_as_empty() {
        let mut bytes = vec![0x06];
        bytes.extend_from_slice(&(-3i64).to_le_bytes());
        bytes.extend_from_slice(&[0x18, 1, 0, 0, 0, 0x07, 0x2C, 0x00]);
        let (mut r, log) = reader(&bytes);
        assert_eq!(r.enter_array(), Some(0));
        assert!(r.exit_array());
        assert_eq!(r.read_bool(), Some(false));
        assert_eq!(log.errors().len(), 1);
    }

    #[test]
    fn width_mismatch_skips_payload() {
        let bytes = [0x08, 2, 0, 0, 0, 2, 0, 0, 0, 1, 0, 2, 0, 0x2C, 0x01];
        let (mut r, log) = reader(&bytes);
        assert_eq!(r.read_primitive_array::<i32>(), None);
        assert_eq!(r.read_bool(), Some(true));
        assert!(log.errors()[0].contains("width mismatch"));
    }
}
