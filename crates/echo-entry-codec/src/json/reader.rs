// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::io::Read;

use uuid::Uuid;

use super::{
    EXTERNAL_GUID_REF_SIG, EXTERNAL_INDEX_REF_SIG, EXTERNAL_STRING_REF_SIG, ID_SIG,
    INTERNAL_REF_SIG, JsonTextReader, PRIMITIVE_ARRAY_CONTENT_SIG, PRIMITIVE_ARRAY_LENGTH_SIG,
    REGULAR_ARRAY_CONTENT_SIG, REGULAR_ARRAY_LENGTH_SIG, RawEntry, TYPE_SIG, strip_quotes,
    strip_sigil,
};
use crate::context::{DebugContext, SerializationContext, TypeBinder};
use crate::element::PrimitiveElement;
use crate::entry::{EntryType, NodeStack, Primitive};
use crate::io::{ByteSource, SliceSource, StreamSource};
use crate::numeric::{Decimal, f64_to_f32, f64_to_i64, f64_to_u64};
use crate::reader::{DataReader, EnteredNode};
use crate::registry::ReaderSession;

/// Upper bound on the capacity reserved up front for a primitive array;
/// the announced length comes from untrusted text.
const MAX_PREALLOCATED_ELEMENTS: usize = 4096;

/// Reads entries from JSON text.
pub struct JsonDataReader<S: ByteSource, B: TypeBinder> {
    text: JsonTextReader<S>,
    context: SerializationContext<B>,
    session: ReaderSession<B::Type, RawEntry>,
}

impl<'a, B: TypeBinder> JsonDataReader<SliceSource<'a>, B> {
    /// Reader over in-memory JSON text.
    pub fn from_text(text: &'a str, context: SerializationContext<B>) -> Self {
        Self::from_slice(text.as_bytes(), context)
    }

    /// Reader over in-memory UTF-8 bytes.
    pub fn from_slice(bytes: &'a [u8], context: SerializationContext<B>) -> Self {
        Self::new(SliceSource::new(bytes), context)
    }
}

impl<R: Read, B: TypeBinder> JsonDataReader<StreamSource<R>, B> {
    /// Reader pulling UTF-8 text from a stream.
    pub fn from_reader(stream: R, context: SerializationContext<B>) -> Self {
        Self::new(StreamSource::new(stream), context)
    }
}

impl<S: ByteSource, B: TypeBinder> JsonDataReader<S, B> {
    /// Reader over any byte source.
    pub fn new(source: S, context: SerializationContext<B>) -> Self {
        Self { text: JsonTextReader::new(source), context, session: ReaderSession::default() }
    }

    /// Serialization context.
    pub fn context(&self) -> &SerializationContext<B> {
        &self.context
    }

    /// Current session state.
    pub fn session(&self) -> &ReaderSession<B::Type, RawEntry> {
        &self.session
    }

    /// Returns the byte source; a peeked entry is lost.
    pub fn into_source(self) -> S {
        self.text.into_source()
    }

    fn peeked_name_is(&self, sig: &str) -> bool {
        self.session.peeked.as_ref().and_then(|peeked| peeked.name.as_deref()) == Some(sig)
    }

    fn take_content(&mut self) -> String {
        self.session.peeked.take().and_then(|peeked| peeked.content).unwrap_or_default()
    }

    /// Consumes the peeked entry if its kind is one of `accepted`, yielding
    /// its text; skips it otherwise.
    fn take_scalar(&mut self, accepted: &[EntryType]) -> Option<String> {
        if accepted.contains(&self.peek_entry()) {
            Some(self.take_content())
        } else {
            self.skip_entry();
            None
        }
    }

    fn take_number(&mut self) -> Option<String> {
        self.take_scalar(&[EntryType::Integer, EntryType::FloatingPoint])
    }

    fn parse_failed<T>(&self, text: &str, what: &str) -> Option<T> {
        let depth = self.session.nodes.depth();
        self.context.log_error(&format!("Failed to parse '{text}' as {what} at depth {depth}"));
        None
    }

    fn parse_f64(&self, text: &str) -> Option<f64> {
        text.parse::<f64>().ok().or_else(|| self.parse_failed(text, "a floating point number"))
    }

    fn parse_guid(&self, text: &str) -> Option<Uuid> {
        Uuid::parse_str(text).ok().or_else(|| self.parse_failed(text, "a GUID"))
    }

    fn parse_reference_id(&self, content: &str, sig: &str) -> Option<i32> {
        strip_sigil(content, sig)
            .and_then(|id| id.parse::<i32>().ok())
            .or_else(|| self.parse_failed(content, "a reference id"))
    }

    /// Reads the optional `$id` member of a node header.
    fn read_id_header(&mut self) -> i32 {
        if self.peek_entry() == EntryType::Integer && self.peeked_name_is(ID_SIG) {
            self.read_i32().unwrap_or(-1)
        } else {
            -1
        }
    }

    /// Reads the optional `$type` member of a node header, registering
    /// `"<id>|<name>"` forms and resolving bare ids.
    fn read_type_header(&mut self) -> Option<B::Type> {
        let entry = self.peek_entry();
        if !self.peeked_name_is(TYPE_SIG) {
            return None;
        }
        let content = self.take_content();
        match entry {
            EntryType::Integer => {
                let id = content
                    .parse::<i32>()
                    .ok()
                    .or_else(|| self.parse_failed(&content, "a type id"))?;
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
            EntryType::String => {
                let text = strip_quotes(&content);
                let registered = text
                    .split_once('|')
                    .and_then(|(id, name)| Some((id.parse::<i32>().ok()?, name)));
                match registered {
                    Some((id, name)) => {
                        let ty = self.context.bind_to_type(name);
                        self.session.types.insert(id, ty.clone());
                        ty
                    }
                    None => self.context.bind_to_type(text),
                }
            }
            other => {
                self.context.log_error(&format!(
                    "Expected a type id or type name for {TYPE_SIG}, found {other:?}"
                ));
                None
            }
        }
    }

    /// Consumes the `"<content sig>":[` that follows an array length entry.
    fn take_array_content(&mut self, content_sig: &str) -> bool {
        if self.peek_entry() == EntryType::StartOfArray && self.peeked_name_is(content_sig) {
            self.session.peeked = None;
            true
        } else {
            self.context.log_error(&format!(
                "Array length entry was not followed by a {content_sig} entry"
            ));
            false
        }
    }

    fn take_array_length(&mut self) -> i64 {
        let content = self.take_content();
        match content.parse::<i64>() {
            Ok(length) if length >= 0 => length,
            Ok(length) => {
                self.context.log_error(&format!("Invalid array length: {length}."));
                0
            }
            Err(_) => self.parse_failed(&content, "an array length").unwrap_or(0),
        }
    }

    /// Discards primitive array content up to and including its `]`.
    ///
    /// Nested containers in malformed content are counted rather than
    /// entered; a `}` closing the enclosing node is left in place.
    fn skip_primitive_content(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_entry() {
                EntryType::EndOfStream => return,
                end @ (EntryType::EndOfArray | EntryType::EndOfNode) if depth == 0 => {
                    if end == EntryType::EndOfArray {
                        self.session.peeked = None;
                    }
                    return;
                }
                EntryType::EndOfArray | EntryType::EndOfNode => {
                    self.session.peeked = None;
                    depth -= 1;
                }
                EntryType::StartOfArray | EntryType::PrimitiveArray
                    if self.peeked_name_is(REGULAR_ARRAY_LENGTH_SIG)
                        || self.peeked_name_is(PRIMITIVE_ARRAY_LENGTH_SIG) =>
                {
                    self.session.peeked = None;
                    if self.peek_entry() == EntryType::StartOfArray
                        && (self.peeked_name_is(REGULAR_ARRAY_CONTENT_SIG)
                            || self.peeked_name_is(PRIMITIVE_ARRAY_CONTENT_SIG))
                    {
                        self.session.peeked = None;
                        depth += 1;
                    }
                }
                EntryType::StartOfNode | EntryType::StartOfArray => {
                    self.session.peeked = None;
                    depth += 1;
                }
                _ => self.session.peeked = None,
            }
        }
    }

    fn exit_marker(&mut self, end: EntryType, stray: EntryType, mismatch: &str) -> bool {
        loop {
            let entry = self.peek_entry();
            if entry == end {
                self.session.peeked = None;
                return true;
            }
            if entry == stray {
                self.context.log_error(mismatch);
                self.session.peeked = None;
                continue;
            }
            if entry == EntryType::EndOfStream {
                return false;
            }
            self.skip_entry();
        }
    }
}

impl<S: ByteSource, B: TypeBinder> DataReader for JsonDataReader<S, B> {
    type Type = B::Type;

    fn peek_entry(&mut self) -> EntryType {
        if let Some(peeked) = &self.session.peeked {
            return peeked.entry;
        }
        let mut raw = self.text.read_to_next_entry(&self.context);
        if raw.entry == EntryType::Integer {
            match raw.name.as_deref() {
                Some(REGULAR_ARRAY_LENGTH_SIG) => raw.entry = EntryType::StartOfArray,
                Some(PRIMITIVE_ARRAY_LENGTH_SIG) => raw.entry = EntryType::PrimitiveArray,
                _ => {}
            }
        }
        let entry = raw.entry;
        self.session.peeked = Some(raw);
        entry
    }

    fn peeked_entry_name(&self) -> Option<&str> {
        self.session.peeked.as_ref().and_then(|peeked| peeked.name.as_deref())
    }

    fn enter_node(&mut self) -> Option<EnteredNode<B::Type>> {
        if self.peek_entry() != EntryType::StartOfNode {
            self.skip_entry();
            return None;
        }
        let name = self.session.peeked.take().and_then(|peeked| peeked.name);
        let id = self.read_id_header();
        let ty = self.read_type_header();
        self.session.open_node(name.clone(), id, ty.clone());
        Some(EnteredNode { name, id, ty })
    }

    fn exit_node(&mut self) -> bool {
        let found = self.exit_marker(
            EntryType::EndOfNode,
            EntryType::EndOfArray,
            "Data layout mismatch; skipping past array boundary when exiting node.",
        );
        if found {
            match self.session.nodes.unwind_node() {
                Some((_, 0)) => {}
                Some((node, discarded)) => self.context.log_error(&format!(
                    "Data layout mismatch; node {:?} closed with {discarded} array(s) still open",
                    node.name
                )),
                None => self
                    .context
                    .log_error("Data layout mismatch; exited a node that was never entered"),
            }
        }
        found
    }

    fn enter_array(&mut self) -> Option<i64> {
        if self.peek_entry() != EntryType::StartOfArray {
            self.skip_entry();
            return None;
        }
        if !self.peeked_name_is(REGULAR_ARRAY_LENGTH_SIG) {
            self.context.log_error("Array entry wasn't preceded by an array length entry.");
            self.session.peeked = None;
            self.session.nodes.push_array();
            return Some(0);
        }
        let length = self.take_array_length();
        if !self.take_array_content(REGULAR_ARRAY_CONTENT_SIG) {
            return None;
        }
        self.session.nodes.push_array();
        Some(length)
    }

    fn exit_array(&mut self) -> bool {
        let found = self.exit_marker(
            EntryType::EndOfArray,
            EntryType::EndOfNode,
            "Data layout mismatch; skipping past node boundary when exiting array.",
        );
        if found {
            match self.session.nodes.unwind_array() {
                Some(0) => {}
                Some(discarded) => self.context.log_error(&format!(
                    "Data layout mismatch; array closed with {discarded} node(s) still open"
                )),
                None => self
                    .context
                    .log_error("Data layout mismatch; exited an array that was never entered"),
            }
        }
        found
    }

    fn read_primitive_array<T: PrimitiveElement>(&mut self) -> Option<Vec<T>> {
        if self.peek_entry() != EntryType::PrimitiveArray {
            self.skip_entry();
            return None;
        }
        let length = usize::try_from(self.take_array_length()).unwrap_or_default();
        if !self.take_array_content(PRIMITIVE_ARRAY_CONTENT_SIG) {
            return None;
        }
        self.session.nodes.push_array();
        let mut values = Vec::with_capacity(length.min(MAX_PREALLOCATED_ELEMENTS));
        while values.len() < length {
            match self.peek_entry() {
                EntryType::EndOfArray | EntryType::EndOfNode | EntryType::EndOfStream => break,
                _ => values.push(T::read_element(self).unwrap_or_default()),
            }
        }
        if values.len() < length {
            self.context.log_error(&format!(
                "Primitive array announced {length} elements but holds {}",
                values.len()
            ));
        }
        self.exit_array();
        Some(values)
    }

    fn read_i64(&mut self) -> Option<i64> {
        let text = self.take_number()?;
        if let Ok(value) = text.parse::<i128>() {
            return Some(i64::try_from(value).unwrap_or_default());
        }
        self.parse_f64(&text).map(|value| f64_to_i64(value).unwrap_or_default())
    }

    fn read_u64(&mut self) -> Option<u64> {
        let text = self.take_number()?;
        if let Ok(value) = text.parse::<i128>() {
            return Some(u64::try_from(value).unwrap_or_default());
        }
        self.parse_f64(&text).map(|value| f64_to_u64(value).unwrap_or_default())
    }

    fn read_f32(&mut self) -> Option<f32> {
        let text = self.take_number()?;
        let double = self.parse_f64(&text)?;
        Some(match text.parse::<f32>() {
            Ok(single) if single.is_infinite() && double.is_finite() => 0.0,
            Ok(single) => single,
            Err(_) => f64_to_f32(double),
        })
    }

    fn read_f64(&mut self) -> Option<f64> {
        let text = self.take_number()?;
        self.parse_f64(&text)
    }

    fn read_decimal(&mut self) -> Option<Decimal> {
        let text = self.take_number()?;
        if let Ok(value) = text.parse::<Decimal>() {
            return Some(value);
        }
        self.parse_f64(&text).map(|value| Decimal::try_from_f64(value).unwrap_or_default())
    }

    fn read_char(&mut self) -> Option<char> {
        let content = self.take_scalar(&[EntryType::String])?;
        Some(strip_quotes(&content).chars().next().unwrap_or('\0'))
    }

    fn read_string(&mut self) -> Option<String> {
        let content = self.take_scalar(&[EntryType::String])?;
        Some(strip_quotes(&content).to_owned())
    }

    fn read_guid(&mut self) -> Option<Uuid> {
        let content = self.take_scalar(&[EntryType::Guid])?;
        self.parse_guid(&content)
    }

    fn read_bool(&mut self) -> Option<bool> {
        let content = self.take_scalar(&[EntryType::Boolean])?;
        Some(content == "true")
    }

    fn read_null(&mut self) -> bool {
        self.take_scalar(&[EntryType::Null]).is_some()
    }

    fn read_internal_reference(&mut self) -> Option<i32> {
        let content = self.take_scalar(&[EntryType::InternalReference])?;
        self.parse_reference_id(&content, INTERNAL_REF_SIG)
    }

    fn read_external_reference_by_index(&mut self) -> Option<i32> {
        let content = self.take_scalar(&[EntryType::ExternalReferenceByIndex])?;
        self.parse_reference_id(&content, EXTERNAL_INDEX_REF_SIG)
    }

    fn read_external_reference_by_guid(&mut self) -> Option<Uuid> {
        let content = self.take_scalar(&[EntryType::ExternalReferenceByGuid])?;
        let guid = strip_sigil(&content, EXTERNAL_GUID_REF_SIG).unwrap_or_default();
        self.parse_guid(guid)
    }

    fn read_external_reference_by_string(&mut self) -> Option<String> {
        let content = self.take_scalar(&[EntryType::ExternalReferenceByString])?;
        let id = strip_sigil(&content, EXTERNAL_STRING_REF_SIG).unwrap_or_default();
        Some(strip_quotes(id).to_owned())
    }

    fn read_primitive(&mut self) -> Option<Primitive> {
        match self.peek_entry() {
            EntryType::Integer => {
                let text = self.take_content();
                if let Ok(value) = text.parse::<i64>() {
                    Some(Primitive::Long(value))
                } else if let Ok(value) = text.parse::<u64>() {
                    Some(Primitive::ULong(value))
                } else {
                    self.parse_f64(&text).map(Primitive::Double)
                }
            }
            EntryType::FloatingPoint => {
                let text = self.take_content();
                self.parse_f64(&text).map(Primitive::Double)
            }
            EntryType::String => self.read_string().map(Primitive::String),
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
        self.peek_entry();
        let Some(peeked) = self.session.peeked.take() else {
            return;
        };
        match (peeked.entry, peeked.name.as_deref()) {
            (EntryType::StartOfArray, Some(REGULAR_ARRAY_LENGTH_SIG)) => {
                self.take_array_content(REGULAR_ARRAY_CONTENT_SIG);
            }
            (EntryType::PrimitiveArray, _) => {
                if self.take_array_content(PRIMITIVE_ARRAY_CONTENT_SIG) {
                    self.skip_primitive_content();
                }
            }
            (EntryType::StartOfNode, _) => {
                self.read_id_header();
                self.read_type_header();
            }
            _ => {}
        }
    }

    fn prepare_new_serialization_session(&mut self) {
        self.session = ReaderSession::default();
    }

    fn data_dump(&self) -> String {
        String::from_utf8_lossy(self.text.source().window()).into_owned()
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
        text: &str,
    ) -> (JsonDataReader<SliceSource<'_>, NameBinder>, Arc<RecordingDebugContext>) {
        let recorder = Arc::new(RecordingDebugContext::new());
        let context = SerializationContext::new(NameBinder).with_debug_context(recorder.clone());
        (JsonDataReader::from_text(text, context), recorder)
    }

    #[test]
    fn reads_node_header_and_members() {
        let (mut r, log) =
            reader(r#""root":{"$id":0,"$type":"0|Foo","x":42,"y":"hi"},"again":{"$type":0}"#);
        let node = r.enter_node().unwrap();
        assert_eq!(
            node,
            EnteredNode {
                name: Some("root".to_owned()),
                id: 0,
                ty: Some(TypeName::from("Foo"))
            }
        );
        assert_eq!(r.peek_entry(), EntryType::Integer);
        assert_eq!(r.peeked_entry_name(), Some("x"));
        assert_eq!(r.read_i32(), Some(42));
        assert_eq!(r.read_string().as_deref(), Some("hi"));
        assert!(r.exit_node());
        let again = r.enter_node().unwrap();
        assert_eq!(again.ty, Some(TypeName::from("Foo")));
        assert!(r.exit_node());
        assert_eq!(r.peek_entry(), EntryType::EndOfStream);
        assert!(log.errors().is_empty());
        assert!(r.session().references().get(0).is_some());
    }

    #[test]
    fn missing_type_id_is_logged() {
        let (mut r, log) = reader(r#"{"$type":3}"#);
        let node = r.enter_node().unwrap();
        assert_eq!(node.ty, None);
        assert!(r.exit_node());
        assert!(log.errors()[0].contains("Missing type id"));
    }

    #[test]
    fn arrays_announce_their_length() {
        let (mut r, _) = reader(r#""$rlength":2,"$rcontent":[1,2],true"#);
        assert_eq!(r.peek_entry(), EntryType::StartOfArray);
        assert_eq!(r.enter_array(), Some(2));
        assert_eq!(r.read_i32(), Some(1));
        assert_eq!(r.read_i32(), Some(2));
        assert!(r.exit_array());
        assert_eq!(r.read_bool(), Some(true));
    }

    #[test]
    fn bare_array_reads_as_empty_and_is_logged() {
        let (mut r, log) = reader("[1,2],null");
        assert_eq!(r.enter_array(), Some(0));
        assert!(r.exit_array());
        assert!(r.read_null());
        assert!(log.errors()[0].contains("wasn't preceded by an array length"));
    }

    #[test]
    fn primitive_arrays_fill_failed_elements_with_default() {
        let (mut r, _) =
            reader(r#""$plength":3,"$pcontent":[1,"x",3],"$plength":2,"$pcontent":[1.5,2]"#);
        assert_eq!(r.read_primitive_array::<i32>(), Some(vec![1, 0, 3]));
        assert_eq!(r.read_primitive_array::<f64>(), Some(vec![1.5, 2.0]));
        assert_eq!(r.peek_entry(), EntryType::EndOfStream);
    }

    #[test]
    fn skipping_a_primitive_array_consumes_its_content() {
        let (mut r, _) = reader(r#""$plength":2,"$pcontent":[1,2],"z":7"#);
        r.skip_entry();
        assert_eq!(r.peeked_entry_name(), None);
        assert_eq!(r.read_i32(), Some(7));
    }

    #[test]
    fn numeric_edge_cases() {
        let (mut r, log) = reader("300,1.0e39,abc,18446744073709551615,2.5,NaN");
        assert_eq!(r.read_i8(), Some(0));
        assert_eq!(r.read_f32(), Some(0.0));
        assert_eq!(r.read_i32(), None);
        assert_eq!(log.errors().len(), 1);
        assert_eq!(r.read_primitive(), Some(Primitive::ULong(u64::MAX)));
        assert_eq!(r.read_decimal(), Decimal::from_parts(25, 1, false));
        assert!(r.read_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn references_and_guids() {
        let guid = "00112233-4455-6677-8899-aabbccddeeff";
        let text = format!(r#"$iref:5,$eref:2,$guidref:{guid},$strref:"a\"b",{guid}"#);
        let (mut r, _) = reader(&text);
        assert_eq!(r.read_internal_reference(), Some(5));
        assert_eq!(r.read_external_reference_by_index(), Some(2));
        assert_eq!(r.read_external_reference_by_guid(), Uuid::parse_str(guid).ok());
        assert_eq!(r.read_external_reference_by_string().as_deref(), Some("a\"b"));
        assert_eq!(r.read_guid(), Uuid::parse_str(guid).ok());
    }

    #[test]
    fn mismatched_read_skips_the_entry() {
        let (mut r, _) = reader(r#""a":"text","b":5"#);
        assert_eq!(r.read_i32(), None);
        assert_eq!(r.read_i32(), Some(5));
    }

    #[test]
    fn exit_node_skips_past_an_open_array() {
        let (mut r, log) = reader(r#""n":{"$rlength":1,"$rcontent":[5]},true"#);
        r.enter_node().unwrap();
        assert_eq!(r.enter_array(), Some(1));
        assert!(r.exit_node());
        assert_eq!(r.nodes().depth(), 0);
        assert_eq!(r.read_bool(), Some(true));
        assert!(log.errors()[0].contains("skipping past array boundary"));
    }

    #[test]
    fn data_dump_shows_unread_text() {
        let (mut r, _) = reader("1,2");
        assert_eq!(r.read_i32(), Some(1));
        assert_eq!(r.data_dump(), "2");
    }
}
