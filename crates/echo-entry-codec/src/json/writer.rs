// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::fmt::Write as _;
use std::io::Write;

use uuid::Uuid;

use super::{
    EXTERNAL_GUID_REF_SIG, EXTERNAL_INDEX_REF_SIG, EXTERNAL_STRING_REF_SIG, ID_SIG,
    INTERNAL_REF_SIG, PRIMITIVE_ARRAY_CONTENT_SIG, PRIMITIVE_ARRAY_LENGTH_SIG,
    REGULAR_ARRAY_CONTENT_SIG, REGULAR_ARRAY_LENGTH_SIG, TYPE_SIG,
};
use crate::context::{DebugContext, SerializationContext, TypeBinder};
use crate::element::PrimitiveElement;
use crate::entry::NodeStack;
use crate::error::WriteError;
use crate::io::{DEFAULT_BUFFER_CAPACITY, WriteBuffer};
use crate::numeric::Decimal;
use crate::registry::{TypeSlot, WriterSession};
use crate::writer::DataWriter;

/// Configuration for [`JsonDataWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonWriterOptions {
    /// Break lines and indent four spaces per nesting level.
    pub format_as_readable: bool,
    /// Write a type's name once per session and its numeric id afterwards.
    /// When off, every node header carries the bare type name.
    pub enable_type_optimization: bool,
    /// Size of the batching buffer in bytes.
    pub buffer_capacity: usize,
}

impl Default for JsonWriterOptions {
    fn default() -> Self {
        Self {
            format_as_readable: false,
            enable_type_optimization: true,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Separator bookkeeping between entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineState {
    just_started: bool,
    force_no_separator: bool,
}

impl Default for LineState {
    fn default() -> Self {
        Self { just_started: true, force_no_separator: false }
    }
}

/// Writes entries as JSON text.
///
/// Output is a sequence of members without an enclosing object; readers
/// treat top-level members as one implicit root object.
pub struct JsonDataWriter<W: Write, B: TypeBinder> {
    sink: WriteBuffer<W>,
    context: SerializationContext<B>,
    session: WriterSession<B::Type, LineState>,
    options: JsonWriterOptions,
}

impl<W: Write, B: TypeBinder> JsonDataWriter<W, B> {
    /// Writer with default options.
    pub fn new(stream: W, context: SerializationContext<B>) -> Self {
        Self::with_options(stream, context, JsonWriterOptions::default())
    }

    /// Writer with explicit options.
    pub fn with_options(
        stream: W,
        context: SerializationContext<B>,
        options: JsonWriterOptions,
    ) -> Self {
        Self {
            sink: WriteBuffer::new(stream, options.buffer_capacity),
            context,
            session: WriterSession::default(),
            options,
        }
    }

    /// Active options.
    pub fn options(&self) -> &JsonWriterOptions {
        &self.options
    }

    /// Serialization context.
    pub fn context(&self) -> &SerializationContext<B> {
        &self.context
    }

    /// Current session state.
    pub fn session(&self) -> &WriterSession<B::Type, LineState> {
        &self.session
    }

    /// Underlying stream; buffered text may not have reached it yet.
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

    fn write_text(&mut self, text: &str) -> Result<(), WriteError> {
        let bytes = text.as_bytes();
        if self.sink.try_ensure_space(bytes.len())? {
            self.sink.extend(bytes);
        } else {
            self.sink.write_direct(bytes)?;
        }
        Ok(())
    }

    fn start_new_line(&mut self, no_separator: bool) -> Result<(), WriteError> {
        let state = &mut self.session.state;
        if state.just_started {
            state.just_started = false;
            state.force_no_separator = false;
            return Ok(());
        }
        let separator = !(no_separator || state.force_no_separator);
        state.force_no_separator = false;

        let mut line = String::new();
        if separator {
            line.push(',');
        }
        if self.options.format_as_readable {
            line.push('\n');
            line.extend(std::iter::repeat_n(' ', self.session.nodes.depth() * 4));
        }
        self.write_text(&line)
    }

    fn write_entry(&mut self, name: Option<&str>, value: &str) -> Result<(), WriteError> {
        self.start_new_line(false)?;
        let mut text = String::with_capacity(value.len() + name.map_or(0, str::len) + 4);
        if let Some(name) = name {
            text.push('"');
            escape_into(&mut text, name);
            text.push_str(if self.options.format_as_readable { "\": " } else { "\":" });
        }
        text.push_str(value);
        self.write_text(&text)
    }

    fn write_type(&mut self, ty: Option<&B::Type>) -> Result<(), WriteError> {
        let Some(ty) = ty else {
            return Ok(());
        };
        if !self.options.enable_type_optimization {
            let name = quoted(&self.context.bind_to_name(ty));
            return self.write_entry(Some(TYPE_SIG), &name);
        }
        match self.session.types.register(ty) {
            TypeSlot::Seen(id) => self.write_entry(Some(TYPE_SIG), &id.to_string()),
            TypeSlot::New(id) => {
                let name = quoted(&format!("{id}|{}", self.context.bind_to_name(ty)));
                self.write_entry(Some(TYPE_SIG), &name)
            }
        }
    }

    fn begin_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&B::Type>,
        id: Option<i32>,
    ) -> Result<(), WriteError> {
        self.write_entry(name, "{")?;
        self.session.state.force_no_separator = true;
        self.session.nodes.push_node(name.map(str::to_owned), id.unwrap_or(-1), ty.cloned());
        if let Some(id) = id {
            self.write_entry(Some(ID_SIG), &id.to_string())?;
        }
        self.write_type(ty)
    }

    fn close(&mut self, delimiter: &str) -> Result<(), WriteError> {
        self.start_new_line(true)?;
        self.write_text(delimiter)
    }

    fn open_array(
        &mut self,
        length_sig: &str,
        content_sig: &str,
        length: i64,
    ) -> Result<(), WriteError> {
        self.write_entry(Some(length_sig), &length.to_string())?;
        self.write_entry(Some(content_sig), "[")?;
        self.session.state.force_no_separator = true;
        self.session.nodes.push_array();
        Ok(())
    }
}

impl<W: Write, B: TypeBinder> DataWriter for JsonDataWriter<W, B> {
    type Type = B::Type;

    fn begin_reference_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&B::Type>,
        id: i32,
    ) -> Result<(), WriteError> {
        if !self.session.references.open(id) {
            self.context.log_warning(&format!(
                "Reference node id {id} was opened more than once in this session"
            ));
        }
        self.begin_node(name, ty, Some(id))
    }

    fn begin_struct_node(
        &mut self,
        name: Option<&str>,
        ty: Option<&B::Type>,
    ) -> Result<(), WriteError> {
        self.begin_node(name, ty, None)
    }

    fn end_node(&mut self, name: Option<&str>) -> Result<(), WriteError> {
        self.session.nodes.pop_node(name)?;
        self.close("}")
    }

    fn begin_array_node(&mut self, length: i64) -> Result<(), WriteError> {
        self.open_array(REGULAR_ARRAY_LENGTH_SIG, REGULAR_ARRAY_CONTENT_SIG, length)
    }

    fn end_array_node(&mut self) -> Result<(), WriteError> {
        self.session.nodes.pop_array()?;
        self.close("]")
    }

    fn write_primitive_array<T: PrimitiveElement>(
        &mut self,
        array: &[T],
    ) -> Result<(), WriteError> {
        let length = i64::try_from(array.len()).map_err(|_| WriteError::ArrayTooLong(array.len()))?;
        self.open_array(PRIMITIVE_ARRAY_LENGTH_SIG, PRIMITIVE_ARRAY_CONTENT_SIG, length)?;
        for element in array {
            element.write_element(self)?;
        }
        self.session.nodes.pop_array()?;
        self.close("]")
    }

    fn write_i8(&mut self, name: Option<&str>, value: i8) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_u8(&mut self, name: Option<&str>, value: u8) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_i16(&mut self, name: Option<&str>, value: i16) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_u16(&mut self, name: Option<&str>, value: u16) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_i32(&mut self, name: Option<&str>, value: i32) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_u32(&mut self, name: Option<&str>, value: u32) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_i64(&mut self, name: Option<&str>, value: i64) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_u64(&mut self, name: Option<&str>, value: u64) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_f32(&mut self, name: Option<&str>, value: f32) -> Result<(), WriteError> {
        self.write_entry(name, &float_text(f64::from(value), format!("{value:?}")))
    }

    fn write_f64(&mut self, name: Option<&str>, value: f64) -> Result<(), WriteError> {
        self.write_entry(name, &float_text(value, format!("{value:?}")))
    }

    fn write_decimal(&mut self, name: Option<&str>, value: Decimal) -> Result<(), WriteError> {
        self.write_entry(name, &value.to_string())
    }

    fn write_char(&mut self, name: Option<&str>, value: char) -> Result<(), WriteError> {
        self.write_entry(name, &quoted(value.encode_utf8(&mut [0; 4])))
    }

    fn write_string(&mut self, name: Option<&str>, value: &str) -> Result<(), WriteError> {
        self.write_entry(name, &quoted(value))
    }

    fn write_guid(&mut self, name: Option<&str>, value: Uuid) -> Result<(), WriteError> {
        self.write_entry(name, &value.hyphenated().to_string())
    }

    fn write_bool(&mut self, name: Option<&str>, value: bool) -> Result<(), WriteError> {
        self.write_entry(name, if value { "true" } else { "false" })
    }

    fn write_null(&mut self, name: Option<&str>) -> Result<(), WriteError> {
        self.write_entry(name, "null")
    }

    fn write_internal_reference(&mut self, name: Option<&str>, id: i32) -> Result<(), WriteError> {
        if !self.session.references.contains(id) {
            self.context.log_warning(&format!(
                "Internal reference to id {id}, which no node in this session has opened"
            ));
        }
        self.write_entry(name, &format!("{INTERNAL_REF_SIG}:{id}"))
    }

    fn write_external_reference_by_index(
        &mut self,
        name: Option<&str>,
        index: i32,
    ) -> Result<(), WriteError> {
        self.write_entry(name, &format!("{EXTERNAL_INDEX_REF_SIG}:{index}"))
    }

    fn write_external_reference_by_guid(
        &mut self,
        name: Option<&str>,
        guid: Uuid,
    ) -> Result<(), WriteError> {
        self.write_entry(name, &format!("{EXTERNAL_GUID_REF_SIG}:{}", guid.hyphenated()))
    }

    fn write_external_reference_by_string(
        &mut self,
        name: Option<&str>,
        id: &str,
    ) -> Result<(), WriteError> {
        self.write_entry(name, &format!("{EXTERNAL_STRING_REF_SIG}:{}", quoted(id)))
    }

    fn flush_to_stream(&mut self) -> Result<(), WriteError> {
        Ok(self.sink.flush()?)
    }

    fn prepare_new_serialization_session(&mut self) {
        self.session = WriterSession::default();
    }

    fn data_dump(&self) -> String {
        String::from_utf8_lossy(self.sink.pending()).into_owned()
    }

    fn nodes(&self) -> &NodeStack<B::Type> {
        &self.session.nodes
    }
}

/// Rust's shortest round-trip float text, adjusted so the reader sees a
/// floating point token: integral values keep their `.0`, exponents get a
/// fractional part, and non-finite values use `NaN`/`Infinity`.
fn float_text(value: f64, debug: String) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-Infinity".to_owned() } else { "Infinity".to_owned() };
    }
    if debug.contains('.') {
        return debug;
    }
    match debug.find('e') {
        Some(at) => format!("{}.0{}", &debug[..at], &debug[at..]),
        None => debug + ".0",
    }
}

fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    escape_into(&mut out, text);
    out.push('"');
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{C}' => out.push_str("\\f"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
}
