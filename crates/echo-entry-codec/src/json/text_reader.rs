// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lenient JSON tokenizer producing one [`RawEntry`] per call.
//!
//! The tokenizer knows nothing about nodes or arrays beyond their
//! delimiters. It splits the character stream at `{ } [ ] ,`, separates an
//! optional quoted name at the first `:` that follows it, resolves string
//! escapes and guesses the kind of scalar content from its text.

use std::char::REPLACEMENT_CHARACTER;
use std::collections::VecDeque;

use super::{
    EXTERNAL_GUID_REF_SIG, EXTERNAL_INDEX_REF_SIG, EXTERNAL_STRING_REF_SIG, INTERNAL_REF_SIG,
    strip_quotes, strip_sigil,
};
use crate::context::DebugContext;
use crate::element::unit_to_char;
use crate::entry::EntryType;
use crate::io::{ByteSource, CharSource};

/// One lexical entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Member name with quotes removed, for named entries.
    pub name: Option<String>,
    /// Scalar text as it appeared (strings keep their quotes, escapes are
    /// resolved). `None` for structural entries.
    pub content: Option<String>,
    /// Entry kind, structural or guessed from `content`.
    pub entry: EntryType,
}

impl RawEntry {
    fn end_of_stream() -> Self {
        Self { name: None, content: None, entry: EntryType::EndOfStream }
    }
}

/// Character-level JSON scanner with one character of lookahead.
///
/// Characters read while trying to decode a malformed `\u` escape are
/// queued for playback, so no input is lost.
#[derive(Debug)]
pub struct JsonTextReader<S> {
    chars: CharSource<S>,
    playback: VecDeque<char>,
    buffer: String,
}

impl<S: ByteSource> JsonTextReader<S> {
    /// Tokenizer over `source`.
    pub fn new(source: S) -> Self {
        Self { chars: CharSource::new(source), playback: VecDeque::new(), buffer: String::new() }
    }

    /// Underlying byte source.
    pub fn source(&self) -> &S {
        self.chars.source()
    }

    /// Returns the byte source.
    pub fn into_source(self) -> S {
        self.chars.into_inner()
    }

    /// Scans the next entry.
    pub fn read_to_next_entry(&mut self, log: &dyn DebugContext) -> RawEntry {
        self.buffer.clear();
        let mut separator: Option<usize> = None;
        let mut in_string = false;

        loop {
            let Some(c) = self.peek_char(log) else {
                if in_string {
                    log.log_error("Unterminated string at end of stream");
                }
                if self.buffer.is_empty() {
                    return RawEntry::end_of_stream();
                }
                return self.finish(separator, None);
            };

            if in_string {
                self.next_char(log);
                match c {
                    '"' => {
                        in_string = false;
                        self.buffer.push('"');
                    }
                    '\\' => self.read_escape(log),
                    _ => self.buffer.push(c),
                }
                continue;
            }

            match c {
                '{' | '[' => {
                    self.next_char(log);
                    let entry = if c == '{' {
                        EntryType::StartOfNode
                    } else {
                        EntryType::StartOfArray
                    };
                    return self.finish(separator, Some(entry));
                }
                '}' | ']' => {
                    if !self.buffer.is_empty() {
                        return self.finish(separator, None);
                    }
                    self.next_char(log);
                    let entry = if c == '}' { EntryType::EndOfNode } else { EntryType::EndOfArray };
                    return self.finish(separator, Some(entry));
                }
                ',' => {
                    self.next_char(log);
                    if !self.buffer.is_empty() {
                        return self.finish(separator, None);
                    }
                }
                ':' if separator.is_none() && is_quoted(&self.buffer) => {
                    self.next_char(log);
                    separator = Some(self.buffer.len());
                }
                '"' => {
                    self.next_char(log);
                    in_string = true;
                    self.buffer.push('"');
                }
                c if c.is_whitespace() => {
                    self.next_char(log);
                }
                _ => {
                    self.next_char(log);
                    self.buffer.push(c);
                }
            }
        }
    }

    fn finish(&mut self, separator: Option<usize>, structural: Option<EntryType>) -> RawEntry {
        let (name, value) = match separator {
            Some(at) => {
                let (name, value) = self.buffer.split_at(at);
                (Some(strip_quotes(name).to_owned()), value.to_owned())
            }
            None => (None, self.buffer.clone()),
        };
        self.buffer.clear();
        match structural {
            Some(entry) => RawEntry { name, content: None, entry },
            None => {
                let entry = guess_primitive_type(&value);
                RawEntry { name, content: Some(value), entry }
            }
        }
    }

    fn peek_char(&mut self, log: &dyn DebugContext) -> Option<char> {
        if let Some(c) = self.playback.front() {
            return Some(*c);
        }
        match self.chars.peek() {
            Ok(c) => c,
            Err(err) => {
                log.log_error(&format!("Reading from the stream failed: {err}"));
                None
            }
        }
    }

    fn next_char(&mut self, log: &dyn DebugContext) -> Option<char> {
        if let Some(c) = self.playback.pop_front() {
            return Some(c);
        }
        match self.chars.next_char() {
            Ok(c) => c,
            Err(err) => {
                log.log_error(&format!("Reading from the stream failed: {err}"));
                None
            }
        }
    }

    fn replay(&mut self, chars: Vec<char>) {
        for c in chars.into_iter().rev() {
            self.playback.push_front(c);
        }
    }

    fn read_escape(&mut self, log: &dyn DebugContext) {
        let Some(c) = self.next_char(log) else {
            log.log_error("Unterminated escape sequence at end of stream");
            return;
        };
        let resolved = match c {
            '"' | '\\' | '/' | '\'' => c,
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            'u' => {
                self.read_unicode_escape(log);
                return;
            }
            other => {
                log.log_error(&format!("Invalid escape sequence '\\{other}' in string"));
                other
            }
        };
        self.buffer.push(resolved);
    }

    fn read_unicode_escape(&mut self, log: &dyn DebugContext) {
        let mut consumed = Vec::with_capacity(4);
        let Some(unit) = self.read_hex_unit(log, &mut consumed) else {
            let raw: String = consumed.iter().collect();
            log.log_error(&format!("Invalid unicode escape sequence '\\u{raw}' in string"));
            self.buffer.push_str("\\u");
            self.replay(consumed);
            return;
        };
        if !(0xD800..=0xDBFF).contains(&unit) {
            self.buffer.push(unit_to_char(unit));
            return;
        }
        let mut tail = Vec::with_capacity(6);
        match self.read_low_surrogate(log, &mut tail) {
            Some(low) => {
                let code = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                self.buffer.push(char::from_u32(code).unwrap_or(REPLACEMENT_CHARACTER));
            }
            None => {
                self.buffer.push(REPLACEMENT_CHARACTER);
                self.replay(tail);
            }
        }
    }

    fn read_low_surrogate(&mut self, log: &dyn DebugContext, tail: &mut Vec<char>) -> Option<u16> {
        for expected in ['\\', 'u'] {
            let c = self.next_char(log)?;
            tail.push(c);
            if c != expected {
                return None;
            }
        }
        let unit = self.read_hex_unit(log, tail)?;
        (0xDC00..=0xDFFF).contains(&unit).then_some(unit)
    }

    fn read_hex_unit(&mut self, log: &dyn DebugContext, consumed: &mut Vec<char>) -> Option<u16> {
        let start = consumed.len();
        for _ in 0..4 {
            consumed.push(self.next_char(log)?);
        }
        let digits = &consumed[start..];
        if !digits.iter().all(char::is_ascii_hexdigit) {
            return None;
        }
        u16::from_str_radix(&digits.iter().collect::<String>(), 16).ok()
    }
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('"') && text.ends_with('"')
}

/// Guesses the entry kind of unstructured scalar text.
///
/// Checked in order: `null`, quoted string, reference sigils, 36-character
/// GUID text, text containing `.` or `,` (floating point), `true`/`false`,
/// and finally integer.
pub fn guess_primitive_type(content: &str) -> EntryType {
    let sigils = [
        (INTERNAL_REF_SIG, EntryType::InternalReference),
        (EXTERNAL_INDEX_REF_SIG, EntryType::ExternalReferenceByIndex),
        (EXTERNAL_GUID_REF_SIG, EntryType::ExternalReferenceByGuid),
        (EXTERNAL_STRING_REF_SIG, EntryType::ExternalReferenceByString),
    ];
    if content == "null" {
        return EntryType::Null;
    }
    if is_quoted(content) {
        return EntryType::String;
    }
    if let Some((_, entry)) = sigils.iter().find(|(sig, _)| strip_sigil(content, sig).is_some()) {
        return *entry;
    }
    if content.chars().count() == 36 && content.rfind('-').is_some_and(|at| at > 0) {
        return EntryType::Guid;
    }
    if content.contains('.') || content.contains(',') {
        return EntryType::FloatingPoint;
    }
    if content == "true" || content == "false" {
        return EntryType::Boolean;
    }
    EntryType::Integer
}
