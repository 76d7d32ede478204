// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Buffered byte sinks and sources.
//!
//! Writers batch output through a [`WriteBuffer`]; readers pull input
//! through a [`ByteSource`]. In-memory sources expose their data directly,
//! stream sources keep a growable window.

use std::char::REPLACEMENT_CHARACTER;
use std::io::{self, Cursor, Read, Write};

/// Default capacity of write buffers and stream read windows (100 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 100 * 1024;

/// Fixed-capacity batching buffer in front of a [`Write`] stream.
#[derive(Debug)]
pub struct WriteBuffer<W: Write> {
    inner: W,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: Write> WriteBuffer<W> {
    /// Buffer of `capacity` bytes (at least one) in front of `inner`.
    pub fn new(inner: W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { inner, buf: Vec::with_capacity(capacity), capacity }
    }

    /// Flushes pending bytes if `n` more would not fit.
    ///
    /// # Errors
    /// Propagates write errors from the stream.
    pub fn ensure_space(&mut self, n: usize) -> io::Result<()> {
        if self.buf.len() + n > self.capacity {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Like [`WriteBuffer::ensure_space`], but returns `false` without
    /// flushing when `n` exceeds the capacity of an empty buffer.
    ///
    /// # Errors
    /// Propagates write errors from the stream.
    pub fn try_ensure_space(&mut self, n: usize) -> io::Result<bool> {
        if n > self.capacity {
            return Ok(false);
        }
        self.ensure_space(n)?;
        Ok(true)
    }

    /// Appends one byte.
    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Appends a byte slice.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends `n` zero bytes and returns them for in-place encoding.
    pub fn slot(&mut self, n: usize) -> &mut [u8] {
        let start = self.buf.len();
        self.buf.resize(start + n, 0);
        &mut self.buf[start..]
    }

    /// Flushes pending bytes, then writes `bytes` straight to the stream.
    ///
    /// # Errors
    /// Propagates write errors from the stream.
    pub fn write_direct(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.flush_buffer()?;
        self.inner.write_all(bytes)
    }

    /// Writes pending bytes and flushes the stream.
    ///
    /// # Errors
    /// Propagates write and flush errors from the stream.
    pub fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.inner.flush()
    }

    /// Bytes accepted but not yet written to the stream.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Flushes and returns the underlying stream.
    ///
    /// # Errors
    /// Propagates write and flush errors from the stream.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        let Self { inner, .. } = self;
        Ok(inner)
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

/// Pull-based byte input for readers.
pub trait ByteSource {
    /// Makes at least `n` unread bytes available in [`ByteSource::window`].
    ///
    /// Returns `false` when the input ends first.
    ///
    /// # Errors
    /// Propagates read errors from an underlying stream.
    fn fill(&mut self, n: usize) -> io::Result<bool>;

    /// Unread bytes currently available.
    fn window(&self) -> &[u8];

    /// Marks `n` bytes of the window as read (clamped to the window).
    fn consume(&mut self, n: usize);

    /// Discards `n` bytes, refilling as needed. `false` if input ends first.
    ///
    /// # Errors
    /// Propagates read errors from an underlying stream.
    fn skip(&mut self, mut n: usize) -> io::Result<bool> {
        while n > 0 {
            let available = self.window().len();
            if available == 0 {
                if !self.fill(1)? {
                    return Ok(false);
                }
                continue;
            }
            let step = available.min(n);
            self.consume(step);
            n -= step;
        }
        Ok(true)
    }
}

/// Borrowed in-memory input.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SliceSource<'a> {
    /// Source over `bytes`, starting at the beginning.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bytes read so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl ByteSource for SliceSource<'_> {
    fn fill(&mut self, n: usize) -> io::Result<bool> {
        Ok(self.window().len() >= n)
    }

    fn window(&self) -> &[u8] {
        &self.bytes[self.position..]
    }

    fn consume(&mut self, n: usize) {
        self.position = self.position.saturating_add(n).min(self.bytes.len());
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn fill(&mut self, n: usize) -> io::Result<bool> {
        Ok(self.window().len() >= n)
    }

    fn window(&self) -> &[u8] {
        let data = self.get_ref().as_ref();
        let position = usize::try_from(self.position()).map_or(data.len(), |p| p.min(data.len()));
        &data[position..]
    }

    fn consume(&mut self, n: usize) {
        let n = n.min(self.window().len());
        let step = u64::try_from(n).unwrap_or(u64::MAX);
        self.set_position(self.position().saturating_add(step));
    }
}

/// Input pulled from a [`Read`] stream through a growable window.
///
/// The window compacts unread bytes on refill and doubles only while data
/// keeps arriving, so a bogus length prefix cannot force a huge allocation.
#[derive(Debug)]
pub struct StreamSource<R: Read> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl<R: Read> StreamSource<R> {
    /// Source with the default window capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_CAPACITY)
    }

    /// Source with an initial window of `capacity` bytes (at least one).
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self { inner, buf: vec![0; capacity.max(1)], start: 0, end: 0 }
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Returns the underlying stream. Buffered unread bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn fill(&mut self, n: usize) -> io::Result<bool> {
        if self.end - self.start >= n {
            return Ok(true);
        }
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        while self.end < n {
            if self.end == self.buf.len() {
                let grown = self.buf.len().saturating_mul(2);
                self.buf.resize(grown, 0);
            }
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => return Ok(false),
                Ok(read) => self.end += read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    fn window(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    fn consume(&mut self, n: usize) {
        self.start = self.start.saturating_add(n).min(self.end);
    }
}

/// Incremental UTF-8 decoder over a [`ByteSource`].
///
/// Invalid or truncated sequences decode to U+FFFD.
#[derive(Debug)]
pub struct CharSource<S> {
    source: S,
    peeked: Option<char>,
}

impl<S: ByteSource> CharSource<S> {
    /// Decoder over `source`.
    pub fn new(source: S) -> Self {
        Self { source, peeked: None }
    }

    /// Next character without consuming it.
    ///
    /// # Errors
    /// Propagates read errors from the source.
    pub fn peek(&mut self) -> io::Result<Option<char>> {
        if self.peeked.is_none() {
            self.peeked = self.decode()?;
        }
        Ok(self.peeked)
    }

    /// Consumes and returns the next character.
    ///
    /// # Errors
    /// Propagates read errors from the source.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        match self.peeked.take() {
            Some(c) => Ok(Some(c)),
            None => self.decode(),
        }
    }

    /// Underlying byte source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the byte source. A peeked character is lost.
    pub fn into_inner(self) -> S {
        self.source
    }

    fn decode(&mut self) -> io::Result<Option<char>> {
        if !self.source.fill(1)? {
            return Ok(None);
        }
        let width = utf8_width(self.source.window()[0]);
        if width == 0 {
            self.source.consume(1);
            return Ok(Some(REPLACEMENT_CHARACTER));
        }
        if !self.source.fill(width)? {
            let rest = self.source.window().len();
            self.source.consume(rest);
            return Ok(Some(REPLACEMENT_CHARACTER));
        }
        let decoded = std::str::from_utf8(&self.source.window()[..width])
            .ok()
            .and_then(|text| text.chars().next());
        match decoded {
            Some(c) => {
                self.source.consume(width);
                Ok(Some(c))
            }
            None => {
                self.source.consume(1);
                Ok(Some(REPLACEMENT_CHARACTER))
            }
        }
    }
}

const fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}
