// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The reader contract shared by both encodings.
//!
//! Readers never fail hard. A typed read whose entry does not match skips
//! that entry and returns `None`; malformed content is logged and the
//! entry is consumed. Either way the reader stays positioned on an entry
//! boundary.

use uuid::Uuid;

use crate::element::PrimitiveElement;
use crate::entry::{EntryType, NodeStack, Primitive};
use crate::numeric::{Decimal, narrow};

/// Header of a node opened by [`DataReader::enter_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnteredNode<T> {
    /// Node name, if the entry was named.
    pub name: Option<String>,
    /// Reference id, `-1` for struct nodes.
    pub id: i32,
    /// Bound node type, if the header carried one that could be bound.
    pub ty: Option<T>,
}

/// Pulls entries from a stream.
pub trait DataReader {
    /// Type descriptor bound from node headers.
    type Type;

    /// Kind of the next entry. Idempotent until the entry is consumed.
    fn peek_entry(&mut self) -> EntryType;

    /// Name of the peeked entry, if it has one. Call after `peek_entry`.
    fn peeked_entry_name(&self) -> Option<&str>;

    /// Enters the next entry if it is a node; otherwise skips it.
    fn enter_node(&mut self) -> Option<EnteredNode<Self::Type>>;

    /// Skips to the end of the innermost node and consumes its end marker.
    ///
    /// Returns `false` if the stream ended first.
    fn exit_node(&mut self) -> bool;

    /// Enters the next entry if it is an array and returns its length;
    /// otherwise skips it.
    fn enter_array(&mut self) -> Option<i64>;

    /// Skips to the end of the innermost array and consumes its end marker.
    ///
    /// Returns `false` if the stream ended first.
    fn exit_array(&mut self) -> bool;

    /// Reads a primitive array of element type `T`.
    fn read_primitive_array<T: PrimitiveElement>(&mut self) -> Option<Vec<T>>;

    /// Reads any integer or float entry as `i64`.
    ///
    /// Out-of-range values read as `0` and still succeed.
    fn read_i64(&mut self) -> Option<i64>;
    /// Reads any integer or float entry as `u64`.
    ///
    /// Out-of-range values read as `0` and still succeed.
    fn read_u64(&mut self) -> Option<u64>;

    /// Reads an integer entry as `i8`; out-of-range values read as `0`.
    fn read_i8(&mut self) -> Option<i8> {
        self.read_i64().map(narrow)
    }
    /// Reads an integer entry as `u8`; out-of-range values read as `0`.
    fn read_u8(&mut self) -> Option<u8> {
        self.read_u64().map(narrow)
    }
    /// Reads an integer entry as `i16`; out-of-range values read as `0`.
    fn read_i16(&mut self) -> Option<i16> {
        self.read_i64().map(narrow)
    }
    /// Reads an integer entry as `u16`; out-of-range values read as `0`.
    fn read_u16(&mut self) -> Option<u16> {
        self.read_u64().map(narrow)
    }
    /// Reads an integer entry as `i32`; out-of-range values read as `0`.
    fn read_i32(&mut self) -> Option<i32> {
        self.read_i64().map(narrow)
    }
    /// Reads an integer entry as `u32`; out-of-range values read as `0`.
    fn read_u32(&mut self) -> Option<u32> {
        self.read_u64().map(narrow)
    }

    /// Reads a float or integer entry as `f32`. Finite values beyond the
    /// `f32` range read as `0.0`.
    fn read_f32(&mut self) -> Option<f32>;
    /// Reads a float or integer entry as `f64`.
    fn read_f64(&mut self) -> Option<f64>;
    /// Reads a float or integer entry as a decimal.
    fn read_decimal(&mut self) -> Option<Decimal>;
    /// Reads a char entry, or the first character of a string entry.
    fn read_char(&mut self) -> Option<char>;
    /// Reads a string entry, or a char entry as a one-character string.
    fn read_string(&mut self) -> Option<String>;
    /// Reads a GUID entry.
    fn read_guid(&mut self) -> Option<Uuid>;
    /// Reads a boolean entry.
    fn read_bool(&mut self) -> Option<bool>;
    /// Consumes a null entry; `false` (after skipping) for anything else.
    fn read_null(&mut self) -> bool;

    /// Reads an internal reference id.
    fn read_internal_reference(&mut self) -> Option<i32>;
    /// Reads an external reference index.
    fn read_external_reference_by_index(&mut self) -> Option<i32>;
    /// Reads an external reference GUID.
    fn read_external_reference_by_guid(&mut self) -> Option<Uuid>;
    /// Reads an external reference string id.
    fn read_external_reference_by_string(&mut self) -> Option<String>;

    /// Reads the peeked primitive entry as a dynamically typed value.
    fn read_primitive(&mut self) -> Option<Primitive>;

    /// Discards the peeked entry's header and payload.
    ///
    /// Node and array bodies are left in place; use
    /// [`DataReader::skip_entry`] to skip a whole subtree.
    fn consume_current_entry(&mut self);

    /// Skips the next entry together with everything it contains.
    ///
    /// End markers that close an enclosing container are never consumed, so
    /// an enclosing `exit_node` or `exit_array` still finds them.
    ///
    /// Nesting is tracked with a counter, so arbitrarily deep input is
    /// skipped in constant stack space. The node stack is left untouched.
    fn skip_entry(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_entry() {
                EntryType::StartOfNode | EntryType::StartOfArray => {
                    self.consume_current_entry();
                    depth += 1;
                }
                EntryType::EndOfNode | EntryType::EndOfArray => {
                    if depth == 0 {
                        return;
                    }
                    self.consume_current_entry();
                    depth -= 1;
                }
                EntryType::EndOfStream => return,
                _ => self.consume_current_entry(),
            }
            if depth == 0 {
                return;
            }
        }
    }

    /// Starts a fresh session: type ids, reference nodes, the node stack
    /// and the peek cache are forgotten. The stream position is kept.
    fn prepare_new_serialization_session(&mut self);

    /// Diagnostic rendering of buffered, not yet consumed input.
    fn data_dump(&self) -> String;

    /// Open nodes and arrays.
    fn nodes(&self) -> &NodeStack<Self::Type>;
}
