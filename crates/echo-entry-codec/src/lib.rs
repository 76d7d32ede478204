// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Streaming entry codecs for Echo.
//!
//! An object graph is linearized elsewhere into a flat sequence of
//! *entries*: node and array boundaries, primitive values and references.
//! This crate encodes that sequence and decodes it again, in two
//! interchangeable encodings:
//!
//! - [`binary`]: tagged bytes with fixed-width little-endian payloads.
//! - [`json`]: JSON text with `$`-prefixed members for ids, types, array
//!   lengths and references.
//!
//! Both speak the same [`DataWriter`] / [`DataReader`] contract and the same
//! [`EntryType`] vocabulary, so a driver written against the traits works
//! with either.
//!
//! Readers never fail hard: malformed input is reported through the
//! context's [`DebugContext`] and the reader recovers at the next entry.
//! Writers return [`WriteError`] for I/O failures and for call sequences
//! that cannot produce a well-formed stream.
//!
//! ```
//! use echo_entry_codec::{
//!     BinaryDataReader, BinaryDataWriter, DataReader, DataWriter, NameBinder,
//!     SerializationContext,
//! };
//!
//! let mut writer = BinaryDataWriter::new(Vec::new(), SerializationContext::new(NameBinder));
//! writer.begin_struct_node(Some("root"), None).unwrap();
//! writer.write_i32(Some("x"), 42).unwrap();
//! writer.end_node(Some("root")).unwrap();
//! let bytes = writer.into_inner().unwrap();
//!
//! let mut reader = BinaryDataReader::from_slice(&bytes, SerializationContext::new(NameBinder));
//! let node = reader.enter_node().unwrap();
//! assert_eq!(node.name.as_deref(), Some("root"));
//! assert_eq!(reader.read_i32(), Some(42));
//! assert!(reader.exit_node());
//! ```

pub mod binary;
pub mod context;
pub mod dump;
pub mod element;
pub mod entry;
pub mod error;
pub mod io;
pub mod json;
pub mod numeric;
pub mod reader;
pub mod registry;
pub mod writer;

pub use binary::{BinaryDataReader, BinaryDataWriter, BinaryWriterOptions};
pub use context::{
    DebugContext, LoggingPolicy, NameBinder, RecordingDebugContext, SerializationContext,
    TracingDebugContext, TypeBinder, TypeName, TypeTable,
};
pub use dump::{EntryListing, EntryStats, dump_entries};
pub use element::PrimitiveElement;
pub use entry::{BinaryEntryType, EntryType, NodeInfo, NodeStack, Primitive};
pub use error::WriteError;
pub use io::{ByteSource, SliceSource, StreamSource};
pub use json::{JsonDataReader, JsonDataWriter, JsonWriterOptions};
pub use numeric::Decimal;
pub use reader::{DataReader, EnteredNode};
pub use writer::DataWriter;
