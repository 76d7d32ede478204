// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used)]
use std::io::{self, Read};

use echo_entry_codec::{
    BinaryDataReader, BinaryDataWriter, BinaryEntryType, BinaryWriterOptions, DataReader,
    DataWriter, EntryType, LoggingPolicy, NameBinder, Primitive, TypeName,
};
use proptest::prelude::*;

mod common;
use common::{assert_everything, context, recording_context, write_everything};

fn written(f: impl FnOnce(&mut BinaryDataWriter<Vec<u8>, NameBinder>)) -> Vec<u8> {
    let mut w = BinaryDataWriter::new(Vec::new(), context());
    f(&mut w);
    w.into_inner().unwrap()
}

/// Hands out at most `chunk` bytes per read.
struct Chunked<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(out.len()).min(self.data.len());
        out[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

#[test]
fn everything_round_trips_from_a_slice() {
    let bytes = written(|w| write_everything(w).unwrap());
    let (ctx, log) = recording_context();
    let mut r = BinaryDataReader::from_slice(&bytes, ctx);
    assert_everything(&mut r);
    assert!(log.messages().is_empty());
}

#[test]
fn everything_round_trips_from_a_trickling_stream() {
    let bytes = written(|w| write_everything(w).unwrap());
    let mut r = BinaryDataReader::from_reader(Chunked { data: &bytes, chunk: 3 }, context());
    assert_everything(&mut r);
}

#[test]
fn everything_round_trips_through_a_tiny_write_buffer() {
    let options = BinaryWriterOptions { buffer_capacity: 5, compress_strings_to_8bit: true };
    let mut w = BinaryDataWriter::with_options(Vec::new(), context(), options);
    write_everything(&mut w).unwrap();
    let bytes = w.into_inner().unwrap();
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    assert_everything(&mut r);
}

#[test]
fn root_scenario_bytes() {
    let bytes = written(|w| {
        w.begin_struct_node(Some("root"), None).unwrap();
        w.write_i32(Some("x"), 42).unwrap();
        w.write_string(Some("y"), "hi").unwrap();
        w.end_node(Some("root")).unwrap();
    });
    let mut expected = vec![BinaryEntryType::NamedStartOfStructNode as u8, 1, 4, 0, 0, 0];
    expected.extend_from_slice(&[b'r', 0, b'o', 0, b'o', 0, b't', 0]);
    expected.push(BinaryEntryType::UnnamedNull as u8);
    expected.extend_from_slice(&[BinaryEntryType::NamedInt as u8, 1, 1, 0, 0, 0, b'x', 0]);
    expected.extend_from_slice(&[42, 0, 0, 0]);
    expected.extend_from_slice(&[BinaryEntryType::NamedString as u8, 1, 1, 0, 0, 0, b'y', 0]);
    expected.extend_from_slice(&[1, 2, 0, 0, 0, b'h', 0, b'i', 0]);
    expected.push(BinaryEntryType::EndOfNode as u8);
    assert_eq!(bytes, expected);

    let mut r = BinaryDataReader::from_slice(&bytes, context());
    let root = r.enter_node().unwrap();
    assert_eq!((root.name.as_deref(), root.id, root.ty), (Some("root"), -1, None));
    assert_eq!(r.read_i32(), Some(42));
    assert_eq!(r.read_string().as_deref(), Some("hi"));
    assert!(r.exit_node());
}

#[test]
fn type_names_are_written_once_per_session() {
    let ty = TypeName::from("Game.Player");
    let count = |bytes: &[u8], tag: BinaryEntryType| {
        bytes.iter().filter(|b| **b == tag as u8).count()
    };

    let mut w = BinaryDataWriter::new(Vec::new(), context());
    for _ in 0..3 {
        w.begin_struct_node(None, Some(&ty)).unwrap();
        w.end_node(None).unwrap();
    }
    w.prepare_new_serialization_session();
    w.begin_struct_node(None, Some(&ty)).unwrap();
    w.end_node(None).unwrap();
    let bytes = w.into_inner().unwrap();

    assert_eq!(count(&bytes, BinaryEntryType::TypeName), 2);
    assert_eq!(count(&bytes, BinaryEntryType::TypeID), 2);
}

#[test]
fn reader_session_reset_forgets_type_ids() {
    let ty = TypeName::from("T");
    let bytes = written(|w| {
        w.begin_struct_node(None, Some(&ty)).unwrap();
        w.end_node(None).unwrap();
        w.begin_struct_node(None, Some(&ty)).unwrap();
        w.end_node(None).unwrap();
    });
    let (ctx, log) = recording_context();
    let mut r = BinaryDataReader::from_slice(&bytes, ctx);
    assert_eq!(r.enter_node().unwrap().ty, Some(ty));
    assert!(r.exit_node());
    r.prepare_new_serialization_session();
    assert_eq!(r.enter_node().unwrap().ty, None);
    assert!(r.exit_node());
    assert!(log.errors()[0].contains("Missing type id"));
}

#[test]
fn array_length_integrity() {
    let bytes = written(|w| {
        w.begin_array_node(5).unwrap();
        for i in 0..5u16 {
            w.write_u16(None, i).unwrap();
        }
        w.end_array_node().unwrap();
    });
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    assert_eq!(r.enter_array(), Some(5));
    for i in 0..5u16 {
        assert_eq!(r.read_u16(), Some(i));
    }
    assert!(r.exit_array());
    assert_eq!(r.peek_entry(), EntryType::EndOfStream);
}

#[test]
fn mismatch_recovery_lands_on_the_next_entry() {
    let bytes = written(|w| {
        w.write_string(Some("s"), "not a bool").unwrap();
        w.write_i32(Some("n"), 9).unwrap();
    });
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    assert_eq!(r.read_bool(), None);
    assert_eq!(r.peek_entry(), EntryType::Integer);
    assert_eq!(r.peeked_entry_name(), Some("n"));
}

#[test]
fn failed_reads_leave_end_markers_in_place() {
    let bytes = written(|w| {
        w.begin_struct_node(Some("a"), None).unwrap();
        w.begin_array_node(0).unwrap();
        w.end_array_node().unwrap();
        w.end_node(Some("a")).unwrap();
    });
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    r.enter_node().unwrap();
    assert_eq!(r.enter_array(), Some(0));
    assert_eq!(r.read_i32(), None);
    assert_eq!(r.peek_entry(), EntryType::EndOfArray);
    assert!(r.exit_array());
    assert_eq!(r.read_i32(), None);
    assert_eq!(r.peek_entry(), EntryType::EndOfNode);
    assert!(r.exit_node());
}

#[test]
fn exit_node_skips_unread_members_and_subtrees() {
    let bytes = written(|w| {
        w.begin_struct_node(Some("outer"), None).unwrap();
        w.write_i32(Some("skipped"), 1).unwrap();
        w.begin_struct_node(Some("inner"), None).unwrap();
        w.write_primitive_array(&[1u64, 2]).unwrap();
        w.end_node(Some("inner")).unwrap();
        w.end_node(Some("outer")).unwrap();
        w.write_bool(None, true).unwrap();
    });
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    r.enter_node().unwrap();
    assert!(r.exit_node());
    assert_eq!(r.read_bool(), Some(true));
}

#[test]
fn widening_and_narrowing_reads() {
    let bytes = written(|w| {
        w.write_u8(None, 200).unwrap();
        w.write_i64(None, 1 << 40).unwrap();
        w.write_f64(None, 1e300).unwrap();
        w.write_f32(None, 2.75).unwrap();
        w.write_i16(None, -5).unwrap();
    });
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    assert_eq!(r.read_i64(), Some(200));
    assert_eq!(r.read_i32(), Some(0));
    assert_eq!(r.read_f32(), Some(0.0));
    assert_eq!(r.read_i32(), Some(2));
    assert_eq!(r.read_u32(), Some(0));
}

#[test]
fn read_primitive_reports_the_wire_kind() {
    let bytes = written(|w| {
        w.write_primitive(None, &Primitive::UShort(7)).unwrap();
        w.write_primitive(None, &Primitive::Char('x')).unwrap();
        w.write_primitive(None, &Primitive::Null).unwrap();
    });
    let mut r = BinaryDataReader::from_slice(&bytes, context());
    assert_eq!(r.read_primitive(), Some(Primitive::UShort(7)));
    assert_eq!(r.read_primitive(), Some(Primitive::Char('x')));
    assert_eq!(r.read_primitive(), Some(Primitive::Null));
    assert_eq!(r.read_primitive(), None);
}

#[test]
fn truncated_stream_logs_and_ends() {
    let bytes = written(|w| w.write_string(Some("long"), "truncate me").unwrap());
    let (ctx, log) = recording_context();
    let mut r = BinaryDataReader::from_slice(&bytes[..bytes.len() - 3], ctx);
    assert_eq!(r.read_string(), None);
    assert_eq!(r.peek_entry(), EntryType::EndOfStream);
    assert!(log.errors().iter().any(|e| e.contains("Insufficient data")));
}

#[test]
fn unknown_string_width_flag_reads_as_utf16() {
    let mut bytes = vec![BinaryEntryType::UnnamedString as u8, 7, 2, 0, 0, 0, b'h', 0, b'i', 0];
    bytes.extend(written(|w| w.write_bool(None, true).unwrap()));
    let (ctx, log) = recording_context();
    let ctx = ctx.with_logging_policy(LoggingPolicy::LogWarningsAndErrors);
    let mut r = BinaryDataReader::from_slice(&bytes, ctx);
    assert_eq!(r.read_string().as_deref(), Some("hi"));
    assert_eq!(r.read_bool(), Some(true));
    assert_eq!(r.peek_entry(), EntryType::EndOfStream);
    assert!(log.errors().is_empty());
    assert!(log.warnings()[0].contains("string width flag 0x07"));
}

fn primitive_strategy() -> impl Strategy<Value = Primitive> {
    prop_oneof![
        any::<i8>().prop_map(Primitive::SByte),
        any::<u8>().prop_map(Primitive::Byte),
        any::<i16>().prop_map(Primitive::Short),
        any::<u16>().prop_map(Primitive::UShort),
        any::<i32>().prop_map(Primitive::Int),
        any::<u32>().prop_map(Primitive::UInt),
        any::<i64>().prop_map(Primitive::Long),
        any::<u64>().prop_map(Primitive::ULong),
        any::<f32>()
            .prop_filter("NaN never compares equal", |v| !v.is_nan())
            .prop_map(Primitive::Float),
        any::<f64>()
            .prop_filter("NaN never compares equal", |v| !v.is_nan())
            .prop_map(Primitive::Double),
        any::<char>()
            .prop_filter("one UTF-16 unit", |c| u32::from(*c) <= 0xFFFF)
            .prop_map(Primitive::Char),
        ".{0,40}".prop_map(Primitive::String),
        any::<u128>().prop_map(|v| Primitive::Guid(uuid::Uuid::from_u128(v))),
        any::<bool>().prop_map(Primitive::Boolean),
        Just(Primitive::Null),
    ]
}

proptest! {
    #[test]
    fn primitives_round_trip_exactly(
        values in prop::collection::vec(
            (prop::option::of("[a-z]{1,8}"), primitive_strategy()),
            0..32,
        )
    ) {
        let bytes = written(|w| {
            for (name, value) in &values {
                w.write_primitive(name.as_deref(), value).unwrap();
            }
        });
        let mut r = BinaryDataReader::from_slice(&bytes, context());
        for (name, value) in &values {
            r.peek_entry();
            prop_assert_eq!(r.peeked_entry_name(), name.as_deref());
            let read = r.read_primitive();
            prop_assert_eq!(read.as_ref(), Some(value));
        }
        prop_assert_eq!(r.peek_entry(), EntryType::EndOfStream);
    }

    #[test]
    fn primitive_arrays_round_trip(values in prop::collection::vec(any::<i64>(), 0..256)) {
        let bytes = written(|w| w.write_primitive_array(&values).unwrap());
        let mut r = BinaryDataReader::from_slice(&bytes, context());
        prop_assert_eq!(r.read_primitive_array::<i64>(), Some(values));
    }
}
