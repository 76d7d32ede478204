// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used)]
use echo_entry_codec::{
    BinaryDataReader, BinaryDataWriter, JsonDataReader, JsonDataWriter, LoggingPolicy, dump_entries,
};
use proptest::prelude::*;

mod common;
use common::{context, write_everything};

fn quiet() -> echo_entry_codec::SerializationContext<echo_entry_codec::NameBinder> {
    context().with_logging_policy(LoggingPolicy::Silent)
}

fn everything_binary() -> Vec<u8> {
    let mut w = BinaryDataWriter::new(Vec::new(), context());
    write_everything(&mut w).unwrap();
    w.into_inner().unwrap()
}

fn everything_json() -> Vec<u8> {
    let mut w = JsonDataWriter::new(Vec::new(), context());
    write_everything(&mut w).unwrap();
    w.into_inner().unwrap()
}

proptest! {
    #[test]
    fn fuzz_binary_dump_no_panics(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        // Terminating without a panic is the whole property.
        let mut r = BinaryDataReader::from_slice(&bytes, quiet());
        let _ = dump_entries(&mut r);
    }

    #[test]
    fn fuzz_json_dump_no_panics(text in "[{}\\[\\],:\"$a-z0-9.\\\\ -]{0,256}") {
        let mut r = JsonDataReader::from_text(&text, quiet());
        let _ = dump_entries(&mut r);
    }

    #[test]
    fn fuzz_json_bytes_no_panics(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut r = JsonDataReader::from_slice(&bytes, quiet());
        let _ = dump_entries(&mut r);
    }

    #[test]
    fn fuzz_truncated_binary_stream(cut in 0usize..4096) {
        let bytes = everything_binary();
        let cut = cut % (bytes.len() + 1);
        let mut r = BinaryDataReader::from_slice(&bytes[..cut], quiet());
        let listing = dump_entries(&mut r);
        prop_assert!(listing.stats.nodes <= 5);
    }

    #[test]
    fn fuzz_truncated_json_stream(cut in 0usize..4096) {
        let bytes = everything_json();
        let cut = cut % (bytes.len() + 1);
        let mut r = JsonDataReader::from_slice(&bytes[..cut], quiet());
        let listing = dump_entries(&mut r);
        prop_assert!(listing.stats.nodes <= 5);
    }

    #[test]
    fn fuzz_corrupted_binary_byte(at in 0usize..4096, value in any::<u8>()) {
        let mut bytes = everything_binary();
        let at = at % bytes.len();
        bytes[at] = value;
        let mut r = BinaryDataReader::from_slice(&bytes, quiet());
        let _ = dump_entries(&mut r);
    }
}
