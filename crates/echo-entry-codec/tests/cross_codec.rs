// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::panic)]
use echo_entry_codec::{
    BinaryDataReader, BinaryDataWriter, DataReader, DataWriter, EntryType, JsonDataReader,
    JsonDataWriter, TypeName, WriteError, dump_entries,
};

mod common;
use common::{GUID, context, write_everything};

/// Scene-like graph without primitive arrays, so every entry can be pumped
/// through the trait surface alone.
fn write_scene<W: DataWriter<Type = TypeName> + ?Sized>(w: &mut W) -> Result<(), WriteError> {
    let node = TypeName::from("Scene.Node");
    w.begin_reference_node(Some("scene"), Some(&TypeName::from("Scene")), 0)?;
    w.write_string(Some("title"), "demo")?;
    w.begin_array_node(2)?;
    for (i, label) in ["left", "right"].into_iter().enumerate() {
        w.begin_reference_node(None, Some(&node), i32::try_from(i).unwrap_or_default() + 1)?;
        w.write_string(Some("label"), label)?;
        w.write_f32(Some("weight"), 0.5)?;
        w.write_char(Some("key"), 'k')?;
        w.write_internal_reference(Some("scene"), 0)?;
        w.end_node(None)?;
    }
    w.end_array_node()?;
    w.write_external_reference_by_guid(Some("asset"), GUID)?;
    w.write_null(Some("parent"))?;
    w.end_node(Some("scene"))?;
    w.flush_to_stream()
}

/// Copies every entry from `r` to `w`, assuming no primitive arrays.
fn pump<R, W>(r: &mut R, w: &mut W) -> Result<(), WriteError>
where
    R: DataReader<Type = TypeName> + ?Sized,
    W: DataWriter<Type = TypeName> + ?Sized,
{
    let mut names: Vec<Option<String>> = Vec::new();
    loop {
        let entry = r.peek_entry();
        let name = r.peeked_entry_name().map(str::to_owned);
        match entry {
            EntryType::EndOfStream => break,
            EntryType::StartOfNode => {
                let node = r.enter_node().unwrap();
                if node.id >= 0 {
                    w.begin_reference_node(node.name.as_deref(), node.ty.as_ref(), node.id)?;
                } else {
                    w.begin_struct_node(node.name.as_deref(), node.ty.as_ref())?;
                }
                names.push(node.name);
            }
            EntryType::EndOfNode => {
                assert!(r.exit_node());
                w.end_node(names.pop().flatten().as_deref())?;
            }
            EntryType::StartOfArray => {
                let length = r.enter_array().unwrap();
                w.begin_array_node(length)?;
            }
            EntryType::EndOfArray => {
                assert!(r.exit_array());
                w.end_array_node()?;
            }
            EntryType::InternalReference => {
                w.write_internal_reference(name.as_deref(), r.read_internal_reference().unwrap())?;
            }
            EntryType::ExternalReferenceByIndex => {
                let index = r.read_external_reference_by_index().unwrap();
                w.write_external_reference_by_index(name.as_deref(), index)?;
            }
            EntryType::ExternalReferenceByGuid => {
                let guid = r.read_external_reference_by_guid().unwrap();
                w.write_external_reference_by_guid(name.as_deref(), guid)?;
            }
            EntryType::ExternalReferenceByString => {
                let id = r.read_external_reference_by_string().unwrap();
                w.write_external_reference_by_string(name.as_deref(), &id)?;
            }
            EntryType::PrimitiveArray | EntryType::Invalid => panic!("unexpected entry"),
            _ => {
                let value = r.read_primitive().unwrap();
                w.write_primitive(name.as_deref(), &value)?;
            }
        }
    }
    w.flush_to_stream()
}

fn scene_json() -> String {
    let mut w = JsonDataWriter::new(Vec::new(), context());
    write_scene(&mut w).unwrap();
    String::from_utf8(w.into_inner().unwrap()).unwrap()
}

fn scene_binary() -> Vec<u8> {
    let mut w = BinaryDataWriter::new(Vec::new(), context());
    write_scene(&mut w).unwrap();
    w.into_inner().unwrap()
}

#[test]
fn both_encodings_list_the_same_entries() {
    let mut w = BinaryDataWriter::new(Vec::new(), context());
    write_everything(&mut w).unwrap();
    let binary = w.into_inner().unwrap();
    let mut w = JsonDataWriter::new(Vec::new(), context());
    write_everything(&mut w).unwrap();
    let json = w.into_inner().unwrap();

    let from_binary = dump_entries(&mut BinaryDataReader::from_slice(&binary, context()));
    let from_json = dump_entries(&mut JsonDataReader::from_slice(&json, context()));
    assert_eq!(from_binary.stats, from_json.stats);
    assert_eq!(from_binary.stats.nodes, 5);
    assert_eq!(from_binary.stats.references, 4);
    assert_eq!(from_binary.stats.primitive_arrays, 3);
    assert_eq!(from_binary.stats.invalid, 0);
}

#[test]
fn binary_pumped_into_json_matches_direct_json() {
    let binary = scene_binary();
    let mut r = BinaryDataReader::from_slice(&binary, context());
    let mut w = JsonDataWriter::new(Vec::new(), context());
    pump(&mut r, &mut w).unwrap();
    let pumped = String::from_utf8(w.into_inner().unwrap()).unwrap();
    assert_eq!(pumped, scene_json());
}

#[test]
fn json_pumped_into_binary_reads_back() {
    let json = scene_json();
    let mut r = JsonDataReader::from_text(&json, context());
    let mut w = BinaryDataWriter::new(Vec::new(), context());
    pump(&mut r, &mut w).unwrap();
    let bytes = w.into_inner().unwrap();

    let mut r = BinaryDataReader::from_slice(&bytes, context());
    let scene = r.enter_node().unwrap();
    assert_eq!((scene.id, scene.ty), (0, Some(TypeName::from("Scene"))));
    assert_eq!(r.read_string().as_deref(), Some("demo"));
    assert_eq!(r.enter_array(), Some(2));
    for (id, label) in [(1, "left"), (2, "right")] {
        let node = r.enter_node().unwrap();
        assert_eq!((node.id, node.ty), (id, Some(TypeName::from("Scene.Node"))));
        assert_eq!(r.read_string().as_deref(), Some(label));
        assert_eq!(r.read_f32(), Some(0.5));
        assert_eq!(r.read_char(), Some('k'));
        assert_eq!(r.read_internal_reference(), Some(0));
        assert!(r.exit_node());
    }
    assert!(r.exit_array());
    assert_eq!(r.read_external_reference_by_guid(), Some(GUID));
    assert!(r.read_null());
    assert!(r.exit_node());
    assert_eq!(r.peek_entry(), EntryType::EndOfStream);
}
