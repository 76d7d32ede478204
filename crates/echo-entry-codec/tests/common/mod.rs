// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use std::sync::Arc;

use echo_entry_codec::{
    DataReader, DataWriter, Decimal, EntryType, NameBinder, RecordingDebugContext,
    SerializationContext, TypeName, WriteError,
};
use uuid::Uuid;

pub const GUID: Uuid = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);

pub fn context() -> SerializationContext<NameBinder> {
    SerializationContext::new(NameBinder)
}

pub fn recording_context() -> (SerializationContext<NameBinder>, Arc<RecordingDebugContext>) {
    let recorder = Arc::new(RecordingDebugContext::new());
    (SerializationContext::new(NameBinder).with_debug_context(recorder.clone()), recorder)
}

pub fn decimal() -> Decimal {
    "-12.345".parse().unwrap()
}

/// One of every primitive and reference kind, inside a typed reference node.
pub fn write_everything<W: DataWriter<Type = TypeName> + ?Sized>(
    w: &mut W,
) -> Result<(), WriteError> {
    w.begin_reference_node(Some("root"), Some(&TypeName::from("Sample.Root")), 0)?;
    w.write_i8(Some("i8"), i8::MIN)?;
    w.write_u8(Some("u8"), u8::MAX)?;
    w.write_i16(Some("i16"), i16::MIN)?;
    w.write_u16(Some("u16"), u16::MAX)?;
    w.write_i32(Some("i32"), i32::MIN)?;
    w.write_u32(Some("u32"), u32::MAX)?;
    w.write_i64(Some("i64"), i64::MIN)?;
    w.write_u64(Some("u64"), u64::MAX)?;
    w.write_f32(Some("f32"), 1.5)?;
    w.write_f32(Some("f32_nan"), f32::NAN)?;
    w.write_f32(Some("f32_inf"), f32::INFINITY)?;
    w.write_f64(Some("f64"), -0.25)?;
    w.write_f64(Some("f64_max"), f64::MAX)?;
    w.write_f64(Some("f64_neg_inf"), f64::NEG_INFINITY)?;
    w.write_decimal(Some("decimal"), decimal())?;
    w.write_char(Some("char"), 'é')?;
    w.write_string(Some("empty"), "")?;
    w.write_string(Some("text"), "héllo \"world\"\n\t\\")?;
    w.write_guid(Some("nil"), Uuid::nil())?;
    w.write_guid(Some("guid"), GUID)?;
    w.write_bool(Some("yes"), true)?;
    w.write_bool(Some("no"), false)?;
    w.write_null(Some("nothing"))?;

    w.begin_struct_node(Some("child"), Some(&TypeName::from("Sample.Child")))?;
    w.write_internal_reference(Some("parent"), 0)?;
    w.write_external_reference_by_index(Some("asset"), 7)?;
    w.write_external_reference_by_guid(Some("by_guid"), GUID)?;
    w.write_external_reference_by_string(Some("by_name"), "ext/id \"7\"")?;
    w.end_node(Some("child"))?;

    w.begin_array_node(3)?;
    for i in 0..3 {
        w.begin_struct_node(None, Some(&TypeName::from("Sample.Child")))?;
        w.write_i32(Some("index"), i)?;
        w.end_node(None)?;
    }
    w.end_array_node()?;

    w.write_primitive_array(&[1i32, -2, 3])?;
    w.write_primitive_array(&['a', 'b'])?;
    w.write_primitive_array::<f64>(&[])?;
    w.end_node(Some("root"))?;
    w.flush_to_stream()
}

fn expect_name<R: DataReader + ?Sized>(r: &mut R, name: &str) {
    r.peek_entry();
    assert_eq!(r.peeked_entry_name(), Some(name));
}

/// Reads back what [`write_everything`] wrote.
pub fn assert_everything<R: DataReader<Type = TypeName> + ?Sized>(r: &mut R) {
    let root = r.enter_node().unwrap();
    assert_eq!(root.name.as_deref(), Some("root"));
    assert_eq!(root.id, 0);
    assert_eq!(root.ty, Some(TypeName::from("Sample.Root")));

    expect_name(r, "i8");
    assert_eq!(r.read_i8(), Some(i8::MIN));
    assert_eq!(r.read_u8(), Some(u8::MAX));
    assert_eq!(r.read_i16(), Some(i16::MIN));
    assert_eq!(r.read_u16(), Some(u16::MAX));
    assert_eq!(r.read_i32(), Some(i32::MIN));
    assert_eq!(r.read_u32(), Some(u32::MAX));
    assert_eq!(r.read_i64(), Some(i64::MIN));
    assert_eq!(r.read_u64(), Some(u64::MAX));
    assert_eq!(r.read_f32(), Some(1.5));
    assert!(r.read_f32().unwrap().is_nan());
    assert_eq!(r.read_f32(), Some(f32::INFINITY));
    assert_eq!(r.read_f64(), Some(-0.25));
    assert_eq!(r.read_f64(), Some(f64::MAX));
    assert_eq!(r.read_f64(), Some(f64::NEG_INFINITY));
    assert_eq!(r.read_decimal(), Some(decimal()));
    assert_eq!(r.read_char(), Some('é'));
    assert_eq!(r.read_string().as_deref(), Some(""));
    assert_eq!(r.read_string().as_deref(), Some("héllo \"world\"\n\t\\"));
    assert_eq!(r.read_guid(), Some(Uuid::nil()));
    assert_eq!(r.read_guid(), Some(GUID));
    assert_eq!(r.read_bool(), Some(true));
    assert_eq!(r.read_bool(), Some(false));
    expect_name(r, "nothing");
    assert!(r.read_null());

    let child = r.enter_node().unwrap();
    assert_eq!(child.id, -1);
    assert_eq!(child.ty, Some(TypeName::from("Sample.Child")));
    assert_eq!(r.read_internal_reference(), Some(0));
    assert_eq!(r.read_external_reference_by_index(), Some(7));
    assert_eq!(r.read_external_reference_by_guid(), Some(GUID));
    assert_eq!(r.read_external_reference_by_string().as_deref(), Some("ext/id \"7\""));
    assert!(r.exit_node());

    assert_eq!(r.enter_array(), Some(3));
    for i in 0..3 {
        let element = r.enter_node().unwrap();
        assert_eq!(element.name, None);
        assert_eq!(element.ty, Some(TypeName::from("Sample.Child")));
        assert_eq!(r.read_i32(), Some(i));
        assert!(r.exit_node());
    }
    assert!(r.exit_array());

    assert_eq!(r.read_primitive_array::<i32>(), Some(vec![1, -2, 3]));
    assert_eq!(r.read_primitive_array::<char>(), Some(vec!['a', 'b']));
    assert_eq!(r.read_primitive_array::<f64>(), Some(Vec::new()));
    assert!(r.exit_node());
    assert_eq!(r.peek_entry(), EntryType::EndOfStream);
    assert_eq!(r.nodes().depth(), 0);
}
