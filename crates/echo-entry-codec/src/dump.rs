// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Human-readable listing of an entry stream.
//!
//! [`dump_entries`] drives any [`DataReader`] through every remaining entry
//! without knowing the shape of the data. It is iterative and consumes at
//! least one entry per step, so it terminates on arbitrary input.

use std::fmt::{self, Write as _};

use crate::entry::EntryType;
use crate::reader::DataReader;

/// Entry counts gathered by [`dump_entries`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStats {
    /// Nodes entered.
    pub nodes: usize,
    /// Regular arrays entered.
    pub arrays: usize,
    /// Primitive arrays skipped.
    pub primitive_arrays: usize,
    /// Primitive values read (including unreadable ones).
    pub primitives: usize,
    /// Internal and external references.
    pub references: usize,
    /// Invalid entries and stray end markers.
    pub invalid: usize,
}

impl fmt::Display for EntryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes: {}, arrays: {}, primitive arrays: {}, primitives: {}, references: {}, \
             invalid: {}",
            self.nodes,
            self.arrays,
            self.primitive_arrays,
            self.primitives,
            self.references,
            self.invalid
        )
    }
}

/// Output of [`dump_entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryListing {
    /// One line per entry, indented two spaces per nesting level up to
    /// [`MAX_INDENT_LEVELS`].
    pub text: String,
    /// Entry counts.
    pub stats: EntryStats,
}

impl EntryListing {
    fn line(&mut self, depth: usize, content: fmt::Arguments<'_>) {
        for _ in 0..depth.min(MAX_INDENT_LEVELS) {
            self.text.push_str("  ");
        }
        let _ = self.text.write_fmt(content);
        self.text.push('\n');
    }
}

/// Deeper entries are listed at this indentation.
pub const MAX_INDENT_LEVELS: usize = 64;

fn unreadable() -> String {
    "<unreadable>".to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Node,
    Array,
}

/// Walks every remaining entry of `reader` and lists it.
///
/// Primitive arrays are listed and skipped; the binary encoding does not
/// record their element type.
pub fn dump_entries<R>(reader: &mut R) -> EntryListing
where
    R: DataReader + ?Sized,
    R::Type: fmt::Debug,
{
    let mut listing = EntryListing::default();
    let mut open: Vec<Container> = Vec::new();

    loop {
        let entry = reader.peek_entry();
        let label = reader.peeked_entry_name().map(|name| format!("{name}: ")).unwrap_or_default();
        let depth = open.len();
        match entry {
            EntryType::EndOfStream => {
                if !open.is_empty() {
                    listing.line(
                        depth,
                        format_args!("<end of stream with {depth} open container(s)>"),
                    );
                }
                break;
            }
            EntryType::StartOfNode => {
                if let Some(node) = reader.enter_node() {
                    let ty = node.ty.map_or_else(|| "-".to_owned(), |ty| format!("{ty:?}"));
                    listing.line(depth, format_args!("{label}{{ id={} type={ty}", node.id));
                    listing.stats.nodes += 1;
                    open.push(Container::Node);
                }
            }
            EntryType::StartOfArray => {
                if let Some(length) = reader.enter_array() {
                    listing.line(depth, format_args!("{label}[ length={length}"));
                    listing.stats.arrays += 1;
                    open.push(Container::Array);
                }
            }
            EntryType::EndOfNode | EntryType::EndOfArray => {
                let (expected, closing) = if entry == EntryType::EndOfNode {
                    (Container::Node, "}")
                } else {
                    (Container::Array, "]")
                };
                if open.last() == Some(&expected) {
                    open.pop();
                    if expected == Container::Node {
                        reader.exit_node();
                    } else {
                        reader.exit_array();
                    }
                    listing.line(depth - 1, format_args!("{closing}"));
                } else {
                    reader.consume_current_entry();
                    listing.stats.invalid += 1;
                    listing.line(depth, format_args!("<stray {closing}>"));
                }
            }
            EntryType::PrimitiveArray => {
                reader.skip_entry();
                listing.stats.primitive_arrays += 1;
                listing.line(depth, format_args!("{label}<primitive array>"));
            }
            EntryType::InternalReference => {
                let id = reader
                    .read_internal_reference()
                    .map_or_else(unreadable, |id| id.to_string());
                listing.stats.references += 1;
                listing.line(depth, format_args!("{label}$iref {id}"));
            }
            EntryType::ExternalReferenceByIndex => {
                let index = reader
                    .read_external_reference_by_index()
                    .map_or_else(unreadable, |index| index.to_string());
                listing.stats.references += 1;
                listing.line(depth, format_args!("{label}$eref {index}"));
            }
            EntryType::ExternalReferenceByGuid => {
                let guid = reader
                    .read_external_reference_by_guid()
                    .map_or_else(unreadable, |guid| guid.to_string());
                listing.stats.references += 1;
                listing.line(depth, format_args!("{label}$guidref {guid}"));
            }
            EntryType::ExternalReferenceByString => {
                let id = reader
                    .read_external_reference_by_string()
                    .map_or_else(unreadable, |id| format!("{id:?}"));
                listing.stats.references += 1;
                listing.line(depth, format_args!("{label}$strref {id}"));
            }
            EntryType::Integer
            | EntryType::FloatingPoint
            | EntryType::String
            | EntryType::Guid
            | EntryType::Boolean
            | EntryType::Null => {
                let value = reader
                    .read_primitive()
                    .map_or_else(unreadable, |value| value.to_string());
                listing.stats.primitives += 1;
                listing.line(depth, format_args!("{label}{value}"));
            }
            EntryType::Invalid => {
                reader.skip_entry();
                listing.stats.invalid += 1;
                listing.line(depth, format_args!("<invalid entry>"));
            }
        }
    }
    listing
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::binary::{BinaryDataReader, BinaryDataWriter};
    use crate::context::{NameBinder, SerializationContext, TypeName};
    use crate::json::JsonDataReader;
    use crate::writer::DataWriter;

    #[test]
    fn lists_a_binary_stream() {
        let mut w = BinaryDataWriter::new(Vec::new(), SerializationContext::new(NameBinder));
        w.begin_reference_node(Some("root"), Some(&TypeName::from("Foo")), 0).unwrap();
        w.write_i32(Some("x"), 42).unwrap();
        w.begin_array_node(1).unwrap();
        w.write_internal_reference(None, 0).unwrap();
        w.end_array_node().unwrap();
        w.write_primitive_array(&[1u8, 2]).unwrap();
        w.end_node(Some("root")).unwrap();
        let bytes = w.into_inner().unwrap();

        let mut r = BinaryDataReader::from_slice(&bytes, SerializationContext::new(NameBinder));
        let listing = dump_entries(&mut r);
        assert_eq!(
            listing.text,
            "root: { id=0 type=TypeName(\"Foo\")\n  x: 42i32\n  [ length=1\n    $iref 0\n  ]\n  \
             <primitive array>\n}\n"
        );
        assert_eq!(
            listing.stats,
            EntryStats {
                nodes: 1,
                arrays: 1,
                primitive_arrays: 1,
                primitives: 1,
                references: 1,
                invalid: 0
            }
        );
    }

    #[test]
    fn stray_end_markers_are_counted() {
        let mut r =
            JsonDataReader::from_text("}],\"a\":true", SerializationContext::new(NameBinder));
        let listing = dump_entries(&mut r);
        assert_eq!(listing.text, "<stray }>\n<stray ]>\na: true\n");
        assert_eq!(listing.stats.invalid, 2);
    }

    #[test]
    fn unterminated_containers_are_reported() {
        let mut r =
            JsonDataReader::from_text("\"n\":{\"v\":1.5", SerializationContext::new(NameBinder));
        let listing = dump_entries(&mut r);
        assert_eq!(
            listing.text,
            "n: { id=-1 type=-\n  v: 1.5f64\n  <end of stream with 1 open container(s)>\n"
        );
    }
}
