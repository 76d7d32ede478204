// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON encoding.
//!
//! Entries become object members (named) or array elements (unnamed).
//! Node headers and arrays use reserved member names:
//!
//! ```text
//! "name":{"$id":3,"$type":"0|Game.Player", ...}
//! "$rlength":2,"$rcontent":[ ... ]
//! "$plength":3,"$pcontent":[1,2,3]
//! ```
//!
//! References are unquoted sigil tokens: `$iref:5`, `$eref:2`,
//! `$guidref:<guid>` and `$strref:"<escaped>"`.

mod reader;
mod text_reader;
mod writer;

pub use reader::JsonDataReader;
pub use text_reader::{JsonTextReader, RawEntry, guess_primitive_type};
pub use writer::{JsonDataWriter, JsonWriterOptions, LineState};

/// Member carrying a reference node's id.
pub const ID_SIG: &str = "$id";
/// Member carrying a node's type.
pub const TYPE_SIG: &str = "$type";
/// Member announcing a regular array's length.
pub const REGULAR_ARRAY_LENGTH_SIG: &str = "$rlength";
/// Member holding a regular array's elements.
pub const REGULAR_ARRAY_CONTENT_SIG: &str = "$rcontent";
/// Member announcing a primitive array's length.
pub const PRIMITIVE_ARRAY_LENGTH_SIG: &str = "$plength";
/// Member holding a primitive array's elements.
pub const PRIMITIVE_ARRAY_CONTENT_SIG: &str = "$pcontent";
/// Prefix of internal references.
pub const INTERNAL_REF_SIG: &str = "$iref";
/// Prefix of external references by index.
pub const EXTERNAL_INDEX_REF_SIG: &str = "$eref";
/// Prefix of external references by GUID.
pub const EXTERNAL_GUID_REF_SIG: &str = "$guidref";
/// Prefix of external references by string.
pub const EXTERNAL_STRING_REF_SIG: &str = "$strref";

/// Strips one pair of surrounding double quotes, if present.
pub(crate) fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Text after `"<sig>:"`, if `text` carries that sigil.
pub(crate) fn strip_sigil<'a>(text: &'a str, sig: &str) -> Option<&'a str> {
    text.strip_prefix(sig)?.strip_prefix(':')
}
