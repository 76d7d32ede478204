// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Writer failures.
//!
//! Readers never fail hard: malformed input is logged through the
//! [`DebugContext`](crate::DebugContext) and surfaces as a failed typed read.

use std::io;

use thiserror::Error;

/// Errors returned by [`DataWriter`](crate::DataWriter) operations.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The underlying stream rejected a write or flush.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// `end_node` was called with a name different from the open node's.
    #[error("node name mismatch: open node is {expected:?}, end_node called with {found:?}")]
    NodeNameMismatch {
        /// Name of the innermost open node.
        expected: Option<String>,
        /// Name passed to `end_node`.
        found: Option<String>,
    },
    /// A node or array was closed while nothing was open.
    #[error("no open node or array to close")]
    NoNodeToPop,
    /// `end_array_node` was called while a node is the innermost marker.
    #[error("end_array_node called while the innermost marker is a node")]
    NotInArray,
    /// `end_node` was called while an array is the innermost marker.
    #[error("end_node called while the innermost marker is an array")]
    NotInNode,
    /// An array length does not fit the wire representation.
    #[error("array of {0} elements is too long to encode")]
    ArrayTooLong(usize),
    /// A string length does not fit the wire representation.
    #[error("string of {0} code units is too long to encode")]
    StringTooLong(usize),
}
