// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-session registries.
//!
//! Everything a codec remembers between entries lives in one session
//! struct. `prepare_new_serialization_session` replaces that struct
//! wholesale.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::entry::NodeStack;

/// Outcome of registering a type with a [`WriteTypeCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    /// Seen earlier in this session; write the id only.
    Seen(i32),
    /// First occurrence; write the id together with the type name.
    New(i32),
}

/// Writer-side type ids, dense and in first-seen order.
#[derive(Debug, Clone)]
pub struct WriteTypeCache<T> {
    ids: HashMap<T, i32>,
}

impl<T> Default for WriteTypeCache<T> {
    fn default() -> Self {
        Self { ids: HashMap::new() }
    }
}

impl<T: Clone + Eq + Hash> WriteTypeCache<T> {
    /// Returns the id of `ty`, allocating the next one on first sight.
    pub fn register(&mut self, ty: &T) -> TypeSlot {
        if let Some(id) = self.ids.get(ty) {
            return TypeSlot::Seen(*id);
        }
        let id = i32::try_from(self.ids.len()).unwrap_or(i32::MAX);
        self.ids.insert(ty.clone(), id);
        TypeSlot::New(id)
    }

    /// Number of distinct types written.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no type has been written yet.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Reader-side type ids.
///
/// An id whose name could not be bound stays registered as `None`, so a
/// later reference to it is not reported as missing.
#[derive(Debug, Clone)]
pub struct ReadTypeCache<T> {
    types: HashMap<i32, Option<T>>,
}

impl<T> Default for ReadTypeCache<T> {
    fn default() -> Self {
        Self { types: HashMap::new() }
    }
}

impl<T> ReadTypeCache<T> {
    /// Records the type bound to `id`.
    pub fn insert(&mut self, id: i32, ty: Option<T>) {
        self.types.insert(id, ty);
    }

    /// `None` if `id` was never registered.
    pub fn get(&self, id: i32) -> Option<&Option<T>> {
        self.types.get(&id)
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A reference node seen by a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceNode<T> {
    /// Reference id from the node header.
    pub id: i32,
    /// Node name.
    pub name: Option<String>,
    /// Bound node type.
    pub ty: Option<T>,
    /// Stack depth the node was opened at.
    pub depth: usize,
}

/// Reference nodes entered so far, keyed by id.
///
/// Object-graph code resolves `read_internal_reference` ids against this.
#[derive(Debug, Clone)]
pub struct ReferenceTable<T> {
    nodes: HashMap<i32, ReferenceNode<T>>,
}

impl<T> Default for ReferenceTable<T> {
    fn default() -> Self {
        Self { nodes: HashMap::new() }
    }
}

impl<T> ReferenceTable<T> {
    /// Records a node; returns `false` if the id was already present.
    pub fn register(&mut self, node: ReferenceNode<T>) -> bool {
        self.nodes.insert(node.id, node).is_none()
    }

    /// Node registered under `id`.
    pub fn get(&self, id: i32) -> Option<&ReferenceNode<T>> {
        self.nodes.get(&id)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no reference node has been entered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Reference ids opened by a writer in this session.
#[derive(Debug, Clone, Default)]
pub struct OpenedReferences {
    ids: HashSet<i32>,
}

impl OpenedReferences {
    /// Marks `id` as opened; `false` if it already was.
    pub fn open(&mut self, id: i32) -> bool {
        self.ids.insert(id)
    }

    /// Whether `id` has been opened.
    pub fn contains(&self, id: i32) -> bool {
        self.ids.contains(&id)
    }
}

/// Result of [`ReferenceIds::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Session-unique id for the key.
    pub id: i32,
    /// `true` the first time the key is registered.
    pub is_new: bool,
}

/// Assigns dense reference ids to object identities.
///
/// Object-graph layers use this to decide between writing a reference node
/// (first sight) and an internal reference (every later sight).
#[derive(Debug, Clone)]
pub struct ReferenceIds<K> {
    ids: HashMap<K, i32>,
}

impl<K> Default for ReferenceIds<K> {
    fn default() -> Self {
        Self { ids: HashMap::new() }
    }
}

impl<K: Eq + Hash> ReferenceIds<K> {
    /// Id for `key`, allocating the next one on first sight.
    pub fn register(&mut self, key: K) -> Registration {
        let next = i32::try_from(self.ids.len()).unwrap_or(i32::MAX);
        let mut is_new = false;
        let id = *self.ids.entry(key).or_insert_with(|| {
            is_new = true;
            next
        });
        Registration { id, is_new }
    }

    /// Id previously assigned to `key`.
    pub fn get(&self, key: &K) -> Option<i32> {
        self.ids.get(key).copied()
    }

    /// Forgets every assignment.
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Writer session state. `E` carries codec-specific layout state.
#[derive(Debug, Clone)]
pub struct WriterSession<T, E = ()> {
    pub(crate) types: WriteTypeCache<T>,
    pub(crate) references: OpenedReferences,
    pub(crate) nodes: NodeStack<T>,
    pub(crate) state: E,
}

impl<T, E: Default> Default for WriterSession<T, E> {
    fn default() -> Self {
        Self {
            types: WriteTypeCache::default(),
            references: OpenedReferences::default(),
            nodes: NodeStack::default(),
            state: E::default(),
        }
    }
}

impl<T, E> WriterSession<T, E> {
    /// Types written so far.
    pub fn types(&self) -> &WriteTypeCache<T> {
        &self.types
    }

    /// Reference ids opened so far.
    pub fn references(&self) -> &OpenedReferences {
        &self.references
    }

    /// Open nodes and arrays.
    pub fn nodes(&self) -> &NodeStack<T> {
        &self.nodes
    }
}

/// Reader session state. `P` is the codec's cached peeked entry.
#[derive(Debug, Clone)]
pub struct ReaderSession<T, P> {
    pub(crate) types: ReadTypeCache<T>,
    pub(crate) references: ReferenceTable<T>,
    pub(crate) nodes: NodeStack<T>,
    pub(crate) peeked: Option<P>,
}

impl<T, P> Default for ReaderSession<T, P> {
    fn default() -> Self {
        Self {
            types: ReadTypeCache::default(),
            references: ReferenceTable::default(),
            nodes: NodeStack::default(),
            peeked: None,
        }
    }
}

impl<T: Clone, P> ReaderSession<T, P> {
    /// Types registered so far.
    pub fn types(&self) -> &ReadTypeCache<T> {
        &self.types
    }

    /// Reference nodes entered so far.
    pub fn references(&self) -> &ReferenceTable<T> {
        &self.references
    }

    /// Open nodes and arrays.
    pub fn nodes(&self) -> &NodeStack<T> {
        &self.nodes
    }

    /// Opens a node and registers it when it carries a reference id.
    pub(crate) fn open_node(&mut self, name: Option<String>, id: i32, ty: Option<T>) {
        if id >= 0 {
            let depth = self.nodes.depth();
            self.references.register(ReferenceNode {
                id,
                name: name.clone(),
                ty: ty.clone(),
                depth,
            });
        }
        self.nodes.push_node(name, id, ty);
    }
}
