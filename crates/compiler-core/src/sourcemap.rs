//! Source map & position table (C2, spec §4.2).
//!
//! Contracts here are passive: given a NodeId, return the record. The
//! table itself is a plain side table keyed by `NodeId`, in the same
//! id-indexed-side-table idiom the rest of the core uses for C3/C4.

use std::collections::HashMap;

use crate::ids::NodeId;

/// A single source-file identity. Files are referred to by index rather
/// than by path inside `SourceRef` so that Nodes stay `Copy`-cheap;
/// `SourceMap::file_name` resolves the index back to a path for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Maps a Node to its (file, offset, length) in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRef {
    pub file: FileId,
    pub offset: u32,
    pub length: u32,
}

/// Passive NodeId -> SourceRef side table populated by the parser
/// collaborator. Passes that synthesize Nodes SHOULD copy the
/// `source_ref` of the Node they are rewriting (spec §4.2) so diagnostics
/// and source maps remain usable downstream; `SourceMap::copy` is the
/// helper for that.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<String>,
    refs: HashMap<NodeId, SourceRef>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(name.into());
        id
    }

    pub fn file_name(&self, file: FileId) -> Option<&str> {
        self.files.get(file.0 as usize).map(|s| s.as_str())
    }

    pub fn set(&mut self, node: NodeId, source_ref: SourceRef) {
        self.refs.insert(node, source_ref);
    }

    pub fn get(&self, node: NodeId) -> Option<SourceRef> {
        self.refs.get(&node).copied()
    }

    /// Copy the source_ref of `from` onto `to`, if `from` has one. Used by
    /// rewriting passes so a synthesized replacement node still maps back
    /// to a sensible source location.
    pub fn copy(&mut self, from: NodeId, to: NodeId) {
        if let Some(r) = self.get(from) {
            self.set(to, r);
        }
    }
}
