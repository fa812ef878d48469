//! Declared-type annotation side table (C3, spec §4.2).
//!
//! Surface syntax for type annotations (JSDoc-equivalent) is a
//! collaborator concern; what this component owns is the *record* a
//! NodeId maps to once the collaborator has parsed one, plus the flags
//! a declaration annotation can carry (`@const`, `@nocollapse`,
//! `@deprecated`, ...).

use std::collections::HashMap;

use crate::ids::NodeId;

/// A parsed type annotation. `raw` retains the collaborator's original
/// text for diagnostics that want to quote it back to the user; `flags`
/// is the closed set of boolean declaration flags a JSDoc-equivalent
/// comment can carry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnnotationRecord {
    pub raw: Option<String>,
    pub flags: AnnotationFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotationFlags {
    /// `@const`: this binding's value is assigned exactly once. C5 uses
    /// this as one of the inputs to `is_assigned_once_in_lifetime`, but
    /// does not take it as proof on its own - an explicit `@const` on a
    /// binding that is in fact reassigned is an input diagnostic, not a
    /// trusted fact.
    pub is_const: bool,
    /// `@nocollapse`: C9 must not collapse this qualified name even if
    /// it is otherwise eligible.
    pub no_collapse: bool,
    /// `@deprecated`: informational only; no component conditions
    /// behavior on it besides diagnostics that choose to surface it.
    pub is_deprecated: bool,
    /// `@struct` / `@dict`: informational hints from the data model;
    /// carried here rather than invented a third table since they are
    /// always attached at the same site as the other annotation flags.
    pub is_struct: bool,
    pub is_dict: bool,
    /// `@constructor` / `@interface` / `@enum`: classify the qualified
    /// name a declaration assigns (C8, spec §4.7).
    pub is_constructor: bool,
    pub is_interface: bool,
    pub is_enum: bool,
    /// `@export`: an explicit export marker. C8's `has_exported_annotation`
    /// is this flag OR the coding-convention predicate (spec §9).
    pub is_exported: bool,
}

/// Passive NodeId -> AnnotationRecord side table.
#[derive(Debug, Default)]
pub struct AnnotationTable {
    records: HashMap<NodeId, AnnotationRecord>,
}

impl AnnotationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeId, record: AnnotationRecord) {
        self.records.insert(node, record);
    }

    pub fn get(&self, node: NodeId) -> Option<&AnnotationRecord> {
        self.records.get(&node)
    }

    pub fn flags(&self, node: NodeId) -> AnnotationFlags {
        self.records
            .get(&node)
            .map(|r| r.flags)
            .unwrap_or_default()
    }
}
