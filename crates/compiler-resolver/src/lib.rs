//! Scope & reference analysis (C5, spec §4.3): scopes, bindings,
//! per-binding reference lists with basic-block tags, and the derived
//! `is_assigned_once_in_lifetime`/`is_well_defined`/`is_escaped`
//! predicates.

pub mod binder;
pub mod collector;

pub use binder::{Binding, BindingKind, Reference, ReferenceKind, Scope, ScopeKind, ScopeStack};
pub use collector::{collect, ScopeCollection};
