//! Scope, Binding and Reference data model (C5, spec §3/§4.3).
//!
//! `Scope` and `Binding` are owned, `Vec`-backed records indexed by
//! `ScopeId`/`BindingId` rather than arena-borrowed, so a whole
//! collection can be handed back from `collector::collect` without
//! borrowing the arena.

use std::collections::HashMap;

use compiler_core::{BindingId, NodeId, ScopeId};
use compiler_error::{Error, ErrorKind, Result};

/// Why a scope exists (spec §4.3: "global ROOT, each function/arrow body,
/// each block that declares a block-scoped name, each catch clause").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
    Catch,
}

/// One lexical scope. Owns a name -> binding map for names declared
/// directly in it; lookup walks `parent` for anything not found locally.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The Node that introduces this scope (SCRIPT, a function/arrow, a
    /// block, or a catch clause).
    pub owner: NodeId,
    names: HashMap<String, BindingId>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, owner: NodeId) -> Self {
        Self {
            id: ScopeId::next(),
            kind,
            parent,
            owner,
            names: HashMap::new(),
        }
    }

    pub fn declare(&mut self, name: impl Into<String>, binding: BindingId) {
        self.names.insert(name.into(), binding);
    }

    pub fn lookup_local(&self, name: &str) -> Option<BindingId> {
        self.names.get(name).copied()
    }

    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }
}

/// A stack of active scopes during collection: push on scope entry, pop
/// on exit, walk outward on lookup miss.
pub struct ScopeStack<'a> {
    scopes: &'a mut Vec<Scope>,
    active: Vec<ScopeId>,
}

impl<'a> ScopeStack<'a> {
    pub fn new(scopes: &'a mut Vec<Scope>) -> Self {
        Self {
            scopes,
            active: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: ScopeKind, owner: NodeId) -> ScopeId {
        let parent = self.active.last().copied();
        let scope = Scope::new(kind, parent, owner);
        let id = scope.id;
        self.scopes.push(scope);
        self.active.push(id);
        id
    }

    pub fn pop(&mut self) -> Result<()> {
        self.active.pop().ok_or_else(|| {
            Error::new(ErrorKind::ScopeStackUnderflow, "popped with no scope pushed")
                .with_operation("binder::ScopeStack::pop")
        })?;
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.active.len()
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.active.last().copied()
    }

    fn find(&self, id: ScopeId) -> &Scope {
        self.scopes
            .iter()
            .find(|s| s.id == id)
            .expect("ScopeId produced by this stack always indexes a live Scope")
    }

    fn find_mut(&mut self, id: ScopeId) -> &mut Scope {
        self.scopes
            .iter_mut()
            .find(|s| s.id == id)
            .expect("ScopeId produced by this stack always indexes a live Scope")
    }

    /// The scope a hoisted (`var`/function) declaration actually lands
    /// in: the nearest enclosing Function or Global scope, climbing past
    /// any Block/Catch scopes on the way.
    pub fn hoist_target(&self) -> Option<ScopeId> {
        let mut id = self.current()?;
        loop {
            if matches!(self.find(id).kind, ScopeKind::Function | ScopeKind::Global) {
                return Some(id);
            }
            match self.find(id).parent {
                Some(p) => id = p,
                None => return Some(id),
            }
        }
    }

    pub fn declare_into(&mut self, scope: ScopeId, name: &str, binding: BindingId) {
        self.find_mut(scope).declare(name, binding);
    }

    /// Resolves `name` starting at the current scope and walking outward.
    /// `None` means a free name (spec §4.3: "treated as global").
    pub fn resolve(&self, name: &str) -> Option<BindingId> {
        let mut id = self.current()?;
        loop {
            if let Some(b) = self.find(id).lookup_local(name) {
                return Some(b);
            }
            match self.find(id).parent {
                Some(p) => id = p,
                None => return None,
            }
        }
    }

    /// True if every scope currently on the stack is a Global scope,
    /// i.e. the reference never crossed into a function body.
    pub fn is_module_scope(&self) -> bool {
        self.active
            .iter()
            .all(|&id| matches!(self.find(id).kind, ScopeKind::Global))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    FunctionDecl,
    ClassDecl,
    Parameter,
    CatchParameter,
    ImportBinding,
}

impl BindingKind {
    /// `var`/function declarations hoist to the enclosing function or
    /// global scope; `let`/`const`/`class` stay block-scoped.
    pub fn is_hoisted(self) -> bool {
        matches!(self, BindingKind::Var | BindingKind::FunctionDecl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Declaration,
    Read,
    Write,
    ReadWrite,
}

impl ReferenceKind {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            ReferenceKind::Declaration | ReferenceKind::Write | ReferenceKind::ReadWrite
        )
    }

    pub fn is_read(self) -> bool {
        matches!(self, ReferenceKind::Read | ReferenceKind::ReadWrite)
    }
}

/// A Node plus the Binding it refers to, the basic block it sits inside,
/// its kind, and whether it is in module scope (spec §3 "Reference").
#[derive(Debug, Clone)]
pub struct Reference {
    pub node: NodeId,
    /// `None` means this identifier did not resolve to any declared
    /// Binding and is treated as a free name referencing the external
    /// environment (spec §4.3).
    pub binding: Option<BindingId>,
    pub basic_block: NodeId,
    pub kind: ReferenceKind,
    pub module_scope: bool,
    /// Set by the collector when this reference occurs in a position
    /// that lets the value escape to an unknown receiver (argument,
    /// return value, array/object literal element, …) — feeds
    /// `Binding::is_escaped`.
    pub is_aliasing: bool,
}

/// A lexical declaration (spec §3 "Binding"). Immutable once collection
/// finishes; a new collection supersedes it wholesale (spec §4.3
/// "idempotent ... two collections ... must produce byte-identical
/// results").
#[derive(Debug, Clone)]
pub struct Binding {
    pub id: BindingId,
    pub name: String,
    pub kind: BindingKind,
    pub declaring_node: NodeId,
    pub scope: ScopeId,
    pub references: Vec<Reference>,
    /// Derived predicates (spec §4.3), computed once collection of the
    /// whole tree is complete.
    pub is_assigned_once_in_lifetime: bool,
    pub is_well_defined: bool,
    pub is_escaped: bool,
}

impl Binding {
    pub fn writes(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.kind.is_write())
    }

    pub fn reads(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.kind.is_read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<Scope> {
        Vec::new()
    }

    #[test]
    fn nested_lookup_walks_outward_to_the_declaring_scope() {
        let mut scopes = scopes();
        let mut stack = ScopeStack::new(&mut scopes);
        let global = stack.push(ScopeKind::Global, NodeId(0));
        stack.declare_into(global, "x", BindingId(1));
        let func = stack.push(ScopeKind::Function, NodeId(1));
        let _ = func;
        assert_eq!(stack.resolve("x"), Some(BindingId(1)));
        assert_eq!(stack.resolve("missing"), None);
    }

    #[test]
    fn hoist_target_climbs_past_block_scopes_to_the_function() {
        let mut scopes = scopes();
        let mut stack = ScopeStack::new(&mut scopes);
        stack.push(ScopeKind::Global, NodeId(0));
        let func = stack.push(ScopeKind::Function, NodeId(1));
        stack.push(ScopeKind::Block, NodeId(2));
        assert_eq!(stack.hoist_target(), Some(func));
    }

    #[test]
    fn pop_on_an_empty_stack_is_a_scope_stack_underflow() {
        let mut scopes = scopes();
        let mut stack = ScopeStack::new(&mut scopes);
        let err = stack.pop().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScopeStackUnderflow);
    }

    #[test]
    fn is_module_scope_is_false_once_a_function_scope_is_active() {
        let mut scopes = scopes();
        let mut stack = ScopeStack::new(&mut scopes);
        stack.push(ScopeKind::Global, NodeId(0));
        assert!(stack.is_module_scope());
        stack.push(ScopeKind::Function, NodeId(1));
        assert!(!stack.is_module_scope());
    }
}
