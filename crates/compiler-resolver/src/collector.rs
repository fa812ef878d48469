//! Scope & reference collection (C5, spec §4.3).
//!
//! A single recursive descent over the arena builds every `Scope` and
//! `Binding`, resolves every identifier reference against the scope
//! chain in effect at that point, tags each reference with its enclosing
//! basic block, and once the walk finishes derives the three per-binding
//! predicates from the finished reference lists.
//!
//! Basic-block boundaries follow `NodeKind::introduces_basic_block`
//! (§4.3): a function/arrow body, an `if`'s branches, a loop body, each
//! `switch` case, the right operand of `&&`/`||`/`??`, the arguments of
//! an optional-chain call, and the arms of a ternary each start a fresh
//! basic block whose id is the boundary node itself.

use compiler_core::node::NodeKind;
use compiler_core::{Arena, BindingId, NodeId, ScopeId};
use compiler_error::{Error, ErrorKind, Result};

use crate::binder::{Binding, BindingKind, Reference, ReferenceKind, Scope, ScopeKind, ScopeStack};

/// The result of one collection pass: every scope and binding reachable
/// from the root that was collected.
#[derive(Debug, Default)]
pub struct ScopeCollection {
    pub scopes: Vec<Scope>,
    pub bindings: Vec<Binding>,
}

impl ScopeCollection {
    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.id == id)
    }

    pub fn bindings_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Binding> {
        self.bindings.iter().filter(move |b| b.name == name)
    }
}

/// Collects scopes, bindings and references for the subtree rooted at
/// `root` (typically a `SCRIPT`, or the synthetic `ROOT` wrapping several
/// scripts). Idempotent for an unmodified tree (spec §4.3): two calls
/// produce equal binding sets by name/scope and equal reference lists by
/// NodeId (P4).
pub fn collect(arena: &Arena, root: NodeId) -> Result<ScopeCollection> {
    let mut scopes = Vec::new();
    let mut bindings = Vec::new();
    {
        let stack = ScopeStack::new(&mut scopes);
        let mut collector = Collector {
            arena,
            bindings: &mut bindings,
            stack,
            current_bb: root,
            aliasing: false,
        };
        collector.visit(root)?;
    }
    let mut collection = ScopeCollection { scopes, bindings };
    compute_predicates(arena, &mut collection)?;
    Ok(collection)
}

/// Collects every `SCRIPT` under a synthetic `ROOT` independently and in
/// parallel, one compilation unit per rayon task, merging into a shared
/// result afterward. Falls back to a single collection if `root` is not
/// a `ROOT` wrapping multiple scripts.
pub fn collect_all_scripts(arena: &Arena, root: NodeId) -> Result<Vec<ScopeCollection>> {
    use rayon::prelude::*;

    let node = arena.get(root)?;
    if node.kind != NodeKind::Root {
        return Ok(vec![collect(arena, root)?]);
    }
    let collections: Vec<ScopeCollection> =
        node.children.clone().par_iter().map(|&script| collect(arena, script)).collect::<Result<_>>()?;
    tracing::debug!(scripts = collections.len(), "scope collection complete");
    Ok(collections)
}

struct Collector<'a> {
    arena: &'a Arena,
    bindings: &'a mut Vec<Binding>,
    stack: ScopeStack<'a>,
    current_bb: NodeId,
    aliasing: bool,
}

impl Collector<'_> {
    fn with_bb<R>(&mut self, bb: NodeId, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let prev = self.current_bb;
        self.current_bb = bb;
        let result = f(self);
        self.current_bb = prev;
        result
    }

    fn visit_in_aliasing(&mut self, id: NodeId, aliasing: bool) -> Result<()> {
        let prev = self.aliasing;
        self.aliasing = aliasing;
        let result = self.visit(id);
        self.aliasing = prev;
        result
    }

    fn declare(&mut self, name: &str, kind: BindingKind, node: NodeId) -> Result<BindingId> {
        let scope = if kind.is_hoisted() {
            self.stack.hoist_target()
        } else {
            self.stack.current()
        }
        .ok_or_else(|| {
            Error::new(ErrorKind::ScopeStackUnderflow, "no scope to declare into")
                .with_operation("collector::declare")
        })?;
        let id = BindingId::next();
        self.stack.declare_into(scope, name, id);
        self.bindings.push(Binding {
            id,
            name: name.to_string(),
            kind,
            declaring_node: node,
            scope,
            references: Vec::new(),
            is_assigned_once_in_lifetime: false,
            is_well_defined: false,
            is_escaped: false,
        });
        Ok(id)
    }

    fn push_ref(
        &mut self,
        binding: Option<BindingId>,
        node: NodeId,
        kind: ReferenceKind,
        aliasing: bool,
    ) {
        let Some(id) = binding else { return };
        let Some(b) = self.bindings.iter_mut().find(|b| b.id == id) else {
            return;
        };
        b.references.push(Reference {
            node,
            binding,
            basic_block: self.current_bb,
            kind,
            module_scope: self.stack.is_module_scope(),
            is_aliasing: aliasing,
        });
    }

    fn record_declaration(&mut self, node: NodeId, binding: BindingId) {
        self.push_ref(Some(binding), node, ReferenceKind::Declaration, false);
    }

    /// Declares a name-bearing binder node (`Parameter`, `CatchParameter`,
    /// `ImportBinding`, or a declaration whose remaining children are
    /// expressions - `VarDecl`/`LetDecl`/`ConstDecl`) and visits any
    /// remaining children (initializer / default value) as plain reads.
    fn visit_simple_binder(&mut self, id: NodeId, kind: BindingKind) -> Result<()> {
        let node = self.arena.get(id)?;
        let name = node.payload.as_str().map(str::to_owned);
        let children = node.children.clone();
        if let Some(name) = name {
            let binding_id = self.declare(&name, kind, id)?;
            self.record_declaration(id, binding_id);
        }
        for child in children {
            self.visit_in_aliasing(child, false)?;
        }
        Ok(())
    }

    fn visit_function(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        let node = self.arena.get(id)?;
        let name = node.payload.as_str().map(str::to_owned);
        let children = node.children.clone();

        if kind == NodeKind::FunctionDecl {
            if let Some(name) = &name {
                let binding_id = self.declare(name, BindingKind::FunctionDecl, id)?;
                self.record_declaration(id, binding_id);
            }
        }

        self.stack.push(ScopeKind::Function, id);
        if let Some((&body, params)) = children.split_last() {
            for &p in params {
                self.visit(p)?;
            }
            self.with_bb(body, |this| this.visit(body))?;
        }
        self.stack.pop()?;
        Ok(())
    }

    /// Writes to a Name resolve and record a `Write`/`ReadWrite`
    /// reference; writes into a pattern (`Destructuring`/array/object
    /// literal used as an assignment target) recurse into every leaf
    /// Name; anything else (a `GetProp`/`GetElem` member target) falls
    /// back to a normal read visit of the base expression.
    fn visit_assign_target(&mut self, id: NodeId, kind: ReferenceKind) -> Result<()> {
        let node = self.arena.get(id)?;
        match node.kind {
            NodeKind::Name => {
                let name = node.payload.as_str().unwrap_or_default().to_owned();
                let binding = self.stack.resolve(&name);
                self.push_ref(binding, id, kind, false);
                Ok(())
            }
            NodeKind::Destructuring
            | NodeKind::ArrayLit
            | NodeKind::ObjectLit
            | NodeKind::ObjectProperty => {
                let children = node.children.clone();
                for child in children {
                    self.visit_assign_target(child, kind)?;
                }
                Ok(())
            }
            _ => self.visit(id),
        }
    }

    fn visit(&mut self, id: NodeId) -> Result<()> {
        let node = self.arena.get(id)?;
        let kind = node.kind;
        let children = node.children.clone();

        match kind {
            NodeKind::Root => {
                for child in children {
                    self.visit(child)?;
                }
            }
            NodeKind::Script | NodeKind::StaticBlock => {
                let scope_kind = if kind == NodeKind::Script {
                    ScopeKind::Global
                } else {
                    ScopeKind::Block
                };
                self.stack.push(scope_kind, id);
                self.with_bb(id, |this| {
                    for child in children {
                        this.visit(child)?;
                    }
                    Ok(())
                })?;
                self.stack.pop()?;
            }
            NodeKind::FunctionDecl | NodeKind::FunctionExpr | NodeKind::ArrowFunction => {
                self.visit_function(id, kind)?;
            }
            NodeKind::VarDecl => self.visit_simple_binder(id, BindingKind::Var)?,
            NodeKind::LetDecl => self.visit_simple_binder(id, BindingKind::Let)?,
            NodeKind::ConstDecl => self.visit_simple_binder(id, BindingKind::Const)?,
            NodeKind::Parameter => self.visit_simple_binder(id, BindingKind::Parameter)?,
            NodeKind::CatchParameter => self.visit_simple_binder(id, BindingKind::CatchParameter)?,
            NodeKind::ImportBinding => self.visit_simple_binder(id, BindingKind::ImportBinding)?,
            NodeKind::ClassDecl => {
                let name = node.payload.as_str().map(str::to_owned);
                if let Some(name) = name {
                    let binding_id = self.declare(&name, BindingKind::ClassDecl, id)?;
                    self.record_declaration(id, binding_id);
                }
                for child in children {
                    self.visit(child)?;
                }
            }
            NodeKind::Block => {
                self.stack.push(ScopeKind::Block, id);
                for child in children {
                    self.visit(child)?;
                }
                self.stack.pop()?;
            }
            NodeKind::Catch => {
                self.stack.push(ScopeKind::Catch, id);
                for child in children {
                    self.visit(child)?;
                }
                self.stack.pop()?;
            }
            NodeKind::If | NodeKind::Conditional => {
                if let Some((&cond, branches)) = children.split_first() {
                    self.visit(cond)?;
                    for &branch in branches {
                        self.with_bb(branch, |this| this.visit(branch))?;
                    }
                }
            }
            NodeKind::For | NodeKind::ForIn | NodeKind::ForOf | NodeKind::While | NodeKind::DoWhile => {
                self.stack.push(ScopeKind::Block, id);
                if let Some((&body, rest)) = children.split_last() {
                    for &c in rest {
                        self.visit(c)?;
                    }
                    self.with_bb(body, |this| this.visit(body))?;
                }
                self.stack.pop()?;
            }
            NodeKind::SwitchCase => {
                self.with_bb(id, |this| {
                    for child in children {
                        this.visit(child)?;
                    }
                    Ok(())
                })?;
            }
            NodeKind::LogicalAnd | NodeKind::LogicalOr | NodeKind::NullishCoalesce => {
                if let Some((&first, rest)) = children.split_first() {
                    self.visit(first)?;
                    for &r in rest {
                        self.with_bb(r, |this| this.visit(r))?;
                    }
                }
            }
            NodeKind::OptionalChainCall => {
                if let Some((&callee, args)) = children.split_first() {
                    self.visit(callee)?;
                    for &a in args {
                        self.with_bb(a, |this| this.visit_in_aliasing(a, true))?;
                    }
                }
            }
            NodeKind::Name => {
                let name = node.payload.as_str().unwrap_or_default().to_owned();
                let binding = self.stack.resolve(&name);
                let aliasing = self.aliasing;
                self.push_ref(binding, id, ReferenceKind::Read, aliasing);
            }
            NodeKind::Assign => {
                if children.len() == 2 {
                    let (lhs, rhs) = (children[0], children[1]);
                    self.visit_in_aliasing(rhs, false)?;
                    self.visit_assign_target(lhs, ReferenceKind::Write)?;
                } else {
                    for child in children {
                        self.visit(child)?;
                    }
                }
            }
            NodeKind::AssignOp => {
                if children.len() == 2 {
                    let (lhs, rhs) = (children[0], children[1]);
                    self.visit_in_aliasing(rhs, false)?;
                    self.visit_assign_target(lhs, ReferenceKind::ReadWrite)?;
                } else {
                    for child in children {
                        self.visit(child)?;
                    }
                }
            }
            NodeKind::Call | NodeKind::New | NodeKind::TaggedTemplate => {
                if let Some((&callee, args)) = children.split_first() {
                    self.visit(callee)?;
                    for &a in args {
                        self.visit_in_aliasing(a, true)?;
                    }
                }
            }
            NodeKind::Return
            | NodeKind::Throw
            | NodeKind::Yield
            | NodeKind::SpreadExpr
            | NodeKind::ArrayLit
            | NodeKind::ObjectLit
            | NodeKind::ObjectProperty
            | NodeKind::Destructuring => {
                for child in children {
                    self.visit_in_aliasing(child, true)?;
                }
            }
            _ => {
                for child in children {
                    self.visit(child)?;
                }
            }
        }
        Ok(())
    }
}

fn compute_predicates(arena: &Arena, collection: &mut ScopeCollection) -> Result<()> {
    let owners: std::collections::HashMap<ScopeId, NodeId> =
        collection.scopes.iter().map(|s| (s.id, s.owner)).collect();

    for binding in &mut collection.bindings {
        binding.is_escaped = binding.references.iter().any(|r| r.is_aliasing);

        let mut write_nodes: Vec<NodeId> = binding.writes().map(|r| r.node).collect();
        write_nodes.sort();
        write_nodes.dedup();

        binding.is_assigned_once_in_lifetime = match (write_nodes.as_slice(), owners.get(&binding.scope)) {
            ([only], Some(&owner)) => !is_in_repeatable_context(arena, *only, owner)?,
            _ => false,
        };

        binding.is_well_defined = match write_nodes.first() {
            None => true,
            Some(&first_write) => !binding
                .references
                .iter()
                .any(|r| r.kind.is_read() && r.node < first_write),
        };
    }
    Ok(())
}

/// Walks from `write_node` up to (but not including) `scope_owner`,
/// looking for a loop or a nested function/arrow - either means the
/// write can execute more than once across the binding's lifetime.
fn is_in_repeatable_context(arena: &Arena, write_node: NodeId, scope_owner: NodeId) -> Result<bool> {
    let mut current = arena.get(write_node)?.parent;
    while let Some(id) = current {
        if id == scope_owner {
            return Ok(false);
        }
        let node = arena.get(id)?;
        if matches!(
            node.kind,
            NodeKind::For
                | NodeKind::ForIn
                | NodeKind::ForOf
                | NodeKind::While
                | NodeKind::DoWhile
                | NodeKind::FunctionDecl
                | NodeKind::FunctionExpr
                | NodeKind::ArrowFunction
        ) {
            return Ok(true);
        }
        current = node.parent;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiler_core::node::{Node, Payload};
    use pretty_assertions::assert_eq;

    fn name(arena: &mut Arena, n: &str) -> NodeId {
        arena
            .alloc(Node::new(NodeKind::Name).with_payload(Payload::Str(n.to_string())))
            .unwrap()
    }

    fn var(arena: &mut Arena, n: &str, init: Option<NodeId>) -> NodeId {
        let children = init.into_iter().collect();
        arena
            .alloc(Node::new(NodeKind::VarDecl)
                .with_payload(Payload::Str(n.to_string()))
                .with_children(children))
            .unwrap()
    }

    fn script(arena: &mut Arena, stmts: Vec<NodeId>) -> NodeId {
        let s = arena.alloc(Node::new(NodeKind::Script).with_children(stmts)).unwrap();
        arena.set_root(s);
        s
    }

    #[test]
    fn declares_a_var_and_resolves_a_later_read() {
        let mut arena = Arena::new();
        let a_decl = var(&mut arena, "a", None);
        let a_read = name(&mut arena, "a");
        let stmt = arena
            .alloc(Node::new(NodeKind::ExprStatement).with_children(vec![a_read]))
            .unwrap();
        let root = script(&mut arena, vec![a_decl, stmt]);

        let collection = collect(&arena, root).unwrap();
        assert_eq!(collection.bindings.len(), 1);
        let binding = &collection.bindings[0];
        assert_eq!(binding.name, "a");
        assert_eq!(binding.kind, BindingKind::Var);
        // one Declaration reference plus the later Read.
        assert_eq!(binding.references.len(), 2);
        assert!(binding.references.iter().any(|r| r.node == a_read && r.kind == ReferenceKind::Read));
    }

    #[test]
    fn an_unresolved_name_is_a_free_reference() {
        let mut arena = Arena::new();
        let read = name(&mut arena, "global_thing");
        let root = script(&mut arena, vec![read]);
        let collection = collect(&arena, root).unwrap();
        assert!(collection.bindings.is_empty());
    }

    #[test]
    fn collection_is_idempotent() {
        let mut arena = Arena::new();
        let a_decl = var(&mut arena, "a", None);
        let a_read = name(&mut arena, "a");
        let root = script(&mut arena, vec![a_decl, a_read]);

        let first = collect(&arena, root).unwrap();
        let second = collect(&arena, root).unwrap();
        assert_eq!(first.bindings.len(), second.bindings.len());
        for (a, b) in first.bindings.iter().zip(second.bindings.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.kind, b.kind);
            let mut refs_a: Vec<NodeId> = a.references.iter().map(|r| r.node).collect();
            let mut refs_b: Vec<NodeId> = b.references.iter().map(|r| r.node).collect();
            refs_a.sort();
            refs_b.sort();
            assert_eq!(refs_a, refs_b);
        }
    }

    #[test]
    fn if_branches_get_distinct_basic_blocks() {
        let mut arena = Arena::new();
        let cond = name(&mut arena, "cond");
        let then_read = name(&mut arena, "cond");
        let else_read = name(&mut arena, "cond");
        let if_node = arena
            .alloc(Node::new(NodeKind::If).with_children(vec![cond, then_read, else_read]))
            .unwrap();
        let decl = var(&mut arena, "cond", None);
        let root = script(&mut arena, vec![decl, if_node]);
        let collection = collect(&arena, root).unwrap();
        let binding = &collection.bindings[0];
        let bb_then = binding.references.iter().find(|r| r.node == then_read).unwrap().basic_block;
        let bb_else = binding.references.iter().find(|r| r.node == else_read).unwrap().basic_block;
        assert_ne!(bb_then, bb_else);
        assert_eq!(bb_then, then_read);
        assert_eq!(bb_else, else_read);
    }

    #[test]
    fn a_single_write_outside_any_loop_or_function_is_assigned_once() {
        let mut arena = Arena::new();
        let decl = var(&mut arena, "a", None);
        let root = script(&mut arena, vec![decl]);
        let collection = collect(&arena, root).unwrap();
        assert!(collection.bindings[0].is_assigned_once_in_lifetime);
        assert!(collection.bindings[0].is_well_defined);
    }

    #[test]
    fn a_write_inside_a_loop_is_not_assigned_once() {
        let mut arena = Arena::new();
        let decl = var(&mut arena, "a", None);
        let write_target = name(&mut arena, "a");
        let one = arena.alloc(Node::new(NodeKind::NumberLit)).unwrap();
        let assign = arena
            .alloc(Node::new(NodeKind::Assign).with_children(vec![write_target, one]))
            .unwrap();
        let body = arena.alloc(Node::new(NodeKind::Block).with_children(vec![assign])).unwrap();
        let cond = name(&mut arena, "a");
        let while_node = arena
            .alloc(Node::new(NodeKind::While).with_children(vec![cond, body]))
            .unwrap();
        let root = script(&mut arena, vec![decl, while_node]);
        let collection = collect(&arena, root).unwrap();
        let binding = collection.bindings.iter().find(|b| b.name == "a").unwrap();
        assert!(!binding.is_assigned_once_in_lifetime);
    }

    #[test]
    fn passing_a_binding_as_a_call_argument_marks_it_escaped() {
        let mut arena = Arena::new();
        let decl = var(&mut arena, "a", None);
        let arg = name(&mut arena, "a");
        let callee = name(&mut arena, "f");
        let call = arena
            .alloc(Node::new(NodeKind::Call).with_children(vec![callee, arg]))
            .unwrap();
        let root = script(&mut arena, vec![decl, call]);
        let collection = collect(&arena, root).unwrap();
        let binding = collection.bindings.iter().find(|b| b.name == "a").unwrap();
        assert!(binding.is_escaped);
    }

    #[test]
    fn collect_all_scripts_collects_each_script_under_root_independently() {
        let mut arena = Arena::new();
        let decl_a = var(&mut arena, "a", None);
        let script_a = arena.alloc(Node::new(NodeKind::Script).with_children(vec![decl_a])).unwrap();
        let decl_b = var(&mut arena, "b", None);
        let script_b = arena.alloc(Node::new(NodeKind::Script).with_children(vec![decl_b])).unwrap();
        let root = arena
            .alloc(Node::new(NodeKind::Root).with_children(vec![script_a, script_b]))
            .unwrap();
        arena.set_root(root);

        let collections = collect_all_scripts(&arena, root).unwrap();
        assert_eq!(collections.len(), 2);
        let names: Vec<&str> = collections
            .iter()
            .flat_map(|c| c.bindings.iter().map(|b| b.name.as_str()))
            .collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
    }

    #[test]
    fn function_parameters_declare_in_the_function_scope_not_the_enclosing_one() {
        let mut arena = Arena::new();
        let param = arena
            .alloc(Node::new(NodeKind::Parameter).with_payload(Payload::Str("x".to_string())))
            .unwrap();
        let body_read = name(&mut arena, "x");
        let body = arena.alloc(Node::new(NodeKind::Block).with_children(vec![body_read])).unwrap();
        let func = arena
            .alloc(Node::new(NodeKind::FunctionDecl)
                .with_payload(Payload::Str("f".to_string()))
                .with_children(vec![param, body]))
            .unwrap();
        let root = script(&mut arena, vec![func]);
        let collection = collect(&arena, root).unwrap();
        let param_binding = collection.bindings.iter().find(|b| b.name == "x").unwrap();
        assert_eq!(param_binding.kind, BindingKind::Parameter);
        assert!(param_binding.references.iter().any(|r| r.node == body_read));
    }
}
