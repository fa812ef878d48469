//! Devirtualizer (C10, spec §4.9).
//!
//! Rewrites `T.prototype.m = function(args) { body }` into a free
//! function `m$T(self, args) { body[this -> self] }` and every ordinary
//! call site `receiver.m(args)` into `m$T(receiver, args)`. Reuses the
//! same whole-program qualified-name scan as [`crate::namegraph`]:
//! prototype-method assignments are themselves pure property chains, so
//! the name graph already tracks them as ordinary qualified names whose
//! middle segment is `prototype`.

use std::collections::HashMap;

use compiler_core::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use compiler_core::node::{Node, NodeBits, NodeKind, Payload};
use compiler_core::pass_manager::Pass;
use compiler_core::visit::{Descent, Visitor, walk};
use compiler_core::{Arena, CompileCtxt, NodeId};
use compiler_error::{Error, ErrorKind, Result};

use crate::collapse::{enclosing_change_scope, enclosing_statement};
use crate::namegraph::{self, NameGraph};

/// C10 as a pass-manager stage. Devirtualization is not a fixed point in
/// its own right - a single sweep either rewrites a method name or it
/// doesn't - so this is meant to run as a one-time pass, typically after
/// C9 has settled.
pub struct DevirtualizePass;

impl Pass for DevirtualizePass {
    fn name(&self) -> &'static str {
        "devirtualize"
    }

    fn run(&mut self, cc: &mut CompileCtxt) -> Result<bool> {
        let Some(root) = cc.arena.root() else {
            return Ok(false);
        };
        let graph = namegraph::build(cc)?;
        devirtualize_all(cc, &graph, root)
    }
}

/// One candidate property name: every `T.prototype.m` declaration site
/// found anywhere in the program, keyed by the method's last segment.
struct PrototypeMethod {
    class_prefix: String,
    declarations: Vec<NodeId>,
}

pub fn devirtualize_all(cc: &mut CompileCtxt, graph: &NameGraph, root: NodeId) -> Result<bool> {
    let mut methods: HashMap<String, PrototypeMethod> = HashMap::new();
    for name in graph.names() {
        let Some((prefix, method)) = name.split_once(".prototype.") else {
            continue;
        };
        if method.contains('.') {
            continue;
        }
        let entity = graph.get(name).expect("name came from graph.names()");
        let entry = methods.entry(method.to_string()).or_insert_with(|| PrototypeMethod {
            class_prefix: prefix.to_string(),
            declarations: Vec::new(),
        });
        entry.declarations.extend(entity.declarations.iter().copied());
    }

    let mut method_names: Vec<String> = methods.keys().cloned().collect();
    method_names.sort();

    let mut changed = false;
    let mut rewritten = 0usize;
    for method in method_names {
        let candidate = &methods[&method];
        if try_devirtualize(cc, root, &method, candidate)? {
            changed = true;
            rewritten += 1;
        }
    }
    tracing::debug!(candidate_count = methods.len(), rewritten, "devirtualization sweep complete");
    Ok(changed)
}

fn try_devirtualize(cc: &mut CompileCtxt, root: NodeId, method: &str, candidate: &PrototypeMethod) -> Result<bool> {
    if candidate.declarations.is_empty() {
        return Ok(false);
    }
    if cc.options.exported_name.is_exported(method) {
        return Ok(false);
    }
    for &decl in &candidate.declarations {
        if namegraph::is_conditionally_defined(&cc.arena, decl)? {
            return Ok(false);
        }
    }
    if any_accessor_for(&cc.arena, root, method)? {
        return Ok(false);
    }

    let first_rhs = match rhs_of(&cc.arena, candidate.declarations[0])? {
        Some(rhs) if cc.arena.get(rhs)?.kind == NodeKind::FunctionExpr => rhs,
        _ => return Ok(false),
    };
    for &decl in &candidate.declarations[1..] {
        let Some(rhs) = rhs_of(&cc.arena, decl)? else {
            return Ok(false);
        };
        if cc.arena.get(rhs)?.kind != NodeKind::FunctionExpr {
            return Ok(false);
        }
        if !namegraph::structural_eq(&cc.arena, first_rhs, rhs)? {
            return Ok(false);
        }
    }
    if namegraph::subtree_contains(&cc.arena, first_rhs, NodeKind::SuperExpr)? {
        return Ok(false);
    }

    let decl_lhs: Vec<NodeId> = candidate
        .declarations
        .iter()
        .map(|&d| cc.arena.get(d).map(|n| n.children[0]))
        .collect::<Result<_>>()?;
    let sites = match find_call_sites(&cc.arena, root, method, &decl_lhs)? {
        Some(sites) if !sites.is_empty() => sites,
        _ => return Ok(false),
    };

    // Module ordering (§4.9): the definition's module must precede every
    // call site's module in module order (files are ROOT's children in
    // module order). Function declarations hoist within a module, not
    // across modules, so a call site in an earlier-ordered file would
    // become an undefined reference at runtime if rewritten.
    let def_script_index = script_index(&cc.arena, root, candidate.declarations[0])?;
    for &site in &sites {
        if script_index(&cc.arena, root, site)? < def_script_index {
            return Ok(false);
        }
    }

    let new_fn_name = format!("{method}${}", candidate.class_prefix.replace('.', "$"));
    let references_this = namegraph::subtree_contains(&cc.arena, first_rhs, NodeKind::ThisExpr)?;

    rewrite_definition(cc, candidate.declarations[0], &new_fn_name)?;
    for &extra in &candidate.declarations[1..] {
        delete_declaration_statement(cc, extra)?;
    }
    for call_site in sites {
        rewrite_call_site(cc, call_site, &new_fn_name)?;
    }

    if references_this {
        cc.diagnostics
            .report(Diagnostic::new(DiagnosticCode::UnsafeThis, Severity::Warning).with_arg(method));
    }
    Ok(true)
}

fn rhs_of(arena: &Arena, decl: NodeId) -> Result<Option<NodeId>> {
    Ok(arena.get(decl)?.children.get(1).copied())
}

/// Walks up from `id` to the nearest enclosing `SCRIPT`.
fn enclosing_script(arena: &Arena, id: NodeId) -> Result<NodeId> {
    let mut current = Some(id);
    while let Some(cur) = current {
        if arena.get(cur)?.kind == NodeKind::Script {
            return Ok(cur);
        }
        current = arena.get(cur)?.parent;
    }
    Err(
        Error::new(ErrorKind::ArenaInvariantViolation, format!("{id} has no enclosing script"))
            .with_operation("devirtualize::enclosing_script"),
    )
}

/// `id`'s module position: the index of its enclosing `SCRIPT` among
/// `root`'s children, which are laid out in module order (spec §3
/// invariant 4: "a SCRIPT node appears only as a direct child of ROOT").
fn script_index(arena: &Arena, root: NodeId, id: NodeId) -> Result<usize> {
    let script = enclosing_script(arena, id)?;
    arena.get(root)?.children.iter().position(|&c| c == script).ok_or_else(|| {
        Error::new(
            ErrorKind::ArenaInvariantViolation,
            format!("{script} is not a direct child of root {root}"),
        )
        .with_operation("devirtualize::script_index")
    })
}

/// Scans the whole tree for every read of the property name `method`
/// that is not one of the known declaration sites in `decl_lhs`. Returns
/// `None` if any such read is a hazard (a value read, a `.call`/`.apply`
/// wrapper, a `new`/tagged-template callee, a computed `obj['m']`
/// access, or a destructured property) - otherwise the ordinary call
/// sites (`receiver.m(args)`), which must be non-empty for C10 to apply.
fn find_call_sites(arena: &Arena, root: NodeId, method: &str, decl_lhs: &[NodeId]) -> Result<Option<Vec<NodeId>>> {
    struct Finder<'a> {
        method: &'a str,
        decl_lhs: &'a [NodeId],
        call_sites: Vec<NodeId>,
        hazard: bool,
    }
    impl Visitor for Finder<'_> {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            let node = arena.get(id)?;
            match node.kind {
                NodeKind::GetElem => {
                    if let Some(&index) = node.children.get(1) {
                        let idx_node = arena.get(index)?;
                        if idx_node.kind == NodeKind::StringLit && idx_node.payload.as_str() == Some(self.method) {
                            self.hazard = true;
                        }
                    }
                }
                NodeKind::ObjectProperty => {
                    if node.payload.as_str() == Some(self.method) {
                        // A destructuring target named `method`, e.g.
                        // `const {m} = obj`, is a hazard; an ordinary
                        // object-literal property of the same name is
                        // unrelated (it does not read the prototype
                        // method at all) and is not flagged here.
                        if let Some(parent_id) = node.parent {
                            if arena.get(parent_id)?.kind == NodeKind::Destructuring {
                                self.hazard = true;
                            }
                        }
                    }
                }
                NodeKind::GetProp if node.payload.as_str() == Some(self.method) => {
                    if self.decl_lhs.contains(&id) {
                        return Ok(Descent::Continue);
                    }
                    let is_ordinary_call = node
                        .parent
                        .map(|p| arena.get(p).map(|pn| pn.kind == NodeKind::Call && pn.children.first() == Some(&id)))
                        .transpose()?
                        .unwrap_or(false);
                    if is_ordinary_call {
                        self.call_sites.push(id);
                    } else {
                        self.hazard = true;
                    }
                }
                _ => {}
            }
            Ok(Descent::Continue)
        }
    }

    let mut finder = Finder {
        method,
        decl_lhs,
        call_sites: Vec::new(),
        hazard: false,
    };
    walk(arena, root, &mut finder)?;
    if finder.hazard {
        return Ok(None);
    }
    Ok(Some(finder.call_sites))
}

fn any_accessor_for(arena: &Arena, root: NodeId, method: &str) -> Result<bool> {
    struct Finder<'a> {
        method: &'a str,
        found: bool,
    }
    impl Visitor for Finder<'_> {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            let node = arena.get(id)?;
            if node.kind == NodeKind::ObjectProperty && node.bits.is_accessor && node.payload.as_str() == Some(self.method) {
                self.found = true;
                return Ok(Descent::SkipChildren);
            }
            Ok(Descent::Continue)
        }
    }
    let mut finder = Finder { method, found: false };
    walk(arena, root, &mut finder)?;
    Ok(finder.found)
}

/// Rewrites `T.prototype.m = function(params) { body };` in place into
/// `function m$T(self, params) { body };`, rewriting every `this` in the
/// original params/body to `Name(self)` along the way.
fn rewrite_definition(cc: &mut CompileCtxt, decl: NodeId, new_fn_name: &str) -> Result<()> {
    let stmt = enclosing_statement(&cc.arena, decl)?;
    let scope = enclosing_change_scope(&cc.arena, stmt)?;

    let rhs = cc.arena.get(decl)?.children[1];
    let this_targets = collect_this_in_method(&cc.arena, rhs)?;
    for this_id in this_targets {
        let replacement = cc
            .arena
            .alloc(Node::new(NodeKind::Name).with_payload(Payload::Str("self".to_string())))?;
        cc.arena.replace(this_id, replacement)?;
    }

    let bits = cc.arena.get(rhs)?.bits;
    let rhs_children = cc.arena.get(rhs)?.children.clone();
    for &child in &rhs_children {
        cc.arena.detach(child)?;
    }
    cc.arena.detach(rhs)?;

    let self_param = cc
        .arena
        .alloc(Node::new(NodeKind::Parameter).with_payload(Payload::Str("self".to_string())))?;
    let mut new_children = vec![self_param];
    new_children.extend(rhs_children);

    let mut new_fn = Node::new(NodeKind::FunctionDecl)
        .with_payload(Payload::Str(new_fn_name.to_string()))
        .with_children(new_children);
    new_fn.bits = NodeBits {
        is_async: bits.is_async,
        is_generator: bits.is_generator,
        ..NodeBits::default()
    };
    let new_id = cc.arena.alloc(new_fn)?;
    cc.arena.replace(stmt, new_id)?;
    cc.changes.report_change_to(scope);
    // The replacement introduced a brand new change scope (FunctionDecl
    // is itself one) that was not present in any prior snapshot.
    cc.changes.report_change_to(new_id);
    Ok(())
}

fn delete_declaration_statement(cc: &mut CompileCtxt, decl: NodeId) -> Result<()> {
    let stmt = enclosing_statement(&cc.arena, decl)?;
    let scope = enclosing_change_scope(&cc.arena, stmt)?;
    cc.arena.detach(stmt)?;
    cc.changes.report_change_to(scope);
    Ok(())
}

/// Rewrites `receiver.m(args)` into `m$T(receiver, args)` in place: the
/// `GetProp` callee is discarded, its receiver is spliced into the
/// `Call` node's argument list ahead of the original arguments, and the
/// callee becomes a plain `Name(new_fn_name)`.
fn rewrite_call_site(cc: &mut CompileCtxt, callee: NodeId, new_fn_name: &str) -> Result<()> {
    let call = cc.arena.get(callee)?.parent.expect("callee's parent is the Call node");
    let scope = enclosing_change_scope(&cc.arena, call)?;
    let receiver = cc.arena.get(callee)?.children[0];

    cc.arena.detach(callee)?;
    cc.arena.detach(receiver)?;
    cc.arena.add_child_to_front(call, receiver)?;
    let new_callee = cc
        .arena
        .alloc(Node::new(NodeKind::Name).with_payload(Payload::Str(new_fn_name.to_string())))?;
    cc.arena.add_child_to_front(call, new_callee)?;
    cc.changes.report_change_to(scope);
    Ok(())
}

/// Collects every `ThisExpr` under `func_node`'s params/body that is not
/// shadowed by a nested non-arrow function (which introduces its own
/// `this` binding); a nested arrow function is transparent to `this` and
/// is descended into.
fn collect_this_in_method(arena: &Arena, func_node: NodeId) -> Result<Vec<NodeId>> {
    let mut found = Vec::new();
    for &child in &arena.get(func_node)?.children.clone() {
        collect_this_rec(arena, child, &mut found)?;
    }
    Ok(found)
}

fn collect_this_rec(arena: &Arena, id: NodeId, found: &mut Vec<NodeId>) -> Result<()> {
    let node = arena.get(id)?;
    match node.kind {
        NodeKind::ThisExpr => {
            found.push(id);
            return Ok(());
        }
        NodeKind::FunctionDecl | NodeKind::FunctionExpr => return Ok(()),
        _ => {}
    }
    for &child in &node.children.clone() {
        collect_this_rec(arena, child, found)?;
    }
    Ok(())
}
