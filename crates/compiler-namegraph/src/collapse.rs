//! Name collapser (C9, spec §4.8).
//!
//! Consumes the whole-program name graph built by [`crate::namegraph`]
//! to rewrite
//! every collapsible qualified name `a.b.c` into a fresh top-level
//! binding `a$b$c`, folding the namespace chain that held it.
//!
//! Only *leaf* qualified names - those with no recorded `child_names` -
//! are collapse candidates. A namespace entry such as `a.b` dissolves as
//! a side effect once every child it still has has been relocated; it is
//! never collapsed in its own right (collapsing a namespace object that
//! still has live children would orphan the children's reads).

use std::collections::{HashMap, HashSet};

use compiler_core::context::PropertyCollapseLevel;
use compiler_core::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use compiler_core::node::{Node, NodeKind, Payload};
use compiler_core::pass_manager::Pass;
use compiler_core::visit::{Descent, Visitor, walk};
use compiler_core::{Arena, CompileCtxt, NodeId};
use compiler_error::{Error, ErrorKind, Result};

use crate::namegraph::{self, NameGraph};

/// C9 as a pass-manager stage: builds the name graph fresh (it reflects
/// whatever ran before it) and collapses every eligible leaf qualified
/// name once.
pub struct NameCollapsePass;

impl Pass for NameCollapsePass {
    fn name(&self) -> &'static str {
        "name_collapse"
    }

    fn run(&mut self, cc: &mut CompileCtxt) -> Result<bool> {
        if cc.options.property_collapse_level == PropertyCollapseLevel::None {
            return Ok(false);
        }
        let Some(root) = cc.arena.root() else {
            return Ok(false);
        };
        let graph = namegraph::build(cc)?;
        collapse_all(cc, &graph, root)
    }
}

/// Collapses every eligible qualified name reachable from `root`,
/// consulting `graph` for collapsibility and structure. Exposed
/// separately from the `Pass` impl so tests (and a caller that already
/// has a graph in hand) can drive it directly.
pub fn collapse_all(cc: &mut CompileCtxt, graph: &NameGraph, root: NodeId) -> Result<bool> {
    report_hazards(cc, graph)?;

    let max_depth = match cc.options.property_collapse_level {
        PropertyCollapseLevel::None => return Ok(false),
        PropertyCollapseLevel::ModuleExportOnly => Some(2),
        PropertyCollapseLevel::All => None,
    };

    let mut candidates: Vec<String> = graph
        .names()
        .filter(|name| {
            graph
                .get(name)
                .map(|e| e.child_names.is_empty())
                .unwrap_or(false)
        })
        .filter(|name| max_depth.is_none_or(|d| name.matches('.').count() + 1 <= d))
        .filter(|name| graph.is_collapsible(&cc.arena, name).unwrap_or(false))
        .map(str::to_string)
        .collect();
    // Ordering discipline (§4.8): process ascending by depth so a name's
    // parent namespace has already lost every *other* child before we
    // decide whether to fold it away.
    candidates.sort_by_key(|n| n.matches('.').count());

    if candidates.is_empty() {
        return Ok(false);
    }

    tracing::debug!(candidate_count = candidates.len(), "name collapse candidates found");

    let mut used_names = collect_top_level_names(&cc.arena, root)?;
    let mut remaining_children: HashMap<String, HashSet<String>> = graph
        .names()
        .filter_map(|name| {
            let e = graph.get(name)?;
            (!e.child_names.is_empty()).then(|| (name.to_string(), e.child_names.clone()))
        })
        .collect();

    for name in &candidates {
        collapse_one(cc, graph, name, &mut used_names)?;
        detach_dissolved_ancestors(cc, graph, &mut remaining_children, name)?;
    }

    Ok(true)
}

/// Emits the warning-taxonomy diagnostics for qualified names the graph
/// observed but that C9 will never touch: an alias survives
/// (`unsafe_namespace`), or the name was assigned more than once at top
/// level with non-identical bodies (`namespace_redefined`).
fn report_hazards(cc: &mut CompileCtxt, graph: &NameGraph) -> Result<()> {
    for name in graph.names() {
        let entity = graph.get(name).expect("name came from graph.names()");
        if !entity.aliasing_refs.is_empty() {
            cc.diagnostics.report(
                Diagnostic::new(DiagnosticCode::UnsafeNamespace, Severity::Warning).with_arg(name),
            );
        }
        if entity.declarations.len() > 1
            && !entity.is_conditionally_defined
            && !graph.is_collapsible(&cc.arena, name)?
            && entity.aliasing_refs.is_empty()
        {
            cc.diagnostics.report(
                Diagnostic::new(DiagnosticCode::NamespaceRedefined, Severity::Warning).with_arg(name),
            );
        }
    }
    Ok(())
}

fn collapse_one(
    cc: &mut CompileCtxt,
    graph: &NameGraph,
    name: &str,
    used_names: &mut HashSet<String>,
) -> Result<()> {
    let entity = graph.get(name).ok_or_else(|| {
        Error::new(ErrorKind::QNameNotFound, format!("'{name}' missing from name graph"))
            .with_operation("collapse::collapse_one")
    })?;
    let decl = entity.declarations[0];
    let binding_name = fresh_binding_name(name, used_names);

    if namegraph::subtree_contains(&cc.arena, decl, NodeKind::ThisExpr)? {
        cc.diagnostics
            .report(Diagnostic::new(DiagnosticCode::UnsafeThis, Severity::Warning).with_arg(name));
    }

    let decl_lhs: HashSet<NodeId> = entity
        .declarations
        .iter()
        .map(|&d| cc.arena.get(d).map(|n| n.children[0]))
        .collect::<Result<_>>()?;
    rewrite_reads(cc, name, &binding_name, &decl_lhs)?;
    rewrite_declaration(cc, decl, &binding_name)?;

    for &extra in &entity.declarations[1..] {
        delete_statement(cc, extra)?;
    }
    Ok(())
}

/// After collapsing `name`, checks whether its parent qualified name
/// (one segment shorter) has any children left. If not - and the parent
/// itself is never read directly - the parent's own declaring
/// assignment is now dead and is detached, cascading upward.
fn detach_dissolved_ancestors(
    cc: &mut CompileCtxt,
    graph: &NameGraph,
    remaining_children: &mut HashMap<String, HashSet<String>>,
    name: &str,
) -> Result<()> {
    let Some((parent_name, leaf)) = name.rsplit_once('.') else {
        return Ok(());
    };
    let Some(children) = remaining_children.get_mut(parent_name) else {
        return Ok(());
    };
    children.remove(leaf);
    if !children.is_empty() {
        return Ok(());
    }
    let parent_name = parent_name.to_string();
    remaining_children.remove(&parent_name);

    let Some(parent) = graph.get(&parent_name) else {
        return Ok(());
    };
    if !parent.aliasing_refs.is_empty() {
        return Ok(());
    }
    for &d in &parent.declarations {
        delete_statement(cc, d)?;
    }
    detach_dissolved_ancestors(cc, graph, remaining_children, &parent_name)
}

/// Replaces every maximal read of `name` (excluding the declaration
/// sites in `skip`) with a fresh `Name(binding_name)` leaf.
fn rewrite_reads(cc: &mut CompileCtxt, name: &str, binding_name: &str, skip: &HashSet<NodeId>) -> Result<()> {
    let root = cc
        .arena
        .root()
        .expect("collapse only runs once a root has been lowered");

    struct Finder<'a> {
        name: &'a str,
        skip: &'a HashSet<NodeId>,
        found: Vec<NodeId>,
    }
    impl Visitor for Finder<'_> {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            if self.skip.contains(&id) {
                return Ok(Descent::Continue);
            }
            let node = arena.get(id)?;
            if matches!(node.kind, NodeKind::Name | NodeKind::GetProp)
                && namegraph::is_maximal(arena, id)?
                && namegraph::qname_of(arena, id)?.as_deref() == Some(self.name)
            {
                self.found.push(id);
                return Ok(Descent::SkipChildren);
            }
            Ok(Descent::Continue)
        }
    }

    let mut finder = Finder {
        name,
        skip,
        found: Vec::new(),
    };
    walk(&cc.arena, root, &mut finder)?;

    for old in finder.found {
        let scope = enclosing_change_scope(&cc.arena, old)?;
        let replacement = cc
            .arena
            .alloc(Node::new(NodeKind::Name).with_payload(Payload::Str(binding_name.to_string())))?;
        cc.arena.replace(old, replacement)?;
        cc.changes.report_change_to(scope);
    }
    Ok(())
}

/// Rewrites `name.declaring.assign = rhs;` into `var binding_name = rhs;`
/// - the statement the assignment sits directly under (an
/// `ExprStatement`, per the surface IR's convention) is replaced
/// wholesale, since `VarDecl` is itself a statement-level node.
fn rewrite_declaration(cc: &mut CompileCtxt, decl: NodeId, binding_name: &str) -> Result<()> {
    let stmt = enclosing_statement(&cc.arena, decl)?;
    let scope = enclosing_change_scope(&cc.arena, stmt)?;

    let rhs = cc.arena.get(decl)?.children[1];
    cc.arena.detach(rhs)?;
    let new_decl = Node::new(NodeKind::VarDecl)
        .with_payload(Payload::Str(binding_name.to_string()))
        .with_children(vec![rhs]);
    let new_id = cc.arena.alloc(new_decl)?;
    cc.arena.replace(stmt, new_id)?;
    cc.changes.report_change_to(scope);
    Ok(())
}

/// Detaches the statement enclosing `decl` (an `ExprStatement` wrapping
/// an `Assign`, or `decl` itself if it is already statement-level).
fn delete_statement(cc: &mut CompileCtxt, decl: NodeId) -> Result<()> {
    let stmt = enclosing_statement(&cc.arena, decl)?;
    let scope = enclosing_change_scope(&cc.arena, stmt)?;
    cc.arena.detach(stmt)?;
    cc.changes.report_change_to(scope);
    Ok(())
}

pub(crate) fn enclosing_statement(arena: &Arena, decl: NodeId) -> Result<NodeId> {
    match arena.get(decl)?.parent {
        Some(p) if arena.get(p)?.kind == NodeKind::ExprStatement => Ok(p),
        _ => Ok(decl),
    }
}

pub(crate) fn enclosing_change_scope(arena: &Arena, id: NodeId) -> Result<NodeId> {
    let mut current = Some(id);
    while let Some(cur) = current {
        if arena.get(cur)?.kind.is_change_scope() {
            return Ok(cur);
        }
        current = arena.get(cur)?.parent;
    }
    Err(Error::new(
        ErrorKind::ArenaInvariantViolation,
        format!("{id} has no enclosing change scope"),
    )
    .with_operation("collapse::enclosing_change_scope"))
}

fn collect_top_level_names(arena: &Arena, root: NodeId) -> Result<HashSet<String>> {
    struct Collector {
        names: HashSet<String>,
    }
    impl Visitor for Collector {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            let node = arena.get(id)?;
            if matches!(
                node.kind,
                NodeKind::VarDecl
                    | NodeKind::LetDecl
                    | NodeKind::ConstDecl
                    | NodeKind::FunctionDecl
                    | NodeKind::ClassDecl
            ) {
                if let Some(s) = node.payload.as_str() {
                    self.names.insert(s.to_string());
                }
            }
            Ok(Descent::Continue)
        }
    }
    let mut collector = Collector { names: HashSet::new() };
    walk(arena, root, &mut collector)?;
    Ok(collector.names)
}

/// Joins `name`'s segments with `$` (spec §4.8's collapsed-name shape),
/// resolving a collision against already-used top-level names with a
/// numeric suffix. `accept_pseudo_names` governs a later renaming/
/// minification pass, out of this component's scope - C9 always
/// produces the readable `$`-joined form.
fn fresh_binding_name(name: &str, used: &mut HashSet<String>) -> String {
    let base = name.replace('.', "$");
    let mut candidate = base.clone();
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}${suffix}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiler_core::context::{CompileCtxt, CompilerOptions, PropertyCollapseLevel};
    use compiler_core::ir_builder::{lower_program, parse_surface_ir};

    fn run_collapse(json: &str) -> CompileCtxt {
        let doc = parse_surface_ir(json).unwrap();
        let opts = CompilerOptions::default().with_property_collapse_level(PropertyCollapseLevel::All);
        let mut cc = CompileCtxt::new(opts);
        let root = lower_program(&mut cc, &[("a.js".into(), doc)]).unwrap();
        let graph = namegraph::build(&cc).unwrap();
        collapse_all(&mut cc, &graph, root).unwrap();
        cc
    }

    /// `var a = {}; a.b = {}; a.b.c = {}; d = a.b.c;` -> `a.b.c` becomes
    /// `var a$b$c = {};`, reads of `a.b.c` become `Name(a$b$c)`, and the
    /// intermediate `a.b = {}` statement is detached since `c` was its
    /// only child.
    #[test]
    fn multi_level_chain_collapses_to_one_binding_and_dissolves_its_namespace() {
        let json = r#"{
            "kind": "script",
            "children": [
                {"kind": "expr_statement", "children": [
                    {"kind": "assign", "children": [
                        {"kind": "name", "payload": "a"},
                        {"kind": "object_lit", "children": []}
                    ]}
                ]},
                {"kind": "expr_statement", "children": [
                    {"kind": "assign", "children": [
                        {"kind": "get_prop", "payload": "b", "children": [
                            {"kind": "name", "payload": "a"}
                        ]},
                        {"kind": "object_lit", "children": []}
                    ]}
                ]},
                {"kind": "expr_statement", "children": [
                    {"kind": "assign", "children": [
                        {"kind": "get_prop", "payload": "c", "children": [
                            {"kind": "get_prop", "payload": "b", "children": [
                                {"kind": "name", "payload": "a"}
                            ]}
                        ]},
                        {"kind": "object_lit", "children": []}
                    ]}
                ]},
                {"kind": "expr_statement", "children": [
                    {"kind": "assign", "children": [
                        {"kind": "name", "payload": "d"},
                        {"kind": "get_prop", "payload": "c", "children": [
                            {"kind": "get_prop", "payload": "b", "children": [
                                {"kind": "name", "payload": "a"}
                            ]}
                        ]}
                    ]}
                ]}
            ]
        }"#;
        let cc = run_collapse(json);
        let root = cc.arena.root().unwrap();
        let script = cc.arena.get(root).unwrap().children[0];
        let statements = &cc.arena.get(script).unwrap().children;
        // `var a = {}` remains (it is a plain binding, not a QName); the
        // `a.b = {}` and `a.b.c = {}` statements are gone, replaced by a
        // single `var a$b$c = {}`, and `d`'s initializer now reads it.
        assert_eq!(statements.len(), 3);
        let collapsed_decl = cc.arena.get(statements[1]).unwrap();
        assert_eq!(collapsed_decl.kind, NodeKind::VarDecl);
        assert_eq!(collapsed_decl.payload.as_str(), Some("a$b$c"));

        let d_assign_stmt = cc.arena.get(statements[2]).unwrap();
        let d_assign = cc.arena.get(d_assign_stmt.children[0]).unwrap();
        let rhs = cc.arena.get(d_assign.children[1]).unwrap();
        assert_eq!(rhs.kind, NodeKind::Name);
        assert_eq!(rhs.payload.as_str(), Some("a$b$c"));
    }

    /// `var a = {b: 0}; f(a); a.b;` - `a` escapes as a call argument, so
    /// neither `a` nor `a.b` is touched.
    #[test]
    fn aliased_namespace_blocks_collapse_and_is_reported() {
        let json = r#"{
            "kind": "script",
            "children": [
                {"kind": "expr_statement", "children": [
                    {"kind": "assign", "children": [
                        {"kind": "name", "payload": "a"},
                        {"kind": "object_lit", "children": []}
                    ]}
                ]},
                {"kind": "expr_statement", "children": [
                    {"kind": "call", "children": [
                        {"kind": "name", "payload": "f"},
                        {"kind": "name", "payload": "a"}
                    ]}
                ]}
            ]
        }"#;
        let doc = parse_surface_ir(json).unwrap();
        let opts = CompilerOptions::default().with_property_collapse_level(PropertyCollapseLevel::All);
        let mut cc = CompileCtxt::new(opts);
        let root = lower_program(&mut cc, &[("a.js".into(), doc)]).unwrap();
        let graph = namegraph::build(&cc).unwrap();
        let changed = collapse_all(&mut cc, &graph, root).unwrap();
        assert!(!changed);
        assert_eq!(
            cc.diagnostics
                .all()
                .iter()
                .filter(|d| d.code == DiagnosticCode::UnsafeNamespace)
                .count(),
            1
        );
    }

    /// `property_collapse_level: none` disables C9 entirely.
    #[test]
    fn collapse_level_none_is_a_no_op() {
        let json = r#"{
            "kind": "script",
            "children": [
                {"kind": "expr_statement", "children": [
                    {"kind": "assign", "children": [
                        {"kind": "name", "payload": "a"},
                        {"kind": "object_lit", "children": []}
                    ]}
                ]}
            ]
        }"#;
        let doc = parse_surface_ir(json).unwrap();
        let mut cc = CompileCtxt::new(CompilerOptions::default());
        let root = lower_program(&mut cc, &[("a.js".into(), doc)]).unwrap();
        let graph = namegraph::build(&cc).unwrap();
        assert!(!collapse_all(&mut cc, &graph, root).unwrap());
    }
}
