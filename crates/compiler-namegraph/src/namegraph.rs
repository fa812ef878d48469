//! Global name graph (C8, spec §4.7).
//!
//! A single whole-program map from dotted qualified name to entity,
//! assembled by scanning every script and merging per-file declaration
//! edges, plus the collapsibility safety predicate C9/C10 both consult.

use std::collections::{BTreeSet, HashMap};

use compiler_core::node::NodeKind;
use compiler_core::visit::{Descent, Visitor, walk};
use compiler_core::{Arena, CompileCtxt, Node, NodeId, QNameId};
use compiler_error::Result;
use rayon::prelude::*;

/// The name graph's per-QName record (data model §3 "Qualified name").
#[derive(Debug, Clone)]
pub struct QNameEntity {
    pub id: QNameId,
    pub name: String,
    pub declarations: Vec<NodeId>,
    pub aliasing_refs: Vec<NodeId>,
    pub child_names: BTreeSet<String>,
    pub is_constructor: bool,
    pub is_interface: bool,
    pub is_enum: bool,
    pub is_namespace: bool,
    pub has_no_collapse_annotation: bool,
    pub has_exported_annotation: bool,
    pub is_defined_in_externs: bool,
    pub is_conditionally_defined: bool,
    /// One of this name's descendant segments has been observed read or
    /// written via computed access on this name (spec §4.7).
    pub has_unknown_children: bool,
    /// A getter or setter exists on the object literal this name's
    /// declaration assigns (safety condition 5).
    pub has_getter_or_setter: bool,
    /// A `super.` expression appears in this name's declaration body
    /// (safety condition 6).
    pub is_super_receiver: bool,
}

impl QNameEntity {
    fn new(name: &str) -> Self {
        Self {
            id: QNameId::next(),
            name: name.to_string(),
            declarations: Vec::new(),
            aliasing_refs: Vec::new(),
            child_names: BTreeSet::new(),
            is_constructor: false,
            is_interface: false,
            is_enum: false,
            is_namespace: false,
            has_no_collapse_annotation: false,
            has_exported_annotation: false,
            is_defined_in_externs: false,
            is_conditionally_defined: false,
            has_unknown_children: false,
            has_getter_or_setter: false,
            is_super_receiver: false,
        }
    }
}

/// The whole-program map from dotted qualified name to entity.
#[derive(Debug, Default)]
pub struct NameGraph {
    entities: HashMap<String, QNameEntity>,
}

impl NameGraph {
    pub fn get(&self, name: &str) -> Option<&QNameEntity> {
        self.entities.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The safety predicate of spec §4.7, used by C9 and C10. Conditions
    /// 1-6 in order; any failure makes `q` uncollapsible.
    pub fn is_collapsible(&self, arena: &Arena, name: &str) -> Result<bool> {
        let Some(e) = self.entities.get(name) else {
            return Ok(false);
        };
        if !self.has_single_or_identical_declarations(arena, name)? {
            return Ok(false);
        }
        Ok(e.aliasing_refs.is_empty()
            && !e.has_no_collapse_annotation
            && !e.has_exported_annotation
            && !e.is_defined_in_externs
            && !e.has_unknown_children
            && !e.has_getter_or_setter
            && !e.is_super_receiver)
    }

    fn has_single_or_identical_declarations(&self, arena: &Arena, name: &str) -> Result<bool> {
        let Some(e) = self.entities.get(name) else {
            return Ok(false);
        };
        if e.declarations.is_empty() || e.is_conditionally_defined {
            return Ok(false);
        }
        if e.declarations.len() == 1 {
            return Ok(true);
        }
        let rhs = |decl: NodeId| -> Result<Option<NodeId>> { Ok(arena.get(decl)?.children.get(1).copied()) };
        let Some(first) = rhs(e.declarations[0])? else {
            return Ok(false);
        };
        for &decl in &e.declarations[1..] {
            let Some(other) = rhs(decl)? else {
                return Ok(false);
            };
            if !structural_eq(arena, first, other)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Scans every top-level `SCRIPT` reachable from `cc.arena.root()` in
/// parallel (one `Scanner` per file) and merges the per-file entity maps
/// into one whole-program name graph per the classification rules in
/// spec §4.7.
/// A qualified name declared in more than one file - a namespace
/// extended across modules - merges its declarations and flags exactly
/// as if both assignments had been scanned serially in file order.
pub fn build(cc: &CompileCtxt) -> Result<NameGraph> {
    let Some(root) = cc.arena.root() else {
        return Ok(NameGraph::default());
    };
    let scripts = cc.arena.get(root)?.children.clone();

    let partials: Vec<HashMap<String, QNameEntity>> = scripts
        .par_iter()
        .map(|&script| -> Result<HashMap<String, QNameEntity>> {
            let mut scanner = Scanner {
                cc,
                entities: HashMap::new(),
            };
            walk(&cc.arena, script, &mut scanner)?;
            Ok(scanner.entities)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut entities: HashMap<String, QNameEntity> = HashMap::new();
    for partial in partials {
        for (name, entity) in partial {
            merge_entity(&mut entities, name, entity);
        }
    }

    let mut graph = NameGraph { entities };
    link_child_names(&mut graph);
    Ok(graph)
}

/// Folds `other` (scanned from one file) into the whole-program map,
/// unioning every list/flag field. The first file scanned to declare a
/// name keeps its slot; later files extend it in place.
fn merge_entity(entities: &mut HashMap<String, QNameEntity>, name: String, other: QNameEntity) {
    use std::collections::hash_map::Entry;
    match entities.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(other);
        }
        Entry::Occupied(mut slot) => {
            let existing = slot.get_mut();
            existing.declarations.extend(other.declarations);
            existing.aliasing_refs.extend(other.aliasing_refs);
            existing.child_names.extend(other.child_names);
            existing.is_constructor |= other.is_constructor;
            existing.is_interface |= other.is_interface;
            existing.is_enum |= other.is_enum;
            existing.is_namespace |= other.is_namespace;
            existing.has_no_collapse_annotation |= other.has_no_collapse_annotation;
            existing.has_exported_annotation |= other.has_exported_annotation;
            existing.is_defined_in_externs |= other.is_defined_in_externs;
            existing.is_conditionally_defined |= other.is_conditionally_defined;
            existing.has_unknown_children |= other.has_unknown_children;
            existing.has_getter_or_setter |= other.has_getter_or_setter;
            existing.is_super_receiver |= other.is_super_receiver;
        }
    }
}

struct Scanner<'a> {
    cc: &'a CompileCtxt,
    entities: HashMap<String, QNameEntity>,
}

impl Scanner<'_> {
    fn entity_mut(&mut self, name: &str) -> &mut QNameEntity {
        self.entities.entry(name.to_string()).or_insert_with(|| QNameEntity::new(name))
    }

    fn record_declaration(&mut self, name: &str, assign: NodeId) -> Result<()> {
        let conditional = is_conditionally_defined(&self.cc.arena, assign)?;
        let flags = self.cc.annotations.flags(assign);
        let last_segment = name.rsplit('.').next().unwrap_or(name);
        let exported = flags.is_exported || self.cc.options.exported_name.is_exported(last_segment);
        let has_super = rhs_uses_super(&self.cc.arena, assign)?;
        let has_accessor = rhs_has_accessor(&self.cc.arena, assign)?;

        let entity = self.entity_mut(name);
        entity.declarations.push(assign);
        entity.is_conditionally_defined |= conditional;
        entity.has_no_collapse_annotation |= flags.no_collapse;
        entity.has_exported_annotation |= exported;
        entity.is_constructor |= flags.is_constructor;
        entity.is_interface |= flags.is_interface;
        entity.is_enum |= flags.is_enum;
        entity.is_super_receiver |= has_super;
        entity.has_getter_or_setter |= has_accessor;
        Ok(())
    }
}

impl Visitor for Scanner<'_> {
    fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
        let node = arena.get(id)?;
        match node.kind {
            NodeKind::Assign => {
                if let Some(&lhs) = node.children.first() {
                    if let Some(name) = qname_of(arena, lhs)? {
                        self.record_declaration(&name, id)?;
                        return Ok(Descent::Continue);
                    }
                }
            }
            NodeKind::GetElem => {
                if let Some(&object) = node.children.first() {
                    if let Some(name) = qname_of(arena, object)? {
                        self.entity_mut(&name).has_unknown_children = true;
                    }
                }
            }
            NodeKind::Name | NodeKind::GetProp => {
                if is_pure_chain_node(node)
                    && is_maximal(arena, id)?
                    && !is_assign_lhs(arena, id)?
                    && !is_call_callee(arena, id)?
                {
                    if let Some(name) = qname_of(arena, id)? {
                        self.entity_mut(&name).aliasing_refs.push(id);
                    }
                }
            }
            _ => {}
        }
        Ok(Descent::Continue)
    }
}

fn is_pure_chain_node(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Name)
        || (node.kind == NodeKind::GetProp && !node.bits.is_computed_key && !node.bits.is_optional_chain_link)
}

/// Resolves the dotted path a Name/pure-GetProp chain spells out, or
/// `None` if the chain is broken by a computed key, optional-chain link,
/// or any non-qname node.
pub(crate) fn qname_of(arena: &Arena, id: NodeId) -> Result<Option<String>> {
    let node = arena.get(id)?;
    match node.kind {
        NodeKind::Name => Ok(node.payload.as_str().map(|s| s.to_string())),
        NodeKind::GetProp if !node.bits.is_computed_key && !node.bits.is_optional_chain_link => {
            let (Some(&base), Some(prop)) = (node.children.first(), node.payload.as_str()) else {
                return Ok(None);
            };
            Ok(qname_of(arena, base)?.map(|b| format!("{b}.{prop}")))
        }
        _ => Ok(None),
    }
}

/// True if `id` is not itself the "object" sub-position of an enclosing
/// property-access node, i.e. it is the outermost node of its chain.
pub(crate) fn is_maximal(arena: &Arena, id: NodeId) -> Result<bool> {
    let node = arena.get(id)?;
    let Some(parent_id) = node.parent else {
        return Ok(true);
    };
    let parent = arena.get(parent_id)?;
    let is_object_position = matches!(parent.kind, NodeKind::GetProp | NodeKind::OptionalChainGetProp)
        && parent.children.first() == Some(&id);
    Ok(!is_object_position)
}

fn is_assign_lhs(arena: &Arena, id: NodeId) -> Result<bool> {
    let node = arena.get(id)?;
    let Some(parent_id) = node.parent else {
        return Ok(false);
    };
    let parent = arena.get(parent_id)?;
    Ok(parent.kind == NodeKind::Assign && parent.children.first() == Some(&id))
}

fn is_call_callee(arena: &Arena, id: NodeId) -> Result<bool> {
    let node = arena.get(id)?;
    let Some(parent_id) = node.parent else {
        return Ok(false);
    };
    let parent = arena.get(parent_id)?;
    Ok(parent.kind == NodeKind::Call && parent.children.first() == Some(&id))
}

/// Climbs from `assign` to the nearest Script/Root, per spec §4.7: "an
/// assignment inside an if/loop/switch/function body/catch/arrow/
/// block-scope marks the QName `is_conditionally_defined`".
pub(crate) fn is_conditionally_defined(arena: &Arena, assign: NodeId) -> Result<bool> {
    let mut current = arena.get(assign)?.parent;
    while let Some(id) = current {
        let node = arena.get(id)?;
        if matches!(node.kind, NodeKind::Script | NodeKind::Root) {
            return Ok(false);
        }
        if matches!(
            node.kind,
            NodeKind::If
                | NodeKind::For
                | NodeKind::ForIn
                | NodeKind::ForOf
                | NodeKind::While
                | NodeKind::DoWhile
                | NodeKind::Switch
                | NodeKind::SwitchCase
                | NodeKind::Try
                | NodeKind::Catch
                | NodeKind::Finally
                | NodeKind::FunctionDecl
                | NodeKind::FunctionExpr
                | NodeKind::ArrowFunction
                | NodeKind::Block
                | NodeKind::StaticBlock
        ) {
            return Ok(true);
        }
        current = node.parent;
    }
    Ok(false)
}

fn rhs_uses_super(arena: &Arena, assign: NodeId) -> Result<bool> {
    let Some(&rhs) = arena.get(assign)?.children.get(1) else {
        return Ok(false);
    };
    subtree_contains(arena, rhs, NodeKind::SuperExpr)
}

/// Safety condition 5: a getter/setter declared on the object literal a
/// declaration assigns.
fn rhs_has_accessor(arena: &Arena, assign: NodeId) -> Result<bool> {
    let Some(&rhs) = arena.get(assign)?.children.get(1) else {
        return Ok(false);
    };
    let node = arena.get(rhs)?;
    if node.kind != NodeKind::ObjectLit {
        return Ok(false);
    }
    for &prop in &node.children {
        if arena.get(prop)?.bits.is_accessor {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn subtree_contains(arena: &Arena, root: NodeId, kind: NodeKind) -> Result<bool> {
    struct Finder<'a> {
        arena: &'a Arena,
        kind: NodeKind,
        found: bool,
    }
    impl Visitor for Finder<'_> {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            if arena.get(id)?.kind == self.kind {
                self.found = true;
                return Ok(Descent::SkipChildren);
            }
            Ok(Descent::Continue)
        }
    }
    let mut finder = Finder { arena, kind, found: false };
    walk(arena, root, &mut finder)?;
    Ok(finder.found)
}

/// A structural hash-free equality check over two subtrees: same kind,
/// same payload, same children count, recursively equal children. Used
/// by the collapsibility predicate's "identical definitions" clause.
pub(crate) fn structural_eq(arena: &Arena, a: NodeId, b: NodeId) -> Result<bool> {
    let (na, nb) = (arena.get(a)?, arena.get(b)?);
    if na.kind != nb.kind || na.payload != nb.payload || na.bits != nb.bits {
        return Ok(false);
    }
    if na.children.len() != nb.children.len() {
        return Ok(false);
    }
    let children: Vec<(NodeId, NodeId)> = na.children.iter().copied().zip(nb.children.iter().copied()).collect();
    for (ca, cb) in children {
        if !structural_eq(arena, ca, cb)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Populates `child_names` and the derived `is_namespace` flag: `q2` is
/// a child of `q` iff `q2 == "{q}.{segment}"` for exactly one segment.
fn link_child_names(graph: &mut NameGraph) {
    let names: Vec<String> = graph.entities.keys().cloned().collect();
    for name in &names {
        let prefix = format!("{name}.");
        let children: BTreeSet<String> = names
            .iter()
            .filter(|other| other.starts_with(&prefix) && !other[prefix.len()..].contains('.'))
            .cloned()
            .collect();
        if let Some(e) = graph.entities.get_mut(name) {
            e.is_namespace = !children.is_empty();
            e.child_names = children;
        }
    }
}
