//! The Node & NodeId arena (C1, spec §4.1).
//!
//! This arena is index-addressed and mutable: NodeIds are assigned from the
//! backing `Vec`'s length at `alloc` time (addressing is by index, not
//! by pointer), and `detach`/`replace`/`insert_before`/`insert_after`
//! all rewrite parent/child links in place. Freed slots are tombstoned
//! rather than removed so existing NodeIds never silently repoint at an
//! unrelated node.

use compiler_error::{Error, ErrorKind, Result};

use crate::ids::NodeId;
use crate::node::Node;

enum Slot {
    Live(Node),
    Freed,
}

/// Owns every Node. No other component may hold a `&Node` across a
/// mutating call; callers re-look-up by NodeId instead (§5, "shared-
/// resource policy").
pub struct Arena {
    slots: Vec<Slot>,
    root: Option<NodeId>,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            root: None,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    fn slot(&self, id: NodeId) -> Result<&Node> {
        match self.slots.get(id.index()) {
            Some(Slot::Live(n)) => Ok(n),
            _ => Err(Error::dangling_node_id(id.to_string()).with_operation("arena::get")),
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Live(n)) => Ok(n),
            _ => Err(Error::dangling_node_id(id.to_string()).with_operation("arena::get_mut")),
        }
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.slot(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slot_mut(id)
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Slot::Live(_)))
    }

    /// `alloc(kind, children) -> NodeId`: creates a node, sets parent
    /// links on `children`, and asserts each child has no current
    /// parent (fatal otherwise).
    pub fn alloc(&mut self, node: Node) -> Result<NodeId> {
        for &child in &node.children {
            let c = self.slot(child)?;
            if c.parent.is_some() {
                return Err(
                    Error::node_already_parented(child.to_string()).with_operation("arena::alloc")
                );
            }
        }
        let id = NodeId(self.slots.len() as u32);
        for &child in &node.children {
            self.slot_mut(child)?.parent = Some(id);
        }
        self.slots.push(Slot::Live(node));
        Ok(id)
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.slot(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::ArenaInvariantViolation,
                    format!("{child} is not a recorded child of {parent}"),
                )
                .with_operation("arena::child_index")
            })
    }

    /// Removes `n` from its parent's child list, leaving `n` a root of a
    /// detached subtree.
    pub fn detach(&mut self, n: NodeId) -> Result<()> {
        let parent = self.slot(n)?.parent;
        if let Some(parent) = parent {
            let idx = self.child_index(parent, n)?;
            self.slot_mut(parent)?.children.remove(idx);
        }
        self.slot_mut(n)?.parent = None;
        Ok(())
    }

    /// Splices `new` where `old` used to sit; `old` becomes detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        if self.slot(new)?.parent.is_some() {
            return Err(
                Error::node_already_parented(new.to_string()).with_operation("arena::replace")
            );
        }
        let parent = self.slot(old)?.parent;
        match parent {
            Some(parent) => {
                let idx = self.child_index(parent, old)?;
                self.slot_mut(parent)?.children[idx] = new;
                self.slot_mut(new)?.parent = Some(parent);
            }
            None if self.root == Some(old) => {
                self.root = Some(new);
            }
            None => {}
        }
        self.slot_mut(old)?.parent = None;
        Ok(())
    }

    fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.slot(child)?.parent.is_some() {
            return Err(
                Error::node_already_parented(child.to_string()).with_operation("arena::attach")
            );
        }
        self.slot_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn add_child_to_back(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.attach_child(parent, child)?;
        self.slot_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn add_child_to_front(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.attach_child(parent, child)?;
        self.slot_mut(parent)?.children.insert(0, child);
        Ok(())
    }

    pub fn insert_before(&mut self, sibling: NodeId, new: NodeId) -> Result<()> {
        let parent = self.slot(sibling)?.parent.ok_or_else(|| {
            Error::new(
                ErrorKind::ArenaInvariantViolation,
                format!("{sibling} has no parent to insert a sibling into"),
            )
            .with_operation("arena::insert_before")
        })?;
        self.attach_child(parent, new)?;
        let idx = self.child_index(parent, sibling)?;
        self.slot_mut(parent)?.children.insert(idx, new);
        Ok(())
    }

    pub fn insert_after(&mut self, sibling: NodeId, new: NodeId) -> Result<()> {
        let parent = self.slot(sibling)?.parent.ok_or_else(|| {
            Error::new(
                ErrorKind::ArenaInvariantViolation,
                format!("{sibling} has no parent to insert a sibling into"),
            )
            .with_operation("arena::insert_after")
        })?;
        self.attach_child(parent, new)?;
        let idx = self.child_index(parent, sibling)?;
        self.slot_mut(parent)?.children.insert(idx + 1, new);
        Ok(())
    }

    /// Tombstones `n`'s slot. Any later `get`/`get_mut`/`detach`/etc.
    /// against this id becomes a dangling-node-id error, per the
    /// "address a freed NodeId is fatal" contract.
    pub fn free(&mut self, n: NodeId) -> Result<()> {
        self.slot(n)?;
        self.slots[n.index()] = Slot::Freed;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn leaf(kind: NodeKind) -> Node {
        Node::new(kind)
    }

    #[test]
    fn alloc_assigns_sequential_ids_and_parent_links() {
        let mut arena = Arena::new();
        let a = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        let b = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        let parent = arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a, b]))
            .unwrap();
        assert_eq!(arena.get(a).unwrap().parent, Some(parent));
        assert_eq!(arena.get(b).unwrap().parent, Some(parent));
        assert_eq!(arena.get(parent).unwrap().children, vec![a, b]);
    }

    #[test]
    fn alloc_rejects_an_already_parented_child() {
        let mut arena = Arena::new();
        let a = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a]))
            .unwrap();
        let err = arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NodeAlreadyParented);
    }

    #[test]
    fn detach_clears_parent_and_removes_from_child_list() {
        let mut arena = Arena::new();
        let a = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        let parent = arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a]))
            .unwrap();
        arena.detach(a).unwrap();
        assert_eq!(arena.get(a).unwrap().parent, None);
        assert!(arena.get(parent).unwrap().children.is_empty());
    }

    #[test]
    fn replace_splices_new_node_and_detaches_old() {
        let mut arena = Arena::new();
        let a = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        let parent = arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a]))
            .unwrap();
        let b = arena.alloc(leaf(NodeKind::StringLit)).unwrap();
        arena.replace(a, b).unwrap();
        assert_eq!(arena.get(parent).unwrap().children, vec![b]);
        assert_eq!(arena.get(b).unwrap().parent, Some(parent));
        assert_eq!(arena.get(a).unwrap().parent, None);
    }

    #[test]
    fn freed_node_id_is_dangling() {
        let mut arena = Arena::new();
        let a = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        arena.free(a).unwrap();
        let err = arena.get(a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DanglingNodeId);
    }

    #[test]
    fn insert_before_and_after_preserve_sibling_order() {
        let mut arena = Arena::new();
        let a = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        let c = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        let parent = arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a, c]))
            .unwrap();
        let b = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        arena.insert_before(c, b).unwrap();
        assert_eq!(arena.get(parent).unwrap().children, vec![a, b, c]);

        let d = arena.alloc(leaf(NodeKind::NumberLit)).unwrap();
        arena.insert_after(c, d).unwrap();
        assert_eq!(arena.get(parent).unwrap().children, vec![a, b, c, d]);
    }
}
