//! Depth-first arena traversal with pre/post hooks (C1, spec §4.1).
//!
//! A pre-order/post-order visitor pair plus an abort-descent reply,
//! since passes need to skip a subtree (e.g. a function whose feature
//! set is already satisfied) without hand-rolling recursion each time.

use compiler_error::Result;

use crate::arena::Arena;
use crate::ids::NodeId;

/// What `Visitor::enter` tells the walker to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Visit this node's children, then call `leave`.
    Continue,
    /// Skip this node's children; `leave` is still called.
    SkipChildren,
}

/// A depth-first visitor over the arena. `enter` runs pre-order,
/// `leave` runs post-order; both default to no-ops so a visitor only
/// needs to override the hook it cares about.
pub trait Visitor {
    fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
        let _ = (arena, id);
        Ok(Descent::Continue)
    }

    fn leave(&mut self, arena: &Arena, id: NodeId) -> Result<()> {
        let _ = (arena, id);
        Ok(())
    }
}

/// Walks `root` depth-first, calling `enter`/`leave` on `visitor`.
/// Children are visited in document order (the order recorded in
/// `Node::children`).
pub fn walk(arena: &Arena, root: NodeId, visitor: &mut impl Visitor) -> Result<()> {
    let descent = visitor.enter(arena, root)?;
    if descent == Descent::Continue {
        let children = arena.get(root)?.children.clone();
        for child in children {
            walk(arena, child, visitor)?;
        }
    }
    visitor.leave(arena, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};

    struct Order(Vec<(NodeId, bool)>);

    impl Visitor for Order {
        fn enter(&mut self, _arena: &Arena, id: NodeId) -> Result<Descent> {
            self.0.push((id, true));
            Ok(Descent::Continue)
        }

        fn leave(&mut self, _arena: &Arena, id: NodeId) -> Result<()> {
            self.0.push((id, false));
            Ok(())
        }
    }

    fn sample() -> (Arena, NodeId) {
        let mut arena = Arena::new();
        let a = arena.alloc(Node::new(NodeKind::NumberLit)).unwrap();
        let b = arena.alloc(Node::new(NodeKind::NumberLit)).unwrap();
        let root = arena
            .alloc(Node::new(NodeKind::ArrayLit).with_children(vec![a, b]))
            .unwrap();
        (arena, root)
    }

    #[test]
    fn visits_pre_and_post_order_for_every_node() {
        let (arena, root) = sample();
        let mut order = Order(Vec::new());
        walk(&arena, root, &mut order).unwrap();
        let entered: Vec<_> = order.0.iter().filter(|(_, pre)| *pre).map(|(id, _)| *id).collect();
        assert_eq!(entered.len(), 3);
        assert_eq!(entered[0], root);
        assert_eq!(order.0.last(), Some(&(root, false)));
    }

    struct Count<'a>(&'a mut Vec<NodeId>);

    impl Visitor for Count<'_> {
        fn enter(&mut self, _arena: &Arena, id: NodeId) -> Result<Descent> {
            self.0.push(id);
            Ok(Descent::SkipChildren)
        }
    }

    #[test]
    fn skip_children_visits_only_the_root() {
        let (arena, root) = sample();
        let mut visited = Vec::new();
        walk(&arena, root, &mut Count(&mut visited)).unwrap();
        assert_eq!(visited, vec![root]);
    }
}
