//! Runtime-library injector (C13, spec §4.10).
//!
//! A pass that needs a helper (iterator bridge, inheritance helper,
//! array-spread helper, ...) records a string tag; the injector ensures
//! exactly one copy of the named helper's pre-parsed subtree is spliced
//! into the top-level prelude, in a deterministic order. Injection is
//! idempotent: requesting the same tag twice, or flushing twice, never
//! splices a second copy.

use std::collections::BTreeSet;

use compiler_error::Result;
use strum_macros::{Display, EnumString};

use crate::arena::Arena;
use crate::ids::NodeId;
use crate::node::{Node, NodeBits, NodeKind, Payload};

/// The closed set of helper subtrees a pass can request. `Ord` gives a
/// deterministic injection order independent of request order, matching
/// the "deterministic order" requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum HelperTag {
    ArraySpreadHelper,
    AsyncGeneratorWrapper,
    InheritsHelper,
    IteratorBridge,
}

impl HelperTag {
    /// The synthetic top-level binding name the spliced helper declares.
    /// Prefixed the way the rest of the corpus prefixes synthesized
    /// runtime symbols, to stay out of the user's own namespace.
    fn binding_name(self) -> &'static str {
        match self {
            HelperTag::ArraySpreadHelper => "$jscomp$arraySpread",
            HelperTag::AsyncGeneratorWrapper => "$jscomp$asyncGeneratorWrap",
            HelperTag::InheritsHelper => "$jscomp$inherits",
            HelperTag::IteratorBridge => "$jscomp$iteratorBridge",
        }
    }
}

/// Tracks which helpers have been requested and which have already been
/// spliced into the prelude.
#[derive(Debug, Default)]
pub struct RuntimeLibInjector {
    requested: BTreeSet<HelperTag>,
    injected: BTreeSet<HelperTag>,
}

impl RuntimeLibInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a pass needs `tag`'s helper available. Safe to call
    /// more than once with the same tag within or across passes.
    pub fn request(&mut self, tag: HelperTag) {
        self.requested.insert(tag);
    }

    pub fn is_requested(&self, tag: HelperTag) -> bool {
        self.requested.contains(&tag)
    }

    pub fn is_injected(&self, tag: HelperTag) -> bool {
        self.injected.contains(&tag)
    }

    /// Splices a pre-parsed subtree for every requested-but-not-yet-
    /// injected helper as a child of `prelude_root`, in `HelperTag`'s
    /// deterministic `Ord` order. Called once at the end of a pass that
    /// requested a helper (spec §4.10: "at end of its run").
    pub fn flush(&mut self, arena: &mut Arena, prelude_root: NodeId) -> Result<()> {
        let pending: Vec<HelperTag> = self
            .requested
            .iter()
            .copied()
            .filter(|t| !self.injected.contains(t))
            .collect();
        for tag in pending {
            let subtree = Self::build_helper_subtree(arena, tag)?;
            arena.add_child_to_front(prelude_root, subtree)?;
            self.injected.insert(tag);
        }
        Ok(())
    }

    /// A minimal synthetic subtree standing in for the helper's real,
    /// pre-compiled body: a `FUNCTION_DECL` named after the helper, with
    /// no parameters and an empty body. A real implementation would
    /// splice a pre-parsed AST fragment loaded once at startup; since
    /// parsing is a collaborator concern here, this constructs the
    /// equivalent shape directly.
    fn build_helper_subtree(arena: &mut Arena, tag: HelperTag) -> Result<NodeId> {
        let body = arena.alloc(Node::new(NodeKind::Block))?;
        let mut decl = Node::new(NodeKind::FunctionDecl).with_children(vec![body]);
        decl.payload = Payload::Str(tag.binding_name().to_string());
        decl.bits = NodeBits {
            is_synthetic: true,
            ..NodeBits::default()
        };
        arena.alloc(decl)
    }
}
