//! Erased nominal type lattice ("colors", C4, spec §4.2 / §9).
//!
//! Colors are attached to NodeIds, joinable, and used only to gate
//! rewrites - C4 is never a full type checker. The lattice admits at
//! least `unknown`, `void/nullish`, nominal object colors, and
//! union-of-nominal-colors with a join, per the annotation-pipeline
//! note in the data model.

use std::collections::{BTreeSet, HashMap};

use crate::ids::NodeId;

/// A nominal color name, e.g. the declared class/constructor a value
/// was colored with. Interning is left to the caller (typically the
/// same string interner C3's collaborator uses); this component only
/// needs equality and ordering to build union sets deterministically.
pub type Nominal = String;

/// A point in the color lattice.
///
/// Ordering (bottom to top is not meaningful here; this is a join
/// semilattice with `Unknown` absorbing everything):
/// `VoidNullish` and `Nominal(_)`/`Union(_)` are incomparable siblings;
/// joining any two distinct colors produces a `Union`, and joining with
/// `Unknown` always yields `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Color {
    Unknown,
    VoidNullish,
    Nominal(Nominal),
    Union(BTreeSet<Nominal>),
}

impl Color {
    pub fn nominal(name: impl Into<String>) -> Self {
        Color::Nominal(name.into())
    }

    /// Join two colors. `Unknown` is absorbing. Joining two nominal
    /// colors (or a nominal and a union) produces the union of their
    /// members; `VoidNullish` joined with a nominal/union color widens
    /// straight to `Unknown` since this lattice has no nullable-nominal
    /// point.
    pub fn join(&self, other: &Color) -> Color {
        match (self, other) {
            (Color::Unknown, _) | (_, Color::Unknown) => Color::Unknown,
            (Color::VoidNullish, Color::VoidNullish) => Color::VoidNullish,
            (Color::VoidNullish, _) | (_, Color::VoidNullish) => Color::Unknown,
            (a, b) if a == b => a.clone(),
            (a, b) => {
                let mut members = BTreeSet::new();
                a.collect_nominals(&mut members);
                b.collect_nominals(&mut members);
                Color::Union(members)
            }
        }
    }

    fn collect_nominals(&self, into: &mut BTreeSet<Nominal>) {
        match self {
            Color::Nominal(n) => {
                into.insert(n.clone());
            }
            Color::Union(members) => into.extend(members.iter().cloned()),
            Color::Unknown | Color::VoidNullish => {}
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Color::Unknown)
    }
}

/// Passive NodeId -> Color side table.
#[derive(Debug, Default)]
pub struct ColorTable {
    colors: HashMap<NodeId, Color>,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeId, color: Color) {
        self.colors.insert(node, color);
    }

    /// Nodes with no recorded color are `Unknown`, not absent - C4 is
    /// total over the arena even though most passes never populate it.
    pub fn get(&self, node: NodeId) -> Color {
        self.colors.get(&node).cloned().unwrap_or(Color::Unknown)
    }
}
