//! Change tracker & verifier (C6, spec §4.4).
//!
//! Detects programmer error in pass authorship by diffing a snapshot of
//! the tree against its current state. A change scope is the top-level
//! Script or any Function/Arrow/StaticBlock (`NodeKind::is_change_scope`).

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};

use compiler_error::{Error, ErrorKind, Result};

use crate::arena::Arena;
use crate::ids::NodeId;
use crate::visit::{Descent, Visitor, walk};

/// Monotonic per-change-scope clock. Advances only via `report_change_to`.
pub type ChangeTime = u64;

/// Tracks, per change scope, the number of times it has been reported
/// changed since the tracker was created. `snapshot` reads this value;
/// `check_recorded_changes` compares it against the value recorded at
/// snapshot time.
#[derive(Default)]
pub struct ChangeTracker {
    change_times: HashMap<NodeId, ChangeTime>,
    deleted: HashSet<NodeId>,
}

struct Fingerprint {
    body_hash: u64,
    change_time: ChangeTime,
    child_scopes: HashSet<NodeId>,
}

/// A structural fingerprint of every change scope reachable from a root,
/// taken at a point in time.
pub struct Snapshot {
    scopes: BTreeMap<NodeId, Fingerprint>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn change_time(&self, scope: NodeId) -> ChangeTime {
        *self.change_times.get(&scope).unwrap_or(&0)
    }

    /// Marks the change scope containing `node` as modified since the
    /// snapshot by advancing its `change_time`. Per the invariant in
    /// §4.4, callers must pass the *containing* change scope, not an
    /// ancestor: a parent-scope edit that only moves an intact child
    /// scope does not need a report on the child.
    pub fn report_change_to(&mut self, change_scope: NodeId) {
        *self.change_times.entry(change_scope).or_insert(0) += 1;
        self.deleted.remove(&change_scope);
    }

    /// Marks `fn_node`'s change scope as deleted since the snapshot.
    pub fn report_deletion(&mut self, change_scope: NodeId) {
        self.deleted.insert(change_scope);
    }

    /// Takes a structural fingerprint of every change scope reachable
    /// from `root` at the current change_time.
    pub fn snapshot(&self, arena: &Arena, root: NodeId) -> Result<Snapshot> {
        let mut collector = ScopeCollector {
            tracker: self,
            arena,
            scopes: BTreeMap::new(),
            stack: Vec::new(),
        };
        walk(arena, root, &mut collector)?;
        Ok(Snapshot {
            scopes: collector.scopes,
        })
    }

    /// Walks the current tree and cross-references it with `before`.
    /// Fails with a descriptive, labeled error on the four failure modes
    /// from §4.4.
    pub fn check_recorded_changes(
        &self,
        label: &str,
        arena: &Arena,
        root: NodeId,
        before: &Snapshot,
    ) -> Result<()> {
        let after = self.snapshot(arena, root)?;

        for (scope, before_fp) in &before.scopes {
            match after.scopes.get(scope) {
                None => {
                    if !self.deleted.contains(scope) {
                        return Err(Error::new(
                            ErrorKind::DeletedScopeWasNotReported,
                            format!("[{label}] change scope {scope} vanished without a deletion report"),
                        )
                        .with_operation("change_tracker::check_recorded_changes"));
                    }
                }
                Some(after_fp) => {
                    let structurally_changed = after_fp.body_hash != before_fp.body_hash
                        || after_fp.child_scopes != before_fp.child_scopes;
                    if structurally_changed && after_fp.change_time == before_fp.change_time {
                        return Err(Error::changed_scope_not_marked_as_changed(
                            scope.to_string(),
                        )
                        .with_operation("change_tracker::check_recorded_changes")
                        .with_context("label", label));
                    }
                }
            }
        }

        for scope in after.scopes.keys() {
            if !before.scopes.contains_key(scope) && !self.change_times.contains_key(scope) {
                return Err(Error::new(
                    ErrorKind::NewScopeNotExplicitlyMarkedAsChanged,
                    format!("[{label}] new change scope {scope} was not reported as new"),
                )
                .with_operation("change_tracker::check_recorded_changes"));
            }
        }

        for scope in &self.deleted {
            if before.scopes.contains_key(scope) && after.scopes.contains_key(scope) {
                return Err(Error::new(
                    ErrorKind::ExistingScopeImproperlyMarkedAsDeleted,
                    format!("[{label}] change scope {scope} was reported deleted but still exists"),
                )
                .with_operation("change_tracker::check_recorded_changes"));
            }
        }

        Ok(())
    }
}

struct ScopeCollector<'a> {
    tracker: &'a ChangeTracker,
    arena: &'a Arena,
    scopes: BTreeMap<NodeId, Fingerprint>,
    stack: Vec<NodeId>,
}

impl Visitor for ScopeCollector<'_> {
    fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
        let node = arena.get(id)?;
        if node.kind.is_change_scope() {
            if let Some(&parent_scope) = self.stack.last() {
                self.scopes
                    .entry(parent_scope)
                    .and_modify(|fp| {
                        fp.child_scopes.insert(id);
                    });
            }
            self.stack.push(id);
            self.scopes.insert(
                id,
                Fingerprint {
                    body_hash: structural_hash(self.arena, id)?,
                    change_time: self.tracker.change_time(id),
                    child_scopes: HashSet::new(),
                },
            );
        }
        Ok(Descent::Continue)
    }

    fn leave(&mut self, arena: &Arena, id: NodeId) -> Result<()> {
        if arena.get(id)?.kind.is_change_scope() {
            self.stack.pop();
        }
        Ok(())
    }
}

/// A structural hash of a subtree: kind, children shape, and payload of
/// every ordinary node, ignoring that node's own NodeId so that an
/// unmodified region hashes identically across runs.
///
/// Shallow with respect to nested change scopes: a `Function`/`Arrow`/
/// `StaticBlock` reached below `root` (other than `root` itself) stops
/// descent and is instead hashed by its kind and its own NodeId, which
/// stands in for "this nested scope is still here, unexamined" without
/// folding its contents into the ancestor's hash. Nested scopes are
/// fingerprinted separately by `ScopeCollector` and tracked via
/// `Fingerprint::child_scopes`; folding their bodies into an ancestor's
/// `body_hash` would mean an edit inside a nested function also changes
/// every ancestor scope's hash, forcing a pass to report the change to
/// every enclosing scope instead of just the one that directly contains
/// it (§4.4's "reports to exactly its containing change scope, not to
/// ancestors").
fn structural_hash(arena: &Arena, root: NodeId) -> Result<u64> {
    struct Hashing<'a> {
        arena: &'a Arena,
        root: NodeId,
        hasher: DefaultHasher,
    }

    impl Visitor for Hashing<'_> {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            let node = arena.get(id)?;
            if id != self.root && node.kind.is_change_scope() {
                node.kind.hash(&mut self.hasher);
                id.hash(&mut self.hasher);
                return Ok(Descent::SkipChildren);
            }
            node.kind.hash(&mut self.hasher);
            node.children.len().hash(&mut self.hasher);
            match &node.payload {
                crate::node::Payload::None => 0u8.hash(&mut self.hasher),
                crate::node::Payload::Str(s) => {
                    1u8.hash(&mut self.hasher);
                    s.hash(&mut self.hasher);
                }
                crate::node::Payload::Num(n) => {
                    2u8.hash(&mut self.hasher);
                    n.to_bits().hash(&mut self.hasher);
                }
            }
            Ok(Descent::Continue)
        }
    }

    let mut hashing = Hashing {
        arena,
        root,
        hasher: DefaultHasher::new(),
    };
    walk(arena, root, &mut hashing)?;
    Ok(hashing.hasher.finish())
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            scopes: BTreeMap::new(),
        }
    }
}
