//! Pass manager / phase optimizer (C7, spec §4.6).
//!
//! A data-driven list of named passes, each of which is snapshotted
//! (C6), run, verified, and folded into the feature set (C11) before
//! the next pass runs.

use std::time::Instant;

use compiler_error::{Error, ErrorKind, Result};

use crate::context::CompileCtxt;
use crate::feature_set::FeatureSet;

/// A named transformation. `consumes`/`produces`/`removes` describe this
/// pass's effect on the feature set (C11); `run` performs the actual
/// mutation and returns whether it reported any structural change, which
/// the fixed-point loop uses to detect quiescence.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn consumes(&self) -> FeatureSet {
        FeatureSet::empty()
    }

    fn produces(&self) -> FeatureSet {
        FeatureSet::empty()
    }

    fn removes(&self) -> FeatureSet {
        FeatureSet::empty()
    }

    /// Runs the pass over the whole tree rooted at `cc.arena.root()`.
    /// Returns `Ok(true)` if the pass reported at least one structural
    /// change to the change tracker.
    fn run(&mut self, cc: &mut CompileCtxt) -> Result<bool>;
}

enum PassGroup {
    OneTime(Box<dyn Pass>),
    /// A fixed order of passes re-run until a full cycle reports no
    /// change, subject to the `usize` iteration cap.
    Loopable(Vec<Box<dyn Pass>>, usize),
}

/// Runs named passes in order, loops a fixed-point group until
/// quiescent, dispatches change notifications (§4.6/§5).
#[derive(Default)]
pub struct PassManager {
    groups: Vec<PassGroup>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_one_time(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.groups.push(PassGroup::OneTime(pass));
        self
    }

    pub fn add_loopable_group(&mut self, passes: Vec<Box<dyn Pass>>, iteration_cap: usize) -> &mut Self {
        self.groups.push(PassGroup::Loopable(passes, iteration_cap));
        self
    }

    /// Drives every group to completion. Aborts with the offending pass
    /// named on the first verification failure or feature-set
    /// precondition violation (spec §4.6/§7).
    pub fn run_all(&mut self, cc: &mut CompileCtxt) -> Result<()> {
        for group in &mut self.groups {
            match group {
                PassGroup::OneTime(pass) => {
                    run_one(pass.as_mut(), cc)?;
                }
                PassGroup::Loopable(passes, cap) => {
                    let mut iterations = 0usize;
                    loop {
                        if iterations >= *cap {
                            return Err(Error::new(
                                ErrorKind::FixedPointIterationCapExceeded,
                                format!(
                                    "loopable pass group did not reach a fixed point within {cap} iterations"
                                ),
                            )
                            .with_operation("pass_manager::run_all"));
                        }
                        let mut any_change = false;
                        for pass in passes.iter_mut() {
                            any_change |= run_one(pass.as_mut(), cc)?;
                        }
                        iterations += 1;
                        if !any_change {
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn run_one(pass: &mut dyn Pass, cc: &mut CompileCtxt) -> Result<bool> {
    let root = cc.arena.root().ok_or_else(|| {
        Error::new(ErrorKind::ArenaInvariantViolation, "arena has no root to run passes over")
            .with_operation("pass_manager::run_one")
    })?;

    let consumed = pass.consumes();
    if !cc.features.is_superset_of(&consumed) {
        return Err(Error::new(
            ErrorKind::FeatureSetPrecondition,
            format!(
                "pass '{}' consumes features not present in the current feature set",
                pass.name()
            ),
        )
        .with_operation("pass_manager::run_one")
        .with_context("pass", pass.name()));
    }

    let snapshot = cc.changes.snapshot(&cc.arena, root)?;
    let start = Instant::now();
    let changed = pass.run(cc)?;
    cc.changes
        .check_recorded_changes(pass.name(), &cc.arena, root, &snapshot)?;
    cc.features.apply(&pass.produces(), &pass.removes());

    tracing::info!(
        pass = pass.name(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        changed,
        "pass completed"
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_set::Feature;
    use crate::node::{Node, NodeKind};

    fn fresh_ctxt() -> CompileCtxt {
        let mut cc = CompileCtxt::new(Default::default());
        let script = cc.arena.alloc(Node::new(NodeKind::Script)).unwrap();
        cc.arena.set_root(script);
        cc
    }

    struct NoOpPass;
    impl Pass for NoOpPass {
        fn name(&self) -> &'static str {
            "no_op"
        }
        fn run(&mut self, _cc: &mut CompileCtxt) -> Result<bool> {
            Ok(false)
        }
    }

    /// Adds one literal child to the script the first two times it runs,
    /// then goes quiet - exercises the fixed-point loop.
    struct AddUntilQuiet {
        remaining: usize,
    }
    impl Pass for AddUntilQuiet {
        fn name(&self) -> &'static str {
            "add_until_quiet"
        }
        fn run(&mut self, cc: &mut CompileCtxt) -> Result<bool> {
            if self.remaining == 0 {
                return Ok(false);
            }
            self.remaining -= 1;
            let root = cc.arena.root().unwrap();
            let lit = cc.arena.alloc(Node::new(NodeKind::NumberLit))?;
            cc.arena.add_child_to_back(root, lit)?;
            cc.changes.report_change_to(root);
            Ok(true)
        }
    }

    struct BuggyPass;
    impl Pass for BuggyPass {
        fn name(&self) -> &'static str {
            "buggy"
        }
        fn run(&mut self, cc: &mut CompileCtxt) -> Result<bool> {
            let root = cc.arena.root().unwrap();
            let lit = cc.arena.alloc(Node::new(NodeKind::NumberLit))?;
            cc.arena.add_child_to_back(root, lit)?;
            // Forgot to report the change.
            Ok(false)
        }
    }

    struct RequiresClasses;
    impl Pass for RequiresClasses {
        fn name(&self) -> &'static str {
            "requires_classes"
        }
        fn consumes(&self) -> FeatureSet {
            FeatureSet::of([Feature::Classes])
        }
        fn run(&mut self, _cc: &mut CompileCtxt) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn one_time_no_op_pass_leaves_change_times_untouched() {
        let mut cc = fresh_ctxt();
        let mut pm = PassManager::new();
        pm.add_one_time(Box::new(NoOpPass));
        pm.run_all(&mut cc).unwrap();
    }

    #[test]
    fn loopable_group_runs_until_quiescent() {
        let mut cc = fresh_ctxt();
        let mut pm = PassManager::new();
        pm.add_loopable_group(vec![Box::new(AddUntilQuiet { remaining: 2 })], 10);
        pm.run_all(&mut cc).unwrap();
        let root = cc.arena.root().unwrap();
        assert_eq!(cc.arena.get(root).unwrap().children.len(), 2);
    }

    #[test]
    fn loopable_group_exceeding_cap_is_an_error() {
        let mut cc = fresh_ctxt();
        let mut pm = PassManager::new();
        // Always reports a change -> never quiesces.
        pm.add_loopable_group(vec![Box::new(AddUntilQuiet { remaining: usize::MAX })], 3);
        let err = pm.run_all(&mut cc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FixedPointIterationCapExceeded);
    }

    #[test]
    fn unreported_mutation_fails_verification_with_pass_named() {
        let mut cc = fresh_ctxt();
        let mut pm = PassManager::new();
        pm.add_one_time(Box::new(BuggyPass));
        let err = pm.run_all(&mut cc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChangedScopeNotMarkedAsChanged);
    }

    #[test]
    fn pass_with_unmet_feature_precondition_is_rejected() {
        let mut cc = fresh_ctxt();
        let mut pm = PassManager::new();
        pm.add_one_time(Box::new(RequiresClasses));
        let err = pm.run_all(&mut cc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureSetPrecondition);
    }

    #[test]
    fn pass_with_met_feature_precondition_runs() {
        let mut cc = fresh_ctxt();
        cc.features.insert(Feature::Classes);
        let mut pm = PassManager::new();
        pm.add_one_time(Box::new(RequiresClasses));
        pm.run_all(&mut cc).unwrap();
    }
}
