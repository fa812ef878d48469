//! The compiler's single state object (data model §3 Ownership / design
//! note "Global mutable state").
//!
//! `CompileCtxt` owns the arena and every side table; passes receive a
//! mutable borrow of it for the duration of their run and release it
//! between passes (spec §5). There is no other shared mutable state.
//! `CompileUnit` holds the per-file view (source text, source-map unit)
//! that a single compile unit contributes to the shared context.

use std::sync::Arc;

use uuid::Uuid;

use crate::annotations::AnnotationTable;
use crate::arena::Arena;
use crate::change_tracker::ChangeTracker;
use crate::colors::ColorTable;
use crate::diagnostics::DiagnosticBus;
use crate::feature_set::FeatureSet;
use crate::ids::NodeId;
use crate::runtime_lib::RuntimeLibInjector;
use crate::sourcemap::SourceMap;

/// `none | module_export_only | all` (spec §6 `property_collapse_level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyCollapseLevel {
    #[default]
    None,
    ModuleExportOnly,
    All,
}

/// The coding-convention "exported name" predicate (spec.md §9): a
/// property name the name graph must treat as externally visible even
/// without an explicit `@export` annotation. Defaults to the
/// leading-underscore convention; callers may swap in a different
/// predicate (e.g. driven by a project's own export list).
#[derive(Clone)]
pub struct ExportedNamePredicate(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl ExportedNamePredicate {
    pub fn new(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn is_exported(&self, name: &str) -> bool {
        (self.0)(name)
    }
}

impl Default for ExportedNamePredicate {
    fn default() -> Self {
        Self::new(|name| name.starts_with('_'))
    }
}

impl std::fmt::Debug for ExportedNamePredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExportedNamePredicate(..)")
    }
}

/// The compiler options the core consumes (spec §6). `compiler-cli`
/// layers a `clap`-derived struct on top and converts it into this one.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub language_in: FeatureSet,
    pub language_out: FeatureSet,
    pub property_collapse_level: PropertyCollapseLevel,
    pub generate_source_map: bool,
    pub accept_pseudo_names: bool,
    pub exported_name: ExportedNamePredicate,
    /// Fixed-point iteration cap applied to every loopable pass group
    /// (spec §4.6 "subject to an outer iteration cap").
    pub max_fixed_point_iterations: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            language_in: FeatureSet::empty(),
            language_out: FeatureSet::empty(),
            property_collapse_level: PropertyCollapseLevel::default(),
            generate_source_map: false,
            accept_pseudo_names: false,
            exported_name: ExportedNamePredicate::default(),
            max_fixed_point_iterations: 1000,
        }
    }
}

impl CompilerOptions {
    pub fn with_property_collapse_level(mut self, level: PropertyCollapseLevel) -> Self {
        self.property_collapse_level = level;
        self
    }

    pub fn with_generate_source_map(mut self, value: bool) -> Self {
        self.generate_source_map = value;
        self
    }

    pub fn with_accept_pseudo_names(mut self, value: bool) -> Self {
        self.accept_pseudo_names = value;
        self
    }

    pub fn with_exported_name_predicate(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.exported_name = ExportedNamePredicate::new(predicate);
        self
    }
}

/// The single state object owning the arena, every side table, the
/// feature set, the diagnostic bus and the change tracker. Passes
/// receive `&mut CompileCtxt`; tests reset by constructing a fresh
/// instance (design note "Global mutable state").
#[derive(Debug)]
pub struct CompileCtxt {
    pub run_id: Uuid,
    pub options: CompilerOptions,
    pub arena: Arena,
    pub source_map: SourceMap,
    pub annotations: AnnotationTable,
    pub colors: ColorTable,
    pub features: FeatureSet,
    pub diagnostics: DiagnosticBus,
    pub changes: ChangeTracker,
    pub runtime_lib: RuntimeLibInjector,
}

impl CompileCtxt {
    pub fn new(options: CompilerOptions) -> Self {
        let features = options.language_in.clone();
        Self {
            run_id: Uuid::new_v4(),
            options,
            arena: Arena::new(),
            source_map: SourceMap::new(),
            annotations: AnnotationTable::new(),
            colors: ColorTable::new(),
            features,
            diagnostics: DiagnosticBus::new(),
            changes: ChangeTracker::new(),
            runtime_lib: RuntimeLibInjector::new(),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.arena.root()
    }
}

/// A lightweight per-file view over a single `SCRIPT`'s subtree. The
/// teacher holds a whole `CompileUnit` struct with a `Deref` back to
/// `CompileCtxt`; this crate only ever needs the script's own root id
/// alongside the shared context, since every side table is already keyed
/// by `NodeId` rather than by file.
#[derive(Debug, Clone, Copy)]
pub struct CompileUnit<'a> {
    pub cc: &'a CompileCtxt,
    pub script: NodeId,
}

impl<'a> CompileUnit<'a> {
    pub fn new(cc: &'a CompileCtxt, script: NodeId) -> Self {
        Self { cc, script }
    }
}

impl<'a> std::ops::Deref for CompileUnit<'a> {
    type Target = CompileCtxt;

    fn deref(&self) -> &Self::Target {
        self.cc
    }
}
