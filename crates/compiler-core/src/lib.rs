//! `compiler-core`: the Node/NodeId arena (C1), source map and
//! annotation/color side tables (C2-C4), change tracker (C6), pass
//! manager and feature-set tracker (C7/C11), diagnostic bus (C12),
//! runtime-library injector (C13), and the `CompileCtxt` state object
//! that owns all of the above.

pub mod annotations;
pub mod arena;
pub mod change_tracker;
pub mod colors;
pub mod context;
pub mod diagnostics;
pub mod feature_set;
pub mod ids;
pub mod interner;
pub mod ir_builder;
pub mod node;
pub mod pass_manager;
pub mod runtime_lib;
pub mod sourcemap;
pub mod visit;

pub use arena::Arena;
pub use change_tracker::{ChangeTracker, Snapshot};
pub use context::{CompileCtxt, CompileUnit, CompilerOptions, PropertyCollapseLevel};
pub use diagnostics::{Diagnostic, DiagnosticBus, DiagnosticCode, Severity};
pub use feature_set::{Feature, FeatureSet};
pub use ids::{BindingId, NodeId, QNameId, ScopeId};
pub use node::{Node, NodeBits, NodeKind, Payload};
pub use pass_manager::{Pass, PassManager};
pub use runtime_lib::{HelperTag, RuntimeLibInjector};

pub use compiler_error::{Error, ErrorKind, Result};
