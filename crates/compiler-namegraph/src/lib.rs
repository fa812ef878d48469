//! `compiler-namegraph`: the global name graph (C8, spec §4.7), the name
//! collapser (C9, spec §4.8), and the prototype-method devirtualizer
//! (C10, spec §4.9). These three are the heavy, whole-program passes
//! that depend on `compiler-core`'s arena and change tracker; each
//! builds its own qualified-name scan rather than going through
//! `compiler-resolver`'s lexical scope analysis (C8's aliasing rules
//! operate on dotted property chains, not lexical bindings).

pub mod collapse;
pub mod devirtualize;
pub mod namegraph;

pub use collapse::{collapse_all, NameCollapsePass};
pub use devirtualize::{devirtualize_all, DevirtualizePass};
pub use namegraph::{build, NameGraph, QNameEntity};
