//! Newtype identifiers used throughout the compiler core.
//!
//! Every non-arena component addresses the tree by id, never by reference
//! (see the data model's Ownership rule: "the arena exclusively owns every
//! Node"). Each id type wraps a `u32` and derives a monotonic counter the
//! same way the rest of the compiler names things.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! declare_id {
    ($name:ident, $counter:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// The sentinel used for "no id" in contexts that cannot use `Option`
            /// (e.g. a packed field). Prefer `Option<$name>` where possible.
            pub const NONE: $name = $name(u32::MAX);

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn is_none(self) -> bool {
                self == Self::NONE
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }

        static $counter: AtomicU32 = AtomicU32::new(0);

        impl $name {
            /// Allocate the next id in this process. Arenas that back a fresh
            /// `CompileCtxt` should prefer their own length-based ids; this
            /// counter exists for components (Scope, Binding, QName) that are
            /// not stored in a single contiguous `Vec` indexed from zero.
            pub fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            /// Test-only: reset the global counter so successive tests do not
            /// observe ids seeded by earlier tests.
            #[cfg(test)]
            pub fn reset_counter() {
                $counter.store(0, Ordering::Relaxed);
            }
        }
    };
}

declare_id!(NodeId, NODE_ID_COUNTER, "Identifies a Node in the C1 arena.");
declare_id!(ScopeId, SCOPE_ID_COUNTER, "Identifies a Scope produced by C5.");
declare_id!(
    BindingId,
    BINDING_ID_COUNTER,
    "Identifies a Binding produced by C5."
);
declare_id!(
    QNameId,
    QNAME_ID_COUNTER,
    "Identifies a QName entity in the C8 name graph."
);
