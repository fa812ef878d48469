//! Error kinds for optic compiler-core operations.

use strum_macros::{Display, IntoStaticStr};

/// The kind of programmatic fault that occurred.
///
/// These are tier-1 faults per the error-handling design: pass bugs, arena
/// misuse, and invariant breaks. They are never recoverable and are never
/// appended to the diagnostic bus (tier 2) — a fault aborts the call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Feature or operation not yet implemented
    NotImplemented,

    // =========================================================================
    // Arena errors (C1)
    // =========================================================================
    /// Addressed a NodeId that has been freed or was never allocated
    DanglingNodeId,

    /// Attempted to insert/splice a Node that already has a parent
    NodeAlreadyParented,

    /// Parent/child link invariant violated (invariants 1-3 of the data model)
    ArenaInvariantViolation,

    /// A pass attempted to free a Node, which only the end of compilation may do
    IllegalFree,

    // =========================================================================
    // Change tracker errors (C6)
    // =========================================================================
    /// A change scope's body hash differs from its snapshot but its
    /// change_time did not advance
    ChangedScopeNotMarkedAsChanged,

    /// A change scope exists now that was not in the snapshot and was not
    /// reported as new
    NewScopeNotExplicitlyMarkedAsChanged,

    /// A scope in the snapshot is no longer reachable and no deletion was
    /// reported
    DeletedScopeWasNotReported,

    /// A scope was reported deleted but is still reachable
    ExistingScopeImproperlyMarkedAsDeleted,

    // =========================================================================
    // Pass manager errors (C7)
    // =========================================================================
    /// A pass declared a consumed feature not present in the current
    /// feature set
    FeatureSetPrecondition,

    /// The loopable pass group exceeded its fixed-point iteration cap
    FixedPointIterationCapExceeded,

    // =========================================================================
    // Resolver errors (C5)
    // =========================================================================
    /// Scope lookup failed for a binding id that should exist
    BindingNotFound,

    /// Scope stack underflow (popped with no scope pushed)
    ScopeStackUnderflow,

    // =========================================================================
    // Name graph errors (C8-C10)
    // =========================================================================
    /// A qualified name was not found in the name graph
    QNameNotFound,

    /// An internal invariant of the collapse/devirtualize ordering discipline
    /// was violated
    RewriteOrderingViolation,

    // =========================================================================
    // IO / surface-IR errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// The surface-IR document could not be parsed into a Node tree
    SurfaceIrInvalid,

    // =========================================================================
    // Validation errors
    // =========================================================================
    /// Invalid argument passed to function
    InvalidArgument,

    /// Assertion failed
    AssertionFailed,

    /// Invariant violation
    InvariantViolation,

    /// Operation timed out
    Timeout,

    /// Resource exhausted
    ResourceExhausted,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::ResourceExhausted | ErrorKind::IoFailed
        )
    }
}
