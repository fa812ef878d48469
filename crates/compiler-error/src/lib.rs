//! # compiler-error
//!
//! Unified error handling for the optic compiler core's tier-1 programmatic
//! faults - following OpenDAL's error handling practices. Tier-2 input
//! diagnostics (malformed program, unsafe transform) live in
//! `compiler_core::diagnostics` instead; this crate is exclusively for
//! faults that abort compilation (arena misuse, verifier failures, pass
//! bugs).
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., DanglingNodeId, ChangedScopeNotMarkedAsChanged)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use compiler_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::DanglingNodeId, "node was freed")
//!         .with_operation("arena::get")
//!         .with_context("node_id", "42"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, compiler_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using this crate's `Error`.
pub type Result<T> = std::result::Result<T, Error>;
