//! Diagnostic bus (C12, spec §4 table / §6 / §7).
//!
//! An append-only stream of typed diagnostics with severities, consumed by
//! the outer collaborator. Distinct from `compiler_error::Error` (tier-1
//! programmatic faults): a diagnostic never aborts the call chain, it is
//! just recorded here for later reporting.

use strum_macros::{Display, EnumString};

use crate::sourcemap::SourceRef;

/// The closed set of diagnostic codes the core emits, per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[non_exhaustive]
pub enum DiagnosticCode {
    NamespaceRedefined,
    UnsafeNamespace,
    UnsafeThis,
    UselessCode,
    MalformedRegexp,
    InvalidDynamicExtends,
    UntranspilableFeaturePresent,
    InstantiateAbstractClass,
    ChangedScopeNotMarkedAsChanged,
    NewScopeNotExplicitlyMarkedAsChanged,
    DeletedScopeWasNotReported,
    ExistingScopeImproperlyMarkedAsDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single diagnostic: a code, a severity, the source location it refers
/// to (if any - synthetic nodes may have none), and a formatted argument
/// list the collaborator's diagnostic formatter interpolates into the
/// code's human-readable template.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub source_ref: Option<SourceRef>,
    pub args: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, severity: Severity) -> Self {
        Self {
            code,
            severity,
            source_ref: None,
            args: Vec::new(),
        }
    }

    pub fn at(mut self, source_ref: SourceRef) -> Self {
        self.source_ref = Some(source_ref);
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Append-only stream of diagnostics. Passes append to this; nothing ever
/// removes an entry mid-compilation.
#[derive(Debug, Default)]
pub struct DiagnosticBus {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(code = %diagnostic.code, severity = %diagnostic.severity, "diagnostic reported");
        self.diagnostics.push(diagnostic);
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Per spec §7: "compilation proceeds to completion unless any
    /// error-severity diagnostic was emitted, in which case the final
    /// artifact is not considered valid output".
    pub fn compilation_has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bus_has_no_errors() {
        let bus = DiagnosticBus::new();
        assert!(!bus.compilation_has_errors());
    }

    #[test]
    fn warning_does_not_invalidate_output() {
        let mut bus = DiagnosticBus::new();
        bus.report(Diagnostic::new(
            DiagnosticCode::UnsafeNamespace,
            Severity::Warning,
        ));
        assert!(!bus.compilation_has_errors());
        assert_eq!(bus.count(Severity::Warning), 1);
    }

    #[test]
    fn error_severity_invalidates_output() {
        let mut bus = DiagnosticBus::new();
        bus.report(Diagnostic::new(
            DiagnosticCode::ChangedScopeNotMarkedAsChanged,
            Severity::Error,
        ));
        assert!(bus.compilation_has_errors());
    }

    #[test]
    fn args_and_source_ref_round_trip() {
        let diag = Diagnostic::new(DiagnosticCode::UnsafeThis, Severity::Warning)
            .with_arg("foo")
            .with_arg("T");
        assert_eq!(diag.args, vec!["foo".to_string(), "T".to_string()]);
        assert!(diag.source_ref.is_none());
    }
}
