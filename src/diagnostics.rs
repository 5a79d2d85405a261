//! Data-quality diagnostics.
//!
//! Nothing in the load phase is fatal: malformed stubs, bad docblock types
//! and inheritance conflicts all degrade the affected symbol and leave a
//! [`Diagnostic`] behind.  The diagnostics are stored on the built database
//! so corpus maintainers can inspect them, and each one is also emitted as
//! a `tracing` event when it is recorded.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Malformed PHP syntax; the enclosing declaration was skipped.
    ParseError,
    /// Malformed docblock tag or type; the type degraded to `mixed`.
    AnnotationError,
    /// Generic argument count mismatch; degraded to the bare named type.
    ArityError,
    /// Same member inherited from unrelated interfaces with incompatible
    /// declarations.
    AmbiguousMember,
    /// A symbol declared more than once; one declaration was preferred.
    Redeclaration,
    /// An `extends`/`implements`/`use` target that is not in the bundle.
    UnknownAncestor,
    /// A cycle in the class hierarchy; the closing edge was ignored.
    InheritanceCycle,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::ParseError => Severity::Error,
            DiagnosticKind::AnnotationError
            | DiagnosticKind::ArityError
            | DiagnosticKind::AmbiguousMember
            | DiagnosticKind::InheritanceCycle => Severity::Warning,
            DiagnosticKind::Redeclaration | DiagnosticKind::UnknownAncestor => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Stub file path, when the problem has a source location.
    pub file: Option<String>,
    pub offset: Option<u32>,
    /// Fully-qualified name of the affected symbol.
    pub symbol: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: kind.severity(),
            file: None,
            offset: None,
            symbol: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, file: impl Into<String>, offset: u32) -> Self {
        self.file = Some(file.into());
        self.offset = Some(offset);
        self
    }

    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(file) = &self.file {
            write!(f, " {file}")?;
            if let Some(offset) = self.offset {
                write!(f, "@{offset}")?;
            }
        }
        if let Some(symbol) = &self.symbol {
            write!(f, " [{symbol}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// An append-only diagnostics channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        emit(&diagnostic);
        self.items.push(diagnostic);
    }

    /// Append diagnostics that were already emitted elsewhere (e.g. by a
    /// worker thread during parsing).
    pub(crate) fn absorb(&mut self, diagnostics: Vec<Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }
}

/// Emit a diagnostic as a `tracing` event at its severity.
pub(crate) fn emit(d: &Diagnostic) {
    let file = d.file.as_deref().unwrap_or("");
    let symbol = d.symbol.as_deref().unwrap_or("");
    match d.severity {
        Severity::Error => {
            tracing::error!(kind = ?d.kind, file, offset = d.offset, symbol, "{}", d.message)
        }
        Severity::Warning => {
            tracing::warn!(kind = ?d.kind, file, offset = d.offset, symbol, "{}", d.message)
        }
        Severity::Info => {
            tracing::info!(kind = ?d.kind, file, offset = d.offset, symbol, "{}", d.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_kind() {
        let d = Diagnostic::new(DiagnosticKind::ArityError, "x");
        assert_eq!(d.severity, Severity::Warning);
        let d = Diagnostic::new(DiagnosticKind::ParseError, "x");
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn display_includes_location_and_symbol() {
        let d = Diagnostic::new(DiagnosticKind::AnnotationError, "bad type")
            .at("a.php", 12)
            .for_symbol("foo");
        assert_eq!(d.to_string(), "AnnotationError a.php@12 [foo]: bad type");
    }
}
