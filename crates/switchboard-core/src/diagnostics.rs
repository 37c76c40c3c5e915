// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Build diagnostics reported by the generator.
//!
//! **DDD Context:** Diagnostics
//!
//! User mistakes never abort a pass: every problem becomes a [`Diagnostic`]
//! carrying a stable id, and the affected wrapper or interceptor is simply
//! omitted so the call site falls back to the façade's runtime path.
//! [`ReportedDiagnostic`] renders one through miette for hosts that print.

use crate::symbols::SourceLocation;
use ecow::EcoString;
use miette::{LabeledSpan, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the build.
    Error,
    Warning,
    Info,
    /// Recorded but not shown.
    Hidden,
}

/// Stable diagnostic identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticId {
    #[serde(rename = "SWB0001")]
    UnmatchedCallSite,
    #[serde(rename = "SWB0002")]
    AmbiguousHandler,
    #[serde(rename = "SWB0003")]
    DuplicateHandlerMethod,
    #[serde(rename = "SWB0004")]
    DuplicateTupleElement,
    #[serde(rename = "SWB0005")]
    AsyncTupleElement,
    #[serde(rename = "SWB0006")]
    UnknownMiddleware,
    #[serde(rename = "SWB0007")]
    InapplicableMiddleware,
    #[serde(rename = "SWB0008")]
    DeadMiddleware,
    #[serde(rename = "SWB0009")]
    NonPublicCrossAssembly,
    #[serde(rename = "SWB0010")]
    ResponseMismatch,
    #[serde(rename = "SWB0011")]
    SyncOverAsync,
}

impl DiagnosticId {
    pub const ALL: [DiagnosticId; 11] = [
        DiagnosticId::UnmatchedCallSite,
        DiagnosticId::AmbiguousHandler,
        DiagnosticId::DuplicateHandlerMethod,
        DiagnosticId::DuplicateTupleElement,
        DiagnosticId::AsyncTupleElement,
        DiagnosticId::UnknownMiddleware,
        DiagnosticId::InapplicableMiddleware,
        DiagnosticId::DeadMiddleware,
        DiagnosticId::NonPublicCrossAssembly,
        DiagnosticId::ResponseMismatch,
        DiagnosticId::SyncOverAsync,
    ];

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticId::UnmatchedCallSite => "SWB0001",
            DiagnosticId::AmbiguousHandler => "SWB0002",
            DiagnosticId::DuplicateHandlerMethod => "SWB0003",
            DiagnosticId::DuplicateTupleElement => "SWB0004",
            DiagnosticId::AsyncTupleElement => "SWB0005",
            DiagnosticId::UnknownMiddleware => "SWB0006",
            DiagnosticId::InapplicableMiddleware => "SWB0007",
            DiagnosticId::DeadMiddleware => "SWB0008",
            DiagnosticId::NonPublicCrossAssembly => "SWB0009",
            DiagnosticId::ResponseMismatch => "SWB0010",
            DiagnosticId::SyncOverAsync => "SWB0011",
        }
    }

    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticId::AmbiguousHandler
            | DiagnosticId::DuplicateHandlerMethod
            | DiagnosticId::DuplicateTupleElement
            | DiagnosticId::AsyncTupleElement
            | DiagnosticId::UnknownMiddleware
            | DiagnosticId::InapplicableMiddleware => Severity::Error,
            DiagnosticId::UnmatchedCallSite
            | DiagnosticId::DeadMiddleware
            | DiagnosticId::NonPublicCrossAssembly
            | DiagnosticId::ResponseMismatch
            | DiagnosticId::SyncOverAsync => Severity::Warning,
        }
    }

    /// Short title, suitable for a rule listing.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            DiagnosticId::UnmatchedCallSite => "No handler for message",
            DiagnosticId::AmbiguousHandler => "Ambiguous handlers for message",
            DiagnosticId::DuplicateHandlerMethod => "Handler type handles a message twice",
            DiagnosticId::DuplicateTupleElement => "Tuple return repeats an element type",
            DiagnosticId::AsyncTupleElement => "Tuple primary element is awaitable",
            DiagnosticId::UnknownMiddleware => "Unknown middleware",
            DiagnosticId::InapplicableMiddleware => "Middleware does not apply to message",
            DiagnosticId::DeadMiddleware => "Middleware never applies",
            DiagnosticId::NonPublicCrossAssembly => "Cross-assembly handler is not public",
            DiagnosticId::ResponseMismatch => "Response type does not match handler",
            DiagnosticId::SyncOverAsync => "Synchronous call to asynchronous handler",
        }
    }
}

impl fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A diagnostic produced by a generation pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    pub severity: Severity,
    pub message: EcoString,
    /// Primary location; `None` for metadata-only symbols.
    pub location: Option<SourceLocation>,
    pub hint: Option<EcoString>,
    /// Other declarations involved (e.g. competing handlers).
    pub related: Vec<SourceLocation>,
}

impl Diagnostic {
    /// Creates a diagnostic with the id's default severity.
    #[must_use]
    pub fn new(
        id: DiagnosticId,
        message: impl Into<EcoString>,
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            id,
            severity: id.default_severity(),
            message: message.into(),
            location,
            hint: None,
            related: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<EcoString>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_related(mut self, related: impl IntoIterator<Item = SourceLocation>) -> Self {
        self.related.extend(related);
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Sort key giving a deterministic report order.
    pub(crate) fn sort_key(&self) -> (Option<&SourceLocation>, DiagnosticId, &str) {
        (self.location.as_ref(), self.id, self.message.as_str())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hidden => "hidden",
        };
        match &self.location {
            Some(location) => write!(f, "{location}: {level} {}: {}", self.id, self.message),
            None => write!(f, "{level} {}: {}", self.id, self.message),
        }
    }
}

/// A diagnostic with source context, rendered by miette.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ReportedDiagnostic {
    pub id: DiagnosticId,
    pub severity: Severity,
    pub message: String,
    pub src: miette::NamedSource<String>,
    pub span: Option<SourceSpan>,
    pub label: String,
    pub hint: Option<String>,
}

impl ReportedDiagnostic {
    /// Attaches source text to a generator diagnostic.
    ///
    /// `source` is the text of the file named by the diagnostic location.
    #[must_use]
    pub fn from_diagnostic(diagnostic: &Diagnostic, source: &str) -> Self {
        let label = match diagnostic.severity {
            Severity::Error => "error here",
            Severity::Warning => "warning here",
            Severity::Info | Severity::Hidden => "here",
        };
        let name = diagnostic
            .location
            .as_ref()
            .map_or_else(|| "<metadata>".to_string(), |l| l.path.to_string());
        let span = diagnostic
            .location
            .as_ref()
            .map(|l| SourceSpan::from(l.span))
            .filter(|s| s.offset() + s.len() <= source.len());

        Self {
            id: diagnostic.id,
            severity: diagnostic.severity,
            message: diagnostic.message.to_string(),
            src: miette::NamedSource::new(name, source.to_string()),
            span,
            label: label.to_string(),
            hint: diagnostic.hint.as_ref().map(ToString::to_string),
        }
    }
}

impl miette::Diagnostic for ReportedDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.id.code()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Info | Severity::Hidden => miette::Severity::Advice,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.hint
            .as_ref()
            .map(|hint| Box::new(hint) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.span.map(|span| {
            Box::new(std::iter::once(LabeledSpan::new_with_span(
                Some(self.label.clone()),
                span,
            ))) as Box<dyn Iterator<Item = LabeledSpan>>
        })
    }
}
