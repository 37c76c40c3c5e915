// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Switchboard generator core.
//!
//! This crate turns a snapshot of a program's symbols into the source of a
//! reflection-free in-process mediator:
//! - Handler and middleware discovery by convention and marker
//! - Message matching across type hierarchies, generics and assemblies
//! - Middleware pipeline composition
//! - Call-site interception and wrapper, publisher and registry emission
//!
//! The build host owns the compiler; it hands the core a [`Compilation`]
//! and adds the returned sources and diagnostics to the build. The core
//! never fails a build by itself: user mistakes come back as
//! [`Diagnostic`]s and only cancellation aborts a pass.
//!
//! ```
//! use switchboard_core::{CancellationToken, Compilation, Generator, GeneratorConfig};
//!
//! let compilation = Compilation::from_json(r#"{ "assembly": { "name": "Demo.App" } }"#).unwrap();
//! let mut generator = Generator::new(GeneratorConfig::default());
//! let output = generator.run(&compilation, &CancellationToken::new()).unwrap();
//! assert!(output.sources.is_empty());
//! ```

pub mod analysis;
pub mod cache;
pub mod cancellation;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod generator;
pub mod symbols;

#[cfg(test)]
mod test_helpers;

pub use cancellation::{CancellationToken, Cancelled};
pub use codegen::GeneratedSource;
pub use config::{ConfigError, GeneratorConfig, find_config, load_config};
pub use diagnostics::{Diagnostic, DiagnosticId, ReportedDiagnostic, Severity};
pub use generator::{GenerateError, Generator, GeneratorOutput, generate};
pub use symbols::Compilation;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::analysis::{CallSiteRecord, HandlerRecord, MiddlewareRecord, PipelineModel, TypeShape};
    pub use crate::symbols::{Compilation, SourceLocation, Span, TypeRef};
    pub use crate::{CancellationToken, Diagnostic, Generator, GeneratorConfig, GeneratorOutput};
}
