// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Handler registry and interception attribute emission.
//!
//! **DDD Context:** Code Generation
//!
//! The registry lists every wrapper generated for this compilation under
//! its message lookup key, so the façade's runtime path can dispatch
//! messages whose static type was only known at run time. The attribute
//! file declares `InterceptsLocationAttribute` for runtimes that do not
//! ship it.

use super::csharp::{file_prologue, generated_code_attribute, render_name, string_literal, typeof_expr};
use super::document::{Document, INDENT, block, line, lines, nest, text};
use super::handler_wrapper::WrapperRef;
use super::names::hint_name;
use super::{EntryPoint, GeneratedSource, members};
use crate::config::RuntimeNames;
use crate::docvec;
use ecow::{EcoString, eco_format};
use tracing::instrument;

/// Class name of the registry.
pub const REGISTRY_CLASS: &str = "SwitchboardHandlerRegistry";

/// Class name of the interception attribute.
pub const POLYFILL_CLASS: &str = "InterceptsLocationAttribute";

/// Everything the registry file depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryPlan {
    pub namespace: EcoString,
    /// Every wrapper, in any order; rendering sorts them.
    pub wrappers: Vec<WrapperRef>,
    pub runtime: RuntimeNames,
}

/// Renders the registry class.
#[instrument(skip_all, fields(entries = plan.wrappers.len()))]
#[must_use]
pub fn render(plan: &RegistryPlan) -> GeneratedSource {
    let mut wrappers: Vec<&WrapperRef> = plan.wrappers.iter().collect();
    wrappers.sort_by(|a, b| {
        (a.message_type.key(), &a.class_path).cmp(&(b.message_type.key(), &b.class_path))
    });

    let registration = render_name(&plan.runtime.handler_registration);
    let entries: Vec<Document<'static>> = wrappers
        .iter()
        .map(|wrapper| {
            text(eco_format!(
                "new {registration}({}, {}, {}, {}),",
                string_literal(&wrapper.message_type.key()),
                typeof_expr(&wrapper.message_type),
                wrapper.method_path(EntryPoint::Untyped),
                wrapper.is_async
            ))
        })
        .collect();

    let handlers = docvec![
        text(eco_format!(
            "public static global::System.Collections.Generic.IReadOnlyList<{registration}> Handlers {{ get; }} = new {registration}[]"
        )),
        line(),
        "{",
        nest(INDENT, lines(entries)),
        line(),
        "};",
    ];

    let class = block(eco_format!("internal static class {REGISTRY_CLASS}"), members(vec![handlers]));
    let doc = docvec![
        file_prologue(),
        line(),
        block(
            eco_format!("namespace {}", plan.namespace),
            lines(vec![text(generated_code_attribute()), class]),
        ),
        line(),
    ];
    GeneratedSource::new(hint_name(REGISTRY_CLASS), doc.to_pretty_string())
}

/// Renders the `InterceptsLocationAttribute` declaration, supporting both
/// the encoded-token and the path/line/column constructors.
#[must_use]
pub fn render_polyfill() -> GeneratedSource {
    let constructors = vec![
        block(
            "public InterceptsLocationAttribute(int version, string data)",
            lines(vec![text("_ = version;"), text("_ = data;")]),
        ),
        block(
            "public InterceptsLocationAttribute(string filePath, int line, int character)",
            lines(vec![text("_ = filePath;"), text("_ = line;"), text("_ = character;")]),
        ),
    ];
    let class = block(
        "internal sealed class InterceptsLocationAttribute : global::System.Attribute",
        members(constructors),
    );
    let doc = docvec![
        file_prologue(),
        line(),
        block(
            "namespace System.Runtime.CompilerServices",
            lines(vec![
                text("[global::System.AttributeUsage(global::System.AttributeTargets.Method, AllowMultiple = true)]"),
                class,
            ]),
        ),
        line(),
    ];
    GeneratedSource::new(hint_name(POLYFILL_CLASS), doc.to_pretty_string())
}
