// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! C# spelling of types, literals and the shared file prologue.
//!
//! **DDD Context:** Code Generation
//!
//! Generated code must compile regardless of the `using` directives or
//! type names in the user's project, so every type is written fully
//! qualified and rooted at `global::`.

use super::EmitNames;
use super::document::{Document, line};
use crate::docvec;
use crate::symbols::{TypeRef, well_known};
use ecow::{EcoString, eco_format};

/// `global::`-rooted spelling of `ty`.
#[must_use]
pub fn render_type(ty: &TypeRef) -> EcoString {
    match ty.canonical() {
        TypeRef::Named { name, args, .. } => {
            if let Some(keyword) = well_known::keyword_for(&name) {
                return keyword.into();
            }
            if args.is_empty() {
                return eco_format!("global::{name}");
            }
            let args: Vec<EcoString> = args.iter().map(render_type).collect();
            eco_format!("global::{name}<{}>", args.join(", "))
        }
        TypeRef::Nullable { inner } => eco_format!("{}?", render_type(&inner)),
        TypeRef::Tuple { elements } => {
            let parts: Vec<EcoString> = elements
                .iter()
                .map(|e| match &e.name {
                    Some(name) => eco_format!("{} {name}", render_type(&e.ty)),
                    None => render_type(&e.ty),
                })
                .collect();
            eco_format!("({})", parts.join(", "))
        }
        TypeRef::TypeParameter { name, .. } => name,
        TypeRef::Array { element } => eco_format!("{}[]", render_type(&element)),
        TypeRef::Error => "object".into(),
    }
}

/// `global::`-rooted spelling of a type name without arguments.
#[must_use]
pub fn render_name(full_name: &str) -> EcoString {
    render_type(&TypeRef::named(full_name))
}

/// `typeof(...)` operand: nullable reference annotations are not allowed there.
#[must_use]
pub fn typeof_expr(ty: &TypeRef) -> EcoString {
    let canonical = ty.canonical();
    let operand = if canonical.is_nullable() && !canonical.is_value_type() {
        canonical.non_nullable().clone()
    } else {
        canonical
    };
    eco_format!("typeof({})", render_type(&operand))
}

/// A regular string literal.
#[must_use]
pub fn string_literal(value: &str) -> EcoString {
    let mut out = EcoString::from("\"");
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// `ValueTask` or `ValueTask<T>` for an optional result.
#[must_use]
pub fn value_task_of(result: Option<&TypeRef>) -> TypeRef {
    match result {
        Some(ty) => TypeRef::generic_value(well_known::VALUE_TASK, vec![ty.clone()]),
        None => TypeRef::value(well_known::VALUE_TASK),
    }
}

/// `T` or `void` for an optional result.
#[must_use]
pub fn sync_result(result: Option<&TypeRef>) -> TypeRef {
    result.cloned().unwrap_or_else(TypeRef::void)
}

/// Appends `.ConfigureAwait(false)` and awaits.
#[must_use]
pub fn awaited(expression: &str) -> EcoString {
    eco_format!("await {expression}.ConfigureAwait(false)")
}

/// Resolves a required service from `provider`.
#[must_use]
pub fn required_service(names: &EmitNames, ty: &TypeRef, provider: &str) -> EcoString {
    eco_format!(
        "{}.GetRequiredService<{}>({provider})",
        render_name(&names.required_service_extensions),
        render_type(ty.non_nullable())
    )
}

/// Resolves an optional service from `provider`, yielding `null` when absent.
#[must_use]
pub fn optional_service(ty: &TypeRef, provider: &str) -> EcoString {
    let nullable = if ty.is_nullable() {
        ty.clone()
    } else {
        ty.clone().nullable()
    };
    eco_format!(
        "({}){provider}.GetService({})",
        render_type(&nullable),
        typeof_expr(ty)
    )
}

/// Auto-generated marker, nullable context and the warnings generated code
/// may legitimately trigger.
#[must_use]
pub fn file_prologue<'a>() -> Document<'a> {
    docvec![
        "// <auto-generated/>",
        line(),
        "#nullable enable",
        line(),
        "#pragma warning disable CS1998",
        line(),
    ]
}

/// `[GeneratedCode]` attribute placed on every generated type.
#[must_use]
pub fn generated_code_attribute() -> EcoString {
    eco_format!(
        "[global::System.CodeDom.Compiler.GeneratedCode({}, {})]",
        string_literal("Switchboard"),
        string_literal(env!("CARGO_PKG_VERSION"))
    )
}
