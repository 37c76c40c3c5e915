// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Names of generated types, files and members.
//!
//! **DDD Context:** Code Generation
//!
//! Every name is a pure function of the model, so two runs over the same
//! compilation name everything identically and a referencing assembly can
//! compute the name of a wrapper generated in a referenced module.

use crate::symbols::{LocationFingerprint, TypeRef, hex_prefix, simple_name};
use camino::Utf8Path;
use ecow::{EcoString, eco_format};
use sha2::{Digest, Sha256};

/// Replaces every character that cannot appear in an identifier.
#[must_use]
pub fn sanitize_identifier(raw: &str) -> EcoString {
    let mut out: String = raw
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out.into()
}

/// A readable identifier fragment for a type: simple names joined by `_`.
///
/// `Demo.Envelope<Demo.Ping>` becomes `Envelope_Ping`.
#[must_use]
pub fn type_identifier(ty: &TypeRef) -> EcoString {
    match ty.canonical() {
        TypeRef::Named { name, args, .. } => {
            let mut out = sanitize_identifier(simple_name(&name));
            for arg in &args {
                out.push('_');
                out.push_str(&type_identifier(arg));
            }
            out
        }
        TypeRef::Nullable { inner } => type_identifier(&inner),
        TypeRef::Tuple { elements } => {
            let parts: Vec<EcoString> = elements.iter().map(|e| type_identifier(&e.ty)).collect();
            eco_format!("Tuple_{}", parts.join("_"))
        }
        TypeRef::TypeParameter { name, .. } => sanitize_identifier(&name),
        TypeRef::Array { element } => eco_format!("{}Array", type_identifier(&element)),
        TypeRef::Error => "Error".into(),
    }
}

/// Namespace holding everything generated for one assembly.
#[must_use]
pub fn generated_namespace(root: &str, assembly: &str) -> EcoString {
    let segments: Vec<EcoString> = assembly.split('.').map(sanitize_identifier).collect();
    eco_format!("{root}.{}", segments.join("_"))
}

/// `{Handler}_{Message}_Handler`.
#[must_use]
pub fn wrapper_class_name(handler_type: &str, message: &TypeRef) -> EcoString {
    eco_format!(
        "{}_{}_Handler",
        sanitize_identifier(simple_name(handler_type)),
        type_identifier(message)
    )
}

/// `{Message}_Publisher`.
#[must_use]
pub fn publisher_class_name(message: &TypeRef) -> EcoString {
    eco_format!("{}_Publisher", type_identifier(message))
}

/// Appends a short hash of `identity` to a name that collided.
#[must_use]
pub fn disambiguate(name: &str, identity: &str) -> EcoString {
    eco_format!("{name}_{}", short_hash(identity))
}

/// Eight hex characters of the SHA-256 of `text`.
#[must_use]
pub fn short_hash(text: &str) -> String {
    hex_prefix(&Sha256::digest(text.as_bytes()), 4)
}

/// Class holding the interceptors of one source file: the file stem plus a
/// hash of the full path, so equally named files in different folders do
/// not collide.
#[must_use]
pub fn interceptor_class_name(path: &Utf8Path) -> EcoString {
    let stem = path.file_stem().unwrap_or("Source");
    eco_format!(
        "{}_{}_Interceptors",
        sanitize_identifier(stem),
        short_hash(&path.as_str().replace('\\', "/"))
    )
}

/// Interceptor method for one call site.
#[must_use]
pub fn interceptor_method_name(method: &str, fingerprint: &LocationFingerprint) -> EcoString {
    eco_format!("Intercept{}_{}", sanitize_identifier(method), fingerprint)
}

/// Hint name of a generated file; `.g.cs` marks it as generated.
#[must_use]
pub fn hint_name(class_name: &str) -> EcoString {
    eco_format!("{class_name}.g.cs")
}
